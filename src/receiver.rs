//! UDP datagram receiver
//!
//! One background thread per connection owns the socket. It waits up to
//! [`WAIT_TIME`] for readability, drains every pending datagram and queues an
//! owned copy of each payload for the pipeline thread. Nothing is decoded here.

use crate::error::{Error, Result};
use crate::pipeline::PipelineStats;
use log::*;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Builder;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Kernel receive buffer, large enough to absorb bursts
pub const RECV_BUFFER_SIZE: usize = 1024 * 1024;

/// Upper bound on shutdown latency
pub const WAIT_TIME: Duration = Duration::from_millis(100);

const MAX_DATAGRAM_SIZE: usize = 65536;

const MULTICAST_TTL: u32 = 2;

pub type Datagram = Vec<u8>;

/// Bind a non-blocking UDP socket, joining the group when `endpoint` is multicast
pub fn open_socket(endpoint: SocketAddrV4) -> Result<std::net::UdpSocket> {
    let transport =
        |action: &str, e: std::io::Error| Error::Transport(format!("{} {}: {}", action, endpoint, e));

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| transport("create socket for", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| transport("set reuse address on", e))?;
    socket
        .set_recv_buffer_size(RECV_BUFFER_SIZE)
        .map_err(|e| transport("size receive buffer of", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| transport("set non-blocking on", e))?;

    if endpoint.ip().is_multicast() {
        let any = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, endpoint.port());
        socket
            .bind(&any.into())
            .map_err(|e| transport("bind", e))?;
        socket
            .join_multicast_v4(endpoint.ip(), &Ipv4Addr::UNSPECIFIED)
            .map_err(|e| transport("join multicast group", e))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| transport("enable multicast loopback on", e))?;
        socket
            .set_multicast_ttl_v4(MULTICAST_TTL)
            .map_err(|e| transport("set multicast ttl on", e))?;
        info!("Joined multicast group {}", endpoint);
    } else {
        socket
            .bind(&endpoint.into())
            .map_err(|e| transport("bind", e))?;
        info!("Bound UDP socket to {}", endpoint);
    }
    Ok(socket.into())
}

pub struct DatagramReceiver {
    stopping: Arc<AtomicBool>,
    local_addr: SocketAddr,
    join_handle: Option<JoinHandle<()>>,
}

impl DatagramReceiver {
    /// Bind `endpoint` and start the receive thread
    pub fn start(
        endpoint: SocketAddrV4,
        sender: Sender<Datagram>,
        stopping: Arc<AtomicBool>,
        stats: Arc<PipelineStats>,
    ) -> Result<Self> {
        let socket = open_socket(endpoint)?;
        let local_addr = socket.local_addr()?;
        let thread_stopping = stopping.clone();
        let join_handle = thread::Builder::new()
            .name(format!("rig-udp-receiver {}", local_addr))
            .spawn(move || {
                if let Err(error) = receive_loop(socket, sender, thread_stopping, stats) {
                    error!("UDP receiver error: {}", error);
                }
                info!("UDP receiver stopped");
            })
            .map_err(|e| Error::Thread(e.to_string()))?;
        Ok(Self {
            stopping,
            local_addr,
            join_handle: Some(join_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The thread, and with it the socket, is still alive
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }
}

impl Drop for DatagramReceiver {
    fn drop(&mut self) {
        self.stop();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("UDP receiver thread panicked");
            }
        }
    }
}

fn receive_loop(
    socket: std::net::UdpSocket,
    sender: Sender<Datagram>,
    stopping: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
) -> Result<()> {
    let rt = Builder::new_current_thread().enable_io().enable_time().build()?;
    rt.block_on(async move {
        let socket = UdpSocket::from_std(socket)?;
        let mut buffer = vec![0_u8; MAX_DATAGRAM_SIZE];
        let mut overflowing = false;
        info!("UDP receiver listening on {}", socket.local_addr()?);

        while !stopping.load(Ordering::Acquire) {
            match tokio::time::timeout(WAIT_TIME, socket.readable()).await {
                Err(_) => continue,
                Ok(result) => result?,
            }
            // a sustained flood must not hold off shutdown
            while !stopping.load(Ordering::Acquire) {
                let read = match socket.try_recv_from(&mut buffer) {
                    Ok((read, _sender)) => read,
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("UDP receive failed: {}", e);
                        break;
                    }
                };
                if read == 0 {
                    continue;
                }
                stats.record_received();
                match sender.try_send(buffer[..read].to_vec()) {
                    Ok(()) => overflowing = false,
                    Err(TrySendError::Full(_)) => {
                        stats.record_overflow();
                        if !overflowing {
                            warn!("Pipeline queue full, dropping datagrams");
                            overflowing = true;
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("Pipeline closed, leaving receive loop");
                        return Ok(());
                    }
                }
            }
        }
        Ok::<(), Error>(())
    })
}
