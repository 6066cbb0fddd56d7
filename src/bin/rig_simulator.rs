use anyhow::{Context, Result};
use clap::Parser;
use log::*;
use mrmc_link::data::encode_datagram;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::net::UdpSocket;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Stream a synthetic orbiting camera to a rig link endpoint
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination, address:port (unicast or multicast)
    #[arg(long, default_value = "127.0.0.1:55535")]
    target: String,

    /// Datagrams per second
    #[arg(long, default_value = "100")]
    rate: u32,

    /// Orbit radius in meters
    #[arg(long, default_value = "2.0")]
    radius: f32,

    /// Seconds per orbit
    #[arg(long, default_value = "10.0")]
    period: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to create UDP socket")?;
    socket.set_multicast_ttl_v4(2)?;
    let interval = Duration::from_secs_f64(1.0 / args.rate.max(1) as f64);
    info!("Sending to {} at {} Hz", args.target, args.rate);

    let started = Instant::now();
    let mut sent: u64 = 0;
    loop {
        let t = started.elapsed().as_secs_f32();
        let angle = t / args.period * std::f32::consts::TAU;
        let (xv, yv, zv) = (args.radius * angle.cos(), args.radius * angle.sin(), 1.5);
        let roll = 5.0 * (t * 0.5).sin();
        let zoom = 35.0 + 15.0 * (t * 0.2).sin();
        let datagram = encode_datagram([xv, yv, zv, 0.0, 0.0, 1.0, roll, 3.0, zoom]);
        if let Err(error) = socket.send_to(&datagram, &args.target) {
            warn!("Error sending datagram: {}", error);
        }
        sent += 1;
        if sent % (args.rate.max(1) as u64 * 10) == 0 {
            info!("Sent {} datagrams", sent);
        }
        sleep(interval);
    }
}
