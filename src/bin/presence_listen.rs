//! presence_listen - print occupancy datagrams as they arrive
//!
//! Consumer-side debugging aid: binds a UDP port, decodes each OSC packet and
//! logs its address pattern and zone id. Stops on Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use zone_presence::decode_occupancy;

// Largest datagram we accept; OSC over UDP stays well below this.
const MAX_DATAGRAM: usize = 1536;

#[derive(Parser, Debug)]
#[command(author, version, about = "Listen for zone occupancy OSC datagrams")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PRESENCE_LISTEN_ADDR", default_value = "127.0.0.1:5005")]
    bind: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket =
        UdpSocket::bind(&args.bind).with_context(|| format!("bind udp socket on {}", args.bind))?;
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .context("set udp read timeout")?;
    log::info!("listening on {}", socket.local_addr()?);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(err) => return Err(err).context("recv udp datagram"),
        };
        match decode_occupancy(&buf[..len]) {
            Ok(msg) => log::info!("{} {} {}", peer, msg.address_pattern, msg.zone_id),
            Err(e) => log::warn!("ignored datagram from {}: {}", peer, e),
        }
    }

    log::info!("shutdown signal received");
    Ok(())
}
