//! OSC-over-UDP occupancy broadcaster.
//!
//! Wire format: one OSC 1.0 message per occupancy change, a fixed address
//! pattern and a single `i` (int32) argument carrying the zone id, `-1`
//! meaning idle. A fresh socket is bound for every send and released right
//! after; there is no persistent connection.

use anyhow::{anyhow, Context, Result};
use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use super::Broadcast;

pub const DEFAULT_ADDRESS_PATTERN: &str = "/test";
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone, Debug)]
pub struct OscBroadcaster {
    target: SocketAddr,
    address_pattern: String,
    send_timeout: Duration,
}

impl OscBroadcaster {
    pub fn new(target: SocketAddr, address_pattern: impl Into<String>) -> Self {
        Self {
            target,
            address_pattern: address_pattern.into(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Upper bound on how long a single send may block.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.send_timeout = timeout;
        }
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn address_pattern(&self) -> &str {
        &self.address_pattern
    }

    /// Encode the datagram payload for `zone_id`.
    pub fn encode(&self, zone_id: i32) -> Result<Vec<u8>> {
        let packet = OscPacket::Message(OscMessage {
            addr: self.address_pattern.clone(),
            args: vec![OscType::Int(zone_id)],
        });
        encoder::encode(&packet).map_err(|e| anyhow!("failed to encode osc message: {:?}", e))
    }

    fn bind_addr(&self) -> &'static str {
        if self.target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        }
    }
}

impl Broadcast for OscBroadcaster {
    fn name(&self) -> &'static str {
        "osc-udp"
    }

    fn broadcast(&self, zone_id: i32) -> Result<()> {
        let payload = self.encode(zone_id)?;
        let socket = UdpSocket::bind(self.bind_addr())
            .with_context(|| format!("bind udp socket for {}", self.target))?;
        socket
            .set_write_timeout(Some(self.send_timeout))
            .context("set udp write timeout")?;
        let sent = socket
            .send_to(&payload, self.target)
            .with_context(|| format!("send osc message to {}", self.target))?;
        if sent != payload.len() {
            return Err(anyhow!(
                "short udp send to {}: {} of {} bytes",
                self.target,
                sent,
                payload.len()
            ));
        }
        Ok(())
    }
}

/// A decoded occupancy datagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMessage {
    pub address_pattern: String,
    pub zone_id: i32,
}

/// Decode a datagram produced by `OscBroadcaster`.
///
/// Bundles are searched depth-first for the first message carrying a single
/// int argument.
pub fn decode_occupancy(datagram: &[u8]) -> Result<OccupancyMessage> {
    let (_, packet) =
        decoder::decode_udp(datagram).map_err(|e| anyhow!("invalid osc packet: {:?}", e))?;
    find_occupancy(&packet).ok_or_else(|| anyhow!("osc packet carries no int32 zone id"))
}

fn find_occupancy(packet: &OscPacket) -> Option<OccupancyMessage> {
    match packet {
        OscPacket::Message(msg) => match msg.args.as_slice() {
            [OscType::Int(zone_id)] => Some(OccupancyMessage {
                address_pattern: msg.addr.clone(),
                zone_id: *zone_id,
            }),
            _ => None,
        },
        OscPacket::Bundle(bundle) => bundle.content.iter().find_map(find_occupancy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_address_and_single_int() -> Result<()> {
        let target: SocketAddr = "127.0.0.1:5005".parse()?;
        let payload = OscBroadcaster::new(target, DEFAULT_ADDRESS_PATTERN).encode(-1)?;
        // "/test" padded to 8, ",i" padded to 4, big-endian int32.
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[..8], b"/test\0\0\0");
        assert_eq!(&payload[8..12], b",i\0\0");
        assert_eq!(&payload[12..], &(-1i32).to_be_bytes());
        Ok(())
    }

    #[test]
    fn sends_one_datagram_over_loopback() -> Result<()> {
        let listener = UdpSocket::bind("127.0.0.1:0")?;
        listener.set_read_timeout(Some(Duration::from_secs(2)))?;
        let broadcaster = OscBroadcaster::new(listener.local_addr()?, "/stage/zone");

        broadcaster.broadcast(3)?;

        let mut buf = [0u8; 1536];
        let (len, _) = listener.recv_from(&mut buf)?;
        let msg = decode_occupancy(&buf[..len])?;
        assert_eq!(msg.address_pattern, "/stage/zone");
        assert_eq!(msg.zone_id, 3);
        Ok(())
    }

    #[test]
    fn rejects_messages_without_int_argument() {
        let packet = OscPacket::Message(OscMessage {
            addr: "/test".to_string(),
            args: vec![OscType::Float(1.0)],
        });
        let bytes = encoder::encode(&packet).expect("encode");
        assert!(decode_occupancy(&bytes).is_err());
        assert!(decode_occupancy(b"garbage").is_err());
    }
}
