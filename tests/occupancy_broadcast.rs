use std::net::UdpSocket;
use std::time::Duration;

use anyhow::Result;

use zone_presence::{
    decode_occupancy, Detection, DetectionFrame, PresenceConfig, PresencePipeline, Rect,
};

fn recv_zone(socket: &UdpSocket) -> Result<i32> {
    let mut buf = [0u8; 1536];
    let (len, _) = socket.recv_from(&mut buf)?;
    let msg = decode_occupancy(&buf[..len])?;
    assert_eq!(msg.address_pattern, "/test");
    Ok(msg.zone_id)
}

fn listener() -> Result<UdpSocket> {
    let socket = UdpSocket::bind("127.0.0.1:0")?;
    socket.set_read_timeout(Some(Duration::from_secs(3)))?;
    Ok(socket)
}

#[test]
fn person_entering_then_leaving_sends_zone_then_idle() -> Result<()> {
    let socket = listener()?;
    let mut cfg = PresenceConfig::default();
    cfg.broadcast.addr = socket.local_addr()?;
    cfg.idle_timeout = Duration::from_millis(300);

    let mut pipeline = PresencePipeline::from_config(&cfg)?;

    // 416x416 model onto a 1280x720 canvas: anchor lands at (184, 695),
    // inside zone 0 (0,0,250,1000).
    let frame = DetectionFrame::new(
        vec![
            Detection::new("car", Rect::new(300.0, 100.0, 100.0, 100.0)),
            Detection::new("person", Rect::new(40.0, 200.0, 40.0, 202.0)),
        ],
        1280.0,
        720.0,
    );
    assert_eq!(pipeline.process_frame(&frame)?, 1);
    assert_eq!(pipeline.process_frame(&frame)?, 1);

    assert_eq!(recv_zone(&socket)?, 0);
    assert_eq!(recv_zone(&socket)?, -1);

    pipeline.shutdown()?;
    let status = pipeline.status()?;
    assert_eq!(status.broadcasts, 2);
    assert_eq!(status.failed_broadcasts, 0);
    Ok(())
}

#[test]
fn unreachable_destination_does_not_stall_frames() -> Result<()> {
    let mut cfg = PresenceConfig::default();
    // Nothing listens here; sends either vanish or fail, both are fine.
    cfg.broadcast.addr = "127.0.0.1:9".parse()?;
    cfg.idle_timeout = Duration::from_secs(30);

    let mut pipeline = PresencePipeline::from_config(&cfg)?;
    let frame = DetectionFrame::new(
        vec![Detection::new("person", Rect::new(10.0, 10.0, 20.0, 20.0))],
        416.0,
        416.0,
    );
    for _ in 0..50 {
        pipeline.process_frame(&frame)?;
    }
    pipeline.shutdown()?;
    assert_eq!(pipeline.status()?.frames, 50);
    Ok(())
}
