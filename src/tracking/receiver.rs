//! Face tracker receiver
//!
//! Receives JSON-over-UDP packets from the external tracker process
//! (`scripts/face_tracker.py` or anything speaking the same format) and
//! exposes the latest packet through the [`FaceTracker`] query surface.

use serde::Deserialize;
use std::net::UdpSocket;

use crate::config::TrackerConfig;
use crate::error::{KagamiError, TrackerError};

use super::FaceTracker;

/// A single JSON packet from the tracker
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerPacket {
    /// Whether a face was detected this frame
    pub detected: bool,
    /// Stabilized head rotation [pitch, yaw, roll] in radians
    pub rotation: [f32; 3],
    /// Stabilized morph-target influences; layout fixed by the tracker
    pub influences: Vec<f32>,
}

/// JSON-over-UDP tracker receiver.
///
/// The socket is non-blocking and drained in-tick by the frame driver, so
/// the latest packet always wins and no queue builds up between ticks.
pub struct TrackerReceiver {
    config: TrackerConfig,
    socket: Option<UdpSocket>,
    packet: Option<TrackerPacket>,
}

impl TrackerReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            packet: None,
        }
    }

    /// Bind the UDP socket and start receiving.
    ///
    /// A bind failure is the init-error path: the caller logs it and runs
    /// the session without face detection.
    pub fn start(&mut self) -> Result<(), KagamiError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackerError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackerError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        tracing::info!("Tracker receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// The bound local address, if started
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        self.packet = None;
        tracing::info!("Tracker receiver stopped");
    }
}

/// Decode one tracker datagram
fn parse_packet(data: &[u8]) -> Result<TrackerPacket, KagamiError> {
    serde_json::from_slice(data)
        .map_err(|e| TrackerError::Parse(format!("JSON parse error: {}", e)).into())
}

impl FaceTracker for TrackerReceiver {
    fn poll(&mut self) {
        let Some(socket) = &self.socket else {
            return;
        };

        let mut buf = [0u8; 65536];

        loop {
            match socket.recv(&mut buf) {
                Ok(size) if size > 0 => {
                    match parse_packet(&buf[..size]) {
                        Ok(packet) => self.packet = Some(packet),
                        // A malformed datagram costs one update, nothing more
                        Err(e) => tracing::debug!("Dropping malformed tracker packet: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!("Tracker receive error: {}", e);
                    break;
                }
            }
        }
    }

    fn ready(&self) -> bool {
        self.socket.is_some() && self.packet.is_some()
    }

    fn is_detected(&self) -> bool {
        self.packet.as_ref().is_some_and(|p| p.detected)
    }

    fn rotation_stabilized(&self) -> [f32; 3] {
        self.packet
            .as_ref()
            .map(|p| p.rotation)
            .unwrap_or_default()
    }

    fn influences_stabilized(&self) -> &[f32] {
        self.packet
            .as_ref()
            .map(|p| p.influences.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json(detected: bool, pitch: f32) -> String {
        serde_json::json!({
            "detected": detected,
            "rotation": [pitch, -0.05, 0.01],
            "influences": [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.45, 0.1, 0.8, 0.75, 0.05]
        })
        .to_string()
    }

    #[test]
    fn test_parse_packet() {
        let pkt: TrackerPacket = serde_json::from_str(&sample_json(true, 0.2)).unwrap();

        assert!(pkt.detected);
        assert!((pkt.rotation[0] - 0.2).abs() < 1e-6);
        assert_eq!(pkt.influences.len(), 11);
        assert!((pkt.influences[6] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_parse_no_face() {
        let json = r#"{"detected":false,"rotation":[0,0,0],"influences":[]}"#;
        let pkt: TrackerPacket = serde_json::from_str(json).unwrap();
        assert!(!pkt.detected);
        assert!(pkt.influences.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_packet(b"not json").is_err());
        assert!(parse_packet(br#"{"detected":true}"#).is_err());
    }

    #[test]
    fn test_not_ready_before_start() {
        let receiver = TrackerReceiver::new(&TrackerConfig::default());
        assert!(!receiver.ready());
        assert!(!receiver.is_detected());
        assert_eq!(receiver.rotation_stabilized(), [0.0; 3]);
        assert!(receiver.influences_stabilized().is_empty());
    }

    #[test]
    fn test_receive_and_query() {
        // Ephemeral port so tests don't collide
        let config = TrackerConfig {
            port: 0,
            ..Default::default()
        };
        let mut receiver = TrackerReceiver::new(&config);
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(sample_json(true, 0.2).as_bytes(), addr).unwrap();

        // UDP delivery on loopback is fast but not instant
        for _ in 0..50 {
            receiver.poll();
            if receiver.ready() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert!(receiver.ready());
        assert!(receiver.is_detected());
        assert!((receiver.rotation_stabilized()[0] - 0.2).abs() < 1e-6);
        assert!((receiver.influences_stabilized()[6] - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_latest_packet_wins() {
        let config = TrackerConfig {
            port: 0,
            ..Default::default()
        };
        let mut receiver = TrackerReceiver::new(&config);
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(sample_json(true, 0.1).as_bytes(), addr).unwrap();
        sender.send_to(sample_json(false, 0.9).as_bytes(), addr).unwrap();

        for _ in 0..50 {
            receiver.poll();
            if receiver.ready() && !receiver.is_detected() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert!(receiver.ready());
        assert!(!receiver.is_detected());
        assert!((receiver.rotation_stabilized()[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_packet_ignored() {
        let config = TrackerConfig {
            port: 0,
            ..Default::default()
        };
        let mut receiver = TrackerReceiver::new(&config);
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"not json", addr).unwrap();

        for _ in 0..20 {
            receiver.poll();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        assert!(!receiver.ready());
    }

    #[test]
    fn test_stop_clears_state() {
        let config = TrackerConfig {
            port: 0,
            ..Default::default()
        };
        let mut receiver = TrackerReceiver::new(&config);
        receiver.start().unwrap();
        receiver.stop();

        assert!(!receiver.ready());
        assert!(receiver.local_addr().is_none());
    }
}
