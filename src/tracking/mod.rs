//! Tracking module
//!
//! The face tracker is an external engine; this module owns its narrow
//! contract: a query surface for the latest stabilized estimate, a
//! JSON-over-UDP receiver implementing it, and an optional subprocess
//! launcher for the tracker itself.

pub mod receiver;
pub mod subprocess;

pub use receiver::{TrackerPacket, TrackerReceiver};
pub use subprocess::TrackerSubprocess;

/// Query surface of a face-tracking engine.
///
/// The engine stabilizes its own output; consumers read the latest
/// estimate without further smoothing.
pub trait FaceTracker {
    /// Drain any pending tracker output. Called once at the top of each
    /// tick; the default is a no-op for engines that push synchronously.
    fn poll(&mut self) {}

    /// Whether the engine has initialized and produced data
    fn ready(&self) -> bool;

    /// Whether a face was found in the current estimate
    fn is_detected(&self) -> bool;

    /// Stabilized head rotation `[pitch, yaw, roll]` in radians,
    /// camera-relative
    fn rotation_stabilized(&self) -> [f32; 3];

    /// Stabilized morph-target influence vector; layout fixed by the engine
    fn influences_stabilized(&self) -> &[f32];
}
