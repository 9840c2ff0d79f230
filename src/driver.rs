//! Frame driver
//!
//! Per-frame orchestrator: pulls the latest tracker state, runs the
//! pose/expression pipeline against the live puppet, and publishes the
//! resulting frame. One driver task owns the whole tracking session;
//! avatar swaps and session restarts happen at tick boundaries inside
//! that task, so no two loops ever race on the same avatar state.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::avatar::{expression, pose, ExpressionWeights, Puppet, PuppetFrame};
use crate::config::HeadOffset;
use crate::tracking::{FaceTracker, TrackerReceiver, TrackerSubprocess};
use crate::AppState;

/// Driver lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// No avatar loaded
    Idle,
    /// Avatar loaded, tracker may or may not see a face
    Tracking,
    /// Face found in the current tick
    Detected,
}

/// Everything one tracking session owns. Replaced as a unit on restart.
struct Session<T> {
    tracker: Option<T>,
    puppet: Option<Puppet>,
}

/// The per-frame pipeline runner.
///
/// Generic over the tracker so tests can script one; production uses
/// [`TrackerReceiver`].
pub struct FrameDriver<T> {
    mirror: bool,
    head_offset: HeadOffset,
    session: Session<T>,
    phase: DriverPhase,
}

impl<T: FaceTracker> FrameDriver<T> {
    pub fn new(mirror: bool, head_offset: HeadOffset) -> Self {
        Self {
            mirror,
            head_offset,
            session: Session {
                tracker: None,
                puppet: None,
            },
            phase: DriverPhase::Idle,
        }
    }

    /// Replace the live avatar wholesale. Completes the Idle -> Tracking
    /// transition; the previous puppet's state is discarded entirely.
    pub fn load_avatar(&mut self, puppet: Puppet) {
        self.session.puppet = Some(puppet);
        self.phase = DriverPhase::Tracking;
    }

    pub fn unload_avatar(&mut self) {
        self.session.puppet = None;
        self.phase = DriverPhase::Idle;
    }

    pub fn attach_tracker(&mut self, tracker: T) {
        self.session.tracker = Some(tracker);
    }

    pub fn detach_tracker(&mut self) {
        self.session.tracker = None;
    }

    pub fn phase(&self) -> DriverPhase {
        self.phase
    }

    /// Run one tick of the pipeline.
    ///
    /// With no avatar loaded the whole tick is skipped. With an avatar but
    /// no detected face the facial stages are skipped and the frame still
    /// publishes, so rendering keeps advancing.
    pub fn tick(&mut self) -> Option<PuppetFrame> {
        let Some(puppet) = self.session.puppet.as_mut() else {
            self.phase = DriverPhase::Idle;
            return None;
        };

        let mut detected = false;
        if let Some(tracker) = self.session.tracker.as_mut() {
            tracker.poll();

            if tracker.ready() && tracker.is_detected() {
                detected = true;

                let rotation = pose::face_rotation(
                    tracker.rotation_stabilized(),
                    self.mirror,
                    &self.head_offset,
                );
                pose::apply_head_rotation(puppet, rotation);

                let mut weights =
                    ExpressionWeights::from_influences(tracker.influences_stabilized(), self.mirror);
                weights.apply_lip_exclusivity();

                if let Some(blend) = puppet.blend_mut() {
                    expression::apply_expression(blend, &weights);
                }
            }
        }

        self.phase = if detected {
            DriverPhase::Detected
        } else {
            DriverPhase::Tracking
        };

        Some(puppet.snapshot(detected))
    }
}

/// Run the frame driver service until shutdown.
///
/// The outer loop owns session setup; the inner loop is the tick loop. A
/// restart signal breaks the inner loop, tearing the session down before
/// the outer loop binds a new one.
pub async fn run(state: Arc<AppState>) -> crate::Result<()> {
    let mut shutdown_rx = state.subscribe_shutdown();
    let mut avatar_rx = state.subscribe_avatar();

    loop {
        // --- session setup ---
        let config = state.config.read().await.clone();

        let mut driver: FrameDriver<TrackerReceiver> =
            FrameDriver::new(config.mirror, config.head_offset);

        if let Some(descriptor) = avatar_rx.borrow_and_update().clone() {
            driver.load_avatar(Puppet::from_descriptor(&descriptor));
        }

        let mut subprocess = if config.tracker.enabled && config.tracker.auto_launch {
            let mut sp = TrackerSubprocess::new(&config.tracker);
            if let Err(e) = sp.start() {
                tracing::error!("Failed to auto-launch tracker: {}", e);
                // Continue anyway, the tracker may be running externally
            }
            Some(sp)
        } else {
            None
        };

        if config.tracker.enabled {
            let mut receiver = TrackerReceiver::new(&config.tracker);
            match receiver.start() {
                Ok(()) => driver.attach_tracker(receiver),
                Err(e) => {
                    // No automatic retry: this session runs without face
                    // detection until a restart is requested
                    tracing::error!("Tracker init failed, face detection disabled: {}", e);
                }
            }
        }

        let mut interval =
            tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(config.driver.fps)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Frame driver started ({} fps, mirror: {})",
            config.driver.fps,
            config.mirror
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(frame) = driver.tick() {
                        state.publish_frame(frame).await;
                    }

                    // Subprocess health check and auto-restart
                    if let Some(ref mut sp) = subprocess {
                        if !sp.is_running() && config.tracker.auto_restart {
                            tracing::info!(
                                "Tracker subprocess crashed, restarting in {}s",
                                config.tracker.restart_delay_secs
                            );
                            tokio::time::sleep(Duration::from_secs(
                                config.tracker.restart_delay_secs,
                            ))
                            .await;
                            if let Err(e) = sp.start() {
                                tracing::error!("Failed to restart tracker: {}", e);
                            }
                        }
                    }
                }
                result = avatar_rx.changed() => {
                    if result.is_err() {
                        return Ok(());
                    }
                    match avatar_rx.borrow_and_update().clone() {
                        Some(descriptor) => {
                            tracing::info!("Avatar swapped to '{}'", descriptor.name);
                            driver.load_avatar(Puppet::from_descriptor(&descriptor));
                        }
                        None => {
                            tracing::info!("Avatar unloaded");
                            driver.unload_avatar();
                        }
                    }
                }
                _ = state.wait_tracker_restart() => {
                    tracing::info!("Tracking session restart requested");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Frame driver shutting down");
                    if let Some(ref mut sp) = subprocess {
                        sp.stop().await;
                    }
                    return Ok(());
                }
            }
        }

        // Tear the old session down completely (socket, interval,
        // subprocess) before the outer loop starts the next one
        driver.detach_tracker();
        if let Some(ref mut sp) = subprocess {
            sp.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{AvatarDescriptor, BoneName, Humanoid};

    /// Scripted tracker for exercising the driver without a socket
    struct ScriptedTracker {
        ready: bool,
        detected: bool,
        rotation: [f32; 3],
        influences: Vec<f32>,
        polls: usize,
    }

    impl ScriptedTracker {
        fn detecting(rotation: [f32; 3], influences: Vec<f32>) -> Self {
            Self {
                ready: true,
                detected: true,
                rotation,
                influences,
                polls: 0,
            }
        }

        fn absent() -> Self {
            Self {
                ready: true,
                detected: false,
                rotation: [0.0; 3],
                influences: Vec::new(),
                polls: 0,
            }
        }
    }

    impl FaceTracker for ScriptedTracker {
        fn poll(&mut self) {
            self.polls += 1;
        }

        fn ready(&self) -> bool {
            self.ready
        }

        fn is_detected(&self) -> bool {
            self.detected
        }

        fn rotation_stabilized(&self) -> [f32; 3] {
            self.rotation
        }

        fn influences_stabilized(&self) -> &[f32] {
            &self.influences
        }
    }

    fn driver() -> FrameDriver<ScriptedTracker> {
        FrameDriver::new(false, HeadOffset::default())
    }

    /// Influence vector driving mouth "a" and both blinks
    fn talking_influences() -> Vec<f32> {
        let mut v = vec![0.0; 11];
        v[6] = 0.8; // a
        v[8] = 0.3; // blink left slot
        v[9] = 0.4; // blink right slot
        v
    }

    #[test]
    fn test_idle_without_avatar() {
        let mut driver = driver();
        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert!(driver.tick().is_none());
        assert_eq!(driver.phase(), DriverPhase::Idle);
    }

    #[test]
    fn test_avatar_load_enters_tracking() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        assert_eq!(driver.phase(), DriverPhase::Tracking);

        // No tracker attached: frame publishes, facial stages skipped
        let frame = driver.tick().expect("frame");
        assert!(!frame.detected);
        assert_eq!(driver.phase(), DriverPhase::Tracking);
    }

    #[test]
    fn test_detected_tick_runs_pipeline() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.attach_tracker(ScriptedTracker::detecting(
            [1.0, 0.0, 0.0],
            talking_influences(),
        ));

        let frame = driver.tick().expect("frame");
        assert!(frame.detected);
        assert_eq!(driver.phase(), DriverPhase::Detected);

        // Pitch is inverted and propagated down the chain
        let head = frame.bones[&BoneName::Head];
        let neck = frame.bones[&BoneName::Neck];
        let spine = frame.bones[&BoneName::Spine];
        assert!((head.x + 0.7).abs() < 1e-6);
        assert!((neck.x + 0.2).abs() < 1e-6);
        assert!((spine.x + 0.1).abs() < 1e-6);

        // Winner-take-all left "a" as the only mouth shape
        assert!((frame.blend["a"] - 0.8).abs() < 1e-6);
        assert_eq!(frame.blend["i"], 0.0);
        assert_eq!(frame.blend["u"], 0.0);
        assert_eq!(frame.blend["o"], 0.0);
        // Non-mirrored blink mapping
        assert!((frame.blend["blink_l"] - 0.3).abs() < 1e-6);
        assert!((frame.blend["blink_r"] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_undetected_tick_skips_facial_stages() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.attach_tracker(ScriptedTracker::absent());

        let frame = driver.tick().expect("frame");
        assert!(!frame.detected);
        assert_eq!(driver.phase(), DriverPhase::Tracking);

        // Head never moved; blend surface stays at zero
        assert_eq!(frame.bones[&BoneName::Head].x, 0.0);
        assert_eq!(frame.blend["a"], 0.0);
    }

    #[test]
    fn test_tracker_polled_each_tick() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.attach_tracker(ScriptedTracker::absent());

        driver.tick();
        driver.tick();
        driver.tick();
        assert_eq!(driver.session.tracker.as_ref().unwrap().polls, 3);
    }

    #[test]
    fn test_avatar_swap_replaces_wholesale() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.attach_tracker(ScriptedTracker::detecting(
            [1.0, 0.0, 0.0],
            talking_influences(),
        ));
        driver.tick();

        // Swap in a fresh avatar: no pose or blend state carries over
        let descriptor = AvatarDescriptor {
            name: "second".to_string(),
            ..Default::default()
        };
        driver.load_avatar(Puppet::from_descriptor(&descriptor));

        let puppet = driver.session.puppet.as_ref().unwrap();
        assert_eq!(puppet.name(), "second");
        assert_eq!(puppet.bone(BoneName::Head).unwrap().rotation().x, 0.0);
    }

    #[test]
    fn test_blendless_avatar_is_a_noop_sink() {
        let descriptor = AvatarDescriptor {
            blend_shapes: false,
            ..Default::default()
        };
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&descriptor));
        driver.attach_tracker(ScriptedTracker::detecting(
            [0.0, 0.0, 0.0],
            talking_influences(),
        ));

        let frame = driver.tick().expect("frame");
        assert!(frame.detected);
        assert!(frame.blend.is_empty());
    }

    #[test]
    fn test_partial_rig_updates_remaining_bones() {
        let descriptor = AvatarDescriptor {
            bones: vec![BoneName::Head, BoneName::Spine],
            ..Default::default()
        };
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&descriptor));
        driver.attach_tracker(ScriptedTracker::detecting([0.0, 1.0, 0.0], Vec::new()));

        let frame = driver.tick().expect("frame");
        assert!((frame.bones[&BoneName::Head].y - 0.7).abs() < 1e-6);
        assert!((frame.bones[&BoneName::Spine].y - 0.1).abs() < 1e-6);
        assert!(!frame.bones.contains_key(&BoneName::Neck));
    }

    #[test]
    fn test_unload_returns_to_idle() {
        let mut driver = driver();
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.unload_avatar();

        assert_eq!(driver.phase(), DriverPhase::Idle);
        assert!(driver.tick().is_none());
    }

    #[test]
    fn test_mirror_flips_yaw_and_blinks() {
        let mut driver: FrameDriver<ScriptedTracker> =
            FrameDriver::new(true, HeadOffset::default());
        driver.load_avatar(Puppet::from_descriptor(&AvatarDescriptor::default()));
        driver.attach_tracker(ScriptedTracker::detecting(
            [0.0, 1.0, 0.0],
            talking_influences(),
        ));

        let frame = driver.tick().expect("frame");
        assert!((frame.bones[&BoneName::Head].y + 0.7).abs() < 1e-6);
        assert!((frame.blend["blink_l"] - 0.4).abs() < 1e-6);
        assert!((frame.blend["blink_r"] - 0.3).abs() < 1e-6);
    }
}
