//! Kagami - Live Avatar Puppeteering Service
//!
//! A modular Rust service that turns raw face-tracker output into live
//! avatar state every frame:
//! - Weighted head-rotation propagation across the head/neck/spine chain
//! - Mirror-aware expression extraction into AIUEO viseme channels
//! - Winner-take-all lip-sync exclusivity per frame
//! - Publishes avatar frames to external renderers over HTTP/SSE

pub mod avatar;
pub mod config;
pub mod driver;
pub mod error;
pub mod output;
pub mod tracking;

pub use config::Config;
pub use error::{KagamiError, Result};

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify, RwLock};

use avatar::{AvatarDescriptor, PuppetFrame};

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Most recently published avatar frame
    frame: RwLock<Option<PuppetFrame>>,
    /// Channel for published avatar frames
    frame_tx: broadcast::Sender<PuppetFrame>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Active avatar descriptor; the driver swaps puppets when it changes
    avatar_tx: watch::Sender<Option<AvatarDescriptor>>,
    /// Tracking session restart signal
    tracker_restart: Notify,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Arc<Self> {
        let (frame_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (avatar_tx, _) = watch::channel(Some(config.avatar.clone()));

        Arc::new(Self {
            config: RwLock::new(config),
            frame: RwLock::new(None),
            frame_tx,
            shutdown_tx,
            avatar_tx,
            tracker_restart: Notify::new(),
        })
    }

    /// Publish an avatar frame and broadcast it to outputs
    pub async fn publish_frame(&self, frame: PuppetFrame) {
        let mut current = self.frame.write().await;
        *current = Some(frame.clone());
        let _ = self.frame_tx.send(frame);
    }

    /// Get the most recently published frame
    pub async fn current_frame(&self) -> Option<PuppetFrame> {
        self.frame.read().await.clone()
    }

    /// Subscribe to published avatar frames
    pub fn subscribe_frames(&self) -> broadcast::Receiver<PuppetFrame> {
        self.frame_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Swap the active avatar (None unloads it)
    pub fn swap_avatar(&self, descriptor: Option<AvatarDescriptor>) {
        // send_replace stores the value even with no subscriber yet
        let _ = self.avatar_tx.send_replace(descriptor);
    }

    /// Subscribe to avatar swaps
    pub fn subscribe_avatar(&self) -> watch::Receiver<Option<AvatarDescriptor>> {
        self.avatar_tx.subscribe()
    }

    /// Request a tracking session restart (e.g. after a device change)
    pub fn signal_tracker_restart(&self) {
        self.tracker_restart.notify_one();
    }

    /// Wait for a tracking session restart request
    pub async fn wait_tracker_restart(&self) {
        self.tracker_restart.notified().await;
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
