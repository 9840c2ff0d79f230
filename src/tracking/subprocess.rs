//! Tracker subprocess manager
//!
//! Launches the external face-tracker script as a child process with
//! automatic cleanup on drop, forwarding the camera negotiation settings
//! as command-line arguments.

use tokio::process::{Child, Command};

use crate::config::TrackerConfig;
use crate::error::{KagamiError, TrackerError};

/// Manages the external tracker subprocess
pub struct TrackerSubprocess {
    child: Option<Child>,
    config: TrackerConfig,
}

impl TrackerSubprocess {
    /// Create a new subprocess manager (does not start the process)
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            child: None,
            config: config.clone(),
        }
    }

    /// Launch the tracker subprocess.
    ///
    /// Runs: `<tracker_command> <tracker_script> --ip <listen_address>
    ///        --port <port> --model <model_path> [--device <device_id>]
    ///        --facing-mode <mode> --width <ideal> --height <ideal>
    ///        --min-width .. --max-height .. --rotate <deg> [--flip-x]`
    pub fn start(&mut self) -> Result<(), KagamiError> {
        if self.is_running() {
            return Ok(());
        }

        let video = &self.config.video;

        let mut command = Command::new(&self.config.tracker_command);
        command
            .arg(&self.config.tracker_script)
            .args(["--ip", &self.config.listen_address])
            .args(["--port", &self.config.port.to_string()])
            .args(["--model", &self.config.model_path])
            .args(["--facing-mode", &video.facing_mode])
            .args(["--width", &video.ideal_width.to_string()])
            .args(["--height", &video.ideal_height.to_string()])
            .args(["--min-width", &video.min_width.to_string()])
            .args(["--min-height", &video.min_height.to_string()])
            .args(["--max-width", &video.max_width.to_string()])
            .args(["--max-height", &video.max_height.to_string()])
            .args(["--rotate", &video.rotate.to_string()]);

        if let Some(ref device) = video.device_id {
            command.args(["--device", device]);
        }
        if video.flip_x {
            command.arg("--flip-x");
        }

        let child = command
            .kill_on_drop(true)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                TrackerError::Subprocess(format!(
                    "Failed to launch tracker at '{}': {}",
                    self.config.tracker_script, e
                ))
            })?;

        tracing::info!(
            "Tracker subprocess started (pid: {:?}, device: {}, port: {})",
            child.id(),
            self.config.video.device_id.as_deref().unwrap_or("auto"),
            self.config.port,
        );

        self.child = Some(child);
        Ok(())
    }

    /// Check if the subprocess is still running (non-blocking)
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    tracing::warn!("Tracker subprocess exited with: {}", status);
                    self.child = None;
                    false
                }
                Err(e) => {
                    tracing::error!("Failed to check subprocess status: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Stop the subprocess by killing it
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping tracker subprocess (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}
