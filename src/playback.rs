//! Media playback through an external mpv process.

use crate::watcher::is_image;
use std::path::Path;
use tokio::process::Command;

pub struct Player {
    enabled: bool,
}

impl Player {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Play one file. Stills are shown fire-and-forget so the loop moves on;
    /// clips are awaited so back-to-back captures play in order.
    pub async fn play(&self, path: &Path) {
        if !self.enabled {
            return;
        }
        let mut command = Command::new("mpv");
        command.arg("--really-quiet").arg(path);

        if is_image(path) {
            if let Err(e) = command.spawn() {
                tracing::warn!("mpv unavailable: {}", e);
            }
        } else {
            match command.status().await {
                Ok(status) if status.success() => {}
                Ok(status) => tracing::warn!("mpv exited with {} for {}", status, path.display()),
                Err(e) => tracing::warn!("mpv unavailable: {}", e),
            }
        }
    }
}
