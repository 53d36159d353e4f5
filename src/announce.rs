//! Speech and desktop notifications
//!
//! Announcements go through the system `espeak` and `notify-send` utilities.
//! A missing utility downgrades to a warning; the loop keeps running.

use tokio::process::Command;

const NOTIFY_ICON: &str = "/usr/share/icons/gnome/48x48/status/dialog-information.png";

pub struct Announcer {
    speak_enabled: bool,
    notify_enabled: bool,
}

impl Announcer {
    pub fn new(speak_enabled: bool, notify_enabled: bool) -> Self {
        Self {
            speak_enabled,
            notify_enabled,
        }
    }

    pub fn silent() -> Self {
        Self::new(false, false)
    }

    /// Speak `text` in the default voice, waiting for completion so
    /// consecutive announcements do not talk over each other.
    pub async fn say(&self, text: &str) {
        if !self.speak_enabled {
            return;
        }
        Self::run_espeak(&[text]).await;
    }

    /// Speak `text` in a specific espeak voice (e.g. "czech").
    pub async fn say_in_voice(&self, voice: &str, text: &str) {
        if !self.speak_enabled {
            return;
        }
        Self::run_espeak(&["-v", voice, text]).await;
    }

    async fn run_espeak(args: &[&str]) {
        match Command::new("espeak").args(args).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!("espeak exited with {}", status),
            Err(e) => tracing::warn!("espeak unavailable: {}", e),
        }
    }

    /// Fire-and-forget desktop notification.
    pub fn notify(&self, summary: &str, body: &str) {
        if !self.notify_enabled {
            return;
        }
        let spawned = Command::new("notify-send")
            .arg("--expire-time=3000")
            .arg("-i")
            .arg(NOTIFY_ICON)
            .arg(summary)
            .arg(body)
            .spawn();
        if let Err(e) = spawned {
            tracing::warn!("notify-send unavailable: {}", e);
        }
    }
}
