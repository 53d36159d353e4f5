//! MQTT telemetry publishing
//!
//! State is published through the system `mosquitto_pub` client so the loop
//! has no broker session of its own. Publish failures are logged and
//! absorbed; telemetry must never stall or kill the watch loop.

use tokio::process::Command;

pub struct Telemetry {
    prefix: String,
    enabled: bool,
}

impl Telemetry {
    pub fn new(topic_prefix: &str, camera_id: u32) -> Self {
        Self {
            prefix: format!("{}/camera{}", topic_prefix, camera_id),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            prefix: String::new(),
            enabled: false,
        }
    }

    fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.prefix, suffix)
    }

    pub async fn publish(&self, suffix: &str, payload: &str) {
        if !self.enabled {
            return;
        }
        let topic = self.topic(suffix);
        match Command::new("mosquitto_pub")
            .arg("-t")
            .arg(&topic)
            .arg("-m")
            .arg(payload)
            .status()
            .await
        {
            Ok(status) if status.success() => {
                tracing::debug!("published {} = {}", topic, payload);
            }
            Ok(status) => {
                tracing::warn!("mosquitto_pub exited with {} for {}", status, topic);
            }
            Err(e) => {
                tracing::warn!("mosquitto_pub unavailable: {}", e);
            }
        }
    }
}
