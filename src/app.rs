//! Watch-loop orchestration: scan, play, analyze, announce, publish.

use crate::ai::{OpenAiVisionClient, VisionService};
use crate::announce::Announcer;
use crate::models::{Config, InferenceReport};
use crate::playback::Player;
use crate::telemetry::Telemetry;
use crate::watcher::MediaCatalog;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

const SCAN_INTERVAL: Duration = Duration::from_secs(1);
const ACCUMULATE_DELAY: Duration = Duration::from_secs(5);
const INFERENCE_COOLDOWN: Duration = Duration::from_secs(60);
const CATALOG_TAIL: usize = 1000;

/// Runtime switches for the watch loop, normally filled from the CLI.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Root directory of captured media.
    pub path: PathBuf,
    /// How many of the newest files each pass considers.
    pub lookback: usize,
    pub speak: bool,
    /// Extra prompt text appended to the vision instruction.
    pub prompt: String,
    /// Enable the remote vision-language analysis.
    pub vision: bool,
    pub camera_id: u32,
    /// Speak the localized description instead of the English one.
    pub localization: bool,
    pub gui: bool,
    pub notify: bool,
}

/// Injectable collaborator bundle used to construct [`App`] in tests.
pub struct AppServices {
    pub vision: Option<Box<dyn VisionService>>,
    pub telemetry: Telemetry,
    pub announcer: Announcer,
    pub player: Player,
}

pub struct App {
    vision: Option<Box<dyn VisionService>>,
    telemetry: Telemetry,
    announcer: Announcer,
    player: Player,
    catalog: MediaCatalog,
    options: WatchOptions,
    localized_voice: String,
    accumulate_delay: Duration,
    cooldown: Duration,
}

impl App {
    /// Construct an app from environment configuration. The AI key is only
    /// required when vision analysis is enabled.
    pub fn new(options: WatchOptions) -> Result<Self> {
        if options.lookback < 1 {
            return Err(Error::Config("lookback must be > 0".to_string()));
        }

        let config = Config::from_env()?;

        let vision: Option<Box<dyn VisionService>> = if options.vision {
            info!("Vision provider: OpenAI (model: {})", config.vision_model);
            Some(Box::new(OpenAiVisionClient::from_config(&config)?))
        } else {
            None
        };

        Ok(Self {
            vision,
            telemetry: Telemetry::new(&config.mqtt_topic_prefix, options.camera_id),
            announcer: Announcer::new(options.speak, options.notify),
            player: Player::new(options.gui),
            catalog: MediaCatalog::new(),
            localized_voice: config.localized_language,
            options,
            accumulate_delay: ACCUMULATE_DELAY,
            cooldown: INFERENCE_COOLDOWN,
        })
    }

    /// Build an app from concrete collaborators, primarily for tests.
    pub fn with_services(services: AppServices, options: WatchOptions) -> Result<Self> {
        if options.lookback < 1 {
            return Err(Error::Config("lookback must be > 0".to_string()));
        }
        Ok(Self {
            vision: services.vision,
            telemetry: services.telemetry,
            announcer: services.announcer,
            player: services.player,
            catalog: MediaCatalog::new(),
            localized_voice: "czech".to_string(),
            options,
            accumulate_delay: ACCUMULATE_DELAY,
            cooldown: INFERENCE_COOLDOWN,
        })
    }

    /// Override the accumulate/cooldown delays (tests run with zero).
    pub fn with_timing(mut self, accumulate_delay: Duration, cooldown: Duration) -> Self {
        self.accumulate_delay = accumulate_delay;
        self.cooldown = cooldown;
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Watching {}", self.options.path.display());
        loop {
            self.tick().await?;
            sleep(SCAN_INTERVAL).await;
        }
    }

    /// One pass of the loop: rescan, then handle every fresh capture.
    pub async fn tick(&mut self) -> Result<()> {
        let found = self.catalog.scan(&self.options.path)?;
        if found > 0 {
            debug!("{} new files cataloged", found);
        }

        self.telemetry.publish("loop", "1").await;

        let latest = self.catalog.latest(self.options.lookback);
        let fresh = self.catalog.unseen(&latest);
        if fresh.is_empty() {
            return Ok(());
        }

        if self.vision.is_some() {
            debug!("sleeping to accumulate more images");
            sleep(self.accumulate_delay).await;
        }

        let latest_images = self.catalog.latest_images(CATALOG_TAIL);

        for path in fresh {
            self.catalog.mark_seen(&path);
            info!("File: {}", path.display());

            self.announcer.notify("Playing", &path.display().to_string());
            self.player.play(&path).await;
            self.telemetry.publish("motion", "1").await;

            let mut indicated = false;
            let mut inference_used = false;

            // Only the newest image triggers inference; earlier frames ride
            // along as context in the reel.
            if let Some(vision) = &self.vision {
                if latest_images.last() == Some(&path) {
                    inference_used = true;
                    let reel = select_reel(&latest_images);
                    debug!("reel: {:?}", reel);
                    let report = vision.analyze(&reel, &self.options.prompt).await;
                    indicated = self.handle_report(&report).await;
                }
            }

            if !indicated {
                self.announcer.say("motion!").await;
            }

            if inference_used {
                info!("cooling down after inference");
                sleep(self.cooldown).await;
            }
        }

        Ok(())
    }

    /// Announce and publish one inference outcome. Returns whether the
    /// result itself was announced, which suppresses the generic motion call.
    async fn handle_report(&self, report: &InferenceReport) -> bool {
        for failure in &report.failures {
            error!("{} failure: {}", failure.stage, failure.message);
        }

        let Some(analysis) = &report.analysis else {
            self.announcer.say("inference error!").await;
            return false;
        };

        debug!("emergency: {:?}", analysis.emergency);
        let mut indicated = false;

        self.telemetry
            .publish(
                "vision/emergency",
                if analysis.emergency.is_emergency() { "1" } else { "0" },
            )
            .await;

        if analysis.emergency.is_emergency() {
            self.telemetry
                .publish("vision/description", &analysis.image_contents)
                .await;
            indicated = true;
        }

        self.announcer
            .say(&format!("Emergency: {}", analysis.emergency))
            .await;
        if self.options.localization {
            self.announcer
                .say_in_voice(
                    &self.localized_voice,
                    &format!("Popis: {}", analysis.image_contents_localized),
                )
                .await;
        } else {
            self.announcer
                .say(&format!("Description: {}", analysis.image_contents))
                .await;
        }
        if let Some(explanation) = &analysis.explanation {
            self.announcer
                .say(&format!("Explanation: {}", explanation))
                .await;
        }

        indicated
    }
}

/// Pick a short context reel out of the ordered image tail: a few older
/// frames when available, newest frame always last.
pub fn select_reel(latest_images: &[PathBuf]) -> Vec<PathBuf> {
    let mut reel = Vec::new();
    let n = latest_images.len();
    if n > 9 {
        reel.push(latest_images[n - 9].clone());
    }
    if n > 5 {
        reel.push(latest_images[n - 5].clone());
    } else if n > 2 {
        reel.push(latest_images[n - 2].clone());
    }
    if let Some(last) = latest_images.last() {
        reel.push(last.clone());
    }
    reel
}
