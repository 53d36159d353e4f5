use anyhow::Result;
use clap::Parser;
use homewatch::app::{App, WatchOptions};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "homewatch")]
#[command(about = "Motion-triggered home monitoring loop")]
struct CliArgs {
    /// Directory of captured images and clips to watch.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// How many of the newest files each pass considers.
    #[arg(long, default_value_t = 5)]
    lookback: usize,

    /// Analyze new frames with the remote vision model.
    #[arg(long)]
    vision: bool,

    /// Extra text appended to the vision instruction.
    #[arg(long, default_value = "")]
    prompt: String,

    /// Camera identifier used in telemetry topics.
    #[arg(long, default_value_t = 0)]
    camera_id: u32,

    /// Speak descriptions in the configured localized voice.
    #[arg(long)]
    localization: bool,

    /// Disable spoken announcements.
    #[arg(long)]
    no_speak: bool,

    /// Disable media playback.
    #[arg(long)]
    no_gui: bool,

    /// Disable desktop notifications.
    #[arg(long)]
    no_notify: bool,
}

impl CliArgs {
    fn into_options(self) -> WatchOptions {
        WatchOptions {
            path: self.path,
            lookback: self.lookback,
            speak: !self.no_speak,
            prompt: self.prompt,
            vision: self.vision,
            camera_id: self.camera_id,
            localization: self.localization,
            gui: !self.no_gui,
            notify: !self.no_notify,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homewatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting homewatch");

    let args = CliArgs::parse();

    match App::new(args.into_options()) {
        Ok(mut app) => {
            if let Err(e) = app.run().await {
                error!("Watch loop failed: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
