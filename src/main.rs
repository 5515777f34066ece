//! # Synth Bridge
//!
//! Turn a gamepad into an expressive synthesizer control surface.
//!
//! This binary reads controller frames as JSON lines from stdin, runs them
//! through the gesture core and the motion analysis engine at a fixed tick
//! rate, and logs the resulting events and analysis snapshots.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (falling back to defaults)
//!    - Build the controller and analysis engine, wire demo gestures
//!
//! 2. **Main Loop**
//!    - Apply the latest frame once per tick at the configured rate
//!    - Log an analysis snapshot on the configured interval
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Input Format
//!
//! One JSON object per line, fields matching [`InputSample`]; missing fields
//! default to released/centered:
//!
//! ```text
//! {"btn_a": true, "left_x": 0.42}
//! {"dpad_y": 1}
//! ```

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use synth_bridge::analysis::AnalysisEngine;
use synth_bridge::config::Config;
use synth_bridge::input::{ButtonId, Controller, InputSample};

/// Default configuration file location.
const CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Synth Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH).context("loading configuration")?;

    let mut controller = Controller::new(&config);
    let mut analysis = AnalysisEngine::new(&config);
    wire_demo_gestures(&mut controller)?;

    let (sample_tx, sample_rx) = watch::channel(InputSample::default());
    tokio::spawn(read_samples(sample_tx));

    let period = Duration::from_millis(1000 / u64::from(config.timing.fps).max(1));
    let mut tick_interval = interval(period);
    let snapshot_interval = u64::from(config.analysis.snapshot_interval_ticks);

    info!("Sampling at {}Hz. Press Ctrl+C to exit", config.timing.fps);

    let mut tick_count: u64 = 0;
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let sample = *sample_rx.borrow();
                controller.apply_sample(&sample);
                analysis.tick(&sample);

                tick_count += 1;
                if tick_count % snapshot_interval == 0 {
                    log_snapshot(&analysis, tick_count)?;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                controller.cancel_pending();
                info!("Processed {} ticks", tick_count);
                break;
            }
        }
    }

    Ok(())
}

/// Forwards stdin JSON lines into the sample channel. Malformed lines are
/// logged and skipped so a glitchy producer cannot take the loop down.
async fn read_samples(tx: watch::Sender<InputSample>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<InputSample>(line) {
                    Ok(sample) => {
                        if tx.send(sample).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Skipping malformed sample: {}", e),
                }
            }
            Ok(None) => {
                debug!("Sample input closed");
                break;
            }
            Err(e) => {
                warn!("Sample input error: {}", e);
                break;
            }
        }
    }
}

/// Registers logging callbacks demonstrating each gesture kind. A real synth
/// frontend would map these to parameter changes instead.
fn wire_demo_gestures(controller: &mut Controller) -> Result<()> {
    for id in ButtonId::ALL {
        let button = controller.button(id);
        button.set_on_press(move || info!("{} pressed", id));
        button.set_on_release(move || info!("{} released", id));
    }

    controller.register_multi_press(ButtonId::A, 2, || info!("A double press"))?;
    controller
        .button(ButtonId::B)
        .set_on_hold(|| info!("B held"), true);
    controller.register_combination(&[ButtonId::Back, ButtonId::Start], || {
        info!("Back+Start chord")
    })?;
    controller
        .dpad()
        .set_callback(|x, y| info!("DPad moved to ({}, {})", x, y));
    Ok(())
}

fn log_snapshot(analysis: &AnalysisEngine, tick_count: u64) -> Result<()> {
    let snapshot = analysis.snapshot();
    let json = serde_json::to_string(&snapshot).context("serializing snapshot")?;
    info!(
        "[{}] tick {}: {}",
        chrono::Utc::now().format("%H:%M:%S%.3f"),
        tick_count,
        json
    );
    Ok(())
}
