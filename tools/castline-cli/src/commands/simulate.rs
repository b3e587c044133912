//! Scripted switching on the synthetic platform.
//!
//! Drives a coordinator through the full switching repertoire and prints
//! every engine event as one JSON line.

use std::time::Duration;

use anyhow::Context;
use castline_media_model::{AudioMode, Bandwidth, EngineEvent, PublishMode, StreamConfig};
use castline_platform_synthetic::{Failure, SyntheticPlatform};
use castline_stream_engine::Coordinator;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

const SESSION_ID: &str = "simulated-session";

pub struct Options {
    pub publish_mode: Option<String>,
    pub audio_mode: Option<String>,
    pub step_ms: u64,
    pub deny_display: bool,
}

fn parse_mode<T: DeserializeOwned>(value: &str) -> anyhow::Result<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .with_context(|| format!("unknown mode '{value}'"))
}

pub async fn run(mut config: StreamConfig, options: Options) -> anyhow::Result<()> {
    if let Some(mode) = &options.publish_mode {
        config.publish_mode = parse_mode(mode)?;
    }
    if let Some(mode) = &options.audio_mode {
        config.audio_mode = parse_mode(mode)?;
    }

    let synthetic = SyntheticPlatform::new();
    if options.deny_display {
        synthetic.devices.fail_next_display(Failure::NotAllowed);
    }
    synthetic.senders.open_session(SESSION_ID);

    let mut coordinator = Coordinator::new(config, synthetic.platform())
        .map_err(|e| anyhow::anyhow!("Invalid stream config: {e}"))?;
    let printer = tokio::spawn(print_events(coordinator.subscribe()));
    let step = Duration::from_millis(options.step_ms);

    let started = coordinator.start().await?;
    tracing::info!(mode = ?started, "Started");
    coordinator.bind_session(SESSION_ID).await?;
    tokio::time::sleep(step).await;

    for mode in [
        PublishMode::Screen,
        PublishMode::ScreenAndCamera,
        PublishMode::Camera,
    ] {
        report("publish mode", coordinator.switch_publish_mode(mode).await);
        tokio::time::sleep(step).await;
    }

    report(
        "audio mode",
        coordinator.switch_audio_mode(AudioMode::Microphone).await,
    );
    report("microphone", coordinator.switch_audio_device("mic-0").await);
    report("facing mode", coordinator.flip_camera().await);
    coordinator.set_volume(0.8);

    coordinator.toggle_mute();
    synthetic.meter.set_level(0.4);
    tokio::time::sleep(step * 3).await;
    synthetic.meter.set_level(0.0);
    coordinator.toggle_mute();

    report(
        "bandwidth",
        coordinator.set_bandwidth(Bandwidth::Kbps(800)).await,
    );
    report("bandwidth", coordinator.set_bandwidth(Bandwidth::Unlimited).await);

    report("camera off", coordinator.disable_camera().await);
    tokio::time::sleep(step).await;
    report("camera on", coordinator.enable_camera().await);

    synthetic.devices.remove_device("mic-0");
    report("device change", coordinator.handle_device_change().await);

    coordinator.close();
    drop(coordinator);
    printer.await?;

    let leaked = synthetic.devices.live_tracks().len();
    println!();
    println!("Acquisitions: {}", synthetic.devices.calls().len());
    println!("Audio graphs built: {}", synthetic.audio.contexts_created());
    println!("Canvases created: {}", synthetic.render.canvases().len());
    println!("Tracks still live: {leaked}");
    if leaked > 0 {
        anyhow::bail!("{leaked} tracks were left running");
    }
    Ok(())
}

fn report<T: std::fmt::Debug>(step: &str, result: castline_common::error::CastlineResult<T>) {
    match result {
        Ok(value) => tracing::info!(step, result = ?value, "Step done"),
        Err(e) => tracing::warn!(step, error = %e, "Step failed"),
    }
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Event not serializable"),
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
