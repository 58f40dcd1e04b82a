// THEORY:
// The `sync` module ties the engine together into the running product: a
// controller that owns one background capture loop at a time.
//
// Key architectural principles:
// 1.  **Paced sends**: After every bulb response the loop sleeps the full update
//     interval before capturing again. A slow or retried request stretches the
//     cycle instead of shortening the next gap, so the bulb always gets its quiet
//     time between commands.
// 2.  **Live settings**: Mode, brightness, smoothing, vibrancy and capture region
//     live in a `watch` channel. The loop reads the latest value at the top of
//     every tick, so a change applies to the very next frame.
// 3.  **Observable**: The lifecycle (`SyncStatus`) is published on a `watch`
//     channel and every processed frame (`FrameColor`) on a `broadcast` bus, for
//     whatever front end is attached.
// 4.  **Fail whole**: Any error inside the loop ends it. The error is published as
//     `SyncStatus::Failed` and the controller returns to a startable state.
// 5.  **Injectable edges**: Screen and bulb are reached through `FrameSource` and
//     `LightConnector`, so the loop runs unchanged against fakes in tests.
// 6.  **Persistent memory**: The `ColorPipeline` is handed back to the controller
//     when a run ends. A restart therefore blends from the last color the
//     previous run produced.

use crate::bulb::{Light, Pilot, WizLight};
use crate::capture::{FrameSource, Region, ScreenCapturer};
use crate::config::SyncConfig;
use crate::core_modules::color_selector::ColorMode;
use crate::error::{AmbientError, Result};
use crate::pipeline::{ColorPipeline, FrameColor, FrameSettings, PipelineConfig};
use async_trait::async_trait;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, spawn_blocking};
use tokio::time::sleep;

const PREVIEW_BUS_CAPACITY: usize = 16;

/// Everything the user may change while a sync is running.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncSettings {
    pub frame: FrameSettings,
    pub region: Option<Region>,
}

/// Lifecycle of the capture loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Starting,
    Connecting(IpAddr),
    Syncing,
    Stopping,
    Stopped,
    Failed(String),
}

impl SyncStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncStatus::Starting | SyncStatus::Connecting(_) | SyncStatus::Syncing | SyncStatus::Stopping
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str("Ready"),
            SyncStatus::Starting => f.write_str("Starting..."),
            SyncStatus::Connecting(ip) => write!(f, "Connecting to {ip}..."),
            SyncStatus::Syncing => f.write_str("Connected! Syncing..."),
            SyncStatus::Stopping => f.write_str("Stopping..."),
            SyncStatus::Stopped => f.write_str("Stopped."),
            SyncStatus::Failed(message) => write!(f, "Error: {message}"),
        }
    }
}

/// Opens a `Light` for a bulb address.
#[async_trait]
pub trait LightConnector: Send + Sync + 'static {
    type Light: Light + 'static;

    async fn connect(&self, ip: IpAddr) -> Result<Self::Light>;
}

/// Connects real WiZ bulbs over UDP.
#[derive(Debug, Clone)]
pub struct WizConnector {
    pub port: u16,
    pub response_timeout: Duration,
    pub max_attempts: u32,
}

impl WizConnector {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            port: crate::bulb::WIZ_PORT,
            response_timeout: config.response_timeout,
            max_attempts: config.max_attempts,
        }
    }
}

#[async_trait]
impl LightConnector for WizConnector {
    type Light = WizLight;

    async fn connect(&self, ip: IpAddr) -> Result<WizLight> {
        WizLight::with_options(SocketAddr::new(ip, self.port), self.response_timeout, self.max_attempts).await
    }
}

/// Channels shared between the controller and its running loop.
struct Shared {
    running: AtomicBool,
    status_tx: watch::Sender<SyncStatus>,
    preview_tx: broadcast::Sender<FrameColor>,
    /// Parked between runs; taken by `start`, returned when the run ends.
    pipeline: Mutex<Option<ColorPipeline>>,
}

impl Shared {
    fn publish(&self, status: SyncStatus) {
        tracing::info!(status = %status, "Sync status changed");
        self.status_tx.send_replace(status);
    }

    fn take_pipeline(&self) -> Option<ColorPipeline> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn park_pipeline(&self, pipeline: ColorPipeline) {
        *self.pipeline.lock().unwrap_or_else(PoisonError::into_inner) = Some(pipeline);
    }
}

/// Starts, stops and steers the capture loop.
pub struct SyncController<C, F> {
    connector: Arc<C>,
    source_factory: Arc<F>,
    pipeline_config: PipelineConfig,
    update_interval: Duration,
    settings_tx: watch::Sender<SyncSettings>,
    shared: Arc<Shared>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl SyncController<WizConnector, fn() -> ScreenCapturer> {
    /// A controller that captures the real screen and drives a real bulb.
    pub fn for_screen(config: &SyncConfig) -> Self {
        SyncController::new(
            config,
            WizConnector::from_config(config),
            ScreenCapturer::new as fn() -> ScreenCapturer,
        )
    }
}

impl<C, F, S> SyncController<C, F>
where
    C: LightConnector,
    F: Fn() -> S + Send + Sync + 'static,
    S: FrameSource + 'static,
{
    pub fn new(config: &SyncConfig, connector: C, source_factory: F) -> Self {
        let (settings_tx, _) = watch::channel(SyncSettings {
            frame: config.frame_settings(),
            region: config.region,
        });
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        let (preview_tx, _) = broadcast::channel(PREVIEW_BUS_CAPACITY);

        Self {
            connector: Arc::new(connector),
            source_factory: Arc::new(source_factory),
            pipeline_config: config.pipeline.clone(),
            update_interval: config.update_interval,
            settings_tx,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                status_tx,
                preview_tx,
                pipeline: Mutex::new(Some(ColorPipeline::new(config.pipeline.clone()))),
            }),
            stop_tx: None,
            task: None,
        }
    }

    /// Launches the loop against the bulb at `ip`. Returns false if one is already running.
    pub fn start(&mut self, ip: IpAddr) -> bool {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Start ignored, sync already running");
            return false;
        }
        self.shared.publish(SyncStatus::Starting);

        // Only missing if a previous run panicked.
        let pipeline = self
            .shared
            .take_pipeline()
            .unwrap_or_else(|| ColorPipeline::new(self.pipeline_config.clone()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let run = SyncRun {
            ip,
            connector: self.connector.clone(),
            source_factory: self.source_factory.clone(),
            pipeline,
            update_interval: self.update_interval,
            settings_rx: self.settings_tx.subscribe(),
            stop_rx,
            shared: self.shared.clone(),
        };

        self.stop_tx = Some(stop_tx);
        self.task = Some(tokio::spawn(run.execute()));
        true
    }

    /// Asks the running loop to turn the bulb off and exit.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.shared.publish(SyncStatus::Stopping);
        if let Some(stop_tx) = self.stop_tx.take() {
            stop_tx.send_replace(true);
        }
    }

    /// Stops the loop and waits until it has finished.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sync task panicked");
                self.shared.running.store(false, Ordering::SeqCst);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.shared.status_tx.subscribe()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.shared.status_tx.borrow().clone()
    }

    pub fn subscribe_previews(&self) -> broadcast::Receiver<FrameColor> {
        self.shared.preview_tx.subscribe()
    }

    pub fn settings(&self) -> SyncSettings {
        *self.settings_tx.borrow()
    }

    pub fn set_mode(&self, mode: ColorMode) {
        self.settings_tx.send_modify(|s| s.frame.mode = mode);
    }

    pub fn set_brightness(&self, scale: f64) {
        self.settings_tx
            .send_modify(|s| s.frame.brightness_scale = scale.clamp(0.0, 1.0));
    }

    pub fn set_smoothing(&self, enabled: bool) {
        self.settings_tx.send_modify(|s| s.frame.smoothing = enabled);
    }

    pub fn set_vibrant(&self, enabled: bool) {
        self.settings_tx.send_modify(|s| s.frame.vibrant = enabled);
    }

    pub fn set_region(&self, region: Option<Region>) {
        self.settings_tx.send_modify(|s| s.region = region);
    }

    pub fn reset_region(&self) {
        self.set_region(None);
    }
}

/// One execution of the capture loop, moved into its own task.
struct SyncRun<C, F> {
    ip: IpAddr,
    connector: Arc<C>,
    source_factory: Arc<F>,
    pipeline: ColorPipeline,
    update_interval: Duration,
    settings_rx: watch::Receiver<SyncSettings>,
    stop_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

impl<C, F, S> SyncRun<C, F>
where
    C: LightConnector,
    F: Fn() -> S + Send + Sync + 'static,
    S: FrameSource + 'static,
{
    async fn execute(mut self) {
        let shared = self.shared.clone();
        let outcome = self.run().await;
        shared.park_pipeline(self.pipeline);
        shared.running.store(false, Ordering::SeqCst);
        match outcome {
            Ok(frames) => {
                tracing::info!(frames, "Sync loop finished");
                shared.publish(SyncStatus::Stopped);
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync loop failed");
                shared.publish(SyncStatus::Failed(e.to_string()));
            }
        }
    }

    async fn run(&mut self) -> Result<u64> {
        // --- 1. Connect ---
        self.shared.publish(SyncStatus::Connecting(self.ip));
        let light = self.connector.connect(self.ip).await?;
        self.shared.publish(SyncStatus::Syncing);

        let mut source = (self.source_factory)();
        let mut frames = 0u64;

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            // --- 2. Capture & Process ---
            let settings = *self.settings_rx.borrow_and_update();
            let (returned, frame) = spawn_blocking(move || {
                let frame = source.grab(settings.region);
                (source, frame)
            })
            .await
            .map_err(|e| AmbientError::Capture {
                message: format!("capture task failed: {e}"),
                source: None,
            })?;
            source = returned;
            let color = self.pipeline.process_frame(&frame?, &settings.frame)?;
            tracing::debug!(
                selected = %color.selected,
                output = %color.output,
                brightness = color.brightness,
                "Frame processed"
            );

            // --- 3. Preview & Send ---
            let _ = self.shared.preview_tx.send(color.clone());
            let pilot = Pilot::new()
                .rgb(color.output)
                .brightness(color.brightness)
                .speed(color.speed_ms);
            light.turn_on(&pilot).await?;
            frames += 1;

            // --- 4. Quiet Gap ---
            tokio::select! {
                biased;
                _ = self.stop_rx.changed() => break,
                _ = sleep(self.update_interval) => {}
            }
        }

        // --- 5. Switch Off ---
        light.turn_off().await?;
        Ok(frames)
    }
}
