pub mod detector;
pub mod gesture;

use detector::{DetectorConfig, SnapDetector};
use gesture::{GestureAggregator, GestureConfig, GestureMode, GestureSignal};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use log::{error, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

enum EngineCommand {
    Start,
    Stop,
    SetMode(GestureMode),
}

/// Handle to the dedicated capture thread.
///
/// The cpal stream is not `Send`, so a single `snap-engine` thread owns it
/// and services commands from this handle. Confirmed gesture signals are
/// pushed to the sender given at construction; the audio callback never
/// waits on the receiving side.
#[derive(Clone)]
pub struct SnapEngineHandle {
    tx: Arc<Mutex<Option<Sender<EngineCommand>>>>,
    signal_tx: Sender<GestureSignal>,
}

impl SnapEngineHandle {
    pub fn new(signal_tx: Sender<GestureSignal>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            signal_tx,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<EngineCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|err| anyhow!("engine command channel poisoned: {err}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<EngineCommand>();
        let signal_tx = self.signal_tx.clone();

        // Dedicated thread holding the non-Send capture stream.
        thread::Builder::new()
            .name("snap-engine".to_string())
            .spawn(move || engine_thread(rx, signal_tx))
            .context("failed to spawn snap-engine thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Open the capture device and start classifying. A no-op when already
    /// running; refused for the rest of the process after a fatal capture
    /// failure.
    pub fn start(&self) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(EngineCommand::Start)
            .map_err(|err| anyhow!("snap-engine thread gone: {err}"))
    }

    /// Stop capture and release the device. Safe to call repeatedly, and
    /// before the engine thread ever existed.
    pub fn stop(&self) -> Result<()> {
        if let Ok(Some(tx)) = self.tx.lock().map(|guard| guard.clone()) {
            let _ = tx.send(EngineCommand::Stop);
        }
        Ok(())
    }

    /// Switch the aggregator's classification policy. Takes effect between
    /// buffers; any pending unpaired snap is discarded.
    pub fn set_mode(&self, mode: GestureMode) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(EngineCommand::SetMode(mode))
            .map_err(|err| anyhow!("snap-engine thread gone: {err}"))
    }

    /// Align the running state with the persisted enabled flag.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.start()
        } else {
            self.stop()
        }
    }
}

fn engine_thread(rx: Receiver<EngineCommand>, signal_tx: Sender<GestureSignal>) {
    let aggregator = Arc::new(Mutex::new(GestureAggregator::new(GestureConfig::default())));
    let mut stream: Option<cpal::Stream> = None;
    let mut capture_failed = false;

    while let Ok(command) = rx.recv() {
        match command {
            EngineCommand::Start => {
                if stream.is_some() || capture_failed {
                    continue;
                }
                match build_capture_stream(Arc::clone(&aggregator), signal_tx.clone()) {
                    Ok(new_stream) => {
                        info!("snap capture started");
                        stream = Some(new_stream);
                    }
                    Err(err) => {
                        // Fatal for the audio path: reported once, no retry.
                        // Restart is an operator action.
                        error!("snap capture unavailable: {err:#}");
                        capture_failed = true;
                    }
                }
            }
            EngineCommand::Stop => {
                if stream.take().is_some() {
                    info!("snap capture stopped");
                }
            }
            EngineCommand::SetMode(mode) => {
                if let Ok(mut agg) = aggregator.lock() {
                    if agg.mode() != mode {
                        info!("gesture mode -> {mode:?}");
                        agg.set_mode(mode);
                    }
                }
            }
        }
    }
    // Handle dropped: the stream (if any) is released with the thread.
}

fn build_capture_stream(
    aggregator: Arc<Mutex<GestureAggregator>>,
    signal_tx: Sender<GestureSignal>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no default input device"))?;
    let default_config = device
        .default_input_config()
        .context("no supported input configuration")?;

    if default_config.sample_rate().0 == 0 {
        return Err(anyhow!("input device reports a zero sample rate"));
    }

    info!(
        "capturing from {} at {} Hz ({} ch)",
        device.name().unwrap_or_else(|_| "unknown device".to_string()),
        default_config.sample_rate().0,
        default_config.channels()
    );

    let stream = match default_config.sample_format() {
        SampleFormat::F32 => {
            build_stream::<f32>(&device, &default_config.into(), aggregator, signal_tx)?
        }
        SampleFormat::I16 => {
            build_stream::<i16>(&device, &default_config.into(), aggregator, signal_tx)?
        }
        SampleFormat::U16 => {
            build_stream::<u16>(&device, &default_config.into(), aggregator, signal_tx)?
        }
        other => return Err(anyhow!("unsupported sample format {other:?}")),
    };

    stream.play().context("failed to start capture stream")?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    aggregator: Arc<Mutex<GestureAggregator>>,
    signal_tx: Sender<GestureSignal>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut detector = SnapDetector::new(DetectorConfig::default());
    // Scratch buffer reused across callbacks.
    let mut samples: Vec<f32> = Vec::new();

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                samples.clear();
                for &sample in data {
                    let value: f32 = cpal::Sample::from_sample(sample);
                    samples.push(value);
                }

                if let Some(event) = detector.classify(&samples) {
                    // Critical section spans a single buffer; mode switches
                    // from the control thread interleave between buffers.
                    let signal = aggregator
                        .lock()
                        .ok()
                        .and_then(|mut agg| agg.on_snap(event));
                    if let Some(signal) = signal {
                        let _ = signal_tx.send(signal);
                    }
                }
            },
            move |err| {
                warn!("capture stream error: {err}");
            },
            None,
        )
        .context("failed to open capture stream")?;

    Ok(stream)
}
