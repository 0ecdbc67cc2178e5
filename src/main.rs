use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::{mpsc, Arc};
use std::thread;

use snaphud::audio::gesture::{GestureMode, GestureSignal};
use snaphud::audio::SnapEngineHandle;
use snaphud::monitor::{MonitorController, SessionLoader};
use snaphud::settings::SettingsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("snaphud starting up...");

    let state_dir = dirs::home_dir()
        .context("Could not determine home directory")?
        .join(".cursor");
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    let settings = Arc::new(SettingsStore::new(state_dir.join("snaphud_settings.json"))?);

    let (signal_tx, signal_rx) = mpsc::channel::<GestureSignal>();
    let engine = SnapEngineHandle::new(signal_tx);

    // Stand-in presentation: log gestures and mirror the overlay policy by
    // keeping the aggregator in single-only mode while the overlay is open.
    let engine_for_signals = engine.clone();
    thread::spawn(move || {
        let mut overlay_open = false;
        while let Ok(signal) = signal_rx.recv() {
            match signal {
                GestureSignal::Single(_) => {
                    overlay_open = !overlay_open;
                    info!(
                        "single gesture: overlay {}",
                        if overlay_open { "shown" } else { "hidden" }
                    );
                    let mode = if overlay_open {
                        GestureMode::SingleOnly
                    } else {
                        GestureMode::Normal
                    };
                    if let Err(err) = engine_for_signals.set_mode(mode) {
                        warn!("failed to switch gesture mode: {err:#}");
                    }
                }
                GestureSignal::Double(_) => info!("double gesture"),
            }
        }
    });

    let loader = SessionLoader::new(
        state_dir.join("recursor_status.json"),
        state_dir.join("recursor_state.json"),
    );

    let mut controller = MonitorController::new();
    let mut board_rx = controller.start(loader, Arc::clone(&settings), engine.clone())?;

    // Stand-in presentation for the session list: log when it changes.
    tokio::spawn(async move {
        let mut last_ids: Vec<String> = Vec::new();
        while board_rx.changed().await.is_ok() {
            let board = board_rx.borrow_and_update().clone();
            let ids: Vec<String> = board
                .sessions
                .iter()
                .map(|overview| overview.record.id.clone())
                .collect();
            if ids == last_ids {
                continue;
            }
            info!(
                "{} active session(s), status {}",
                board.sessions.len(),
                board.status.status.as_str()
            );
            for overview in &board.sessions {
                info!(
                    "  {} — {} ({}s elapsed)",
                    overview.record.id, overview.record.title, overview.elapsed_secs
                );
            }
            last_ids = ids;
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    controller.stop().await?;
    engine.stop()?;
    Ok(())
}
