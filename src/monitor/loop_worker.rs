use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::SnapEngineHandle;
use crate::models::SessionBoard;
use crate::settings::SettingsStore;

use super::loader::SessionLoader;
use super::reconciler::ElapsedReconciler;

const POLL_INTERVAL_SECS: u64 = 1;

/// Polling loop for the session/status files. File I/O is fine here; this
/// runs well away from the audio callback.
pub async fn monitor_loop(
    loader: SessionLoader,
    settings: Arc<SettingsStore>,
    engine: SnapEngineHandle,
    board_tx: watch::Sender<SessionBoard>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut reconciler = ElapsedReconciler::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // External writers may flip the flag at any time; a failed
                // reload keeps the last good settings.
                if let Err(err) = settings.reload() {
                    warn!("settings reload failed: {err:#}");
                }
                if let Err(err) = engine.set_enabled(settings.detector_enabled()) {
                    warn!("snap engine unreachable: {err:#}");
                }

                let now = Utc::now();
                let status = loader.load_status();
                let records = loader.load_active(now);
                let sessions = reconciler.reconcile(records, now);

                // Receivers see either the previous board or this one in
                // full, never a partial write.
                let _ = board_tx.send(SessionBoard {
                    status,
                    sessions,
                    generated_at: Some(now),
                });
            }
            _ = cancel_token.cancelled() => {
                info!("monitor loop shutting down");
                break;
            }
        }
    }
}
