mod loader;
mod loop_worker;
mod reconciler;

pub use loader::SessionLoader;
pub use reconciler::ElapsedReconciler;

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::audio::SnapEngineHandle;
use crate::models::SessionBoard;
use crate::settings::SettingsStore;

/// Owns the polling task for the session/status files.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Spawn the polling loop. Returns the receiving side of the board
    /// snapshot channel for the presentation layer.
    pub fn start(
        &mut self,
        loader: SessionLoader,
        settings: Arc<SettingsStore>,
        engine: SnapEngineHandle,
    ) -> Result<watch::Receiver<SessionBoard>> {
        if self.handle.is_some() {
            bail!("monitor already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let (board_tx, board_rx) = watch::channel(SessionBoard::default());

        let handle = tokio::spawn(loop_worker::monitor_loop(
            loader, settings, engine, board_tx, token_clone,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(board_rx)
    }

    /// Cancel the loop and wait for it to finish. Safe to call repeatedly.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("monitor task failed to join")?;
        }
        Ok(())
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
