//! Background retention sweep
//!
//! Runs [`SignalingMailbox::sweep`] on a fixed interval: never-joined
//! sessions whose window passed become Expired, and terminal sessions past
//! the retention window are purged together with their messages. The sweep
//! is a background concern, not part of any request contract.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::mailbox::SignalingMailbox;

/// Periodic retention sweep over a mailbox
pub struct RetentionSweeper {
    mailbox: Arc<SignalingMailbox>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl RetentionSweeper {
    /// Create a sweeper over `mailbox` firing every `interval`
    pub fn new(mailbox: Arc<SignalingMailbox>, interval: Duration) -> Self {
        Self {
            mailbox,
            interval,
            handle: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Start the sweep task; starting twice is a no-op
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        let mailbox = self.mailbox.clone();
        let interval = self.interval;
        *self.shutdown_tx.lock().await = Some(tx);
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = mailbox.sweep(chrono::Utc::now());
                        if report.expired > 0 || report.ended > 0 || report.purged > 0 {
                            info!(expired = report.expired, ended = report.ended,
                                  purged = report.purged, "Sweep pass");
                        } else {
                            debug!("Sweep pass, nothing to do");
                        }
                    }
                    _ = rx.changed() => {
                        debug!("Retention sweeper stopping");
                        break;
                    }
                }
            }
        }));
    }

    /// Stop the sweep task; safe to call multiple times
    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}
