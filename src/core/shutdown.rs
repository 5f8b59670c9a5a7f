//! Process-level shutdown coordination for the host binary
//!
//! Turns termination signals into a single broadcast that the host uses to
//! begin graceful shutdown of its queues. A second signal forces exit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit code used when a second signal forces immediate termination
const FORCED_EXIT_CODE: i32 = 130;

/// Coordinates graceful shutdown across the host application
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
    signal_count: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            signal_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger shutdown
    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Record one received signal; returns true when this is a repeat signal
    fn on_signal(&self) -> bool {
        let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
        self.trigger_shutdown();
        previous >= 1
    }

    /// Install signal listeners on the current tokio runtime
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            // Restore default SIGPIPE so a closed stdout terminates quietly
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            let kinds = [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
                SignalKind::quit(),
            ];

            for kind in kinds {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        log::debug!("Could not listen for signal {:?}", kind);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        if coordinator.on_signal() {
                            log::warn!("Second termination signal received; exiting");
                            std::process::exit(FORCED_EXIT_CODE);
                        }
                        log::info!("Termination signal received; shutting down queues");
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if coordinator.on_signal() {
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            });
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
