//! Signal handling for graceful shutdown
//!
//! SIGINT (Unix) and Ctrl-Break (Windows) request a graceful shutdown; a
//! second signal within the grace window terminates immediately.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Listens for interrupt signals and invokes the shutdown callback once.
pub struct SignalHandler {
    requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SignalHandler {
    /// Spawn the listener. `on_shutdown` runs on the first signal; the
    /// second signal exits the process with a non-zero code.
    pub fn start<F, Fut>(on_shutdown: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let requested = Arc::new(AtomicBool::new(false));
        let flag = requested.clone();

        let handle = tokio::spawn(async move {
            loop {
                if wait_for_signal().await.is_err() {
                    warn!("Signal listener unavailable; shutdown on signal disabled");
                    return;
                }
                if flag.swap(true, Ordering::SeqCst) {
                    warn!("Second interrupt received; terminating immediately");
                    std::process::exit(130);
                }
                info!("Interrupt received; requesting graceful shutdown");
                on_shutdown().await;
            }
        });

        Self {
            requested,
            handle: Some(handle),
        }
    }

    /// Whether a shutdown was requested by signal
    pub fn shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Stop listening
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(windows)]
async fn wait_for_signal() -> std::io::Result<()> {
    let mut ctrl_break = tokio::signal::windows::ctrl_break()?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r,
        _ = ctrl_break.recv() => Ok(()),
    }
}
