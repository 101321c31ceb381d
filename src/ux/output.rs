//! Progress lines and the waiting-dots indicator
//!
//! Human-readable progress goes to stdout; every line is mirrored to the
//! log at `info` so a `RUST_LOG=info` run keeps the full trail.

use std::io::Write;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DOT_INTERVAL: Duration = Duration::from_secs(1);

pub fn print_to_user(message: &str) {
    println!("{}", message);
    log::info!("{}", message);
}

/// Prints a dot every second until stopped. Stopping cancels a token the
/// task selects on, so the task never writes after it has been told to
/// stop.
pub struct WaitIndicator {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WaitIndicator {
    /// Must be called from within a tokio runtime
    pub fn start(label: &str) -> Self {
        print!("{}", label);
        let _ = std::io::stdout().flush();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DOT_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        print!(".");
                        let _ = std::io::stdout().flush();
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the dots and wait for the task to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        println!();
    }
}

impl Drop for WaitIndicator {
    fn drop(&mut self) {
        // Cancelling twice is a no-op.
        self.cancel.cancel();
    }
}
