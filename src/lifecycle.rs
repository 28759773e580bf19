//! Process Lifecycle
//!
//! Maps OS termination signals to cooperative cancellation. Cancellation is
//! observed at the scheduler's select boundary; it stops scheduling new work
//! but never aborts a sweep already in flight.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Owns the root cancellation token for the process.
#[derive(Debug, Default)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child token for a loop or task to observe.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Request shutdown from within the process.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn the signal listener: SIGHUP, SIGINT, SIGTERM or SIGQUIT cancels
    /// the root token.
    pub fn spawn_signal_handler(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            let name = wait_for_signal().await;
            info!("Received signal [{}]. Exit.", name);
            token.cancel();
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => return signal_setup_failed(e),
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => return signal_setup_failed(e),
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => return signal_setup_failed(e),
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(s) => s,
        Err(e) => return signal_setup_failed(e),
    };

    tokio::select! {
        _ = hangup.recv() => "SIGHUP",
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    }
}

#[cfg(unix)]
fn signal_setup_failed(e: std::io::Error) -> &'static str {
    error!("Failed to install signal handler: {}", e);
    "signal setup failure"
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
    }
    "ctrl-c"
}
