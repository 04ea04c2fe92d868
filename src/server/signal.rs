// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGUSR1: Reopen log files

use std::sync::Arc;

use crate::config::AppState;
use crate::logger;

/// Start signal handlers (Unix only)
///
/// | Signal  | Action                  |
/// |---------|-------------------------|
/// | SIGTERM | Graceful stop           |
/// | SIGINT  | Graceful stop           |
/// | SIGUSR1 | Reopen log files        |
#[cfg(unix)]
pub fn start_signal_handler(state: Arc<AppState>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let signals = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::user_defined1()),
        );
        let (Ok(mut sigterm), Ok(mut sigint), Ok(mut sigusr1)) = signals else {
            logger::log_error("Failed to register signal handlers; signals will be ignored");
            return;
        };

        logger::log_debug(&format!(
            "[SIGNAL] Handlers registered for process {}",
            std::process::id()
        ));

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    logger::log_warning("[SIGNAL] SIGTERM received, shutting down");
                    state.request_shutdown();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_warning("[SIGNAL] SIGINT received, shutting down");
                    state.request_shutdown();
                    break;
                }

                _ = sigusr1.recv() => {
                    if let Err(e) = logger::reopen(&state.config) {
                        logger::log_error(&format!("[SIGNAL] Failed to reopen log files: {e}"));
                    }
                }
            }
        }
    });
}

/// Non-unix fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(state: Arc<AppState>) {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_warning("[SIGNAL] Ctrl+C received, shutting down");
            state.request_shutdown();
        }
    });
}
