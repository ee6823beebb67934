//! Waits for either Ctrl-C or `SIGTERM`, whichever arrives first — the
//! two signals a process manager (systemd, Kubernetes) or an interactive
//! shell realistically sends to ask a service to stop.

/// Resolves once an interrupt or terminate signal is received, or
/// immediately if installing the `SIGTERM` handler fails (in which case
/// only Ctrl-C is honored).
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; only Ctrl-C will trigger shutdown");
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
