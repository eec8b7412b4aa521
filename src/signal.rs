//! Shutdown on Ctrl-C or SIGTERM.
//!
//! [`on_shutdown`] registers the handlers up front and returns a future for
//! [`server::serve`](crate::server::serve). The future resolves on the first
//! signal, after running the teardown it was given; the binary passes
//! [`transport::shutdown`](crate::transport::shutdown).
//!
//! On Windows only Ctrl-C is observed.

use std::{fmt, future::Future};

use crate::error::Result;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Signal that stopped the process.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "Ctrl+C",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Returns a future that resolves once the process is asked to stop.
///
/// `teardown` runs when the signal arrives, before the future resolves.
///
/// # Errors
///
/// Returns an error if the SIGTERM handler cannot be registered.
pub fn on_shutdown<F>(teardown: F) -> Result<impl Future<Output = ShutdownSignal> + Send + 'static>
where
    F: FnOnce() + Send + 'static,
{
    #[cfg(unix)]
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        #[cfg(unix)]
        let received = tokio::select! {
            _ = tokio::signal::ctrl_c() => ShutdownSignal::Interrupt,
            _ = terminate.recv() => ShutdownSignal::Terminate,
        };

        #[cfg(not(unix))]
        let received = {
            let _ = tokio::signal::ctrl_c().await;
            ShutdownSignal::Interrupt
        };

        info!("{received} received, shutting down gracefully");
        teardown();
        received
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        process::Command,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn sigterm_runs_teardown() {
        let torn_down = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&torn_down);
        let shutdown = on_shutdown(move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert!(!torn_down.load(Ordering::SeqCst));

        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .unwrap();
        assert_eq!(received, ShutdownSignal::Terminate);
        assert!(torn_down.load(Ordering::SeqCst));
    }
}
