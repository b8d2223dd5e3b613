//! Interrupt handling for batch runs

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fires once on SIGINT (and SIGTERM on Unix)
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled when a shutdown signal arrives
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Install the signal listeners
    pub fn setup(&self) -> Result<(), std::io::Error> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let token = self.token.clone();
            tokio::spawn(async move {
                if sigterm.recv().await.is_some() {
                    info!("received SIGTERM");
                    token.cancel();
                }
            });
        }

        let token = self.token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received interrupt");
                token.cancel();
            }
        });

        Ok(())
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
