//! Graceful shutdown coordination.
//!
//! A [`ShutdownHandle`] is shared between the accept loop, the OS signal
//! watcher and the embedding application. Triggering it stops new
//! connections from being accepted; the event loop itself stops once the
//! grace period has elapsed.
//!
//! # Example
//!
//! ```rust
//! use fathom_server::ShutdownHandle;
//!
//! let shutdown = ShutdownHandle::new();
//! let observer = shutdown.clone();
//!
//! shutdown.trigger();
//! assert!(observer.is_shutting_down());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fathom_telemetry::fields;
use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable handle used to request and observe shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Creates a handle in the running state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests shutdown. Later calls have no effect.
    pub fn trigger(&self) {
        self.sender.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        });
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes when shutdown is requested, immediately if it already was.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Triggers `handle` on SIGINT or SIGTERM (Ctrl+C elsewhere).
///
/// If the handlers cannot be installed a warning is logged and the server
/// simply runs until shut down programmatically.
pub(crate) async fn watch_os_signals(handle: ShutdownHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(err), _) | (_, Err(err)) => {
                    warn!({ fields::ERROR } = %err, "Failed to install signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!(signal = "SIGTERM", "Received shutdown signal"),
            _ = sigint.recv() => info!(signal = "SIGINT", "Received shutdown signal"),
            () = handle.wait() => return,
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!({ fields::ERROR } = %err, "Failed to listen for Ctrl+C");
                    return;
                }
                info!(signal = "ctrl_c", "Received shutdown signal");
            }
            () = handle.wait() => return,
        }
    }

    handle.trigger();
}

/// Counts open connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    active: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection until the returned guard is dropped.
    #[must_use]
    pub fn open(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active: Arc::clone(&self.active),
        }
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Keeps a connection counted while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
