//! Termination Handling
//!
//! A `Termination` token is the one cancellation signal every wait site in the
//! game races against. Tokens form a tree: a child fires when it is requested
//! directly or when any ancestor fires, so the orchestrator can stop agents one
//! at a time while an external request still reaches everyone at once.

use futures::future::select_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Why termination was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The environment asked the game to stop (Ctrl-C, window closed)
    External,
    /// The game ended on its own and is winding down its participants
    GameOver,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::External => write!(f, "external"),
            TerminationReason::GameOver => write!(f, "game_over"),
        }
    }
}

struct Signal {
    requested: AtomicBool,
    reason: watch::Sender<Option<TerminationReason>>,
}

impl Signal {
    fn new() -> Arc<Self> {
        let (reason, _) = watch::channel(None);
        Arc::new(Self {
            requested: AtomicBool::new(false),
            reason,
        })
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    async fn fired(&self) {
        let mut rx = self.reason.subscribe();
        // The sender lives as long as `self`, so this only errs if it is dropped mid-wait
        let _ = rx.wait_for(|reason| reason.is_some()).await;
    }
}

/// Clonable cancellation token
#[derive(Clone)]
pub struct Termination {
    own: Arc<Signal>,
    ancestors: Vec<Arc<Signal>>,
}

impl Termination {
    /// Create a new root token
    pub fn new() -> Self {
        Self {
            own: Signal::new(),
            ancestors: Vec::new(),
        }
    }

    /// Derive a token that also fires when `self` fires
    pub fn child(&self) -> Self {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(self.own.clone());
        ancestors.extend(self.ancestors.iter().cloned());
        Self {
            own: Signal::new(),
            ancestors,
        }
    }

    /// Request termination with the given reason; later requests are ignored
    pub fn request(&self, reason: TerminationReason) {
        if self.own.requested.swap(true, Ordering::SeqCst) {
            debug!(%reason, "termination already requested, ignoring duplicate");
            return;
        }

        match reason {
            TerminationReason::External => info!(%reason, "termination requested"),
            TerminationReason::GameOver => debug!(%reason, "termination requested"),
        }
        self.own.reason.send_replace(Some(reason));
    }

    /// Has this token or any ancestor been requested?
    pub fn is_requested(&self) -> bool {
        self.own.is_requested() || self.ancestors.iter().any(|s| s.is_requested())
    }

    /// The reason this token fired, nearest signal first
    pub fn reason(&self) -> Option<TerminationReason> {
        std::iter::once(&self.own)
            .chain(self.ancestors.iter())
            .find_map(|s| *s.reason.borrow())
    }

    /// Resolve once this token or any ancestor has been requested
    pub async fn cancelled(&self) {
        if self.is_requested() {
            return;
        }

        match self.ancestors.as_slice() {
            [] => self.own.fired().await,
            ancestors => {
                let waits = std::iter::once(&self.own)
                    .chain(ancestors.iter())
                    .map(|s| Box::pin(s.fired()));
                // First signal in the chain to fire wins
                select_all(waits).await;
            }
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("requested", &self.is_requested())
            .field("depth", &self.ancestors.len())
            .finish()
    }
}

/// Request external termination of `termination` on Ctrl-C / SIGTERM
pub async fn install_signal_handlers(termination: Termination) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
        _ = termination.cancelled() => return,
    }
    termination.request(TerminationReason::External);
}
