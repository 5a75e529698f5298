//! Play gate: the broadcast signal that says whether agents may touch the board

use tokio::sync::watch;

/// Shared play-enabled flag with broadcast wake-up
///
/// Every waiter in [`PlayGate::await_open`] is released when the gate opens,
/// and re-checks the flag after any [`PlayGate::wake`], so a spurious wake
/// never lets an agent through a closed gate.
#[derive(Debug)]
pub struct PlayGate {
    tx: watch::Sender<bool>,
}

impl PlayGate {
    pub fn new(open: bool) -> Self {
        let (tx, _) = watch::channel(open);
        Self { tx }
    }

    /// Open the gate; returns whether it was already open
    pub fn open(&self) -> bool {
        self.tx.send_replace(true)
    }

    /// Close the gate; returns whether it was open
    pub fn close(&self) -> bool {
        self.tx.send_replace(false)
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Nudge every waiter to re-check the gate
    pub fn wake(&self) {
        self.tx.send_modify(|_| {});
    }

    /// Resolve once the gate is open (immediately if it already is)
    pub async fn await_open(&self) {
        let mut rx = self.tx.subscribe();
        // Sender is owned by self, so the channel cannot close while we wait
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_open_close_report_previous() {
        let gate = PlayGate::new(false);
        assert!(!gate.is_open());
        assert!(!gate.open());
        assert!(gate.is_open());
        assert!(gate.close());
        assert!(!gate.close());
    }

    #[test]
    fn test_wake_does_not_release_closed_gate() {
        let gate = PlayGate::new(false);
        let mut waiter = task::spawn(gate.await_open());
        assert_pending!(waiter.poll());

        gate.wake();
        assert!(waiter.is_woken());
        assert_pending!(waiter.poll());

        gate.open();
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_open_releases_every_waiter() {
        let gate = PlayGate::new(false);
        let mut first = task::spawn(gate.await_open());
        let mut second = task::spawn(gate.await_open());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        gate.open();
        assert_ready!(first.poll());
        assert_ready!(second.poll());
    }
}
