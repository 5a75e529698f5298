//! Pending Claims - bounded FIFO of agents waiting for a verdict

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::domain::AgentId;
use crate::error::{GameError, Result};

/// Claim queue - plain FIFO with submission statistics
#[derive(Debug)]
pub struct ClaimQueue {
    entries: VecDeque<AgentId>,
    /// One slot per agent
    capacity: usize,
    /// Stats: claims ever submitted
    enqueued_count: u64,
    /// Stats: claims handed to the orchestrator
    dequeued_count: u64,
}

impl ClaimQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            enqueued_count: 0,
            dequeued_count: 0,
        }
    }

    /// Append a claim
    ///
    /// # Returns
    /// - `Ok(())` on success
    /// - `Err(reason)` when the queue is full or the agent already has a claim queued
    pub fn enqueue(&mut self, agent: AgentId) -> std::result::Result<(), String> {
        if self.entries.contains(&agent) {
            return Err(format!("{agent} already has an outstanding claim"));
        }
        if self.entries.len() >= self.capacity {
            return Err(format!(
                "claim queue full ({} of {}) when {agent} submitted",
                self.entries.len(),
                self.capacity
            ));
        }

        self.entries.push_back(agent);
        self.enqueued_count += 1;
        Ok(())
    }

    /// Take every queued claim, oldest first
    pub fn drain_all(&mut self) -> Vec<AgentId> {
        let drained: Vec<AgentId> = self.entries.drain(..).collect();
        self.dequeued_count += drained.len() as u64;
        drained
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.entries.contains(&agent)
    }

    pub fn stats(&self) -> ClaimStats {
        ClaimStats {
            current_size: self.entries.len(),
            capacity: self.capacity,
            enqueued_total: self.enqueued_count,
            dequeued_total: self.dequeued_count,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimStats {
    pub current_size: usize,
    pub capacity: usize,
    pub enqueued_total: u64,
    pub dequeued_total: u64,
}

impl std::fmt::Display for ClaimStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Claims[{}/{}, enq={}, deq={}]",
            self.current_size, self.capacity, self.enqueued_total, self.dequeued_total
        )
    }
}

/// Shared claim queue: many agents submit, the orchestrator drains
///
/// Submission never blocks and wakes the orchestrator. The wake-up is stored
/// as a permit, so a claim submitted between two drains is never missed.
#[derive(Debug)]
pub struct PendingClaims {
    queue: Mutex<ClaimQueue>,
    notify: Notify,
}

impl PendingClaims {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(ClaimQueue::new(capacity)),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClaimQueue> {
        // The queue holds no cross-entry invariant a panicking holder could break
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `agent`'s claim and wake the orchestrator
    pub fn submit(&self, agent: AgentId) -> Result<()> {
        let outcome = self.lock().enqueue(agent);
        match outcome {
            Ok(()) => {
                debug!(%agent, "claim submitted");
                self.notify.notify_one();
                Ok(())
            }
            Err(reason) => {
                error!(%agent, %reason, "claim queue invariant violated");
                Err(GameError::InvariantViolation(reason))
            }
        }
    }

    /// Take every queued claim in submission order
    pub fn drain_all(&self) -> Vec<AgentId> {
        self.lock().drain_all()
    }

    /// Resolve after the next submission (or at once if one is unobserved)
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.lock().contains(agent)
    }

    pub fn stats(&self) -> ClaimStats {
        self.lock().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_fifo_order() {
        let mut queue = ClaimQueue::new(3);
        queue.enqueue(AgentId(2)).unwrap();
        queue.enqueue(AgentId(0)).unwrap();
        queue.enqueue(AgentId(1)).unwrap();

        assert_eq!(queue.drain_all(), vec![AgentId(2), AgentId(0), AgentId(1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_claim_rejected() {
        let mut queue = ClaimQueue::new(3);
        queue.enqueue(AgentId(1)).unwrap();
        let err = queue.enqueue(AgentId(1)).unwrap_err();
        assert!(err.contains("outstanding"));

        // Allowed again once drained
        queue.drain_all();
        queue.enqueue(AgentId(1)).unwrap();
    }

    #[test]
    fn test_capacity_is_one_slot_per_agent() {
        let mut queue = ClaimQueue::new(2);
        queue.enqueue(AgentId(0)).unwrap();
        queue.enqueue(AgentId(1)).unwrap();
        assert!(queue.enqueue(AgentId(2)).unwrap_err().contains("full"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_stats() {
        let mut queue = ClaimQueue::new(4);
        queue.enqueue(AgentId(0)).unwrap();
        queue.enqueue(AgentId(1)).unwrap();
        queue.drain_all();
        queue.enqueue(AgentId(3)).unwrap();

        let stats = queue.stats();
        assert_eq!(
            stats,
            ClaimStats {
                current_size: 1,
                capacity: 4,
                enqueued_total: 3,
                dequeued_total: 2,
            }
        );
        assert_eq!(stats.to_string(), "Claims[1/4, enq=3, deq=2]");
    }

    #[test]
    fn test_submit_overflow_is_invariant_violation() {
        let claims = PendingClaims::new(1);
        claims.submit(AgentId(0)).unwrap();
        assert!(matches!(
            claims.submit(AgentId(1)),
            Err(GameError::InvariantViolation(_))
        ));
        assert!(matches!(
            claims.submit(AgentId(0)),
            Err(GameError::InvariantViolation(_))
        ));
        assert_eq!(claims.drain_all(), vec![AgentId(0)]);
    }

    #[test]
    fn test_submit_wakes_waiter() {
        let claims = PendingClaims::new(2);
        let mut waiter = task::spawn(claims.notified());
        assert_pending!(waiter.poll());

        claims.submit(AgentId(1)).unwrap();
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll());
    }

    #[test]
    fn test_wakeup_not_lost_without_waiter() {
        let claims = PendingClaims::new(2);
        claims.submit(AgentId(0)).unwrap();

        // Submitted before anyone waited: the stored permit releases the next wait
        let mut waiter = task::spawn(claims.notified());
        assert_ready!(waiter.poll());
        assert!(claims.contains(AgentId(0)));
    }
}
