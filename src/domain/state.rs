use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Free to act, holding 0..=SET_SIZE markers
    Playing,
    /// Selection full, claim submitted, blocked on the verdict
    AwaitingVerdict,
    /// Last claim was illegal; markers must be removed before playing on
    PostPenalty,
}

impl AgentState {
    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: AgentState) -> bool {
        use AgentState::*;

        match (self, target) {
            // Selection reached SET_SIZE
            (Playing, AwaitingVerdict) => true,
            // Round reset while idle
            (Playing, Playing) => true,

            // Legal or stale claim
            (AwaitingVerdict, Playing) => true,
            // Illegal claim
            (AwaitingVerdict, PostPenalty) => true,

            // Markers cleared, or round reset
            (PostPenalty, Playing) => true,

            _ => false,
        }
    }

    /// May an inbound toggle action be applied in this state?
    pub fn accepts_actions(&self) -> bool {
        !matches!(self, AgentState::AwaitingVerdict)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Playing => write!(f, "playing"),
            AgentState::AwaitingVerdict => write!(f, "awaiting_verdict"),
            AgentState::PostPenalty => write!(f, "post_penalty"),
        }
    }
}

/// Outcome of validating one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Selection was no longer full when the claim was dequeued
    Incomplete,
    Legal,
    Illegal,
}

impl Verdict {
    /// State the claimant moves to once this verdict is applied
    pub fn next_state(&self) -> AgentState {
        match self {
            Verdict::Incomplete | Verdict::Legal => AgentState::Playing,
            Verdict::Illegal => AgentState::PostPenalty,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Incomplete => write!(f, "incomplete"),
            Verdict::Legal => write!(f, "legal"),
            Verdict::Illegal => write!(f, "illegal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use AgentState::*;

        assert!(Playing.can_transition_to(AwaitingVerdict));
        assert!(AwaitingVerdict.can_transition_to(Playing));
        assert!(AwaitingVerdict.can_transition_to(PostPenalty));
        assert!(PostPenalty.can_transition_to(Playing));

        assert!(!Playing.can_transition_to(PostPenalty));
        assert!(!PostPenalty.can_transition_to(AwaitingVerdict));
        assert!(!AwaitingVerdict.can_transition_to(AwaitingVerdict));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AgentState::Playing.to_string(), "playing");
        assert_eq!(AgentState::AwaitingVerdict.to_string(), "awaiting_verdict");
        assert_eq!(AgentState::PostPenalty.to_string(), "post_penalty");
    }

    #[test]
    fn test_verdict_next_state() {
        assert_eq!(Verdict::Legal.next_state(), AgentState::Playing);
        assert_eq!(Verdict::Incomplete.next_state(), AgentState::Playing);
        assert_eq!(Verdict::Illegal.next_state(), AgentState::PostPenalty);
        for verdict in [Verdict::Legal, Verdict::Illegal, Verdict::Incomplete] {
            assert!(AgentState::AwaitingVerdict.can_transition_to(verdict.next_state()));
        }
    }

    #[test]
    fn test_accepts_actions() {
        assert!(AgentState::Playing.accepts_actions());
        assert!(AgentState::PostPenalty.accepts_actions());
        assert!(!AgentState::AwaitingVerdict.accepts_actions());
    }
}
