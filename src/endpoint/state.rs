//! Endpoint lifecycle state machine
//!
//! The current state lives in a single atomic so reads never block and every
//! transition is a swap. Subscribers receive each transition over a
//! broadcast channel; slow subscribers lag rather than stall the endpoint.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::broadcast;

const SUBSCRIBER_CAPACITY: usize = 64;

/// Lifecycle states of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum LifecycleState {
    /// Initial state, eligible for connect
    Disconnected = 0,
    /// Connect attempt (and internal retries) in flight
    Connecting = 1,
    /// Live, writable channel
    Connected = 2,
    /// Teardown requested
    Disconnecting = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }

    /// Disconnected or Disconnecting
    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Self::Disconnected | Self::Disconnecting)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Disconnecting => write!(f, "DISCONNECTING"),
        }
    }
}

/// A single observed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Atomic state holder with transition fan-out
#[derive(Debug)]
pub struct StateMachine {
    current: AtomicU8,
    changes: broadcast::Sender<StateChange>,
}

impl StateMachine {
    pub fn new(initial: LifecycleState) -> Self {
        let (changes, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            current: AtomicU8::new(initial as u8),
            changes,
        }
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Swap in `next`, returning the previous state. Subscribers are only
    /// notified when the value actually changes.
    pub fn transition(&self, next: LifecycleState) -> LifecycleState {
        let prev = LifecycleState::from_u8(self.current.swap(next as u8, Ordering::AcqRel));
        if prev != next {
            // No subscribers is fine
            let _ = self.changes.send(StateChange { from: prev, to: next });
        }
        prev
    }

    /// Swap to `next` only if the current state is `expected`; on mismatch
    /// returns the state actually found
    pub fn compare_and_transition(
        &self,
        expected: LifecycleState,
        next: LifecycleState,
    ) -> Result<(), LifecycleState> {
        match self.current.compare_exchange(
            expected as u8,
            next as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                if expected != next {
                    let _ = self.changes.send(StateChange {
                        from: expected,
                        to: next,
                    });
                }
                Ok(())
            }
            Err(found) => Err(LifecycleState::from_u8(found)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }
}
