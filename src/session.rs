use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Guards against a slow model reply landing in the wrong place: every
/// outgoing turn takes a ticket, and a reply is only accepted while its
/// ticket is still the newest one for the active conversation. Anything
/// older is dropped on arrival.
#[derive(Default)]
pub struct TurnGuard {
    sequence: AtomicU64,
    active_conversation: Mutex<Option<Uuid>>,
}

/// Ticket handed out when a turn is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    seq: u64,
    conversation: Option<Uuid>,
}

impl TurnGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-flight turn. Any ticket issued earlier becomes
    /// stale immediately.
    pub fn issue(&self, conversation: Option<Uuid>) -> TurnTicket {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        *self.active_conversation.lock().unwrap_or_else(|e| e.into_inner()) = conversation;
        TurnTicket { seq, conversation }
    }

    /// True when the reply for this ticket may still be delivered.
    pub fn accept(&self, ticket: &TurnTicket) -> bool {
        if self.sequence.load(Ordering::SeqCst) != ticket.seq {
            return false;
        }
        *self
            .active_conversation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            == ticket.conversation
    }

    /// The user navigated to another conversation; every in-flight reply
    /// for the previous one must be discarded.
    pub fn switch_conversation(&self, conversation: Option<Uuid>) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        *self.active_conversation.lock().unwrap_or_else(|e| e.into_inner()) = conversation;
    }
}

/// One [`TurnGuard`] per account, created on first use. Turns from
/// different accounts never supersede each other.
#[derive(Default)]
pub struct TurnGuards {
    by_account: Mutex<HashMap<String, Arc<TurnGuard>>>,
}

impl TurnGuards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_account(&self, account_id: &str) -> Arc<TurnGuard> {
        let mut guards = self.by_account.lock().unwrap_or_else(|e| e.into_inner());
        guards.entry(account_id.to_string()).or_default().clone()
    }
}

/// Timed lockout after the upstream signals rate or token exhaustion.
/// While engaged, new turns are refused before any work is done.
#[derive(Default)]
pub struct Cooldown {
    locked_until: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut slot = self.locked_until.lock().unwrap_or_else(|e| e.into_inner());
        // Never shorten an existing lockout.
        if slot.map_or(true, |existing| until > existing) {
            *slot = Some(until);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left on the lockout, if any. Expired lockouts are cleared.
    pub fn remaining(&self) -> Option<Duration> {
        let mut slot = self.locked_until.lock().unwrap_or_else(|e| e.into_inner());
        match *slot {
            Some(until) => {
                let now = Instant::now();
                if until > now {
                    Some(until - now)
                } else {
                    *slot = None;
                    None
                }
            }
            None => None,
        }
    }
}
