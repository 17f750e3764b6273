use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// At most one outstanding signing request per session topic. Entries older
/// than the TTL may be reclaimed by a new request.
#[derive(Debug)]
pub struct SigningRequestGate {
    held: Mutex<GateState>,
    ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct GateState {
    entries: HashMap<String, GateEntry>,
    next_generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct GateEntry {
    since: Instant,
    generation: u64,
}

/// Proof of one acquisition. Releasing with a ticket whose entry has since
/// been reclaimed leaves the new holder in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateTicket {
    topic: String,
    generation: u64,
}

impl GateTicket {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Default for SigningRequestGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningRequestGate {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(GateState::default()),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            held: Mutex::new(GateState::default()),
            ttl: Some(ttl),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self, since: Instant, now: Instant) -> bool {
        self.ttl.is_some_and(|ttl| now.duration_since(since) >= ttl)
    }

    /// Takes `topic` unless a live entry holds it.
    pub fn acquire(&self, topic: &str) -> Option<GateTicket> {
        let now = Instant::now();
        let mut state = self.lock();
        match state.entries.get(topic) {
            Some(entry) if !self.expired(entry.since, now) => return None,
            Some(entry) => {
                debug!(topic, stale_generation = entry.generation, "reclaiming expired signing request");
            }
            None => {}
        }
        state.next_generation += 1;
        let generation = state.next_generation;
        state
            .entries
            .insert(topic.to_owned(), GateEntry { since: now, generation });
        Some(GateTicket {
            topic: topic.to_owned(),
            generation,
        })
    }

    pub fn try_acquire(&self, topic: &str) -> bool {
        self.acquire(topic).is_some()
    }

    /// Frees the topic whoever holds it.
    pub fn release(&self, topic: &str) {
        self.lock().entries.remove(topic);
    }

    /// Frees the topic only if `ticket` is still the current holder.
    pub fn release_ticket(&self, ticket: &GateTicket) -> bool {
        let mut state = self.lock();
        match state.entries.get(&ticket.topic) {
            Some(entry) if entry.generation == ticket.generation => {
                state.entries.remove(&ticket.topic);
                true
            }
            _ => {
                debug!(topic = %ticket.topic, generation = ticket.generation, "stale gate ticket ignored");
                false
            }
        }
    }

    pub fn is_held(&self, topic: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .get(topic)
            .is_some_and(|entry| !self.expired(entry.since, now))
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !self.expired(entry.since, now));
        before - state.entries.len()
    }

    /// Acquires `topic` and releases it when the guard drops.
    pub fn acquire_guard(self: &Arc<Self>, topic: &str) -> Option<GateGuard> {
        self.acquire(topic).map(|ticket| GateGuard {
            gate: Arc::clone(self),
            ticket,
        })
    }
}

#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<SigningRequestGate>,
    ticket: GateTicket,
}

impl GateGuard {
    pub fn topic(&self) -> &str {
        self.ticket.topic()
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.release_ticket(&self.ticket);
    }
}
