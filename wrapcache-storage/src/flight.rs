//! Single-flight registry.
//!
//! Tracks in-progress production per key so that concurrent misses on the
//! same key collapse into one producer execution. The first caller to
//! [`join`](FlightRegistry::join) a key becomes the leader and must produce;
//! everyone else gets a [`Waiter`] that resolves to the leader's outcome.
//!
//! # Lifecycle
//!
//! ```text
//! join() ──→ Leader ─── complete(outcome) ──→ waiters woken, ticket removed
//!   │           │
//!   │           └── dropped without outcome ──→ waiters get Abandoned, ticket removed
//!   └──→ Follower ─── wait() ──→ leader's outcome
//! ```
//!
//! The registry mutex covers only ticket creation, lookup and removal. It is
//! never held while a producer runs or while a waiter is suspended.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use wrapcache_core::{CacheError, CacheKey, CacheResult};

/// Slot a ticket's outcome is published into. `None` until completion.
type Slot<V> = Option<CacheResult<V>>;

struct TicketEntry<V> {
    id: u64,
    receiver: watch::Receiver<Slot<V>>,
}

struct Flights<V> {
    tickets: Mutex<HashMap<CacheKey, TicketEntry<V>>>,
    next_id: AtomicU64,
}

impl<V> Flights<V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, TicketEntry<V>>> {
        // Critical sections never panic mid-update, so a poisoned map is intact.
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Remove the ticket for `key` only if it is still the one identified by `id`.
fn remove_ticket<V>(tickets: &mut HashMap<CacheKey, TicketEntry<V>>, key: &CacheKey, id: u64) {
    if tickets.get(key).is_some_and(|entry| entry.id == id) {
        tickets.remove(key);
    }
}

/// Registry of in-flight productions, keyed by [`CacheKey`].
///
/// Cloning is cheap and clones share the same registry.
pub struct FlightRegistry<V> {
    flights: Arc<Flights<V>>,
}

/// Result of joining a key.
pub enum Flight<V> {
    /// No production was running; the caller must produce and complete.
    Leader(LeaderTicket<V>),
    /// A production is already running; wait for its outcome.
    Follower(Waiter<V>),
}

impl<V> Flight<V> {
    /// Returns true if the caller became the leader.
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader(_))
    }
}

impl<V> FlightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Flights {
                tickets: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Join the production for `key`, becoming leader if none is running.
    pub fn join(&self, key: &CacheKey) -> Flight<V> {
        let mut tickets = self.flights.lock();

        if let Some(entry) = tickets.get(key) {
            return Flight::Follower(Waiter {
                key: key.clone(),
                receiver: entry.receiver.clone(),
            });
        }

        let (sender, receiver) = watch::channel(None);
        let id = self.flights.next_id.fetch_add(1, Ordering::Relaxed);
        tickets.insert(key.clone(), TicketEntry { id, receiver });

        Flight::Leader(LeaderTicket {
            key: key.clone(),
            id,
            sender: Some(sender),
            flights: Arc::clone(&self.flights),
        })
    }

    /// Publish `outcome` to every waiter on `ticket` and remove the ticket.
    pub fn complete(&self, ticket: LeaderTicket<V>, outcome: CacheResult<V>) {
        ticket.complete(outcome);
    }

    /// Number of productions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    /// Returns true if a production is in flight for `key`.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.flights.lock().contains_key(key)
    }
}

impl<V> Default for FlightRegistry<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for FlightRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<V> fmt::Debug for FlightRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightRegistry")
            .field("in_flight", &self.flights.lock().len())
            .finish()
    }
}

/// The leader's handle on an in-flight production.
///
/// Must be completed exactly once. Dropping it without completing wakes all
/// waiters with [`CacheError::Abandoned`] and removes the ticket so the next
/// caller can produce afresh.
pub struct LeaderTicket<V> {
    key: CacheKey,
    id: u64,
    sender: Option<watch::Sender<Slot<V>>>,
    flights: Arc<Flights<V>>,
}

impl<V> LeaderTicket<V> {
    /// The key being produced.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// A waiter that resolves to this ticket's outcome.
    ///
    /// Lets the leader wait the same way followers do, so its own call can
    /// be dropped without affecting the production.
    pub fn subscribe(&self) -> Waiter<V> {
        let receiver = match &self.sender {
            Some(sender) => sender.subscribe(),
            // Unreachable: the sender is only taken by complete/drop, which consume the ticket.
            None => watch::channel(None).1,
        };
        Waiter {
            key: self.key.clone(),
            receiver,
        }
    }

    /// Publish `outcome` to every waiter and remove the ticket.
    pub fn complete(mut self, outcome: CacheResult<V>) {
        if let Some(sender) = self.sender.take() {
            let mut tickets = self.flights.lock();
            sender.send_replace(Some(outcome));
            remove_ticket(&mut tickets, &self.key, self.id);
        }
    }
}

impl<V> Drop for LeaderTicket<V> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            tracing::error!(key = %self.key, "in-flight production dropped without an outcome");
            let mut tickets = self.flights.lock();
            remove_ticket(&mut tickets, &self.key, self.id);
            drop(tickets);
            drop(sender);
        }
    }
}

impl<V> fmt::Debug for LeaderTicket<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderTicket")
            .field("key", &self.key)
            .field("completed", &self.sender.is_none())
            .finish()
    }
}

/// A handle that resolves to an in-flight production's outcome.
pub struct Waiter<V> {
    key: CacheKey,
    receiver: watch::Receiver<Slot<V>>,
}

impl<V: Clone> Waiter<V> {
    /// The key being produced.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Suspend until the leader completes, then return its outcome.
    pub async fn wait(mut self) -> CacheResult<V> {
        let slot = self
            .receiver
            .wait_for(Option::is_some)
            .await
            .map(|slot| (*slot).clone());

        match slot {
            Ok(Some(outcome)) => outcome,
            Ok(None) | Err(_) => Err(CacheError::Abandoned {
                key: self.key.to_string(),
            }),
        }
    }
}

impl<V> fmt::Debug for Waiter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wrapcache_core::ProducerError;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(s)
    }

    fn expect_leader<V>(flight: Flight<V>) -> LeaderTicket<V> {
        match flight {
            Flight::Leader(ticket) => ticket,
            Flight::Follower(_) => panic!("expected to lead"),
        }
    }

    fn expect_follower<V>(flight: Flight<V>) -> Waiter<V> {
        match flight {
            Flight::Follower(waiter) => waiter,
            Flight::Leader(_) => panic!("expected to follow"),
        }
    }

    #[test]
    fn test_first_join_leads_second_follows() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();

        let leader = expect_leader(registry.join(&key("k")));
        let follower = registry.join(&key("k"));
        assert!(!follower.is_leader());
        assert_eq!(registry.in_flight(), 1);
        assert!(registry.is_in_flight(&key("k")));

        registry.complete(leader, Ok(1));
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let a = registry.join(&key("a"));
        let b = registry.join(&key("b"));
        assert!(a.is_leader());
        assert!(b.is_leader());
        assert_eq!(registry.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_followers_receive_leader_value() {
        let registry: FlightRegistry<String> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));

        let waiters: Vec<_> = (0..4)
            .map(|_| expect_follower(registry.join(&key("k"))))
            .collect();
        let handles: Vec<_> = waiters
            .into_iter()
            .map(|waiter| tokio::spawn(waiter.wait()))
            .collect();

        leader.complete(Ok("value".to_string()));

        for handle in handles {
            let outcome = handle.await.expect("waiter task should not panic");
            assert_eq!(outcome.expect("waiter should see success"), "value");
        }
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_followers_receive_same_error() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));
        let first = expect_follower(registry.join(&key("k")));
        let second = expect_follower(registry.join(&key("k")));

        let err = ProducerError::msg("db down");
        leader.complete(Err(err.clone().into()));

        for waiter in [first, second] {
            match waiter.wait().await {
                Err(CacheError::Producer(received)) => {
                    assert!(received.same_as(&err));
                    assert_eq!(received.to_string(), "db down");
                }
                other => panic!("expected producer error, got {other:?}"),
            }
        }

        // Errors are not cached: the next join leads again.
        assert!(registry.join(&key("k")).is_leader());
    }

    #[tokio::test]
    async fn test_leader_subscription_sees_outcome() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));
        let own = leader.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            leader.complete(Ok(7));
        });

        assert_eq!(own.wait().await.expect("leader outcome"), 7);
    }

    #[tokio::test]
    async fn test_waiter_created_after_completion_still_resolves() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));
        let waiter = expect_follower(registry.join(&key("k")));

        leader.complete(Ok(3));
        assert_eq!(waiter.wait().await.expect("already published"), 3);
    }

    #[tokio::test]
    async fn test_dropped_leader_abandons_waiters() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));
        let waiter = expect_follower(registry.join(&key("k")));

        drop(leader);

        match waiter.wait().await {
            Err(CacheError::Abandoned { key }) => assert_eq!(key, "k"),
            other => panic!("expected abandoned, got {other:?}"),
        }
        assert_eq!(registry.in_flight(), 0);
        assert!(registry.join(&key("k")).is_leader());
    }

    #[tokio::test]
    async fn test_panicking_producer_abandons_waiters() {
        let registry: FlightRegistry<u32> = FlightRegistry::new();
        let leader = expect_leader(registry.join(&key("k")));
        let waiter = expect_follower(registry.join(&key("k")));

        let task = tokio::spawn(async move {
            let _ticket = leader;
            panic!("producer blew up");
        });
        assert!(task.await.is_err());

        assert!(matches!(
            waiter.wait().await,
            Err(CacheError::Abandoned { .. })
        ));
        assert_eq!(registry.in_flight(), 0);
    }
}
