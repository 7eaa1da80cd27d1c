//! Request Coalescer Module
//!
//! Registry of in-flight computations, one per key, so that concurrent misses
//! share a single factory call.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::error::Result;

/// A computation every coalesced caller awaits; all of them observe the same outcome.
pub type SharedComputation<V> = Shared<BoxFuture<'static, Result<V>>>;

// == Pending Computation ==
/// Registration of one outstanding computation.
///
/// Only a weak handle is kept: once every subscriber has dropped its
/// [`SharedComputation`], the underlying future is dropped too.
struct PendingComputation<V> {
    id: u64,
    handle: WeakShared<BoxFuture<'static, Result<V>>>,
}

// == Request Coalescer ==
/// Maps keys to their in-flight computations.
pub struct RequestCoalescer<V> {
    pending: HashMap<String, PendingComputation<V>>,
    next_id: u64,
}

impl<V> Default for RequestCoalescer<V> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Get Or Create ==
    /// Returns the live computation registered for `key`, or registers a new one.
    ///
    /// `make` receives the registration id and builds the computation; it is
    /// only called when no live registration exists. The returned flag is
    /// `true` when an existing computation was joined.
    pub fn get_or_create<M>(&mut self, key: &str, make: M) -> (SharedComputation<V>, bool)
    where
        M: FnOnce(u64) -> BoxFuture<'static, Result<V>>,
    {
        if let Some(computation) = self.join(key) {
            return (computation, true);
        }

        let id = self.next_id;
        self.next_id += 1;

        let computation = make(id).shared();
        if let Some(handle) = computation.downgrade() {
            self.pending
                .insert(key.to_string(), PendingComputation { id, handle });
        }
        (computation, false)
    }

    // == Join ==
    /// Attaches to the live computation for `key`, if any.
    ///
    /// A registration whose subscribers have all gone away is dropped here.
    pub fn join(&mut self, key: &str) -> Option<SharedComputation<V>> {
        let computation = self.pending.get(key)?.handle.upgrade();
        if computation.is_none() {
            self.pending.remove(key);
        }
        computation
    }

    // == Complete ==
    /// Removes the registration with `id` for `key`.
    ///
    /// Returns `false` when that registration was already detached or
    /// replaced, meaning its result must not be stored.
    pub fn complete(&mut self, key: &str, id: u64) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.id == id => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    // == Detach ==
    /// Forgets the registration for `key`. Its subscribers still get their
    /// result, but the result is not stored.
    pub fn detach(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Forgets every registration whose key satisfies `predicate`.
    pub fn detach_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&str) -> bool,
    {
        let before = self.pending.len();
        self.pending.retain(|key, _| !predicate(key));
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Checks whether a computation for `key` is still running.
    ///
    /// An abandoned registration for `key` is dropped.
    pub fn is_pending(&mut self, key: &str) -> bool {
        let live = self
            .pending
            .get(key)
            .is_some_and(|pending| pending.handle.upgrade().is_some());
        if !live {
            self.pending.remove(key);
        }
        live
    }

    // == Prune ==
    /// Drops every registration whose subscribers have all gone away.
    ///
    /// Returns the number dropped.
    pub fn prune_abandoned(&mut self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.handle.upgrade().is_some());
        before - self.pending.len()
    }

    // == Length ==
    /// Returns the number of registrations, stale ones included.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
