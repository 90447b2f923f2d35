use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GovernorError;

// request future every concurrent caller for the same key awaits
pub type SharedRequest<T, E> = Shared<BoxFuture<'static, Result<T, GovernorError<E>>>>;

pub struct PendingRequest<T, E> {
    pub id: u64,
    pub request: SharedRequest<T, E>,
}

pub enum Registration<T, E> {
    Joined(SharedRequest<T, E>),
    Started(SharedRequest<T, E>),
}

pub struct PendingRegistry<T, E> {
    inflight: DashMap<String, PendingRequest<T, E>>,
    next_id: AtomicU64,
}

impl<T, E> PendingRegistry<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Joins the in-flight request for `key`, or calls `start` and registers
    /// what it returns. Lookup, `start` and insert all hold the key's shard
    /// lock, so `start` must not touch this registry.
    pub fn join_or_register<F>(
        &self,
        key: &str,
        start: F,
    ) -> Result<Registration<T, E>, GovernorError<E>>
    where
        F: FnOnce(u64) -> Result<SharedRequest<T, E>, GovernorError<E>>,
    {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(occupied) => Ok(Registration::Joined(occupied.get().request.clone())),
            Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let request = start(id)?;
                vacant.insert(PendingRequest {
                    id,
                    request: request.clone(),
                });
                Ok(Registration::Started(request))
            }
        }
    }

    // no-op when `key` was re-registered under a newer id
    pub fn complete(&self, key: &str, id: u64) -> bool {
        self.inflight
            .remove_if(key, |_, pending| pending.id == id)
            .is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn clear(&self) {
        self.inflight.clear();
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

impl<T: Clone, E: Clone> Default for PendingRegistry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
