use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::BatchError;
use crate::metrics::{BATCH_FLUSHES, BATCH_SIZE};

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

type Reply<T, E> = oneshot::Sender<Result<T, BatchError<E>>>;

// Batched call - holds its arguments, its position in the flush and a
// one-time channel to send back the result
struct PendingCall<A, T, E> {
    slot: usize,
    args: A,
    reply: Reply<T, E>,
}

// the first call for a key opens a batch and schedules its flush `delay`
// later, calls arriving before then join without moving the flush
pub struct Batcher<A, T, E> {
    batches: Arc<DashMap<String, Vec<PendingCall<A, T, E>>>>,
    delay: Duration,
}

impl<A, T, E> Clone for Batcher<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
            delay: self.delay,
        }
    }
}

impl<A, T, E> Default for Batcher<A, T, E>
where
    A: Send + Sync + 'static,
    T: Send + 'static,
    E: Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_DELAY)
    }
}

impl<A, T, E> Batcher<A, T, E>
where
    A: Send + Sync + 'static,
    T: Send + 'static,
    E: Display + Send + Sync + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            batches: Arc::new(DashMap::new()),
            delay,
        }
    }

    // keys with a batch waiting to flush
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    // batch_fn gets every argument in arrival order and must return one result per argument
    pub async fn batch_request<F, Fut>(
        &self,
        key: &str,
        args: A,
        batch_fn: F,
    ) -> Result<T, BatchError<E>>
    where
        F: FnOnce(Vec<A>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    {
        let (reply, response_rx) = oneshot::channel();

        let opened = match self.batches.entry(key.to_string()) {
            Entry::Occupied(mut batch) => {
                let calls = batch.get_mut();
                let slot = calls.len();
                calls.push(PendingCall { slot, args, reply });
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(vec![PendingCall {
                    slot: 0,
                    args,
                    reply,
                }]);
                true
            }
        };

        if opened {
            let batches = Arc::clone(&self.batches);
            let delay = self.delay;
            let key = key.to_string();
            tokio::spawn(async move {
                sleep(delay).await;
                // idempotent: a missing batch means nothing to flush
                if let Some((_, calls)) = batches.remove(&key) {
                    flush(&key, calls, batch_fn).await;
                }
            });
        }

        response_rx.await.unwrap_or(Err(BatchError::Dropped))
    }
}

async fn flush<A, T, E, F, Fut>(key: &str, calls: Vec<PendingCall<A, T, E>>, batch_fn: F)
where
    E: Display,
    F: FnOnce(Vec<A>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    BATCH_FLUSHES.inc();
    BATCH_SIZE.observe(calls.len() as f64);
    debug!(key, size = calls.len(), "flushing batch");

    let mut args = Vec::with_capacity(calls.len());
    let mut replies = Vec::with_capacity(calls.len());
    for call in calls {
        args.push(call.args);
        replies.push((call.slot, call.reply));
    }

    match batch_fn(args).await {
        Ok(results) if results.len() == replies.len() => {
            let mut results: Vec<Option<T>> = results.into_iter().map(Some).collect();
            for (slot, reply) in replies {
                if let Some(result) = results.get_mut(slot).and_then(Option::take) {
                    let _ = reply.send(Ok(result));
                }
            }
        }
        Ok(results) => {
            let expected = replies.len();
            let actual = results.len();
            warn!(key, expected, actual, "batch result count mismatch");
            for (_, reply) in replies {
                let _ = reply.send(Err(BatchError::ResultCountMismatch { expected, actual }));
            }
        }
        Err(e) => {
            warn!(key, size = replies.len(), error = %e, "batch failed");
            let e = Arc::new(e);
            for (_, reply) in replies {
                let _ = reply.send(Err(BatchError::Failed(Arc::clone(&e))));
            }
        }
    }
}
