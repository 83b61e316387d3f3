use std::hash::Hash;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::future::WeakShared;
use futures::FutureExt;

pub(crate) type SharedFuture<V> = Shared<BoxFuture<'static, V>>;

struct Running<V> {
    id: u64,
    computation: WeakShared<BoxFuture<'static, V>>,
}

/// Removes its entry when the computation finishes, or when every handle to
/// it is dropped before it does.
struct EntryGuard<K: Eq + Hash, V> {
    entries: Weak<DashMap<K, Running<V>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for EntryGuard<K, V> {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.remove_if(&self.key, |_, running| running.id == self.id);
        }
    }
}

/// Coalesces concurrent computations of the same key. An entry lives only
/// while someone still holds its computation and it hasn't finished; results
/// are not kept.
pub(crate) struct InFlight<K: Eq + Hash, V> {
    entries: Arc<DashMap<K, Running<V>>>,
    next_id: AtomicU64,
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the running computation for `key`, or start one with `start`.
    pub(crate) fn get_or_start(
        &self,
        key: K,
        start: impl FnOnce() -> BoxFuture<'static, V>,
    ) -> SharedFuture<V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(computation) = occupied.get().computation.upgrade() {
                    return computation;
                }
                let (computation, running) = self.launch(key, start);
                if let Some(running) = running {
                    occupied.insert(running);
                } else {
                    occupied.remove();
                }
                computation
            }
            Entry::Vacant(vacant) => {
                let (computation, running) = self.launch(key, start);
                if let Some(running) = running {
                    vacant.insert(running);
                }
                computation
            }
        }
    }

    fn launch(
        &self,
        key: K,
        start: impl FnOnce() -> BoxFuture<'static, V>,
    ) -> (SharedFuture<V>, Option<Running<V>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = EntryGuard {
            entries: Arc::downgrade(&self.entries),
            key,
            id,
        };
        let work = start();
        let computation = async move {
            let _guard = guard;
            work.await
        }
        .boxed()
        .shared();
        let running = computation
            .downgrade()
            .map(|computation| Running { id, computation });
        (computation, running)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use futures::future;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_requests_share_one_computation() {
        let cache = InFlight::<&'static str, usize>::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let start = || {
            let runs = runs.clone();
            async move {
                tokio::task::yield_now().await;
                runs.fetch_add(1, Ordering::SeqCst) + 1
            }
            .boxed()
        };

        let first = cache.get_or_start("level", start);
        let second = cache.get_or_start("level", start);
        assert_eq!(cache.len(), 1);

        let (a, b) = tokio::join!(first, second);
        assert_eq!((a, b), (1, 1));
        assert_eq!(cache.len(), 0);

        assert_eq!(cache.get_or_start("level", start).await, 2);
    }

    #[tokio::test]
    async fn test_abandoned_computation_is_forgotten() {
        let cache = InFlight::<&'static str, usize>::new();

        let mut abandoned = cache.get_or_start("level", || future::pending().boxed());
        assert!(futures::poll!(&mut abandoned).is_pending());
        assert_eq!(cache.len(), 1);

        drop(abandoned);
        assert_eq!(cache.len(), 0);

        let fresh = cache.get_or_start("level", || async { 7 }.boxed());
        assert_eq!(fresh.await, 7);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_unpolled_computation_is_forgotten_when_dropped() {
        let cache = InFlight::<&'static str, usize>::new();
        let computation = cache.get_or_start("level", || async { 1 }.boxed());
        assert_eq!(cache.len(), 1);
        drop(computation);
        assert_eq!(cache.len(), 0);
    }
}
