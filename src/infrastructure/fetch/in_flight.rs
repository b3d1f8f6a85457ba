//! Deduplication of concurrent pulls targeting the same location

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::domain::ProvisionError;

type SharedPull<T> = Shared<BoxFuture<'static, Result<T, ProvisionError>>>;
type Entries<T> = Arc<Mutex<HashMap<String, SharedPull<T>>>>;

/// Whether a caller started the work or joined one already running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    Joined,
}

/// Registry of pulls currently in flight, keyed by resolved location.
///
/// The first caller for a key spawns the work; later callers await the same
/// outcome. The work runs on its own task, so it completes (and the key is
/// released) even if every caller goes away.
#[derive(Debug)]
pub struct InFlightRegistry<T: Clone> {
    entries: Entries<T>,
}

impl<T> InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.entries).len()
    }

    pub async fn run<F>(&self, key: String, work: F) -> (Result<T, ProvisionError>, Dispatch)
    where
        F: Future<Output = Result<T, ProvisionError>> + Send + 'static,
    {
        let (pull, dispatch) = {
            let mut entries = lock(&self.entries);

            match entries.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "Joining in-flight pull");
                    (existing.clone(), Dispatch::Joined)
                }
                None => {
                    let pull = self.spawn(key.clone(), work);
                    entries.insert(key, pull.clone());
                    (pull, Dispatch::Started)
                }
            }
        };

        (pull.await, dispatch)
    }

    fn spawn<F>(&self, key: String, work: F) -> SharedPull<T>
    where
        F: Future<Output = Result<T, ProvisionError>> + Send + 'static,
    {
        let release = Release {
            entries: Arc::clone(&self.entries),
            key,
        };

        let handle = tokio::spawn(async move {
            let _release = release;
            work.await
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(ProvisionError::internal(format!("pull task failed: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

impl<T> Default for InFlightRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Drops the registry entry when the pull task ends, panics included. The
/// entry is inserted while the registry lock is held, so the removal cannot
/// run before the insert.
struct Release<T> {
    entries: Entries<T>,
    key: String,
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        lock(&self.entries).remove(&self.key);
    }
}

fn lock<T>(entries: &Entries<T>) -> MutexGuard<'_, HashMap<String, SharedPull<T>>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_identical_keys_share_one_execution() {
        let registry = Arc::new(InFlightRegistry::<u32>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let make_work = |executions: Arc<AtomicUsize>| async move {
            executions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<u32, ProvisionError>(7)
        };

        let first = registry.run("a".to_string(), make_work(executions.clone()));
        let second = registry.run("a".to_string(), make_work(executions.clone()));
        let ((r1, d1), (r2, d2)) = tokio::join!(first, second);

        assert_eq!(r1, Ok(7));
        assert_eq!(r2, Ok(7));
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert_eq!(d1, Dispatch::Started);
        assert_eq!(d2, Dispatch::Joined);
        assert_eq!(registry.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let registry = InFlightRegistry::<&'static str>::new();

        let (a, b) = tokio::join!(
            registry.run("a".to_string(), async { Ok("a") }),
            registry.run("b".to_string(), async { Ok("b") }),
        );

        assert_eq!(a, (Ok("a"), Dispatch::Started));
        assert_eq!(b, (Ok("b"), Dispatch::Started));
    }

    #[tokio::test]
    async fn test_key_is_released_after_completion() {
        let registry = InFlightRegistry::<u32>::new();

        let (first, _) = registry
            .run("a".to_string(), async {
                Err(ProvisionError::internal("boom"))
            })
            .await;
        assert!(first.is_err());

        let (second, dispatch) = registry.run("a".to_string(), async { Ok(1) }).await;
        assert_eq!(second, Ok(1));
        assert_eq!(dispatch, Dispatch::Started);
    }

    #[tokio::test]
    async fn test_panicking_work_is_reported() {
        let registry = InFlightRegistry::<u32>::new();

        let (result, _) = registry
            .run("a".to_string(), async {
                if true {
                    panic!("worker exploded");
                }
                Ok(0)
            })
            .await;

        assert!(matches!(result, Err(ProvisionError::Internal { .. })));
        assert_eq!(registry.in_flight(), 0);
    }
}
