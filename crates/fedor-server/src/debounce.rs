//! Per-key debounce scheduler with cancel-and-restart semantics.
//!
//! Each key has at most one pending timer. A trigger for a key that already
//! has one aborts it and starts a fresh quiet period. When a timer matures
//! it claims its table entry under the lock, and only the holder of the
//! current generation gets to fire. Once claimed, the firing task is no
//! longer reachable from the table, so a later trigger schedules a new timer
//! instead of cancelling the action in flight.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// What to run once a key has been quiet for the full delay.
pub trait Action<K>: Send + Sync + 'static {
    fn fire(&self, key: K, reason: String) -> BoxFuture<'static, ()>;
}

impl<K, F> Action<K> for F
where
    F: Fn(K, String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    fn fire(&self, key: K, reason: String) -> BoxFuture<'static, ()> {
        self(key, reason)
    }
}

struct Entry {
    generation: u64,
    reason: String,
    timer: AbortHandle,
}

struct Table<K> {
    next_generation: u64,
    entries: HashMap<K, Entry>,
}

pub struct Debouncer<K> {
    delay: Duration,
    action: Arc<dyn Action<K>>,
    table: Arc<Mutex<Table<K>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    pub fn new(delay: Duration, action: impl Action<K>) -> Self {
        Self {
            delay,
            action: Arc::new(action),
            table: Arc::new(Mutex::new(Table {
                next_generation: 0,
                entries: HashMap::new(),
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer for `key`. Must be called inside a tokio
    /// runtime.
    pub fn trigger(&self, key: K, reason: impl Into<String>) {
        let reason = reason.into();
        let mut table = lock(&self.table);

        if let Some(previous) = table.entries.remove(&key) {
            previous.timer.abort();
            debug!(key = %key, previous = %previous.reason, "debounce: timer restarted");
        }

        table.next_generation += 1;
        let generation = table.next_generation;

        let timer = tokio::spawn(wait_then_fire(
            Arc::clone(&self.table),
            Arc::clone(&self.action),
            self.delay,
            key.clone(),
            generation,
        ));

        info!(
            key = %key,
            reason = %reason,
            delay_secs = self.delay.as_secs(),
            "debounce: scheduled"
        );
        table.entries.insert(
            key,
            Entry {
                generation,
                reason,
                timer: timer.abort_handle(),
            },
        );
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.table).entries.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.table).entries.contains_key(key)
    }

    /// Reason of the most recent trigger for a still-pending key.
    pub fn pending_reason(&self, key: &K) -> Option<String> {
        lock(&self.table).entries.get(key).map(|e| e.reason.clone())
    }

    /// Abort every pending timer. Actions already firing are left alone.
    pub fn shutdown(&self) -> usize {
        let mut table = lock(&self.table);
        let n = table.entries.len();
        for (key, entry) in table.entries.drain() {
            entry.timer.abort();
            debug!(key = %key, "debounce: timer cancelled on shutdown");
        }
        n
    }
}

async fn wait_then_fire<K>(
    table: Arc<Mutex<Table<K>>>,
    action: Arc<dyn Action<K>>,
    delay: Duration,
    key: K,
    generation: u64,
) where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    tokio::time::sleep(delay).await;

    let claimed = {
        let mut table = lock(&table);
        let current = table
            .entries
            .get(&key)
            .is_some_and(|e| e.generation == generation);
        if current {
            table.entries.remove(&key)
        } else {
            None
        }
    };
    let Some(entry) = claimed else {
        return;
    };

    info!(key = %key, reason = %entry.reason, "debounce: quiet period elapsed, firing");
    action.fire(key, entry.reason).await;
}

fn lock<K>(table: &Mutex<Table<K>>) -> MutexGuard<'_, Table<K>> {
    // No code path panics while holding the guard; a poisoned table is still
    // structurally valid.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::Instant;

    type Fired = Arc<Mutex<Vec<(String, String, Instant)>>>;

    fn recorder() -> (Fired, impl Action<String>) {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let action = move |key: String, reason: String| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((key, reason, Instant::now()));
            }
            .boxed()
        };
        (fired, action)
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_run_with_last_reason() {
        let (fired, action) = recorder();
        let d = Debouncer::new(Duration::from_secs(300), action);
        let start = Instant::now();

        d.trigger("acme/repo#42".to_string(), "new PR");
        advance(1).await;
        d.trigger("acme/repo#42".to_string(), "new commits");
        assert_eq!(d.pending_count(), 1);
        assert_eq!(
            d.pending_reason(&"acme/repo#42".to_string()).as_deref(),
            Some("new commits")
        );

        advance(400).await;

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, "acme/repo#42");
        assert_eq!(fired[0].1, "new commits");
        let at = fired[0].2 - start;
        assert!(at >= Duration::from_secs(301) && at < Duration::from_secs(302), "{at:?}");
        assert_eq!(d.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_isolated() {
        let (fired, action) = recorder();
        let d = Debouncer::new(Duration::from_secs(10), action);

        d.trigger("a/b#1".to_string(), "new PR");
        d.trigger("a/b#2".to_string(), "new PR");
        advance(5).await;
        // Re-arming #2 must not delay #1.
        d.trigger("a/b#2".to_string(), "label added");
        advance(6).await;

        {
            let fired = fired.lock().unwrap();
            assert_eq!(fired.len(), 1);
            assert_eq!(fired[0].0, "a/b#1");
        }
        assert!(d.is_pending(&"a/b#2".to_string()));

        advance(5).await;
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[1].0, "a/b#2");
        assert_eq!(fired[1].1, "label added");
    }

    #[tokio::test(start_paused = true)]
    async fn every_trigger_resets_the_quiet_period() {
        let (fired, action) = recorder();
        let d = Debouncer::new(Duration::from_secs(10), action);
        let start = Instant::now();

        for _ in 0..5 {
            d.trigger("k#1".to_string(), "tick");
            advance(9).await;
        }
        assert!(fired.lock().unwrap().is_empty());

        advance(2).await;
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        // Last trigger at t=36, fire at t=46.
        assert_eq!((fired[0].2 - start).as_secs(), 46);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_after_claim_schedules_a_fresh_run() {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        // Action that takes a while, so the second trigger lands mid-run.
        let action = move |key: String, reason: String| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::time::sleep(Duration::from_secs(100)).await;
                sink.lock().unwrap().push((key, reason, Instant::now()));
            }
            .boxed()
        };
        let d = Debouncer::new(Duration::from_secs(10), action);

        d.trigger("k#1".to_string(), "first");
        advance(20).await;
        assert_eq!(d.pending_count(), 0, "claimed entry leaves the table");

        d.trigger("k#1".to_string(), "second");
        assert!(d.is_pending(&"k#1".to_string()));

        advance(200).await;
        let fired = fired.lock().unwrap();
        let reasons: Vec<_> = fired.iter().map(|f| f.1.as_str()).collect();
        assert_eq!(reasons, ["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let (fired, action) = recorder();
        let d = Debouncer::new(Duration::from_secs(10), action);

        d.trigger("a#1".to_string(), "x");
        d.trigger("b#2".to_string(), "y");
        assert_eq!(d.shutdown(), 2);
        assert_eq!(d.pending_count(), 0);

        advance(60).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_still_fires_once() {
        let (fired, action) = recorder();
        let d = Debouncer::new(Duration::ZERO, action);
        d.trigger("a#1".to_string(), "x");
        advance(1).await;
        assert_eq!(fired.lock().unwrap().len(), 1);
    }
}
