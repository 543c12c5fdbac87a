use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::store::FrameStore;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Whether and when keys that stopped receiving frames are dropped.
///
/// The default keeps every key forever: memory then grows with the number
/// of distinct device/stream pairs ever seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn keep_forever() -> Self {
        Self { max_age: None }
    }

    pub fn evict_after(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.max_age.map(|age| age.min(MAX_SWEEP_INTERVAL))
    }

    /// Run one sweep; returns the number of evicted keys.
    pub fn sweep(&self, store: &FrameStore) -> usize {
        match self.max_age {
            Some(max_age) => store.evict_older_than(max_age),
            None => 0,
        }
    }
}

/// Sweep forever on the policy's interval. Returns immediately if the
/// policy never evicts. `on_evict` sees the count of every non-empty sweep.
pub async fn run_sweeper<F>(store: Arc<FrameStore>, policy: RetentionPolicy, on_evict: F)
where
    F: Fn(usize) + Send,
{
    let Some(period) = policy.sweep_interval() else {
        return;
    };

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let evicted = policy.sweep(&store);
        if evicted > 0 {
            info!(evicted, remaining = store.len(), "evicted stale stream keys");
            on_evict(evicted);
        }
    }
}
