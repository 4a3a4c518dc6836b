//! Debounced play counting for one listening session.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::PlayCounter;
use crate::analytics::TrafficSource;

/// How long a song has to keep playing before it counts as a play.
pub const DEFAULT_PLAY_THRESHOLD: Duration = Duration::from_secs(30);

struct PendingTimer {
    timer_id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TrackerState {
    timers: HashMap<String, PendingTimer>,
    /// Songs whose increment succeeded.
    counted: HashSet<String>,
    /// Songs whose increment was issued, whatever its outcome.
    attempted: HashSet<String>,
    next_timer_id: u64,
    /// Bumped on reset so that increments issued before it are not recorded.
    epoch: u64,
}

struct Inner<C> {
    counter: C,
    threshold: Duration,
    state: Mutex<TrackerState>,
}

/// Counts each song at most once per session, and only after it has played
/// for the threshold without being stopped or restarted.
///
/// Clones share the same session. Timers are tokio tasks, so `start` must be
/// called from within a runtime.
pub struct PlayTracker<C: PlayCounter> {
    inner: Arc<Inner<C>>,
}

impl<C: PlayCounter> Clone for PlayTracker<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: PlayCounter> PlayTracker<C> {
    pub fn new(counter: C) -> Self {
        Self::with_threshold(counter, DEFAULT_PLAY_THRESHOLD)
    }

    pub fn with_threshold(counter: C, threshold: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                counter,
                threshold,
                state: Mutex::new(TrackerState::default()),
            }),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.inner.threshold
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        lock_state(&self.inner)
    }

    /// Starts (or restarts) the timer for a song.
    pub fn start(&self, song_id: &str, traffic_source: Option<TrafficSource>) {
        let mut state = self.state();

        if let Some(previous) = state.timers.remove(song_id) {
            previous.handle.abort();
        }
        if state.counted.contains(song_id) || state.attempted.contains(song_id) {
            debug!("Play of {} already counted this session", song_id);
            return;
        }

        state.next_timer_id += 1;
        let timer_id = state.next_timer_id;
        let handle = tokio::spawn(fire_after_threshold(
            self.inner.clone(),
            song_id.to_string(),
            traffic_source,
            timer_id,
        ));
        state
            .timers
            .insert(song_id.to_string(), PendingTimer { timer_id, handle });
    }

    /// Cancels the timer for a song without counting it.
    pub fn stop(&self, song_id: &str) {
        if let Some(timer) = self.state().timers.remove(song_id) {
            timer.handle.abort();
            debug!("Stopped play timer for {}", song_id);
        }
    }

    /// Cancels every timer and forgets which songs were counted.
    pub fn reset(&self) {
        let mut state = self.state();
        for (_, timer) in state.timers.drain() {
            timer.handle.abort();
        }
        state.counted.clear();
        state.attempted.clear();
        state.epoch += 1;
    }

    pub fn is_counted(&self, song_id: &str) -> bool {
        self.state().counted.contains(song_id)
    }

    pub fn is_tracking(&self, song_id: &str) -> bool {
        self.state().timers.contains_key(song_id)
    }

    pub fn pending_count(&self) -> usize {
        self.state().timers.len()
    }
}

fn lock_state<C>(inner: &Inner<C>) -> MutexGuard<'_, TrackerState> {
    inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn fire_after_threshold<C: PlayCounter>(
    inner: Arc<Inner<C>>,
    song_id: String,
    traffic_source: Option<TrafficSource>,
    timer_id: u64,
) {
    tokio::time::sleep(inner.threshold).await;

    // Past this point the timer can no longer be cancelled.
    let epoch = {
        let mut state = lock_state(&inner);
        match state.timers.get(&song_id) {
            Some(timer) if timer.timer_id == timer_id => {}
            _ => return,
        }
        state.timers.remove(&song_id);
        state.attempted.insert(song_id.clone());
        state.epoch
    };

    match inner
        .counter
        .increment(&song_id, traffic_source.as_ref())
        .await
    {
        Ok(analytics) => {
            debug!(
                "Counted play of {} ({} total)",
                song_id, analytics.total_plays
            );
            let mut state = lock_state(&inner);
            if state.epoch == epoch {
                state.counted.insert(song_id);
            }
        }
        Err(e) => warn!("Failed to count play of {}: {:#}", song_id, e),
    }
}
