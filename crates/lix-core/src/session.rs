//! Per-connection streaming session state (C7): debounce bookkeeping and a
//! small bounded cache, owned single-threaded by the connection task.
//!
//! No locking is needed here: a session is only ever touched by the task
//! that owns its connection.

use std::collections::HashMap;
use std::time::Duration;

use uuid::Uuid;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounce window bounds: adaptive, clamped to [100ms, 800ms].
pub const DEBOUNCE_MIN: Duration = Duration::from_millis(100);
pub const DEBOUNCE_MAX: Duration = Duration::from_millis(800);

/// Relative length-change threshold above which a debounced message is
/// let through early.
const LENGTH_CHANGE_THRESHOLD: f64 = 0.15;

/// Length, in characters, above which the adaptive debounce window is
/// widened by 1.2x.
const LONG_TEXT_CHARS: usize = 5_000;

/// A system-load sample used to recompute the debounce window. `cpu`/`mem`
/// are expected in `[0.0, 100.0]`.
#[derive(Debug, Clone, Copy)]
pub struct LoadSample {
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

impl LoadSample {
    /// Combined load factor sigma = (cpu% + mem%) / 2, scaled to [0, 1].
    pub fn sigma(&self) -> f64 {
        (self.cpu_percent + self.mem_percent) / 200.0
    }
}

/// Bounded per-session cache of fingerprint -> cached metrics-only result
/// key. Cleared wholesale once it exceeds `capacity`,
#[derive(Debug, Clone)]
pub struct SessionCache {
    capacity: usize,
    entries: HashMap<Fingerprint, Fingerprint>,
}

impl SessionCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: HashMap::new() }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&Fingerprint> {
        self.entries.get(key)
    }

    /// Insert `key -> value`, clearing the whole cache first if it is
    /// already at capacity.
    pub fn insert(&mut self, key: Fingerprint, value: Fingerprint) {
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of [`Session::admit`]: whether a newly arrived message should be
/// processed now, dropped, and whether recommendations should accompany the
/// eventual detailed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Identical to the last processed text; drop silently.
    DuplicateDrop,
    /// Inside the debounce window and the length change is below threshold;
    /// drop silently.
    DebouncedDrop,
    /// Process now. `with_recommendations` is set when word count > 15 and
    /// the gap since the last process time exceeds 700ms.
    Process { with_recommendations: bool },
}

/// Per-connection streaming state. Owned by the task handling one
/// connection; no interior locking.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    last_text: Option<String>,
    last_word_count: usize,
    last_process_elapsed: Duration,
    pub debounce_window: Duration,
    pub cache: SessionCache,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            last_text: None,
            last_word_count: 0,
            last_process_elapsed: Duration::from_secs(3600),
            debounce_window: DEBOUNCE_MIN,
            cache: SessionCache::new(20),
        }
    }

    /// Recompute `debounce_window` from a system load sample:
    /// sigma > 0.8 -> max; sigma > 0.5 -> linear interpolation
    /// between min and max; else -> min. Widened 1.2x for long current
    /// text.
    pub fn recompute_debounce(&mut self, load: LoadSample, current_len_chars: usize) {
        let sigma = load.sigma();
        let min = DEBOUNCE_MIN.as_millis() as f64;
        let max = DEBOUNCE_MAX.as_millis() as f64;
        let mut window_ms = if sigma > 0.8 {
            max
        } else if sigma > 0.5 {
            min + (max - min) * ((sigma - 0.5) / 0.3)
        } else {
            min
        };
        if current_len_chars > LONG_TEXT_CHARS {
            window_ms *= 1.2;
        }
        self.debounce_window = Duration::from_millis(window_ms.clamp(min, max * 1.2) as u64);
    }

    /// Decide whether an incoming `text` should be processed now, given
    /// `elapsed_since_last` (time since the last processed message).
    pub fn admit(&self, text: &str, elapsed_since_last: Duration, word_count: usize) -> Admission {
        if self.last_text.as_deref() == Some(text) {
            return Admission::DuplicateDrop;
        }

        let prev_len = self.last_text.as_ref().map(|t| t.chars().count()).unwrap_or(0);
        let cur_len = text.chars().count();
        let length_change_ratio =
            if prev_len > 0 { (cur_len as f64 - prev_len as f64).abs() / prev_len as f64 } else { f64::INFINITY };

        if elapsed_since_last < self.debounce_window && length_change_ratio < LENGTH_CHANGE_THRESHOLD {
            return Admission::DebouncedDrop;
        }

        let with_recommendations = word_count > 15 && elapsed_since_last > Duration::from_millis(700);
        Admission::Process { with_recommendations }
    }

    /// Record that `text` (with `word_count` words) was just processed.
    pub fn record_processed(&mut self, text: &str, word_count: usize) {
        self.last_text = Some(text.to_string());
        self.last_word_count = word_count;
        self.last_process_elapsed = Duration::ZERO;
    }

    pub fn last_word_count(&self) -> usize {
        self.last_word_count
    }

    /// Whether a partial (metrics-only) result should be emitted
    /// synchronously before the detailed result: for
    /// texts over 1,000 chars, or when the last run was under 500ms ago.
    pub fn wants_partial_first(current_len_chars: usize, elapsed_since_last: Duration) -> bool {
        current_len_chars > 1_000 || elapsed_since_last < Duration::from_millis(500)
    }

    /// Whether only the partial result should be sent (no synchronous
    /// detailed analysis at all) because the text is very large.
    pub fn partial_only(current_len_chars: usize) -> bool {
        current_len_chars > 10_000
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_text_is_dropped() {
        let mut session = Session::new();
        session.record_processed("Hei verden", 2);
        let admission = session.admit("Hei verden", Duration::from_secs(5), 2);
        assert_eq!(admission, Admission::DuplicateDrop);
    }

    #[test]
    fn scenario_s4_large_length_change_bypasses_debounce() {
        let mut session = Session::new();
        session.debounce_window = DEBOUNCE_MAX;
        session.record_processed("短い短い短い短い短い短い短い短い短い短い", 1);
        let longer = "短い短い短い短い短い短い短い短い短い短い短い短い短い短い"; // 40% longer
        let admission = session.admit(longer, Duration::from_millis(10), 1);
        assert_eq!(admission, Admission::Process { with_recommendations: false });
    }

    #[test]
    fn small_change_within_window_is_debounced() {
        let mut session = Session::new();
        session.debounce_window = DEBOUNCE_MAX;
        session.record_processed("Dette er en test med flere ord her", 7);
        let admission = session.admit("Dette er en test med flere ord med", Duration::from_millis(10), 7);
        assert_eq!(admission, Admission::DebouncedDrop);
    }

    #[test]
    fn recommendations_gate_on_word_count_and_elapsed() {
        let session = Session::new();
        let admission = session.admit("x".repeat(50).as_str(), Duration::from_millis(900), 20);
        assert_eq!(admission, Admission::Process { with_recommendations: true });

        let admission = session.admit("y".repeat(50).as_str(), Duration::from_millis(900), 10);
        assert_eq!(admission, Admission::Process { with_recommendations: false });
    }

    #[test]
    fn debounce_window_scales_with_system_load() {
        let mut session = Session::new();
        session.recompute_debounce(LoadSample { cpu_percent: 10.0, mem_percent: 10.0 }, 100);
        assert_eq!(session.debounce_window, DEBOUNCE_MIN);

        session.recompute_debounce(LoadSample { cpu_percent: 95.0, mem_percent: 95.0 }, 100);
        assert_eq!(session.debounce_window, DEBOUNCE_MAX);
    }

    #[test]
    fn debounce_window_widens_for_long_text() {
        let mut session = Session::new();
        session.recompute_debounce(LoadSample { cpu_percent: 10.0, mem_percent: 10.0 }, 100);
        let short_window = session.debounce_window;
        session.recompute_debounce(LoadSample { cpu_percent: 10.0, mem_percent: 10.0 }, 6_000);
        assert!(session.debounce_window > short_window);
    }

    #[test]
    fn partial_first_thresholds() {
        assert!(Session::wants_partial_first(2_000, Duration::from_secs(5)));
        assert!(Session::wants_partial_first(200, Duration::from_millis(100)));
        assert!(!Session::wants_partial_first(200, Duration::from_secs(5)));
        assert!(Session::partial_only(10_001));
        assert!(!Session::partial_only(9_000));
    }

    #[test]
    fn session_cache_clears_wholesale_on_overflow() {
        let mut cache = SessionCache::new(2);
        let fp = |s: &str| Fingerprint::compute(s, false, false);
        cache.insert(fp("a"), fp("a-result"));
        cache.insert(fp("b"), fp("b-result"));
        assert_eq!(cache.len(), 2);
        cache.insert(fp("c"), fp("c-result"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fp("a")).is_none());
    }
}
