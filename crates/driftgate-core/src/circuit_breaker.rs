use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Count,
    Time,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_threshold: Duration,
    pub minimum_number_of_calls: usize,
    pub sliding_window_size: usize,
    pub window_kind: WindowKind,
    pub permitted_number_of_calls_in_half_open_state: usize,
    pub max_wait_duration_in_half_open_state: Duration,
    /// Only meaningful for `WindowKind::Time`: how far back outcomes are
    /// retained before being trimmed.
    pub time_window_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    /// Defaults applied when a field is invalid or zero (spec §4.4).
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            slow_call_rate_threshold: 0.5,
            slow_call_duration_threshold: Duration::from_secs(5),
            minimum_number_of_calls: 10,
            sliding_window_size: 100,
            window_kind: WindowKind::Count,
            permitted_number_of_calls_in_half_open_state: 5,
            max_wait_duration_in_half_open_state: Duration::from_secs(60),
            time_window_duration: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn sanitized(mut self) -> Self {
        let default = CircuitBreakerConfig::default();
        if !(self.failure_rate_threshold > 0.0) {
            self.failure_rate_threshold = default.failure_rate_threshold;
        }
        if !(self.slow_call_rate_threshold > 0.0) {
            self.slow_call_rate_threshold = default.slow_call_rate_threshold;
        }
        if self.slow_call_duration_threshold.is_zero() {
            self.slow_call_duration_threshold = default.slow_call_duration_threshold;
        }
        if self.minimum_number_of_calls == 0 {
            self.minimum_number_of_calls = default.minimum_number_of_calls;
        }
        if self.sliding_window_size == 0 {
            self.sliding_window_size = default.sliding_window_size;
        }
        if self.permitted_number_of_calls_in_half_open_state == 0 {
            self.permitted_number_of_calls_in_half_open_state =
                default.permitted_number_of_calls_in_half_open_state;
        }
        if self.max_wait_duration_in_half_open_state.is_zero() {
            self.max_wait_duration_in_half_open_state =
                default.max_wait_duration_in_half_open_state;
        }
        if self.time_window_duration.is_zero() {
            self.time_window_duration = default.time_window_duration;
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    success: bool,
    is_slow: bool,
    #[allow(dead_code)]
    timestamp: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Metrics {
    pub total_calls: usize,
    pub failed_calls: usize,
    pub slow_calls: usize,
}

impl Metrics {
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.failed_calls as f64 / self.total_calls as f64
        }
    }

    pub fn slow_call_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.slow_calls as f64 / self.total_calls as f64
        }
    }
}

/// CountBased: fixed-capacity ring buffer. TimeBased: append-only deque
/// trimmed on write and on read when stale (spec §4.4).
enum SlidingWindow {
    Count {
        buffer: Vec<Option<Outcome>>,
        write_pos: usize,
        full: bool,
    },
    Time {
        entries: VecDeque<Outcome>,
        window_duration: Duration,
        last_cleanup: Instant,
    },
}

impl SlidingWindow {
    fn new(kind: WindowKind, size: usize, window_duration: Duration) -> Self {
        match kind {
            WindowKind::Count => SlidingWindow::Count {
                buffer: vec![None; size],
                write_pos: 0,
                full: false,
            },
            WindowKind::Time => SlidingWindow::Time {
                entries: VecDeque::new(),
                window_duration,
                last_cleanup: Instant::now(),
            },
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match self {
            SlidingWindow::Count {
                buffer,
                write_pos,
                full,
            } => {
                let len = buffer.len();
                buffer[*write_pos] = Some(outcome);
                *write_pos = (*write_pos + 1) % len;
                if *write_pos == 0 {
                    *full = true;
                }
            }
            SlidingWindow::Time {
                entries,
                window_duration,
                last_cleanup,
            } => {
                entries.push_back(outcome);
                let high_water = entries.len() > 1024;
                let stale = last_cleanup.elapsed() >= *window_duration / 4;
                if high_water || stale {
                    Self::trim(entries, *window_duration);
                    *last_cleanup = Instant::now();
                }
            }
        }
    }

    fn trim(entries: &mut VecDeque<Outcome>, window_duration: Duration) {
        let cutoff = Instant::now()
            .checked_sub(window_duration)
            .unwrap_or_else(Instant::now);
        while let Some(front) = entries.front() {
            if front.timestamp < cutoff {
                entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn metrics(&mut self) -> Metrics {
        match self {
            SlidingWindow::Count {
                buffer,
                write_pos,
                full,
            } => {
                let populated: &[Option<Outcome>] = if *full {
                    buffer
                } else {
                    &buffer[..*write_pos]
                };
                let mut metrics = Metrics::default();
                for outcome in populated.iter().flatten() {
                    metrics.total_calls += 1;
                    if !outcome.success {
                        metrics.failed_calls += 1;
                    }
                    if outcome.is_slow {
                        metrics.slow_calls += 1;
                    }
                }
                metrics
            }
            SlidingWindow::Time {
                entries,
                window_duration,
                last_cleanup,
            } => {
                let stale = entries.len() >= 10_000 || last_cleanup.elapsed() >= *window_duration / 2;
                if stale {
                    Self::trim(entries, *window_duration);
                    *last_cleanup = Instant::now();
                }
                let mut metrics = Metrics::default();
                for outcome in entries.iter() {
                    metrics.total_calls += 1;
                    if !outcome.success {
                        metrics.failed_calls += 1;
                    }
                    if outcome.is_slow {
                        metrics.slow_calls += 1;
                    }
                }
                metrics
            }
        }
    }

    fn reset(&mut self) {
        match self {
            SlidingWindow::Count {
                buffer,
                write_pos,
                full,
            } => {
                buffer.iter_mut().for_each(|slot| *slot = None);
                *write_pos = 0;
                *full = false;
            }
            SlidingWindow::Time { entries, .. } => entries.clear(),
        }
    }
}

struct Inner {
    state: CircuitState,
    window: SlidingWindow,
    opened_at: Option<Instant>,
    half_open_permits_remaining: usize,
}

/// Per-provider circuit breaker state machine (Closed/Open/HalfOpen),
/// serialized behind a single mutex per spec §3's "state transitions are
/// serialized via a per-provider lock" invariant.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let config = config.sanitized();
        let window = SlidingWindow::new(
            config.window_kind,
            config.sliding_window_size,
            config.time_window_duration,
        );
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                half_open_permits_remaining: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Whether a call may proceed right now. Handles the Open → HalfOpen
    /// transition as a side effect when the wait duration has elapsed.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                if opened_at.elapsed() >= self.config.max_wait_duration_in_half_open_state {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_permits_remaining =
                        self.config.permitted_number_of_calls_in_half_open_state;
                    inner.window.reset();
                    tracing::info!("circuit half-open, probing upstream");
                    self.try_consume_half_open_permit(&mut inner)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.try_consume_half_open_permit(&mut inner),
        }
    }

    fn try_consume_half_open_permit(&self, inner: &mut Inner) -> bool {
        if inner.half_open_permits_remaining > 0 {
            inner.half_open_permits_remaining -= 1;
            true
        } else {
            false
        }
    }

    /// Record the outcome of an admitted call and evaluate transitions.
    pub fn record(&self, success: bool, latency: Duration) {
        let mut inner = self.inner.lock().unwrap();
        let is_slow = latency >= self.config.slow_call_duration_threshold;
        inner.window.record(Outcome {
            success,
            is_slow,
            timestamp: Instant::now(),
        });
        let metrics = inner.window.metrics();
        let breached = metrics.total_calls >= self.config.minimum_number_of_calls
            && (metrics.failure_rate() >= self.config.failure_rate_threshold
                || metrics.slow_call_rate() >= self.config.slow_call_rate_threshold);

        match inner.state {
            CircuitState::Closed => {
                if breached {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        failure_rate = metrics.failure_rate(),
                        slow_call_rate = metrics.slow_call_rate(),
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                if breached {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!("circuit re-opened after failed probe");
                } else if inner.half_open_permits_remaining == 0 {
                    inner.state = CircuitState::Closed;
                    inner.window.reset();
                    inner.opened_at = None;
                    tracing::info!("circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn force_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
    }

    pub fn force_close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.window.reset();
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.window.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(minimum: usize, size: usize, failure_rate: f64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            minimum_number_of_calls: minimum,
            sliding_window_size: size,
            failure_rate_threshold: failure_rate,
            max_wait_duration_in_half_open_state: Duration::from_millis(50),
            ..CircuitBreakerConfig::default()
        }
    }

    #[test]
    fn no_transition_before_minimum_calls() {
        let breaker = CircuitBreaker::new(config(5, 10, 0.5));
        for _ in 0..4 {
            assert!(breaker.try_acquire());
            breaker.record(false, Duration::from_millis(1));
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_after_minimum_calls_breach_failure_rate() {
        let breaker = CircuitBreaker::new(config(5, 10, 0.5));
        for _ in 0..5 {
            assert!(breaker.try_acquire());
            breaker.record(false, Duration::from_millis(1));
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn open_rejects_until_wait_duration_elapses() {
        let breaker = CircuitBreaker::new(config(1, 10, 0.1));
        assert!(breaker.try_acquire());
        breaker.record(false, Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.try_acquire());
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.try_acquire());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_successful_permits() {
        let mut cfg = config(1, 10, 0.5);
        cfg.permitted_number_of_calls_in_half_open_state = 2;
        let breaker = CircuitBreaker::new(cfg);
        breaker.force_open();
        // Force opened_at to be old enough by sleeping past the wait window.
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.try_acquire());
        breaker.record(true, Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire());
        breaker.record(true, Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_breach_reopens() {
        let mut cfg = config(1, 10, 0.5);
        cfg.permitted_number_of_calls_in_half_open_state = 3;
        let breaker = CircuitBreaker::new(cfg);
        breaker.force_open();
        std::thread::sleep(Duration::from_millis(60));
        assert!(breaker.try_acquire());
        breaker.record(false, Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn slow_calls_count_toward_rate() {
        let mut cfg = config(2, 10, 2.0); // failure rate threshold unreachable
        cfg.slow_call_rate_threshold = 0.5;
        cfg.slow_call_duration_threshold = Duration::from_millis(10);
        let breaker = CircuitBreaker::new(cfg);
        breaker.try_acquire();
        breaker.record(true, Duration::from_millis(50));
        breaker.try_acquire();
        breaker.record(true, Duration::from_millis(50));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn reset_clears_window_and_state() {
        let breaker = CircuitBreaker::new(config(1, 10, 0.1));
        breaker.try_acquire();
        breaker.record(false, Duration::from_millis(1));
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire());
    }
}
