use std::collections::VecDeque;

/// Fixed-capacity, time-ordered buffer of scalar samples for one session.
///
/// Ring-buffer semantics: the oldest sample is evicted when the window is
/// full. Timestamps must be monotonically non-decreasing; a sample that
/// would violate that is dropped (a stale frame from a reset race must not
/// corrupt the new stream's window).
#[derive(Debug, Clone)]
pub struct SignalWindow {
    samples: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl SignalWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append a `(sample, timestamp)` pair. Returns false (and drops the
    /// sample) if the timestamp precedes the newest buffered one.
    pub fn push(&mut self, sample: f64, timestamp: f64) -> bool {
        if let Some(&(_, last_ts)) = self.samples.back() {
            if timestamp < last_ts {
                tracing::debug!(timestamp, last_ts, "out-of-order sample dropped");
                return false;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back((sample, timestamp));
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Buffered sample values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|&(v, _)| v).collect()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|&(_, ts)| ts)
    }
}
