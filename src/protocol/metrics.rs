//! Process-wide codec counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Track codec counters without external dependencies.
pub(crate) struct Metrics;

static ENCODED_MESSAGES: AtomicU64 = AtomicU64::new(0);
static DECODED_MESSAGES: AtomicU64 = AtomicU64::new(0);
static ENCODE_SUSPENSIONS: AtomicU64 = AtomicU64::new(0);
static DECODE_SUSPENSIONS: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static BYTES_READ: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

/// Direction of codec work.
#[derive(Clone, Copy)]
pub(crate) enum Direction {
    Encode,
    Decode,
}

impl Metrics {
    #[inline]
    pub(crate) fn record_complete(direction: Direction) {
        match direction {
            Direction::Encode => ENCODED_MESSAGES.fetch_add(1, Ordering::Relaxed),
            Direction::Decode => DECODED_MESSAGES.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub(crate) fn record_suspension(direction: Direction) {
        match direction {
            Direction::Encode => ENCODE_SUSPENSIONS.fetch_add(1, Ordering::Relaxed),
            Direction::Decode => DECODE_SUSPENSIONS.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub(crate) fn record_bytes(direction: Direction, count: usize) {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        match direction {
            Direction::Encode => BYTES_WRITTEN.fetch_add(count, Ordering::Relaxed),
            Direction::Decode => BYTES_READ.fetch_add(count, Ordering::Relaxed),
        };
    }

    #[inline]
    pub(crate) fn record_error() {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            encoded_messages: ENCODED_MESSAGES.load(Ordering::Relaxed),
            decoded_messages: DECODED_MESSAGES.load(Ordering::Relaxed),
            encode_suspensions: ENCODE_SUSPENSIONS.load(Ordering::Relaxed),
            decode_suspensions: DECODE_SUSPENSIONS.load(Ordering::Relaxed),
            bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
            bytes_read: BYTES_READ.load(Ordering::Relaxed),
            total_errors: ERROR_COUNT.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide codec counters.
#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    Metrics::totals()
}

/// Lightweight snapshot of codec counters.
#[derive(Default, Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Messages fully encoded
    pub encoded_messages: u64,
    /// Messages fully decoded
    pub decoded_messages: u64,
    /// Encode calls that returned before completion
    pub encode_suspensions: u64,
    /// Decode calls that returned before completion
    pub decode_suspensions: u64,
    /// Bytes produced by encoders
    pub bytes_written: u64,
    /// Bytes consumed by decoders
    pub bytes_read: u64,
    /// Encode and decode failures
    pub total_errors: u64,
}

impl MetricsSnapshot {
    /// Average encode calls needed per completed message.
    #[must_use]
    pub fn avg_encode_calls(&self) -> Option<u64> {
        average_calls(self.encode_suspensions, self.encoded_messages)
    }

    /// Average decode calls needed per completed message.
    #[must_use]
    pub fn avg_decode_calls(&self) -> Option<u64> {
        average_calls(self.decode_suspensions, self.decoded_messages)
    }
}

fn average_calls(suspensions: u64, completed: u64) -> Option<u64> {
    if completed == 0 {
        return None;
    }

    Some((suspensions + completed) / completed)
}
