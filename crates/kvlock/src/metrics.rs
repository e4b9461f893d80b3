// Metrics for lock operations
// Counters are emitted through the `metrics` facade; nothing is recorded unless the caller installs a recorder

use metrics::{counter, describe_counter};

/// Which lock (or lock half) an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockKind {
    Mutex,
    Read,
    Write,
}

impl LockKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            LockKind::Mutex => "mutex",
            LockKind::Read => "read",
            LockKind::Write => "write",
        }
    }
}

/// Register metric descriptions with the installed recorder
/// Call once at startup, after installing a recorder
pub fn describe_metrics() {
    describe_counter!("kvlock_acquire_total", "Total number of successful lock acquisitions");
    describe_counter!(
        "kvlock_contention_total",
        "Total number of acquisition attempts that found the lock held"
    );
    describe_counter!("kvlock_release_total", "Total number of lock releases");
    describe_counter!(
        "kvlock_ownership_conflict_total",
        "Total number of releases or renewals that found another owner's token"
    );
    describe_counter!(
        "kvlock_cancelled_total",
        "Total number of waits aborted by cancellation or deadline"
    );
}

pub(crate) fn record_acquire(kind: LockKind) {
    counter!("kvlock_acquire_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_contention(kind: LockKind) {
    counter!("kvlock_contention_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_release(kind: LockKind) {
    counter!("kvlock_release_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_conflict(kind: LockKind) {
    counter!("kvlock_ownership_conflict_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_cancelled(kind: LockKind) {
    counter!("kvlock_cancelled_total", "kind" => kind.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(LockKind::Mutex.as_str(), "mutex");
        assert_eq!(LockKind::Read.as_str(), "read");
        assert_eq!(LockKind::Write.as_str(), "write");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_acquire(LockKind::Mutex);
        record_contention(LockKind::Write);
        record_release(LockKind::Read);
        record_conflict(LockKind::Mutex);
        record_cancelled(LockKind::Write);
    }
}
