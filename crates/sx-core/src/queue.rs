//! Bounded threat queue between the detector and the analysis pipeline.
//!
//! Single producer (the detector, plus the push-based ingest surface),
//! single consumer (the pipeline loop). Both operations are non-blocking:
//! a full queue evicts its oldest entry so the detector is never stalled
//! by a slow consumer. All access goes through one mutex, held only for
//! the duration of the queue operation itself.

use crate::event::ThreatEvent;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::warn;

/// Default capacity, matching the demonstrated deployment.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Event enqueued with room to spare.
    Queued,
    /// Event enqueued; the oldest entry was evicted to make room.
    DroppedOldest,
}

struct QueueInner {
    events: VecDeque<ThreatEvent>,
    dropped: u64,
}

/// Bounded FIFO of threat events.
pub struct ThreatQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
}

impl ThreatQueue {
    /// Creates a queue with the given capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                events: VecDeque::new(),
                dropped: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues an event, evicting the oldest entry if the queue is full.
    pub fn push(&self, event: ThreatEvent) -> PushOutcome {
        let mut inner = self.inner.lock().expect("threat queue lock poisoned");
        let mut outcome = PushOutcome::Queued;
        if inner.events.len() >= self.capacity {
            if let Some(evicted) = inner.events.pop_front() {
                inner.dropped += 1;
                warn!(
                    pid = evicted.process_id,
                    signature = %evicted.signature_id,
                    dropped_total = inner.dropped,
                    "Threat queue full, dropping oldest event"
                );
            }
            outcome = PushOutcome::DroppedOldest;
        }
        inner.events.push_back(event);
        outcome
    }

    /// Removes and returns the oldest event, if any.
    pub fn pop(&self) -> Option<ThreatEvent> {
        self.inner
            .lock()
            .expect("threat queue lock poisoned")
            .events
            .pop_front()
    }

    /// Current number of queued events.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("threat queue lock poisoned")
            .events
            .len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of events evicted due to overflow.
    pub fn dropped(&self) -> u64 {
        self.inner
            .lock()
            .expect("threat queue lock poisoned")
            .dropped
    }
}

impl Default for ThreatQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ThreatKind;

    fn event(pid: u32) -> ThreatEvent {
        ThreatEvent::new(
            pid,
            "powershell.exe",
            "powershell.exe -NoP",
            "sig-1",
            ThreatKind::FilelessAttack,
        )
    }

    #[test]
    fn test_fifo_order() {
        let queue = ThreatQueue::new(10);
        queue.push(event(1));
        queue.push(event(2));
        queue.push(event(3));

        assert_eq!(queue.pop().unwrap().process_id, 1);
        assert_eq!(queue.pop().unwrap().process_id, 2);
        assert_eq!(queue.pop().unwrap().process_id, 3);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = ThreatQueue::new(2);
        assert_eq!(queue.push(event(1)), PushOutcome::Queued);
        assert_eq!(queue.push(event(2)), PushOutcome::Queued);
        assert_eq!(queue.push(event(3)), PushOutcome::DroppedOldest);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        // Oldest (pid 1) was evicted.
        assert_eq!(queue.pop().unwrap().process_id, 2);
        assert_eq!(queue.pop().unwrap().process_id, 3);
    }

    #[test]
    fn test_push_never_blocks_at_capacity() {
        let queue = ThreatQueue::new(1);
        for pid in 0..50 {
            queue.push(event(pid));
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dropped(), 49);
        assert_eq!(queue.pop().unwrap().process_id, 49);
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;

        let queue = Arc::new(ThreatQueue::new(100));
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            for pid in 0..20 {
                producer.push(event(pid));
            }
        });
        handle.join().unwrap();

        let mut seen = Vec::new();
        while let Some(e) = queue.pop() {
            seen.push(e.process_id);
        }
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }
}
