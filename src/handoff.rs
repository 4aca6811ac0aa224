//! Verdict handoff between the grab thread and the dispatcher thread
//!
//! The grab thread must decide quickly whether an original event is
//! re-emitted. It hands the event over through a bounded queue and waits at
//! most until a deadline for the verdict keyed by the event's sequence number.
//! Anything that goes wrong (queue full, dispatcher gone, deadline passed)
//! resolves to [`Verdict::Propagate`], so input is never eaten by accident.

use crate::event::RawPointerEvent;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Whether the original event continues down the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Propagate,
    Suppress,
}

/// Event waiting for a verdict on the dispatcher side
#[derive(Debug, Clone, Copy)]
pub struct PendingEvent {
    pub seq: u64,
    pub event: RawPointerEvent,
}

#[derive(Debug, Clone, Copy)]
struct Reply {
    seq: u64,
    verdict: Verdict,
}

/// Grab-thread side: submits events and waits for verdicts
pub struct HookEnd {
    requests: SyncSender<PendingEvent>,
    replies: Receiver<Reply>,
    next_seq: u64,
}

/// Dispatcher side: receives events and answers them
pub struct DispatchEnd {
    requests: Receiver<PendingEvent>,
    replies: Sender<Reply>,
}

/// Create a connected pair with room for `capacity` pending events
pub fn channel(capacity: usize) -> (HookEnd, DispatchEnd) {
    let (req_tx, req_rx) = mpsc::sync_channel(capacity.max(1));
    let (reply_tx, reply_rx) = mpsc::channel();
    (
        HookEnd {
            requests: req_tx,
            replies: reply_rx,
            next_seq: 0,
        },
        DispatchEnd {
            requests: req_rx,
            replies: reply_tx,
        },
    )
}

impl HookEnd {
    /// Submit one event and wait up to `timeout` for its verdict
    pub fn request(&mut self, event: RawPointerEvent, timeout: Duration) -> Verdict {
        let seq = self.next_seq;
        self.next_seq += 1;

        match self.requests.try_send(PendingEvent { seq, event }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Dispatcher queue full, letting event #{} through", seq);
                return Verdict::Propagate;
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Dispatcher gone, letting event #{} through", seq);
                return Verdict::Propagate;
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.seq == seq => return reply.verdict,
                Ok(reply) => {
                    // Answer to an earlier event that already timed out
                    trace!("Discarding stale verdict for event #{}", reply.seq);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "No verdict for event #{} within {:?}, letting it through",
                        seq, timeout
                    );
                    return Verdict::Propagate;
                }
                Err(RecvTimeoutError::Disconnected) => return Verdict::Propagate,
            }
        }
    }
}

impl DispatchEnd {
    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<PendingEvent, RecvTimeoutError> {
        self.requests.recv_timeout(timeout)
    }

    /// Answer a previously received event. A vanished grab thread is ignored.
    pub fn reply(&self, seq: u64, verdict: Verdict) {
        let _ = self.replies.send(Reply { seq, verdict });
    }
}
