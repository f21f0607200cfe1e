// Round rendezvous: one lock, two condition variables

use crate::core::Block;
use crate::error::SyncError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const ROUND_LOCK: &str = "round lock";
const TEMPLATE_READY: &str = "template-ready condition";
const SUBMISSION_READY: &str = "submission-ready condition";

/// Shared round state. Only reachable through `RoundMonitor`.
struct RoundState {
    template: Block,
    /// Mailbox; `Some` means a submission is pending
    submission: Option<Block>,
    round_open: bool,
    /// Bumped on every publish
    epoch: u64,
    closed: bool,
}

/// A worker's private copy of an open round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    pub epoch: u64,
    pub template: Block,
}

/// What happened to a submitted candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Written into the mailbox, coordinator signalled
    Delivered,
    /// Round already taken or mailbox occupied; candidate discarded
    Dropped,
    /// Monitor closed
    Closed,
}

/// Point-in-time view of the round state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub epoch: u64,
    pub template: Block,
    pub round_open: bool,
    pub submission_pending: bool,
    pub closed: bool,
}

/// Monitor guarding the current template and the submission mailbox.
///
/// Workers wait on `template_ready`, which `publish` broadcasts. The
/// coordinator waits on `submission_ready`, which a delivering worker
/// signals. Both waits re-check their predicate after every wakeup.
///
/// The epoch and closed flag are mirrored into atomics so a running nonce
/// search can notice a new round without taking the lock.
pub struct RoundMonitor {
    state: Mutex<RoundState>,
    template_ready: Condvar,
    submission_ready: Condvar,
    epoch: AtomicU64,
    closed: AtomicBool,
}

impl RoundMonitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RoundState {
                template: Block::template(0, 0, 0),
                submission: None,
                round_open: false,
                epoch: 0,
                closed: false,
            }),
            template_ready: Condvar::new(),
            submission_ready: Condvar::new(),
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RoundState>, SyncError> {
        self.state
            .lock()
            .map_err(|_| SyncError::Poisoned { primitive: ROUND_LOCK })
    }

    /// Open a new round on `template` and wake every waiting worker.
    /// Returns the new epoch.
    pub fn publish(&self, template: Block) -> Result<u64, SyncError> {
        let mut state = self.lock()?;
        state.template = template;
        state.round_open = true;
        state.epoch += 1;
        self.epoch.store(state.epoch, Ordering::Release);
        let epoch = state.epoch;
        drop(state);

        self.template_ready.notify_all();
        Ok(epoch)
    }

    /// Block until a round newer than `last_epoch` is open.
    /// `None` once the monitor is closed.
    pub fn wait_for_template(&self, last_epoch: Option<u64>) -> Result<Option<RoundTicket>, SyncError> {
        let state = self.lock()?;
        let state = self
            .template_ready
            .wait_while(state, |s| {
                !s.closed && !(s.round_open && Some(s.epoch) != last_epoch)
            })
            .map_err(|_| SyncError::Poisoned { primitive: TEMPLATE_READY })?;

        if state.closed {
            return Ok(None);
        }

        Ok(Some(RoundTicket {
            epoch: state.epoch,
            template: state.template,
        }))
    }

    /// Offer a candidate. Only an open round with an empty mailbox accepts
    /// it; an in-flight submission is never overwritten.
    pub fn try_submit(&self, candidate: Block) -> Result<SubmitOutcome, SyncError> {
        let mut state = self.lock()?;
        if state.closed {
            return Ok(SubmitOutcome::Closed);
        }
        if !state.round_open || state.submission.is_some() {
            return Ok(SubmitOutcome::Dropped);
        }

        state.submission = Some(candidate);
        state.round_open = false;
        self.submission_ready.notify_one();
        Ok(SubmitOutcome::Delivered)
    }

    /// Block until a submission is pending and take it out of the mailbox.
    /// `None` once the monitor is closed.
    pub fn await_submission(&self) -> Result<Option<Block>, SyncError> {
        let state = self.lock()?;
        let mut state = self
            .submission_ready
            .wait_while(state, |s| !s.closed && s.submission.is_none())
            .map_err(|_| SyncError::Poisoned { primitive: SUBMISSION_READY })?;

        if state.closed {
            return Ok(None);
        }

        Ok(state.submission.take())
    }

    /// Sleep for up to `timeout`, waking early on close.
    /// Returns `false` if the monitor is closed.
    pub fn pause(&self, timeout: Duration) -> Result<bool, SyncError> {
        let state = self.lock()?;
        let (state, _) = self
            .template_ready
            .wait_timeout_while(state, timeout, |s| !s.closed)
            .map_err(|_| SyncError::Poisoned { primitive: TEMPLATE_READY })?;

        Ok(!state.closed)
    }

    /// Shut the monitor down and wake every waiter.
    ///
    /// Recovers the guard from a poisoned lock: closing is how a failing
    /// thread unblocks the rest of the pool.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        self.closed.store(true, Ordering::Release);
        drop(state);

        self.template_ready.notify_all();
        self.submission_ready.notify_all();
    }

    /// Latest published epoch, read without the lock
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Read without the lock
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True while `epoch` is still the open round and the monitor runs.
    /// Lock-free; used to abandon searches early.
    pub fn is_current(&self, epoch: u64) -> bool {
        !self.is_closed() && self.current_epoch() == epoch
    }

    pub fn snapshot(&self) -> Result<RoundSnapshot, SyncError> {
        let state = self.lock()?;
        Ok(RoundSnapshot {
            epoch: state.epoch,
            template: state.template,
            round_open: state.round_open,
            submission_pending: state.submission.is_some(),
            closed: state.closed,
        })
    }
}

impl Default for RoundMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GENESIS_HASH;
    use std::sync::Arc;
    use std::thread;

    fn template(height: i64) -> Block {
        Block::template(height, GENESIS_HASH, 0)
    }

    fn candidate(height: i64, miner: i32) -> Block {
        let mut block = template(height);
        block.mined_by = miner;
        block
    }

    #[test]
    fn test_new_monitor_is_closed_round() {
        let monitor = RoundMonitor::new();
        let snap = monitor.snapshot().unwrap();
        assert_eq!(snap.epoch, 0);
        assert!(!snap.round_open);
        assert!(!snap.submission_pending);
        assert!(!snap.closed);
    }

    #[test]
    fn test_publish_wakes_all_waiters() {
        let monitor = Arc::new(RoundMonitor::new());

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || monitor.wait_for_template(None).unwrap())
            })
            .collect();

        let epoch = monitor.publish(template(1)).unwrap();

        for handle in handles {
            let ticket = handle.join().unwrap().unwrap();
            assert_eq!(ticket.epoch, epoch);
            assert_eq!(ticket.template, template(1));
        }
    }

    #[test]
    fn test_waiter_skips_epoch_it_already_raced() {
        let monitor = Arc::new(RoundMonitor::new());
        let first = monitor.publish(template(1)).unwrap();

        let waiter = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.wait_for_template(Some(first)).unwrap())
        };

        // Same height, republished after a rejection
        let second = monitor.publish(template(1)).unwrap();
        let ticket = waiter.join().unwrap().unwrap();

        assert_eq!(ticket.epoch, second);
        assert_ne!(first, second);
    }

    #[test]
    fn test_submission_closes_round() {
        let monitor = RoundMonitor::new();
        monitor.publish(template(1)).unwrap();

        let first = candidate(1, 1);
        assert_eq!(monitor.try_submit(first).unwrap(), SubmitOutcome::Delivered);

        let snap = monitor.snapshot().unwrap();
        assert!(!snap.round_open);
        assert!(snap.submission_pending);

        // Mailbox occupied: second candidate must not overwrite the first
        assert_eq!(monitor.try_submit(candidate(1, 2)).unwrap(), SubmitOutcome::Dropped);
        assert_eq!(monitor.await_submission().unwrap(), Some(first));

        // Consumed but not yet republished: round stays closed
        assert_eq!(monitor.try_submit(candidate(1, 3)).unwrap(), SubmitOutcome::Dropped);
        let snap = monitor.snapshot().unwrap();
        assert!(!snap.round_open);
        assert!(!snap.submission_pending);

        monitor.publish(template(2)).unwrap();
        assert!(monitor.snapshot().unwrap().round_open);
    }

    #[test]
    fn test_submit_before_first_publish_is_dropped() {
        let monitor = RoundMonitor::new();
        assert_eq!(monitor.try_submit(candidate(1, 1)).unwrap(), SubmitOutcome::Dropped);
    }

    #[test]
    fn test_coordinator_wakes_on_submission() {
        let monitor = Arc::new(RoundMonitor::new());
        monitor.publish(template(1)).unwrap();

        let coordinator = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.await_submission().unwrap())
        };

        let block = candidate(1, 4);
        assert_eq!(monitor.try_submit(block).unwrap(), SubmitOutcome::Delivered);
        assert_eq!(coordinator.join().unwrap(), Some(block));
    }

    #[test]
    fn test_close_wakes_every_waiter() {
        let monitor = Arc::new(RoundMonitor::new());

        let coordinator = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.await_submission().unwrap())
        };
        let worker = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.wait_for_template(None).unwrap())
        };
        let dummy = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.pause(Duration::from_secs(3600)).unwrap())
        };

        monitor.close();

        assert_eq!(coordinator.join().unwrap(), None);
        assert_eq!(worker.join().unwrap(), None);
        assert!(!dummy.join().unwrap());
        assert!(monitor.is_closed());
        assert_eq!(monitor.try_submit(candidate(1, 1)).unwrap(), SubmitOutcome::Closed);
    }

    #[test]
    fn test_pause_times_out_while_running() {
        let monitor = RoundMonitor::new();
        assert!(monitor.pause(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_is_current_tracks_epoch() {
        let monitor = RoundMonitor::new();
        let epoch = monitor.publish(template(1)).unwrap();
        assert!(monitor.is_current(epoch));

        monitor.publish(template(1)).unwrap();
        assert!(!monitor.is_current(epoch));
        assert!(monitor.is_current(epoch + 1));

        monitor.close();
        assert!(!monitor.is_current(epoch + 1));
    }

    #[test]
    fn test_poisoned_lock_names_primitive() {
        let monitor = Arc::new(RoundMonitor::new());

        let poisoner = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                let _guard = monitor.state.lock().unwrap();
                panic!("poison the round lock");
            })
        };
        assert!(poisoner.join().is_err());

        match monitor.publish(template(1)) {
            Err(SyncError::Poisoned { primitive }) => assert_eq!(primitive, ROUND_LOCK),
            other => panic!("expected poisoned lock, got {:?}", other),
        }

        // Closing still works on a poisoned lock
        monitor.close();
        assert!(monitor.is_closed());
    }
}
