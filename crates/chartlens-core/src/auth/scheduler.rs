//! Clock and timer seams for the session manager.
//!
//! The manager never sleeps itself. It asks a `Scheduler` to deliver a
//! `RefreshDue` message after a delay and keeps the returned `Timer` so it
//! can cancel it. Tests swap in a scheduler that records delays and fires on
//! demand.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::manager::Command;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// An armed one-shot timer.
pub trait Timer: Send + Sync {
    /// Disarm the timer. A timer that already fired ignores this.
    fn cancel(self: Box<Self>);
}

/// Arms one-shot timers that deliver a `RefreshDue` message.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, due: RefreshDue) -> Box<dyn Timer>;
}

/// The "refresh is due" message a timer delivers into the session queue.
///
/// Holds only a weak reference to the queue so a pending timer does not keep
/// a shut-down session manager alive.
#[derive(Debug)]
pub struct RefreshDue {
    generation: u64,
    queue: mpsc::WeakUnboundedSender<Command>,
}

impl RefreshDue {
    pub(crate) fn new(generation: u64, queue: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self { generation, queue }
    }

    /// Generation of the timer this message belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver the message. Returns false if the session manager is gone.
    pub fn fire(self) -> bool {
        match self.queue.upgrade() {
            Some(tx) => tx
                .send(Command::RefreshDue {
                    generation: self.generation,
                })
                .is_ok(),
            None => {
                debug!(generation = self.generation, "Session manager gone, dropping refresh timer");
                false
            }
        }
    }
}

/// Production scheduler: one sleeping tokio task per timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

struct TokioTimer(JoinHandle<()>);

impl Timer for TokioTimer {
    fn cancel(self: Box<Self>) {
        self.0.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, due: RefreshDue) -> Box<dyn Timer> {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            due.fire();
        });
        Box::new(TokioTimer(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_timer_delivers_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let due = RefreshDue::new(7, tx.downgrade());
        let _timer = TokioScheduler.schedule(Duration::from_millis(5), due);

        match rx.recv().await {
            Some(Command::RefreshDue { generation }) => assert_eq!(generation, 7),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = TokioScheduler.schedule(Duration::from_millis(20), RefreshDue::new(1, tx.downgrade()));
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fire_without_manager() {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let due = RefreshDue::new(1, tx.downgrade());
        drop(tx);
        drop(rx);
        assert!(!due.fire());
    }
}
