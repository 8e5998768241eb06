use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Work run once per period by a recurring timer
pub type TickTask = Box<dyn FnMut() + Send + 'static>;

/// Schedules recurring work and hands back ownership of the timer
pub trait Scheduler {
    /// Run `task` every `period`, starting one period from now.
    fn every(&mut self, period: Duration, task: TickTask) -> TimerHandle;
}

/// Ownership token for one recurring timer.
///
/// The timer stays alive for as long as the handle does. Cancelling (or
/// dropping) the handle stops further invocations of the task.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Recurring timers backed by tokio tasks
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn every(&mut self, period: Duration, mut task: TickTask) -> TimerHandle {
        // tokio intervals reject a zero period
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });

        debug!("⏱️ Recurring timer scheduled every {:?}", period);
        TimerHandle::new(move || handle.abort())
    }
}
