//! Token-bucket admission control for a shared upstream resource.
//!
//! [`TokenBucket::schedule`] accepts a future and dispatches it so that at
//! most `capacity` tasks start within any sliding window of `window`,
//! regardless of how many requests are concurrently in flight. Excess tasks
//! queue FIFO up to `max_pending`; beyond that the newest submission is
//! rejected with [`ScheduleError::QueueFull`] and a diagnostic event is
//! emitted.
//!
//! All bookkeeping (start timestamps, pending queue) is owned by a single
//! dispatcher task fed over a bounded channel, so no lock is shared across
//! requests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Configuration for a [`TokenBucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterConfig {
    /// Maximum task starts per window.
    pub capacity: usize,
    /// Length of the sliding window.
    pub window: Duration,
    /// Maximum queued tasks awaiting dispatch; the newest submission beyond
    /// this bound is dropped.
    pub max_pending: usize,
}

/// Failure to schedule a task on the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The pending queue is at its configured bound.
    #[error("rate limiter queue is full")]
    QueueFull,
    /// The dispatcher has shut down.
    #[error("rate limiter is closed")]
    Closed,
}

type Job = Box<dyn FnOnce() + Send>;

/// Token-bucket rate limiter with FIFO queueing.
#[derive(Debug)]
pub struct TokenBucket {
    jobs: mpsc::Sender<Job>,
}

impl TokenBucket {
    /// Creates a limiter and spawns its dispatcher task.
    ///
    /// A zero `capacity` would admit nothing and is clamped to one, with a
    /// warning.
    #[must_use]
    pub fn new(config: LimiterConfig) -> Self {
        let capacity = if config.capacity == 0 {
            tracing::warn!("limiter capacity of 0 clamped to 1");
            1
        } else {
            config.capacity
        };
        let (jobs, rx) = mpsc::channel::<Job>(config.max_pending.max(1));
        tokio::spawn(dispatch(rx, capacity, config.window));
        Self { jobs }
    }

    /// Schedules `task` for rate-limited dispatch.
    ///
    /// Submission happens immediately; the returned [`Scheduled`] future
    /// resolves with the task's output once it has been dispatched and run.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::QueueFull`] when the pending queue is at its
    /// bound, [`ScheduleError::Closed`] when the dispatcher is gone.
    pub fn schedule<F>(&self, task: F) -> Result<Scheduled<F::Output>, ScheduleError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            tokio::spawn(async move {
                let _ = done.send(task.await);
            });
        });
        self.jobs.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!("rate limiter queue full, rejecting task");
                ScheduleError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => ScheduleError::Closed,
        })?;
        Ok(Scheduled { rx })
    }
}

/// A task admitted to the limiter, resolving to its output.
#[derive(Debug)]
pub struct Scheduled<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Scheduled<T> {
    type Output = Result<T, ScheduleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| ScheduleError::Closed))
    }
}

/// Dispatcher loop: owns the reservoir of recent start times and releases
/// queued jobs as window slots free up.
async fn dispatch(mut jobs: mpsc::Receiver<Job>, capacity: usize, window: Duration) {
    let mut starts: VecDeque<Instant> = VecDeque::with_capacity(capacity);
    while let Some(job) = jobs.recv().await {
        loop {
            let now = Instant::now();
            while starts.front().is_some_and(|&t| now.duration_since(t) >= window) {
                starts.pop_front();
            }
            if starts.len() < capacity {
                break;
            }
            // Reservoir exhausted: the next slot opens when the oldest
            // start leaves the window.
            if let Some(&oldest) = starts.front() {
                tokio::time::sleep_until(oldest + window).await;
            }
        }
        starts.push_back(Instant::now());
        job();
    }
}
