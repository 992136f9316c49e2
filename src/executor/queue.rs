use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Executor, Job};

/// Forwards jobs to an external consumer.
///
/// Stands in for a task queue or a framework's background-task system: the
/// executor only enqueues, and the paired [`JobReceiver`] decides when and where
/// jobs run. Jobs submitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: UnboundedSender<Job>,
}

/// Consumer side of a [`JobQueue`].
#[derive(Debug)]
pub struct JobReceiver {
    receiver: UnboundedReceiver<Job>,
}

impl JobQueue {
    pub fn channel() -> (JobQueue, JobReceiver) {
        let (sender, receiver) = unbounded_channel();
        (JobQueue { sender }, JobReceiver { receiver })
    }
}

impl Executor for JobQueue {
    fn submit(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("Job queue receiver is gone, discarding job");
        }
    }
}

impl JobReceiver {
    /// Number of jobs waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take the next job without running it, waiting until one arrives.
    /// Returns `None` once every [`JobQueue`] handle is dropped and the queue is empty.
    pub async fn recv(&mut self) -> Option<Job> {
        self.receiver.recv().await
    }

    /// Run the next queued job, if there is one. Returns whether a job ran.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.try_recv() {
            Ok(job) => {
                job.await;
                true
            }
            Err(_) => false,
        }
    }

    /// Run jobs until the queue is empty, including jobs enqueued by the jobs
    /// being run. Returns how many ran.
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.run_next().await {
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn test_jobs_wait_for_consumer() {
        let (queue, mut receiver) = JobQueue::channel();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = counter.clone();
            queue.submit(Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(receiver.len(), 3);

        assert_eq!(receiver.drain().await, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(receiver.is_empty());
    }

    #[tokio::test]
    async fn test_drain_runs_follow_up_jobs() {
        let (queue, mut receiver) = JobQueue::channel();
        let counter = Arc::new(AtomicUsize::new(0));
        let (q, c) = (queue.clone(), counter.clone());
        queue.submit(Box::pin(async move {
            let c2 = c.clone();
            q.submit(Box::pin(async move {
                c2.fetch_add(10, Ordering::SeqCst);
            }));
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(receiver.drain().await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_submit_after_receiver_dropped() {
        let (queue, receiver) = JobQueue::channel();
        drop(receiver);
        queue.submit(Box::pin(async {}));
    }
}
