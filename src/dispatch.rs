//! Bulk-send dispatch queue.
//!
//! One FIFO of [`DispatchJob`]s and a processing flag, shared by every bulk
//! submission. At most one processor task drains the queue at a time: it pops
//! the front job, awaits the provider, logs the outcome, then sleeps for the
//! job's pacing delay before the next pop. Failed jobs are logged and dropped;
//! they never stop the run and are never retried.

use evopanel_core::{message::DispatchJob, traits::MessagingProvider};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<DispatchJob>,
    /// True while a processor task is alive (sending or sleeping between jobs).
    processing: bool,
}

/// Snapshot of the queue for polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: bool,
}

/// Result of appending a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub queued: usize,
    pub processing: bool,
}

/// Process-wide bulk queue. Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct DispatchQueue {
    state: Arc<Mutex<QueueState>>,
    provider: Arc<dyn MessagingProvider>,
    default_delay: Duration,
}

impl DispatchQueue {
    /// `default_delay` paces jobs that carry no delay of their own.
    pub fn new(provider: Arc<dyn MessagingProvider>, default_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            provider,
            default_delay,
        }
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    /// Append a batch as one contiguous run and start the processor if idle.
    ///
    /// Never waits for delivery.
    pub async fn submit(&self, jobs: Vec<DispatchJob>) -> SubmitOutcome {
        let queued = jobs.len();
        let mut state = self.state.lock().await;
        state.jobs.extend(jobs);
        info!(
            "dispatch: queued {queued} job(s), {} pending",
            state.jobs.len()
        );
        self.start_locked(&mut state);
        SubmitOutcome {
            queued,
            processing: state.processing,
        }
    }

    /// Start the processor if there is work and none is running.
    ///
    /// Returns whether a new processor was spawned. On an empty idle queue this
    /// does nothing. `submit` already starts the processor.
    #[cfg(test)]
    async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state)
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        QueueStatus {
            pending: state.jobs.len(),
            processing: state.processing,
        }
    }

    /// Caller holds the lock, so the flag check and the spawn cannot interleave
    /// with another submission or with the processor's exit.
    fn start_locked(&self, state: &mut QueueState) -> bool {
        if state.processing || state.jobs.is_empty() {
            return false;
        }
        state.processing = true;
        tokio::spawn(self.clone().supervise());
        true
    }

    /// Run the processor and recover the queue if it dies mid-run. A panicking
    /// job counts as a failed one: its successors still go out.
    async fn supervise(self) {
        let worker = tokio::spawn(self.clone().run());
        if let Err(e) = worker.await {
            error!("dispatch: processor ended abnormally: {e}");
            let mut state = self.state.lock().await;
            state.processing = false;
            self.start_locked(&mut state);
        }
    }

    /// The processor: one job in flight, paced by each job's delay.
    async fn run(self) {
        debug!("dispatch: processor started");
        loop {
            let job = {
                let mut state = self.state.lock().await;
                match state.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        state.processing = false;
                        info!("dispatch: queue drained, processor idle");
                        return;
                    }
                }
            };

            let kind = job.kind().as_str();
            match self.provider.deliver(&job).await {
                Ok(_) => info!(
                    "dispatch: sent {kind} to {} (job {})",
                    job.recipient(),
                    job.id()
                ),
                Err(e) => warn!(
                    "dispatch: failed {kind} to {} (job {}), skipping: {e}",
                    job.recipient(),
                    job.id()
                ),
            }

            let delay = if job.delay_after().is_zero() {
                self.default_delay
            } else {
                job.delay_after()
            };
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use evopanel_core::error::PanelError;
    use evopanel_core::message::{DeliveryReceipt, JobContent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Records each delivery with the (paused) clock reading at call time.
    #[derive(Default)]
    struct MockProvider {
        calls: std::sync::Mutex<Vec<(String, Instant)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// Trait method hit per delivery, in order.
        methods: std::sync::Mutex<Vec<&'static str>>,
        /// Recipients that make the provider fail.
        fail_for: Vec<String>,
        /// Recipients that make the provider panic.
        panic_for: Vec<String>,
        /// Simulated provider latency.
        latency: Duration,
    }

    impl MockProvider {
        fn failing_for(recipients: &[&str]) -> Self {
            Self {
                fail_for: recipients.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            }
        }

        fn recipients(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(r, _)| r.clone())
                .collect()
        }

        async fn record(&self, recipient: &str) -> Result<DeliveryReceipt, PanelError> {
            if self.panic_for.iter().any(|r| r == recipient) {
                panic!("provider blew up on {recipient}");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((recipient.to_string(), Instant::now()));
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_for.iter().any(|r| r == recipient) {
                return Err(PanelError::Provider {
                    status: Some(400),
                    body: "number does not exist".into(),
                });
            }
            Ok(DeliveryReceipt::default())
        }
    }

    #[async_trait]
    impl MessagingProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn send_text(
            &self,
            _instance: &str,
            recipient: &str,
            _text: &str,
        ) -> Result<DeliveryReceipt, PanelError> {
            self.methods.lock().unwrap().push("send_text");
            self.record(recipient).await
        }

        async fn send_media(
            &self,
            _instance: &str,
            recipient: &str,
            _media: &str,
            _caption: &str,
        ) -> Result<DeliveryReceipt, PanelError> {
            self.methods.lock().unwrap().push("send_media");
            self.record(recipient).await
        }
    }

    fn text_jobs(recipients: &[&str], delay_ms: u64) -> Vec<DispatchJob> {
        recipients
            .iter()
            .map(|r| {
                DispatchJob::new(
                    "evo-1",
                    *r,
                    JobContent::Text { body: "oi".into() },
                    Duration::from_millis(delay_ms),
                )
            })
            .collect()
    }

    fn queue_with(provider: &Arc<MockProvider>) -> DispatchQueue {
        DispatchQueue::new(provider.clone(), Duration::from_millis(5000))
    }

    /// Let the processor run to completion on the paused clock.
    async fn drain() {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_in_fifo_order() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        let outcome = queue.submit(text_jobs(&["a", "b", "c"], 3000)).await;
        assert_eq!(outcome.queued, 3);
        assert!(outcome.processing);

        drain().await;
        assert_eq!(provider.recipients(), vec!["a", "b", "c"]);
        assert_eq!(
            queue.status().await,
            QueueStatus {
                pending: 0,
                processing: false
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_are_paced_by_their_delay() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a", "b", "c"], 7000)).await;
        drain().await;

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert_eq!(pair[1].1 - pair[0].1, Duration::from_millis(7000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_counts_from_completion_not_start() {
        let provider = Arc::new(MockProvider {
            latency: Duration::from_millis(2000),
            ..Default::default()
        });
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a", "b"], 4000)).await;
        drain().await;

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_uses_default() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a", "b"], 0)).await;
        drain().await;

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_block_later_jobs() {
        let provider = Arc::new(MockProvider::failing_for(&["bad"]));
        let queue = queue_with(&provider);

        queue
            .submit(text_jobs(&["first", "bad", "after-1", "after-2"], 3000))
            .await;
        drain().await;

        assert_eq!(
            provider.recipients(),
            vec!["first", "bad", "after-1", "after-2"]
        );
        assert!(!queue.status().await.processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_batch_joins_running_processor() {
        let provider = Arc::new(MockProvider {
            latency: Duration::from_millis(500),
            ..Default::default()
        });
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a1", "a2"], 3000)).await;
        // Let the processor pick up the first job.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = queue.status().await;
        assert!(status.processing);
        assert_eq!(status.pending, 1);

        assert!(!queue.start().await, "running processor must not be duplicated");
        let outcome = queue.submit(text_jobs(&["b1", "b2"], 3000)).await;
        assert_eq!(outcome.queued, 2);
        assert!(outcome.processing);

        drain().await;
        assert_eq!(provider.recipients(), vec!["a1", "a2", "b1", "b2"]);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_on_empty_idle_queue_is_noop() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        assert!(!queue.start().await);
        assert_eq!(
            queue.status().await,
            QueueStatus {
                pending: 0,
                processing: false
            }
        );
        drain().await;
        assert!(provider.recipients().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_drain() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a"], 3000)).await;
        drain().await;
        assert!(!queue.status().await.processing);

        let outcome = queue.submit(text_jobs(&["b"], 3000)).await;
        assert!(outcome.processing);
        drain().await;
        assert_eq!(provider.recipients(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_jobs_go_through_send_media() {
        let provider = Arc::new(MockProvider::default());
        let queue = queue_with(&provider);

        let job = DispatchJob::new(
            "evo-1",
            "120363@g.us",
            JobContent::Media {
                media: "https://cdn.example.com/a.jpg".into(),
                caption: String::new(),
            },
            Duration::from_millis(3000),
        );
        let mut jobs = text_jobs(&["5511999990000"], 3000);
        jobs.push(job);
        queue.submit(jobs).await;
        drain().await;
        assert_eq!(provider.recipients(), vec!["5511999990000", "120363@g.us"]);
        assert_eq!(
            *provider.methods.lock().unwrap(),
            vec!["send_text", "send_media"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_does_not_wedge_queue() {
        let provider = Arc::new(MockProvider {
            panic_for: vec!["boom".to_string()],
            ..Default::default()
        });
        let queue = queue_with(&provider);

        queue.submit(text_jobs(&["a", "boom", "c"], 3000)).await;
        drain().await;

        assert_eq!(provider.recipients(), vec!["a", "c"]);
        assert!(!queue.status().await.processing);

        let outcome = queue.submit(text_jobs(&["d"], 3000)).await;
        assert!(outcome.processing);
        drain().await;
        assert_eq!(provider.recipients(), vec!["a", "c", "d"]);
    }
}
