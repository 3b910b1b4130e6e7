//! Job scheduler infrastructure for background tasks.

use chrono::Utc;
use domain::services::calendar::BusinessCalendar;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::middleware::metrics::record_job_rows;

const DAY: Duration = Duration::from_secs(86_400);

/// Job frequency for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    /// Run every N seconds.
    Seconds(u64),
    /// Run every N minutes.
    Minutes(u64),
    /// Run every hour.
    Hourly,
    /// Run once a day at local midnight of the business calendar.
    Daily,
}

impl JobFrequency {
    /// Get the duration between job executions.
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
            JobFrequency::Hourly => Duration::from_secs(3600),
            JobFrequency::Daily => DAY,
        }
    }

    /// Delay before the first run when started at `now`.
    ///
    /// Daily jobs wait for the next local midnight; the rest wait one period.
    pub fn first_delay(&self, calendar: &BusinessCalendar, now: chrono::DateTime<Utc>) -> Duration {
        match self {
            JobFrequency::Daily => (calendar.next_midnight(now) - now)
                .to_std()
                .unwrap_or(DAY),
            other => other.duration(),
        }
    }
}

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging and metrics).
    fn name(&self) -> &'static str;

    /// The frequency at which this job should run.
    fn frequency(&self) -> JobFrequency;

    /// Execute the job. Returns the number of rows it touched.
    async fn execute(&self) -> Result<u64, String>;
}

/// Background job scheduler.
pub struct JobScheduler {
    calendar: BusinessCalendar,
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(calendar: BusinessCalendar) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            calendar,
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();
            let frequency = job.frequency();
            let first_delay = frequency.first_delay(&self.calendar, Utc::now());

            let handle = tokio::spawn(async move {
                let name = job.name();
                let mut interval =
                    tokio::time::interval_at(Instant::now() + first_delay, frequency.duration());
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

                info!(
                    job = name,
                    frequency = ?frequency,
                    first_run_in_secs = first_delay.as_secs(),
                    "Job scheduled"
                );

                loop {
                    tokio::select! {
                        _ = interval.tick() => run_once(job.as_ref()).await,
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Initiate graceful shutdown of all jobs.
    /// Returns immediately after signaling shutdown.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);

        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let start = std::time::Instant::now();

    match job.execute().await {
        Ok(rows) => {
            record_job_rows(name, rows);
            let elapsed_ms = start.elapsed().as_millis();
            if rows > 0 {
                info!(job = name, rows, elapsed_ms, "Job completed");
            } else {
                tracing::debug!(job = name, elapsed_ms, "Job completed with nothing to do");
            }
        }
        Err(e) => {
            error!(
                job = name,
                elapsed_ms = start.elapsed().as_millis(),
                error = %e,
                "Job failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestJob {
        run_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        fn name(&self) -> &'static str {
            "test_job"
        }

        fn frequency(&self) -> JobFrequency {
            JobFrequency::Seconds(1)
        }

        async fn execute(&self) -> Result<u64, String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err("Test failure".to_string())
            } else {
                Ok(1)
            }
        }
    }

    fn calendar() -> BusinessCalendar {
        BusinessCalendar::new(8 * 3600).unwrap()
    }

    #[test]
    fn test_job_frequency_duration() {
        assert_eq!(
            JobFrequency::Seconds(30).duration(),
            Duration::from_secs(30)
        );
        assert_eq!(JobFrequency::Minutes(2).duration(), Duration::from_secs(120));
        assert_eq!(JobFrequency::Hourly.duration(), Duration::from_secs(3600));
        assert_eq!(JobFrequency::Daily.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn test_daily_waits_for_local_midnight() {
        // 15:00 UTC is 23:00 at UTC+8, one hour before local midnight
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        assert_eq!(
            JobFrequency::Daily.first_delay(&calendar(), now),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_periodic_first_delay_is_one_period() {
        let now = Utc::now();
        assert_eq!(
            JobFrequency::Minutes(1).first_delay(&calendar(), now),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_scheduler_register() {
        let mut scheduler = JobScheduler::new(calendar());
        scheduler.register(TestJob {
            run_count: Arc::new(AtomicUsize::new(0)),
            should_fail: false,
        });
        assert_eq!(scheduler.jobs.len(), 1);
        assert!(scheduler.handles.is_empty());
    }

    #[tokio::test]
    async fn test_failing_job_does_not_panic() {
        let run_count = Arc::new(AtomicUsize::new(0));
        let job = TestJob {
            run_count: Arc::clone(&run_count),
            should_fail: true,
        };
        run_once(&job).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduler_shutdown() {
        let mut scheduler = JobScheduler::new(calendar());
        let run_count = Arc::new(AtomicUsize::new(0));
        scheduler.register(TestJob {
            run_count: Arc::clone(&run_count),
            should_fail: false,
        });
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(100)).await;

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        // First run is one period away
        assert_eq!(run_count.load(Ordering::SeqCst), 0);
    }
}
