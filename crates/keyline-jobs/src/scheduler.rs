//! Job scheduler.
//!
//! Each queued job gets its own tokio task ticking at the job's interval.
//! A run is skipped when the previous one is still going, when this
//! instance is not the leader, or aborted when it exceeds the job's
//! timeout. Panics are contained to the run's task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::job::{Job, JobError};
use crate::leader::LeaderElection;

/// Called after a failed run with the job name and the error.
pub type ErrorHook = Arc<dyn Fn(&str, &JobError) + Send + Sync>;

struct Entry {
    job: Arc<dyn Job>,
    running: Arc<AtomicBool>,
}

/// Runs queued jobs on their intervals until cancelled.
pub struct Scheduler {
    entries: Vec<Entry>,
    leader: Arc<dyn LeaderElection>,
    on_error: Option<ErrorHook>,
}

impl Scheduler {
    #[must_use]
    pub fn new(leader: Arc<dyn LeaderElection>) -> Self {
        Self {
            entries: Vec::new(),
            leader,
            on_error: None,
        }
    }

    /// Install a hook observing failed runs.
    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    /// Add a job to the schedule. Takes effect at the next [`Self::start`].
    pub fn queue(&mut self, job: Arc<dyn Job>) {
        self.entries.push(Entry {
            job,
            running: Arc::new(AtomicBool::new(false)),
        });
    }

    /// Spawn the per-job loops. Returns the handles; they exit when
    /// `shutdown` is cancelled.
    pub fn start(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.entries.len() + 1);

        // The election membership lives as long as the scheduler does.
        let leader = self.leader.clone();
        let leader_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            leader.start().await;
            leader_shutdown.cancelled().await;
            leader.stop().await;
        }));

        handles.extend(self.entries.iter().map(|entry| {
            let job = entry.job.clone();
            let running = entry.running.clone();
            let leader = self.leader.clone();
            let on_error = self.on_error.clone();
            let shutdown = shutdown.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(job.interval());
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                // The first tick fires immediately; consume it so the
                // first run happens one interval after startup.
                ticker.tick().await;

                info!(job = job.name(), interval = ?job.interval(), "job scheduled");
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => {
                            info!(job = job.name(), "job loop stopped");
                            break;
                        }
                        _ = ticker.tick() => {
                            run_once(&job, &running, leader.as_ref(), on_error.as_ref()).await;
                        }
                    }
                }
            })
        }));
        handles
    }
}

/// Run a job once, applying the leader gate, overlap skip and timeout.
pub async fn run_once(
    job: &Arc<dyn Job>,
    running: &AtomicBool,
    leader: &dyn LeaderElection,
    on_error: Option<&ErrorHook>,
) {
    if !leader.is_leader().await {
        return;
    }
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!(job = job.name(), "previous run still in progress, skipping");
        return;
    }

    let result = execute(job).await;
    running.store(false, Ordering::SeqCst);

    if let Err(e) = result {
        error!(job = job.name(), error = %e, "job run failed");
        if let Some(hook) = on_error {
            hook(job.name(), &e);
        }
    }
}

/// One run, in its own task so a panic cannot take the loop down.
async fn execute(job: &Arc<dyn Job>) -> Result<(), JobError> {
    let timeout = job.timeout();
    let job = job.clone();
    let mut handle = tokio::spawn(async move { job.run().await });

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) if join_error.is_panic() => Err(JobError::Panicked),
        Ok(Err(_)) => Err(JobError::Failed("job task was cancelled".to_string())),
        Err(_) => {
            // The run must not keep going after its slot is released, or it
            // would overlap with the next tick.
            handle.abort();
            Err(JobError::TimedOut(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn run(&self) -> Result<(), JobError> {
            tokio::time::sleep(self.delay).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(JobError::Failed("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct PanickingJob;

    #[async_trait]
    impl Job for PanickingJob {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn run(&self) -> Result<(), JobError> {
            panic!("deliberate");
        }
    }

    struct RecordingLeader {
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LeaderElection for RecordingLeader {
        async fn start(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        async fn is_leader(&self) -> bool {
            true
        }
    }

    struct NeverLeader;

    #[async_trait]
    impl LeaderElection for NeverLeader {
        async fn is_leader(&self) -> bool {
            false
        }
    }

    fn job(runs: &Arc<AtomicUsize>) -> Arc<dyn Job> {
        Arc::new(CountingJob {
            runs: runs.clone(),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    #[tokio::test]
    async fn run_once_executes_the_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = job(&runs);
        let running = AtomicBool::new(false);

        run_once(&job, &running, &crate::leader::NoLeaderElection, None).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn non_leaders_do_not_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = job(&runs);
        let running = AtomicBool::new(false);

        run_once(&job, &running, &NeverLeader, None).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn an_in_flight_run_skips_the_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = job(&runs);
        let running = AtomicBool::new(true);

        run_once(&job, &running, &crate::leader::NoLeaderElection, None).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        // The flag belongs to the in-flight run and must stay set.
        assert!(running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failures_reach_the_error_hook() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job: Arc<dyn Job> = Arc::new(CountingJob {
            runs: runs.clone(),
            delay: Duration::ZERO,
            fail: true,
        });
        let running = AtomicBool::new(false);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_hook = seen.clone();
        let hook: ErrorHook = Arc::new(move |name, error| {
            assert_eq!(name, "counting");
            assert!(matches!(error, JobError::Failed(_)));
            seen_in_hook.fetch_add(1, Ordering::SeqCst);
        });

        run_once(&job, &running, &crate::leader::NoLeaderElection, Some(&hook)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_panicking_job_is_contained() {
        let job: Arc<dyn Job> = Arc::new(PanickingJob);
        let result = execute(&job).await;
        assert!(matches!(result, Err(JobError::Panicked)));
    }

    #[tokio::test]
    async fn a_slow_job_times_out() {
        let job: Arc<dyn Job> = Arc::new(CountingJob {
            runs: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_secs(10),
            fail: false,
        });
        let result = execute(&job).await;
        assert!(matches!(result, Err(JobError::TimedOut(_))));
    }

    struct SlowJob {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Job for SlowJob {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(20)
        }

        async fn run(&self) -> Result<(), JobError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_timed_out_run_is_aborted_and_does_not_overlap_the_next() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job: Arc<dyn Job> = Arc::new(SlowJob { runs: runs.clone() });
        let running = AtomicBool::new(false);

        run_once(&job, &running, &crate::leader::NoLeaderElection, None).await;
        // The slot is free again and the aborted task never completed.
        assert!(!running.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        // The next tick starts cleanly instead of overlapping a leftover run.
        run_once(&job, &running, &crate::leader::NoLeaderElection, None).await;
        assert!(!running.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scheduler_runs_jobs_until_cancelled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Arc::new(crate::leader::NoLeaderElection));
        scheduler.queue(job(&runs));

        let shutdown = CancellationToken::new();
        let handles = scheduler.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn the_election_is_joined_on_start_and_left_on_shutdown() {
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let leader = Arc::new(RecordingLeader {
            started: started.clone(),
            stopped: stopped.clone(),
        });
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(leader);
        scheduler.queue(job(&runs));

        let shutdown = CancellationToken::new();
        let handles = scheduler.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 0);

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }
}
