use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::poll_cycle::CycleRunner;
use super::wait_for_shutdown;

/// Runs cycles back to back on a fixed start-to-start interval until shutdown.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First cycle starts immediately. A cycle that overruns the interval is followed
    /// straight away by the next one; missed ticks are never replayed, so cycles cannot
    /// overlap or bunch up. Returns the number of cycles run.
    pub async fn run<R>(&self, runner: &mut R, mut shutdown: watch::Receiver<bool>) -> u64
    where
        R: CycleRunner + ?Sized,
    {
        tracing::info!("⏱️  Scheduler started (every {}s)", self.interval.as_secs());

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            cycles += 1;
            let report = runner.run_cycle(&shutdown).await;
            // errored and completed cycles get the same next tick
            tracing::debug!(
                cycle = cycles,
                errored = report.is_errored(),
                "Cycle finished in {:?}",
                report.duration
            );

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("🛑 Scheduler stopped after {} cycles", cycles);
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CycleError;
    use crate::scanner::poll_cycle::{CycleCounts, CycleReport, CycleState, PollResult};
    use async_trait::async_trait;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Records when each cycle starts and stops the scheduler after `limit` cycles.
    struct FakeRunner {
        origin: Instant,
        starts: Vec<Duration>,
        durations: Vec<Duration>,
        errored: Vec<bool>,
        limit: usize,
        stop: watch::Sender<bool>,
    }

    #[async_trait]
    impl CycleRunner for FakeRunner {
        async fn run_cycle(&mut self, _shutdown: &watch::Receiver<bool>) -> CycleReport {
            let n = self.starts.len();
            self.starts.push(self.origin.elapsed());

            let work = self.durations.get(n).copied().unwrap_or_default();
            tokio::time::sleep(work).await;

            if self.starts.len() >= self.limit {
                self.stop.send_replace(true);
            }

            let errored = self.errored.get(n).copied().unwrap_or(false);
            CycleReport {
                cycle_id: Uuid::new_v4(),
                state: if errored { CycleState::Errored } else { CycleState::Done },
                counts: CycleCounts::default(),
                attempts: 1,
                result: PollResult {
                    new_listings: vec![],
                    errors: if errored { vec![CycleError::Data("boom".into())] } else { vec![] },
                },
                interrupted: false,
                duration: work,
            }
        }
    }

    fn runner(
        limit: usize,
        durations: Vec<Duration>,
        errored: Vec<bool>,
    ) -> (FakeRunner, watch::Receiver<bool>) {
        let (stop, rx) = watch::channel(false);
        (
            FakeRunner {
                origin: Instant::now(),
                starts: vec![],
                durations,
                errored,
                limit,
                stop,
            },
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_interval() {
        let (mut fake, rx) = runner(3, vec![Duration::from_secs(5); 3], vec![]);
        let cycles = Scheduler::new(Duration::from_secs(300)).run(&mut fake, rx).await;

        assert_eq!(cycles, 3);
        let secs: Vec<u64> = fake.starts.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![0, 300, 600]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_is_followed_immediately_without_overlap() {
        let durations = vec![
            Duration::from_secs(10),
            Duration::from_secs(400),
            Duration::from_secs(10),
            Duration::from_secs(10),
        ];
        let (mut fake, rx) = runner(4, durations, vec![]);
        Scheduler::new(Duration::from_secs(300)).run(&mut fake, rx).await;

        let secs: Vec<u64> = fake.starts.iter().map(|d| d.as_secs()).collect();
        // second cycle runs 300..700, third starts right away, then back on a 300s cadence
        assert_eq!(secs, vec![0, 300, 700, 1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errored_cycles_do_not_change_cadence() {
        let (mut fake, rx) = runner(3, vec![], vec![true, true, false]);
        let cycles = Scheduler::new(Duration::from_secs(60)).run(&mut fake, rx).await;

        assert_eq!(cycles, 3);
        let secs: Vec<u64> = fake.starts.iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![0, 60, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_start_runs_nothing() {
        let (mut fake, rx) = runner(10, vec![], vec![]);
        fake.stop.send_replace(true);

        let cycles = Scheduler::new(Duration::from_secs(60)).run(&mut fake, rx).await;
        assert_eq!(cycles, 0);
        assert!(fake.starts.is_empty());
    }
}
