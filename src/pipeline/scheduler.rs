// src/pipeline/scheduler.rs

//! Run trigger loop.
//!
//! Runs the job once at startup, then polls the clock in fixed increments and
//! runs again whenever the configured daily or weekly time has passed. Missed
//! windows are not replayed: after each run the next due time is computed
//! from the current time. Only one run executes at a time.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Days, Local, NaiveDateTime, NaiveTime, Weekday};

use crate::error::{AppError, Result};
use crate::models::ScheduleConfig;
use crate::pipeline::RunOutcome;

/// Something the scheduler can run.
#[async_trait]
pub trait JobRunner: Send {
    async fn run_job(&mut self) -> RunOutcome;
}

/// When runs are due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily(NaiveTime),
    Weekly(Weekday, NaiveTime),
}

impl Schedule {
    /// Build from configuration. Unknown frequencies fall back to daily.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        let time = config.run_time()?;
        match config.frequency.trim().to_lowercase().as_str() {
            "daily" => Ok(Schedule::Daily(time)),
            "weekly" => {
                let weekday: Weekday = config.weekday.trim().parse().map_err(|_| {
                    AppError::config(format!("unknown weekday '{}'", config.weekday))
                })?;
                Ok(Schedule::Weekly(weekday, time))
            }
            other => {
                log::warn!("Unknown frequency: {other}, defaulting to daily");
                Ok(Schedule::Daily(time))
            }
        }
    }

    /// First due time strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Schedule::Daily(time) => {
                let today = now.date().and_time(time);
                if today > now {
                    today
                } else {
                    today + Days::new(1)
                }
            }
            Schedule::Weekly(weekday, time) => {
                let ahead = (7 + weekday.num_days_from_monday()
                    - now.weekday().num_days_from_monday())
                    % 7;
                let candidate = now.date().and_time(time) + Days::new(u64::from(ahead));
                if candidate > now {
                    candidate
                } else {
                    candidate + Days::new(7)
                }
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily(time) => write!(f, "daily at {}", time.format("%H:%M")),
            Schedule::Weekly(day, time) => {
                write!(f, "weekly on {day} at {}", time.format("%H:%M"))
            }
        }
    }
}

/// Wall clock used by the loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
    async fn sleep(&self, duration: Duration);
}

/// Local time and tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Drives a [`JobRunner`] according to a [`Schedule`].
pub struct Scheduler<C: Clock = SystemClock> {
    schedule: Schedule,
    poll_interval: Duration,
    clock: C,
    next_due: Option<NaiveDateTime>,
    state: RunState,
    runs: u64,
}

impl Scheduler<SystemClock> {
    pub fn new(schedule: Schedule, poll_interval: Duration) -> Self {
        Self::with_clock(schedule, poll_interval, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(schedule: Schedule, poll_interval: Duration, clock: C) -> Self {
        Self {
            schedule,
            poll_interval,
            clock,
            next_due: None,
            state: RunState::Idle,
            runs: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.next_due
    }

    /// Number of runs executed so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Schedule the first trigger, then run once immediately.
    pub async fn start<R: JobRunner + ?Sized>(&mut self, runner: &mut R) {
        let next = self.schedule.next_after(self.clock.now());
        self.next_due = Some(next);
        log::info!("Scheduled job to run {}; next run at {next}", self.schedule);

        log::info!("Running initial job");
        self.execute(runner).await;
    }

    /// Run the job if it is due. Returns whether a run happened.
    pub async fn poll<R: JobRunner + ?Sized>(&mut self, runner: &mut R) -> bool {
        let now = self.clock.now();
        let due = match self.next_due {
            Some(due) => due,
            None => {
                self.next_due = Some(self.schedule.next_after(now));
                return false;
            }
        };
        if now < due {
            return false;
        }

        self.execute(runner).await;
        let next = self.schedule.next_after(self.clock.now());
        self.next_due = Some(next);
        log::info!("Next run at {next}");
        true
    }

    /// `start`, then poll forever.
    pub async fn run_forever<R: JobRunner + ?Sized>(&mut self, runner: &mut R) {
        self.start(runner).await;
        log::info!("Entering schedule loop");
        loop {
            self.clock.sleep(self.poll_interval).await;
            self.poll(runner).await;
        }
    }

    async fn execute<R: JobRunner + ?Sized>(&mut self, runner: &mut R) {
        self.state = RunState::Running;
        self.runs += 1;
        let outcome = runner.run_job().await;
        self.state = if outcome.is_success() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        log::info!("Run #{} finished: {:?}", self.runs, self.state);
        self.state = RunState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::RunReport;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    /// Clock whose sleeps advance time instantly.
    struct ManualClock {
        now: Mutex<NaiveDateTime>,
    }

    impl ManualClock {
        fn new(now: NaiveDateTime) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        fn set(&self, now: NaiveDateTime) {
            *self.now.lock().unwrap() = now;
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap();
        }
    }

    /// Runner that fails on chosen run numbers.
    struct CountingRunner {
        runs: u32,
        fail_on: Vec<u32>,
    }

    #[async_trait]
    impl JobRunner for CountingRunner {
        async fn run_job(&mut self) -> RunOutcome {
            self.runs += 1;
            if self.fail_on.contains(&self.runs) {
                RunOutcome::Failed(AppError::source_fetch("tenders/x", "HTTP 500"))
            } else {
                RunOutcome::Succeeded(RunReport::default())
            }
        }
    }

    #[test]
    fn test_daily_next_after() {
        let schedule = Schedule::Daily(nine());
        assert_eq!(
            schedule.next_after(at(2025, 1, 6, 8, 0)),
            at(2025, 1, 6, 9, 0)
        );
        // Exactly on time is not "after"
        assert_eq!(
            schedule.next_after(at(2025, 1, 6, 9, 0)),
            at(2025, 1, 7, 9, 0)
        );
        assert_eq!(
            schedule.next_after(at(2025, 12, 31, 23, 0)),
            at(2026, 1, 1, 9, 0)
        );
    }

    #[test]
    fn test_weekly_next_after() {
        // 2025-01-06 is a Monday
        let schedule = Schedule::Weekly(Weekday::Mon, nine());
        assert_eq!(
            schedule.next_after(at(2025, 1, 6, 8, 0)),
            at(2025, 1, 6, 9, 0)
        );
        assert_eq!(
            schedule.next_after(at(2025, 1, 6, 10, 0)),
            at(2025, 1, 13, 9, 0)
        );
        assert_eq!(
            schedule.next_after(at(2025, 1, 8, 12, 0)),
            at(2025, 1, 13, 9, 0)
        );
        let friday = Schedule::Weekly(Weekday::Fri, nine());
        assert_eq!(
            friday.next_after(at(2025, 1, 6, 8, 0)),
            at(2025, 1, 10, 9, 0)
        );
    }

    #[test]
    fn test_from_config() {
        let mut config = ScheduleConfig::default();
        assert_eq!(
            Schedule::from_config(&config).unwrap(),
            Schedule::Daily(nine())
        );

        config.frequency = "weekly".to_string();
        config.weekday = "friday".to_string();
        assert_eq!(
            Schedule::from_config(&config).unwrap(),
            Schedule::Weekly(Weekday::Fri, nine())
        );

        config.frequency = "hourly".to_string();
        assert_eq!(
            Schedule::from_config(&config).unwrap(),
            Schedule::Daily(nine())
        );

        config.frequency = "weekly".to_string();
        config.weekday = "someday".to_string();
        assert!(Schedule::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_runs_immediately_then_on_schedule() {
        let clock = ManualClock::new(at(2025, 1, 6, 8, 0));
        let mut scheduler =
            Scheduler::with_clock(Schedule::Daily(nine()), Duration::from_secs(60), clock);
        let mut runner = CountingRunner {
            runs: 0,
            fail_on: vec![],
        };

        scheduler.start(&mut runner).await;
        assert_eq!(runner.runs, 1);
        assert_eq!(scheduler.next_due(), Some(at(2025, 1, 6, 9, 0)));

        scheduler.clock.set(at(2025, 1, 6, 8, 59));
        assert!(!scheduler.poll(&mut runner).await);

        scheduler.clock.set(at(2025, 1, 6, 9, 0));
        assert!(scheduler.poll(&mut runner).await);
        assert_eq!(runner.runs, 2);
        assert_eq!(scheduler.next_due(), Some(at(2025, 1, 7, 9, 0)));
        assert_eq!(scheduler.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_missed_windows_are_not_backfilled() {
        let clock = ManualClock::new(at(2025, 1, 6, 8, 0));
        let mut scheduler =
            Scheduler::with_clock(Schedule::Daily(nine()), Duration::from_secs(60), clock);
        let mut runner = CountingRunner {
            runs: 0,
            fail_on: vec![],
        };
        scheduler.start(&mut runner).await;

        // Process was suspended for three days
        scheduler.clock.set(at(2025, 1, 9, 12, 0));
        assert!(scheduler.poll(&mut runner).await);
        assert!(!scheduler.poll(&mut runner).await);
        assert_eq!(runner.runs, 2);
        assert_eq!(scheduler.next_due(), Some(at(2025, 1, 10, 9, 0)));
    }

    #[tokio::test]
    async fn test_failed_run_does_not_stop_loop() {
        let clock = ManualClock::new(at(2025, 1, 6, 8, 0));
        let mut scheduler =
            Scheduler::with_clock(Schedule::Daily(nine()), Duration::from_secs(3600), clock);
        let mut runner = CountingRunner {
            runs: 0,
            fail_on: vec![1, 2],
        };

        scheduler.start(&mut runner).await;
        assert_eq!(scheduler.state(), RunState::Idle);

        // Poll through two simulated days using the loop's own sleeps
        for _ in 0..48 {
            scheduler.clock.sleep(Duration::from_secs(3600)).await;
            scheduler.poll(&mut runner).await;
        }
        assert_eq!(runner.runs, 3);
        assert_eq!(scheduler.runs(), 3);
    }
}
