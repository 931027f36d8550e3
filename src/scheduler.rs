//! Daily job scheduler
//!
//! `tick` is pure bookkeeping: it never performs I/O, it only reports which
//! jobs are due so the bot loop can run them in the same iteration.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, info};

use crate::sources::Request;

/// A job that runs once a day at a fixed time
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Minute of the day the job fires in (seconds are ignored)
    pub trigger: NaiveTime,
    pub request: Request,
    /// Date of the last firing; kept in memory only
    pub last_run: Option<NaiveDate>,
}

impl ScheduledJob {
    fn is_due(&self, now: NaiveDateTime) -> bool {
        let same_minute =
            now.hour() == self.trigger.hour() && now.minute() == self.trigger.minute();
        same_minute && self.last_run != Some(now.date())
    }
}

/// Scheduler for daily jobs
#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `request` every day at `time_of_day`.
    pub fn register_daily(&mut self, time_of_day: NaiveTime, request: Request) {
        info!("Scheduled {:?} daily at {}", request, time_of_day.format("%H:%M"));
        self.jobs.push(ScheduledJob {
            trigger: time_of_day,
            request,
            last_run: None,
        });
    }

    /// Mark and return every job due at `now`.
    ///
    /// A job is due when `now` falls in its trigger minute and it has not
    /// already fired on `now`'s date. Missed minutes are not replayed.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<Request> {
        let mut due = Vec::new();
        for job in self.jobs.iter_mut().filter(|job| job.is_due(now)) {
            debug!("Job {:?} due at {}", job.request, now);
            job.last_run = Some(now.date());
            due.push(job.request.clone());
        }
        due
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
