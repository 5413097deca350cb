//! Job evaluation and the timing loop.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Local, NaiveDateTime};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::store::{JobStore, StoreError};
use crate::{Job, JobKind, Weekday};

/// Poll interval while no job has a future run.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Owns the job collection and its durable store. Every mutation persists
/// before returning; the in-memory view never diverges from disk.
pub struct Scheduler {
    store: JobStore,
    jobs: RwLock<Vec<Job>>,
}

impl Scheduler {
    pub fn new(store: JobStore) -> Self {
        Self {
            store,
            jobs: RwLock::new(Vec::new()),
        }
    }

    /// Populate the in-memory view from the store. A missing file is an
    /// empty schedule; a corrupt file is fatal.
    pub async fn load(&self) -> Result<(), StoreError> {
        let jobs = self.store.load()?;
        info!("Loaded {} scheduled job(s)", jobs.len());
        *self.jobs.write().await = jobs;
        Ok(())
    }

    /// Append and persist; returns the stored job unchanged.
    pub async fn add_job(&self, job: Job) -> anyhow::Result<Job> {
        let mut jobs = self.jobs.write().await;
        let mut next = jobs.clone();
        next.push(job.clone());
        self.store.save(&next)?;
        *jobs = next;
        Ok(job)
    }

    /// Remove the job with the given id, persist, and report whether a
    /// removal occurred.
    pub async fn remove_job(&self, id: &str) -> anyhow::Result<bool> {
        let mut jobs = self.jobs.write().await;
        let next: Vec<Job> = jobs.iter().filter(|j| j.id != id).cloned().collect();
        let removed = next.len() < jobs.len();
        if removed {
            self.store.save(&next)?;
            *jobs = next;
        }
        Ok(removed)
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    /// The timing loop: each cycle selects the single soonest job across the
    /// whole set, waits for its due time (waking early on cancellation), and
    /// awaits `on_fire` to completion before evaluating again — at most one
    /// job fires at a time. A fired `once` job is removed and the removal
    /// persisted; removal failure is logged and the loop continues.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, on_fire: F)
    where
        F: Fn(Job) -> Fut,
        Fut: Future<Output = ()>,
    {
        info!("Scheduler loop started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let now = Local::now().naive_local();
            let due = next_due(&self.jobs.read().await, now);
            let Some((job, when)) = due else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
                continue;
            };

            let delay = (when - Local::now().naive_local())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            on_fire(job.clone()).await;

            if matches!(job.kind, JobKind::Once { .. }) {
                if let Err(e) = self.remove_job(&job.id).await {
                    warn!("Failed to remove fired one-shot job {}: {e:#}", job.id);
                }
            }
        }
        info!("Scheduler loop stopped");
    }
}

/// Next occurrence of `job` strictly after `now`, or None when the job has
/// no future run (expired or unparsable — such jobs stay in storage dormant
/// until cancelled).
pub fn next_run(job: &Job, now: NaiveDateTime) -> Option<NaiveDateTime> {
    match &job.kind {
        JobKind::Once { at } => {
            let t = parse_local(at)?;
            (t > now).then_some(t)
        }
        JobKind::Daily { time_local, days } => next_daily(time_local, days.as_deref(), now),
    }
}

/// The soonest runnable job and its due time. `min_by` keeps the first of
/// equal elements, so ties go to the earliest stored position.
pub fn next_due(jobs: &[Job], now: NaiveDateTime) -> Option<(Job, NaiveDateTime)> {
    jobs.iter()
        .filter_map(|job| next_run(job, now).map(|when| (job, when)))
        .min_by(|a, b| a.1.cmp(&b.1))
        .map(|(job, when)| (job.clone(), when))
}

/// Parse an absolute timestamp as producer-local civil time: RFC3339 values
/// are converted to the local zone, bare datetimes are taken as already
/// local.
fn parse_local(at: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = DateTime::parse_from_rfc3339(at) {
        return Some(t.with_timezone(&Local).naive_local());
    }
    at.parse::<NaiveDateTime>().ok()
}

fn next_daily(
    time_local: &str,
    days: Option<&[Weekday]>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let (hh, mm) = parse_hhmm(time_local)?;
    // An empty restriction set means every day, same as no restriction.
    let days = days.filter(|d| !d.is_empty());
    let allowed =
        |t: NaiveDateTime| days.is_none_or(|d| d.contains(&Weekday::from(t.weekday())));

    let mut candidate = now.date().and_hms_opt(hh, mm, 0)?;
    while candidate <= now || !allowed(candidate) {
        candidate = candidate
            .date()
            .checked_add_days(Days::new(1))?
            .and_hms_opt(hh, mm, 0)?;
    }
    Some(candidate)
}

fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hh: u32 = h.trim().parse().ok()?;
    let mm: u32 = m.trim().parse().ok()?;
    (hh < 24 && mm < 60).then_some((hh, mm))
}
