//! The job lifecycle state machine.
use crate::error::SchedError;
use crate::resource::Resources;
use std::fmt::{self, Debug, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A callback invoked once, at the moment a job transitions from pending or
/// reserved into started, to determine how long it actually runs. Defaults to
/// the job's `time_limit`. This is the sole point where a driver can model a job
/// that finishes early.
pub type RuntimeFn = Box<dyn FnMut(u64) -> u64 + Send>;

/// The state of a [`Job`] in its lifecycle.
///
/// See the module-level table in `SPEC_FULL.md` §4.3 for the full transition
/// table; [`Job`]'s methods are the only legal way to move between these states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JobState {
    New,
    Pending,
    Started,
    Reserved,
    Finished,
}

/// A batch job: an immutable demand (time limit and resource vector) plus the
/// mutable state the simulator fills in as it progresses through the machine.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Job {
    time_limit: u64,
    demand: Resources,

    job_id: Option<u64>,
    start_time: Option<u64>,
    deadline: Option<u64>,
    end_time: Option<u64>,
    state: JobState,

    #[cfg_attr(feature = "serde", serde(skip))]
    runtime_fn: Option<RuntimeFn>,
}

impl Job {
    /// Creates a new job in the [`JobState::New`] state.
    ///
    /// # Panics
    /// Panics if `time_limit` is zero.
    pub fn new(time_limit: u64, demand: Resources) -> Self {
        assert!(time_limit > 0, "job time_limit must be positive");
        Job {
            time_limit,
            demand,
            job_id: None,
            start_time: None,
            deadline: None,
            end_time: None,
            state: JobState::New,
            runtime_fn: None,
        }
    }

    /// Attaches a callback computing the job's actual runtime (given the time it
    /// starts) instead of always running for the full `time_limit`. The callback
    /// is invoked exactly once, when the job starts.
    pub fn with_actual_runtime(mut self, f: impl FnMut(u64) -> u64 + Send + 'static) -> Self {
        self.runtime_fn = Some(Box::new(f));
        self
    }

    pub fn time_limit(&self) -> u64 {
        self.time_limit
    }

    pub fn demand(&self) -> &Resources {
        &self.demand
    }

    pub fn job_id(&self) -> Option<u64> {
        self.job_id
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn end_time(&self) -> Option<u64> {
        self.end_time
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == JobState::New
    }

    pub fn is_pending(&self) -> bool {
        self.state == JobState::Pending
    }

    pub fn is_started(&self) -> bool {
        self.state == JobState::Started
    }

    pub fn is_reserved(&self) -> bool {
        self.state == JobState::Reserved
    }

    pub fn is_finished(&self) -> bool {
        self.state == JobState::Finished
    }

    /// `New` -> `Pending`. `job_id` is assigned by [`crate::system::System`] at
    /// enqueue time.
    pub(crate) fn enqueued(&mut self, job_id: u64) -> Result<(), SchedError> {
        if !self.is_new() {
            return Err(SchedError::invariant(format!(
                "enqueued() called on job in state {:?}, expected New",
                self.state
            )));
        }
        self.job_id = Some(job_id);
        self.state = JobState::Pending;
        Ok(())
    }

    /// `Pending` -> `Reserved`.
    pub(crate) fn reserve(&mut self, now: u64, start_time: u64) -> Result<(), SchedError> {
        if !self.is_pending() {
            return Err(SchedError::invariant(format!(
                "reserve() called on job in state {:?}, expected Pending",
                self.state
            )));
        }
        if start_time <= now {
            return Err(SchedError::invariant(format!(
                "reserve() start_time {start_time} must be strictly after now {now}"
            )));
        }
        self.start_time = Some(start_time);
        self.deadline = Some(start_time + self.time_limit);
        self.state = JobState::Reserved;
        Ok(())
    }

    /// `Reserved` -> `Pending`.
    pub(crate) fn unreserve(&mut self) -> Result<(), SchedError> {
        if !self.is_reserved() {
            return Err(SchedError::invariant(format!(
                "unreserve() called on job in state {:?}, expected Reserved",
                self.state
            )));
        }
        self.start_time = None;
        self.deadline = None;
        self.state = JobState::Pending;
        Ok(())
    }

    /// `Pending` or `Reserved` -> `Started`. If the job was reserved, its
    /// `start_time` is fixed to `now` (the caller is responsible for only
    /// starting a reservation at its scheduled instant).
    pub(crate) fn start(&mut self, now: u64) -> Result<(), SchedError> {
        if !self.is_pending() && !self.is_reserved() {
            return Err(SchedError::invariant(format!(
                "start() called on job in state {:?}, expected Pending or Reserved",
                self.state
            )));
        }
        let actual_runtime = match &mut self.runtime_fn {
            Some(f) => f(now).min(self.time_limit),
            None => self.time_limit,
        };
        self.start_time = Some(now);
        self.deadline = Some(now + self.time_limit);
        self.end_time = Some(now + actual_runtime);
        self.state = JobState::Started;
        Ok(())
    }

    /// `Started` -> `Finished`.
    pub(crate) fn end(&mut self, now: u64) -> Result<(), SchedError> {
        if !self.is_started() {
            return Err(SchedError::invariant(format!(
                "end() called on job in state {:?}, expected Started",
                self.state
            )));
        }
        let deadline = self.deadline.expect("Started job must have a deadline");
        if now > deadline {
            return Err(SchedError::invariant(format!(
                "end() at {now} is after deadline {deadline}"
            )));
        }
        self.end_time = Some(now);
        self.state = JobState::Finished;
        Ok(())
    }
}

impl Debug for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_id", &self.job_id)
            .field("state", &self.state)
            .field("time_limit", &self.time_limit)
            .field("start_time", &self.start_time)
            .field("deadline", &self.deadline)
            .field("end_time", &self.end_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand() -> Resources {
        Resources::from([1])
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut j = Job::new(10, demand());
        assert!(j.is_new());

        j.enqueued(0).unwrap();
        assert!(j.is_pending());
        assert_eq!(j.job_id(), Some(0));

        j.reserve(0, 5).unwrap();
        assert!(j.is_reserved());
        assert_eq!(j.start_time(), Some(5));
        assert_eq!(j.deadline(), Some(15));
        assert_eq!(j.end_time(), None);

        j.unreserve().unwrap();
        assert!(j.is_pending());
        assert_eq!(j.start_time(), None);

        j.start(5).unwrap();
        assert!(j.is_started());
        assert_eq!(j.start_time(), Some(5));
        assert_eq!(j.deadline(), Some(15));
        assert_eq!(j.end_time(), Some(15));

        j.end(12).unwrap();
        assert!(j.is_finished());
        assert_eq!(j.end_time(), Some(12));
    }

    #[test]
    fn illegal_transition_is_invariant_violation() {
        let mut j = Job::new(10, demand());
        assert!(matches!(
            j.start(0),
            Err(SchedError::InvariantViolation(_))
        ));
    }

    #[test]
    fn actual_runtime_callback_is_capped_at_time_limit() {
        let mut j = Job::new(10, demand()).with_actual_runtime(|_now| 100);
        j.enqueued(0).unwrap();
        j.start(0).unwrap();
        assert_eq!(j.end_time(), Some(10));
    }

    #[test]
    fn reserve_in_the_past_is_rejected() {
        let mut j = Job::new(10, demand());
        j.enqueued(0).unwrap();
        assert!(matches!(
            j.reserve(5, 5),
            Err(SchedError::InvariantViolation(_))
        ));
    }
}
