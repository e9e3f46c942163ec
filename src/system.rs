//! The simulator core: owns every job and the timeline, and exposes the
//! small set of operations a [`crate::policy::Policy`] or a driver loop
//! needs to advance the simulation.

use crate::error::SchedError;
use crate::job::{Job, JobState};
use crate::policy::Policy;
use crate::resource::Resources;
use crate::timeline::{Timeline, TimelineEntry};
use std::collections::VecDeque;

/// The outcome of trying to start or reserve a job "now".
///
/// `Pending` hands the job back to the caller rather than re-queuing it
/// internally, since only the caller (a [`Policy`]) knows where in its own
/// bookkeeping the job belongs next.
pub enum ScheduleOutcome {
    Started,
    Reserved,
    Pending(Job),
}

impl ScheduleOutcome {
    pub fn state(&self) -> JobState {
        match self {
            ScheduleOutcome::Started => JobState::Started,
            ScheduleOutcome::Reserved => JobState::Reserved,
            ScheduleOutcome::Pending(_) => JobState::Pending,
        }
    }
}

/// A batch-HPC machine and the jobs moving through it.
pub struct System {
    total_resources: Resources,
    cur_time: u64,
    jobs_enqueued: u64,
    should_run_sched_loop: bool,

    pending_jobs: VecDeque<Job>,
    reserved_jobs: Vec<Job>,
    running_jobs: Vec<Job>,
    finished_jobs: VecDeque<Job>,

    timeline: Timeline,
}

impl System {
    pub fn new(total_resources: Resources) -> Self {
        let timeline = Timeline::new(total_resources.clone());
        System {
            total_resources,
            cur_time: 0,
            jobs_enqueued: 0,
            should_run_sched_loop: false,
            pending_jobs: VecDeque::new(),
            reserved_jobs: Vec::new(),
            running_jobs: Vec::new(),
            finished_jobs: VecDeque::new(),
            timeline,
        }
    }

    pub fn cur_time(&self) -> u64 {
        self.cur_time
    }

    pub fn total_resources(&self) -> &Resources {
        &self.total_resources
    }

    pub fn should_run_sched_loop(&self) -> bool {
        self.should_run_sched_loop
    }

    pub fn pending_jobs(&self) -> &VecDeque<Job> {
        &self.pending_jobs
    }

    pub fn reserved_jobs(&self) -> &[Job] {
        &self.reserved_jobs
    }

    pub fn running_jobs(&self) -> &[Job] {
        &self.running_jobs
    }

    pub fn finished_jobs(&self) -> &VecDeque<Job> {
        &self.finished_jobs
    }

    pub fn iter_timeline(
        &self,
        lo: Option<&u64>,
        hi: Option<&u64>,
        reverse: bool,
    ) -> impl Iterator<Item = (&u64, &TimelineEntry)> {
        self.timeline.iter(lo, hi, reverse)
    }

    /// Pushes a [`JobState::New`] job onto the back of the pending queue,
    /// assigning it the next job id.
    ///
    /// # Errors
    /// Returns [`SchedError::DemandExceedsCapacity`] without mutating any
    /// state if `job`'s demand can never be satisfied by this machine.
    pub fn enqueue_job(&mut self, mut job: Job) -> Result<(), SchedError> {
        if !self.total_resources.all_geq(job.demand()) {
            tracing::debug!(demand = ?job.demand(), capacity = ?self.total_resources, "rejecting job: demand exceeds capacity");
            return Err(SchedError::DemandExceedsCapacity {
                demand: job.demand().clone(),
                capacity: self.total_resources.clone(),
            });
        }
        job.enqueued(self.jobs_enqueued)?;
        self.jobs_enqueued += 1;
        tracing::trace!(job_id = self.jobs_enqueued - 1, "job enqueued");
        self.pending_jobs.push_back(job);
        self.should_run_sched_loop = true;
        Ok(())
    }

    pub fn pop_front_pending(&mut self) -> Option<Job> {
        self.pending_jobs.pop_front()
    }

    pub fn push_front_pending(&mut self, job: Job) {
        self.pending_jobs.push_front(job);
    }

    /// Replaces the pending queue wholesale. Used by policies (backfill)
    /// that rebuild the queue from scratch each run.
    pub fn replace_pending_queue(&mut self, new_pending: VecDeque<Job>) {
        self.pending_jobs = new_pending;
    }

    fn take_reserved(&mut self, job_id: u64) -> Option<Job> {
        let idx = self.reserved_jobs.iter().position(|j| j.job_id() == Some(job_id))?;
        Some(self.reserved_jobs.remove(idx))
    }

    fn take_running(&mut self, job_id: u64) -> Option<Job> {
        let idx = self.running_jobs.iter().position(|j| j.job_id() == Some(job_id))?;
        Some(self.running_jobs.remove(idx))
    }

    /// Starts a `Pending` or `Reserved` job at the current timestep. If the
    /// job was reserved, its reservation must already be slated to start now.
    fn start_job(&mut self, mut job: Job) -> Result<(), SchedError> {
        let was_reserved = job.is_reserved();
        debug_assert!(
            !was_reserved || job.start_time() == Some(self.cur_time),
            "a reserved job can only be started at its slated start_time"
        );

        job.start(self.cur_time)?;
        if !was_reserved {
            self.timeline.add_job_reservation(&job);
        }
        self.timeline.start_job_reservation(&job);
        tracing::trace!(job_id = ?job.job_id(), cur_time = self.cur_time, was_reserved, "job started");
        self.running_jobs.push(job);
        self.should_run_sched_loop = true;
        Ok(())
    }

    /// Ends a `Started` job at the current timestep, which may be earlier
    /// than its slated end time (an early completion) or exactly at its
    /// deadline (a timeout/expiration).
    fn end_job(&mut self, job: Job) -> Result<(), SchedError> {
        self.timeline.end_job_reservation(&job, self.cur_time);
        let mut job = job;
        job.end(self.cur_time)?;
        tracing::trace!(job_id = ?job.job_id(), end_time = self.cur_time, "job finished");
        self.finished_jobs.push_back(job);
        self.should_run_sched_loop = true;
        Ok(())
    }

    fn reserve_job(&mut self, mut job: Job, t: u64) -> Result<(), SchedError> {
        job.reserve(self.cur_time, t)?;
        self.timeline.add_job_reservation(&job);
        tracing::trace!(job_id = ?job.job_id(), reserved_for = t, "job reserved");
        self.reserved_jobs.push(job);
        Ok(())
    }

    /// Drops every current reservation, restoring the reserved jobs to
    /// `Pending` and prepending them back onto the pending queue in their
    /// original (job id) order. Called at the start of every backfill pass,
    /// since a backfill policy recomputes reservations from scratch.
    pub fn unreserve_all_jobs(&mut self) {
        let mut reserved = std::mem::take(&mut self.reserved_jobs);
        tracing::trace!(count = reserved.len(), "unreserving all jobs");
        reserved.sort_by_key(|j| std::cmp::Reverse(j.job_id()));
        for mut job in reserved {
            self.timeline.remove_job_reservation(&job);
            job.unreserve().expect("reserved_jobs only ever holds Reserved-state jobs");
            self.pending_jobs.push_front(job);
        }
    }

    pub fn can_schedule(&self, job: &Job, start_time: u64) -> bool {
        self.timeline.can_schedule(job, start_time)
    }

    /// Tries to start `job` immediately; if that isn't possible and
    /// `reserve` is set, reserves the earliest future time it could run
    /// instead. Returns [`ScheduleOutcome::Pending`] (handing `job` back)
    /// if neither was possible.
    pub fn start_or_reserve_job(&mut self, job: Job, reserve: bool) -> Result<ScheduleOutcome, SchedError> {
        match self.timeline.find_schedulable_time(&job, self.cur_time, reserve)? {
            None => Ok(ScheduleOutcome::Pending(job)),
            Some(t) if t == self.cur_time => {
                self.start_job(job)?;
                Ok(ScheduleOutcome::Started)
            }
            Some(t) if t > self.cur_time => {
                self.reserve_job(job, t)?;
                Ok(ScheduleOutcome::Reserved)
            }
            Some(t) => unreachable!("find_schedulable_time returned a past time {t} < cur_time {}", self.cur_time),
        }
    }

    /// Runs `policy` once if anything has changed since it last ran.
    pub fn run_sched_loop<P: Policy>(&mut self, policy: &mut P) -> Result<(), SchedError> {
        if self.should_run_sched_loop {
            policy.run(self)?;
            self.should_run_sched_loop = false;
        }
        Ok(())
    }

    /// Processes every event recorded at the timeline's next event time,
    /// advancing `cur_time` to it. Returns `false` (without advancing) if
    /// the timeline has no more events.
    ///
    /// Each event list is read fresh immediately before its own loop, rather
    /// than all three snapshotted upfront: a job that runs its full
    /// `time_limit` has its deadline equal to its end_time, so it appears in
    /// both the `end` and `expired` lists at the same key. Ending it in the
    /// `end` loop removes it from `expired` before that loop reads the list,
    /// so it is only ever finished once.
    pub fn handle_events(&mut self) -> Result<bool, SchedError> {
        let Some((t, _)) = self.timeline.next_event(self.cur_time) else {
            return Ok(false);
        };
        self.cur_time = t;

        let event_ids = |tl: &Timeline, pick: fn(&TimelineEntry) -> &Vec<u64>| {
            tl.entry_at(t).map(|e| pick(e).clone()).unwrap_or_default()
        };

        for job_id in event_ids(&self.timeline, |e| &e.start) {
            let job = self
                .take_reserved(job_id)
                .expect("a timeline start event must reference a currently-reserved job");
            self.start_job(job)?;
        }
        for job_id in event_ids(&self.timeline, |e| &e.end) {
            let job = self
                .take_running(job_id)
                .expect("a timeline end event must reference a currently-running job");
            self.end_job(job)?;
        }
        for job_id in event_ids(&self.timeline, |e| &e.expired) {
            let job = self
                .take_running(job_id)
                .expect("a timeline expiration event must reference a currently-running job");
            self.end_job(job)?;
        }

        self.should_run_sched_loop = true;
        Ok(true)
    }

    /// Advances the simulation by one event: runs the scheduler loop if
    /// needed, handles the next timeline event, and runs the scheduler loop
    /// again if that event changed anything. Returns whether there was an
    /// event to handle; a driver loop runs `tick` until this returns `false`.
    #[tracing::instrument(skip(self, policy))]
    pub fn tick<P: Policy>(&mut self, policy: &mut P) -> Result<bool, SchedError> {
        self.run_sched_loop(policy)?;
        if self.handle_events()? {
            self.run_sched_loop(policy)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Runs the simulation to completion: every pending and reserved job is
    /// either started and finished, or left permanently pending because it
    /// can never be scheduled (e.g. its demand exceeds capacity, though
    /// [`System::enqueue_job`] already rejects that case up front).
    pub fn run<P: Policy>(&mut self, policy: &mut P) -> Result<(), SchedError> {
        while self.tick(policy)? {}
        Ok(())
    }
}
