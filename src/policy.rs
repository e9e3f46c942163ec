//! Scheduling policies: strategies for deciding, each time the scheduler
//! loop runs, which pending jobs to start or reserve.
//!
//! A policy only ever calls [`System`]'s public scheduling operations; it
//! never touches the timeline or job state directly.

use crate::error::SchedError;
use crate::system::{ScheduleOutcome, System};
use std::collections::VecDeque;

/// A scheduling policy: decides what to do with the pending queue each time
/// the scheduler loop runs.
pub trait Policy {
    fn run(&mut self, system: &mut System) -> Result<(), SchedError>;
}

/// First-come-first-served: jobs are started strictly in queue order; the
/// first job that can't start immediately blocks everything behind it.
#[derive(Default)]
pub struct Fcfs;

impl Policy for Fcfs {
    fn run(&mut self, system: &mut System) -> Result<(), SchedError> {
        while let Some(job) = system.pop_front_pending() {
            match system.start_or_reserve_job(job, false)? {
                ScheduleOutcome::Started => {}
                ScheduleOutcome::Reserved => unreachable!("reserve=false never reserves"),
                ScheduleOutcome::Pending(job) => {
                    system.push_front_pending(job);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// The parameterized backfill procedure: unifies EASY backfill, conservative
/// backfill, and hybrid-N backfill behind one `max_reservations` cap.
///
/// On each run, all existing reservations are dropped and the pending queue
/// is replayed from the front: each job is started if possible, reserved if
/// a reservation slot remains (`cur_reserved < max_reservations`), and
/// otherwise left pending — without even being considered for a future
/// reservation, unlike a job that fails `start_or_reserve_job(_, true)`.
pub struct BackfillPolicy {
    max_reservations: Option<usize>,
}

impl BackfillPolicy {
    pub fn new(max_reservations: Option<usize>) -> Self {
        BackfillPolicy { max_reservations }
    }

    /// At most one job may hold a reservation at a time: only the head of
    /// the pending queue is allowed to reserve a future slot.
    pub fn easy() -> Self {
        BackfillPolicy::new(Some(1))
    }

    /// Any pending job may hold a reservation; the scheduler always reserves
    /// rather than leaving a job unscheduled when an immediate start isn't
    /// possible.
    pub fn conservative() -> Self {
        BackfillPolicy::new(None)
    }

    /// Up to `n` jobs may hold reservations simultaneously.
    pub fn hybrid(n: usize) -> Self {
        BackfillPolicy::new(Some(n))
    }
}

impl Policy for BackfillPolicy {
    fn run(&mut self, system: &mut System) -> Result<(), SchedError> {
        let mut cur_reserved = 0usize;
        let mut new_pending = VecDeque::new();

        system.unreserve_all_jobs();

        while let Some(job) = system.pop_front_pending() {
            let under_cap = self.max_reservations.is_none_or(|cap| cur_reserved < cap);
            if under_cap {
                match system.start_or_reserve_job(job, true)? {
                    ScheduleOutcome::Reserved => cur_reserved += 1,
                    ScheduleOutcome::Started => {}
                    ScheduleOutcome::Pending(_) => unreachable!("reserve=true never fails to schedule"),
                }
            } else {
                match system.start_or_reserve_job(job, false)? {
                    ScheduleOutcome::Started => {}
                    ScheduleOutcome::Reserved => unreachable!("reserve=false never reserves"),
                    ScheduleOutcome::Pending(job) => new_pending.push_back(job),
                }
            }
        }

        system.replace_pending_queue(new_pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use crate::resource::Resources;

    fn sys(cap: i64) -> System {
        System::new(Resources::from([cap]))
    }

    #[test]
    fn fcfs_head_of_line_blocking() {
        let mut s = sys(10);
        s.enqueue_job(Job::new(10, Resources::from([8]))).unwrap();
        s.enqueue_job(Job::new(10, Resources::from([1]))).unwrap();
        Fcfs.run(&mut s).unwrap();
        assert_eq!(s.pending_jobs().len(), 1, "second job must wait behind the first");
    }

    #[test]
    fn easy_backfill_reserves_a_future_slot_instead_of_leaving_pending() {
        // A occupies the whole machine, so B cannot start now; under plain
        // FCFS it would simply stay pending. Backfill instead reserves it a
        // slot for when A's reservation expires.
        let mut s = sys(10);
        s.enqueue_job(Job::new(10, Resources::from([10]))).unwrap();
        s.enqueue_job(Job::new(3, Resources::from([1]))).unwrap();
        BackfillPolicy::easy().run(&mut s).unwrap();
        assert_eq!(s.pending_jobs().len(), 0);
        assert_eq!(s.running_jobs().len(), 1);
        assert_eq!(s.reserved_jobs().len(), 1);
        assert_eq!(s.reserved_jobs()[0].start_time(), Some(10));
    }

    #[test]
    fn conservative_backfill_reserves_everything_it_cannot_start() {
        let mut s = sys(10);
        s.enqueue_job(Job::new(10, Resources::from([8]))).unwrap();
        s.enqueue_job(Job::new(5, Resources::from([8]))).unwrap();
        BackfillPolicy::conservative().run(&mut s).unwrap();
        assert_eq!(s.pending_jobs().len(), 0);
        assert_eq!(s.reserved_jobs().len(), 1);
    }
}
