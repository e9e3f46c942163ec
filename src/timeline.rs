//! A timeline of resource availability, keyed by integer time.
//!
//! The timeline holds one entry per time at which something changes: a job
//! starting, a job ending, or a reservation's deadline expiring. Each entry
//! caches the machine's resource vector as of that instant, so a query at
//! any time `t` reduces to a single [`Tree::lower_bound`]-style lookup
//! rather than replaying every reservation from the start of the
//! simulation.

use crate::error::SchedError;
use crate::job::Job;
use crate::resource::Resources;
use crate::tree::rb::Rb;
use crate::tree::Tree;

/// The events and post-event resource projection recorded at one instant.
///
/// `start`/`end`/`expired` are kept as insertion-ordered job-id lists rather
/// than sets: a job is only ever a member of one such list at a given key at
/// a time (the timeline's own call discipline guarantees this), and ordered
/// iteration makes event processing order reproducible for a given input,
/// which a `HashSet` would not.
#[derive(Clone, Debug)]
pub struct TimelineEntry {
    pub start: Vec<u64>,
    pub end: Vec<u64>,
    pub expired: Vec<u64>,
    pub resources: Resources,
}

impl TimelineEntry {
    fn seeded_from(prev: Option<&TimelineEntry>, total: &Resources) -> Self {
        let resources = match prev {
            Some(p) => p.resources.clone(),
            None => total.clone(),
        };
        TimelineEntry {
            start: Vec::new(),
            end: Vec::new(),
            expired: Vec::new(),
            resources,
        }
    }

    fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty() && self.expired.is_empty()
    }
}

fn remove_job_id(list: &mut Vec<u64>, job_id: u64) {
    if let Some(pos) = list.iter().position(|&id| id == job_id) {
        list.remove(pos);
    }
}

/// A keyed projection of machine resource availability over time, backed by
/// a red-black [`Tree`].
pub struct Timeline {
    total_resources: Resources,
    tree: Tree<u64, TimelineEntry, Rb>,
}

impl Timeline {
    pub fn new(total_resources: Resources) -> Self {
        Timeline {
            total_resources,
            tree: Tree::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn data_at(&mut self, t: u64) -> crate::tree::NodeId {
        let total = self.total_resources.clone();
        let (_, id) = self
            .tree
            .get_or_insert_with(t, |prev| TimelineEntry::seeded_from(prev, &total));
        id
    }

    fn cleanup(&mut self, t: u64) {
        let empty = self.tree.get(&t).is_some_and(TimelineEntry::is_empty);
        if empty {
            let _ = self.tree.remove(&t);
        }
    }

    fn insert_start_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        self.tree.value_at_mut(id).start.push(job_id);
    }

    fn insert_expire_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        self.tree.value_at_mut(id).expired.push(job_id);
    }

    fn insert_end_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        self.tree.value_at_mut(id).end.push(job_id);
    }

    fn remove_start_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        remove_job_id(&mut self.tree.value_at_mut(id).start, job_id);
        self.cleanup(t);
    }

    fn remove_expire_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        remove_job_id(&mut self.tree.value_at_mut(id).expired, job_id);
        self.cleanup(t);
    }

    fn remove_end_event(&mut self, t: u64, job_id: u64) {
        let id = self.data_at(t);
        remove_job_id(&mut self.tree.value_at_mut(id).end, job_id);
        self.cleanup(t);
    }

    /// Records a job's reservation: a `start` event at `job.start_time`, an
    /// `expired` event at `job.deadline`, and subtracts the job's demand
    /// from every entry's projection in `[start_time, deadline)`.
    pub fn add_job_reservation(&mut self, job: &Job) {
        let start_time = job.start_time().expect("reserved job must have a start_time");
        let deadline = job.deadline().expect("reserved job must have a deadline");
        let job_id = job.job_id().expect("reserved job must have a job_id");

        tracing::trace!(job_id, start_time, deadline, "recording reservation");
        self.insert_start_event(start_time, job_id);
        self.insert_expire_event(deadline, job_id);

        self.apply_delta(start_time, deadline, |r, d| *r -= d, job.demand());
    }

    /// Undoes [`Timeline::add_job_reservation`].
    pub fn remove_job_reservation(&mut self, job: &Job) {
        let start_time = job.start_time().expect("reserved job must have a start_time");
        let deadline = job.deadline().expect("reserved job must have a deadline");
        let job_id = job.job_id().expect("reserved job must have a job_id");

        self.remove_start_event(start_time, job_id);
        self.remove_expire_event(deadline, job_id);

        self.apply_delta(start_time, deadline, |r, d| *r += d, job.demand());
    }

    /// Records that a reservation has actually started: adds an `end` event
    /// at the job's (possibly shorter-than-deadline) `end_time`.
    pub fn start_job_reservation(&mut self, job: &Job) {
        let end_time = job.end_time().expect("started job must have an end_time");
        let job_id = job.job_id().expect("started job must have a job_id");
        self.insert_end_event(end_time, job_id);
    }

    /// Records that a started job ended at `new_end_time`, which may be
    /// earlier than the job's originally slated `end_time`. Restores the
    /// resources the job held between `new_end_time` and its deadline, and
    /// removes the now-moot `expired` event at the deadline.
    pub fn end_job_reservation(&mut self, job: &Job, new_end_time: u64) {
        let prev_end_time = job.end_time().expect("started job must have an end_time");
        let prev_deadline = job.deadline().expect("started job must have a deadline");
        let job_id = job.job_id().expect("started job must have a job_id");

        debug_assert!(new_end_time <= prev_deadline);
        debug_assert!(new_end_time <= prev_end_time);

        if new_end_time < prev_end_time {
            self.insert_end_event(new_end_time, job_id);
            self.remove_end_event(prev_end_time, job_id);
        }

        if new_end_time < prev_deadline {
            self.apply_delta(new_end_time, prev_deadline, |r, d| *r += d, job.demand());
        }

        self.remove_expire_event(prev_deadline, job_id);
    }

    fn apply_delta(&mut self, lo: u64, hi: u64, op: impl Fn(&mut Resources, &Resources), demand: &Resources) {
        let keys: Vec<u64> = self.tree.items(Some(&lo), Some(&hi), false).map(|(&k, _)| k).collect();
        for k in keys {
            let id = self.data_at(k);
            op(&mut self.tree.value_at_mut(id).resources, demand);
        }
    }

    /// Iterates `(time, resources)` starting no earlier than `start_time`,
    /// and ending before `end_time` if given, otherwise unbounded. Each
    /// projection holds from its time up to (but not including) the next
    /// entry's time.
    pub fn iter_resources<'a>(
        &'a self,
        start_time: u64,
        end_time: Option<u64>,
    ) -> Box<dyn Iterator<Item = (u64, &'a Resources)> + 'a> {
        if self.tree.is_empty() {
            let total = &self.total_resources;
            return Box::new(std::iter::once((start_time, total)));
        }

        // The entry already in effect at `start_time` may have been recorded
        // at an earlier key; start iterating from there so its resources are
        // visible for the whole `[start_time, ...)` window, not just from
        // its own key onward.
        let lo = self.tree.floor(&start_time).map(|(k, _)| *k);
        Box::new(
            self.tree
                .items(lo.as_ref(), end_time.as_ref(), false)
                .map(move |(&t, entry)| (start_time.max(t), &entry.resources)),
        )
    }

    /// Whether `job` could run from `start_time` through `start_time +
    /// time_limit` without exceeding capacity at any instant in that window.
    pub fn can_schedule(&self, job: &Job, start_time: u64) -> bool {
        if self.tree.is_empty() {
            return true;
        }
        self.iter_resources(start_time, Some(start_time + job.time_limit()))
            .all(|(_, rsc)| rsc.all_geq(job.demand()))
    }

    /// Finds the earliest time at or after `start_time` at which `job` could
    /// run for its full `time_limit` without exceeding capacity.
    ///
    /// If `reserve` is `false`, only `start_time` itself is considered (the
    /// caller wants to know whether the job can start *right now*, not
    /// whether a future reservation is possible) and `Ok(None)` is a normal
    /// outcome. If `reserve` is `true`, later candidate times are tried until
    /// one works; this is guaranteed to succeed by the time the walk reaches
    /// the timeline's last key, since `System::enqueue_job` already rejects
    /// any job whose demand exceeds `total_resources`, and resources there
    /// have fully recovered. Exhausting the walk without finding one is
    /// therefore an invariant violation, not a normal "keep it pending"
    /// outcome.
    pub fn find_schedulable_time(&self, job: &Job, start_time: u64, reserve: bool) -> Result<Option<u64>, SchedError> {
        if self.tree.is_empty() {
            return Ok(Some(start_time));
        }

        let iter_start_key = self.tree.floor(&start_time).map(|(k, _)| *k);

        for (&iter_t, _) in self.tree.items(iter_start_key.as_ref(), None, false) {
            if !reserve && iter_t > start_time {
                return Ok(None);
            }

            let cur_t = start_time.max(iter_t);
            let fits = self
                .tree
                .items(Some(&iter_t), Some(&(cur_t + job.time_limit())), false)
                .all(|(_, entry)| entry.resources.all_geq(job.demand()));
            if fits {
                return Ok(Some(cur_t));
            }
        }

        if reserve {
            Err(SchedError::invariant(
                "find_schedulable_time exhausted the timeline without finding a slot for a job whose demand fits total_resources",
            ))
        } else {
            Ok(None)
        }
    }

    /// Iterates `(time, entry)` pairs with `time` in `[lo, hi)`, ascending or
    /// descending.
    pub fn iter(&self, lo: Option<&u64>, hi: Option<&u64>, reverse: bool) -> impl Iterator<Item = (&u64, &TimelineEntry)> {
        self.tree.items(lo, hi, reverse)
    }

    /// The entry recorded at exactly `t`, if any.
    pub fn entry_at(&self, t: u64) -> Option<&TimelineEntry> {
        self.tree.get(&t)
    }

    /// The next recorded event strictly after `after_time`, if any.
    pub fn next_event(&self, after_time: u64) -> Option<(u64, &TimelineEntry)> {
        self.tree.upper_bound(&after_time).map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(time_limit: u64, demand: i64, job_id: u64) -> Job {
        let mut j = Job::new(time_limit, Resources::from([demand]));
        j.enqueued(job_id).unwrap();
        j
    }

    #[test]
    fn empty_timeline_reports_full_capacity() {
        let tl = Timeline::new(Resources::from([10]));
        assert!(tl.can_schedule(&job(5, 10, 0), 0));
        assert!(!tl.can_schedule(&job(5, 11, 0), 0));
    }

    #[test]
    fn reservation_reduces_overlapping_window() {
        let mut tl = Timeline::new(Resources::from([10]));
        let mut j = job(10, 6, 0);
        j.reserve(0, 5).unwrap();
        tl.add_job_reservation(&j);

        assert!(!tl.can_schedule(&job(5, 6, 1), 5));
        assert!(tl.can_schedule(&job(5, 4, 1), 5));
        assert!(tl.can_schedule(&job(5, 10, 1), 15));
    }

    #[test]
    fn removing_reservation_restores_capacity() {
        let mut tl = Timeline::new(Resources::from([10]));
        let mut j = job(10, 6, 0);
        j.reserve(0, 5).unwrap();
        tl.add_job_reservation(&j);
        tl.remove_job_reservation(&j);

        assert!(tl.is_empty());
        assert!(tl.can_schedule(&job(5, 10, 1), 5));
    }

    #[test]
    fn find_schedulable_time_without_reserve_only_checks_now() {
        let mut tl = Timeline::new(Resources::from([10]));
        let mut blocker = job(10, 10, 0);
        blocker.start(0).unwrap();
        tl.add_job_reservation(&blocker);
        tl.start_job_reservation(&blocker);

        assert_eq!(tl.find_schedulable_time(&job(1, 1, 1), 0, false).unwrap(), None);
        assert_eq!(tl.find_schedulable_time(&job(1, 1, 1), 0, true).unwrap(), Some(10));
    }

    #[test]
    fn early_end_restores_capacity_before_deadline() {
        let mut tl = Timeline::new(Resources::from([10]));
        let mut j = job(10, 10, 0);
        j.reserve(0, 0).unwrap();
        tl.add_job_reservation(&j);
        j.start(0).unwrap();
        tl.start_job_reservation(&j);

        tl.end_job_reservation(&j, 3);

        assert!(tl.can_schedule(&job(5, 10, 1), 4));
    }
}
