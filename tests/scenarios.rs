//! End-to-end scheduling scenarios driving `System::run` with each policy.

use batchsim::{BackfillPolicy, Fcfs, Job, Resources, System};

fn job(time_limit: u64, demand: i64) -> Job {
    Job::new(time_limit, Resources::from([demand]))
}

fn makespan(s: &System) -> u64 {
    s.finished_jobs().iter().map(|j| j.end_time().unwrap()).max().unwrap()
}

/// S3: a single job has nothing to contend with; it runs start to finish.
#[test]
fn single_job_under_any_policy() {
    let mut s = System::new(Resources::from([5]));
    s.enqueue_job(job(10, 5)).unwrap();
    s.run(&mut Fcfs).unwrap();

    assert_eq!(s.finished_jobs().len(), 1);
    assert_eq!(s.finished_jobs()[0].start_time(), Some(0));
    assert_eq!(s.finished_jobs()[0].end_time(), Some(10));
    assert_eq!(makespan(&s), 10);
}

/// S4: under plain FCFS, job 1 blocks behind job 0 even though job 2 (which
/// arrived after job 1) has room to run alongside job 0 from the start.
#[test]
fn fcfs_head_of_line_blocking_with_a_fitting_successor() {
    let mut s = System::new(Resources::from([5]));
    s.enqueue_job(job(5, 3)).unwrap(); // job 0
    s.enqueue_job(job(5, 3)).unwrap(); // job 1
    s.enqueue_job(job(5, 2)).unwrap(); // job 2
    s.run(&mut Fcfs).unwrap();

    assert_eq!(s.finished_jobs().len(), 3);
    let by_id = |id: u64| s.finished_jobs().iter().find(|j| j.job_id() == Some(id)).unwrap();

    assert_eq!(by_id(0).start_time(), Some(0));
    assert_eq!(by_id(0).end_time(), Some(5));
    assert_eq!(by_id(1).start_time(), Some(5));
    assert_eq!(by_id(1).end_time(), Some(10));
    assert_eq!(by_id(2).start_time(), Some(0));
    assert_eq!(by_id(2).end_time(), Some(5));
    assert_eq!(makespan(&s), 10);
}

/// S2: EASY backfill lets smaller jobs jump ahead of a job that must wait for
/// two others to finish, as long as doing so doesn't delay the one
/// reservation EASY is willing to hold.
#[test]
fn easy_backfill_lets_small_jobs_jump_a_blocked_job() {
    let mut s = System::new(Resources::from([5]));
    s.enqueue_job(job(10, 2)).unwrap(); // job 0
    s.enqueue_job(job(5, 3)).unwrap(); // job 1
    s.enqueue_job(job(5, 5)).unwrap(); // job 2
    s.enqueue_job(job(3, 3)).unwrap(); // job 3
    s.enqueue_job(job(3, 1)).unwrap(); // job 4
    s.enqueue_job(job(2, 2)).unwrap(); // job 5
    s.run(&mut BackfillPolicy::easy()).unwrap();

    assert_eq!(s.finished_jobs().len(), 6);
    let by_id = |id: u64| s.finished_jobs().iter().find(|j| j.job_id() == Some(id)).unwrap();

    assert_eq!(by_id(0).start_time(), Some(0));
    assert_eq!(by_id(1).start_time(), Some(0));
    assert_eq!(by_id(2).start_time(), Some(10));
    assert_eq!(by_id(3).start_time(), Some(15));
    assert_eq!(by_id(4).start_time(), Some(10));
    assert_eq!(by_id(5).start_time(), Some(10));
    assert_eq!(makespan(&s), 18);
}

/// S6: many small uniform jobs on a single-slot machine serialize completely.
#[test]
fn single_slot_machine_serializes_uniform_jobs() {
    let mut s = System::new(Resources::from([1]));
    for _ in 0..100 {
        s.enqueue_job(job(1, 1)).unwrap();
    }
    s.run(&mut Fcfs).unwrap();

    assert_eq!(s.finished_jobs().len(), 100);
    assert_eq!(makespan(&s), 100);
}

fn s1_jobs() -> Vec<Job> {
    [(2, 1), (3, 1), (5, 2), (4, 6), (3, 1), (5, 2), (1, 3), (2, 4), (1, 1)]
        .into_iter()
        .map(|(tl, d)| job(tl, d))
        .collect()
}

/// S1 / S5: conservative backfill never produces a worse makespan than EASY
/// on the same input, and every job completes under either policy.
#[test]
fn conservative_backfill_is_never_worse_than_easy() {
    let mut easy = System::new(Resources::from([6]));
    for j in s1_jobs() {
        easy.enqueue_job(j).unwrap();
    }
    easy.run(&mut BackfillPolicy::easy()).unwrap();
    assert_eq!(easy.finished_jobs().len(), 9);

    let mut conservative = System::new(Resources::from([6]));
    for j in s1_jobs() {
        conservative.enqueue_job(j).unwrap();
    }
    conservative.run(&mut BackfillPolicy::conservative()).unwrap();
    assert_eq!(conservative.finished_jobs().len(), 9);

    assert!(makespan(&conservative) <= makespan(&easy));
}

/// Resource safety: at every point along a run, the resources held by
/// concurrently started jobs never exceed total capacity.
#[test]
fn running_jobs_never_exceed_capacity() {
    let mut s = System::new(Resources::from([6]));
    for j in s1_jobs() {
        s.enqueue_job(j).unwrap();
    }

    let mut policy = BackfillPolicy::hybrid(2);
    loop {
        let used: i64 = s.running_jobs().iter().map(|j| j.demand().as_slice()[0]).sum();
        assert!(used <= s.total_resources().as_slice()[0]);
        if !s.tick(&mut policy).unwrap() {
            break;
        }
    }

    assert_eq!(s.finished_jobs().len(), 9);
    assert!(s.pending_jobs().is_empty());
    assert!(s.reserved_jobs().is_empty());
}

/// Conservation: every enqueued job ends up in `finished_jobs` exactly once,
/// and nowhere else, once a run completes.
#[test]
fn every_job_finishes_exactly_once() {
    let mut s = System::new(Resources::from([5]));
    s.enqueue_job(job(10, 2)).unwrap();
    s.enqueue_job(job(5, 3)).unwrap();
    s.enqueue_job(job(5, 5)).unwrap();
    s.run(&mut BackfillPolicy::easy()).unwrap();

    assert!(s.pending_jobs().is_empty());
    assert!(s.reserved_jobs().is_empty());
    assert!(s.running_jobs().is_empty());
    assert_eq!(s.finished_jobs().len(), 3);

    let mut ids: Vec<u64> = s.finished_jobs().iter().map(|j| j.job_id().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![0, 1, 2]);
}
