//! A discrete-event simulator of a batch-HPC job scheduler.
//!
//! [`System`] holds the machine's capacity, the jobs moving through it, and a
//! [`Timeline`] projecting future resource availability. A [`Policy`] (either
//! [`Fcfs`] or the parameterized [`BackfillPolicy`]) decides what to do with
//! the pending queue each time the scheduler loop runs; [`System::run`] drives
//! the simulation to completion by alternating scheduler-loop passes with
//! timeline event processing.
//!
//! The ordered map backing the timeline ([`tree::Tree`]) is generic over its
//! balancing [`tree::Strategy`]; [`tree::avl::Avl`] and [`tree::rb::Rb`] are
//! both provided, though the timeline itself is fixed to red-black.

pub mod error;
pub mod job;
pub mod policy;
pub mod resource;
pub mod system;
pub mod timeline;
pub mod tree;

pub use error::{SchedError, TreeError};
pub use job::{Job, JobState};
pub use policy::{BackfillPolicy, Fcfs, Policy};
pub use resource::Resources;
pub use system::{ScheduleOutcome, System};
pub use timeline::{Timeline, TimelineEntry};
pub use tree::{avl::Avl, rb::Rb, Tree};
