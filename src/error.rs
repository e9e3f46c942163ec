//! Typed error taxonomy for the ordered map and the scheduler core.
//!
//! Most of the source this crate is modeled on expresses invariant checks as bare
//! asserts. Those checks are preserved here, but surfaced through
//! [`SchedError::InvariantViolation`] instead of panicking, so that a long-running
//! driver can catch and log a bug in this crate rather than crash outright.

use derive_more::Error;
use std::fmt::{self, Display, Formatter};

use crate::resource::Resources;

/// Errors raised by the [`crate::tree`] ordered map.
#[derive(Copy, Clone, Debug, Default, Error)]
pub enum TreeError {
    /// `get`/`remove` were called with a key that is not present in the map.
    #[default]
    NotFound,
    /// `min`/`max`/`pop_min`/`pop_max` were called on an empty map.
    Empty,
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NotFound => write!(f, "key not found"),
            TreeError::Empty => write!(f, "map is empty"),
        }
    }
}

/// Errors raised by [`crate::job`], [`crate::timeline`], and [`crate::system`].
#[derive(Clone, Debug, Error)]
pub enum SchedError {
    /// A job's demand exceeds the machine's total resources; rejected at
    /// `enqueue_job` without mutating any simulator state.
    DemandExceedsCapacity {
        demand: Resources,
        capacity: Resources,
    },
    /// A logic error: a state transition, scheduling computation, or timeline
    /// bookkeeping step hit a condition that should be unreachable given this
    /// crate's own invariants. The string names the violated invariant.
    InvariantViolation(#[error(ignore)] String),
}

impl Display for SchedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::DemandExceedsCapacity { demand, capacity } => write!(
                f,
                "job demand {demand:?} exceeds total capacity {capacity:?}"
            ),
            SchedError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl SchedError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        SchedError::InvariantViolation(msg.into())
    }
}
