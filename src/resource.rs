//! The fixed-dimension integer resource vector.
//!
//! A machine's capacity, a job's demand, and every timeline projection are all
//! [`Resources`] values of the same dimension `D`, fixed for the lifetime of a
//! [`crate::system::System`]. `D` is small in practice (core counts per resource
//! class), so the backing storage is a [`SmallVec`] that stays on the stack for the
//! common case.
use smallvec::SmallVec;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Add, AddAssign, Sub, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Resources that fit inline without heap allocation before falling back to a
/// heap-allocated vector. Eight resource classes covers the overwhelming majority
/// of batch-HPC machine models (cores, GPUs, a handful of licensed features, ...).
const INLINE_CAPACITY: usize = 8;

/// An integer-valued resource vector of fixed dimension.
///
/// Arithmetic between two `Resources` of different lengths is a programming error
/// (it can only happen if a driver mixes vectors built against different
/// [`crate::system::System`]s) and panics rather than silently truncating or
/// padding.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resources(SmallVec<i64, INLINE_CAPACITY>);

impl Resources {
    /// Builds a resource vector from any iterable of integers.
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Resources(values.into_iter().collect())
    }

    /// The number of resource classes (the dimension `D`).
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// A resource vector of the given dimension, all zeros.
    pub fn zero(dim: usize) -> Self {
        Resources(smallvec::smallvec![0; dim])
    }

    /// True iff every component is non-negative.
    pub fn valid(&self) -> bool {
        self.0.iter().all(|&x| x >= 0)
    }

    /// True iff this vector is componentwise greater than or equal to `other`.
    ///
    /// # Panics
    /// Panics if `self` and `other` have different dimensions.
    pub fn all_geq(&self, other: &Resources) -> bool {
        self.assert_same_dim(other);
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a >= b)
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    fn assert_same_dim(&self, other: &Resources) {
        assert_eq!(
            self.dim(),
            other.dim(),
            "mismatched resource dimensions: {} vs {}",
            self.dim(),
            other.dim()
        );
    }
}

impl Add<&Resources> for Resources {
    type Output = Resources;
    fn add(mut self, rhs: &Resources) -> Resources {
        self += rhs;
        self
    }
}

impl Sub<&Resources> for Resources {
    type Output = Resources;
    fn sub(mut self, rhs: &Resources) -> Resources {
        self -= rhs;
        self
    }
}

impl AddAssign<&Resources> for Resources {
    fn add_assign(&mut self, rhs: &Resources) {
        self.assert_same_dim(rhs);
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
    }
}

impl SubAssign<&Resources> for Resources {
    fn sub_assign(&mut self, rhs: &Resources) {
        self.assert_same_dim(rhs);
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a -= b;
        }
    }
}

impl Debug for Resources {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Resources{:?}", self.0.as_slice())
    }
}

impl Display for Resources {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl FromIterator<i64> for Resources {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Resources::new(iter)
    }
}

impl From<Vec<i64>> for Resources {
    fn from(v: Vec<i64>) -> Self {
        Resources(SmallVec::from_vec(v))
    }
}

impl<const N: usize> From<[i64; N]> for Resources {
    fn from(v: [i64; N]) -> Self {
        Resources(SmallVec::from_iter(v))
    }
}
