//! Fixed-width histogram over an integer column.
//!
//! The histogram splits a known inclusive value range into equal-width
//! buckets and counts arriving values, using constant space regardless of
//! how many values it sees. Selectivity for a comparison predicate is
//! estimated from the bucket counts, interpolating linearly inside the
//! bucket the operand falls in.

use std::fmt;

use crate::exec::predicate::Op;

/// Errors from selectivity estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateError {
    /// The predicate op has no selectivity estimate over an integer
    /// histogram (e.g. `LIKE`).
    UnsupportedPredicate(Op),
}

impl fmt::Display for EstimateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateError::UnsupportedPredicate(op) => {
                write!(f, "no selectivity estimate for operator {}", op)
            }
        }
    }
}

impl std::error::Error for EstimateError {}

/// Equi-width histogram over the inclusive integer range `[min, max]`.
pub struct IntHistogram {
    buckets: Vec<usize>,
    min: i32,
    max: i32,
    width: f64,
    num_tuples: usize,
}

impl IntHistogram {
    /// Creates a histogram with `num_buckets` buckets over `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` is 0 or `min > max`.
    pub fn new(num_buckets: usize, min: i32, max: i32) -> Self {
        assert!(num_buckets >= 1, "need at least one bucket");
        assert!(min <= max, "min must not exceed max");
        Self {
            buckets: vec![0; num_buckets],
            min,
            max,
            width: (max as f64 - min as f64 + 1.0) / num_buckets as f64,
            num_tuples: 0,
        }
    }

    /// Returns the bucket index covering `v`, which must be in range.
    fn bucket_of(&self, v: i32) -> usize {
        let index = ((v as f64 - self.min as f64) / self.width) as usize;
        index.min(self.buckets.len() - 1)
    }

    /// Records a value. Out-of-range values are ignored.
    pub fn add_value(&mut self, v: i32) {
        if v >= self.min && v <= self.max {
            let idx = self.bucket_of(v);
            self.buckets[idx] += 1;
            self.num_tuples += 1;
        }
    }

    /// Returns the number of recorded values.
    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Estimates the fraction of recorded values satisfying `op v`.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> Result<f64, EstimateError> {
        match op {
            Op::LessThan => {
                if v <= self.min {
                    Ok(0.0)
                } else if v >= self.max {
                    Ok(1.0)
                } else {
                    let bucket = self.bucket_of(v);
                    let mut base: f64 = self.buckets[..bucket].iter().sum::<usize>() as f64;
                    // Linear interpolation inside the operand's bucket.
                    base += self.buckets[bucket] as f64 / self.width
                        * (v as f64 - bucket as f64 * self.width - self.min as f64);
                    Ok(base / self.num_tuples as f64)
                }
            }
            Op::GreaterThan => Ok(1.0 - self.estimate_selectivity(Op::LessThanOrEq, v)?),
            Op::LessThanOrEq => self.estimate_selectivity(Op::LessThan, v + 1),
            Op::GreaterThanOrEq => self.estimate_selectivity(Op::GreaterThan, v - 1),
            Op::Equals => Ok(self.estimate_selectivity(Op::LessThanOrEq, v)?
                - self.estimate_selectivity(Op::LessThan, v)?),
            Op::NotEquals => Ok(1.0 - self.estimate_selectivity(Op::Equals, v)?),
            Op::Like => Err(EstimateError::UnsupportedPredicate(op)),
        }
    }

    /// Average selectivity of this histogram. Placeholder retained for
    /// interface compatibility with the planner.
    pub fn avg_selectivity(&self) -> f64 {
        1.0
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntHistogram(buckets = {}, min = {}, max = {})",
            self.buckets.len(),
            self.min,
            self.max
        )
    }
}
