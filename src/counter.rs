//! Jittered timestamp generator used to backfill synthetic test data.
//!
//! A [`Counter`] hands out exactly `total` timestamps, spaced `step` apart, the
//! last one a single `step` before `end`. Each timestamp may be shifted by a uniformly distributed
//! offset in the open interval `(-jitter, +jitter)`.
//!
//! The generator owns its random source. [`Counter::new`] seeds it once from the
//! operating system's entropy source; there is no fallback, a seeding failure is
//! returned to the caller and must abort the run.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::{StdRng, SysError, SysRng};
use rand::{RngExt, SeedableRng};

/// Sequential timestamp source. Not meant to be shared between tests.
#[derive(Debug)]
pub struct Counter {
    end: DateTime<Utc>,
    step: TimeDelta,
    jitter_nanos: i64,
    index: usize,
    total: usize,
    rng: StdRng,
}

impl Counter {
    /// Creates a counter seeded from OS entropy.
    pub fn new(
        end: DateTime<Utc>,
        step: Duration,
        jitter: Duration,
        total: usize,
    ) -> Result<Self, SysError> {
        let rng = StdRng::try_from_rng(&mut SysRng)?;
        Ok(Self::with_rng(end, step, jitter, total, rng))
    }

    /// Creates a counter driven by the given generator.
    pub fn with_rng(
        end: DateTime<Utc>,
        step: Duration,
        jitter: Duration,
        total: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            end,
            step: TimeDelta::from_std(step).unwrap_or(TimeDelta::MAX),
            jitter_nanos: i64::try_from(jitter.as_nanos()).unwrap_or(i64::MAX),
            index: 0,
            total,
            rng,
        }
    }

    /// Number of timestamps this counter will produce in total.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of timestamps still available.
    pub fn remaining(&self) -> usize {
        self.total - self.index
    }

    /// The un-jittered timestamp for call `index` (0-based):
    /// `end - (total - index) * step`.
    ///
    /// The last call (`index == total - 1`) lands one `step` before `end`.
    pub fn base_at(&self, index: usize) -> DateTime<Utc> {
        let back = self.total.saturating_sub(index);
        let offset = i32::try_from(back)
            .ok()
            .and_then(|n| self.step.checked_mul(n))
            .unwrap_or(TimeDelta::MAX);
        self.end
            .checked_sub_signed(offset)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn sample_jitter(&mut self) -> TimeDelta {
        if self.jitter_nanos <= 1 {
            return TimeDelta::zero();
        }
        let bound = self.jitter_nanos - 1;
        TimeDelta::nanoseconds(self.rng.random_range(-bound..=bound))
    }
}

impl Iterator for Counter {
    type Item = DateTime<Utc>;

    /// Returns the next timestamp, or `None` once all `total` have been issued.
    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            return None;
        }
        let base = self.base_at(self.index);
        let jitter = self.sample_jitter();
        self.index += 1;
        Some(base.checked_add_signed(jitter).unwrap_or(base))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Counter {}
