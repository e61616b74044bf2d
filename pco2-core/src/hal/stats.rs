//! Running statistics accumulator for phase sampling.

/// Per-channel accumulator capability.
///
/// The cycle controller owns one accumulator per measured channel and
/// resets it at each sampling window.
pub trait StatsAccumulator {
    /// Discards all accumulated samples.
    fn clear(&mut self);

    /// Folds one sample into the accumulator.
    fn add(&mut self, value: f32);

    /// Number of samples accumulated so far.
    fn count(&self) -> u32;

    /// Mean of the accumulated samples; zero when empty.
    fn mean(&self) -> f32;

    /// Population standard deviation of the accumulated samples.
    fn std_dev(&self) -> f32;
}

/// Welford single-pass accumulator.
///
/// Numerically stable for the long sampling windows the instrument runs;
/// the naive sum-of-squares form loses precision after a few thousand
/// samples of near-constant readings.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: u32,
    mean: f32,
    m2: f32,
}

impl RunningStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl StatsAccumulator for RunningStats {
    fn clear(&mut self) {
        *self = Self::new();
    }

    fn add(&mut self, value: f32) {
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let count = self.count as f32;
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn mean(&self) -> f32 {
        self.mean
    }

    fn std_dev(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.count as f32;
        libm::sqrtf(self.m2 / count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn empty_accumulator_reports_zeros() {
        let stats = RunningStats::new();
        assert_eq!(stats.count(), 0);
        assert!(close(stats.mean(), 0.0));
        assert!(close(stats.std_dev(), 0.0));
    }

    #[test]
    fn mean_and_std_match_reference_values() {
        let mut stats = RunningStats::new();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.add(value);
        }
        assert_eq!(stats.count(), 8);
        assert!(close(stats.mean(), 5.0));
        assert!(close(stats.std_dev(), 2.0));
    }

    #[test]
    fn clear_resets_the_accumulator() {
        let mut stats = RunningStats::new();
        stats.add(412.5);
        stats.add(413.0);
        stats.clear();
        assert_eq!(stats.count(), 0);
        assert!(close(stats.mean(), 0.0));
    }

    #[test]
    fn constant_series_has_zero_spread() {
        let mut stats = RunningStats::new();
        for _ in 0..1_000 {
            stats.add(412.34);
        }
        assert!(close(stats.mean(), 412.34));
        assert!(stats.std_dev() < 1e-3);
    }
}
