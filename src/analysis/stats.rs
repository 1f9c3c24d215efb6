//! Numeric helpers shared by the aggregations.

use crate::models::Describe;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

/// Default cap on sampled rows for correlation and scatter plots.
pub const DEFAULT_SAMPLE_CAP: usize = 5000;

/// Default seed for the sampler.
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

/// How many rows to sample and with which seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSettings {
    pub cap: usize,
    pub seed: u64,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            cap: DEFAULT_SAMPLE_CAP,
            seed: DEFAULT_SAMPLE_SEED,
        }
    }
}

/// Round to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Percentage change from `previous` to `current`.
///
/// `None` when `previous` is zero.
pub fn pct_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// Revenue per unit with the denominator floored at one unit.
///
/// A zero-volume group yields its revenue unchanged instead of a division error.
pub fn weighted_asp(total_revenue: f64, total_volume: f64) -> f64 {
    total_revenue / total_volume.max(1.0)
}

/// Pick up to `settings.cap` distinct indices out of `len`, in ascending order.
///
/// Uniform without replacement from a `StdRng` seeded with `settings.seed`,
/// so the same input always yields the same sample.
pub fn sample_indices(len: usize, settings: SampleSettings) -> Vec<usize> {
    let amount = len.min(settings.cap);
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut picked = index::sample(&mut rng, len, amount).into_vec();
    picked.sort_unstable();
    picked
}

/// Pearson correlation coefficient.
///
/// `None` with fewer than two pairs or when either series is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }

    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x * var_y).sqrt();
    r.is_finite().then_some(r)
}

/// Count, mean, sample deviation, extremes and quartiles of a series.
pub fn describe(values: &[f64]) -> Option<Describe> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    Some(Describe {
        count,
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[count - 1],
    })
}

/// Linear-interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(50.0), 50.0);
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.236), 1.24);
        assert_eq!(round2(-3.14159), -3.14);
        assert_eq!(round2(0.125), 0.12);
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(100.0, 150.0), Some(50.0));
        assert_eq!(pct_change(200.0, 100.0), Some(-50.0));
        assert_eq!(pct_change(0.0, 10.0), None);
    }

    #[test]
    fn test_weighted_asp_floors_volume() {
        assert_eq!(weighted_asp(10_000.0, 10.0), 1000.0);
        // zero volume: the revenue itself comes back
        assert_eq!(weighted_asp(500.0, 0.0), 500.0);
        assert_eq!(weighted_asp(500.0, 0.5), 500.0);
    }

    #[test]
    fn test_sample_indices_is_deterministic() {
        let settings = SampleSettings { cap: 10, seed: 42 };
        let a = sample_indices(1000, settings);
        let b = sample_indices(1000, settings);
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(a.iter().all(|i| *i < 1000));
    }

    #[test]
    fn test_sample_indices_exact_selection() {
        // StdRng (ChaCha12) seeded with 42, Floyd's algorithm for small amounts
        let picked = sample_indices(1000, SampleSettings { cap: 10, seed: 42 });
        assert_eq!(picked, vec![34, 132, 404, 522, 538, 617, 633, 863, 967, 986]);

        let picked = sample_indices(30, SampleSettings { cap: 10, seed: 42 });
        assert_eq!(picked, vec![5, 10, 11, 12, 15, 17, 24, 26, 28, 29]);
    }

    #[test]
    fn test_sample_indices_below_cap_takes_everything() {
        let picked = sample_indices(5, SampleSettings::default());
        assert_eq!(picked, vec![0, 1, 2, 3, 4]);
        assert!(sample_indices(0, SampleSettings::default()).is_empty());
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&xs, &[3.0, 3.0, 3.0, 3.0]), None);
    }

    #[test]
    fn test_describe() {
        let stats = describe(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.q25, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q75, 3.25);
        let std = stats.std.unwrap();
        assert!((std - 1.290_994_448_7).abs() < 1e-9);

        assert_eq!(describe(&[7.0]).unwrap().std, None);
        assert!(describe(&[]).is_none());
    }
}
