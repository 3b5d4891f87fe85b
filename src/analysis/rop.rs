//! Bootstrap reorder point estimation.
//!
//! Lead-time demand is simulated by resampling an item's weekly demand with
//! replacement and scaling each draw by the lead time in weeks. The ROP is a
//! percentile of that distribution, floored by the item's modal nonzero
//! weekly demand so intermittent items do not collapse to zero.
//!
//! Randomness is always injected: callers pass an `Rng`, and `item_rng`
//! derives a per-item stream from a batch seed so results do not depend on
//! the order or thread items are estimated on.

use crate::config::PolicyConfig;
use crate::error::EstimationError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lead time and sample count shared by every item in a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub lead_time_weeks: f64,
    pub bootstrap_samples: usize,
}

impl From<&PolicyConfig> for EstimatorParams {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            lead_time_weeks: policy.lead_time_weeks(),
            bootstrap_samples: policy.bootstrap_samples,
        }
    }
}

/// Outcome of estimating one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopEstimate {
    /// Percentile of the simulated lead-time demand.
    pub raw_estimate: f64,
    /// Most frequent nonzero weekly demand, if any week had demand.
    pub nonzero_mode: Option<f64>,
    /// Whether the mode floor replaced the raw estimate.
    pub floor_applied: bool,
    pub rop: u64,
}

/// Draw `samples` lead-time demand observations from `weekly`.
///
/// `weekly` must not be empty.
pub fn bootstrap_lead_time_demand<R: Rng + ?Sized>(
    weekly: &[f64],
    lead_time_weeks: f64,
    samples: usize,
    rng: &mut R,
) -> Vec<f64> {
    (0..samples)
        .map(|_| weekly[rng.gen_range(0..weekly.len())] * lead_time_weeks)
        .collect()
}

/// Percentile with linear interpolation between closest ranks.
///
/// `fraction` is in `[0, 1]`; returns `None` for an empty input.
pub fn percentile(values: &[f64], fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Most frequent strictly positive value; ties resolve to the smallest.
pub fn nonzero_mode(weekly: &[f64]) -> Option<f64> {
    let mut nonzero: Vec<f64> = weekly.iter().copied().filter(|q| *q > 0.0).collect();
    nonzero.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < nonzero.len() {
        let value = nonzero[i];
        let run = nonzero[i..].iter().take_while(|q| **q == value).count();
        if best.map_or(true, |(_, count)| run > count) {
            best = Some((value, run));
        }
        i += run;
    }

    best.map(|(value, _)| value)
}

/// Apply the mode floor to a raw percentile and round up.
///
/// Returns the ROP and whether the floor was used.
pub fn apply_floor(raw_estimate: f64, mode: Option<f64>, service_level: f64) -> (u64, bool) {
    match mode {
        Some(m) if raw_estimate < 0.5 * m => ((m * service_level).ceil().max(0.0) as u64, true),
        _ => (raw_estimate.ceil().max(0.0) as u64, false),
    }
}

/// Estimate one item's ROP from its zero-filled weekly series.
pub fn estimate_rop<R: Rng + ?Sized>(
    item_id: &str,
    weekly: &[f64],
    service_level: f64,
    params: &EstimatorParams,
    rng: &mut R,
) -> Result<RopEstimate, EstimationError> {
    if weekly.is_empty() {
        return Err(EstimationError::EmptySeries {
            item_id: item_id.to_string(),
        });
    }

    let draws = bootstrap_lead_time_demand(
        weekly,
        params.lead_time_weeks,
        params.bootstrap_samples.max(1),
        rng,
    );
    let raw_estimate = percentile(&draws, service_level).ok_or_else(|| EstimationError::EmptySeries {
        item_id: item_id.to_string(),
    })?;

    let mode = nonzero_mode(weekly);
    let (rop, floor_applied) = apply_floor(raw_estimate, mode, service_level);

    Ok(RopEstimate {
        raw_estimate,
        nonzero_mode: mode,
        floor_applied,
        rop,
    })
}

/// Stable per-item seed: FNV-1a over the item id, mixed with the batch seed.
pub fn item_seed(batch_seed: u64, item_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in item_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    // splitmix64 finalizer
    let mut z = hash ^ batch_seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Random stream for one item.
pub fn item_rng(batch_seed: u64, item_id: &str) -> StdRng {
    StdRng::seed_from_u64(item_seed(batch_seed, item_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lead_time_weeks: f64) -> EstimatorParams {
        EstimatorParams {
            lead_time_weeks,
            bootstrap_samples: 2000,
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 1.0), Some(4.0));
        assert_eq!(percentile(&values, 0.5), Some(2.5));
        assert!((percentile(&values, 0.9).unwrap() - 3.7).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 0.95), Some(7.0));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_nonzero_mode() {
        assert_eq!(nonzero_mode(&[0.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0]), Some(10.0));
        assert_eq!(nonzero_mode(&[5.0, 3.0, 0.0, 5.0, 3.0]), Some(3.0));
        assert_eq!(nonzero_mode(&[1.0, 2.0, 2.0, 0.0, 0.0, 0.0]), Some(2.0));
        assert_eq!(nonzero_mode(&[0.0, 0.0]), None);
        assert_eq!(nonzero_mode(&[]), None);
    }

    #[test]
    fn test_floor_boundary() {
        // Strictly below half the mode: floor to ceil(mode * service level).
        assert_eq!(apply_floor(1.9, Some(4.0), 0.95), (4, true));
        assert_eq!(apply_floor(0.0, Some(10.0), 0.75), (8, true));
        // At half the mode: keep the raw estimate.
        assert_eq!(apply_floor(2.0, Some(4.0), 0.95), (2, false));
        assert_eq!(apply_floor(2.3, Some(4.0), 0.95), (3, false));
        // No nonzero weeks: no floor.
        assert_eq!(apply_floor(0.0, None, 0.95), (0, false));
    }

    #[test]
    fn test_bootstrap_draws_come_from_series() {
        let weekly = [0.0, 2.0, 5.0];
        let mut rng = StdRng::seed_from_u64(7);
        let draws = bootstrap_lead_time_demand(&weekly, 2.0, 500, &mut rng);

        assert_eq!(draws.len(), 500);
        assert!(draws.iter().all(|d| [0.0, 4.0, 10.0].contains(d)));
        // With replacement: every value shows up in 500 draws.
        for expected in [0.0, 4.0, 10.0] {
            assert!(draws.contains(&expected));
        }
    }

    #[test]
    fn test_intermittent_scenario_matches_seeded_reference() {
        let weekly = [0.0, 0.0, 10.0, 0.0, 10.0, 0.0, 10.0, 0.0];
        let seed = 20240101;

        let estimate = estimate_rop("ITEM", &weekly, 0.95, &params(1.0), &mut StdRng::seed_from_u64(seed)).unwrap();

        let reference_draws = bootstrap_lead_time_demand(&weekly, 1.0, 2000, &mut StdRng::seed_from_u64(seed));
        let reference = percentile(&reference_draws, 0.95).unwrap().ceil() as u64;

        assert_eq!(estimate.rop, reference);
        assert_eq!(estimate.nonzero_mode, Some(10.0));
        assert!(!estimate.floor_applied);
        // Three in eight weeks carry demand, so the 95th percentile is a ten.
        assert_eq!(estimate.rop, 10);
    }

    #[test]
    fn test_sparse_demand_uses_mode_floor() {
        let mut weekly = vec![0.0; 49];
        weekly.push(4.0);

        let estimate = estimate_rop("SPARSE", &weekly, 0.95, &params(1.0), &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(estimate.raw_estimate, 0.0);
        assert!(estimate.floor_applied);
        assert_eq!(estimate.rop, 4);
    }

    #[test]
    fn test_fractional_lead_time_scales_draws() {
        let weekly = [5.0; 10];
        let estimate = estimate_rop("FLAT", &weekly, 0.85, &params(1.5), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(estimate.raw_estimate, 7.5);
        assert_eq!(estimate.rop, 8);
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let weekly = [3.0, 0.0, 7.0, 1.0, 0.0, 12.0, 4.0, 4.0, 0.0, 9.0];
        let run = |seed| estimate_rop("X", &weekly, 0.9, &params(2.2), &mut item_rng(seed, "X")).unwrap();

        let first = run(99);
        let second = run(99);
        assert_eq!(first.raw_estimate.to_bits(), second.raw_estimate.to_bits());
        assert_eq!(first.rop, second.rop);
    }

    #[test]
    fn test_rop_varies_within_tolerance_across_seeds() {
        // Sorted support: 0 0 0 1 3 4 4 7 9 12. The population 90th percentile
        // is 9. With 2000 draws the sample percentile stays on the 9 or 12 step
        // (the 80th percentile, 7, is over ten standard deviations away), so the
        // tolerance around 9 is -0 / +3 units.
        let weekly = [3.0, 0.0, 7.0, 1.0, 0.0, 12.0, 4.0, 4.0, 0.0, 9.0];
        let analytic = 9;

        let rops: Vec<u64> = (0..64)
            .map(|seed| {
                let estimate = estimate_rop(
                    "VAR",
                    &weekly,
                    0.9,
                    &params(1.0),
                    &mut StdRng::seed_from_u64(seed),
                )
                .unwrap();
                assert!(!estimate.floor_applied);
                estimate.rop
            })
            .collect();

        for rop in &rops {
            assert!(
                (analytic..=analytic + 3).contains(rop),
                "ROP {} outside tolerance of {}",
                rop,
                analytic
            );
        }
    }

    #[test]
    fn test_empty_series_is_reported() {
        let result = estimate_rop("GHOST", &[], 0.9, &params(1.0), &mut StdRng::seed_from_u64(0));
        assert_eq!(
            result,
            Err(EstimationError::EmptySeries {
                item_id: "GHOST".to_string()
            })
        );
    }

    #[test]
    fn test_item_seed_is_stable_and_item_specific() {
        assert_eq!(item_seed(42, "SKU-1"), item_seed(42, "SKU-1"));
        assert_ne!(item_seed(42, "SKU-1"), item_seed(42, "SKU-2"));
        assert_ne!(item_seed(42, "SKU-1"), item_seed(43, "SKU-1"));
    }
}
