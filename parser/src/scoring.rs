//! Conversions between bridge scoring currencies: raw point differences,
//! IMPs, Victory Points and match-point percentages.
//!
//! The continuous VP scale follows the WBF 2013 formula. Discrete scales are
//! derived from it; the ACBL and percentage scales are fixed lookup tables.

use crate::types::{ScoringConfig, VpStyle};

/// τ³ where τ is the golden ratio conjugate; the decay of the WBF scale.
const DECAY: f64 = 0.236_067_977_499_789_7;

/// Lower bounds of each IMP step on the standard IMP scale.
const IMP_THRESHOLDS: [f64; 24] = [
    20.0, 50.0, 90.0, 130.0, 170.0, 220.0, 270.0, 320.0, 370.0, 430.0, 500.0, 600.0, 750.0,
    900.0, 1100.0, 1300.0, 1500.0, 1750.0, 2000.0, 2250.0, 2500.0, 3000.0, 3500.0, 4000.0,
];

/// IMP margins needed for 11..=20 VP on the ACBL 20-point scales,
/// keyed by the largest board count of each bracket.
const ACBL_CUTOFFS: [(u32, [u32; 10]); 5] = [
    (7, [1, 3, 5, 7, 9, 11, 14, 17, 20, 23]),
    (11, [1, 3, 5, 8, 11, 14, 17, 20, 24, 28]),
    (15, [1, 3, 6, 9, 12, 15, 19, 23, 27, 32]),
    (23, [2, 5, 8, 12, 16, 20, 24, 29, 34, 40]),
    (u32::MAX, [2, 6, 10, 14, 19, 24, 29, 35, 41, 48]),
];

/// Percentages needed for 11..=20 VP in match-pointed head-to-head matches.
const PERCENTAGE_CUTOFFS: [(u32, [f64; 10]); 4] = [
    (7, [53.0, 56.0, 59.0, 62.0, 65.0, 68.0, 71.0, 74.0, 77.0, 80.0]),
    (15, [52.5, 55.0, 57.5, 60.0, 62.5, 65.0, 67.5, 70.0, 72.5, 75.0]),
    (23, [52.0, 54.0, 56.0, 58.0, 60.0, 62.0, 64.0, 66.0, 68.0, 70.0]),
    (u32::MAX, [51.5, 53.0, 54.5, 56.0, 57.5, 59.0, 60.5, 62.0, 63.5, 65.0]),
];

/// Converts a raw point difference to IMPs, keeping its sign.
pub fn points_to_imps(diff: f64) -> i32 {
    let steps = IMP_THRESHOLDS.iter().filter(|&&t| t <= diff.abs()).count() as i32;
    if diff < 0.0 {
        -steps
    } else {
        steps
    }
}

/// Margin in IMPs at which a match of `boards` boards reaches maximum VP.
pub fn blitz(boards: u32) -> f64 {
    15.0 * (boards as f64).sqrt()
}

/// Unrounded WBF VP for a non-negative margin.
fn raw_vp(margin: f64, boards: u32, max_vp: f64) -> f64 {
    let mid = max_vp / 2.0;
    let x = blitz(boards);
    if margin >= x {
        max_vp
    } else {
        mid + mid * (1.0 - DECAY.powf(margin / x)) / (1.0 - DECAY)
    }
}

/// IMP margin at which the unrounded WBF scale reaches `vp`.
pub fn imps_for_vp(vp: f64, boards: u32, max_vp: f64) -> f64 {
    let mid = max_vp / 2.0;
    if vp <= mid {
        return 0.0;
    }
    if vp >= max_vp {
        return blitz(boards);
    }
    blitz(boards) * (1.0 - (1.0 - DECAY) * (vp / mid - 1.0)).ln() / DECAY.ln()
}

/// Rounded VP table over `0..=len-1` IMPs in units of the last decimal place,
/// made strictly concave below the maximum. Any interior point whose second
/// difference is not negative is bumped up one unit until none is left; the
/// last point stays as rounded.
fn concave_table(len: usize, boards: u32, max_vp: f64, scale: f64) -> Vec<i64> {
    let max_units = (max_vp * scale).round() as i64;
    let mut table: Vec<i64> = (0..len)
        .map(|i| (raw_vp(i as f64, boards, max_vp) * scale).round() as i64)
        .collect();

    loop {
        let mut changed = false;
        for i in 1..len.saturating_sub(1) {
            let second_difference = table[i + 1] - 2 * table[i] + table[i - 1];
            if second_difference >= 0 && table[i] < max_units {
                table[i] += 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    table
}

/// Continuous (WBF) VP for an IMP margin, rounded to the configured places.
pub fn continuous_vp(imps: f64, boards: u32, config: &ScoringConfig) -> f64 {
    let max_vp = config.max_vp as f64;
    if boards == 0 {
        return max_vp / 2.0;
    }
    let scale = 10f64.powi(config.vp_decimal_places as i32);
    let max_units = (max_vp * scale).round() as i64;
    let margin = imps.abs();

    let units = if margin >= blitz(boards) {
        max_units
    } else {
        let lower = margin.floor() as usize;
        // Concavity is enforced over 0..=margin+1.
        let table = concave_table(lower + 2, boards, max_vp, scale);
        if margin.fract() == 0.0 {
            table[lower]
        } else {
            let raw = (raw_vp(margin, boards, max_vp) * scale).round() as i64;
            raw.clamp(table[lower], table[lower + 1])
        }
    };

    let units = if imps < 0.0 { max_units - units } else { units };
    units as f64 / scale
}

/// IMP boundaries of the discrete scale: element `j` is the smallest margin
/// worth `max_vp / 2 + j + 1` VP.
pub fn discrete_vp_boundaries(boards: u32, max_vp: u32) -> Vec<i64> {
    let half = max_vp / 2;
    let full = (2 * half) as f64;
    let mut bounds: Vec<i64> = (0..half)
        .map(|j| imps_for_vp(half as f64 + j as f64 + 0.5, boards, full).ceil() as i64)
        .map(|b| b.max(1))
        .collect();

    loop {
        let mut changed = false;
        for j in 1..bounds.len() {
            let crowded = bounds[j] <= bounds[j - 1];
            let narrowing = j >= 2 && bounds[j] - bounds[j - 1] < bounds[j - 1] - bounds[j - 2];
            if (crowded || narrowing) && bounds[j - 1] > 1 {
                bounds[j - 1] -= 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    bounds
}

/// Whole-number VP for an IMP margin using the discrete scale.
pub fn discrete_vp(imps: f64, boards: u32, max_vp: u32) -> f64 {
    let half = max_vp / 2;
    if boards == 0 {
        return half as f64;
    }
    let margin = imps.abs();
    let steps = discrete_vp_boundaries(boards, max_vp)
        .iter()
        .filter(|&&b| b as f64 <= margin)
        .count() as u32;
    let vp = half + steps;
    if imps < 0.0 {
        (2 * half - vp) as f64
    } else {
        vp as f64
    }
}

/// VP on the ACBL 20-point scales, rescaled to `max_vp`.
pub fn acbl_vp(imps: f64, boards: u32, max_vp: u32) -> f64 {
    let cutoffs = ACBL_CUTOFFS
        .iter()
        .find(|(limit, _)| boards <= *limit)
        .map(|(_, cutoffs)| cutoffs)
        .unwrap_or(&ACBL_CUTOFFS[ACBL_CUTOFFS.len() - 1].1);
    let steps = cutoffs.iter().filter(|&&c| c as f64 <= imps.abs()).count() as f64;
    let vp = if imps < 0.0 { 10.0 - steps } else { 10.0 + steps };
    vp * max_vp as f64 / 20.0
}

fn percentage_cutoffs(boards: u32) -> &'static [f64; 10] {
    PERCENTAGE_CUTOFFS
        .iter()
        .find(|(limit, _)| boards <= *limit)
        .map(|(_, cutoffs)| cutoffs)
        .unwrap_or(&PERCENTAGE_CUTOFFS[PERCENTAGE_CUTOFFS.len() - 1].1)
}

/// Banded VP for a match-point percentage.
pub fn percentage_vp_discrete(percentage: f64, boards: u32, max_vp: u32) -> f64 {
    if percentage < 50.0 {
        return max_vp as f64 - percentage_vp_discrete(100.0 - percentage, boards, max_vp);
    }
    let steps = percentage_cutoffs(boards)
        .iter()
        .filter(|&&c| c <= percentage)
        .count() as f64;
    (10.0 + steps) * max_vp as f64 / 20.0
}

/// Linear interpolation between the discrete percentage cutoffs.
///
/// This is an approximation, not a published formula: it only guarantees
/// agreement with the discrete table at the cutoffs themselves.
pub fn percentage_vp_continuous(percentage: f64, boards: u32, config: &ScoringConfig) -> f64 {
    let max_vp = config.max_vp as f64;
    if percentage < 50.0 {
        return max_vp - percentage_vp_continuous(100.0 - percentage, boards, config);
    }
    let cutoffs = percentage_cutoffs(boards);
    let mut previous = (50.0, 10.0);
    let mut vp = 20.0;
    for (step, &cutoff) in cutoffs.iter().enumerate() {
        let target = 11.0 + step as f64;
        if percentage < cutoff {
            let (x0, y0) = previous;
            vp = y0 + (percentage - x0) * (target - y0) / (cutoff - x0);
            break;
        }
        previous = (cutoff, target);
    }
    let scale = 10f64.powi(config.vp_decimal_places as i32);
    (vp * max_vp / 20.0 * scale).round() / scale
}

/// VP for an IMP margin in the configured style.
pub fn imps_to_vp(imps: f64, boards: u32, config: &ScoringConfig, style: VpStyle) -> f64 {
    match style {
        VpStyle::Continuous => continuous_vp(imps, boards, config),
        VpStyle::Discrete => discrete_vp(imps, boards, config.max_vp),
    }
}

/// VP for a match-point percentage in the configured style.
pub fn percentage_to_vp(percentage: f64, boards: u32, config: &ScoringConfig, style: VpStyle) -> f64 {
    match style {
        VpStyle::Continuous => percentage_vp_continuous(percentage, boards, config),
        VpStyle::Discrete => percentage_vp_discrete(percentage, boards, config.max_vp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_points_to_imps() {
        assert_eq!(points_to_imps(0.0), 0);
        assert_eq!(points_to_imps(10.0), 0);
        assert_eq!(points_to_imps(20.0), 1);
        assert_eq!(points_to_imps(420.0), 9);
        assert_eq!(points_to_imps(-620.0), -12);
        assert_eq!(points_to_imps(5000.0), 24);
    }

    #[test]
    fn test_continuous_vp_endpoints() {
        let config = config();
        assert_eq!(continuous_vp(0.0, 16, &config), 10.0);
        assert_eq!(continuous_vp(60.0, 16, &config), 20.0);
        assert_eq!(continuous_vp(200.0, 16, &config), 20.0);
        assert_eq!(continuous_vp(-200.0, 16, &config), 0.0);
        assert_eq!(continuous_vp(5.0, 0, &config), 10.0);
    }

    #[test]
    fn test_continuous_vp_is_non_decreasing_and_symmetric() {
        let config = config();
        for boards in [4, 8, 16, 32] {
            let mut previous = continuous_vp(0.0, boards, &config);
            for imps in 1..=100 {
                let vp = continuous_vp(imps as f64, boards, &config);
                assert!(vp >= previous, "boards {} imps {}: {} < {}", boards, imps, vp, previous);
                let mirrored = continuous_vp(-(imps as f64), boards, &config);
                assert!((mirrored - (20.0 - vp)).abs() < 1e-9);
                previous = vp;
            }
        }
    }

    #[test]
    fn test_concave_table_is_strictly_concave_below_maximum() {
        for (len, boards) in [(5, 16), (20, 16), (62, 16), (40, 8), (90, 32)] {
            let table = concave_table(len, boards, 20.0, 100.0);
            assert_eq!(table[0], 1000);
            for i in 1..len - 1 {
                if table[i] < 2000 {
                    assert!(
                        table[i + 1] - 2 * table[i] + table[i - 1] < 0,
                        "boards {} len {} at {}: {:?}",
                        boards,
                        len,
                        i,
                        &table[i - 1..=i + 1]
                    );
                }
                assert!(table[i] <= table[i + 1]);
            }
        }
    }

    #[test]
    fn test_flat_rounded_steps_are_bumped() {
        // Rounded raw values for 16 boards are 10.31, 10.61, 10.91 at 1..=3 IMPs.
        let config = config();
        assert_eq!(continuous_vp(1.0, 16, &config), 10.31);
        assert_eq!(continuous_vp(2.0, 16, &config), 10.62);
        assert_eq!(continuous_vp(-2.0, 16, &config), 9.38);
    }

    #[test]
    fn test_imps_for_vp_inverts_raw_vp() {
        for margin in [1.0, 7.5, 22.0, 40.0] {
            let vp = raw_vp(margin, 16, 20.0);
            assert!((imps_for_vp(vp, 16, 20.0) - margin).abs() < 1e-6);
        }
    }

    #[test]
    fn test_discrete_boundaries_strictly_increasing() {
        for boards in [1, 4, 8, 12, 16, 24, 32, 64] {
            let bounds = discrete_vp_boundaries(boards, 20);
            assert_eq!(bounds.len(), 10);
            assert!(bounds[0] >= 1);
            for pair in bounds.windows(2) {
                assert!(pair[0] < pair[1], "boards {}: {:?}", boards, bounds);
            }
        }
    }

    #[test]
    fn test_discrete_vp_within_range() {
        for boards in [6, 16, 32] {
            for imps in -120..=120 {
                let vp = discrete_vp(imps as f64, boards, 20);
                assert!((0.0..=20.0).contains(&vp));
                assert_eq!(vp.fract(), 0.0);
            }
            assert_eq!(discrete_vp(0.0, boards, 20), 10.0);
            assert_eq!(discrete_vp(500.0, boards, 20), 20.0);
            assert_eq!(discrete_vp(-500.0, boards, 20), 0.0);
        }
    }

    #[test]
    fn test_discrete_vp_tracks_continuous_rounding() {
        let config = config();
        let bounds = discrete_vp_boundaries(16, 20);
        let first = bounds[0] as f64;
        assert_eq!(discrete_vp(first, 16, 20), 11.0);
        assert_eq!(discrete_vp(first - 1.0, 16, 20), 10.0);
        assert!(continuous_vp(first, 16, &config) >= 10.5);
    }

    #[test]
    fn test_acbl_vp_brackets() {
        assert_eq!(acbl_vp(0.0, 8, 20), 10.0);
        assert_eq!(acbl_vp(2.0, 8, 20), 11.0);
        assert_eq!(acbl_vp(10.0, 8, 20), 14.0);
        assert_eq!(acbl_vp(-10.0, 8, 20), 6.0);
        assert_eq!(acbl_vp(30.0, 8, 20), 20.0);
        assert_eq!(acbl_vp(30.0, 24, 20), 17.0);
        assert_eq!(acbl_vp(30.0, 8, 30), 30.0);
    }

    #[test]
    fn test_percentage_vp_discrete() {
        assert_eq!(percentage_vp_discrete(50.0, 12, 20), 10.0);
        assert_eq!(percentage_vp_discrete(60.0, 12, 20), 14.0);
        assert_eq!(percentage_vp_discrete(40.0, 12, 20), 6.0);
        assert_eq!(percentage_vp_discrete(90.0, 12, 20), 20.0);
    }

    #[test]
    fn test_percentage_vp_continuous_interpolates() {
        let config = config();
        assert_eq!(percentage_vp_continuous(50.0, 12, &config), 10.0);
        assert_eq!(percentage_vp_continuous(60.0, 12, &config), 14.0);
        assert_eq!(percentage_vp_continuous(61.25, 12, &config), 14.5);
        assert_eq!(percentage_vp_continuous(38.75, 12, &config), 5.5);
        assert_eq!(percentage_vp_continuous(95.0, 12, &config), 20.0);
    }

    #[test]
    fn test_style_dispatch() {
        let config = config();
        assert_eq!(
            imps_to_vp(12.0, 16, &config, VpStyle::Discrete),
            discrete_vp(12.0, 16, 20)
        );
        assert_eq!(
            imps_to_vp(12.0, 16, &config, VpStyle::Continuous),
            continuous_vp(12.0, 16, &config)
        );
        assert_eq!(percentage_to_vp(60.0, 12, &config, VpStyle::Discrete), 14.0);
    }
}
