use log::warn;

use super::model::{PointRecord, RawMatrixSet};

/// Leading epochs averaged when no velocity vector is supplied.
pub const DEFAULT_AVERAGE_WINDOW: usize = 6;

/// Beyond this magnitude every `f64` is a whole number.
const ROUNDING_LIMIT: f64 = (1u64 << 52) as f64;

/// Round to two decimals, ties to even. Idempotent for every finite input.
///
/// Rounds the exact binary value rather than `x * 100`, whose product can
/// land on the other side of a tie: the double nearest `0.015` lies below
/// the tie and rounds to `0.01`.
pub fn round2(x: f64) -> f64 {
    if !x.is_finite() || x.abs() >= ROUNDING_LIMIT {
        return x;
    }
    format!("{x:.2}").parse().unwrap_or(x)
}

/// Mean of the first `window` values (fewer when the series is shorter).
pub fn leading_mean(values: &[f64], window: usize) -> f64 {
    let head = &values[..window.min(values.len())];
    if head.is_empty() {
        return f64::NAN;
    }
    head.iter().sum::<f64>() / head.len() as f64
}

// ---------------------------------------------------------------------------
// Point cloud
// ---------------------------------------------------------------------------

/// One [`PointRecord`] per coordinate row, ids equal to the row index.
///
/// The average comes from `raw.average_velocity` when present. Otherwise it
/// is the mean of the leading `window` epochs, which only approximates the
/// long-term velocity and is only meaningful when at least `window` epochs
/// exist; shorter series average what they have and a warning is logged.
pub fn build_points(raw: &RawMatrixSet, window: usize) -> Vec<PointRecord> {
    if raw.average_velocity.is_none() && raw.num_epochs() < window {
        warn!(
            "only {} epochs available, averaging all of them instead of the leading {}",
            raw.num_epochs(),
            window
        );
    }

    raw.coordinates
        .iter()
        .zip(&raw.displacements)
        .enumerate()
        .map(|(id, (&[lon, lat], row))| {
            let average = match &raw.average_velocity {
                Some(v) => v[id],
                None => leading_mean(row, window),
            };
            PointRecord {
                id,
                lon,
                lat,
                average: round2(average),
                displacements: row.iter().copied().map(round2).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(displacements: Vec<Vec<f64>>, velocity: Option<Vec<f64>>) -> RawMatrixSet {
        let n = displacements.len();
        let m = displacements.first().map_or(0, Vec::len);
        RawMatrixSet {
            coordinates: (0..n).map(|i| [120.0 + i as f64, 14.0 - i as f64]).collect(),
            displacements,
            day_codes: (0..m as i64).map(|i| 736673 + 12 * i).collect(),
            average_velocity: velocity,
            master_day: None,
            bperp: None,
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(2.236), 2.24);
        assert_eq!(round2(-1.11), -1.11);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        assert!(round2(f64::NAN).is_nan());
        assert_eq!(round2(1e300), 1e300);
    }

    #[test]
    fn test_round2_near_ties() {
        // stored just above the tie
        assert_eq!(round2(0.005), 0.01);
        // stored just below the tie
        assert_eq!(round2(0.015), 0.01);
        assert_eq!(round2(1.115), 1.11);
        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(-1.115), -1.11);
    }

    #[test]
    fn test_round2_idempotent() {
        let mut x = -1234.56789;
        while x < 1234.0 {
            assert_eq!(round2(round2(x)), round2(x), "x = {x}");
            x += 0.0137;
        }
        for x in [f64::MIN_POSITIVE, 4503599627370.4951, -0.005, 0.005, 1e15 + 0.5] {
            assert_eq!(round2(round2(x)), round2(x));
        }
    }

    #[test]
    fn test_rounded_displacements() {
        let points = build_points(
            &raw(vec![vec![1.234, 2.236], vec![3.1, 4.2], vec![5.55, -1.11]], None),
            DEFAULT_AVERAGE_WINDOW,
        );
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].displacements, vec![1.23, 2.24]);
        assert_eq!(points[2].displacements, vec![5.55, -1.11]);
        assert_eq!(points[1].id, 1);
        assert_eq!((points[1].lon, points[1].lat), (121.0, 13.0));
    }

    #[test]
    fn test_average_from_velocity() {
        let points = build_points(
            &raw(vec![vec![1.0; 8], vec![2.0; 8]], Some(vec![-3.456, 7.0])),
            DEFAULT_AVERAGE_WINDOW,
        );
        assert_eq!(points[0].average, -3.46);
        assert_eq!(points[1].average, 7.0);
    }

    #[test]
    fn test_average_from_leading_window() {
        let row = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 100.0, 200.0];
        let points = build_points(&raw(vec![row], None), DEFAULT_AVERAGE_WINDOW);
        assert_eq!(points[0].average, 3.5);
    }

    #[test]
    fn test_short_series_averages_available_epochs() {
        let points = build_points(&raw(vec![vec![1.0, 2.0]], None), DEFAULT_AVERAGE_WINDOW);
        assert_eq!(points[0].average, 1.5);
        assert!(leading_mean(&[], 6).is_nan());
    }
}
