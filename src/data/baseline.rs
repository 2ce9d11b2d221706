use log::debug;

use super::date;
use super::model::{BaselineRecord, RawMatrixSet, Role};
use crate::error::{PipelineError, Result};

/// Baseline table of the stack, sorted by acquisition day.
///
/// `bperp` pairs positionally with `day_codes`. The master acquisition is
/// listed once (whether or not it also appears among `day_codes`) with
/// temporal and perpendicular baselines of zero.
pub fn derive_baselines(day_codes: &[i64], master_day: i64, bperp: &[f64]) -> Result<Vec<BaselineRecord>> {
    if bperp.len() != day_codes.len() {
        return Err(PipelineError::shape(
            "perpendicular baselines vs epochs",
            day_codes.len(),
            bperp.len(),
        ));
    }

    let mut acquisitions: Vec<(i64, f64, Role)> = day_codes
        .iter()
        .zip(bperp)
        .filter(|&(&day, _)| day != master_day)
        .map(|(&day, &perp)| (day, perp, Role::Slave))
        .collect();
    acquisitions.push((master_day, 0.0, Role::Master));
    acquisitions.sort_by_key(|&(day, _, _)| day);

    acquisitions
        .into_iter()
        .map(|(day_code, perpendicular_baseline, role)| {
            Ok(BaselineRecord {
                date: date::decode(day_code)?,
                day_code,
                temporal_baseline: day_code - master_day,
                perpendicular_baseline,
                role,
            })
        })
        .collect()
}

/// Baselines for a parsed dataset; empty when it carries no master day or
/// no perpendicular baselines (single-file exports may omit both).
pub fn baselines_for(raw: &RawMatrixSet) -> Result<Vec<BaselineRecord>> {
    match (raw.master_day, raw.bperp.as_deref()) {
        (Some(master), Some(bperp)) => derive_baselines(&raw.day_codes, master, bperp),
        _ => {
            debug!("no master day / perpendicular baselines, baseline table left empty");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_master_included_in_epochs() {
        let table = derive_baselines(&[736673, 736841], 736673, &[0.0, 35.2]).unwrap();
        assert_eq!(table.len(), 2);

        let masters: Vec<_> = table.iter().filter(|r| r.role == Role::Master).collect();
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].temporal_baseline, 0);
        assert_eq!(masters[0].perpendicular_baseline, 0.0);

        let slave = &table[1];
        assert_eq!(slave.role, Role::Slave);
        assert_eq!(slave.temporal_baseline, 168);
        assert_eq!(slave.perpendicular_baseline, 35.2);
        assert_eq!(slave.date, NaiveDate::from_ymd_opt(2017, 5, 26).unwrap());
    }

    #[test]
    fn test_master_absent_from_epochs() {
        let table = derive_baselines(&[736841, 736661], 736673, &[-20.0, 12.5]).unwrap();
        let days: Vec<i64> = table.iter().map(|r| r.day_code).collect();
        assert_eq!(days, vec![736661, 736673, 736841]);
        assert_eq!(table[0].temporal_baseline, -12);
        assert_eq!(table[0].perpendicular_baseline, 12.5);
        assert_eq!(table[1].role, Role::Master);
        assert_eq!(table[2].perpendicular_baseline, -20.0);
        assert_eq!(table.iter().filter(|r| r.role == Role::Master).count(), 1);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            derive_baselines(&[736673, 736841], 736673, &[0.0]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_metadata_gives_empty_table() {
        let raw = RawMatrixSet {
            coordinates: vec![[0.0, 0.0]],
            displacements: vec![vec![0.0]],
            day_codes: vec![736673],
            average_velocity: None,
            master_day: Some(736673),
            bperp: None,
        };
        assert!(baselines_for(&raw).unwrap().is_empty());
    }
}
