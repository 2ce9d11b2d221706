use super::date;
use super::model::{DisplacementSample, Epoch, PointRecord};
use crate::error::{PipelineError, Result};

/// Decode every day code once; the resulting epochs are shared by all points.
pub fn epochs_from_day_codes(day_codes: &[i64]) -> Result<Vec<Epoch>> {
    day_codes
        .iter()
        .map(|&day_code| {
            Ok(Epoch {
                date: date::decode(day_code)?,
                day_code,
            })
        })
        .collect()
}

/// Melt the wide point × epoch matrix into one row per (point, epoch).
///
/// Rows come out point-major in the order given; the order carries no meaning.
pub fn melt(points: &[PointRecord], epochs: &[Epoch]) -> Result<Vec<DisplacementSample>> {
    let mut samples = Vec::with_capacity(points.len() * epochs.len());
    for point in points {
        if point.displacements.len() != epochs.len() {
            return Err(PipelineError::shape(
                format!("displacements of point {}", point.id),
                epochs.len(),
                point.displacements.len(),
            ));
        }
        samples.extend(
            epochs
                .iter()
                .zip(&point.displacements)
                .map(|(epoch, &displacement)| DisplacementSample {
                    ps: point.id,
                    date: epoch.date,
                    displacement,
                }),
        );
    }
    Ok(samples)
}
