use std::path::Path;

use log::{debug, info};

use super::date;
use super::matfile::{MatArray, MatFile};
use super::model::RawMatrixSet;
use crate::config::FieldNames;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Container input
// ---------------------------------------------------------------------------

/// Raw bytes of one uploaded container plus the name it arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ContainerInput {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        ContainerInput {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(ContainerInput { name, bytes })
    }
}

/// Containers sorted by name. Roles follow this order, not upload order:
/// the StAMPS time-series export (`ps_plot_ts_*`) sorts before the velocity
/// export (`ps_plot_v*`).
pub fn canonical_order(inputs: &[ContainerInput]) -> Vec<&ContainerInput> {
    let mut ordered: Vec<&ContainerInput> = inputs.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.bytes.cmp(&b.bytes)));
    ordered
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse one container (single-file mode) or two (time-series + velocity).
pub fn parse_inputs(inputs: &[ContainerInput], fields: &FieldNames) -> Result<RawMatrixSet> {
    match inputs.len() {
        1 => parse_single(&inputs[0], fields),
        2 => parse_pair(inputs, fields),
        0 => Err(PipelineError::FileCount {
            expected: 1,
            actual: 0,
        }),
        n => Err(PipelineError::FileCount {
            expected: 2,
            actual: n,
        }),
    }
}

/// Single-file mode: master day and perpendicular baselines are optional and
/// the average displacement is always derived from the epochs.
pub fn parse_single(input: &ContainerInput, fields: &FieldNames) -> Result<RawMatrixSet> {
    let mat = MatFile::from_bytes(&input.name, &input.bytes)?;
    let mut raw = extract_time_series(&mat, fields)?;

    if let Some(master) = mat.get(&fields.master_day) {
        raw.master_day = Some(scalar_day(&mat, &fields.master_day, master)?);
    }
    if let Some(bperp) = mat.get(&fields.bperp) {
        raw.bperp = Some(vector_of_len(&fields.bperp, bperp, raw.num_epochs())?);
    }

    info!(
        "{}: {} points × {} epochs (single-file)",
        input.name,
        raw.num_points(),
        raw.num_epochs()
    );
    Ok(raw)
}

/// Two-file mode: exactly two containers, roles by [`canonical_order`].
pub fn parse_pair(inputs: &[ContainerInput], fields: &FieldNames) -> Result<RawMatrixSet> {
    if inputs.len() != 2 {
        return Err(PipelineError::FileCount {
            expected: 2,
            actual: inputs.len(),
        });
    }
    let ordered = canonical_order(inputs);
    let (ts_input, velocity_input) = (ordered[0], ordered[1]);
    debug!(
        "time-series container: {}, velocity container: {}",
        ts_input.name, velocity_input.name
    );

    let ts = MatFile::from_bytes(&ts_input.name, &ts_input.bytes)?;
    let velocity = MatFile::from_bytes(&velocity_input.name, &velocity_input.bytes)?;

    let mut raw = extract_time_series(&ts, fields)?;
    let n_points = raw.num_points();

    let master = ts.require(&fields.master_day)?;
    raw.master_day = Some(scalar_day(&ts, &fields.master_day, master)?);
    raw.bperp = Some(vector_of_len(
        &fields.bperp,
        ts.require(&fields.bperp)?,
        raw.num_epochs(),
    )?);

    if let Some(lonlat) = velocity.get(&fields.coordinates) {
        if lonlat.rows() != n_points {
            return Err(PipelineError::shape(
                format!("point count of {} vs {}", velocity.name, ts.name),
                n_points,
                lonlat.rows(),
            ));
        }
    }
    if let Some(v) = velocity.get(&fields.average_velocity) {
        raw.average_velocity = Some(vector_of_len(&fields.average_velocity, v, n_points)?);
    }

    info!(
        "{} + {}: {} points × {} epochs, velocity {}",
        ts.name,
        velocity.name,
        n_points,
        raw.num_epochs(),
        if raw.average_velocity.is_some() { "supplied" } else { "absent" }
    );
    Ok(raw)
}

// ---------------------------------------------------------------------------
// Field extraction helpers
// ---------------------------------------------------------------------------

/// Coordinates, displacement matrix and epoch day codes, cross-checked.
fn extract_time_series(mat: &MatFile, fields: &FieldNames) -> Result<RawMatrixSet> {
    let lonlat = mat.require(&fields.coordinates)?;
    let ph = mat.require(&fields.displacement)?;
    let day = mat.require(&fields.day)?;

    if lonlat.cols() != 2 {
        return Err(PipelineError::shape(
            format!("columns of '{}'", fields.coordinates),
            2,
            lonlat.cols(),
        ));
    }
    if lonlat.rows() != ph.rows() {
        return Err(PipelineError::shape(
            format!("rows of '{}' vs '{}'", fields.displacement, fields.coordinates),
            lonlat.rows(),
            ph.rows(),
        ));
    }
    if !day.is_vector() || day.len() != ph.cols() {
        return Err(PipelineError::shape(
            format!("length of '{}' vs columns of '{}'", fields.day, fields.displacement),
            ph.cols(),
            day.len(),
        ));
    }

    let coordinates = (0..lonlat.rows())
        .map(|r| [lonlat.get(r, 0), lonlat.get(r, 1)])
        .collect();
    let displacements = (0..ph.rows()).map(|r| ph.row(r)).collect();
    let day_codes = day
        .data
        .iter()
        .map(|&d| calendar_day(d))
        .collect::<Result<Vec<i64>>>()?;

    Ok(RawMatrixSet {
        coordinates,
        displacements,
        day_codes,
        average_velocity: None,
        master_day: None,
        bperp: None,
    })
}

fn scalar_day(mat: &MatFile, field: &str, array: &MatArray) -> Result<i64> {
    match array.data.first() {
        Some(&v) => calendar_day(v),
        None => Err(PipelineError::missing(field, &mat.name)),
    }
}

/// Day code that also decodes to a calendar date.
fn calendar_day(value: f64) -> Result<i64> {
    let code = date::day_code_from_f64(value)?;
    date::decode(code)?;
    Ok(code)
}

fn vector_of_len(field: &str, array: &MatArray, expected: usize) -> Result<Vec<f64>> {
    if !array.is_vector() || array.len() != expected {
        return Err(PipelineError::shape(
            format!("length of '{field}'"),
            expected,
            array.len(),
        ));
    }
    Ok(array.data.clone())
}
