use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use super::filter::{self, HistogramBin, SampleFilter, SummaryStats};

/// Stable row index of a scatterer in its source dataset.
pub type PointId = usize;

// ---------------------------------------------------------------------------
// RawMatrixSet – named arrays pulled out of the container(s)
// ---------------------------------------------------------------------------

/// Arrays extracted from one dataset, already shape-checked by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatrixSet {
    /// `[lon, lat]` per point.
    pub coordinates: Vec<[f64; 2]>,
    /// One row per point, one column per epoch (mm).
    pub displacements: Vec<Vec<f64>>,
    /// Serial day code per epoch.
    pub day_codes: Vec<i64>,
    /// Precomputed mean LOS velocity per point (mm/yr).
    pub average_velocity: Option<Vec<f64>>,
    /// Day code of the reference acquisition.
    pub master_day: Option<i64>,
    /// Perpendicular baseline per epoch (m).
    pub bperp: Option<Vec<f64>>,
}

impl RawMatrixSet {
    pub fn num_points(&self) -> usize {
        self.coordinates.len()
    }

    pub fn num_epochs(&self) -> usize {
        self.day_codes.len()
    }
}

// ---------------------------------------------------------------------------
// Entities of the tidy model
// ---------------------------------------------------------------------------

/// One persistent scatterer with its full displacement history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRecord {
    pub id: PointId,
    pub lon: f64,
    pub lat: f64,
    /// Rounded average displacement (velocity when supplied).
    pub average: f64,
    /// Rounded per-epoch displacement, aligned with the model's epochs.
    pub displacements: Vec<f64>,
}

/// An acquisition date and the day code it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Epoch {
    pub date: NaiveDate,
    pub day_code: i64,
}

/// One row of the long table: a point's displacement on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplacementSample {
    pub ps: PointId,
    pub date: NaiveDate,
    pub displacement: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "Master"),
            Role::Slave => write!(f, "Slave"),
        }
    }
}

/// One acquisition of the interferometric stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineRecord {
    pub date: NaiveDate,
    pub day_code: i64,
    /// Days relative to the master acquisition.
    pub temporal_baseline: i64,
    /// Metres.
    pub perpendicular_baseline: f64,
    pub role: Role,
}

/// Lowest and highest displacement on one date, with the points they belong to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes<'a> {
    pub lowest: &'a PointRecord,
    pub lowest_value: f64,
    pub highest: &'a PointRecord,
    pub highest_value: f64,
}

// ---------------------------------------------------------------------------
// TidyModel – the materialized result of one pipeline run
// ---------------------------------------------------------------------------

/// Everything downstream consumers read. Immutable once built.
#[derive(Debug, Clone)]
pub struct TidyModel {
    points: Vec<PointRecord>,
    epochs: Vec<Epoch>,
    samples: Vec<DisplacementSample>,
    baselines: Vec<BaselineRecord>,
    /// Points in the source dataset before sampling.
    pub total_points: usize,
    index: HashMap<PointId, usize>,
}

impl TidyModel {
    /// Assemble the model and build the point-id index.
    pub fn from_parts(
        points: Vec<PointRecord>,
        epochs: Vec<Epoch>,
        samples: Vec<DisplacementSample>,
        baselines: Vec<BaselineRecord>,
        total_points: usize,
    ) -> Self {
        let index = points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
        TidyModel {
            points,
            epochs,
            samples,
            baselines,
            total_points,
            index,
        }
    }

    /// Sampled points.
    pub fn point_cloud(&self) -> &[PointRecord] {
        &self.points
    }

    pub fn point(&self, id: PointId) -> Option<&PointRecord> {
        self.index.get(&id).map(|&i| &self.points[i])
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    /// Distinct acquisition dates in epoch order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.epochs.iter().map(|e| e.date).collect()
    }

    /// The whole long table.
    pub fn samples(&self) -> &[DisplacementSample] {
        &self.samples
    }

    pub fn baseline_table(&self) -> &[BaselineRecord] {
        &self.baselines
    }

    /// Rows passing `filter`, in table order.
    pub fn filtered(&self, filter: &SampleFilter) -> Vec<&DisplacementSample> {
        filter::filtered_indices(&self.samples, filter)
            .into_iter()
            .map(|i| &self.samples[i])
            .collect()
    }

    /// Every row for the given points, across all dates.
    pub fn time_series(&self, point_ids: &[PointId]) -> Vec<&DisplacementSample> {
        self.filtered(&SampleFilter::for_points(point_ids.iter().copied()))
    }

    /// Max / min / mean on `date`, over `point_ids` or every sampled point.
    pub fn summary_stats(&self, date: NaiveDate, point_ids: Option<&[PointId]>) -> Option<SummaryStats> {
        let mut filter = SampleFilter::for_date(date);
        if let Some(ids) = point_ids {
            filter.points = Some(ids.iter().copied().collect());
        }
        filter::summarize(self.filtered(&filter).iter().map(|s| s.displacement))
    }

    /// Each sampled point with its displacement on `date`.
    pub fn snapshot(&self, date: NaiveDate) -> Vec<(&PointRecord, f64)> {
        self.filtered(&SampleFilter::for_date(date))
            .into_iter()
            .filter_map(|s| self.point(s.ps).map(|p| (p, s.displacement)))
            .collect()
    }

    /// Points holding the lowest and highest finite displacement on `date`.
    pub fn extremes(&self, date: NaiveDate) -> Option<Extremes<'_>> {
        let snapshot = self.snapshot(date);
        let finite = || snapshot.iter().filter(|(_, v)| v.is_finite());
        let &(lowest, lowest_value) = finite().min_by(|a, b| a.1.total_cmp(&b.1))?;
        let &(highest, highest_value) = finite().max_by(|a, b| a.1.total_cmp(&b.1))?;
        Some(Extremes {
            lowest,
            lowest_value,
            highest,
            highest_value,
        })
    }

    /// Displacement histogram on `date` with bins of width `step` mm.
    pub fn histogram(&self, date: NaiveDate, step: f64) -> Vec<HistogramBin> {
        filter::histogram(
            self.filtered(&SampleFilter::for_date(date))
                .iter()
                .map(|s| s.displacement),
            step,
        )
    }

    /// Midpoint `(lon, lat)` of the extent of the points shown on `date`.
    pub fn center(&self, date: NaiveDate) -> Option<(f64, f64)> {
        let snapshot = self.snapshot(date);
        if snapshot.is_empty() {
            return None;
        }
        let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for (p, _) in &snapshot {
            lon_min = lon_min.min(p.lon);
            lon_max = lon_max.max(p.lon);
            lat_min = lat_min.min(p.lat);
            lat_max = lat_max.max(p.lat);
        }
        Some(((lon_min + lon_max) / 2.0, (lat_min + lat_max) / 2.0))
    }

    /// First `k` sampled point ids, the initial selection for time-series views.
    pub fn default_selection(&self, k: usize) -> Vec<PointId> {
        self.points.iter().take(k).map(|p| p.id).collect()
    }

    /// Number of sampled points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
