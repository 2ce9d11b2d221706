use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use super::model::{DisplacementSample, PointId};

// ---------------------------------------------------------------------------
// Filter predicate: which dates and points are selected
// ---------------------------------------------------------------------------

/// Selection over the long table.
///
/// A `None` field means "no constraint". A point set that is present but
/// empty selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleFilter {
    pub date: Option<NaiveDate>,
    pub points: Option<BTreeSet<PointId>>,
}

impl SampleFilter {
    pub fn for_date(date: NaiveDate) -> Self {
        SampleFilter {
            date: Some(date),
            points: None,
        }
    }

    pub fn for_points(points: impl IntoIterator<Item = PointId>) -> Self {
        SampleFilter {
            date: None,
            points: Some(points.into_iter().collect()),
        }
    }

    pub fn matches(&self, sample: &DisplacementSample) -> bool {
        if let Some(date) = self.date {
            if sample.date != date {
                return false;
            }
        }
        match &self.points {
            Some(selected) => selected.contains(&sample.ps),
            None => true,
        }
    }
}

/// Return indices of samples that pass the filter.
pub fn filtered_indices(samples: &[DisplacementSample], filter: &SampleFilter) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| filter.matches(s))
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Descriptive statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
}

/// Max / min / mean over the finite values; `None` when there are none.
pub fn summarize(values: impl IntoIterator<Item = f64>) -> Option<SummaryStats> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        count += 1;
        sum += v;
        max = max.max(v);
        min = min.min(v);
    }
    (count > 0).then(|| SummaryStats {
        count,
        max,
        min,
        mean: sum / count as f64,
    })
}

/// One bar of a fixed-width histogram: `[lower, lower + step)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Bins aligned on multiples of `step`; empty bins are omitted.
pub fn histogram(values: impl IntoIterator<Item = f64>, step: f64) -> Vec<HistogramBin> {
    if !(step.is_finite() && step > 0.0) {
        return Vec::new();
    }
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for v in values.into_iter().filter(|v| v.is_finite()) {
        *counts.entry((v / step).floor() as i64).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, count)| HistogramBin {
            lower: k as f64 * step,
            upper: (k + 1) as f64 * step,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ps: PointId, day: u32, displacement: f64) -> DisplacementSample {
        DisplacementSample {
            ps,
            date: NaiveDate::from_ymd_opt(2021, 3, day).unwrap(),
            displacement,
        }
    }

    #[test]
    fn test_filter_semantics() {
        let rows = vec![sample(0, 1, 1.0), sample(1, 1, 2.0), sample(0, 2, 3.0)];

        assert_eq!(filtered_indices(&rows, &SampleFilter::default()), vec![0, 1, 2]);
        assert_eq!(filtered_indices(&rows, &SampleFilter::for_points([0])), vec![0, 2]);
        assert!(filtered_indices(&rows, &SampleFilter::for_points([])).is_empty());

        let both = SampleFilter {
            date: Some(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap()),
            points: Some([1].into_iter().collect()),
        };
        assert_eq!(filtered_indices(&rows, &both), vec![1]);
    }

    #[test]
    fn test_summarize() {
        let s = summarize([2.0, -1.0, f64::NAN, 5.0]).unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.min, -1.0);
        assert_eq!(s.mean, 2.0);
        assert!(summarize([]).is_none());
        assert!(summarize([f64::NAN]).is_none());
    }

    #[test]
    fn test_histogram_bins() {
        let bins = histogram([-0.5, 0.0, 4.9, 5.0, 12.0], 5.0);
        assert_eq!(
            bins,
            vec![
                HistogramBin { lower: -5.0, upper: 0.0, count: 1 },
                HistogramBin { lower: 0.0, upper: 5.0, count: 2 },
                HistogramBin { lower: 5.0, upper: 10.0, count: 1 },
                HistogramBin { lower: 10.0, upper: 15.0, count: 1 },
            ]
        );
        assert!(histogram([1.0], 0.0).is_empty());
    }
}
