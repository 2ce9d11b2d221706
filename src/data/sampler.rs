use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::model::PointRecord;
use crate::config::SampleBounds;
use crate::error::{PipelineError, Result};

/// Check `n` against both the configured bounds and the available points.
pub fn check_sample_size(n: usize, available: usize, bounds: &SampleBounds) -> Result<()> {
    let max = bounds.max.min(available);
    let min = bounds.min.max(1);
    if n < min || n > max {
        return Err(PipelineError::InvalidSampleSize {
            requested: n,
            min,
            max,
        });
    }
    Ok(())
}

/// Draw `n` distinct points uniformly at random.
///
/// With a seed the draw is reproducible; without one the generator is
/// seeded from system entropy and every call yields a fresh subset.
pub fn sample(
    points: &[PointRecord],
    n: usize,
    seed: Option<u64>,
    bounds: &SampleBounds,
) -> Result<Vec<PointRecord>> {
    check_sample_size(n, points.len(), bounds)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let picked = rand::seq::index::sample(&mut rng, points.len(), n);
    debug!("sampled {n} of {} points (seed {seed:?})", points.len());

    Ok(picked.into_iter().map(|i| points[i].clone()).collect())
}
