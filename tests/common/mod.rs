#![allow(dead_code)]

use psinsar::config::SampleBounds;
use psinsar::data::loader::ContainerInput;
use psinsar::data::matfile::MatWriter;
use psinsar::Config;

/// Config whose sample bounds admit tiny fixtures.
pub fn small_config() -> Config {
    Config {
        sampling: SampleBounds { min: 1, max: 1000, default: 3 },
        ..Config::default()
    }
}

/// Time-series container from row-major displacements.
pub fn time_series(
    name: &str,
    lonlat: &[[f64; 2]],
    ph_mm: &[Vec<f64>],
    days: &[f64],
    master: Option<(f64, &[f64])>,
) -> ContainerInput {
    let mut w = MatWriter::new();
    let flat: Vec<f64> = lonlat.iter().flatten().copied().collect();
    w.write_matrix("lonlat", lonlat.len(), 2, &flat).unwrap();
    let cols = ph_mm.first().map_or(0, Vec::len);
    let ph: Vec<f64> = ph_mm.iter().flatten().copied().collect();
    w.write_matrix("ph_mm", ph_mm.len(), cols, &ph).unwrap();
    w.write_row("day", days).unwrap();
    if let Some((master_day, bperp)) = master {
        w.write_scalar("master_day", master_day).unwrap();
        w.write_row("bperp", bperp).unwrap();
    }
    ContainerInput::new(name, w.finish())
}

/// Velocity container carrying the same coordinates.
pub fn velocity(name: &str, lonlat: &[[f64; 2]], ph_disp: &[f64]) -> ContainerInput {
    let mut w = MatWriter::new().compressed(true);
    let flat: Vec<f64> = lonlat.iter().flatten().copied().collect();
    w.write_matrix("lonlat", lonlat.len(), 2, &flat).unwrap();
    w.write_column("ph_disp", ph_disp).unwrap();
    ContainerInput::new(name, w.finish())
}

pub fn three_points() -> Vec<[f64; 2]> {
    vec![[121.01, 14.55], [121.02, 14.56], [121.03, 14.57]]
}
