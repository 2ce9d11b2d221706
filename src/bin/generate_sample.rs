//! Writes a synthetic StAMPS export pair: `ps_plot_ts_v-do.mat` (time series)
//! and `ps_plot_v-do.mat` (mean velocity).

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use psinsar::data::date;
use psinsar::data::matfile::MatWriter;

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn main() -> Result<()> {
    env_logger::init();
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_default();
    let mut rng = StdRng::seed_from_u64(42);

    // Sentinel-1 style 12-day revisit, master in the middle of the stack
    let n_points = 2000;
    let first_day = date::encode(
        chrono::NaiveDate::from_ymd_opt(2016, 12, 9).context("start date")?,
    );
    let days: Vec<f64> = (0..30).map(|i| (first_day + 12 * i) as f64).collect();
    let master_day = days[days.len() / 2];
    let years: Vec<f64> = days.iter().map(|d| (d - days[0]) / 365.25).collect();

    let mut lonlat = Vec::with_capacity(n_points * 2);
    let mut ph_mm = Vec::with_capacity(n_points * days.len());
    let mut velocity = Vec::with_capacity(n_points);

    for _ in 0..n_points {
        let lon = 121.0 + rng.gen::<f64>() * 0.1;
        let lat = 14.55 + rng.gen::<f64>() * 0.1;
        // subsidence bowl centred in the scene
        let r = ((lon - 121.05).powi(2) + (lat - 14.6).powi(2)).sqrt();
        let v = -30.0 * (-r * r / 0.0008).exp() + gauss(&mut rng, 0.0, 1.5);

        lonlat.extend_from_slice(&[lon, lat]);
        velocity.push(v);
        for t in &years {
            let seasonal = 3.0 * (2.0 * std::f64::consts::PI * t).sin();
            ph_mm.push(v * t + seasonal + gauss(&mut rng, 0.0, 2.0));
        }
    }

    let bperp: Vec<f64> = days
        .iter()
        .map(|&d| if d == master_day { 0.0 } else { gauss(&mut rng, 0.0, 60.0) })
        .collect();

    let mut ts = MatWriter::new().compressed(true);
    ts.write_matrix("lonlat", n_points, 2, &lonlat)?;
    ts.write_matrix("ph_mm", n_points, days.len(), &ph_mm)?;
    ts.write_row("day", &days)?;
    ts.write_scalar("master_day", master_day)?;
    ts.write_row("bperp", &bperp)?;
    let ts_path = out_dir.join("ps_plot_ts_v-do.mat");
    ts.write_to(&ts_path)?;

    let mut vel = MatWriter::new().compressed(true);
    vel.write_matrix("lonlat", n_points, 2, &lonlat)?;
    vel.write_column("ph_disp", &velocity)?;
    let vel_path = out_dir.join("ps_plot_v-do.mat");
    vel.write_to(&vel_path)?;

    println!(
        "Wrote {n_points} points × {} epochs to {} and {}",
        days.len(),
        ts_path.display(),
        vel_path.display()
    );
    Ok(())
}
