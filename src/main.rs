use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;

use psinsar::data::export;
use psinsar::data::model::{PointId, TidyModel};
use psinsar::{pipeline, Config, Session};

#[derive(Parser)]
#[command(name = "psinsar")]
#[command(about = "Load StAMPS PS-InSAR exports and summarise the sampled time series")]
struct Args {
    /// One time-series container, or the time-series and velocity pair.
    /// Defaults to the configured reference dataset.
    files: Vec<PathBuf>,

    /// Number of points to sample.
    #[arg(short = 'n', long)]
    sample_size: Option<usize>,

    /// Seed for a reproducible draw.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Date for the descriptive statistics (YYYY-MM-DD). Defaults to the first epoch.
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Point ids whose time series are printed.
    #[arg(short, long, value_delimiter = ',')]
    points: Vec<PointId>,

    /// Write the long table (.parquet, .csv or .json).
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write the baseline table (.csv or .json).
    #[arg(long)]
    baselines: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_json(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    let inputs = pipeline::resolve_inputs(&args.files, &config).context("reading input")?;

    let mut session = Session::new(config);
    session.seed = args.seed;
    if let Some(n) = args.sample_size {
        session.sample_size = n;
    }
    let model = session.load(inputs).context("building model")?;

    if let Some(date) = args.date {
        if !model.dates().contains(&date) {
            bail!("{date} is not an acquisition date of this dataset");
        }
        session.select_date(date);
    }
    if !args.points.is_empty() {
        session.select_no_points();
        for id in &args.points {
            session.toggle_point(*id);
        }
    }

    print_overview(&model);
    print_baselines(&model);
    print_date_summary(&session, &model);
    print_selection(&session);

    if let Some(path) = &args.export {
        export::write_samples(path, &model)
            .with_context(|| format!("exporting samples to {}", path.display()))?;
    }
    if let Some(path) = &args.baselines {
        export::write_baselines(path, model.baseline_table())
            .with_context(|| format!("exporting baselines to {}", path.display()))?;
    }

    Ok(())
}

fn print_overview(model: &TidyModel) {
    println!(
        "{} of {} points sampled, {} epochs, {} rows",
        model.len(),
        model.total_points,
        model.epochs().len(),
        model.samples().len()
    );
    if let (Some(first), Some(last)) = (model.epochs().first(), model.epochs().last()) {
        println!("epochs: {} .. {}", first.date, last.date);
    }
}

fn print_baselines(model: &TidyModel) {
    let table = model.baseline_table();
    if table.is_empty() {
        return;
    }
    println!("\n{:<12} {:>8} {:>10}  role", "date", "Bt (d)", "Bperp (m)");
    for r in table {
        println!(
            "{:<12} {:>8} {:>10.2}  {}",
            r.date, r.temporal_baseline, r.perpendicular_baseline, r.role
        );
    }
}

fn print_date_summary(session: &Session, model: &TidyModel) {
    let Some(date) = session.filter.date else {
        return;
    };
    let Some(stats) = session.date_stats() else {
        println!("\nno finite displacement on {date}");
        return;
    };
    println!("\nDisplacement (mm) of sampled points (n = {}) for {date}", stats.count);
    println!(
        "  highest: {:0.2}  lowest: {:0.2}  average: {:0.2}",
        stats.max, stats.min, stats.mean
    );
    if let Some(ex) = model.extremes(date) {
        println!(
            "  lowest at PS {} ({:.5}, {:.5}), highest at PS {} ({:.5}, {:.5})",
            ex.lowest.id, ex.lowest.lon, ex.lowest.lat, ex.highest.id, ex.highest.lon, ex.highest.lat
        );
    }
    for bin in model.histogram(date, session.config.histogram_step) {
        println!("  [{:>7.1}, {:>7.1})  {}", bin.lower, bin.upper, bin.count);
    }
}

fn print_selection(session: &Session) {
    let rows = session.selected_time_series();
    if rows.is_empty() {
        return;
    }
    println!("\n{:>8}  {:<12} {:>10}", "PS", "date", "disp (mm)");
    for s in rows {
        println!("{:>8}  {:<12} {:>10.2}", s.ps, s.date, s.displacement);
    }
}
