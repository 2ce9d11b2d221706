mod common;

use std::collections::HashMap;

use approx::assert_relative_eq;
use chrono::NaiveDate;

use psinsar::data::date;
use psinsar::{pipeline, PipelineError, ResultCache, Role, Session};

use common::{small_config, three_points, time_series, velocity};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn melts_three_points_by_two_epochs() {
    let input = time_series(
        "ts.mat",
        &three_points(),
        &[vec![1.234, 2.236], vec![3.1, 4.2], vec![5.55, -1.11]],
        &[736673.0, 736841.0],
        None,
    );
    let model = pipeline::build_model(&[input], 3, Some(1), &small_config()).unwrap();

    assert_eq!(model.samples().len(), 6);
    assert_eq!(model.dates(), vec![ymd(2016, 12, 9), ymd(2017, 5, 26)]);

    let by_key: HashMap<_, _> = model
        .samples()
        .iter()
        .map(|s| ((s.ps, s.date), s.displacement))
        .collect();
    let expected = [
        (0, ymd(2016, 12, 9), 1.23),
        (0, ymd(2017, 5, 26), 2.24),
        (1, ymd(2016, 12, 9), 3.1),
        (1, ymd(2017, 5, 26), 4.2),
        (2, ymd(2016, 12, 9), 5.55),
        (2, ymd(2017, 5, 26), -1.11),
    ];
    for (ps, d, value) in expected {
        assert_relative_eq!(by_key[&(ps, d)], value);
    }
    assert!(model.baseline_table().is_empty());
}

#[test]
fn baselines_from_master_and_slaves() {
    let input = time_series(
        "ts.mat",
        &three_points(),
        &[vec![0.0, 1.0], vec![0.0, 2.0], vec![0.0, 3.0]],
        &[736673.0, 736841.0],
        Some((736673.0, &[0.0, 42.5])),
    );
    let model = pipeline::build_model(&[input], 3, Some(1), &small_config()).unwrap();
    let table = model.baseline_table();

    let masters: Vec<_> = table.iter().filter(|r| r.role == Role::Master).collect();
    let slaves: Vec<_> = table.iter().filter(|r| r.role == Role::Slave).collect();
    assert_eq!(masters.len(), 1);
    assert_eq!(masters[0].temporal_baseline, 0);
    assert_eq!(slaves.len(), 1);
    assert_eq!(slaves[0].temporal_baseline, 168);
    assert_relative_eq!(slaves[0].perpendicular_baseline, 42.5);
}

#[test]
fn coordinate_and_displacement_rows_must_agree() {
    let lonlat: Vec<[f64; 2]> = (0..5).map(|i| [121.0 + i as f64, 14.0]).collect();
    let ph: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64, 0.5]).collect();
    let input = time_series("ts.mat", &lonlat, &ph, &[736673.0, 736841.0], None);

    let err = pipeline::build_model(&[input], 3, Some(1), &small_config()).unwrap_err();
    assert!(matches!(err, PipelineError::ShapeMismatch { .. }), "{err}");
}

#[test]
fn average_uses_velocity_when_supplied() {
    let ph = vec![vec![1.0, 3.0], vec![2.0, 4.0], vec![-1.0, -3.0]];
    let days = [736673.0, 736841.0];
    let ts = time_series(
        "ps_plot_ts_v-do.mat",
        &three_points(),
        &ph,
        &days,
        Some((736673.0, &[0.0, 10.0])),
    );
    let vel = velocity("ps_plot_v-do.mat", &three_points(), &[-7.456, 0.125, 3.0]);

    let with_velocity =
        pipeline::build_model(&[vel, ts.clone()], 3, Some(5), &small_config()).unwrap();
    let averages: HashMap<_, _> = with_velocity.point_cloud().iter().map(|p| (p.id, p.average)).collect();
    assert_relative_eq!(averages[&0], -7.46);
    assert_relative_eq!(averages[&1], 0.12);
    assert_relative_eq!(averages[&2], 3.0);

    let single = pipeline::build_model(&[ts], 3, Some(5), &small_config()).unwrap();
    let averages: HashMap<_, _> = single.point_cloud().iter().map(|p| (p.id, p.average)).collect();
    assert_relative_eq!(averages[&0], 2.0);
    assert_relative_eq!(averages[&1], 3.0);
    assert_relative_eq!(averages[&2], -2.0);
}

#[test]
fn rows_equal_sampled_points_times_epochs() {
    let lonlat: Vec<[f64; 2]> = (0..40).map(|i| [121.0 + i as f64 * 0.001, 14.6]).collect();
    let ph: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, -(i as f64), 0.5]).collect();
    let input = time_series("ts.mat", &lonlat, &ph, &[736673.0, 736841.0, 737165.0], None);

    let model = pipeline::build_model(&[input], 25, None, &small_config()).unwrap();
    assert_eq!(model.len(), 25);
    assert_eq!(model.total_points, 40);
    assert_eq!(model.samples().len(), 25 * 3);

    let mut ids: Vec<_> = model.point_cloud().iter().map(|p| p.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 25);
}

#[test]
fn sample_size_outside_bounds_is_rejected() {
    let input = time_series("ts.mat", &three_points(), &[vec![1.0], vec![2.0], vec![3.0]], &[736673.0], None);
    let err = pipeline::build_model(&[input], 4, None, &small_config()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidSampleSize { requested: 4, .. }));
}

#[test]
fn three_containers_are_rejected() {
    let make = |name: &str| time_series(name, &three_points(), &[vec![1.0], vec![2.0], vec![3.0]], &[736673.0], None);
    let err = pipeline::build_model(&[make("a.mat"), make("b.mat"), make("c.mat")], 3, None, &small_config())
        .unwrap_err();
    assert!(matches!(err, PipelineError::FileCount { actual: 3, .. }));
}

#[test]
fn day_codes_survive_the_date_codec() {
    for code in [367, 700_000, 736_673, 736_841, 737_165, 740_000] {
        assert_eq!(date::encode(date::decode(code).unwrap()), code);
    }
}

#[test]
fn cache_reuses_model_for_identical_content() {
    let cache = ResultCache::indefinite();
    let config = small_config();
    let input = || {
        time_series(
            "ts.mat",
            &three_points(),
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            &[736673.0, 736841.0],
            None,
        )
    };

    let first = pipeline::run(&cache, &[input()], 2, None, &config).unwrap();
    let second = pipeline::run(&cache, &[input()], 2, None, &config).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.computations(), 1);

    pipeline::run(&cache, &[input()], 3, None, &config).unwrap();
    assert_eq!(cache.computations(), 2);
}

#[test]
fn session_summarises_selected_date() {
    let mut session = Session::new(small_config());
    session.seed = Some(3);
    let input = time_series(
        "ts.mat",
        &three_points(),
        &[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 60.0]],
        &[736673.0, 736841.0],
        None,
    );
    session.load(vec![input]).unwrap();

    let first = session.date_stats().unwrap();
    assert_eq!(first.count, 3);
    assert_relative_eq!(first.mean, 2.0);

    session.select_date(ymd(2017, 5, 26));
    let second = session.date_stats().unwrap();
    assert_relative_eq!(second.max, 60.0);
    assert_relative_eq!(second.min, 10.0);
    assert_relative_eq!(second.mean, 30.0);
}
