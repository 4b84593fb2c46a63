//! Integration tests for the end-to-end pipeline: loading, recipe, report, CLI

use clap::Parser;
use lasso_sweep::cli::{cmd_run, Cli, Commands};
use lasso_sweep::data::load_frame;
use lasso_sweep::prelude::*;
use polars::prelude::*;
use std::io::Write;
use tempfile::tempdir;

fn write_csv(path: &std::path::Path, n_rows: usize) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "age,dose,site,noise,response").unwrap();
    for i in 0..n_rows {
        let age = 20 + (i * 7) % 50;
        let dose = if i % 13 == 0 { String::new() } else { format!("{:.1}", ((i * 3) % 10) as f64 * 0.5) };
        let site = ["north", "south", "east"][i % 3];
        let noise = ((i * 37) % 17) as f64 / 17.0;
        let site_effect = if site == "south" { 4.0 } else { 0.0 };
        let response = 0.5 * age as f64 + site_effect + 0.01 * noise;
        writeln!(file, "{},{},{},{:.4},{:.4}", age, dose, site, noise, response).unwrap();
    }
}

#[test]
fn test_pipeline_from_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trial.csv");
    write_csv(&path, 120);

    let df = load_frame(&path).unwrap();
    assert_eq!(df.height(), 120);

    let config = SweepConfig::new()
        .with_grid(1e-4, 1.0, 8)
        .with_folds(4)
        .with_workers(2)
        .with_seed(3);
    let report = SweepPipeline::new(config).unwrap().run_frame(&df, "response").unwrap();

    assert_eq!(report.n_train, 96);
    assert_eq!(report.n_test, 24);
    assert_eq!(report.n_folds, 4);
    assert_eq!(report.aggregates.len() + report.excluded.len(), 8);
    assert!(report.test_score.is_finite());

    let fit = &report.selected.fit;
    assert!(fit.coefficient("site_south").unwrap() > 2.0);
    assert!(fit.coefficient("site").is_none());
    assert!((fit.coefficient("age").unwrap() - 0.5).abs() < 0.05);
    assert_eq!(report.importance[0].feature, "age");
}

#[test]
fn test_pipeline_drops_missing_targets() {
    let df = df! {
        "x" => (0..40).map(|i| i as f64).collect::<Vec<_>>(),
        "y" => (0..40).map(|i| if i % 10 == 0 { None } else { Some(2.0 * i as f64) }).collect::<Vec<_>>(),
    }
    .unwrap();

    let config = SweepConfig::new().with_grid(1e-3, 0.1, 3).with_workers(1);
    let report = SweepPipeline::new(config).unwrap().run_frame(&df, "y").unwrap();
    assert_eq!(report.n_train + report.n_test, 36);
}

#[test]
fn test_fold_recipe_learns_from_training_rows_only() {
    let n = 50;
    let x: Vec<Option<f64>> = (0..n).map(|i| if i % 6 == 0 { None } else { Some((i % 7) as f64) }).collect();
    let z: Vec<f64> = (0..n).map(|i| ((i * 3) % 11) as f64).collect();
    let y: Vec<f64> = (0..n).map(|i| 2.0 * x[i].unwrap_or(3.0) - z[i]).collect();
    let df = df!("x" => x.clone(), "z" => z.clone(), "y" => y.clone()).unwrap();

    let config = SweepConfig::new().with_steps(vec![Step::ImputeMean, Step::Normalize]);
    let pipeline = SweepPipeline::new(config).unwrap();
    let folds = CrossValidator::new(5).with_random_state(8).make_frame_folds(&df).unwrap();

    for fold in &folds {
        let row = *fold.validation_indices.iter().find(|&&r| x[r].is_some()).unwrap();
        let mut outlier_x = x.clone();
        outlier_x[row] = Some(1e4);
        let outlier = df!("x" => outlier_x, "z" => z.clone(), "y" => y.clone()).unwrap();

        let (train, valid) = pipeline.prepare_fold(&df, "y", fold).unwrap();
        let (outlier_train, outlier_valid) = pipeline.prepare_fold(&outlier, "y", fold).unwrap();
        assert_eq!(train.features(), outlier_train.features());
        assert_ne!(valid.features(), outlier_valid.features());

        let fit = LassoRegression::new(0.01).fit(&train).unwrap();
        let outlier_fit = LassoRegression::new(0.01).fit(&outlier_train).unwrap();
        assert_eq!(fit.coefficients(), outlier_fit.coefficients());
        assert_eq!(fit.intercept(), outlier_fit.intercept());
    }
}

#[test]
fn test_stratified_pipeline_on_dataset() {
    let n = 100;
    let x = ndarray::Array2::from_shape_fn((n, 3), |(i, j)| ((i * (j + 2)) % 11) as f64);
    let y = ndarray::Array1::from_shape_fn(n, |i| x[[i, 0]] * 1.5 - x[[i, 2]]);
    let ds = Dataset::new(vec!["a".into(), "b".into(), "c".into()], "y", x, y).unwrap();

    let config = SweepConfig::new()
        .with_grid(1e-3, 1.0, 5)
        .with_split_strata("y", 4)
        .with_cv_strata("y", 2)
        .with_repeats(2)
        .with_selection(SelectionRule::OneStdErr)
        .with_workers(2);
    let report = SweepPipeline::new(config).unwrap().run(&ds).unwrap();

    assert_eq!(report.n_train, 80);
    assert_eq!(report.n_folds, 10);
    assert_eq!(report.selection, SelectionRule::OneStdErr);
    assert!(report.test_score < 1.0);
}

#[test]
fn test_cli_run_writes_report() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("trial.csv");
    let output = dir.path().join("report.json");
    write_csv(&data, 80);

    let cli = Cli::try_parse_from([
        "lasso-sweep",
        "run",
        "--data",
        data.to_str().unwrap(),
        "--target",
        "response",
        "--grid-count",
        "5",
        "--workers",
        "2",
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    let report = cmd_run(&args).unwrap();

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved["n_train"], report.n_train);
    assert_eq!(saved["aggregates"].as_array().unwrap().len(), report.aggregates.len());
    assert_eq!(saved["selected"]["point"]["index"], report.selected.point.index);
}

#[test]
fn test_cli_config_file() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("trial.csv");
    let config_path = dir.path().join("sweep.json");
    write_csv(&data, 60);
    SweepConfig::new()
        .with_grid(1e-3, 1.0, 4)
        .with_folds(3)
        .with_metric(Metric::Mae)
        .save(&config_path)
        .unwrap();

    let cli = Cli::try_parse_from([
        "lasso-sweep",
        "run",
        "-d",
        data.to_str().unwrap(),
        "-t",
        "response",
        "-c",
        config_path.to_str().unwrap(),
        "--workers",
        "1",
    ])
    .unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    let report = cmd_run(&args).unwrap();
    assert_eq!(report.metric, Metric::Mae);
    assert_eq!(report.n_folds, 3);
    assert_eq!(report.aggregates.len() + report.excluded.len(), 4);
}
