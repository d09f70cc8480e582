use ndarray::{Array2, Array3};
use popfit_cli::{evaluate_files, merge_records, parse_params, record_files, resolve_config, write_record};
use popfit_core::{CostReport, EvaluationStatus, Trajectory};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OBSERVATIONS: &str = "\
object_annotation_category,spec,month,total_lipids_ugC,fullness_ratio_carbon_volume
Calanus glacialis CVstage,C. glacialis,8,4.0,0.04
Calanus glacialis CVstage,C. glacialis,8,6.0,0.06
Calanus glacialis female,C. glacialis,8,5.0,0.05
Calanus glacialis female,C. glacialis,8,5.5,
";

/// 13 daily steps from day 225, two individuals that pass C4 around step
/// 10 and reproduced.
fn trajectory(reserves: f64) -> Trajectory {
    let (steps, ni) = (13, 2);
    let development = Array3::from_shape_fn((steps, ni, 1), |(t, _, _)| 0.1 * t as f64);
    let reserve = Array3::from_shape_fn((steps, ni, 1), |(_, i, _)| reserves + i as f64);
    let weight = Array3::from_elem((steps, ni, 1), 100.0);
    let day = Array3::from_shape_fn((steps, ni, 1), |(t, _, _)| 225.0 + t as f64);
    let repro = Array2::from_elem((ni, 1), 10.0);
    let fitness = Array2::from_elem((ni, 1), 1.0);
    Trajectory::new(development, reserve, weight, day, repro, fitness).unwrap()
}

fn write_inputs(dir: &Path, reserves: f64) -> (PathBuf, PathBuf) {
    let traj_path = dir.join("trajectory.json");
    let obs_path = dir.join("observations.csv");
    fs::write(&traj_path, serde_json::to_string(&trajectory(reserves)).unwrap()).unwrap();
    fs::write(&obs_path, OBSERVATIONS).unwrap();
    (traj_path, obs_path)
}

#[test]
fn test_evaluate_files_pooled_preset() {
    let dir = TempDir::new().unwrap();
    let (traj, obs) = write_inputs(dir.path(), 5.0);
    let config = resolve_config("pooled_august").unwrap();
    let params = parse_params(&["I0=0.39".to_string()]).unwrap();

    let record = evaluate_files(config, &traj, &obs, &params).unwrap();
    assert_eq!(record.status, EvaluationStatus::Evaluated);
    assert_eq!(record.mask, Some(2));
    assert_eq!(record.params["I0"], 0.39);
    let Some(CostReport::Pooled(report)) = &record.costs else {
        panic!("expected pooled costs");
    };
    assert_eq!(report.individuals, 2);
    assert!(report.costs.total.is_finite());
}

#[test]
fn test_missing_reserves_recorded_as_not_viable() {
    let dir = TempDir::new().unwrap();
    let (traj, obs) = write_inputs(dir.path(), f64::NAN);
    let config = resolve_config("pooled_august").unwrap();

    let record = evaluate_files(config, &traj, &obs, &Default::default()).unwrap();
    assert_eq!(record.status, EvaluationStatus::NoViableIndividuals);
    assert_eq!(record.mask, None);
    assert!(record.costs.is_none());
}

#[test]
fn test_records_written_and_merged() {
    let inputs = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    for (i0, reserves) in [(0.39, 5.0), (0.41, f64::NAN)] {
        let (traj, obs) = write_inputs(inputs.path(), reserves);
        let params = parse_params(&[format!("I0={}", i0)]).unwrap();
        let config = resolve_config("pooled_august").unwrap();
        let record = evaluate_files(config, &traj, &obs, &params).unwrap();
        write_record(out.path(), &record).unwrap();
    }
    fs::write(out.path().join("notes.json"), "{}").unwrap();

    let files = record_files(out.path()).unwrap();
    assert_eq!(files.len(), 2);

    let (merged, skipped) = merge_records(&files).unwrap();
    assert_eq!(skipped, 0);
    assert_eq!(merged.rows, 2);

    let i0 = merged.column("I0").unwrap();
    assert!(i0.contains(&Value::from(0.39)) && i0.contains(&Value::from(0.41)));
    let total = merged.column("total").unwrap();
    assert_eq!(total.iter().filter(|v| v.is_null()).count(), 1);
    assert!(merged.column("lipids_bin_edges").unwrap().iter().any(Value::is_array));

    let csv_path = out.path().join("merged.csv");
    merged.write_csv(&csv_path).unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("source,"));
    assert!(header.contains("total"));
    assert_eq!(csv.lines().count(), 3);
}

#[test]
fn test_unknown_config_is_an_error() {
    assert!(resolve_config("no_such_preset_or_file.yaml").is_err());
    assert!(parse_params(&["I0".to_string()]).is_err());
    assert!(parse_params(&["I0=abc".to_string()]).is_err());
}
