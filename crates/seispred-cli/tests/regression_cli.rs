use seispred_core::distributed::{PredictionTask, TaskEnvelope};
use seispred_core::domain::{
    AttributeSet, GeoAttribute, GeoVector, Receiver, RequestRecord, SeismicPhase, Source,
};
use seispred_core::predictors::table::{PhaseTable, TravelTimeTableFile};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_seispred"))
}

fn write_model(path: &Path) {
    let distances: Vec<f64> = (0..=30).map(|step| step as f64).collect();
    let depths = vec![0.0, 100.0, 400.0];
    let travel_times = depths
        .iter()
        .map(|depth| {
            distances
                .iter()
                .map(|distance| 13.7 * distance + 0.08 * depth)
                .collect()
        })
        .collect();
    let file = TravelTimeTableFile {
        model_name: "cli-model".to_string(),
        phases: vec![PhaseTable {
            phase: SeismicPhase::Pn,
            distances_deg: distances,
            depths_km: depths,
            travel_times,
        }],
    };
    fs::write(
        path,
        serde_json::to_string(&file).expect("model should serialize"),
    )
    .expect("model file should write");
}

fn sample_requests(count: usize) -> Vec<RequestRecord> {
    (0..count)
        .map(|index| {
            RequestRecord::new(
                Source::new(index as i64, 1, GeoVector::new(0.0, index as f64, 30.0), 1.0e9),
                Receiver::new(1, "MKAR", GeoVector::new(0.0, 14.0, 0.0), 0.0, 1.0e10),
                SeismicPhase::Pn,
                AttributeSet::of(&[GeoAttribute::TravelTime, GeoAttribute::Distance]),
                true,
            )
            .with_observation_id(index as i64)
        })
        .collect()
}

#[test]
fn predict_command_writes_an_ordered_report() {
    let temp = TempDir::new().expect("tempdir should be created");
    let model_path = temp.path().join("model.json");
    let batch_path = temp.path().join("batch.json");
    let report_path = temp.path().join("out/report.json");
    write_model(&model_path);
    fs::write(
        &batch_path,
        serde_json::to_string(&sample_requests(8)).expect("batch should serialize"),
    )
    .expect("batch file should write");

    let output = binary()
        .arg("predict")
        .arg("--batch")
        .arg(&batch_path)
        .arg("--model")
        .arg(&model_path)
        .arg("--report")
        .arg(&report_path)
        .output()
        .expect("predict command should run");

    assert!(
        output.status.success(),
        "predict should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_str(
        &fs::read_to_string(&report_path).expect("report should be readable"),
    )
    .expect("report should parse");

    assert_eq!(report["model_name"], "cli-model");
    assert_eq!(report["predictor_name"], "tabular");
    assert_eq!(report["request_count"], 8);
    assert_eq!(report["valid_count"], 8);
    assert_eq!(report["error_count"], 0);

    let results = report["results"].as_array().expect("results should be an array");
    assert_eq!(results.len(), 8);
    for (index, result) in results.iter().enumerate() {
        assert_eq!(result["observation_id"], index as i64);
    }
}

#[test]
fn predict_command_fails_usage_without_required_arguments() {
    let output = binary()
        .arg("predict")
        .output()
        .expect("predict command should run");
    assert!(!output.status.success());
}

#[test]
fn predict_command_maps_missing_batch_to_io_exit_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    let model_path = temp.path().join("model.json");
    write_model(&model_path);

    let output = binary()
        .arg("predict")
        .arg("--batch")
        .arg(temp.path().join("absent.json"))
        .arg("--model")
        .arg(&model_path)
        .output()
        .expect("predict command should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("IO.BATCH_READ"));
}

#[test]
fn task_command_executes_an_envelope_end_to_end() {
    let temp = TempDir::new().expect("tempdir should be created");
    let model_path = temp.path().join("model.json");
    let task_path = temp.path().join("task.json");
    let output_path = temp.path().join("envelope.json");
    write_model(&model_path);

    let task = PredictionTask::new(
        sample_requests(4),
        model_path.to_string_lossy().to_string(),
    );
    fs::write(
        &task_path,
        serde_json::to_string(&task).expect("task should serialize"),
    )
    .expect("task file should write");

    let output = binary()
        .arg("task")
        .arg("--task")
        .arg(&task_path)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("task command should run");

    assert!(
        output.status.success(),
        "task should exit 0: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let envelope: TaskEnvelope = serde_json::from_str(
        &fs::read_to_string(&output_path).expect("envelope should be readable"),
    )
    .expect("envelope should parse");
    assert!(envelope.exception.is_none());
    assert_eq!(envelope.results.len(), 4);
}

#[test]
fn task_command_is_fatal_when_the_model_cannot_load() {
    let temp = TempDir::new().expect("tempdir should be created");
    let task_path = temp.path().join("task.json");
    let output_path = temp.path().join("envelope.json");

    let task = PredictionTask::new(
        sample_requests(2),
        temp.path().join("absent-model.json").to_string_lossy().to_string(),
    );
    fs::write(
        &task_path,
        serde_json::to_string(&task).expect("task should serialize"),
    )
    .expect("task file should write");

    let output = binary()
        .arg("task")
        .arg("--task")
        .arg(&task_path)
        .arg("--output")
        .arg(&output_path)
        .output()
        .expect("task command should run");

    // The envelope is still written, then the worker exits nonzero.
    assert_eq!(output.status.code(), Some(3));
    let envelope: TaskEnvelope = serde_json::from_str(
        &fs::read_to_string(&output_path).expect("envelope should be readable"),
    )
    .expect("envelope should parse");
    assert!(envelope.results.is_empty());
    assert!(envelope.exception.is_some());
}

#[test]
fn support_command_lists_claims_and_attributes() {
    let temp = TempDir::new().expect("tempdir should be created");
    let model_path = temp.path().join("model.json");
    write_model(&model_path);

    let output = binary()
        .arg("support")
        .arg("--model")
        .arg(&model_path)
        .output()
        .expect("support command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("model 'cli-model'"));
    assert!(stdout.contains("TRAVEL_TIME"));
    assert!(stdout.contains("phase:Pn"));
}
