use chrono::{TimeZone, Utc};
use road_stability::config::ReportRequest;
use road_stability::error::StabilityError;
use road_stability::output::{LocalReportSink, persist_report};
use road_stability::pipeline::generate_report;
use road_stability::store::{LocalStore, StoreLayout};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("road_stability_it_{name}"));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();
    root
}

fn write_segment(dir: &Path, h3: &str, value: f64, grade: &str) {
    fs::create_dir_all(dir).unwrap();
    let doc = json!({"h3": h3, "normalizedMedian": value, "gradeAll": grade, "roadType": "residential"});
    fs::write(dir.join(format!("{h3}.json")), doc.to_string()).unwrap();
}

fn request(top_n: usize) -> ReportRequest {
    let now = Utc.with_ymd_and_hms(2024, 6, 10, 5, 0, 0).unwrap();
    ReportRequest::new(Some("oslo"), Some("2024-06-10"), top_n, 30, now).unwrap()
}

/// Today on the newest layout, compare day on a legacy one.
fn seed(root: &Path) {
    let today = root.join("cities/oslo/normalizedSegments/2024-06-10/segments");
    write_segment(&today, "abc", 0.8, "D");
    write_segment(&today, "def", 0.6, "B");
    write_segment(&today, "ghi", 0.9, "E");
    write_segment(&today, "jkl", 0.2, "A");
    write_segment(&today, "xyz", 0.4, "C");

    let compare = root.join("normalizedSegments/oslo_2024-06-03/segments");
    write_segment(&compare, "abc", 0.5, "C");
    write_segment(&compare, "def", 0.7, "C");
    write_segment(&compare, "jkl", 0.2, "A");

    let ts = request(1).cutoff_ms() + 60_000;
    let passes = [
        ("xyz", "A", 1.0),
        ("xyz", "A", 1.2),
        ("xyz", "B", 2.0),
        ("xyz", "C", 0.9),
        ("xyz", "C", 1.1),
        ("abc", "A", 3.0),
        ("abc", "B", 3.0),
        ("nowhere", "A", 7.0),
    ];
    let mut lines: Vec<String> = passes
        .iter()
        .map(|(h3, vehicle, metric)| {
            json!({
                "cityId": "oslo",
                "h3": h3,
                "vehicleHash": vehicle,
                "startTs": ts,
                "roughnessEnergySum": metric * 10.0,
                "sampleCount": 10,
            })
            .to_string()
        })
        .collect();
    lines.push("{ truncated".to_string());
    lines.push(json!({"cityId": "oslo", "vehicleHash": "A", "startTs": ts}).to_string());

    let passes_dir = root.join("vehiclePasses");
    fs::create_dir_all(&passes_dir).unwrap();
    fs::write(passes_dir.join("2024-06.ndjson"), lines.join("\n")).unwrap();
}

#[tokio::test]
async fn test_full_pipeline_over_local_export() {
    let root = temp_root("full");
    seed(&root);
    let store = LocalStore::new(&root);
    let layout = StoreLayout::default();

    let report = generate_report(&store, &layout, &request(50)).await.unwrap();

    assert_eq!(report.stats.total_segments_today, 5);
    assert_eq!(report.stats.total_segments_compare, 3);
    assert_eq!(report.stats.overlap_segments, 3);
    assert_eq!(
        report.sources.compare.as_deref(),
        Some("normalizedSegments/oslo_2024-06-03/segments")
    );

    let abc = report.worst_segments.iter().find(|w| w.h3 == "abc").unwrap();
    assert_eq!(abc.week_over_week_delta, Some(0.3));
    assert_eq!(abc.grade_changed, Some(true));
    assert_eq!(abc.previous_grade.as_deref(), Some("C"));

    // today-only segment is ranked but carries no comparison
    let ghi = &report.worst_segments[0];
    assert_eq!((ghi.rank, ghi.h3.as_str()), (1, "ghi"));
    assert_eq!(ghi.week_over_week_delta, None);
    assert_eq!(ghi.grade_changed, None);

    let wow = &report.stats.week_over_week;
    assert_eq!(wow.worsened_count, 1);
    assert_eq!(wow.improved_count, 1);
    assert!(wow.improved_count + wow.worsened_count <= wow.overlap);
    assert_eq!(wow.today_average, Some(0.58));

    let grades = &report.stats.grade_changes;
    assert_eq!(grades.overlap, 3);
    assert_eq!(grades.changed, 2);
    assert_eq!(grades.improved, 1);
    assert_eq!(grades.worsened, 1);

    let rep = &report.stats.repeatability;
    assert_eq!(rep.segment_count, 2);
    assert_eq!(report.repeatability_samples.best[0].h3, "abc");
    assert_eq!(report.repeatability_samples.best[0].score, Some(1.0));
    let xyz = &report.repeatability_samples.worst[0];
    assert_eq!(xyz.h3, "xyz");
    assert_eq!(xyz.vehicle_count, 3);
    assert!((xyz.score.unwrap() - 0.831793).abs() < 1e-6);

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_top_n_and_determinism() {
    let root = temp_root("topn");
    seed(&root);
    let store = LocalStore::new(&root);
    let layout = StoreLayout::default();

    let first = generate_report(&store, &layout, &request(2)).await.unwrap();
    let second = generate_report(&store, &layout, &request(2)).await.unwrap();

    assert_eq!(first.worst_segments.len(), 2);
    assert_eq!(first.worst_segments[0].rank, 1);
    assert_eq!(first.worst_segments[1].rank, 2);
    assert!(first.worst_segments[0].normalized_median > first.worst_segments[1].normalized_median);
    assert_eq!(first, second);

    fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn test_rerun_overwrites_same_document() {
    let root = temp_root("persist");
    seed(&root);
    let store = LocalStore::new(&root);
    let layout = StoreLayout::default();
    let sink = LocalReportSink::new(&root);
    let path = layout.report_path_for("oslo", request(5).date);

    let report = generate_report(&store, &layout, &request(5)).await.unwrap();
    let written = persist_report(&sink, &path, &report).await.unwrap();
    persist_report(&sink, &path, &report).await.unwrap();

    let stored: Value = serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
    assert_eq!(stored["date"], json!("2024-06-10"));
    assert_eq!(stored["compareDate"], json!("2024-06-03"));
    assert_eq!(stored["worstSegments"].as_array().unwrap().len(), 5);
    assert!(written.ends_with("cities/oslo/stabilityReports/2024-06-10.json"));

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_missing_city_is_rejected() {
    let err = ReportRequest::new(None, Some("2024-06-10"), 50, 30, Utc::now()).unwrap_err();
    assert!(matches!(err, StabilityError::Configuration(_)));
}

#[test]
fn test_cli_without_city_exits_non_zero_and_writes_nothing() {
    let root = temp_root("cli");

    let output = Command::new(env!("CARGO_BIN_EXE_road_stability"))
        .arg("--date=2024-06-10")
        .arg(format!("--data-dir={}", root.display()))
        .env("LOG_FILE_PATH", root.join("logs/run.log"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!root.join("cities").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_cli_usage_error_exits_one() {
    let root = temp_root("cli_usage");

    let output = Command::new(env!("CARGO_BIN_EXE_road_stability"))
        .arg("--cityId=oslo")
        .arg("--topN=abc")
        .arg(format!("--data-dir={}", root.display()))
        .env("LOG_FILE_PATH", root.join("logs/run.log"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
    assert!(!root.join("cities").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_cli_help_exits_zero() {
    let root = temp_root("cli_help");

    let output = Command::new(env!("CARGO_BIN_EXE_road_stability"))
        .arg("--help")
        .env("LOG_FILE_PATH", root.join("logs/run.log"))
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--cityId"));

    fs::remove_dir_all(&root).unwrap();
}
