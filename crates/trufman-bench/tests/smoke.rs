use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::tempdir;
use trufman_bench::config::MatchConfig;
use trufman_bench::runner::MatchRunner;

fn load_config(output_dir: &Path, rounds: usize) -> MatchConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
match:
  seed: 4242
  rounds: {rounds}
seats:
  - name: "learner"
    kind: "learning"
    params:
      rollouts: 12
      rollout_ceiling: 24
      exact_limit: 512
  - name: "east"
    kind: "baseline"
  - name: "learner_2"
    kind: "learning"
    params:
      rollouts: 12
      rollout_ceiling: 24
      exact_limit: 512
  - name: "west"
    kind: "baseline"
memory:
  enabled: true
  dir: "{memory}"
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  snapshot_json: "{snapshot}"
metrics:
  baseline: "east"
"#,
        memory = output_dir.join("memory").display(),
        jsonl = output_dir.join("rounds.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        snapshot = output_dir.join("snapshot.json").display(),
    );

    let mut cfg: MatchConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

fn normalized_hash(jsonl: &str) -> String {
    let mut normalized = String::new();
    for line in jsonl.lines() {
        let mut value: serde_json::Value = serde_json::from_str(line).expect("row decodes to JSON");
        if let Some(speed) = value.get_mut("speed_ms_turn") {
            *speed = serde_json::Value::from(0.0);
        }
        normalized.push_str(&serde_json::to_string(&value).expect("re-serialize normalized row"));
        normalized.push('\n');
    }
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

fn run_once(rounds: usize) -> (tempfile::TempDir, trufman_bench::runner::RunSummary) {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path(), rounds);
    let outputs = config.resolved_outputs();
    let runner = MatchRunner::new(config, outputs).expect("runner created");
    let summary = runner.run().expect("match completes");
    (dir, summary)
}

#[test]
fn same_seed_produces_identical_rows() {
    let (first_dir, first) = run_once(2);
    let (_second_dir, second) = run_once(2);

    assert_eq!(first.rounds_played, 2);
    assert!(!first.interrupted);
    assert_eq!(first.rows_written, 8);

    let first_rows = fs::read_to_string(&first.jsonl_path).expect("jsonl readable");
    let second_rows = fs::read_to_string(&second.jsonl_path).expect("jsonl readable");
    assert_eq!(normalized_hash(&first_rows), normalized_hash(&second_rows));

    let row: serde_json::Value =
        serde_json::from_str(first_rows.lines().next().expect("first row")).expect("json row");
    assert_eq!(row["run_id"], "test_smoke");
    assert_eq!(row["round_id"], "R00001");
    assert_eq!(row["seat"], "north");
    assert_eq!(row["agent"], "learner");

    assert!(first.summary_path.exists(), "summary markdown missing");
    let markdown = fs::read_to_string(&first.summary_path).expect("summary readable");
    assert!(markdown.contains("| learner |"));

    let snapshot = fs::read_to_string(first.snapshot_path.as_ref().expect("snapshot path"))
        .expect("snapshot readable");
    assert!(snapshot.contains("\"round_number\": 3"));

    // Both learning seats kept a record; baseline seats did not.
    let memory = first_dir.path().join("memory");
    assert!(memory.join("trufman_bot_memory_v1_seat_0.json").exists());
    assert!(memory.join("trufman_bot_memory_v1_seat_2.json").exists());
    assert!(!memory.join("trufman_bot_memory_v1_seat_1.json").exists());
    assert_eq!(first.persistence.expect("queue stats").failed, 0);
}

#[test]
fn totals_match_the_sum_of_deltas() {
    let (_dir, summary) = run_once(3);
    let rows = fs::read_to_string(&summary.jsonl_path).expect("jsonl readable");
    let mut sums = std::collections::HashMap::new();
    let mut last_total = std::collections::HashMap::new();
    for line in rows.lines() {
        let row: serde_json::Value = serde_json::from_str(line).expect("json row");
        let agent = row["agent"].as_str().expect("agent").to_string();
        *sums.entry(agent.clone()).or_insert(0i64) += row["delta"].as_i64().expect("delta");
        last_total.insert(agent, row["total"].as_i64().expect("total"));
    }
    assert_eq!(sums.len(), 4);
    assert_eq!(sums, last_total);
}

#[test]
fn raised_stop_flag_ends_the_run_before_any_round() {
    let dir = tempdir().expect("temp dir");
    let config = load_config(dir.path(), 5);
    let outputs = config.resolved_outputs();
    let runner = MatchRunner::new(config, outputs).expect("runner created");
    runner.stop_handle().cancel();

    let summary = runner.run().expect("run returns");
    assert!(summary.interrupted);
    assert_eq!(summary.rounds_played, 0);
    assert_eq!(summary.rows_written, 0);
    assert!(summary.summary_path.exists());
}
