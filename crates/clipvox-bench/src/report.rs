use std::path::Path;

use crate::runner::BenchmarkResult;

/// A complete report containing results from all scenes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub backend: String,
    pub results: Vec<BenchmarkResult>,
}

/// Load a report from a JSON file. Returns None if the file doesn't exist.
pub fn load_report(path: &Path) -> Option<Report> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save a report to a JSON file.
pub fn save_report(path: &Path, report: &Report) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// A counter that changed between a previous report and the current run.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterDrift {
    pub scene_name: String,
    pub policy: String,
    pub counter: &'static str,
    pub previous: f64,
    pub current: f64,
}

fn counters(r: &BenchmarkResult) -> [(&'static str, f64); 7] {
    [
        ("storage_units", r.storage_units as f64),
        ("buffer_reallocations", r.buffer_reallocations as f64),
        ("texture_sets_created", r.texture_sets_created as f64),
        ("voxelization_passes", r.voxelization_passes as f64),
        ("compaction_dispatches", r.compaction_dispatches as f64),
        ("downsample_dispatches", r.downsample_dispatches as f64),
        ("cleared_mwords", r.cleared_mwords),
    ]
}

/// Compare the deterministic counters of the current run against a previous
/// report. Only runs with the same scene, policy and frame count are compared;
/// CPU timings are ignored.
pub fn compare(current: &[BenchmarkResult], previous: &Report) -> Vec<CounterDrift> {
    let mut drifts = Vec::new();

    for result in current {
        let Some(base) = previous.results.iter().find(|b| {
            b.scene_name == result.scene_name && b.policy == result.policy && b.frames == result.frames
        }) else {
            continue;
        };
        for ((counter, now), (_, before)) in counters(result).into_iter().zip(counters(base)) {
            if (now - before).abs() > 1e-9 {
                drifts.push(CounterDrift {
                    scene_name: result.scene_name.clone(),
                    policy: result.policy.clone(),
                    counter,
                    previous: before,
                    current: now,
                });
            }
        }
    }

    drifts
}

/// Format a comparison summary listing every drifted counter.
pub fn format_comparison(drifts: &[CounterDrift]) -> String {
    if drifts.is_empty() {
        return "All counters match the previous report.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("COUNTER DRIFT ({} changes):\n", drifts.len()));
    for d in drifts {
        out.push_str(&format!(
            "  - {} [{}] {}: {} -> {}\n",
            d.scene_name, d.policy, d.counter, d.previous, d.current
        ));
    }
    out
}

/// Format results as a markdown summary table.
pub fn format_markdown(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    out.push_str("| Scene | Policy | Cascades | Mips | Words/voxel | Buffer (MB) | Reallocs | Texture sets | Passes | Compactions | Downsamples | Cleared (Mwords) | Skipped | CPU (us/frame) |\n");
    out.push_str("|-------|--------|----------|------|-------------|-------------|----------|--------------|--------|-------------|-------------|------------------|---------|----------------|\n");

    for r in results {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.1} | {} | {} | {} | {} | {} | {:.2} | {} | {:.1} |\n",
            r.scene_name,
            r.policy,
            r.cascade_count,
            r.mip_count,
            r.storage_units,
            r.fragment_mb,
            r.buffer_reallocations,
            r.texture_sets_created,
            r.voxelization_passes,
            r.compaction_dispatches,
            r.downsample_dispatches,
            r.cleared_mwords,
            r.skipped_frames,
            r.mean_cpu_us,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str) -> BenchmarkResult {
        BenchmarkResult {
            scene_name: name.to_string(),
            policy: "single".to_string(),
            frames: 10,
            cascade_count: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_markdown_has_row_per_result() {
        let table = format_markdown(&[result("a"), result("b")]);
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("| a | single | 3 |"));
    }

    #[test]
    fn test_report_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("clipvox-report-{}.json", std::process::id()));
        let report = Report {
            timestamp: "t".to_string(),
            backend: "counting".to_string(),
            results: vec![result("scene")],
        };
        save_report(&path, &report).expect("save");
        let loaded = load_report(&path).expect("load");
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].scene_name, "scene");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_compare_reports_changed_counters_only() {
        let mut before = result("a");
        before.compaction_dispatches = 9;
        before.mean_cpu_us = 10.0;
        let previous = Report {
            timestamp: "t".to_string(),
            backend: "counting".to_string(),
            results: vec![before.clone(), result("b")],
        };

        let mut now = before.clone();
        now.compaction_dispatches = 12;
        now.mean_cpu_us = 50.0;
        let mut other_policy = result("b");
        other_policy.policy = "multi".to_string();
        other_policy.voxelization_passes = 99;

        let drifts = compare(&[now, other_policy, result("b")], &previous);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].scene_name, "a");
        assert_eq!(drifts[0].counter, "compaction_dispatches");
        assert_eq!((drifts[0].previous, drifts[0].current), (9.0, 12.0));

        let text = format_comparison(&drifts);
        assert!(text.contains("a [single] compaction_dispatches: 9 -> 12"));
        assert!(format_comparison(&[]).contains("All counters match"));
    }

    #[test]
    fn test_missing_report_is_none() {
        assert!(load_report(Path::new("/nonexistent/clipvox/report.json")).is_none());
    }
}
