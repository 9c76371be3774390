use std::path::PathBuf;
use std::process;

use clipvox_bench::report;
use clipvox_bench::runner::{self, GpuRunner};
use clipvox_bench::scenes;
use clipvox_core::config::{load_config_from_str, StorageConfig};
use clipvox_core::types::UpdatePolicy;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut output_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut compare_path: Option<PathBuf> = None;
    let mut policies = vec![
        UpdatePolicy::SingleCascade,
        UpdatePolicy::AllCascadesWideDispatch,
        UpdatePolicy::AllCascadesMultiplePasses,
    ];
    let mut frame_count = 120u32;
    let mut use_gpu = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                output_path = args.get(i).map(PathBuf::from);
            }
            "--compare" => {
                i += 1;
                compare_path = args.get(i).map(PathBuf::from);
            }
            "--config" => {
                i += 1;
                config_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                frame_count = match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(n) => n,
                    None => {
                        eprintln!("invalid --frames value");
                        process::exit(1);
                    }
                };
            }
            "--policy" => {
                i += 1;
                let value = args.get(i).map(String::as_str).unwrap_or("");
                if value != "all" {
                    match runner::parse_policy(value) {
                        Some(policy) => policies = vec![policy],
                        None => {
                            eprintln!("invalid --policy value: {value}");
                            process::exit(1);
                        }
                    }
                }
            }
            "--gpu" => use_gpu = true,
            "--help" | "-h" => {
                eprintln!("Usage: bench-runner [OPTIONS]");
                eprintln!("  --frames <n>        Frames per scene (default: 120)");
                eprintln!("  --policy <name>     single | wide | multi | all (default: all)");
                eprintln!("  --config <path>     Storage config in RON");
                eprintln!("  --output <path>     Save results as JSON");
                eprintln!("  --compare <path>    Compare counters against a saved JSON report");
                eprintln!("  --gpu               Run through the wgpu backend instead of the counting device");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let storage_config = match config_path {
        Some(ref path) => {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("failed to read {}: {e}", path.display());
                    process::exit(1);
                }
            };
            match load_config_from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    process::exit(1);
                }
            }
        }
        None => StorageConfig::default(),
    };

    let mut gpu = if use_gpu {
        log::info!("Initializing GPU...");
        match GpuRunner::new() {
            Ok(runner) => Some(runner),
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        None
    };

    let scene_configs = scenes::standard_scenes();
    let mut results = Vec::new();
    for policy in &policies {
        for config in &scene_configs {
            let result = match gpu.as_mut() {
                Some(runner) => match runner.run_scene(config, &storage_config, *policy, frame_count) {
                    Ok(result) => result,
                    Err(e) => {
                        log::error!("scene '{}' failed: {e}", config.name);
                        continue;
                    }
                },
                None => runner::run_scene(config, &storage_config, *policy, frame_count),
            };
            results.push(result);
        }
    }

    println!("\n## Clipmap Storage Results\n");
    println!("{}", report::format_markdown(&results));

    let mut drifted = false;
    if let Some(ref path) = compare_path {
        match report::load_report(path) {
            Some(previous) => {
                let drifts = report::compare(&results, &previous);
                println!("{}", report::format_comparison(&drifts));
                drifted = !drifts.is_empty();
            }
            None => log::warn!("No previous report found at {}", path.display()),
        }
    }

    if let Some(ref path) = output_path {
        let report = report::Report {
            timestamp: format!("bench-{}", process::id()),
            backend: if use_gpu { "wgpu" } else { "counting" }.to_string(),
            results,
        };
        if let Err(e) = report::save_report(path, &report) {
            eprintln!("failed to save report: {e}");
            process::exit(1);
        }
        log::info!("Saved report to {}", path.display());
    }

    log::info!("Benchmark complete.");
    if drifted {
        process::exit(1);
    }
}
