use std::{fs, path::PathBuf};

use serde_json::Value;
use tempfile::tempdir;

use threatflow_cli::{Args, run};

/// Collects all .json files from a directory
fn collect_json_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json")
            })
            .collect()
    } else {
        Vec::new()
    };

    files.sort();
    files
}

fn demos_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let valid_demos = collect_json_files(demos_dir());
    assert!(!valid_demos.is_empty(), "No demos found in demos/");

    let mut failed_demos = Vec::new();

    for demo_path in &valid_demos {
        let output_filename = format!(
            "{}.stix.json",
            demo_path.file_stem().unwrap().to_string_lossy()
        );
        let output_path = temp_dir.path().join(output_filename);

        let args = Args {
            input: demo_path.to_string_lossy().to_string(),
            output: Some(output_path.to_string_lossy().to_string()),
            config: None,
            log_level: "off".to_string(),
        };

        if let Err(e) = run(&args) {
            failed_demos.push((demo_path.clone(), e));
            continue;
        }

        let text = fs::read_to_string(&output_path).expect("Output file was not written");
        let bundle: Value = serde_json::from_str(&text).expect("Output is not valid JSON");
        assert_eq!(bundle["type"], "bundle", "{}", demo_path.display());
    }

    if !failed_demos.is_empty() {
        eprintln!("\nValid demos that failed:");
        for (path, err) in &failed_demos {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} valid demo(s) failed unexpectedly", failed_demos.len());
    }

    println!("✅ All {} valid demos passed", valid_demos.len());
}

#[test]
fn e2e_smoke_test_error_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");

    let error_demos = collect_json_files(demos_dir().join("errors"));
    assert!(
        !error_demos.is_empty(),
        "No error demos found in demos/errors/"
    );

    let mut unexpectedly_succeeded = Vec::new();

    for demo_path in &error_demos {
        let output_filename = format!(
            "error_{}.stix.json",
            demo_path.file_stem().unwrap().to_string_lossy()
        );
        let output_path = temp_dir.path().join(output_filename);

        let args = Args {
            input: demo_path.to_string_lossy().to_string(),
            output: Some(output_path.to_string_lossy().to_string()),
            config: None,
            log_level: "off".to_string(),
        };

        if run(&args).is_ok() {
            unexpectedly_succeeded.push(demo_path.clone());
        }
        assert!(!output_path.exists(), "{}", demo_path.display());
    }

    if !unexpectedly_succeeded.is_empty() {
        eprintln!("\nError demos that unexpectedly succeeded:");
        for path in &unexpectedly_succeeded {
            eprintln!("  - {}", path.display());
        }
        panic!(
            "{} error demo(s) succeeded unexpectedly",
            unexpectedly_succeeded.len()
        );
    }

    println!(
        "✅ All {} error demos failed as expected",
        error_demos.len()
    );
}

#[test]
fn e2e_default_output_path() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let input = temp_dir.path().join("phishing.json");
    fs::copy(demos_dir().join("phishing_intrusion.json"), &input).unwrap();

    let args = Args {
        input: input.to_string_lossy().to_string(),
        output: None,
        config: None,
        log_level: "off".to_string(),
    };
    run(&args).unwrap();

    assert!(temp_dir.path().join("phishing.stix.json").is_file());
}

#[test]
fn e2e_config_controls_output() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[publish]\npretty = false\n").unwrap();
    let output_path = temp_dir.path().join("edge.stix.json");

    let args = Args {
        input: demos_dir()
            .join("edge_exploitation.json")
            .to_string_lossy()
            .to_string(),
        output: Some(output_path.to_string_lossy().to_string()),
        config: Some(config_path.to_string_lossy().to_string()),
        log_level: "off".to_string(),
    };
    run(&args).unwrap();

    let text = fs::read_to_string(&output_path).unwrap();
    assert!(!text.trim_end().contains('\n'));
}
