//! Integration tests for the `run` command.
mod common;
use common::{get_model_dir, quiet};
use powermatch::cli::{RunOpts, handle_run_command};
use powermatch::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    quiet();

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
        debug_model: true,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
    for file_name in [
        "summary.csv",
        "analysis.csv",
        "debug_hourly.csv",
        "powermatch_info.log",
        "powermatch_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // The folder now has results in it
    assert!(handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).is_err());

    let opts = RunOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
    assert!(output_dir.join("summary.csv").is_file());
}
