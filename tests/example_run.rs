//! Integration tests for the `example run` command.
use reservoir_supply::cli::RunOpts;
use reservoir_supply::cli::example::handle_example_run_command;
use reservoir_supply::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("RESERVOIR_SUPPLY_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    handle_example_run_command("simple", &opts, Some(Settings::default())).unwrap();
    assert!(tempdir.path().join("metadata.toml").is_file());

    // Unknown examples are rejected
    assert!(handle_example_run_command("missing", &opts, Some(Settings::default())).is_err());
}
