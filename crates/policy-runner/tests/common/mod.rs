use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;

#[allow(dead_code)]
pub fn setup_command(path: &Path) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("policy-runner");
    cmd.current_dir(path);

    cmd
}

#[allow(dead_code)]
pub fn test_data(path: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(path)
        .to_string_lossy()
        .to_string()
}
