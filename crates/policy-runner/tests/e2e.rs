use std::fs;

use common::{setup_command, test_data};
use predicates::{prelude::*, str::contains};
use rstest::rstest;
use tempfile::tempdir;

mod common;

#[test]
fn test_policies() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("policies");

    cmd.assert().success();
    cmd.assert()
        .stdout("annotations\ncontainer-resources\nflexvolume-drivers\nlabels\npod-ndots\nselinux\n");
}

#[rstest]
#[case::allowed_driver("pod_with_allowed_flexvolume.json", true)]
#[case::unknown_driver("pod_with_unknown_flexvolume.json", false)]
#[case::no_flexvolume("pod_without_volumes.json", true)]
fn test_run_flexvolume_drivers(#[case] request: &str, #[case] allowed: bool) {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("flexvolume-drivers")
        .arg("--request-path")
        .arg(test_data(request))
        .arg("--settings-path")
        .arg(test_data("flexvolume_settings.yaml"));

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(format!(r#""allowed":{allowed}"#)))
        .stdout(contains("patchType").not());
}

#[test]
fn test_run_flexvolume_drivers_rejection_message() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("-p")
        .arg("flexvolume-drivers")
        .arg("-r")
        .arg(test_data("pod_with_unknown_flexvolume.json"))
        .arg("-s")
        .arg(test_data("flexvolume_settings.yaml"));

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""uid":"8ab2c1d5-0002""#))
        .stdout(contains("flexVolume driver 'example.com/lvm' is not in the allowed list"));
}

#[rstest]
#[case::required_label_missing(r#"{"criteria": "containsAnyOf", "values": ["app"]}"#, false)]
#[case::forbidden_label_absent(r#"{"criteria": "doesNotContainAnyOf", "values": ["app"]}"#, true)]
fn test_run_labels(#[case] settings: &str, #[case] allowed: bool) {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("labels")
        .arg("--request-path")
        .arg(test_data("pod_without_volumes.json"))
        .arg("--settings-json")
        .arg(settings);

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(format!(r#""allowed":{allowed}"#)))
        .stdout(contains(r#""uid":"8ab2c1d5-0003""#));
}

#[test]
fn test_run_selinux_mutates() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("selinux")
        .arg("--request-path")
        .arg(test_data("pod_without_volumes.json"))
        .arg("--settings-path")
        .arg(test_data("selinux_settings.yaml"));

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":true"#))
        .stdout(contains(r#""patchType":"JSONPatch""#));
}

#[test]
fn test_run_selinux_conflict() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("selinux")
        .arg("--request-path")
        .arg(test_data("pod_with_conflicting_selinux_type.json"))
        .arg("--settings-json")
        .arg(r#"{"rule": "MustRunAs", "type": "container_t"}"#);

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":false"#))
        .stdout(contains("SELinux option 'type' is 'spc_t' on the pod, expected 'container_t'"))
        .stdout(contains("patch").not());
}

#[test]
fn test_run_selinux_without_settings() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("selinux")
        .arg("--request-path")
        .arg(test_data("pod_with_conflicting_selinux_type.json"));

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":true"#))
        .stdout(contains("patch").not());
}

#[test]
fn test_run_container_resources() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("container-resources")
        .arg("--request-path")
        .arg(test_data("pod_with_large_limits.json"))
        .arg("--settings-path")
        .arg(test_data("resources_settings.yaml"));

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":false"#))
        .stdout(contains(
            "container 'nginx': cpu limit '4' exceeds the maximum allowed '2'",
        ))
        .stdout(contains(
            "container 'nginx': memory limit '8Gi' exceeds the maximum allowed '1Gi'",
        ));
}

#[test]
fn test_run_pod_ndots_from_stdin() {
    let tempdir = tempdir().unwrap();
    let request = fs::read(test_data("pod_without_volumes.json")).unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("pod-ndots")
        .arg("--request-path")
        .arg("-")
        .write_stdin(request);

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":true"#))
        .stdout(contains(r#""patchType":"JSONPatch""#));
}

#[test]
fn test_run_invalid_settings_fail_closed() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("selinux")
        .arg("--request-path")
        .arg(test_data("pod_without_volumes.json"))
        .arg("--settings-json")
        .arg(r#"{"rule": "MustRunAs"}"#);

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":false"#))
        .stdout(contains(r#""code":400"#));
}

#[test]
fn test_run_malformed_request() {
    let tempdir = tempdir().unwrap();
    let request = tempdir.path().join("request.json");
    fs::write(&request, "{ not json").unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("pod-ndots")
        .arg("--request-path")
        .arg(&request);

    cmd.assert().success();
    cmd.assert()
        .stdout(contains(r#""allowed":false"#))
        .stdout(contains(r#""code":400"#));
}

#[test]
fn test_run_missing_request_file() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("pod-ndots")
        .arg("--request-path")
        .arg("missing.json");

    cmd.assert().failure();
    cmd.assert()
        .stdout(predicates::str::is_empty())
        .stderr(contains("cannot read request file missing.json"));
}

#[test]
fn test_run_unknown_policy() {
    let tempdir = tempdir().unwrap();

    let mut cmd = setup_command(tempdir.path());
    cmd.arg("run")
        .arg("--policy")
        .arg("psp-apparmor")
        .arg("--request-path")
        .arg(test_data("pod_without_volumes.json"));

    cmd.assert().failure();
}
