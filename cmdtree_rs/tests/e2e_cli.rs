//! End-to-end tests for the `cmdt` binary.

mod common;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// `cmdt` with its cache and completion tree under `tmp`.
fn cmdt(tmp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("cmdt");
    cmd.env("CMDT_CACHE_DIR", tmp.path())
        .env_remove("CMDT_SNAPSHOT")
        .env_remove("CMDT_INVENTORY")
        .env_remove("_ARGCOMPLETE")
        .env("CMDT_LOG", "off");
    cmd
}

/// Completion request for `line` with newline-separated candidates.
fn complete(tmp: &TempDir, line: &str) -> Command {
    let mut cmd = cmdt(tmp);
    cmd.env("_ARGCOMPLETE", "1")
        .env("COMP_LINE", line)
        .env("COMP_POINT", line.len().to_string())
        .env("_ARGCOMPLETE_IFS", "\n");
    cmd
}

mod cli_basics {
    use super::*;

    #[test]
    fn shows_help() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("compute"))
            .stdout(predicate::str::contains("meta"));
    }

    #[test]
    fn shows_version() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn group_without_command_is_an_argument_error() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Command name argument expected."));
    }

    #[test]
    fn unknown_command_suggests() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instanses", "list"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Invalid choice: 'instanses'."))
            .stderr(predicate::str::contains("instances"));
    }
}

mod compute {
    use super::*;

    #[test]
    fn lists_zones_as_table() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "zones", "list"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("NAME    REGION    STATUS\n"))
            .stdout(predicate::str::contains("zone-3  region-2  UP"));
    }

    #[test]
    fn lists_instance_uris_in_a_zone() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "list", "--zone=zone-1", "--uri"])
            .assert()
            .success()
            .stdout(
                "https://compute.example.com/v1/projects/my-project/zones/zone-1/instances/instance-1\n\
                 https://compute.example.com/v1/projects/my-project/zones/zone-1/instances/instance-2\n",
            );
    }

    #[test]
    fn filter_and_unknown_project() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "list", "--filter", "*-3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("instance-3"))
            .stdout(predicate::str::contains("instance-1").not());

        cmdt(&tmp)
            .args(["compute", "zones", "list", "--project", "other"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "HTTPError 404: The resource 'projects/other' was not found",
            ));
    }

    #[test]
    fn describes_instance_as_json() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "describe", "instance-3", "--zone", "zone-3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"TERMINATED\""))
            .stdout(predicate::str::contains("\"machineType\""));
    }

    #[test]
    fn missing_required_flag_prints_usage() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "describe", "instance-1"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains(
                "ERROR: (cmdt.compute.instances.describe) argument --zone: Must be specified.",
            ))
            .stderr(predicate::str::contains("Usage: cmdt compute instances describe"));
    }

    #[test]
    fn creates_instance_with_typed_flags() {
        let tmp = TempDir::new().unwrap();
        let metadata = tmp.path().join("metadata.json");
        std::fs::write(&metadata, r#"{"startup-script": "echo hi"}"#).unwrap();
        cmdt(&tmp)
            .args([
                "compute",
                "instances",
                "create",
                "vm-1",
                "--zone=zone-2",
                "--machine-type=e2-micro",
                "--labels=env=test",
                "--boot-disk-size=20",
                "--max-run-duration=1h",
                "--preemptible",
            ])
            .arg(format!("--metadata-from-file={}", metadata.display()))
            .assert()
            .success()
            .stderr(predicate::str::contains(
                "Created [https://compute.example.com/v1/projects/my-project/zones/zone-2/instances/vm-1].",
            ))
            .stdout(predicate::str::contains("vm-1  zone-2  e2-micro"));
    }

    #[test]
    fn create_rejects_bad_values() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "create", "vm", "--zone=zone-1", "--machine-type=huge"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Invalid choice: 'huge'"));

        cmdt(&tmp)
            .args([
                "compute",
                "instances",
                "create",
                "vm",
                "--zone=zone-1",
                "--preemptible",
                "--reservation=r",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains(
                "At most one of --preemptible | --reservation can be specified.",
            ));

        cmdt(&tmp)
            .args([
                "compute",
                "instances",
                "create",
                "vm",
                "--zone=zone-1",
                "--metadata-from-file=/nonexistent/metadata.json",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Unable to read file"));

        cmdt(&tmp)
            .args(["compute", "instances", "create", "instance-1", "--zone=zone-1"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("HTTPError 409"));
    }

    #[test]
    fn delete_requires_a_prompt_or_quiet() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "delete", "instance-1", "--zone=zone-1"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not interactive"));

        cmdt(&tmp)
            .args([
                "compute",
                "instances",
                "delete",
                "instance-1",
                "instance-2",
                "--zone=zone-1",
                "--quiet",
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("instances/instance-1]."))
            .stderr(predicate::str::contains("instances/instance-2]."));
    }

    #[test]
    fn release_tracks_gate_commands() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["compute", "instances", "get-serial-port-output", "instance-1", "--zone=zone-1"])
            .assert()
            .code(2);

        cmdt(&tmp)
            .args([
                "pre-release",
                "compute",
                "instances",
                "get-serial-port-output",
                "instance-1",
                "--zone=zone-1",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Booting instance-1"));

        cmdt(&tmp)
            .args(["experimental", "compute", "instances", "simulate-maintenance", "instance-3:zone-3"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Simulated maintenance event"));

        cmdt(&tmp)
            .args(["experimental", "compute", "instances", "simulate-maintenance", "instance-3"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("argument --zone: Must be specified."));
    }

    #[test]
    fn inventory_file_backs_the_service() {
        let tmp = TempDir::new().unwrap();
        let inventory = tmp.path().join("inventory.json");
        std::fs::write(
            &inventory,
            r#"{
                "project": "lab",
                "zones": [{"name": "lab-a", "region": "lab"}],
                "instances": [{"name": "box", "zone": "lab-a"}],
                "failures": {"instances": {"status": 403, "message": "Forbidden"}}
            }"#,
        )
        .unwrap();

        cmdt(&tmp)
            .env("CMDT_INVENTORY", &inventory)
            .args(["compute", "zones", "list", "--uri"])
            .assert()
            .success()
            .stdout("https://compute.example.com/v1/projects/lab/zones/lab-a\n");

        cmdt(&tmp)
            .env("CMDT_INVENTORY", &inventory)
            .args(["compute", "instances", "list"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("HTTPError 403: Forbidden"));
    }
}

mod completion {
    use super::*;

    #[test]
    fn completes_command_names() {
        let tmp = TempDir::new().unwrap();
        complete(&tmp, "cmdt comp")
            .assert()
            .success()
            .stdout("compute");
    }

    #[test]
    fn completes_flag_values_from_cache() {
        let tmp = TempDir::new().unwrap();
        complete(&tmp, "cmdt compute instances list --zone=zone-")
            .assert()
            .success()
            .stdout("--zone=zone-1\n--zone=zone-2\n--zone=zone-3");

        cmdt(&tmp)
            .args(["meta", "cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("compute.zones"));
    }

    #[test]
    fn completes_choices_and_respects_cursor() {
        let tmp = TempDir::new().unwrap();
        let line = "cmdt compute instances create vm --machine-type=e2 --zone";
        cmdt(&tmp)
            .env("_ARGCOMPLETE", "1")
            .env("COMP_LINE", line)
            .env("COMP_POINT", "50")
            .env("_ARGCOMPLETE_IFS", " ")
            .assert()
            .success()
            .stdout("--machine-type=e2-medium --machine-type=e2-micro --machine-type=e2-small");
    }
}

mod meta {
    use super::*;

    #[test]
    fn completion_tree_rebuild_and_show() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["meta", "completion-tree", "rebuild"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Rebuilt completion tree ["));
        assert!(tmp.path().join("completion_tree.json").exists());

        cmdt(&tmp)
            .args(["meta", "completion-tree", "show", "compute", "instances", "simulate-maintenance"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"track\": \"experimental\""));

        cmdt(&tmp)
            .args(["meta", "completion-tree", "show", "compute", "disks"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[compute disks] is not in the completion tree."));
    }

    #[test]
    fn completers_list_and_run() {
        let tmp = TempDir::new().unwrap();
        cmdt(&tmp)
            .args(["meta", "cache", "completers", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("compute.instances"))
            .stdout(predicate::str::contains("files"));

        cmdt(&tmp)
            .args(["meta", "cache", "completers", "run", "compute.instances", "instance-1"])
            .assert()
            .success()
            .stdout("instance-1 --zone=zone-1\ninstance-1 --zone=zone-2\n");

        cmdt(&tmp)
            .args([
                "meta",
                "cache",
                "completers",
                "run",
                "compute.instances",
                "inst",
                "--scope=zone=zone-1",
                "--gri",
            ])
            .assert()
            .success()
            .stdout("instance-1\ninstance-2\n");

        cmdt(&tmp)
            .args([
                "meta",
                "cache",
                "completers",
                "run",
                "compute.instances",
                "inst",
                "--qualify=zone",
                "--scope=zone=zone-1",
            ])
            .assert()
            .success()
            .stdout("instance-1\ninstance-2\n");

        cmdt(&tmp)
            .args(["meta", "cache", "completers", "run", "compute.instances"])
            .write_stdin("instance-2\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("  instance-2"));
    }

    #[test]
    fn cache_delete_with_quiet() {
        let tmp = TempDir::new().unwrap();
        complete(&tmp, "cmdt compute instances list --zone ")
            .assert()
            .success();
        cmdt(&tmp)
            .args(["meta", "cache", "delete", "-q"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Deleted resource cache ["));
        cmdt(&tmp)
            .args(["meta", "cache", "list"])
            .assert()
            .success()
            .stdout("TABLE  COLUMNS  TIMEOUT  EXPIRED\n");
    }
}

#[test]
fn skipped_by_default() {
    if !common::run_skipped() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    cmdt(&tmp)
        .args(["compute", "zones", "list"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();
}
