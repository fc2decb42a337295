use assert_cmd::Command;
use chrono::{Duration, TimeZone, Utc};
use predicates::prelude::*;
use tempfile::TempDir;
use worktime_core::{paths, NewRegistration, RegistrationStore, TaskRef, YamlStore};

fn worktime(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("worktime").expect("worktime binary");
    cmd.env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn seed(home: &TempDir, n: usize) {
    let store = YamlStore::open_at(paths::local_store_path(home.path())).expect("open store");
    let base = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();
    for i in 0..n {
        let start = base + Duration::hours(i as i64);
        store
            .insert(NewRegistration::finished(
                TaskRef::new("acme", format!("task-{i}")),
                start,
                start + Duration::minutes(40),
            ))
            .expect("seed");
    }
}

fn list_json(home: &TempDir, pages: u32) -> serde_json::Value {
    let output = worktime(home)
        .args(["list", "--json", "--pages", &pages.to_string()])
        .output()
        .expect("run list");
    assert!(
        output.status.success(),
        "list failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("list JSON")
}

#[test]
fn punch_in_twice_is_rejected() {
    let home = TempDir::new().unwrap();
    worktime(&home)
        .args(["punch-in", "--project", "acme", "--task", "api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("punched in on acme/api"));

    worktime(&home)
        .args(["punch-in", "--project", "acme", "--task", "web"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already punched in"));
}

#[test]
fn punch_out_without_punch_in_fails() {
    let home = TempDir::new().unwrap();
    worktime(&home)
        .arg("punch-out")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not punched in"));
}

#[test]
fn punch_cycle_shows_up_in_list() {
    let home = TempDir::new().unwrap();
    worktime(&home)
        .args(["punch-in", "--project", "acme", "--task", "api"])
        .assert()
        .success();
    worktime(&home)
        .args(["punch-out", "--comment", "reviewed PRs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("punched out of acme/api"));

    let list = list_json(&home, 1);
    assert_eq!(list["total"], 1);
    assert_eq!(list["more"], false);
    let registration = &list["registrations"][0];
    assert_eq!(registration["comment"], "reviewed PRs");
    assert!(!registration["end"].is_null());
}

#[test]
fn list_pages_through_the_store() {
    let home = TempDir::new().unwrap();
    seed(&home, 25);

    let first = list_json(&home, 1);
    assert_eq!(first["loaded"], 10);
    assert_eq!(first["more"], true);

    let three = list_json(&home, 3);
    assert_eq!(three["loaded"], 25);
    assert_eq!(three["more"], false);
    let ids: Vec<i64> = three["registrations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 25, "no registration listed twice");
}

#[test]
fn list_table_hints_at_more_pages() {
    let home = TempDir::new().unwrap();
    seed(&home, 12);
    worktime(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("task-11"))
        .stdout(predicate::str::contains("use --pages 2"));
}

#[test]
fn page_size_comes_from_config() {
    let home = TempDir::new().unwrap();
    seed(&home, 8);
    let config = worktime_core::Config {
        list: worktime_core::ListConfig { page_size: 3 },
        ..Default::default()
    };
    config.save_at(home.path()).expect("save config");

    assert_eq!(list_json(&home, 2)["loaded"], 6);
    worktime(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("page_size: 3"))
        .stdout(predicate::str::contains("poll_interval_ms: 500"));
}

#[test]
fn config_show_defaults_without_file() {
    let home = TempDir::new().unwrap();
    worktime(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults"))
        .stdout(predicate::str::contains("page_size: 10"));
}

#[test]
fn sync_pushes_then_reports_nothing_new() {
    let home = TempDir::new().unwrap();
    seed(&home, 3);

    worktime(&home)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("pushed 3"))
        .stdout(predicate::str::contains("synchronization completed"));

    let remote = YamlStore::open_at(paths::remote_store_path(home.path())).expect("remote");
    assert_eq!(remote.count().unwrap(), 3);

    worktime(&home)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Everything up to date."));
}

#[test]
fn sync_removes_ghosts_and_pulls_from_custom_remote() {
    let home = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let remote_path = remote_dir.path().join("shared.yaml");
    seed(&home, 2);

    worktime(&home)
        .args(["sync", "--quiet", "--remote"])
        .arg(&remote_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let remote = YamlStore::open_at(&remote_path).expect("remote");
    let doomed = remote.get_latest().unwrap().expect("pushed");
    remote.delete(doomed.id).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
    remote
        .insert(NewRegistration::finished(
            TaskRef::new("acme", "from-remote"),
            at,
            at + Duration::hours(1),
        ))
        .unwrap();
    drop(remote);

    worktime(&home)
        .args(["sync", "--remote"])
        .arg(&remote_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("pulled 1"))
        .stdout(predicate::str::contains("deleted remotely"))
        .stdout(predicate::str::contains("from-remote"));

    let local = YamlStore::open_at(paths::local_store_path(home.path())).expect("local");
    assert_eq!(local.count().unwrap(), 2);
}

#[test]
fn failed_sync_exits_non_zero() {
    let home = TempDir::new().unwrap();
    let store = YamlStore::open_at(paths::local_store_path(home.path())).expect("open store");
    let at = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();
    for task in ["a", "b"] {
        store
            .insert(NewRegistration::started(TaskRef::new("acme", task), at))
            .unwrap();
    }
    drop(store);

    worktime(&home)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("synchronization failed"))
        .stderr(predicate::str::contains("ongoing"));
}
