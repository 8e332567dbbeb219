use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"{
  "components": [
    {
      "type": "SimpleComponent",
      "parameters": { "input": "5", "names": ["a", "b"] },
      "properties": [ { "name": "Message", "value": "hello" } ]
    }
  ],
  "limits": { "web": "8", "db": "2" }
}"#;

fn config_file() -> (TempDir, String) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("app.json");
    fs::write(&path, CONFIG).expect("config written");
    (dir, path.display().to_string())
}

fn confbind() -> Command {
    Command::cargo_bin("confbind").expect("binary built")
}

#[test]
fn test_show_flattens_keys() {
    let (_dir, path) = config_file();
    confbind()
        .args(["show", &path])
        .assert()
        .success()
        .stdout(predicate::str::contains("components:0:type = SimpleComponent"))
        .stdout(predicate::str::contains("limits:web = 8"));
}

#[test]
fn test_get_missing_key_fails() {
    let (_dir, path) = config_file();
    confbind()
        .args(["get", &path, "components:0:type"])
        .assert()
        .success()
        .stdout("SimpleComponent\n");
    confbind()
        .args(["get", &path, "components:0:nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("components:0:nothing"));
}

#[test]
fn test_coerce_reports_key_on_failure() {
    let (_dir, path) = config_file();
    confbind()
        .args(["coerce", &path, "limits", "--type", "HashMap<String, u8>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web"));
    confbind()
        .args(["coerce", &path, "components:0:type", "--type", "i32"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SimpleComponent"));
}

#[test]
fn test_parameters_lists_bindings() {
    let (_dir, path) = config_file();
    confbind()
        .args(["parameters", &path, "components:0:parameters"])
        .assert()
        .success()
        .stdout(predicate::str::contains("input [parameters] = 5"))
        .stdout(predicate::str::contains("names [parameters] = <2 children>"));
    confbind()
        .args(["parameters", &path, "components:0:properties", "--properties"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Message [properties] = hello"));
}

#[test]
fn test_unknown_log_level_is_rejected() {
    let (_dir, path) = config_file();
    confbind()
        .args(["--log-level", "loud", "show", &path])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loud"));
}
