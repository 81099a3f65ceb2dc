// ABOUTME: Integration tests for the keel CLI commands.
// ABOUTME: Covers help, init, secrets, manifest apply, and label preview without an engine.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const ACTOR: &str = "6f1c8d2e-8a4b-4c3e-9f7a-2b5d1e0c9a8f";

fn keel_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("keel"));
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("DOCKER_HOST")
        .env_remove("TRAEFIK_ENABLED")
        .env_remove("TRAEFIK_NETWORK");
    cmd
}

fn write_config(dir: &Path) {
    fs::write(
        dir.join("keel.yml"),
        format!("encryption:\n  key: cli-test-key\nactor: {ACTOR}\nstate: state.json\n"),
    )
    .unwrap();
}

const MANIFEST: &str = r#"
project: shop
services:
  - name: Web
    slug: web
    image: nginx:latest
    env:
      RUST_LOG: info
    domains:
      - hostname: app.example.com
        ssl: true
        ssl_auto: true
"#;

#[test]
fn help_shows_commands() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("logs"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn init_creates_config_file() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path()).arg("init").assert().success();

    let content = fs::read_to_string(dir.path().join("keel.yml")).unwrap();
    assert!(content.contains("runtime:"));
    assert!(content.contains("KEEL_ENCRYPTION_KEY"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("keel.yml"), "existing: config").unwrap();

    keel_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn missing_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    keel_cmd(dir.path())
        .arg("reconcile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn secret_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    let output = keel_cmd(dir.path())
        .args(["--quiet", "secret", "encrypt", "hunter2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let sealed = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert!(!sealed.contains("hunter2"));

    keel_cmd(dir.path())
        .args(["--quiet", "secret", "decrypt", &sealed])
        .assert()
        .success()
        .stdout(predicate::str::diff("hunter2\n"));
}

#[test]
fn decrypting_garbage_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    keel_cmd(dir.path())
        .args(["secret", "decrypt", "c2hvcnQ="])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ciphertext"));
}

#[test]
fn apply_then_preview_labels() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    fs::write(dir.path().join("app.yml"), MANIFEST).unwrap();

    keel_cmd(dir.path())
        .args(["apply", "app.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 service(s) to project shop"));
    assert!(dir.path().join("state.json").exists());

    keel_cmd(dir.path())
        .args(["labels", "shop/web"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "traefik.http.routers.keel-web.rule=Host(`app.example.com`)",
        ))
        .stdout(predicate::str::contains(
            "traefik.http.routers.keel-web-secure.tls.certresolver=letsencrypt",
        ))
        .stdout(predicate::str::contains("keel.managed=true"));
}

#[test]
fn labels_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    fs::write(dir.path().join("app.yml"), MANIFEST).unwrap();
    keel_cmd(dir.path()).args(["apply", "app.yml"]).assert().success();

    let output = keel_cmd(dir.path())
        .args(["--json", "labels", "shop/web"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let event: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(event["event"], "result");
    assert_eq!(event["data"]["traefik.enable"], "true");
}

#[test]
fn unknown_service_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());

    keel_cmd(dir.path())
        .args(["status", "shop/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such service: shop/missing"));
}

#[test]
fn commands_need_an_actor() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("keel.yml"), "encryption:\n  key: k\n").unwrap();

    keel_cmd(dir.path())
        .args(["start", "shop/web"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no actor given"));
}

#[test]
fn apply_rejects_hostname_that_breaks_routing_rule() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path());
    fs::write(
        dir.path().join("app.yml"),
        MANIFEST.replace("app.example.com", "a.com`) || PathPrefix(`/"),
    )
    .unwrap();

    keel_cmd(dir.path())
        .args(["apply", "app.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid character in hostname"));
    assert!(!dir.path().join("state.json").exists());
}
