use assert_cmd::Command;
use delivery_init::COMPLETION_MESSAGE;

/// Run against a port nothing listens on, with a short server selection timeout.
fn unreachable(subcommand: &str) -> std::process::Output {
    Command::cargo_bin("delivery-init")
        .unwrap()
        .env_remove("DELIVERY_ENV")
        .env_remove("DELIVERY_CONFIG_DIR")
        .env_remove("MONGO_URI")
        .env("DELIVERY_DATABASE__SERVER_SELECTION_TIMEOUT_MS", "200")
        .env("RUST_LOG", "off")
        .args(["--uri", "mongodb://127.0.0.1:1", subcommand])
        .output()
        .unwrap()
}

#[test]
fn init_against_unreachable_server_exits_non_zero() {
    let output = unreachable("init");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains(COMPLETION_MESSAGE), "{}", stdout);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to connect to database 'delivery_db'"), "{}", stderr);
}

#[test]
fn verify_against_unreachable_server_exits_non_zero() {
    let output = unreachable("verify");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn unreadable_seed_file_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seed.json");
    std::fs::write(&path, r#"[{"status": "lost"}]"#).unwrap();

    let output = Command::cargo_bin("delivery-init")
        .unwrap()
        .env_remove("DELIVERY_ENV")
        .env_remove("DELIVERY_CONFIG_DIR")
        .env("DELIVERY_SEED__PATH", &path)
        .env("RUST_LOG", "off")
        .args(["--uri", "mongodb://127.0.0.1:1", "init"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load seed records"), "{}", stderr);
}
