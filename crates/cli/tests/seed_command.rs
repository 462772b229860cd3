use assert_cmd::Command;

fn seed_output(args: &[&str]) -> serde_json::Value {
    let output = Command::cargo_bin("delivery-init")
        .unwrap()
        .env_remove("DELIVERY_ENV")
        .env_remove("DELIVERY_CONFIG_DIR")
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn seed_prints_five_sample_deliveries() {
    let documents = seed_output(&["seed"]);
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 5);

    for document in documents {
        let mut keys: Vec<&str> = document.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "address",
                "contact_phone",
                "created_at",
                "delivery_time",
                "description",
                "status",
                "updated_at",
                "user_id",
            ]
        );
    }

    let statuses: Vec<&str> = documents
        .iter()
        .map(|document| document["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec!["pending", "in_progress", "delivered", "canceled", "pending"]
    );
    assert!(documents[0]["delivery_time"].is_null());
    assert!(documents[4]["delivery_time"].is_object());
}

#[test]
fn seed_does_not_need_a_database() {
    let documents = seed_output(&["--uri", "mongodb://127.0.0.1:1", "seed"]);
    assert_eq!(documents.as_array().unwrap().len(), 5);
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("delivery-init")
        .unwrap()
        .arg("drop-everything")
        .assert()
        .failure();
}
