mod common;

use serde_json::{json, Value};

use common::{manager_in, run_cli};

#[tokio::test]
async fn reserve_prints_single_object() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());

    let (code, out) = run_cli(&manager, &["reserve", "--range", "8100", "8110", "--owner", "web"]).await;
    assert_eq!(code, 0);
    let value: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value, json!({"host": "127.0.0.1", "port": 8100, "held": false}));

    let registry = manager.status().unwrap();
    assert_eq!(registry["127.0.0.1:8100"].owner, "web");
}

#[tokio::test]
async fn reserve_many_prints_array_and_numbered_env_keys() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    let env_path = dir.path().join(".env");
    std::fs::write(&env_path, "EXISTING=1\n").unwrap();
    let env_arg = env_path.to_string_lossy().to_string();

    let (code, out) = run_cli(
        &manager,
        &[
            "reserve", "--range", "8200", "8210", "--count", "2", "--write-env", "PORT",
            "--env-path", &env_arg,
        ],
    )
    .await;
    assert_eq!(code, 0);
    let value: Value = serde_json::from_str(&out).unwrap();
    let ports: Vec<u64> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["port"].as_u64().unwrap())
        .collect();
    assert_eq!(ports, [8200, 8201]);

    let env = std::fs::read_to_string(&env_path).unwrap();
    assert_eq!(env, "EXISTING=1\nPORT_1=8200\nPORT_2=8201\n");
}

#[tokio::test]
async fn reserve_updates_json_config_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, r#"{"name": "demo", "server": {"port": 1}}"#).unwrap();
    let config_arg = config_path.to_string_lossy().to_string();

    let (code, _) = run_cli(
        &manager,
        &["reserve", "--range", "8300", "8300", "--update-config", &config_arg],
    )
    .await;
    assert_eq!(code, 0);

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(
        written,
        json!({"name": "demo", "server": {"host": "127.0.0.1", "port": 8300}})
    );
    let backup = std::fs::read_to_string(dir.path().join("config.json.bak")).unwrap();
    assert_eq!(backup, r#"{"name": "demo", "server": {"port": 1}}"#);
}

#[tokio::test]
async fn port_prints_bare_number() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());

    let (code, out) = run_cli(&manager, &["port", "--preferred", "8405", "--range", "8400", "8410"]).await;
    assert_eq!(code, 0);
    assert_eq!(out, "8405\n");
}

#[tokio::test]
async fn release_reports_released_then_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    run_cli(&manager, &["reserve", "--range", "8500", "8500"]).await;

    let (_, first) = run_cli(&manager, &["release", "8500"]).await;
    let (_, second) = run_cli(&manager, &["release", "8500"]).await;
    assert_eq!(
        serde_json::from_str::<Value>(&first).unwrap(),
        json!({"status": "released", "port": 8500})
    );
    assert_eq!(
        serde_json::from_str::<Value>(&second).unwrap(),
        json!({"status": "not_found", "port": 8500})
    );
    assert!(manager.status().unwrap().is_empty());
}

#[tokio::test]
async fn status_json_lists_records_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    run_cli(&manager, &["reserve", "--range", "8600", "8600", "--owner", "db"]).await;

    let (_, out) = run_cli(&manager, &["status"]).await;
    let value: Value = serde_json::from_str(&out).unwrap();
    let record = &value["127.0.0.1:8600"];
    assert_eq!(record["port"], 8600);
    assert_eq!(record["owner"], "db");
    assert!(record["timestamp"].is_string());
}

#[tokio::test]
async fn status_table_on_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    let (_, out) = run_cli(&manager, &["status", "--table"]).await;
    assert_eq!(out, "no reservations\n");
}

#[tokio::test]
async fn gc_reports_ports_that_probe_free() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());
    run_cli(&manager, &["reserve", "--range", "8700", "8710", "--count", "2"]).await;

    let (_, out) = run_cli(&manager, &["gc"]).await;
    assert_eq!(
        serde_json::from_str::<Value>(&out).unwrap(),
        json!({"released": [8700, 8701], "kept": 0})
    );
    assert!(manager.status().unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn run_passes_port_and_exit_code_through() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_in(dir.path());

    let (code, _) = run_cli(
        &manager,
        &["run", "--range", "8123", "8123", "--", "sh", "-c", "exit $((PORT - 8120))"],
    )
    .await;
    assert_eq!(code, 3);
    assert!(manager.status().unwrap().is_empty());
}
