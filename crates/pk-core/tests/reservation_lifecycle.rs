use std::net::TcpListener;

use pk_core::services::{env_file, json_config};
use pk_core::{KeeperConfig, PortKeeperError, ReservationManager, ReserveRequest};

/// A port the OS reports free at the time of the call.
fn ephemeral_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn held_reservation_survives_gc_until_released() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ReservationManager::new(&KeeperConfig::in_dir(dir.path()));
    let port = ephemeral_port();

    let mut handle = manager
        .reserve_one(&ReserveRequest::new().range(port, port).hold(true).owner("svc"))
        .unwrap();
    assert!(handle.is_held());

    let report = manager.collect_garbage().unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(report.kept, 1);

    manager.release(&mut handle).unwrap();
    assert!(manager.status().unwrap().is_empty());
}

#[test]
fn unheld_reservation_is_collected() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ReservationManager::new(&KeeperConfig::in_dir(dir.path()));
    let port = ephemeral_port();

    manager
        .reserve_one(&ReserveRequest::new().range(port, port))
        .unwrap();

    let report = manager.collect_garbage().unwrap();
    assert_eq!(report.removed_ports(), vec![port]);
    assert!(manager.status().unwrap().is_empty());
}

#[test]
fn taken_listener_keeps_port_bound() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ReservationManager::new(&KeeperConfig::in_dir(dir.path()));
    let port = ephemeral_port();

    let mut handle = manager
        .reserve_one(&ReserveRequest::new().range(port, port).hold(true))
        .unwrap();
    let listener = handle.take_listener().unwrap();
    assert!(!handle.is_held());

    // Releasing the handle no longer touches the socket the caller owns.
    manager.release(&mut handle).unwrap();
    assert_eq!(listener.local_addr().unwrap().port(), port);
    assert!(!pk_core::services::probe::is_free("127.0.0.1", port));
}

#[test]
fn strict_mode_refuses_corrupt_registry() {
    let dir = tempfile::tempdir().unwrap();
    let config = KeeperConfig {
        corrupt_policy: pk_core::models::CorruptRegistryPolicy::Strict,
        ..KeeperConfig::in_dir(dir.path())
    };
    std::fs::write(&config.registry_path, "{\"truncated\": ").unwrap();
    let manager = ReservationManager::new(&config);

    let err = manager
        .reserve_one(&ReserveRequest::new().range(40000, 40010))
        .unwrap_err();
    assert!(matches!(err, PortKeeperError::CorruptRegistry(_)));
    // Nothing was written over the corrupt file.
    assert_eq!(
        std::fs::read_to_string(&config.registry_path).unwrap(),
        "{\"truncated\": "
    );
}

#[test]
fn reserved_port_propagates_to_env_and_config() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ReservationManager::with_probe(
        &KeeperConfig::in_dir(dir.path()),
        |_: &str, _: u16| true,
    );
    let env_path = dir.path().join(".env");
    let config_path = dir.path().join("config.json");
    std::fs::write(&env_path, "DEBUG=1\n").unwrap();

    let handle = manager
        .reserve_one(&ReserveRequest::new().preferred(8888).range(8888, 8988))
        .unwrap();
    env_file::write_env(&env_path, [("PORT", handle.port().to_string())], true).unwrap();
    let changes = serde_json::json!({"server": {"host": handle.host(), "port": handle.port()}});
    json_config::update_config_json(&config_path, changes.as_object().unwrap(), true).unwrap();

    assert_eq!(
        std::fs::read_to_string(&env_path).unwrap(),
        "DEBUG=1\nPORT=8888\n"
    );
    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(config["server"]["port"], 8888);
    assert_eq!(config["server"]["host"], "127.0.0.1");
}
