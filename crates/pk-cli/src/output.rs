use pk_core::models::{Registry, ReservationRecord};
use pk_core::services::GcReport;
use pk_core::Reservation;
use serde_json::{json, Map, Value};

pub fn reservation_json(reservation: &Reservation) -> Value {
    json!({
        "host": reservation.host(),
        "port": reservation.port(),
        "held": reservation.is_held(),
    })
}

/// One object for a single reservation, an array otherwise.
pub fn reservations_json(reservations: &[Reservation]) -> Value {
    match reservations {
        [single] => reservation_json(single),
        many => Value::Array(many.iter().map(reservation_json).collect()),
    }
}

pub fn release_json(port: u16, removed: bool) -> Value {
    json!({
        "status": if removed { "released" } else { "not_found" },
        "port": port,
    })
}

pub fn gc_json(report: &GcReport) -> Value {
    json!({
        "released": report.removed_ports(),
        "kept": report.kept,
    })
}

/// Records sorted by host, then numerically by port. Registry keys sort as
/// text, which would put `:10000` before `:9000`.
pub fn by_host_and_port(registry: &Registry) -> Vec<&ReservationRecord> {
    let mut records: Vec<_> = registry.values().collect();
    records.sort_by(|a, b| (&a.host, a.port).cmp(&(&b.host, b.port)));
    records
}

pub fn status_json(registry: &Registry) -> Value {
    let entries: Map<String, Value> = by_host_and_port(registry)
        .into_iter()
        .filter_map(|record| Some((record.key(), serde_json::to_value(record).ok()?)))
        .collect();
    Value::Object(entries)
}

/// Registry as aligned columns, one reservation per line.
pub fn status_table(registry: &Registry) -> String {
    if registry.is_empty() {
        return "no reservations".to_string();
    }

    let owner_of = |owner: &str| if owner.is_empty() { "-".to_string() } else { owner.to_string() };
    let host_width = registry
        .values()
        .map(|r| r.host.len())
        .chain(["HOST".len()])
        .max()
        .unwrap_or(4);
    let owner_width = registry
        .values()
        .map(|r| owner_of(&r.owner).len())
        .chain(["OWNER".len()])
        .max()
        .unwrap_or(5);

    let mut lines = vec![format!(
        "{:<host_width$}  {:>5}  {:<owner_width$}  SINCE",
        "HOST", "PORT", "OWNER"
    )];
    for record in by_host_and_port(registry) {
        lines.push(format!(
            "{:<host_width$}  {:>5}  {:<owner_width$}  {}",
            record.host,
            record.port,
            owner_of(&record.owner),
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    lines.join("\n")
}
