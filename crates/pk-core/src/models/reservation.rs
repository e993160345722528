use std::collections::BTreeMap;
use std::net::TcpListener;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registry contents: `"host:port"` key to the record that claims it.
pub type Registry = BTreeMap<String, ReservationRecord>;

/// Identity key of a `(host, port)` pair in the registry.
pub fn registry_key(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

/// One committed claim as persisted in the registry file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationRecord {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub owner: String,
    #[serde(rename = "timestamp", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl ReservationRecord {
    pub fn new(host: &str, port: u16, owner: Option<&str>) -> Self {
        Self {
            host: host.to_string(),
            port,
            owner: owner.unwrap_or_default().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        registry_key(&self.host, self.port)
    }
}

/// Timestamps are written as RFC 3339 text. Registries written by older
/// tools store seconds since the epoch as a number, so both are accepted.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(DateTime<Utc>),
        Seconds(f64),
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Text(at) => Ok(at),
            Raw::Seconds(secs) => from_epoch_seconds(secs)
                .ok_or_else(|| D::Error::custom(format!("timestamp {secs} is out of range"))),
        }
    }

    pub(super) fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
        DateTime::from_timestamp(whole as i64, nanos)
    }
}

/// In-memory handle to a reservation returned to callers.
///
/// When `is_held()` is true the handle owns a listening socket on the port;
/// the socket is closed on release, on `take_listener` hand-off, or when the
/// handle is dropped.
#[derive(Debug)]
pub struct Reservation {
    host: String,
    port: u16,
    holder: Option<TcpListener>,
}

impl Reservation {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            holder: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn key(&self) -> String {
        registry_key(&self.host, self.port)
    }

    pub fn is_held(&self) -> bool {
        self.holder.is_some()
    }

    /// Hand the held socket over to the caller, e.g. to serve on it directly.
    /// The handle is no longer held afterwards; the registry entry is untouched.
    pub fn take_listener(&mut self) -> Option<TcpListener> {
        self.holder.take()
    }

    pub(crate) fn attach_holder(&mut self, listener: TcpListener) {
        self.holder = Some(listener);
    }

    /// Close the held socket if any. Returns whether one was open.
    pub(crate) fn close_holder(&mut self) -> bool {
        self.holder.take().is_some()
    }
}
