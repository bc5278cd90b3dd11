//! Panel profile records to server descriptors
//!
//! Translation is lazy and single-pass. Callers collect into
//! `Result<Vec<_>>` so one bad record fails the whole batch.

use serde_json::{Map, Value};

use super::PanelFlavor;
use crate::error::{Result, YasspError};
use crate::models::ServerDescriptor;

/// Translate panel records into descriptors bound to `bind_host`, preserving order.
pub fn translate<'a, I>(
    flavor: PanelFlavor,
    bind_host: &'a str,
    records: I,
) -> impl Iterator<Item = Result<ServerDescriptor>> + 'a
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: 'a,
{
    records.into_iter().map(move |record| match flavor {
        PanelFlavor::Nico => from_nico(bind_host, record),
        PanelFlavor::Moyu => from_moyu(bind_host, record),
    })
}

fn from_nico(bind_host: &str, record: Value) -> Result<ServerDescriptor> {
    let obj = record
        .as_object()
        .ok_or_else(|| YasspError::Payload("profile record is not an object".into()))?;

    Ok(ServerDescriptor {
        host: bind_host.to_string(),
        port: parse_port(field(obj, "port")?)?,
        password: string_field(obj, "passwd")?,
        method: string_field(obj, "method")?,
        ota: flag(obj, "ota")?,
        udp: flag(obj, "udp")?,
        fast_open: flag(obj, "fastopen")?,
    })
}

fn from_moyu(bind_host: &str, record: Value) -> Result<ServerDescriptor> {
    let mut server: ServerDescriptor = serde_json::from_value(record)?;
    if server.port == 0 {
        return Err(YasspError::Payload("invalid port 0".into()));
    }
    server.host = bind_host.to_string();
    Ok(server)
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| YasspError::Payload(format!("profile record missing \"{}\"", key)))
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Result<String> {
    field(obj, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| YasspError::Payload(format!("\"{}\" must be a string", key)))
}

// Flags are the string "1" when set; any other value means off.
fn flag(obj: &Map<String, Value>, key: &str) -> Result<bool> {
    Ok(field(obj, key)?.as_str() == Some("1"))
}

fn parse_port(value: &Value) -> Result<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match port {
        Some(p @ 1..=65535) => Ok(p as u16),
        _ => Err(YasspError::Payload(format!("invalid port {}", value))),
    }
}
