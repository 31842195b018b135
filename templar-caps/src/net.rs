//! Local network probes.

use std::collections::BTreeMap;
use std::sync::Arc;

use miette::miette;
use serde_json::{Value, json};
use templar_core::caps::CapabilityFn;

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "net_port_listening",
        Arc::new(|argv: Vec<Value>| {
            Box::pin(async move {
                let protocol = args::string("net_port_listening", &argv, 0, "protocol")?;
                let port = parse_port(&argv)?;
                Ok(json!(port_listening(&protocol, port)?))
            })
        }),
    );
}

fn parse_port(argv: &[Value]) -> miette::Result<u16> {
    let port = match args::get(argv, 1) {
        Value::Number(n) => n.as_f64().unwrap_or(-1.0),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| miette!("net_port_listening: port must be a number, got '{s}'"))?,
        other => {
            return Err(miette!(
                "net_port_listening: port must be a number, got {other}"
            ));
        }
    };
    if port < 1.0 || port > 65535.0 || port.fract() != 0.0 {
        return Err(miette!("port must be between 1 and 65535, got {port}"));
    }
    Ok(port as u16)
}

/// Scans the kernel socket tables for a local socket on `port`. TCP sockets
/// count only in LISTEN state; UDP sockets count whenever they are bound.
#[cfg(target_os = "linux")]
fn port_listening(protocol: &str, port: u16) -> miette::Result<bool> {
    let (tables, listen_only) = match protocol {
        "tcp" => (["/proc/net/tcp", "/proc/net/tcp6"], true),
        "udp" => (["/proc/net/udp", "/proc/net/udp6"], false),
        other => {
            return Err(miette!(
                "unsupported protocol '{other}', expected 'tcp' or 'udp'"
            ));
        }
    };

    // Local addresses appear as HEX_IP:HEX_PORT with a fixed-width port.
    let needle = format!(":{port:04X}");
    for table in tables {
        let Ok(contents) = std::fs::read_to_string(table) else {
            continue;
        };
        for line in contents.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let Some(local) = fields.get(1) else {
                continue;
            };
            if !local.ends_with(&needle) {
                continue;
            }
            // 0A is TCP_LISTEN in include/net/tcp_states.h.
            if !listen_only || fields.get(3) == Some(&"0A") {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(not(target_os = "linux"))]
fn port_listening(_protocol: &str, _port: u16) -> miette::Result<bool> {
    Err(miette!("net_port_listening is only supported on linux"))
}
