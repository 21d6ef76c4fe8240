//! UDS JSON-RPC client for CLI subcommands.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use livedelay_core::DelayChoice;

pub(crate) async fn rpc_call(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to livedelay at {socket_path}: {e}"))?;

    let (reader, mut writer) = stream.into_split();

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    let mut req = serde_json::to_string(&request)?;
    req.push('\n');
    writer.write_all(req.as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response: serde_json::Value = serde_json::from_str(line.trim())?;

    if let Some(error) = response.get("error") {
        anyhow::bail!("RPC error: {error}");
    }

    Ok(response["result"].clone())
}

/// `livedelay status`
pub async fn cmd_status(socket_path: &str) -> anyhow::Result<()> {
    let status = rpc_call(socket_path, "status", serde_json::json!({})).await?;
    println!("{}", format_status(&status));
    Ok(())
}

/// `livedelay start [--delay MS]`. Without `--delay` the daemon uses the
/// stored preference.
pub async fn cmd_start(socket_path: &str, delay_ms: Option<u64>) -> anyhow::Result<()> {
    let params = match delay_ms {
        Some(ms) => serde_json::json!({ "delay_ms": ms }),
        None => serde_json::json!({}),
    };
    let result = rpc_call(socket_path, "start", params).await?;
    let outcome = result["outcome"].as_str().unwrap_or("unknown");
    let delay = result["delay_ms"].as_u64().unwrap_or(0);
    match outcome {
        "started" => println!("delay on: {}", delay_label(delay)),
        "already_active" => println!("delay already active"),
        "feed_unavailable" => println!("live feed unavailable, delay stays off"),
        other => println!("start: {other}"),
    }
    Ok(())
}

/// `livedelay set-delay MS`
pub async fn cmd_set_delay(socket_path: &str, delay_ms: u64) -> anyhow::Result<()> {
    let result = rpc_call(
        socket_path,
        "set_delay",
        serde_json::json!({ "delay_ms": delay_ms }),
    )
    .await?;
    let label = result["label"].as_str().unwrap_or("?");
    if result["persisted"].as_bool() == Some(false) {
        println!("delay set to {label} (preference not saved)");
    } else {
        println!("delay set to {label}");
    }
    Ok(())
}

/// `livedelay stop`
pub async fn cmd_stop(socket_path: &str) -> anyhow::Result<()> {
    let result = rpc_call(socket_path, "stop", serde_json::json!({})).await?;
    let revealed = result["revealed"].as_u64().unwrap_or(0);
    println!("delay off, {revealed} pending items revealed");
    Ok(())
}

/// `livedelay choices`. Works without a running daemon.
pub fn cmd_choices() {
    for choice in DelayChoice::all() {
        println!("{:>7}  {}", choice.ms(), choice.label());
    }
}

fn delay_label(ms: u64) -> String {
    DelayChoice::from_ms(ms).map_or_else(|| format!("{ms} ms"), |c| c.label())
}

/// Pure formatting logic for status output, separated for testability.
pub(crate) fn format_status(status: &serde_json::Value) -> String {
    if !status.is_object() {
        return "--".to_string();
    }
    if status["active"].as_bool() != Some(true) {
        return "delay off".to_string();
    }

    let delay = delay_label(status["delay_ms"].as_u64().unwrap_or(0));
    let size = status["queue_size"].as_u64().unwrap_or(0);
    let capacity = status["capacity"].as_u64().unwrap_or(0);
    let mut out = format!("delay {delay}, {size}/{capacity} withheld");
    match status["level"].as_str() {
        Some("near_capacity") => out.push_str(" (near capacity)"),
        Some("at_capacity") => out.push_str(" (at capacity, oldest revealed early)"),
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(active: bool, delay_ms: u64, size: u64, level: &str) -> serde_json::Value {
        serde_json::json!({
            "active": active,
            "delay_ms": delay_ms,
            "queue_size": size,
            "capacity": 100,
            "level": level,
            "next_reveal_at_ms": null,
        })
    }

    #[test]
    fn format_status_inactive() {
        assert_eq!(format_status(&status(false, 0, 0, "empty")), "delay off");
    }

    #[test]
    fn format_status_active() {
        let out = format_status(&status(true, 30_000, 4, "pending"));
        assert_eq!(out, "delay 30s, 4/100 withheld");
    }

    #[test]
    fn format_status_warnings() {
        assert!(format_status(&status(true, 15_000, 85, "near_capacity")).contains("near capacity"));
        assert!(format_status(&status(true, 15_000, 100, "at_capacity")).contains("at capacity"));
    }

    #[test]
    fn format_status_unreachable() {
        assert_eq!(format_status(&serde_json::json!(null)), "--");
    }

    #[test]
    fn label_for_unknown_delay() {
        assert_eq!(delay_label(45_000), "45s");
        assert_eq!(delay_label(1_234), "1234 ms");
    }
}
