//! UDS JSON-RPC control server.
//! Connection-per-request, newline-delimited JSON.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Mutex;

use livedelay_core::{DelayChoice, PreferenceStore, load_preferred_delay, save_preferred_delay};

use crate::driver::{DelayHandle, DriverError};

pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
pub(crate) const INVALID_PARAMS: i64 = -32602;
pub(crate) const SERVER_ERROR: i64 = -32000;

pub type SharedPreferences = Arc<Mutex<Box<dyn PreferenceStore + Send>>>;

/// State shared by every connection.
#[derive(Clone)]
pub struct ServerContext {
    pub handle: DelayHandle,
    pub preferences: SharedPreferences,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }
}

impl From<DriverError> for RpcError {
    fn from(e: DriverError) -> Self {
        Self {
            code: SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            code: SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

/// Run the UDS JSON-RPC server.
pub async fn run_server(socket_path: &str, ctx: ServerContext) -> anyhow::Result<()> {
    let socket_dir = std::path::Path::new(socket_path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid socket path"))?;

    std::fs::create_dir_all(socket_dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    if std::path::Path::new(socket_path).exists() {
        if tokio::net::UnixStream::connect(socket_path).await.is_err() {
            std::fs::remove_file(socket_path)?;
            tracing::info!("removed stale socket at {socket_path}");
        } else {
            anyhow::bail!("another livedelay daemon is already running at {socket_path}");
        }
    }

    let listener = UnixListener::bind(socket_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("control socket listening on {socket_path}");

    loop {
        let (stream, _) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, ctx).await {
                tracing::debug!("connection error: {e}");
            }
        });
    }
}

async fn handle_connection(
    stream: tokio::net::UnixStream,
    ctx: ServerContext,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let request: serde_json::Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();

    let response = match dispatch(method, &request["params"], &ctx).await {
        Ok(result) => serde_json::json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": id,
        }),
        Err(e) => serde_json::json!({
            "jsonrpc": "2.0",
            "error": {"code": e.code, "message": e.message},
            "id": id,
        }),
    };
    let mut resp = serde_json::to_string(&response)?;
    resp.push('\n');
    writer.write_all(resp.as_bytes()).await?;

    Ok(())
}

pub(crate) async fn dispatch(
    method: &str,
    params: &serde_json::Value,
    ctx: &ServerContext,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "status" => Ok(serde_json::to_value(ctx.handle.status().await?)?),
        "stats" => Ok(serde_json::to_value(ctx.handle.stats().await?)?),
        "choices" => Ok(serde_json::to_value(DelayChoice::all().collect::<Vec<_>>())?),
        "start" => {
            let choice = match optional_delay(params)? {
                Some(choice) => choice,
                None => load_preferred_delay(&**ctx.preferences.lock().await),
            };
            let outcome = ctx.handle.start(choice.ms()).await?;
            Ok(serde_json::json!({
                "outcome": outcome,
                "delay_ms": choice.ms(),
            }))
        }
        "set_delay" => {
            let choice = optional_delay(params)?
                .ok_or_else(|| RpcError::invalid_params("missing delay_ms"))?;
            ctx.handle.set_delay(choice.ms()).await?;
            let persisted = {
                let mut prefs = ctx.preferences.lock().await;
                match save_preferred_delay(&mut **prefs, choice.ms()) {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!("failed to persist preferred delay: {e}");
                        false
                    }
                }
            };
            Ok(serde_json::json!({
                "delay_ms": choice.ms(),
                "label": choice.label(),
                "persisted": persisted,
            }))
        }
        "stop" => {
            let revealed = ctx.handle.stop().await?;
            Ok(serde_json::json!({ "revealed": revealed }))
        }
        _ => Err(RpcError {
            code: METHOD_NOT_FOUND,
            message: "method not found".to_string(),
        }),
    }
}

/// `params.delay_ms`, validated against the offered choices.
fn optional_delay(params: &serde_json::Value) -> Result<Option<DelayChoice>, RpcError> {
    match params.get("delay_ms") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => {
            let ms = value
                .as_u64()
                .ok_or_else(|| RpcError::invalid_params("delay_ms must be a non-negative integer"))?;
            DelayChoice::from_ms(ms)
                .map(Some)
                .ok_or_else(|| RpcError::invalid_params(format!("{ms} ms is not an offered delay")))
        }
    }
}
