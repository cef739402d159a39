//! MCP stdio transport.
//!
//! One JSON-RPC 2.0 request per stdin line, one reply per stdout line.
//! Tool failures stay in-band as structured payloads; the JSON-RPC error
//! channel is reserved for malformed requests and unknown methods, and
//! only stdio faults end the process.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::context::Context;
use crate::tools;

const CODE_PARSE_ERROR: i32 = -32700;
const CODE_METHOD_NOT_FOUND: i32 = -32601;

const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

impl RpcRequest {
    /// A request without an id is a notification and never gets an answer.
    fn wants_reply(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Serialize)]
struct RpcReply {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
}

impl RpcReply {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message }),
        }
    }
}

/// Serve until the host closes stdin.
pub async fn run(ctx: Context) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<RpcRequest>(&line) {
            Err(e) => Some(RpcReply::error(
                Value::Null,
                CODE_PARSE_ERROR,
                format!("unparseable request: {e}"),
            )),
            Ok(request) => dispatch(&ctx, request).await,
        };

        if let Some(reply) = reply {
            let mut frame = serde_json::to_vec(&reply)?;
            frame.push(b'\n');
            out.write_all(&frame).await?;
            out.flush().await?;
        }
    }

    info!("stdin closed; shutting down");
    Ok(())
}

async fn dispatch(ctx: &Context, request: RpcRequest) -> Option<RpcReply> {
    debug!(method = %request.method, "request");

    let outcome = match request.method.as_str() {
        "initialize" => Ok(hello()),
        "notifications/initialized" => Ok(Value::Null),
        "tools/list" => Ok(json!({ "tools": tools::tool_definitions() })),
        "tools/call" => Ok(call_tool(ctx, request.params.as_ref()).await),
        unknown => Err(format!("no such method: {unknown}")),
    };

    if !request.wants_reply() {
        return None;
    }
    let id = request.id.unwrap_or(Value::Null);
    Some(match outcome {
        Ok(result) => RpcReply::result(id, result),
        Err(message) => RpcReply::error(id, CODE_METHOD_NOT_FOUND, message),
    })
}

fn hello() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "rollcall",
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// Invoke a tool and wrap its payload as MCP text content. The payload's
/// own success flag drives `isError`; a failed tool is not a protocol
/// fault.
async fn call_tool(ctx: &Context, params: Option<&Value>) -> Value {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let payload = tools::execute_tool(ctx, name, &arguments).await;
    let succeeded = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let rendered =
        serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());

    json!({
        "content": [{ "type": "text", "text": rendered }],
        "isError": !succeeded
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_reply_omits_the_error_field() {
        let reply = RpcReply::result(json!(7), json!({ "pong": true }));
        let wire = serde_json::to_string(&reply).unwrap();
        assert!(wire.contains(r#""jsonrpc":"2.0""#));
        assert!(wire.contains(r#""pong":true"#));
        assert!(!wire.contains("error"));
    }

    #[test]
    fn error_reply_omits_the_result_field() {
        let reply = RpcReply::error(json!(8), CODE_METHOD_NOT_FOUND, "no such method: x".into());
        let wire = serde_json::to_string(&reply).unwrap();
        assert!(wire.contains("-32601"));
        assert!(wire.contains("no such method: x"));
        assert!(!wire.contains("result"));
    }

    #[test]
    fn requests_without_an_id_are_notifications() {
        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(!req.wants_reply());

        let req: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert!(req.wants_reply());
        assert_eq!(req.method, "tools/list");
    }
}
