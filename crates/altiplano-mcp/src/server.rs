//! MCP server over stdio.
//!
//! Reads one JSON-RPC request per line from stdin and writes one response
//! per line to stdout. Logging goes to stderr so the protocol stream stays
//! clean.

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse};
use crate::tools::{self, ToolRouter};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct McpServer {
    router: ToolRouter,
}

impl McpServer {
    pub fn new(router: ToolRouter) -> Self {
        Self { router }
    }

    /// Serve requests from stdin until it closes or a shutdown request
    /// arrives.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        info!("MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "unparseable request");
                    let response =
                        JsonRpcResponse::error(None, PARSE_ERROR, format!("parse error: {}", e));
                    write_response(&mut stdout, &response).await?;
                    continue;
                }
            };

            let shutdown = request.method == "shutdown";
            if let Some(response) = self.handle_request(request).await {
                write_response(&mut stdout, &response).await?;
            }
            if shutdown {
                info!("shutdown requested");
                break;
            }
        }

        Ok(())
    }

    /// Handle one request. Notifications (no id) produce no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "handling request");

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                request.id.clone(),
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": "altiplano-mcp",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "notifications/initialized" | "initialized" => return None,
            "tools/list" => JsonRpcResponse::success(
                request.id.clone(),
                json!({ "tools": tools::definitions() }),
            ),
            "tools/call" => self.handle_tool_call(request.id.clone(), request.params).await,
            "shutdown" => JsonRpcResponse::success(request.id.clone(), Value::Null),
            "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
            other => JsonRpcResponse::error(
                request.id.clone(),
                METHOD_NOT_FOUND,
                format!("method not found: {}", other),
            ),
        };

        // Notifications get no reply even when the method matched.
        if request.id.is_none() {
            return None;
        }
        Some(response)
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, "missing params");
            }
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {}", e));
            }
        };

        match self.router.call(&params.name, &params.arguments).await {
            Some(response) => match serde_json::to_value(&response) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("unserializable tool result: {}", e),
                ),
            },
            None => JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("unknown tool: {}", params.name),
            ),
        }
    }
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> Result<(), McpError> {
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    stdout.write_all(&encoded).await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use altiplano_core::api::ApiClient;
    use altiplano_core::auth::{AuthGate, TokenCache};
    use altiplano_core::Config;

    fn server(dir: &tempfile::TempDir) -> McpServer {
        let config = Config {
            token_cache_file: Some(dir.path().join("token_cache.json")),
            ..Config::default()
        };
        let api = Arc::new(ApiClient::new(&config).unwrap());
        let cache = Arc::new(TokenCache::new(config.token_cache_path().unwrap()));
        let gate = Arc::new(AuthGate::new(cache, api.clone(), None));
        McpServer::new(ToolRouter::new(api, gate))
    }

    fn request(id: u64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(&dir)
            .handle_request(request(1, "initialize", None))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "altiplano-mcp");
    }

    #[tokio::test]
    async fn tools_list_returns_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(&dir)
            .handle_request(request(2, "tools/list", None))
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, tools::definitions().len());
    }

    #[tokio::test]
    async fn unknown_method_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(&dir)
            .handle_request(request(3, "resources/list", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_tool_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(&dir)
            .handle_request(request(
                4,
                "tools/call",
                Some(json!({"name": "no_such_tool", "arguments": {}})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn initialized_notification_has_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        assert!(server(&dir).handle_request(request).await.is_none());
    }

    #[tokio::test]
    async fn tool_errors_are_results_not_protocol_errors() {
        let dir = tempfile::tempdir().unwrap();
        let response = server(&dir)
            .handle_request(request(
                5,
                "tools/call",
                Some(json!({"name": "add_ip", "arguments": {}})),
            ))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
    }
}
