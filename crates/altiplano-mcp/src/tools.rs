//! Tool definitions and dispatch.
//!
//! Each tool is a thin request builder: resolve a bearer token through the
//! auth gate (legacy IP tools excepted), shape the payload, issue one API
//! call, and pass the controller's JSON straight through. Failures come
//! back as `isError` tool results; nothing here ever aborts the server.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use altiplano_core::api::ApiClient;
use altiplano_core::auth::AuthGate;
use altiplano_core::intents::{
    self, L2UserVlan, OntType, VlanMode, DEFAULT_FIBER_NAME, DEFAULT_INFRA_TARGET,
    DEFAULT_INTERNET_TARGET, DEFAULT_NNI_ID, DEFAULT_ONT_TARGET, DEFAULT_SERIAL_NUMBER,
    DEFAULT_SYNC_TARGET,
};

use crate::protocol::{CallToolResponse, ToolDefinition};

/// Routes tool calls to the API client. Constructed once in `main` and
/// shared by reference; holds no mutable state of its own.
pub struct ToolRouter {
    api: Arc<ApiClient>,
    gate: Arc<AuthGate>,
}

impl ToolRouter {
    pub fn new(api: Arc<ApiClient>, gate: Arc<AuthGate>) -> Self {
        Self { api, gate }
    }

    /// Dispatch a tool call. Returns `None` for an unknown tool name so
    /// the server can answer with a protocol-level error.
    pub async fn call(&self, name: &str, args: &Value) -> Option<CallToolResponse> {
        if !KNOWN_TOOLS.contains(&name) {
            return None;
        }
        debug!(tool = name, "dispatching tool call");

        let result = self.run(name, args).await;
        Some(match result {
            Ok(value) => CallToolResponse::json(value),
            Err(e) => CallToolResponse::failure(e.to_string()),
        })
    }

    async fn run(&self, name: &str, args: &Value) -> anyhow::Result<Value> {
        match name {
            // ===== Authentication =====
            "get_access_token" => {
                let login = self
                    .gate
                    .login_and_cache(str_arg(args, "username"), str_arg(args, "password"))
                    .await?;
                Ok(json!({
                    "access_token": login.access_token,
                    "refresh_token": login.refresh_token,
                    "expires_in": login.expires_in,
                }))
            }
            "authenticate_with_cached_token" => {
                let token = self.gate.ensure_token(None).await?;
                Ok(json!({ "access_token": token }))
            }
            "get_cached_token_info" => Ok(serde_json::to_value(self.gate.cache().info())?),
            "clear_cached_token" => {
                self.gate.cache().clear()?;
                Ok(json!({ "status": "cleared" }))
            }

            // ===== ONT creation =====
            "add_ont_bridge" => self.create_ont(args, OntType::Bridge).await,
            "add_ont_transparent" => self.create_ont(args, OntType::Transparent).await,

            // ===== L2-user creation =====
            "add_l2_user_hsi" => {
                let vlan = L2UserVlan::Tagged(vlan_arg(args, "q_vlan_id", 11));
                self.create_l2_user(args, "HSI-11#MED-03", "MED-03", "MED-03", vlan)
                    .await
            }
            "add_l2_user_untagged" => {
                self.create_l2_user(args, "HSI-11#MED-01", "MED-01", "MED-01", L2UserVlan::Untagged)
                    .await
            }
            "add_l2_user_transparent" => {
                let vlan = L2UserVlan::Transparent(vlan_arg(args, "transparent_q_vlan_id", 15));
                self.create_l2_user(args, DEFAULT_INTERNET_TARGET, "MED-01", "MED-01", vlan)
                    .await
            }

            // ===== L2 infrastructure =====
            "create_residential_bridge_transparent" => {
                let vlan_id = vlan_arg(args, "c_vlan_id", 15);
                self.create_infra(args, VlanMode::ResidentialBridge, vlan_id)
                    .await
            }
            "create_cross_connect" => {
                let vlan_id = vlan_arg(args, "s_vlan_id", 15);
                self.create_infra(args, VlanMode::CrossConnect, vlan_id).await
            }
            "create_s_vlan_cross_connect" => {
                let vlan_id = vlan_arg(args, "s_vlan_id", 15);
                self.create_infra(args, VlanMode::SVlanCrossConnect, vlan_id)
                    .await
            }

            // ===== Deletion =====
            "delete_internet" => {
                self.delete(args, "l2-user", DEFAULT_INTERNET_TARGET).await
            }
            "delete_ont" => self.delete(args, "ont", DEFAULT_ONT_TARGET).await,
            "delete_infrastructure" => {
                self.delete(args, "l2-infra", DEFAULT_INFRA_TARGET).await
            }

            // ===== Reads and sync =====
            "get_l2_user" => {
                let token = self.token_for(args).await?;
                let target = str_arg(args, "intent_target").unwrap_or(DEFAULT_INTERNET_TARGET);
                let key = format!("{},l2-user", target);
                Ok(self.api.get_intent(&token, &key).await?)
            }
            "sync_device_config" => {
                let token = self.token_for(args).await?;
                let key = str_arg(args, "intent_target").unwrap_or(DEFAULT_SYNC_TARGET);
                Ok(self.api.sync_intent(&token, key).await?)
            }

            // ===== Legacy IP-prefix tools (no controller auth) =====
            "add_ip" => {
                let (name, prefix) = prefix_args(args)?;
                Ok(self.api.add_ip_prefix(name, prefix).await?)
            }
            "delete_ip" => {
                let (name, prefix) = prefix_args(args)?;
                Ok(self.api.delete_ip_prefix(name, prefix).await?)
            }
            "get_public_ip" => Ok(self.api.public_ip().await?),

            // Unreachable: `call` filters on KNOWN_TOOLS first.
            _ => anyhow::bail!("tool not found: {}", name),
        }
    }

    async fn token_for(&self, args: &Value) -> anyhow::Result<String> {
        Ok(self.gate.ensure_token(str_arg(args, "access_token")).await?)
    }

    async fn create_ont(&self, args: &Value, ont_type: OntType) -> anyhow::Result<Value> {
        let token = self.token_for(args).await?;
        let payload = intents::ont(
            ont_type,
            str_arg(args, "target").unwrap_or(DEFAULT_ONT_TARGET),
            str_arg(args, "serial_number").unwrap_or(DEFAULT_SERIAL_NUMBER),
            str_arg(args, "fiber_name").unwrap_or(DEFAULT_FIBER_NAME),
        );
        Ok(self.api.create_intent(&token, &payload).await?)
    }

    async fn create_l2_user(
        &self,
        args: &Value,
        default_target: &str,
        default_device: &str,
        default_customer: &str,
        vlan: L2UserVlan,
    ) -> anyhow::Result<Value> {
        let token = self.token_for(args).await?;
        let payload = intents::l2_user(
            str_arg(args, "target").unwrap_or(default_target),
            str_arg(args, "user_device_name").unwrap_or(default_device),
            str_arg(args, "customer_id").unwrap_or(default_customer),
            vlan,
        );
        Ok(self.api.create_intent(&token, &payload).await?)
    }

    async fn create_infra(
        &self,
        args: &Value,
        mode: VlanMode,
        vlan_id: u16,
    ) -> anyhow::Result<Value> {
        let token = self.token_for(args).await?;
        let payload = intents::l2_infra(
            mode,
            str_arg(args, "target").unwrap_or(DEFAULT_INFRA_TARGET),
            str_arg(args, "nni_id").unwrap_or(DEFAULT_NNI_ID),
            vlan_id,
        );
        Ok(self.api.create_intent(&token, &payload).await?)
    }

    async fn delete(
        &self,
        args: &Value,
        intent_type: &str,
        default_target: &str,
    ) -> anyhow::Result<Value> {
        let token = self.token_for(args).await?;
        let target = str_arg(args, "target").unwrap_or(default_target);
        Ok(self.api.delete_intent(&token, intent_type, target).await?)
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn vlan_arg(args: &Value, key: &str, default: u16) -> u16 {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(default)
}

fn prefix_args(args: &Value) -> anyhow::Result<(&str, &str)> {
    match (str_arg(args, "prefix_name"), str_arg(args, "prefix")) {
        (Some(name), Some(prefix)) => Ok((name, prefix)),
        _ => anyhow::bail!("missing required parameters: prefix_name, prefix"),
    }
}

const KNOWN_TOOLS: &[&str] = &[
    "get_access_token",
    "authenticate_with_cached_token",
    "get_cached_token_info",
    "clear_cached_token",
    "add_ont_bridge",
    "add_ont_transparent",
    "add_l2_user_hsi",
    "add_l2_user_untagged",
    "add_l2_user_transparent",
    "create_residential_bridge_transparent",
    "create_cross_connect",
    "create_s_vlan_cross_connect",
    "delete_internet",
    "delete_ont",
    "delete_infrastructure",
    "get_l2_user",
    "sync_device_config",
    "add_ip",
    "delete_ip",
    "get_public_ip",
];

/// Static tool catalog served by `tools/list`.
pub fn definitions() -> Vec<ToolDefinition> {
    let token = json!({"type": "string", "description": "Bearer token; omit to use the cached or freshly obtained token"});
    let target = |default: &str| {
        json!({"type": "string", "description": format!("Intent target (default: {})", default)})
    };

    vec![
        tool(
            "get_access_token",
            "Authenticate against the controller and cache the access token",
            json!({
                "username": {"type": "string", "description": "Username (defaults to configured credentials)"},
                "password": {"type": "string", "description": "Password (defaults to configured credentials)"}
            }),
            &[],
        ),
        tool(
            "authenticate_with_cached_token",
            "Return the cached access token, re-authenticating with default credentials if needed",
            json!({}),
            &[],
        ),
        tool(
            "get_cached_token_info",
            "Report the cached token's validity and expiry",
            json!({}),
            &[],
        ),
        tool(
            "clear_cached_token",
            "Remove the cached access token",
            json!({}),
            &[],
        ),
        tool(
            "add_ont_bridge",
            "Create an ONT intent with bridge type",
            json!({
                "access_token": token,
                "target": target(DEFAULT_ONT_TARGET),
                "serial_number": {"type": "string", "description": format!("ONT serial number (default: {})", DEFAULT_SERIAL_NUMBER)},
                "fiber_name": {"type": "string", "description": format!("Fiber name (default: {})", DEFAULT_FIBER_NAME)}
            }),
            &[],
        ),
        tool(
            "add_ont_transparent",
            "Create an ONT intent with transparent type",
            json!({
                "access_token": token,
                "target": target(DEFAULT_ONT_TARGET),
                "serial_number": {"type": "string", "description": format!("ONT serial number (default: {})", DEFAULT_SERIAL_NUMBER)},
                "fiber_name": {"type": "string", "description": format!("Fiber name (default: {})", DEFAULT_FIBER_NAME)}
            }),
            &[],
        ),
        tool(
            "add_l2_user_hsi",
            "Create an L2-user intent with HSI (tagged) configuration",
            json!({
                "access_token": token,
                "target": target("HSI-11#MED-03"),
                "user_device_name": {"type": "string", "description": "User device name (default: MED-03)"},
                "customer_id": {"type": "string", "description": "Customer identifier (default: MED-03)"},
                "q_vlan_id": {"type": "integer", "description": "Q-VLAN ID (default: 11)"}
            }),
            &[],
        ),
        tool(
            "add_l2_user_untagged",
            "Create an L2-user intent with an untagged subscriber port",
            json!({
                "access_token": token,
                "target": target("HSI-11#MED-01"),
                "user_device_name": {"type": "string", "description": "User device name (default: MED-01)"},
                "customer_id": {"type": "string", "description": "Customer identifier (default: MED-01)"}
            }),
            &[],
        ),
        tool(
            "add_l2_user_transparent",
            "Create an L2-user intent with transparent VLAN handling",
            json!({
                "access_token": token,
                "target": target(DEFAULT_INTERNET_TARGET),
                "user_device_name": {"type": "string", "description": "User device name (default: MED-01)"},
                "customer_id": {"type": "string", "description": "Customer identifier (default: MED-01)"},
                "transparent_q_vlan_id": {"type": "integer", "description": "Transparent Q-VLAN ID (default: 15)"}
            }),
            &[],
        ),
        tool(
            "create_residential_bridge_transparent",
            "Create an L2 infrastructure intent in residential-bridge mode",
            json!({
                "access_token": token,
                "target": target(DEFAULT_INFRA_TARGET),
                "nni_id": {"type": "string", "description": format!("NNI identifier (default: {})", DEFAULT_NNI_ID)},
                "c_vlan_id": {"type": "integer", "description": "C-VLAN ID (default: 15)"}
            }),
            &[],
        ),
        tool(
            "create_cross_connect",
            "Create an L2 infrastructure intent in cross-connect mode",
            json!({
                "access_token": token,
                "target": target(DEFAULT_INFRA_TARGET),
                "nni_id": {"type": "string", "description": format!("NNI identifier (default: {})", DEFAULT_NNI_ID)},
                "s_vlan_id": {"type": "integer", "description": "S-VLAN ID (default: 15)"}
            }),
            &[],
        ),
        tool(
            "create_s_vlan_cross_connect",
            "Create an L2 infrastructure intent in s-vlan-cross-connect mode",
            json!({
                "access_token": token,
                "target": target(DEFAULT_INFRA_TARGET),
                "nni_id": {"type": "string", "description": format!("NNI identifier (default: {})", DEFAULT_NNI_ID)},
                "s_vlan_id": {"type": "integer", "description": "S-VLAN ID (default: 15)"}
            }),
            &[],
        ),
        tool(
            "delete_internet",
            "Delete the Internet (l2-user) intent from network and controller",
            json!({ "access_token": token, "target": target(DEFAULT_INTERNET_TARGET) }),
            &[],
        ),
        tool(
            "delete_ont",
            "Delete the ONT intent from network and controller",
            json!({ "access_token": token, "target": target(DEFAULT_ONT_TARGET) }),
            &[],
        ),
        tool(
            "delete_infrastructure",
            "Delete the L2 infrastructure intent from network and controller",
            json!({ "access_token": token, "target": target(DEFAULT_INFRA_TARGET) }),
            &[],
        ),
        tool(
            "get_l2_user",
            "Read an L2-user intent from the controller",
            json!({ "access_token": token, "intent_target": target(DEFAULT_INTERNET_TARGET) }),
            &[],
        ),
        tool(
            "sync_device_config",
            "Trigger synchronization of a device-config intent",
            json!({ "access_token": token, "intent_target": target(DEFAULT_SYNC_TARGET) }),
            &[],
        ),
        tool(
            "add_ip",
            "Add an IP prefix through the legacy sidecar service",
            json!({
                "prefix_name": {"type": "string", "description": "Name of the IP prefix list entry"},
                "prefix": {"type": "string", "description": "IP prefix in CIDR notation"}
            }),
            &["prefix_name", "prefix"],
        ),
        tool(
            "delete_ip",
            "Delete an IP prefix through the legacy sidecar service",
            json!({
                "prefix_name": {"type": "string", "description": "Name of the IP prefix list entry"},
                "prefix": {"type": "string", "description": "IP prefix in CIDR notation"}
            }),
            &["prefix_name", "prefix"],
        ),
        tool(
            "get_public_ip",
            "Get the public IP address of this server",
            json!({}),
            &[],
        ),
    ]
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}
