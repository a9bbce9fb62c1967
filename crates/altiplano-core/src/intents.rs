//! Intent payload builders for the controller's ibn endpoints.
//!
//! Each builder produces the yang-data JSON body for one intent shape.
//! The defaults mirror the lab deployment these tools were written for:
//! one OLT (`OLT1`), one HSI infrastructure, and ONTs named after the
//! `MED-*` user devices.

use serde_json::{json, Value};

// ============================================================================
// Defaults and versions
// ============================================================================

pub const DEFAULT_INTERNET_TARGET: &str = "HSI#MED-03";
pub const DEFAULT_ONT_TARGET: &str = "MED-03";
pub const DEFAULT_INFRA_TARGET: &str = "OLT1#HSI";
pub const DEFAULT_SYNC_TARGET: &str = "OLT1,device-config-fx";

pub const DEFAULT_SERIAL_NUMBER: &str = "ALCLFCA06F4B";
pub const DEFAULT_FIBER_NAME: &str = "PON1_OLT1";
pub const DEFAULT_NNI_ID: &str = "nt-a:xfp:1";

/// Intent-type versions deployed on the controller. Bump these when the
/// controller's intent catalogs are upgraded.
const ONT_INTENT_VERSION: &str = "10";
const L2_USER_INTENT_VERSION: &str = "13";
const L2_INFRA_INTENT_VERSION: &str = "12";

const INTERNET_SERVICE_PROFILE: &str = "INTERNET_TC0";
const SPEED_PROFILE: &str = "PLAN_100M";
const UNICAST_PROFILE: &str = "Unicast";
const UNICAST_L2CP_PROFILE: &str = "Unicast-l2cp-pass";
const ONU_SERVICE_PROFILE: &str = "default-by-l2-user";
const UNI_ID: &str = "LAN1";

// ============================================================================
// ONT intents
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OntType {
    Bridge,
    Transparent,
}

impl OntType {
    fn wire_value(self) -> &'static str {
        match self {
            OntType::Bridge => "bridge",
            // The controller's ont intent model spells this variant in
            // Spanish; "transparent" is rejected.
            OntType::Transparent => "transparente",
        }
    }
}

/// Body for creating an ONT intent.
pub fn ont(ont_type: OntType, target: &str, serial_number: &str, fiber_name: &str) -> Value {
    json!({
        "ibn:intent": {
            "target": target,
            "intent-type": "ont",
            "intent-specific-data": {
                "ont:ont": {
                    "ont-type": ont_type.wire_value(),
                    "from-device-mapping": [null],
                    "onu-service-profile": ONU_SERVICE_PROFILE,
                    "pon-type": "gpon",
                    "expected-serial-number": serial_number,
                    "uni-service-configuration": [
                        {
                            "service-profile": ONU_SERVICE_PROFILE,
                            "uni-id": UNI_ID
                        }
                    ],
                    "fiber-name": fiber_name
                }
            },
            "intent-type-version": ONT_INTENT_VERSION,
            "required-network-state": "active"
        }
    })
}

// ============================================================================
// L2-user intents
// ============================================================================

/// VLAN handling for an L2-user subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2UserVlan {
    /// Single-tagged with the given Q-VLAN id.
    Tagged(u16),
    /// Untagged subscriber port.
    Untagged,
    /// Transparent handling of the given Q-VLAN id.
    Transparent(u16),
}

/// Body for creating an L2-user (HSI subscriber) intent.
pub fn l2_user(target: &str, user_device_name: &str, customer_id: &str, vlan: L2UserVlan) -> Value {
    let mut data = json!({
        "l2-infra": "HSI",
        "service-profile": INTERNET_SERVICE_PROFILE,
        "speed-profile": SPEED_PROFILE,
        "user-device-name": user_device_name,
        "customer-id": customer_id,
        "uni-id": UNI_ID
    });

    // The three VLAN modes are mutually exclusive leaves in the model.
    match vlan {
        L2UserVlan::Tagged(q_vlan_id) => {
            data["q-vlan-id"] = json!(q_vlan_id);
        }
        L2UserVlan::Untagged => {
            data["untagged"] = json!([null]);
        }
        L2UserVlan::Transparent(q_vlan_id) => {
            data["transparent-q-vlan-id"] = json!(q_vlan_id);
        }
    }

    json!({
        "ibn:intent": {
            "target": target,
            "intent-type": "l2-user",
            "intent-specific-data": {
                "l2-user:l2-user": data
            },
            "intent-type-version": L2_USER_INTENT_VERSION,
            "required-network-state": "active"
        }
    })
}

// ============================================================================
// L2-infra intents
// ============================================================================

/// Forwarding mode for an L2 infrastructure intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanMode {
    ResidentialBridge,
    CrossConnect,
    SVlanCrossConnect,
}

impl VlanMode {
    fn wire_value(self) -> &'static str {
        match self {
            VlanMode::ResidentialBridge => "residential-bridge",
            VlanMode::CrossConnect => "cross-connect",
            VlanMode::SVlanCrossConnect => "s-vlan-cross-connect",
        }
    }
}

/// Body for creating an L2 infrastructure intent. Residential bridges
/// carry a C-VLAN and pass L2CP; both cross-connect modes carry an S-VLAN.
pub fn l2_infra(mode: VlanMode, target: &str, nni_id: &str, vlan_id: u16) -> Value {
    let mut data = json!({
        "nni-id": nni_id,
        "none": [null],
        "forwarder-profile": UNICAST_PROFILE,
        "vlan-mode": mode.wire_value()
    });

    match mode {
        VlanMode::ResidentialBridge => {
            data["c-vlan-id"] = json!(vlan_id);
            data["service-profile"] = json!(UNICAST_L2CP_PROFILE);
        }
        VlanMode::CrossConnect | VlanMode::SVlanCrossConnect => {
            data["s-vlan-id"] = json!(vlan_id);
            data["service-profile"] = json!(UNICAST_PROFILE);
        }
    }

    json!({
        "ibn:intent": {
            "target": target,
            "intent-type": "l2-infra",
            "intent-specific-data": {
                "l2-infra:l2-infra": data
            },
            "intent-type-version": L2_INFRA_INTENT_VERSION,
            "required-network-state": "active"
        }
    })
}
