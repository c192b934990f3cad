//! Core domain types for the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Command status values recorded by the scheduler.
pub mod status {
    /// Command dispatched to an agent, no result yet
    pub const SENT: &str = "sent";
    /// Command completed and returned results
    pub const SUCCESS: &str = "success";
    /// Command cancelled before completion
    pub const CANCELLED: &str = "cancelled";
    /// Command expired before the agent picked it up
    pub const EXPIRED: &str = "expired";
    /// Command failed on the agent
    pub const FAILED: &str = "failed";
    /// Command timed out waiting for results
    pub const TIMEOUT: &str = "timeout";
}

/// Free-form description attached to an action by its author
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDescription {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub revision: f64,
}

/// Threat classification of an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    #[serde(default, rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub family: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// One module invocation carried by an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub parameters: JsonValue,
}

/// Per-status command counts for an action, derived from the commands table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounters {
    #[serde(default)]
    pub sent: i64,
    #[serde(default)]
    pub done: i64,
    #[serde(default, rename = "inflight")]
    pub in_flight: i64,
    #[serde(default)]
    pub success: i64,
    #[serde(default)]
    pub cancelled: i64,
    #[serde(default)]
    pub expired: i64,
    #[serde(default)]
    pub failed: i64,
    #[serde(default)]
    pub timeout: i64,
}

/// A signed investigation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub name: String,
    pub target: String,
    pub description: ActionDescription,
    pub threat: Threat,
    pub operations: Vec<Operation>,
    #[serde(rename = "validfrom")]
    pub valid_from: DateTime<Utc>,
    #[serde(rename = "expireafter")]
    pub expire_after: DateTime<Utc>,
    #[serde(rename = "starttime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "finishtime")]
    pub finish_time: DateTime<Utc>,
    #[serde(rename = "lastupdatetime")]
    pub last_update_time: DateTime<Utc>,
    pub status: String,
    #[serde(rename = "pgpsignatures")]
    pub pgp_signatures: Vec<String>,
    #[serde(rename = "syntaxversion")]
    pub syntax_version: i32,
    pub counters: ActionCounters,
    pub investigators: Vec<Investigator>,
}

impl Default for Action {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            target: String::new(),
            description: ActionDescription::default(),
            threat: Threat::default(),
            operations: Vec::new(),
            valid_from: DateTime::<Utc>::UNIX_EPOCH,
            expire_after: DateTime::<Utc>::UNIX_EPOCH,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            finish_time: DateTime::<Utc>::UNIX_EPOCH,
            last_update_time: DateTime::<Utc>::UNIX_EPOCH,
            status: String::new(),
            pgp_signatures: Vec::new(),
            syntax_version: 0,
            counters: ActionCounters::default(),
            investigators: Vec::new(),
        }
    }
}

/// Structured result returned by one module run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default, rename = "foundanything")]
    pub found_anything: bool,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub elements: JsonValue,
    #[serde(default)]
    pub statistics: JsonValue,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// One execution of an action on one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: i64,
    pub status: String,
    pub results: Vec<CommandResult>,
    #[serde(rename = "starttime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "finishtime")]
    pub finish_time: DateTime<Utc>,
    pub action: Action,
    pub agent: Agent,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            id: 0,
            status: String::new(),
            results: Vec::new(),
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            finish_time: DateTime::<Utc>::UNIX_EPOCH,
            action: Action::default(),
            agent: Agent::default(),
        }
    }
}

/// Runtime environment reported by an agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEnvironment {
    #[serde(default)]
    pub init: String,
    #[serde(default)]
    pub ident: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default, rename = "isproxied")]
    pub is_proxied: bool,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default, rename = "publicip")]
    pub public_ip: String,
}

/// An endpoint running the investigation agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    #[serde(rename = "queueloc")]
    pub queue_loc: String,
    pub mode: String,
    pub version: String,
    pub pid: i32,
    #[serde(rename = "starttime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "destructiontime")]
    pub destruction_time: DateTime<Utc>,
    #[serde(rename = "heartbeattime")]
    pub heartbeat_time: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub tags: JsonValue,
    #[serde(default)]
    pub environment: AgentEnvironment,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            queue_loc: String::new(),
            mode: String::new(),
            version: String::new(),
            pid: 0,
            start_time: DateTime::<Utc>::UNIX_EPOCH,
            destruction_time: DateTime::<Utc>::UNIX_EPOCH,
            heartbeat_time: DateTime::<Utc>::UNIX_EPOCH,
            status: String::new(),
            tags: JsonValue::Null,
            environment: AgentEnvironment::default(),
        }
    }
}

/// A human investigator who signs actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigator {
    pub id: i64,
    pub name: String,
    #[serde(rename = "pgpfingerprint")]
    pub pgp_fingerprint: String,
    pub status: String,
    #[serde(rename = "createdat")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastmodified")]
    pub last_modified: DateTime<Utc>,
}

impl Default for Investigator {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            pgp_fingerprint: String::new(),
            status: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            last_modified: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_deserializes_with_missing_fields() {
        let result: CommandResult = serde_json::from_str(r#"{"foundanything":true}"#).unwrap();
        assert!(result.found_anything);
        assert!(!result.success);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn threat_maps_reserved_field_names() {
        let threat: Threat =
            serde_json::from_str(r#"{"ref":"T2","level":"high","family":"malware","type":"rootkit"}"#)
                .unwrap();
        assert_eq!(threat.reference, "T2");
        assert_eq!(threat.kind, "rootkit");
    }

    #[test]
    fn counters_default_to_zero() {
        let counters = ActionCounters::default();
        assert_eq!(counters.sent, 0);
        assert_eq!(counters.done, 0);
    }
}
