//! Row hydration: scalar scans plus per-column sub-document decoding.
//!
//! Structured columns come back as opaque JSON values and are deserialized
//! independently; the first failure aborts the whole call. Agent tags are
//! the one exception: they have no schema and are carried as raw JSON, so
//! they can only fail at the scan step. Column positions must match the
//! projections assembled in [`crate::search`].

use crate::core::types::{
    Action, ActionDescription, Agent, AgentEnvironment, Command, CommandResult, Investigator,
    Operation, Threat,
};
use crate::database::Error;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::{Row, postgres::PgRow};

fn decode<T: DeserializeOwned>(column: &'static str, value: JsonValue) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Decode { column, source: e })
}

/// Hydrates one row of the actions projection. Counters and investigators
/// are filled by the caller's enrichment pass.
pub(crate) fn scan_action(row: &PgRow) -> Result<Action, Error> {
    let description: JsonValue = row.try_get(3).map_err(Error::Scan)?;
    let threat: JsonValue = row.try_get(4).map_err(Error::Scan)?;
    let operations: JsonValue = row.try_get(5).map_err(Error::Scan)?;
    let signatures: JsonValue = row.try_get(12).map_err(Error::Scan)?;

    Ok(Action {
        id: row.try_get(0).map_err(Error::Scan)?,
        name: row.try_get(1).map_err(Error::Scan)?,
        target: row.try_get(2).map_err(Error::Scan)?,
        description: decode::<ActionDescription>("action description", description)?,
        threat: decode::<Threat>("action threat", threat)?,
        operations: decode::<Vec<Operation>>("action operations", operations)?,
        valid_from: row.try_get(6).map_err(Error::Scan)?,
        expire_after: row.try_get(7).map_err(Error::Scan)?,
        start_time: row.try_get(8).map_err(Error::Scan)?,
        finish_time: row.try_get(9).map_err(Error::Scan)?,
        last_update_time: row.try_get(10).map_err(Error::Scan)?,
        status: row.try_get(11).map_err(Error::Scan)?,
        pgp_signatures: decode::<Vec<String>>("action signatures", signatures)?,
        syntax_version: row.try_get(13).map_err(Error::Scan)?,
        ..Action::default()
    })
}

/// Hydrates one row of the commands projection, including the embedded
/// action and agent context columns.
pub(crate) fn scan_command(row: &PgRow) -> Result<Command, Error> {
    let results: JsonValue = row.try_get(2).map_err(Error::Scan)?;
    let description: JsonValue = row.try_get(8).map_err(Error::Scan)?;
    let threat: JsonValue = row.try_get(9).map_err(Error::Scan)?;
    let operations: JsonValue = row.try_get(10).map_err(Error::Scan)?;
    let signatures: JsonValue = row.try_get(13).map_err(Error::Scan)?;
    let tags: JsonValue = row.try_get(18).map_err(Error::Scan)?;
    let environment: JsonValue = row.try_get(19).map_err(Error::Scan)?;

    let action = Action {
        id: row.try_get(5).map_err(Error::Scan)?,
        name: row.try_get(6).map_err(Error::Scan)?,
        target: row.try_get(7).map_err(Error::Scan)?,
        description: decode::<ActionDescription>("action description", description)?,
        threat: decode::<Threat>("action threat", threat)?,
        operations: decode::<Vec<Operation>>("action operations", operations)?,
        valid_from: row.try_get(11).map_err(Error::Scan)?,
        expire_after: row.try_get(12).map_err(Error::Scan)?,
        pgp_signatures: decode::<Vec<String>>("action signatures", signatures)?,
        syntax_version: row.try_get(14).map_err(Error::Scan)?,
        ..Action::default()
    };

    let agent = Agent {
        id: row.try_get(15).map_err(Error::Scan)?,
        name: row.try_get(16).map_err(Error::Scan)?,
        version: row.try_get(17).map_err(Error::Scan)?,
        tags,
        environment: decode::<AgentEnvironment>("agent environment", environment)?,
        ..Agent::default()
    };

    Ok(Command {
        id: row.try_get(0).map_err(Error::Scan)?,
        status: row.try_get(1).map_err(Error::Scan)?,
        results: decode::<Vec<CommandResult>>("command results", results)?,
        start_time: row.try_get(3).map_err(Error::Scan)?,
        finish_time: row.try_get(4).map_err(Error::Scan)?,
        action,
        agent,
    })
}

/// Hydrates one row of the agents projection.
pub(crate) fn scan_agent(row: &PgRow) -> Result<Agent, Error> {
    Ok(Agent {
        id: row.try_get(0).map_err(Error::Scan)?,
        name: row.try_get(1).map_err(Error::Scan)?,
        queue_loc: row.try_get(2).map_err(Error::Scan)?,
        mode: row.try_get(3).map_err(Error::Scan)?,
        version: row.try_get(4).map_err(Error::Scan)?,
        pid: row.try_get(5).map_err(Error::Scan)?,
        start_time: row.try_get(6).map_err(Error::Scan)?,
        destruction_time: row.try_get(7).map_err(Error::Scan)?,
        heartbeat_time: row.try_get(8).map_err(Error::Scan)?,
        status: row.try_get(9).map_err(Error::Scan)?,
        ..Agent::default()
    })
}

/// Hydrates one row of the investigators projection.
pub(crate) fn scan_investigator(row: &PgRow) -> Result<Investigator, Error> {
    Ok(Investigator {
        id: row.try_get(0).map_err(Error::Scan)?,
        name: row.try_get(1).map_err(Error::Scan)?,
        pgp_fingerprint: row.try_get(2).map_err(Error::Scan)?,
        status: row.try_get(3).map_err(Error::Scan)?,
        created_at: row.try_get(4).map_err(Error::Scan)?,
        last_modified: row.try_get(5).map_err(Error::Scan)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_reports_the_failing_column() {
        let err = decode::<Vec<CommandResult>>("command results", json!({"not": "an array"}))
            .unwrap_err();
        match err {
            Error::Decode { column, .. } => assert_eq!(column, "command results"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_accepts_sparse_sub_documents() {
        let threat: Threat = decode("action threat", json!({"family": "malware"})).unwrap();
        assert_eq!(threat.family, "malware");
        assert_eq!(threat.level, "");

        let results: Vec<CommandResult> =
            decode("command results", json!([{"foundanything": true}])).unwrap();
        assert!(results[0].found_anything);
    }

    #[test]
    fn decode_environment_with_addresses() {
        let env: AgentEnvironment = decode(
            "agent environment",
            json!({"os": "linux", "arch": "x86_64", "addresses": ["10.0.0.2/24"]}),
        )
        .unwrap();
        assert_eq!(env.os, "linux");
        assert_eq!(env.addresses, vec!["10.0.0.2/24"]);
    }
}
