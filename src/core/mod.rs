//! Core domain modules
pub mod types;

// Re-export common types
pub use types::{
    Action, ActionCounters, ActionDescription, Agent, AgentEnvironment, Command, CommandResult,
    Investigator, Operation, Threat,
};
