//! Sage Core Library
//!
//! Agents, model clients, storage and the HTTP API for the Sage service.

pub mod agent;
pub mod agents;
pub mod api;
pub mod bedrock;
pub mod config;
pub mod db;
pub mod knowledge;
pub mod model;
pub mod storage;
pub mod tools;

// Re-export key types for convenience
pub use agent::{Agent, AgentBuilder, RunResponse, Tool, ToolRegistry, ToolResult};
pub use agents::{AgentContext, AgentOptions, AgentType};
pub use config::{AgentSettings, Config};
pub use model::{ModelClient, ModelId, ModelProvider};
