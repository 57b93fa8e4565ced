// src/mcp/mod.rs
pub mod handler;
pub mod protocol;
