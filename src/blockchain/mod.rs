// src/blockchain/mod.rs

pub mod cache;
pub mod client;
pub use client::{ChainReader, EvmClient};

pub mod error;
pub use error::{Error, Result};

pub mod models;
pub mod services;

// Re-export commonly used types
pub use ethers::{types::Address, utils::to_checksum};
