// src/blockchain/services/mod.rs

pub mod abi;
pub mod address;
pub mod chain;
pub mod ens;
pub mod explorer;
pub mod registry;
pub mod simulation;
pub mod token;
