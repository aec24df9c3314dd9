//! Core types, config, errors, and transcript model for the AluminatiAI energy agent.

pub mod config;
pub mod error;
pub mod estimate;
pub mod transcript;
