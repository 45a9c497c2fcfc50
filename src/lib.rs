//! concierge — tenant knowledge core for an AI messaging assistant
//!
//! Chunks tenant content into retrievable units, routes customer queries
//! to intents over keyword sets, and assembles budgeted context windows
//! from the knowledge store.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod parse;
pub mod progress;
pub mod rerank;
pub mod retrieve;
pub mod route;
pub mod score;
pub mod store;
