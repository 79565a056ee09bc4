//! Parley - a conversation-threaded chat front-end core.
//!
//! Owns named conversation threads of question/answer exchanges, drives an
//! LLM completion API (batch or streamed), and publishes read-only state
//! snapshots for a rendering layer.

pub mod config;
pub mod controller;
pub mod generator;
pub mod models;
pub mod sse;
