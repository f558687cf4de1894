//! HTTP/WebSocket server for the stream bingo engine.
//!
//! The binary entry point lives in `main.rs`; everything it serves is built
//! from [`api::create_router`], which integration tests drive directly.

pub mod api;
