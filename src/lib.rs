pub mod channels;
pub mod chunker;
pub mod config;
pub mod context;
pub mod directives;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod inflight;
pub mod llm;
pub mod logging;
pub mod persona;
pub mod search;
