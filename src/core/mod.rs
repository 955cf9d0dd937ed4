pub mod app;
pub mod assignment;
pub mod chat_stream;
pub mod config;
pub mod message;
pub mod orchestrator;
pub mod readiness;
pub mod session;
pub mod stream_decoder;
