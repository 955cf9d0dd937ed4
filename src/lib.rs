//! ollamux is a terminal chat client for one or several Ollama hosts.
//!
//! The crate is organized in a few layers:
//! - [`api`] holds the Ollama wire types and the one-shot HTTP requests.
//! - [`core`] owns configuration, the stream decoder, sessions, the model
//!   assignment registry and the orchestrator that folds concurrent session
//!   streams into one state.
//! - [`manage`] runs the bulk model-management operations across hosts.
//! - [`ui`] renders the terminal views and runs the interactive event loop.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod manage;
pub mod ui;
pub mod utils;
