//! Amend library crate
//!
//! Repairs a single Java method flagged by the Checker Framework: the method
//! is minimized with Specimin, the checker's diagnostics are handed to a
//! language model, and the suggested method is spliced back until the
//! extract verifies clean.

pub mod batch;
pub mod config;
pub mod correction;
pub mod error;
pub mod java;
pub mod keyring;
pub mod llm;
pub mod prompt;
pub mod target;
pub mod tools;
pub mod util;
pub mod workspace;
