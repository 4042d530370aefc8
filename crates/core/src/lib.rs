//! Core library for remote test orchestration
//!
//! This crate contains the pure, I/O-free pieces:
//! - Normalization of loosely typed caller input
//! - Canonical command payloads for the remote test executor
//! - Run snapshot/result models and the response envelope

pub mod envelope;
pub mod error;
pub mod model;
pub mod normalize;
pub mod request;

pub use envelope::{CommandResponse, ResponseEnvelope};
pub use error::Error;
pub use model::{
    is_terminal_state, RunResult, RunSnapshot, RunSummary, TestCaseResult, TERMINAL_STATES,
};
pub use request::{
    ListRequest, ListTestsArgs, RerunFailedArgs, RerunRequest, RunRequest, RunTestsArgs,
    TestCommand, TestMode,
};

pub type Result<T> = std::result::Result<T, Error>;
