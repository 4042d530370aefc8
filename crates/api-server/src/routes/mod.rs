//! Route handlers

pub mod health;
pub mod test_runs;
