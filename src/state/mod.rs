//! Persistent per-project state.

pub mod local_state;

pub use local_state::{LocalStateFile, RunState};
