//! upgrade-kit library.
//!
//! The pipeline and its stages are exposed for the binary and for
//! integration tests, which drive them against [`host::fake::FakeHost`].

pub mod common;
pub mod config;
pub mod definitions;
pub mod error;
pub mod host;
pub mod kit;
pub mod network;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod target;
pub mod timing;
