//! rollcall-engine: identity, check-in and dashboard operations.
//!
//! Every component borrows an explicit [`rollcall_store::Database`]; the face
//! embedding backend is injected through [`rollcall_core::FaceEmbedder`].

pub mod config;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError, DuplicateWindow};
pub use dashboard::DashboardReader;
pub use error::EngineError;
pub use identity::{IdentityStore, Registration, Student};
pub use pipeline::{CheckInPipeline, CheckInPolicy, CheckInRequest, CheckInState};
