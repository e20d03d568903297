pub mod backend;

pub use backend::{BackendConfig, HealthBackend};
