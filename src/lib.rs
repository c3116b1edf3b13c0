pub mod api;
pub mod capability;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod utils;

pub use config::AppConfig;
pub use error::{AuditError, CapabilityError};
pub use service::{AuditOrchestrator, UploadedDocument};
pub use store::StatutoryArchive;
