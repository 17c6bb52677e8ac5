pub mod schema;

pub use schema::{Config, NamespaceConfig, PlatformConfig, PlatformKind, VerificationConfig};
