mod core;
mod namespace;
mod platform;
mod verification;

pub use core::Config;
pub use namespace::NamespaceConfig;
pub use platform::{PlatformConfig, PlatformKind};
pub use verification::VerificationConfig;
