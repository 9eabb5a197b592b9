//! fsxport Core Library
//!
//! This crate provides configuration, naming rules, common types and error
//! handling shared across all fsxport components.

pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod types;

pub use config::{AltitudeUnit, CompilerOptions, ExportConfig, ModelIdentity, PlacementOptions, SdkVersion};
pub use error::{Error, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::config::{ExportConfig, SdkVersion};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::naming::{bone_safe_name, safe_name};
    pub use crate::types::*;
}
