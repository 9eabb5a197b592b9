//! Unified error handling for fsxport
//!
//! Every fallible operation across the fsxport crates reports through this
//! type. Variants are grouped by the stage that raises them so callers can
//! tell configuration problems apart from external tool failures.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all fsxport operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Configuration Errors ====================

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    /// Missing configuration
    #[error("Missing configuration: {key}")]
    MissingConfig {
        key: String,
    },

    /// GUID does not match the 8-4-4-4-12 hex layout
    #[error("Invalid GUID '{guid}'. Verify.")]
    InvalidGuid {
        guid: String,
    },

    /// Friendly name is empty or not ASCII
    #[error("Invalid friendly name '{name}': {reason}")]
    InvalidFriendlyName {
        name: String,
        reason: String,
    },

    /// Model definition dictionary missing or unreadable
    #[error("Model definition {path}: {message}")]
    ModelDef {
        path: PathBuf,
        message: String,
    },

    /// Animation tag not defined in the model definition dictionary
    #[error("Animation tag '{tag}' not found in modeldef.xml")]
    MissingAnimationTag {
        tag: String,
    },

    /// Animation length could not be determined for a node
    #[error("Couldn't determine length of animation for '{object}'")]
    AnimationLength {
        object: String,
    },

    // ==================== Scene Errors ====================

    /// Parent of an indexed node is not itself indexed
    #[error("Parent '{parent}' of '{node}' is not an exportable object")]
    UnindexedParent {
        node: String,
        parent: String,
    },

    /// Indexed node has a child of an unsupported type
    #[error("Child '{child}' of '{node}' is not an exportable object")]
    UnsupportedChild {
        node: String,
        child: String,
    },

    /// Object or bone parent chain loops back on itself
    #[error("Parent cycle through '{node}'")]
    ParentCycle {
        node: String,
    },

    /// Scene references an object that does not exist
    #[error("Unknown scene object: {name}")]
    UnknownObject {
        name: String,
    },

    /// Scene data is malformed
    #[error("Invalid scene data: {message}")]
    InvalidScene {
        message: String,
    },

    // ==================== Material Errors ====================

    /// Material mode is neither Specular nor PBR
    #[error("Material '{material}' has unsupported mode '{mode}'")]
    UnsupportedMaterialMode {
        material: String,
        mode: String,
    },

    /// Required shader node missing from material node graph
    #[error("Material '{material}' is missing shader node '{node}'")]
    MissingShaderNode {
        material: String,
        node: String,
    },

    // ==================== Tool Errors ====================

    /// External compiler executable not found
    #[error("Tool not found: {0}")]
    ToolNotFound(PathBuf),

    /// External compiler failed or produced no output
    #[error("{tool} failed: {message}")]
    ToolFailed {
        tool: String,
        message: String,
    },

    /// External compiler exceeded its time budget
    #[error("{tool} timed out after {seconds} seconds")]
    Timeout {
        tool: String,
        seconds: u64,
    },

    // ==================== Serialization Errors ====================

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// XML read or write error
    #[error("XML error: {message}")]
    Xml {
        message: String,
    },

    // ==================== General Errors ====================

    /// Internal error (should not happen)
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid scene error
    pub fn invalid_scene(message: impl Into<String>) -> Self {
        Error::InvalidScene {
            message: message.into(),
        }
    }

    /// Create an XML error
    pub fn xml(message: impl ToString) -> Self {
        Error::Xml {
            message: message.to_string(),
        }
    }

    /// Create a tool failure
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Innermost error beneath any context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error stems from user configuration or scene setup
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.root(),
            Error::InvalidConfig { .. }
                | Error::MissingConfig { .. }
                | Error::InvalidGuid { .. }
                | Error::InvalidFriendlyName { .. }
                | Error::ModelDef { .. }
                | Error::MissingAnimationTag { .. }
                | Error::AnimationLength { .. }
                | Error::UnindexedParent { .. }
                | Error::UnsupportedChild { .. }
                | Error::ParentCycle { .. }
                | Error::UnsupportedMaterialMode { .. }
                | Error::MissingShaderNode { .. }
        )
    }

    /// Check if this error came from an external compiler
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self.root(),
            Error::ToolNotFound(_) | Error::ToolFailed { .. } | Error::Timeout { .. }
        )
    }

    /// Check if the export can continue past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self.root(), Error::Timeout { .. })
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::FileNotFound(PathBuf::from("scenes/hangar.json"));
        let contextualized = err.with_context("while loading scene");

        assert!(contextualized.to_string().contains("while loading scene"));
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(Error::InvalidGuid { guid: "nope".into() }.is_configuration_error());
        assert!(Error::MissingShaderNode {
            material: "Hull".into(),
            node: "Principled BSDF".into(),
        }
        .is_configuration_error());
        assert!(!Error::FileNotFound(PathBuf::from("hangar.x")).is_configuration_error());
    }

    #[test]
    fn test_classification_sees_through_context() {
        let err = Error::Timeout { tool: "XToMdl".into(), seconds: 30 }.with_context("compiling model");

        assert!(err.is_tool_error());
        assert!(err.is_recoverable());
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_tool_failure_is_fatal() {
        let err = Error::tool_failed("BglComp", "no output");
        assert!(err.is_tool_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::FileNotFound(PathBuf::from("modeldef.xml")));
        let err = result.context("reading animation dictionary").unwrap_err();

        assert!(err.to_string().contains("reading animation dictionary"));
        assert!(matches!(err.root(), Error::FileNotFound(_)));
    }
}
