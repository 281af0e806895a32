//! Error types for the engine

use thiserror::Error;

/// Failure of the GLB encoder or of publishing its output
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("scene '{0}' contains no meshes")]
    EmptyScene(String),

    #[error("node '{0}' has non-finite vertex or transform data")]
    NonFinite(String),

    #[error("mesh '{name}' references vertex {index} but has {vertex_count} vertices")]
    IndexOutOfRange {
        name: String,
        index: u32,
        vertex_count: usize,
    },

    #[error("GLB of {0} bytes exceeds the 32-bit length field")]
    TooLarge(usize),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("publishing resource failed: {0}")]
    Publish(String),
}

/// Failure while decoding a GLB container
#[derive(Debug, Error)]
pub enum GlbError {
    #[error("GLB truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("bad GLB magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("unsupported GLB version {0}")]
    BadVersion(u32),

    #[error("header length {header} does not match data length {actual}")]
    LengthMismatch { header: usize, actual: usize },

    #[error("first chunk must be JSON, found type 0x{0:08x}")]
    MissingJson(u32),

    #[error("invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glTF document: {0}")]
    Invalid(String),
}

/// AR session negotiation failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("WebXR is not available")]
    Unavailable,

    #[error("session mode '{0}' is not supported")]
    Unsupported(String),

    #[error("session request rejected: {0}")]
    Rejected(String),

    #[error("reference space '{space}' unavailable: {reason}")]
    ReferenceSpace { space: String, reason: String },

    #[error("a session is already active")]
    AlreadyActive,

    #[error("no active session")]
    NotActive,

    #[error("session ended before setup completed")]
    Cancelled,
}

/// Hit-test source acquisition failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HitTestError {
    #[error("hit-test source request rejected: {0}")]
    Rejected(String),

    #[error("hit-test origin space unavailable: {0}")]
    Space(String),
}
