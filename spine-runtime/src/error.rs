use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("unknown bone '{name}' referenced by {context}")]
    UnknownBone { name: String, context: String },

    #[error("unknown slot '{name}' referenced by {context}")]
    UnknownSlot { name: String, context: String },

    #[error("unknown attachment '{name}' for slot '{slot}' in skin '{skin}'")]
    UnknownAttachment {
        name: String,
        slot: String,
        skin: String,
    },

    #[error("unknown event '{name}' referenced by animation '{animation}'")]
    UnknownEvent { name: String, animation: String },

    #[error("unknown {kind} constraint '{name}'")]
    UnknownConstraint { kind: &'static str, name: String },

    #[error("unknown {kind} type tag: {value}")]
    UnknownTypeTag { kind: &'static str, value: String },

    #[error("parent mesh '{parent}' not found in skin '{skin}'")]
    ParentMeshNotFound { parent: String, skin: String },

    #[error("invalid track index: {index}")]
    InvalidTrackIndex { index: usize },

    #[error("invalid value: {message}")]
    InvalidValue { message: String },

    #[error("unsupported or invalid Spine version string: {value}")]
    SpineVersion { value: String },

    #[cfg(feature = "json")]
    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("invalid color '{value}' for {context}")]
    JsonInvalidColor { context: String, value: String },

    #[cfg(feature = "json")]
    #[error("invalid curve for {context}: {message}")]
    JsonInvalidCurve { context: String, message: String },

    #[cfg(feature = "binary")]
    #[error("failed to parse Spine binary at offset {offset}: {message}")]
    BinaryParse { offset: usize, message: String },

    #[error("failed to parse Spine atlas (line {line}): {message}")]
    AtlasParse { line: usize, message: String },
}
