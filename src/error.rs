//! Configuration Errors
//!
//! This is the exhaustive list of errors raised while turning a manifest into
//! a build plan. All of them are local validation errors. None of them is
//! retried, since they require a human to fix the configuration. Every error
//! names the offending manifest key (as dotted path) or declaration.

/// Configuration Error
///
/// The first violated invariant halts the resolution and is returned
/// verbatim. No partial plans are ever produced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest is not syntactically valid TOML.
    #[error("cannot parse manifest: {0}")]
    Parse(String),
    /// The manifest cannot be represented as TOML.
    #[error("cannot serialize manifest: {0}")]
    Serialize(String),
    /// The manifest at the given path cannot be read.
    #[error("cannot read manifest {0:?}: {1}")]
    Io(std::path::PathBuf, #[source] std::io::Error),
    /// The manifest format version is not supported.
    #[error("unsupported manifest version {0}")]
    ManifestVersion(i64),
    /// The key is not part of the manifest schema.
    #[error("unknown key `{0}`")]
    UnknownKey(String),
    /// The value of the key has the wrong type.
    #[error("type mismatch for `{key}`: expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
    /// The value of the key has the right type but is not acceptable.
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        reason: &'static str,
    },
    /// The SDK levels violate `min <= target <= compile`.
    #[error("invalid version ordering: `{key}` ({value}) must not be {relation} `{bound_key}` ({bound})")]
    InvalidVersionOrdering {
        key: &'static str,
        value: u32,
        relation: &'static str,
        bound_key: &'static str,
        bound: u32,
    },
    /// The version is below the floor supported by the platform.
    #[error("unsupported version for `{key}`: {value} is below the supported floor {floor}")]
    UnsupportedVersion {
        key: &'static str,
        value: u32,
        floor: u32,
    },
    /// The language levels are inconsistent with each other or with the
    /// requested desugaring support.
    #[error("incompatible language level for `{key}`: {reason}")]
    IncompatibleLanguageLevel {
        key: &'static str,
        reason: String,
    },
    /// The dependency declaration cannot be parsed. `key` names the
    /// declaration and the failing part of it.
    #[error("malformed dependency declaration `{key}`: {reason}")]
    MalformedCoordinate {
        key: String,
        reason: String,
    },
    /// A mandatory key is missing.
    #[error("incomplete configuration: `{0}` is required")]
    IncompleteConfiguration(&'static str),
    /// The plugin is not known to the plugin registry.
    #[error("unsupported plugin `{0}`")]
    UnsupportedPlugin(String),
}
