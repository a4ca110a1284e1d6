//! Error types for repro-fetch
//!
//! All modules use `ReproResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repro-fetch operations
pub type ReproResult<T> = Result<T, ReproError>;

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing provider, missing identity, unsupported capability
    Configuration,
    /// Fetched bytes hash to something other than the expected digest
    DigestMismatch,
    /// Digest, origin URL or manifest entry absent
    NotFound,
    /// Package manager backed enumerator or installer failed
    ExternalTool,
    /// Fetching from a provider failed below the digest check
    Transport,
    /// Malformed manifest, digest or template
    Format,
    /// Aborted through the cancellation token
    Cancelled,
    /// Local filesystem or serialization failure
    Io,
    /// Anything else
    Other,
}

/// All errors that can occur in repro-fetch
#[derive(Error, Debug)]
pub enum ReproError {
    // Configuration errors
    #[error("No provider configured. Pass --provider or set [providers] urls in the config")]
    NoProvider,

    #[error("Distro driver {distro:?} does not implement {feature}")]
    Unsupported {
        distro: &'static str,
        feature: &'static str,
    },

    #[error("{kind} information not available for {name:?}")]
    MissingIdentity { kind: &'static str, name: String },

    #[error("Distro driver {0:?} needs a cache to generate hashes")]
    CacheRequired(&'static str),

    #[error("Unknown distro driver: {0}")]
    UnknownDistro(String),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache errors
    #[error("Digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Blob not found in cache: {0}")]
    BlobNotFound(String),

    #[error("No cached digest for origin URL {0}")]
    OriginNotFound(String),

    #[error("Unsupported URL scheme {scheme:?} for {url} (expected {expected})")]
    UrlScheme {
        scheme: String,
        url: String,
        expected: String,
    },

    #[error("Failed to fetch {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Failed to download {name} ({url})")]
    DownloadFailed {
        name: String,
        url: String,
        #[source]
        source: Box<ReproError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // Format errors
    #[error("Invalid SHA-256 digest {0:?}: expected 64 lowercase hex characters")]
    InvalidDigest(String),

    #[error("Invalid hash manifest at line {line}: {reason}")]
    ManifestFormat { line: usize, reason: String },

    #[error("Invalid URL template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // External tool errors
    #[error("No package is installed?")]
    NoInstalledPackages,

    #[error("No usable package index records in the output of {0}")]
    EmptyIndex(String),

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {reason}")]
    ExternalTool { command: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ReproError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an external tool error (the process ran and failed)
    pub fn command_exec(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalTool {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoProvider
            | Self::Unsupported { .. }
            | Self::MissingIdentity { .. }
            | Self::UnknownDistro(_)
            | Self::CacheRequired(_)
            | Self::UrlScheme { .. }
            | Self::ConfigInvalid { .. }
            | Self::ConfigDirCreate { .. } => ErrorKind::Configuration,
            Self::DigestMismatch { .. } => ErrorKind::DigestMismatch,
            Self::BlobNotFound(_) | Self::OriginNotFound(_) => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::DownloadFailed { source, .. } => source.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
            Self::InvalidDigest(_)
            | Self::ManifestFormat { .. }
            | Self::Template { .. }
            | Self::InvalidUrl { .. } => ErrorKind::Format,
            Self::NoInstalledPackages
            | Self::EmptyIndex(_)
            | Self::CommandFailed { .. }
            | Self::ExternalTool { .. } => {
                ErrorKind::ExternalTool
            }
            Self::Io { .. } | Self::Json(_) | Self::TomlParse(_) | Self::TomlSerialize(_) => {
                ErrorKind::Io
            }
            Self::Internal(_) | Self::User(_) => ErrorKind::Other,
        }
    }

    /// Whether the error means "absent" rather than "broken"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoProvider => Some("Pass --provider 'https://mirror.example/{{.Name}}'"),
            Self::NoInstalledPackages => Some("Pass package names explicitly"),
            Self::ExternalTool { .. } | Self::EmptyIndex(_) => {
                Some("Try: apt-get update (or apk update)")
            }
            Self::DigestMismatch { .. } => {
                Some("The mirror served different content; regenerate the hash file or try another provider")
            }
            _ => None,
        }
    }
}
