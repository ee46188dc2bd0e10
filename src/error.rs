//! Error types for frontpipe
//!
//! Uses `miette` for pretty error reporting with help text.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for frontpipe operations
#[derive(Error, Diagnostic, Debug)]
pub enum FrontpipeError {
    #[error("Configuration file not found")]
    #[diagnostic(
        code(frontpipe::config::not_found),
        help("Pass an existing file to --config, or omit it to use the built-in layout")
    )]
    ConfigNotFound { searched: Vec<PathBuf> },

    #[error("Failed to parse configuration")]
    #[diagnostic(code(frontpipe::config::parse))]
    ConfigParse {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(frontpipe::config::invalid))]
    InvalidConfig { reason: String },

    #[error("Invalid task '{task}': {reason}")]
    #[diagnostic(code(frontpipe::config::invalid_task))]
    InvalidTask { task: String, reason: String },

    #[error("Invalid glob '{pattern}'")]
    #[diagnostic(code(frontpipe::config::glob))]
    InvalidGlob {
        pattern: String,
        #[help]
        reason: String,
    },

    #[error("Task '{name}' not found")]
    #[diagnostic(
        code(frontpipe::task::not_found),
        help("Run `frontpipe list` to see available tasks")
    )]
    TaskNotFound { name: String, available: Vec<String> },

    #[error("Cyclic task graph: {cycle}")]
    #[diagnostic(
        code(frontpipe::task::cycle),
        help("Check the 'depends' field of your [tasks] aliases")
    )]
    CyclicDependency { cycle: String },

    #[error("Failed to access {}", path.display())]
    #[diagnostic(code(frontpipe::fs))]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot transform {}: {reason}", path.display())]
    #[diagnostic(code(frontpipe::transform))]
    Transform { path: PathBuf, reason: String },

    #[error("Malformed manifest {}: {reason}", path.display())]
    #[diagnostic(code(frontpipe::dependencies::manifest))]
    Manifest { path: PathBuf, reason: String },

    #[error("Dependency '{name}' is not installed in {}", dir.display())]
    #[diagnostic(
        code(frontpipe::dependencies::missing),
        help("Install front-end dependencies with `bower install`")
    )]
    DependencyNotInstalled { name: String, dir: PathBuf },

    #[error("I/O error")]
    #[diagnostic(code(frontpipe::io))]
    Io(#[from] std::io::Error),

    #[error("Watch error")]
    #[diagnostic(code(frontpipe::watch))]
    Watch {
        #[source]
        source: notify::Error,
    },

    #[error("Live-reload server error")]
    #[diagnostic(code(frontpipe::livereload))]
    LiveReload {
        #[source]
        source: std::io::Error,
    },
}

impl FrontpipeError {
    /// Wrap an I/O error with the path it happened on
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the error concerns a single malformed input file.
    ///
    /// Watch mode logs these and keeps going.
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. } | Self::Manifest { .. })
    }
}

/// Result type alias for frontpipe operations
pub type Result<T> = std::result::Result<T, FrontpipeError>;
