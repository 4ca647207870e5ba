//! Diagnostic error types for rich error reporting via miette.

// False positive: fields are used in #[error] format strings and miette derive macros
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by Hugo lifecycle operations.
#[derive(Debug, Error, Diagnostic)]
pub enum HugoError {
    #[error("Hugo is already running")]
    #[diagnostic(
        code(hugo_manager::hugo::already_running),
        help("stop or restart the server instead")
    )]
    AlreadyRunning,

    #[error("Hugo is not running")]
    #[diagnostic(code(hugo_manager::hugo::not_running))]
    NotRunning,

    #[error("failed to start '{binary}': {source}")]
    #[diagnostic(
        code(hugo_manager::hugo::spawn_failed),
        help("make sure hugo is installed and on your PATH, or set `binary` under [hugo]")
    )]
    SpawnFailed {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to capture Hugo output streams")]
    #[diagnostic(code(hugo_manager::hugo::output_capture))]
    OutputCapture,

    #[error("failed to stop Hugo: {source}")]
    #[diagnostic(
        code(hugo_manager::hugo::kill_failed),
        help("the process may be stuck or require manual intervention. Try: kill -9 <pid>")
    )]
    KillFailed {
        #[source]
        source: io::Error,
    },
}

impl HugoError {
    /// The operation was rejected because of the current status rather than
    /// failing partway through.
    pub fn is_precondition(&self) -> bool {
        matches!(self, HugoError::AlreadyRunning | HugoError::NotRunning)
    }
}

/// Errors related to hugo-manager.toml.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to parse configuration")]
    #[diagnostic(code(hugo_manager::config::parse_error))]
    Parse {
        /// The source file contents for display
        #[source_code]
        src: NamedSource<String>,

        /// The location of the error in the source
        #[label("{message}")]
        span: SourceSpan,

        /// The error message from the TOML parser
        message: String,

        #[help]
        help: Option<String>,
    },

    #[error("invalid value for `{field}`: {reason}")]
    #[diagnostic(code(hugo_manager::config::invalid))]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn from_toml_error(path: &std::path::Path, contents: String, err: toml::de::Error) -> Self {
        let message = err.message().to_string();
        let span = err
            .span()
            .map(|r| SourceSpan::from(r.start..r.end))
            .unwrap_or_else(|| SourceSpan::from(0..0));

        ConfigError::Parse {
            src: NamedSource::new(path.display().to_string(), contents),
            span,
            message,
            help: Some("check TOML syntax at https://toml.io".to_string()),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors related to file operations.
#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("failed to read file: {}", path.display())]
    #[diagnostic(code(hugo_manager::file::read_error))]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file: {}", path.display())]
    #[diagnostic(code(hugo_manager::file::write_error))]
    WriteError {
        path: PathBuf,
        #[help]
        details: Option<String>,
    },
}

#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    #[error("directory {} doesn't appear to be a Hugo project", dir.display())]
    #[diagnostic(
        code(hugo_manager::project::not_hugo),
        help("expected one of hugo.toml, hugo.yaml, hugo.json, config.toml, config.yaml or config.json")
    )]
    NotHugoProject { dir: PathBuf },
}
