//! Error types and handling for Skillet
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//! One variant per failing pipeline stage so every abort names the stage that
//! caused it (usage errors, provisioning, describe, materialize, hooks,
//! archiving), plus the never-fatal cache variant that callers downgrade to a
//! warning and a cache miss.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Skillet operations
#[derive(Error, Diagnostic, Debug)]
pub enum SkilletError {
    // Usage errors: reported before any build step runs
    #[error("The project path ({path}) does not exist")]
    #[diagnostic(
        code(skillet::usage::project_path),
        help("Pass the directory that contains setup.py, or run skillet from inside it")
    )]
    ProjectPathMissing { path: String },

    #[error("--no-download and --no-wheel-cache cannot be used together")]
    #[diagnostic(
        code(skillet::usage::conflicting_flags),
        help("Offline builds resolve wheels from the cache; leave the cache enabled")
    )]
    ConflictingCacheFlags,

    #[error("No usable Python interpreter found")]
    #[diagnostic(
        code(skillet::usage::interpreter_not_found),
        help("Install python3 or pass an interpreter explicitly with -p/--python")
    )]
    InterpreterNotFound,

    // Build stage errors: abort the pipeline, cleanup still runs
    #[error("Failed to provision the build virtualenv: {message}")]
    #[diagnostic(code(skillet::build::provisioning_failed))]
    ProvisioningFailed { message: String },

    #[error("Failed to describe the package: {message}")]
    #[diagnostic(
        code(skillet::build::describe_failed),
        help("The project must answer `setup.py --name --version`")
    )]
    DescribeFailed { message: String },

    #[error("Failed to build wheels: {message}")]
    #[diagnostic(code(skillet::build::materialize_failed))]
    MaterializeFailed { message: String },

    #[error("{kind} script failed: {message}")]
    #[diagnostic(
        code(skillet::build::hook_failed),
        help("A failing build script aborts the build so no incomplete package is produced")
    )]
    HookFailed { kind: String, message: String },

    #[error("Failed to create the build archive: {message}")]
    #[diagnostic(code(skillet::build::archive_failed))]
    ArchiveFailed { message: String },

    #[error("Failed to create the build workspace: {message}")]
    #[diagnostic(
        code(skillet::build::workspace_failed),
        help("Check that the output directory is writable")
    )]
    WorkspaceCreateFailed { message: String },

    // Cache errors are never fatal: callers log a warning and treat the
    // operation as a miss
    #[error("Cache operation failed: {message}")]
    #[diagnostic(code(skillet::cache::operation_failed))]
    CacheOperationFailed { message: String },

    #[error("Invalid installer value for {field}: {value}")]
    #[diagnostic(
        code(skillet::installer::invalid_value),
        help("Package names and identities must not contain shell metacharacters")
    )]
    TemplateValueInvalid { field: String, value: String },

    #[error("Command '{command}' failed: {message}")]
    #[diagnostic(code(skillet::exec::command_failed))]
    CommandFailed { command: String, message: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(skillet::io::error))]
    IoError { message: String },
}

impl SkilletError {
    /// Whether this is a usage error (bad CLI input); usage errors are
    /// reported before any side effect is attempted.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::ProjectPathMissing { .. }
                | Self::ConflictingCacheFlags
                | Self::InterpreterNotFound
        )
    }
}

/// Result type alias for Skillet operations
pub type Result<T> = std::result::Result<T, SkilletError>;
