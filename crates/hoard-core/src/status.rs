//! Structured status values threaded through every fallible indexing call.

use std::borrow::Cow;
use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// How a status affects the traversal that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    /// Contract violation; a caller bug, never recovered.
    Internal,
    /// Degraded but continuable; the offending entry was skipped.
    Warning,
    /// Aborts the current traversal.
    Error,
    /// The traversal stopped because cancellation was requested.
    Cancelled,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusCode {
    /// A required argument was missing.
    NullArgument,
    /// Pop on an empty traversal stack.
    EmptyStack,
    /// A directory could not be opened or bound to a stream.
    OpenDirectory,
    /// Reading directory entries failed.
    ReadDirectory,
    /// Reading an entry's metadata failed.
    ReadMetadata,
    /// Memory for a catalog entry could not be allocated.
    Allocation,
    /// The catalog table could not be created.
    TableCreate,
    /// The catalog table could not be resized.
    TableResize,
    /// Cancellation was requested.
    Cancelled,
}

impl StatusCode {
    /// Short, static description of the code.
    pub fn describe(self) -> &'static str {
        match self {
            Self::NullArgument => "Got a missing argument",
            Self::EmptyStack => "Traversal stack is empty",
            Self::OpenDirectory => "Failed to open directory",
            Self::ReadDirectory => "Failed to read directory",
            Self::ReadMetadata => "Couldn't read file metadata",
            Self::Allocation => "Failed to allocate memory",
            Self::TableCreate => "Couldn't create a hash table",
            Self::TableResize => "Couldn't resize the hash table",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Severity a status with this code carries unless downgraded.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::NullArgument | Self::EmptyStack => Severity::Internal,
            Self::Cancelled => Severity::Cancelled,
            _ => Severity::Error,
        }
    }
}

/// Result of a fallible indexing operation.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}{}", describe_target(.path.as_deref()))]
pub struct Status {
    severity: Severity,
    code: StatusCode,
    errno: Option<i32>,
    message: Cow<'static, str>,
    path: Option<PathBuf>,
    #[serde(serialize_with = "serialize_location")]
    location: &'static Location<'static>,
}

fn describe_target(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!(": {}", path.display()),
        None => String::new(),
    }
}

fn serialize_location<S: Serializer>(
    location: &&'static Location<'static>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{}:{}", location.file(), location.line()))
}

impl Status {
    /// Create a status for `code`, recording the caller's source location.
    #[track_caller]
    pub fn new(code: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            errno: None,
            message: message.into(),
            path: None,
            location: Location::caller(),
        }
    }

    /// Create a status from an I/O error, keeping its OS error code.
    #[track_caller]
    pub fn from_io(code: StatusCode, message: impl Into<Cow<'static, str>>, err: &io::Error) -> Self {
        let mut status = Self::new(code, message);
        status.errno = err.raw_os_error();
        status
    }

    /// Status for a cooperative cancellation.
    #[track_caller]
    pub fn cancelled() -> Self {
        Self::new(StatusCode::Cancelled, "Traversal cancelled")
    }

    /// Attach the originating OS error code.
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    /// Attach the offending path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Downgrade to a warning.
    pub fn into_warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// The OS error code that caused this status, if any.
    pub fn errno(&self) -> Option<i32> {
        self.errno
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The path that caused the problem, if known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Source location where the status was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The originating OS error, rebuilt from the errno.
    pub fn os_error(&self) -> Option<io::Error> {
        self.errno.map(io::Error::from_raw_os_error)
    }

    /// True when the originating error is `EACCES`.
    pub fn is_permission_denied(&self) -> bool {
        self.errno == Some(libc::EACCES)
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn is_internal(&self) -> bool {
        self.severity == Severity::Internal
    }

    pub fn is_cancelled(&self) -> bool {
        self.severity == Severity::Cancelled
    }
}
