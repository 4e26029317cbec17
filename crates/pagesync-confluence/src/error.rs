//! Error types for Confluence integration.
//!
//! Transport failures are classified once into a [`TransportError`] and then
//! wrapped by each call site into the matching [`ConfluenceError`] variant, so
//! the original cause is always reachable through [`std::error::Error::source`].

use std::fmt;

/// Boxed underlying cause of a transport failure.
type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Classification of a failed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Server answered 400.
    BadRequest,
    /// Server answered 401 or 403.
    Unauthorized,
    /// Server answered 5xx.
    ServerError,
    /// Any other error status, or a failure inside the HTTP stack
    /// (connection refused, DNS, TLS, timeout).
    UnknownTransport,
    /// The call produced no usable response object.
    Unknown,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::ServerError => "server error",
            Self::UnknownTransport => "transport error",
            Self::Unknown => "unknown error",
        })
    }
}

/// A classified transport failure with its original cause.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    status: Option<u16>,
    message: String,
    #[source]
    cause: Option<Cause>,
}

impl TransportError {
    /// HTTP 400 with the response body.
    pub fn bad_request(body: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::BadRequest, Some(400), body.into(), None)
    }

    /// HTTP 401/403 with the response body.
    pub fn unauthorized(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            TransportErrorKind::Unauthorized,
            Some(status),
            body.into(),
            None,
        )
    }

    /// HTTP 5xx with the response body.
    pub fn server_error(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            TransportErrorKind::ServerError,
            Some(status),
            body.into(),
            None,
        )
    }

    /// Unclassified error status or HTTP stack failure.
    pub fn unknown_transport(
        status: Option<u16>,
        message: impl Into<String>,
        cause: Option<Cause>,
    ) -> Self {
        Self::new(
            TransportErrorKind::UnknownTransport,
            status,
            message.into(),
            cause,
        )
    }

    /// No usable response was produced.
    pub fn unknown(message: impl Into<String>, cause: Option<Cause>) -> Self {
        Self::new(TransportErrorKind::Unknown, None, message.into(), cause)
    }

    /// Classify an HTTP error status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            400 => Self::bad_request(body),
            401 | 403 => Self::unauthorized(status, body),
            500..=599 => Self::server_error(status, body),
            _ => Self::unknown_transport(Some(status), body, None),
        }
    }

    fn new(
        kind: TransportErrorKind,
        status: Option<u16>,
        message: String,
        cause: Option<Cause>,
    ) -> Self {
        Self {
            kind,
            status,
            message,
            cause,
        }
    }

    /// Failure classification.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// HTTP status when the server answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Human-readable detail (response body or transport message).
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::from_status(status, String::new()),
            other => Self::unknown_transport(None, other.to_string(), Some(Box::new(other))),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::unknown("response body could not be decoded", Some(Box::new(err)))
    }
}

/// Stable error taxonomy exposed to callers and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Page lookup or child listing failed.
    NotFound,
    /// Update rejected because the version did not match.
    Conflict,
    /// Request rejected as malformed.
    BadRequest,
    /// Credentials rejected.
    Unauthorized,
    /// Server-side failure.
    ServerError,
    /// Unclassified transport failure.
    UnknownTransport,
    /// No usable response.
    Unknown,
    /// Malformed input document.
    Validation,
}

impl From<TransportErrorKind> for ErrorKind {
    fn from(kind: TransportErrorKind) -> Self {
        match kind {
            TransportErrorKind::BadRequest => Self::BadRequest,
            TransportErrorKind::Unauthorized => Self::Unauthorized,
            TransportErrorKind::ServerError => Self::ServerError,
            TransportErrorKind::UnknownTransport => Self::UnknownTransport,
            TransportErrorKind::Unknown => Self::Unknown,
        }
    }
}

/// Error from Confluence API operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfluenceError {
    /// Page lookup or one of its child listing calls failed.
    #[error("error getting page with id {id}")]
    NotFound {
        /// Requested page ID.
        id: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Page creation failed.
    #[error("error creating page with title {title}")]
    CreateFailed {
        /// Title of the page being created.
        title: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Update rejected because the supplied version is stale.
    #[error("version conflict updating page with id {id}")]
    Conflict {
        /// Page ID.
        id: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Page update failed.
    #[error("error updating page with id {id} and title {title}")]
    UpdateFailed {
        /// Page ID.
        id: String,
        /// Page title.
        title: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Content deletion failed.
    #[error("error deleting content with id {id}")]
    DeleteFailed {
        /// Content ID.
        id: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Attachment listing failed.
    #[error("error getting attachments of page with id {id}")]
    AttachmentsNotFound {
        /// Page ID.
        id: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Attachment upload failed.
    #[error("error creating attachments of page with id {id}")]
    AttachmentCreateFailed {
        /// Page ID.
        id: String,
        /// Classified cause.
        #[source]
        source: TransportError,
    },

    /// Input document is malformed.
    #[error("invalid document {path}: {message}")]
    Validation {
        /// Document path.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// Processing a document stopped on a panic.
    #[error("sync of {path} aborted: {message}")]
    Aborted {
        /// Document path.
        path: String,
        /// Panic message.
        message: String,
    },
}

impl ConfluenceError {
    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::AttachmentsNotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Aborted { .. } => ErrorKind::Unknown,
            Self::CreateFailed { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::AttachmentCreateFailed { source, .. } => source.kind().into(),
        }
    }

    /// Transport cause, if the error came from the wire.
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::NotFound { source, .. }
            | Self::CreateFailed { source, .. }
            | Self::Conflict { source, .. }
            | Self::UpdateFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::AttachmentsNotFound { source, .. }
            | Self::AttachmentCreateFailed { source, .. } => Some(source),
            Self::Validation { .. } | Self::Aborted { .. } => None,
        }
    }

    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn aborted(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Aborted {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Storage-format markup could not be parsed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// XML reader error.
    #[error("XML parse error")]
    Xml(#[from] quick_xml::Error),

    /// Input ended with open elements.
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

/// Identity mapping file could not be read or written.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Filesystem error.
    #[error("failed to access {path}")]
    Io {
        /// File involved.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed state file.
    #[error("invalid state file {path}")]
    Json {
        /// File involved.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Render an error and its `source()` chain as `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
