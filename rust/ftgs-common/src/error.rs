use thiserror::Error;

/// The error type shared by all ftgs-* crates.
///
/// The kind is boxed to keep `Result<T>` small on the hot decoding paths.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Configuration error: a host-supplied argument is inconsistent or out of range.
    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// Malformed-data error: a shard file violates the field file contract.
    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// Protocol-contract error: an operation was called out of order.
    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Wraps an error raised inside the worker task for `(field, split)`.
    pub fn task(field: impl Into<String>, split: usize, source: Error) -> Error {
        Error(
            ErrorKind::Task {
                field: field.into(),
                split,
                source,
            }
            .into(),
        )
    }

    pub fn panicked(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Panicked {
                message: message.into(),
            }
            .into(),
        )
    }

    /// Returns the innermost error, looking through any `Task` wrappers.
    pub fn root(&self) -> &Error {
        match self.kind() {
            ErrorKind::Task { source, .. } => source.root(),
            _ => self,
        }
    }

    /// Whether this error (or the error it wraps) is a malformed-data error.
    pub fn is_invalid_format(&self) -> bool {
        matches!(self.root().kind(), ErrorKind::InvalidFormat { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("invalid storage format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("task for field '{field}' split {split} failed: {source}")]
    Task {
        field: String,
        split: usize,
        source: Error,
    },

    #[error("task panicked: {message}")]
    Panicked { message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_root() {
        let inner = Error::invalid_format("shard a field f", "doc_freq > 0");
        let err = Error::task("f", 2, inner);
        assert!(err.is_invalid_format());
        let msg = err.to_string();
        assert!(msg.contains("field 'f' split 2"));
        assert!(msg.contains("doc_freq > 0"));
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err.kind(), ErrorKind::Io { .. }));
        assert!(!err.is_invalid_format());
    }
}
