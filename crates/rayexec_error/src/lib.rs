use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

pub type Result<T, E = RayexecError> = std::result::Result<T, E>;

/// Broad category of an error.
///
/// Decoding distinguishes "bad file" from "unsupported file" from "bad
/// caller", so callers can match on the kind instead of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Anything not covered below.
    Other,
    /// Data on the wire is malformed. `offset` is the byte offset relative to
    /// the start of the column chunk, if known.
    Corruption { offset: Option<u64> },
    /// Caller did something the API does not allow (reading past the end,
    /// injecting nulls, referencing unknown columns).
    ContractViolation,
    /// Valid input that we can't handle yet.
    NotImplemented,
}

#[derive(Debug)]
pub struct RayexecError {
    inner: Box<RayexecErrorInner>,
}

#[derive(Debug)]
struct RayexecErrorInner {
    msg: String,
    kind: ErrorKind,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl RayexecError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Other, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        RayexecError {
            inner: Box::new(RayexecErrorInner {
                msg: msg.into(),
                kind,
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Create an error indicating corrupt data at some byte offset.
    pub fn corruption(msg: impl Into<String>, offset: u64) -> Self {
        Self::with_kind(
            ErrorKind::Corruption {
                offset: Some(offset),
            },
            msg,
        )
    }

    /// Create a corruption error caused by some other error, e.g. a codec
    /// rejecting its input.
    pub fn corruption_with_source(
        msg: impl Into<String>,
        offset: u64,
        source: Box<dyn Error + Send + Sync>,
    ) -> Self {
        let mut err = Self::corruption(msg, offset);
        err.inner.source = Some(source);
        err
    }

    pub fn contract_violation(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::ContractViolation, msg)
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotImplemented, msg)
    }

    pub fn get_msg(&self) -> &str {
        self.inner.msg.as_str()
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Corruption { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        self.inner.kind == ErrorKind::NotImplemented
    }

    pub fn is_contract_violation(&self) -> bool {
        self.inner.kind == ErrorKind::ContractViolation
    }

    /// Byte offset for corruption errors.
    pub fn offset(&self) -> Option<u64> {
        match self.inner.kind {
            ErrorKind::Corruption { offset } => offset,
            _ => None,
        }
    }

    /// Shift the offset of a corruption error by `base`.
    ///
    /// Decoders report offsets relative to the buffer they were given, the
    /// owner of that buffer knows where it starts.
    pub fn offset_by(mut self, base: u64) -> Self {
        if let ErrorKind::Corruption { offset: Some(offset) } = self.inner.kind {
            self.inner.kind = ErrorKind::Corruption {
                offset: Some(offset + base),
            };
        }
        self
    }

    pub fn get_backtrace(&self) -> &Backtrace {
        &self.inner.backtrace
    }
}

impl fmt::Display for RayexecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            ErrorKind::Corruption { offset: Some(offset) } => {
                write!(f, "{} (at byte offset {offset})", self.inner.msg)?
            }
            ErrorKind::NotImplemented => write!(f, "Not implemented: {}", self.inner.msg)?,
            _ => write!(f, "{}", self.inner.msg)?,
        }

        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }

        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            write!(f, "\nBacktrace: {}", self.inner.backtrace)?
        }

        Ok(())
    }
}

impl Error for RayexecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<fmt::Error> for RayexecError {
    fn from(value: fmt::Error) -> Self {
        RayexecError::with_source("Format error", Box::new(value))
    }
}

impl From<std::io::Error> for RayexecError {
    fn from(value: std::io::Error) -> Self {
        RayexecError::with_source("IO error", Box::new(value))
    }
}

impl From<std::str::Utf8Error> for RayexecError {
    fn from(value: std::str::Utf8Error) -> Self {
        RayexecError::with_source("Utf8 error", Box::new(value))
    }
}

/// Return early with a not implemented error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)+) => {{
        let msg = format!($($arg)+);
        return Err($crate::RayexecError::not_implemented(msg));
    }};
}

/// An extension trait for adding context to the Error variant of a result.
pub trait ResultExt<T, E> {
    /// Wrap an error with a static context string.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap an error with a context string generated from a function.
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RayexecError::with_source(msg, Box::new(e))),
        }
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(RayexecError::with_source(f(), Box::new(e))),
        }
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, msg: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, msg: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(RayexecError::new(format!("Missing required value: {msg}"))),
        }
    }
}
