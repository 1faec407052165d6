//! Error taxonomy shared by the tracker, the chunk dispatcher and the session.
//!
//! # Responsibility
//! - Separate recoverable wire-level failures from fatal agent failures.
//! - Carry host error codes through unchanged so they can be logged.
//!
//! # Invariants
//! - Fatal failures are values (`FatalError`), never process aborts.
//! - Only `StreamError` and `ErrorCode` values reach the remote caller.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HostResult<T> = Result<T, HostError>;
pub type TrackResult<T> = Result<T, FatalError>;
pub type StreamResult<T> = Result<T, StreamError>;

/// Failure reported by the host capability facade or a chunk handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub code: i32,
    pub name: String,
}

impl HostError {
    pub fn new(code: i32, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

impl Error for HostError {}

/// Why the agent has to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    Host(HostError),
    OutOfMemory,
    Internal,
    AssertionFailed,
}

/// Unrecoverable failure. Unwinds to the session, which terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub reason: FatalReason,
    pub context: String,
}

impl FatalError {
    pub fn host(error: HostError, context: impl Into<String>) -> Self {
        Self {
            reason: FatalReason::Host(error),
            context: context.into(),
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self {
            reason: FatalReason::Internal,
            context: context.into(),
        }
    }

    pub fn assertion(context: impl Into<String>) -> Self {
        Self {
            reason: FatalReason::AssertionFailed,
            context: context.into(),
        }
    }

    pub fn out_of_memory(context: impl Into<String>) -> Self {
        Self {
            reason: FatalReason::OutOfMemory,
            context: context.into(),
        }
    }
}

impl Display for FatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            FatalReason::Host(err) => write!(f, "{}: host error {err}", self.context),
            FatalReason::OutOfMemory => write!(f, "{}: out of memory", self.context),
            FatalReason::Internal => write!(f, "{}: internal error", self.context),
            FatalReason::AssertionFailed => write!(f, "assertion failed: {}", self.context),
        }
    }
}

impl Error for FatalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.reason {
            FatalReason::Host(err) => Some(err),
            FatalReason::OutOfMemory | FatalReason::Internal | FatalReason::AssertionFailed => {
                None
            }
        }
    }
}

/// Malformed or truncated command input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    Truncated { needed: usize, available: usize },
    NegativeLength(i32),
}

impl Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { needed, available } => write!(
                f,
                "packet truncated: needed {needed} bytes, {available} available"
            ),
            Self::NegativeLength(len) => write!(f, "negative byte array length: {len}"),
        }
    }
}

impl Error for StreamError {}

/// Wire error codes written into a reply packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotImplemented,
    VmDead,
    Internal,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        match self {
            Self::NotImplemented => 99,
            Self::VmDead => 112,
            Self::Internal => 113,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::VmDead => "VM_DEAD",
            Self::Internal => "INTERNAL",
        };
        write!(f, "{name} ({})", self.code())
    }
}
