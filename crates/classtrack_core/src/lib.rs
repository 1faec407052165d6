//! Class-unload tracking and DDM chunk dispatch for a debugger agent.
//! Tracks loaded classes through host object tags and answers vendor chunk
//! commands through an optional diagnostic handler.

pub mod config;
pub mod ddm;
pub mod error;
pub mod host;
pub mod logging;
pub mod packet;
pub mod session;
pub mod tracker;

pub use config::{AgentConfig, ConfigError};
pub use ddm::{
    Chunk, ChunkDispatcher, ChunkHandler, DispatchOutcome, CHUNK_COMMAND, DDM_COMMAND_SET,
};
pub use error::{
    ErrorCode, FatalError, FatalReason, HostError, HostResult, StreamError, StreamResult,
    TrackResult,
};
pub use host::{ClassHost, ClassStatus};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use packet::{PacketReader, PacketWriter};
pub use session::{AgentSession, SessionState};
pub use tracker::{ClassTag, ClassTracker, TrackedClass};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn core_version_is_not_empty() {
        assert!(!core_version().trim().is_empty());
    }
}
