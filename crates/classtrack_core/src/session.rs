//! Agent session: owns the tracker and the chunk dispatcher.
//!
//! # Responsibility
//! - Route class-prepare and unload notifications into the tracker.
//! - Turn any fatal tracker error into an orderly session termination.
//!
//! # Invariants
//! - After a fatal error the tracker is torn down and every later call fails
//!   with the recorded error.
//! - Callers hold the event handler lock for every `&mut self` call.

use crate::config::AgentConfig;
use crate::ddm::{ChunkDispatcher, ChunkHandler, DispatchOutcome};
use crate::error::{ErrorCode, FatalError, StreamResult, TrackResult};
use crate::host::ClassHost;
use crate::logging::init_logging_from_config;
use crate::packet::{PacketReader, PacketWriter};
use crate::tracker::{ClassTag, ClassTracker};
use log::{error, info};

/// Lifecycle state of one agent session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated(FatalError),
}

pub struct AgentSession<H: ClassHost> {
    config: AgentConfig,
    tracker: ClassTracker<H>,
    dispatcher: ChunkDispatcher,
    state: SessionState,
}

impl<H: ClassHost> AgentSession<H> {
    /// Starts file logging when `config` names a log directory, then builds
    /// the tracker from `config` and records the classes already loaded.
    ///
    /// # Errors
    /// - A rejected logging configuration is fatal; the host is not touched.
    /// - Any tracker initialization failure is fatal.
    pub fn start(config: AgentConfig, host: H) -> TrackResult<Self> {
        init_logging_from_config(&config)
            .map_err(|err| FatalError::internal(format!("logging setup failed: {err}")))?;

        let mut tracker = ClassTracker::from_config(&config);
        if let Err(err) = tracker.initialize(host) {
            error!(
                "event=agent_fatal module=session status=error stage=start error={}",
                err
            );
            tracker.reset();
            return Err(err);
        }
        info!(
            "event=session_start module=session status=ok strict={} tracked={}",
            config.strict_mode,
            tracker.len()
        );
        Ok(Self {
            config,
            tracker,
            dispatcher: ChunkDispatcher::new(),
            state: SessionState::Running,
        })
    }

    pub fn register_chunk_handler(&mut self, handler: Box<dyn ChunkHandler>) {
        self.dispatcher.register_handler(handler);
    }

    pub fn on_class_prepare(&mut self, class: &H::Class) -> TrackResult<ClassTag> {
        self.ensure_running()?;
        let result = self.tracker.record_new_class(class);
        self.check_fatal(result)
    }

    /// Returns signatures of classes unloaded since the previous batch.
    pub fn on_class_unload_batch(&mut self) -> TrackResult<Vec<String>> {
        self.ensure_running()?;
        let result = self.tracker.compute_unloaded();
        self.check_fatal(result)
    }

    /// Handles one command of the DDM command set. A terminated session
    /// answers `VM_DEAD`.
    pub fn handle_ddm_command(
        &mut self,
        command_set: u8,
        command: u8,
        input: &mut PacketReader<'_>,
        output: &mut PacketWriter,
    ) -> StreamResult<DispatchOutcome> {
        if let SessionState::Terminated(_) = self.state {
            output.set_error(ErrorCode::VmDead);
            return Ok(DispatchOutcome::Rejected(ErrorCode::VmDead));
        }
        self.dispatcher
            .handle_command(command_set, command, input, output)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, SessionState::Terminated(_))
    }

    pub fn termination_reason(&self) -> Option<&FatalError> {
        match &self.state {
            SessionState::Running => None,
            SessionState::Terminated(err) => Some(err),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ClassTracker<H> {
        &self.tracker
    }

    fn ensure_running(&self) -> TrackResult<()> {
        match &self.state {
            SessionState::Running => Ok(()),
            SessionState::Terminated(err) => Err(err.clone()),
        }
    }

    fn check_fatal<T>(&mut self, result: TrackResult<T>) -> TrackResult<T> {
        if let Err(err) = &result {
            error!(
                "event=agent_fatal module=session status=error error={}",
                err
            );
            self.tracker.reset();
            self.state = SessionState::Terminated(err.clone());
        }
        result
    }
}
