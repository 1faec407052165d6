//! DDM chunk dispatch.
//!
//! # Responsibility
//! - Decode one vendor chunk command and hand it to the registered handler.
//! - Encode the handler's reply chunk.
//!
//! # Invariants
//! - The request chunk is dropped exactly once on every path.
//! - A missing handler is answered with `NOT_IMPLEMENTED`.
//! - A failing handler is logged and produces no reply fields at all; older
//!   debugger front ends depend on this.

use crate::error::{ErrorCode, HostError, HostResult, StreamResult};
use crate::packet::{PacketReader, PacketWriter};
use log::{debug, warn};

/// Command set id of the DDM commands.
pub const DDM_COMMAND_SET: u8 = 199;
/// The only command in the DDM command set.
pub const CHUNK_COMMAND: u8 = 1;

/// One opaque vendor chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: i32,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(chunk_type: i32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            chunk_type,
            data: data.into(),
        }
    }
}

/// Out-of-band diagnostic capability that processes vendor chunks.
///
/// The handler allocates the reply; ownership passes to the dispatcher.
pub trait ChunkHandler {
    fn process_chunk(&mut self, request: &Chunk) -> HostResult<Chunk>;
}

/// Result of one dispatch that decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied,
    NotImplemented,
    /// Handler failed; nothing was written to the reply.
    Suppressed(HostError),
    /// Not dispatched at all; the reply carries this error code.
    Rejected(ErrorCode),
    /// Handler reply cannot be framed; the reply carries `INTERNAL` only.
    ReplyTooLarge(usize),
}

/// Routes chunk commands to the optional handler.
#[derive(Default)]
pub struct ChunkDispatcher {
    handler: Option<Box<dyn ChunkHandler>>,
}

impl ChunkDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(handler: Box<dyn ChunkHandler>) -> Self {
        Self {
            handler: Some(handler),
        }
    }

    /// Registers `handler`, replacing any previous one.
    pub fn register_handler(&mut self, handler: Box<dyn ChunkHandler>) {
        self.handler = Some(handler);
    }

    pub fn clear_handler(&mut self) {
        self.handler = None;
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Handles one command addressed to `command_set`.
    ///
    /// Anything other than the chunk command of the DDM command set is
    /// answered with `NOT_IMPLEMENTED`.
    pub fn handle_command(
        &mut self,
        command_set: u8,
        command: u8,
        input: &mut PacketReader<'_>,
        output: &mut PacketWriter,
    ) -> StreamResult<DispatchOutcome> {
        if command_set != DDM_COMMAND_SET || command != CHUNK_COMMAND {
            debug!(
                "event=chunk_dispatch module=ddm status=not_implemented command_set={} command={}",
                command_set, command
            );
            output.set_error(ErrorCode::NotImplemented);
            return Ok(DispatchOutcome::NotImplemented);
        }
        self.dispatch(input, output)
    }

    /// Decodes a chunk from `input`, runs the handler and writes its reply.
    ///
    /// # Errors
    /// Returns the stream error when the request is malformed; the handler is
    /// not called and `output` is left untouched.
    pub fn dispatch(
        &mut self,
        input: &mut PacketReader<'_>,
        output: &mut PacketWriter,
    ) -> StreamResult<DispatchOutcome> {
        let request = match read_chunk(input) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(
                    "event=chunk_dispatch module=ddm status=malformed error={}",
                    err
                );
                return Err(err);
            }
        };

        let Some(handler) = self.handler.as_mut() else {
            drop(request);
            debug!("event=chunk_dispatch module=ddm status=not_implemented command=chunk");
            output.set_error(ErrorCode::NotImplemented);
            return Ok(DispatchOutcome::NotImplemented);
        };

        debug!(
            "event=chunk_dispatch module=ddm status=started type={:#010x} len={}",
            request.chunk_type,
            request.data.len()
        );
        let result = handler.process_chunk(&request);
        let request_type = request.chunk_type;
        drop(request);

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    "event=chunk_dispatch module=ddm status=suppressed type={:#010x} error={}",
                    request_type, err
                );
                return Ok(DispatchOutcome::Suppressed(err));
            }
        };

        let Some(reply_len) = framed_len(reply.data.len()) else {
            warn!(
                "event=chunk_dispatch module=ddm status=error type={:#010x} reply_len={}",
                request_type,
                reply.data.len()
            );
            output.set_error(ErrorCode::Internal);
            return Ok(DispatchOutcome::ReplyTooLarge(reply.data.len()));
        };
        output.write_i32(reply.chunk_type);
        output.write_i32(reply_len);
        output.write_bytes(&reply.data);
        debug!(
            "event=chunk_dispatch module=ddm status=ok type={:#010x} reply_type={:#010x} reply_len={}",
            request_type,
            reply.chunk_type,
            reply.data.len()
        );
        Ok(DispatchOutcome::Replied)
    }
}

/// Length prefix for a payload of `len` bytes, if it fits the wire format.
fn framed_len(len: usize) -> Option<i32> {
    i32::try_from(len).ok()
}

fn read_chunk(input: &mut PacketReader<'_>) -> StreamResult<Chunk> {
    let chunk_type = input.read_i32()?;
    let data = input.read_byte_array()?;
    Ok(Chunk { chunk_type, data })
}
