use classtrack_core::{
    Chunk, ChunkDispatcher, ChunkHandler, DispatchOutcome, ErrorCode, HostError, HostResult,
    PacketReader, PacketWriter, StreamError, CHUNK_COMMAND, DDM_COMMAND_SET,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Requests seen by a handler, shared with the test body.
type Seen = Rc<RefCell<Vec<Chunk>>>;

struct FixedReply {
    seen: Seen,
    reply: Chunk,
}

impl ChunkHandler for FixedReply {
    fn process_chunk(&mut self, request: &Chunk) -> HostResult<Chunk> {
        self.seen.borrow_mut().push(request.clone());
        Ok(self.reply.clone())
    }
}

struct Failing {
    seen: Seen,
}

impl ChunkHandler for Failing {
    fn process_chunk(&mut self, request: &Chunk) -> HostResult<Chunk> {
        self.seen.borrow_mut().push(request.clone());
        Err(HostError::new(113, "INTERNAL"))
    }
}

struct Echo;

impl ChunkHandler for Echo {
    fn process_chunk(&mut self, request: &Chunk) -> HostResult<Chunk> {
        let mut data = request.data.clone();
        data.reverse();
        Ok(Chunk::new(request.chunk_type + 1, data))
    }
}

fn request(chunk_type: i32, payload: &[u8]) -> Vec<u8> {
    let mut bytes = chunk_type.to_be_bytes().to_vec();
    bytes.extend_from_slice(&(payload.len() as i32).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn missing_handler_answers_not_implemented() {
    let bytes = request(7, &[]);
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();
    let mut dispatcher = ChunkDispatcher::new();

    let outcome = dispatcher
        .dispatch(&mut input, &mut output)
        .expect("well-formed request");

    assert_eq!(outcome, DispatchOutcome::NotImplemented);
    assert_eq!(output.error(), Some(ErrorCode::NotImplemented));
    assert!(output.data().is_empty());
    assert_eq!(input.remaining(), 0);
}

#[test]
fn empty_reply_is_encoded_with_zero_length() {
    let seen = Seen::default();
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(FixedReply {
        seen: seen.clone(),
        reply: Chunk::new(5, Vec::new()),
    }));
    let bytes = request(7, &[]);
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();

    let outcome = dispatcher
        .dispatch(&mut input, &mut output)
        .expect("well-formed request");

    assert_eq!(outcome, DispatchOutcome::Replied);
    assert_eq!(output.error(), None);
    assert_eq!(output.data(), &[0, 0, 0, 5, 0, 0, 0, 0]);
    assert_eq!(seen.borrow().as_slice(), &[Chunk::new(7, Vec::new())]);
}

#[test]
fn reply_payload_follows_type_and_length() {
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(Echo));
    let bytes = request(0x4845_4C4F, b"abc");
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();

    dispatcher
        .dispatch(&mut input, &mut output)
        .expect("well-formed request");

    let mut reply = PacketReader::new(output.data());
    assert_eq!(reply.read_i32().expect("reply type"), 0x4845_4C50);
    assert_eq!(reply.read_byte_array().expect("reply payload"), b"cba".to_vec());
    assert_eq!(reply.remaining(), 0);
}

#[test]
fn handler_failure_is_suppressed_without_reply_fields() {
    let seen = Seen::default();
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(Failing { seen: seen.clone() }));
    let bytes = request(3, &[1, 2, 3, 4]);
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();

    let outcome = dispatcher
        .dispatch(&mut input, &mut output)
        .expect("handler failure is not a stream error");

    assert_eq!(
        outcome,
        DispatchOutcome::Suppressed(HostError::new(113, "INTERNAL"))
    );
    assert!(output.is_empty());
    assert_eq!(input.remaining(), 0);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn truncated_request_never_reaches_handler() {
    let seen = Seen::default();
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(FixedReply {
        seen: seen.clone(),
        reply: Chunk::new(1, vec![9]),
    }));
    let mut bytes = request(2, &[1, 2, 3, 4]);
    bytes.truncate(10);
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();

    let err = dispatcher
        .dispatch(&mut input, &mut output)
        .expect_err("truncated payload");

    assert_eq!(
        err,
        StreamError::Truncated {
            needed: 4,
            available: 2
        }
    );
    assert!(seen.borrow().is_empty());
    assert!(output.is_empty());
}

#[test]
fn negative_length_is_a_stream_error() {
    let mut bytes = 2_i32.to_be_bytes().to_vec();
    bytes.extend_from_slice(&(-4_i32).to_be_bytes());
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();
    let mut dispatcher = ChunkDispatcher::new();

    let err = dispatcher
        .dispatch(&mut input, &mut output)
        .expect_err("negative length");
    assert_eq!(err, StreamError::NegativeLength(-4));
    assert!(output.is_empty());
}

#[test]
fn each_request_reaches_handler_once() {
    let seen = Seen::default();
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(FixedReply {
        seen: seen.clone(),
        reply: Chunk::new(1, vec![0xFF]),
    }));

    for chunk_type in 0..4 {
        let bytes = request(chunk_type, &[chunk_type as u8]);
        let mut input = PacketReader::new(&bytes);
        let mut output = PacketWriter::new();
        dispatcher
            .dispatch(&mut input, &mut output)
            .expect("well-formed request");
    }

    let types: Vec<i32> = seen.borrow().iter().map(|chunk| chunk.chunk_type).collect();
    assert_eq!(types, vec![0, 1, 2, 3]);
}

#[test]
fn handler_can_be_registered_and_cleared() {
    let mut dispatcher = ChunkDispatcher::new();
    assert!(!dispatcher.has_handler());
    dispatcher.register_handler(Box::new(Echo));
    assert!(dispatcher.has_handler());
    dispatcher.clear_handler();

    let bytes = request(1, &[]);
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();
    let outcome = dispatcher
        .dispatch(&mut input, &mut output)
        .expect("well-formed request");
    assert_eq!(outcome, DispatchOutcome::NotImplemented);
}

#[test]
fn command_table_routes_only_the_chunk_command() {
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(Echo));
    let bytes = request(1, b"x");

    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();
    let outcome = dispatcher
        .handle_command(DDM_COMMAND_SET, 2, &mut input, &mut output)
        .expect("unknown command is answered");
    assert_eq!(outcome, DispatchOutcome::NotImplemented);
    assert_eq!(output.error(), Some(ErrorCode::NotImplemented));

    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();
    let outcome = dispatcher
        .handle_command(DDM_COMMAND_SET, CHUNK_COMMAND, &mut input, &mut output)
        .expect("chunk command");
    assert_eq!(outcome, DispatchOutcome::Replied);
}

#[test]
fn other_command_sets_are_not_routed_to_the_handler() {
    let seen = Seen::default();
    let mut dispatcher = ChunkDispatcher::with_handler(Box::new(FixedReply {
        seen: seen.clone(),
        reply: Chunk::new(1, vec![9]),
    }));
    let bytes = request(1, b"x");
    let mut input = PacketReader::new(&bytes);
    let mut output = PacketWriter::new();

    let outcome = dispatcher
        .handle_command(1, CHUNK_COMMAND, &mut input, &mut output)
        .expect("foreign command set is answered");

    assert_eq!(outcome, DispatchOutcome::NotImplemented);
    assert_eq!(output.error(), Some(ErrorCode::NotImplemented));
    assert!(seen.borrow().is_empty());
    assert_eq!(input.remaining(), bytes.len());
}
