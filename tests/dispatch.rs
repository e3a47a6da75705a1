mod common;

use std::io;

use boardlink::dispatch::{DispatchEngine, DispatchState, MAX_CHUNK};
use boardlink::Error;

use common::{MockTransport, Script};

fn block(opening: u8, body_len: usize) -> Vec<u8> {
    let mut buffer = vec![opening];
    buffer.extend(std::iter::repeat(b'a').take(body_len));
    buffer
}

#[test]
fn lines_wait_for_acknowledgment() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G1 X1\nG1 Y1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 X1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 X1\n", "G1 Y1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.writes().len(), 2);
    assert_eq!(engine.state(), DispatchState::Idle);
    assert!(engine.is_drained());
    assert_eq!(engine.stats().acknowledgments, 2);
    assert_eq!(engine.stats().lines_sent, 2);
}

#[test]
fn last_line_gets_a_newline() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G1 X1".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 X1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);
    assert!(!engine.has_pending());
}

#[test]
fn empty_line_still_sends_one_byte() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"\nG1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["\n\n"]);
    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["\n\n", "G1\n"]);
}

#[test]
fn unclosed_block_is_chunked_and_closed() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(block(b'#', 129), &mut wire).unwrap();

    assert_eq!(wire.chunk_sizes(), vec![64, 64, 3]);
    assert_eq!(wire.writes()[2], b"aa#".to_vec());
    assert_eq!(engine.state(), DispatchState::Idle);
    assert!(engine.is_drained());
    assert_eq!(engine.stats().chunks_sent, 3);
    assert_eq!(engine.stats().bytes_written, 131);
}

#[test]
fn chunks_never_exceed_the_receive_buffer() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(block(b'%', 1000), &mut wire).unwrap();

    assert!(wire.chunk_sizes().iter().all(|&size| size <= MAX_CHUNK));
    let streamed: Vec<u8> = wire.writes().concat();
    assert_eq!(streamed.len(), 1002);
    assert_eq!(streamed.last(), Some(&b'%'));
}

#[test]
fn closed_block_goes_out_raw() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"%abc%".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["%abc%"]);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn closing_delimiter_alone_in_last_chunk() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    let mut buffer = block(b'#', 63);
    buffer.push(b'#');
    assert_eq!(buffer.len(), 65);
    engine.submit(buffer, &mut wire).unwrap();

    assert_eq!(wire.chunk_sizes(), vec![64, 1]);
    assert_eq!(wire.writes()[1], b"#".to_vec());
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn lines_after_a_block_are_acknowledgment_gated() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"#ab#G1 X1\nG1 Y1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["#ab#", "G1 X1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["#ab#", "G1 X1\n", "G1 Y1\n"]);
}

#[test]
fn block_after_a_line_waits_for_acknowledgment() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G1 X1\n$cfg$".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 X1\n"]);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 X1\n", "$cfg$"]);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn submit_while_idle_writes_immediately() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    assert_eq!(engine.state(), DispatchState::Idle);
    engine.submit(b"G0\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G0\n"]);
}

#[test]
fn submit_while_awaiting_only_queues() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G0\n".to_vec(), &mut wire).unwrap();
    engine.submit(b"G1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G0\n"]);
    assert_eq!(engine.queued(), 1);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G0\n", "G1\n"]);
    assert_eq!(engine.queued(), 0);
}

#[test]
fn buffers_are_dispatched_in_submission_order() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"A1\nA2\n".to_vec(), &mut wire).unwrap();
    engine.submit(b"B1\n".to_vec(), &mut wire).unwrap();
    for _ in 0..3 {
        engine.on_acknowledgment(&mut wire).unwrap();
    }
    assert_eq!(wire.lines(), vec!["A1\n", "A2\n", "B1\n"]);
    assert!(engine.is_drained());
}

#[test]
fn acknowledgment_while_idle_is_ignored() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.on_acknowledgment(&mut wire).unwrap();
    assert!(wire.writes().is_empty());
    assert_eq!(engine.state(), DispatchState::Idle);
    assert_eq!(engine.stats().acknowledgments, 0);
}

#[test]
fn empty_buffer_is_ignored() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(Vec::new(), &mut wire).unwrap();
    assert!(wire.writes().is_empty());
    assert!(engine.is_drained());
}

#[test]
fn dollar_opens_a_block_on_the_way_out() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"$R\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["$R\n$"]);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn failed_line_write_is_reported_and_kept() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));

    match engine.submit(b"G1\n".to_vec(), &mut wire) {
        Err(Error::TransportWrite(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(wire.writes().is_empty());
    assert_eq!(engine.state(), DispatchState::Idle);
    assert!(engine.has_pending());

    engine.resume(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);
}

#[test]
fn next_submit_retries_after_a_failure() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Fail(io::ErrorKind::TimedOut));

    assert!(engine.submit(b"G1\n".to_vec(), &mut wire).is_err());
    engine.submit(b"G2\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1\n"]);
    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1\n", "G2\n"]);
}

#[test]
fn failure_inside_a_block_resumes_the_block() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(usize::MAX));
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));

    assert!(engine.submit(block(b'#', 129), &mut wire).is_err());
    assert_eq!(wire.chunk_sizes(), vec![64]);
    assert_eq!(
        engine.state(),
        DispatchState::StreamingSpecialBlock { delimiter: b'#' }
    );

    engine.resume(&mut wire).unwrap();
    assert_eq!(wire.chunk_sizes(), vec![64, 64, 3]);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn failure_on_the_opening_chunk_keeps_the_opener() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));

    assert!(engine.submit(b"#ab#".to_vec(), &mut wire).is_err());
    engine.resume(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["#ab#"]);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn error_after_a_short_write_is_reported() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(2));
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));

    match engine.submit(b"G1 X1\nG1 Y1\n".to_vec(), &mut wire) {
        Err(Error::TransportWrite(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(wire.lines(), vec!["G1"]);
    assert_eq!(engine.state(), DispatchState::Idle);
    assert!(engine.has_pending());

    // Only the rest of the interrupted line goes out again.
    engine.resume(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1", " X1\n"]);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1", " X1\n", "G1 Y1\n"]);
}

#[test]
fn error_after_a_short_block_chunk_is_reported() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(10));
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));

    assert!(matches!(
        engine.submit(block(b'%', 129), &mut wire),
        Err(Error::TransportWrite(_))
    ));
    assert_eq!(wire.chunk_sizes(), vec![10]);
    assert_eq!(
        engine.state(),
        DispatchState::StreamingSpecialBlock { delimiter: b'%' }
    );

    engine.resume(&mut wire).unwrap();
    assert_eq!(wire.chunk_sizes(), vec![10, 64, 57]);
    assert_eq!(wire.writes().concat().len(), 131);
    assert_eq!(engine.state(), DispatchState::Idle);
}

#[test]
fn short_writes_are_completed() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(2));

    engine.submit(b"G1 X1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1", " X1\n"]);
    assert_eq!(engine.stats().partial_writes, 0);
    assert_eq!(engine.stats().bytes_written, 6);
}

#[test]
fn stalled_write_drops_the_remainder() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(3));
    wire.script(Script::Accept(0));

    engine.submit(b"G1 X1\nG1 Y1\n".to_vec(), &mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 "]);
    assert_eq!(engine.stats().partial_writes, 1);
    assert_eq!(engine.state(), DispatchState::AwaitingAck);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1 ", "G1 Y1\n"]);
}

#[test]
fn transport_accepting_nothing_is_a_failure() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();
    wire.script(Script::Accept(0));

    assert!(matches!(
        engine.submit(b"G1\n".to_vec(), &mut wire),
        Err(Error::TransportWrite(_))
    ));
    assert!(engine.has_pending());
}

#[test]
fn progress_counts_only_the_buffer_in_flight() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G1\nG2\n".to_vec(), &mut wire).unwrap();
    engine.submit(b"M3\n".to_vec(), &mut wire).unwrap();
    assert_eq!(engine.pending_len(), 3);
    assert_eq!(engine.stats().buffers_completed, 0);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(engine.pending_len(), 0);
    assert_eq!(engine.stats().buffers_completed, 1);

    // An unclosed block counts its synthetic delimiter.
    let mut engine = DispatchEngine::new();
    wire.script(Script::Fail(io::ErrorKind::BrokenPipe));
    assert!(engine.submit(block(b'#', 9), &mut wire).is_err());
    assert_eq!(engine.pending_len(), 11);
}

#[test]
fn reset_forgets_everything() {
    let mut engine = DispatchEngine::new();
    let mut wire = MockTransport::new();

    engine.submit(b"G1\nG2\n".to_vec(), &mut wire).unwrap();
    engine.submit(b"G3\n".to_vec(), &mut wire).unwrap();
    engine.reset();

    assert_eq!(engine.state(), DispatchState::Idle);
    assert!(!engine.has_pending());
    assert_eq!(engine.queued(), 0);

    engine.on_acknowledgment(&mut wire).unwrap();
    assert_eq!(wire.lines(), vec!["G1\n"]);
}
