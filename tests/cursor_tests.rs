//! Cursor Stream Tests
//!
//! Batch concatenation, demand-driven GET_MORE rounds, KILL_CURSORS on drop,
//! and server-side failure flags.

mod common;

use std::sync::mpsc;
use std::time::Duration;

use mongowire::bson::{BsonDocument, DocumentBuilder};
use mongowire::error::MongoError;
use mongowire::wire::{op_code, reply_flags, Message};
use mongowire::{Config, Driver};

use common::{get_more_cursor_id, kill_cursors_ids, read_request, spawn_server, write_reply};

fn doc(n: i32) -> BsonDocument {
    let mut b = DocumentBuilder::new();
    b.append_int32("seq", n).unwrap();
    b.finish().unwrap()
}

fn query() -> Message {
    Message::query("test.coll", 0, 0, 0, BsonDocument::empty(), None)
}

fn driver_for(addr: std::net::SocketAddr) -> (Driver, String) {
    (Driver::new(Config::default()), addr.to_string())
}

// =============================================================================
// Batch Concatenation
// =============================================================================

#[test]
fn test_get_more_rounds_concatenate_in_order() {
    common::init_tracing();
    const CURSOR: i64 = 77;

    let (addr, server) = spawn_server(|mut stream| {
        let request = read_request(&mut stream).expect("query");
        assert_eq!(request.op_code, op_code::QUERY);
        write_reply(&mut stream, request.request_id, 0, CURSOR, &[doc(0), doc(1)]);

        let request = read_request(&mut stream).expect("first get_more");
        assert_eq!(request.op_code, op_code::GET_MORE);
        assert_eq!(get_more_cursor_id(&request.body), CURSOR);
        write_reply(&mut stream, request.request_id, 0, CURSOR, &[doc(2), doc(3)]);

        let request = read_request(&mut stream).expect("second get_more");
        assert_eq!(request.op_code, op_code::GET_MORE);
        // cursor exhausted
        write_reply(&mut stream, request.request_id, 0, 0, &[doc(4)]);
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let mut stream = supervisor.query(query()).unwrap();

    let mut seen = Vec::new();
    while stream.has_next().unwrap() {
        let document = stream.next_document().unwrap().unwrap();
        seen.push(document.get_int32("seq").unwrap().unwrap());
    }
    assert_eq!(seen, [0, 1, 2, 3, 4]);
    assert_eq!(stream.cursor_id(), 0);
    assert!(stream.next_document().unwrap().is_none());

    drop(stream);
    supervisor.shutdown();
    server.join().unwrap();
}

// =============================================================================
// Kill on Drop
// =============================================================================

#[test]
fn test_drop_mid_stream_kills_cursor_exactly_once() {
    const CURSOR: i64 = 99;
    let (kill_tx, kill_rx) = mpsc::channel::<Vec<i64>>();

    let (addr, server) = spawn_server(move |mut stream| {
        let request = read_request(&mut stream).expect("query");
        write_reply(&mut stream, request.request_id, 0, CURSOR, &[doc(0), doc(1)]);

        // the only further traffic must be the cursor kill
        while let Some(request) = read_request(&mut stream) {
            assert_eq!(request.op_code, op_code::KILL_CURSORS);
            kill_tx.send(kill_cursors_ids(&request.body)).unwrap();
        }
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let mut stream = supervisor.query(query()).unwrap();

    assert!(stream.has_next().unwrap());
    let first = stream.next_document().unwrap().unwrap();
    assert_eq!(first.get_int32("seq").unwrap(), Some(0));

    // abandon the stream with the cursor still open
    drop(stream);

    let ids = kill_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("kill_cursors was never sent");
    assert_eq!(ids, [CURSOR]);
    assert!(
        kill_rx.recv_timeout(Duration::from_millis(300)).is_err(),
        "kill_cursors sent more than once"
    );

    supervisor.shutdown();
    server.join().unwrap();
}

#[test]
fn test_exhausted_stream_sends_no_kill() {
    let (kill_tx, kill_rx) = mpsc::channel::<Vec<i64>>();

    let (addr, server) = spawn_server(move |mut stream| {
        let request = read_request(&mut stream).expect("query");
        // single batch, cursor already closed server-side
        write_reply(&mut stream, request.request_id, 0, 0, &[doc(0)]);
        while let Some(request) = read_request(&mut stream) {
            if request.op_code == op_code::KILL_CURSORS {
                kill_tx.send(kill_cursors_ids(&request.body)).unwrap();
            }
        }
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let mut stream = supervisor.query(query()).unwrap();

    assert!(stream.has_next().unwrap());
    stream.next_document().unwrap().unwrap();
    assert!(!stream.has_next().unwrap());
    drop(stream);

    assert!(kill_rx.recv_timeout(Duration::from_millis(300)).is_err());
    supervisor.shutdown();
    server.join().unwrap();
}

// =============================================================================
// Server-side Failures
// =============================================================================

#[test]
fn test_cursor_not_found_terminates_stream() {
    let (addr, server) = spawn_server(|mut stream| {
        let request = read_request(&mut stream).expect("query");
        write_reply(
            &mut stream,
            request.request_id,
            reply_flags::CURSOR_NOT_FOUND,
            0,
            &[],
        );
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let mut stream = supervisor.query(query()).unwrap();

    assert!(matches!(
        stream.has_next().unwrap_err(),
        MongoError::CursorInvalid
    ));
    drop(stream);
    supervisor.shutdown();
    server.join().unwrap();
}

#[test]
fn test_query_failure_carries_error_document() {
    let (addr, server) = spawn_server(|mut stream| {
        let request = read_request(&mut stream).expect("query");
        let mut b = DocumentBuilder::new();
        b.append_string("$err", "exhausted memory").unwrap();
        let err_doc = b.finish().unwrap();
        write_reply(
            &mut stream,
            request.request_id,
            reply_flags::QUERY_FAILURE,
            0,
            &[err_doc],
        );
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let mut stream = supervisor.query(query()).unwrap();

    match stream.has_next().unwrap_err() {
        MongoError::ServerError(detail) => {
            assert_eq!(
                detail.get_utf8("$err").unwrap(),
                Some("exhausted memory".into())
            );
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
    drop(stream);
    supervisor.shutdown();
    server.join().unwrap();
}

// =============================================================================
// Iterator Adapter
// =============================================================================

#[test]
fn test_stream_as_iterator() {
    let (addr, server) = spawn_server(|mut stream| {
        let request = read_request(&mut stream).expect("query");
        write_reply(&mut stream, request.request_id, 0, 0, &[doc(1), doc(2)]);
    });

    let (driver, endpoint) = driver_for(addr);
    let supervisor = driver.connect(&endpoint).unwrap();
    let stream = supervisor.query(query()).unwrap();

    let seqs: Vec<i32> = stream
        .map(|result| result.unwrap().get_int32("seq").unwrap().unwrap())
        .collect();
    assert_eq!(seqs, [1, 2]);

    supervisor.shutdown();
    server.join().unwrap();
}
