//! Shared test helpers
//!
//! A scripted in-process "mongod": accepts one TCP connection and hands it to
//! a closure that reads raw request frames and writes raw reply frames.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use mongowire::bson::BsonDocument;

/// Spawn a listener on an ephemeral port and run `script` on the first
/// accepted connection
pub fn spawn_server<F>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind scripted server");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            stream.set_nodelay(true).ok();
            script(stream);
        }
    });
    (addr, handle)
}

/// One decoded request frame as seen by the scripted server
pub struct RawRequest {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
    /// Frame bytes after the 16-byte header
    pub body: Vec<u8>,
}

/// Read one length-prefixed frame; None on clean EOF
pub fn read_request(stream: &mut TcpStream) -> Option<RawRequest> {
    let mut len_buf = [0u8; 4];
    if stream.read_exact(&mut len_buf).is_err() {
        return None;
    }
    let message_length = i32::from_le_bytes(len_buf);
    assert!(message_length >= 16, "frame shorter than its header");

    let mut rest = vec![0u8; message_length as usize - 4];
    stream.read_exact(&mut rest).expect("read frame body");

    let int_at = |offset: usize| {
        i32::from_le_bytes([
            rest[offset],
            rest[offset + 1],
            rest[offset + 2],
            rest[offset + 3],
        ])
    };
    Some(RawRequest {
        message_length,
        request_id: int_at(0),
        response_to: int_at(4),
        op_code: int_at(8),
        body: rest[12..].to_vec(),
    })
}

/// Serialize an OP_REPLY frame
pub fn reply_frame(
    response_to: i32,
    response_flags: i32,
    cursor_id: i64,
    docs: &[BsonDocument],
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&response_flags.to_le_bytes());
    body.extend_from_slice(&cursor_id.to_le_bytes());
    body.extend_from_slice(&0i32.to_le_bytes()); // startingFrom
    body.extend_from_slice(&(docs.len() as i32).to_le_bytes());
    for doc in docs {
        body.extend_from_slice(&doc.to_vec());
    }

    let total = 16 + body.len();
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&(total as i32).to_le_bytes());
    frame.extend_from_slice(&0i32.to_le_bytes()); // server-side request id
    frame.extend_from_slice(&response_to.to_le_bytes());
    frame.extend_from_slice(&1i32.to_le_bytes()); // OP_REPLY
    frame.extend_from_slice(&body);
    frame
}

pub fn write_reply(
    stream: &mut TcpStream,
    response_to: i32,
    response_flags: i32,
    cursor_id: i64,
    docs: &[BsonDocument],
) {
    let frame = reply_frame(response_to, response_flags, cursor_id, docs);
    stream.write_all(&frame).expect("write reply");
    stream.flush().expect("flush reply");
}

/// A `{ok: 1.0, n: 1}` acknowledgment document
pub fn ack_doc() -> BsonDocument {
    let mut builder = BsonDocument::builder();
    builder.append_double("ok", 1.0).unwrap();
    builder.append_int32("n", 1).unwrap();
    builder.finish().unwrap()
}

/// Skip past the NUL-terminated collection name starting at `offset`,
/// returning the index just after the terminator
pub fn skip_cstring(body: &[u8], offset: usize) -> usize {
    let nul = body[offset..]
        .iter()
        .position(|&b| b == 0)
        .expect("cstring terminator");
    offset + nul + 1
}

/// Extract the query document from an OP_QUERY body
/// (flags, cstring, skip, return, doc)
pub fn query_document(body: &[u8]) -> BsonDocument {
    let after_name = skip_cstring(body, 4);
    let doc_start = after_name + 8;
    let doc_len =
        i32::from_le_bytes(body[doc_start..doc_start + 4].try_into().unwrap()) as usize;
    BsonDocument::from_vec(body[doc_start..doc_start + doc_len].to_vec())
}

/// Extract the cursor id from an OP_GET_MORE body
/// (zero, cstring, numberToReturn, cursorID)
pub fn get_more_cursor_id(body: &[u8]) -> i64 {
    let after_name = skip_cstring(body, 4);
    let at = after_name + 4;
    i64::from_le_bytes(body[at..at + 8].try_into().expect("cursor id bytes"))
}

/// Extract the cursor ids from an OP_KILL_CURSORS body
pub fn kill_cursors_ids(body: &[u8]) -> Vec<i64> {
    let count = i32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;
    (0..count)
        .map(|i| {
            let at = 8 + i * 8;
            i64::from_le_bytes(body[at..at + 8].try_into().unwrap())
        })
        .collect()
}

/// Install the test log subscriber once; respects RUST_LOG
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
