//! Cursor Stream
//!
//! Demand-driven document stream backed by server-side cursors.
//!
//! ## Semantics
//! - Documents buffered from the last reply are drained first
//! - When the buffer empties and the cursor is still open, one GET_MORE is
//!   issued; the next round waits until the current batch is consumed
//! - Dropping the stream mid-cursor queues KILL_CURSORS on the same
//!   connection; a failure to send it is logged, never propagated

use std::collections::VecDeque;
use std::time::Duration;

use crate::bson::BsonDocument;
use crate::error::{MongoError, Result};
use crate::network::{Connection, ReplyFuture};
use crate::wire::{Message, Reply};

/// A demand-driven sequence of documents produced by a QUERY.
///
/// Also usable as an `Iterator` over `Result<BsonDocument>`; the first error
/// ends the iteration.
pub struct CursorStream {
    conn: Connection,
    full_collection_name: String,
    cursor_id: i64,
    buffer: VecDeque<BsonDocument>,
    batch_size: i32,
    request_timeout: Duration,
    pending_first: Option<ReplyFuture>,
    finished: bool,
}

impl CursorStream {
    pub(crate) fn new(
        conn: Connection,
        full_collection_name: String,
        first_reply: ReplyFuture,
        batch_size: i32,
        request_timeout: Duration,
    ) -> Self {
        CursorStream {
            conn,
            full_collection_name,
            cursor_id: 0,
            buffer: VecDeque::new(),
            batch_size,
            request_timeout,
            pending_first: Some(first_reply),
            finished: false,
        }
    }

    /// The server-side cursor id; 0 once the server holds no further data
    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    /// True when another document is available, fetching a batch if needed
    pub fn has_next(&mut self) -> Result<bool> {
        self.fill()?;
        Ok(!self.buffer.is_empty())
    }

    /// The next document, or None when the cursor is exhausted
    pub fn next_document(&mut self) -> Result<Option<BsonDocument>> {
        self.fill()?;
        Ok(self.buffer.pop_front())
    }

    /// Refill the buffer from the initial reply or a GET_MORE round
    fn fill(&mut self) -> Result<()> {
        if !self.buffer.is_empty() || self.finished {
            return Ok(());
        }

        let reply = if let Some(first) = self.pending_first.take() {
            first.wait_timeout(self.request_timeout)
        } else if self.cursor_id != 0 {
            let get_more = Message::get_more(
                self.full_collection_name.clone(),
                self.batch_size,
                self.cursor_id,
            );
            self.conn
                .submit(get_more)
                .and_then(|future| future.wait_timeout(self.request_timeout))
        } else {
            self.finished = true;
            return Ok(());
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };
        self.absorb(reply)
    }

    fn absorb(&mut self, reply: Reply) -> Result<()> {
        if reply.is_cursor_not_found() {
            // the server already dropped it; nothing left to kill
            self.finished = true;
            self.cursor_id = 0;
            return Err(MongoError::CursorInvalid);
        }
        if reply.is_query_failure() {
            self.finished = true;
            self.cursor_id = 0;
            let detail = reply
                .documents
                .into_iter()
                .next()
                .unwrap_or_else(BsonDocument::empty);
            return Err(MongoError::ServerError(detail));
        }

        self.cursor_id = reply.cursor_id;
        self.buffer.extend(reply.documents);
        if self.buffer.is_empty() && self.cursor_id == 0 {
            self.finished = true;
        }
        Ok(())
    }
}

impl Iterator for CursorStream {
    type Item = Result<BsonDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_document() {
            Ok(Some(doc)) => Some(Ok(doc)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for CursorStream {
    fn drop(&mut self) {
        if self.cursor_id == 0 {
            return;
        }
        let kill = Message::kill_cursors(vec![self.cursor_id]);
        match self.conn.fire_and_forget(kill) {
            Ok(()) => {
                tracing::debug!(cursor_id = self.cursor_id, "queued kill_cursors");
            }
            Err(e) => {
                tracing::warn!(
                    cursor_id = self.cursor_id,
                    error = %e,
                    "failed to queue kill_cursors"
                );
            }
        }
    }
}
