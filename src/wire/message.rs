//! Request message definitions
//!
//! The closed sum of client request messages, dispatched by variant.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::bson::BsonDocument;

/// Wire op-codes
pub mod op_code {
    pub const REPLY: i32 = 1;
    /// Deprecated op, defined for completeness; never constructed
    pub const MSG: i32 = 1000;
    pub const UPDATE: i32 = 2001;
    pub const INSERT: i32 = 2002;
    pub const RESERVED: i32 = 2003;
    pub const QUERY: i32 = 2004;
    pub const GET_MORE: i32 = 2005;
    pub const DELETE: i32 = 2006;
    pub const KILL_CURSORS: i32 = 2007;
}

/// UPDATE flag bits
pub mod update_flags {
    pub const UPSERT: i32 = 1;
    pub const MULTI_UPDATE: i32 = 2;
}

/// INSERT flag bits
pub mod insert_flags {
    pub const CONTINUE_ON_ERROR: i32 = 1;
}

/// QUERY flag bits. Bit 0 is reserved; bit 3 (oplogReplay) is never set by
/// this layer.
pub mod query_flags {
    pub const TAILABLE_CURSOR: i32 = 2;
    pub const SLAVE_OK: i32 = 4;
    pub const NO_CURSOR_TIMEOUT: i32 = 16;
    pub const AWAIT_DATA: i32 = 32;
    pub const EXHAUST: i32 = 64;
    pub const PARTIAL: i32 = 128;
}

/// DELETE flag bits
pub mod delete_flags {
    pub const SINGLE_REMOVE: i32 = 1;
}

// =============================================================================
// Request Id Allocation
// =============================================================================

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Allocate a fresh request id: strictly positive, monotonically increasing,
/// wrapping modulo 2^31 and skipping zero. Process-global so ids stay unique
/// across every connection for log correlation.
pub fn next_request_id() -> i32 {
    loop {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed) & 0x7fff_ffff;
        if id != 0 {
            return id;
        }
    }
}

// =============================================================================
// Request Messages
// =============================================================================

/// A client request message
#[derive(Debug, Clone)]
pub enum Message {
    Update {
        full_collection_name: String,
        flags: i32,
        selector: BsonDocument,
        update: BsonDocument,
    },
    Insert {
        flags: i32,
        full_collection_name: String,
        documents: Vec<BsonDocument>,
    },
    Query {
        flags: i32,
        full_collection_name: String,
        number_to_skip: i32,
        number_to_return: i32,
        query: BsonDocument,
        return_fields_selector: Option<BsonDocument>,
    },
    GetMore {
        full_collection_name: String,
        number_to_return: i32,
        cursor_id: i64,
    },
    Delete {
        full_collection_name: String,
        flags: i32,
        selector: BsonDocument,
    },
    KillCursors {
        cursor_ids: Vec<i64>,
    },
}

impl Message {
    /// The wire op-code for this variant
    pub fn op_code(&self) -> i32 {
        match self {
            Message::Update { .. } => op_code::UPDATE,
            Message::Insert { .. } => op_code::INSERT,
            Message::Query { .. } => op_code::QUERY,
            Message::GetMore { .. } => op_code::GET_MORE,
            Message::Delete { .. } => op_code::DELETE,
            Message::KillCursors { .. } => op_code::KILL_CURSORS,
        }
    }

    /// Whether a submitted message registers a waiting requester.
    /// KILL_CURSORS is the one true fire-and-forget.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Message::KillCursors { .. })
    }

    pub fn update(
        full_collection_name: impl Into<String>,
        flags: i32,
        selector: BsonDocument,
        update: BsonDocument,
    ) -> Self {
        Message::Update {
            full_collection_name: full_collection_name.into(),
            flags,
            selector,
            update,
        }
    }

    pub fn insert(
        full_collection_name: impl Into<String>,
        flags: i32,
        documents: Vec<BsonDocument>,
    ) -> Self {
        Message::Insert {
            flags,
            full_collection_name: full_collection_name.into(),
            documents,
        }
    }

    /// Note: the server treats `number_to_return == 1` as "close the cursor
    /// after the first batch"; callers expecting more than one result should
    /// pass at least 2. The codec does not rewrite the value.
    pub fn query(
        full_collection_name: impl Into<String>,
        flags: i32,
        number_to_skip: i32,
        number_to_return: i32,
        query: BsonDocument,
        return_fields_selector: Option<BsonDocument>,
    ) -> Self {
        Message::Query {
            flags,
            full_collection_name: full_collection_name.into(),
            number_to_skip,
            number_to_return,
            query,
            return_fields_selector,
        }
    }

    pub fn get_more(
        full_collection_name: impl Into<String>,
        number_to_return: i32,
        cursor_id: i64,
    ) -> Self {
        Message::GetMore {
            full_collection_name: full_collection_name.into(),
            number_to_return,
            cursor_id,
        }
    }

    pub fn delete(
        full_collection_name: impl Into<String>,
        flags: i32,
        selector: BsonDocument,
    ) -> Self {
        Message::Delete {
            full_collection_name: full_collection_name.into(),
            flags,
            selector,
        }
    }

    pub fn kill_cursors(cursor_ids: Vec<i64>) -> Self {
        Message::KillCursors { cursor_ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_ids_positive_and_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = next_request_id();
            assert!(id > 0);
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_request_ids_monotonic() {
        let a = next_request_id();
        let b = next_request_id();
        assert!(b > a);
    }
}
