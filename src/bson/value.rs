//! BSON value definitions
//!
//! The tagged value variants of the BSON format, one per wire tag byte.

use super::{BsonDocument, ObjectId};

/// BSON element tag bytes
pub mod tag {
    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const UTC_DATETIME: u8 = 0x09;
    pub const NULL: u8 = 0x0A;
    pub const REGEX: u8 = 0x0B;
    pub const DB_POINTER: u8 = 0x0C;
    pub const JS_CODE: u8 = 0x0D;
    pub const SYMBOL: u8 = 0x0E;
    pub const SCOPED_JS_CODE: u8 = 0x0F;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
}

/// A decoded BSON value
///
/// The deprecated variants (Undefined, DbPointer, Symbol, ScopedJsCode) are
/// kept for wire compatibility with older servers.
#[derive(Debug, Clone, PartialEq)]
pub enum BsonValue {
    Double(f64),
    String(String),
    Document(BsonDocument),
    Array(Vec<BsonValue>),
    Binary { subtype: u8, payload: Vec<u8> },
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    DateTime(i64),
    Null,
    Regex { pattern: String, options: String },
    DbPointer { namespace: String, id: ObjectId },
    JsCode(String),
    Symbol(String),
    ScopedJsCode { code: String, scope: BsonDocument },
    Int32(i32),
    /// Internal replication timestamp, opaque int64
    Timestamp(i64),
    Int64(i64),
}

impl BsonValue {
    /// The wire tag byte for this variant
    pub fn tag(&self) -> u8 {
        match self {
            BsonValue::Double(_) => tag::DOUBLE,
            BsonValue::String(_) => tag::STRING,
            BsonValue::Document(_) => tag::DOCUMENT,
            BsonValue::Array(_) => tag::ARRAY,
            BsonValue::Binary { .. } => tag::BINARY,
            BsonValue::Undefined => tag::UNDEFINED,
            BsonValue::ObjectId(_) => tag::OBJECT_ID,
            BsonValue::Boolean(_) => tag::BOOLEAN,
            BsonValue::DateTime(_) => tag::UTC_DATETIME,
            BsonValue::Null => tag::NULL,
            BsonValue::Regex { .. } => tag::REGEX,
            BsonValue::DbPointer { .. } => tag::DB_POINTER,
            BsonValue::JsCode(_) => tag::JS_CODE,
            BsonValue::Symbol(_) => tag::SYMBOL,
            BsonValue::ScopedJsCode { .. } => tag::SCOPED_JS_CODE,
            BsonValue::Int32(_) => tag::INT32,
            BsonValue::Timestamp(_) => tag::TIMESTAMP,
            BsonValue::Int64(_) => tag::INT64,
        }
    }
}

impl From<f64> for BsonValue {
    fn from(v: f64) -> Self {
        BsonValue::Double(v)
    }
}

impl From<&str> for BsonValue {
    fn from(v: &str) -> Self {
        BsonValue::String(v.to_string())
    }
}

impl From<String> for BsonValue {
    fn from(v: String) -> Self {
        BsonValue::String(v)
    }
}

impl From<i32> for BsonValue {
    fn from(v: i32) -> Self {
        BsonValue::Int32(v)
    }
}

impl From<i64> for BsonValue {
    fn from(v: i64) -> Self {
        BsonValue::Int64(v)
    }
}

impl From<bool> for BsonValue {
    fn from(v: bool) -> Self {
        BsonValue::Boolean(v)
    }
}

impl From<BsonDocument> for BsonValue {
    fn from(v: BsonDocument) -> Self {
        BsonValue::Document(v)
    }
}

impl From<ObjectId> for BsonValue {
    fn from(v: ObjectId) -> Self {
        BsonValue::ObjectId(v)
    }
}
