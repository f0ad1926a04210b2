//! BSON document builder
//!
//! Writes tagged fields straight into a rope; embedded documents and arrays
//! are spliced in as complete sub-ropes without copying.

use crate::error::EncodeError;
use crate::rope::ByteRope;

use super::{tag, BsonDocument, BsonValue, ObjectId};

/// Builds a BSON document field by field.
///
/// Each `append_*` method writes the tag byte, the NUL-terminated field name,
/// and the tag-specific payload. [`DocumentBuilder::finish`] wraps the
/// accumulated fields with the int32 length prefix (counting itself and the
/// trailing NUL) and the terminator.
#[derive(Default)]
pub struct DocumentBuilder {
    fields: ByteRope,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_header(&mut self, tag: u8, name: &str) -> Result<(), EncodeError> {
        self.fields.append_u8(tag);
        self.fields.append_cstring(name)
    }

    pub fn append_double(&mut self, name: &str, v: f64) -> Result<(), EncodeError> {
        self.field_header(tag::DOUBLE, name)?;
        self.fields.append_f64_le(v);
        Ok(())
    }

    pub fn append_string(&mut self, name: &str, v: &str) -> Result<(), EncodeError> {
        self.field_header(tag::STRING, name)?;
        self.fields.append_utf8_string(v)
    }

    pub fn append_document(&mut self, name: &str, doc: &BsonDocument) -> Result<(), EncodeError> {
        self.field_header(tag::DOCUMENT, name)?;
        self.fields.append_rope(doc.rope().clone());
        Ok(())
    }

    pub fn append_array(&mut self, name: &str, values: &[BsonValue]) -> Result<(), EncodeError> {
        let mut array = ArrayBuilder::new();
        for value in values {
            array.push(value)?;
        }
        self.field_header(tag::ARRAY, name)?;
        self.fields.append_rope(array.finish()?.into_rope());
        Ok(())
    }

    /// Binary payload with subtype byte; the length prefix covers the payload
    /// only
    pub fn append_binary(
        &mut self,
        name: &str,
        subtype: u8,
        payload: &[u8],
    ) -> Result<(), EncodeError> {
        if payload.len() > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge(payload.len()));
        }
        self.field_header(tag::BINARY, name)?;
        self.fields.append_i32_le(payload.len() as i32);
        self.fields.append_u8(subtype);
        self.fields.append_bytes(payload);
        Ok(())
    }

    pub fn append_undefined(&mut self, name: &str) -> Result<(), EncodeError> {
        self.field_header(tag::UNDEFINED, name)
    }

    pub fn append_object_id(&mut self, name: &str, id: &ObjectId) -> Result<(), EncodeError> {
        self.field_header(tag::OBJECT_ID, name)?;
        self.fields.append_bytes(id.bytes());
        Ok(())
    }

    pub fn append_bool(&mut self, name: &str, v: bool) -> Result<(), EncodeError> {
        self.field_header(tag::BOOLEAN, name)?;
        self.fields.append_u8(v as u8);
        Ok(())
    }

    /// UTC datetime in milliseconds since the Unix epoch
    pub fn append_datetime_ms(&mut self, name: &str, millis: i64) -> Result<(), EncodeError> {
        self.field_header(tag::UTC_DATETIME, name)?;
        self.fields.append_i64_le(millis);
        Ok(())
    }

    pub fn append_null(&mut self, name: &str) -> Result<(), EncodeError> {
        self.field_header(tag::NULL, name)
    }

    /// Regex with option letters drawn from "ilmsux" in ascending order
    pub fn append_regex(
        &mut self,
        name: &str,
        pattern: &str,
        options: &str,
    ) -> Result<(), EncodeError> {
        validate_regex_options(options)?;
        self.field_header(tag::REGEX, name)?;
        self.fields.append_cstring(pattern)?;
        self.fields.append_cstring(options)?;
        Ok(())
    }

    pub fn append_dbpointer(
        &mut self,
        name: &str,
        namespace: &str,
        id: &ObjectId,
    ) -> Result<(), EncodeError> {
        self.field_header(tag::DB_POINTER, name)?;
        self.fields.append_utf8_string(namespace)?;
        self.fields.append_bytes(id.bytes());
        Ok(())
    }

    pub fn append_js_code(&mut self, name: &str, code: &str) -> Result<(), EncodeError> {
        self.field_header(tag::JS_CODE, name)?;
        self.fields.append_utf8_string(code)
    }

    pub fn append_symbol(&mut self, name: &str, symbol: &str) -> Result<(), EncodeError> {
        self.field_header(tag::SYMBOL, name)?;
        self.fields.append_utf8_string(symbol)
    }

    /// Code-with-scope: int32 total size, the code string, the scope document
    pub fn append_scoped_js(
        &mut self,
        name: &str,
        code: &str,
        scope: &BsonDocument,
    ) -> Result<(), EncodeError> {
        let total = 4 + (4 + code.len() + 1) + scope.rope().len();
        if total > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge(total));
        }
        self.field_header(tag::SCOPED_JS_CODE, name)?;
        self.fields.append_i32_le(total as i32);
        self.fields.append_utf8_string(code)?;
        self.fields.append_rope(scope.rope().clone());
        Ok(())
    }

    pub fn append_int32(&mut self, name: &str, v: i32) -> Result<(), EncodeError> {
        self.field_header(tag::INT32, name)?;
        self.fields.append_i32_le(v);
        Ok(())
    }

    pub fn append_timestamp(&mut self, name: &str, v: i64) -> Result<(), EncodeError> {
        self.field_header(tag::TIMESTAMP, name)?;
        self.fields.append_i64_le(v);
        Ok(())
    }

    pub fn append_int64(&mut self, name: &str, v: i64) -> Result<(), EncodeError> {
        self.field_header(tag::INT64, name)?;
        self.fields.append_i64_le(v);
        Ok(())
    }

    /// Append any decoded value under the given name
    pub fn append(&mut self, name: &str, value: &BsonValue) -> Result<(), EncodeError> {
        match value {
            BsonValue::Double(v) => self.append_double(name, *v),
            BsonValue::String(v) => self.append_string(name, v),
            BsonValue::Document(doc) => self.append_document(name, doc),
            BsonValue::Array(values) => self.append_array(name, values),
            BsonValue::Binary { subtype, payload } => self.append_binary(name, *subtype, payload),
            BsonValue::Undefined => self.append_undefined(name),
            BsonValue::ObjectId(id) => self.append_object_id(name, id),
            BsonValue::Boolean(v) => self.append_bool(name, *v),
            BsonValue::DateTime(millis) => self.append_datetime_ms(name, *millis),
            BsonValue::Null => self.append_null(name),
            BsonValue::Regex { pattern, options } => self.append_regex(name, pattern, options),
            BsonValue::DbPointer { namespace, id } => self.append_dbpointer(name, namespace, id),
            BsonValue::JsCode(code) => self.append_js_code(name, code),
            BsonValue::Symbol(symbol) => self.append_symbol(name, symbol),
            BsonValue::ScopedJsCode { code, scope } => self.append_scoped_js(name, code, scope),
            BsonValue::Int32(v) => self.append_int32(name, *v),
            BsonValue::Timestamp(v) => self.append_timestamp(name, *v),
            BsonValue::Int64(v) => self.append_int64(name, *v),
        }
    }

    /// Wrap the accumulated fields into a complete document
    pub fn finish(self) -> Result<BsonDocument, EncodeError> {
        let total = 4 + self.fields.len() + 1;
        if total > i32::MAX as usize {
            return Err(EncodeError::ValueTooLarge(total));
        }
        let mut rope = ByteRope::new();
        rope.append_i32_le(total as i32);
        rope.append_rope(self.fields);
        rope.append_u8(0);
        Ok(BsonDocument::from_rope(rope))
    }
}

/// Builds a BSON array: a document keyed "0", "1", ... in push order
#[derive(Default)]
pub struct ArrayBuilder {
    builder: DocumentBuilder,
    index: usize,
}

impl ArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: &BsonValue) -> Result<(), EncodeError> {
        let key = self.index.to_string();
        self.index += 1;
        self.builder.append(&key, value)
    }

    pub fn finish(self) -> Result<BsonDocument, EncodeError> {
        self.builder.finish()
    }
}

fn validate_regex_options(options: &str) -> Result<(), EncodeError> {
    const ALLOWED: &[u8] = b"ilmsux";
    let mut last: Option<usize> = None;
    for c in options.bytes() {
        let idx = ALLOWED
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| EncodeError::InvalidRegexOptions(options.to_string()))?;
        if last.is_some_and(|prev| idx <= prev) {
            return Err(EncodeError::InvalidRegexOptions(options.to_string()));
        }
        last = Some(idx);
    }
    Ok(())
}
