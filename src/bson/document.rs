//! Lazy BSON document view
//!
//! A document is canonically stored as its serialized rope; field lookups
//! scan the rope in wire order and decode only the requested value.

use crate::error::DecodeError;
use crate::rope::{ByteRope, RopeReader};

use super::{tag, BsonValue, DocumentBuilder, ObjectId};

/// A BSON document backed by its serialized bytes.
///
/// Cloning shares the underlying chunks. Field lookups reflect on-wire order;
/// duplicate names are tolerated and the first match wins.
#[derive(Clone)]
pub struct BsonDocument {
    rope: ByteRope,
}

impl BsonDocument {
    /// Wrap a serialized document. The bytes are trusted until a field access
    /// walks them; use [`BsonDocument::validate`] to check eagerly.
    pub fn from_rope(rope: ByteRope) -> Self {
        BsonDocument { rope }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        BsonDocument {
            rope: ByteRope::from_vec(bytes),
        }
    }

    /// The canonical empty document (5 bytes)
    pub fn empty() -> Self {
        let mut rope = ByteRope::new();
        rope.append_i32_le(5);
        rope.append_u8(0);
        BsonDocument { rope }
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    pub fn rope(&self) -> &ByteRope {
        &self.rope
    }

    pub fn into_rope(self) -> ByteRope {
        self.rope
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.rope.to_vec()
    }

    /// The declared total length from the leading int32
    pub fn byte_len(&self) -> Result<i32, DecodeError> {
        self.rope.reader().read_i32_le()
    }

    /// Walk every field, checking lengths, tags and the terminator
    pub fn validate(&self) -> Result<(), DecodeError> {
        let declared = self.byte_len()?;
        if declared < 5 || declared as usize != self.rope.len() {
            return Err(DecodeError::LengthMismatch {
                declared,
                available: self.rope.len(),
            });
        }
        for field in self.iter() {
            field?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Field access
    // -------------------------------------------------------------------------

    /// True when a field of that name exists and the document is well formed
    /// up to it
    pub fn contains(&self, name: &str) -> bool {
        matches!(self.seek(name), Ok(Some(_)))
    }

    /// First field of that name, decoded; None when absent
    pub fn get(&self, name: &str) -> Result<Option<BsonValue>, DecodeError> {
        match self.seek(name)? {
            None => Ok(None),
            Some((tag, mut reader)) => decode_value(&self.rope, &mut reader, tag).map(Some),
        }
    }

    pub fn get_double(&self, name: &str) -> Result<Option<f64>, DecodeError> {
        match self.seek_typed(name, tag::DOUBLE)? {
            None => Ok(None),
            Some(mut reader) => reader.read_f64_le().map(Some),
        }
    }

    pub fn get_int32(&self, name: &str) -> Result<Option<i32>, DecodeError> {
        match self.seek_typed(name, tag::INT32)? {
            None => Ok(None),
            Some(mut reader) => reader.read_i32_le().map(Some),
        }
    }

    pub fn get_int64(&self, name: &str) -> Result<Option<i64>, DecodeError> {
        match self.seek_typed(name, tag::INT64)? {
            None => Ok(None),
            Some(mut reader) => reader.read_i64_le().map(Some),
        }
    }

    pub fn get_utf8(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.seek_typed(name, tag::STRING)? {
            None => Ok(None),
            Some(mut reader) => reader.read_utf8_string().map(Some),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, DecodeError> {
        match self.seek_typed(name, tag::BOOLEAN)? {
            None => Ok(None),
            Some(mut reader) => Ok(Some(reader.read_u8()? != 0)),
        }
    }

    pub fn get_datetime_ms(&self, name: &str) -> Result<Option<i64>, DecodeError> {
        match self.seek_typed(name, tag::UTC_DATETIME)? {
            None => Ok(None),
            Some(mut reader) => reader.read_i64_le().map(Some),
        }
    }

    pub fn get_object_id(&self, name: &str) -> Result<Option<ObjectId>, DecodeError> {
        match self.seek_typed(name, tag::OBJECT_ID)? {
            None => Ok(None),
            Some(mut reader) => {
                let bytes = reader.read_bytes(12)?;
                let mut id = [0u8; 12];
                id.copy_from_slice(&bytes);
                Ok(Some(ObjectId::from_bytes(id)))
            }
        }
    }

    pub fn get_binary(&self, name: &str) -> Result<Option<(u8, Vec<u8>)>, DecodeError> {
        match self.seek_typed(name, tag::BINARY)? {
            None => Ok(None),
            Some(mut reader) => {
                let len = reader.read_i32_le()?;
                if len < 0 {
                    return Err(DecodeError::LengthMismatch {
                        declared: len,
                        available: reader.remaining(),
                    });
                }
                let subtype = reader.read_u8()?;
                let payload = reader.read_bytes(len as usize)?;
                Ok(Some((subtype, payload)))
            }
        }
    }

    pub fn get_array(&self, name: &str) -> Result<Option<Vec<BsonValue>>, DecodeError> {
        match self.seek_typed(name, tag::ARRAY)? {
            None => Ok(None),
            Some(mut reader) => {
                match decode_value(&self.rope, &mut reader, tag::ARRAY)? {
                    BsonValue::Array(values) => Ok(Some(values)),
                    _ => unreachable!("array tag decodes to Array"),
                }
            }
        }
    }

    pub fn get_document(&self, name: &str) -> Result<Option<BsonDocument>, DecodeError> {
        match self.seek_typed(name, tag::DOCUMENT)? {
            None => Ok(None),
            Some(mut reader) => {
                match decode_value(&self.rope, &mut reader, tag::DOCUMENT)? {
                    BsonValue::Document(doc) => Ok(Some(doc)),
                    _ => unreachable!("document tag decodes to Document"),
                }
            }
        }
    }

    /// Iterate fields in wire order
    pub fn iter(&self) -> FieldIter<'_> {
        FieldIter {
            doc: self,
            state: IterState::Start,
        }
    }

    /// Position a reader at the value bytes of the first field named `name`
    fn seek(&self, name: &str) -> Result<Option<(u8, RopeReader<'_>)>, DecodeError> {
        let mut reader = self.rope.reader();
        reader.read_i32_le()?;
        loop {
            let tag = reader.read_u8()?;
            if tag == 0 {
                return Ok(None);
            }
            let field_name = reader.read_cstring()?;
            if field_name == name {
                return Ok(Some((tag, reader)));
            }
            skip_value(&mut reader, tag)?;
        }
    }

    fn seek_typed(
        &self,
        name: &str,
        expected: u8,
    ) -> Result<Option<RopeReader<'_>>, DecodeError> {
        match self.seek(name)? {
            None => Ok(None),
            Some((found, _)) if found != expected => Err(DecodeError::TypeMismatch {
                name: name.to_string(),
                expected,
                found,
            }),
            Some((_, reader)) => Ok(Some(reader)),
        }
    }
}

impl PartialEq for BsonDocument {
    fn eq(&self, other: &Self) -> bool {
        self.rope == other.rope
    }
}

impl std::fmt::Debug for BsonDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for field in self.iter() {
            match field {
                Ok((name, value)) => {
                    map.entry(&name, &value);
                }
                Err(e) => {
                    map.entry(&"<decode error>", &e);
                    break;
                }
            }
        }
        map.finish()
    }
}

enum IterState {
    Start,
    Running(usize),
    Done,
}

/// Iterator over `(name, value)` pairs in wire order
pub struct FieldIter<'a> {
    doc: &'a BsonDocument,
    state: IterState,
}

impl FieldIter<'_> {
    fn step(
        doc: &BsonDocument,
        reader: &mut RopeReader<'_>,
    ) -> Result<Option<(String, BsonValue)>, DecodeError> {
        let tag = reader.read_u8()?;
        if tag == 0 {
            return Ok(None);
        }
        let name = reader.read_cstring()?;
        let value = decode_value(&doc.rope, reader, tag)?;
        Ok(Some((name, value)))
    }
}

impl Iterator for FieldIter<'_> {
    type Item = Result<(String, BsonValue), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let resume_at = match self.state {
            IterState::Start => {
                let mut reader = self.doc.rope.reader();
                match reader.read_i32_le() {
                    Ok(_) => reader.position(),
                    Err(e) => {
                        self.state = IterState::Done;
                        return Some(Err(e));
                    }
                }
            }
            IterState::Running(pos) => pos,
            IterState::Done => return None,
        };

        let mut reader = self.doc.rope.reader();
        if let Err(e) = reader.skip(resume_at) {
            self.state = IterState::Done;
            return Some(Err(e));
        }
        match Self::step(self.doc, &mut reader) {
            Ok(Some(field)) => {
                self.state = IterState::Running(reader.position());
                Some(Ok(field))
            }
            Ok(None) => {
                self.state = IterState::Done;
                None
            }
            Err(e) => {
                self.state = IterState::Done;
                Some(Err(e))
            }
        }
    }
}

/// Decode one value, advancing the reader past it
pub(crate) fn decode_value(
    rope: &ByteRope,
    reader: &mut RopeReader<'_>,
    tag_byte: u8,
) -> Result<BsonValue, DecodeError> {
    match tag_byte {
        tag::DOUBLE => Ok(BsonValue::Double(reader.read_f64_le()?)),
        tag::STRING => Ok(BsonValue::String(reader.read_utf8_string()?)),
        tag::DOCUMENT => Ok(BsonValue::Document(read_subdocument(rope, reader)?)),
        tag::ARRAY => {
            let doc = read_subdocument(rope, reader)?;
            let mut values = Vec::new();
            for field in doc.iter() {
                values.push(field?.1);
            }
            Ok(BsonValue::Array(values))
        }
        tag::BINARY => {
            let len = reader.read_i32_le()?;
            if len < 0 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining(),
                });
            }
            let subtype = reader.read_u8()?;
            let payload = reader.read_bytes(len as usize)?;
            Ok(BsonValue::Binary { subtype, payload })
        }
        tag::UNDEFINED => Ok(BsonValue::Undefined),
        tag::OBJECT_ID => {
            let bytes = reader.read_bytes(12)?;
            let mut id = [0u8; 12];
            id.copy_from_slice(&bytes);
            Ok(BsonValue::ObjectId(ObjectId::from_bytes(id)))
        }
        tag::BOOLEAN => Ok(BsonValue::Boolean(reader.read_u8()? != 0)),
        tag::UTC_DATETIME => Ok(BsonValue::DateTime(reader.read_i64_le()?)),
        tag::NULL => Ok(BsonValue::Null),
        tag::REGEX => {
            let pattern = reader.read_cstring()?;
            let options = reader.read_cstring()?;
            Ok(BsonValue::Regex { pattern, options })
        }
        tag::DB_POINTER => {
            let namespace = reader.read_utf8_string()?;
            let bytes = reader.read_bytes(12)?;
            let mut id = [0u8; 12];
            id.copy_from_slice(&bytes);
            Ok(BsonValue::DbPointer {
                namespace,
                id: ObjectId::from_bytes(id),
            })
        }
        tag::JS_CODE => Ok(BsonValue::JsCode(reader.read_utf8_string()?)),
        tag::SYMBOL => Ok(BsonValue::Symbol(reader.read_utf8_string()?)),
        tag::SCOPED_JS_CODE => {
            let start = reader.position();
            let declared = reader.read_i32_le()?;
            let code = reader.read_utf8_string()?;
            let scope = read_subdocument(rope, reader)?;
            let consumed = reader.position() - start;
            if declared < 0 || consumed != declared as usize {
                return Err(DecodeError::LengthMismatch {
                    declared,
                    available: consumed,
                });
            }
            Ok(BsonValue::ScopedJsCode { code, scope })
        }
        tag::INT32 => Ok(BsonValue::Int32(reader.read_i32_le()?)),
        tag::TIMESTAMP => Ok(BsonValue::Timestamp(reader.read_i64_le()?)),
        tag::INT64 => Ok(BsonValue::Int64(reader.read_i64_le()?)),
        other => Err(DecodeError::BadTag(other)),
    }
}

/// Slice an embedded document out of the parent rope, sharing chunks
fn read_subdocument(
    rope: &ByteRope,
    reader: &mut RopeReader<'_>,
) -> Result<BsonDocument, DecodeError> {
    let start = reader.position();
    let declared = reader.read_i32_le()?;
    if declared < 5 {
        return Err(DecodeError::LengthMismatch {
            declared,
            available: reader.remaining() + 4,
        });
    }
    reader.skip(declared as usize - 4)?;
    let sub = rope.slice(start, start + declared as usize)?;
    Ok(BsonDocument::from_rope(sub))
}

/// Advance past one value without decoding it
fn skip_value(reader: &mut RopeReader<'_>, tag_byte: u8) -> Result<(), DecodeError> {
    match tag_byte {
        tag::DOUBLE | tag::UTC_DATETIME | tag::TIMESTAMP | tag::INT64 => reader.skip(8),
        tag::STRING | tag::JS_CODE | tag::SYMBOL => {
            let len = reader.read_i32_le()?;
            if len < 1 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining(),
                });
            }
            reader.skip(len as usize)
        }
        tag::DOCUMENT | tag::ARRAY => {
            let len = reader.read_i32_le()?;
            if len < 5 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining() + 4,
                });
            }
            reader.skip(len as usize - 4)
        }
        tag::BINARY => {
            let len = reader.read_i32_le()?;
            if len < 0 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining(),
                });
            }
            reader.skip(len as usize + 1)
        }
        tag::UNDEFINED | tag::NULL => Ok(()),
        tag::OBJECT_ID => reader.skip(12),
        tag::BOOLEAN => reader.skip(1),
        tag::REGEX => {
            reader.read_cstring()?;
            reader.read_cstring()?;
            Ok(())
        }
        tag::DB_POINTER => {
            let len = reader.read_i32_le()?;
            if len < 1 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining(),
                });
            }
            reader.skip(len as usize + 12)
        }
        tag::SCOPED_JS_CODE => {
            let len = reader.read_i32_le()?;
            if len < 4 {
                return Err(DecodeError::LengthMismatch {
                    declared: len,
                    available: reader.remaining() + 4,
                });
            }
            reader.skip(len as usize - 4)
        }
        tag::INT32 => reader.skip(4),
        other => Err(DecodeError::BadTag(other)),
    }
}
