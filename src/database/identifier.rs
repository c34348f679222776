//! `_id` normalization.
//!
//! Filters coming from callers may carry the primary key as a hex string.
//! Before any wire call the key is coerced to an `ObjectId`; rows going back
//! to callers carry it as a string again.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};

use crate::error::Result;

/// Primary key field.
pub const ID_FIELD: &str = "_id";

/// Return a copy of `filter` with `_id` coerced to `ObjectId`.
///
/// Handles a plain value as well as `$eq`, `$ne`, `$in` and `$nin`
/// operators. Empty strings and non-string ids are left alone.
pub fn normalize_filter(filter: &Document) -> Result<Document> {
    let mut filter = filter.clone();
    if let Some(id) = filter.get_mut(ID_FIELD) {
        *id = normalize_value(id)?;
    }
    Ok(filter)
}

fn normalize_value(value: &Bson) -> Result<Bson> {
    match value {
        Bson::Document(ops) => {
            let mut ops = ops.clone();
            for (op, operand) in ops.iter_mut() {
                let coerced = match (op.as_str(), &*operand) {
                    ("$eq" | "$ne", _) => Some(to_object_id(operand)?),
                    ("$in" | "$nin", Bson::Array(items)) => Some(Bson::Array(
                        items.iter().map(to_object_id).collect::<Result<Vec<_>>>()?,
                    )),
                    _ => None,
                };
                if let Some(coerced) = coerced {
                    *operand = coerced;
                }
            }
            Ok(Bson::Document(ops))
        }
        other => to_object_id(other),
    }
}

fn to_object_id(value: &Bson) -> Result<Bson> {
    match value {
        Bson::String(s) if !s.is_empty() => Ok(Bson::ObjectId(ObjectId::parse_str(s)?)),
        other => Ok(other.clone()),
    }
}

/// String form of an identifier.
pub fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.clone().into_relaxed_extjson().to_string(),
    }
}

/// Replace a row's `_id` with its string form.
pub fn stringify_id(mut document: Document) -> Document {
    if let Some(id) = document.get(ID_FIELD) {
        let id = id_to_string(id);
        document.insert(ID_FIELD, id);
    }
    document
}

/// Ensure `document` has an `_id`, generating one as the first field when
/// missing.
pub fn ensure_id(document: &mut Document) -> Bson {
    if let Some(id) = document.get(ID_FIELD) {
        return id.clone();
    }

    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert(ID_FIELD, id.clone());
    for (key, value) in std::mem::take(document) {
        with_id.insert(key, value);
    }
    *document = with_id;
    id
}
