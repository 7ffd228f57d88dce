//! JSON codec for the relational column.
//!
//! The column holds one JSON document per attachment (an array for
//! multi-valued fields). The document is the durable contract: consumers
//! reading the database directly can rebuild an [`Attachment`] from these
//! fields alone, and rows written by older versions keep parsing.

use serde_json::Value;

use crate::error::FileResult;
use crate::file::Attachment;

/// Encode an attribute value for the column. Empty values encode as `None`
/// (SQL NULL).
pub fn encode(value: &[Attachment], multiple: bool) -> FileResult<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    if multiple {
        let items = value
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Value::Array(items)))
    } else {
        Ok(Some(serde_json::to_value(&value[0])?))
    }
}

/// Decode a column value back into attachments.
///
/// A single JSON object decodes into a one-element list, so rows written
/// before a field became multi-valued keep working.
pub fn decode(value: Option<&Value>) -> FileResult<Vec<Attachment>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| Ok(serde_json::from_value(item.clone())?))
            .collect(),
        Some(object) => Ok(vec![serde_json::from_value(object.clone())?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn saved_attachment(id: &str) -> Attachment {
        let mut att = Attachment::new("data").with_filename("a.txt");
        att.file_id = crate::FileId::from_string(id.to_string());
        att.saved = true;
        att.path = Some(format!("default/{id}"));
        att.files = vec![format!("default/{id}")];
        att
    }

    #[test]
    fn test_empty_encodes_as_null() {
        assert!(encode(&[], false).unwrap().is_none());
        assert!(decode(None).unwrap().is_empty());
        assert!(decode(Some(&Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn test_single_roundtrip() {
        let encoded = encode(&[saved_attachment("f1")], false).unwrap().unwrap();
        assert!(encoded.is_object());
        assert_eq!(encoded["file_id"], json!("f1"));
        assert_eq!(encoded["saved"], json!(true));

        let decoded = decode(Some(&encoded)).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].file_id.as_str(), "f1");
    }

    #[test]
    fn test_multiple_roundtrip() {
        let value = vec![saved_attachment("f1"), saved_attachment("f2")];
        let encoded = encode(&value, true).unwrap().unwrap();
        assert!(encoded.is_array());

        let decoded = decode(Some(&encoded)).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].path.as_deref(), Some("default/f2"));
    }

    #[test]
    fn test_single_object_decodes_into_list() {
        let encoded = encode(&[saved_attachment("f1")], false).unwrap().unwrap();
        let decoded = decode(Some(&encoded)).unwrap();
        assert_eq!(decoded.len(), 1);
    }
}
