//! Tolerant parsing of `/list` and `/names` responses
//!
//! Different server versions wrap the save array under different keys and
//! name the item fields differently. The lookups below accept every shape
//! seen in the wild instead of a single serde struct.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use savesync_core::domain::{SaveId, SaveItem};
use serde_json::{Map, Value};
use tracing::debug;

use crate::ApiError;

/// Keys that may hold the save array, in lookup order
const ARRAY_KEYS: &[&str] = &["saves", "items", "data", "list", "worlds"];

/// Wrapper objects searched when no top-level key matches
const WRAPPER_KEYS: &[&str] = &["result", "meta"];

const ID_KEYS: &[&str] = &["id", "saveId", "guid"];
const NAME_KEYS: &[&str] = &["worldName", "name", "world", "title"];
const SIZE_KEYS: &[&str] = &["sizeBytes", "fileSizeBytes", "fileSize", "size", "bytes", "length"];
const CREATED_KEYS: &[&str] = &["createdAt", "created", "created_on", "createdOn"];
const UPDATED_KEYS: &[&str] = &["updatedAt", "updated", "updated_on", "lastModified", "modifiedOn"];

fn keyed_array<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_array))
}

fn first_array(obj: &Map<String, Value>) -> Option<&Vec<Value>> {
    obj.values().find_map(Value::as_array)
}

/// Locates the array of save records inside a list response
pub fn find_save_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    let obj = value.as_object()?;

    keyed_array(obj, ARRAY_KEYS)
        .or_else(|| {
            WRAPPER_KEYS
                .iter()
                .filter_map(|key| obj.get(*key).and_then(Value::as_object))
                .find_map(|inner| keyed_array(inner, ARRAY_KEYS))
        })
        .or_else(|| first_array(obj))
        .or_else(|| {
            // one level of nesting
            obj.values()
                .filter_map(Value::as_object)
                .find_map(first_array)
        })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn size_field(obj: &Map<String, Value>) -> u64 {
    SIZE_KEYS
        .iter()
        .find_map(|key| match obj.get(*key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

/// Parses a timestamp as RFC 3339, a naive UTC date-time, or epoch millis
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
        }
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn timestamp_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(parse_timestamp))
}

/// Converts one record into a remote [`SaveItem`]
///
/// Records without a usable id are skipped. A missing name falls back to
/// the id.
pub fn parse_save_record(record: &Value) -> Option<SaveItem> {
    let obj = record.as_object()?;
    let raw_id = string_field(obj, ID_KEYS)?;
    let id = SaveId::new(raw_id.clone()).ok()?;
    let name = string_field(obj, NAME_KEYS).unwrap_or(raw_id);

    Some(
        SaveItem::remote(id, name, size_field(obj)).with_timestamps(
            timestamp_field(obj, CREATED_KEYS),
            timestamp_field(obj, UPDATED_KEYS),
        ),
    )
}

/// Parses a list response into remote save items
pub fn parse_save_list(value: &Value) -> Vec<SaveItem> {
    let Some(records) = find_save_array(value) else {
        debug!("List response holds no save array");
        return Vec::new();
    };
    let items: Vec<SaveItem> = records.iter().filter_map(parse_save_record).collect();
    if items.len() != records.len() {
        debug!(
            skipped = records.len() - items.len(),
            "Skipped list records without a usable id"
        );
    }
    items
}

/// Parses a names response: an array of strings, or of records with a name
///
/// A body with no array at all is an error rather than "no names", since
/// the overwrite check relies on this list.
pub fn parse_names(value: &Value) -> Result<Vec<String>, ApiError> {
    let entries = find_save_array(value)
        .ok_or_else(|| ApiError::InvalidResponse("names response has no array".to_string()))?;
    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => string_field(obj, NAME_KEYS),
            _ => None,
        })
        .collect())
}
