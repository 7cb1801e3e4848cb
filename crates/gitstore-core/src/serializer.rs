//! Tiddler text serialization
//!
//! The store does not care how a tiddler is laid out on disk, only that it
//! can turn one into text and back. `TextSerializer` is the default format:
//!
//! ```text
//! modified: 20261016120000500
//! modifier: jane
//! tags: foo bar [[two words]]
//!
//! body text
//! ```

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::models::Tiddler;
use crate::storage::{StoreError, StoreResult};

/// Timestamp layout without milliseconds
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Header names with a dedicated meaning
const RESERVED_HEADERS: &[&str] = &["created", "creator", "modified", "modifier", "tags", "type"];

/// Converts tiddlers to and from their stored text form
pub trait Serializer: Send + Sync {
    /// Render a tiddler. The revision is never part of the output.
    fn to_text(&self, tiddler: &Tiddler) -> StoreResult<String>;

    /// Parse stored text into a tiddler addressed by `bag` and `title`
    fn from_text(&self, title: &str, bag: &str, text: &str) -> StoreResult<Tiddler>;
}

/// Header block followed by a blank line and the body
#[derive(Debug, Default, Clone, Copy)]
pub struct TextSerializer;

impl Serializer for TextSerializer {
    fn to_text(&self, tiddler: &Tiddler) -> StoreResult<String> {
        let mut out = String::new();

        if let Some(created) = tiddler.created {
            push_header(&mut out, "created", &format_timestamp(&created))?;
        }
        if let Some(ref creator) = tiddler.creator {
            push_header(&mut out, "creator", creator)?;
        }
        push_header(&mut out, "modified", &format_timestamp(&tiddler.modified))?;
        if let Some(ref modifier) = tiddler.modifier {
            push_header(&mut out, "modifier", modifier)?;
        }
        if !tiddler.tags.is_empty() {
            push_header(&mut out, "tags", &tags_string(&tiddler.tags))?;
        }
        if let Some(ref content_type) = tiddler.content_type {
            push_header(&mut out, "type", content_type)?;
        }
        for (name, value) in &tiddler.fields {
            if RESERVED_HEADERS.contains(&name.as_str()) || name.is_empty() || name.contains(':')
            {
                return Err(StoreError::Serialization {
                    details: format!("field name '{}' cannot be stored", name),
                });
            }
            push_header(&mut out, name, value)?;
        }

        out.push('\n');
        out.push_str(&tiddler.text);
        Ok(out)
    }

    fn from_text(&self, title: &str, bag: &str, text: &str) -> StoreResult<Tiddler> {
        let mut tiddler = Tiddler::new(title, bag);
        let (header, body) = match text.find("\n\n") {
            Some(pos) => (&text[..pos], &text[pos + 2..]),
            None if text.starts_with('\n') => ("", &text[1..]),
            None => (text, ""),
        };

        for line in header.lines().filter(|l| !l.is_empty()) {
            let (key, value) = line.split_once(':').ok_or_else(|| StoreError::Serialization {
                details: format!("malformed header line '{}'", line),
            })?;
            let value = value.strip_prefix(' ').unwrap_or(value);

            match key {
                "created" => tiddler.created = Some(parse_timestamp(value)?),
                "creator" => tiddler.creator = Some(value.to_string()),
                "modified" => tiddler.modified = parse_timestamp(value)?,
                "modifier" => tiddler.modifier = Some(value.to_string()),
                "tags" => tiddler.tags = parse_tags(value),
                "type" => tiddler.content_type = Some(value.to_string()),
                _ => {
                    tiddler.fields.insert(key.to_string(), value.to_string());
                }
            }
        }

        tiddler.text = body.to_string();
        Ok(tiddler)
    }
}

fn push_header(out: &mut String, key: &str, value: &str) -> StoreResult<()> {
    if value.contains('\n') {
        return Err(StoreError::Serialization {
            details: format!("value of '{}' spans multiple lines", key),
        });
    }
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
    Ok(())
}

/// Render a timestamp as 17 digits: seconds precision plus milliseconds
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    format!(
        "{}{:03}",
        time.format(TIMESTAMP_FORMAT),
        time.timestamp_subsec_millis()
    )
}

/// Parse a 14-digit (seconds) or 17-digit (milliseconds) timestamp
pub fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    let invalid = || StoreError::Serialization {
        details: format!("invalid timestamp '{}'", value),
    };

    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let (seconds, millis) = match value.len() {
        14 => (value, 0),
        17 => (&value[..14], value[14..].parse::<i64>().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };

    let naive = NaiveDateTime::parse_from_str(seconds, TIMESTAMP_FORMAT).map_err(|_| invalid())?;
    Ok(naive.and_utc() + Duration::milliseconds(millis))
}

/// Join tags with spaces, bracketing any that contain a space
pub fn tags_string(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| {
            if tag.contains(' ') {
                format!("[[{}]]", tag)
            } else {
                tag.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a tags header, honoring `[[bracketed tags]]`
pub fn parse_tags(value: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = value.trim();

    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix("[[") {
            if let Some(end) = inner.find("]]") {
                push_unique(&mut tags, &inner[..end]);
                rest = inner[end + 2..].trim_start();
                continue;
            }
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        push_unique(&mut tags, &rest[..end]);
        rest = rest[end..].trim_start();
    }

    tags
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}
