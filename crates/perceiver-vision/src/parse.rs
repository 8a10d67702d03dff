//! Tolerant extraction of the JSON localization answer.
//!
//! Vision models wrap answers in markdown fences, add `//` commentary
//! or prepend prose despite instructions. Extraction strips all of that
//! before deserializing.

use serde_json::Value;
use visor_core_types::BoundingBox;

use crate::errors::PerceiverError;
use crate::Perception;

/// Pull a JSON object out of a raw model reply.
pub fn extract_json(reply: &str) -> Result<Value, PerceiverError> {
    let candidate = fenced_block(reply).unwrap_or(reply).trim();

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }

    // Strip comment lines, then trim to the outermost braces.
    let cleaned: String = candidate
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(PerceiverError::MalformedReply(format!(
                "no JSON object in reply: {}",
                truncate(reply)
            )))
        }
    };

    serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| PerceiverError::MalformedReply(format!("{}: {}", e, truncate(reply))))
}

/// Interpret the localization JSON as a `Perception`.
pub fn parse_locate_reply(reply: &str) -> Result<Perception, PerceiverError> {
    let value = extract_json(reply)?;

    let found = value
        .get("found")
        .and_then(Value::as_bool)
        // Older prompt variants answer with a bare bbox.
        .unwrap_or_else(|| value.get("x").is_some());
    if !found {
        return Ok(Perception::NotFound);
    }

    let field = |name: &str| -> Result<f64, PerceiverError> {
        value.get(name).and_then(Value::as_f64).ok_or_else(|| {
            PerceiverError::MalformedReply(format!("missing numeric field '{}'", name))
        })
    };
    let bbox = BoundingBox::new(field("x")?, field("y")?, field("w")?, field("h")?);

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(1.0)
        .clamp(0.0, 1.0) as f32;

    Ok(Perception::Located { bbox, confidence })
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    let end = after.find("```")?;
    Some(&after[..end])
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.len() <= LIMIT {
        text.to_string()
    } else {
        let mut cut = LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }
}
