//! Validation of generator output. Nothing here is trusted until it passes.

use serde_json::Value;
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::types::parse_datetime;
use std::collections::HashSet;

use crate::draft::{Dropped, ShiftSuggestion};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSuggestions {
    pub suggestions: Vec<ShiftSuggestion>,
    pub summary: String,
    pub dropped: Dropped,
}

/// Cut the outermost JSON object out of free text (code fences, leading prose).
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn field<'a>(item: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
    item.get(camel).or_else(|| item.get(snake)).filter(|v| !v.is_null())
}

fn text_field(item: &Value, camel: &str, snake: &str) -> Option<String> {
    field(item, camel, snake)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse `{ suggestions: [...], summary }`.
///
/// Unparsable output is an `ExternalService` error. Individual entries with an
/// employee id outside `eligible` or with bad times are dropped and counted.
pub fn parse_suggestions(text: &str, eligible: &HashSet<&str>) -> Result<ParsedSuggestions> {
    let body = extract_json_object(text)
        .ok_or_else(|| ShiftdeskError::external("generator output contains no JSON object"))?;
    let root: Value = serde_json::from_str(body)
        .map_err(|e| ShiftdeskError::external(format!("generator output is not valid JSON: {e}")))?;
    let items = root
        .get("suggestions")
        .and_then(Value::as_array)
        .ok_or_else(|| ShiftdeskError::external("generator output has no 'suggestions' array"))?;

    let mut dropped = Dropped::default();
    let mut suggestions = Vec::with_capacity(items.len());
    for item in items {
        let Some(employee_id) = field(item, "employeeId", "employee_id").and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }) else {
            dropped.invalid += 1;
            continue;
        };
        if !eligible.contains(employee_id.as_str()) {
            tracing::warn!("⚠️ Dropping suggestion for unknown employee '{employee_id}'");
            dropped.unknown_employee += 1;
            continue;
        }

        let start = text_field(item, "startTime", "start_time").map(|s| parse_datetime(&s));
        let end = text_field(item, "endTime", "end_time").map(|s| parse_datetime(&s));
        let (Some(Ok(start_time)), Some(Ok(end_time))) = (start, end) else {
            dropped.invalid += 1;
            continue;
        };
        if start_time >= end_time {
            dropped.invalid += 1;
            continue;
        }

        suggestions.push(ShiftSuggestion {
            employee_id,
            start_time,
            end_time,
            position: text_field(item, "position", "position"),
            reason: text_field(item, "reason", "reason"),
        });
    }

    if dropped.invalid > 0 {
        tracing::warn!("⚠️ Dropped {} malformed suggestion(s)", dropped.invalid);
    }

    Ok(ParsedSuggestions {
        suggestions,
        summary: root
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        dropped,
    })
}
