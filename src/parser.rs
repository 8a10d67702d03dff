//! Rule-based scenario parser.
//!
//! Scenarios are plain text, one step per line, in a small controlled
//! vocabulary. Lines starting with `#` are comments. Keywords match
//! case-insensitively; everything after a keyword is free text handed
//! to the resolution layer unchanged.
//!
//! ```text
//! # Login flow
//! Visit http://localhost:8000
//! Click on the Login button
//! Type "alice" into the username field
//! Type "wonderland" into the password field
//! Click on Submit
//! Verify the greeting banner contains "Welcome, alice"
//! Verify a row contains name="alice", status="active"
//! ```

use std::collections::BTreeMap;

use browser_adapter::ScrollDirection;
use scenario_flow::{ScrollTarget, StepAction, TestScenario, VerifyCondition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("scenario is empty")]
    Empty,
}

/// Turns scenario text into a `TestScenario`. The rule-based parser is
/// the default; a model-backed one can implement the same seam.
pub trait ScenarioParser: Send + Sync {
    fn parse(&self, name: &str, text: &str) -> Result<TestScenario, ParseError>;
}

/// Deterministic keyword parser for the controlled vocabulary.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedParser;

impl ScenarioParser for RuleBasedParser {
    fn parse(&self, name: &str, text: &str) -> Result<TestScenario, ParseError> {
        parse_scenario(name, text)
    }
}

/// Parse a scenario from its text form.
pub fn parse_scenario(name: &str, text: &str) -> Result<TestScenario, ParseError> {
    let mut description = String::new();
    let mut scenario = TestScenario::new(name, "");

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if description.is_empty() {
                description = comment.trim().to_string();
            }
            continue;
        }
        let action = parse_line(line).map_err(|message| ParseError::Syntax {
            line: number + 1,
            message,
        })?;
        scenario = scenario.with_step(action, line);
    }

    if scenario.steps.is_empty() {
        return Err(ParseError::Empty);
    }
    scenario.description = description;
    Ok(scenario)
}

fn parse_line(line: &str) -> Result<StepAction, String> {
    for keyword in ["visit", "go to", "open"] {
        if let Some(rest) = strip_keyword(line, keyword) {
            if rest.is_empty() {
                return Err(format!("'{}' needs a URL", keyword));
            }
            return Ok(StepAction::Visit {
                url: rest.to_string(),
            });
        }
    }

    for keyword in ["click on", "click"] {
        if let Some(rest) = strip_keyword(line, keyword) {
            if rest.is_empty() {
                return Err("'click' needs a target".to_string());
            }
            return Ok(StepAction::Click {
                target: rest.to_string(),
            });
        }
    }

    // "Fill <target> with "<value>""
    if let Some(rest) = strip_keyword(line, "fill") {
        let (target, value_part) = split_on_keyword(rest, " with ")
            .ok_or_else(|| "'fill' needs the form: fill <target> with \"<value>\"".to_string())?;
        let value = unquote(value_part);
        return Ok(StepAction::Fill {
            target: target.trim().to_string(),
            value,
        });
    }

    // "Type "<value>" into <target>"
    for keyword in ["type", "enter"] {
        if let Some(rest) = strip_keyword(line, keyword) {
            let (value, after) = take_quoted(rest)
                .ok_or_else(|| format!("'{}' needs a quoted value", keyword))?;
            let target = after
                .trim_start()
                .strip_prefix_ci("into ")
                .or_else(|| after.trim_start().strip_prefix_ci("in "))
                .ok_or_else(|| {
                    format!("'{}' needs the form: {} \"<value>\" into <target>", keyword, keyword)
                })?;
            return Ok(StepAction::Fill {
                target: target.trim().to_string(),
                value,
            });
        }
    }

    if let Some(rest) = strip_keyword(line, "scroll") {
        return parse_scroll(rest);
    }

    for keyword in ["verify", "check"] {
        if let Some(rest) = strip_keyword(line, keyword) {
            let rest = rest.strip_prefix_ci("that ").unwrap_or(rest);
            return parse_verify(rest);
        }
    }

    Err(format!("unrecognized step: '{}'", line))
}

fn parse_scroll(rest: &str) -> Result<StepAction, String> {
    let lower = rest.to_lowercase();
    let direction = match lower.as_str() {
        "down" => Some(ScrollDirection::Down),
        "up" => Some(ScrollDirection::Up),
        "to top" | "to the top" => Some(ScrollDirection::Top),
        "to bottom" | "to the bottom" => Some(ScrollDirection::Bottom),
        _ => None,
    };
    if let Some(direction) = direction {
        return Ok(StepAction::Scroll {
            target: ScrollTarget::Direction(direction),
        });
    }
    if let Some(target) = rest.strip_prefix_ci("to ") {
        if !target.trim().is_empty() {
            return Ok(StepAction::Scroll {
                target: ScrollTarget::Element {
                    description: target.trim().to_string(),
                },
            });
        }
    }
    Err("'scroll' needs a direction or 'to <target>'".to_string())
}

fn parse_verify(rest: &str) -> Result<StepAction, String> {
    if let Some(value_part) = rest.strip_prefix_ci("page contains ") {
        return Ok(StepAction::Verify {
            condition: VerifyCondition::PageContains {
                expected: unquote(value_part),
            },
            target: None,
        });
    }
    for prefix in ["a row contains ", "some row contains "] {
        if let Some(fields_part) = rest.strip_prefix_ci(prefix) {
            return Ok(StepAction::Verify {
                condition: VerifyCondition::RowMatches {
                    fields: parse_fields(fields_part)?,
                },
                target: None,
            });
        }
    }
    if let Some((target, value_part)) = split_on_keyword(rest, " contains ") {
        return Ok(StepAction::Verify {
            condition: VerifyCondition::ContainsText {
                expected: unquote(value_part),
            },
            target: Some(target.trim().to_string()),
        });
    }
    if let Some(target) = rest.strip_suffix_ci(" is visible") {
        if !target.trim().is_empty() {
            return Ok(StepAction::Verify {
                condition: VerifyCondition::Visible,
                target: Some(target.trim().to_string()),
            });
        }
    }
    Err(
        "'verify' needs 'page contains', 'a row contains <col>=\"<value>\", ...', \
         '<target> contains' or '<target> is visible'"
            .to_string(),
    )
}

/// Parse a `col="value", col="value"` field list for the row form.
fn parse_fields(text: &str) -> Result<BTreeMap<String, String>, String> {
    let mut fields = BTreeMap::new();
    for pair in text.split(',') {
        let (column, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected <column>=\"<value>\", got '{}'", pair.trim()))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(format!("missing column name before '={}'", value.trim()));
        }
        fields.insert(column.to_string(), unquote(value));
    }
    Ok(fields)
}

/// Strip a leading keyword, case-insensitively, requiring a word
/// boundary after it.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    if line.len() < keyword.len() || !line.is_char_boundary(keyword.len()) {
        return None;
    }
    let (head, tail) = line.split_at(keyword.len());
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if tail.is_empty() {
        Some(tail)
    } else {
        tail.strip_prefix(' ').map(str::trim_start)
    }
}

/// Split on the first case-insensitive occurrence of `keyword`.
///
/// Scans windows of `text` directly; indices found in a case-folded
/// copy do not transfer back because folding can change byte lengths.
fn split_on_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    for (at, _) in text.char_indices() {
        let end = at + keyword.len();
        if end > text.len() {
            break;
        }
        if text.is_char_boundary(end) && text[at..end].eq_ignore_ascii_case(keyword) {
            return Some((&text[..at], &text[end..]));
        }
    }
    None
}

/// Take a leading quoted value (single or double quotes) and return it
/// with the remainder of the line.
fn take_quoted(text: &str) -> Option<(String, &str)> {
    let text = text.trim_start();
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &text[1..];
    let end = inner.find(quote)?;
    Some((inner[..end].to_string(), &inner[end + 1..]))
}

/// Strip surrounding quotes if present, otherwise take the trimmed text.
fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    if let Some((value, rest)) = take_quoted(trimmed) {
        if rest.trim().is_empty() {
            return value;
        }
    }
    trimmed.to_string()
}

trait StrExt {
    fn strip_prefix_ci<'a>(&'a self, prefix: &str) -> Option<&'a str>;
    fn strip_suffix_ci<'a>(&'a self, suffix: &str) -> Option<&'a str>;
}

impl StrExt for str {
    fn strip_prefix_ci<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        if self.is_char_boundary(prefix.len()) && self[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            Some(&self[prefix.len()..])
        } else {
            None
        }
    }

    fn strip_suffix_ci<'a>(&'a self, suffix: &str) -> Option<&'a str> {
        let Some(cut) = self.len().checked_sub(suffix.len()) else {
            return None;
        };
        if self.is_char_boundary(cut) && self[cut..].eq_ignore_ascii_case(suffix) {
            Some(&self[..cut])
        } else {
            None
        }
    }
}
