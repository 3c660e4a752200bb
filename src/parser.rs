use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::types::{Action, COORDINATE_MAX, ScrollDirection};

static ACTION_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Action:\s*(\w+)\(([^)]*)\)").expect("action call pattern is valid")
});

static ACTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Action:\s*(\w+)").expect("action name pattern is valid"));

/// Why a model reply could not be turned into an [`Action`].
///
/// The `Display` text is fed back to the model verbatim, so it has to say
/// what a correct reply looks like.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No valid action found in response. Expected format: Action: Name(args)")]
    NoAction,

    #[error("Action '{0}' requires arguments but none provided")]
    MissingArguments(String),

    #[error("{0}")]
    EmptyArguments(&'static str),

    #[error("{action} requires exactly {expected} arguments ({signature}), got {got}")]
    Arity {
        action: &'static str,
        expected: usize,
        signature: &'static str,
        got: usize,
    },

    #[error("Invalid argument format: '{0}' is not an integer")]
    NotAnInteger(String),

    #[error("Coordinates must be 0-1000, got ({0}, {1})")]
    OutOfRange(i64, i64),

    #[error("Scroll direction must be 'up' or 'down', got '{0}'")]
    BadDirection(String),

    #[error("Unknown action: {0}")]
    Unknown(String),
}

/// Parse the first `Action: Name(args)` line out of a model reply.
///
/// Free-text actions (`Type`, `Press`, `CallUser`) take the whole argument
/// substring, commas included. `Click` and `Scroll` are strict tuples and are
/// checked for arity, then integer format, then range.
pub fn parse_action(response: &str) -> Result<Action, ParseError> {
    let Some(call) = ACTION_CALL.captures(response) else {
        return parse_bare(response);
    };

    let name = &call[1];
    let args = call[2].trim();

    match name {
        "Click" => parse_click(args),
        "Scroll" => parse_scroll(args),
        "Type" => free_text(args, "Type requires content: Type(text to type)")
            .map(|content| Action::Type { content }),
        "Press" => free_text(args, "Press requires a key: Press(Enter)")
            .map(|key| Action::Press { key }),
        "CallUser" => free_text(
            args,
            "CallUser requires a question: CallUser(your question here)",
        )
        .map(|question| Action::CallUser { question }),
        "Wait" => Ok(Action::Wait),
        "Finished" => Ok(Action::Finished),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn parse_bare(response: &str) -> Result<Action, ParseError> {
    let name = ACTION_NAME
        .captures(response)
        .map(|c| c[1].to_string())
        .ok_or(ParseError::NoAction)?;

    match name.as_str() {
        "Wait" => Ok(Action::Wait),
        "Finished" => Ok(Action::Finished),
        _ => Err(ParseError::MissingArguments(name)),
    }
}

fn parse_click(args: &str) -> Result<Action, ParseError> {
    if args.is_empty() {
        return Err(ParseError::EmptyArguments(
            "Click requires coordinates: Click(x, y)",
        ));
    }
    let parts = split_tuple(args);
    if parts.len() != 2 {
        return Err(ParseError::Arity {
            action: "Click",
            expected: 2,
            signature: "x, y",
            got: parts.len(),
        });
    }
    let x = parse_int(parts[0])?;
    let y = parse_int(parts[1])?;
    match (in_range(x), in_range(y)) {
        (Some(x), Some(y)) => Ok(Action::Click { x, y }),
        _ => Err(ParseError::OutOfRange(x, y)),
    }
}

fn parse_scroll(args: &str) -> Result<Action, ParseError> {
    if args.is_empty() {
        return Err(ParseError::EmptyArguments(
            "Scroll requires arguments: Scroll(x, y, direction)",
        ));
    }
    let parts = split_tuple(args);
    if parts.len() != 3 {
        return Err(ParseError::Arity {
            action: "Scroll",
            expected: 3,
            signature: "x, y, direction",
            got: parts.len(),
        });
    }
    let x = saturate(parse_int(parts[0])?);
    let y = saturate(parse_int(parts[1])?);
    let direction = parts[2].trim_matches(|c| c == '\'' || c == '"').to_lowercase();
    let direction = match direction.as_str() {
        "up" => ScrollDirection::Up,
        "down" => ScrollDirection::Down,
        _ => return Err(ParseError::BadDirection(direction)),
    };
    Ok(Action::Scroll { x, y, direction })
}

fn free_text(args: &str, usage: &'static str) -> Result<String, ParseError> {
    if args.is_empty() {
        Err(ParseError::EmptyArguments(usage))
    } else {
        Ok(args.to_string())
    }
}

fn split_tuple(args: &str) -> Vec<&str> {
    args.split(',').map(str::trim).collect()
}

/// Integers wider than `i64` still count as well-formed numbers; they are
/// pinned to the `i64` bounds so the range check reports them.
fn parse_int(token: &str) -> Result<i64, ParseError> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotAnInteger(token.to_string()));
    }
    Ok(token.parse::<i64>().unwrap_or(if token.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

fn in_range(v: i64) -> Option<i32> {
    i32::try_from(v)
        .ok()
        .filter(|v| (0..=COORDINATE_MAX).contains(v))
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(text: &str) -> String {
        parse_action(text).unwrap_err().to_string()
    }

    #[test]
    fn click_valid() {
        assert_eq!(
            parse_action("Action: Click(500, 300)").unwrap(),
            Action::Click { x: 500, y: 300 }
        );
    }

    #[test]
    fn click_after_reasoning_block() {
        let response =
            "<reasoning>\nI need to click the button.\n</reasoning>\nAction: Click(100, 200)";
        assert_eq!(
            parse_action(response).unwrap(),
            Action::Click { x: 100, y: 200 }
        );
    }

    #[test]
    fn click_accepts_whole_coordinate_range() {
        for x in (0..=1000).step_by(50) {
            for y in [0, 1, 499, 999, 1000] {
                assert_eq!(
                    parse_action(&format!("Action: Click({x}, {y})")).unwrap(),
                    Action::Click { x, y }
                );
            }
        }
    }

    #[test]
    fn click_out_of_range() {
        assert!(err("Action: Click(1001, 500)").contains("0-1000"));
        assert!(err("Action: Click(-1, 0)").contains("0-1000"));
    }

    #[test]
    fn click_oversized_integers_are_range_errors() {
        assert_eq!(
            err("Action: Click(10000000000, 5)"),
            "Coordinates must be 0-1000, got (10000000000, 5)"
        );
        assert!(err("Action: Click(-99999999999, 0)").contains("0-1000"));
        assert!(err("Action: Click(99999999999999999999999, 0)").contains("0-1000"));
        assert!(err("Action: Click(1e5, 0)").contains("Invalid argument format"));
        assert!(err("Action: Click(-, 0)").contains("Invalid argument format"));
    }

    #[test]
    fn scroll_saturates_oversized_integers() {
        assert_eq!(
            parse_action("Action: Scroll(10000000000, -10000000000, up)").unwrap(),
            Action::Scroll {
                x: i32::MAX,
                y: i32::MIN,
                direction: ScrollDirection::Up
            }
        );
    }

    #[test]
    fn click_arity_and_format_are_reported_before_range() {
        assert!(err("Action: Click(500)").contains("exactly 2 arguments"));
        assert!(err("Action: Click(1, 2, 3)").contains("got 3"));
        assert!(err("Action: Click(abc, 5000)").contains("Invalid argument format"));
        assert!(err("Action: Click()").contains("requires coordinates"));
    }

    #[test]
    fn scroll_direction() {
        let e = err("Action: Scroll(1,2,left)");
        assert!(e.contains("up") && e.contains("down"));

        assert_eq!(
            parse_action("Action: Scroll(1,2,UP)").unwrap(),
            Action::Scroll {
                x: 1,
                y: 2,
                direction: ScrollDirection::Up
            }
        );
        assert_eq!(
            parse_action("Action: Scroll(500, 500, \"down\")").unwrap(),
            Action::Scroll {
                x: 500,
                y: 500,
                direction: ScrollDirection::Down
            }
        );
    }

    #[test]
    fn scroll_has_no_range_check() {
        assert_eq!(
            parse_action("Action: Scroll(2000, -5, down)").unwrap(),
            Action::Scroll {
                x: 2000,
                y: -5,
                direction: ScrollDirection::Down
            }
        );
        assert!(err("Action: Scroll(1, 2)").contains("3 arguments"));
    }

    #[test]
    fn free_text_keeps_commas() {
        assert_eq!(
            parse_action("Action: Type(hello, world, again)").unwrap(),
            Action::Type {
                content: "hello, world, again".into()
            }
        );
        assert_eq!(
            parse_action("Action: CallUser(What is your email, please?)").unwrap(),
            Action::CallUser {
                question: "What is your email, please?".into()
            }
        );
        assert_eq!(
            parse_action("Action: Press(Enter)").unwrap(),
            Action::Press { key: "Enter".into() }
        );
    }

    #[test]
    fn free_text_must_not_be_empty() {
        assert!(parse_action("Action: Type()").is_err());
        assert!(parse_action("Action: Press(  )").is_err());
        assert!(parse_action("Action: CallUser()").is_err());
    }

    #[test]
    fn bare_names() {
        assert_eq!(parse_action("Action: Wait").unwrap(), Action::Wait);
        assert_eq!(parse_action("Action: Finished").unwrap(), Action::Finished);
        assert_eq!(parse_action("Action: Wait()").unwrap(), Action::Wait);
        assert!(err("Action: Click").contains("requires arguments"));
    }

    #[test]
    fn missing_and_unknown() {
        assert!(err("no action here").contains("No valid action found"));
        assert_eq!(err("Action: Jump(1)"), "Unknown action: Jump");
    }
}
