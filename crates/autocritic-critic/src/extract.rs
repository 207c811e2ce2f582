use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

use crate::ActionCode;

/// Section marker the critique uses for every heading and for the final answer
pub const DELIMITER: &str = "####";

/// Heading that introduces the critic's corrected reasoning
pub const CORRECTED_MARKER: &str = "#### Corrected version of Driver's Decision:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Final answer is not an integer: {0:?}")]
    NotAnInteger(String),

    #[error("Action {0} is not in the action vocabulary")]
    OutOfVocabulary(i64),
}

/// Extract the final action from a critique.
///
/// The answer format asks for exactly one trailing delimiter-marked integer,
/// so the last delimiter-bounded segment of the whole text is authoritative.
/// Earlier sections that reuse the delimiter as a heading are ignored.
///
/// ```text
/// #### Analysis of the mistake: ...
/// #### Corrected version of Driver's Decision: ...
/// Response to user:#### 4
/// ```
pub fn extract_action(text: &str, delimiter: &str) -> Result<ActionCode, ExtractionError> {
    let tail = text.rsplit(delimiter).next().unwrap_or(text).trim();
    debug!(tail_len = tail.len(), "Extracting final action");

    let code: i64 = tail
        .parse()
        .map_err(|_| ExtractionError::NotAnInteger(preview(tail)))?;

    ActionCode::from_code(code).ok_or(ExtractionError::OutOfVocabulary(code))
}

/// The critic's own corrected reasoning, used as input for a repair.
/// Falls back to the whole critique when the heading is missing.
pub fn corrected_section(critique: &str) -> &str {
    match critique.find(CORRECTED_MARKER) {
        Some(pos) => critique[pos + CORRECTED_MARKER.len()..].trim(),
        None => critique.trim(),
    }
}

/// First whole-number token in `text` that names a valid action.
///
/// Tokens are matched on word boundaries, so "42" is read as 42 (and
/// rejected) rather than as 4 or 2.
pub fn find_action_token(text: &str) -> Option<ActionCode> {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| Regex::new(r"\b\d+\b").expect("valid action token regex"));

    re.find_iter(text)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .find_map(ActionCode::from_code)
}

fn preview(s: &str) -> String {
    if s.chars().count() > 80 {
        let head: String = s.chars().take(80).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_last_segment() {
        let critique = "#### Analysis: ... #### Correction: ... Response to user: #### 4";
        assert_eq!(
            extract_action(critique, DELIMITER),
            Ok(ActionCode::TurnRight)
        );
    }

    #[test]
    fn test_interior_sections_are_ignored() {
        let critique = r#"#### Analysis of the mistake:
The driver chose action 1 although the lead car was braking.
#### What should driver do to avoid such errors in the future:
Check time-to-collision first; 3 seconds is too short.
#### Corrected version of Driver's Decision:
Reasoning... Final Answer: Decelerate, action 2
Response to user:#### 2
"#;
        assert_eq!(
            extract_action(critique, DELIMITER),
            Ok(ActionCode::Decelerate)
        );
    }

    #[test]
    fn test_non_integer_tail_fails() {
        let critique = "#### Corrected version: ...\nResponse to user:#### Decelerate (2)";
        assert!(matches!(
            extract_action(critique, DELIMITER),
            Err(ExtractionError::NotAnInteger(_))
        ));
    }

    #[test]
    fn test_out_of_vocabulary_fails() {
        assert_eq!(
            extract_action("Response to user:#### 5", DELIMITER),
            Err(ExtractionError::OutOfVocabulary(5))
        );
        assert_eq!(
            extract_action("#### 42", DELIMITER),
            Err(ExtractionError::OutOfVocabulary(42))
        );
    }

    #[test]
    fn test_trailing_empty_segment_fails() {
        assert!(matches!(
            extract_action("Response to user: 4 ####", DELIMITER),
            Err(ExtractionError::NotAnInteger(_))
        ));
    }

    #[test]
    fn test_text_without_delimiter_is_its_own_tail() {
        assert_eq!(extract_action(" 8\n", DELIMITER), Ok(ActionCode::Idle));
    }

    #[test]
    fn test_corrected_section() {
        let critique = "#### Analysis: x\n#### Corrected version of Driver's Decision:\n  keep lane \nResponse to user:#### one";
        assert_eq!(
            corrected_section(critique),
            "keep lane \nResponse to user:#### one"
        );
        assert_eq!(corrected_section("  no marker  "), "no marker");
    }

    #[test]
    fn test_find_action_token_matches_whole_numbers() {
        assert_eq!(find_action_token("#### 3"), Some(ActionCode::TurnLeft));
        assert_eq!(find_action_token("42"), None);
        assert_eq!(find_action_token("id 42, so 8"), Some(ActionCode::Idle));
        assert_eq!(find_action_token("Action_id: 1."), Some(ActionCode::Accelerate));
        assert_eq!(find_action_token("no digits here"), None);
    }
}
