use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Cap applied to per-room error messages before persistence
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Compare two external message ids.
///
/// Ids that are pure digit strings compare as arbitrary-precision magnitudes,
/// so "100" > "98" even though it sorts lower lexicographically. Anything
/// else falls back to plain string ordering. Equal magnitudes with different
/// zero padding ("007" vs "7") compare equal.
pub fn compare_message_ids(a: &str, b: &str) -> Ordering {
    if is_digits(a) && is_digits(b) {
        let a = strip_leading_zeros(a);
        let b = strip_leading_zeros(b);
        match a.len().cmp(&b.len()) {
            Ordering::Equal => a.cmp(b),
            other => other,
        }
    } else {
        a.cmp(b)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_leading_zeros(s: &str) -> &str {
    let trimmed = s.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Fold fetched ids into the current watermark. The result only ever moves
/// toward a strictly larger id; it never regresses.
pub fn latest_message_id<'a, I>(current: Option<&str>, fetched: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut latest = current.map(str::to_string);
    for candidate in fetched {
        let advance = match latest.as_deref() {
            Some(current) => compare_message_ids(candidate, current) == Ordering::Greater,
            None => true,
        };
        if advance {
            latest = Some(candidate.to_string());
        }
    }
    latest
}

/// Truncate an error message to 500 characters, ellipsis-terminated
pub fn truncate_error_message(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_CHARS {
        message.to_string()
    } else {
        let mut truncated: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        truncated.push('…');
        truncated
    }
}

/// Token counters accumulated additively across every model call
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub requests: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.requests += other.requests;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_compare_by_magnitude() {
        assert_eq!(compare_message_ids("100", "98"), Ordering::Greater);
        assert_eq!(compare_message_ids("7", "100"), Ordering::Less);
        assert_eq!(compare_message_ids("98", "98"), Ordering::Equal);
        // zero padding does not change magnitude
        assert_eq!(compare_message_ids("007", "7"), Ordering::Equal);
        assert_eq!(compare_message_ids("0", "000"), Ordering::Equal);
    }

    #[test]
    fn huge_numeric_ids_do_not_overflow() {
        let a = "170141183460469231731687303715884105728";
        let b = "170141183460469231731687303715884105727";
        assert_eq!(compare_message_ids(a, b), Ordering::Greater);
    }

    #[test]
    fn non_numeric_ids_compare_as_strings() {
        assert_eq!(compare_message_ids("abc", "abd"), Ordering::Less);
        // mixed content falls back to string ordering
        assert_eq!(compare_message_ids("12a", "3"), Ordering::Less);
        assert_eq!(compare_message_ids("", "0"), Ordering::Less);
    }

    #[test]
    fn watermark_advances_numerically() {
        let latest = latest_message_id(Some("98"), ["100", "7"]);
        assert_eq!(latest.as_deref(), Some("100"));
    }

    #[test]
    fn watermark_never_regresses() {
        let latest = latest_message_id(Some("98"), ["7", "12"]);
        assert_eq!(latest.as_deref(), Some("98"));

        let unchanged = latest_message_id(Some("98"), []);
        assert_eq!(unchanged.as_deref(), Some("98"));
    }

    #[test]
    fn watermark_starts_from_first_fetch() {
        assert_eq!(latest_message_id(None, []), None);
        assert_eq!(
            latest_message_id(None, ["5", "40", "11"]).as_deref(),
            Some("40")
        );
    }

    #[test]
    fn truncation_caps_at_500_chars() {
        let short = "a".repeat(500);
        assert_eq!(truncate_error_message(&short), short);

        let long = "b".repeat(501);
        let truncated = truncate_error_message(&long);
        assert_eq!(truncated.chars().count(), 501);
        assert!(truncated.ends_with('…'));
        assert!(truncated.starts_with("bbb"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "消".repeat(600);
        let truncated = truncate_error_message(&long);
        assert_eq!(truncated.chars().count(), 501);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn token_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            requests: 1,
        };
        total += TokenUsage {
            prompt_tokens: 20,
            completion_tokens: 10,
            total_tokens: 30,
            requests: 1,
        };
        assert_eq!(total.prompt_tokens, 30);
        assert_eq!(total.completion_tokens, 15);
        assert_eq!(total.total_tokens, 45);
        assert_eq!(total.requests, 2);
    }
}
