//! Prompt sanitizer.
//!
//! Strips unsafe vocabulary from a free-text clothing instruction before it is
//! forwarded to the image model, and appends a fixed safety qualifier.
//!
//! Matching is case-insensitive and word-bounded, where word characters are
//! ASCII letters, digits and `_`.

use shared::edit::{SanitizationResult, SAFETY_QUALIFIER};

/// Unsafe vocabulary. A `-` inside an entry matches a hyphen, a single
/// whitespace character, or nothing ("see-through", "see through",
/// "seethrough").
pub const UNSAFE_TERMS: &[&str] = &[
    "sex",
    "sexy",
    "sexiest",
    "see-through",
    "transparent",
    "sheer",
    "lingerie",
    "nude",
    "naked",
    "explicit",
    "revealing",
    "provocative",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Try to match `term` at byte offset `start`. Returns the end offset when the
/// term matches and is followed by a word boundary.
fn match_term(text: &str, start: usize, term: &str) -> Option<usize> {
    let mut pos = start;
    for expected in term.chars() {
        let next = text[pos..].chars().next();
        if expected == '-' {
            if let Some(c) = next {
                if c == '-' || c.is_whitespace() {
                    pos += c.len_utf8();
                }
            }
            continue;
        }
        match next {
            Some(c) if c.eq_ignore_ascii_case(&expected) => pos += c.len_utf8(),
            _ => return None,
        }
    }
    match text[pos..].chars().next() {
        Some(c) if is_word_char(c) => None,
        _ => Some(pos),
    }
}

/// Longest vocabulary match starting at `start`, if `start` is a word start.
fn longest_match_at(text: &str, start: usize, prev: Option<char>) -> Option<usize> {
    if prev.map(is_word_char).unwrap_or(false) {
        return None;
    }
    UNSAFE_TERMS
        .iter()
        .filter_map(|term| match_term(text, start, term))
        .max()
}

/// Every unsafe match in `text` as `(start, end)` byte ranges, left to right.
fn find_matches(text: &str) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    let mut prev: Option<char> = None;
    let mut iter = text.char_indices().peekable();

    while let Some((idx, c)) = iter.next() {
        if is_word_char(c) {
            if let Some(end) = longest_match_at(text, idx, prev) {
                matches.push((idx, end));
                // resume scanning after the match
                while let Some(&(next_idx, _)) = iter.peek() {
                    if next_idx >= end {
                        break;
                    }
                    iter.next();
                }
                prev = text[..end].chars().next_back();
                continue;
            }
        }
        prev = Some(c);
    }

    matches
}

/// True when `text` contains at least one unsafe term.
pub fn contains_unsafe_terms(text: &str) -> bool {
    !find_matches(text).is_empty()
}

/// Remove every match in `text`, recording each one, and collapse whitespace.
fn strip_pass(text: &str, removed_terms: &mut Vec<String>) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in find_matches(text) {
        stripped.push_str(&text[cursor..start]);
        removed_terms.push(text[start..end].to_string());
        cursor = end;
    }
    stripped.push_str(&text[cursor..]);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean `raw_prompt` for the image model.
///
/// Removed terms are reported as written, in order of removal, duplicates
/// kept. The safety qualifier is always appended exactly once, so the cleaned
/// prompt is never empty.
pub fn sanitize(raw_prompt: &str) -> SanitizationResult {
    let mut removed_terms = Vec::new();
    let mut collapsed = strip_pass(raw_prompt, &mut removed_terms);
    // a removal can join the halves of another term ("see sexy through")
    while contains_unsafe_terms(&collapsed) {
        collapsed = strip_pass(&collapsed, &mut removed_terms);
    }

    let cleaned_prompt = if collapsed.is_empty() {
        SAFETY_QUALIFIER.trim_start().to_string()
    } else {
        format!("{}{}", collapsed, SAFETY_QUALIFIER)
    };

    let was_sanitized = !removed_terms.is_empty();
    if was_sanitized {
        tracing::info!(removed = %removed_terms.join(", "), "prompt sanitized");
    }

    SanitizationResult {
        cleaned_prompt,
        removed_terms,
        was_sanitized,
    }
}

/// The user-derived part of a cleaned prompt, without the safety qualifier.
pub fn user_portion(cleaned_prompt: &str) -> &str {
    cleaned_prompt
        .strip_suffix(SAFETY_QUALIFIER)
        .or_else(|| cleaned_prompt.strip_suffix(SAFETY_QUALIFIER.trim_start()))
        .unwrap_or(cleaned_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_terms_in_order_and_collapses_whitespace() {
        let result = sanitize("a sexy see-through red dress");
        assert_eq!(result.removed_terms, vec!["sexy", "see-through"]);
        assert!(result.was_sanitized);
        assert_eq!(
            result.cleaned_prompt,
            "a red dress (appropriate, opaque fabric with full coverage, no nudity or explicit content)"
        );
    }

    #[test]
    fn clean_prompt_only_gains_the_qualifier() {
        let result = sanitize("  blue denim   jacket ");
        assert!(!result.was_sanitized);
        assert!(result.removed_terms.is_empty());
        assert_eq!(result.cleaned_prompt, format!("blue denim jacket{}", SAFETY_QUALIFIER));
    }

    #[test]
    fn empty_or_fully_unsafe_prompt_becomes_the_qualifier() {
        let expected = SAFETY_QUALIFIER.trim_start();
        assert_eq!(sanitize("").cleaned_prompt, expected);

        let result = sanitize("Nude  NAKED sheer");
        assert_eq!(result.cleaned_prompt, expected);
        assert_eq!(result.removed_terms, vec!["Nude", "NAKED", "sheer"]);
    }

    #[test]
    fn matching_is_word_bounded() {
        // "sexton", "sheerness", "unexplicit" are not whole-word matches
        let result = sanitize("sexton sheerness unexplicit essex");
        assert!(!result.was_sanitized);
        assert!(!contains_unsafe_terms("transparently"));
        assert!(contains_unsafe_terms("a (sheer) top"));
    }

    #[test]
    fn see_through_separator_variants() {
        let result = sanitize("see through, seethrough and See-Through tops");
        assert_eq!(
            result.removed_terms,
            vec!["see through", "seethrough", "See-Through"]
        );
        assert_eq!(user_portion(&result.cleaned_prompt), ", and tops");
    }

    #[test]
    fn longest_alternative_wins_and_duplicates_are_kept() {
        let result = sanitize("sexiest sex sexy sexiest");
        assert_eq!(result.removed_terms, vec!["sexiest", "sex", "sexy", "sexiest"]);
    }

    #[test]
    fn removal_is_idempotent_on_the_user_portion() {
        let prompts = [
            "a sexy see-through red dress",
            "provocative revealing lingerie set in black",
            "plain white t-shirt",
            "transparent_raincoat with sheer-sleeves",
            "see sexy through dress",
        ];
        for prompt in prompts {
            let first = sanitize(prompt);
            let portion = user_portion(&first.cleaned_prompt);
            assert!(!contains_unsafe_terms(portion), "{:?}", portion);

            let second = sanitize(portion);
            assert!(!second.was_sanitized);
            assert_eq!(user_portion(&second.cleaned_prompt), portion);
        }
    }

    #[test]
    fn terms_joined_by_a_removal_are_removed_too() {
        let result = sanitize("see sexy through dress");
        assert_eq!(result.removed_terms, vec!["sexy", "see through"]);
        assert_eq!(user_portion(&result.cleaned_prompt), "dress");

        let result = sanitize("a SEE sexy nude through top");
        assert_eq!(result.removed_terms, vec!["sexy", "nude", "SEE through"]);
        assert_eq!(user_portion(&result.cleaned_prompt), "a top");
    }

    #[test]
    fn non_ascii_text_is_preserved() {
        let result = sanitize("robe élégante nude été");
        assert_eq!(result.removed_terms, vec!["nude"]);
        assert_eq!(user_portion(&result.cleaned_prompt), "robe élégante été");
    }
}
