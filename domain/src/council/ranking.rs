//! Ranking extraction from free-form juror responses
//!
//! Jurors are asked to end with a section starting `FINAL RANKING:` listing
//! labels best-first. Models do not always comply, so extraction degrades
//! gracefully: numbered list first, then bare label mentions, then the whole
//! text when the marker is missing.

use regex::Regex;
use std::sync::OnceLock;

const MARKER: &str = "FINAL RANKING:";

fn numbered_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\s*[Rr]esponse\s+[A-Za-z]").unwrap())
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[Rr]esponse\s+([A-Za-z])").unwrap())
}

/// Case-insensitive ASCII substring search.
///
/// The needle is pure ASCII, so a match position is always a char boundary.
fn find_marker(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(MARKER.len())
        .position(|window| window.eq_ignore_ascii_case(MARKER.as_bytes()))
}

/// Extract the asserted ranking as normalized `"Response X"` labels.
///
/// Looks for the first `FINAL RANKING:` marker (case-insensitive). In the
/// section after it, numbered items like `1. Response B` win; otherwise any
/// `Response X` mention counts. Without a marker the whole text is scanned.
/// Returns labels in asserted order; an unparseable response yields `[]`.
pub fn parse_ranking(text: &str) -> Vec<String> {
    let section = match find_marker(text) {
        Some(index) => &text[index + MARKER.len()..],
        None => text,
    };

    let numbered: Vec<&str> = numbered_item_re()
        .find_iter(section)
        .map(|m| m.as_str())
        .collect();

    let mut labels = Vec::new();
    if numbered.is_empty() {
        collect_labels(section, &mut labels);
    } else {
        for item in numbered {
            collect_labels(item, &mut labels);
        }
    }
    labels
}

fn collect_labels(haystack: &str, out: &mut Vec<String>) {
    for captures in label_re().captures_iter(haystack) {
        let letter = captures[1].chars().next().map(|c| c.to_ascii_uppercase());
        if let Some(letter) = letter {
            out.push(format!("Response {letter}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_ranking() {
        let text = "Analysis...\n\nFINAL RANKING:\n1. Response B\n2. Response A\n3. Response C\n";
        assert_eq!(
            parse_ranking(text),
            vec!["Response B", "Response A", "Response C"]
        );
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let text = "final ranking:\n1. response a\n2. response b";
        assert_eq!(parse_ranking(text), vec!["Response A", "Response B"]);
    }

    #[test]
    fn test_unnumbered_section_falls_back_to_mentions() {
        let text = "FINAL RANKING: Response C, then Response A, then Response B.";
        assert_eq!(
            parse_ranking(text),
            vec!["Response C", "Response A", "Response B"]
        );
    }

    #[test]
    fn test_no_marker_scans_whole_text() {
        let text = "I prefer Response B over Response A.";
        assert_eq!(parse_ranking(text), vec!["Response B", "Response A"]);
    }

    #[test]
    fn test_malformed_response_yields_empty() {
        assert!(parse_ranking("I cannot decide between these answers.").is_empty());
        assert!(parse_ranking("").is_empty());
    }

    #[test]
    fn test_numbered_items_ignore_prose_mentions() {
        // Prose before the list mentions a label; only the numbered items count.
        let text = "FINAL RANKING:\nAs noted, Response C was weak.\n1. Response A\n2. Response B";
        assert_eq!(parse_ranking(text), vec!["Response A", "Response B"]);
    }

    #[test]
    fn test_parse_is_idempotent_as_function() {
        let text = "FINAL RANKING:\n1. Response A\n2. Response B";
        assert_eq!(parse_ranking(text), parse_ranking(text));
    }

    #[test]
    fn test_labels_are_normalized_uppercase() {
        for label in parse_ranking("FINAL RANKING: response b, response a") {
            assert!(label.starts_with("Response "));
            let letter = label.chars().last().unwrap();
            assert!(letter.is_ascii_uppercase());
        }
    }
}
