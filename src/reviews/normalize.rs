// Comment normalization before model input.
//
// Cleaning is ASCII-only: fold any Unicode whitespace to a space, lower-case,
// keep letters, digits, whitespace and `. , ! ? '`, then collapse whitespace
// runs and trim. Symbols are dropped before whitespace is collapsed so
// "a @ b" becomes "a b", not "a  b".

use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::info;

use super::record::ReviewTable;

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9.,!?'\s]").expect("valid regex"))
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Normalize a raw comment for model input.
///
/// Output only contains `[a-z0-9.,!?' ]`, and cleaning twice gives the
/// same result as cleaning once.
pub fn clean_comment(text: &str) -> String {
    // regex-lite's \s is ASCII-only: NBSP, em space etc. must become ' '
    // before the strip pass
    let spaced: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let lowered = spaced.to_ascii_lowercase();
    let stripped = disallowed_chars().replace_all(&lowered, "");
    let collapsed = whitespace_runs().replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Drop reviews without a comment and attach `cleaned_comment` to the rest.
///
/// Returns a new table; `table` is left as it was. Comments that clean down
/// to an empty string are kept.
pub fn preprocess_reviews(table: &ReviewTable) -> ReviewTable {
    let records: Vec<_> = table
        .iter()
        .filter_map(|record| {
            let raw = record.comment.as_deref()?;
            let mut cleaned = record.clone();
            cleaned.cleaned_comment = Some(clean_comment(raw));
            Some(cleaned)
        })
        .collect();

    info!(
        kept = records.len(),
        dropped = table.len() - records.len(),
        "Preprocessed reviews"
    );

    table.with_records(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviews::record::ReviewRecord;

    #[test]
    fn test_clean_comment_basic() {
        assert_eq!(clean_comment("GREAT   class!!"), "great class!!");
    }

    #[test]
    fn test_clean_comment_strips_symbols_and_unicode() {
        assert_eq!(clean_comment("Best prof ever 😊 #goat"), "best prof ever goat");
        assert_eq!(clean_comment("Café — très bien"), "caf trs bien");
    }

    #[test]
    fn test_clean_comment_keeps_allowed_punctuation() {
        assert_eq!(
            clean_comment("Don't skip, really. Why? Wow!"),
            "don't skip, really. why? wow!"
        );
    }

    #[test]
    fn test_clean_comment_collapses_tabs_and_newlines() {
        assert_eq!(clean_comment("  line one\n\n\tline two  "), "line one line two");
    }

    #[test]
    fn test_clean_comment_unicode_whitespace_separates_words() {
        assert_eq!(clean_comment("great\u{a0}class"), "great class");
        assert_eq!(clean_comment("too\u{2003}much\u{3000}homework"), "too much homework");
        assert_eq!(clean_comment("\u{a0}\u{a0}hard \u{a0} exams\u{3000}"), "hard exams");
    }

    #[test]
    fn test_clean_comment_no_double_space_after_removal() {
        assert_eq!(clean_comment("a @ b"), "a b");
    }

    #[test]
    fn test_clean_comment_degenerate_inputs() {
        assert_eq!(clean_comment(""), "");
        assert_eq!(clean_comment("   \t\n "), "");
        assert_eq!(clean_comment("@#$%^&*"), "");
    }

    #[test]
    fn test_clean_comment_idempotent() {
        for s in [
            "GREAT   class!!",
            "a @ b",
            "  Mixed CASE\twith\u{a0}nbsp & stuff ",
            "Tests were HARD -- 10/10 would not retake :(",
            "",
        ] {
            let once = clean_comment(s);
            assert_eq!(clean_comment(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_clean_comment_output_alphabet() {
        let input = "Ünïcödé\r\n<b>HTML</b> {json: [1,2]} ~tilde~ \"quotes\" 100% ÷ ✓";
        let out = clean_comment(input);
        assert!(
            out.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || ".,!?' ".contains(c)),
            "unexpected character in {out:?}"
        );
    }

    #[test]
    fn test_preprocess_drops_null_and_keeps_order() {
        let record = |comment: Option<&str>| ReviewRecord {
            comment: comment.map(str::to_string),
            ..Default::default()
        };
        let table = ReviewTable::new(
            vec!["Comment".to_string()],
            vec![record(Some("First!")), record(None), record(Some("???")), record(Some("Third"))],
        );

        let cleaned = preprocess_reviews(&table);

        assert_eq!(cleaned.len(), 3);
        let got: Vec<_> = cleaned
            .iter()
            .map(|r| r.cleaned_comment.as_deref().unwrap())
            .collect();
        assert_eq!(got, vec!["first!", "???", "third"]);

        // Input table untouched
        assert_eq!(table.len(), 4);
        assert!(table.iter().all(|r| r.cleaned_comment.is_none()));
    }

    #[test]
    fn test_preprocess_keeps_whitespace_only_comment() {
        let table = ReviewTable::new(
            vec![],
            vec![ReviewRecord {
                comment: Some("   ".to_string()),
                ..Default::default()
            }],
        );
        let cleaned = preprocess_reviews(&table);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.records()[0].cleaned_comment.as_deref(), Some(""));
    }
}
