//! Snippet formatting for answer sources

use regex::RegexBuilder;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "did", "do", "does", "for", "from", "has", "have", "how",
    "in", "is", "it", "of", "on", "or", "should", "the", "to", "was", "were", "what", "when",
    "where", "which", "who", "why", "with",
];

/// Terms from a question worth highlighting in source snippets.
///
/// Punctuation is stripped, terms shorter than three characters and common
/// question words are dropped, duplicates are removed (case-insensitively).
pub fn query_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for word in question.split_whitespace() {
        let term = word.trim_matches(|c: char| !c.is_alphanumeric());
        if term.chars().count() < 3 {
            continue;
        }
        let lower = term.to_lowercase();
        if STOP_WORDS.contains(&lower.as_str()) {
            continue;
        }
        if !terms.iter().any(|t| t.to_lowercase() == lower) {
            terms.push(term.to_string());
        }
    }

    terms
}

/// HTML-escape a snippet and wrap query terms in `<mark>` tags.
///
/// Matching is case-insensitive and longest-term-first, so the output is
/// safe to render unescaped.
pub fn highlight_snippet<S: AsRef<str>>(snippet: &str, terms: &[S]) -> String {
    let mut terms: Vec<&str> = terms
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return handlebars::html_escape(snippet);
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()));

    let pattern = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");

    let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => {
            tracing::debug!("Skipping snippet highlighting: {}", e);
            return handlebars::html_escape(snippet);
        }
    };

    let mut highlighted = String::with_capacity(snippet.len());
    let mut last = 0;
    for m in re.find_iter(snippet) {
        highlighted.push_str(&handlebars::html_escape(&snippet[last..m.start()]));
        highlighted.push_str("<mark>");
        highlighted.push_str(&handlebars::html_escape(m.as_str()));
        highlighted.push_str("</mark>");
        last = m.end();
    }
    highlighted.push_str(&handlebars::html_escape(&snippet[last..]));

    highlighted
}

/// Truncate snippet to at most `max_len` bytes plus `...`, preferring a word boundary
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", snippet[..pos].trim_end());
    }

    format!("{}...", &snippet[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms() {
        let terms = query_terms("How many days of paid leave are allowed? Leave?");
        assert_eq!(terms, vec!["many", "days", "paid", "leave", "allowed"]);
    }

    #[test]
    fn test_highlight_snippet() {
        let snippet = "Paid leave: 20 days. Unused LEAVE expires.";
        let highlighted = highlight_snippet(snippet, &["leave", "days"]);

        assert_eq!(
            highlighted,
            "Paid <mark>leave</mark>: 20 <mark>days</mark>. Unused <mark>LEAVE</mark> expires."
        );
    }

    #[test]
    fn test_highlight_prefers_longer_terms() {
        let highlighted = highlight_snippet("casual leave", &["leave", "casual leave"]);
        assert_eq!(highlighted, "<mark>casual leave</mark>");
    }

    #[test]
    fn test_highlight_escapes_html() {
        let highlighted = highlight_snippet("<script>leave</script>", &["leave"]);

        assert!(!highlighted.contains("<script>"));
        assert!(highlighted.contains("&lt;script&gt;<mark>leave</mark>"));
    }

    #[test]
    fn test_highlight_leaves_entities_intact() {
        assert_eq!(
            highlight_snippet("R & D amp", &["amp"]),
            "R &amp; D <mark>amp</mark>"
        );
    }

    #[test]
    fn test_highlight_without_terms() {
        let empty: [&str; 0] = [];
        assert_eq!(highlight_snippet("a & b", &empty), "a &amp; b");
    }

    #[test]
    fn test_truncate_snippet() {
        let snippet = "This is a very long snippet that needs to be truncated.";
        let truncated = truncate_snippet(snippet, 20);

        assert_eq!(truncated, "This is a very long...");
        assert_eq!(truncate_snippet("short", 20), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let truncated = truncate_snippet("ééééé", 5);
        assert_eq!(truncated, "éé...");
    }
}
