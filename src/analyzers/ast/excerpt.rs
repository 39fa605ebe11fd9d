//! Code excerpts for operator review.

/// Lines of context shown on each side of the matched line.
pub const CONTEXT_LINES: usize = 1;

/// Longest line kept in an excerpt; minified bundles can be megabytes per line.
const MAX_LINE_CHARS: usize = 200;

/// The matched line plus `context` lines either side, each prefixed with its
/// 1-based line number. Returns `None` when `line` is outside the source.
pub fn excerpt(source: &str, line: usize, context: usize) -> Option<String> {
    if line == 0 {
        return None;
    }
    let first = line.saturating_sub(context).max(1);
    let last = line + context;

    let lines: Vec<String> = source
        .lines()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .skip(first - 1)
        .take_while(|(n, _)| *n <= last)
        .map(|(n, text)| format!("{}: {}", n, truncate(text)))
        .collect();

    if lines.len() < line - first + 1 {
        return None;
    }
    Some(lines.join("\n"))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_LINE_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_LINE_CHARS).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_with_context() {
        let source = "a\nb\neval(x)\nd\ne";
        assert_eq!(excerpt(source, 3, 1).unwrap(), "2: b\n3: eval(x)\n4: d");
        assert_eq!(excerpt(source, 3, 2).unwrap(), "1: a\n2: b\n3: eval(x)\n4: d\n5: e");
    }

    #[test]
    fn test_excerpt_at_edges() {
        let source = "eval(x)\nb";
        assert_eq!(excerpt(source, 1, 1).unwrap(), "1: eval(x)\n2: b");
        assert_eq!(excerpt(source, 2, 1).unwrap(), "1: eval(x)\n2: b");
        assert!(excerpt(source, 5, 1).is_none());
        assert!(excerpt(source, 0, 1).is_none());
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let source = "x".repeat(500);
        let out = excerpt(&source, 1, 0).unwrap();
        assert!(out.ends_with("..."));
        assert!(out.len() < 220);
    }
}
