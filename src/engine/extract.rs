//! Expression extraction: finding `{{ ... }}` regions in a template.
//!
//! Matching is non-greedy and multiline. Nesting `{{ }}` inside an outer
//! pair is not supported by design: the first `}}` terminates the match.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{(.*?)\}\}").expect("expression pattern is valid")
});

/// One extracted expression: the trimmed inner text plus the byte span of
/// the full `{{ ... }}` region in the original template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression<'t> {
    pub inner: &'t str,
    pub span: Range<usize>,
}

/// Returns every expression in document order. Pure.
pub fn extract(template: &str) -> Vec<Expression<'_>> {
    EXPRESSION
        .captures_iter(template)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?;
            Some(Expression {
                inner: inner.as_str().trim(),
                span: whole.range(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extract("no expressions here").is_empty());
    }

    #[test]
    fn finds_expressions_in_order() {
        let found = extract("a {{one}} b {{ two }} c");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].inner, "one");
        assert_eq!(found[1].inner, "two");
        assert!(found[0].span.start < found[1].span.start);
    }

    #[test]
    fn matching_is_non_greedy() {
        let found = extract("{{a}} literal {{b}}");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].inner, "a");
    }

    #[test]
    fn expressions_span_lines() {
        let found = extract("{{ add\n1 2 }}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].inner, "add\n1 2");
    }

    #[test]
    fn nested_braces_terminate_at_first_close() {
        // Documented limitation: the inner open braces stay in the match,
        // the first `}}` ends it.
        let found = extract("{{outer {{inner}} }}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].inner, "outer {{inner");
    }

    #[test]
    fn span_covers_delimiters() {
        let template = "x{{y}}z";
        let found = extract(template);
        assert_eq!(&template[found[0].span.clone()], "{{y}}");
    }
}
