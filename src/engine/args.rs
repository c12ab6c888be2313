//! Argument parsing for function-call expressions.
//!
//! Two stages. First, parenthesized sub-expressions are resolved
//! innermost-first, each result re-substituted as one double-quoted token
//! with embedded quotes and backslashes escaped, so any result - multi-word,
//! JSON-shaped, quote-bearing - stays a single argument. The rewrite loop
//! is bounded by `EngineConfig::max_rewrite_passes`; pathological input
//! simply stops being rewritten. Second, the remaining text is tokenized
//! with ordered alternatives and each token resolves to a typed [`Value`].
//!
//! Bare tokens coerce to numbers only inside the safe-integer range:
//! an 18-digit platform snowflake stays a string, never a rounded float.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use super::EngineState;
use super::eval;
use crate::error::EngineError;
use crate::value::{MAX_SAFE_INTEGER, Value};

/// Innermost parenthesized group: no nested parens inside the match.
static INNER_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("paren pattern is valid"));

/// Ordered token alternatives: double-quoted (with `\"` / `\\` escapes),
/// single-quoted, `$var.path`, `.Context.Path`, bare.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""((?:[^"\\]|\\.)*)"|'([^']*)'|(\$[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)|(\.[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)|(\S+)"#,
    )
    .expect("token pattern is valid")
});

/// Escapes text for embedding inside a double-quoted token.
fn escape_quoted(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Inverse of [`escape_quoted`]: drops one level of backslash escaping.
fn unescape_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(chars.next().unwrap_or('\\'));
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Quoted(String),
    Var(String),
    Path(String),
    Bare(String),
}

/// Splits an argument string into ordered tokens. Pure.
pub(crate) fn tokenize(input: &str) -> Vec<Token> {
    TOKEN
        .captures_iter(input)
        .filter_map(|caps| {
            if let Some(m) = caps.get(1) {
                Some(Token::Quoted(unescape_quoted(m.as_str())))
            } else if let Some(m) = caps.get(2) {
                Some(Token::Quoted(m.as_str().to_string()))
            } else if let Some(m) = caps.get(3) {
                Some(Token::Var(m.as_str().to_string()))
            } else if let Some(m) = caps.get(4) {
                Some(Token::Path(m.as_str().to_string()))
            } else {
                caps.get(5).map(|m| Token::Bare(m.as_str().to_string()))
            }
        })
        .collect()
}

/// Numeric coercion for bare tokens, guarded for snowflake precision;
/// then boolean literals; else the token stays a string.
pub(crate) fn coerce_bare(token: &str) -> Value {
    if let Ok(i) = token.parse::<i64>() {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER as u64 {
            return Value::Num(i as f64);
        }
        return Value::Str(token.to_string());
    }
    if token.contains('.') {
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return Value::Num(f);
            }
        }
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(token.to_string()),
    }
}

/// Resolves the argument text following a function name into typed values.
pub(crate) async fn parse_args(
    state: &mut EngineState<'_>,
    input: &str,
) -> Result<Vec<Value>, EngineError> {
    let mut text = input.to_string();

    // Innermost-first paren rewriting, bounded pass count.
    let max_passes = state.engine.config.max_rewrite_passes;
    for pass in 0..max_passes {
        let Some(found) = INNER_PARENS.find(&text) else {
            break;
        };
        let range = found.range();
        let inner = text[range.start + 1..range.end - 1].to_string();
        trace!(pass, %inner, "resolving sub-expression");
        let value = eval::evaluate(state, &inner).await?;
        let rendered = value.substitution_text();
        let replacement = format!("\"{}\"", escape_quoted(&rendered));
        text.replace_range(range, &replacement);
    }

    let mut out = Vec::new();
    for token in tokenize(&text) {
        out.push(match token {
            Token::Quoted(s) => Value::Str(s),
            Token::Var(t) | Token::Path(t) => eval::resolve_reference(state, &t),
            Token::Bare(t) => coerce_bare(&t),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_alternatives_in_order() {
        let tokens = tokenize(r#""two words" 'single' $var.x .User.ID 42 hello"#);
        assert_eq!(
            tokens,
            vec![
                Token::Quoted("two words".into()),
                Token::Quoted("single".into()),
                Token::Var("$var.x".into()),
                Token::Path(".User.ID".into()),
                Token::Bare("42".into()),
                Token::Bare("hello".into()),
            ]
        );
    }

    #[test]
    fn bare_numbers_coerce_within_safe_range() {
        assert_eq!(coerce_bare("42"), Value::Num(42.0));
        assert_eq!(coerce_bare("-7"), Value::Num(-7.0));
        assert_eq!(coerce_bare("3.5"), Value::Num(3.5));
    }

    #[test]
    fn snowflakes_stay_strings() {
        let id = "123456789012345678";
        assert_eq!(coerce_bare(id), Value::Str(id.to_string()));
        // Beyond i64 range entirely.
        assert_eq!(
            coerce_bare("99999999999999999999"),
            Value::Str("99999999999999999999".to_string())
        );
    }

    #[test]
    fn boolean_literals_coerce() {
        assert_eq!(coerce_bare("true"), Value::Bool(true));
        assert_eq!(coerce_bare("false"), Value::Bool(false));
        assert_eq!(coerce_bare("True"), Value::Str("True".into()));
    }

    #[test]
    fn quoted_strings_are_never_coerced() {
        let tokens = tokenize(r#""42""#);
        assert_eq!(tokens, vec![Token::Quoted("42".into())]);
    }

    #[test]
    fn quoted_tokens_carry_escaped_quotes() {
        let tokens = tokenize(r#""say \"hi\" now" next"#);
        assert_eq!(
            tokens,
            vec![
                Token::Quoted(r#"say "hi" now"#.into()),
                Token::Bare("next".into()),
            ]
        );
    }

    #[test]
    fn escape_round_trips() {
        let original = r#"a "b" \ {"k":"v"}"#;
        assert_eq!(unescape_quoted(&escape_quoted(original)), original);
    }
}
