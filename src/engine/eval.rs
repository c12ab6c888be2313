//! Expression evaluation.
//!
//! Priority-ordered rules for one expression body:
//!
//! 1. Assignment `$name := rhs` - evaluate the right-hand side, bind it
//!    into the variable store, produce no inline text.
//! 2. Bare reference `.x` / `$x` - variable store, then context, then the
//!    literal token text.
//! 3. Function call `name arg1 arg2 ...` - parse arguments, dispatch via
//!    the registry. An unknown function falls back to the literal
//!    expression text; it never raises.
//!
//! Stringification happens once, at final template substitution - results
//! stay typed through nested calls.

use futures::future::BoxFuture;
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use super::EngineState;
use super::args;
use crate::error::EngineError;
use crate::value::Value;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\$([A-Za-z_][A-Za-z0-9_]*)\s*:=\s*(.+)$")
        .expect("assignment pattern is valid")
});

/// Evaluates one expression body. Boxed because evaluation recurses
/// through parenthesized sub-expressions and nested command execution.
pub(crate) fn evaluate<'a>(
    state: &'a mut EngineState<'_>,
    expr: &'a str,
) -> BoxFuture<'a, Result<Value, EngineError>> {
    Box::pin(async move {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Value::Null);
        }

        if let Some((name, rhs)) = split_assignment(expr) {
            let value = evaluate(state, rhs).await?;
            trace!(var = name, "assignment");
            state.vars.insert(name.to_string(), value);
            return Ok(Value::Null);
        }

        if !expr.contains(char::is_whitespace)
            && (expr.starts_with('.') || expr.starts_with('$'))
        {
            return Ok(resolve_reference(state, expr));
        }

        let (head, rest) = match expr.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim_start()),
            None => (expr, ""),
        };
        let Some(descriptor) = state.engine.functions.get(head) else {
            // Unknown function: the literal expression text is the result.
            return Ok(Value::Str(expr.to_string()));
        };
        let handler = descriptor.handler;
        let arguments = args::parse_args(state, rest).await?;
        trace!(function = head, argc = arguments.len(), "dispatching builtin");
        handler(state, arguments).await
    })
}

fn split_assignment(expr: &str) -> Option<(&str, &str)> {
    let caps = ASSIGNMENT.captures(expr)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Resolves a `$var(.path)*` or `.Context.Path` token: variable store
/// first (dollar tokens only), then context, then the literal token text.
pub(crate) fn resolve_reference(state: &EngineState<'_>, token: &str) -> Value {
    if let Some(body) = token.strip_prefix('$') {
        let (name, path) = match body.split_once('.') {
            Some((n, p)) => (n, Some(p)),
            None => (body, None),
        };
        if let Some(value) = state.vars.get(name) {
            return match path {
                Some(p) => value.get_path(p).cloned().unwrap_or(Value::Null),
                None => value.clone(),
            };
        }
        if let Some(value) = state.ctx.lookup(body) {
            return value;
        }
        return Value::Str(token.to_string());
    }
    if let Some(body) = token.strip_prefix('.') {
        if let Some(value) = state.ctx.lookup(body) {
            return value;
        }
        return Value::Str(token.to_string());
    }
    Value::Str(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_splits_name_and_rhs() {
        let (name, rhs) = split_assignment("$x := add 1 2").expect("matches");
        assert_eq!(name, "x");
        assert_eq!(rhs, "add 1 2");
    }

    #[test]
    fn assignment_rhs_may_span_lines() {
        let (name, rhs) = split_assignment("$msg := concat \"a\"\n\"b\"").expect("matches");
        assert_eq!(name, "msg");
        assert!(rhs.contains('\n'));
    }

    #[test]
    fn non_assignments_do_not_match() {
        assert!(split_assignment("add 1 2").is_none());
        assert!(split_assignment(".User.ID").is_none());
        assert!(split_assignment("$x").is_none());
    }
}
