//! Local variable and positional-argument builtins.
//!
//! These operate on the per-render state (variable store, positional
//! arguments, ephemeral flag) and nothing else; they are classed pure
//! because they touch no collaborator.

use super::{FunctionTable, arg, builtin, num, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "set", Pure, set);
    builtin!(table, "get", Pure, get);
    builtin!(table, "unset", Pure, unset);
    builtin!(table, "hasVar", Pure, has_var);
    builtin!(table, "arg", Pure, arg_fn);
    builtin!(table, "argCount", Pure, arg_count);
    builtin!(table, "allArgs", Pure, all_args);
    builtin!(table, "ephemeral", Pure, ephemeral);
}

/// `set name value` - like `:=` but usable mid-call.
async fn set(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let name = text(&args, 0);
    if !name.is_empty() {
        state.vars.insert(name, arg(&args, 1));
    }
    Ok(Value::Null)
}

async fn get(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(state.vars.get(&text(&args, 0)).cloned().unwrap_or(Value::Null))
}

async fn unset(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    state.vars.remove(&text(&args, 0));
    Ok(Value::Null)
}

async fn has_var(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(state.vars.contains_key(&text(&args, 0))))
}

/// `arg i` - positional argument by index, empty when out of range.
async fn arg_fn(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let index = num(&args, 0).max(0.0) as usize;
    Ok(state
        .ctx
        .arg(index)
        .map(|s| Value::Str(s.to_string()))
        .unwrap_or(Value::Null))
}

async fn arg_count(state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(state.ctx.args().len() as f64))
}

async fn all_args(state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::from(state.ctx.args().to_vec()))
}

/// Marks the render's response as ephemeral. Produces no inline text.
async fn ephemeral(state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    *state.ephemeral = true;
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn set_get_round_trip() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{set "x" 5}}{{get "x"}}"#).await, "5");
    }

    #[tokio::test]
    async fn variables_die_with_the_render() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{set "x" 5}}"#).await, "");
        assert_eq!(world.render(r#"{{get "x"}}"#).await, "");
    }

    #[tokio::test]
    async fn arg_accessors() {
        let world = TestWorld::new();
        let out = world
            .render_with_args("{{arg 0}}/{{argCount}}", vec!["hello".into(), "there".into()])
            .await;
        assert_eq!(out, "hello/2");
    }

    #[tokio::test]
    async fn ephemeral_flag_propagates() {
        let world = TestWorld::new();
        let outcome = world.render_outcome("{{ephemeral}}ok").await;
        assert!(outcome.success);
        assert!(outcome.ephemeral);
        assert_eq!(outcome.output.as_deref(), Some("ok"));
    }
}
