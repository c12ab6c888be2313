//! Registry introspection builtins. Pure.

use super::{FunctionTable, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "functionExists", Pure, function_exists);
    builtin!(table, "listFunctions", Pure, list_functions);
    builtin!(table, "functionCount", Pure, function_count);
    builtin!(table, "sideEffectOf", Pure, side_effect_of);
}

async fn function_exists(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let name = text(&args, 0);
    Ok(Value::Bool(state.engine.functions.contains_key(name.as_str())))
}

/// `listFunctions [prefix]` - sorted, comma-separated.
async fn list_functions(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let prefix = text(&args, 0);
    let mut names: Vec<&str> = state
        .engine
        .functions
        .keys()
        .copied()
        .filter(|name| prefix.is_empty() || name.starts_with(&prefix))
        .collect();
    names.sort_unstable();
    Ok(Value::Str(names.join(", ")))
}

async fn function_count(state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(state.engine.functions.len() as f64))
}

/// `sideEffectOf name` - the effect class label, empty for unknown names.
async fn side_effect_of(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let name = text(&args, 0);
    let label = state
        .engine
        .functions
        .get(name.as_str())
        .map(|d| d.effect.as_str())
        .unwrap_or("");
    Ok(Value::Str(label.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn introspection() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{functionExists "add"}}"#).await, "true");
        assert_eq!(world.render(r#"{{functionExists "nope"}}"#).await, "false");
        assert_eq!(world.render(r#"{{sideEffectOf "addRole"}}"#).await, "mutating-io");
        assert_eq!(world.render(r#"{{sideEffectOf "execCC"}}"#).await, "recursive");
    }

    #[tokio::test]
    async fn list_functions_filters_by_prefix() {
        let world = TestWorld::new();
        let out = world.render(r#"{{listFunctions "reg"}}"#).await;
        assert_eq!(
            out,
            "reg, regDel, regDelGuild, regGet, regGuild, regSet, regSetGuild"
        );
    }
}
