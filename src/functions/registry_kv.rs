//! Registry builtins: snapshot reads plus live set/delete.
//!
//! Reads (`reg`, `regGuild`) resolve against the snapshot captured when
//! the context was built - one bounded load per render, no per-expression
//! traffic. Writes go straight to the registry store and will be visible
//! to the NEXT render, not to the rest of this one; the snapshot is never
//! invalidated mid-render.

use tracing::debug;

use super::{FunctionTable, arg, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "reg", ReadIo, reg);
    builtin!(table, "regGet", ReadIo, reg);
    builtin!(table, "regGuild", ReadIo, reg_guild);
    builtin!(table, "regSet", MutatingIo, reg_set);
    builtin!(table, "regSetGuild", MutatingIo, reg_set_guild);
    builtin!(table, "regDel", MutatingIo, reg_del);
    builtin!(table, "regDelGuild", MutatingIo, reg_del_guild);
}

async fn reg(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(state.ctx.reg_get(&text(&args, 0)).unwrap_or(Value::Null))
}

async fn reg_guild(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(state.ctx.reg_guild_get(&text(&args, 0)).unwrap_or(Value::Null))
}

async fn reg_set(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    write(state, &text(&args, 0), "global".to_string(), arg(&args, 1)).await
}

async fn reg_set_guild(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let scope = format!("guild:{}", state.ctx.guild_id);
    write(state, &text(&args, 0), scope, arg(&args, 1)).await
}

async fn write(
    state: &mut EngineState<'_>,
    key: &str,
    entry_type: String,
    value: Value,
) -> Result<Value, EngineError> {
    match state
        .engine
        .deps
        .registry
        .set(key, &entry_type, value.to_json())
        .await
    {
        Ok(()) => Ok(Value::Str(String::new())),
        Err(err) => {
            debug!("registry set failed: {err:#}");
            Ok(Value::Str(format!("Failed to update registry: {err}")))
        }
    }
}

async fn reg_del(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    remove(state, &text(&args, 0), "global".to_string()).await
}

async fn reg_del_guild(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let scope = format!("guild:{}", state.ctx.guild_id);
    remove(state, &text(&args, 0), scope).await
}

async fn remove(
    state: &mut EngineState<'_>,
    key: &str,
    entry_type: String,
) -> Result<Value, EngineError> {
    match state.engine.deps.registry.delete(key, &entry_type).await {
        Ok(()) => Ok(Value::Str(String::new())),
        Err(err) => {
            debug!("registry delete failed: {err:#}");
            Ok(Value::Str(format!("Failed to update registry: {err}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn snapshot_reads_resolve_by_scope() {
        let world = TestWorld::new();
        world.registry.put("motd", "config", serde_json::json!("welcome"));
        world.registry.put("color", "guild:900", serde_json::json!("red"));
        world.registry.put("other", "guild:999", serde_json::json!("hidden"));

        assert_eq!(world.render(r#"{{reg "motd"}}"#).await, "welcome");
        assert_eq!(world.render(r#"{{regGuild "color"}}"#).await, "red");
        // Foreign guild entries never leak into either scope.
        assert_eq!(world.render(r#"{{reg "other"}}{{regGuild "other"}}"#).await, "");
    }

    #[tokio::test]
    async fn missing_key_is_empty_and_successful() {
        let world = TestWorld::new();
        let outcome = world.render_outcome(r#"{{reg "missing"}}"#).await;
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn broken_registry_fails_soft() {
        let world = TestWorld::new();
        world.registry.fail_all();
        let outcome = world.render_outcome(r#"x{{reg "missing"}}y"#).await;
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("xy"));
    }

    #[tokio::test]
    async fn writes_are_visible_to_the_next_render() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{regSet "k" "v"}}{{reg "k"}}"#).await, "");
        // Fresh render, fresh snapshot.
        assert_eq!(world.render(r#"{{reg "k"}}"#).await, "v");
    }
}
