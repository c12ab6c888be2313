//! Entity and database read builtins. All ReadIo, all fail-soft: a
//! collaborator error degrades to empty, never an aborted render.
//!
//! Entity results come back as dual-convention maps, so `.name` and
//! `.Name` both work on them downstream.

use tracing::debug;

use super::{FunctionTable, builtin, target_user, text};
use crate::context::record_to_value;
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "dbQuery", ReadIo, db_query);
    builtin!(table, "dbGet", ReadIo, db_get);
    builtin!(table, "getUser", ReadIo, get_user);
    builtin!(table, "getMember", ReadIo, get_member);
    builtin!(table, "getChannel", ReadIo, get_channel);
    builtin!(table, "getGuild", ReadIo, get_guild);
    builtin!(table, "getUserRoles", ReadIo, get_user_roles);
    builtin!(table, "getUserPermissions", ReadIo, get_user_permissions);
}

/// `dbQuery collection key` - raw keyed read from the registry-backed
/// data store.
async fn db_query(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let collection = text(&args, 0);
    let key = text(&args, 1);
    match state.engine.deps.registry.get(&key, &collection).await {
        Ok(Some(json)) => Ok(Value::from_json(json)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("dbQuery failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

/// `dbGet key` - shorthand for `dbQuery "data" key`.
async fn db_get(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let key = text(&args, 0);
    match state.engine.deps.registry.get(&key, "data").await {
        Ok(Some(json)) => Ok(Value::from_json(json)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("dbGet failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

/// `getUser [id]` - defaults to the invoking user.
async fn get_user(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    match state.engine.deps.platform.get_user(&user_id).await {
        Ok(Some(user)) => Ok(record_to_value(&user)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("getUser failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

async fn get_member(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    let guild_id = state.ctx.guild_id.clone();
    match state.engine.deps.platform.get_member(&guild_id, &user_id).await {
        Ok(Some(member)) => Ok(record_to_value(&member)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("getMember failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

/// `getChannel [id]` - defaults to the invoking channel.
async fn get_channel(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let channel_id = {
        let explicit = text(&args, 0);
        if explicit.is_empty() {
            state.ctx.channel_id.clone().unwrap_or_default()
        } else {
            explicit
        }
    };
    match state.engine.deps.platform.get_channel(&channel_id).await {
        Ok(Some(channel)) => Ok(record_to_value(&channel)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("getChannel failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

async fn get_guild(state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    let guild_id = state.ctx.guild_id.clone();
    match state.engine.deps.platform.get_guild(&guild_id).await {
        Ok(Some(guild)) => Ok(record_to_value(&guild)),
        Ok(None) => Ok(Value::Null),
        Err(err) => {
            debug!("getGuild failed soft: {err:#}");
            Ok(Value::Null)
        }
    }
}

async fn get_user_roles(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .user_roles(&guild_id, &user_id)
        .await
    {
        Ok(roles) => Ok(Value::List(roles.iter().map(record_to_value).collect())),
        Err(err) => {
            debug!("getUserRoles failed soft: {err:#}");
            Ok(Value::List(Vec::new()))
        }
    }
}

async fn get_user_permissions(
    state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .user_permissions(&guild_id, &user_id)
        .await
    {
        Ok(perms) => Ok(Value::from(perms)),
        Err(err) => {
            debug!("getUserPermissions failed soft: {err:#}");
            Ok(Value::List(Vec::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn get_user_defaults_to_invoker() {
        let world = TestWorld::new();
        let out = world.render("{{getUser}}").await;
        assert!(out.contains("alice"), "unexpected: {out}");
        // Through parens the map collapses to its id.
        assert_eq!(world.render("{{concat (getUser)}}").await, "42");
    }

    #[tokio::test]
    async fn entity_reads_fail_soft() {
        let world = TestWorld::new();
        world.platform.fail_all();
        let outcome = world.render_outcome("a{{getUser \"42\"}}b").await;
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("ab"));
    }

    #[tokio::test]
    async fn db_query_reads_typed_entries() {
        let world = TestWorld::new();
        world.registry.put("greeting", "strings", serde_json::json!("hello"));
        assert_eq!(world.render(r#"{{dbQuery "strings" "greeting"}}"#).await, "hello");
        assert_eq!(world.render(r#"{{dbQuery "strings" "missing"}}"#).await, "");
    }
}
