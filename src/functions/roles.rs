//! Permission, role, and validation builtins. ReadIo, fail-soft to
//! `false`/empty - except the validators, whose boolean result IS the
//! answer the author branches on.

use tracing::debug;

use super::{FunctionTable, builtin, target_user, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "checkPermission", ReadIo, check_permission);
    builtin!(table, "hasRole", ReadIo, has_role);
    builtin!(table, "hasRoleName", ReadIo, has_role_name);
    builtin!(table, "isAdmin", ReadIo, is_admin);
    builtin!(table, "isOwner", ReadIo, is_owner);
    builtin!(table, "isBot", ReadIo, is_bot);
    builtin!(table, "filterBots", ReadIo, filter_bots);
    builtin!(table, "validateUser", ReadIo, validate_user);
    builtin!(table, "validateRole", ReadIo, validate_role);
}

/// `checkPermission perm [user]`.
async fn check_permission(
    state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let permission = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .check_permission(&guild_id, &user_id, &permission)
        .await
    {
        Ok(allowed) => Ok(Value::Bool(allowed)),
        Err(err) => {
            debug!("checkPermission failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

/// `hasRole roleId [user]`.
async fn has_role(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let role_id = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .user_roles(&guild_id, &user_id)
        .await
    {
        Ok(roles) => Ok(Value::Bool(roles.iter().any(|r| r.id == role_id))),
        Err(err) => {
            debug!("hasRole failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

/// `hasRoleName name [user]` - case-sensitive name match.
async fn has_role_name(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let name = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .user_roles(&guild_id, &user_id)
        .await
    {
        Ok(roles) => Ok(Value::Bool(roles.iter().any(|r| r.name == name))),
        Err(err) => {
            debug!("hasRoleName failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

async fn is_admin(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .permissions
        .check_permission(&guild_id, &user_id, "administrator")
        .await
    {
        Ok(admin) => Ok(Value::Bool(admin)),
        Err(err) => {
            debug!("isAdmin failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

async fn is_owner(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    let owner = state
        .ctx
        .lookup("guild.owner_id")
        .map(|v| v.stringify())
        .unwrap_or_default();
    Ok(Value::Bool(!owner.is_empty() && owner == user_id))
}

async fn is_bot(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = target_user(state, &args, 0);
    match state.engine.deps.platform.get_user(&user_id).await {
        Ok(Some(user)) => Ok(Value::Bool(user.bot)),
        Ok(None) => Ok(Value::Bool(false)),
        Err(err) => {
            debug!("isBot failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

/// `filterBots list-of-user-ids` - drops ids that belong to bots or to
/// nobody at all.
async fn filter_bots(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let ids = match args.first().and_then(Value::as_list) {
        Some(items) => items,
        None => return Ok(Value::List(Vec::new())),
    };
    let mut humans = Vec::new();
    for id in ids {
        let id_text = id.stringify();
        match state.engine.deps.platform.get_user(&id_text).await {
            Ok(Some(user)) if !user.bot => humans.push(id),
            Ok(_) => {}
            Err(err) => {
                debug!("filterBots failed soft for {id_text}: {err:#}");
            }
        }
    }
    Ok(Value::List(humans))
}

/// `validateUser id` - true iff the user exists on the platform.
async fn validate_user(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let user_id = text(&args, 0);
    match state.engine.deps.platform.get_user(&user_id).await {
        Ok(found) => Ok(Value::Bool(found.is_some())),
        Err(err) => {
            debug!("validateUser failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

/// `validateRole idOrName` - true iff the role exists in this guild.
async fn validate_role(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let role = text(&args, 0);
    let guild_id = state.ctx.guild_id.clone();
    match state.engine.deps.platform.get_role(&guild_id, &role).await {
        Ok(found) => Ok(Value::Bool(found.is_some())),
        Err(err) => {
            debug!("validateRole failed soft: {err:#}");
            Ok(Value::Bool(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn permission_checks_default_to_invoker() {
        let world = TestWorld::new();
        world.permissions.grant("900", "42", "kick_members");
        assert_eq!(world.render(r#"{{checkPermission "kick_members"}}"#).await, "true");
        assert_eq!(world.render(r#"{{checkPermission "ban_members"}}"#).await, "false");
    }

    #[tokio::test]
    async fn permission_store_outage_reads_as_false() {
        let world = TestWorld::new();
        world.permissions.fail_all();
        let outcome = world
            .render_outcome(r#"{{checkPermission "kick_members"}}"#)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.output.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn validators_answer_existence() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{validateUser "42"}}"#).await, "true");
        assert_eq!(world.render(r#"{{validateUser "404"}}"#).await, "false");
        assert_eq!(world.render(r#"{{validateRole "mods"}}"#).await, "true");
        assert_eq!(world.render(r#"{{validateRole "nope"}}"#).await, "false");
    }

    #[tokio::test]
    async fn owner_check_uses_context_guild() {
        let world = TestWorld::new();
        // TestWorld's guild owner is user 42.
        assert_eq!(world.render("{{isOwner}}").await, "true");
        assert_eq!(world.render(r#"{{isOwner "99"}}"#).await, "false");
    }

    #[tokio::test]
    async fn bot_filtering() {
        let world = TestWorld::new();
        let out = world
            .render(r#"{{join (filterBots (list "42" "300")) ","}}"#)
            .await;
        // 300 is the test world's bot account.
        assert_eq!(out, "42");
    }
}
