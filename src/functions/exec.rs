//! Nested and deferred command execution.
//!
//! `execCC` re-enters the whole render pipeline with a derived context
//! (same snapshot, replaced positional arguments) and a fresh variable
//! store. Recursion is depth-guarded; blowing the limit is the one
//! builtin failure that is fatal to the render.
//!
//! `scheduleCC` captures the current context and persists a job for the
//! scheduler; every scheduling problem degrades to a string-prefixed
//! in-band error. `cancelCC` deletes a pending job; cancelling a job
//! that already ran (or never existed) is a silent no-op.

use chrono::{Duration, Utc};
use tracing::debug;

use super::time::parse_timestamp;
use super::{FunctionTable, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::scheduler::ScheduledJob;
use crate::stores::StoredCommand;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "execCC", Recursive, exec_cc);
    builtin!(table, "scheduleCC", Deferred, schedule_cc);
    builtin!(table, "cancelCC", Deferred, cancel_cc);
}

async fn resolve_command(
    state: &EngineState<'_>,
    id_or_name: &str,
) -> Result<StoredCommand, String> {
    match state
        .engine
        .deps
        .commands
        .resolve(&state.ctx.guild_id, id_or_name)
        .await
    {
        Ok(Some(command)) if command.enabled => Ok(command),
        Ok(Some(command)) => Err(format!("command '{}' is disabled", command.name)),
        Ok(None) => Err(format!("no command '{id_or_name}'")),
        Err(err) => {
            debug!("command resolve failed: {err:#}");
            Err(format!("command lookup failed: {err}"))
        }
    }
}

/// `execCC idOrName args...` - runs a sibling command inline; its output
/// becomes this expression's value.
async fn exec_cc(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let target = text(&args, 0);
    let command = match resolve_command(state, &target).await {
        Ok(command) => command,
        Err(reason) => return Ok(Value::Str(format!("Failed to run command: {reason}"))),
    };
    if state.depth + 1 > state.engine.config.max_call_depth {
        return Err(EngineError::DepthExceeded(state.engine.config.max_call_depth));
    }

    let new_args: Vec<String> = args.iter().skip(1).map(Value::stringify).collect();
    let derived = state.ctx.with_args(new_args);
    debug!(command = %command.name, depth = state.depth + 1, "entering nested command");
    let (output, _ephemeral) = state
        .engine
        .render_at_depth(&command.code, &derived, state.depth + 1)
        .await?;
    Ok(Value::Str(output))
}

/// `scheduleCC idOrName delayOrTimestamp` - persists a deferred render of
/// the target command with the current context captured. Returns the job
/// id on success.
async fn schedule_cc(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let target = text(&args, 0);
    let command = match resolve_command(state, &target).await {
        Ok(command) => command,
        Err(reason) => return Ok(Value::Str(format!("Scheduling failed: {reason}"))),
    };

    // A numeric argument is a relative second count; text goes through
    // the timestamp parser (which also accepts unix seconds).
    let when_arg = text(&args, 1);
    let execute_at = if let Some(Value::Num(seconds)) = args.get(1) {
        let seconds = *seconds;
        if seconds <= 0.0 || !seconds.is_finite() {
            return Ok(Value::Str(format!(
                "Scheduling failed: invalid delay '{when_arg}'"
            )));
        }
        Utc::now() + Duration::seconds(seconds as i64)
    } else if let Some(at) = parse_timestamp(&when_arg) {
        at
    } else {
        return Ok(Value::Str(format!(
            "Scheduling failed: invalid delay or timestamp '{when_arg}'"
        )));
    };

    let job = ScheduledJob::new(
        state.ctx.guild_id.clone(),
        state.ctx.channel_id.clone(),
        state.ctx.user_id.clone(),
        command.code.clone(),
        state.ctx.clone(),
        execute_at,
    );
    let job_id = job.id.clone();
    match state.engine.deps.jobs.insert(&job).await {
        Ok(()) => {
            debug!(command = %command.name, %job_id, at = %execute_at, "scheduled command");
            Ok(Value::Str(job_id))
        }
        Err(err) => {
            debug!("scheduleCC persist failed: {err:#}");
            Ok(Value::Str(format!("Scheduling failed: {err}")))
        }
    }
}

/// `cancelCC jobId` - deletes the job while pending; otherwise a no-op.
async fn cancel_cc(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let job_id = text(&args, 0);
    if let Err(err) = state.engine.deps.jobs.delete(&job_id).await {
        debug!("cancelCC failed soft: {err:#}");
    }
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn nested_command_runs_with_replaced_args() {
        let world = TestWorld::new();
        world.commands.add(1, "greet", "Hello {{arg 0}}!", true);
        assert_eq!(world.render(r#"{{execCC "greet" "Bob"}}"#).await, "Hello Bob!");
        // Resolution by numeric id works too.
        assert_eq!(world.render(r#"{{execCC 1 "Ann"}}"#).await, "Hello Ann!");
    }

    #[tokio::test]
    async fn disabled_commands_are_refused_in_band() {
        let world = TestWorld::new();
        world.commands.add(2, "off", "never", false);
        let outcome = world.render_outcome(r#"{{execCC "off"}}"#).await;
        assert!(outcome.success);
        assert_eq!(
            outcome.output.as_deref(),
            Some("Failed to run command: command 'off' is disabled")
        );
    }

    #[tokio::test]
    async fn self_recursion_is_depth_limited() {
        let world = TestWorld::new();
        world.commands.add(3, "loop", r#"{{execCC "loop"}}"#, true);
        let outcome = world.render_outcome(r#"{{execCC "loop"}}"#).await;
        assert!(!outcome.success);
        assert!(outcome.output.is_none());
        let error = outcome.error.unwrap_or_default();
        assert!(error.contains("depth limit"), "got: {error}");
    }

    #[tokio::test]
    async fn invalid_delay_degrades_in_band() {
        let world = TestWorld::new();
        world.commands.add(4, "later", "deferred", true);
        let outcome = world.render_outcome(r#"{{scheduleCC "later" "soonish"}}"#).await;
        assert!(outcome.success);
        let output = outcome.output.unwrap_or_default();
        assert!(output.starts_with("Scheduling failed:"), "got: {output}");
        assert!(world.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_degrades_in_band() {
        let world = TestWorld::new();
        let outcome = world.render_outcome(r#"{{scheduleCC "ghost" 60}}"#).await;
        assert!(outcome.success);
        let output = outcome.output.unwrap_or_default();
        assert!(output.starts_with("Scheduling failed:"), "got: {output}");
    }
}
