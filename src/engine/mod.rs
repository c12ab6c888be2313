//! The render pipeline.
//!
//! A render walks the template's `{{ }}` regions in document order, hands
//! each inner expression to the evaluator, and splices the stringified
//! result back into the surrounding literal text. Evaluation is strictly
//! sequential, so side-effecting builtins observe the variable store
//! deterministically.
//!
//! State is explicit: handlers receive an [`EngineState`] carrying the
//! context, the per-render variable store, the injected collaborators,
//! and the current nested-command depth. Nothing hides in closures.

pub mod args;
pub mod eval;
pub mod extract;

use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::context::{ContextBuilder, ExecutionContext};
use crate::error::{EngineError, RenderOutcome};
use crate::functions::{self, FunctionTable};
use crate::stores::Collaborators;
use crate::value::Value;

/// Engine tunables. The defaults match production behavior; tests shrink
/// them where useful.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on registry entries loaded into one context snapshot.
    pub registry_snapshot_limit: usize,
    /// Maximum `(...)` rewrite passes per argument list.
    pub max_rewrite_passes: usize,
    /// Maximum nested-command (`execCC`) depth.
    pub max_call_depth: usize,
    /// Scheduler poll interval.
    pub poll_interval: Duration,
    /// Maximum due jobs consumed per scheduler pass.
    pub poll_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_snapshot_limit: 200,
            max_rewrite_passes: 16,
            max_call_depth: 8,
            poll_interval: Duration::from_secs(60),
            poll_batch: 25,
        }
    }
}

/// The template interpreter. One instance is shared by ad-hoc renders and
/// the scheduler; each render gets its own variable store.
pub struct Engine {
    pub(crate) deps: Collaborators,
    pub(crate) functions: FunctionTable,
    pub(crate) config: EngineConfig,
}

/// Explicit per-render state threaded through the evaluator and every
/// builtin handler.
pub struct EngineState<'e> {
    pub engine: &'e Engine,
    pub ctx: &'e ExecutionContext,
    pub vars: &'e mut HashMap<String, Value>,
    pub ephemeral: &'e mut bool,
    /// Current nested-command depth; `execCC` increments it.
    pub depth: usize,
}

impl Engine {
    pub fn new(deps: Collaborators) -> Self {
        Self::with_config(deps, EngineConfig::default())
    }

    pub fn with_config(deps: Collaborators, config: EngineConfig) -> Self {
        Self {
            deps,
            functions: functions::registry(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.deps
    }

    /// Builds a context through [`ContextBuilder`], loading the registry
    /// snapshot once with the configured bound.
    pub async fn build_context(&self, builder: ContextBuilder) -> ExecutionContext {
        builder
            .build(self.deps.registry.as_ref(), self.config.registry_snapshot_limit)
            .await
    }

    /// Renders a template against a context.
    ///
    /// Only a handler failure aborts; every other irregularity has already
    /// been converted to in-band text by the time it reaches here.
    pub async fn render(&self, template: &str, ctx: &ExecutionContext) -> RenderOutcome {
        match self.render_at_depth(template, ctx, 0).await {
            Ok((output, ephemeral)) => RenderOutcome::ok(output, ephemeral),
            Err(err) => {
                debug!("render failed: {err}");
                RenderOutcome::failed(err.to_string())
            }
        }
    }

    /// Render entry shared by top-level calls and `execCC` re-entry.
    pub(crate) async fn render_at_depth(
        &self,
        template: &str,
        ctx: &ExecutionContext,
        depth: usize,
    ) -> Result<(String, bool), EngineError> {
        if depth > self.config.max_call_depth {
            return Err(EngineError::DepthExceeded(self.config.max_call_depth));
        }
        let expressions = extract::extract(template);
        debug!(
            expressions = expressions.len(),
            depth, "rendering template"
        );
        if expressions.is_empty() {
            return Ok((template.to_string(), false));
        }

        let mut vars = HashMap::new();
        let mut ephemeral = false;
        let mut output = String::with_capacity(template.len());
        let mut cursor = 0usize;

        for expr in &expressions {
            output.push_str(&template[cursor..expr.span.start]);
            let value = {
                let mut state = EngineState {
                    engine: self,
                    ctx,
                    vars: &mut vars,
                    ephemeral: &mut ephemeral,
                    depth,
                };
                eval::evaluate(&mut state, expr.inner).await?
            };
            output.push_str(&value.stringify());
            cursor = expr.span.end;
        }
        output.push_str(&template[cursor..]);
        Ok((output, ephemeral))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("functions", &self.functions.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
