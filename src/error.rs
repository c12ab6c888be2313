//! Error types and the render outcome envelope.
//!
//! The engine distinguishes exactly one fatal failure mode: an error
//! returned by a builtin handler ([`EngineError`]) aborts the whole render
//! with no partial output. Every other irregularity - unknown functions,
//! unavailable collaborators, failed mutations - degrades to in-band text
//! so an authored command reliably produces *some* output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal render errors.
///
/// Anything a handler returns as `Err` propagates to the top-level caller
/// and surfaces as `RenderOutcome { success: false, .. }`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A builtin handler failed in a way it could not degrade in-band.
    #[error("function '{function}' failed: {reason}")]
    Handler { function: String, reason: String },

    /// Nested command execution exceeded the configured depth limit.
    #[error("nested command depth limit of {0} exceeded")]
    DepthExceeded(usize),
}

impl EngineError {
    pub fn handler(function: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Handler {
            function: function.into(),
            reason: reason.into(),
        }
    }
}

/// Result envelope returned by [`Engine::render`](crate::engine::Engine::render).
///
/// `output` is `Some` exactly when `success` is true; a failed render
/// carries no partial output. `ephemeral` defaults to false and flips when
/// a template invokes the `ephemeral` builtin mid-render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub ephemeral: bool,
}

impl RenderOutcome {
    pub fn ok(output: String, ephemeral: bool) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            ephemeral,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            ephemeral: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_has_no_output() {
        let outcome = RenderOutcome::failed("boom");
        assert!(!outcome.success);
        assert!(outcome.output.is_none());
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }

    #[test]
    fn error_display_names_the_function() {
        let err = EngineError::handler("execCC", "target missing");
        assert_eq!(err.to_string(), "function 'execCC' failed: target missing");
    }
}
