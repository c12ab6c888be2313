//! The builtin function registry.
//!
//! Roughly 130 named builtins, grouped by category, each registered as a
//! [`FunctionDescriptor`] with an explicit side-effect class. The registry
//! is a plain map so the set of builtins can be enumerated statically and
//! tested per effect class.
//!
//! Handler contracts by [`SideEffectClass`]:
//!
//! - `Pure`: deterministic given arguments; no context or variable-store
//!   access beyond declared arguments.
//! - `ReadIo`: delegate to injected collaborators and fail soft - a data
//!   source error yields empty/false/`""`, never an error. The dedicated
//!   validators (`validateUser`, `validateRole`) return a boolean the
//!   author branches on.
//! - `MutatingIo`: perform exactly one external side effect, catch all
//!   failures internally, and return a human-readable status string.
//! - `Recursive`: `execCC` re-enters the render pipeline (depth-guarded).
//! - `Deferred`: `scheduleCC` / `cancelCC` talk to the job store.

pub(crate) mod arrays;
pub(crate) mod data;
pub(crate) mod embeds;
pub(crate) mod exec;
pub(crate) mod logic;
pub(crate) mod math;
pub(crate) mod mentions;
pub(crate) mod meta;
pub(crate) mod registry_kv;
pub(crate) mod roles;
pub(crate) mod messaging;
pub(crate) mod strings;
pub(crate) mod time;
pub(crate) mod vars;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

/// Effect class of a builtin, used for effect-aware testing and
/// introspection (`sideEffectOf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideEffectClass {
    Pure,
    ReadIo,
    MutatingIo,
    Recursive,
    Deferred,
}

impl SideEffectClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SideEffectClass::Pure => "pure",
            SideEffectClass::ReadIo => "read-io",
            SideEffectClass::MutatingIo => "mutating-io",
            SideEffectClass::Recursive => "recursive",
            SideEffectClass::Deferred => "deferred",
        }
    }
}

pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + 'a>>;

/// Handlers take the explicit engine state plus their parsed arguments;
/// there is no hidden closure state.
pub type Handler = for<'a, 'e> fn(&'a mut EngineState<'e>, Vec<Value>) -> HandlerFuture<'a>;

/// One registered builtin.
#[derive(Clone, Copy)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub effect: SideEffectClass,
    pub handler: Handler,
}

impl std::fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

pub type FunctionTable = HashMap<&'static str, FunctionDescriptor>;

/// Registers one builtin, wrapping an `async fn` handler into the boxed
/// dispatch signature.
macro_rules! builtin {
    ($table:expr, $name:literal, $effect:ident, $func:path) => {{
        fn shim<'a>(
            state: &'a mut $crate::engine::EngineState<'_>,
            args: Vec<$crate::value::Value>,
        ) -> $crate::functions::HandlerFuture<'a> {
            Box::pin($func(state, args))
        }
        $table.insert(
            $name,
            $crate::functions::FunctionDescriptor {
                name: $name,
                effect: $crate::functions::SideEffectClass::$effect,
                handler: shim,
            },
        );
    }};
}
pub(crate) use builtin;

/// Assembles the full builtin table.
pub fn registry() -> FunctionTable {
    let mut table = FunctionTable::new();
    strings::register(&mut table);
    math::register(&mut table);
    logic::register(&mut table);
    arrays::register(&mut table);
    time::register(&mut table);
    embeds::register(&mut table);
    mentions::register(&mut table);
    vars::register(&mut table);
    data::register(&mut table);
    registry_kv::register(&mut table);
    roles::register(&mut table);
    messaging::register(&mut table);
    meta::register(&mut table);
    exec::register(&mut table);
    table
}

// Argument accessors shared by the handler modules. Missing arguments
// degrade to Null / empty / zero instead of failing the render.

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

pub(crate) fn text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::stringify).unwrap_or_default()
}

pub(crate) fn num(args: &[Value], index: usize) -> f64 {
    args.get(index).and_then(Value::as_num).unwrap_or(0.0)
}

/// The user id an entity builtin should act on: explicit argument if
/// given, else the invoking user.
pub(crate) fn target_user(state: &EngineState<'_>, args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(v) if !v.stringify().is_empty() => v.stringify(),
        _ => state.ctx.user_id.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_well_populated() {
        let table = registry();
        assert!(
            table.len() >= 120,
            "expected at least 120 builtins, found {}",
            table.len()
        );
    }

    #[test]
    fn descriptor_names_match_keys() {
        for (key, descriptor) in registry() {
            assert_eq!(key, descriptor.name);
        }
    }

    #[test]
    fn effect_classes_are_assigned() {
        let table = registry();
        assert_eq!(table["add"].effect, SideEffectClass::Pure);
        assert_eq!(table["getUser"].effect, SideEffectClass::ReadIo);
        assert_eq!(table["addRole"].effect, SideEffectClass::MutatingIo);
        assert_eq!(table["execCC"].effect, SideEffectClass::Recursive);
        assert_eq!(table["scheduleCC"].effect, SideEffectClass::Deferred);
        assert_eq!(table["cancelCC"].effect, SideEffectClass::Deferred);
    }
}
