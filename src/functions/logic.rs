//! Conditional and logic builtins. All pure.
//!
//! Comparisons are numeric when both sides coerce to numbers, otherwise
//! lexicographic over the stringified forms.

use super::{FunctionTable, arg, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "if", Pure, if_fn);
    builtin!(table, "eq", Pure, eq);
    builtin!(table, "ne", Pure, ne);
    builtin!(table, "lt", Pure, lt);
    builtin!(table, "le", Pure, le);
    builtin!(table, "gt", Pure, gt);
    builtin!(table, "ge", Pure, ge);
    builtin!(table, "and", Pure, and);
    builtin!(table, "or", Pure, or);
    builtin!(table, "not", Pure, not);
    builtin!(table, "xor", Pure, xor);
    builtin!(table, "default", Pure, default_fn);
    builtin!(table, "coalesce", Pure, coalesce);
    builtin!(table, "isNull", Pure, is_null);
    builtin!(table, "isNumber", Pure, is_number);
}

/// `if cond then else` - the unused branch has already been evaluated by
/// the argument parser; this only selects.
async fn if_fn(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    if arg(&args, 0).truthy() {
        Ok(arg(&args, 1))
    } else {
        Ok(arg(&args, 2))
    }
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.stringify().cmp(&b.stringify()),
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => x == y,
        _ => a.stringify() == b.stringify(),
    }
}

async fn eq(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(equal(&arg(&args, 0), &arg(&args, 1))))
}

async fn ne(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(!equal(&arg(&args, 0), &arg(&args, 1))))
}

async fn lt(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(compare(&arg(&args, 0), &arg(&args, 1)).is_lt()))
}

async fn le(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(compare(&arg(&args, 0), &arg(&args, 1)).is_le()))
}

async fn gt(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(compare(&arg(&args, 0), &arg(&args, 1)).is_gt()))
}

async fn ge(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(compare(&arg(&args, 0), &arg(&args, 1)).is_ge()))
}

async fn and(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(!args.is_empty() && args.iter().all(Value::truthy)))
}

async fn or(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(args.iter().any(Value::truthy)))
}

async fn not(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(!arg(&args, 0).truthy()))
}

async fn xor(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(arg(&args, 0).truthy() != arg(&args, 1).truthy()))
}

/// First argument if truthy, else the second.
async fn default_fn(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    if arg(&args, 0).truthy() {
        Ok(arg(&args, 0))
    } else {
        Ok(arg(&args, 1))
    }
}

/// First argument that is neither null nor empty text.
async fn coalesce(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    for value in args {
        let empty = matches!(&value, Value::Null) || value.stringify().is_empty();
        if !empty {
            return Ok(value);
        }
    }
    Ok(Value::Null)
}

async fn is_null(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let nullish = matches!(arg(&args, 0), Value::Null) || text(&args, 0).is_empty();
    Ok(Value::Bool(nullish))
}

async fn is_number(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(arg(&args, 0).as_num().is_some()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn if_selects_branch() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{if true "yes" "no"}}"#).await, "yes");
        assert_eq!(world.render(r#"{{if false "yes" "no"}}"#).await, "no");
    }

    #[tokio::test]
    async fn comparisons_are_numeric_when_possible() {
        let world = TestWorld::new();
        assert_eq!(world.render("{{lt 9 10}}").await, "true");
        // Lexicographic comparison would say "9" > "10".
        assert_eq!(world.render(r#"{{lt "9" "10"}}"#).await, "true");
        assert_eq!(world.render(r#"{{eq 5 "5"}}"#).await, "true");
    }

    #[tokio::test]
    async fn branching_on_comparison() {
        let world = TestWorld::new();
        assert_eq!(
            world.render(r#"{{if (gt 10 5) "big" "small"}}"#).await,
            "big"
        );
    }

    #[tokio::test]
    async fn coalesce_skips_empties() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{coalesce "" "fallback"}}"#).await, "fallback");
    }
}
