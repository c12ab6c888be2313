//! Array, slice, and sort builtins. All pure.
//!
//! Every list-taking builtin accepts either a real list value or a string
//! holding a JSON array (the form a parenthesized sub-expression arrives
//! in after textual re-substitution).

use rand::seq::SliceRandom;

use super::{FunctionTable, arg, builtin, num};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "list", Pure, list);
    builtin!(table, "index", Pure, index);
    builtin!(table, "first", Pure, first);
    builtin!(table, "last", Pure, last);
    builtin!(table, "slice", Pure, slice);
    builtin!(table, "count", Pure, count);
    builtin!(table, "sum", Pure, sum);
    builtin!(table, "sortAsc", Pure, sort_asc);
    builtin!(table, "sortDesc", Pure, sort_desc);
    builtin!(table, "unique", Pure, unique);
    builtin!(table, "shuffle", Pure, shuffle);
    builtin!(table, "in", Pure, in_fn);
    builtin!(table, "rangeList", Pure, range_list);
}

fn items_of(args: &[Value]) -> Vec<Value> {
    arg(args, 0).as_list().unwrap_or_default()
}

async fn list(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::List(args))
}

async fn index(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let items = items_of(&args);
    let i = num(&args, 1);
    if i < 0.0 {
        return Ok(Value::Null);
    }
    Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
}

async fn first(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(items_of(&args).first().cloned().unwrap_or(Value::Null))
}

async fn last(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(items_of(&args).last().cloned().unwrap_or(Value::Null))
}

async fn slice(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let items = items_of(&args);
    let start = (num(&args, 1).max(0.0) as usize).min(items.len());
    let end = if args.len() > 2 {
        (num(&args, 2).max(0.0) as usize).clamp(start, items.len())
    } else {
        items.len()
    };
    Ok(Value::List(items[start..end].to_vec()))
}

async fn count(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(items_of(&args).len() as f64))
}

async fn sum(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let total: f64 = items_of(&args).iter().filter_map(Value::as_num).sum();
    Ok(Value::Num(total))
}

/// Numeric sort when every element coerces to a number, else
/// lexicographic over stringified forms.
fn sorted(mut items: Vec<Value>, descending: bool) -> Vec<Value> {
    let all_numeric = items.iter().all(|v| v.as_num().is_some());
    if all_numeric {
        items.sort_by(|a, b| {
            let x = a.as_num().unwrap_or(0.0);
            let y = b.as_num().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        items.sort_by_key(Value::stringify);
    }
    if descending {
        items.reverse();
    }
    items
}

async fn sort_asc(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::List(sorted(items_of(&args), false)))
}

async fn sort_desc(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::List(sorted(items_of(&args), true)))
}

async fn unique(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for item in items_of(&args) {
        if seen.insert(item.stringify()) {
            out.push(item);
        }
    }
    Ok(Value::List(out))
}

async fn shuffle(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut items = items_of(&args);
    items.shuffle(&mut rand::thread_rng());
    Ok(Value::List(items))
}

/// `in list item` - membership by stringified equality.
async fn in_fn(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let needle = arg(&args, 1).stringify();
    let found = items_of(&args).iter().any(|v| v.stringify() == needle);
    Ok(Value::Bool(found))
}

/// `rangeList a b` - integers from `a` (inclusive) to `b` (exclusive),
/// bounded so templates cannot allocate unbounded lists.
async fn range_list(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let a = num(&args, 0) as i64;
    let b = num(&args, 1) as i64;
    let len = (b - a).max(0).min(10_000);
    let items = (a..a + len).map(Value::from).collect();
    Ok(Value::List(items))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn lists_render_as_json_with_integer_numbers() {
        let world = TestWorld::new();
        assert_eq!(world.render("{{list 1 2}}").await, "[1,2]");
        assert_eq!(world.render("{{list 1.5 2}}").await, "[1.5,2]");
    }

    #[tokio::test]
    async fn list_and_index() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{index (list "a" "b" "c") 1}}"#).await, "b");
        assert_eq!(world.render(r#"{{first (list 5 6)}}"#).await, "5");
        assert_eq!(world.render(r#"{{last (list 5 6)}}"#).await, "6");
    }

    #[tokio::test]
    async fn sorting_is_numeric_for_numbers() {
        let world = TestWorld::new();
        assert_eq!(
            world.render(r#"{{join (sortAsc (list 10 2 33)) ","}}"#).await,
            "2,10,33"
        );
        assert_eq!(
            world.render(r#"{{join (sortDesc (list 10 2 33)) ","}}"#).await,
            "33,10,2"
        );
    }

    #[tokio::test]
    async fn unique_preserves_first_occurrence() {
        let world = TestWorld::new();
        assert_eq!(
            world.render(r#"{{join (unique (list "a" "b" "a")) ","}}"#).await,
            "a,b"
        );
    }

    #[tokio::test]
    async fn membership() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{in (list 1 2 3) 2}}"#).await, "true");
        assert_eq!(world.render(r#"{{in (list 1 2 3) 9}}"#).await, "false");
    }

    #[tokio::test]
    async fn sum_and_count() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{sum (list 1 2 3)}}"#).await, "6");
        assert_eq!(world.render(r#"{{count (rangeList 0 5)}}"#).await, "5");
    }
}
