//! String builtins. All pure.

use super::{FunctionTable, arg, builtin, num, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "upper", Pure, upper);
    builtin!(table, "lower", Pure, lower);
    builtin!(table, "title", Pure, title);
    builtin!(table, "capitalize", Pure, capitalize);
    builtin!(table, "trim", Pure, trim);
    builtin!(table, "trimLeft", Pure, trim_left);
    builtin!(table, "trimRight", Pure, trim_right);
    builtin!(table, "replace", Pure, replace);
    builtin!(table, "split", Pure, split);
    builtin!(table, "join", Pure, join);
    builtin!(table, "joinList", Pure, join);
    builtin!(table, "concat", Pure, concat);
    builtin!(table, "print", Pure, print);
    builtin!(table, "substr", Pure, substr);
    builtin!(table, "length", Pure, length);
    builtin!(table, "contains", Pure, contains);
    builtin!(table, "startsWith", Pure, starts_with);
    builtin!(table, "endsWith", Pure, ends_with);
    builtin!(table, "indexOf", Pure, index_of);
    builtin!(table, "repeat", Pure, repeat);
    builtin!(table, "reverse", Pure, reverse);
    builtin!(table, "padLeft", Pure, pad_left);
    builtin!(table, "padRight", Pure, pad_right);
    builtin!(table, "snippet", Pure, snippet);
    builtin!(table, "urlEscape", Pure, url_escape);
}

async fn upper(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(text(&args, 0).to_uppercase()))
}

async fn lower(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(text(&args, 0).to_lowercase()))
}

async fn title(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    Ok(Value::Str(out))
}

async fn capitalize(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let mut chars = input.chars();
    let out = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::Str(out))
}

async fn trim(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(text(&args, 0).trim().to_string()))
}

async fn trim_left(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(text(&args, 0).trim_start().to_string()))
}

async fn trim_right(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(text(&args, 0).trim_end().to_string()))
}

async fn replace(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let from = text(&args, 1);
    let to = text(&args, 2);
    if from.is_empty() {
        return Ok(Value::Str(input));
    }
    Ok(Value::Str(input.replace(&from, &to)))
}

async fn split(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let sep = text(&args, 1);
    let parts: Vec<Value> = if sep.is_empty() {
        input.split_whitespace().map(Value::from).collect()
    } else {
        input.split(&sep).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

pub(crate) async fn join(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let sep = text(&args, 1);
    let joined = match arg(&args, 0).as_list() {
        Some(items) => items
            .iter()
            .map(Value::stringify)
            .collect::<Vec<_>>()
            .join(&sep),
        None => text(&args, 0),
    };
    Ok(Value::Str(joined))
}

async fn concat(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(args.iter().map(Value::stringify).collect()))
}

async fn print(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let joined = args.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
    Ok(Value::Str(joined))
}

async fn substr(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let chars: Vec<char> = input.chars().collect();
    let start = (num(&args, 1).max(0.0) as usize).min(chars.len());
    let end = if args.len() > 2 {
        (num(&args, 2).max(0.0) as usize).clamp(start, chars.len())
    } else {
        chars.len()
    };
    Ok(Value::Str(chars[start..end].iter().collect()))
}

async fn length(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let len = match arg(&args, 0) {
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => other.stringify().chars().count(),
    };
    Ok(Value::Num(len as f64))
}

async fn contains(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(text(&args, 0).contains(&text(&args, 1))))
}

async fn starts_with(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(text(&args, 0).starts_with(&text(&args, 1))))
}

async fn ends_with(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Bool(text(&args, 0).ends_with(&text(&args, 1))))
}

async fn index_of(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let needle = text(&args, 1);
    let index = match input.find(&needle) {
        Some(byte_pos) => input[..byte_pos].chars().count() as f64,
        None => -1.0,
    };
    Ok(Value::Num(index))
}

async fn repeat(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    // Bounded so a template cannot allocate unbounded output.
    let times = (num(&args, 1).max(0.0) as usize).min(10_000);
    Ok(Value::Str(input.repeat(times)))
}

async fn reverse(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    match arg(&args, 0) {
        Value::List(mut items) => {
            items.reverse();
            Ok(Value::List(items))
        }
        other => Ok(Value::Str(other.stringify().chars().rev().collect())),
    }
}

async fn pad_left(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(pad(&args, true)))
}

async fn pad_right(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(pad(&args, false)))
}

fn pad(args: &[Value], left: bool) -> String {
    let input = text(args, 0);
    let width = (num(args, 1).max(0.0) as usize).min(10_000);
    let fill = {
        let f = text(args, 2);
        if f.is_empty() { " ".to_string() } else { f }
    };
    let current = input.chars().count();
    if current >= width {
        return input;
    }
    let padding: String = fill.chars().cycle().take(width - current).collect();
    if left {
        format!("{padding}{input}")
    } else {
        format!("{input}{padding}")
    }
}

async fn snippet(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let limit = (num(&args, 1).max(0.0) as usize).max(1);
    if input.chars().count() <= limit {
        return Ok(Value::Str(input));
    }
    let cut: String = input.chars().take(limit).collect();
    Ok(Value::Str(format!("{}…", cut.trim_end())))
}

async fn url_escape(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let input = text(&args, 0);
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    Ok(Value::Str(out))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn case_conversions() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{upper "abc"}}"#).await, "ABC");
        assert_eq!(world.render(r#"{{title "hello world"}}"#).await, "Hello World");
        assert_eq!(world.render(r#"{{capitalize "rust"}}"#).await, "Rust");
    }

    #[tokio::test]
    async fn substr_is_char_based() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{substr "héllo" 1 3}}"#).await, "él");
    }

    #[tokio::test]
    async fn index_of_missing_is_minus_one() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{indexOf "abc" "z"}}"#).await, "-1");
        assert_eq!(world.render(r#"{{indexOf "abc" "b"}}"#).await, "1");
    }

    #[tokio::test]
    async fn join_flattens_lists() {
        let world = TestWorld::new();
        assert_eq!(
            world.render(r#"{{join (split "a,b,c" ",") "-"}}"#).await,
            "a-b-c"
        );
    }

    #[tokio::test]
    async fn repeat_is_bounded() {
        let world = TestWorld::new();
        let out = world.render(r#"{{length (repeat "x" 999999999)}}"#).await;
        assert_eq!(out, "10000");
    }

    #[tokio::test]
    async fn pad_and_trim() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{padLeft "7" 3 "0"}}"#).await, "007");
        assert_eq!(world.render(r#"{{trim "  x  "}}"#).await, "x");
    }
}
