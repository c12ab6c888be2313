//! Math and random builtins. Pure (the random functions are pure in the
//! effect-class sense: no context or collaborator access).

use rand::Rng;
use rand::seq::SliceRandom;

use super::{FunctionTable, arg, builtin, num};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "add", Pure, add);
    builtin!(table, "sub", Pure, sub);
    builtin!(table, "mult", Pure, mult);
    builtin!(table, "div", Pure, div);
    builtin!(table, "mod", Pure, modulo);
    builtin!(table, "pow", Pure, pow);
    builtin!(table, "sqrt", Pure, sqrt);
    builtin!(table, "abs", Pure, abs);
    builtin!(table, "floor", Pure, floor);
    builtin!(table, "ceil", Pure, ceil);
    builtin!(table, "round", Pure, round);
    builtin!(table, "min", Pure, min);
    builtin!(table, "max", Pure, max);
    builtin!(table, "toInt", Pure, to_int);
    builtin!(table, "toFloat", Pure, to_float);
    builtin!(table, "randInt", Pure, rand_int);
    builtin!(table, "randFloat", Pure, rand_float);
    builtin!(table, "randChoice", Pure, rand_choice);
}

async fn add(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let sum = args.iter().filter_map(Value::as_num).sum();
    Ok(Value::Num(sum))
}

async fn sub(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0) - num(&args, 1)))
}

async fn mult(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let product = args.iter().filter_map(Value::as_num).product();
    Ok(Value::Num(product))
}

async fn div(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let divisor = num(&args, 1);
    if divisor == 0.0 {
        return Ok(Value::Null);
    }
    Ok(Value::Num(num(&args, 0) / divisor))
}

async fn modulo(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let divisor = num(&args, 1);
    if divisor == 0.0 {
        return Ok(Value::Null);
    }
    Ok(Value::Num(num(&args, 0) % divisor))
}

async fn pow(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0).powf(num(&args, 1))))
}

async fn sqrt(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let n = num(&args, 0);
    if n < 0.0 {
        return Ok(Value::Null);
    }
    Ok(Value::Num(n.sqrt()))
}

async fn abs(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0).abs()))
}

async fn floor(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0).floor()))
}

async fn ceil(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0).ceil()))
}

async fn round(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(num(&args, 0).round()))
}

async fn min(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let m = args.iter().filter_map(Value::as_num).fold(f64::INFINITY, f64::min);
    if m.is_finite() { Ok(Value::Num(m)) } else { Ok(Value::Null) }
}

async fn max(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let m = args
        .iter()
        .filter_map(Value::as_num)
        .fold(f64::NEG_INFINITY, f64::max);
    if m.is_finite() { Ok(Value::Num(m)) } else { Ok(Value::Null) }
}

async fn to_int(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    match arg(&args, 0).as_num() {
        Some(n) => Ok(Value::Num(n.trunc())),
        None => Ok(Value::Null),
    }
}

async fn to_float(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    match arg(&args, 0).as_num() {
        Some(n) => Ok(Value::Num(n)),
        None => Ok(Value::Null),
    }
}

/// `randInt a b` picks uniformly in `[a, b]`; `randInt n` in `[0, n)`.
async fn rand_int(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let picked = if args.len() >= 2 {
        let a = num(&args, 0) as i64;
        let b = num(&args, 1) as i64;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        rand::thread_rng().gen_range(lo..=hi)
    } else {
        let n = (num(&args, 0) as i64).max(1);
        rand::thread_rng().gen_range(0..n)
    };
    Ok(Value::Num(picked as f64))
}

async fn rand_float(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    if args.is_empty() {
        return Ok(Value::Num(rand::thread_rng().r#gen::<f64>()));
    }
    let a = num(&args, 0);
    let b = num(&args, 1);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        return Ok(Value::Num(lo));
    }
    Ok(Value::Num(rand::thread_rng().gen_range(lo..hi)))
}

async fn rand_choice(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    // One list argument picks from the list; multiple arguments pick from
    // the arguments themselves.
    let pool = if args.len() == 1 {
        arg(&args, 0).as_list().unwrap_or_else(|| vec![arg(&args, 0)])
    } else {
        args.clone()
    };
    Ok(pool.choose(&mut rand::thread_rng()).cloned().unwrap_or(Value::Null))
}
