//! Time formatting and parsing builtins. Pure.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::{FunctionTable, arg, builtin, num, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "now", Pure, now);
    builtin!(table, "nowUnix", Pure, now_unix);
    builtin!(table, "formatTime", Pure, format_time);
    builtin!(table, "parseTime", Pure, parse_time);
    builtin!(table, "addTime", Pure, add_time);
    builtin!(table, "subTime", Pure, sub_time);
    builtin!(table, "weekday", Pure, weekday);
    builtin!(table, "humanizeSeconds", Pure, humanize_seconds);
}

/// Accepts unix seconds (number or numeric string), RFC 3339, or the two
/// date formats command authors actually write.
pub(crate) fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(secs) = input.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    None
}

fn value_to_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Num(n) => Utc.timestamp_opt(*n as i64, 0).single(),
        Value::Str(s) => parse_timestamp(s),
        _ => None,
    }
}

async fn now(_state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(Utc::now().format(DEFAULT_FORMAT).to_string()))
}

async fn now_unix(_state: &mut EngineState<'_>, _args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Num(Utc::now().timestamp() as f64))
}

/// `formatTime t [fmt]` - `t` is unix seconds or a parseable timestamp.
async fn format_time(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let Some(time) = value_to_time(&arg(&args, 0)) else {
        return Ok(Value::Str(String::new()));
    };
    let fmt = {
        let f = text(&args, 1);
        if f.is_empty() { DEFAULT_FORMAT.to_string() } else { f }
    };
    Ok(Value::Str(time.format(&fmt).to_string()))
}

/// `parseTime s` - unix seconds, or empty when unparseable.
async fn parse_time(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    match parse_timestamp(&text(&args, 0)) {
        Some(time) => Ok(Value::Num(time.timestamp() as f64)),
        None => Ok(Value::Null),
    }
}

async fn add_time(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let Some(time) = value_to_time(&arg(&args, 0)) else {
        return Ok(Value::Null);
    };
    Ok(Value::Num((time.timestamp() + num(&args, 1) as i64) as f64))
}

async fn sub_time(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let Some(time) = value_to_time(&arg(&args, 0)) else {
        return Ok(Value::Null);
    };
    Ok(Value::Num((time.timestamp() - num(&args, 1) as i64) as f64))
}

async fn weekday(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let time = match args.first() {
        Some(v) if !matches!(v, Value::Null) => value_to_time(v),
        _ => Some(Utc::now()),
    };
    match time {
        Some(t) => Ok(Value::Str(t.weekday().to_string())),
        None => Ok(Value::Str(String::new())),
    }
}

/// `humanizeSeconds n` -> `"1d 2h 3m 4s"`.
async fn humanize_seconds(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let mut remaining = num(&args, 0).max(0.0) as i64;
    let days = remaining / 86_400;
    remaining %= 86_400;
    let hours = remaining / 3_600;
    remaining %= 3_600;
    let minutes = remaining / 60;
    let seconds = remaining % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    Ok(Value::Str(parts.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestWorld;

    #[test]
    fn parses_common_timestamp_shapes() {
        assert!(parse_timestamp("2026-08-27 10:00:00").is_some());
        assert!(parse_timestamp("2026-08-27").is_some());
        assert!(parse_timestamp("2026-08-27T10:00:00Z").is_some());
        assert!(parse_timestamp("1700000000").is_some());
        assert!(parse_timestamp("not a time").is_none());
    }

    #[tokio::test]
    async fn format_round_trip() {
        let world = TestWorld::new();
        let out = world
            .render(r#"{{formatTime (parseTime "2026-08-27 10:30:00") "%H:%M"}}"#)
            .await;
        assert_eq!(out, "10:30");
    }

    #[tokio::test]
    async fn humanize() {
        let world = TestWorld::new();
        assert_eq!(world.render("{{humanizeSeconds 90061}}").await, "1d 1h 1m 1s");
        assert_eq!(world.render("{{humanizeSeconds 0}}").await, "0s");
    }

    #[tokio::test]
    async fn add_time_shifts_unix_seconds() {
        let world = TestWorld::new();
        assert_eq!(
            world.render("{{addTime 1700000000 60}}").await,
            "1700000060"
        );
    }
}
