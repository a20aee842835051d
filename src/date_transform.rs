use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Locale, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};

use crate::key::FetchArgs;
use crate::transform::TransformDescriptor;

/// The shipped date transform.
///
/// Interprets the field's raw value as an absolute instant (an RFC 3339
/// string, or an integer of epoch milliseconds), converts it to the target
/// timezone, and renders it either as a round-trippable RFC 3339 timestamp
/// (no `format` argument) or through the requested format pattern and locale.
///
/// Arguments added to the field:
/// - `timezone`: IANA zone name, default `"utc"`.
/// - `locale`: language tag such as `"en"`, `"fr"`, or a full POSIX tag such
///   as `"fr_FR"`; default `"en"`. Only used when `format` is given.
/// - `format`: optional output pattern, either one of the named presets below
///   or a strftime pattern passed through as-is.
///
/// Named presets: `D` (locale short date), `DD` (`4 oct 2024`), `DDD`
/// (`4 octobre 2024`), `DDDD` (weekday and full date), `t` (`HH:MM`), `tt`
/// (`HH:MM:SS`), `f` (full date and short time), `F` (full date and time).
///
/// A missing or unparseable raw value, an unknown timezone, and an invalid
/// pattern all render as null, never as an error.
pub fn date_transform() -> TransformDescriptor {
    TransformDescriptor::new(format_date_value)
        .with_argument("timezone", Some(json!("utc")))
        .with_argument("locale", Some(json!("en")))
        .with_argument("format", None)
}

fn format_date_value(raw: Value, args: &FetchArgs) -> Value {
    let Some(instant) = parse_instant(&raw) else {
        return Value::Null;
    };
    let zone_name = args.get("timezone").and_then(Value::as_str).unwrap_or("utc");
    let Some(zone) = resolve_zone(zone_name) else {
        return Value::Null;
    };
    let local = instant.with_timezone(&zone);

    match args.get("format").and_then(Value::as_str) {
        None => Value::String(local.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Some(format) => {
            let locale = resolve_locale(args.get("locale").and_then(Value::as_str).unwrap_or("en"));
            let pattern = preset_pattern(format).unwrap_or(format);
            // Collecting the items up front lets an invalid pattern render
            // null instead of panicking inside `Display`.
            let items = StrftimeItems::new_with_locale(pattern, locale).collect::<Vec<_>>();
            if items.iter().any(|item| matches!(item, Item::Error)) {
                return Value::Null;
            }
            Value::String(local.format_localized_with_items(items.into_iter(), locale).to_string())
        }
    }
}

fn parse_instant(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => {
            DateTime::parse_from_rfc3339(s).ok().map(|instant| instant.with_timezone(&Utc))
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn resolve_zone(name: &str) -> Option<Tz> {
    if name.eq_ignore_ascii_case("utc") {
        Some(Tz::UTC)
    } else {
        name.parse().ok()
    }
}

/// Maps a language tag onto a chrono locale. Bare language tags are expanded
/// to their most common region; an unrecognized tag falls back to POSIX
/// (English month and weekday names).
fn resolve_locale(tag: &str) -> Locale {
    let normalized = tag.replace('-', "_");
    if let Ok(locale) = Locale::try_from(normalized.as_str()) {
        return locale;
    }
    let expanded = match normalized.as_str() {
        "en" => "en_US".to_owned(),
        other => format!("{}_{}", other, other.to_uppercase()),
    };
    Locale::try_from(expanded.as_str()).unwrap_or(Locale::POSIX)
}

fn preset_pattern(format: &str) -> Option<&'static str> {
    Some(match format {
        "D" => "%x",
        "DD" => "%-d %b %Y",
        "DDD" => "%-d %B %Y",
        "DDDD" => "%A %-d %B %Y",
        "t" => "%H:%M",
        "tt" => "%H:%M:%S",
        "f" => "%-d %B %Y %H:%M",
        "F" => "%-d %B %Y %H:%M:%S",
        _ => return None,
    })
}
