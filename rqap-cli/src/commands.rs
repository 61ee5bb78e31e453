//! Command execution and result rendering.

use crate::Commands;
use colored::Colorize;
use rqap_client::{Client, ClientError};
use rqap_protocol::Sexp;
use serde_json::{json, Map, Value};

/// Executes a one-shot command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
    as_json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        Commands::Eval { expr } => {
            let value = client.eval(&expr).await.map_err(|e| describe(&e))?;
            Ok(render(&value, as_json))
        }

        Commands::Void { expr } => {
            client.eval_void(&expr).await.map_err(|e| describe(&e))?;
            Ok("OK".green().to_string())
        }
    }
}

/// One-line error description, including the server's trailing message
/// when it sent one.
pub fn describe(err: &ClientError) -> String {
    match err.server_message() {
        Some(message) => format!("{err}: {message}"),
        None => err.to_string(),
    }
}

/// Renders a decoded value either as human-readable text or as JSON.
pub fn render(value: &Sexp, as_json: bool) -> String {
    if as_json {
        serde_json::to_string_pretty(&to_json(value)).unwrap_or_else(|_| "null".into())
    } else {
        render_text(value)
    }
}

fn render_text(value: &Sexp) -> String {
    match value {
        Sexp::Null => "NULL".dimmed().to_string(),
        Sexp::Str(s) | Sexp::SymName(s) => format!("\"{s}\""),
        Sexp::ArrayStr(items) => join(items.iter(), |item| match item {
            Some(s) => format!("\"{s}\""),
            None => "NA".dimmed().to_string(),
        }),
        Sexp::ArrayInt(items) => join(items.iter(), |item| match item {
            Some(v) => v.to_string(),
            None => "NA".dimmed().to_string(),
        }),
        Sexp::ArrayDouble(items) => join(items.iter(), |item| match item {
            Some(v) => v.to_string(),
            None => "NA".dimmed().to_string(),
        }),
        Sexp::ArrayBool(items) => join(items.iter(), |item| match item {
            Some(true) => "TRUE".to_string(),
            Some(false) => "FALSE".to_string(),
            None => "NA".dimmed().to_string(),
        }),
        Sexp::Vector(items) => {
            let rendered: Vec<String> = items.iter().map(render_text).collect();
            format!("[{}]", rendered.join(", "))
        }
        Sexp::ListTag(pairs) => pairs
            .iter()
            .map(|(key, value)| format!("{} = {}", key_label(key).cyan(), render_text(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        Sexp::Closure(bytes) => format!("<closure: {} bytes>", bytes.len())
            .dimmed()
            .to_string(),
        Sexp::Unimplemented(ty, bytes) => {
            format!("<unimplemented type {ty:#04x}: {} bytes>", bytes.len())
                .dimmed()
                .to_string()
        }
        Sexp::HasAttr { attr, value } => format!(
            "{}\n{} {}",
            render_text(value),
            "attributes:".dimmed(),
            render_text(attr)
        ),
    }
}

fn join<'a, T: 'a, I, F>(items: I, f: F) -> String
where
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> String,
{
    items.map(|item| f(item)).collect::<Vec<_>>().join(" ")
}

/// Lowers a decoded value to JSON. NA becomes `null`; so do NaN and
/// the infinities, which JSON cannot express as numbers.
pub fn to_json(value: &Sexp) -> Value {
    match value {
        Sexp::Null => Value::Null,
        Sexp::Str(s) | Sexp::SymName(s) => json!(s),
        Sexp::ArrayStr(items) => items
            .iter()
            .map(|item| item.as_ref().map_or(Value::Null, |s| json!(s)))
            .collect(),
        Sexp::ArrayInt(items) => items
            .iter()
            .map(|item| item.map_or(Value::Null, |v| json!(v)))
            .collect(),
        Sexp::ArrayDouble(items) => items
            .iter()
            .map(|item| {
                item.and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            })
            .collect(),
        Sexp::ArrayBool(items) => items
            .iter()
            .map(|item| item.map_or(Value::Null, |v| json!(v)))
            .collect(),
        Sexp::Vector(items) => items.iter().map(to_json).collect(),
        Sexp::ListTag(pairs) => {
            let mut map = Map::new();
            for (key, value) in pairs {
                map.insert(key_label(key), to_json(value));
            }
            Value::Object(map)
        }
        Sexp::Closure(bytes) => json!({ "closure_bytes": bytes.len() }),
        Sexp::Unimplemented(ty, bytes) => json!({ "type": ty, "bytes": bytes.len() }),
        Sexp::HasAttr { attr, value } => json!({
            "attributes": to_json(attr),
            "value": to_json(value),
        }),
    }
}

fn key_label(key: &Sexp) -> String {
    match key {
        Sexp::Str(s) | Sexp::SymName(s) => s.clone(),
        other => to_json(other).to_string(),
    }
}
