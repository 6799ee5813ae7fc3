//! Recovery of structured records from free-form generated text.
//!
//! Each normalizer tries, in order: the whole trimmed text as JSON, then the
//! slice from the first `{` to the last `}`, then a step-specific fallback.
//! Every candidate is checked against a JSON Schema envelope before it is
//! mapped into a typed record. Normalizers never fail; they report how the
//! value was obtained and the notes produced along the way.

use std::collections::HashSet;
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};

use crate::core::state::excerpt;
use crate::core::types::{
    GeneratedFile, GeneratedFileSet, Intent, PlannerOutput, RouteOutput, Task,
};

const PLANNER_SCHEMA: &str = include_str!("../../schemas/planner.schema.json");
const FILE_SET_SCHEMA: &str = include_str!("../../schemas/file_set.schema.json");
const ROUTE_SCHEMA: &str = include_str!("../../schemas/route.schema.json");

/// Maximum number of tasks kept from a plan.
pub const MAX_TASKS: usize = 6;

/// Field aliases accepted for planner tasks (version 1).
///
/// The first alias present wins.
pub const TASK_ALIASES_V1: TaskAliases = TaskAliases {
    id: &["id", "task_id"],
    title: &["title", "task_desc", "description"],
};

#[derive(Debug, Clone, Copy)]
pub struct TaskAliases {
    pub id: &'static [&'static str],
    pub title: &'static [&'static str],
}

static PLANNER_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| compile_schema(PLANNER_SCHEMA, "planner"));
static FILE_SET_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| compile_schema(FILE_SET_SCHEMA, "file set"));
static ROUTE_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| compile_schema(ROUTE_SCHEMA, "route"));

fn compile_schema(raw: &str, label: &str) -> Validator {
    let schema: Value = serde_json::from_str(raw)
        .unwrap_or_else(|err| panic!("{label} schema should be valid json: {err}"));
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .unwrap_or_else(|err| panic!("{label} schema should compile: {err}"))
}

/// How a normalized value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The whole response parsed and validated.
    Direct,
    /// A `{...}` slice of the response parsed and validated.
    Extracted,
    /// Nothing usable was found; the step fallback was used.
    Fallback,
}

impl Recovery {
    pub fn as_str(self) -> &'static str {
        match self {
            Recovery::Direct => "direct",
            Recovery::Extracted => "extracted",
            Recovery::Fallback => "fallback",
        }
    }
}

/// A recovered value plus the log lines describing how it was recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub recovery: Recovery,
    pub notes: Vec<String>,
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end >= start {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Remove one surrounding markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. `markdown`) on the opening fence line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Shared layered recovery.
///
/// `map` turns a schema-valid value into the record, or explains why it could
/// not; it may push notes about dropped or repaired entries.
fn normalize_with<T>(
    raw: &str,
    label: &str,
    validator: &Validator,
    excerpt_chars: usize,
    mut map: impl FnMut(Value, &mut Vec<String>) -> Result<T, String>,
    fallback: impl FnOnce() -> T,
) -> Normalized<T> {
    let mut notes = Vec::new();
    let trimmed = raw.trim();

    let mut try_candidate = |text: &str, stage: Recovery, notes: &mut Vec<String>| -> Option<T> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                notes.push(format!("{label}: {} parse failed: {err}", stage.as_str()));
                return None;
            }
        };
        let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            notes.push(format!(
                "{label}: {} candidate rejected by schema: {}",
                stage.as_str(),
                errors.join("; ")
            ));
            return None;
        }
        match map(value, notes) {
            Ok(record) => Some(record),
            Err(reason) => {
                notes.push(format!(
                    "{label}: {} candidate unusable: {reason}",
                    stage.as_str()
                ));
                None
            }
        }
    };

    if let Some(value) = try_candidate(trimmed, Recovery::Direct, &mut notes) {
        notes.push(format!("{label}: parsed response directly"));
        return Normalized {
            value,
            recovery: Recovery::Direct,
            notes,
        };
    }

    match extract_json_block(trimmed) {
        Some(block) => {
            if let Some(value) = try_candidate(block, Recovery::Extracted, &mut notes) {
                notes.push(format!("{label}: recovered JSON block from response"));
                return Normalized {
                    value,
                    recovery: Recovery::Extracted,
                    notes,
                };
            }
        }
        None => notes.push(format!("{label}: no JSON block found")),
    }

    notes.push(format!(
        "{label}: using fallback; raw response: {}",
        excerpt(trimmed, excerpt_chars)
    ));
    Normalized {
        value: fallback(),
        recovery: Recovery::Fallback,
        notes,
    }
}

/// Deterministic plan used when the planner response is unusable.
pub fn fallback_plan(request: &str) -> PlannerOutput {
    PlannerOutput {
        prd_md: format!(
            "# PRD\n\nRequest: {request}\n\n## Goal\nImplement the requested feature.\n\n\
             ## Acceptance Criteria\n- Feature implemented\n- Tests pass\n- Code follows standards\n"
        ),
        tasks: vec![
            Task::new("task1", "Implement feature"),
            Task::new("task2", "Add tests"),
            Task::new("task3", "Update documentation"),
        ],
    }
}

/// Recover `{prd_md, tasks}` from a planner response.
pub fn normalize_plan(raw: &str, request: &str, excerpt_chars: usize) -> Normalized<PlannerOutput> {
    normalize_with(
        raw,
        "planner",
        &PLANNER_VALIDATOR,
        excerpt_chars,
        |value, notes| map_plan(value, TASK_ALIASES_V1, notes),
        || fallback_plan(request),
    )
}

fn map_plan(
    value: Value,
    aliases: TaskAliases,
    notes: &mut Vec<String>,
) -> Result<PlannerOutput, String> {
    let Value::Object(mut obj) = value else {
        return Err("not an object".to_string());
    };
    let prd_md = match obj.remove("prd_md") {
        Some(Value::String(text)) if !text.trim().is_empty() => text,
        _ => return Err("empty prd_md".to_string()),
    };
    let entries = match obj.remove("tasks") {
        Some(Value::Array(entries)) => entries,
        _ => return Err("tasks is not an array".to_string()),
    };
    let tasks = map_tasks(entries, aliases, notes);
    if tasks.is_empty() {
        return Err("no usable tasks".to_string());
    }
    Ok(PlannerOutput { prd_md, tasks })
}

/// Map raw task entries through the alias table, synthesizing missing or
/// duplicate ids from position.
pub fn map_tasks(entries: Vec<Value>, aliases: TaskAliases, notes: &mut Vec<String>) -> Vec<Task> {
    let mut pending: Vec<(Option<String>, String)> = Vec::new();
    for (idx, entry) in entries.into_iter().enumerate() {
        let Value::Object(fields) = entry else {
            notes.push(format!("planner: dropped task #{} (not an object)", idx + 1));
            continue;
        };
        let Some(title) = first_text(&fields, aliases.title) else {
            notes.push(format!("planner: dropped task #{} (no title)", idx + 1));
            continue;
        };
        pending.push((first_text(&fields, aliases.id), title));
    }

    if pending.len() > MAX_TASKS {
        notes.push(format!(
            "planner: kept first {MAX_TASKS} of {} tasks",
            pending.len()
        ));
        pending.truncate(MAX_TASKS);
    }

    let explicit: HashSet<String> = pending.iter().filter_map(|(id, _)| id.clone()).collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut tasks = Vec::with_capacity(pending.len());
    for (position, (id, title)) in pending.into_iter().enumerate() {
        let id = match id {
            Some(id) if used.insert(id.clone()) => id,
            other => {
                let synthesized = synthesize_id(position + 1, &used, &explicit);
                used.insert(synthesized.clone());
                match other {
                    Some(dup) => notes.push(format!(
                        "planner: duplicate task id '{dup}' replaced with '{synthesized}'"
                    )),
                    None => notes.push(format!("planner: synthesized task id '{synthesized}'")),
                }
                synthesized
            }
        };
        tasks.push(Task { id, title });
    }
    tasks
}

fn synthesize_id(position: usize, used: &HashSet<String>, explicit: &HashSet<String>) -> String {
    let base = format!("task{position}");
    let taken = |candidate: &str| used.contains(candidate) || explicit.contains(candidate);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|suffix| format!("{base}-{suffix}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

/// First alias with a non-empty string or numeric value.
fn first_text(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match fields.get(*name)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Recover a `GeneratedFileSet` from a developer response.
pub fn normalize_file_set(
    raw: &str,
    excerpt_chars: usize,
    fallback: impl FnOnce() -> GeneratedFileSet,
) -> Normalized<GeneratedFileSet> {
    normalize_with(
        raw,
        "developer",
        &FILE_SET_VALIDATOR,
        excerpt_chars,
        map_file_set,
        fallback,
    )
}

fn map_file_set(value: Value, notes: &mut Vec<String>) -> Result<GeneratedFileSet, String> {
    let Value::Object(mut obj) = value else {
        return Err("not an object".to_string());
    };
    let entries = match obj.remove("files") {
        Some(Value::Array(entries)) => entries,
        _ => return Err("files is not an array".to_string()),
    };
    let summary = match obj.remove("summary") {
        Some(Value::String(summary)) => summary,
        _ => String::new(),
    };

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(mut fields) = entry else {
            notes.push("developer: dropped file entry (not an object)".to_string());
            continue;
        };
        let path = match fields.remove("path") {
            Some(Value::String(path)) if !path.trim().is_empty() => path.trim().to_string(),
            _ => {
                notes.push("developer: dropped file entry (missing path)".to_string());
                continue;
            }
        };
        let content = fields.remove("content").unwrap_or(Value::Null);
        match coerce_content(&path, content) {
            Ok((content, repaired)) => {
                if repaired {
                    notes.push(format!("developer: coerced structured content for {path}"));
                }
                files.push(GeneratedFile { path, content });
            }
            Err(kind) => {
                notes.push(format!("developer: dropped {path} (content was {kind})"));
            }
        }
    }
    if files.is_empty() {
        return Err("no usable files".to_string());
    }
    Ok(GeneratedFileSet { files, summary })
}

/// Turn a decoded `content` value into text.
///
/// Returns the text and whether a repair was needed, or the JSON kind of a
/// value that cannot be coerced.
pub fn coerce_content(path: &str, content: Value) -> Result<(String, bool), &'static str> {
    match content {
        Value::String(text) => Ok((text, false)),
        structured @ (Value::Object(_) | Value::Array(_))
            if path.to_ascii_lowercase().ends_with(".json") =>
        {
            let mut text = serde_json::to_string_pretty(&structured).map_err(|_| "unprintable")?;
            text.push('\n');
            Ok((text, true))
        }
        Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, Value::String(text))) => Ok((text, true)),
            _ => Err("object"),
        },
        Value::Null => Err("null"),
        Value::Bool(_) => Err("bool"),
        Value::Number(_) => Err("number"),
        Value::Array(_) => Err("array"),
        Value::Object(_) => Err("object"),
    }
}

/// Recover a routing decision; unknown intents become `help`.
pub fn normalize_route(raw: &str, excerpt_chars: usize) -> Normalized<RouteOutput> {
    normalize_with(
        raw,
        "router",
        &ROUTE_VALIDATOR,
        excerpt_chars,
        map_route,
        || RouteOutput {
            intent: Intent::Help,
            args: Map::new(),
        },
    )
}

fn map_route(value: Value, notes: &mut Vec<String>) -> Result<RouteOutput, String> {
    let Value::Object(mut obj) = value else {
        return Err("not an object".to_string());
    };
    let raw_intent = match obj.remove("intent") {
        Some(Value::String(intent)) => intent,
        _ => return Err("intent is not a string".to_string()),
    };
    let intent = Intent::parse(&raw_intent).unwrap_or_else(|| {
        notes.push(format!("router: unknown intent '{raw_intent}' coerced to help"));
        Intent::Help
    });
    let args = match obj.remove("args") {
        Some(Value::Object(args)) => args,
        _ => Map::new(),
    };
    Ok(RouteOutput { intent, args })
}
