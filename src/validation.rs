use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use utoipa::ToSchema;

use crate::models::result::{PingResult, Submission};

pub const DEFAULT_GAME_SLUG: &str = "overwatch-2";
pub const DEFAULT_RESULT_LIMIT: i64 = 50;
pub const MAX_RESULT_LIMIT: i64 = 100;

const MAX_RESULTS_PER_SUBMISSION: usize = 50;
const MAX_RAW_TIMES: usize = 100;
const MAX_PING_MS: f64 = 10_000.0;
const MAX_JITTER_MS: f64 = 1_000.0;
const MAX_ANONYMOUS_ID_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Checks shape, bounds and defaults for one submission. Collects every
/// failing field instead of stopping at the first so the client can repair
/// its payload in one pass.
pub fn validate_submission(body: &Value) -> Result<Submission, Vec<FieldIssue>> {
    let Some(obj) = body.as_object() else {
        return Err(vec![FieldIssue::new("body", "must be a JSON object")]);
    };

    let mut issues = Vec::new();

    let game = optional_string(obj, "game", 1, 50, DEFAULT_GAME_SLUG, &mut issues);
    let isp = optional_string(obj, "isp", 0, 200, "Unknown", &mut issues);
    let country = optional_string(obj, "country", 0, 100, "Unknown", &mut issues);
    let city = optional_string(obj, "city", 0, 100, "Unknown", &mut issues);
    let ip_hash = optional_string(obj, "ip_hash", 0, 64, "", &mut issues);
    let client_version = optional_string(obj, "client_version", 0, 20, "unknown", &mut issues);
    let anonymous_id = optional_string(obj, "anonymous_id", 0, 100, "anonymous", &mut issues);

    let mut results = Vec::new();
    match obj.get("results") {
        Some(Value::Array(entries)) => {
            if entries.is_empty() {
                issues.push(FieldIssue::new("results", "must contain at least one entry"));
            } else if entries.len() > MAX_RESULTS_PER_SUBMISSION {
                issues.push(FieldIssue::new(
                    "results",
                    format!("must contain at most {} entries", MAX_RESULTS_PER_SUBMISSION),
                ));
            } else {
                for (index, entry) in entries.iter().enumerate() {
                    if let Some(result) = validate_result_entry(index, entry, &mut issues) {
                        results.push(result);
                    }
                }
            }
        }
        Some(_) => issues.push(FieldIssue::new("results", "must be an array")),
        None => issues.push(FieldIssue::new("results", "is required")),
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(Submission {
        game,
        results,
        isp,
        country,
        city,
        ip_hash,
        client_version,
        anonymous_id,
    })
}

fn validate_result_entry(
    index: usize,
    entry: &Value,
    issues: &mut Vec<FieldIssue>,
) -> Option<PingResult> {
    let Some(obj) = entry.as_object() else {
        issues.push(FieldIssue::new(
            format!("results[{}]", index),
            "must be an object",
        ));
        return None;
    };

    let server_id = required_string(obj, index, "server_id", 1, 100, issues);
    let server_location = required_string(obj, index, "server_location", 1, 100, issues);
    let ping_avg = required_number(obj, index, "ping_avg", 0.0, MAX_PING_MS, issues);
    let ping_min = required_number(obj, index, "ping_min", 0.0, MAX_PING_MS, issues);
    let ping_max = required_number(obj, index, "ping_max", 0.0, MAX_PING_MS, issues);
    let jitter = required_number(obj, index, "jitter", 0.0, MAX_JITTER_MS, issues);
    let packet_loss = required_number(obj, index, "packet_loss", 0.0, 100.0, issues);
    let raw_times = validate_raw_times(obj, index, issues);

    Some(PingResult {
        server_id: server_id?,
        server_location: server_location?,
        ping_avg: ping_avg?,
        ping_min: ping_min?,
        ping_max: ping_max?,
        jitter: jitter?,
        packet_loss: packet_loss?,
        raw_times: raw_times?,
    })
}

fn validate_raw_times(
    obj: &Map<String, Value>,
    index: usize,
    issues: &mut Vec<FieldIssue>,
) -> Option<Vec<f64>> {
    let field = format!("results[{}].raw_times", index);

    match obj.get("raw_times") {
        Some(Value::Array(values)) => {
            if values.len() > MAX_RAW_TIMES {
                issues.push(FieldIssue::new(
                    field,
                    format!("must contain at most {} samples", MAX_RAW_TIMES),
                ));
                return None;
            }

            let mut samples = Vec::with_capacity(values.len());
            for (i, value) in values.iter().enumerate() {
                match value.as_f64() {
                    Some(sample) if (0.0..=MAX_PING_MS).contains(&sample) => samples.push(sample),
                    _ => {
                        issues.push(FieldIssue::new(
                            format!("{}[{}]", field, i),
                            format!("must be a number between 0 and {}", MAX_PING_MS),
                        ));
                        return None;
                    }
                }
            }
            Some(samples)
        }
        Some(_) => {
            issues.push(FieldIssue::new(field, "must be an array of numbers"));
            None
        }
        None => {
            issues.push(FieldIssue::new(field, "is required"));
            None
        }
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    key: &str,
    min_chars: usize,
    max_chars: usize,
    default: &str,
    issues: &mut Vec<FieldIssue>,
) -> String {
    match obj.get(key) {
        None => default.to_string(),
        Some(Value::String(value)) => {
            if check_string_bounds(key.to_string(), value, min_chars, max_chars, issues) {
                value.clone()
            } else {
                default.to_string()
            }
        }
        Some(_) => {
            issues.push(FieldIssue::new(key, "must be a string"));
            default.to_string()
        }
    }
}

fn required_string(
    obj: &Map<String, Value>,
    index: usize,
    key: &str,
    min_chars: usize,
    max_chars: usize,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    let field = format!("results[{}].{}", index, key);

    match obj.get(key) {
        Some(Value::String(value)) => {
            check_string_bounds(field, value, min_chars, max_chars, issues)
                .then(|| value.clone())
        }
        Some(_) => {
            issues.push(FieldIssue::new(field, "must be a string"));
            None
        }
        None => {
            issues.push(FieldIssue::new(field, "is required"));
            None
        }
    }
}

fn check_string_bounds(
    field: String,
    value: &str,
    min_chars: usize,
    max_chars: usize,
    issues: &mut Vec<FieldIssue>,
) -> bool {
    let chars = value.chars().count();

    if chars < min_chars {
        issues.push(FieldIssue::new(
            field,
            format!("must contain at least {} character(s)", min_chars),
        ));
        false
    } else if chars > max_chars {
        issues.push(FieldIssue::new(
            field,
            format!("must contain at most {} characters", max_chars),
        ));
        false
    } else {
        true
    }
}

fn required_number(
    obj: &Map<String, Value>,
    index: usize,
    key: &str,
    min: f64,
    max: f64,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    let field = format!("results[{}].{}", index, key);

    match obj.get(key).map(Value::as_f64) {
        Some(Some(value)) => {
            if (min..=max).contains(&value) {
                Some(value)
            } else {
                issues.push(FieldIssue::new(
                    field,
                    format!("must be between {} and {}", min, max),
                ));
                None
            }
        }
        Some(None) => {
            issues.push(FieldIssue::new(field, "must be a number"));
            None
        }
        None => {
            issues.push(FieldIssue::new(field, "is required"));
            None
        }
    }
}

/// Canonical stored-result id: lower-case hex in 8-4-4-4-12 grouping.
pub fn is_canonical_result_id(id: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("result id pattern")
    });
    re.is_match(id)
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_RESULT_LIMIT).clamp(1, MAX_RESULT_LIMIT)
}

/// Anonymous-id filters are cut to 100 characters (on a char boundary)
/// before they reach the store.
pub fn truncate_anonymous_id(id: &str) -> &str {
    match id.char_indices().nth(MAX_ANONYMOUS_ID_CHARS) {
        Some((byte_index, _)) => &id[..byte_index],
        None => id,
    }
}
