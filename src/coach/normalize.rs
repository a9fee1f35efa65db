use serde_json::{Map, Value};

use crate::types::CoachResponse;

use super::context::{route, CoachContext};

/// Upper bound on how much raw model text the fallback summary keeps.
const FALLBACK_SUMMARY_CHARS: usize = 600;

/// Turn whatever the model produced into a schema-valid response for the
/// active context. Never returns an error: prose, truncated JSON and
/// wrong shapes all repair to the deterministic fallback.
pub fn normalize(raw: &str, context: CoachContext) -> CoachResponse {
    let r = route(context);
    let stripped = strip_code_fence(raw);

    let parsed = serde_json::from_str::<Value>(stripped).ok().and_then(|v| match v {
        Value::Object(map) => Some(map),
        _ => None,
    });

    let mut response = match parsed {
        Some(map) if r.required_keys.iter().all(|k| map.contains_key(*k)) => map,
        _ => return fallback(raw, context),
    };

    // Enforce the context's action cardinality even when the model ignores it
    if let Some(Value::Array(actions)) = response.get_mut("actions") {
        actions.truncate(r.max_actions);
    }

    // The summary is rendered verbatim in the UI: no fences, no template braces
    if let Some(Value::String(summary)) = response.get_mut("summary") {
        *summary = sanitize_summary(summary);
    }

    response
}

/// Deterministic schema-valid object for when the model output is
/// unusable: the raw text (bounded, sanitized) becomes the summary and
/// every other required key gets an empty placeholder.
pub fn fallback(raw: &str, context: CoachContext) -> CoachResponse {
    let r = route(context);
    let mut summary = sanitize_summary(strip_code_fence(raw));
    if summary.chars().count() > FALLBACK_SUMMARY_CHARS {
        summary = summary.chars().take(FALLBACK_SUMMARY_CHARS).collect();
    }
    if summary.trim().is_empty() {
        summary = r.empty_data_message.to_string();
    }

    let mut map = Map::new();
    for key in r.required_keys {
        let value = match *key {
            "summary" => Value::String(summary.clone()),
            "stats" => Value::Object(Map::new()),
            _ => Value::Array(Vec::new()),
        };
        map.insert((*key).to_string(), value);
    }
    map
}

/// The fixed needs-setup response for users with no usable data yet.
pub fn empty_data_response(context: CoachContext) -> CoachResponse {
    fallback(route(context).empty_data_message, context)
}

/// The fixed safe response for any post-gate failure. The user's goals
/// and data are unaffected; they are told to retry.
pub fn error_fallback(context: CoachContext) -> CoachResponse {
    fallback(
        "Coaching is taking a moment. Your goals and data are unaffected - \
         please try again shortly.",
        context,
    )
}

/// Whether the raw model output already satisfies the context schema on
/// its own (after fence stripping). The streaming path uses this to pick
/// its terminal event: `done` for clean output, `fallback` otherwise.
pub fn parses_to_schema(raw: &str, context: CoachContext) -> bool {
    let r = route(context);
    match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(map)) => r.required_keys.iter().all(|k| map.contains_key(*k)),
        _ => false,
    }
}

/// Strip one leading/trailing markdown fence (```json ... ``` or ``` ... ```).
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn sanitize_summary(text: &str) -> String {
    text.replace("```", "")
        .replace('`', "")
        .replace("{{", "")
        .replace("}}", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL_CONTEXTS: [CoachContext; 4] = [
        CoachContext::General,
        CoachContext::PnlAnalysis,
        CoachContext::AffordabilityAnalysis,
        CoachContext::NetSheetAnalysis,
    ];

    fn assert_schema_valid(response: &CoachResponse, context: CoachContext) {
        for key in route(context).required_keys {
            assert!(response.contains_key(*key), "{:?} missing key {}", context, key);
        }
    }

    #[test]
    fn valid_json_passes_through() {
        let raw = json!({
            "summary": "Solid month.",
            "stats": {"net_income": 20000},
            "actions": ["Review marketing spend"],
            "risks": [],
            "next_inputs": ["Log July expenses"],
        })
        .to_string();

        let out = normalize(&raw, CoachContext::PnlAnalysis);
        assert_eq!(out.get("summary").unwrap(), "Solid month.");
        assert_eq!(out["stats"]["net_income"], 20000);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"summary\": \"ok\", \"stats\": {}, \"actions\": [], \
                   \"risks\": [], \"next_inputs\": []}\n```";
        let out = normalize(raw, CoachContext::General);
        assert_eq!(out.get("summary").unwrap(), "ok");
    }

    #[test]
    fn prose_repairs_to_fallback_for_every_context() {
        for ctx in ALL_CONTEXTS {
            let out = normalize("I think your business is doing fine overall.", ctx);
            assert_schema_valid(&out, ctx);
            assert!(out["summary"].as_str().unwrap().contains("doing fine"));
            assert_eq!(out["actions"], json!([]));
        }
    }

    #[test]
    fn missing_required_key_repairs_to_fallback() {
        for ctx in ALL_CONTEXTS {
            let raw = json!({"summary": "partial", "stats": {}}).to_string();
            let out = normalize(&raw, ctx);
            assert_schema_valid(&out, ctx);
            // Fallback keeps the raw text as summary, placeholders elsewhere
            assert_eq!(out["stats"], json!({}));
        }
    }

    #[test]
    fn truncated_json_repairs_to_fallback() {
        let out = normalize("{\"summary\": \"cut off mid", CoachContext::General);
        assert_schema_valid(&out, CoachContext::General);
    }

    #[test]
    fn actions_are_capped_per_context() {
        let raw = json!({
            "summary": "s",
            "stats": {},
            "actions": ["a", "b", "c", "d", "e", "f"],
            "risks": [],
            "next_inputs": [],
        })
        .to_string();

        let general = normalize(&raw, CoachContext::General);
        assert_eq!(general["actions"].as_array().unwrap().len(), 3);

        let pnl = normalize(&raw, CoachContext::PnlAnalysis);
        assert_eq!(pnl["actions"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn summary_never_carries_fences_or_braces() {
        let raw = json!({
            "summary": "Use the ```template``` with {{placeholders}} carefully",
            "stats": {},
            "actions": [],
            "risks": [],
            "next_inputs": [],
        })
        .to_string();

        let out = normalize(&raw, CoachContext::General);
        let summary = out["summary"].as_str().unwrap();
        assert!(!summary.contains("```"));
        assert!(!summary.contains('`'));
        assert!(!summary.contains("{{"));
    }

    #[test]
    fn fallback_summary_is_bounded() {
        let long = "x".repeat(5000);
        let out = normalize(&long, CoachContext::General);
        assert!(out["summary"].as_str().unwrap().chars().count() <= FALLBACK_SUMMARY_CHARS);
    }

    #[test]
    fn empty_model_output_uses_empty_data_message() {
        let out = normalize("", CoachContext::NetSheetAnalysis);
        assert_schema_valid(&out, CoachContext::NetSheetAnalysis);
        assert!(!out["summary"].as_str().unwrap().is_empty());
    }

    #[test]
    fn error_fallback_is_schema_valid_everywhere() {
        for ctx in ALL_CONTEXTS {
            let out = error_fallback(ctx);
            assert_schema_valid(&out, ctx);
            assert!(out["summary"].as_str().unwrap().contains("try again"));
        }
    }
}
