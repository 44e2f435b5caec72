//! Job-file parsing and reply-stream writing (spec §6/9): a job is a
//! JSON object mapping test-case ids to `{ "action": ..., "arguments": ... }`
//! records. Spec §6 is explicit about the reply *stream*'s shape: one
//! `{"id": "<id>", "reply": { … }}` object per line on stdout, in the
//! order test cases are encountered, with nothing else written to
//! stdout — so this module hands back an ordered list of `(id, reply)`
//! pairs rather than one combined JSON document, leaving the
//! line-at-a-time `println!` to `main.rs` (spec §6: "No other output
//! appears on standard output; diagnostics go to standard error").
//!
//! Preserving test-case order matters for anyone diffing a reply stream
//! against the job that produced it, which is why `Cargo.toml` turns on
//! serde_json's `preserve_order` feature — its `Map` is then backed by an
//! insertion-ordered map instead of a `BTreeMap`.

use crate::action;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use log::warn;
use serde_json::{json, Value};

/// Parse `input` as a job file and run every test case through
/// [`action::dispatch`], returning `(id, reply)` pairs in the order the
/// test cases appear in the job file. `config` supplies the ambient
/// per-run defaults (e.g. the CLI's `--timeout-ms`) that flow down to
/// every dispatched action.
///
/// A malformed job file (not JSON, missing `testcases`) is an
/// [`CoreError::Encoding`] and aborts the whole run. A test case whose
/// action fails is recorded as `{"error": "..."}` in its reply rather
/// than aborting its siblings (spec §7's propagation policy).
pub fn run_job(input: &str, config: &Config) -> CoreResult<Vec<(String, Value)>> {
    let job: Value = serde_json::from_str(input).map_err(|e| CoreError::Encoding(format!("invalid job JSON: {e}")))?;
    let testcases = job
        .get("testcases")
        .and_then(Value::as_object)
        .ok_or_else(|| CoreError::Encoding("job file is missing a \"testcases\" object".into()))?;

    Ok(testcases.iter().map(|(id, case)| (id.clone(), run_one(id, case, config))).collect())
}

/// Render `(id, reply)` pairs as the newline-delimited reply stream spec
/// §6 specifies: one `{"id", "reply"}` JSON object per line, nothing else.
pub fn render_reply_stream(responses: &[(String, Value)]) -> CoreResult<String> {
    let mut out = String::new();
    for (id, reply) in responses {
        let line = serde_json::to_string(&json!({ "id": id, "reply": reply })).map_err(|e| CoreError::Encoding(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

fn run_one(id: &str, case: &Value, config: &Config) -> Value {
    let action_name = match case.get("action").and_then(Value::as_str) {
        Some(name) => name,
        None => return json!({ "error": "test case is missing an \"action\" string" }),
    };
    let arguments = case.get("arguments").cloned().unwrap_or_else(|| json!({}));

    match action::dispatch(action_name, &arguments, config) {
        Ok(result) => result,
        Err(e) => {
            warn!("test case {id} (action \"{action_name}\") failed: {e}");
            json!({ "error": e.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_simple_gfmul_job() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        use crate::field::{self, F};

        let a = STANDARD.encode(field::field_to_block(F::new(7)));
        let b = STANDARD.encode(field::field_to_block(F::new(2)));
        let input = json!({
            "testcases": {
                "case1": { "action": "gfmul", "arguments": { "a": a, "b": b } }
            }
        })
        .to_string();

        let responses = run_job(&input, &Config::default()).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "case1");
        assert!(responses[0].1["product"].is_string());
    }

    #[test]
    fn unknown_action_reports_an_inline_error_without_failing_the_batch() {
        let input = json!({
            "testcases": {
                "bad": { "action": "not_a_real_action", "arguments": {} }
            }
        })
        .to_string();

        let responses = run_job(&input, &Config::default()).unwrap();
        assert_eq!(responses[0].1["error"].is_string(), true);
    }

    #[test]
    fn malformed_job_file_is_an_encoding_error() {
        assert!(run_job("not json at all", &Config::default()).is_err());
        assert!(run_job("{}", &Config::default()).is_err());
    }

    #[test]
    fn render_reply_stream_is_one_json_object_per_line() {
        let input = json!({
            "testcases": {
                "a": { "action": "not_a_real_action", "arguments": {} },
                "b": { "action": "not_a_real_action", "arguments": {} }
            }
        })
        .to_string();
        let responses = run_job(&input, &Config::default()).unwrap();
        let rendered = render_reply_stream(&responses).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert!(parsed["id"].is_string());
            assert!(parsed["reply"].is_object());
        }
    }
}
