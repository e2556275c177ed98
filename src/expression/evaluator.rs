//! Cached JSONPath and rhai evaluation.

use super::ExpressionError;
use crate::config::ExpressionConfig;
use crate::constants::expression_defaults;
use moka::sync::Cache;
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use serde_json_path::JsonPath;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type EvalResult<T> = std::result::Result<T, ExpressionError>;

/// Shared evaluator service. Construct once and pass around as `Arc<ScriptEvaluator>`.
pub struct ScriptEvaluator {
    engine: Engine,
    query_cache: Cache<String, Arc<JsonPath>>,
    script_cache: Cache<String, Arc<AST>>,
}

impl std::fmt::Debug for ScriptEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEvaluator")
            .field("cached_queries", &self.query_cache.entry_count())
            .field("cached_scripts", &self.script_cache.entry_count())
            .finish()
    }
}

impl Default for ScriptEvaluator {
    fn default() -> Self {
        Self::new(
            expression_defaults::CACHE_MAX_CAPACITY,
            Duration::from_secs(expression_defaults::CACHE_TTL_SECONDS),
        )
    }
}

impl ScriptEvaluator {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(100_000);

        Self {
            engine,
            query_cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(time_to_live)
                .build(),
            script_cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(time_to_live)
                .build(),
        }
    }

    pub fn from_config(config: &ExpressionConfig) -> Self {
        Self::new(
            config.cache_max_capacity,
            Duration::from_secs(config.cache_ttl_seconds),
        )
    }

    /// Text of the first node matched by `expression`, or `None` when nothing
    /// (or only `null`) matches.
    ///
    /// Strings are returned as-is; numbers and booleans in their display form;
    /// objects and arrays as compact JSON.
    pub fn eval_text(&self, expression: &str, payload: &Value) -> EvalResult<Option<String>> {
        let query = self.compile_query(expression)?;
        let nodes = query.query(payload);
        let text = nodes.iter().next().and_then(|node| match node {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
                Some(node.to_string())
            }
        });
        Ok(text)
    }

    /// Like `eval_text` but an empty result is an error.
    pub fn eval_text_required(&self, expression: &str, payload: &Value) -> EvalResult<String> {
        match self.eval_text(expression, payload)? {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(ExpressionError::EmptyResult(expression.to_string())),
        }
    }

    /// Evaluate a predicate script. Booleans pass through, positive numbers
    /// are true, everything else is false.
    pub fn eval_bool(&self, script: &str, input: &Value) -> EvalResult<bool> {
        let result = self.run_script(script, input)?;

        if let Ok(b) = result.as_bool() {
            return Ok(b);
        }
        if let Ok(i) = result.as_int() {
            return Ok(i > 0);
        }
        if let Ok(f) = result.as_float() {
            return Ok(f > 0.0);
        }
        Ok(false)
    }

    /// Raw script result converted back to JSON.
    pub fn eval(&self, script: &str, input: &Value) -> EvalResult<Value> {
        let result = self.run_script(script, input)?;
        rhai::serde::from_dynamic::<Value>(&result)
            .map_err(|e| ExpressionError::evaluation(script, e.to_string()))
    }

    fn run_script(&self, script: &str, input: &Value) -> EvalResult<Dynamic> {
        let ast = self.compile_script(script)?;
        let bound = rhai::serde::to_dynamic(input)
            .map_err(|e| ExpressionError::evaluation(script, e.to_string()))?;

        let mut scope = Scope::new();
        scope.push_dynamic(expression_defaults::SCRIPT_INPUT_BINDING, bound);

        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ExpressionError::evaluation(script, e.to_string()))
    }

    fn compile_query(&self, expression: &str) -> EvalResult<Arc<JsonPath>> {
        self.query_cache
            .try_get_with(expression.to_string(), || {
                debug!(expression = %expression, "Compiling JSONPath query");
                JsonPath::parse(&normalize_path(expression))
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .map_err(|e: Arc<String>| ExpressionError::compile(expression, e.as_str()))
    }

    fn compile_script(&self, script: &str) -> EvalResult<Arc<AST>> {
        self.script_cache
            .try_get_with(script.to_string(), || {
                debug!(script = %script, "Compiling predicate script");
                self.engine
                    .compile(script)
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .map_err(|e: Arc<String>| ExpressionError::compile(script, e.as_str()))
    }

    pub fn cached_query_count(&self) -> u64 {
        self.query_cache.run_pending_tasks();
        self.query_cache.entry_count()
    }
}

/// Accept jq-style `.a.b` and `.` as shorthand for `$.a.b` and `$`.
fn normalize_path(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed == "." {
        "$".to_string()
    } else if trimmed.starts_with('.') || trimmed.starts_with('[') {
        format!("${trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eval_text_first_node() {
        let evaluator = ScriptEvaluator::default();
        let payload = json!({"order": {"id": "B-17", "lines": [3, 4], "paid": true}});

        assert_eq!(
            evaluator.eval_text("$.order.id", &payload).unwrap(),
            Some("B-17".to_string())
        );
        assert_eq!(
            evaluator.eval_text(".order.lines[0]", &payload).unwrap(),
            Some("3".to_string())
        );
        assert_eq!(
            evaluator.eval_text(".order.paid", &payload).unwrap(),
            Some("true".to_string())
        );
        assert_eq!(
            evaluator.eval_text(".order.lines", &payload).unwrap(),
            Some("[3,4]".to_string())
        );
        assert_eq!(evaluator.eval_text(".order.missing", &payload).unwrap(), None);
    }

    #[test]
    fn test_eval_text_null_is_empty() {
        let evaluator = ScriptEvaluator::default();
        assert_eq!(
            evaluator.eval_text(".status", &json!({"status": null})).unwrap(),
            None
        );
    }

    #[test]
    fn test_invalid_query_is_compile_error() {
        let evaluator = ScriptEvaluator::default();
        let err = evaluator.eval_text("invalid(((", &json!({})).unwrap_err();
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_required_text_rejects_empty() {
        let evaluator = ScriptEvaluator::default();
        let err = evaluator
            .eval_text_required(".status", &json!({"status": ""}))
            .unwrap_err();
        assert_eq!(err, ExpressionError::EmptyResult(".status".to_string()));
    }

    #[test]
    fn test_eval_bool_coercion() {
        let evaluator = ScriptEvaluator::default();
        assert!(!evaluator.eval_bool("input", &json!(0)).unwrap());
        assert!(evaluator.eval_bool("input", &json!(5)).unwrap());
        assert!(evaluator.eval_bool("input", &json!(0.5)).unwrap());
        assert!(!evaluator.eval_bool("input", &json!(-1)).unwrap());
        assert!(!evaluator.eval_bool("input", &json!("yes")).unwrap());
        assert!(evaluator
            .eval_bool(r#"input.kind == "shipment""#, &json!({"kind": "shipment"}))
            .unwrap());
    }

    #[test]
    fn test_eval_returns_json() {
        let evaluator = ScriptEvaluator::default();
        let value = evaluator.eval("input.qty * 2", &json!({"qty": 4})).unwrap();
        assert_eq!(value, json!(8));
    }

    #[test]
    fn test_script_syntax_error_is_compile_error() {
        let evaluator = ScriptEvaluator::default();
        let err = evaluator.eval_bool("input ==", &json!(1)).unwrap_err();
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_queries_are_cached() {
        let evaluator = ScriptEvaluator::default();
        let payload = json!({"a": 1});
        evaluator.eval_text(".a", &payload).unwrap();
        evaluator.eval_text(".a", &payload).unwrap();
        assert_eq!(evaluator.cached_query_count(), 1);
    }
}
