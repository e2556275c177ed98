//! # Expression Evaluation
//!
//! Query and predicate evaluation over untyped event payloads.
//!
//! - `eval_text` runs a JSONPath query and returns the text of the first
//!   matched node. jq-style paths (`.order.id`) are accepted as shorthand for
//!   `$.order.id`.
//! - `eval_bool` runs a rhai script with the payload bound as `input` and
//!   coerces the result to a predicate.
//!
//! Both compiled forms are cached per expression string in bounded, TTL-expiring
//! moka caches, so a single `ScriptEvaluator` is built at startup and shared
//! behind an `Arc`.

pub mod evaluator;

pub use evaluator::ScriptEvaluator;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("Failed to compile expression '{expression}': {message}")]
    Compile { expression: String, message: String },

    #[error("Failed to evaluate expression '{expression}': {message}")]
    Evaluation { expression: String, message: String },

    #[error("Expression '{0}' produced an empty result")]
    EmptyResult(String),
}

impl ExpressionError {
    pub fn compile(expression: &str, message: impl Into<String>) -> Self {
        Self::Compile {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    pub fn evaluation(expression: &str, message: impl Into<String>) -> Self {
        Self::Evaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    pub fn is_compile_error(&self) -> bool {
        matches!(self, Self::Compile { .. })
    }
}
