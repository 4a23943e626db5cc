//! Expression-based report validation.
//!
//! A rule is a named boolean expression with a failure message. Inline rules
//! come before file rules, both auto-numbered when unnamed, and evaluation is
//! strictly in declaration order with a fail-fast stop at the first rule that
//! does not hold.

pub mod eval;
pub mod expr;

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::backoff::Backoff;
use crate::report::{ReportId, ReportSection};

pub use eval::{Bindings, EvalError, BUILTIN_FUNCTIONS};
pub use expr::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expression: String,
    pub message: String,
}

/// Rule file entry: `exp` is required, `name` and `msg` are auto-filled.
#[derive(Debug, Deserialize)]
struct RuleEntry {
    #[serde(default)]
    name: Option<String>,
    exp: String,
    #[serde(default)]
    msg: Option<String>,
}

impl Rule {
    /// Build rules from `--rule` arguments, in argument order.
    pub fn from_inline(expressions: &[String]) -> Vec<Rule> {
        expressions
            .iter()
            .enumerate()
            .map(|(idx, expression)| {
                let number = idx + 1;
                Rule {
                    name: format!("Inline rule #{number}"),
                    message: format!("Inline rule #{number} failed: \"{expression}\""),
                    expression: expression.clone(),
                }
            })
            .collect()
    }

    /// Load rules from a JSON file (an array of `{name?, exp, msg?}`).
    pub fn from_file(path: &Path) -> Result<Vec<Rule>, RuleLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                RuleLoadError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                RuleLoadError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let entries: Vec<RuleEntry> =
            serde_json::from_str(&contents).map_err(|source| RuleLoadError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                let number = idx + 1;
                let message = entry
                    .msg
                    .unwrap_or_else(|| format!("File rule #{number} failed: \"{}\"", entry.exp));
                Rule {
                    name: entry
                        .name
                        .unwrap_or_else(|| format!("File rule #{number}")),
                    expression: entry.exp,
                    message,
                }
            })
            .collect())
    }
}

#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("File \"{}\" could not be found", .path.display())]
    NotFound { path: PathBuf },

    #[error("File \"{}\" is not readable: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("File \"{}\" is not a valid rule file: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum LintError {
    #[error("rule \"{rule}\": {source}")]
    Syntax { rule: String, source: SyntaxError },

    #[error("rule \"{rule}\": unknown variable \"{name}\"")]
    UnknownVariable { rule: String, name: String },

    #[error("rule \"{rule}\": unknown function \"{name}\"")]
    UnknownFunction { rule: String, name: String },
}

/// Check every rule for syntax and unknown names, first error wins.
///
/// Never fetches anything and never evaluates truthiness.
pub fn lint(rules: &[Rule], allowed_variables: &[&str]) -> Result<(), LintError> {
    for rule in rules {
        debug!(rule = %rule.name, "linting rule");
        let parsed = expr::parse(&rule.expression).map_err(|source| LintError::Syntax {
            rule: rule.name.clone(),
            source,
        })?;

        for name in expr::variables(&parsed) {
            if !allowed_variables.contains(&name) {
                return Err(LintError::UnknownVariable {
                    rule: rule.name.clone(),
                    name: name.to_string(),
                });
            }
        }
        for name in expr::functions(&parsed) {
            if !BUILTIN_FUNCTIONS.contains(&name) {
                return Err(LintError::UnknownFunction {
                    rule: rule.name.clone(),
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("No rules available to be evaluated")]
    NoRules,

    #[error("Failed to retrieve \"{section}\" ({source})")]
    Fetch {
        section: ReportSection,
        source: ApiError,
    },

    #[error("rule \"{rule}\": {source}")]
    Syntax { rule: String, source: SyntaxError },

    #[error("rule \"{rule}\" could not be evaluated: {source}")]
    Eval { rule: String, source: EvalError },

    #[error("rule \"{rule}\" did not evaluate to a boolean")]
    NotBoolean { rule: String },

    /// The documented negative outcome: a rule held `false`.
    #[error("{message}")]
    RuleFailed { rule: String, message: String },
}

/// Fetches the report sections and evaluates rules against them.
pub struct Validator<'a> {
    api: &'a ApiClient,
    backoff: Backoff,
}

impl<'a> Validator<'a> {
    pub fn new(api: &'a ApiClient, backoff: Backoff) -> Self {
        Self { api, backoff }
    }

    /// Retrieve all four sections, bind them, and evaluate rules in order.
    pub async fn run(&self, id: &ReportId, rules: &[Rule]) -> Result<(), ValidateError> {
        if rules.is_empty() {
            return Err(ValidateError::NoRules);
        }

        // The sections are independent; fetch them concurrently, each with
        // its own retry budget. The first terminal failure aborts the rest.
        let fetches = ReportSection::ALL.iter().map(|&section| async move {
            self.api
                .fetch_section(id, section, &self.backoff)
                .await
                .map(|data| (section, data))
                .map_err(|source| ValidateError::Fetch { section, source })
        });
        let sections = futures::future::try_join_all(fetches).await?;

        let bindings: Bindings = sections
            .into_iter()
            .map(|(section, data)| (section.as_str().to_string(), data))
            .collect();

        evaluate_rules(rules, &bindings)
    }
}

/// Evaluate rules against already-bound section data, fail-fast.
///
/// Split out of `Validator::run` so ordering semantics are testable without
/// a server.
pub fn evaluate_rules(rules: &[Rule], bindings: &Bindings) -> Result<(), ValidateError> {
    for rule in rules {
        debug!(rule = %rule.name, "evaluating rule");
        let parsed = expr::parse(&rule.expression).map_err(|source| ValidateError::Syntax {
            rule: rule.name.clone(),
            source,
        })?;
        match eval::evaluate(&parsed, bindings) {
            Ok(Value::Bool(true)) => {}
            Ok(Value::Bool(false)) => {
                return Err(ValidateError::RuleFailed {
                    rule: rule.name.clone(),
                    message: rule.message.clone(),
                });
            }
            Ok(_) => {
                return Err(ValidateError::NotBoolean {
                    rule: rule.name.clone(),
                });
            }
            Err(source) => {
                return Err(ValidateError::Eval {
                    rule: rule.name.clone(),
                    source,
                });
            }
        }
    }
    Ok(())
}
