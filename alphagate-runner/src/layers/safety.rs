//! Layer 1: code safety.
//!
//! Parses the candidate and statically screens the whole AST: imports against
//! the module allowlist/denylist, calls and references against the forbidden
//! builtins, and attribute access against the dunder policy. All findings are
//! collected so the rejection message names every problem at once, not just
//! the first.

use alphagate_core::syntax::{ExprKind, StmtKind};
use alphagate_core::{parse, Candidate};

use crate::layers::{LayerContext, LayerOutcome, ValidationLayer};
use crate::violation::Violation;

#[derive(Debug, Default)]
pub struct CodeSafetyLayer;

impl ValidationLayer for CodeSafetyLayer {
    fn name(&self) -> &'static str {
        "CodeSafety"
    }

    fn validate(&self, candidate: &Candidate, ctx: &mut LayerContext<'_>) -> LayerOutcome {
        let program = match parse(&candidate.code) {
            Ok(program) => program,
            Err(err) => {
                return LayerOutcome::fail(Violation::Syntax {
                    message: err.to_string(),
                })
            }
        };

        if program.is_empty() {
            return LayerOutcome::fail(Violation::Syntax {
                message: "empty program: no statements to validate".to_string(),
            });
        }

        let policy = ctx.policy;
        let mut findings: Vec<Violation> = Vec::new();

        program.walk_stmts(&mut |stmt| match &stmt.kind {
            StmtKind::Import { module, .. } => {
                if policy.is_module_forbidden(module) {
                    findings.push(Violation::Import {
                        message: format!(
                            "line {}: dangerous module '{}' is explicitly forbidden",
                            stmt.line, module
                        ),
                    });
                } else if !policy.is_module_allowed(module) {
                    findings.push(Violation::Import {
                        message: format!(
                            "line {}: module '{}' is not on the allowlist",
                            stmt.line, module
                        ),
                    });
                }
            }
            StmtKind::FromImport {
                module,
                names,
                wildcard,
            } => {
                if policy.is_module_forbidden(module) {
                    findings.push(Violation::Import {
                        message: format!(
                            "line {}: dangerous module '{}' is explicitly forbidden",
                            stmt.line, module
                        ),
                    });
                } else if !policy.is_module_allowed(module) {
                    findings.push(Violation::Import {
                        message: format!(
                            "line {}: module '{}' is not on the allowlist",
                            stmt.line, module
                        ),
                    });
                } else if *wildcard {
                    findings.push(Violation::Import {
                        message: format!(
                            "line {}: wildcard import from '{}' is not allowed",
                            stmt.line, module
                        ),
                    });
                } else {
                    for name in names {
                        if !policy.is_attr_importable(module, name) {
                            findings.push(Violation::Import {
                                message: format!(
                                    "line {}: '{}' cannot be imported from '{}'",
                                    stmt.line, name, module
                                ),
                            });
                        }
                    }
                }
            }
            _ => {}
        });

        program.walk_exprs(&mut |expr| match &expr.kind {
            ExprKind::Name(name) => {
                if policy.is_forbidden_builtin(name) {
                    findings.push(Violation::Builtin {
                        message: format!("line {}: builtin '{}' is forbidden", expr.line, name),
                    });
                }
            }
            ExprKind::Attribute { attr, .. } => {
                if !policy.is_attr_access_allowed(attr) {
                    findings.push(Violation::Attribute {
                        message: format!(
                            "line {}: access to attribute '{}' is blocked",
                            expr.line, attr
                        ),
                    });
                }
            }
            _ => {}
        });

        if let Some(first) = findings.first() {
            let joined = findings
                .iter()
                .map(describe)
                .collect::<Vec<_>>()
                .join("; ");
            return LayerOutcome::fail(rebuild(first, joined));
        }

        ctx.program = Some(program);
        LayerOutcome::pass()
    }
}

fn describe(v: &Violation) -> &str {
    match v {
        Violation::Import { message }
        | Violation::Builtin { message }
        | Violation::Attribute { message } => message,
        _ => "",
    }
}

// The first finding picks the variant; the message carries every finding.
fn rebuild(first: &Violation, joined: String) -> Violation {
    match first {
        Violation::Import { .. } => Violation::Import { message: joined },
        Violation::Builtin { .. } => Violation::Builtin { message: joined },
        _ => Violation::Attribute { message: joined },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests_support::context_parts;

    fn run(code: &str) -> (LayerOutcome, Option<alphagate_core::Program>) {
        let (policy, config, thresholds, corpus, frame, engine) = context_parts();
        let mut ctx = LayerContext {
            policy: &policy,
            config: &config,
            thresholds,
            corpus: &corpus,
            frame: &frame,
            engine: &engine,
            program: None,
        };
        let candidate = Candidate::new(code, "trailing momentum over twenty days");
        let outcome = CodeSafetyLayer.validate(&candidate, &mut ctx);
        (outcome, ctx.program)
    }

    #[test]
    fn clean_factor_passes_and_parses() {
        let (outcome, program) = run("import pandas as pd\nsignal = data[\"close\"].pct_change(20)");
        assert!(outcome.passed);
        assert!(program.is_some());
    }

    #[test]
    fn forbidden_import_names_the_module() {
        let (outcome, program) = run("import os\nsignal = data[\"close\"]");
        assert!(!outcome.passed);
        let v = outcome.violation.unwrap();
        assert!(matches!(v, Violation::Import { .. }));
        assert!(v.to_string().contains("'os'"));
        assert!(program.is_none());
    }

    #[test]
    fn unknown_module_is_rejected_too() {
        let (outcome, _) = run("import scipy\nsignal = data[\"close\"]");
        let v = outcome.violation.unwrap();
        assert!(v.to_string().contains("allowlist"));
    }

    #[test]
    fn forbidden_builtin_call() {
        let (outcome, _) = run("signal = eval(\"data\")");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::Builtin { .. }
        ));
    }

    #[test]
    fn dunder_attribute_is_blocked() {
        let (outcome, _) = run("x = data.__dict__");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::Attribute { .. }
        ));
    }

    #[test]
    fn forbidden_builtin_inside_lambda_is_found() {
        let (outcome, _) = run("f = lambda x: exec(x)\nsignal = data[\"close\"]");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::Builtin { .. }
        ));
    }

    #[test]
    fn multiple_findings_are_all_reported() {
        let (outcome, _) = run("import os\nimport subprocess\nsignal = data[\"close\"]");
        let text = outcome.violation.unwrap().to_string();
        assert!(text.contains("'os'"));
        assert!(text.contains("'subprocess'"));
    }

    #[test]
    fn syntax_error_is_terminal() {
        let (outcome, _) = run("signal = = close");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::Syntax { .. }
        ));
    }

    #[test]
    fn empty_source_is_a_syntax_violation() {
        let (outcome, _) = run("# just a comment\n");
        assert!(matches!(
            outcome.violation.unwrap(),
            Violation::Syntax { .. }
        ));
    }
}
