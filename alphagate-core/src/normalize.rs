//! Structural normalization — canonical forms for semantic-equivalence checks.
//!
//! Two candidates that compute the same thing under cosmetic rewrites should
//! normalize to the same form:
//! - local bindings renamed `v0`, `v1`, … in first-binding order;
//! - import aliases folded back to the module name (`import pandas as p` and
//!   `as pd` normalize identically);
//! - commutative chains (`+`, `*`, `and`, `or`) flattened and operands sorted
//!   by canonical text, so `a + b + c` and `c + (b + a)` agree;
//! - comments and whitespace disappear with parsing.
//!
//! The canonical form is an S-expression string; identity is its blake3 hash.

use serde::{Deserialize, Serialize};

use crate::syntax::{
    parse, BinOpKind, Expr, ExprKind, ParseError, Program, Stmt, StmtKind, UnaryOpKind,
};
use std::collections::BTreeMap;

/// Content hash of a canonical form (blake3, hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormHash(pub String);

impl FormHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl std::fmt::Display for FormHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 12 hex chars are plenty for log lines.
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Canonical structural form of a factor program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalForm {
    pub text: String,
}

impl NormalForm {
    pub fn hash(&self) -> FormHash {
        FormHash::from_bytes(self.text.as_bytes())
    }
}

/// Normalize source text. Parse failures propagate so callers can decide to
/// skip unparsable corpus entries.
pub fn normalize_source(code: &str) -> Result<NormalForm, ParseError> {
    Ok(normalize(&parse(code)?))
}

/// Normalize an already-parsed program.
pub fn normalize(program: &Program) -> NormalForm {
    let mut cx = Normalizer::default();
    cx.collect_aliases(program);
    let mut parts: Vec<String> = Vec::new();
    for stmt in &program.body {
        if let Some(rendered) = cx.render_stmt(stmt) {
            parts.push(rendered);
        }
    }
    // Imports contribute a sorted module set, independent of order/aliases.
    let mut modules: Vec<&String> = cx.imported_modules.keys().collect();
    modules.sort();
    let header: Vec<String> = modules.iter().map(|m| format!("(use {m})")).collect();
    let text = header
        .into_iter()
        .chain(parts)
        .collect::<Vec<_>>()
        .join(" ");
    NormalForm { text }
}

#[derive(Default)]
struct Normalizer {
    /// original binding name → canonical name (v0, v1, …).
    bindings: BTreeMap<String, String>,
    /// alias → module root (from `import X as Y`).
    aliases: BTreeMap<String, String>,
    /// module root → () for the sorted import header.
    imported_modules: BTreeMap<String, ()>,
    next_id: usize,
}

impl Normalizer {
    fn collect_aliases(&mut self, program: &Program) {
        program.walk_stmts(&mut |stmt| match &stmt.kind {
            StmtKind::Import { module, alias } => {
                let root = module.split('.').next().unwrap_or(module).to_string();
                self.imported_modules.insert(root.clone(), ());
                if let Some(alias) = alias {
                    self.aliases.insert(alias.clone(), root);
                }
            }
            StmtKind::FromImport { module, .. } => {
                let root = module.split('.').next().unwrap_or(module).to_string();
                self.imported_modules.insert(root, ());
            }
            _ => {}
        });
    }

    fn bind(&mut self, name: &str) -> String {
        if let Some(existing) = self.bindings.get(name) {
            return existing.clone();
        }
        let canonical = format!("v{}", self.next_id);
        self.next_id += 1;
        self.bindings.insert(name.to_string(), canonical.clone());
        canonical
    }

    fn resolve(&self, name: &str) -> String {
        if let Some(bound) = self.bindings.get(name) {
            return bound.clone();
        }
        if let Some(module) = self.aliases.get(name) {
            return module.clone();
        }
        name.to_string()
    }

    /// Render a statement; import statements are handled by the header.
    fn render_stmt(&mut self, stmt: &Stmt) -> Option<String> {
        match &stmt.kind {
            StmtKind::Import { .. } | StmtKind::FromImport { .. } => None,
            StmtKind::Assign { target, value } => {
                let value = self.render_expr(value);
                let target = self.bind(target);
                Some(format!("(= {target} {value})"))
            }
            StmtKind::ExprStmt { value } => Some(format!("(do {})", self.render_expr(value))),
            StmtKind::While { condition, body } => {
                let cond = self.render_expr(condition);
                let body = self.render_body(body);
                Some(format!("(while {cond} {body})"))
            }
            StmtKind::For { target, iter, body } => {
                let iter = self.render_expr(iter);
                let target = self.bind(target);
                let body = self.render_body(body);
                Some(format!("(for {target} {iter} {body})"))
            }
            StmtKind::If {
                condition,
                body,
                orelse,
            } => {
                let cond = self.render_expr(condition);
                let body = self.render_body(body);
                let orelse = self.render_body(orelse);
                Some(format!("(if {cond} {body} {orelse})"))
            }
            StmtKind::Break => Some("(break)".to_string()),
            StmtKind::Continue => Some("(continue)".to_string()),
            StmtKind::Return { value } => match value {
                Some(v) => Some(format!("(return {})", self.render_expr(v))),
                None => Some("(return)".to_string()),
            },
        }
    }

    fn render_body(&mut self, body: &[Stmt]) -> String {
        let parts: Vec<String> = body.iter().filter_map(|s| self.render_stmt(s)).collect();
        format!("[{}]", parts.join(" "))
    }

    fn render_expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            ExprKind::Str(s) => format!("{s:?}"),
            ExprKind::Bool(b) => format!("{b}"),
            ExprKind::NoneLit => "none".to_string(),
            ExprKind::Name(n) => self.resolve(n),
            ExprKind::Attribute { value, attr } => {
                format!("(. {} {attr})", self.render_expr(value))
            }
            ExprKind::Call { func, args } => {
                let func = self.render_expr(func);
                let args: Vec<String> = args.iter().map(|a| self.render_expr(a)).collect();
                format!("(call {func} {})", args.join(" "))
            }
            ExprKind::Subscript { value, index } => {
                format!(
                    "(sub {} {})",
                    self.render_expr(value),
                    self.render_expr(index)
                )
            }
            ExprKind::BinOp { op, .. } if op.is_commutative() => {
                let mut operands = Vec::new();
                flatten_chain(expr, *op, &mut operands);
                let mut rendered: Vec<String> =
                    operands.iter().map(|e| self.render_expr(e)).collect();
                rendered.sort();
                format!("({} {})", op.symbol(), rendered.join(" "))
            }
            ExprKind::BinOp { op, left, right } => {
                format!(
                    "({} {} {})",
                    op.symbol(),
                    self.render_expr(left),
                    self.render_expr(right)
                )
            }
            ExprKind::UnaryOp { op, operand } => {
                let sym = match op {
                    UnaryOpKind::Neg => "neg",
                    UnaryOpKind::Not => "not",
                };
                format!("({sym} {})", self.render_expr(operand))
            }
            ExprKind::Compare { op, left, right } => {
                format!(
                    "({} {} {})",
                    op.symbol(),
                    self.render_expr(left),
                    self.render_expr(right)
                )
            }
            ExprKind::Lambda { params, body } => {
                let params: Vec<String> = params.iter().map(|p| self.bind(p)).collect();
                format!("(lambda [{}] {})", params.join(" "), self.render_expr(body))
            }
            ExprKind::List(items) => {
                let items: Vec<String> = items.iter().map(|i| self.render_expr(i)).collect();
                format!("(list {})", items.join(" "))
            }
            ExprKind::ListComp {
                element,
                target,
                iter,
                cond,
            } => {
                let iter = self.render_expr(iter);
                let target = self.bind(target);
                let element = self.render_expr(element);
                let cond = cond
                    .as_ref()
                    .map(|c| self.render_expr(c))
                    .unwrap_or_else(|| "true".to_string());
                format!("(comp {element} {target} {iter} {cond})")
            }
        }
    }
}

/// Flatten an associative-commutative chain of `op` into its leaf operands.
fn flatten_chain<'a>(expr: &'a Expr, op: BinOpKind, out: &mut Vec<&'a Expr>) {
    match &expr.kind {
        ExprKind::BinOp {
            op: inner,
            left,
            right,
        } if *inner == op => {
            flatten_chain(left, op, out);
            flatten_chain(right, op, out);
        }
        _ => out.push(expr),
    }
}
