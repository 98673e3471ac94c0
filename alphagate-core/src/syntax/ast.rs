//! Tagged AST for the factor language.
//!
//! Every node carries its 1-based source line so safety violations can point
//! at real code. The walkers visit nested bodies, lambda bodies, and
//! comprehension parts — there is no place for a violation to hide.

use serde::{Deserialize, Serialize};

/// A parsed factor program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `import module` / `import module as alias`
    Import {
        module: String,
        alias: Option<String>,
    },
    /// `from module import a, b` / `from module import *`
    FromImport {
        module: String,
        names: Vec<String>,
        wildcard: bool,
    },
    /// `name = expr`
    Assign { target: String, value: Expr },
    /// A bare expression statement.
    ExprStmt { value: Expr },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    If {
        condition: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Break,
    Continue,
    Return { value: Option<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub line: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
}

impl BinOpKind {
    /// Operand order does not change the result for these.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOpKind::Add | BinOpKind::Mul | BinOpKind::And | BinOpKind::Or
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::FloorDiv => "//",
            BinOpKind::Mod => "%",
            BinOpKind::Pow => "**",
            BinOpKind::And => "and",
            BinOpKind::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOpKind {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CmpOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOpKind::Eq => "==",
            CmpOpKind::NotEq => "!=",
            CmpOpKind::Lt => "<",
            CmpOpKind::LtEq => "<=",
            CmpOpKind::Gt => ">",
            CmpOpKind::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Num(f64),
    Str(String),
    Bool(bool),
    NoneLit,
    Name(String),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    BinOp {
        op: BinOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    Compare {
        op: CmpOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
    List(Vec<Expr>),
    ListComp {
        element: Box<Expr>,
        target: String,
        iter: Box<Expr>,
        cond: Option<Box<Expr>>,
    },
}

impl Program {
    /// Visit every statement, including nested block bodies, in source order.
    pub fn walk_stmts<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        fn walk<'a>(stmts: &'a [Stmt], f: &mut impl FnMut(&'a Stmt)) {
            for stmt in stmts {
                f(stmt);
                match &stmt.kind {
                    StmtKind::While { body, .. } | StmtKind::For { body, .. } => walk(body, f),
                    StmtKind::If { body, orelse, .. } => {
                        walk(body, f);
                        walk(orelse, f);
                    }
                    _ => {}
                }
            }
        }
        walk(&self.body, f);
    }

    /// Visit every expression in the program, including those inside nested
    /// blocks, lambda bodies, and comprehensions.
    pub fn walk_exprs<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        self.walk_stmts(&mut |stmt| {
            match &stmt.kind {
                StmtKind::Assign { value, .. } | StmtKind::ExprStmt { value } => value.walk(f),
                StmtKind::While { condition, .. } | StmtKind::If { condition, .. } => {
                    condition.walk(f)
                }
                StmtKind::For { iter, .. } => iter.walk(f),
                StmtKind::Return { value: Some(v) } => v.walk(f),
                _ => {}
            }
        });
    }

    /// True when the program has no statements at all (empty or comment-only
    /// source).
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl Expr {
    /// Visit this expression and all sub-expressions, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Attribute { value, .. } => value.walk(f),
            ExprKind::Call { func, args } => {
                func.walk(f);
                for arg in args {
                    arg.walk(f);
                }
            }
            ExprKind::Subscript { value, index } => {
                value.walk(f);
                index.walk(f);
            }
            ExprKind::BinOp { left, right, .. } | ExprKind::Compare { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ExprKind::UnaryOp { operand, .. } => operand.walk(f),
            ExprKind::Lambda { body, .. } => body.walk(f),
            ExprKind::List(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            ExprKind::ListComp {
                element,
                iter,
                cond,
                ..
            } => {
                element.walk(f);
                iter.walk(f);
                if let Some(c) = cond {
                    c.walk(f);
                }
            }
            ExprKind::Num(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::NoneLit
            | ExprKind::Name(_) => {}
        }
    }

    /// Root name of a dotted chain: `a.b.c` → `a`, `f(x).g` → None.
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(n) => Some(n),
            ExprKind::Attribute { value, .. } | ExprKind::Subscript { value, .. } => {
                value.root_name()
            }
            _ => None,
        }
    }

    /// Constant truthiness, for `while True:`-style loop detection.
    /// Returns None when the condition is not a literal.
    pub fn const_truthiness(&self) -> Option<bool> {
        match &self.kind {
            ExprKind::Bool(b) => Some(*b),
            ExprKind::Num(n) => Some(*n != 0.0),
            ExprKind::Str(s) => Some(!s.is_empty()),
            ExprKind::NoneLit => Some(false),
            _ => None,
        }
    }
}

/// Does any statement in `body` (recursively) break out of the current loop?
/// `return` counts as an exit; nested loops consume their own `break`s.
pub fn body_has_loop_exit(body: &[Stmt]) -> bool {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Break | StmtKind::Return { .. } => return true,
            StmtKind::If { body, orelse, .. } => {
                if body_has_loop_exit(body) || body_has_loop_exit(orelse) {
                    return true;
                }
            }
            // A break inside a nested loop exits that loop, not this one;
            // but a return anywhere still exits.
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                if body_has_return(body) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn body_has_return(body: &[Stmt]) -> bool {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Return { .. } => return true,
            StmtKind::If { body, orelse, .. } => {
                if body_has_return(body) || body_has_return(orelse) {
                    return true;
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                if body_has_return(body) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    #[test]
    fn root_name_of_chain() {
        let program = parse("x = data.close.mean()").unwrap();
        let mut roots = Vec::new();
        program.walk_exprs(&mut |e| {
            if let ExprKind::Call { func, .. } = &e.kind {
                roots.push(func.root_name().map(str::to_owned));
            }
        });
        assert_eq!(roots, vec![Some("data".to_string())]);
    }

    #[test]
    fn walk_sees_lambda_body() {
        let program = parse("f = lambda x: evil(x)").unwrap();
        let mut saw_evil = false;
        program.walk_exprs(&mut |e| {
            if let ExprKind::Name(n) = &e.kind {
                if n == "evil" {
                    saw_evil = true;
                }
            }
        });
        assert!(saw_evil);
    }

    #[test]
    fn walk_sees_comprehension_parts() {
        let program = parse("xs = [f(i) for i in items if g(i)]").unwrap();
        let mut names = Vec::new();
        program.walk_exprs(&mut |e| {
            if let ExprKind::Name(n) = &e.kind {
                names.push(n.clone());
            }
        });
        assert!(names.contains(&"f".to_string()));
        assert!(names.contains(&"g".to_string()));
        assert!(names.contains(&"items".to_string()));
    }

    #[test]
    fn loop_exit_detection() {
        let with_break = parse("while True:\n    if x > 1:\n        break\n").unwrap();
        if let StmtKind::While { body, .. } = &with_break.body[0].kind {
            assert!(body_has_loop_exit(body));
        } else {
            panic!("expected while");
        }

        let without = parse("while True:\n    x = x + 1\n").unwrap();
        if let StmtKind::While { body, .. } = &without.body[0].kind {
            assert!(!body_has_loop_exit(body));
        } else {
            panic!("expected while");
        }
    }

    #[test]
    fn nested_loop_break_does_not_exit_outer() {
        let src = "while True:\n    while x < 3:\n        break\n";
        let program = parse(src).unwrap();
        if let StmtKind::While { body, .. } = &program.body[0].kind {
            assert!(!body_has_loop_exit(body));
        } else {
            panic!("expected while");
        }
    }

    #[test]
    fn const_truthiness() {
        let program = parse("while 1:\n    break\n").unwrap();
        if let StmtKind::While { condition, .. } = &program.body[0].kind {
            assert_eq!(condition.const_truthiness(), Some(true));
        } else {
            panic!("expected while");
        }
    }
}
