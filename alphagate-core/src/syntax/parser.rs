//! Recursive-descent parser for the factor language.
//!
//! Grammar is a small Python subset: imports, assignments, expression
//! statements, `while`/`for`/`if` blocks (indentation-delimited), `break`/
//! `continue`/`return`, and an expression grammar with calls, attributes,
//! subscripts, lambdas, list literals, and single-generator comprehensions.
//!
//! Function definitions (`def`) are deliberately rejected: generated factors
//! are straight-line signal pipelines, and a `def` is almost always an
//! attempt to smuggle in machinery the gate cannot see through.

use thiserror::Error;

use super::ast::{BinOpKind, CmpOpKind, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOpKind};
use super::lexer::{tokenize, LexError, Tok, Token};

/// Parse failures. All carry the offending line.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected {
        line: u32,
        expected: &'static str,
        found: String,
    },
    #[error("line {line}: function definitions are not supported in factor code")]
    DefNotSupported { line: u32 },
    #[error("line {line}: invalid assignment target")]
    BadAssignTarget { line: u32 },
}

/// Parse source text into a `Program`.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.parse_block_body(true)?;
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &Tok) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &Tok) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: Tok, expected: &'static str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let tok = self.peek();
        ParseError::Unexpected {
            line: tok.line,
            expected,
            found: format!("{:?}", tok.kind),
        }
    }

    fn expect_name(&mut self, expected: &'static str) -> Result<(String, u32), ParseError> {
        match self.peek().kind.clone() {
            Tok::Name(n) => {
                let line = self.advance().line;
                Ok((n, line))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    /// Parse statements until EOF (top level) or a Dedent (block body).
    fn parse_block_body(&mut self, top_level: bool) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        loop {
            match &self.peek().kind {
                Tok::EndOfFile => {
                    if top_level {
                        return Ok(body);
                    }
                    return Ok(body);
                }
                Tok::Dedent => {
                    if !top_level {
                        self.advance();
                        return Ok(body);
                    }
                    // Stray dedent at top level: skip.
                    self.advance();
                }
                Tok::Newline => {
                    self.advance();
                }
                _ => body.push(self.parse_stmt()?),
            }
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().line;
        let stmt = match &self.peek().kind {
            Tok::KwImport => self.parse_import()?,
            Tok::KwFrom => self.parse_from_import()?,
            Tok::KwWhile => return self.parse_while(),
            Tok::KwFor => return self.parse_for(),
            Tok::KwIf => return self.parse_if(),
            Tok::KwDef => return Err(ParseError::DefNotSupported { line }),
            Tok::KwBreak => {
                self.advance();
                Stmt {
                    line,
                    kind: StmtKind::Break,
                }
            }
            Tok::KwContinue => {
                self.advance();
                Stmt {
                    line,
                    kind: StmtKind::Continue,
                }
            }
            Tok::KwReturn => {
                self.advance();
                let value = if matches!(self.peek().kind, Tok::Newline | Tok::EndOfFile) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Stmt {
                    line,
                    kind: StmtKind::Return { value },
                }
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.eat(&Tok::Assign) {
                    let target = match expr.kind {
                        ExprKind::Name(n) => n,
                        _ => return Err(ParseError::BadAssignTarget { line }),
                    };
                    let value = self.parse_expr()?;
                    Stmt {
                        line,
                        kind: StmtKind::Assign { target, value },
                    }
                } else {
                    Stmt {
                        line,
                        kind: StmtKind::ExprStmt { value: expr },
                    }
                }
            }
        };
        self.end_of_stmt()?;
        Ok(stmt)
    }

    fn end_of_stmt(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek().kind, Tok::Newline) {
            self.advance();
            Ok(())
        } else if matches!(self.peek().kind, Tok::EndOfFile | Tok::Dedent) {
            Ok(())
        } else {
            Err(self.unexpected("end of statement"))
        }
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line; // `import`
        let module = self.parse_dotted_name()?;
        let alias = if self.eat(&Tok::KwAs) {
            Some(self.expect_name("alias name")?.0)
        } else {
            None
        };
        Ok(Stmt {
            line,
            kind: StmtKind::Import { module, alias },
        })
    }

    fn parse_from_import(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line; // `from`
        let module = self.parse_dotted_name()?;
        self.expect(Tok::KwImport, "`import`")?;
        if self.eat(&Tok::Star) {
            return Ok(Stmt {
                line,
                kind: StmtKind::FromImport {
                    module,
                    names: Vec::new(),
                    wildcard: true,
                },
            });
        }
        let mut names = vec![self.expect_name("imported name")?.0];
        // `as` aliases are allowed but the original name is what gets checked.
        if self.eat(&Tok::KwAs) {
            self.expect_name("alias name")?;
        }
        while self.eat(&Tok::Comma) {
            names.push(self.expect_name("imported name")?.0);
            if self.eat(&Tok::KwAs) {
                self.expect_name("alias name")?;
            }
        }
        Ok(Stmt {
            line,
            kind: StmtKind::FromImport {
                module,
                names,
                wildcard: false,
            },
        })
    }

    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let (mut name, _) = self.expect_name("module name")?;
        while self.eat(&Tok::Dot) {
            let (part, _) = self.expect_name("module name")?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    fn parse_suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(Tok::Colon, "`:`")?;
        self.expect(Tok::Newline, "newline")?;
        self.expect(Tok::Indent, "indented block")?;
        self.parse_block_body(false)
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line; // `while`
        let condition = self.parse_expr()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            line,
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line; // `for`
        let (target, _) = self.expect_name("loop variable")?;
        self.expect(Tok::KwIn, "`in`")?;
        let iter = self.parse_expr()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            line,
            kind: StmtKind::For { target, iter, body },
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let line = self.advance().line; // `if` / `elif`
        let condition = self.parse_expr()?;
        let body = self.parse_suite()?;
        let orelse = if self.check(&Tok::KwElif) {
            vec![self.parse_if()?]
        } else if self.eat(&Tok::KwElse) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            line,
            kind: StmtKind::If {
                condition,
                body,
                orelse,
            },
        })
    }

    // ── Expressions (precedence climbing) ────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Tok::KwLambda) {
            return self.parse_lambda();
        }
        self.parse_or()
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let line = self.advance().line; // `lambda`
        let mut params = Vec::new();
        if !self.check(&Tok::Colon) {
            params.push(self.expect_name("parameter name")?.0);
            while self.eat(&Tok::Comma) {
                params.push(self.expect_name("parameter name")?.0);
            }
        }
        self.expect(Tok::Colon, "`:`")?;
        let body = Box::new(self.parse_expr()?);
        Ok(Expr {
            line,
            kind: ExprKind::Lambda { params, body },
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&Tok::KwOr) {
            let line = self.advance().line;
            let right = self.parse_and()?;
            left = Expr {
                line,
                kind: ExprKind::BinOp {
                    op: BinOpKind::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.check(&Tok::KwAnd) {
            let line = self.advance().line;
            let right = self.parse_not()?;
            left = Expr {
                line,
                kind: ExprKind::BinOp {
                    op: BinOpKind::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Tok::KwNot) {
            let line = self.advance().line;
            let operand = Box::new(self.parse_not()?);
            return Ok(Expr {
                line,
                kind: ExprKind::UnaryOp {
                    op: UnaryOpKind::Not,
                    operand,
                },
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek().kind {
            Tok::EqEq => CmpOpKind::Eq,
            Tok::NotEq => CmpOpKind::NotEq,
            Tok::Lt => CmpOpKind::Lt,
            Tok::LtEq => CmpOpKind::LtEq,
            Tok::Gt => CmpOpKind::Gt,
            Tok::GtEq => CmpOpKind::GtEq,
            _ => return Ok(left),
        };
        let line = self.advance().line;
        let right = self.parse_additive()?;
        Ok(Expr {
            line,
            kind: ExprKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                Tok::Plus => BinOpKind::Add,
                Tok::Minus => BinOpKind::Sub,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.parse_multiplicative()?;
            left = Expr {
                line,
                kind: ExprKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                Tok::Star => BinOpKind::Mul,
                Tok::Slash => BinOpKind::Div,
                Tok::DoubleSlash => BinOpKind::FloorDiv,
                Tok::Percent => BinOpKind::Mod,
                _ => return Ok(left),
            };
            let line = self.advance().line;
            let right = self.parse_unary()?;
            left = Expr {
                line,
                kind: ExprKind::BinOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check(&Tok::Minus) {
            let line = self.advance().line;
            let operand = Box::new(self.parse_unary()?);
            return Ok(Expr {
                line,
                kind: ExprKind::UnaryOp {
                    op: UnaryOpKind::Neg,
                    operand,
                },
            });
        }
        if self.check(&Tok::Plus) {
            self.advance();
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.check(&Tok::DoubleStar) {
            let line = self.advance().line;
            // Right-associative.
            let exponent = self.parse_unary()?;
            return Ok(Expr {
                line,
                kind: ExprKind::BinOp {
                    op: BinOpKind::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek().kind {
                Tok::Dot => {
                    let line = self.advance().line;
                    let (attr, _) = self.expect_name("attribute name")?;
                    expr = Expr {
                        line,
                        kind: ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                    };
                }
                Tok::LParen => {
                    let line = self.advance().line;
                    let mut args = Vec::new();
                    if !self.check(&Tok::RParen) {
                        args.push(self.parse_expr()?);
                        while self.eat(&Tok::Comma) {
                            if self.check(&Tok::RParen) {
                                break;
                            }
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(Tok::RParen, "`)`")?;
                    expr = Expr {
                        line,
                        kind: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                    };
                }
                Tok::LBracket => {
                    let line = self.advance().line;
                    let index = Box::new(self.parse_expr()?);
                    self.expect(Tok::RBracket, "`]`")?;
                    expr = Expr {
                        line,
                        kind: ExprKind::Subscript {
                            value: Box::new(expr),
                            index,
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let line = self.peek().line;
        let kind = match self.peek().kind.clone() {
            Tok::Num(n) => {
                self.advance();
                ExprKind::Num(n)
            }
            Tok::Str(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            Tok::KwTrue => {
                self.advance();
                ExprKind::Bool(true)
            }
            Tok::KwFalse => {
                self.advance();
                ExprKind::Bool(false)
            }
            Tok::KwNone => {
                self.advance();
                ExprKind::NoneLit
            }
            Tok::Name(n) => {
                self.advance();
                ExprKind::Name(n)
            }
            Tok::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "`)`")?;
                return Ok(inner);
            }
            Tok::LBracket => {
                self.advance();
                return self.parse_list_or_comp(line);
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr { line, kind })
    }

    /// After `[`: either a list literal or a single-generator comprehension.
    fn parse_list_or_comp(&mut self, line: u32) -> Result<Expr, ParseError> {
        if self.eat(&Tok::RBracket) {
            return Ok(Expr {
                line,
                kind: ExprKind::List(Vec::new()),
            });
        }
        let first = self.parse_expr()?;
        if self.check(&Tok::KwFor) {
            self.advance();
            let (target, _) = self.expect_name("comprehension variable")?;
            self.expect(Tok::KwIn, "`in`")?;
            let iter = Box::new(self.parse_expr()?);
            let cond = if self.eat(&Tok::KwIf) {
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect(Tok::RBracket, "`]`")?;
            return Ok(Expr {
                line,
                kind: ExprKind::ListComp {
                    element: Box::new(first),
                    target,
                    iter,
                    cond,
                },
            });
        }
        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if self.check(&Tok::RBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        self.expect(Tok::RBracket, "`]`")?;
        Ok(Expr {
            line,
            kind: ExprKind::List(items),
        })
    }
}
