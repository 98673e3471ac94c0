//! Step-bounded evaluator — runs a parsed factor program against a
//! `MarketFrame` and produces a signal series.
//!
//! This is the dynamic half of the sandbox: the safety layer has already
//! vetted imports and builtins, so the evaluator only implements the
//! whitelisted surface (column access, arithmetic, `shift`, rolling
//! aggregates, a handful of numpy-style functions). Every statement and
//! expression node costs one step from a fixed budget; a runaway loop burns
//! the budget and terminates with `StepBudgetExceeded` even if the caller's
//! wall-clock timeout has not fired yet.

use std::collections::HashMap;

use thiserror::Error;

use crate::market::MarketFrame;
use crate::syntax::{
    BinOpKind, CmpOpKind, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOpKind,
};

/// Evaluation failures. These become `ExecutionError` outcomes at the layer.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("line {line}: name '{name}' is not defined")]
    UnknownName { line: u32, name: String },
    #[error("line {line}: unknown data column '{name}'")]
    UnknownColumn { line: u32, name: String },
    #[error("line {line}: unknown method or function '{name}'")]
    UnknownMethod { line: u32, name: String },
    #[error("line {line}: {message}")]
    TypeMismatch { line: u32, message: String },
    #[error("line {line}: object is not callable")]
    NotCallable { line: u32 },
    #[error("line {line}: {message}")]
    BadArgument { line: u32, message: String },
    #[error("step budget exhausted after {budget} steps")]
    StepBudgetExceeded { budget: u64 },
    #[error("program produced no series signal")]
    NoSignal,
}

/// Runtime values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Bool(bool),
    Str(String),
    Series(Vec<f64>),
    List(Vec<Value>),
    /// `series.rolling(n)` — waiting for an aggregate method.
    Rolling { series: Vec<f64>, window: usize },
    /// An imported module namespace (`pd`, `np`, `factorlib`, …).
    Module(String),
    /// A named free function (`from numpy import log` → `numpy.log`).
    Builtin(String),
    Lambda { params: Vec<String>, body: Box<Expr> },
    None,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "number",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Series(_) => "series",
            Value::List(_) => "list",
            Value::Rolling { .. } => "rolling window",
            Value::Module(_) => "module",
            Value::Builtin(_) => "function",
            Value::Lambda { .. } => "lambda",
            Value::None => "none",
        }
    }
}

/// Successful evaluation: the signal series plus NaN diagnostics.
#[derive(Debug, Clone)]
pub struct EvalOutput {
    pub signal: Vec<f64>,
    pub signal_name: String,
    pub nan_count: usize,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Option<Value>),
}

/// Evaluate a program against market data under a step budget.
pub fn evaluate(
    program: &Program,
    frame: &MarketFrame,
    step_budget: u64,
) -> Result<EvalOutput, EvalError> {
    let mut ev = Evaluator {
        frame,
        env: HashMap::new(),
        steps: step_budget,
        budget: step_budget,
        last_series_assign: None,
    };
    let mut returned = None;
    for stmt in &program.body {
        match ev.exec_stmt(stmt)? {
            Flow::Return(v) => {
                returned = v;
                break;
            }
            Flow::Break | Flow::Continue => {
                // Stray break/continue outside a loop: ignore, like a no-op.
            }
            Flow::Normal => {}
        }
    }

    let (signal, signal_name) = ev.pick_signal(returned)?;
    let nan_count = signal.iter().filter(|v| v.is_nan()).count();
    Ok(EvalOutput {
        signal,
        signal_name,
        nan_count,
    })
}

struct Evaluator<'a> {
    frame: &'a MarketFrame,
    env: HashMap<String, Value>,
    steps: u64,
    budget: u64,
    last_series_assign: Option<String>,
}

impl<'a> Evaluator<'a> {
    fn tick(&mut self) -> Result<(), EvalError> {
        if self.steps == 0 {
            return Err(EvalError::StepBudgetExceeded {
                budget: self.budget,
            });
        }
        self.steps -= 1;
        Ok(())
    }

    fn pick_signal(&self, returned: Option<Value>) -> Result<(Vec<f64>, String), EvalError> {
        if let Some(Value::Series(s)) = returned {
            return Ok((s, "<return>".to_string()));
        }
        for name in ["signal", "factor", "alpha"] {
            if let Some(Value::Series(s)) = self.env.get(name) {
                return Ok((s.clone(), name.to_string()));
            }
        }
        if let Some(name) = &self.last_series_assign {
            if let Some(Value::Series(s)) = self.env.get(name) {
                return Ok((s.clone(), name.clone()));
            }
        }
        Err(EvalError::NoSignal)
    }

    // ── Statements ───────────────────────────────────────────────────

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Import { module, alias } => {
                let root = module.split('.').next().unwrap_or(module).to_string();
                let bind_as = alias.clone().unwrap_or_else(|| root.clone());
                self.env.insert(bind_as, Value::Module(root));
                Ok(Flow::Normal)
            }
            StmtKind::FromImport {
                module,
                names,
                wildcard,
            } => {
                if !wildcard {
                    let root = module.split('.').next().unwrap_or(module);
                    for name in names {
                        self.env
                            .insert(name.clone(), Value::Builtin(format!("{root}.{name}")));
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Assign { target, value } => {
                let v = self.eval_expr(value)?;
                if matches!(v, Value::Series(_)) {
                    self.last_series_assign = Some(target.clone());
                }
                self.env.insert(target.clone(), v);
                Ok(Flow::Normal)
            }
            StmtKind::ExprStmt { value } => {
                self.eval_expr(value)?;
                Ok(Flow::Normal)
            }
            StmtKind::While { condition, body } => {
                loop {
                    self.tick()?;
                    let cond = self.eval_expr(condition)?;
                    if !self.truthy(&cond, condition.line)? {
                        break;
                    }
                    match self.exec_body(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For { target, iter, body } => {
                let items = match self.eval_expr(iter)? {
                    Value::List(items) => items,
                    Value::Series(s) => s.into_iter().map(Value::Scalar).collect(),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            line: iter.line,
                            message: format!("cannot iterate over {}", other.type_name()),
                        })
                    }
                };
                for item in items {
                    self.tick()?;
                    self.env.insert(target.clone(), item);
                    match self.exec_body(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::If {
                condition,
                body,
                orelse,
            } => {
                let cond = self.eval_expr(condition)?;
                if self.truthy(&cond, condition.line)? {
                    self.exec_body(body)
                } else {
                    self.exec_body(orelse)
                }
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return { value } => {
                let v = value.as_ref().map(|e| self.eval_expr(e)).transpose()?;
                Ok(Flow::Return(v))
            }
        }
    }

    fn exec_body(&mut self, body: &[Stmt]) -> Result<Flow, EvalError> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn truthy(&self, value: &Value, line: u32) -> Result<bool, EvalError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Scalar(n) => Ok(*n != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::None => Ok(false),
            Value::List(items) => Ok(!items.is_empty()),
            Value::Series(_) => Err(EvalError::TypeMismatch {
                line,
                message: "truth value of a series is ambiguous".to_string(),
            }),
            other => Err(EvalError::TypeMismatch {
                line,
                message: format!("cannot use {} as a condition", other.type_name()),
            }),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Num(n) => Ok(Value::Scalar(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::NoneLit => Ok(Value::None),
            ExprKind::Name(name) => self.lookup(name, expr.line),
            ExprKind::Attribute { value, attr } => {
                let recv = self.eval_expr(value)?;
                self.eval_attribute(recv, attr, expr.line)
            }
            ExprKind::Subscript { value, index } => {
                let recv = self.eval_expr(value)?;
                let idx = self.eval_expr(index)?;
                self.eval_subscript(recv, idx, expr.line)
            }
            ExprKind::Call { func, args } => self.eval_call(func, args, expr.line),
            ExprKind::BinOp { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.eval_binop(*op, l, r, expr.line)
            }
            ExprKind::UnaryOp { op, operand } => {
                let v = self.eval_expr(operand)?;
                match op {
                    UnaryOpKind::Neg => match v {
                        Value::Scalar(n) => Ok(Value::Scalar(-n)),
                        Value::Series(s) => {
                            Ok(Value::Series(s.into_iter().map(|x| -x).collect()))
                        }
                        other => Err(EvalError::TypeMismatch {
                            line: expr.line,
                            message: format!("cannot negate {}", other.type_name()),
                        }),
                    },
                    UnaryOpKind::Not => {
                        let b = self.truthy(&v, expr.line)?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            ExprKind::Compare { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                self.eval_compare(*op, l, r, expr.line)
            }
            ExprKind::Lambda { params, body } => Ok(Value::Lambda {
                params: params.clone(),
                body: body.clone(),
            }),
            ExprKind::List(items) => {
                let values = items
                    .iter()
                    .map(|i| self.eval_expr(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(values))
            }
            ExprKind::ListComp {
                element,
                target,
                iter,
                cond,
            } => {
                let items = match self.eval_expr(iter)? {
                    Value::List(items) => items,
                    Value::Series(s) => s.into_iter().map(Value::Scalar).collect(),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            line: iter.line,
                            message: format!("cannot iterate over {}", other.type_name()),
                        })
                    }
                };
                // The target shadows any outer binding for the loop only.
                let saved = self.env.get(target.as_str()).cloned();
                let result = self.eval_comprehension(element, target, cond.as_deref(), items);
                self.restore_binding(target, saved);
                result
            }
        }
    }

    fn eval_comprehension(
        &mut self,
        element: &Expr,
        target: &str,
        cond: Option<&Expr>,
        items: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let mut out = Vec::new();
        for item in items {
            self.tick()?;
            self.env.insert(target.to_string(), item);
            if let Some(c) = cond {
                let keep = self.eval_expr(c)?;
                if !self.truthy(&keep, c.line)? {
                    continue;
                }
            }
            out.push(self.eval_expr(element)?);
        }
        Ok(Value::List(out))
    }

    /// Put back (or remove) a binding that was shadowed by a lambda parameter
    /// or comprehension target.
    fn restore_binding(&mut self, name: &str, old: Option<Value>) {
        match old {
            Some(v) => {
                self.env.insert(name.to_string(), v);
            }
            None => {
                self.env.remove(name);
            }
        }
    }

    fn lookup(&self, name: &str, line: u32) -> Result<Value, EvalError> {
        if let Some(v) = self.env.get(name) {
            return Ok(v.clone());
        }
        match name {
            // `data` is the injected market frame.
            "data" => Ok(Value::Module("data".to_string())),
            "abs" | "len" | "min" | "max" | "sum" | "range" | "float" => {
                Ok(Value::Builtin(name.to_string()))
            }
            _ => Err(EvalError::UnknownName {
                line,
                name: name.to_string(),
            }),
        }
    }

    fn eval_attribute(&mut self, recv: Value, attr: &str, line: u32) -> Result<Value, EvalError> {
        match recv {
            Value::Module(module) => match (module.as_str(), attr) {
                ("numpy", "nan") => Ok(Value::Scalar(f64::NAN)),
                // `data.close` is sugar for `data["close"]`.
                ("data", col) => match self.frame.column(col) {
                    Some(series) => Ok(Value::Series(series.to_vec())),
                    None => Err(EvalError::UnknownColumn {
                        line,
                        name: col.to_string(),
                    }),
                },
                (m, a) => Ok(Value::Builtin(format!("{m}.{a}"))),
            },
            // Series/rolling attributes only make sense when called; produce a
            // bound-method marker the call evaluator understands.
            other => Err(EvalError::TypeMismatch {
                line,
                message: format!(
                    "attribute '{attr}' of a {} must be called",
                    other.type_name()
                ),
            }),
        }
    }

    fn eval_subscript(&mut self, recv: Value, idx: Value, line: u32) -> Result<Value, EvalError> {
        match (recv, idx) {
            (Value::Module(m), Value::Str(col)) if m == "data" => {
                match self.frame.column(&col) {
                    Some(series) => Ok(Value::Series(series.to_vec())),
                    None => Err(EvalError::UnknownColumn { line, name: col }),
                }
            }
            (Value::Series(s), Value::Scalar(i)) => {
                let i = i as i64;
                let len = s.len() as i64;
                let i = if i < 0 { len + i } else { i };
                if i < 0 || i >= len {
                    return Err(EvalError::BadArgument {
                        line,
                        message: format!("series index {i} out of range for length {len}"),
                    });
                }
                Ok(Value::Scalar(s[i as usize]))
            }
            (Value::List(items), Value::Scalar(i)) => {
                let i = i as usize;
                items.get(i).cloned().ok_or(EvalError::BadArgument {
                    line,
                    message: format!("list index {i} out of range"),
                })
            }
            (recv, idx) => Err(EvalError::TypeMismatch {
                line,
                message: format!(
                    "cannot index {} with {}",
                    recv.type_name(),
                    idx.type_name()
                ),
            }),
        }
    }

    fn eval_call(&mut self, func: &Expr, args: &[Expr], line: u32) -> Result<Value, EvalError> {
        // Method call: receiver.method(args)
        if let ExprKind::Attribute { value, attr } = &func.kind {
            let recv = self.eval_expr(value)?;
            if !matches!(recv, Value::Module(_)) {
                let arg_values = self.eval_args(args)?;
                return self.call_method(recv, attr, arg_values, line);
            }
            // Module function: np.log(x), factorlib.load_prices("close"), ...
            if let Value::Module(m) = recv {
                let arg_values = self.eval_args(args)?;
                return self.call_free(&format!("{m}.{attr}"), arg_values, line);
            }
        }
        let callee = self.eval_expr(func)?;
        let arg_values = self.eval_args(args)?;
        match callee {
            Value::Builtin(name) => self.call_free(&name, arg_values, line),
            Value::Lambda { params, body } => {
                if params.len() != arg_values.len() {
                    return Err(EvalError::BadArgument {
                        line,
                        message: format!(
                            "lambda expects {} arguments, got {}",
                            params.len(),
                            arg_values.len()
                        ),
                    });
                }
                // Parameters shadow outer bindings for the body only.
                let shadowed: Vec<(String, Option<Value>)> = params
                    .iter()
                    .map(|p| (p.clone(), self.env.get(p).cloned()))
                    .collect();
                for (p, v) in params.iter().zip(arg_values) {
                    self.env.insert(p.clone(), v);
                }
                let result = self.eval_expr(&body);
                for (name, old) in shadowed {
                    self.restore_binding(&name, old);
                }
                result
            }
            _ => Err(EvalError::NotCallable { line }),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|a| self.eval_expr(a)).collect()
    }

    // ── Method dispatch ──────────────────────────────────────────────

    fn call_method(
        &mut self,
        recv: Value,
        method: &str,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, EvalError> {
        match recv {
            Value::Series(s) => self.series_method(s, method, args, line),
            Value::Rolling { series, window } => {
                rolling_aggregate(&series, window, method, line).map(Value::Series)
            }
            other => Err(EvalError::UnknownMethod {
                line,
                name: format!("{}.{method}", other.type_name()),
            }),
        }
    }

    fn series_method(
        &mut self,
        s: Vec<f64>,
        method: &str,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, EvalError> {
        let scalar_arg = |args: &[Value], i: usize, default: Option<f64>| -> Result<f64, EvalError> {
            match args.get(i) {
                Some(Value::Scalar(n)) => Ok(*n),
                Some(other) => Err(EvalError::BadArgument {
                    line,
                    message: format!("expected a number argument, got {}", other.type_name()),
                }),
                None => default.ok_or(EvalError::BadArgument {
                    line,
                    message: format!("'{method}' requires a numeric argument"),
                }),
            }
        };
        match method {
            "shift" => {
                let n = scalar_arg(&args, 0, Some(1.0))? as i64;
                Ok(Value::Series(shift_series(&s, n)))
            }
            "rolling" => {
                let w = scalar_arg(&args, 0, None)?;
                if w < 1.0 || w.fract() != 0.0 {
                    return Err(EvalError::BadArgument {
                        line,
                        message: format!("rolling window must be a positive integer, got {w}"),
                    });
                }
                Ok(Value::Rolling {
                    series: s,
                    window: w as usize,
                })
            }
            "diff" => {
                let n = scalar_arg(&args, 0, Some(1.0))? as i64;
                let shifted = shift_series(&s, n);
                Ok(Value::Series(
                    s.iter().zip(shifted).map(|(a, b)| a - b).collect(),
                ))
            }
            "pct_change" => {
                let n = scalar_arg(&args, 0, Some(1.0))? as i64;
                let shifted = shift_series(&s, n);
                Ok(Value::Series(
                    s.iter()
                        .zip(shifted)
                        .map(|(a, b)| if b != 0.0 { a / b - 1.0 } else { f64::NAN })
                        .collect(),
                ))
            }
            "abs" => Ok(Value::Series(s.into_iter().map(f64::abs).collect())),
            "fillna" => {
                let fill = scalar_arg(&args, 0, Some(0.0))?;
                Ok(Value::Series(
                    s.into_iter()
                        .map(|x| if x.is_nan() { fill } else { x })
                        .collect(),
                ))
            }
            "dropna" => Ok(Value::Series(
                s.into_iter().filter(|x| !x.is_nan()).collect(),
            )),
            "clip" => {
                let lo = scalar_arg(&args, 0, None)?;
                let hi = scalar_arg(&args, 1, None)?;
                Ok(Value::Series(
                    s.into_iter().map(|x| x.clamp(lo, hi)).collect(),
                ))
            }
            "mean" => Ok(Value::Scalar(finite_mean(&s))),
            "std" => Ok(Value::Scalar(finite_std(&s))),
            "sum" => Ok(Value::Scalar(s.iter().filter(|x| x.is_finite()).sum())),
            "max" => Ok(Value::Scalar(
                s.iter().cloned().filter(|x| x.is_finite()).fold(f64::NEG_INFINITY, f64::max),
            )),
            "min" => Ok(Value::Scalar(
                s.iter().cloned().filter(|x| x.is_finite()).fold(f64::INFINITY, f64::min),
            )),
            _ => Err(EvalError::UnknownMethod {
                line,
                name: format!("series.{method}"),
            }),
        }
    }

    fn call_free(&mut self, name: &str, args: Vec<Value>, line: u32) -> Result<Value, EvalError> {
        let unary = |f: fn(f64) -> f64, args: &[Value]| -> Result<Value, EvalError> {
            match args.first() {
                Some(Value::Scalar(n)) => Ok(Value::Scalar(f(*n))),
                Some(Value::Series(s)) => {
                    Ok(Value::Series(s.iter().map(|&x| f(x)).collect()))
                }
                other => Err(EvalError::BadArgument {
                    line,
                    message: format!(
                        "expected a number or series, got {}",
                        other.map_or("nothing", |v| v.type_name())
                    ),
                }),
            }
        };
        match name {
            "numpy.log" | "math.log" => unary(f64::ln, &args),
            "numpy.sqrt" | "math.sqrt" => unary(f64::sqrt, &args),
            "numpy.exp" | "math.exp" => unary(f64::exp, &args),
            "numpy.abs" | "math.fabs" | "abs" => unary(f64::abs, &args),
            "numpy.sign" => unary(f64::signum, &args),
            "numpy.where" => {
                let [cond, a, b] = args.as_slice() else {
                    return Err(EvalError::BadArgument {
                        line,
                        message: "where(cond, a, b) takes three arguments".to_string(),
                    });
                };
                self.eval_where(cond, a, b, line)
            }
            "numpy.maximum" => self.elementwise_pair(args, f64::max, line),
            "numpy.minimum" => self.elementwise_pair(args, f64::min, line),
            "factorlib.load_prices" => {
                let col = match args.first() {
                    Some(Value::Str(c)) => c.clone(),
                    _ => "close".to_string(),
                };
                match self.frame.column(&col) {
                    Some(series) => Ok(Value::Series(series.to_vec())),
                    None => Err(EvalError::UnknownColumn { line, name: col }),
                }
            }
            "factorlib.load_volume" => Ok(Value::Series(self.frame.volume.clone())),
            "range" => {
                let n = match args.first() {
                    Some(Value::Scalar(n)) if *n >= 0.0 => *n as usize,
                    _ => {
                        return Err(EvalError::BadArgument {
                            line,
                            message: "range(n) takes a non-negative number".to_string(),
                        })
                    }
                };
                Ok(Value::List(
                    (0..n).map(|i| Value::Scalar(i as f64)).collect(),
                ))
            }
            "len" => match args.first() {
                Some(Value::Series(s)) => Ok(Value::Scalar(s.len() as f64)),
                Some(Value::List(l)) => Ok(Value::Scalar(l.len() as f64)),
                Some(Value::Str(s)) => Ok(Value::Scalar(s.chars().count() as f64)),
                _ => Err(EvalError::BadArgument {
                    line,
                    message: "len() takes a series, list, or string".to_string(),
                }),
            },
            "float" => match args.first() {
                Some(Value::Scalar(n)) => Ok(Value::Scalar(*n)),
                Some(Value::Bool(b)) => Ok(Value::Scalar(if *b { 1.0 } else { 0.0 })),
                _ => Err(EvalError::BadArgument {
                    line,
                    message: "float() takes a number".to_string(),
                }),
            },
            "min" | "max" | "sum" => {
                let items: Vec<f64> = match args.first() {
                    Some(Value::List(l)) => l
                        .iter()
                        .map(|v| match v {
                            Value::Scalar(n) => Ok(*n),
                            other => Err(EvalError::BadArgument {
                                line,
                                message: format!("expected numbers, got {}", other.type_name()),
                            }),
                        })
                        .collect::<Result<_, _>>()?,
                    Some(Value::Series(s)) => s.clone(),
                    _ => {
                        return Err(EvalError::BadArgument {
                            line,
                            message: format!("{name}() takes a list or series"),
                        })
                    }
                };
                let out = match name {
                    "min" => items.iter().cloned().fold(f64::INFINITY, f64::min),
                    "max" => items.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    _ => items.iter().sum(),
                };
                Ok(Value::Scalar(out))
            }
            _ => Err(EvalError::UnknownMethod {
                line,
                name: name.to_string(),
            }),
        }
    }

    fn eval_where(
        &mut self,
        cond: &Value,
        a: &Value,
        b: &Value,
        line: u32,
    ) -> Result<Value, EvalError> {
        let cond = match cond {
            Value::Series(s) => s.clone(),
            other => {
                return Err(EvalError::BadArgument {
                    line,
                    message: format!("where() condition must be a series, got {}", other.type_name()),
                })
            }
        };
        let pick = |v: &Value, i: usize| -> f64 {
            match v {
                Value::Scalar(n) => *n,
                Value::Series(s) => s.get(i).copied().unwrap_or(f64::NAN),
                _ => f64::NAN,
            }
        };
        Ok(Value::Series(
            cond.iter()
                .enumerate()
                .map(|(i, &c)| {
                    if c.is_nan() {
                        f64::NAN
                    } else if c != 0.0 {
                        pick(a, i)
                    } else {
                        pick(b, i)
                    }
                })
                .collect(),
        ))
    }

    fn elementwise_pair(
        &mut self,
        args: Vec<Value>,
        f: fn(f64, f64) -> f64,
        line: u32,
    ) -> Result<Value, EvalError> {
        let [a, b] = args.as_slice() else {
            return Err(EvalError::BadArgument {
                line,
                message: "expected two arguments".to_string(),
            });
        };
        self.eval_binop_with(a.clone(), b.clone(), f, line)
    }

    // ── Operators ────────────────────────────────────────────────────

    fn eval_binop(
        &mut self,
        op: BinOpKind,
        l: Value,
        r: Value,
        line: u32,
    ) -> Result<Value, EvalError> {
        let f: fn(f64, f64) -> f64 = match op {
            BinOpKind::Add => |a, b| a + b,
            BinOpKind::Sub => |a, b| a - b,
            BinOpKind::Mul => |a, b| a * b,
            BinOpKind::Div => |a, b| a / b,
            BinOpKind::FloorDiv => |a, b| (a / b).floor(),
            BinOpKind::Mod => |a, b| a % b,
            BinOpKind::Pow => f64::powf,
            BinOpKind::And => {
                let lt = self.truthy(&l, line)?;
                return if lt { Ok(r) } else { Ok(l) };
            }
            BinOpKind::Or => {
                let lt = self.truthy(&l, line)?;
                return if lt { Ok(l) } else { Ok(r) };
            }
        };
        self.eval_binop_with(l, r, f, line)
    }

    fn eval_binop_with(
        &mut self,
        l: Value,
        r: Value,
        f: fn(f64, f64) -> f64,
        line: u32,
    ) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(f(a, b))),
            (Value::Series(s), Value::Scalar(b)) => {
                Ok(Value::Series(s.into_iter().map(|a| f(a, b)).collect()))
            }
            (Value::Scalar(a), Value::Series(s)) => {
                Ok(Value::Series(s.into_iter().map(|b| f(a, b)).collect()))
            }
            (Value::Series(a), Value::Series(b)) => {
                if a.len() != b.len() {
                    return Err(EvalError::TypeMismatch {
                        line,
                        message: format!(
                            "series length mismatch: {} vs {}",
                            a.len(),
                            b.len()
                        ),
                    });
                }
                Ok(Value::Series(
                    a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect(),
                ))
            }
            (l, r) => Err(EvalError::TypeMismatch {
                line,
                message: format!(
                    "unsupported operand types: {} and {}",
                    l.type_name(),
                    r.type_name()
                ),
            }),
        }
    }

    fn eval_compare(
        &mut self,
        op: CmpOpKind,
        l: Value,
        r: Value,
        line: u32,
    ) -> Result<Value, EvalError> {
        let f = move |a: f64, b: f64| -> f64 {
            if a.is_nan() || b.is_nan() {
                return f64::NAN;
            }
            let res = match op {
                CmpOpKind::Eq => a == b,
                CmpOpKind::NotEq => a != b,
                CmpOpKind::Lt => a < b,
                CmpOpKind::LtEq => a <= b,
                CmpOpKind::Gt => a > b,
                CmpOpKind::GtEq => a >= b,
            };
            if res {
                1.0
            } else {
                0.0
            }
        };
        match (&l, &r) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Bool(f(*a, *b) == 1.0)),
            _ => {
                // Series comparisons produce 0/1 series (NaN-propagating).
                let lf: fn(f64, f64) -> f64 = match op {
                    CmpOpKind::Eq => |a, b| cmp_to_f(a, b, |a, b| a == b),
                    CmpOpKind::NotEq => |a, b| cmp_to_f(a, b, |a, b| a != b),
                    CmpOpKind::Lt => |a, b| cmp_to_f(a, b, |a, b| a < b),
                    CmpOpKind::LtEq => |a, b| cmp_to_f(a, b, |a, b| a <= b),
                    CmpOpKind::Gt => |a, b| cmp_to_f(a, b, |a, b| a > b),
                    CmpOpKind::GtEq => |a, b| cmp_to_f(a, b, |a, b| a >= b),
                };
                self.eval_binop_with(l, r, lf, line)
            }
        }
    }
}

fn cmp_to_f(a: f64, b: f64, f: fn(f64, f64) -> bool) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if f(a, b) {
        1.0
    } else {
        0.0
    }
}

/// Pandas-style shift: positive n moves values forward in time, filling the
/// head with NaN; negative n pulls future values backward (that is exactly
/// the look-ahead the bias layer exists to reject, but the evaluator stays
/// faithful to the semantics).
pub fn shift_series(s: &[f64], n: i64) -> Vec<f64> {
    let len = s.len() as i64;
    (0..len)
        .map(|i| {
            let j = i - n;
            if j < 0 || j >= len {
                f64::NAN
            } else {
                s[j as usize]
            }
        })
        .collect()
}

fn rolling_aggregate(
    series: &[f64],
    window: usize,
    method: &str,
    line: u32,
) -> Result<Vec<f64>, EvalError> {
    let agg: fn(&[f64]) -> f64 = match method {
        "mean" => finite_mean,
        "std" => finite_std,
        "sum" => |w| w.iter().sum(),
        "max" => |w| w.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        "min" => |w| w.iter().cloned().fold(f64::INFINITY, f64::min),
        _ => {
            return Err(EvalError::UnknownMethod {
                line,
                name: format!("rolling.{method}"),
            })
        }
    };
    let mut out = vec![f64::NAN; series.len()];
    for i in 0..series.len() {
        if i + 1 >= window {
            let w = &series[i + 1 - window..=i];
            if w.iter().any(|x| x.is_nan()) {
                out[i] = f64::NAN;
            } else {
                out[i] = agg(w);
            }
        }
    }
    Ok(out)
}

fn finite_mean(s: &[f64]) -> f64 {
    let finite: Vec<f64> = s.iter().cloned().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.iter().sum::<f64>() / finite.len() as f64
}

fn finite_std(s: &[f64]) -> f64 {
    let finite: Vec<f64> = s.iter().cloned().filter(|x| x.is_finite()).collect();
    if finite.len() < 2 {
        return f64::NAN;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    var.sqrt()
}
