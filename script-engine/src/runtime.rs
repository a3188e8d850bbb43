use std::collections::{BTreeMap, HashMap};

use bar_core::{BarSeries, PlotPoint, NA};
use serde::{Deserialize, Serialize};

use crate::codegen::GeneratedScript;
use crate::error::ExecutionError;
use crate::target::{Namespace, TargetExpr, TargetOp, TargetStmt};

/// One registered plot: a full-length value series plus display options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub title: String,
    pub color: Option<String>,
    pub series: Vec<f64>,
}

impl Plot {
    /// Pair the series with bar timestamps for charting.
    pub fn points(&self, bars: &BarSeries) -> Vec<PlotPoint> {
        bars.align(&self.series)
    }
}

/// Everything a script run produces: the declared indicator name, the
/// declared inputs with their defaults, and the plots in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub indicator_name: String,
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub plots: Vec<Plot>,
}

/// Run a lowered script against a bar series. Statements execute once,
/// top to bottom; any failure aborts the run with the statement's line.
pub fn execute(
    script: &GeneratedScript,
    bars: &BarSeries,
) -> Result<ExecutionResult, ExecutionError> {
    Interpreter::new(bars).run(script)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
    Str(String),
    Series(Vec<f64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Series(_) => "series",
        }
    }
}

struct Interpreter<'a> {
    bars: &'a BarSeries,
    env: HashMap<String, Value>,
    indicator_name: String,
    inputs: BTreeMap<String, serde_json::Value>,
    plots: Vec<Plot>,
    input_counter: usize,
}

impl<'a> Interpreter<'a> {
    fn new(bars: &'a BarSeries) -> Self {
        let mut env = HashMap::new();
        env.insert("open".to_string(), Value::Series(bars.open().to_vec()));
        env.insert("high".to_string(), Value::Series(bars.high().to_vec()));
        env.insert("low".to_string(), Value::Series(bars.low().to_vec()));
        env.insert("close".to_string(), Value::Series(bars.close().to_vec()));
        env.insert("volume".to_string(), Value::Series(bars.volume().to_vec()));
        Self {
            bars,
            env,
            indicator_name: "script".to_string(),
            inputs: BTreeMap::new(),
            plots: Vec::new(),
            input_counter: 0,
        }
    }

    fn run(mut self, script: &GeneratedScript) -> Result<ExecutionResult, ExecutionError> {
        for stmt in &script.program.body {
            match stmt {
                TargetStmt::Indicator { name, .. } => {
                    self.indicator_name = name.clone();
                }
                TargetStmt::Binding { name, value, line } => {
                    let value = self.eval(value, Some(name), *line)?;
                    self.env.insert(name.clone(), value);
                }
                TargetStmt::Plot {
                    value,
                    options,
                    line,
                } => {
                    let value = self.eval(value, None, *line)?;
                    self.register_plot(value, options, *line)?;
                }
            }
        }
        Ok(ExecutionResult {
            indicator_name: self.indicator_name,
            inputs: self.inputs,
            plots: self.plots,
        })
    }

    fn register_plot(
        &mut self,
        value: Value,
        options: &[(String, TargetExpr)],
        line: usize,
    ) -> Result<(), ExecutionError> {
        let n = self.bars.len();
        let series = match value {
            Value::Series(s) => s,
            Value::Num(v) => vec![v; n],
            Value::Bool(b) => vec![if b { 1.0 } else { 0.0 }; n],
            Value::Str(_) => {
                return Err(ExecutionError::at("cannot plot a string value", line));
            }
        };
        let mut title = None;
        let mut color = None;
        for (key, expr) in options {
            let value = self.eval(expr, None, line)?;
            match (key.as_str(), value) {
                ("title", Value::Str(s)) => title = Some(s),
                ("color", Value::Str(s)) => color = Some(s),
                // Unknown or mistyped display options are inert.
                _ => {}
            }
        }
        let title = title.unwrap_or_else(|| format!("plot{}", self.plots.len() + 1));
        self.plots.push(Plot {
            title,
            color,
            series,
        });
        Ok(())
    }

    /// Evaluate an expression. `binding` is the name being assigned, if any,
    /// used to key inputs that carry no label.
    fn eval(
        &mut self,
        expr: &TargetExpr,
        binding: Option<&str>,
        line: usize,
    ) -> Result<Value, ExecutionError> {
        match expr {
            TargetExpr::Number(v) => Ok(Value::Num(*v)),
            TargetExpr::Bool(b) => Ok(Value::Bool(*b)),
            TargetExpr::Str(s) => Ok(Value::Str(s.clone())),
            TargetExpr::Ident(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| ExecutionError::at(format!("undefined name `{name}`"), line)),
            TargetExpr::Not(inner) => {
                let value = self.eval(inner, None, line)?;
                Ok(negate(value))
            }
            TargetExpr::Binary { op, left, right } => {
                let left = self.eval(left, None, line)?;
                let right = self.eval(right, None, line)?;
                binary(*op, left, right, line)
            }
            TargetExpr::Call {
                namespace,
                name,
                args,
                options,
            } => self.call(*namespace, name, args, options, binding, line),
        }
    }

    fn call(
        &mut self,
        namespace: Option<Namespace>,
        name: &str,
        args: &[TargetExpr],
        // Named options on builtin calls carry no runtime meaning.
        _options: &[(String, TargetExpr)],
        binding: Option<&str>,
        line: usize,
    ) -> Result<Value, ExecutionError> {
        match namespace {
            Some(Namespace::Input) => self.input_call(name, args, binding, line),
            Some(Namespace::Ta) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, None, line)?);
                }
                self.ta_call(name, values, line)
            }
            None => Err(ExecutionError::at(
                format!("unknown function `{name}`"),
                line,
            )),
        }
    }

    fn input_call(
        &mut self,
        method: &str,
        args: &[TargetExpr],
        binding: Option<&str>,
        line: usize,
    ) -> Result<Value, ExecutionError> {
        let default = args.first().ok_or_else(|| {
            ExecutionError::at(format!("Input.{method} requires a default value"), line)
        })?;
        let default = self.eval(default, None, line)?;
        let (value, json) = match (method, &default) {
            // The default is recorded and returned as supplied; a fractional
            // int default is rejected rather than rounded.
            ("int", Value::Num(v)) => {
                if !v.is_finite() || v.fract() != 0.0 {
                    return Err(ExecutionError::at(
                        format!("Input.int default must be a whole number, got {v}"),
                        line,
                    ));
                }
                (Value::Num(*v), serde_json::json!(*v as i64))
            }
            ("float", Value::Num(v)) => (Value::Num(*v), serde_json::json!(v)),
            ("bool", Value::Bool(b)) => (Value::Bool(*b), serde_json::json!(b)),
            _ => {
                return Err(ExecutionError::at(
                    format!(
                        "Input.{method} does not accept a {} default",
                        default.kind()
                    ),
                    line,
                ));
            }
        };
        // Key by the label when given, else the binding name, else a counter.
        let label = match args.get(1) {
            Some(expr) => match self.eval(expr, None, line)? {
                Value::Str(s) => Some(s),
                _ => None,
            },
            None => None,
        };
        self.input_counter += 1;
        let key = label
            .or_else(|| binding.map(str::to_string))
            .unwrap_or_else(|| format!("input{}", self.input_counter));
        self.inputs.insert(key, json);
        Ok(value)
    }

    fn ta_call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        line: usize,
    ) -> Result<Value, ExecutionError> {
        let volume = self.bars.volume().to_vec();
        let series = match name {
            "ema" => unary_windowed(name, args, line, ta_series::ema)?,
            "sma" => unary_windowed(name, args, line, ta_series::sma)?,
            "rma" => unary_windowed(name, args, line, ta_series::rma)?,
            "wma" => unary_windowed(name, args, line, ta_series::wma)?,
            "hma" => unary_windowed(name, args, line, ta_series::hma)?,
            "rsi" => unary_windowed(name, args, line, ta_series::rsi)?,
            "stdev" => unary_windowed(name, args, line, ta_series::stdev)?,
            "variance" => unary_windowed(name, args, line, ta_series::variance)?,
            "cci" => unary_windowed(name, args, line, ta_series::cci)?,
            "highest" => unary_windowed(name, args, line, ta_series::highest)?,
            "lowest" => unary_windowed(name, args, line, ta_series::lowest)?,
            "roc" => unary_windowed(name, args, line, ta_series::roc)?,
            "change" | "mom" => {
                let (source, rest) = split_source(name, args, line)?;
                let length = match rest.first() {
                    Some(value) => length_arg(name, value, line)?,
                    None => 1,
                };
                ta_series::change(&source, length)
            }
            "vwma" | "mfi" => {
                let (source, rest) = split_source(name, args, line)?;
                let length = required_length(name, &rest, line)?;
                if source.len() != volume.len() {
                    return Err(length_mismatch(name, source.len(), volume.len(), line));
                }
                match name {
                    "vwma" => ta_series::vwma(&source, &volume, length),
                    _ => ta_series::mfi(&source, &volume, length),
                }
            }
            "atr" => {
                let length = required_length(name, &args, line)?;
                ta_series::atr(self.bars.high(), self.bars.low(), length)
            }
            "tr" => ta_series::true_range(self.bars.high(), self.bars.low()),
            "obv" => ta_series::obv(self.bars.close(), &volume),
            "crossover" | "crossunder" | "cross" => {
                let (a, b) = two_series(name, args, line)?;
                match name {
                    "crossover" => ta_series::crossover(&a, &b),
                    "crossunder" => ta_series::crossunder(&a, &b),
                    _ => ta_series::cross(&a, &b),
                }
            }
            "correlation" | "covariance" => {
                let mut args = args.into_iter();
                let a = as_series(name, args.next(), self.bars.len(), line)?;
                let b = as_series(name, args.next(), self.bars.len(), line)?;
                if a.len() != b.len() {
                    return Err(length_mismatch(name, a.len(), b.len(), line));
                }
                let length = match args.next() {
                    Some(value) => length_arg(name, &value, line)?,
                    None => {
                        return Err(ExecutionError::at(
                            format!("ta.{name} requires a window length"),
                            line,
                        ));
                    }
                };
                match name {
                    "correlation" => ta_series::correlation(&a, &b, length),
                    _ => ta_series::covariance(&a, &b, length),
                }
            }
            "macd" | "stoch" | "bb" | "bbw" | "sar" => {
                return Err(ExecutionError::at(
                    format!("ta.{name} is not available in this runtime"),
                    line,
                ));
            }
            other => {
                return Err(ExecutionError::at(
                    format!("unknown builtin `ta.{other}`"),
                    line,
                ));
            }
        };
        Ok(Value::Series(series))
    }
}

fn split_source(
    name: &str,
    args: Vec<Value>,
    line: usize,
) -> Result<(Vec<f64>, Vec<Value>), ExecutionError> {
    let mut iter = args.into_iter();
    let source = match iter.next() {
        Some(Value::Series(s)) => s,
        Some(other) => {
            return Err(ExecutionError::at(
                format!("ta.{name} expects a series source, got a {}", other.kind()),
                line,
            ));
        }
        None => {
            return Err(ExecutionError::at(
                format!("ta.{name} requires a source series"),
                line,
            ));
        }
    };
    Ok((source, iter.collect()))
}

fn unary_windowed(
    name: &str,
    args: Vec<Value>,
    line: usize,
    f: impl Fn(&[f64], usize) -> Vec<f64>,
) -> Result<Vec<f64>, ExecutionError> {
    let (source, rest) = split_source(name, args, line)?;
    let length = required_length(name, &rest, line)?;
    Ok(f(&source, length))
}

fn required_length(name: &str, rest: &[Value], line: usize) -> Result<usize, ExecutionError> {
    match rest.first() {
        Some(value) => length_arg(name, value, line),
        None => Err(ExecutionError::at(
            format!("ta.{name} requires a window length"),
            line,
        )),
    }
}

fn length_arg(name: &str, value: &Value, line: usize) -> Result<usize, ExecutionError> {
    let v = match value {
        Value::Num(v) => *v,
        other => {
            return Err(ExecutionError::at(
                format!("ta.{name} length must be a number, got a {}", other.kind()),
                line,
            ));
        }
    };
    if !v.is_finite() || v.round() < 1.0 {
        return Err(ExecutionError::at(
            format!("ta.{name} length must be a positive number, got {v}"),
            line,
        ));
    }
    Ok(v.round() as usize)
}

fn two_series(
    name: &str,
    args: Vec<Value>,
    line: usize,
) -> Result<(Vec<f64>, Vec<f64>), ExecutionError> {
    let mut iter = args.into_iter();
    let a = match iter.next() {
        Some(Value::Series(s)) => s,
        _ => {
            return Err(ExecutionError::at(
                format!("ta.{name} requires two series arguments"),
                line,
            ));
        }
    };
    let b = match iter.next() {
        Some(Value::Series(s)) => s,
        _ => {
            return Err(ExecutionError::at(
                format!("ta.{name} requires two series arguments"),
                line,
            ));
        }
    };
    if a.len() != b.len() {
        return Err(length_mismatch(name, a.len(), b.len(), line));
    }
    Ok((a, b))
}

fn as_series(
    name: &str,
    value: Option<Value>,
    n: usize,
    line: usize,
) -> Result<Vec<f64>, ExecutionError> {
    match value {
        Some(Value::Series(s)) => Ok(s),
        Some(Value::Num(v)) => Ok(vec![v; n]),
        _ => Err(ExecutionError::at(
            format!("ta.{name} expects series arguments"),
            line,
        )),
    }
}

fn length_mismatch(context: &str, a: usize, b: usize, line: usize) -> ExecutionError {
    ExecutionError::at(
        format!("series length mismatch in {context}: {a} vs {b}"),
        line,
    )
}

fn negate(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(!b),
        Value::Num(v) => Value::Bool(v == 0.0),
        Value::Str(_) => Value::Bool(false),
        // NA stays NA under negation, same as the element-wise division rule.
        Value::Series(s) => Value::Series(
            s.into_iter()
                .map(|v| {
                    if v.is_nan() {
                        NA
                    } else if v == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect(),
        ),
    }
}

fn truthy(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => bool_to_num(*b),
        Value::Num(v) => bool_to_num(*v != 0.0),
        Value::Str(s) => bool_to_num(!s.is_empty()),
        Value::Series(_) => 1.0,
    }
}

fn bool_to_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn binary(op: TargetOp, left: Value, right: Value, line: usize) -> Result<Value, ExecutionError> {
    use TargetOp::*;
    // String equality is the only string operation.
    if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
        return match op {
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            _ => Err(ExecutionError::at(
                format!("operator `{}` is not defined for strings", op.symbol()),
                line,
            )),
        };
    }
    match (left, right) {
        (Value::Series(a), Value::Series(b)) => {
            if a.len() != b.len() {
                return Err(length_mismatch("operator", a.len(), b.len(), line));
            }
            let out = a
                .iter()
                .zip(b.iter())
                .map(|(&x, &y)| apply_elementwise(op, x, y))
                .collect();
            Ok(Value::Series(out))
        }
        (Value::Series(a), rhs) => {
            let y = scalar_of(&rhs, op, line)?;
            Ok(Value::Series(
                a.iter().map(|&x| apply_elementwise(op, x, y)).collect(),
            ))
        }
        (lhs, Value::Series(b)) => {
            let x = scalar_of(&lhs, op, line)?;
            Ok(Value::Series(
                b.iter().map(|&y| apply_elementwise(op, x, y)).collect(),
            ))
        }
        (lhs, rhs) => scalar_binary(op, lhs, rhs, line),
    }
}

fn scalar_of(value: &Value, op: TargetOp, line: usize) -> Result<f64, ExecutionError> {
    match value {
        Value::Num(v) => Ok(*v),
        Value::Bool(b) => Ok(bool_to_num(*b)),
        other => Err(ExecutionError::at(
            format!(
                "operator `{}` cannot combine a series with a {}",
                op.symbol(),
                other.kind()
            ),
            line,
        )),
    }
}

/// Element-wise semantics: comparisons yield 1.0/0.0, logic treats nonzero
/// as true, and a non-finite division result becomes `NA` on that element.
fn apply_elementwise(op: TargetOp, x: f64, y: f64) -> f64 {
    use TargetOp::*;
    match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Div => {
            let v = x / y;
            if v.is_finite() {
                v
            } else {
                NA
            }
        }
        Rem => {
            let v = x % y;
            if v.is_finite() {
                v
            } else {
                NA
            }
        }
        Gt => bool_to_num(x > y),
        Ge => bool_to_num(x >= y),
        Lt => bool_to_num(x < y),
        Le => bool_to_num(x <= y),
        Eq => bool_to_num(x == y),
        Ne => bool_to_num(x != y),
        And => bool_to_num(x != 0.0 && y != 0.0),
        Or => bool_to_num(x != 0.0 || y != 0.0),
    }
}

fn scalar_binary(
    op: TargetOp,
    left: Value,
    right: Value,
    line: usize,
) -> Result<Value, ExecutionError> {
    use TargetOp::*;
    if matches!(op, And | Or) {
        let a = truthy(&left) != 0.0;
        let b = truthy(&right) != 0.0;
        return Ok(Value::Bool(if op == And { a && b } else { a || b }));
    }
    let x = scalar_num(&left, op, line)?;
    let y = scalar_num(&right, op, line)?;
    match op {
        Add => Ok(Value::Num(x + y)),
        Sub => Ok(Value::Num(x - y)),
        Mul => Ok(Value::Num(x * y)),
        // Scalar division has no warm-up to hide behind, so a non-finite
        // result is an error rather than NA.
        Div | Rem => {
            let v = if op == Div { x / y } else { x % y };
            if v.is_finite() {
                Ok(Value::Num(v))
            } else {
                Err(ExecutionError::at(
                    format!("division of {x} by {y} is not finite"),
                    line,
                ))
            }
        }
        Gt => Ok(Value::Bool(x > y)),
        Ge => Ok(Value::Bool(x >= y)),
        Lt => Ok(Value::Bool(x < y)),
        Le => Ok(Value::Bool(x <= y)),
        Eq => Ok(Value::Bool(x == y)),
        Ne => Ok(Value::Bool(x != y)),
        And | Or => unreachable!("handled above"),
    }
}

fn scalar_num(value: &Value, op: TargetOp, line: usize) -> Result<f64, ExecutionError> {
    match value {
        Value::Num(v) => Ok(*v),
        Value::Bool(b) => Ok(bool_to_num(*b)),
        other => Err(ExecutionError::at(
            format!(
                "operator `{}` is not defined for a {}",
                op.symbol(),
                other.kind()
            ),
            line,
        )),
    }
}
