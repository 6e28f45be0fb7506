//! # Expression Module
//!
//! A small arithmetic expression language for per-frame filter parameters.
//!
//! Expressions are compiled once against an ordered list of variable names and
//! then evaluated many times against a slice of values in the same order:
//!
//! ```rust
//! use yuv_hue::expr::Expr;
//!
//! let expr = Expr::compile("90 * sin(2*PI*t)", &["n", "t"]).unwrap();
//! let value = expr.eval(&[0.0, 0.25]);
//! assert!((value - 90.0).abs() < 1e-9);
//! ```
//!
//! The grammar covers the usual `+ - * / ^` operators, parentheses, `;`
//! sequences and a set of math and comparison functions. Evaluation is pure
//! and total: division by zero and domain errors produce infinities or NaN,
//! never a panic.

mod parser;

use std::fmt;

use thiserror::Error;

/// Errors reported while compiling an expression.
///
/// Offsets are byte positions into the source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number '{text}' at offset {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("undefined constant or missing '(' in '{name}' at offset {pos}")]
    UnknownIdentifier { name: String, pos: usize },

    #[error("unknown function '{name}' at offset {pos}")]
    UnknownFunction { name: String, pos: usize },

    #[error("function '{name}' takes {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("missing ')' at offset {pos}")]
    UnbalancedParen { pos: usize },

    #[error("invalid trailing input at offset {pos}")]
    Trailing { pos: usize },
}

/// A compiled expression, ready for repeated evaluation.
#[derive(Clone, PartialEq)]
pub struct Expr {
    text: String,
    root: Node,
}

impl Expr {
    /// Compile `text`, resolving identifiers against `var_names`.
    ///
    /// The index of a name in `var_names` is the index of its value in the
    /// slice later passed to [`Expr::eval`]. Variable names take precedence
    /// over the built-in constants `PI`, `E` and `PHI`.
    pub fn compile(text: &str, var_names: &[&str]) -> Result<Self, ExprError> {
        let root = parser::Parser::new(text, var_names).parse()?;
        Ok(Self {
            text: text.to_string(),
            root,
        })
    }

    /// Evaluate against variable values ordered like the names given at
    /// compile time. Missing values read as NaN.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.root.eval(values)
    }

    /// The source text this expression was compiled from
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the expression reads any variable at all
    pub fn is_constant(&self) -> bool {
        !self.root.reads_variables()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.text).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Abs,
    Sqrt,
    Floor,
    Ceil,
    Trunc,
    Round,
    Squish,
    Gauss,
    IsNan,
    IsInf,
    Not,
    Mod,
    Max,
    Min,
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    Pow,
    Hypot,
    Atan2,
    If,
    IfNot,
    Between,
    Clip,
}

impl Func {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "abs" => Self::Abs,
            "sqrt" => Self::Sqrt,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "trunc" => Self::Trunc,
            "round" => Self::Round,
            "squish" => Self::Squish,
            "gauss" => Self::Gauss,
            "isnan" => Self::IsNan,
            "isinf" => Self::IsInf,
            "not" => Self::Not,
            "mod" => Self::Mod,
            "max" => Self::Max,
            "min" => Self::Min,
            "eq" => Self::Eq,
            "gte" => Self::Gte,
            "gt" => Self::Gt,
            "lte" => Self::Lte,
            "lt" => Self::Lt,
            "pow" => Self::Pow,
            "hypot" => Self::Hypot,
            "atan2" => Self::Atan2,
            "if" => Self::If,
            "ifnot" => Self::IfNot,
            "between" => Self::Between,
            "clip" => Self::Clip,
            _ => return None,
        };
        Some(func)
    }

    /// Accepted argument counts as (min, max, human readable)
    pub(crate) fn arity(self) -> (usize, usize, &'static str) {
        match self {
            Self::Mod
            | Self::Max
            | Self::Min
            | Self::Eq
            | Self::Gte
            | Self::Gt
            | Self::Lte
            | Self::Lt
            | Self::Pow
            | Self::Hypot
            | Self::Atan2 => (2, 2, "2"),
            Self::If | Self::IfNot => (2, 3, "2 or 3"),
            Self::Between | Self::Clip => (3, 3, "3"),
            _ => (1, 1, "1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Const(f64),
    Var(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
    Seq(Vec<Node>),
}

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

impl Node {
    fn reads_variables(&self) -> bool {
        match self {
            Node::Const(_) => false,
            Node::Var(_) => true,
            Node::Neg(inner) => inner.reads_variables(),
            Node::Binary(_, a, b) => a.reads_variables() || b.reads_variables(),
            Node::Call(_, args) | Node::Seq(args) => args.iter().any(Node::reads_variables),
        }
    }

    fn eval(&self, vars: &[f64]) -> f64 {
        match self {
            Node::Const(value) => *value,
            Node::Var(index) => vars.get(*index).copied().unwrap_or(f64::NAN),
            Node::Neg(inner) => -inner.eval(vars),
            Node::Binary(op, a, b) => {
                let (a, b) = (a.eval(vars), b.eval(vars));
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b != 0.0 {
                            a / b
                        } else {
                            a * f64::INFINITY
                        }
                    }
                    BinOp::Pow => a.powf(b),
                }
            }
            Node::Seq(items) => items
                .iter()
                .fold(f64::NAN, |_, item| item.eval(vars)),
            Node::Call(func, args) => Self::call(*func, args, vars),
        }
    }

    fn call(func: Func, args: &[Node], vars: &[f64]) -> f64 {
        let arg = |i: usize| args.get(i).map_or(f64::NAN, |node| node.eval(vars));

        match func {
            // Branches are evaluated lazily
            Func::If => {
                if arg(0) != 0.0 {
                    arg(1)
                } else if args.len() > 2 {
                    arg(2)
                } else {
                    0.0
                }
            }
            Func::IfNot => {
                if arg(0) == 0.0 {
                    arg(1)
                } else if args.len() > 2 {
                    arg(2)
                } else {
                    0.0
                }
            }
            Func::Between => {
                let x = arg(0);
                truth(x >= arg(1) && x <= arg(2))
            }
            Func::Clip => {
                let (x, min, max) = (arg(0), arg(1), arg(2));
                if x.is_nan() || min.is_nan() || max.is_nan() || min > max {
                    f64::NAN
                } else {
                    x.clamp(min, max)
                }
            }
            Func::Mod => {
                let (a, b) = (arg(0), arg(1));
                a - (a / b).floor() * b
            }
            Func::Max => {
                let (a, b) = (arg(0), arg(1));
                if a > b {
                    a
                } else {
                    b
                }
            }
            Func::Min => {
                let (a, b) = (arg(0), arg(1));
                if a < b {
                    a
                } else {
                    b
                }
            }
            Func::Eq => truth(arg(0) == arg(1)),
            Func::Gte => truth(arg(0) >= arg(1)),
            Func::Gt => truth(arg(0) > arg(1)),
            Func::Lte => truth(arg(0) <= arg(1)),
            Func::Lt => truth(arg(0) < arg(1)),
            Func::Pow => arg(0).powf(arg(1)),
            Func::Hypot => arg(0).hypot(arg(1)),
            Func::Atan2 => arg(0).atan2(arg(1)),
            unary => {
                let x = arg(0);
                match unary {
                    Func::Sin => x.sin(),
                    Func::Cos => x.cos(),
                    Func::Tan => x.tan(),
                    Func::Asin => x.asin(),
                    Func::Acos => x.acos(),
                    Func::Atan => x.atan(),
                    Func::Sinh => x.sinh(),
                    Func::Cosh => x.cosh(),
                    Func::Tanh => x.tanh(),
                    Func::Exp => x.exp(),
                    Func::Log => x.ln(),
                    Func::Abs => x.abs(),
                    Func::Sqrt => x.sqrt(),
                    Func::Floor => x.floor(),
                    Func::Ceil => x.ceil(),
                    Func::Trunc => x.trunc(),
                    Func::Round => x.round(),
                    Func::Squish => 1.0 / (1.0 + (4.0 * x).exp()),
                    Func::Gauss => (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt(),
                    Func::IsNan => truth(x.is_nan()),
                    Func::IsInf => truth(x.is_infinite()),
                    Func::Not => truth(x == 0.0),
                    _ => f64::NAN,
                }
            }
        }
    }
}
