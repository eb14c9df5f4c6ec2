//! Expression algebra: a small, fixed domain-specific language over one
//! variable (`x`) and up to eight parameters. Nodes are a tagged sum type
//! (§9 "Expression AST with raw child pointers" redesign note); children are
//! boxed and exclusively owned, so structural clone/drop are ordinary
//! recursive traversals with no shared-ownership bookkeeping.

use crate::errors::{KolibriError, Result};

/// Maximum parameter index plus one - the fixed parameter-vector width.
pub const MAX_PARAMS: usize = 8;

const DIV_GUARD: f64 = 1e-9;
const POW_EPS: f64 = 1e-9;
const LOG_EPS: f64 = 1e-9;
const TANH_SATURATION: f64 = 20.0;
const EXP_CLIP: f64 = 20.0;

/// A binary operator node's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Pow,
}

impl BinOp {
    fn name(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::Pow => "pow",
        }
    }
}

/// A unary operator node's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Sin,
    Cos,
    Exp,
    Log,
    Tanh,
    Sigmoid,
    Abs,
}

impl UnOp {
    fn name(self) -> &'static str {
        match self {
            UnOp::Sin => "sin",
            UnOp::Cos => "cos",
            UnOp::Exp => "exp",
            UnOp::Log => "log",
            UnOp::Tanh => "tanh",
            UnOp::Sigmoid => "sigmoid",
            UnOp::Abs => "abs",
        }
    }
}

/// An expression node. Every `Bin` node owns two children; every `Un` node
/// owns exactly one; `Const`/`Param`/`VarX` are leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Const(f64),
    Param(u8),
    VarX,
    Bin(BinOp, Box<Node>, Box<Node>),
    Un(UnOp, Box<Node>),
}

impl Node {
    pub fn add(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Add, Box::new(a), Box::new(b))
    }
    pub fn sub(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Sub, Box::new(a), Box::new(b))
    }
    pub fn mul(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Mul, Box::new(a), Box::new(b))
    }
    pub fn div(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Div, Box::new(a), Box::new(b))
    }
    pub fn min(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Min, Box::new(a), Box::new(b))
    }
    pub fn max(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Max, Box::new(a), Box::new(b))
    }
    pub fn pow(a: Node, b: Node) -> Node {
        Node::Bin(BinOp::Pow, Box::new(a), Box::new(b))
    }
    pub fn sin(a: Node) -> Node {
        Node::Un(UnOp::Sin, Box::new(a))
    }
    pub fn cos(a: Node) -> Node {
        Node::Un(UnOp::Cos, Box::new(a))
    }
    pub fn exp(a: Node) -> Node {
        Node::Un(UnOp::Exp, Box::new(a))
    }
    pub fn log(a: Node) -> Node {
        Node::Un(UnOp::Log, Box::new(a))
    }
    pub fn tanh(a: Node) -> Node {
        Node::Un(UnOp::Tanh, Box::new(a))
    }
    pub fn sigmoid(a: Node) -> Node {
        Node::Un(UnOp::Sigmoid, Box::new(a))
    }
    pub fn abs(a: Node) -> Node {
        Node::Un(UnOp::Abs, Box::new(a))
    }

    /// Evaluate at `x` with the given parameter vector. `Param(i)` with
    /// `i >= params.len()` reads as `0.0`.
    pub fn eval(&self, params: &[f64], x: f64) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::Param(i) => params.get(*i as usize).copied().unwrap_or(0.0),
            Node::VarX => x,
            Node::Bin(op, a, b) => {
                let av = a.eval(params, x);
                let bv = b.eval(params, x);
                eval_bin(*op, av, bv)
            }
            Node::Un(op, a) => {
                let av = a.eval(params, x);
                eval_un(*op, av)
            }
        }
    }

    /// Evaluate and accumulate `∂f/∂param_i` into `grad_out` (cleared on
    /// entry). Returns the value. Forward-mode: each sub-evaluation returns
    /// `(value, d_value/d_param_i for each i)` implicitly via the shared
    /// `grad_out` buffer, built bottom-up.
    pub fn eval_grad(&self, params: &[f64], x: f64, grad_out: &mut [f64]) -> f64 {
        for g in grad_out.iter_mut() {
            *g = 0.0;
        }
        let mut scratch = vec![0.0f64; grad_out.len()];
        let value = self.eval_grad_rec(params, x, &mut scratch);
        grad_out.copy_from_slice(&scratch);
        value
    }

    fn eval_grad_rec(&self, params: &[f64], x: f64, grad: &mut [f64]) -> f64 {
        match self {
            Node::Const(v) => *v,
            Node::VarX => x,
            Node::Param(i) => {
                let idx = *i as usize;
                if idx < grad.len() {
                    grad[idx] = 1.0;
                }
                params.get(idx).copied().unwrap_or(0.0)
            }
            Node::Bin(op, a, b) => {
                let mut ga = vec![0.0f64; grad.len()];
                let mut gb = vec![0.0f64; grad.len()];
                let av = a.eval_grad_rec(params, x, &mut ga);
                let bv = b.eval_grad_rec(params, x, &mut gb);
                let value = eval_bin(*op, av, bv);
                let (da, db) = bin_partials(*op, av, bv);
                for i in 0..grad.len() {
                    grad[i] = da * ga[i] + db * gb[i];
                }
                value
            }
            Node::Un(op, a) => {
                let mut ga = vec![0.0f64; grad.len()];
                let av = a.eval_grad_rec(params, x, &mut ga);
                let value = eval_un(*op, av);
                let d = un_partial(*op, av);
                for i in 0..grad.len() {
                    grad[i] = d * ga[i];
                }
                value
            }
        }
    }

    /// Inclusive node count.
    pub fn complexity(&self) -> usize {
        match self {
            Node::Const(_) | Node::Param(_) | Node::VarX => 1,
            Node::Bin(_, a, b) => 1 + a.complexity() + b.complexity(),
            Node::Un(_, a) => 1 + a.complexity(),
        }
    }

    /// Highest parameter index referenced anywhere in the tree, or `None` if
    /// no `Param` node occurs. `param_count = max_param_index + 1`.
    pub fn max_param_index(&self) -> Option<u8> {
        match self {
            Node::Const(_) | Node::VarX => None,
            Node::Param(i) => Some(*i),
            Node::Bin(_, a, b) => std::cmp::max(a.max_param_index(), b.max_param_index()),
            Node::Un(_, a) => a.max_param_index(),
        }
    }

    /// Canonical, deterministic render: constants via `%.6g`, parameters as
    /// `cN`, `x` for the variable, unary as `name(arg)`, binary arithmetic
    /// as `(a OP b)`, `min`/`max` as `name(a,b)`.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        self.render_into(&mut out)?;
        if out.len() > 255 {
            return Err(KolibriError::EncodingOverflow {
                what: "formula render",
                limit: 255,
            });
        }
        Ok(out)
    }

    fn render_into(&self, out: &mut String) -> Result<()> {
        match self {
            Node::Const(v) => {
                out.push_str(&format_g6(*v));
                Ok(())
            }
            Node::Param(i) => {
                out.push('c');
                out.push_str(&i.to_string());
                Ok(())
            }
            Node::VarX => {
                out.push('x');
                Ok(())
            }
            Node::Bin(op, a, b) => match op {
                BinOp::Min | BinOp::Max => {
                    out.push_str(op.name());
                    out.push('(');
                    a.render_into(out)?;
                    out.push(',');
                    b.render_into(out)?;
                    out.push(')');
                    Ok(())
                }
                _ => {
                    out.push('(');
                    a.render_into(out)?;
                    out.push(' ');
                    out.push_str(op.name());
                    out.push(' ');
                    b.render_into(out)?;
                    out.push(')');
                    Ok(())
                }
            },
            Node::Un(op, a) => {
                out.push_str(op.name());
                out.push('(');
                a.render_into(out)?;
                out.push(')');
                Ok(())
            }
        }
    }
}

fn format_g6(v: f64) -> String {
    // %.6g equivalent: six significant digits, trailing zeros stripped.
    if v == 0.0 {
        return "0".to_string();
    }
    let exp10 = v.abs().log10().floor() as i32;
    let decimals = (6 - 1 - exp10).max(0) as usize;
    let s = format!("{:.*}", decimals, v);
    let s = if s.contains('.') {
        let t = s.trim_end_matches('0').trim_end_matches('.');
        if t.is_empty() || t == "-" {
            "0".to_string()
        } else {
            t.to_string()
        }
    } else {
        s
    };
    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

fn eval_bin(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b.abs() < DIV_GUARD {
                0.0
            } else {
                a / b
            }
        }
        BinOp::Min => a.min(b),
        BinOp::Max => a.max(b),
        BinOp::Pow => (a.abs() + POW_EPS).powf(b),
    }
}

/// Partial derivatives `(df/da, df/db)` at the already-evaluated point,
/// matching the guarded forms `eval_bin` uses.
fn bin_partials(op: BinOp, a: f64, b: f64) -> (f64, f64) {
    match op {
        BinOp::Add => (1.0, 1.0),
        BinOp::Sub => (1.0, -1.0),
        BinOp::Mul => (b, a),
        BinOp::Div => {
            if b.abs() < DIV_GUARD {
                (0.0, 0.0)
            } else {
                (1.0 / b, -a / (b * b))
            }
        }
        BinOp::Min => {
            if a <= b {
                (1.0, 0.0)
            } else {
                (0.0, 1.0)
            }
        }
        BinOp::Max => {
            if a >= b {
                (1.0, 0.0)
            } else {
                (0.0, 1.0)
            }
        }
        BinOp::Pow => {
            let base = a.abs() + POW_EPS;
            let sign = if a < 0.0 { -1.0 } else { 1.0 };
            let d_da = b * base.powf(b - 1.0) * sign;
            let d_db = base.powf(b) * base.ln();
            (d_da, d_db)
        }
    }
}

fn eval_un(op: UnOp, a: f64) -> f64 {
    match op {
        UnOp::Sin => a.sin(),
        UnOp::Cos => a.cos(),
        UnOp::Exp => a.clamp(-EXP_CLIP, EXP_CLIP).exp(),
        UnOp::Log => a.abs().max(LOG_EPS).ln(),
        UnOp::Tanh => {
            if a.abs() > TANH_SATURATION {
                a.signum()
            } else {
                a.tanh()
            }
        }
        UnOp::Sigmoid => 1.0 / (1.0 + (-a).exp()),
        UnOp::Abs => a.abs(),
    }
}

fn un_partial(op: UnOp, a: f64) -> f64 {
    match op {
        UnOp::Sin => a.cos(),
        UnOp::Cos => -a.sin(),
        UnOp::Exp => {
            if a.abs() > EXP_CLIP {
                0.0
            } else {
                a.exp()
            }
        }
        UnOp::Log => {
            if a.abs() < LOG_EPS {
                0.0
            } else {
                a.signum() / a.abs()
            }
        }
        UnOp::Tanh => {
            if a.abs() > TANH_SATURATION {
                0.0
            } else {
                let t = a.tanh();
                1.0 - t * t
            }
        }
        UnOp::Sigmoid => {
            let s = 1.0 / (1.0 + (-a).exp());
            s * (1.0 - s)
        }
        UnOp::Abs => a.signum(),
    }
}
