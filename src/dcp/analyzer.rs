//! Bottom-up curvature, quasiconvexity and sign analysis.
//!
//! Every node gets a [`Facts`] record computed from its children's facts and a per-atom rule
//! table: the atom's intrinsic curvature, its monotonicity in each argument (which may depend
//! on the sign of that or another argument) and its sign. Facts are memoized per node address
//! for the lifetime of one [`Analyzer`], so a subexpression shared by many parents is analyzed
//! once.

use std::collections::HashMap;
use std::marker::PhantomData;

use super::curvature::{add_curvature, Curvature};
use super::sign::{add_sign, div_sign, max_sign, min_sign, mul_sign, Sign};
use crate::expr::Expr;

/// Analysis result for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facts {
    /// DCP curvature: one of `Constant`, `Affine`, `Convex`, `Concave`, `Unknown`.
    pub curvature: Curvature,
    pub quasiconvex: bool,
    pub quasiconcave: bool,
    pub sign: Sign,
}

impl Facts {
    fn constant(sign: Sign) -> Self {
        Facts {
            curvature: Curvature::Constant,
            quasiconvex: true,
            quasiconcave: true,
            sign,
        }
    }

    fn affine(sign: Sign) -> Self {
        Facts {
            curvature: Curvature::Affine,
            quasiconvex: true,
            quasiconcave: true,
            sign,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.curvature.is_constant()
    }

    pub fn is_affine(&self) -> bool {
        self.curvature.is_affine()
    }

    pub fn is_convex(&self) -> bool {
        self.curvature.is_convex()
    }

    pub fn is_concave(&self) -> bool {
        self.curvature.is_concave()
    }

    pub fn is_dcp(&self) -> bool {
        self.curvature.is_dcp()
    }

    pub fn is_dqcp(&self) -> bool {
        self.quasiconvex || self.quasiconcave
    }

    /// The combined curvature name, including the quasi variants.
    pub fn reported(&self) -> Curvature {
        Curvature::combine(self.curvature, self.quasiconvex, self.quasiconcave)
    }
}

/// Monotonicity of an atom in one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    Increasing,
    Decreasing,
    Nonmonotonic,
}

impl Monotonicity {
    fn by_sign(sign: Sign) -> Self {
        if sign.is_nonneg() {
            Monotonicity::Increasing
        } else if sign.is_nonpos() {
            Monotonicity::Decreasing
        } else {
            Monotonicity::Nonmonotonic
        }
    }

    pub fn is_incr(self) -> bool {
        self == Monotonicity::Increasing
    }

    pub fn is_decr(self) -> bool {
        self == Monotonicity::Decreasing
    }
}

/// Memoizing analyzer over one expression tree.
///
/// The lifetime ties the memo (keyed by node address) to the tree it was built over.
#[derive(Debug)]
pub struct Analyzer<'a> {
    memo: HashMap<*const Expr, Facts>,
    _tree: PhantomData<&'a Expr>,
}

impl<'a> Default for Analyzer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Analyzer<'a> {
    pub fn new() -> Self {
        Analyzer {
            memo: HashMap::new(),
            _tree: PhantomData,
        }
    }

    /// Facts for `expr`, computed once per node.
    pub fn facts(&mut self, expr: &'a Expr) -> Facts {
        let key = expr as *const Expr;
        if let Some(facts) = self.memo.get(&key) {
            return *facts;
        }
        let args: Vec<Facts> = expr.children().into_iter().map(|c| self.facts(c)).collect();
        let facts = node_facts(expr, &args);
        self.memo.insert(key, facts);
        facts
    }

    /// Number of distinct nodes analyzed so far.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

fn node_facts(expr: &Expr, args: &[Facts]) -> Facts {
    match expr {
        Expr::Variable(v) => return Facts::affine(Sign::from_attrs(v.nonneg, v.nonpos)),
        Expr::Parameter(p) => return Facts::constant(Sign::from_attrs(p.nonneg, p.nonpos)),
        Expr::Constant(c) => return Facts::constant(Sign::of_array(&c.value)),
        _ => {}
    }

    let sign = atom_sign(expr, args);
    if args.iter().all(Facts::is_constant) {
        return Facts::constant(sign);
    }

    let curvature = dcp_curvature(expr, args);
    let quasiconvex = curvature.is_convex() || quasi_rule(expr, args, Direction::Convex);
    let quasiconcave = curvature.is_concave() || quasi_rule(expr, args, Direction::Concave);
    Facts {
        curvature,
        quasiconvex,
        quasiconcave,
        sign,
    }
}

/// Sign of a node from its argument signs.
fn atom_sign(expr: &Expr, args: &[Facts]) -> Sign {
    let s = |i: usize| args.get(i).map_or(Sign::Unknown, |f| f.sign);
    match expr {
        Expr::Add(..) => add_sign(s(0), s(1)),
        Expr::Neg(_) => s(0).negate(),
        Expr::Mul(..) | Expr::MatMul(..) => mul_sign(s(0), s(1)),
        Expr::Div(..) => div_sign(s(0), s(1)),
        Expr::Sum(_) | Expr::Index(..) | Expr::Ceil(_) | Expr::Floor(_) | Expr::Sign(_) => s(0),
        Expr::MaxEntries(_) => max_sign([s(0)]),
        Expr::MinEntries(_) => min_sign([s(0)]),
        Expr::Maximum(_) => max_sign(args.iter().map(|f| f.sign)),
        Expr::Minimum(_) => min_sign(args.iter().map(|f| f.sign)),
        Expr::Abs(_)
        | Expr::Pos(_)
        | Expr::NegPart(_)
        | Expr::Norm2(_)
        | Expr::SumSquares(_)
        | Expr::Exp(_)
        | Expr::Logistic(_)
        | Expr::Length(_)
        | Expr::DistRatio(..) => Sign::Nonnegative,
        Expr::Power(_, p) if *p == 1.0 => s(0),
        Expr::Power(..) => Sign::Nonnegative,
        Expr::Log(_) | Expr::Inverse(..) => Sign::Unknown,
        Expr::Variable(_) | Expr::Parameter(_) | Expr::Constant(_) => Sign::Unknown,
    }
}

/// Intrinsic curvature of a nonlinear atom, `None` for affine and quasi atoms.
fn atom_curvature(expr: &Expr) -> Option<Curvature> {
    match expr {
        Expr::Abs(_)
        | Expr::Pos(_)
        | Expr::NegPart(_)
        | Expr::Maximum(_)
        | Expr::MaxEntries(_)
        | Expr::Norm2(_)
        | Expr::SumSquares(_)
        | Expr::Exp(_)
        | Expr::Logistic(_) => Some(Curvature::Convex),
        Expr::Minimum(_) | Expr::MinEntries(_) | Expr::Log(_) => Some(Curvature::Concave),
        Expr::Power(_, p) => Some(if *p == 1.0 {
            Curvature::Affine
        } else if *p > 0.0 && *p < 1.0 {
            Curvature::Concave
        } else {
            Curvature::Convex
        }),
        _ => None,
    }
}

/// Monotonicity of `expr` in argument `i`, given the facts of all arguments.
pub(crate) fn monotonicity(expr: &Expr, args: &[Facts], i: usize) -> Monotonicity {
    use Monotonicity::*;
    let s = |j: usize| args.get(j).map_or(Sign::Unknown, |f| f.sign);
    match expr {
        Expr::Add(..)
        | Expr::Sum(_)
        | Expr::Index(..)
        | Expr::Pos(_)
        | Expr::Maximum(_)
        | Expr::Minimum(_)
        | Expr::MaxEntries(_)
        | Expr::MinEntries(_)
        | Expr::Exp(_)
        | Expr::Log(_)
        | Expr::Logistic(_)
        | Expr::Ceil(_)
        | Expr::Floor(_)
        | Expr::Sign(_) => Increasing,
        Expr::Neg(_) | Expr::NegPart(_) => Decreasing,
        Expr::Abs(_) | Expr::Norm2(_) | Expr::SumSquares(_) | Expr::Length(_) => {
            Monotonicity::by_sign(s(0))
        }
        Expr::Power(_, p) => {
            let p = *p;
            if p < 0.0 {
                Decreasing
            } else if p <= 1.0 {
                Increasing
            } else {
                Monotonicity::by_sign(s(0))
            }
        }
        Expr::Mul(..) => Monotonicity::by_sign(s(1 - i.min(1))),
        Expr::Div(..) => {
            if i == 0 {
                Monotonicity::by_sign(s(1))
            } else {
                match Monotonicity::by_sign(s(0)) {
                    Increasing => Decreasing,
                    Decreasing => Increasing,
                    Nonmonotonic => Nonmonotonic,
                }
            }
        }
        _ => Nonmonotonic,
    }
}

fn dcp_curvature(expr: &Expr, args: &[Facts]) -> Curvature {
    let c = |i: usize| args.get(i).map_or(Curvature::Unknown, |f| f.curvature);
    match expr {
        Expr::Add(..) => add_curvature(c(0), c(1)),
        Expr::Neg(_) => c(0).negate(),
        Expr::Sum(_) | Expr::Index(..) => c(0),
        Expr::Mul(..) | Expr::MatMul(..) => {
            if args[0].is_constant() {
                scale_curvature(args[0].sign, c(1))
            } else if args[1].is_constant() {
                scale_curvature(args[1].sign, c(0))
            } else {
                Curvature::Unknown
            }
        }
        Expr::Div(..) => {
            if args[1].is_constant() && !args[1].sign.is_zero() {
                scale_curvature(args[1].sign, c(0))
            } else {
                Curvature::Unknown
            }
        }
        Expr::Power(_, p) if *p == 0.0 => Curvature::Constant,
        _ => match atom_curvature(expr) {
            Some(Curvature::Affine) => c(0),
            Some(Curvature::Convex) if composes(expr, args, Direction::Convex) => {
                Curvature::Convex
            }
            Some(Curvature::Concave) if composes(expr, args, Direction::Concave) => {
                Curvature::Concave
            }
            _ => Curvature::Unknown,
        },
    }
}

/// Curvature of `constant * arg`, where the constant has sign `sign`.
fn scale_curvature(sign: Sign, arg: Curvature) -> Curvature {
    match sign {
        Sign::Zero => Curvature::Constant,
        Sign::Nonnegative => arg,
        Sign::Nonpositive => arg.negate(),
        Sign::Unknown if arg.is_affine() => arg,
        Sign::Unknown => Curvature::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Convex,
    Concave,
}

/// DCP composition: every argument is affine, or curves the same way where the atom is
/// increasing, or the opposite way where it is decreasing.
fn composes(expr: &Expr, args: &[Facts], dir: Direction) -> bool {
    args.iter().enumerate().all(|(i, arg)| {
        if arg.is_affine() {
            return true;
        }
        let mono = monotonicity(expr, args, i);
        let (same, opposite) = match dir {
            Direction::Convex => (arg.is_convex(), arg.is_concave()),
            Direction::Concave => (arg.is_concave(), arg.is_convex()),
        };
        (same && mono.is_incr()) || (opposite && mono.is_decr())
    })
}

fn quasi_rule(expr: &Expr, args: &[Facts], dir: Direction) -> bool {
    let is_quasi = |f: &Facts| match dir {
        Direction::Convex => f.quasiconvex,
        Direction::Concave => f.quasiconcave,
    };
    let is_opposite_quasi = |f: &Facts| match dir {
        Direction::Convex => f.quasiconcave,
        Direction::Concave => f.quasiconvex,
    };

    let max_family = match dir {
        Direction::Convex => matches!(expr, Expr::Maximum(_) | Expr::MaxEntries(_)),
        Direction::Concave => matches!(expr, Expr::Minimum(_) | Expr::MinEntries(_)),
    };
    if max_family && args.iter().all(is_quasi) {
        return true;
    }

    // A scalar function of one non-constant scalar argument, monotone in it.
    let children = expr.children();
    let non_constant: Vec<usize> = (0..args.len()).filter(|&i| !args[i].is_constant()).collect();
    if let [i] = non_constant[..] {
        let arg_scalar = children[i].shape().is_scalar() || matches!(expr, Expr::Index(..));
        if expr.shape().is_scalar() && arg_scalar {
            let mono = monotonicity(expr, args, i);
            if (mono.is_incr() && is_quasi(&args[i]))
                || (mono.is_decr() && is_opposite_quasi(&args[i]))
            {
                return true;
            }
        }
    }

    quasi_atom(expr, args, dir) && composes(expr, args, dir)
}

/// True if the atom itself is quasiconvex (or quasiconcave) in its arguments.
fn quasi_atom(expr: &Expr, args: &[Facts], dir: Direction) -> bool {
    match expr {
        Expr::Ceil(_) | Expr::Floor(_) => true,
        Expr::Sign(a) => a.shape().is_scalar(),
        Expr::Length(_) => dir == Direction::Convex,
        Expr::DistRatio(..) => dir == Direction::Convex && args[0].is_affine(),
        Expr::Mul(..) => {
            let (a, b) = (args[0], args[1]);
            if a.is_constant() || b.is_constant() {
                return false;
            }
            let same = (a.sign.is_nonneg() && b.sign.is_nonneg())
                || (a.sign.is_nonpos() && b.sign.is_nonpos());
            let opposite = (a.sign.is_nonneg() && b.sign.is_nonpos())
                || (a.sign.is_nonpos() && b.sign.is_nonneg());
            match dir {
                Direction::Convex => opposite,
                Direction::Concave => same,
            }
        }
        Expr::Div(..) => !args[1].is_constant() && args[1].sign.is_known() && !args[1].sign.is_zero(),
        _ => match atom_curvature(expr) {
            Some(Curvature::Convex) => dir == Direction::Convex,
            Some(Curvature::Concave) => dir == Direction::Concave,
            _ => false,
        },
    }
}

impl Expr {
    /// Analysis facts for this expression (fresh analyzer).
    pub fn facts(&self) -> Facts {
        Analyzer::new().facts(self)
    }

    /// Combined curvature, including quasi variants.
    pub fn curvature(&self) -> Curvature {
        self.facts().reported()
    }

    pub fn sign(&self) -> Sign {
        self.facts().sign
    }

    /// Check if the expression is provably non-negative.
    pub fn is_nonneg(&self) -> bool {
        self.sign().is_nonneg()
    }

    /// Check if the expression is provably non-positive.
    pub fn is_nonpos(&self) -> bool {
        self.sign().is_nonpos()
    }

    /// Check if the expression is convex under the DCP rules.
    pub fn is_convex(&self) -> bool {
        self.facts().is_convex()
    }

    /// Check if the expression is concave under the DCP rules.
    pub fn is_concave(&self) -> bool {
        self.facts().is_concave()
    }

    /// Check if the expression is affine.
    pub fn is_affine(&self) -> bool {
        self.facts().is_affine()
    }

    pub fn is_quasiconvex(&self) -> bool {
        self.facts().quasiconvex
    }

    pub fn is_quasiconcave(&self) -> bool {
        self.facts().quasiconcave
    }

    pub fn is_quasilinear(&self) -> bool {
        let f = self.facts();
        f.quasiconvex && f.quasiconcave
    }

    /// Check if the expression is DCP (convex or concave).
    pub fn is_dcp(&self) -> bool {
        self.facts().is_dcp()
    }

    /// Check if the expression is DQCP (quasiconvex or quasiconcave).
    pub fn is_dqcp(&self) -> bool {
        self.facts().is_dqcp()
    }
}
