//! Curvature tracking for DCP and DQCP analysis.
//!
//! The DCP part of an expression's curvature is one of `Constant`, `Affine`, `Convex`,
//! `Concave` or `Unknown`. The quasi variants only appear in the combined curvature reported
//! by [`Expr::curvature`](crate::expr::Expr::curvature) once the quasiconvexity facts are
//! folded in.

/// Curvature of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curvature {
    /// Constant value (most restrictive).
    Constant,
    /// Affine function (both convex and concave).
    Affine,
    /// Convex function.
    Convex,
    /// Concave function.
    Concave,
    /// Quasiconvex but neither convex nor quasiconcave.
    Quasiconvex,
    /// Quasiconcave but neither concave nor quasiconvex.
    Quasiconcave,
    /// Both quasiconvex and quasiconcave, not affine.
    Quasilinear,
    /// Unknown curvature (neither DCP nor DQCP).
    Unknown,
}

impl Curvature {
    /// Check if the curvature is convex (constant, affine, or convex).
    pub fn is_convex(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Convex)
    }

    /// Check if the curvature is concave (constant, affine, or concave).
    pub fn is_concave(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Concave)
    }

    /// Check if the curvature is affine (constant or affine).
    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }

    /// Check if this is a constant.
    pub fn is_constant(self) -> bool {
        matches!(self, Curvature::Constant)
    }

    /// Check if the curvature is DCP-compliant (anything but quasi or unknown).
    pub fn is_dcp(self) -> bool {
        self.is_convex() || self.is_concave()
    }

    /// Negate the curvature (convex <-> concave, quasiconvex <-> quasiconcave).
    pub fn negate(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            Curvature::Quasiconvex => Curvature::Quasiconcave,
            Curvature::Quasiconcave => Curvature::Quasiconvex,
            other => other,
        }
    }

    /// Fold a DCP curvature and quasi facts into one reported name.
    pub fn combine(dcp: Curvature, quasiconvex: bool, quasiconcave: bool) -> Self {
        if dcp.is_dcp() {
            return dcp;
        }
        match (quasiconvex, quasiconcave) {
            (true, true) => Curvature::Quasilinear,
            (true, false) => Curvature::Quasiconvex,
            (false, true) => Curvature::Quasiconcave,
            (false, false) => Curvature::Unknown,
        }
    }
}

impl std::fmt::Display for Curvature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Curvature::Constant => "CONSTANT",
            Curvature::Affine => "AFFINE",
            Curvature::Convex => "CONVEX",
            Curvature::Concave => "CONCAVE",
            Curvature::Quasiconvex => "QUASICONVEX",
            Curvature::Quasiconcave => "QUASICONCAVE",
            Curvature::Quasilinear => "QUASILINEAR",
            Curvature::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Combine DCP curvatures for addition: a + b.
///
/// Quasi curvatures are not closed under addition and combine to `Unknown`.
pub fn add_curvature(a: Curvature, b: Curvature) -> Curvature {
    use Curvature::*;
    match (a, b) {
        (Constant, x) | (x, Constant) if x.is_dcp() => x,
        (Affine, x) | (x, Affine) if x.is_dcp() => x,
        (Convex, Convex) => Convex,
        (Concave, Concave) => Concave,
        _ => Unknown,
    }
}

/// Combine curvatures for scalar multiplication: scalar * expr.
///
/// If scalar > 0: preserves curvature
/// If scalar < 0: negates curvature
/// If scalar == 0: constant
pub fn scalar_mul_curvature(scalar: f64, expr_curv: Curvature) -> Curvature {
    if scalar == 0.0 {
        Curvature::Constant
    } else if scalar > 0.0 {
        expr_curv
    } else {
        expr_curv.negate()
    }
}
