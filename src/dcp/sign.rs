//! Sign tracking for DCP and DQCP analysis.
//!
//! Signs decide atom monotonicity (e.g. `abs` is increasing on nonnegative input) and are
//! carried into the threshold parameter of a quasiconvex objective.

use crate::expr::Array;

/// Sign of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Expression is always >= 0.
    Nonnegative,
    /// Expression is always <= 0.
    Nonpositive,
    /// Expression is always == 0.
    Zero,
    /// Sign is unknown.
    Unknown,
}

impl Sign {
    /// Check if the sign is non-negative (>= 0).
    pub fn is_nonneg(self) -> bool {
        matches!(self, Sign::Nonnegative | Sign::Zero)
    }

    /// Check if the sign is non-positive (<= 0).
    pub fn is_nonpos(self) -> bool {
        matches!(self, Sign::Nonpositive | Sign::Zero)
    }

    /// Check if the sign is zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Sign::Zero)
    }

    /// True when either direction is known.
    pub fn is_known(self) -> bool {
        !matches!(self, Sign::Unknown)
    }

    /// Negate the sign.
    pub fn negate(self) -> Self {
        match self {
            Sign::Nonnegative => Sign::Nonpositive,
            Sign::Nonpositive => Sign::Nonnegative,
            Sign::Zero => Sign::Zero,
            Sign::Unknown => Sign::Unknown,
        }
    }

    /// Sign of a numeric value (all entries).
    pub fn of_array(value: &Array) -> Self {
        let data = value.as_slice();
        if data.iter().all(|&v| v == 0.0) {
            Sign::Zero
        } else if value.is_nonneg() {
            Sign::Nonnegative
        } else if value.is_nonpos() {
            Sign::Nonpositive
        } else {
            Sign::Unknown
        }
    }

    /// Sign from `nonneg`/`nonpos` attributes of a leaf.
    pub fn from_attrs(nonneg: bool, nonpos: bool) -> Self {
        match (nonneg, nonpos) {
            (true, true) => Sign::Zero,
            (true, false) => Sign::Nonnegative,
            (false, true) => Sign::Nonpositive,
            (false, false) => Sign::Unknown,
        }
    }
}

/// Combine signs for addition: a + b.
pub fn add_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        // Zero doesn't change sign
        (Zero, x) | (x, Zero) => x,
        (Nonnegative, Nonnegative) => Nonnegative,
        (Nonpositive, Nonpositive) => Nonpositive,
        _ => Unknown,
    }
}

/// Combine signs for multiplication: a * b.
pub fn mul_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        // Zero times anything is zero
        (Zero, _) | (_, Zero) => Zero,
        (Nonnegative, Nonnegative) | (Nonpositive, Nonpositive) => Nonnegative,
        (Nonnegative, Nonpositive) | (Nonpositive, Nonnegative) => Nonpositive,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Combine signs for division: a / b. Division by zero has no sign.
pub fn div_sign(a: Sign, b: Sign) -> Sign {
    if b.is_zero() {
        Sign::Unknown
    } else {
        mul_sign(a, b)
    }
}

/// Sign of an elementwise maximum.
///
/// One argument at or above zero bounds the maximum below by zero; if every argument is also
/// at or below zero the maximum is exactly zero.
pub fn max_sign(signs: impl IntoIterator<Item = Sign>) -> Sign {
    let signs: Vec<Sign> = signs.into_iter().collect();
    let bounded_below = signs.iter().any(|s| s.is_nonneg());
    let bounded_above = signs.iter().all(|s| s.is_nonpos());
    match (bounded_below, bounded_above) {
        (true, true) => Sign::Zero,
        (true, false) => Sign::Nonnegative,
        (false, true) => Sign::Nonpositive,
        (false, false) => Sign::Unknown,
    }
}

/// Sign of an elementwise minimum.
pub fn min_sign(signs: impl IntoIterator<Item = Sign>) -> Sign {
    max_sign(signs.into_iter().map(Sign::negate)).negate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Array;

    #[test]
    fn test_add_sign() {
        use Sign::*;
        assert_eq!(add_sign(Nonnegative, Nonnegative), Nonnegative);
        assert_eq!(add_sign(Nonpositive, Zero), Nonpositive);
        assert_eq!(add_sign(Nonnegative, Nonpositive), Unknown);
    }

    #[test]
    fn test_mul_div_sign() {
        use Sign::*;
        assert_eq!(mul_sign(Nonpositive, Nonpositive), Nonnegative);
        assert_eq!(mul_sign(Zero, Unknown), Zero);
        assert_eq!(div_sign(Nonnegative, Nonpositive), Nonpositive);
        assert_eq!(div_sign(Nonnegative, Zero), Unknown);
    }

    #[test]
    fn test_max_min_sign() {
        use Sign::*;
        assert_eq!(max_sign([Unknown, Nonnegative]), Nonnegative);
        assert_eq!(max_sign([Nonpositive, Unknown]), Unknown);
        assert_eq!(min_sign([Unknown, Nonpositive]), Nonpositive);
        assert_eq!(min_sign([Nonnegative, Zero]), Zero);
        assert_eq!(min_sign([Nonnegative, Nonnegative]), Nonnegative);
    }

    #[test]
    fn test_max_min_sign_keep_zero() {
        use Sign::*;
        assert_eq!(max_sign([Nonpositive, Zero]), Zero);
        assert_eq!(max_sign([Nonnegative, Zero]), Nonnegative);
        assert_eq!(max_sign([Zero, Zero]), Zero);
        assert_eq!(min_sign([Nonpositive, Zero]), Nonpositive);
        assert_eq!(max_sign([Nonpositive, Nonpositive]), Nonpositive);
    }

    #[test]
    fn test_of_array() {
        assert_eq!(Sign::of_array(&Array::Scalar(0.0)), Sign::Zero);
        assert_eq!(Sign::of_array(&Array::from(vec![1.0, 0.0])), Sign::Nonnegative);
        assert_eq!(Sign::of_array(&Array::from(vec![1.0, -1.0])), Sign::Unknown);
    }
}
