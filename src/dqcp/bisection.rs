//! Bisection on the threshold of a quasiconvex objective.
//!
//! Minimizing a quasiconvex `f` is a sequence of convex feasibility problems: is there an
//! `x` with `f(x) <= t`? Feasibility is monotone in `t`, so the optimum is found by
//! bisection. When the caller gives no interval the driver first searches outward until it has
//! an infeasible lower end and a feasible upper end.

use tracing::{debug, trace};

use super::tighten::Tightening;
use crate::error::{CvxError, Result};

/// Answers "is the sublevel set at threshold `t` nonempty?".
pub trait FeasibilityOracle {
    /// A witness for a feasible threshold.
    type Point;

    /// Checked once before bisection. Returning `false` reports the problem infeasible.
    fn precheck(&mut self) -> Result<bool> {
        Ok(true)
    }

    /// Solve the feasibility problem at `t`. `None` means infeasible.
    fn solve_at(&mut self, t: f64) -> Result<Option<Self::Point>>;
}

/// Tuning knobs for the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BisectionSettings {
    /// Stop once the bracket is at most this wide.
    pub tolerance: f64,
    /// Growth of the bracket width per expansion step.
    pub expansion_factor: f64,
    /// Expansion steps per side before giving up.
    pub max_expansions: usize,
}

impl Default for BisectionSettings {
    fn default() -> Self {
        BisectionSettings {
            tolerance: 1e-3,
            expansion_factor: 2.0,
            max_expansions: 64,
        }
    }
}

/// Where the driver is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Probing,
    Narrowing,
    Converged,
    Infeasible,
    Unbounded,
    IterExceeded,
}

/// Optional caller-supplied bounds on the optimal value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Interval {
    pub low: Option<f64>,
    pub high: Option<f64>,
}

impl Interval {
    pub fn new(low: Option<f64>, high: Option<f64>) -> Self {
        Interval { low, high }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BisectionOutcome<P> {
    /// `high` is feasible with witness `point`; the optimum lies in `[low, high]`.
    Converged {
        low: f64,
        high: f64,
        point: P,
        iterations: usize,
    },
    Infeasible,
    Unbounded,
}

struct Driver<'a, O: FeasibilityOracle> {
    oracle: &'a mut O,
    phase: Phase,
    solves: usize,
}

impl<'a, O: FeasibilityOracle> Driver<'a, O> {
    fn solve_at(&mut self, t: f64) -> Result<Option<O::Point>> {
        self.solves += 1;
        let found = self.oracle.solve_at(t)?;
        trace!(phase = ?self.phase, t, feasible = found.is_some(), "bisection step");
        Ok(found)
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "bisection phase");
        self.phase = phase;
    }
}

/// Find the smallest feasible threshold to within `settings.tolerance`.
///
/// `max_iters` bounds the narrowing steps; running out of them is an error.
pub fn bisect<O: FeasibilityOracle>(
    oracle: &mut O,
    interval: Interval,
    tighten: &Tightening,
    max_iters: usize,
    settings: &BisectionSettings,
) -> Result<BisectionOutcome<O::Point>> {
    let mut driver = Driver {
        oracle,
        phase: Phase::Init,
        solves: 0,
    };
    if !driver.oracle.precheck()? {
        driver.enter(Phase::Infeasible);
        return Ok(BisectionOutcome::Infeasible);
    }

    let default_low = if tighten.nonneg { 0.0 } else { -1.0 };
    let default_high = if tighten.nonpos { 0.0 } else { 1.0 };
    // A missing bound is placed relative to the supplied one, never swapped with it.
    let (mut low, mut high) = match (interval.low, interval.high) {
        (Some(l), Some(h)) => (l.min(h), l.max(h)),
        (Some(l), None) => (l, if default_high > l { default_high } else { l + 1.0 }),
        (None, Some(h)) => (if default_low < h { default_low } else { h - 1.0 }, h),
        (None, None) => (default_low, default_high),
    };
    let mut best: Option<O::Point> = None;

    if interval.low.is_none() || interval.high.is_none() {
        driver.enter(Phase::Probing);

        if interval.high.is_none() {
            let mut expansions = 0;
            loop {
                if let Some(point) = driver.solve_at(high)? {
                    best = Some(point);
                    break;
                }
                if tighten.nonpos || expansions == settings.max_expansions {
                    driver.enter(Phase::Infeasible);
                    return Ok(BisectionOutcome::Infeasible);
                }
                let width = (high - low).max(1.0);
                low = high;
                high += width * settings.expansion_factor;
                expansions += 1;
            }
        }

        if interval.low.is_none() && !tighten.nonneg {
            let mut expansions = 0;
            loop {
                match driver.solve_at(low)? {
                    None => break,
                    Some(point) => {
                        if expansions == settings.max_expansions {
                            driver.enter(Phase::Unbounded);
                            return Ok(BisectionOutcome::Unbounded);
                        }
                        best = Some(point);
                        let width = (high - low).max(1.0);
                        high = low;
                        low -= width * settings.expansion_factor;
                        expansions += 1;
                    }
                }
            }
        }
    }

    driver.enter(Phase::Narrowing);
    let mut iterations = 0;
    loop {
        if high - low <= settings.tolerance {
            let point = match best.take() {
                Some(point) => point,
                None => match driver.solve_at(high)? {
                    Some(point) => point,
                    None => {
                        driver.enter(Phase::Infeasible);
                        return Ok(BisectionOutcome::Infeasible);
                    }
                },
            };
            driver.enter(Phase::Converged);
            debug!(low, high, iterations, solves = driver.solves, "bisection converged");
            return Ok(BisectionOutcome::Converged {
                low,
                high,
                point,
                iterations,
            });
        }
        if iterations == max_iters {
            driver.enter(Phase::IterExceeded);
            return Err(CvxError::BisectionMaxIters {
                iters: max_iters,
                low,
                high,
            });
        }
        iterations += 1;

        let mid = low + (high - low) / 2.0;
        match driver.solve_at(mid)? {
            Some(point) => {
                high = tighten.upper(mid).max(low);
                best = Some(point);
            }
            None => {
                low = tighten.lower(mid).min(high);
            }
        }
    }
}
