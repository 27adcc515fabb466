//! Tests for atom classification, numeric evaluation and cone-backed atoms.

use cvxqcp::prelude::*;

const TOL: f64 = 1e-4;

fn eval(expr: &Expr) -> f64 {
    expr.evaluate_scalar(&ParamBindings::new())
        .expect("variable-free expression should evaluate")
}

// ============================================================================
// Curvature classification
// ============================================================================

#[test]
fn test_rounding_atoms_are_quasilinear() {
    let x = variable(());
    for expr in [ceil(&x), floor(&x), sign(&x)] {
        assert_eq!(expr.curvature(), Curvature::Quasilinear);
        assert!(expr.is_dqcp());
        assert!(!expr.is_dcp());
    }
    assert_eq!(ceil(&x).curvature().to_string(), "QUASILINEAR");
}

#[test]
fn test_sign_of_vector_is_not_quasi() {
    let x = variable(3);
    let expr = sign(&x);
    assert_eq!(expr.curvature(), Curvature::Unknown);
    assert!(!expr.is_dqcp());
}

#[test]
fn test_length_and_dist_ratio_are_quasiconvex() {
    let x = variable(4);
    assert_eq!(length(&x).curvature(), Curvature::Quasiconvex);
    assert_eq!(length(&x).sign(), Sign::Nonnegative);

    let y = variable(2);
    let ratio = dist_ratio(&y, &[1.0, 1.0], &[0.0, 0.0]);
    assert_eq!(ratio.curvature(), Curvature::Quasiconvex);
    // The argument must be affine.
    assert!(!dist_ratio(&abs(&y), &[1.0, 1.0], &[0.0, 0.0]).is_dqcp());
}

#[test]
fn test_product_rules() {
    let x = nonneg_variable(());
    let y = nonneg_variable(());
    let u = nonpos_variable(());
    let w = variable(());

    assert_eq!((&x * &y).curvature(), Curvature::Quasiconcave);
    assert_eq!((&x * &u).curvature(), Curvature::Quasiconvex);
    // Unknown signs give no quasi structure.
    assert_eq!((&x * &w).curvature(), Curvature::Unknown);
    // A constant factor keeps the product affine.
    assert_eq!((2.0 * &w).curvature(), Curvature::Affine);
    assert_eq!((&x * &y).sign(), Sign::Nonnegative);
    assert_eq!((&x * &u).sign(), Sign::Nonpositive);
}

#[test]
fn test_ratio_rules() {
    let x = variable(());
    let y = nonneg_variable(());
    let w = variable(());

    assert_eq!((&x / &y).curvature(), Curvature::Quasilinear);
    assert_eq!((&x / &w).curvature(), Curvature::Unknown);
    assert_eq!((&x / 2.0).curvature(), Curvature::Affine);

    let concave_frac = sqrt(&y) / exp(&y);
    assert_eq!(concave_frac.curvature(), Curvature::Quasiconcave);

    let convex_over_pos = (1.0 - 2.0 * sqrt(&y) + &y) / &y;
    assert_eq!(convex_over_pos.curvature(), Curvature::Quasiconvex);
}

#[test]
fn test_monotone_composition() {
    let x = variable(());
    // exp is increasing, so it preserves quasiconvexity and quasiconcavity.
    assert_eq!(exp(&ceil(&x)).curvature(), Curvature::Quasilinear);
    // Negation swaps the two.
    let y = nonneg_variable(());
    assert_eq!((-(&y * &y)).curvature(), Curvature::Quasiconvex);
    // An increasing convex atom of a quasiconvex vector argument is not covered.
    let v = variable(2);
    assert!(!sum_squares(&ceil(&v)).is_dqcp());
    // A maximum of quasiconvex arguments stays quasiconvex.
    assert_eq!(
        max2(&ceil(&x), &length(&v)).curvature(),
        Curvature::Quasiconvex
    );
}

#[test]
fn test_quasi_sums_are_rejected() {
    let x = variable(());
    let y = variable(());
    assert!(!(ceil(&x) + ceil(&y)).is_dqcp());
    assert!((ceil(&x) + 5.0).is_quasilinear());
}

#[test]
fn test_dcp_curvature_names() {
    let x = variable(());
    assert_eq!(exp(&x).curvature(), Curvature::Convex);
    assert_eq!(log(&x).curvature(), Curvature::Concave);
    assert_eq!(sqrt(&x).curvature(), Curvature::Concave);
    assert_eq!(power(&x, 3.0).curvature(), Curvature::Convex);
    assert_eq!(inv_pos(&x).curvature(), Curvature::Convex);
    assert_eq!((-exp(&x)).curvature(), Curvature::Concave);
    assert_eq!(constant(1.0).curvature(), Curvature::Constant);
    assert_eq!(ceil(&constant(2.5)).curvature(), Curvature::Constant);
}

#[test]
fn test_dcp_composition_rules() {
    let x = variable(());
    // exp(convex) is convex
    assert!(exp(&abs(&x)).is_convex());
    // log(concave) is concave
    assert!(log(&sqrt(&x)).is_concave());
    // exp(concave) is not DCP
    assert!(!exp(&log(&x)).is_dcp());
    // but it is increasing, so still quasilinear in one scalar
    assert!(exp(&log(&x)).is_quasilinear());
}

// ============================================================================
// Numeric evaluation
// ============================================================================

#[test]
fn test_rounding_values() {
    assert_eq!(eval(&ceil(&constant(2.5))), 3.0);
    assert_eq!(eval(&floor(&constant(2.5))), 2.0);
    assert_eq!(eval(&ceil(&constant(-2.5))), -2.0);
    assert_eq!(eval(&sign(&constant(-0.3))), -1.0);
    assert_eq!(eval(&sign(&constant(0.0))), 0.0);
}

#[test]
fn test_length_value() {
    assert_eq!(eval(&length(&constant_vec(vec![1.5, 0.0, -2.0, 0.0]))), 3.0);
    assert_eq!(eval(&length(&constant_vec(vec![0.0, 0.0]))), 0.0);
}

#[test]
fn test_dist_ratio_value() {
    let x = constant_vec(vec![0.8, 0.8]);
    let value = eval(&dist_ratio(&x, &[1.0, 1.0], &[0.0, 0.0]));
    assert!((value - 0.25).abs() < 1e-12);
}

#[test]
fn test_fraction_values() {
    let y = constant(0.5);
    let value = eval(&(sqrt(&y) / exp(&y)));
    assert!((value - 0.5_f64.sqrt() / 0.5_f64.exp()).abs() < 1e-12);
    assert_eq!(eval(&(constant(3.0) * constant(4.0))), 12.0);
    assert_eq!(eval(&(constant(3.0) / constant(4.0))), 0.75);
}

#[test]
fn test_logistic_value_is_stable() {
    let big = eval(&logistic(&constant(800.0)));
    assert!((big - 800.0).abs() < 1e-9);
    let small = eval(&logistic(&constant(-800.0)));
    assert!(small >= 0.0 && small < 1e-300);
}

// ============================================================================
// Cone-backed atoms
// ============================================================================

#[test]
fn test_exp_with_constraint() {
    // maximize x s.t. exp(x) <= 5, so x = log(5)
    let x = variable(());
    let solution = Problem::maximize(x.clone())
        .subject_to([exp(&x).leq(5.0)])
        .solve()
        .expect("Should solve");

    assert_eq!(solution.status, SolveStatus::Optimal);
    let x_val = solution.try_value(&x).unwrap();
    assert!((x_val - 5.0_f64.ln()).abs() < TOL, "got {}", x_val);
}

#[test]
fn test_log_concave() {
    // minimize -log(x) s.t. 0.1 <= x <= 1
    // -log(x) is convex and decreasing, so the minimum is at x = 1
    let x = variable(());
    let solution = Problem::minimize(-log(&x))
        .subject_to([x.geq(0.1), x.leq(1.0)])
        .solve()
        .expect("Should solve");

    assert!(solution.value.unwrap().abs() < TOL);
    assert!((solution.try_value(&x).unwrap() - 1.0).abs() < TOL);
}

#[test]
fn test_power_p_greater_than_1() {
    // minimize x^3 s.t. x >= 2
    let x = variable(());
    let solution = Problem::minimize(power(&x, 3.0))
        .subject_to([x.geq(2.0)])
        .solve()
        .expect("Should solve");

    assert!((solution.value.unwrap() - 8.0).abs() < 1e-3);
}

#[test]
fn test_sqrt_vector() {
    // maximize sum(sqrt(x)) s.t. sum(x) <= 4
    // Symmetric optimum: x = [1, 1, 1, 1], objective 4
    let x = variable(4);
    let solution = Problem::maximize(sum(&sqrt(&x)))
        .subject_to([sum(&x).leq(4.0)])
        .solve()
        .expect("Should solve");

    assert!((solution.value.unwrap() - 4.0).abs() < 1e-3);
    for v in solution.vector(&x).unwrap().iter() {
        assert!((v - 1.0).abs() < 1e-3);
    }
}

// ============================================================================
// Worked DQCP example
// ============================================================================

#[test]
fn test_tutorial_dqcp() {
    // minimize -sqrt(x) / y s.t. exp(x) <= y
    // The optimum is x = 1/2, y = exp(1/2), value -1/sqrt(2e).
    let x = variable(());
    let y = nonneg_variable(());
    let mut problem = Problem::minimize(-sqrt(&x) / &y)
        .subject_to([exp(&x).leq(y.clone())])
        .build();
    assert!(problem.is_dqcp());
    assert!(!problem.is_dcp());
    assert_eq!(problem.objective().expr().curvature(), Curvature::Quasiconvex);

    let solution = problem.solve_qcp().expect("Should solve");
    let expected = -1.0 / (2.0 * std::f64::consts::E).sqrt();
    assert!((solution.value.unwrap() - expected).abs() < 1e-2);
    assert!((solution.try_value(&x).unwrap() - 0.5).abs() < 0.1);
}
