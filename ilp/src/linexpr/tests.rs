use super::*;

#[test]
fn var_and_constant() {
    let a = LinExpr::<String>::var("a");
    assert_eq!(a.get("a"), Some(1.0));
    assert_eq!(a.get_constant(), 0.0);

    let c = LinExpr::<String>::constant(3.0);
    assert_eq!(c.get_constant(), 3.0);
    assert!(c.variables().is_empty());
}

#[test]
fn addition_merges_coefficients() {
    let a = LinExpr::<String>::var("a");
    let b = LinExpr::<String>::var("a") + LinExpr::var("b");
    let sum = a + b;

    assert_eq!(sum.get("a"), Some(2.0));
    assert_eq!(sum.get("b"), Some(1.0));
}

#[test]
fn leq_moves_rhs_to_lhs() {
    let a = LinExpr::<String>::var("a");
    let one = LinExpr::constant(1.0);

    let c = a.leq(&one);
    assert_eq!(c.get_symbol(), EqSymbol::LessThan);
    assert_eq!(c.get_constant(), -1.0);
}

#[test]
fn weighted_sum_builds_from_pairs() {
    let expr = LinExpr::<String>::weighted_sum([("a", 2.0), ("b", 0.5), ("a", 1.0)]);
    assert_eq!(expr.get("a"), Some(3.0));
    assert_eq!(expr.get("b"), Some(0.5));
}

#[test]
fn display_matches_expected_form() {
    let a = LinExpr::<String>::var("a");
    let one = LinExpr::constant(1.0);
    let c = a.leq(&one);
    assert_eq!(format!("{}", c), "1*a + -1 <= 0");
}
