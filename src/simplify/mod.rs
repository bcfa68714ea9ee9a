//! Rewriting [`Expression`]s into a canonical simplified form.
//!
//! Simplification is a structural recursion over the tree. Every product is
//! normalized into a [`Term`] (coefficient, sorted variable powers and an
//! optional square-free radical), sums are collapsed by combining terms with
//! the same canonical key, and radicals are reduced to square-free form.

mod radical;
mod term;

pub(crate) use term::Term;

use term::{chain, flatten};
use crate::{BinaryOperation, Expression};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::fmt::{self, Display, Formatter};
use tracing::trace;

/// The largest power (in bits) we are willing to compute when folding
/// `base^exponent` for numeric bases.
const MAX_POWER_BITS: u64 = 1 << 20;

/// Simplify an expression using the default [`SimplifyOptions`].
pub fn simplify(expr: &Expression) -> Result<Expression, SimplifyError> {
    Simplifier::default().simplify(expr)
}

/// Knobs for tweaking the [`Simplifier`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimplifyOptions {
    /// How deep the simplifier may recurse before giving up with
    /// [`SimplifyError::DepthExceeded`].
    pub max_depth: usize,
    /// The largest exponent a compound base (e.g. `(x + 1)^3`) will be
    /// expanded to.
    pub max_expansion: u64,
}

impl SimplifyOptions {
    pub fn with_max_depth(self, max_depth: usize) -> Self {
        SimplifyOptions { max_depth, ..self }
    }

    pub fn with_max_expansion(self, max_expansion: u64) -> Self {
        SimplifyOptions {
            max_expansion,
            ..self
        }
    }
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        SimplifyOptions {
            max_depth: 256,
            max_expansion: 16,
        }
    }
}

/// Rewrites [`Expression`]s into their canonical form.
#[derive(Debug, Default, Clone)]
pub struct Simplifier {
    options: SimplifyOptions,
    depth: usize,
}

impl Simplifier {
    pub fn new(options: SimplifyOptions) -> Self {
        Simplifier { options, depth: 0 }
    }

    pub fn options(&self) -> SimplifyOptions { self.options }

    /// Simplify an expression, returning a brand new tree.
    pub fn simplify(
        &mut self,
        expr: &Expression,
    ) -> Result<Expression, SimplifyError> {
        self.nested(|s| s.dispatch(expr))
    }

    /// Run `then` one level deeper, bailing out before the call stack gets
    /// too deep.
    pub(crate) fn nested<T, F>(&mut self, then: F) -> Result<T, SimplifyError>
    where
        F: FnOnce(&mut Self) -> Result<T, SimplifyError>,
    {
        if self.depth >= self.options.max_depth {
            return Err(SimplifyError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }

        self.depth += 1;
        let got = then(self);
        self.depth -= 1;

        got
    }

    fn dispatch(
        &mut self,
        expr: &Expression,
    ) -> Result<Expression, SimplifyError> {
        trace!(expression = %expr, depth = self.depth, "Simplifying");

        match expr {
            Expression::Number(_) | Expression::Identifier(_) => {
                Ok(expr.clone())
            },
            Expression::Exponentiation { base, exponent } => {
                let base = self.simplify(base)?;
                let exponent = self.simplify(exponent)?;
                self.simplify_exponent(base, exponent)
            },
            Expression::Root { radicand } => {
                let radicand = self.simplify(radicand)?;
                self.simplify_root(radicand)
            },
            Expression::Binary {
                op: BinaryOperation::Plus | BinaryOperation::Minus,
                ..
            } => {
                // long chains are walked in a loop so only real nesting
                // counts towards the depth limit
                let mut addends = Vec::new();

                for (addend, negated) in signed_addends(expr) {
                    let addend = self.simplify(addend)?;

                    if negated {
                        // a - b => a + (-1 * b)
                        let minus_one = Expression::number(-1);
                        let negated =
                            self.simplify_product(&minus_one, &addend)?;
                        addends.push(negated);
                    } else {
                        addends.push(addend);
                    }
                }

                match chain(addends, BinaryOperation::Plus) {
                    Some(sum) => self.simplify_sum(&sum),
                    None => Ok(Expression::number(0)),
                }
            },
            Expression::Binary {
                op: BinaryOperation::Times,
                ..
            } => {
                let factors = flatten(expr, BinaryOperation::Times)
                    .into_iter()
                    .map(|factor| self.simplify(factor))
                    .collect::<Result<Vec<_>, _>>()?;

                let flattened: Vec<&Expression> = factors
                    .iter()
                    .flat_map(|f| flatten(f, BinaryOperation::Times))
                    .collect();

                if let Some(term) = self.normalize(&flattened)? {
                    return Ok(term.into_expression());
                }

                // at least one factor is a sum, multiply them out pairwise
                let mut factors = factors.into_iter();
                let mut product =
                    factors.next().unwrap_or_else(|| Expression::number(1));

                for factor in factors {
                    product = self.simplify_product(&product, &factor)?;
                }

                Ok(product)
            },
            Expression::Binary {
                left,
                right,
                op: BinaryOperation::Divide,
            } => {
                // quotients are never reduced, only their operands
                let left = self.simplify(left)?;
                let right = self.simplify(right)?;
                Ok(left / right)
            },
        }
    }

    fn simplify_exponent(
        &mut self,
        base: Expression,
        exponent: Expression,
    ) -> Result<Expression, SimplifyError> {
        let k = match exponent.as_number() {
            Some(k) if !k.is_negative() => k.clone(),
            // symbolic and negative exponents are left alone
            _ => return Ok(base.pow(exponent)),
        };

        match base {
            Expression::Number(b) => Ok(Expression::Number(power(&b, &k)?)),
            Expression::Identifier(_) if k.is_zero() => {
                Ok(Expression::number(1))
            },
            Expression::Identifier(_) if k.is_one() => Ok(base),
            Expression::Identifier(_) => Ok(base.pow(exponent)),
            _ if k.is_zero() => Ok(Expression::number(1)),
            _ if k.is_one() => Ok(base),
            compound => match k.to_u64() {
                Some(copies) if copies <= self.options.max_expansion => {
                    self.expand_power(compound, exponent, copies)
                },
                _ => Ok(compound.pow(exponent)),
            },
        }
    }

    /// Turn `(a + b)^3` into `(a + b)(a + b)(a + b)` and simplify the result.
    fn expand_power(
        &mut self,
        base: Expression,
        exponent: Expression,
        copies: u64,
    ) -> Result<Expression, SimplifyError> {
        let mut product = base.clone();
        for _ in 1..copies {
            product = product * base.clone();
        }

        match self.simplify(&product) {
            // the base can't be multiplied out (e.g. it's a quotient) so we
            // keep the power as-is
            Err(SimplifyError::UnsupportedOperation { .. }) => {
                Ok(base.pow(exponent))
            },
            other => other,
        }
    }
}

/// Unfold a chain of `+` and `-` nodes into its operands, marking the ones
/// which are subtracted.
fn signed_addends(expr: &Expression) -> Vec<(&Expression, bool)> {
    match expr {
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Plus,
        } => {
            let mut addends = signed_addends(left);
            addends.extend(signed_addends(right));
            addends
        },
        Expression::Binary {
            left,
            right,
            op: BinaryOperation::Minus,
        } => {
            let mut addends = signed_addends(left);
            addends.push((right, true));
            addends
        },
        other => vec![(other, false)],
    }
}

/// Exactly compute `base^exponent` for a non-negative `exponent`.
pub(crate) fn power(
    base: &BigInt,
    exponent: &BigInt,
) -> Result<BigInt, SimplifyError> {
    if exponent.is_zero() || base.is_one() {
        return Ok(BigInt::one());
    }
    if base.is_zero() {
        return Ok(BigInt::zero());
    }
    if base == &BigInt::from(-1) {
        let odd = !(exponent % 2u32).is_zero();
        return Ok(if odd { -BigInt::one() } else { BigInt::one() });
    }

    let too_large = || SimplifyError::ExponentTooLarge {
        exponent: exponent.clone(),
    };

    let k = exponent.to_u32().ok_or_else(too_large)?;

    let bits = base.magnitude().bits();
    if bits.saturating_mul(u64::from(k)) > MAX_POWER_BITS {
        return Err(too_large());
    }

    Ok(num_traits::pow(base.clone(), k as usize))
}

/// Possible errors that may occur while simplifying.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimplifyError {
    #[error(
        "unable to simplify \"{expression}\" because {operation} isn't \
         supported"
    )]
    UnsupportedOperation {
        operation: Unsupported,
        expression: Expression,
    },
    #[error("the exponent {exponent} is too large")]
    ExponentTooLarge { exponent: BigInt },
    #[error("unable to find the square factors of {radicand}")]
    RadicandTooLarge { radicand: BigInt },
    #[error("the expression is nested more than {limit} levels deep")]
    DepthExceeded { limit: usize },
}

impl SimplifyError {
    pub(crate) fn unsupported(
        operation: Unsupported,
        expression: Expression,
    ) -> Self {
        SimplifyError::UnsupportedOperation {
            operation,
            expression,
        }
    }
}

/// The things a [`Simplifier`] can't normalize.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// A quotient used as a factor, addend or radicand.
    Division,
    /// A power whose exponent isn't a non-negative integer, used as a factor,
    /// addend or radicand.
    SymbolicExponent,
    /// A power of a compound base which was too big to expand, used as a
    /// factor, addend or radicand.
    CompoundPower,
    /// A sum that couldn't be distributed.
    NestedSum,
}

impl Display for Unsupported {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Unsupported::Division => write!(f, "division"),
            Unsupported::SymbolicExponent => {
                write!(f, "a symbolic or negative exponent")
            },
            Unsupported::CompoundPower => {
                write!(f, "an unexpanded power of a compound expression")
            },
            Unsupported::NestedSum => write!(f, "a nested sum"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use proptest::prelude::*;

    fn simplify_str(src: &str) -> Result<Expression, SimplifyError> {
        let expr = parse(src).unwrap().unwrap();
        simplify(&expr)
    }

    macro_rules! simplify_test {
        ($name:ident, $src:expr, $should_be:expr) => {
            #[test]
            fn $name() {
                let got = simplify_str($src).unwrap();

                assert_eq!(got.to_string(), $should_be);
            }
        };
    }

    simplify_test!(number_is_untouched, "42", "42");
    simplify_test!(identifier_is_untouched, "x", "x");
    simplify_test!(add_like_variables, "x + x", "2x");
    simplify_test!(like_terms_in_any_order, "3xy + y*3*x", "6xy");
    simplify_test!(repeated_subtraction, "12 - x - 3", "9 + -1x");
    simplify_test!(subtract_to_zero, "x - x", "0");
    simplify_test!(negative_result, "2 - 5", "-3");
    simplify_test!(distribute_over_sum, "2(x + 1)", "2x + 2");
    simplify_test!(distribute_variable, "x(x + 1)", "x^2 + x");
    simplify_test!(
        distribute_two_sums,
        "(x + 1)(x + 1)",
        "x^2 + 2x + 1"
    );
    simplify_test!(expand_squared_sum, "(x + 1)^2", "x^2 + 2x + 1");
    simplify_test!(expand_squared_product, "(2x)^2", "4x^2");
    simplify_test!(fold_numeric_power, "2^3", "8");
    simplify_test!(power_of_zero_is_one, "7^0", "1");
    simplify_test!(power_of_one, "7^1", "7");
    simplify_test!(variable_to_the_zero, "x^0", "1");
    simplify_test!(variable_to_the_one, "x^1", "x");
    simplify_test!(variable_power_is_kept, "x^2", "x^2");
    simplify_test!(exponent_is_simplified, "x^(1 + 2)", "x^3");
    simplify_test!(right_associative_exponents, "2^3^2", "512");
    simplify_test!(combine_powers, "x^2x", "x^3");
    simplify_test!(sort_variables, "zyx", "xyz");
    simplify_test!(combine_powers_of_sums, "x^2 + x + x^2", "2x^2 + x");
    simplify_test!(keep_encounter_order, "y + x + 2y", "3y + x");
    simplify_test!(zero_coefficient_product, "0x", "0");
    simplify_test!(zero_terms_are_dropped, "0√2 + x", "x");
    simplify_test!(square_root_of_eight, "√8", "2√(2)");
    simplify_test!(square_root_of_twelve, "√12", "2√(3)");
    simplify_test!(perfect_square, "√9", "3");
    simplify_test!(square_free_number, "√7", "√(7)");
    simplify_test!(square_root_of_one, "√1", "1");
    simplify_test!(square_root_of_zero, "√0", "0");
    simplify_test!(square_root_of_negative, "√(0 - 8)", "2√(-2)");
    simplify_test!(square_root_of_variable, "√x", "√(x)");
    simplify_test!(square_root_of_cube, "√(x^3)", "x√(x)");
    simplify_test!(square_root_of_even_power, "√(x^4)", "x^2");
    simplify_test!(square_root_of_square, "√(x^2)", "x");
    simplify_test!(square_root_of_odd_power, "√(x^5)", "x^2√(x)");
    simplify_test!(square_root_of_numeric_power, "√(2^3)", "2√(2)");
    simplify_test!(square_root_of_product, "√(8x^3)", "2x√(2x)");
    simplify_test!(square_root_of_sum, "√(x + 1)", "√(x + 1)");
    simplify_test!(roots_of_the_same_variable, "√x√x", "x");
    simplify_test!(roots_of_numbers_merge, "√2√8", "4");
    simplify_test!(roots_merge_under_one_radical, "√2√3", "√(6)");
    simplify_test!(roots_of_products, "√(xy)√(xy)", "xy");
    simplify_test!(nested_perfect_roots, "√√16", "2");
    simplify_test!(nested_roots, "√√x", "√(√(x))");
    simplify_test!(nested_roots_merge, "√√x√√x", "√(x)");
    simplify_test!(coefficient_and_root, "3√x", "3√(x)");
    simplify_test!(power_then_root, "x^2√x", "x^2√(x)");
    simplify_test!(like_radicals, "2√2 + 3√2", "5√(2)");
    simplify_test!(unlike_radicals, "√2 + √3", "√(2) + √(3)");
    simplify_test!(radicals_become_alike, "√8 + √2", "3√(2)");
    simplify_test!(
        like_radicals_of_sums,
        "2√(x + 1) + √(x + 1)",
        "3√(x + 1)"
    );
    simplify_test!(
        product_and_sum_radicands_differ,
        "√(xy) + √(x + y)",
        "√(xy) + √(x + y)"
    );
    simplify_test!(
        distribute_with_radicals,
        "(x + √2)(x + √2)",
        "x^2 + 2x√(2) + 2"
    );
    simplify_test!(roots_of_sums_merge, "√2√(x + 1)", "√(2x + 2)");
    simplify_test!(expand_root_power, "(√x)^3", "x√(x)");
    simplify_test!(division_is_left_alone, "a/b", "a/b");
    simplify_test!(division_operands_are_simplified, "(2 + 2)/(x + x)", "4/2x");

    simplify_test!(one_to_a_huge_power, "1^99999999999", "1");
    simplify_test!(zero_to_a_huge_power, "0^99999999999", "0");
    simplify_test!(minus_one_to_an_odd_power, "(0 - 1)^99999999999", "-1");
    simplify_test!(minus_one_to_an_even_power, "(0 - 1)^99999999998", "1");
    simplify_test!(zero_to_the_zero, "0^0", "1");
    simplify_test!(
        square_root_of_a_large_prime,
        "√2305843009213693951",
        "√(2305843009213693951)"
    );
    simplify_test!(
        square_root_of_a_large_square,
        "√3000018000027",
        "1000003√(3)"
    );

    fn unsupported_operation(src: &str) -> Unsupported {
        match simplify_str(src) {
            Err(SimplifyError::UnsupportedOperation { operation, .. }) => {
                operation
            },
            other => {
                panic!("Expected an unsupported operation, got {:?}", other)
            },
        }
    }

    #[test]
    fn division_inside_a_sum_is_unsupported() {
        assert_eq!(unsupported_operation("x + 1/2"), Unsupported::Division);
    }

    #[test]
    fn symbolic_exponents_can_only_stand_alone() {
        assert_eq!(simplify_str("x^y").unwrap().to_string(), "x^y");

        assert_eq!(
            unsupported_operation("2x^y"),
            Unsupported::SymbolicExponent
        );
    }

    #[test]
    fn unexpanded_powers_can_only_stand_alone() {
        assert_eq!(
            simplify_str("(x + 1)^20").unwrap().to_string(),
            "(x + 1)^20"
        );

        assert_eq!(
            unsupported_operation("(x + 1)^20 + 1"),
            Unsupported::CompoundPower
        );
        assert_eq!(
            unsupported_operation("√((x + 1)^17)"),
            Unsupported::CompoundPower
        );
    }

    #[test]
    fn radicands_with_big_prime_factors_are_rejected() {
        // (2^31 - 1) * (2^61 - 1)
        let src = "√4951760154835678088235319297";

        match simplify_str(src).unwrap_err() {
            SimplifyError::RadicandTooLarge { .. } => {},
            other => panic!("Expected a radicand error, got {:?}", other),
        }
    }

    #[test]
    fn long_sums_dont_count_as_nesting() {
        let src = vec!["x"; 1000].join(" + ");

        let got = simplify_str(&src).unwrap();

        assert_eq!(got.to_string(), "1000x");
    }

    #[test]
    fn long_products_dont_count_as_nesting() {
        let src = vec!["x"; 300].join("*");

        let got = simplify_str(&src).unwrap();

        assert_eq!(got.to_string(), "x^300");
    }

    #[test]
    fn long_differences_dont_count_as_nesting() {
        let src = vec!["x"; 300].join(" - ");

        let got = simplify_str(&src).unwrap();

        assert_eq!(got.to_string(), "-298x");
    }

    #[test]
    fn huge_exponents_are_rejected() {
        let got = simplify_str("2^99999999999").unwrap_err();

        assert_eq!(
            got,
            SimplifyError::ExponentTooLarge {
                exponent: BigInt::from(99_999_999_999_u64)
            }
        );
    }

    #[test]
    fn large_powers_are_exact() {
        let got = simplify_str("2^100").unwrap();

        assert_eq!(got.to_string(), "1267650600228229401496703205376");
    }

    #[test]
    fn powers_beyond_the_expansion_limit_are_kept() {
        let options = SimplifyOptions::default().with_max_expansion(2);
        let expr = parse("(x + 1)^3").unwrap().unwrap();

        let got = Simplifier::new(options).simplify(&expr).unwrap();

        assert_eq!(got.to_string(), "(x + 1)^3");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let options = SimplifyOptions::default().with_max_depth(3);
        let expr = parse("√√√√x").unwrap().unwrap();

        let got = Simplifier::new(options).simplify(&expr);

        assert_eq!(got, Err(SimplifyError::DepthExceeded { limit: 3 }));
    }

    #[test]
    fn the_simplifier_can_be_reused_after_an_error() {
        let mut simplifier = Simplifier::default();
        let bad = parse("x + 1/2").unwrap().unwrap();
        let good = parse("x + x").unwrap().unwrap();

        assert!(simplifier.simplify(&bad).is_err());
        let got = simplifier.simplify(&good).unwrap();

        assert_eq!(got.to_string(), "2x");
    }

    #[test]
    fn input_is_left_untouched() {
        let expr = parse("√8 + x + x").unwrap().unwrap();
        let original = expr.clone();

        let _ = simplify(&expr).unwrap();

        assert_eq!(expr, original);
    }

    #[test]
    fn simplifying_twice_changes_nothing() {
        let inputs = vec![
            "x + x",
            "12 - x - 3",
            "√8",
            "√(x^3)",
            "3xy + y*3*x",
            "(x + 1)(x - 1)",
            "(x + √2)(x + √3)",
            "√(x + 1)√(x + 2)",
            "√2√(x + 1)√x",
            "√(0 - 4)√(0 - 4)",
            "√√x√√y",
            "(√2 + 1)(√2 - 1)",
            "√((√2 + 1)(√2 - 1))",
            "2x^3√(8y^5) - x√(2x^4y)",
            "a/b",
        ];

        for src in inputs {
            let once = simplify_str(src).unwrap();
            let twice = simplify(&once).unwrap();

            assert_eq!(twice, once, "{} => {} => {}", src, once, twice);
        }
    }

    fn expression() -> impl Strategy<Value = Expression> {
        let leaf = prop_oneof![
            (0_i64..20).prop_map(Expression::number),
            prop::sample::select(vec!["x", "y", "z"])
                .prop_map(Expression::identifier),
        ];

        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l + r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l - r),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| l * r),
                (inner.clone(), 0_i64..4)
                    .prop_map(|(b, k)| b.pow(Expression::number(k))),
                inner.prop_map(Expression::sqrt),
            ]
        })
    }

    proptest! {
        #[test]
        fn simplification_is_idempotent(expr in expression()) {
            let once = match simplify(&expr) {
                Ok(once) => once,
                Err(_) => return Ok(()),
            };
            let twice = simplify(&once).unwrap();

            prop_assert_eq!(twice, once);
        }
    }
}
