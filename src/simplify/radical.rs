//! Square-free decomposition and merging of square roots.

use super::{
    power,
    term::{chain, flatten},
    Simplifier, SimplifyError, Term, Unsupported,
};
use crate::{BinaryOperation, Expression};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive, Zero};
use smol_str::SmolStr;
use tracing::{debug, trace};

impl Simplifier {
    /// Simplify `√radicand`, where the radicand has already been simplified.
    pub(crate) fn simplify_root(
        &mut self,
        radicand: Expression,
    ) -> Result<Expression, SimplifyError> {
        match radicand {
            Expression::Number(n) => square_free_root(&n),
            Expression::Identifier(_) => Ok(radicand.sqrt()),
            Expression::Exponentiation { base, exponent } => {
                let k = exponent
                    .as_number()
                    .filter(|k| !k.is_negative())
                    .cloned();

                match (*base, k) {
                    (Expression::Number(b), Some(k)) => {
                        square_free_root(&power(&b, &k)?)
                    },
                    (Expression::Identifier(name), Some(k)) => {
                        split_power(name, &k)
                    },
                    (base, _) => {
                        let radicand = base.pow(*exponent);
                        self.simplify_product(
                            &Expression::number(1),
                            &radicand.sqrt(),
                        )
                    },
                }
            },
            compound => {
                // let term normalization pull factors out of the radical
                let one = Expression::number(1);
                self.simplify_product(&one, &compound.sqrt())
            },
        }
    }

    /// Multiply `term` by `√incoming`, combining it with the term's existing
    /// radical and pulling any squared factors out.
    pub(crate) fn merge_radical(
        &mut self,
        term: &mut Term,
        incoming: &Expression,
    ) -> Result<(), SimplifyError> {
        let existing = term.radical.take();
        trace!(
            existing = ?existing.as_ref().map(ToString::to_string),
            %incoming,
            "Merging radicals"
        );

        let mut pieces = Vec::new();
        if let Some(existing) = &existing {
            pieces.extend(flatten(existing, BinaryOperation::Times));
        }
        pieces.extend(flatten(incoming, BinaryOperation::Times));

        // sums can't be split into factors, so they stay under the radical
        let (sums, rest): (Vec<&Expression>, Vec<&Expression>) =
            pieces.into_iter().partition(|piece| is_sum(piece));

        let inner = self.nested(|s| s.normalize(&rest))?.ok_or_else(|| {
            SimplifyError::unsupported(
                Unsupported::NestedSum,
                incoming.clone(),
            )
        })?;

        let mut leftovers = Vec::new();

        let (outside, inside) = square_free(&inner.coeff)?;
        term.coeff *= outside;
        if !inside.is_one() {
            leftovers.push(Expression::Number(inside));
        }

        for (name, exponent) in &inner.vars {
            term.add_var(name, exponent / 2)?;

            if exponent % 2 == 1 {
                leftovers.push(Expression::Identifier(name.clone()));
            }
        }

        if let Some(nested) = inner.radical {
            leftovers.push(nested.sqrt());
        }

        if sums.is_empty() {
            term.radical = chain(leftovers, BinaryOperation::Times);
            return Ok(());
        }

        let mut sums: Vec<Expression> = sums.into_iter().cloned().collect();
        sums.sort_by_cached_key(ToString::to_string);

        if leftovers.is_empty() && sums.len() == 1 {
            term.radical = sums.pop();
            return Ok(());
        }

        // multiply everything under the radical out so it has a single
        // canonical form
        leftovers.extend(sums);
        let product = chain(leftovers, BinaryOperation::Times)
            .unwrap_or_else(|| Expression::number(1));
        let canonical = self.simplify(&product)?;

        if is_sum(&canonical) {
            term.radical = Some(canonical);
            Ok(())
        } else {
            // the sums cancelled out, so there may be more to pull out
            self.merge_radical(term, &canonical)
        }
    }
}

fn is_sum(expr: &Expression) -> bool {
    expr.is_binary(BinaryOperation::Plus)
        || expr.is_binary(BinaryOperation::Minus)
}

/// The largest factor [`square_free`] will try before giving up on a
/// radicand.
const MAX_TRIAL_DIVISOR: u64 = 1 << 21;

/// Split `n` into `(s, r)` where `n = s² * r` and `s` is as large as
/// possible. The sign of `n` stays with `r`.
///
/// Trial division only needs to go up to `∛n`. Past that point whatever is
/// left has at most two prime factors, so it is either a perfect square or
/// already square-free.
pub(crate) fn square_free(
    n: &BigInt,
) -> Result<(BigInt, BigInt), SimplifyError> {
    if n.is_zero() {
        return Ok((BigInt::zero(), BigInt::one()));
    }

    let mut remaining = n.magnitude().clone();
    let mut outside = BigUint::one();
    let mut inside = BigUint::one();
    let mut factor: u64 = 2;

    while BigUint::from(factor).pow(3) <= remaining {
        if factor > MAX_TRIAL_DIVISOR {
            // the leftover might still hide the square of a big prime
            let root = remaining.sqrt();

            if &root * &root != remaining {
                return Err(SimplifyError::RadicandTooLarge {
                    radicand: n.clone(),
                });
            }

            break;
        }

        let f = BigUint::from(factor);
        let mut multiplicity = 0_u32;

        while (&remaining % &f).is_zero() {
            remaining /= &f;
            multiplicity += 1;
        }

        outside *= f.pow(multiplicity / 2);
        if multiplicity % 2 == 1 {
            inside *= &f;
        }

        factor += if factor == 2 { 1 } else { 2 };
    }

    let root = remaining.sqrt();
    if &root * &root == remaining {
        outside *= root;
    } else {
        inside *= remaining;
    }

    let outside = BigInt::from(outside);
    let mut inside = BigInt::from(inside);
    if n.is_negative() {
        inside = -inside;
    }

    debug!(%n, %outside, %inside, "Square-free decomposition");

    Ok((outside, inside))
}

/// `√n` as `s√r`, `s` or `√r`.
fn square_free_root(n: &BigInt) -> Result<Expression, SimplifyError> {
    let (outside, inside) = square_free(n)?;

    let root = if outside.is_zero() {
        Expression::number(0)
    } else if inside.is_one() {
        Expression::Number(outside)
    } else if outside.is_one() {
        Expression::Number(inside).sqrt()
    } else {
        Expression::Number(outside) * Expression::Number(inside).sqrt()
    };

    Ok(root)
}

/// `√(x^k)` as `x^(k/2)`, times `√x` when `k` is odd.
fn split_power(
    name: SmolStr,
    k: &BigInt,
) -> Result<Expression, SimplifyError> {
    let k = k.to_u64().ok_or_else(|| SimplifyError::ExponentTooLarge {
        exponent: k.clone(),
    })?;
    let (quotient, remainder) = (k / 2, k % 2);

    let mut pieces = Vec::new();

    match quotient {
        0 => {},
        1 => pieces.push(Expression::Identifier(name.clone())),
        q => pieces.push(
            Expression::Identifier(name.clone()).pow(Expression::number(q)),
        ),
    }

    if remainder == 1 {
        pieces.push(Expression::Identifier(name).sqrt());
    }

    Ok(chain(pieces, BinaryOperation::Times)
        .unwrap_or_else(|| Expression::number(1)))
}
