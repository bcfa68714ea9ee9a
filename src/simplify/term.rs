//! Normalized terms, like-term combination and distribution.

use super::{power, Simplifier, SimplifyError, Unsupported};
use crate::{BinaryOperation, Expression};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use smol_str::SmolStr;
use std::{collections::BTreeMap, fmt::Write};
use tracing::debug;

/// The canonical form of a single product, `coeff * vars * √(radical)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Term {
    pub(crate) coeff: BigInt,
    /// Variable exponents, sorted by name. Zero exponents are never stored.
    pub(crate) vars: BTreeMap<SmolStr, u64>,
    /// The square-free radicand of a trailing square root, if any.
    pub(crate) radical: Option<Expression>,
}

impl Term {
    pub(crate) fn one() -> Self {
        Term {
            coeff: BigInt::one(),
            vars: BTreeMap::new(),
            radical: None,
        }
    }

    pub(crate) fn add_var(
        &mut self,
        name: &SmolStr,
        exponent: u64,
    ) -> Result<(), SimplifyError> {
        if exponent == 0 {
            return Ok(());
        }

        let entry = self.vars.entry(name.clone()).or_insert(0);
        let current = *entry;
        *entry = current.checked_add(exponent).ok_or_else(|| {
            SimplifyError::ExponentTooLarge {
                exponent: BigInt::from(current) + exponent,
            }
        })?;

        Ok(())
    }

    /// A signature for this term's variables and radical. Two terms with the
    /// same key differ only by their coefficient.
    pub(crate) fn key(&self) -> String {
        let mut key = String::new();

        for (name, exponent) in &self.vars {
            let _ = write!(key, "{}^{}", name, exponent);
        }

        key.push('√');
        if let Some(radicand) = &self.radical {
            let _ = write!(key, "{}", radicand);
        }

        key
    }

    /// Turn the term back into an expression tree.
    pub(crate) fn into_expression(self) -> Expression {
        if self.coeff.is_zero() {
            return Expression::number(0);
        }

        let mut pieces = Vec::new();

        if !self.coeff.is_one() {
            pieces.push(Expression::Number(self.coeff));
        }

        for (name, exponent) in self.vars {
            let variable = Expression::Identifier(name);

            if exponent == 1 {
                pieces.push(variable);
            } else {
                pieces.push(variable.pow(Expression::number(exponent)));
            }
        }

        if let Some(radicand) = self.radical {
            pieces.push(radicand.sqrt());
        }

        chain(pieces, BinaryOperation::Times)
            .unwrap_or_else(|| Expression::number(1))
    }
}

/// Unfold a chain of `op` nodes into its operands, left to right.
pub(crate) fn flatten(
    expr: &Expression,
    op: BinaryOperation,
) -> Vec<&Expression> {
    match expr {
        Expression::Binary { left, right, op: o } if *o == op => {
            let mut operands = flatten(left, op);
            operands.extend(flatten(right, op));
            operands
        },
        other => vec![other],
    }
}

/// Join expressions into a left-leaning chain of `op` nodes.
pub(crate) fn chain<I>(pieces: I, op: BinaryOperation) -> Option<Expression>
where
    I: IntoIterator<Item = Expression>,
{
    pieces
        .into_iter()
        .fold(None, |acc, piece| match acc {
            None => Some(piece),
            Some(left) => Some(Expression::binary(left, op, piece)),
        })
}

impl Simplifier {
    /// Fold a list of factors into a single [`Term`].
    ///
    /// Returns `None` when one of the factors is a sum, meaning the product
    /// has to be distributed instead.
    pub(crate) fn normalize(
        &mut self,
        factors: &[&Expression],
    ) -> Result<Option<Term>, SimplifyError> {
        let mut term = Term::one();
        let mut pending: Vec<&Expression> =
            factors.iter().rev().copied().collect();

        while let Some(factor) = pending.pop() {
            match factor {
                Expression::Number(n) => term.coeff *= n,
                Expression::Identifier(name) => term.add_var(name, 1)?,
                Expression::Exponentiation { base, exponent } => {
                    absorb_power(&mut term, base, exponent, factor)?
                },
                Expression::Root { radicand } => {
                    self.merge_radical(&mut term, radicand)?
                },
                Expression::Binary {
                    left,
                    right,
                    op: BinaryOperation::Times,
                } => {
                    pending.push(right);
                    pending.push(left);
                },
                Expression::Binary {
                    op: BinaryOperation::Plus | BinaryOperation::Minus,
                    ..
                } => return Ok(None),
                Expression::Binary {
                    op: BinaryOperation::Divide,
                    ..
                } => {
                    return Err(SimplifyError::unsupported(
                        Unsupported::Division,
                        factor.clone(),
                    ))
                },
            }
        }

        Ok(Some(term))
    }

    /// Multiply two simplified expressions together.
    pub(crate) fn simplify_product(
        &mut self,
        left: &Expression,
        right: &Expression,
    ) -> Result<Expression, SimplifyError> {
        let mut factors = flatten(left, BinaryOperation::Times);
        factors.extend(flatten(right, BinaryOperation::Times));

        match self.normalize(&factors)? {
            Some(term) => Ok(term.into_expression()),
            None => self.distribute(left, right),
        }
    }

    /// Expand `(a + b)(c + d)` into `ac + ad + bc + bd` and combine the
    /// result.
    fn distribute(
        &mut self,
        left: &Expression,
        right: &Expression,
    ) -> Result<Expression, SimplifyError> {
        debug!(%left, %right, "Distributing a product over a sum");

        let mut addends = Vec::new();

        for l in flatten(left, BinaryOperation::Plus) {
            for r in flatten(right, BinaryOperation::Plus) {
                let mut factors = flatten(l, BinaryOperation::Times);
                factors.extend(flatten(r, BinaryOperation::Times));

                match self.normalize(&factors)? {
                    Some(term) => addends.push(term.into_expression()),
                    None => {
                        return Err(SimplifyError::unsupported(
                            Unsupported::NestedSum,
                            l.clone() * r.clone(),
                        ))
                    },
                }
            }
        }

        match chain(addends, BinaryOperation::Plus) {
            Some(sum) => self.simplify_sum(&sum),
            None => Ok(Expression::number(0)),
        }
    }

    /// Combine like terms in a sum of simplified expressions.
    pub(crate) fn simplify_sum(
        &mut self,
        sum: &Expression,
    ) -> Result<Expression, SimplifyError> {
        let mut groups: Vec<(String, Term)> = Vec::new();

        for addend in flatten(sum, BinaryOperation::Plus) {
            let factors = flatten(addend, BinaryOperation::Times);
            let term = self.normalize(&factors)?.ok_or_else(|| {
                SimplifyError::unsupported(
                    Unsupported::NestedSum,
                    addend.clone(),
                )
            })?;
            let key = term.key();

            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => existing.coeff += term.coeff,
                None => groups.push((key, term)),
            }
        }

        debug!(
            groups = groups.len(),
            keys = ?groups.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "Combined like terms"
        );

        let addends = groups
            .into_iter()
            .map(|(_, term)| term)
            .filter(|term| !term.coeff.is_zero())
            .map(Term::into_expression);

        Ok(chain(addends, BinaryOperation::Plus)
            .unwrap_or_else(|| Expression::number(0)))
    }
}

fn absorb_power(
    term: &mut Term,
    base: &Expression,
    exponent: &Expression,
    original: &Expression,
) -> Result<(), SimplifyError> {
    match (base, exponent.as_number()) {
        (Expression::Number(b), Some(k)) if !k.is_negative() => {
            term.coeff *= power(b, k)?;
            Ok(())
        },
        (Expression::Identifier(name), Some(k)) if !k.is_negative() => {
            let k = k.to_u64().ok_or_else(|| {
                SimplifyError::ExponentTooLarge {
                    exponent: k.clone(),
                }
            })?;
            term.add_var(name, k)
        },
        (_, Some(k)) if !k.is_negative() => Err(SimplifyError::unsupported(
            Unsupported::CompoundPower,
            original.clone(),
        )),
        _ => Err(SimplifyError::unsupported(
            Unsupported::SymbolicExponent,
            original.clone(),
        )),
    }
}
