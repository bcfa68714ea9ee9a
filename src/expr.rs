use num_bigint::BigInt;
use num_traits::Signed;
use smol_str::SmolStr;
use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Div, Mul, Sub},
};

/// The index of every [`Expression::Root`]. Only square roots are supported.
pub const SQUARE_ROOT_INDEX: u32 = 2;

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// An exact integer.
    Number(BigInt),
    /// A single-letter variable.
    Identifier(SmolStr),
    /// An expression involving two operands.
    Binary {
        left: Box<Expression>,
        right: Box<Expression>,
        op: BinaryOperation,
    },
    /// `base^exponent`.
    Exponentiation {
        base: Box<Expression>,
        exponent: Box<Expression>,
    },
    /// The square root of an expression (see [`SQUARE_ROOT_INDEX`]).
    Root { radicand: Box<Expression> },
}

impl Expression {
    pub fn number<N: Into<BigInt>>(value: N) -> Self {
        Expression::Number(value.into())
    }

    pub fn identifier<S: Into<SmolStr>>(name: S) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn pow(self, exponent: Expression) -> Self {
        Expression::Exponentiation {
            base: Box::new(self),
            exponent: Box::new(exponent),
        }
    }

    pub fn sqrt(self) -> Self {
        Expression::Root {
            radicand: Box::new(self),
        }
    }

    pub fn binary(
        left: Expression,
        op: BinaryOperation,
        right: Expression,
    ) -> Self {
        Expression::Binary {
            left: Box::new(left),
            right: Box::new(right),
            op,
        }
    }

    /// Is this a [`Expression::Binary`] node using `op`?
    pub fn is_binary(&self, op: BinaryOperation) -> bool {
        matches!(self, Expression::Binary { op: o, .. } if *o == op)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Expression::Number(_) | Expression::Identifier(_))
    }

    pub fn as_number(&self) -> Option<&BigInt> {
        match self {
            Expression::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Does this expression's text form start with a digit (or sign)?
    fn starts_with_number(&self) -> bool {
        match self {
            Expression::Number(_) => true,
            Expression::Identifier(_) | Expression::Root { .. } => false,
            Expression::Binary { left, op, .. } => {
                // operands which get wrapped in parens start with "("
                !needs_parens_in_product(left, *op) && left.starts_with_number()
            },
            Expression::Exponentiation { base, .. } => {
                !needs_parens_in_power(base) && base.starts_with_number()
            },
        }
    }
}

fn needs_parens_in_product(operand: &Expression, op: BinaryOperation) -> bool {
    op == BinaryOperation::Times && is_additive_or_quotient(operand)
}

fn is_additive_or_quotient(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Binary {
            op: BinaryOperation::Plus
                | BinaryOperation::Minus
                | BinaryOperation::Divide,
            ..
        }
    )
}

/// An operation that can be applied to two arguments.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Plus,
    Minus,
    Times,
    Divide,
}

impl BinaryOperation {
    pub fn symbol(self) -> char {
        match self {
            BinaryOperation::Plus => '+',
            BinaryOperation::Minus => '-',
            BinaryOperation::Times => '*',
            BinaryOperation::Divide => '/',
        }
    }
}

impl Display for BinaryOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// define some operator overloads to make constructing an expression easier.

impl Add for Expression {
    type Output = Expression;

    fn add(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Plus, rhs)
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Minus, rhs)
    }
}

impl Mul for Expression {
    type Output = Expression;

    fn mul(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Times, rhs)
    }
}

impl Div for Expression {
    type Output = Expression;

    fn div(self, rhs: Expression) -> Expression {
        Expression::binary(self, BinaryOperation::Divide, rhs)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number(value) => write!(f, "{}", value),
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Binary { left, right, op } => {
                write_binary(left, right, *op, f)
            },
            Expression::Exponentiation { base, exponent } => {
                write_wrapped(base, needs_parens_in_power(base), f)?;
                write!(f, "^")?;
                write_wrapped(exponent, needs_parens_in_power(exponent), f)
            },
            Expression::Root { radicand } => write!(f, "√({})", radicand),
        }
    }
}

fn write_binary(
    left: &Expression,
    right: &Expression,
    op: BinaryOperation,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    match op {
        BinaryOperation::Minus => {
            write!(f, "{}", left)?;
            write!(f, " - ")?;
            write_wrapped(right, is_additive(right), f)
        },
        BinaryOperation::Plus => {
            write_wrapped(left, left.is_binary(BinaryOperation::Minus), f)?;
            write!(f, " + ")?;
            write_wrapped(right, is_additive(right), f)
        },
        BinaryOperation::Divide => {
            write_wrapped(left, is_additive(left), f)?;
            write!(f, "/")?;
            write_wrapped(right, is_additive_or_quotient(right), f)
        },
        BinaryOperation::Times => {
            write_wrapped(left, is_additive_or_quotient(left), f)?;

            let right_parens = is_additive_or_quotient(right);
            if !right_parens && right.starts_with_number() {
                // "2*3" would otherwise print as "23"
                write!(f, "*")?;
            }

            write_wrapped(right, right_parens, f)
        },
    }
}

/// `-2^x` would read as `-(2^x)`, so negative numbers get parens too.
fn needs_parens_in_power(operand: &Expression) -> bool {
    match operand {
        Expression::Number(n) => n.is_negative(),
        other => !other.is_leaf(),
    }
}

fn is_additive(expr: &Expression) -> bool {
    expr.is_binary(BinaryOperation::Plus)
        || expr.is_binary(BinaryOperation::Minus)
}

fn write_wrapped(
    expr: &Expression,
    parens: bool,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expression { Expression::identifier("x") }

    fn y() -> Expression { Expression::identifier("y") }

    fn n(value: i64) -> Expression { Expression::number(value) }

    #[test]
    fn display() {
        let inputs = vec![
            (n(3), "3"),
            (n(-1), "-1"),
            (x(), "x"),
            (n(1) + n(1), "1 + 1"),
            (n(1) - x(), "1 - x"),
            (n(2) * x(), "2x"),
            (n(2) * n(3), "2*3"),
            (x() * n(3), "x*3"),
            (n(-1) * x(), "-1x"),
            (n(1) / x(), "1/x"),
            (x().pow(n(2)), "x^2"),
            (x().pow(n(2) + n(1)), "x^(2 + 1)"),
            (n(-2).pow(x()), "(-2)^x"),
            (x().pow(n(-1)), "x^(-1)"),
            (n(2) * n(-2).pow(n(3)), "2(-2)^3"),
            ((x() + n(1)).pow(n(2)), "(x + 1)^2"),
            (n(2).sqrt(), "√(2)"),
            (n(2) * n(2).sqrt(), "2√(2)"),
            (x() * x().sqrt(), "x√(x)"),
            ((x() + n(1)) * y(), "(x + 1)y"),
            (y() * (x() + n(1)), "y(x + 1)"),
            ((n(1) + n(2)) / n(3), "(1 + 2)/3"),
            (x() - (y() - n(1)), "x - (y - 1)"),
            (n(6) * x() * y(), "6xy"),
            (x().pow(n(2)) * y(), "x^2y"),
            (n(2) * x().pow(n(3)), "2x^3"),
            (n(2) * n(3).pow(n(2)), "2*3^2"),
            ((x() * y()).sqrt(), "√(xy)"),
            ((x() + y()).sqrt(), "√(x + y)"),
        ];

        for (expr, should_be) in inputs {
            let got = expr.to_string();
            assert_eq!(got, should_be);
        }
    }

    #[test]
    fn leaves_are_detected() {
        assert!(x().is_leaf());
        assert!(n(5).is_leaf());
        assert!(!x().sqrt().is_leaf());
        assert!(!(x() * y()).is_leaf());
    }
}
