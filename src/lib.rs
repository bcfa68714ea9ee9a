//! Parsing and simplification of algebraic expressions involving square
//! roots.
//!
//! ```rust
//! let got = radsimp::simplify_str("√(8x^3) + x√(2x)").unwrap().unwrap();
//!
//! assert_eq!(got.to_string(), "3x√(2x)");
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod expr;
mod parse;
pub mod simplify;

pub use expr::{BinaryOperation, Expression, SQUARE_ROOT_INDEX};
pub use parse::{
    parse, parse_tokens, tokenize, ParseError, Parser, Token, TokenKind,
    DEFAULT_MAX_DEPTH,
};
pub use simplify::{
    simplify, Simplifier, SimplifyError, SimplifyOptions, Unsupported,
};

/// Anything that can go wrong when going from text to a simplified
/// [`Expression`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Simplify(#[from] SimplifyError),
}

/// Parse some text and simplify it with the default [`SimplifyOptions`].
///
/// Returns `Ok(None)` when there was nothing to parse.
pub fn simplify_str(src: &str) -> Result<Option<Expression>, Error> {
    Simplifier::default().simplify_str(src)
}

impl Simplifier {
    /// Parse some text and simplify it.
    pub fn simplify_str(
        &mut self,
        src: &str,
    ) -> Result<Option<Expression>, Error> {
        let tokens = tokenize(src);
        let parser =
            Parser::new(&tokens).with_max_depth(self.options().max_depth);

        match parser.parse()? {
            Some(expr) => Ok(Some(self.simplify(&expr)?)),
            None => Ok(None),
        }
    }
}
