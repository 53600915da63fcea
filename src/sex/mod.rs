//! SEX: the selection-expression language (`spec.md §1`).
//!
//! Split into the three stages `spec.md §2` assigns it: a lexer (C4), a
//! recursive-descent parser (C5), and a total evaluator (C6). [`compile`]
//! drives the first two; [`evaluate`]/[`evaluate_with`] drive the third.

mod eval;
mod lexer;
mod parser;

pub use eval::{evaluate, evaluate_with, truthy, Truthiness, Value};
pub use parser::Expr;

use crate::error::SexError;

/// Compiles a selection-expression string into an [`Expr`] for repeated
/// evaluation against records, per the `compile(sex-string) -> Expr`
/// entry point in `spec.md §6`.
pub fn compile(input: &str) -> Result<Expr, SexError> {
    let tokens = lexer::lex(input)?;
    parser::Parser::new(&tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn compile_then_evaluate_book_example() {
        let set = parse(
            "\
%rec: Book
%mandatory: Title Location

Title: Dune
Location: home

Title: Neuromancer
Location: loaned

Title: Snow Crash
Location: home
",
        )
        .unwrap();
        let expr = compile("Location = 'home'").unwrap();
        let matches = set
            .records()
            .iter()
            .filter(|r| matches!(truthy(&evaluate(&expr, r)), Truthiness::Pass))
            .count();
        assert_eq!(matches, 2);
    }

    #[test]
    fn compile_rejects_unterminated_string() {
        assert!(compile("Name = 'oops").is_err());
    }

    #[test]
    fn compile_rejects_trailing_tokens() {
        assert!(compile("1 2").is_err());
    }
}
