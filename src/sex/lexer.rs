//! SEX lexer (C4): produces a token stream from an expression string
//! (`spec.md §4.4`).

use crate::error::{SexError, SexErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Real(f64),
    Str(String),
    Ident(String),
    Meta(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    And,
    Or,
    Not,
    Implies,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Hash,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

/// One lexed token with the byte column at which it started, for
/// error reporting (`spec.md §7`'s `SexError` taxonomy).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    pub(crate) column: usize,
}

pub(crate) fn lex(input: &str) -> Result<Vec<Spanned>, SexError> {
    let bytes = input.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let token = match c {
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Ne
                } else if bytes.get(i + 1) == Some(&b'~') {
                    i += 2;
                    Token::NotMatch
                } else {
                    i += 1;
                    Token::Not
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Le
                } else {
                    i += 1;
                    Token::Lt
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    Token::Ge
                } else {
                    i += 1;
                    Token::Gt
                }
            }
            '~' => {
                i += 1;
                Token::Match
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    i += 2;
                    Token::And
                } else {
                    i += 1;
                    Token::Amp
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    i += 2;
                    Token::Or
                } else {
                    return Err(SexErrorKind::UnknownOperator("|".to_string()).at(start));
                }
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '%' => {
                let next_is_ident_start = bytes
                    .get(i + 1)
                    .is_some_and(|&b| b == b'_' || (b as char).is_ascii_alphabetic());
                if next_is_ident_start {
                    let (name, next) = lex_ident(bytes, i + 1);
                    i = next;
                    Token::Meta(name)
                } else {
                    i += 1;
                    Token::Percent
                }
            }
            '#' => {
                i += 1;
                Token::Hash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '?' => {
                i += 1;
                Token::Question
            }
            ':' => {
                i += 1;
                Token::Colon
            }
            '\'' => {
                let (s, next) = lex_string(bytes, i)?;
                i = next;
                Token::Str(s)
            }
            c if c.is_ascii_digit() => {
                let (tok, next) = lex_number(bytes, i)?;
                i = next;
                tok
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let (name, next) = lex_ident(bytes, i);
                i = next;
                Token::Ident(name)
            }
            _ => {
                return Err(SexErrorKind::UnknownOperator(c.to_string()).at(start));
            }
        };

        // `=>` needs lookahead past Eq; handle it here since Eq already
        // consumed a single '='.
        let token = if token == Token::Eq && bytes.get(i) == Some(&b'>') {
            i += 1;
            Token::Implies
        } else {
            token
        };

        out.push(Spanned { token, column: start });
    }

    Ok(out)
}

fn lex_string(bytes: &[u8], start: usize) -> Result<(String, usize), SexError> {
    let mut i = start + 1;
    let mut s = String::new();
    loop {
        match bytes.get(i) {
            None => return Err(SexErrorKind::UnterminatedString.at(start)),
            Some(b'\'') => {
                i += 1;
                break;
            }
            Some(b'\\') => {
                match bytes.get(i + 1) {
                    Some(b'\\') => {
                        s.push('\\');
                        i += 2;
                    }
                    Some(b'\'') => {
                        s.push('\'');
                        i += 2;
                    }
                    _ => return Err(SexErrorKind::UnterminatedString.at(start)),
                }
            }
            Some(&b) => {
                s.push(b as char);
                i += 1;
            }
        }
    }
    Ok((s, i))
}

/// Scans a number literal. Returns a `SexError` rather than panicking when
/// an integer literal is syntactically valid but overflows `i64` — lexing
/// must stay total, the same as compilation and evaluation (`spec.md §5`,
/// §7).
fn lex_number(bytes: &[u8], start: usize) -> Result<(Token, usize), SexError> {
    let mut i = start;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let mut is_real = false;
    if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        is_real = true;
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(u8::is_ascii_digit) {
            is_real = true;
            j += 1;
            while bytes.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            i = j;
        }
    }
    let text = std::str::from_utf8(&bytes[start..i]).unwrap();
    if is_real {
        Ok((Token::Real(text.parse().unwrap()), i))
    } else {
        match text.parse() {
            Ok(n) => Ok((Token::Int(n), i)),
            Err(_) => Err(SexErrorKind::IntegerOverflow(text.to_string()).at(start)),
        }
    }
}

fn lex_ident(bytes: &[u8], start: usize) -> (String, usize) {
    let mut i = start;
    while bytes
        .get(i)
        .is_some_and(|&b| b == b'_' || (b as char).is_ascii_alphanumeric())
    {
        i += 1;
    }
    (std::str::from_utf8(&bytes[start..i]).unwrap().to_string(), i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<Token> {
        lex(s).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn operators() {
        assert_eq!(
            toks("= != < <= > >= ~ !~ && || ! => ? :"),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Match,
                Token::NotMatch,
                Token::And,
                Token::Or,
                Token::Not,
                Token::Implies,
                Token::Question,
                Token::Colon,
            ]
        );
    }

    #[test]
    fn string_literal_escapes() {
        assert_eq!(toks(r"'a\'b\\c'"), vec![Token::Str("a'b\\c".to_string())]);
    }

    #[test]
    fn number_literals() {
        assert_eq!(toks("42 -3.5 1e10"), vec![Token::Int(42), Token::Minus, Token::Real(3.5), Token::Real(1e10)]);
    }

    #[test]
    fn field_ref_and_count() {
        assert_eq!(toks("Age #Age"), vec![Token::Ident("Age".to_string()), Token::Hash, Token::Ident("Age".to_string())]);
    }

    #[test]
    fn meta_ident_vs_modulo() {
        assert_eq!(toks("%rec"), vec![Token::Meta("rec".to_string())]);
        assert_eq!(toks("10 % 3"), vec![Token::Int(10), Token::Percent, Token::Int(3)]);
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(lex("'abc").is_err());
    }

    #[test]
    fn overflowing_integer_literal_is_an_error_not_a_panic() {
        assert!(matches!(
            lex("99999999999999999999").unwrap_err().kind(),
            SexErrorKind::IntegerOverflow(text) if text == "99999999999999999999"
        ));
    }
}
