//! Lexer for fy
//!
//! The lexer converts source code into a stream of tokens. Token
//! recognition itself is driven by the `logos` derive on
//! [`TokenKind`]; this module wraps it with the single-token lookahead
//! the parser works against and with the fatal-error contract: the
//! first lex error aborts the token stream.

use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Lexer errors. All of them are fatal to the compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
pub enum LexError {
    #[default]
    #[error("unexpected character")]
    UnexpectedChar,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("bad character literal (unterminated or longer than one byte)")]
    BadCharLiteral,

    #[error("invalid escape '\\{0}'")]
    InvalidEscape(char),

    #[error("expected two hex digits after \\x")]
    BadHexEscape,
}

/// The lexer for fy
pub struct Lexer<'src> {
    source: &'src str,
    inner: logos::Lexer<'src, TokenKind>,
    peeked: Option<Token>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            inner: TokenKind::lexer(source),
            peeked: None,
        }
    }

    /// Get the source code
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// The span of the most recently produced token or error
    pub fn span(&self) -> Span {
        let span = self.inner.span();
        Span::new(span.start, span.end)
    }

    /// Peek at the next token without consuming it
    pub fn peek(&mut self) -> Result<&Token, LexError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    /// Get the next token and advance past it
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.peeked.take() {
            return Ok(token);
        }

        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                Ok(Token::new(kind, Span::new(span.start, span.end)))
            }
            Some(Err(err)) => Err(self.refine(err)),
            None => {
                // End of input - return EOF token
                let pos = self.source.len();
                Ok(Token::new(TokenKind::Eof, Span::new(pos, pos)))
            }
        }
    }

    /// A failed match only tells logos "no rule applies"; look at the
    /// first byte of the failed slice to name the error precisely.
    fn refine(&self, err: LexError) -> LexError {
        if err != LexError::UnexpectedChar {
            return err;
        }
        match self.inner.slice().as_bytes().first() {
            Some(b'"') => LexError::UnterminatedString,
            Some(b'\'') => LexError::BadCharLiteral,
            _ => err,
        }
    }

    /// Collect all tokens (ending with EOF) into a vector
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(token) if token.kind == TokenKind::Eof => None,
            other => Some(other),
        }
    }
}

/// Helper function to lex source code
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{NumberLit, StrFlavor, StringLit};
    use pretty_assertions::assert_eq;

    fn token_kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lexing failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn num(text: &str, base: u32, has_dot: bool, suffix: char) -> TokenKind {
        TokenKind::Number(NumberLit {
            text: text.to_owned(),
            base,
            has_dot,
            suffix,
        })
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(token_kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_number_suffixes() {
        let kinds = token_kinds("0x1F 42 3.14 7u 8b 9l 2.5f");
        assert_eq!(
            kinds,
            vec![
                num("1F", 16, false, 'i'),
                num("42", 10, false, 'i'),
                num("3.14", 10, true, 'd'),
                num("7", 10, false, 'u'),
                num("8", 10, false, 'b'),
                num("9", 10, false, 'l'),
                num("2.5", 10, true, 'f'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_number_bases() {
        let kinds = token_kinds("0b1010 0o77 0x1bl");
        assert_eq!(
            kinds,
            vec![
                num("1010", 2, false, 'i'),
                num("77", 8, false, 'i'),
                num("1b", 16, false, 'l'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_second_dot_terminates() {
        let kinds = token_kinds("3.14.5");
        assert_eq!(
            kinds,
            vec![
                num("3.14", 10, true, 'd'),
                TokenKind::Dot,
                num("5", 10, false, 'i'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_flavors() {
        let kinds = token_kinds(r#""hi"c "hi"p "hi""#);
        let lit = |flavor| {
            TokenKind::Str(StringLit {
                bytes: b"hi".to_vec(),
                flavor,
            })
        };
        assert_eq!(
            kinds,
            vec![
                lit(StrFlavor::CString),
                lit(StrFlavor::PtrCharArray),
                lit(StrFlavor::CharArray),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let kinds = token_kinds(r#""a\n\t\\\"\x41\0""#);
        assert_eq!(
            kinds,
            vec![
                TokenKind::Str(StringLit {
                    bytes: b"a\n\t\\\"A\0".to_vec(),
                    flavor: StrFlavor::CharArray,
                }),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_char_literals() {
        let kinds = token_kinds(r"'a' '\n' '\x41' '\''");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Char(b'a'),
                TokenKind::Char(b'\n'),
                TokenKind::Char(b'A'),
                TokenKind::Char(b'\''),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let kinds = token_kinds("fn let const declare struct type new if else while");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Fn,
                TokenKind::Let,
                TokenKind::Const,
                TokenKind::Declare,
                TokenKind::Struct,
                TokenKind::Type,
                TokenKind::New,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators_maximal_munch() {
        let kinds = token_kinds("== <= >= != += -= *= /= %= &= |= || && << >> :: = < >");
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::NotEq,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::AndEq,
                TokenKind::OrEq,
                TokenKind::OrOr,
                TokenKind::AndAnd,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::ColonColon,
                TokenKind::Eq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments() {
        let kinds = token_kinds(
            "// line comment\nlet x = 1 /* block\ncomment ** with stars */ + 2 // tail",
        );
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".to_owned()),
                TokenKind::Eq,
                num("1", 10, false, 'i'),
                TokenKind::Plus,
                num("2", 10, false, 'i'),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(lex("\"oops"), Err(LexError::UnterminatedString));
    }

    #[test]
    fn test_bad_escape() {
        assert_eq!(lex(r#""\q""#), Err(LexError::InvalidEscape('q')));
        assert_eq!(lex(r#""\x4g""#), Err(LexError::BadHexEscape));
    }

    #[test]
    fn test_bad_char() {
        assert_eq!(lex("'ab'"), Err(LexError::BadCharLiteral));
        assert_eq!(lex("'a"), Err(LexError::BadCharLiteral));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("let x");
        assert_eq!(lexer.peek().unwrap().kind, TokenKind::Let);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Let);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Ident("x".to_owned()));
    }

    #[test]
    fn test_print_round_trip() {
        let source = r#"fn eputs(s: *u8) { while (s[0i] != 0b) 1 else "done"p } 0x1F 3.14 7u '\n'"#;
        let tokens = lex(source).unwrap();
        let printed: Vec<String> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.kind.to_string())
            .collect();
        let reparsed = lex(&printed.join(" ")).unwrap();
        let original: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
        let round_tripped: Vec<&TokenKind> = reparsed.iter().map(|t| &t.kind).collect();
        assert_eq!(original, round_tripped);
    }
}
