//! Token definitions for fy
//!
//! This module defines all the tokens that the lexer can produce.
//! Literal tokens carry typed payloads: numbers keep their digit text
//! together with base, dot flag and type suffix; strings keep their raw
//! bytes together with a flavor selected by the `c`/`p` suffix.

use crate::lexer::LexError;
use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Get the text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

/// A numeric literal payload.
///
/// `text` holds the digits only (no base prefix, no suffix). The suffix
/// defaults to `d` for dotted literals and `i` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberLit {
    pub text: String,
    pub base: u32,
    pub has_dot: bool,
    pub suffix: char,
}

/// How a string literal is materialized (§string literals)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrFlavor {
    /// `"…"c` — NUL-terminated, pointer to bytes
    CString,
    /// `"…"` — inline fixed-size byte aggregate
    CharArray,
    /// `"…"p` — pointer to a byte aggregate
    PtrCharArray,
}

/// A string literal payload: raw bytes after escape processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLit {
    pub bytes: Vec<u8>,
    pub flavor: StrFlavor,
}

/// All possible token types in fy
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"//[^\n\r]*")] // Skip line comments
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")] // Skip block comments
pub enum TokenKind {
    // ============ Literals ============
    /// Number literal: 42, 0x1F, 0b1010, 0o77, 3.14, 7u, 2.5f
    #[regex(r"[0-9]+\.?[0-9]*[dfiulb]?", lex_number)]
    #[regex(r"0x[0-9a-fA-F]+[iul]?", lex_number)]
    #[regex(r"0b[01]+[dfiulb]?", lex_number)]
    #[regex(r"0o[0-7]+[dfiulb]?", lex_number)]
    Number(NumberLit),

    /// String literal: "hello", "bytes\x00"c, "chars"p
    #[regex(r#""([^"\\]|\\.)*"[cp]?"#, lex_string)]
    Str(StringLit),

    /// Character literal: 'a', '\n', '\x41'
    #[regex(r"'([^'\\\n\r]|\\x[0-9a-fA-F][0-9a-fA-F]|\\[^\n\r])'", lex_char)]
    Char(u8),

    /// Boolean literals
    #[token("true")]
    True,
    #[token("false")]
    False,

    /// Typed null
    #[token("null")]
    Null,

    // ============ Keywords ============
    #[token("fn")]
    Fn,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("declare")]
    Declare,
    #[token("struct")]
    Struct,
    #[token("type")]
    Type,
    #[token("new")]
    New,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("vararg")]
    Vararg,

    // ============ Operators ============
    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Comparison
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,

    // Logical
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,

    // Bitwise
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    // Assignment
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AndEq,
    #[token("|=")]
    OrEq,

    // Paths
    #[token("::")]
    ColonColon,

    // ============ Delimiters ============
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // ============ Punctuation ============
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // ============ Identifiers ============
    /// Identifier: foo, _bar, String
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),

    // ============ Special ============
    /// End of file
    Eof,
}

/// The legal numeric type suffixes
const NUM_SUFFIXES: &[char] = &['d', 'f', 'i', 'u', 'l', 'b'];

fn lex_number(lex: &mut logos::Lexer<TokenKind>) -> Result<NumberLit, LexError> {
    let slice = lex.slice();
    let (base, digits) = match slice.as_bytes() {
        [b'0', b'x', ..] => (16, &slice[2..]),
        [b'0', b'b', ..] => (2, &slice[2..]),
        [b'0', b'o', ..] => (8, &slice[2..]),
        _ => (10, slice),
    };
    // The digit classes and the suffix class are disjoint per base, so a
    // trailing letter can only be a suffix.
    let (text, suffix) = match digits.chars().last() {
        Some(c) if NUM_SUFFIXES.contains(&c) && (base != 16 || matches!(c, 'i' | 'u' | 'l')) => {
            (&digits[..digits.len() - 1], Some(c))
        }
        _ => (digits, None),
    };
    let has_dot = text.contains('.');
    Ok(NumberLit {
        text: text.to_owned(),
        base,
        has_dot,
        suffix: suffix.unwrap_or(if has_dot { 'd' } else { 'i' }),
    })
}

fn unescape(chars: &mut std::str::Chars) -> Result<u8, LexError> {
    let escape = chars.next().ok_or(LexError::InvalidEscape('\0'))?;
    Ok(match escape {
        'n' => b'\n',
        'r' => b'\r',
        't' => b'\t',
        '\'' => b'\'',
        '"' => b'"',
        '\\' => b'\\',
        '0' => 0,
        'x' => {
            let hi = chars.next().and_then(|c| c.to_digit(16));
            let lo = chars.next().and_then(|c| c.to_digit(16));
            match (hi, lo) {
                (Some(hi), Some(lo)) => (hi * 16 + lo) as u8,
                _ => return Err(LexError::BadHexEscape),
            }
        }
        other => return Err(LexError::InvalidEscape(other)),
    })
}

fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> Result<StringLit, LexError> {
    let slice = lex.slice();
    let (inner, flavor) = match slice.as_bytes().last() {
        Some(b'c') => (&slice[1..slice.len() - 2], StrFlavor::CString),
        Some(b'p') => (&slice[1..slice.len() - 2], StrFlavor::PtrCharArray),
        _ => (&slice[1..slice.len() - 1], StrFlavor::CharArray),
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            bytes.push(unescape(&mut chars)?);
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    Ok(StringLit { bytes, flavor })
}

fn lex_char(lex: &mut logos::Lexer<TokenKind>) -> Result<u8, LexError> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => unescape(&mut chars),
        Some(c) if c.is_ascii() => Ok(c as u8),
        _ => Err(LexError::BadCharLiteral),
    }
}

impl TokenKind {
    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Fn
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Declare
                | TokenKind::Struct
                | TokenKind::Type
                | TokenKind::New
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::Vararg
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::Char(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }
}

/// Escape one byte the way the lexer would read it back
fn write_escaped(f: &mut fmt::Formatter<'_>, byte: u8, quote: u8) -> fmt::Result {
    match byte {
        b'\n' => write!(f, "\\n"),
        b'\r' => write!(f, "\\r"),
        b'\t' => write!(f, "\\t"),
        b'\\' => write!(f, "\\\\"),
        0 => write!(f, "\\0"),
        b if b == quote => write!(f, "\\{}", quote as char),
        b if (0x20..0x7f).contains(&b) => write!(f, "{}", b as char),
        b => write!(f, "\\x{:02x}", b),
    }
}

impl fmt::Display for TokenKind {
    /// The canonical printable form. Lexing the printout of a token
    /// produces the same token back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => {
                match n.base {
                    16 => write!(f, "0x")?,
                    8 => write!(f, "0o")?,
                    2 => write!(f, "0b")?,
                    _ => {}
                }
                write!(f, "{}", n.text)?;
                let default = if n.has_dot { 'd' } else { 'i' };
                if n.suffix != default {
                    write!(f, "{}", n.suffix)?;
                }
                Ok(())
            }
            TokenKind::Str(s) => {
                write!(f, "\"")?;
                for &b in &s.bytes {
                    write_escaped(f, b, b'"')?;
                }
                write!(f, "\"")?;
                match s.flavor {
                    StrFlavor::CString => write!(f, "c"),
                    StrFlavor::PtrCharArray => write!(f, "p"),
                    StrFlavor::CharArray => Ok(()),
                }
            }
            TokenKind::Char(c) => {
                write!(f, "'")?;
                write_escaped(f, *c, b'\'')?;
                write!(f, "'")
            }
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::Fn => write!(f, "fn"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Const => write!(f, "const"),
            TokenKind::Declare => write!(f, "declare"),
            TokenKind::Struct => write!(f, "struct"),
            TokenKind::Type => write!(f, "type"),
            TokenKind::New => write!(f, "new"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::While => write!(f, "while"),
            TokenKind::Vararg => write!(f, "vararg"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::AndAnd => write!(f, "&&"),
            TokenKind::OrOr => write!(f, "||"),
            TokenKind::Not => write!(f, "!"),
            TokenKind::And => write!(f, "&"),
            TokenKind::Or => write!(f, "|"),
            TokenKind::Shl => write!(f, "<<"),
            TokenKind::Shr => write!(f, ">>"),
            TokenKind::Eq => write!(f, "="),
            TokenKind::PlusEq => write!(f, "+="),
            TokenKind::MinusEq => write!(f, "-="),
            TokenKind::StarEq => write!(f, "*="),
            TokenKind::SlashEq => write!(f, "/="),
            TokenKind::PercentEq => write!(f, "%="),
            TokenKind::AndEq => write!(f, "&="),
            TokenKind::OrEq => write!(f, "|="),
            TokenKind::ColonColon => write!(f, "::"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, "<eof>"),
        }
    }
}
