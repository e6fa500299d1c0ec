//! Byte-offset lexing on top of the `sqlparser` tokenizer.
//!
//! `sqlparser` reports token spans as 1-based line/column pairs counted in
//! characters. Everything downstream (scan records, statement ranges) wants
//! byte offsets, so [`LineIndex`] does the conversion.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError, Whitespace};

use super::keywords::KeywordTable;
use super::StatementRange;
use crate::token::{KeywordClass, RawToken, TokenClass};

/// A token with its half-open byte range in the input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub start: usize,
    pub end: usize,
    pub token: Token,
    pub class: TokenClass,
    pub keyword: KeywordClass,
}

impl Lexeme {
    pub fn is_comment(&self) -> bool {
        self.class.is_comment()
    }

    pub fn to_raw(&self) -> RawToken {
        RawToken {
            start: to_i32(self.start),
            end: to_i32(self.end),
            token: self.class.code(),
            keyword_kind: self.keyword.code(),
        }
    }
}

/// Line start offsets of a source text.
pub(crate) struct LineIndex<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, starts }
    }

    /// Byte offset of a 1-based line/column location, clamped to the text.
    pub fn offset(&self, line: u64, column: u64) -> usize {
        let Some(&line_start) = usize::try_from(line)
            .ok()
            .and_then(|l| l.checked_sub(1))
            .and_then(|l| self.starts.get(l))
        else {
            return self.text.len();
        };
        let skip = usize::try_from(column.saturating_sub(1)).unwrap_or(usize::MAX);
        self.text[line_start..]
            .char_indices()
            .nth(skip)
            .map_or(self.text.len(), |(i, _)| line_start + i)
    }

    pub fn location(&self, loc: Location) -> usize {
        self.offset(loc.line, loc.column)
    }

    /// 1-based character position of a line/column location.
    pub fn char_position(&self, line: u64, column: u64) -> usize {
        let offset = self.offset(line, column);
        self.text[..offset].chars().count() + 1
    }
}

/// Tokenize `sql`, dropping plain whitespace and keeping comments.
pub(crate) fn lex(sql: &str, keywords: &KeywordTable) -> Result<Vec<Lexeme>, TokenizerError> {
    let dialect = PostgreSqlDialect {};
    let spanned = Tokenizer::new(&dialect, sql).tokenize_with_location()?;
    let index = LineIndex::new(sql);

    let mut lexemes = Vec::with_capacity(spanned.len());
    for item in spanned {
        let (class, keyword) = match classify(&item.token, keywords) {
            Some(pair) => pair,
            None => continue,
        };
        let start = index.location(item.span.start);
        let mut end = index.location(item.span.end).max(start);
        if class == TokenClass::SqlComment {
            end = start + sql[start..end].trim_end_matches(['\r', '\n']).len();
        }
        lexemes.push(Lexeme {
            start,
            end,
            token: item.token,
            class,
            keyword,
        });
    }
    Ok(lexemes)
}

fn classify(token: &Token, keywords: &KeywordTable) -> Option<(TokenClass, KeywordClass)> {
    let class = match token {
        Token::EOF => return None,
        Token::Whitespace(Whitespace::SingleLineComment { .. }) => TokenClass::SqlComment,
        Token::Whitespace(Whitespace::MultiLineComment(_)) => TokenClass::CComment,
        Token::Whitespace(_) => return None,
        Token::Word(word) => {
            let keyword = keywords.classify(word);
            let class = if keyword == KeywordClass::None {
                TokenClass::Ident
            } else {
                TokenClass::Keyword
            };
            return Some((class, keyword));
        }
        Token::Number(text, _) => {
            if text.contains(['.', 'e', 'E']) {
                TokenClass::FConst
            } else {
                TokenClass::IConst
            }
        }
        Token::SingleQuotedString(_)
        | Token::EscapedStringLiteral(_)
        | Token::NationalStringLiteral(_)
        | Token::DollarQuotedString(_) => TokenClass::SConst,
        Token::UnicodeStringLiteral(_) => TokenClass::USConst,
        Token::HexStringLiteral(_) => TokenClass::XConst,
        Token::SingleQuotedByteStringLiteral(_) => TokenClass::BConst,
        Token::Placeholder(_) => TokenClass::Param,
        Token::Comma => TokenClass::Comma,
        Token::Eq => TokenClass::Equals,
        Token::Neq => TokenClass::NotEquals,
        Token::Lt => TokenClass::Less,
        Token::Gt => TokenClass::Greater,
        Token::LtEq => TokenClass::LessEquals,
        Token::GtEq => TokenClass::GreaterEquals,
        Token::Plus => TokenClass::Plus,
        Token::Minus => TokenClass::Minus,
        Token::Mul => TokenClass::Star,
        Token::Div => TokenClass::Slash,
        Token::Mod => TokenClass::Percent,
        Token::LParen => TokenClass::LParen,
        Token::RParen => TokenClass::RParen,
        Token::Period => TokenClass::Dot,
        Token::Colon => TokenClass::Colon,
        Token::DoubleColon => TokenClass::Typecast,
        Token::Assignment => TokenClass::ColonEquals,
        Token::SemiColon => TokenClass::Semicolon,
        Token::LBracket => TokenClass::LBracket,
        Token::RBracket => TokenClass::RBracket,
        Token::Caret => TokenClass::Caret,
        Token::RArrow => TokenClass::EqualsGreater,
        _ => TokenClass::Op,
    };
    Some((class, KeywordClass::None))
}

/// Statement ranges from a lexeme stream: split at `;`, comments ignored,
/// empty statements skipped.
pub(crate) fn statement_ranges(lexemes: &[Lexeme]) -> Vec<StatementRange> {
    let mut ranges = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for lexeme in lexemes.iter().filter(|l| !l.is_comment()) {
        if lexeme.class == TokenClass::Semicolon {
            if let Some((start, end)) = current.take() {
                ranges.push(StatementRange {
                    location: start,
                    length: end - start,
                });
            }
            continue;
        }
        current = match current {
            Some((start, _)) => Some((start, lexeme.end)),
            None => Some((lexeme.start, lexeme.end)),
        };
    }
    if let Some((start, end)) = current {
        ranges.push(StatementRange {
            location: start,
            length: end - start,
        });
    }
    ranges
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
