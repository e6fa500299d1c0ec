//! Lexical tokens produced by a scan and their JSON rendering.
//!
//! The engine reports tokens as `(start, end, token_code, keyword_code)`
//! records packed into a binary buffer. [`unpack`] turns that buffer into
//! [`Token`]s, mapping codes onto the closed [`TokenClass`] and
//! [`KeywordClass`] enumerations. Codes with no mapping become `Unknown`
//! rather than failing.

mod encoder;

pub use encoder::{escape_minimal, TokenJsonEncoder, EMPTY_DOCUMENT};

use serde::{Deserialize, Serialize};

use crate::envelope::{ErrorEnvelope, ErrorKind};

/// Message reported when a scan buffer cannot be decoded.
pub const UNPACK_FAILED: &str = "Failed to unpack scan result";

macro_rules! token_classes {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Lexical category of a token, keyed by the engine's native code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TokenClass {
            $($variant,)*
            Unknown,
        }

        impl TokenClass {
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    _ => Self::Unknown,
                }
            }

            /// Native code, or `-1` for [`TokenClass::Unknown`].
            pub fn code(self) -> i32 {
                match self {
                    $(Self::$variant => $code,)*
                    Self::Unknown => -1,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Unknown => "UNKNOWN",
                }
            }
        }
    };
}

token_classes! {
    Percent = 37 => "ASCII_37",
    LParen = 40 => "ASCII_40",
    RParen = 41 => "ASCII_41",
    Star = 42 => "ASCII_42",
    Plus = 43 => "ASCII_43",
    Comma = 44 => "ASCII_44",
    Minus = 45 => "ASCII_45",
    Dot = 46 => "ASCII_46",
    Slash = 47 => "ASCII_47",
    Colon = 58 => "ASCII_58",
    Semicolon = 59 => "ASCII_59",
    Less = 60 => "ASCII_60",
    Equals = 61 => "ASCII_61",
    Greater = 62 => "ASCII_62",
    LBracket = 91 => "ASCII_91",
    RBracket = 93 => "ASCII_93",
    Caret = 94 => "ASCII_94",
    Ident = 258 => "IDENT",
    UIdent = 259 => "UIDENT",
    FConst = 260 => "FCONST",
    SConst = 261 => "SCONST",
    USConst = 262 => "USCONST",
    BConst = 263 => "BCONST",
    XConst = 264 => "XCONST",
    Op = 265 => "Op",
    IConst = 266 => "ICONST",
    Param = 267 => "PARAM",
    Typecast = 268 => "TYPECAST",
    DotDot = 269 => "DOT_DOT",
    ColonEquals = 270 => "COLON_EQUALS",
    EqualsGreater = 271 => "EQUALS_GREATER",
    LessEquals = 272 => "LESS_EQUALS",
    GreaterEquals = 273 => "GREATER_EQUALS",
    NotEquals = 274 => "NOT_EQUALS",
    SqlComment = 275 => "SQL_COMMENT",
    CComment = 276 => "C_COMMENT",
    Keyword = 277 => "KEYWORD",
}

impl TokenClass {
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            Self::FConst | Self::SConst | Self::USConst | Self::BConst | Self::XConst | Self::IConst
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(self, Self::SqlComment | Self::CComment)
    }
}

/// Reservation level of a keyword token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordClass {
    None,
    Unreserved,
    ColumnName,
    TypeOrFunctionName,
    Reserved,
    Unknown,
}

impl KeywordClass {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Unreserved,
            2 => Self::ColumnName,
            3 => Self::TypeOrFunctionName,
            4 => Self::Reserved,
            _ => Self::Unknown,
        }
    }

    /// Native code, or `-1` for [`KeywordClass::Unknown`].
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Unreserved => 1,
            Self::ColumnName => 2,
            Self::TypeOrFunctionName => 3,
            Self::Reserved => 4,
            Self::Unknown => -1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NO_KEYWORD",
            Self::Unreserved => "UNRESERVED_KEYWORD",
            Self::ColumnName => "COL_NAME_KEYWORD",
            Self::TypeOrFunctionName => "TYPE_FUNC_NAME_KEYWORD",
            Self::Reserved => "RESERVED_KEYWORD",
            Self::Unknown => "UNKNOWN_KEYWORD",
        }
    }
}

/// One lexical unit: a half-open byte range into the scanned input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub start: i32,
    pub end: i32,
    pub class: TokenClass,
    pub keyword: KeywordClass,
}

impl Token {
    pub fn new(start: i32, end: i32, class: TokenClass, keyword: KeywordClass) -> Self {
        Self {
            start,
            end,
            class,
            keyword,
        }
    }
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        Self {
            start: raw.start,
            end: raw.end,
            class: TokenClass::from_code(raw.token),
            keyword: KeywordClass::from_code(raw.keyword_kind),
        }
    }
}

/// Wire record of a scanned token as the engine emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawToken {
    pub start: i32,
    pub end: i32,
    pub token: i32,
    pub keyword_kind: i32,
}

/// Encode raw token records into the scan buffer format.
pub fn pack(tokens: &[RawToken]) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(tokens)
}

/// Decode a scan buffer into tokens.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Token>, ErrorEnvelope> {
    let raw: Vec<RawToken> = bincode::deserialize(bytes).map_err(|e| {
        tracing::debug!(error = %e, "scan buffer did not decode");
        ErrorEnvelope::new(ErrorKind::Internal, UNPACK_FAILED)
    })?;
    Ok(raw.into_iter().map(Token::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_class_codes_roundtrip() {
        for class in [
            TokenClass::Ident,
            TokenClass::IConst,
            TokenClass::SConst,
            TokenClass::Semicolon,
            TokenClass::CComment,
            TokenClass::Keyword,
        ] {
            assert_eq!(TokenClass::from_code(class.code()), class);
        }
    }

    #[test]
    fn test_unmapped_codes_are_unknown() {
        assert_eq!(TokenClass::from_code(9999), TokenClass::Unknown);
        assert_eq!(TokenClass::from_code(-4).name(), "UNKNOWN");
        assert_eq!(KeywordClass::from_code(17), KeywordClass::Unknown);
        assert_eq!(KeywordClass::from_code(17).name(), "UNKNOWN_KEYWORD");
        assert_eq!(KeywordClass::from_code(0).name(), "NO_KEYWORD");
    }

    #[test]
    fn test_ascii_names() {
        assert_eq!(TokenClass::LParen.name(), "ASCII_40");
        assert_eq!(TokenClass::Semicolon.name(), "ASCII_59");
        assert_eq!(TokenClass::Equals.name(), "ASCII_61");
    }

    #[test]
    fn test_pack_unpack() {
        let raw = vec![
            RawToken { start: 0, end: 6, token: 277, keyword_kind: 4 },
            RawToken { start: 7, end: 8, token: 266, keyword_kind: 0 },
            RawToken { start: 8, end: 9, token: 12345, keyword_kind: 9 },
        ];
        let tokens = unpack(&pack(&raw).unwrap()).unwrap();
        assert_eq!(tokens[0], Token::new(0, 6, TokenClass::Keyword, KeywordClass::Reserved));
        assert_eq!(tokens[1].class, TokenClass::IConst);
        assert_eq!(tokens[2].class, TokenClass::Unknown);
        assert_eq!(tokens[2].keyword, KeywordClass::Unknown);
    }

    #[test]
    fn test_unpack_garbage() {
        let err = unpack(&[0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.message, UNPACK_FAILED);
    }
}
