//! Token JSON document rendering.

use querybridge::token::{
    escape_minimal, unpack, KeywordClass, RawToken, Token, TokenClass, TokenJsonEncoder,
    EMPTY_DOCUMENT,
};

fn keyword(start: i32, end: i32) -> Token {
    Token::new(start, end, TokenClass::Keyword, KeywordClass::Reserved)
}

#[test]
fn test_empty_stream_is_fixed_document() {
    let encoder = TokenJsonEncoder::default();
    assert_eq!(encoder.encode(170000, &[], "SELECT 1"), EMPTY_DOCUMENT);
    assert_eq!(encoder.encode(0, &[], ""), r#"{"version":0,"tokens":[]}"#);
}

#[test]
fn test_select_one() {
    let tokens = [
        keyword(0, 6),
        Token::new(7, 8, TokenClass::IConst, KeywordClass::None),
    ];
    let doc = TokenJsonEncoder::default().encode(170000, &tokens, "SELECT 1");

    insta::assert_snapshot!(doc, @r#"{"version":170000,"tokens":[{"start":0,"end":6,"text":"SELECT","tokenName":"KEYWORD","keywordName":"RESERVED_KEYWORD"},{"start":7,"end":8,"text":"1","tokenName":"ICONST","keywordName":"NO_KEYWORD"}]}"#);

    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(value["tokens"][0]["start"], 0);
    assert_eq!(value["tokens"][0]["end"], 6);
    assert_eq!(value["tokens"][0]["text"], "SELECT");
}

#[test]
fn test_quotes_and_backslashes_escaped_once() {
    let input = r#"SELECT 'a"b\c'"#;
    let tokens = [
        keyword(0, 6),
        Token::new(7, 14, TokenClass::SConst, KeywordClass::None),
    ];
    let doc = TokenJsonEncoder::default().encode(1, &tokens, input);
    assert!(doc.contains(r#""text":"'a\"b\\c'""#));
}

#[test]
fn test_escaping_leaves_other_characters_alone() {
    assert_eq!(escape_minimal("tab\there\nnewline"), "tab\there\nnewline");
    assert_eq!(escape_minimal(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
}

#[test]
fn test_unmapped_codes_render_unknown() {
    let tokens = [Token::new(0, 1, TokenClass::from_code(900), KeywordClass::from_code(42))];
    let doc = TokenJsonEncoder::default().encode(1, &tokens, "x");
    assert!(doc.contains(r#""tokenName":"UNKNOWN","keywordName":"UNKNOWN_KEYWORD""#));
}

#[test]
fn test_inverted_range_is_empty_text() {
    let tokens = [Token::new(5, 2, TokenClass::Ident, KeywordClass::None)];
    let doc = TokenJsonEncoder::default().encode(1, &tokens, "SELECT 1");
    assert!(doc.contains(r#"{"start":5,"end":2,"text":"","#));
}

#[test]
fn test_long_identifier_grows_buffer() {
    let long = "x".repeat(100_000);
    let input = format!("SELECT \"{long}\" FROM t");
    let end = 7 + long.len() as i32 + 2;
    let tokens = [
        keyword(0, 6),
        Token::new(7, end, TokenClass::Ident, KeywordClass::None),
    ];
    let doc = TokenJsonEncoder::default().encode(1, &tokens, &input);

    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(value["tokens"][1]["text"], format!("\"{long}\""));
}

#[test]
fn test_many_tokens() {
    let input = "a,".repeat(5_000);
    let tokens: Vec<Token> = (0..5_000)
        .map(|i| Token::new(i * 2, i * 2 + 1, TokenClass::Ident, KeywordClass::None))
        .collect();
    let doc = TokenJsonEncoder::default().encode(3, &tokens, &input);

    let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
    assert_eq!(value["tokens"].as_array().unwrap().len(), 5_000);
}

#[test]
fn test_unpacked_records_encode() {
    let raw = [RawToken {
        start: 0,
        end: 6,
        token: TokenClass::Keyword.code(),
        keyword_kind: KeywordClass::Reserved.code(),
    }];
    let tokens = unpack(&querybridge::token::pack(&raw).unwrap()).unwrap();
    let doc = TokenJsonEncoder::default().encode(1, &tokens, "SELECT");
    assert!(doc.contains(r#""text":"SELECT","tokenName":"KEYWORD""#));
}
