// tests/lexer_tests.rs

use sprig_lang::lexer::{LexError, Lexer, Token};

fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token().expect("lex failure");
        let done = token == Token::Eof;
        out.push(token);
        if done {
            break;
        }
    }
    out
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_integers_and_floats() {
    assert_eq!(
        tokens("42 3.15"),
        vec![Token::Int(42), Token::Float(3.15), Token::Eof]
    );
}

#[test]
fn test_single_and_double_quoted_strings() {
    assert_eq!(
        tokens(r#"'foo' "bar baz""#),
        vec![
            Token::Str("foo".to_string()),
            Token::Str("bar baz".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_string_escapes() {
    let mut lexer = Lexer::new(r#"'a\nb\'c'"#);
    assert_eq!(lexer.next_token(), Ok(Token::Str("a\nb'c".to_string())));
}

#[test]
fn test_unterminated_string() {
    let mut lexer = Lexer::new("'oops");
    assert_eq!(
        lexer.next_token(),
        Err(LexError::UnterminatedString { position: 0 })
    );
}

#[test]
fn test_invalid_escape() {
    let mut lexer = Lexer::new(r#"'a\qb'"#);
    assert!(matches!(
        lexer.next_token(),
        Err(LexError::InvalidEscape { ch: 'q', .. })
    ));
}

#[test]
fn test_fstring() {
    assert_eq!(
        tokens("f'hello {@name}!'"),
        vec![Token::FString("hello {@name}!".to_string()), Token::Eof]
    );
}

#[test]
fn test_booleans_and_null() {
    assert_eq!(
        tokens("true false null"),
        vec![Token::Bool(true), Token::Bool(false), Token::Null, Token::Eof]
    );
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_arithmetic_operators() {
    assert_eq!(
        tokens("1 + 2 - 3 * 4 / 5"),
        vec![
            Token::Int(1),
            Token::Plus,
            Token::Int(2),
            Token::Minus,
            Token::Int(3),
            Token::Star,
            Token::Int(4),
            Token::Slash,
            Token::Int(5),
            Token::Eof
        ]
    );
}

#[test]
fn test_comparison_operators() {
    assert_eq!(
        tokens("== != > < >= <="),
        vec![
            Token::EqEq,
            Token::NotEq,
            Token::Gt,
            Token::Lt,
            Token::GtEq,
            Token::LtEq,
            Token::Eof
        ]
    );
}

#[test]
fn test_double_colon_cast() {
    assert_eq!(
        tokens("'3'::int"),
        vec![
            Token::Str("3".to_string()),
            Token::DoubleColon,
            Token::Ident("int".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_lone_equals_has_hint() {
    let mut lexer = Lexer::new("a = b");
    assert_eq!(lexer.next_token(), Ok(Token::Ident("a".to_string())));
    let err = lexer.next_token().unwrap_err();
    assert!(err.to_string().contains("'=='"));
}

#[test]
fn test_lone_colon_has_hint() {
    let mut lexer = Lexer::new(": x");
    let err = lexer.next_token().unwrap_err();
    assert!(err.to_string().contains("'::'"));
}

// ============================================================================
// References and keywords
// ============================================================================

#[test]
fn test_column_reference() {
    assert_eq!(
        tokens("@price"),
        vec![Token::ColumnRef("price".to_string()), Token::Eof]
    );
}

#[test]
fn test_bare_at_is_timestamp_separator() {
    assert_eq!(
        tokens("@ 11:30"),
        vec![
            Token::At,
            Token::Time {
                hour: 11,
                minute: 30,
                second: 0
            },
            Token::Eof
        ]
    );
}

#[test]
fn test_keywords_do_not_leak_into_identifiers() {
    assert_eq!(
        tokens("iff extracted matchbox"),
        vec![
            Token::Ident("iff".to_string()),
            Token::Ident("extracted".to_string()),
            Token::Ident("matchbox".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_conditional_keywords() {
    assert_eq!(
        tokens("a if b else c"),
        vec![
            Token::Ident("a".to_string()),
            Token::If,
            Token::Ident("b".to_string()),
            Token::Else,
            Token::Ident("c".to_string()),
            Token::Eof
        ]
    );
}

// ============================================================================
// Regex literals: one token of lookbehind
// ============================================================================

#[test]
fn test_regex_after_extract() {
    assert_eq!(
        tokens(r"extract /\d+/ from raw"),
        vec![
            Token::Extract,
            Token::Regex(r"\d+".to_string()),
            Token::From,
            Token::Ident("raw".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_regex_after_match() {
    assert_eq!(
        tokens("match /foo|bar/ against raw"),
        vec![
            Token::Match,
            Token::Regex("foo|bar".to_string()),
            Token::Against,
            Token::Ident("raw".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_regex_escaped_slash() {
    assert_eq!(
        tokens(r"match /a\/b/ against raw"),
        vec![
            Token::Match,
            Token::Regex("a/b".to_string()),
            Token::Against,
            Token::Ident("raw".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_slash_is_division_elsewhere() {
    assert_eq!(
        tokens("6 / 2"),
        vec![Token::Int(6), Token::Slash, Token::Int(2), Token::Eof]
    );
}

// ============================================================================
// Time literals
// ============================================================================

#[test]
fn test_time_with_seconds_and_meridiem_dots() {
    assert_eq!(
        tokens("11:59:59 p.m."),
        vec![
            Token::Time {
                hour: 11,
                minute: 59,
                second: 59
            },
            Token::Pm,
            Token::Eof
        ]
    );
}

#[test]
fn test_meridiem_words() {
    assert_eq!(tokens("am pm"), vec![Token::Am, Token::Pm, Token::Eof]);
}

#[test]
fn test_out_of_range_time_rejected() {
    let mut lexer = Lexer::new("25:00");
    assert!(matches!(
        lexer.next_token(),
        Err(LexError::InvalidTime { .. })
    ));
}
