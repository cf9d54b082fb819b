use thiserror::Error;

/// Lexical tokens of the string grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Integer literal
    Int(i64),

    /// Floating-point literal
    Float(f64),

    /// Quoted string literal (single or double quotes)
    Str(String),

    /// F-string literal (`f'...{EXPR}...'`); the raw body, braces intact
    FString(String),

    /// Regex literal (`/pattern/`); only recognized after `extract`,
    /// `of`, or `match`
    Regex(String),

    /// Boolean literal
    Bool(bool),

    /// Null literal
    Null,

    /// Clock time literal (`11:59` or `11:59:59`)
    Time { hour: u32, minute: u32, second: u32 },

    /// Morning meridiem (`am` / `a.m.`)
    Am,

    /// Afternoon meridiem (`pm` / `p.m.`)
    Pm,

    // References
    /// Bare identifier (function name, type name, or column/literal name
    /// pending schema disambiguation)
    Ident(String),

    /// Column reference (`@name`)
    ColumnRef(String),

    // Keywords
    And,
    Or,
    Not,
    If,
    Else,
    As,
    Extract,
    Group,
    Of,
    From,
    Match,
    Against,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    /// High-precedence cast operator (`::`)
    DoubleColon,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// Timestamp-resolution separator (`@` not followed by a name)
    At,

    // Delimiters
    LParen,
    RParen,
    Comma,

    /// End of input
    Eof,
}

/// Errors produced while tokenizing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unexpected '=' at position {position} (did you mean '=='?)")]
    LoneEquals { position: usize },

    #[error("unexpected '!' at position {position} (did you mean '!=' or 'not'?)")]
    LoneBang { position: usize },

    #[error("unexpected ':' at position {position} (did you mean '::'?)")]
    LoneColon { position: usize },

    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("invalid escape sequence '\\{ch}' at position {position}")]
    InvalidEscape { ch: char, position: usize },

    #[error("unterminated regex literal starting at position {position}")]
    UnterminatedRegex { position: usize },

    #[error("invalid number '{text}' at position {position}")]
    InvalidNumber { text: String, position: usize },

    #[error("invalid time literal at position {position}")]
    InvalidTime { position: usize },
}

/// Single-pass tokenizer for the string grammar.
///
/// The lexer is context-free apart from one deliberate exception: a `/`
/// starts a regex literal when the previous token was `extract`, `of`, or
/// `match`, and means division everywhere else (the same one-token
/// lookbehind JavaScript lexers use for `/.../`).
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    regex_ok: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            regex_ok: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(LexError::InvalidEscape {
                                ch,
                                position: self.position,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedString { position: start })
    }

    fn read_regex(&mut self) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // consume opening slash

        while let Some(ch) = self.current_char() {
            match ch {
                '/' => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        // An escaped slash is the only escape the lexer
                        // interprets; everything else passes through to
                        // the regex engine untouched.
                        Some('/') => result.push('/'),
                        Some(next) => {
                            result.push('\\');
                            result.push(next);
                        }
                        None => return Err(LexError::UnterminatedRegex { position: start }),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::UnterminatedRegex { position: start })
    }

    fn read_time_component(&mut self) -> Result<u32, LexError> {
        let start = self.position;
        let mut digits = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        digits
            .parse::<u32>()
            .map_err(|_| LexError::InvalidTime { position: start })
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // `11:59` / `11:59:59` clock-time literals: an integer followed by
        // a colon and another digit. Distinct from `::` casts, which never
        // have a digit after the first colon.
        if !is_float
            && self.current_char() == Some(':')
            && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            let hour = number
                .parse::<u32>()
                .map_err(|_| LexError::InvalidTime { position: start })?;
            self.advance(); // consume ':'
            let minute = self.read_time_component()?;
            let second = if self.current_char() == Some(':')
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                self.advance();
                self.read_time_component()?
            } else {
                0
            };
            if hour > 23 || minute > 59 || second > 59 {
                return Err(LexError::InvalidTime { position: start });
            }
            return Ok(Token::Time {
                hour,
                minute,
                second,
            });
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber {
                    text: number.clone(),
                    position: start,
                })
        } else {
            number
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| LexError::InvalidNumber {
                    text: number.clone(),
                    position: start,
                })
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let token = self.scan_token()?;
        self.regex_ok = matches!(token, Token::Extract | Token::Of | Token::Match);
        Ok(token)
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        match self.current_char() {
            None => Ok(Token::Eof),
            Some('+') => {
                self.advance();
                Ok(Token::Plus)
            }
            Some('-') => {
                self.advance();
                Ok(Token::Minus)
            }
            Some('*') => {
                self.advance();
                Ok(Token::Star)
            }
            Some('/') => {
                if self.regex_ok {
                    Ok(Token::Regex(self.read_regex()?))
                } else {
                    self.advance();
                    Ok(Token::Slash)
                }
            }
            Some('(') => {
                self.advance();
                Ok(Token::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Token::RParen)
            }
            Some(',') => {
                self.advance();
                Ok(Token::Comma)
            }
            Some(':') => {
                if self.peek_char(1) == Some(':') {
                    self.advance();
                    self.advance();
                    Ok(Token::DoubleColon)
                } else {
                    Err(LexError::LoneColon {
                        position: self.position,
                    })
                }
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::EqEq)
                } else {
                    Err(LexError::LoneEquals {
                        position: self.position,
                    })
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    Err(LexError::LoneBang {
                        position: self.position,
                    })
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::GtEq)
                } else {
                    self.advance();
                    Ok(Token::Gt)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Token::LtEq)
                } else {
                    self.advance();
                    Ok(Token::Lt)
                }
            }
            Some('@') => {
                if self
                    .peek_char(1)
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
                {
                    self.advance();
                    Ok(Token::ColumnRef(self.read_identifier()))
                } else {
                    self.advance();
                    Ok(Token::At)
                }
            }
            Some('"') => Ok(Token::Str(self.read_string('"')?)),
            Some('\'') => Ok(Token::Str(self.read_string('\'')?)),
            // `a.m.` / `p.m.` before generic identifiers, since dots end
            // identifier reading.
            Some(ch @ ('a' | 'p'))
                if self.peek_char(1) == Some('.')
                    && self.peek_char(2) == Some('m')
                    && self.peek_char(3) == Some('.') =>
            {
                self.position += 4;
                Ok(if ch == 'a' { Token::Am } else { Token::Pm })
            }
            // `f'...'` / `f"..."` f-strings.
            Some('f') if matches!(self.peek_char(1), Some('\'') | Some('"')) => {
                let quote = self.peek_char(1).unwrap_or('\'');
                self.advance();
                Ok(Token::FString(self.read_string(quote)?))
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                Ok(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "as" => Token::As,
                    "extract" => Token::Extract,
                    "group" => Token::Group,
                    "of" => Token::Of,
                    "from" => Token::From,
                    "match" => Token::Match,
                    "against" => Token::Against,
                    "am" => Token::Am,
                    "pm" => Token::Pm,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" => Token::Null,
                    _ => Token::Ident(ident),
                })
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(LexError::UnexpectedChar {
                ch,
                position: self.position,
            }),
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("and or not true false null");
    assert_eq!(lexer.next_token(), Ok(Token::And));
    assert_eq!(lexer.next_token(), Ok(Token::Or));
    assert_eq!(lexer.next_token(), Ok(Token::Not));
    assert_eq!(lexer.next_token(), Ok(Token::Bool(true)));
    assert_eq!(lexer.next_token(), Ok(Token::Bool(false)));
    assert_eq!(lexer.next_token(), Ok(Token::Null));
}

#[test]
fn test_regex_only_after_keywords() {
    let mut lexer = Lexer::new("extract /\\d+/ from 6 / 2");
    assert_eq!(lexer.next_token(), Ok(Token::Extract));
    assert_eq!(lexer.next_token(), Ok(Token::Regex("\\d+".to_string())));
    assert_eq!(lexer.next_token(), Ok(Token::From));
    assert_eq!(lexer.next_token(), Ok(Token::Int(6)));
    assert_eq!(lexer.next_token(), Ok(Token::Slash));
    assert_eq!(lexer.next_token(), Ok(Token::Int(2)));
}

#[test]
fn test_time_literal_and_meridiem() {
    let mut lexer = Lexer::new("@ 11:59:59 p.m.");
    assert_eq!(lexer.next_token(), Ok(Token::At));
    assert_eq!(
        lexer.next_token(),
        Ok(Token::Time {
            hour: 11,
            minute: 59,
            second: 59
        })
    );
    assert_eq!(lexer.next_token(), Ok(Token::Pm));
}
