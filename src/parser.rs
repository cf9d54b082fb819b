use std::mem;

use thiserror::Error;

use crate::ast::Kind;
use crate::lexer::{LexError, Lexer, Token};
use crate::registry::Registry;
use crate::value::{RawValue, Scalar};

/// Errors produced while parsing the string grammar.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, got {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected token in expression: {found}")]
    UnexpectedPrimary { found: String },

    #[error("unsupported operator '{symbol}'; supported: {supported}")]
    UnknownOperator { symbol: String, supported: String },

    #[error("unsupported function '{name}'; supported: {supported}")]
    UnknownFunction { name: String, supported: String },

    #[error("trailing input after expression: {found}")]
    TrailingInput { found: String },

    #[error("malformed f-string: {reason}")]
    MalformedFString { reason: String },
}

/// Recursive-descent parser for the string grammar.
///
/// Every production yields the canonical short-form [`RawValue`] of its
/// node — the same mappings the dictionary-input path accepts — so the
/// string grammar and dictionary inputs share one resolver. All semantic
/// validation (arity, keyword sets, literal-evaluation requirements) is
/// deferred to node construction and lowering.
///
/// Precedence, loosest to tightest:
///
/// 1. conditional (`THEN if COND [else ELSE]`)
/// 2. `as` cast
/// 3. `or`
/// 4. `and`
/// 5. `not`, regex phrases (`extract ... from`, `match ... against`)
/// 6. comparisons (`==` `!=` `>` `<` `>=` `<=`, non-chaining)
/// 7. timestamp resolution (`DATE @ HH:MM:SS [a.m.|p.m.]`)
/// 8. additive (`+` `-`; an all-`+` run becomes one n-ary `add`)
/// 9. multiplicative (`*` `/`; same n-ary rule for `*`)
/// 10. `::` cast
/// 11. unary `-`
/// 12. primary (literals, `@name`, bare names, f-strings, function calls,
///     parentheses)
///
/// The two cast tiers are deliberate and load-bearing: `4 + '3'::int`
/// casts only `'3'`, while `'01' + '01' as date` casts the whole sum.
pub struct Parser<'r> {
    lexer: Lexer,
    current_token: Token,
    registry: &'r Registry,
}

/// Parse one grammar string into its canonical raw form.
pub fn parse_str(source: &str, registry: &Registry) -> Result<RawValue, ParseError> {
    let mut parser = Parser::new(Lexer::new(source), registry)?;
    parser.parse()
}

impl<'r> Parser<'r> {
    pub fn new(mut lexer: Lexer, registry: &'r Registry) -> Result<Self, ParseError> {
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            registry,
        })
    }

    /// Parse a complete expression; trailing input is an error.
    pub fn parse(&mut self) -> Result<RawValue, ParseError> {
        let value = self.parse_expression()?;
        if self.current_token != Token::Eof {
            return Err(ParseError::TrailingInput {
                found: format!("{:?}", self.current_token),
            });
        }
        Ok(value)
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    /// Take ownership of the current token and advance past it.
    fn take(&mut self) -> Result<Token, ParseError> {
        let token = mem::replace(&mut self.current_token, Token::Eof);
        self.advance()?;
        Ok(token)
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if !self.check(&expected) {
            return Err(ParseError::UnexpectedToken {
                expected: format!("{:?}", expected),
                found: format!("{:?}", self.current_token),
            });
        }
        self.advance()
    }

    // Registry lookups. The token set is fixed, but symbols route through
    // the registry so removing a node type from the table surfaces here as
    // a parse-time "unsupported operator" instead of a construction error.

    fn infix_kind(&self, symbol: &str) -> Result<Kind, ParseError> {
        self.registry
            .infix(symbol)
            .ok_or_else(|| ParseError::UnknownOperator {
                symbol: symbol.to_string(),
                supported: self
                    .registry
                    .infix_symbols()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn prefix_kind(&self, symbol: &str) -> Result<Kind, ParseError> {
        self.registry
            .prefix(symbol)
            .ok_or_else(|| ParseError::UnknownOperator {
                symbol: symbol.to_string(),
                supported: "-, not".to_string(),
            })
    }

    fn function_kind(&self, name: &str) -> Result<Kind, ParseError> {
        self.registry
            .by_key(name)
            .ok_or_else(|| ParseError::UnknownFunction {
                name: name.to_string(),
                supported: self.registry.keys().collect::<Vec<_>>().join(", "),
            })
    }

    // Short-form builders.

    fn positional(kind: Kind, args: Vec<RawValue>) -> RawValue {
        RawValue::short_form(kind.key(), RawValue::List(args))
    }

    fn keywords(kind: Kind, entries: Vec<(&str, RawValue)>) -> RawValue {
        let map = entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        RawValue::short_form(kind.key(), RawValue::Map(map))
    }

    fn literal(scalar: Scalar) -> RawValue {
        RawValue::short_form(Kind::Literal.key(), RawValue::Scalar(scalar))
    }

    // Productions, loosest binding first.

    fn parse_expression(&mut self) -> Result<RawValue, ParseError> {
        self.parse_conditional()
    }

    /// `THEN if COND [else ELSE]`; the else branch right-chains, so
    /// `a if c else b if d else e` nests in the else arm.
    fn parse_conditional(&mut self) -> Result<RawValue, ParseError> {
        let then = self.parse_as_cast()?;
        if !self.check(&Token::If) {
            return Ok(then);
        }
        self.advance()?;
        let when = self.parse_as_cast()?;
        let mut entries = vec![("when", when), ("then", then)];
        if self.check(&Token::Else) {
            self.advance()?;
            entries.push(("otherwise", self.parse_conditional()?));
        }
        Ok(Self::keywords(Kind::Conditional, entries))
    }

    /// Low-tier cast: `EXPR as type` applies to everything parsed so far.
    fn parse_as_cast(&mut self) -> Result<RawValue, ParseError> {
        let mut expr = self.parse_or()?;
        while self.check(&Token::As) {
            self.advance()?;
            let kind = self.infix_kind("as")?;
            let type_name = self.expect_type_name()?;
            expr = Self::positional(kind, vec![expr, Self::literal(Scalar::Str(type_name))]);
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<RawValue, ParseError> {
        let first = self.parse_and()?;
        if !self.check(&Token::Or) {
            return Ok(first);
        }
        let kind = self.infix_kind("or")?;
        let mut terms = vec![first];
        while self.check(&Token::Or) {
            self.advance()?;
            terms.push(self.parse_and()?);
        }
        Ok(Self::positional(kind, terms))
    }

    fn parse_and(&mut self) -> Result<RawValue, ParseError> {
        let first = self.parse_unary_bool()?;
        if !self.check(&Token::And) {
            return Ok(first);
        }
        let kind = self.infix_kind("and")?;
        let mut terms = vec![first];
        while self.check(&Token::And) {
            self.advance()?;
            terms.push(self.parse_unary_bool()?);
        }
        Ok(Self::positional(kind, terms))
    }

    /// Prefix boolean operators and the natural-language regex phrases.
    fn parse_unary_bool(&mut self) -> Result<RawValue, ParseError> {
        match &self.current_token {
            Token::Not => {
                self.advance()?;
                let kind = self.prefix_kind("not")?;
                let inner = self.parse_unary_bool()?;
                Ok(Self::positional(kind, vec![inner]))
            }
            Token::Match => self.parse_regex_match(),
            Token::Extract => self.parse_regex_extract(),
            _ => self.parse_comparison(),
        }
    }

    /// `match /pattern/ against EXPR`
    fn parse_regex_match(&mut self) -> Result<RawValue, ParseError> {
        self.expect(Token::Match)?;
        let pattern = self.expect_pattern()?;
        self.expect(Token::Against)?;
        let source = self.parse_comparison()?;
        Ok(Self::keywords(
            Kind::RegexMatch,
            vec![
                ("pattern", Self::literal(Scalar::Str(pattern))),
                ("source", source),
            ],
        ))
    }

    /// `extract [group N of] /pattern/ from EXPR`
    fn parse_regex_extract(&mut self) -> Result<RawValue, ParseError> {
        self.expect(Token::Extract)?;
        let group_index = if self.check(&Token::Group) {
            self.advance()?;
            let index = match self.take()? {
                Token::Int(n) if n >= 0 => n,
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "a non-negative group index".to_string(),
                        found: format!("{:?}", other),
                    });
                }
            };
            self.expect(Token::Of)?;
            Some(index)
        } else {
            None
        };
        let pattern = self.expect_pattern()?;
        self.expect(Token::From)?;
        let source = self.parse_comparison()?;

        let mut entries = vec![
            ("pattern", Self::literal(Scalar::Str(pattern))),
            ("source", source),
        ];
        if let Some(index) = group_index {
            entries.push(("group_index", Self::literal(Scalar::Int(index))));
        }
        Ok(Self::keywords(Kind::RegexExtract, entries))
    }

    /// Regex patterns are `/.../` literals; a quoted string also works.
    fn expect_pattern(&mut self) -> Result<String, ParseError> {
        match self.take()? {
            Token::Regex(pattern) | Token::Str(pattern) => Ok(pattern),
            other => Err(ParseError::UnexpectedToken {
                expected: "a /pattern/ literal".to_string(),
                found: format!("{:?}", other),
            }),
        }
    }

    fn parse_comparison(&mut self) -> Result<RawValue, ParseError> {
        let left = self.parse_timestamp()?;

        let symbol = match &self.current_token {
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::GtEq => ">=",
            Token::LtEq => "<=",
            _ => return Ok(left),
        };
        let kind = self.infix_kind(symbol)?;
        self.advance()?;
        let right = self.parse_timestamp()?;
        Ok(Self::positional(kind, vec![left, right]))
    }

    /// `DATE @ HH:MM[:SS] [a.m.|p.m.]` pins a clock time onto a date
    /// expression.
    fn parse_timestamp(&mut self) -> Result<RawValue, ParseError> {
        let date = self.parse_additive()?;
        if !self.check(&Token::At) {
            return Ok(date);
        }
        self.advance()?;

        let (hour, minute, second) = match self.take()? {
            Token::Time {
                hour,
                minute,
                second,
            } => (hour, minute, second),
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a clock time like 11:59:59".to_string(),
                    found: format!("{:?}", other),
                });
            }
        };
        let hour = match &self.current_token {
            Token::Am => {
                self.advance()?;
                if hour == 12 { 0 } else { hour }
            }
            Token::Pm => {
                self.advance()?;
                if hour < 12 { hour + 12 } else { hour }
            }
            _ => hour,
        };

        Ok(Self::keywords(
            Kind::ResolveTimestamp,
            vec![
                ("date", date),
                ("hour", Self::literal(Scalar::Int(hour as i64))),
                ("minute", Self::literal(Scalar::Int(minute as i64))),
                ("second", Self::literal(Scalar::Int(second as i64))),
            ],
        ))
    }

    /// Left-associative `+`/`-`; a run that is entirely `+` collapses into
    /// one n-ary `add`.
    fn parse_additive(&mut self) -> Result<RawValue, ParseError> {
        self.parse_chain(
            &[(Token::Plus, "+"), (Token::Minus, "-")],
            "+",
            Self::parse_multiplicative,
        )
    }

    /// Left-associative `*`/`/`; a run that is entirely `*` collapses into
    /// one n-ary `multiply`.
    fn parse_multiplicative(&mut self) -> Result<RawValue, ParseError> {
        self.parse_chain(
            &[(Token::Star, "*"), (Token::Slash, "/")],
            "*",
            Self::parse_cast_hi,
        )
    }

    fn parse_chain(
        &mut self,
        operators: &[(Token, &'static str)],
        nary_symbol: &str,
        mut operand: impl FnMut(&mut Self) -> Result<RawValue, ParseError>,
    ) -> Result<RawValue, ParseError> {
        let first = operand(self)?;
        let mut terms = vec![first];
        let mut symbols: Vec<&'static str> = Vec::new();

        loop {
            let Some(&(_, symbol)) = operators.iter().find(|(tok, _)| self.check(tok)) else {
                break;
            };
            self.advance()?;
            symbols.push(symbol);
            terms.push(operand(self)?);
        }

        if symbols.is_empty() {
            return Ok(terms.remove(0));
        }

        // All operators agree on the n-ary symbol: one flat node.
        if symbols.iter().all(|s| *s == nary_symbol) {
            let kind = self.infix_kind(nary_symbol)?;
            return Ok(Self::positional(kind, terms));
        }

        // Mixed run: left-associative pairwise fold.
        let mut terms = terms.into_iter();
        let mut acc = terms.next().unwrap_or(RawValue::Scalar(Scalar::Null));
        for (symbol, term) in symbols.into_iter().zip(terms) {
            let kind = self.infix_kind(symbol)?;
            acc = Self::positional(kind, vec![acc, term]);
        }
        Ok(acc)
    }

    /// High-tier cast: `EXPR::type` binds tighter than any arithmetic.
    fn parse_cast_hi(&mut self) -> Result<RawValue, ParseError> {
        let mut expr = self.parse_unary()?;
        while self.check(&Token::DoubleColon) {
            self.advance()?;
            let kind = self.infix_kind("::")?;
            let type_name = self.expect_type_name()?;
            expr = Self::positional(kind, vec![expr, Self::literal(Scalar::Str(type_name))]);
        }
        Ok(expr)
    }

    fn expect_type_name(&mut self) -> Result<String, ParseError> {
        match self.take()? {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::UnexpectedToken {
                expected: "a type name".to_string(),
                found: format!("{:?}", other),
            }),
        }
    }

    fn parse_unary(&mut self) -> Result<RawValue, ParseError> {
        if self.check(&Token::Minus) {
            self.advance()?;
            let kind = self.prefix_kind("-")?;
            let operand = self.parse_unary()?;
            return Ok(Self::positional(kind, vec![operand]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<RawValue, ParseError> {
        match self.take()? {
            Token::Int(n) => Ok(RawValue::Scalar(Scalar::Int(n))),
            Token::Float(n) => Ok(RawValue::Scalar(Scalar::Float(n))),
            Token::Bool(b) => Ok(RawValue::Scalar(Scalar::Bool(b))),
            Token::Null => Ok(RawValue::Scalar(Scalar::Null)),

            // Quoted strings leave the grammar as explicit literal nodes,
            // so the resolver never routes them back through the grammar.
            Token::Str(s) => Ok(Self::literal(Scalar::Str(s))),

            Token::FString(body) => self.interpolate_from_fstring(&body),

            Token::ColumnRef(name) => Ok(RawValue::short_form(
                Kind::Column.key(),
                RawValue::str(name),
            )),

            Token::Ident(name) => {
                if self.check(&Token::LParen) {
                    let kind = self.function_kind(&name)?;
                    let args = self.parse_call_args()?;
                    Ok(Self::positional(kind, args))
                } else {
                    // Bare name: column vs. literal is the resolver's call,
                    // made against the schema.
                    Ok(RawValue::Name(name))
                }
            }

            Token::LParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            token => Err(ParseError::UnexpectedPrimary {
                found: format!("{:?}", token),
            }),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<RawValue>, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(&Token::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    /// Expand an f-string body into a `string_interpolate` short form:
    /// the pattern with `{}` placeholders first, then one parsed
    /// sub-expression per field, in declaration order. `{{` and `}}`
    /// escape literal braces. A field-free f-string is just a string
    /// literal.
    fn interpolate_from_fstring(&mut self, body: &str) -> Result<RawValue, ParseError> {
        let mut pattern = String::new();
        let mut fields = Vec::new();
        let mut chars = body.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    pattern.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    pattern.push('}');
                }
                '{' => {
                    let mut field_src = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field_src.push(c),
                            None => {
                                return Err(ParseError::MalformedFString {
                                    reason: "unclosed '{' in f-string".to_string(),
                                });
                            }
                        }
                    }
                    if field_src.trim().is_empty() {
                        return Err(ParseError::MalformedFString {
                            reason: "empty interpolation field".to_string(),
                        });
                    }
                    pattern.push_str("{}");
                    fields.push(parse_str(&field_src, self.registry)?);
                }
                '}' => {
                    return Err(ParseError::MalformedFString {
                        reason: "single '}' in f-string (use '}}' for a literal brace)"
                            .to_string(),
                    });
                }
                _ => pattern.push(ch),
            }
        }

        if fields.is_empty() {
            return Ok(Self::literal(Scalar::Str(pattern)));
        }

        let mut args = vec![Self::literal(Scalar::Str(pattern))];
        args.extend(fields);
        Ok(Self::positional(Kind::StringInterpolate, args))
    }
}
