#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub slice: &'a str,
    pub offset: usize,
    pub kind: TokenKind,
}

impl Token<'_> {
    /// Byte offset one past the end of the token.
    pub fn end(&self) -> usize {
        self.offset + self.slice.len()
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Equal,
    Caret,
    Star,
    Slash,
    Plus,
    Minus,
    /// Digits with a decimal point, e.g. `1.50`, `.5`, `3.`.
    Decimal,
    /// Digits only.
    Integer,
    Ident,
    /// Any other character. It only ever shows up as operator text.
    Other,
}

impl TokenKind {
    /// Whether a token of this kind begins an operand.
    pub fn starts_operand(self) -> bool {
        matches!(
            self,
            TokenKind::LeftParen
                | TokenKind::Dot
                | TokenKind::Decimal
                | TokenKind::Integer
                | TokenKind::Ident
        )
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits one calculator line into tokens. Whitespace is skipped; the parser
/// recovers it from token offsets when it needs the text between operands.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
    peeked: Option<Option<Token<'a>>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> Option<&Token<'a>> {
        if self.peeked.is_none() {
            let next = self.next();
            self.peeked = Some(next);
        }
        self.peeked.as_ref().and_then(|t| t.as_ref())
    }

    pub fn next_if(&mut self, kind: TokenKind) -> Option<Token<'a>> {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.next()
        } else {
            None
        }
    }

    /// Consumes the peeked token if it is of `kind` and starts exactly at `offset`.
    pub fn next_if_adjacent(&mut self, kind: TokenKind, offset: usize) -> Option<Token<'a>> {
        if self.peek().is_some_and(|t| t.kind == kind && t.offset == offset) {
            self.next()
        } else {
            None
        }
    }

    /// Advances past `len` bytes of the current character run.
    fn take(&mut self, c_onwards: &'a str, len: usize, first: char) -> &'a str {
        let literal = &c_onwards[..len];
        let extra_byte = len - first.len_utf8();
        self.byte += extra_byte;
        self.rest = &self.rest[extra_byte..];
        literal
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next) = self.peeked.take() {
            return next;
        }

        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let offset = self.byte;
            let slice = &self.rest[..c.len_utf8()];
            let c_onwards = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                Ident,
                Number,
                DotOrDecimal,
            }

            let make_token = |kind: TokenKind| {
                Some(Token {
                    slice,
                    kind,
                    offset,
                })
            };

            let started = match c {
                '(' => return make_token(TokenKind::LeftParen),
                ')' => return make_token(TokenKind::RightParen),
                ',' => return make_token(TokenKind::Comma),
                '=' => return make_token(TokenKind::Equal),
                '^' => return make_token(TokenKind::Caret),
                '*' => return make_token(TokenKind::Star),
                '/' => return make_token(TokenKind::Slash),
                '+' => return make_token(TokenKind::Plus),
                '-' => return make_token(TokenKind::Minus),
                '.' => Started::DotOrDecimal,
                '0'..='9' => Started::Number,
                c if is_ident_start(c) => Started::Ident,
                c if c.is_whitespace() => continue,
                _ => return make_token(TokenKind::Other),
            };

            match started {
                Started::Ident => {
                    let end = c_onwards
                        .find(|c: char| !is_ident_continue(c))
                        .unwrap_or(c_onwards.len());
                    let literal = self.take(c_onwards, end, c);
                    return Some(Token {
                        slice: literal,
                        offset,
                        kind: TokenKind::Ident,
                    });
                }
                Started::Number => {
                    let digits = c_onwards
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(c_onwards.len());
                    let after = &c_onwards[digits..];
                    let mut tail = after.chars();

                    // `3.x` is the integer 3 followed by the reference `.x`.
                    let is_decimal = tail.next() == Some('.')
                        && !tail.next().is_some_and(is_ident_start);
                    if !is_decimal {
                        let literal = self.take(c_onwards, digits, c);
                        return Some(Token {
                            slice: literal,
                            offset,
                            kind: TokenKind::Integer,
                        });
                    }

                    let fraction = after[1..]
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(after.len() - 1);
                    let literal = self.take(c_onwards, digits + 1 + fraction, c);
                    return Some(Token {
                        slice: literal,
                        offset,
                        kind: TokenKind::Decimal,
                    });
                }
                Started::DotOrDecimal => match self.rest.chars().next() {
                    Some(d) if d.is_ascii_digit() => {
                        let end = self
                            .rest
                            .find(|c: char| !c.is_ascii_digit())
                            .unwrap_or(self.rest.len());
                        let literal = self.take(c_onwards, end + 1, c);
                        return Some(Token {
                            slice: literal,
                            offset,
                            kind: TokenKind::Decimal,
                        });
                    }
                    _ => return make_token(TokenKind::Dot),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<(TokenKind, &str)> {
        Lexer::new(input).map(|t| (t.kind, t.slice)).collect()
    }

    #[test]
    fn test_parentheses() {
        let input = "( )";
        let mut lexer = Lexer::new(input);

        let expected_tokens = vec![
            Token {
                slice: "(",
                offset: 0,
                kind: TokenKind::LeftParen,
            },
            Token {
                slice: ")",
                offset: 2,
                kind: TokenKind::RightParen,
            },
        ];

        for expected_token in expected_tokens.into_iter() {
            assert_eq!(lexer.next().unwrap(), expected_token);
        }
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.14 .5 7. 0.050"),
            vec![
                (TokenKind::Integer, "42"),
                (TokenKind::Decimal, "3.14"),
                (TokenKind::Decimal, ".5"),
                (TokenKind::Decimal, "7."),
                (TokenKind::Decimal, "0.050"),
            ]
        );
    }

    #[test]
    fn test_minus_is_never_part_of_a_number() {
        assert_eq!(
            kinds("2-3"),
            vec![
                (TokenKind::Integer, "2"),
                (TokenKind::Minus, "-"),
                (TokenKind::Integer, "3"),
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds("x2 ab_c 2x"),
            vec![
                (TokenKind::Ident, "x2"),
                (TokenKind::Ident, "ab_c"),
                (TokenKind::Integer, "2"),
                (TokenKind::Ident, "x"),
            ]
        );
    }

    #[test]
    fn test_namespace_reference() {
        let input = "m.pi+3.x";
        let mut lexer = Lexer::new(input);

        let expected_tokens = vec![
            Token {
                slice: "m",
                offset: 0,
                kind: TokenKind::Ident,
            },
            Token {
                slice: ".",
                offset: 1,
                kind: TokenKind::Dot,
            },
            Token {
                slice: "pi",
                offset: 2,
                kind: TokenKind::Ident,
            },
            Token {
                slice: "+",
                offset: 4,
                kind: TokenKind::Plus,
            },
            Token {
                slice: "3",
                offset: 5,
                kind: TokenKind::Integer,
            },
            Token {
                slice: ".",
                offset: 6,
                kind: TokenKind::Dot,
            },
            Token {
                slice: "x",
                offset: 7,
                kind: TokenKind::Ident,
            },
        ];

        for expected_token in expected_tokens.into_iter() {
            assert_eq!(lexer.next().unwrap(), expected_token);
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("^ * / + - = , $"),
            vec![
                (TokenKind::Caret, "^"),
                (TokenKind::Star, "*"),
                (TokenKind::Slash, "/"),
                (TokenKind::Plus, "+"),
                (TokenKind::Minus, "-"),
                (TokenKind::Equal, "="),
                (TokenKind::Comma, ","),
                (TokenKind::Other, "$"),
            ]
        );
    }

    #[test]
    fn test_peek_and_adjacency() {
        let mut lexer = Lexer::new("f (x)");
        let f = lexer.next().unwrap();
        assert_eq!(lexer.peek().map(|t| t.kind), Some(TokenKind::LeftParen));
        assert_eq!(lexer.next_if_adjacent(TokenKind::LeftParen, f.end()), None);
        assert_eq!(lexer.next().map(|t| t.offset), Some(2));
    }
}
