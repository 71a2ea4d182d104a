use std::{iter::Peekable, str::Chars};

use compact_str::CompactString;

#[derive(Clone, PartialEq, Eq, Debug)]
/// Represents a token in the source code.
pub struct Token {
    /// The type of the token.
    pub token_type: TokenType,
    /// The line the token starts on. Lines start at 1.
    pub line: u32,
    /// The text of identifiers and integer literals. `None` for every other token type.
    pub text: Option<CompactString>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
/// Represents the type of a token.
pub enum TokenType {
    /// The `exit` keyword.
    Exit,
    /// The `let` keyword.
    Let,
    /// The `if` keyword.
    If,
    /// The `elif` keyword.
    Elif,
    /// The `else` keyword.
    Else,
    /// An identifier.
    Identifier,
    /// A sequence of decimal digits.
    IntLiteral,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenCurly,
    /// `}`
    CloseCurly,
    /// `;`
    Semicolon,
    /// `=`
    Eq,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenType::Exit => "`exit`",
            TokenType::Let => "`let`",
            TokenType::If => "`if`",
            TokenType::Elif => "`elif`",
            TokenType::Else => "`else`",
            TokenType::Identifier => "identifier",
            TokenType::IntLiteral => "integer literal",
            TokenType::Plus => "`+`",
            TokenType::Minus => "`-`",
            TokenType::Star => "`*`",
            TokenType::Slash => "`/`",
            TokenType::OpenParen => "`(`",
            TokenType::CloseParen => "`)`",
            TokenType::OpenCurly => "`{`",
            TokenType::CloseCurly => "`}`",
            TokenType::Semicolon => "`;`",
            TokenType::Eq => "`=`",
        };
        f.write_str(s)
    }
}

impl Token {
    /// Creates a token that carries no text.
    pub fn new(token_type: TokenType, line: u32) -> Token {
        Token {
            token_type,
            line,
            text: None,
        }
    }

    /// Creates a token that carries `text`.
    pub fn with_text(token_type: TokenType, line: u32, text: impl Into<CompactString>) -> Token {
        Token {
            token_type,
            line,
            text: Some(text.into()),
        }
    }

    /// Returns the text of the token or an empty string if the token carries no text.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// Represents an error that can occur while tokenizing.
pub enum LexError {
    /// A character that does not start any token.
    InvalidCharacter { ch: char, line: u32 },
}

impl LexError {
    /// The line the error occurred on.
    pub fn line(&self) -> u32 {
        match self {
            LexError::InvalidCharacter { line, .. } => *line,
        }
    }
}

impl std::error::Error for LexError {}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::InvalidCharacter { ch, line } => {
                write!(f, "invalid character {ch:?} on line {line}")
            }
        }
    }
}

/// Tokenizes a string of source code.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(source).collect()
}

/// Produces tokens from source code one at a time.
pub struct Tokenizer<'a> {
    source_iter: Peekable<Chars<'a>>,
    line: u32,
}

impl<'a> Tokenizer<'a> {
    /// Creates a new tokenizer over `source`.
    pub fn new(source: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            source_iter: source.chars().peekable(),
            line: 1,
        }
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        loop {
            let ch = *self.source_iter.peek()?;
            let token_type = match ch {
                '\n' => {
                    self.source_iter.next();
                    self.line += 1;
                    continue;
                }
                ch if ch.is_whitespace() => {
                    self.source_iter.next();
                    continue;
                }
                ch if ch.is_ascii_alphabetic() => return Some(Ok(self.parse_word())),
                ch if ch.is_ascii_digit() => return Some(Ok(self.parse_int())),
                '/' => {
                    self.source_iter.next();
                    match self.source_iter.peek() {
                        Some('/') => {
                            self.skip_line_comment();
                            continue;
                        }
                        Some('*') => {
                            self.source_iter.next();
                            self.skip_block_comment();
                            continue;
                        }
                        _ => return Some(Ok(Token::new(TokenType::Slash, self.line))),
                    }
                }
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Star,
                '(' => TokenType::OpenParen,
                ')' => TokenType::CloseParen,
                '{' => TokenType::OpenCurly,
                '}' => TokenType::CloseCurly,
                ';' => TokenType::Semicolon,
                '=' => TokenType::Eq,
                ch => {
                    self.source_iter.next();
                    return Some(Err(LexError::InvalidCharacter {
                        ch,
                        line: self.line,
                    }));
                }
            };
            self.source_iter.next();
            return Some(Ok(Token::new(token_type, self.line)));
        }
    }

    /// Parses a keyword or identifier.
    fn parse_word(&mut self) -> Token {
        let mut word = CompactString::default();
        while let Some(ch) = self.source_iter.next_if(|ch| ch.is_ascii_alphanumeric()) {
            word.push(ch);
        }
        let token_type = match word.as_str() {
            "exit" => TokenType::Exit,
            "let" => TokenType::Let,
            "if" => TokenType::If,
            "elif" => TokenType::Elif,
            "else" => TokenType::Else,
            _ => return Token::with_text(TokenType::Identifier, self.line, word),
        };
        Token::new(token_type, self.line)
    }

    fn parse_int(&mut self) -> Token {
        let mut digits = CompactString::default();
        while let Some(ch) = self.source_iter.next_if(|ch| ch.is_ascii_digit()) {
            digits.push(ch);
        }
        Token::with_text(TokenType::IntLiteral, self.line, digits)
    }

    fn skip_line_comment(&mut self) {
        while self.source_iter.next_if(|ch| *ch != '\n').is_some() {}
    }

    /// Skips until the closing `*/`. An unterminated comment runs to the end of the source.
    fn skip_block_comment(&mut self) {
        while let Some(ch) = self.source_iter.next() {
            match ch {
                '\n' => self.line += 1,
                '*' if self.source_iter.next_if_eq(&'/').is_some() => return,
                _ => {}
            }
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
