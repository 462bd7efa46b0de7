//! Lexical analysis: turns the raw input string into a stream of tokens.
//!
//! `Scanner` is pull-based: each call to `next_token` yields the next token or
//! a scan error, and keeps yielding `Eof` once the input is exhausted.
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity.

use crate::error::{CompileError, CompileResult, Location};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Keyword,
  Punctuator,
  Num,
  Str,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
  pub location: Location,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, location: Location) -> Self {
    Self {
      kind,
      value: None,
      loc,
      len,
      location,
    }
  }

  fn with_value(mut self, value: i64) -> Self {
    self.value = Some(value);
    self
  }
}

pub const KEYWORDS: [&str; 10] = [
  "int", "void", "string", "if", "else", "while", "return", "write", "writeln", "read",
];

const PUNCTUATORS: [&str; 21] = [
  "<=", "==", "!=", ">=", "=", ";", ",", "[", "]", "{", "}", "(", ")", "<", ">", "+", "-", "*",
  "/", "%", "&",
];

pub struct Scanner<'a> {
  input: &'a str,
  pos: usize,
  line: usize,
  line_start: usize,
}

impl<'a> Scanner<'a> {
  pub fn new(input: &'a str) -> Self {
    Self {
      input,
      pos: 0,
      line: 1,
      line_start: 0,
    }
  }

  fn location_of(&self, pos: usize) -> Location {
    let column = self.input[self.line_start..pos].chars().count() + 1;
    Location::new(self.line, column)
  }

  fn bump_line(&mut self, newline_at: usize) {
    self.line += 1;
    self.line_start = newline_at + 1;
  }

  /// Skip whitespace and `/* ... */` comments.
  fn skip_trivia(&mut self) -> CompileResult<()> {
    let bytes = self.input.as_bytes();
    while self.pos < bytes.len() {
      let c = bytes[self.pos];
      if c == b'\n' {
        self.bump_line(self.pos);
        self.pos += 1;
      } else if c.is_ascii_whitespace() {
        self.pos += 1;
      } else if bytes[self.pos..].starts_with(b"/*") {
        let start = self.location_of(self.pos);
        self.pos += 2;
        loop {
          if self.pos >= bytes.len() {
            return Err(CompileError::scan(start, "unterminated comment"));
          }
          if bytes[self.pos..].starts_with(b"*/") {
            self.pos += 2;
            break;
          }
          if bytes[self.pos] == b'\n' {
            self.bump_line(self.pos);
          }
          self.pos += 1;
        }
      } else {
        break;
      }
    }
    Ok(())
  }

  /// Fetch the next token from the input.
  pub fn next_token(&mut self) -> CompileResult<Token> {
    self.skip_trivia()?;

    let bytes = self.input.as_bytes();
    let start = self.pos;
    let location = self.location_of(start);

    if start >= bytes.len() {
      return Ok(Token::new(TokenKind::Eof, self.input.len(), 0, location));
    }

    let c = bytes[start];

    if c.is_ascii_alphabetic() {
      self.pos += 1;
      while self.pos < bytes.len() && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_') {
        self.pos += 1;
      }
      let text = &self.input[start..self.pos];
      let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      return Ok(Token::new(kind, start, self.pos - start, location));
    }

    if c.is_ascii_digit() {
      self.pos += 1;
      while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
        self.pos += 1;
      }
      let text = &self.input[start..self.pos];
      let value = text
        .parse::<i64>()
        .map_err(|err| CompileError::scan(location, format!("invalid number {text}: {err}")))?;
      return Ok(Token::new(TokenKind::Num, start, self.pos - start, location).with_value(value));
    }

    if c == b'"' {
      self.pos += 1;
      loop {
        match bytes.get(self.pos) {
          None | Some(b'\n') => {
            return Err(CompileError::scan(location, "unterminated string literal"));
          }
          Some(b'"') => {
            self.pos += 1;
            break;
          }
          Some(_) => self.pos += 1,
        }
      }
      return Ok(Token::new(TokenKind::Str, start, self.pos - start, location));
    }

    if let Some(op) = PUNCTUATORS
      .into_iter()
      .find(|op| self.input[start..].starts_with(op))
    {
      self.pos += op.len();
      return Ok(Token::new(TokenKind::Punctuator, start, op.len(), location));
    }

    let invalid_char = self.input[start..].chars().next().unwrap_or('\0');
    Err(CompileError::scan(
      location,
      format!("invalid token: '{invalid_char}'"),
    ))
  }
}

/// Lex the whole input into a flat vector of tokens terminated by an `Eof`
/// marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut scanner = Scanner::new(input);
  let mut tokens = Vec::new();
  loop {
    let token = scanner.next_token()?;
    let done = token.kind == TokenKind::Eof;
    tokens.push(token);
    if done {
      return Ok(tokens);
    }
  }
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Contents of a string literal token, without the surrounding quotes.
pub fn string_value<'a>(token: &Token, source: &'a str) -> &'a str {
  let text = token_text(token, source);
  &text[1..text.len() - 1]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
