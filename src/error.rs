//! Shared error types used across the compilation pipeline.
//!
//! Every stage fails fast: the first scan, parse or semantic error aborts the
//! whole compilation. Diagnostics are rendered in a style reminiscent of
//! chibicc, quoting the offending source line and pointing at the column with
//! a caret.

use std::fmt;
use std::path::PathBuf;

use snafu::Snafu;

use crate::ty::Type;

pub type CompileResult<T> = Result<T, CompileError>;

/// 1-based position of a token in the source file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub line: usize,
  pub column: usize,
}

impl Location {
  pub fn new(line: usize, column: usize) -> Self {
    Self { line, column }
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{location}: {message}"))]
  Scan { location: Location, message: String },

  #[snafu(display("{location}: expected {expected}, but got \"{found}\""))]
  Parse {
    location: Location,
    expected: String,
    found: String,
  },

  #[snafu(display("{location}: {source}"))]
  Semantic {
    location: Location,
    source: SemanticError,
  },

  #[snafu(display("could not access {}: {source}", path.display()))]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("{program}: {message}"))]
  Toolchain { program: String, message: String },

  #[snafu(display("executable {} would overwrite its own assembly file", path.display()))]
  OutputClash { path: PathBuf },
}

/// Static semantic violations reported by the type checker.
#[derive(Debug, Snafu)]
pub enum SemanticError {
  #[snafu(display("name \"{name}\" is undefined"))]
  Undeclared { name: String },

  #[snafu(display("\"{name}\" is already declared in this scope"))]
  Redeclared { name: String },

  #[snafu(display("{construct}: expected {expected}, but got {found}"))]
  TypeMismatch {
    construct: String,
    expected: String,
    found: Type,
  },

  #[snafu(display(
    "wrong number of arguments for function \"{name}\" ({expected} expected, {found} given)"
  ))]
  ArgumentCount {
    name: String,
    expected: usize,
    found: usize,
  },

  #[snafu(display(
    "argument {position} of \"{name}\" has type {found}, but the parameter is declared {expected}"
  ))]
  ArgumentType {
    name: String,
    position: usize,
    expected: Type,
    found: Type,
  },

  #[snafu(display("\"{name}\" is not a function"))]
  NotAFunction { name: String },

  #[snafu(display("function \"{name}\" cannot be used as a value"))]
  FunctionAsValue { name: String },

  #[snafu(display("program has no \"main\" function"))]
  MissingMain,

  #[snafu(display("\"main\" must be declared as \"void main(void)\""))]
  MalformedMain,

  #[snafu(display("{construct} requires an assignable location"))]
  NotLvalue { construct: String },

  #[snafu(display("void function \"{name}\" used as a value"))]
  VoidValue { name: String },

  #[snafu(display("\"{name}\" cannot be declared void"))]
  VoidVariable { name: String },

  #[snafu(display("array \"{name}\" must have at least one element"))]
  EmptyArray { name: String },

  #[snafu(display("array \"{name}\" is too large"))]
  ArrayTooLarge { name: String },

  #[snafu(display("locals of function \"{function}\" exceed the stack frame limit"))]
  FrameTooLarge { function: String },

  #[snafu(display("returned value has type {found}, but \"{function}\" returns {expected}"))]
  ReturnMismatch {
    function: String,
    expected: Type,
    found: Type,
  },

  #[snafu(display("missing return value in function \"{function}\" returning {expected}"))]
  MissingReturnValue { function: String, expected: Type },

  #[snafu(display("cannot return a value from void function \"{function}\""))]
  UnexpectedReturnValue { function: String },

  #[snafu(display("cannot write a value of type {found}"))]
  Unwritable { found: Type },
}

impl CompileError {
  pub fn scan(location: Location, message: impl Into<String>) -> Self {
    Self::Scan {
      location,
      message: message.into(),
    }
  }

  pub fn parse(location: Location, expected: impl Into<String>, found: impl Into<String>) -> Self {
    Self::Parse {
      location,
      expected: expected.into(),
      found: found.into(),
    }
  }

  pub fn semantic(location: Location, source: SemanticError) -> Self {
    Self::Semantic { location, source }
  }

  pub fn location(&self) -> Option<Location> {
    match self {
      Self::Scan { location, .. }
      | Self::Parse { location, .. }
      | Self::Semantic { location, .. } => Some(*location),
      Self::Io { .. } | Self::Toolchain { .. } | Self::OutputClash { .. } => None,
    }
  }

  /// Render the error against the source that produced it, quoting the
  /// offending line and marking the column with a caret.
  pub fn render(&self, file: &str, source: &str) -> String {
    let Some(location) = self.location() else {
      return self.to_string();
    };
    let mut rendered = format!("{file}:{self}");
    if let Some(line) = source.lines().nth(location.line.saturating_sub(1)) {
      let offset = line
        .chars()
        .take(location.column.saturating_sub(1))
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect::<String>();
      rendered.push_str(&format!("\n{line}\n{offset}^"));
    }
    rendered
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn render_points_at_the_column() {
    let source = "int x;\nint y\n";
    let err = CompileError::parse(Location::new(2, 6), "\";\"", "EOF");
    assert_eq!(
      err.render("prog.bpl", source),
      "prog.bpl:2:6: expected \";\", but got \"EOF\"\nint y\n     ^"
    );
  }

  #[test]
  fn render_keeps_tabs_aligned() {
    let source = "\tx = 1;";
    let err = CompileError::semantic(
      Location::new(1, 2),
      SemanticError::Undeclared { name: "x".into() },
    );
    assert_eq!(
      err.render("t.bpl", source),
      "t.bpl:1:2: name \"x\" is undefined\n\tx = 1;\n\t^"
    );
  }

  #[test]
  fn driver_errors_render_without_location() {
    let err = CompileError::Toolchain {
      program: "cc".into(),
      message: "exited with status 1".into(),
    };
    assert_eq!(err.render("t.bpl", ""), "cc: exited with status 1");
  }
}
