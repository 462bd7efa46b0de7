//! Recursive-descent parser producing the program AST.
//!
//! The parser mirrors the classic chibicc structure: one helper per
//! precedence level, from assignment down to factors, plus a thin statement
//! and declaration layer on top. It performs no name resolution: every bare
//! identifier becomes a neutral `ExprKind::Name` that the checker classifies
//! once the symbol table is available.

use crate::ast::{BinaryOp, Block, Decl, Expr, ExprKind, Function, Program, Stmt, StmtKind, VarDecl};
use crate::error::{CompileError, CompileResult, Location};
use crate::tokenizer::{Token, TokenKind, describe_token, string_value, token_text};
use crate::ty::Type;

/// Parse a whole translation unit from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(tokens, source);
  let mut decls = Vec::new();

  while !stream.is_eof() {
    decls.push(parse_declaration(&mut stream)?);
  }

  Ok(Program { decls })
}

/// `int`, `string` or `void`, optionally followed by `*`.
fn parse_type_spec(stream: &mut TokenStream) -> CompileResult<(Type, bool, Location)> {
  let location = stream.location();
  let base = if stream.equal("int") {
    Type::Int
  } else if stream.equal("string") {
    Type::Str
  } else if stream.equal("void") {
    Type::Void
  } else {
    return Err(stream.unexpected("a type name"));
  };

  if stream.equal("*") {
    Ok((Type::pointer_to(base), true, location))
  } else {
    Ok((base, false, location))
  }
}

fn is_type_start(stream: &TokenStream) -> bool {
  matches!(stream.peek_text(), Some("int" | "string" | "void"))
}

fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Decl> {
  let (ty, is_pointer, location) = parse_type_spec(stream)?;
  let (name, _) = stream.get_ident()?;

  if stream.equal("(") {
    let params = parse_params(stream)?;
    stream.skip(")")?;
    let body = parse_compound(stream)?;
    return Ok(Decl::Function(Function {
      name,
      ret: ty,
      params,
      body,
      location,
      locals: Vec::new(),
    }));
  }

  let var = parse_var_tail(stream, name, ty, is_pointer, location)?;
  Ok(Decl::Var(var))
}

/// Everything after the name of a variable declaration: `;` or `[N];`.
fn parse_var_tail(
  stream: &mut TokenStream,
  name: String,
  ty: Type,
  is_pointer: bool,
  location: Location,
) -> CompileResult<VarDecl> {
  if !is_pointer && stream.equal("[") {
    let (len, len_location) = stream.get_number()?;
    let len = usize::try_from(len)
      .map_err(|_| CompileError::parse(len_location, "an array size", len.to_string()))?;
    stream.skip("]")?;
    stream.skip(";")?;
    return Ok(VarDecl {
      name,
      ty: Type::array_of(ty, len),
      location,
    });
  }

  stream.skip(";")?;
  Ok(VarDecl { name, ty, location })
}

fn parse_local_declaration(stream: &mut TokenStream) -> CompileResult<VarDecl> {
  let (ty, is_pointer, location) = parse_type_spec(stream)?;
  let (name, _) = stream.get_ident()?;
  parse_var_tail(stream, name, ty, is_pointer, location)
}

/// `void` or a comma-separated list of parameters.
fn parse_params(stream: &mut TokenStream) -> CompileResult<Vec<VarDecl>> {
  if stream.equal("void") {
    return Ok(Vec::new());
  }

  let mut params = vec![parse_param(stream)?];
  while stream.equal(",") {
    params.push(parse_param(stream)?);
  }
  Ok(params)
}

/// `T name`, `T *name` or `T name[]`; the array form is passed as a pointer.
fn parse_param(stream: &mut TokenStream) -> CompileResult<VarDecl> {
  let (ty, is_pointer, location) = parse_type_spec(stream)?;
  let (name, _) = stream.get_ident()?;

  if !is_pointer && stream.equal("[") {
    stream.skip("]")?;
    return Ok(VarDecl {
      name,
      ty: Type::pointer_to(ty),
      location,
    });
  }

  Ok(VarDecl { name, ty, location })
}

fn parse_compound(stream: &mut TokenStream) -> CompileResult<Block> {
  let location = stream.location();
  stream.skip("{")?;

  let mut decls = Vec::new();
  while is_type_start(stream) {
    decls.push(parse_local_declaration(stream)?);
  }

  let mut stmts = Vec::new();
  while !stream.equal("}") {
    stmts.push(parse_stmt(stream)?);
  }

  Ok(Block {
    decls,
    stmts,
    location,
  })
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let location = stream.location();

  let kind = match stream.peek_text() {
    Some("{") => StmtKind::Compound(parse_compound(stream)?),
    Some("if") => {
      stream.skip("if")?;
      let cond = parse_condition(stream)?;
      let then_branch = Box::new(parse_stmt(stream)?);
      let else_branch = if stream.equal("else") {
        Some(Box::new(parse_stmt(stream)?))
      } else {
        None
      };
      StmtKind::If {
        cond,
        then_branch,
        else_branch,
      }
    }
    Some("while") => {
      stream.skip("while")?;
      let cond = parse_condition(stream)?;
      let body = Box::new(parse_stmt(stream)?);
      StmtKind::While { cond, body }
    }
    Some("return") => {
      stream.skip("return")?;
      let value = if stream.equal(";") {
        None
      } else {
        let value = parse_expr(stream)?;
        stream.skip(";")?;
        Some(value)
      };
      StmtKind::Return(value)
    }
    Some("write") => {
      stream.skip("write")?;
      stream.skip("(")?;
      let value = parse_expr(stream)?;
      stream.skip(")")?;
      stream.skip(";")?;
      StmtKind::Write(value)
    }
    Some("writeln") => {
      stream.skip("writeln")?;
      stream.skip("(")?;
      stream.skip(")")?;
      stream.skip(";")?;
      StmtKind::Writeln
    }
    _ => {
      let expr = parse_expr(stream)?;
      stream.skip(";")?;
      StmtKind::Expr(expr)
    }
  };

  Ok(Stmt { kind, location })
}

/// `( expr )` as used by `if` and `while`.
fn parse_condition(stream: &mut TokenStream) -> CompileResult<Expr> {
  stream.skip("(")?;
  let cond = parse_expr(stream)?;
  stream.skip(")")?;
  Ok(cond)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_comparison(stream)?;

  let location = stream.location();
  if stream.equal("=") {
    let rhs = parse_assign(stream)?;
    return Ok(Expr::assign(node, rhs, location));
  }

  Ok(node)
}

fn parse_comparison(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_add(stream)?;

  let op = match stream.peek_punct() {
    Some("==") => BinaryOp::Eq,
    Some("!=") => BinaryOp::Ne,
    Some("<") => BinaryOp::Lt,
    Some("<=") => BinaryOp::Le,
    Some(">") => BinaryOp::Gt,
    Some(">=") => BinaryOp::Ge,
    _ => return Ok(node),
  };

  let location = stream.location();
  stream.skip(op.symbol())?;
  let rhs = parse_add(stream)?;
  Ok(Expr::binary(op, node, rhs, location))
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_mul(stream)?;

  loop {
    let op = match stream.peek_punct() {
      Some("+") => BinaryOp::Add,
      Some("-") => BinaryOp::Sub,
      _ => break,
    };

    let location = stream.location();
    stream.skip(op.symbol())?;
    let rhs = parse_mul(stream)?;
    node = Expr::binary(op, node, rhs, location);
  }

  Ok(node)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  let mut node = parse_unary(stream)?;

  loop {
    let op = match stream.peek_punct() {
      Some("*") => BinaryOp::Mul,
      Some("/") => BinaryOp::Div,
      Some("%") => BinaryOp::Mod,
      _ => break,
    };

    let location = stream.location();
    stream.skip(op.symbol())?;
    let rhs = parse_unary(stream)?;
    node = Expr::binary(op, node, rhs, location);
  }

  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  let location = stream.location();

  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(ExprKind::Neg(Box::new(operand)), location));
  }

  if stream.equal("&") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(ExprKind::AddrOf(Box::new(operand)), location));
  }

  if stream.equal("*") {
    let operand = parse_unary(stream)?;
    return Ok(Expr::new(ExprKind::Deref(Box::new(operand)), location));
  }

  parse_factor(stream)
}

fn parse_factor(stream: &mut TokenStream) -> CompileResult<Expr> {
  let location = stream.location();

  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if stream.equal("read") {
    stream.skip("(")?;
    stream.skip(")")?;
    return Ok(Expr::new(ExprKind::Read, location));
  }

  match stream.peek().map(|token| token.kind) {
    Some(TokenKind::Ident) => {
      let (name, location) = stream.get_ident()?;

      if stream.equal("(") {
        let args = parse_args(stream)?;
        return Ok(Expr::new(ExprKind::Call { name, args }, location));
      }

      if stream.equal("[") {
        let index = parse_expr(stream)?;
        stream.skip("]")?;
        return Ok(Expr::new(
          ExprKind::Index {
            base: Box::new(Expr::name(name, location)),
            index: Box::new(index),
          },
          location,
        ));
      }

      Ok(Expr::name(name, location))
    }
    Some(TokenKind::Num) => {
      let (value, location) = stream.get_number()?;
      Ok(Expr::number(value, location))
    }
    Some(TokenKind::Str) => {
      let value = stream.get_string()?;
      Ok(Expr::new(ExprKind::Str(value), location))
    }
    _ => Err(stream.unexpected("an expression")),
  }
}

/// Call arguments after the opening parenthesis, including the closing one.
fn parse_args(stream: &mut TokenStream) -> CompileResult<Vec<Expr>> {
  let mut args = Vec::new();
  if stream.equal(")") {
    return Ok(args);
  }

  args.push(parse_expr(stream)?);
  while stream.equal(",") {
    args.push(parse_expr(stream)?);
  }
  stream.skip(")")?;
  Ok(args)
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Text of the current token when it is a punctuator or keyword.
  fn peek_text(&self) -> Option<&'a str> {
    let source = self.source;
    self
      .peek()
      .filter(|token| matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword))
      .map(|token| token_text(token, source))
  }

  fn peek_punct(&self) -> Option<&'a str> {
    let source = self.source;
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, source))
  }

  fn location(&self) -> Location {
    self
      .peek()
      .or_else(|| self.tokens.last())
      .map(|token| token.location)
      .unwrap_or_default()
  }

  /// Error describing the current token as not being `expected`.
  fn unexpected(&self, expected: &str) -> CompileError {
    CompileError::parse(
      self.location(),
      expected,
      describe_token(self.peek(), self.source),
    )
  }

  /// Consume the current token if it is the given punctuator or keyword.
  fn equal(&mut self, op: &str) -> bool {
    if let Some(text) = self.peek_text()
      && text == op
    {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("\"{s}\"")))
    }
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, Location)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let location = token.location;
      let Some(value) = token.value else {
        return Err(CompileError::scan(
          location,
          "internal error: numeric token missing value",
        ));
      };
      self.pos += 1;
      return Ok((value, location));
    }

    Err(self.unexpected("a number"))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, Location)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let location = token.location;
      self.pos += 1;
      return Ok((ident, location));
    }

    Err(self.unexpected("an identifier"))
  }

  fn get_string(&mut self) -> CompileResult<String> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Str
    {
      let value = string_value(token, self.source).to_string();
      self.pos += 1;
      return Ok(value);
    }

    Err(self.unexpected("a string literal"))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof) | None)
  }
}
