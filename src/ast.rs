//! Abstract syntax tree shared by the parser, checker and code generator.
//!
//! The parser produces expressions with `ty == None`; the checker fills in
//! every `ty` and `lvalue` flag in place and replaces each neutral
//! [`ExprKind::Name`] with either a resolved [`ExprKind::Var`] or an
//! array-to-pointer [`ExprKind::Decay`].

use crate::error::Location;
use crate::ty::Type;

/// A whole translation unit: top-level declarations in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
  pub decls: Vec<Decl>,
}

impl Program {
  pub fn functions(&self) -> impl Iterator<Item = &Function> {
    self.decls.iter().filter_map(|decl| match decl {
      Decl::Function(func) => Some(func),
      Decl::Var(_) => None,
    })
  }

  pub fn globals(&self) -> impl Iterator<Item = &VarDecl> {
    self.decls.iter().filter_map(|decl| match decl {
      Decl::Var(var) => Some(var),
      Decl::Function(_) => None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
  Var(VarDecl),
  Function(Function),
}

/// Scalar, pointer or array variable; also used for parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
  pub name: String,
  pub ty: Type,
  pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  pub name: String,
  pub ret: Type,
  pub params: Vec<VarDecl>,
  pub body: Block,
  pub location: Location,
  /// Every local declared anywhere in the body, in declaration order.
  /// Filled in by the checker.
  pub locals: Vec<VarDecl>,
}

impl Function {
  pub fn signature(&self) -> Type {
    Type::function(
      self.params.iter().map(|param| param.ty.clone()).collect(),
      self.ret.clone(),
    )
  }
}

/// `{ declarations; statements }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  pub decls: Vec<VarDecl>,
  pub stmts: Vec<Stmt>,
  pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
  pub kind: StmtKind,
  pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
  Compound(Block),
  If {
    cond: Expr,
    then_branch: Box<Stmt>,
    else_branch: Option<Box<Stmt>>,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
  },
  Return(Option<Expr>),
  Expr(Expr),
  Write(Expr),
  Writeln,
}

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl BinaryOp {
  pub fn is_comparison(self) -> bool {
    matches!(
      self,
      Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
    )
  }

  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Mod => "%",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
    }
  }
}

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
  Global,
  /// Index into the enclosing function's parameter list.
  Param(usize),
  /// Index into the enclosing function's `locals`.
  Local(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
  pub name: String,
  pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
  pub kind: ExprKind,
  pub location: Location,
  /// Resolved type, set by the checker.
  pub ty: Option<Type>,
  /// Whether the expression denotes an addressable location.
  pub lvalue: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
  Num(i64),
  Str(String),
  Read,
  /// A bare identifier the parser could not classify.
  Name(String),
  /// A name resolved to a variable.
  Var(VarRef),
  /// An array name converted to a pointer to its first element.
  Decay(VarRef),
  Assign {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Neg(Box<Expr>),
  AddrOf(Box<Expr>),
  Deref(Box<Expr>),
  Index {
    base: Box<Expr>,
    index: Box<Expr>,
  },
  Call {
    name: String,
    args: Vec<Expr>,
  },
}

impl Expr {
  pub fn new(kind: ExprKind, location: Location) -> Self {
    Self {
      kind,
      location,
      ty: None,
      lvalue: false,
    }
  }

  pub fn number(value: i64, location: Location) -> Self {
    Self::new(ExprKind::Num(value), location)
  }

  pub fn name(name: impl Into<String>, location: Location) -> Self {
    Self::new(ExprKind::Name(name.into()), location)
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, location: Location) -> Self {
    Self::new(
      ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      location,
    )
  }

  pub fn assign(lhs: Expr, rhs: Expr, location: Location) -> Self {
    Self::new(
      ExprKind::Assign {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      location,
    )
  }

  /// Type assigned by the checker.
  ///
  /// Panics if called on an expression that has not been checked.
  pub fn checked_ty(&self) -> &Type {
    match &self.ty {
      Some(ty) => ty,
      None => unreachable!("expression at {} was not type checked", self.location),
    }
  }
}
