//! Static semantic analysis: name resolution and type checking.
//!
//! Scoping has exactly two levels. One global scope holds every top-level
//! variable and function; each function gets one flat local scope holding its
//! parameters and every local declared in any block of its body. Locals may
//! shadow globals but not each other.
//!
//! The checker annotates the AST in place and stops at the first violation.

use std::collections::HashMap;

use log::{debug, trace};

use crate::ast::{
  Block, Decl, Expr, ExprKind, Function, Program, Slot, Stmt, StmtKind, VarDecl, VarRef,
};
use crate::error::{CompileError, CompileResult, Location, SemanticError};
use crate::ty::{MAX_OBJECT_SIZE, Type};

/// Resolve every name and assign a type to every expression in `program`.
pub fn check(program: &mut Program) -> CompileResult<()> {
  TypeChecker::new().check_program(program)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
  Global,
  Parameter(usize),
  Local(usize),
}

impl ScopeKind {
  fn slot(self) -> Slot {
    match self {
      Self::Global => Slot::Global,
      Self::Parameter(idx) => Slot::Param(idx),
      Self::Local(idx) => Slot::Local(idx),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Symbol {
  pub name: String,
  pub ty: Type,
  pub kind: ScopeKind,
  pub location: Location,
}

/// Name to symbol mapping with unique keys.
#[derive(Debug, Default)]
pub struct Scope {
  symbols: HashMap<String, Symbol>,
}

impl Scope {
  pub fn declare(&mut self, symbol: Symbol) -> CompileResult<()> {
    if self.symbols.contains_key(&symbol.name) {
      return Err(CompileError::semantic(
        symbol.location,
        SemanticError::Redeclared { name: symbol.name },
      ));
    }
    self.symbols.insert(symbol.name.clone(), symbol);
    Ok(())
  }

  pub fn get(&self, name: &str) -> Option<&Symbol> {
    self.symbols.get(name)
  }
}

/// Per-function state, alive for one function body.
struct FunctionScope {
  name: String,
  ret: Type,
  scope: Scope,
  locals: Vec<VarDecl>,
}

pub struct TypeChecker {
  globals: Scope,
  current: Option<FunctionScope>,
}

impl Default for TypeChecker {
  fn default() -> Self {
    Self::new()
  }
}

fn error(location: Location, source: SemanticError) -> CompileError {
  CompileError::semantic(location, source)
}

/// Reject declarations no variable may have.
fn validate_var(var: &VarDecl) -> CompileResult<()> {
  match &var.ty {
    Type::Void => Err(error(
      var.location,
      SemanticError::VoidVariable {
        name: var.name.clone(),
      },
    )),
    Type::Array(_, 0) => Err(error(
      var.location,
      SemanticError::EmptyArray {
        name: var.name.clone(),
      },
    )),
    ty if !ty.checked_size().is_some_and(|size| size <= MAX_OBJECT_SIZE) => Err(error(
      var.location,
      SemanticError::ArrayTooLarge {
        name: var.name.clone(),
      },
    )),
    _ => Ok(()),
  }
}

impl TypeChecker {
  pub fn new() -> Self {
    Self {
      globals: Scope::default(),
      current: None,
    }
  }

  pub fn check_program(&mut self, program: &mut Program) -> CompileResult<()> {
    for decl in &program.decls {
      self.declare_global(decl)?;
    }

    for decl in &mut program.decls {
      if let Decl::Function(func) = decl {
        self.check_function(func)?;
      }
    }

    self.check_main()
  }

  fn declare_global(&mut self, decl: &Decl) -> CompileResult<()> {
    let symbol = match decl {
      Decl::Var(var) => {
        validate_var(var)?;
        Symbol {
          name: var.name.clone(),
          ty: var.ty.clone(),
          kind: ScopeKind::Global,
          location: var.location,
        }
      }
      Decl::Function(func) => Symbol {
        name: func.name.clone(),
        ty: func.signature(),
        kind: ScopeKind::Global,
        location: func.location,
      },
    };
    self.globals.declare(symbol)
  }

  fn check_main(&self) -> CompileResult<()> {
    let Some(main) = self.globals.get("main") else {
      return Err(error(Location::new(1, 1), SemanticError::MissingMain));
    };
    match &main.ty {
      Type::Function { params, ret } if params.is_empty() && ret.is_void() => Ok(()),
      _ => Err(error(main.location, SemanticError::MalformedMain)),
    }
  }

  fn check_function(&mut self, func: &mut Function) -> CompileResult<()> {
    let mut scope = Scope::default();
    for (idx, param) in func.params.iter().enumerate() {
      validate_var(param)?;
      scope.declare(Symbol {
        name: param.name.clone(),
        ty: param.ty.clone(),
        kind: ScopeKind::Parameter(idx),
        location: param.location,
      })?;
    }

    self.current = Some(FunctionScope {
      name: func.name.clone(),
      ret: func.ret.clone(),
      scope,
      locals: Vec::new(),
    });

    let result = self.check_block(&mut func.body);
    let finished = self.current.take();
    result?;

    if let Some(finished) = finished {
      func.locals = finished.locals;
    }

    let frame_size = func
      .locals
      .iter()
      .try_fold(0i64, |total, local| total.checked_add(local.ty.size()));
    if !frame_size.is_some_and(|size| size <= MAX_OBJECT_SIZE) {
      return Err(error(
        func.location,
        SemanticError::FrameTooLarge {
          function: func.name.clone(),
        },
      ));
    }
    debug!(
      "checked function {}: {} parameter(s), {} local(s)",
      func.name,
      func.params.len(),
      func.locals.len()
    );
    Ok(())
  }

  fn function_scope(&mut self) -> &mut FunctionScope {
    match self.current.as_mut() {
      Some(current) => current,
      None => unreachable!("statement checked outside of a function"),
    }
  }

  fn check_block(&mut self, block: &mut Block) -> CompileResult<()> {
    for var in &block.decls {
      validate_var(var)?;
      let current = self.function_scope();
      current.scope.declare(Symbol {
        name: var.name.clone(),
        ty: var.ty.clone(),
        kind: ScopeKind::Local(current.locals.len()),
        location: var.location,
      })?;
      current.locals.push(var.clone());
    }

    for stmt in &mut block.stmts {
      self.check_stmt(stmt)?;
    }
    Ok(())
  }

  fn check_stmt(&mut self, stmt: &mut Stmt) -> CompileResult<()> {
    let location = stmt.location;
    match &mut stmt.kind {
      StmtKind::Compound(block) => self.check_block(block),
      StmtKind::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.check_condition(cond, "if condition")?;
        self.check_stmt(then_branch)?;
        if let Some(else_branch) = else_branch {
          self.check_stmt(else_branch)?;
        }
        Ok(())
      }
      StmtKind::While { cond, body } => {
        self.check_condition(cond, "while condition")?;
        self.check_stmt(body)
      }
      StmtKind::Return(value) => self.check_return(value.as_mut(), location),
      StmtKind::Expr(expr) => self.check_expr(expr).map(|_| ()),
      StmtKind::Write(expr) => {
        let ty = self.check_value(expr)?;
        if matches!(ty, Type::Int | Type::Str) {
          Ok(())
        } else {
          Err(error(expr.location, SemanticError::Unwritable { found: ty }))
        }
      }
      StmtKind::Writeln => Ok(()),
    }
  }

  fn check_condition(&mut self, cond: &mut Expr, construct: &str) -> CompileResult<()> {
    let ty = self.check_value(cond)?;
    if ty.is_integer() {
      return Ok(());
    }
    Err(error(
      cond.location,
      SemanticError::TypeMismatch {
        construct: construct.to_string(),
        expected: Type::Int.to_string(),
        found: ty,
      },
    ))
  }

  fn check_return(&mut self, value: Option<&mut Expr>, location: Location) -> CompileResult<()> {
    let (function, expected) = {
      let current = self.function_scope();
      (current.name.clone(), current.ret.clone())
    };

    match value {
      Some(value) if expected.is_void() => Err(error(
        value.location,
        SemanticError::UnexpectedReturnValue { function },
      )),
      Some(value) => {
        let found = self.check_value(value)?;
        if found == expected {
          Ok(())
        } else {
          Err(error(
            value.location,
            SemanticError::ReturnMismatch {
              function,
              expected,
              found,
            },
          ))
        }
      }
      None if expected.is_void() => Ok(()),
      None => Err(error(
        location,
        SemanticError::MissingReturnValue { function, expected },
      )),
    }
  }

  /// Check an expression whose value is used, rejecting calls to void
  /// functions.
  fn check_value(&mut self, expr: &mut Expr) -> CompileResult<Type> {
    let ty = self.check_expr(expr)?;
    if ty.is_void() {
      let name = match &expr.kind {
        ExprKind::Call { name, .. } => name.clone(),
        _ => String::from("<expression>"),
      };
      return Err(error(expr.location, SemanticError::VoidValue { name }));
    }
    Ok(ty)
  }

  /// Look a bare name up in the local scope, then the global one.
  fn resolve_name(&self, name: &str, location: Location) -> CompileResult<(VarRef, Type)> {
    let symbol = self
      .current
      .as_ref()
      .and_then(|current| current.scope.get(name))
      .or_else(|| self.globals.get(name))
      .ok_or_else(|| {
        error(
          location,
          SemanticError::Undeclared {
            name: name.to_string(),
          },
        )
      })?;

    if matches!(symbol.ty, Type::Function { .. }) {
      return Err(error(
        location,
        SemanticError::FunctionAsValue {
          name: name.to_string(),
        },
      ));
    }

    trace!(
      "{location}: \"{name}\" linked to {:?} declaration at {}",
      symbol.kind, symbol.location
    );
    Ok((
      VarRef {
        name: name.to_string(),
        slot: symbol.kind.slot(),
      },
      symbol.ty.clone(),
    ))
  }

  fn check_expr(&mut self, expr: &mut Expr) -> CompileResult<Type> {
    let location = expr.location;

    if let ExprKind::Name(name) = &expr.kind {
      let (var, ty) = self.resolve_name(name, location)?;
      expr.kind = ExprKind::Var(var);
      expr.lvalue = !ty.is_array();
      expr.ty = Some(ty.clone());
      trace!("{location}: variable assigned type {ty}");
      return Ok(ty);
    }

    if matches!(expr.kind, ExprKind::Var(_) | ExprKind::Decay(_)) {
      return Ok(expr.checked_ty().clone());
    }

    let (ty, lvalue) = match &mut expr.kind {
      ExprKind::Num(_) | ExprKind::Read => (Type::Int, false),
      ExprKind::Str(_) => (Type::Str, false),
      ExprKind::Name(_) | ExprKind::Var(_) | ExprKind::Decay(_) => {
        unreachable!("names are resolved above")
      }
      ExprKind::Assign { lhs, rhs } => {
        let lhs_ty = self.check_value(lhs)?;
        if !lhs.lvalue {
          return Err(error(
            lhs.location,
            SemanticError::NotLvalue {
              construct: "assignment".to_string(),
            },
          ));
        }
        let rhs_ty = self.check_value(rhs)?;
        if lhs_ty != rhs_ty {
          return Err(error(
            rhs.location,
            SemanticError::TypeMismatch {
              construct: "assignment".to_string(),
              expected: lhs_ty.to_string(),
              found: rhs_ty,
            },
          ));
        }
        (lhs_ty, false)
      }
      ExprKind::Binary { op, lhs, rhs } if op.is_comparison() => {
        let construct = format!("operand of \"{}\"", op.symbol());
        let lhs_ty = self.check_value(lhs)?;
        if !lhs_ty.is_comparable() {
          return Err(error(
            lhs.location,
            SemanticError::TypeMismatch {
              construct,
              expected: "int, string or pointer".to_string(),
              found: lhs_ty,
            },
          ));
        }
        let rhs_ty = self.check_value(rhs)?;
        if rhs_ty != lhs_ty {
          return Err(error(
            rhs.location,
            SemanticError::TypeMismatch {
              construct,
              expected: lhs_ty.to_string(),
              found: rhs_ty,
            },
          ));
        }
        (Type::Int, false)
      }
      ExprKind::Binary { op, lhs, rhs } => {
        let construct = format!("operand of \"{}\"", op.symbol());
        self.expect_int(lhs, &construct)?;
        self.expect_int(rhs, &construct)?;
        (Type::Int, false)
      }
      ExprKind::Neg(operand) => {
        self.expect_int(operand, "operand of unary \"-\"")?;
        (Type::Int, false)
      }
      ExprKind::AddrOf(operand) => {
        let operand_ty = self.check_value(operand)?;
        if !operand.lvalue {
          return Err(error(
            operand.location,
            SemanticError::NotLvalue {
              construct: "address-of".to_string(),
            },
          ));
        }
        (Type::pointer_to(operand_ty), false)
      }
      ExprKind::Deref(operand) => {
        let operand_ty = self.check_value(operand)?;
        match operand_ty {
          Type::Pointer(base) => (*base, true),
          found => {
            return Err(error(
              operand.location,
              SemanticError::TypeMismatch {
                construct: "dereference".to_string(),
                expected: "a pointer".to_string(),
                found,
              },
            ));
          }
        }
      }
      ExprKind::Index { base, index } => {
        let base_ty = self.check_value(base)?;
        let element = match base_ty {
          Type::Array(element, _) | Type::Pointer(element) => *element,
          found => {
            return Err(error(
              base.location,
              SemanticError::TypeMismatch {
                construct: "indexed expression".to_string(),
                expected: "an array or pointer".to_string(),
                found,
              },
            ));
          }
        };
        self.expect_int(index, "array index")?;
        (element, true)
      }
      ExprKind::Call { name, args } => (self.check_call(name, args, location)?, false),
    };

    trace!("{location}: expression assigned type {ty}");
    expr.ty = Some(ty.clone());
    expr.lvalue = lvalue;
    Ok(ty)
  }

  fn expect_int(&mut self, expr: &mut Expr, construct: &str) -> CompileResult<()> {
    let ty = self.check_value(expr)?;
    if ty.is_integer() {
      return Ok(());
    }
    Err(error(
      expr.location,
      SemanticError::TypeMismatch {
        construct: construct.to_string(),
        expected: Type::Int.to_string(),
        found: ty,
      },
    ))
  }

  /// Calls resolve against the global scope only. A bare array argument
  /// passed to a pointer parameter of its element type decays here.
  fn check_call(&mut self, name: &str, args: &mut [Expr], location: Location) -> CompileResult<Type> {
    let Some(symbol) = self.globals.get(name) else {
      return Err(error(
        location,
        SemanticError::Undeclared {
          name: name.to_string(),
        },
      ));
    };
    let Type::Function { params, ret } = symbol.ty.clone() else {
      return Err(error(
        location,
        SemanticError::NotAFunction {
          name: name.to_string(),
        },
      ));
    };

    if params.len() != args.len() {
      return Err(error(
        location,
        SemanticError::ArgumentCount {
          name: name.to_string(),
          expected: params.len(),
          found: args.len(),
        },
      ));
    }

    for (position, (arg, param)) in args.iter_mut().zip(params.iter()).enumerate() {
      let found = self.check_value(arg)?;
      if &found == param {
        continue;
      }

      let decays = matches!(
        (&found, param),
        (Type::Array(element, _), Type::Pointer(target)) if element == target
      );
      if decays && let ExprKind::Var(var) = &arg.kind {
        let var = var.clone();
        trace!("{}: array \"{}\" decays to {param}", arg.location, var.name);
        arg.kind = ExprKind::Decay(var);
        arg.ty = Some(param.clone());
        arg.lvalue = false;
        continue;
      }

      return Err(error(
        arg.location,
        SemanticError::ArgumentType {
          name: name.to_string(),
          position: position + 1,
          expected: param.clone(),
          found,
        },
      ));
    }

    Ok(*ret)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn checked(source: &str) -> CompileResult<Program> {
    let mut program = parse(tokenize(source)?, source)?;
    check(&mut program)?;
    Ok(program)
  }

  fn semantic_error(source: &str) -> SemanticError {
    match checked(source) {
      Err(CompileError::Semantic { source, .. }) => source,
      Err(other) => panic!("expected a semantic error, got {other}"),
      Ok(_) => panic!("expected a semantic error, program was accepted"),
    }
  }

  fn in_main(body: &str) -> String {
    format!("int g; int arr[3]; int *p; string s;\nvoid main(void) {{ {body} }}")
  }

  fn main_stmts(program: &Program) -> &[Stmt] {
    let main = program.functions().find(|f| f.name == "main").unwrap();
    &main.body.stmts
  }

  #[test]
  fn accepts_well_typed_program() {
    let program = checked(
      "int total;\n\
       int sum(int a[], int n) {\n\
         int i; int acc;\n\
         i = 0; acc = 0;\n\
         while (i < n) { acc = acc + a[i]; i = i + 1; }\n\
         return acc;\n\
       }\n\
       void main(void) {\n\
         int xs[3]; string msg;\n\
         xs[0] = 1; xs[1] = 2; xs[2] = 3;\n\
         total = sum(xs, 3);\n\
         msg = \"total\";\n\
         write(msg); write(total); writeln();\n\
       }",
    );
    assert!(program.is_ok(), "{:?}", program.err());
  }

  #[test]
  fn expressions_receive_types_and_lvalue_flags() {
    let program = checked(&in_main("p = &arr[1]; *p = 4;")).unwrap();
    let stmts = main_stmts(&program);

    let StmtKind::Expr(assign) = &stmts[0].kind else {
      panic!("expected expression statement");
    };
    assert_eq!(assign.ty, Some(Type::pointer_to(Type::Int)));
    let ExprKind::Assign { lhs, rhs } = &assign.kind else {
      panic!("expected assignment");
    };
    assert_eq!(
      lhs.kind,
      ExprKind::Var(VarRef {
        name: "p".into(),
        slot: Slot::Global
      })
    );
    assert!(lhs.lvalue);
    let ExprKind::AddrOf(target) = &rhs.kind else {
      panic!("expected address-of");
    };
    assert!(target.lvalue);
    assert_eq!(target.ty, Some(Type::Int));

    let StmtKind::Expr(deref_assign) = &stmts[1].kind else {
      panic!("expected expression statement");
    };
    let ExprKind::Assign { lhs, .. } = &deref_assign.kind else {
      panic!("expected assignment");
    };
    assert!(matches!(lhs.kind, ExprKind::Deref(_)));
    assert!(lhs.lvalue);
  }

  #[test]
  fn array_argument_decays_to_pointer() {
    let program = checked(
      "void scale(int *v) { v[0] = v[0] * 10; }\n\
       void main(void) { int a[2]; scale(a); }",
    )
    .unwrap();
    let StmtKind::Expr(call) = &main_stmts(&program)[0].kind else {
      panic!("expected call statement");
    };
    let ExprKind::Call { args, .. } = &call.kind else {
      panic!("expected call");
    };
    assert_eq!(
      args[0].kind,
      ExprKind::Decay(VarRef {
        name: "a".into(),
        slot: Slot::Local(0)
      })
    );
    assert_eq!(args[0].ty, Some(Type::pointer_to(Type::Int)));
  }

  #[test]
  fn locals_shadow_globals_and_are_flattened() {
    let program = checked(
      "int x;\n\
       void main(void) { int x; x = 1; { int y; y = x; } }",
    )
    .unwrap();
    let main = program.functions().next().unwrap();
    let names: Vec<_> = main.locals.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);

    let StmtKind::Expr(assign) = &main.body.stmts[0].kind else {
      panic!("expected assignment");
    };
    let ExprKind::Assign { lhs, .. } = &assign.kind else {
      panic!("expected assignment");
    };
    assert!(matches!(&lhs.kind, ExprKind::Var(v) if v.slot == Slot::Local(0)));
  }

  #[test]
  fn parameters_resolve_to_parameter_slots() {
    let program = checked("int f(int a, int b) { return b; } void main(void) { f(1, 2); }").unwrap();
    let f = program.functions().next().unwrap();
    let StmtKind::Return(Some(value)) = &f.body.stmts[0].kind else {
      panic!("expected return");
    };
    assert!(matches!(&value.kind, ExprKind::Var(v) if v.slot == Slot::Param(1)));
  }

  #[test]
  fn functions_may_be_called_before_definition() {
    assert!(checked("void main(void) { write(later(1)); } int later(int x) { return x; }").is_ok());
  }

  #[test]
  fn undeclared_name() {
    assert!(matches!(
      semantic_error(&in_main("missing = 1;")),
      SemanticError::Undeclared { name } if name == "missing"
    ));
  }

  #[test]
  fn global_redeclaration() {
    assert!(matches!(
      semantic_error("int f; int f(void) { return 1; } void main(void) { }"),
      SemanticError::Redeclared { name } if name == "f"
    ));
  }

  #[test]
  fn local_redeclaration_across_blocks() {
    assert!(matches!(
      semantic_error("void main(void) { int a; { int a; } }"),
      SemanticError::Redeclared { .. }
    ));
    assert!(matches!(
      semantic_error("void f(int a) { int a; } void main(void) { }"),
      SemanticError::Redeclared { .. }
    ));
  }

  #[test]
  fn arithmetic_requires_ints() {
    assert!(matches!(
      semantic_error(&in_main("g = g + s;")),
      SemanticError::TypeMismatch { found: Type::Str, .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("g = p % 2;")),
      SemanticError::TypeMismatch { .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("g = -s;")),
      SemanticError::TypeMismatch { .. }
    ));
  }

  #[test]
  fn comparison_operands_must_match() {
    assert!(checked(&in_main("if (s == \"x\") g = 1; if (p != &g) g = 2;")).is_ok());
    assert!(matches!(
      semantic_error(&in_main("if (g < s) g = 1;")),
      SemanticError::TypeMismatch { found: Type::Str, .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("if (arr == arr) g = 1;")),
      SemanticError::TypeMismatch { .. }
    ));
  }

  #[test]
  fn assignment_rules() {
    assert!(matches!(
      semantic_error(&in_main("g = \"text\";")),
      SemanticError::TypeMismatch { found: Type::Str, .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("1 = g;")),
      SemanticError::NotLvalue { .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("arr = p;")),
      SemanticError::NotLvalue { .. }
    ));
  }

  #[test]
  fn address_of_requires_lvalue() {
    assert!(matches!(
      semantic_error(&in_main("p = &(g + 1);")),
      SemanticError::NotLvalue { .. }
    ));
  }

  #[test]
  fn dereference_requires_pointer() {
    assert!(matches!(
      semantic_error(&in_main("g = *g;")),
      SemanticError::TypeMismatch { found: Type::Int, .. }
    ));
  }

  #[test]
  fn indexing_rules() {
    assert!(checked(&in_main("g = p[2] + arr[1];")).is_ok());
    assert!(matches!(
      semantic_error(&in_main("g = g[0];")),
      SemanticError::TypeMismatch { .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("g = arr[s];")),
      SemanticError::TypeMismatch { found: Type::Str, .. }
    ));
  }

  #[test]
  fn call_argument_checks() {
    let prelude = "int f(int a, string b) { return a; }\n";
    assert!(matches!(
      semantic_error(&format!("{prelude}void main(void) {{ f(1); }}")),
      SemanticError::ArgumentCount { expected: 2, found: 1, .. }
    ));
    assert!(matches!(
      semantic_error(&format!("{prelude}void main(void) {{ f(\"x\", \"y\"); }}")),
      SemanticError::ArgumentType { position: 1, .. }
    ));
    assert!(matches!(
      semantic_error("int v; void main(void) { v(); }"),
      SemanticError::NotAFunction { .. }
    ));
    assert!(matches!(
      semantic_error("void main(void) { nope(); }"),
      SemanticError::Undeclared { .. }
    ));
  }

  #[test]
  fn array_only_decays_to_matching_pointer() {
    assert!(matches!(
      semantic_error("void f(string *v) { } void main(void) { int a[2]; f(a); }"),
      SemanticError::ArgumentType { .. }
    ));
    assert!(matches!(
      semantic_error("void f(int v) { } void main(void) { int a[2]; f(a); }"),
      SemanticError::ArgumentType { .. }
    ));
  }

  #[test]
  fn void_calls_only_as_statements() {
    let prelude = "void nothing(void) { }\n";
    assert!(checked(&format!("{prelude}void main(void) {{ nothing(); }}")).is_ok());
    assert!(matches!(
      semantic_error(&format!("{prelude}int g; void main(void) {{ g = nothing(); }}")),
      SemanticError::VoidValue { .. }
    ));
    assert!(matches!(
      semantic_error(&format!("{prelude}void main(void) {{ write(nothing()); }}")),
      SemanticError::VoidValue { .. }
    ));
  }

  #[test]
  fn function_names_are_not_values() {
    assert!(matches!(
      semantic_error("int f(void) { return 1; } int g; void main(void) { g = f; }"),
      SemanticError::FunctionAsValue { .. }
    ));
  }

  #[test]
  fn main_must_exist_with_the_right_shape() {
    assert!(matches!(
      semantic_error("int f(void) { return 0; }"),
      SemanticError::MissingMain
    ));
    assert!(matches!(
      semantic_error("int main(void) { return 0; }"),
      SemanticError::MalformedMain
    ));
    assert!(matches!(
      semantic_error("void main(int argc) { }"),
      SemanticError::MalformedMain
    ));
    assert!(matches!(
      semantic_error("int main; "),
      SemanticError::MalformedMain
    ));
  }

  #[test]
  fn declaration_rules() {
    assert!(matches!(
      semantic_error("void v; void main(void) { }"),
      SemanticError::VoidVariable { .. }
    ));
    assert!(matches!(
      semantic_error("void main(void) { int a[0]; }"),
      SemanticError::EmptyArray { .. }
    ));
    assert!(matches!(
      semantic_error("void f(int a, void b) { } void main(void) { }"),
      SemanticError::VoidVariable { .. }
    ));
  }

  #[test]
  fn arrays_must_fit_in_the_address_space() {
    assert!(matches!(
      semantic_error("int a[2305843009213693952]; void main(void) { }"),
      SemanticError::ArrayTooLarge { ref name } if name == "a"
    ));
    assert!(matches!(
      semantic_error("void main(void) { int a[300000000]; }"),
      SemanticError::ArrayTooLarge { .. }
    ));
  }

  #[test]
  fn frames_must_fit_in_a_32_bit_displacement() {
    assert!(matches!(
      semantic_error("void main(void) { int a[200000000]; int b[200000000]; }"),
      SemanticError::FrameTooLarge { ref function } if function == "main"
    ));
  }

  #[test]
  fn return_rules() {
    assert!(matches!(
      semantic_error("int f(void) { return \"s\"; } void main(void) { }"),
      SemanticError::ReturnMismatch { .. }
    ));
    assert!(matches!(
      semantic_error("int f(void) { return; } void main(void) { }"),
      SemanticError::MissingReturnValue { .. }
    ));
    assert!(matches!(
      semantic_error("void main(void) { return 1; }"),
      SemanticError::UnexpectedReturnValue { .. }
    ));
  }

  #[test]
  fn conditions_and_writes() {
    assert!(matches!(
      semantic_error(&in_main("while (s) g = 1;")),
      SemanticError::TypeMismatch { found: Type::Str, .. }
    ));
    assert!(matches!(
      semantic_error(&in_main("write(p);")),
      SemanticError::Unwritable { .. }
    ));
  }

  #[test]
  fn first_error_wins_and_carries_location() {
    let err = checked("void main(void) {\n  x = 1;\n  y = 2;\n}").unwrap_err();
    assert_eq!(err.to_string(), "2:3: name \"x\" is undefined");
  }
}
