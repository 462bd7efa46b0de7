//! Code generation: lower the checked AST into AT&T x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves its value
//! in `%rax`, and binary operators push the left operand while the right one
//! is evaluated. Locals live on the stack frame and are addressed relative to
//! `%rbp`.
//!
//! Calls use a dedicated convention rather than the platform one. The caller
//! pushes the arguments left to right, then its own `%rbp`, then calls. The
//! callee sets `%rbp` to `%rsp` on entry, so `0(%rbp)` is the return address,
//! `8(%rbp)` the caller's frame pointer and `16(%rbp)` the last argument. On
//! return the caller pops its frame pointer back and drops the arguments.

use log::debug;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, Function, Program, Slot, Stmt, StmtKind, VarRef};
use crate::ty::{Type, WORD_SIZE};

const WRITE_INT: &str = ".WriteIntString";
const WRITELN: &str = ".WritelnString";
const WRITE_STRING: &str = ".WriteStringString";
const ARRAY_OVERFLOW: &str = ".ArrayOverflowString";
const READ_INT: &str = ".ReadIntString";

/// Emit assembly for a checked program.
pub fn generate(program: &Program) -> String {
  CodeGenerator::new().generate(program)
}

/// Assembly label of a global variable.
pub fn global_label(name: &str) -> String {
  format!("_g_{name}")
}

/// Assembly label of a function. `main` keeps its name so the C runtime
/// can find it.
pub fn function_label(name: &str) -> String {
  if name == "main" {
    name.to_string()
  } else {
    format!("_f_{name}")
  }
}

/// Stack layout of one function, relative to its frame pointer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Frame {
  pub params: Vec<i64>,
  pub locals: Vec<i64>,
  pub size: i64,
  pub is_main: bool,
}

impl Frame {
  pub fn layout(func: &Function) -> Self {
    let count = func.params.len() as i64;
    let params = (0..count)
      .map(|idx| 2 * WORD_SIZE + WORD_SIZE * (count - 1 - idx))
      .collect();

    let mut size = 0;
    let locals = func
      .locals
      .iter()
      .map(|local| {
        size += local.ty.size();
        -size
      })
      .collect();

    Self {
      params,
      locals,
      size,
      is_main: func.name == "main",
    }
  }
}

pub struct CodeGenerator {
  text: String,
  labels: usize,
  strings: Vec<(String, String)>,
  trap_label: Option<String>,
  frame: Frame,
}

impl Default for CodeGenerator {
  fn default() -> Self {
    Self::new()
  }
}

impl CodeGenerator {
  pub fn new() -> Self {
    Self {
      text: String::new(),
      labels: 0,
      strings: Vec::new(),
      trap_label: None,
      frame: Frame::default(),
    }
  }

  pub fn generate(mut self, program: &Program) -> String {
    for func in program.functions() {
      self.emit_function(func);
    }
    if let Some(trap) = self.trap_label.clone() {
      self.emit_bounds_trap(&trap);
    }

    let mut asm = String::new();
    asm.push_str("    .section .rodata\n");
    asm.push_str(&format!("{WRITE_INT}: .string \"%ld \"\n"));
    asm.push_str(&format!("{WRITELN}: .string \"\\n\"\n"));
    asm.push_str(&format!("{WRITE_STRING}: .string \"%s \"\n"));
    asm.push_str(&format!(
      "{ARRAY_OVERFLOW}: .string \"You fell off the end of an array.\\n\"\n"
    ));
    asm.push_str(&format!("{READ_INT}: .string \"%ld\"\n"));
    for (label, value) in &self.strings {
      asm.push_str(&format!("{label}: .string \"{}\"\n", escape(value)));
    }

    let globals: Vec<_> = program.globals().collect();
    if !globals.is_empty() {
      asm.push_str("    .data\n");
      asm.push_str("    .align 8\n");
      for var in globals {
        asm.push_str(&format!("{}:\n", global_label(&var.name)));
        asm.push_str(&format!("    .zero {}\n", var.ty.size()));
      }
    }

    asm.push_str("    .text\n");
    asm.push_str("    .globl main\n");
    asm.push_str(&self.text);
    asm.push_str("    .section .note.GNU-stack,\"\",@progbits\n");
    asm
  }

  fn new_label(&mut self) -> String {
    let label = format!(".L{}", self.labels);
    self.labels += 1;
    label
  }

  /// Label of a string literal, allocating one the first time it is seen.
  fn string_label(&mut self, value: &str) -> String {
    if let Some((label, _)) = self.strings.iter().find(|(_, v)| v == value) {
      return label.clone();
    }
    let label = self.new_label();
    self.strings.push((label.clone(), value.to_string()));
    label
  }

  fn trap_label(&mut self) -> String {
    if let Some(label) = &self.trap_label {
      return label.clone();
    }
    let label = self.new_label();
    self.trap_label = Some(label.clone());
    label
  }

  fn emit(&mut self, instr: &str) {
    self.text.push_str("    ");
    self.text.push_str(instr);
    self.text.push('\n');
  }

  fn emit_label(&mut self, label: &str) {
    self.text.push_str(label);
    self.text.push_str(":\n");
  }

  /// Load an immediate into a register, using the 64-bit form only when the
  /// value does not fit a sign-extended 32-bit immediate.
  fn emit_load_imm(&mut self, value: i64, reg: &str) {
    if i32::try_from(value).is_ok() {
      self.emit(&format!("movq ${value}, {reg}"));
    } else {
      self.emit(&format!("movabsq ${value}, {reg}"));
    }
  }

  /// Call a C library function with the stack realigned to 16 bytes.
  /// Arguments must already be in `%rdi`/`%rsi`; clobbers `%rax`.
  fn emit_libc_call(&mut self, name: &str) {
    self.emit("pushq %rsp");
    self.emit("pushq (%rsp)");
    self.emit("andq $-16, %rsp");
    self.emit("xorl %eax, %eax");
    self.emit(&format!("call {name}@PLT"));
    self.emit("movq 8(%rsp), %rsp");
  }

  fn emit_function(&mut self, func: &Function) {
    self.frame = Frame::layout(func);
    for (param, offset) in func.params.iter().zip(&self.frame.params) {
      debug!("{}: parameter {} at {offset}(%rbp)", func.name, param.name);
    }
    for (local, offset) in func.locals.iter().zip(&self.frame.locals) {
      debug!("{}: local {} at {offset}(%rbp)", func.name, local.name);
    }
    debug!("{}: {} byte(s) of locals", func.name, self.frame.size);

    self.emit_label(&function_label(&func.name));
    if self.frame.is_main {
      self.emit("pushq %rbp");
    }
    self.emit("movq %rsp, %rbp");
    if self.frame.size > 0 {
      self.emit(&format!("subq ${}, %rsp", self.frame.size));
    }

    self.emit_block(&func.body);
    self.emit_epilogue();
  }

  fn emit_epilogue(&mut self) {
    if self.frame.is_main {
      self.emit("xorl %eax, %eax");
      self.emit("movq %rbp, %rsp");
      self.emit("popq %rbp");
    } else {
      self.emit("movq %rbp, %rsp");
    }
    self.emit("ret");
  }

  fn emit_bounds_trap(&mut self, label: &str) {
    self.emit_label(label);
    self.emit(&format!("leaq {ARRAY_OVERFLOW}(%rip), %rdi"));
    self.emit("andq $-16, %rsp");
    self.emit("xorl %eax, %eax");
    self.emit("call printf@PLT");
    self.emit("movl $1, %edi");
    self.emit("call exit@PLT");
  }

  fn emit_block(&mut self, block: &Block) {
    for stmt in &block.stmts {
      self.emit_stmt(stmt);
    }
  }

  fn emit_stmt(&mut self, stmt: &Stmt) {
    match &stmt.kind {
      StmtKind::Compound(block) => self.emit_block(block),
      StmtKind::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.emit_expr(cond);
        self.emit("cmpq $0, %rax");
        let end_label = match else_branch {
          Some(else_branch) => {
            let else_label = self.new_label();
            let end_label = self.new_label();
            self.emit(&format!("je {else_label}"));
            self.emit_stmt(then_branch);
            self.emit(&format!("jmp {end_label}"));
            self.emit_label(&else_label);
            self.emit_stmt(else_branch);
            end_label
          }
          None => {
            let end_label = self.new_label();
            self.emit(&format!("je {end_label}"));
            self.emit_stmt(then_branch);
            end_label
          }
        };
        self.emit_label(&end_label);
      }
      StmtKind::While { cond, body } => {
        let top_label = self.new_label();
        let end_label = self.new_label();
        self.emit_label(&top_label);
        self.emit_expr(cond);
        self.emit("cmpq $0, %rax");
        self.emit(&format!("je {end_label}"));
        self.emit_stmt(body);
        self.emit(&format!("jmp {top_label}"));
        self.emit_label(&end_label);
      }
      StmtKind::Return(value) => {
        if let Some(value) = value {
          self.emit_expr(value);
        }
        self.emit_epilogue();
      }
      StmtKind::Expr(expr) => self.emit_expr(expr),
      StmtKind::Write(expr) => {
        self.emit_expr(expr);
        let format = match expr.checked_ty() {
          Type::Str => WRITE_STRING,
          _ => WRITE_INT,
        };
        self.emit("movq %rax, %rsi");
        self.emit(&format!("leaq {format}(%rip), %rdi"));
        self.emit_libc_call("printf");
      }
      StmtKind::Writeln => {
        self.emit(&format!("leaq {WRITELN}(%rip), %rdi"));
        self.emit_libc_call("printf");
      }
    }
  }

  /// Memory operand addressing a variable's storage.
  fn operand(&self, var: &VarRef) -> String {
    match var.slot {
      Slot::Global => format!("{}(%rip)", global_label(&var.name)),
      Slot::Param(idx) => format!("{}(%rbp)", self.frame.params[idx]),
      Slot::Local(idx) => format!("{}(%rbp)", self.frame.locals[idx]),
    }
  }

  /// Evaluate an expression into `%rax`.
  fn emit_expr(&mut self, expr: &Expr) {
    match &expr.kind {
      ExprKind::Num(value) => self.emit_load_imm(*value, "%rax"),
      ExprKind::Str(value) => {
        let label = self.string_label(value);
        self.emit(&format!("leaq {label}(%rip), %rax"));
      }
      ExprKind::Read => {
        self.emit("subq $8, %rsp");
        self.emit("movq %rsp, %rsi");
        self.emit(&format!("leaq {READ_INT}(%rip), %rdi"));
        self.emit_libc_call("scanf");
        self.emit("popq %rax");
      }
      ExprKind::Var(var) if expr.checked_ty().is_array() => {
        let operand = self.operand(var);
        self.emit(&format!("leaq {operand}, %rax"));
      }
      ExprKind::Var(var) => {
        let operand = self.operand(var);
        self.emit(&format!("movq {operand}, %rax"));
      }
      ExprKind::Decay(var) => {
        let operand = self.operand(var);
        self.emit(&format!("leaq {operand}, %rax"));
      }
      ExprKind::Assign { lhs, rhs } => {
        self.emit_addr(lhs);
        self.emit("pushq %rax");
        self.emit_expr(rhs);
        self.emit("popq %rcx");
        self.emit("movq %rax, (%rcx)");
      }
      ExprKind::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs);
        self.emit("pushq %rax");
        self.emit_expr(rhs);
        self.emit("movq %rax, %rcx");
        self.emit("popq %rax");
        self.emit_binary(*op);
      }
      ExprKind::Neg(operand) => {
        self.emit_expr(operand);
        self.emit("negq %rax");
      }
      ExprKind::AddrOf(operand) => self.emit_addr(operand),
      ExprKind::Deref(operand) => {
        self.emit_expr(operand);
        self.emit("movq (%rax), %rax");
      }
      ExprKind::Index { .. } => {
        self.emit_addr(expr);
        self.emit("movq (%rax), %rax");
      }
      ExprKind::Call { name, args } => {
        for arg in args {
          self.emit_expr(arg);
          self.emit("pushq %rax");
        }
        self.emit("pushq %rbp");
        self.emit(&format!("call {}", function_label(name)));
        self.emit("popq %rbp");
        if !args.is_empty() {
          self.emit(&format!("addq ${}, %rsp", WORD_SIZE * args.len() as i64));
        }
      }
      ExprKind::Name(name) => unreachable!("unresolved name \"{name}\" reached code generation"),
    }
  }

  /// Combine `%rax` (left) and `%rcx` (right) into `%rax`.
  fn emit_binary(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.emit("addq %rcx, %rax"),
      BinaryOp::Sub => self.emit("subq %rcx, %rax"),
      BinaryOp::Mul => self.emit("imulq %rcx, %rax"),
      BinaryOp::Div => {
        self.emit("cqto");
        self.emit("idivq %rcx");
      }
      BinaryOp::Mod => {
        self.emit("cqto");
        self.emit("idivq %rcx");
        self.emit("movq %rdx, %rax");
      }
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        let set = match op {
          BinaryOp::Eq => "sete",
          BinaryOp::Ne => "setne",
          BinaryOp::Lt => "setl",
          BinaryOp::Le => "setle",
          BinaryOp::Gt => "setg",
          _ => "setge",
        };
        self.emit("cmpq %rcx, %rax");
        self.emit(&format!("{set} %al"));
        self.emit("movzbq %al, %rax");
      }
    }
  }

  /// Evaluate the address of an lvalue into `%rax`.
  fn emit_addr(&mut self, expr: &Expr) {
    match &expr.kind {
      ExprKind::Var(var) => {
        let operand = self.operand(var);
        self.emit(&format!("leaq {operand}, %rax"));
      }
      ExprKind::Deref(operand) => self.emit_expr(operand),
      ExprKind::Index { base, index } => {
        self.emit_expr(index);
        if let Type::Array(_, len) = base.checked_ty() {
          // Unsigned comparison also sends negative indices to the trap.
          let trap = self.trap_label();
          self.emit_load_imm(*len as i64, "%rcx");
          self.emit("cmpq %rcx, %rax");
          self.emit(&format!("jae {trap}"));
        }
        self.emit("pushq %rax");
        self.emit_expr(base);
        self.emit("popq %rcx");
        self.emit("leaq (%rax,%rcx,8), %rax");
      }
      _ => unreachable!("expression at {} is not an lvalue", expr.location),
    }
  }
}

/// Escape a literal for a `.string` directive.
fn escape(value: &str) -> String {
  value.replace('\\', "\\\\").replace('"', "\\\"")
}
