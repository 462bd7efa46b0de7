//! Crate root: wires together the compilation pipeline.
//!
//! The stages run strictly in sequence and each rejects the whole input on
//! its first error:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the program AST.
//! - `checker` resolves names and annotates every expression with its type.
//! - `codegen` lowers the checked AST into x86-64 AT&T assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod checker;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod ty;

pub use error::{CompileError, CompileResult, Location, SemanticError};

/// Parse and check a source string, returning the annotated AST.
pub fn analyze(source: &str) -> CompileResult<ast::Program> {
  let tokens = tokenizer::tokenize(source)?;
  let mut program = parser::parse(tokens, source)?;
  checker::check(&mut program)?;
  Ok(program)
}

/// Compile a source string into AT&T assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let program = analyze(source)?;
  Ok(codegen::generate(&program))
}
