//! Kumo is a small ECMAScript engine: a single-pass compiler from source
//! text to a compact bytecode format, plus an early-stage stack interpreter
//! for the common subset of that bytecode.
//!
//! ```
//! let kumo = kumo::Kumo::new();
//! let result = kumo.eval("var x = 2; x * 21;").unwrap();
//! assert_eq!(result, kumo::Value::Number(42.0));
//! ```

use std::cell::RefCell;

use thiserror::Error;

pub use bytecode::{Chunk, Literal};
pub use vm::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Syntax(#[from] syntax::Error),
  #[error(transparent)]
  Runtime(#[from] vm::VmError),
}

impl Error {
  /// Render the error against its source, with a code snippet for
  /// syntax errors.
  pub fn report(&self, source: &str) -> String {
    match self {
      Error::Syntax(e) => e.report(source),
      Error::Runtime(e) => e.to_string(),
    }
  }
}

/// Compile a program to bytecode without running it.
pub fn compile(src: &str) -> Result<Chunk> {
  Ok(syntax::parse(src)?)
}

/// An engine instance: compiled programs share its global scope.
pub struct Kumo {
  vm: RefCell<vm::Vm>,
}

impl Kumo {
  pub fn new() -> Self {
    Kumo {
      vm: RefCell::new(vm::Vm::new()),
    }
  }

  /// Parse `src`, discarding the compiled code.
  pub fn check(&self, src: &str) -> Result<()> {
    syntax::parse(src)?;
    Ok(())
  }

  /// Compile and run `src`, returning the program's completion value.
  pub fn eval(&self, src: &str) -> Result<Value> {
    let chunk = syntax::parse(src)?;
    let value = self.vm.borrow_mut().run(&chunk)?;
    Ok(value)
  }

  pub fn global(&self, name: &str) -> Option<Value> {
    self.vm.borrow().global(name).cloned()
  }

  pub fn set_global(&self, name: &str, value: Value) {
    self.vm.borrow_mut().set_global(name, value);
  }
}

impl Default for Kumo {
  fn default() -> Self {
    Kumo::new()
  }
}
