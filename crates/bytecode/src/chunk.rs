use std::fmt;

use beef::lean::Cow;
use indexmap::IndexMap;

use crate::emitter::EmitError;

/// An entry in a chunk's literal table.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
  /// An identifier name.
  Ident(Box<str>),
  /// A string value, escapes already decoded.
  Str(Box<str>),
  Number(f64),
  RegExp { pattern: Box<str>, flags: Box<str> },
  /// A nested function.
  Function(Box<Chunk>),
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Ident(name) => write!(f, "'{name}'"),
      Literal::Str(value) => write!(f, "{value:?}"),
      Literal::Number(value) => write!(f, "{value}"),
      Literal::RegExp { pattern, flags } => write!(f, "/{pattern}/{flags}"),
      Literal::Function(chunk) => write!(f, "<function {}>", chunk.name),
    }
  }
}

/// Map key for literal deduplication.
///
/// Numbers are keyed by bit pattern. Functions are never deduplicated.
#[derive(Clone, Hash, PartialEq, Eq)]
enum LiteralKey {
  Ident(Box<str>),
  Str(Box<str>),
  Number(u64),
  RegExp(Box<str>, Box<str>),
}

impl Literal {
  fn key(&self) -> Option<LiteralKey> {
    match self {
      Literal::Ident(name) => Some(LiteralKey::Ident(name.clone())),
      Literal::Str(value) => Some(LiteralKey::Str(value.clone())),
      Literal::Number(value) => Some(LiteralKey::Number(value.to_bits())),
      Literal::RegExp { pattern, flags } => {
        Some(LiteralKey::RegExp(pattern.clone(), flags.clone()))
      }
      Literal::Function(_) => None,
    }
  }
}

/// Literal indices are encoded in at most 15 bits.
pub(crate) const MAX_LITERALS: usize = 1 << 15;

#[derive(Default)]
pub(crate) struct LiteralPool {
  items: Vec<Literal>,
  index: IndexMap<LiteralKey, u16>,
}

impl LiteralPool {
  pub fn insert(&mut self, literal: Literal) -> Result<u16, EmitError> {
    let key = literal.key();
    if let Some(index) = key.as_ref().and_then(|k| self.index.get(k)) {
      return Ok(*index);
    }
    if self.items.len() >= MAX_LITERALS {
      return Err(EmitError::LiteralLimit);
    }
    let index = self.items.len() as u16;
    self.items.push(literal);
    if let Some(key) = key {
      self.index.insert(key, index);
    }
    Ok(index)
  }

  pub fn finish(self) -> Vec<Literal> {
    self.items
  }
}

/// A compiled unit: the global program or a single function.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
  pub name: Cow<'static, str>,
  pub params: Vec<Box<str>>,
  pub code: Vec<u8>,
  pub literals: Vec<Literal>,
  pub strict: bool,
}

impl Chunk {
  pub fn literal(&self, index: u16) -> Option<&Literal> {
    self.literals.get(index as usize)
  }

  /// Iterate decoded instructions.
  pub fn instructions(&self) -> crate::decode::InstrIter<'_> {
    crate::decode::InstrIter::new(&self.code)
  }

  /// Human-readable listing, one instruction per line.
  pub fn disassemble(&self) -> String {
    crate::disasm::disassemble(self)
  }
}
