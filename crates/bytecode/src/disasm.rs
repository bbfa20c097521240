use std::fmt::Write;

use crate::chunk::Chunk;
use crate::decode::{Decoded, Instr};

/// Render one instruction, resolving literal operands against `chunk`.
pub(crate) fn instr_to_string(chunk: &Chunk, instr: &Instr) -> String {
  let mut out = String::from(instr.op.name());
  match instr.operand {
    Decoded::None => {}
    Decoded::Byte(byte) => {
      let _ = write!(out, " {byte}");
    }
    Decoded::Literal(index) => match chunk.literal(index) {
      Some(literal) => {
        let _ = write!(out, " {literal}");
      }
      None => {
        let _ = write!(out, " <invalid literal {index}>");
      }
    },
    Decoded::Forward(offset) => {
      let _ = write!(out, " +{offset}");
    }
    Decoded::Backward(offset) => {
      let _ = write!(out, " -{offset}");
    }
  }
  out
}

pub(crate) fn disassemble(chunk: &Chunk) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "function {}:", chunk.name);
  for instr in chunk.instructions() {
    match instr {
      Ok(instr) => {
        let _ = writeln!(
          out,
          "{:>5}  {}",
          instr.offset,
          instr_to_string(chunk, &instr)
        );
      }
      Err(e) => {
        let _ = writeln!(out, "error: {e}");
        break;
      }
    }
  }
  for literal in chunk.literals.iter() {
    if let crate::chunk::Literal::Function(nested) = literal {
      out.push('\n');
      out.push_str(&nested.disassemble());
    }
  }
  out
}

impl Chunk {
  /// Instruction listing without offsets, for tests.
  pub fn op_list(&self) -> Vec<String> {
    self
      .instructions()
      .map(|instr| match instr {
        Ok(instr) => instr_to_string(self, &instr),
        Err(e) => format!("error: {e}"),
      })
      .collect()
  }
}
