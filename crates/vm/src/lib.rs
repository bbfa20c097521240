//! An early-stage stack interpreter for the compact bytecode.
//!
//! The interpreter executes the common subset: pushes, global variables,
//! unary/binary operators, and every branch form. Opcodes that need the
//! object model, function calls, or runtime contexts report
//! [`VmError::Unsupported`] instead of guessing.

use std::collections::HashMap;

use bytecode::{read_instr, Chunk, Decoded, ExtOpcode, Literal, Op, Opcode};
use thiserror::Error;

mod value;

pub use value::Value;

#[derive(Clone, Debug, Error)]
pub enum VmError {
  #[error("unsupported opcode `{0}`")]
  Unsupported(&'static str),
  #[error("uncaught exception: {0}")]
  Uncaught(Value),
  #[error("malformed bytecode: {0}")]
  Decode(#[from] bytecode::DecodeError),
  #[error("malformed bytecode: operand stack underflow")]
  StackUnderflow,
  #[error("malformed bytecode: invalid literal index {0}")]
  InvalidLiteral(u16),
}

pub struct Vm {
  globals: HashMap<Box<str>, Value>,
}

impl Vm {
  pub fn new() -> Self {
    Vm {
      globals: HashMap::new(),
    }
  }

  pub fn global(&self, name: &str) -> Option<&Value> {
    self.globals.get(name)
  }

  pub fn set_global(&mut self, name: impl Into<Box<str>>, value: Value) {
    self.globals.insert(name.into(), value);
  }

  /// Run a compiled program and return its completion value.
  pub fn run(&mut self, chunk: &Chunk) -> Result<Value, VmError> {
    let code = &chunk.code;
    let mut stack: Vec<Value> = Vec::new();
    let mut completion = Value::Undefined;
    let mut pc = 0;

    macro_rules! pop {
      () => {
        stack.pop().ok_or(VmError::StackUnderflow)?
      };
    }

    while pc < code.len() {
      let (instr, next) = read_instr(code, pc)?;
      pc = next;

      let op = match instr.op {
        Op::Cbc(op) => op,
        Op::Ext(ExtOpcode::Debugger) => continue,
        Op::Ext(ext) => return Err(VmError::Unsupported(ext.name())),
      };

      match op {
        Opcode::Pop => {
          pop!();
        }
        Opcode::PopBlock => {
          completion = pop!();
        }
        Opcode::Dup => {
          let top = stack.last().ok_or(VmError::StackUnderflow)?.clone();
          stack.push(top);
        }
        Opcode::Dup2 => {
          let len = stack.len();
          if len < 2 {
            return Err(VmError::StackUnderflow);
          }
          stack.push(stack[len - 2].clone());
          stack.push(stack[len - 1].clone());
        }

        Opcode::PushTrue => stack.push(Value::Bool(true)),
        Opcode::PushFalse => stack.push(Value::Bool(false)),
        Opcode::PushNull => stack.push(Value::Null),
        Opcode::PushUndefined => stack.push(Value::Undefined),
        Opcode::PushNumber => {
          let Literal::Number(value) = self.literal(chunk, &instr.operand)? else {
            return Err(VmError::Unsupported(op.name()));
          };
          stack.push(Value::Number(*value));
        }
        Opcode::PushLiteral => match self.literal(chunk, &instr.operand)? {
          Literal::Str(value) => stack.push(Value::str(value)),
          _ => return Err(VmError::Unsupported(op.name())),
        },
        Opcode::PushIdent => {
          let name = self.ident(chunk, &instr.operand)?;
          let value = self.globals.get(name).cloned().unwrap_or(Value::Undefined);
          stack.push(value);
        }

        Opcode::AssignIdent | Opcode::AssignIdentPushResult | Opcode::AssignIdentBlock => {
          let name = self.ident(chunk, &instr.operand)?.to_string();
          let value = pop!();
          match op {
            Opcode::AssignIdentPushResult => stack.push(value.clone()),
            Opcode::AssignIdentBlock => completion = value.clone(),
            _ => {}
          }
          self.globals.insert(name.into(), value);
        }

        Opcode::Plus => {
          let value = pop!();
          stack.push(Value::Number(value.to_number()));
        }
        Opcode::Negate => {
          let value = pop!();
          stack.push(Value::Number(-value.to_number()));
        }
        Opcode::BitNot => {
          let value = pop!();
          stack.push(Value::Number(!value.to_int32() as f64));
        }
        Opcode::LogicalNot => {
          let value = pop!();
          stack.push(Value::Bool(!value.is_truthy()));
        }
        Opcode::TypeOf => {
          let value = pop!();
          stack.push(Value::str(value.type_of()));
        }
        Opcode::Void => {
          pop!();
          stack.push(Value::Undefined);
        }

        Opcode::Add => {
          let rhs = pop!();
          let lhs = pop!();
          stack.push(value::add(&lhs, &rhs));
        }
        Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
          let rhs = pop!().to_number();
          let lhs = pop!().to_number();
          let result = match op {
            Opcode::Sub => lhs - rhs,
            Opcode::Mul => lhs * rhs,
            Opcode::Div => lhs / rhs,
            _ => lhs % rhs,
          };
          stack.push(Value::Number(result));
        }
        Opcode::LeftShift | Opcode::RightShift | Opcode::UnsignedRightShift
        | Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor => {
          let rhs = pop!().to_int32();
          let lhs = pop!().to_int32();
          let result = match op {
            Opcode::LeftShift => (lhs << (rhs & 31)) as f64,
            Opcode::RightShift => (lhs >> (rhs & 31)) as f64,
            Opcode::UnsignedRightShift => ((lhs as u32) >> (rhs & 31)) as f64,
            Opcode::BitAnd => (lhs & rhs) as f64,
            Opcode::BitOr => (lhs | rhs) as f64,
            _ => (lhs ^ rhs) as f64,
          };
          stack.push(Value::Number(result));
        }

        Opcode::Less | Opcode::Greater | Opcode::LessEqual | Opcode::GreaterEqual => {
          use std::cmp::Ordering::*;
          let rhs = pop!();
          let lhs = pop!();
          let result = match value::compare(&lhs, &rhs) {
            Some(ordering) => match op {
              Opcode::Less => ordering == Less,
              Opcode::Greater => ordering == Greater,
              Opcode::LessEqual => ordering != Greater,
              _ => ordering != Less,
            },
            // NaN compares false
            None => false,
          };
          stack.push(Value::Bool(result));
        }

        Opcode::Equal | Opcode::NotEqual => {
          let rhs = pop!();
          let lhs = pop!();
          let eq = value::loose_eq(&lhs, &rhs);
          stack.push(Value::Bool(if op == Opcode::Equal { eq } else { !eq }));
        }
        Opcode::StrictEqual | Opcode::StrictNotEqual => {
          let rhs = pop!();
          let lhs = pop!();
          let eq = value::strict_eq(&lhs, &rhs);
          stack.push(Value::Bool(if op == Opcode::StrictEqual { eq } else { !eq }));
        }

        Opcode::JumpForward
        | Opcode::JumpForward2
        | Opcode::JumpForward3
        | Opcode::JumpBackward
        | Opcode::JumpBackward2
        | Opcode::JumpBackward3 => {
          pc = self.target(&instr)?;
        }
        Opcode::BranchIfTrueForward
        | Opcode::BranchIfTrueForward2
        | Opcode::BranchIfTrueForward3
        | Opcode::BranchIfTrueBackward
        | Opcode::BranchIfTrueBackward2
        | Opcode::BranchIfTrueBackward3 => {
          if pop!().is_truthy() {
            pc = self.target(&instr)?;
          }
        }
        Opcode::BranchIfFalseForward
        | Opcode::BranchIfFalseForward2
        | Opcode::BranchIfFalseForward3
        | Opcode::BranchIfFalseBackward
        | Opcode::BranchIfFalseBackward2
        | Opcode::BranchIfFalseBackward3 => {
          if !pop!().is_truthy() {
            pc = self.target(&instr)?;
          }
        }
        Opcode::BranchIfStrictEqual
        | Opcode::BranchIfStrictEqual2
        | Opcode::BranchIfStrictEqual3 => {
          let rhs = pop!();
          let lhs = stack.last().ok_or(VmError::StackUnderflow)?;
          if value::strict_eq(lhs, &rhs) {
            // the matching case consumes the switch value
            pop!();
            pc = self.target(&instr)?;
          }
        }

        Opcode::Return => return Ok(pop!()),
        Opcode::ReturnWithUndefined => return Ok(Value::Undefined),
        Opcode::Throw => return Err(VmError::Uncaught(pop!())),

        other => return Err(VmError::Unsupported(other.name())),
      }
    }

    Ok(completion)
  }

  fn literal<'a>(&self, chunk: &'a Chunk, operand: &Decoded) -> Result<&'a Literal, VmError> {
    let Decoded::Literal(index) = operand else {
      return Err(VmError::InvalidLiteral(u16::MAX));
    };
    chunk.literal(*index).ok_or(VmError::InvalidLiteral(*index))
  }

  fn ident<'a>(&self, chunk: &'a Chunk, operand: &Decoded) -> Result<&'a str, VmError> {
    match self.literal(chunk, operand)? {
      Literal::Ident(name) => Ok(name),
      _ => Err(VmError::InvalidLiteral(u16::MAX)),
    }
  }

  fn target(&self, instr: &bytecode::Instr) -> Result<usize, VmError> {
    instr.target().ok_or_else(|| {
      VmError::Decode(bytecode::DecodeError::TruncatedInstruction {
        offset: instr.offset,
      })
    })
  }
}

impl Default for Vm {
  fn default() -> Self {
    Vm::new()
  }
}
