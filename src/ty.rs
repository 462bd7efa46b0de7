//! Static types of the language.
//!
//! Equality is structural. `Void` only ever appears as a function return type;
//! the checker rejects it everywhere else.

use std::fmt;

/// Every value slot (scalar, pointer, string reference, array element) is one
/// machine word.
pub const WORD_SIZE: i64 = 8;

/// Largest object, and largest frame, addressable with a 32-bit
/// displacement.
pub const MAX_OBJECT_SIZE: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
  Int,
  Str,
  Void,
  Pointer(Box<Type>),
  Array(Box<Type>, usize),
  Function { params: Vec<Type>, ret: Box<Type> },
}

impl Type {
  pub fn pointer_to(base: Type) -> Self {
    Self::Pointer(Box::new(base))
  }

  pub fn array_of(base: Type, len: usize) -> Self {
    Self::Array(Box::new(base), len)
  }

  pub fn function(params: Vec<Type>, ret: Type) -> Self {
    Self::Function {
      params,
      ret: Box::new(ret),
    }
  }

  pub fn is_integer(&self) -> bool {
    matches!(self, Self::Int)
  }

  pub fn is_pointer(&self) -> bool {
    matches!(self, Self::Pointer(_))
  }

  pub fn is_array(&self) -> bool {
    matches!(self, Self::Array(..))
  }

  pub fn is_void(&self) -> bool {
    matches!(self, Self::Void)
  }

  /// Types that `==`, `<` and friends accept.
  pub fn is_comparable(&self) -> bool {
    matches!(self, Self::Int | Self::Str | Self::Pointer(_))
  }

  /// Element type of a pointer or array.
  pub fn base(&self) -> Option<&Type> {
    match self {
      Self::Pointer(base) | Self::Array(base, _) => Some(base),
      _ => None,
    }
  }

  /// Bytes of storage a variable of this type occupies, or `None` when that
  /// does not fit in an `i64`.
  pub fn checked_size(&self) -> Option<i64> {
    match self {
      Self::Array(_, len) => i64::try_from(*len).ok()?.checked_mul(WORD_SIZE),
      Self::Void | Self::Function { .. } => Some(0),
      _ => Some(WORD_SIZE),
    }
  }

  /// Bytes of storage a variable of this type occupies, saturating at
  /// `i64::MAX`. The checker keeps every declared size below
  /// [`MAX_OBJECT_SIZE`].
  pub fn size(&self) -> i64 {
    self.checked_size().unwrap_or(i64::MAX)
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int => write!(f, "int"),
      Self::Str => write!(f, "string"),
      Self::Void => write!(f, "void"),
      Self::Pointer(base) => write!(f, "{base}*"),
      Self::Array(base, len) => write!(f, "{base}[{len}]"),
      Self::Function { params, ret } => {
        write!(f, "{ret}(")?;
        if params.is_empty() {
          write!(f, "void")?;
        }
        for (idx, param) in params.iter().enumerate() {
          if idx > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{param}")?;
        }
        write!(f, ")")
      }
    }
  }
}
