//! Bridging between Rust types and transport element kinds
//!
//! Transfers move buffers of primitive numeric elements. The [`Equivalence`]
//! trait maps each supported Rust type onto its [`ElementKind`] tag, and the
//! [`Buffer`]/[`BufferMut`] traits give the transfer path a uniform view of a
//! typed buffer: its element kind, its element count, and its contents as raw
//! bytes. The set of element kinds is closed; `Equivalence` is sealed so no
//! type outside it can reach the byte-level path.

use std::fmt;
use std::mem;
use std::slice;

use conv::ConvUtil;

use crate::Count;

/// Datatype traits
pub mod traits {
    pub use super::{Buffer, BufferMut, Equivalence};
}

/// The closed set of element kinds the transfer path understands.
///
/// Each kind fixes the width of a single element; sender and receiver of a
/// message must agree on the kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// Single precision floating point number
    Float32,
    /// Double precision floating point number
    Float64,
}

impl ElementKind {
    /// The width in bytes of a single element of this kind.
    pub const fn width(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::UInt8 => 1,
            ElementKind::Int16 | ElementKind::UInt16 => 2,
            ElementKind::Int32 | ElementKind::UInt32 | ElementKind::Float32 => 4,
            ElementKind::Int64 | ElementKind::UInt64 | ElementKind::Float64 => 8,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Int8 => "i8",
            ElementKind::Int16 => "i16",
            ElementKind::Int32 => "i32",
            ElementKind::Int64 => "i64",
            ElementKind::UInt8 => "u8",
            ElementKind::UInt16 => "u16",
            ElementKind::UInt32 => "u32",
            ElementKind::UInt64 => "u64",
            ElementKind::Float32 => "f32",
            ElementKind::Float64 => "f64",
        };
        f.write_str(name)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust type that corresponds to exactly one element kind.
///
/// Sealed: the implementations below cover every primitive the transfer path
/// supports, and they are the only ones. This closure is what makes the raw
/// byte views in [`Buffer`] sound, since all implementors are plain old data
/// with no padding and no invalid bit patterns.
pub trait Equivalence: sealed::Sealed + Copy {
    /// The element kind equivalent to this type.
    fn element_kind() -> ElementKind;
}

macro_rules! equivalent_element {
    ($rust_type:ty, $kind:ident) => {
        impl sealed::Sealed for $rust_type {}

        impl Equivalence for $rust_type {
            fn element_kind() -> ElementKind {
                ElementKind::$kind
            }
        }
    };
}

equivalent_element!(i8, Int8);
equivalent_element!(i16, Int16);
equivalent_element!(i32, Int32);
equivalent_element!(i64, Int64);
equivalent_element!(u8, UInt8);
equivalent_element!(u16, UInt16);
equivalent_element!(u32, UInt32);
equivalent_element!(u64, UInt64);
equivalent_element!(f32, Float32);
equivalent_element!(f64, Float64);

#[cfg(target_pointer_width = "32")]
equivalent_element!(usize, UInt32);
#[cfg(target_pointer_width = "32")]
equivalent_element!(isize, Int32);

#[cfg(target_pointer_width = "64")]
equivalent_element!(usize, UInt64);
#[cfg(target_pointer_width = "64")]
equivalent_element!(isize, Int64);

/// A buffer that can be sent: an element kind, an element count, and the
/// contents as raw bytes.
pub trait Buffer {
    /// The element kind of the buffer's contents.
    fn element_kind(&self) -> ElementKind;

    /// The number of elements in the buffer.
    fn count(&self) -> Count;

    /// The contents as raw bytes.
    fn as_bytes(&self) -> &[u8];
}

/// A buffer that can also be received into.
pub trait BufferMut: Buffer {
    /// The contents as mutable raw bytes.
    fn as_bytes_mut(&mut self) -> &mut [u8];
}

impl<T> Buffer for [T]
where
    T: Equivalence,
{
    fn element_kind(&self) -> ElementKind {
        T::element_kind()
    }

    fn count(&self) -> Count {
        self.len()
            .value_as()
            .expect("Buffer length exceeds the range of Count.")
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: Equivalence is sealed to primitive numeric types, which have
        // no padding and no invalid bit patterns.
        unsafe { slice::from_raw_parts(self.as_ptr().cast(), mem::size_of_val(self)) }
    }
}

impl<T> BufferMut for [T]
where
    T: Equivalence,
{
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `Buffer for [T]`; writing arbitrary bytes cannot produce
        // an invalid element either.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr().cast(), mem::size_of_val(self)) }
    }
}

impl<T> Buffer for Vec<T>
where
    T: Equivalence,
{
    fn element_kind(&self) -> ElementKind {
        T::element_kind()
    }

    fn count(&self) -> Count {
        self.as_slice().count()
    }

    fn as_bytes(&self) -> &[u8] {
        self.as_slice().as_bytes()
    }
}

impl<T> BufferMut for Vec<T>
where
    T: Equivalence,
{
    fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice().as_bytes_mut()
    }
}
