use bytemuck::{Pod, Zeroable};
use std::fmt;

mod cast;

pub use cast::{CastFn, Casting, SwapFn, can_cast, cast_fn, swap_fn};

include!("generated_data_types.rs");

/// Numeric kind of an element type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int,
    Uint,
    Float,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of an operand's storage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The host byte order
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(self) -> bool {
        self == Self::native()
    }

    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }
}

/// Maximum number of dimensions for a view descriptor
pub const MAX_DIMS: usize = 8;

/// Maximum number of operands one operation may carry
pub const MAX_ARGS: usize = 10;

/// Descriptor for a view into a buffer: byte offset of the first element,
/// extents, and signed byte strides.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub offset:  usize,
    pub ndim:    usize,
    pub shape:   [usize; MAX_DIMS],
    pub strides: [isize; MAX_DIMS],
}

impl ViewDescriptor {
    pub fn new(offset: usize, shape: &[usize], strides: &[isize]) -> Self {
        assert!(shape.len() == strides.len(), "shape/stride rank mismatch");
        assert!(shape.len() <= MAX_DIMS, "rank exceeds MAX_DIMS");
        let mut vd = ViewDescriptor::zeroed();
        vd.offset = offset;
        vd.ndim = shape.len();
        for (i, (&d, &s)) in shape.iter().zip(strides.iter()).enumerate() {
            vd.shape[i] = d;
            vd.strides[i] = s;
        }
        vd
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape[..self.ndim]
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides[..self.ndim]
    }

    /// Total element count of the view
    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_sizes_and_kinds() {
        assert_eq!(DataType::ALL.len(), 10);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
        assert_eq!(DataType::I16.size_in_bytes(), 2);
        assert_eq!(DataType::U32.kind(), TypeKind::Uint);
        assert_eq!(DataType::F32.kind(), TypeKind::Float);
        assert_eq!(DataType::I64.alignment(), std::mem::align_of::<i64>());
        assert_eq!(DataType::F64.to_string(), "f64");
    }

    #[test]
    fn element_dtype_tags() {
        assert_eq!(<f32 as Element>::DTYPE, DataType::F32);
        assert_eq!(<u16 as Element>::DTYPE, DataType::U16);
    }

    #[test]
    fn byte_order_swap() {
        let native = ByteOrder::native();
        assert!(native.is_native());
        assert!(!native.swapped().is_native());
        assert_eq!(native.swapped().swapped(), native);
    }

    #[test]
    fn view_descriptor_accessors() {
        let vd = ViewDescriptor::new(4, &[2, 3], &[24, 8]);
        assert_eq!(vd.shape(), &[2, 3]);
        assert_eq!(vd.strides(), &[24, 8]);
        assert_eq!(vd.size(), 6);
        assert_eq!(vd.offset, 4);
    }
}
