mod utils;

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use core_types::{ByteOrder, DataType, Element, ViewDescriptor};
use memory::Buffer;

pub use utils::compute_strides;

/// Dynamically-typed n-dimensional operand: shared byte buffer, view
/// descriptor (offset, shape, byte strides), element type tag and byte order.
///
/// Views may alias one buffer; cloning shares storage.
#[derive(Clone)]
pub struct NdArray {
    buffer:     Arc<Buffer>,
    view:       ViewDescriptor,
    dtype:      DataType,
    byte_order: ByteOrder,
}

impl NdArray {
    /* --------------------------------------------------------------------- */
    /* Constructors                                                          */
    /* --------------------------------------------------------------------- */

    /// Allocate a contiguous native-order array of the given shape.
    pub fn empty(shape: &[usize], dtype: DataType) -> Result<Self> {
        let elem = dtype.size_in_bytes();
        let count: usize = shape.iter().product();
        let buffer = Arc::new(Buffer::allocate(count * elem)?);
        let strides = compute_strides(shape, elem);
        Ok(Self {
            buffer,
            view: ViewDescriptor::new(0, shape, &strides),
            dtype,
            byte_order: ByteOrder::native(),
        })
    }

    /// Build a view over an existing buffer with explicit offset, shape,
    /// byte strides and byte order. Every reachable element must fall inside
    /// the buffer.
    pub fn from_raw_parts(
        buffer: Arc<Buffer>,
        offset: usize,
        shape: &[usize],
        strides: &[isize],
        dtype: DataType,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        anyhow::ensure!(
            shape.len() == strides.len(),
            "shape rank {} does not match stride rank {}",
            shape.len(),
            strides.len()
        );
        let elem = dtype.size_in_bytes() as isize;
        let size: usize = shape.iter().product();
        if size > 0 {
            let mut lo = 0isize;
            let mut hi = 0isize;
            for (&d, &s) in shape.iter().zip(strides.iter()) {
                let span = (d as isize - 1) * s;
                if span < 0 {
                    lo += span;
                } else {
                    hi += span;
                }
            }
            let base = offset as isize;
            anyhow::ensure!(
                base + lo >= 0 && base + hi + elem <= buffer.len() as isize,
                "view reaches outside its buffer"
            );
        } else {
            anyhow::ensure!(offset <= buffer.len(), "view offset outside its buffer");
        }
        Ok(Self {
            buffer,
            view: ViewDescriptor::new(offset, shape, strides),
            dtype,
            byte_order,
        })
    }

    /* --------------------------------------------------------------------- */
    /* Accessors                                                             */
    /* --------------------------------------------------------------------- */

    pub fn view(&self) -> &ViewDescriptor {
        &self.view
    }

    pub fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    pub fn strides(&self) -> &[isize] {
        self.view.strides()
    }

    pub fn ndim(&self) -> usize {
        self.view.ndim
    }

    /// Total element count
    pub fn size(&self) -> usize {
        self.view.size()
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn elem_size(&self) -> usize {
        self.dtype.size_in_bytes()
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Pointer to the first element.
    pub fn data_ptr(&self) -> *mut u8 {
        unsafe { self.buffer.as_ptr().add(self.view.offset) }
    }

    /// Whether the view is a dense row-major walk over its elements.
    pub fn is_contiguous(&self) -> bool {
        self.strides() == compute_strides(self.shape(), self.elem_size()).as_slice()
    }

    /// Whether the data pointer and every stride honour the element type's
    /// natural alignment.
    pub fn is_aligned(&self) -> bool {
        let align = self.dtype.alignment();
        self.data_ptr() as usize % align == 0
            && self
                .strides()
                .iter()
                .all(|&s| s.unsigned_abs() % align == 0)
    }

    /// Gather the elements in row-major order. The array must be native
    /// byte order and tagged with `T`'s type.
    pub fn read_as<T: Element>(&self) -> Vec<T> {
        assert_eq!(T::DTYPE, self.dtype, "element type mismatch");
        assert!(self.byte_order.is_native(), "read_as needs native byte order");
        let n = self.size();
        let shape = self.shape();
        let strides = self.strides();
        let mut out = Vec::with_capacity(n);
        let mut index = vec![0usize; shape.len()];
        let mut ptr = self.data_ptr();
        for _ in 0..n {
            out.push(unsafe { (ptr as *const T).read_unaligned() });
            for d in (0..shape.len()).rev() {
                index[d] += 1;
                ptr = ptr.wrapping_offset(strides[d]);
                if index[d] < shape[d] {
                    break;
                }
                index[d] = 0;
                ptr = ptr.wrapping_offset(-(shape[d] as isize) * strides[d]);
            }
        }
        out
    }
}

/// Typed handle over an [`NdArray`], fixing the element type at compile time.
pub struct Tensor<T: Element> {
    inner:   NdArray,
    _marker: PhantomData<T>,
}

impl<T: Element> Tensor<T> {
    /// Allocate a contiguous tensor of the given shape.
    pub fn empty(shape: &[usize]) -> Result<Self> {
        Ok(Self {
            inner: NdArray::empty(shape, T::DTYPE)?,
            _marker: PhantomData,
        })
    }

    /// Allocate and fill from a row-major slice.
    pub fn from_vec(data: &[T], shape: &[usize]) -> Result<Self> {
        let count: usize = shape.iter().product();
        anyhow::ensure!(
            data.len() == count,
            "data length {} does not fill shape {:?}",
            data.len(),
            shape
        );
        let t = Self::empty(shape)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), t.inner.data_ptr(), bytes.len());
        }
        Ok(t)
    }

    /// Copy the elements out in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.read_as::<T>()
    }

    pub fn nd(&self) -> &NdArray {
        &self.inner
    }

    pub fn into_nd(self) -> NdArray {
        self.inner
    }

    pub fn shape(&self) -> &[usize] {
        self.inner.shape()
    }

    pub fn dtype(&self) -> DataType {
        self.inner.dtype()
    }
}

impl<T: Element> Clone for Tensor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> From<Tensor<T>> for NdArray {
    fn from(t: Tensor<T>) -> Self {
        t.inner
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tensor_dtype_and_view() {
        let t: Tensor<f32> = Tensor::empty(&[2, 3, 4]).unwrap();
        assert_eq!(t.dtype(), DataType::F32);
        assert_eq!(t.shape(), &[2, 3, 4]);
        // strides for [2,3,4] row-major f32 = [48,16,4] bytes
        assert_eq!(t.nd().strides(), &[48, 16, 4]);
        assert!(t.nd().is_contiguous());
        assert!(t.nd().is_aligned());
        assert!(t.nd().byte_order().is_native());
    }

    #[test]
    fn test_from_vec_and_to_vec_preserves_data_and_dtype() {
        let data = vec![1u32, 2, 3, 4];
        let t = Tensor::from_vec(&data, &[2, 2]).unwrap();
        assert_eq!(t.to_vec(), data);
        assert_eq!(t.dtype(), DataType::U32);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Tensor::from_vec(&[1.0f64, 2.0], &[3]).is_err());
    }

    #[test]
    fn zero_dim_scalar() {
        let t = Tensor::from_vec(&[7.5f64], &[]).unwrap();
        assert_eq!(t.nd().ndim(), 0);
        assert_eq!(t.nd().size(), 1);
        assert_eq!(t.to_vec(), vec![7.5]);
    }

    #[test]
    fn raw_view_bounds_are_checked() {
        let t = Tensor::from_vec(&[1.0f64, 2.0, 3.0, 4.0], &[4]).unwrap();
        let buf = t.nd().buffer().clone();
        // A 2-element view striding past the end must be rejected.
        let bad = NdArray::from_raw_parts(
            buf.clone(),
            24,
            &[2],
            &[16],
            DataType::F64,
            ByteOrder::native(),
        );
        assert!(bad.is_err());
        // Reversed view over the same storage is fine.
        let rev = NdArray::from_raw_parts(
            buf,
            24,
            &[4],
            &[-8],
            DataType::F64,
            ByteOrder::native(),
        )
        .unwrap();
        assert_eq!(rev.read_as::<f64>(), vec![4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn misaligned_view_detected() {
        let buf = Arc::new(Buffer::allocate(9 * 8).unwrap());
        let v = NdArray::from_raw_parts(
            buf,
            4,
            &[4],
            &[8],
            DataType::F64,
            ByteOrder::native(),
        )
        .unwrap();
        assert!(!v.is_aligned());
    }
}
