/// Row-major byte strides for a freshly allocated array of the given shape.
pub fn compute_strides(shape: &[usize], elem_size: usize) -> Vec<isize> {
    let n = shape.len();
    let mut strides = vec![0isize; n];
    if n == 0 {
        return strides;
    }
    // The last dimension has one element's stride
    strides[n - 1] = elem_size as isize;
    // We go back from the penultimate (n-2) to the 0th
    for i in (0..n - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1].max(1) as isize;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::compute_strides;

    #[test]
    fn test_compute_strides_simple() {
        assert_eq!(compute_strides(&[], 8), Vec::<isize>::new());
        assert_eq!(compute_strides(&[5], 8), vec![8]);
        assert_eq!(compute_strides(&[2, 3], 4), vec![12, 4]);
        assert_eq!(compute_strides(&[2, 3, 4], 1), vec![12, 4, 1]);
        assert_eq!(compute_strides(&[4, 1, 5], 2), vec![10, 10, 2]);
    }
}
