//! Difference computer.
//!
//! Produces the per-sample absolute error between the decoded upload and its
//! round trip. Rows are independent, so they are processed in parallel; the
//! result does not depend on scheduling.
//!
//! Row chunks run on rayon's global pool, which every request in the process
//! shares. A thread waiting on its own chunks may steal and run chunks of a
//! concurrent request, so requests can add latency to each other here. They
//! never share buffers, and each output is written only by its own request.

use rayon::prelude::*;

use crate::buffer::{DiffBuffer, PixelBuffer};
use crate::error::ShapeMismatch;

/// Computes `|original[i] - recompressed[i]|` for every sample.
///
/// # Errors
/// Returns [`ShapeMismatch`] if the buffers differ in width, height or
/// channel count.
pub fn compute_difference(
    original: &PixelBuffer,
    recompressed: &PixelBuffer,
) -> Result<DiffBuffer, ShapeMismatch> {
    if original.shape() != recompressed.shape() {
        return Err(ShapeMismatch {
            original: original.shape(),
            recompressed: recompressed.shape(),
        });
    }

    let row_len = original.row_len();
    let mut magnitudes = vec![0u16; original.as_slice().len()];
    magnitudes
        .par_chunks_mut(row_len)
        .zip(original.as_slice().par_chunks(row_len))
        .zip(recompressed.as_slice().par_chunks(row_len))
        .for_each(|((out, a), b)| {
            for ((dst, &a), &b) in out.iter_mut().zip(a).zip(b) {
                *dst = u16::from(a.abs_diff(b));
            }
        });

    Ok(DiffBuffer::from_parts(original.shape(), magnitudes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_give_zero() {
        let a = PixelBuffer::filled(7, 5, 3, 200).unwrap();
        let diff = compute_difference(&a, &a.clone()).unwrap();
        assert!(diff.is_zero());
        assert_eq!(diff.shape(), a.shape());
    }

    #[test]
    fn absolute_difference_without_wraparound() {
        let a = PixelBuffer::new(2, 1, 3, vec![0, 255, 10, 255, 0, 10]).unwrap();
        let b = PixelBuffer::new(2, 1, 3, vec![255, 0, 12, 0, 255, 8]).unwrap();
        let diff = compute_difference(&a, &b).unwrap();
        assert_eq!(diff.as_slice(), &[255, 255, 2, 255, 255, 2]);
        assert_eq!(diff.max_magnitude(), 255);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = PixelBuffer::filled(4, 4, 3, 0).unwrap();
        let b = PixelBuffer::filled(4, 4, 1, 0).unwrap();
        let err = compute_difference(&a, &b).unwrap_err();
        assert_eq!(err.original, a.shape());
        assert_eq!(err.recompressed, b.shape());

        let c = PixelBuffer::filled(4, 5, 3, 0).unwrap();
        assert!(compute_difference(&a, &c).is_err());
    }
}
