//! Row-parallel iteration behind the `parallel` feature.
//!
//! Per-pixel kernels iterate rows with `(0..rows).into_par_iter()`. With the
//! feature off the same call resolves to a plain sequential iterator.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use sequential::IntoParallelIterator;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator: IntoIterator + Sized {
        fn into_par_iter(self) -> Self::IntoIter {
            self.into_iter()
        }
    }

    impl<I: IntoIterator> IntoParallelIterator for I {}
}
