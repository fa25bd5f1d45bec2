//! Row-parallel iteration with or without rayon.
//!
//! Stages iterate over raster rows with `(0..rows).into_par_iter()`. With
//! the `parallel` feature this is rayon's parallel iterator; without it the
//! same call falls back to a plain sequential iterator, so per-cell stages
//! compile unchanged in both builds.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// `into_par_iter()` as a synonym for `into_iter()`
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
