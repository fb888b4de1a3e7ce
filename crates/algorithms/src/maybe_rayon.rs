//! Feature-level parallelism switch.
//!
//! With the `parallel` feature, `into_par_iter` is rayon's and features are
//! reduced on the global thread pool. Without it, the same call yields an
//! ordinary iterator so [`zonal_stats_par`](crate::statistics::zonal_stats_par)
//! still compiles and runs one feature at a time.

#[cfg(feature = "parallel")]
pub use rayon::iter::{IntoParallelIterator, ParallelIterator};

#[cfg(not(feature = "parallel"))]
pub use serial::IntoParallelIterator;

#[cfg(not(feature = "parallel"))]
mod serial {
    /// `into_par_iter` resolving to `into_iter`; the rest of the chain uses
    /// plain `Iterator` adapters.
    pub trait IntoParallelIterator: IntoIterator + Sized {
        fn into_par_iter(self) -> Self::IntoIter {
            self.into_iter()
        }
    }

    impl<I: IntoIterator> IntoParallelIterator for I {}
}
