#![warn(missing_docs)]

//! RustFFT-GPU generates the device kernels and the execution plan needed to compute FFTs on a GPU-like compute device.
//!
//! The crate never talks to a device API directly. Instead, the caller provides an implementation of the
//! [`Backend`](crate::Backend) trait, which knows how to compile a [`CompilationUnit`](crate::CompilationUnit),
//! look up kernels, and enqueue launches on a single in-order command queue. RustFFT-GPU takes care of the rest:
//!
//! * Decomposing the transform length into small radices, routing any leftover factor through Bluestein's algorithm
//! * Emitting OpenCL C or CUDA C source for every stage, in single or double precision
//! * Computing work-group aligned launch geometry, and binding typed, validated kernel arguments
//! * Collecting everything into an [`ExecutionPlan`](crate::ExecutionPlan) which replays its stages strictly in order
//!
//! ### Usage
//!
//! ```ignore
//! use rustfft_gpu::{FftDirection, FftPlanner, PlanBuffers, PlannerConfig};
//!
//! let mut planner = FftPlanner::new(PlannerConfig::default());
//! let strategy = planner.strategy_1d(1200, 1, FftDirection::Forward)?;
//!
//! // The planner never allocates device memory. Ask the strategy what it needs, then allocate it yourself.
//! let requirements = strategy.buffer_requirements();
//! let buffers = allocate_buffers(&backend, &requirements);
//!
//! let mut plan = planner.build(&backend, &strategy, &buffers)?;
//! plan.execute(&backend)?;
//! ```
//!
//! ### Normalization
//!
//! Like RustFFT, RustFFT-GPU does not normalize outputs. Running a forward FFT followed by an inverse FFT on the same
//! data multiplies every element by `len`.
//!
//! ### Choosing radices
//!
//! By default, lengths are split into powers of 2, 3 and 5, with each stage computing a small DFT of size at most 16.
//! Any other prime factor is handled by a single Bluestein stage, which convolves through a power-of-two FFT.
//! See [`PlannerConfig`](crate::PlannerConfig) to change the set of accepted radix primes.

use std::fmt::Display;

mod algorithm;
mod backend;
mod common;
mod execution;
mod kernel_call;
mod math_utils;
mod plan;
mod program_cache;
mod source;
mod twiddles;

#[cfg(test)]
mod test_utils;

pub use crate::algorithm::small_dft::{is_supported_radix, MAX_RADIX};
pub use crate::algorithm::transpose::block_size as transpose_block_size;
pub use crate::backend::{Backend, CompilationUnit, DeviceInfo};
pub use crate::common::{FftError, Radix};
pub use crate::execution::ExecutionPlan;
pub use crate::kernel_call::{KernelArg, KernelCall, LaunchGeometry, NdRange, Param, ParamKind, Stage};
pub use crate::math_utils::{alignup, bluestein_conv_len};
pub use crate::plan::{
    BluesteinBuffers, BluesteinRequirements, BufferRequirements, Factorization, FftPlanner,
    PlanBuffers, PlannerConfig, Strategy,
};
pub use crate::source::{Dialect, KernelSource, SourceBuilder};
pub use crate::twiddles::{chirp, compute_twiddle};

/// Re-export of the `num_complex` crate, so that callers can build host-side signals without a separate dependency
pub use num_complex;

/// Represents a FFT direction, IE a forward FFT or an inverse FFT
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum FftDirection {
    /// Forward FFT, with twiddle factors `exp(-2 pi i k / n)`
    Forward,
    /// Inverse FFT, with twiddle factors `exp(2 pi i k / n)`. Not normalized.
    Inverse,
}
impl FftDirection {
    /// Returns the opposite direction of `self`.
    ///
    ///  - If `self` is `FftDirection::Forward`, returns `FftDirection::Inverse`
    ///  - If `self` is `FftDirection::Inverse`, returns `FftDirection::Forward`
    #[inline]
    pub fn opposite_direction(&self) -> FftDirection {
        match self {
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }

    /// Returns true if `self` is `FftDirection::Inverse`
    #[inline]
    pub fn is_inverse(&self) -> bool {
        *self == Self::Inverse
    }

    /// The sign of the exponent used by the Bluestein chirp, both in the chirp table and in the chirp pre-multiply.
    #[inline]
    pub fn chirp_sign(&self) -> f64 {
        match self {
            Self::Forward => -1.0,
            Self::Inverse => 1.0,
        }
    }
}
impl Display for FftDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => f.write_str("Forward"),
            Self::Inverse => f.write_str("Inverse"),
        }
    }
}

/// The width of each real component of the complex samples processed on the device.
///
/// Precision is a generation-time choice: it changes the emitted type aliases, the twiddle evaluation strategy,
/// and the type of real-valued kernel arguments.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Precision {
    /// 32-bit components. Twiddles are evaluated with fast native intrinsics.
    Single,
    /// 64-bit components. Twiddles are evaluated with a combined `sincos` for accuracy.
    Double,
}
impl Precision {
    /// The device type name of a single real component
    pub fn real_type(&self) -> &'static str {
        match self {
            Self::Single => "float",
            Self::Double => "double",
        }
    }

    /// The device type name of a complex sample
    pub fn complex_type(&self) -> &'static str {
        match self {
            Self::Single => "float2",
            Self::Double => "double2",
        }
    }

    /// Size in bytes of one complex sample on the device
    pub fn complex_size(&self) -> usize {
        match self {
            Self::Single => 2 * std::mem::size_of::<f32>(),
            Self::Double => 2 * std::mem::size_of::<f64>(),
        }
    }
}
impl Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.real_type())
    }
}
