use std::fmt::Display;
use std::sync::Arc;

use crate::backend::Backend;
use crate::common::{FftError, Radix};
use crate::FftDirection;

/// The kind of a declared kernel parameter
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ParamKind {
    /// A device buffer of complex samples that the kernel only reads
    ConstBuffer,
    /// A device buffer of complex samples that the kernel writes
    Buffer,
    /// An unsigned 32-bit size or stride
    Uint,
    /// A real scalar, `real_t` on the device
    Real,
}
impl ParamKind {
    /// Short name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConstBuffer => "const buffer",
            Self::Buffer => "buffer",
            Self::Uint => "uint",
            Self::Real => "real",
        }
    }
}

/// One declared kernel parameter. Generators declare buffers first and scalars last.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Param {
    /// Identifier used in the kernel source
    pub name: String,
    /// What the kernel expects to be bound here
    pub kind: ParamKind,
}
impl Param {
    /// Declares a read-only buffer parameter
    pub fn const_buffer(name: &str) -> Self {
        Self::new(name, ParamKind::ConstBuffer)
    }
    /// Declares a writable buffer parameter
    pub fn buffer(name: &str) -> Self {
        Self::new(name, ParamKind::Buffer)
    }
    /// Declares an unsigned 32-bit parameter
    pub fn uint(name: &str) -> Self {
        Self::new(name, ParamKind::Uint)
    }
    /// Declares a real scalar parameter
    pub fn real(name: &str) -> Self {
        Self::new(name, ParamKind::Real)
    }
    fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// A typed value bound to one kernel parameter.
///
/// Real values are carried at double precision. Backends narrow them to `real_t` of the compilation unit they belong to.
#[derive(Clone, PartialEq, Debug)]
pub enum KernelArg<Buf> {
    /// A device buffer
    Buffer(Buf),
    /// An unsigned 32-bit integer
    Uint(u32),
    /// A real scalar
    Real(f64),
}
impl<Buf> KernelArg<Buf> {
    /// Short name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Buffer(_) => "buffer",
            Self::Uint(_) => "uint",
            Self::Real(_) => "real",
        }
    }

    /// Returns true if this argument can be bound to a parameter of the given kind
    pub fn matches(&self, kind: ParamKind) -> bool {
        matches!(
            (self, kind),
            (Self::Buffer(_), ParamKind::ConstBuffer)
                | (Self::Buffer(_), ParamKind::Buffer)
                | (Self::Uint(_), ParamKind::Uint)
                | (Self::Real(_), ParamKind::Real)
        )
    }
}

/// An extent of one to three axes
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct NdRange {
    sizes: [usize; 3],
    dimensions: usize,
}
impl NdRange {
    /// A one-dimensional extent
    pub fn d1(x: usize) -> Self {
        Self {
            sizes: [x, 1, 1],
            dimensions: 1,
        }
    }
    /// A two-dimensional extent
    pub fn d2(x: usize, y: usize) -> Self {
        Self {
            sizes: [x, y, 1],
            dimensions: 2,
        }
    }
    /// A three-dimensional extent
    pub fn d3(x: usize, y: usize, z: usize) -> Self {
        Self {
            sizes: [x, y, z],
            dimensions: 3,
        }
    }

    /// Number of axes
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The extent along each axis
    pub fn sizes(&self) -> &[usize] {
        &self.sizes[..self.dimensions]
    }

    /// The extent along `axis`. Axes past [`NdRange::dimensions`] have extent 1.
    pub fn get(&self, axis: usize) -> usize {
        if axis < self.dimensions {
            self.sizes[axis]
        } else {
            1
        }
    }

    /// Product of all extents
    pub fn total(&self) -> usize {
        self.sizes().iter().product()
    }
}
impl Display for NdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(")?;
        for (i, size) in self.sizes().iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", size)?;
        }
        f.write_str(")")
    }
}

/// Global and local extents of one launch.
///
/// The global extent is a multiple of the local extent along every axis. Work-items past the logical problem size are
/// masked by bounds checks inside the kernel.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct LaunchGeometry {
    global: NdRange,
    local: NdRange,
}
impl LaunchGeometry {
    /// Validates and creates a launch geometry
    pub fn new(global: NdRange, local: NdRange) -> Result<Self, FftError> {
        if global.dimensions() != local.dimensions() {
            return Err(FftError::InvalidGeometry(format!(
                "global extent {} and local extent {} have different dimensions",
                global, local
            )));
        }
        for (axis, (&g, &l)) in global.sizes().iter().zip(local.sizes()).enumerate() {
            if l == 0 || g % l != 0 {
                return Err(FftError::InvalidGeometry(format!(
                    "global extent {} is not a multiple of local extent {} along axis {}",
                    global, local, axis
                )));
            }
        }
        Ok(Self { global, local })
    }

    /// Total number of work-items along each axis
    pub fn global(&self) -> NdRange {
        self.global
    }

    /// Work-group shape
    pub fn local(&self) -> NdRange {
        self.local
    }
}
impl Display for LaunchGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "global={} local={}", self.global, self.local)
    }
}

/// What a generated kernel computes, with the shape parameters it was generated for.
///
/// The stage is the semantic identity of a compilation unit. It is carried alongside the source text so that reference
/// backends and diagnostics never need to parse generated code.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Stage {
    /// One Cooley-Tukey decimation stage of `n / radix` work-items per row
    Radix {
        /// Size of the small DFT
        radix: Radix,
        /// Product of the radices processed by earlier stages
        p: usize,
        /// Length of each row
        n: usize,
        /// Number of rows
        batch: usize,
        /// Twiddle direction
        direction: FftDirection,
    },
    /// Tiled transpose of a `width` x `height` row-major matrix
    Transpose {
        /// Row length of the input
        width: usize,
        /// Number of rows of the input
        height: usize,
        /// Edge of the square shared-memory tile
        block_size: usize,
    },
    /// Bluestein chirp table of length `n`
    BluesteinTwiddle {
        /// Length of the Bluestein factor
        n: usize,
        /// Selects the chirp sign
        direction: FftDirection,
    },
    /// Zero-padded, mirrored, conjugated chirp of convolution length `m`
    BluesteinPad {
        /// Length of the chirp table
        n: usize,
        /// Convolution length
        m: usize,
    },
    /// Radix window gather, chirp pre-multiply and zero padding into rows of `stride`
    BluesteinMulIn {
        /// Bluestein factor
        radix: usize,
        /// Product of the radices processed by earlier stages
        p: usize,
        /// Windows per row
        threads: usize,
        /// Number of rows
        batch: usize,
        /// Convolution length
        stride: usize,
        /// Selects the sign of the twiddle correction
        direction: FftDirection,
    },
    /// Spectral product with the transformed chirp kernel
    BluesteinMul {
        /// Convolution length
        stride: usize,
        /// Number of convolution rows
        rows: usize,
    },
    /// Normalization, chirp post-multiply and output scatter
    BluesteinMulOut {
        /// Bluestein factor
        radix: usize,
        /// Product of the radices processed by earlier stages
        p: usize,
        /// Windows per row
        threads: usize,
        /// Number of rows
        batch: usize,
        /// Convolution length
        stride: usize,
    },
}
impl Stage {
    /// Name of the kernel entry point generated for this stage
    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::Radix { .. } => "radix",
            Self::Transpose { .. } => "transpose",
            Self::BluesteinTwiddle { .. } => "bluestein_twiddle",
            Self::BluesteinPad { .. } => "bluestein_pad_kernel",
            Self::BluesteinMulIn { .. } => "bluestein_mul_in",
            Self::BluesteinMul { .. } => "bluestein_mul",
            Self::BluesteinMulOut { .. } => "bluestein_mul_out",
        }
    }
}

/// A single schedulable stage: a compiled program, its kernel, bound arguments and launch geometry.
///
/// The program is shared through an `Arc`, so it outlives every launch of the kernel regardless of which plan or cache
/// drops it first.
pub struct KernelCall<B: Backend> {
    once: bool,
    count: usize,
    desc: String,
    program: Arc<B::Program>,
    kernel: B::Kernel,
    args: Vec<KernelArg<B::Buffer>>,
    geometry: LaunchGeometry,
    stage: Stage,
}

impl<B: Backend> KernelCall<B> {
    /// Binds `args` to the kernel declared with `params`.
    ///
    /// Returns an error if the argument count differs from the parameter count, or if any argument's kind does not
    /// match its parameter.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        once: bool,
        desc: String,
        program: Arc<B::Program>,
        kernel: B::Kernel,
        params: &[Param],
        args: Vec<KernelArg<B::Buffer>>,
        geometry: LaunchGeometry,
        stage: Stage,
    ) -> Result<Self, FftError> {
        let entry_point = stage.entry_point();
        if params.len() != args.len() {
            return Err(FftError::ArgumentCount {
                kernel: entry_point.to_string(),
                expected: params.len(),
                got: args.len(),
            });
        }
        for (index, (param, arg)) in params.iter().zip(args.iter()).enumerate() {
            if !arg.matches(param.kind) {
                return Err(FftError::ArgumentMismatch {
                    kernel: entry_point.to_string(),
                    index,
                    name: param.name.clone(),
                    expected: param.kind.name(),
                    got: arg.kind_name(),
                });
            }
        }

        Ok(Self {
            once,
            count: 0,
            desc,
            program,
            kernel,
            args,
            geometry,
            stage,
        })
    }

    /// Returns true if this stage only depends on the problem shape, and only needs to run on the first replay
    pub fn once(&self) -> bool {
        self.once
    }
    /// Number of times this stage has been enqueued
    pub fn count(&self) -> usize {
        self.count
    }
    /// Human-readable description of the stage
    pub fn desc(&self) -> &str {
        &self.desc
    }
    /// The compiled program this call's kernel belongs to
    pub fn program(&self) -> &Arc<B::Program> {
        &self.program
    }
    /// The kernel handle
    pub fn kernel(&self) -> &B::Kernel {
        &self.kernel
    }
    /// The bound arguments, in parameter order
    pub fn args(&self) -> &[KernelArg<B::Buffer>] {
        &self.args
    }
    /// Global and local extents
    pub fn geometry(&self) -> &LaunchGeometry {
        &self.geometry
    }
    /// What this call computes
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub(crate) fn should_run(&self) -> bool {
        !(self.once && self.count > 0)
    }

    pub(crate) fn enqueue(&mut self, backend: &B) -> Result<(), FftError> {
        backend
            .enqueue(&self.kernel, &self.args, &self.geometry)
            .map_err(|e| FftError::Launch {
                stage: self.desc.clone(),
                source: Box::new(e),
            })?;
        self.count += 1;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }
}

impl<B: Backend> std::fmt::Debug for KernelCall<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCall")
            .field("once", &self.once)
            .field("count", &self.count)
            .field("desc", &self.desc)
            .field("geometry", &self.geometry)
            .field("stage", &self.stage)
            .finish()
    }
}
