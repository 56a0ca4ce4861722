use crate::kernel_call::{KernelArg, LaunchGeometry, Param, Stage};
use crate::source::{Dialect, KernelSource};
use crate::Precision;

/// Device limits the generators need to size shared-memory tiles
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct DeviceInfo {
    /// Bytes of shared (local) memory available to one work-group
    pub local_mem_size: usize,
    /// Largest number of work-items in one work-group
    pub max_work_group_size: usize,
}

/// Everything a backend needs to compile one generated kernel.
#[derive(Clone, PartialEq, Debug)]
pub struct CompilationUnit {
    /// Full source text, preamble included
    pub source: String,
    /// Compiler flags. Empty if the unit has no special requirements.
    pub options: String,
    /// Name of the kernel entry point
    pub entry_point: String,
    /// The entry point's parameters, in declaration order
    pub params: Vec<Param>,
    /// What the kernel computes
    pub stage: Stage,
    /// Width of `real_t` in this unit. Real-valued kernel arguments must be narrowed to it.
    pub precision: Precision,
}
impl CompilationUnit {
    pub(crate) fn new(source: KernelSource, options: &str, stage: Stage, precision: Precision) -> Self {
        Self {
            source: source.text,
            options: options.to_string(),
            entry_point: source.entry_point,
            params: source.params,
            stage,
            precision,
        }
    }
}

/// A compute device reached through a single in-order command queue.
///
/// Implementations wrap a device API (an OpenCL context and queue, a CUDA context and stream, ...). RustFFT-GPU
/// only generates source and launch descriptions: it never allocates device memory, and it relies on `enqueue`
/// executing launches in submission order.
///
/// ~~~
/// use rustfft_gpu::{Backend, CompilationUnit, DeviceInfo, Dialect, KernelArg, LaunchGeometry};
///
/// #[derive(Debug)]
/// struct NoDevice;
/// impl std::fmt::Display for NoDevice {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("no device")
///     }
/// }
/// impl std::error::Error for NoDevice {}
///
/// struct Offline;
/// impl Backend for Offline {
///     type Program = String;
///     type Kernel = String;
///     type Buffer = u32;
///     type Error = NoDevice;
///
///     fn dialect(&self) -> Dialect { Dialect::Cuda }
///     fn device_info(&self) -> DeviceInfo {
///         DeviceInfo { local_mem_size: 48 * 1024, max_work_group_size: 1024 }
///     }
///     fn build(&self, unit: &CompilationUnit) -> Result<String, NoDevice> { Ok(unit.source.clone()) }
///     fn kernel(&self, _: &String, name: &str) -> Result<String, NoDevice> { Ok(name.to_string()) }
///     fn preferred_work_group_multiple(&self, _: &String) -> Result<usize, NoDevice> { Ok(32) }
///     fn enqueue(&self, _: &String, _: &[KernelArg<u32>], _: &LaunchGeometry) -> Result<(), NoDevice> {
///         Err(NoDevice)
///     }
/// }
/// ~~~
pub trait Backend {
    /// A compiled program
    type Program;
    /// A handle to one kernel entry point of a program
    type Kernel;
    /// A handle to a device buffer of complex samples
    type Buffer: Clone;
    /// The device API's error type
    type Error: std::error::Error + Send + Sync + 'static;

    /// The source dialect this backend compiles
    fn dialect(&self) -> Dialect;

    /// Device limits used to size shared-memory tiles
    fn device_info(&self) -> DeviceInfo;

    /// Compiles a unit. On failure, the error's `Display` output should carry the compiler's diagnostic log.
    fn build(&self, unit: &CompilationUnit) -> Result<Self::Program, Self::Error>;

    /// Looks up a kernel entry point by name
    fn kernel(&self, program: &Self::Program, name: &str) -> Result<Self::Kernel, Self::Error>;

    /// The work-group size multiple the device prefers for this kernel
    fn preferred_work_group_multiple(&self, kernel: &Self::Kernel) -> Result<usize, Self::Error>;

    /// Binds `args` in order and enqueues one launch
    fn enqueue(
        &self,
        kernel: &Self::Kernel,
        args: &[KernelArg<Self::Buffer>],
        geometry: &LaunchGeometry,
    ) -> Result<(), Self::Error>;
}
