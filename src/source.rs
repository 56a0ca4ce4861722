use std::fmt::{Display, Write};

use crate::kernel_call::{Param, ParamKind};
use crate::Precision;

/// The device language a backend compiles.
///
/// The two dialects differ in address-space qualifiers, in the names of the thread-index built-ins and math intrinsics,
/// and in how shared memory and barriers are spelled. Every generator asks the dialect for these fragments
/// instead of branching on the backend itself.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Dialect {
    /// OpenCL C
    OpenCl,
    /// CUDA C, compiled at runtime (NVRTC or equivalent)
    Cuda,
}

impl Dialect {
    /// Prefix of a kernel entry point declaration
    pub fn kernel_prefix(&self) -> &'static str {
        match self {
            Self::OpenCl => "kernel void",
            Self::Cuda => "extern \"C\" __global__ void",
        }
    }

    /// Declaration of a single kernel parameter of the given kind
    pub fn parameter(&self, kind: ParamKind, name: &str) -> String {
        match (self, kind) {
            (Self::OpenCl, ParamKind::ConstBuffer) => format!("global const real2_t * {}", name),
            (Self::OpenCl, ParamKind::Buffer) => format!("global real2_t * {}", name),
            (Self::OpenCl, ParamKind::Uint) => format!("uint {}", name),
            (Self::Cuda, ParamKind::ConstBuffer) => format!("const real2_t * {}", name),
            (Self::Cuda, ParamKind::Buffer) => format!("real2_t * {}", name),
            (Self::Cuda, ParamKind::Uint) => format!("unsigned int {}", name),
            (_, ParamKind::Real) => format!("real_t {}", name),
        }
    }

    /// Expression for the global work-item index along `axis`
    pub fn global_id(&self, axis: usize) -> String {
        match self {
            Self::OpenCl => format!("get_global_id({})", axis),
            Self::Cuda => {
                let d = cuda_axis(axis);
                format!("((size_t)blockIdx.{d} * blockDim.{d} + threadIdx.{d})", d = d)
            }
        }
    }

    /// Expression for the total number of work-items along `axis`
    pub fn global_size(&self, axis: usize) -> String {
        match self {
            Self::OpenCl => format!("get_global_size({})", axis),
            Self::Cuda => {
                let d = cuda_axis(axis);
                format!("((size_t)gridDim.{d} * blockDim.{d})", d = d)
            }
        }
    }

    /// Expression for the work-item index inside its work-group along `axis`
    pub fn local_id(&self, axis: usize) -> String {
        match self {
            Self::OpenCl => format!("get_local_id({})", axis),
            Self::Cuda => format!("threadIdx.{}", cuda_axis(axis)),
        }
    }

    /// Expression for the work-group index along `axis`
    pub fn group_id(&self, axis: usize) -> String {
        match self {
            Self::OpenCl => format!("get_group_id({})", axis),
            Self::Cuda => format!("blockIdx.{}", cuda_axis(axis)),
        }
    }

    /// Statement that waits until every work-item of the group has written its shared memory
    pub fn barrier(&self) -> &'static str {
        match self {
            Self::OpenCl => "barrier(CLK_LOCAL_MEM_FENCE);",
            Self::Cuda => "__syncthreads();",
        }
    }

    /// Qualifier for arrays shared by a work-group
    pub fn shared_qualifier(&self) -> &'static str {
        match self {
            Self::OpenCl => "local",
            Self::Cuda => "__shared__",
        }
    }

    /// An unsigned integer type at least 64 bits wide
    pub fn wide_uint(&self) -> &'static str {
        match self {
            Self::OpenCl => "ulong",
            Self::Cuda => "unsigned long long",
        }
    }

    /// Compiler flags that request relaxed, fast floating point math
    pub fn fast_math_options(&self) -> &'static str {
        match self {
            Self::OpenCl => "-cl-mad-enable -cl-fast-relaxed-math",
            Self::Cuda => "--use_fast_math",
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenCl => f.write_str("OpenCL"),
            Self::Cuda => f.write_str("CUDA"),
        }
    }
}

fn cuda_axis(axis: usize) -> char {
    match axis {
        0 => 'x',
        1 => 'y',
        2 => 'z',
        _ => panic!("CUDA launches have at most 3 axes, got axis {}", axis),
    }
}

/// Formats a real constant so that it round-trips exactly through the device compiler
pub(crate) fn real_literal(value: f64) -> String {
    format!("(real_t){:?}", value)
}

/// Generated source for one compilation unit, with the parameter list of its kernel entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    /// Full source text
    pub text: String,
    /// Name of the kernel entry point
    pub entry_point: String,
    /// Declared kernel parameters, in order
    pub params: Vec<Param>,
}

/// Structured emitter for kernel source text.
///
/// Scopes are opened through closures, so braces and indentation always balance. A builder is consumed by
/// [`SourceBuilder::kernel`], which emits the entry point and returns the finished [`KernelSource`].
#[derive(Debug)]
pub struct SourceBuilder {
    dialect: Dialect,
    precision: Precision,
    text: String,
    depth: usize,
}

impl SourceBuilder {
    /// Creates an empty builder for the given dialect and precision
    pub fn new(dialect: Dialect, precision: Precision) -> Self {
        Self {
            dialect,
            precision,
            text: String::new(),
            depth: 0,
        }
    }

    /// The dialect this builder emits
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The precision this builder emits
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Emits a line at column zero, for preprocessor directives and type aliases
    pub fn directive(&mut self, text: impl AsRef<str>) -> &mut Self {
        self.text.push_str(text.as_ref());
        self.text.push('\n');
        self
    }

    /// Emits one statement at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for _ in 0..self.depth {
            self.text.push_str("    ");
        }
        self.text.push_str(text.as_ref());
        self.text.push('\n');
        self
    }

    /// Emits `header`, then the statements produced by `body` inside a braced scope
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.line(header);
        self.scope(body)
    }

    /// Emits the statements produced by `body` inside a braced scope
    pub fn scope(&mut self, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.line("{");
        self.depth += 1;
        body(self);
        self.depth -= 1;
        self.line("}")
    }

    /// Emits a device helper function. `params` are `(type, name)` pairs.
    pub fn function(
        &mut self,
        return_type: &str,
        name: &str,
        params: &[(&str, &str)],
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let mut header = String::new();
        let _ = write!(header, "DEVICE {} {}(", return_type, name);
        for (i, (ty, param)) in params.iter().enumerate() {
            if i != 0 {
                header.push_str(", ");
            }
            let _ = write!(header, "{} {}", ty, param);
        }
        header.push(')');
        self.block(header, body)
    }

    /// Declares a work-group shared array of complex samples
    pub fn shared_array(&mut self, name: &str, len: usize) -> &mut Self {
        let statement = format!("{} real2_t {}[{}];", self.dialect.shared_qualifier(), name, len);
        self.line(statement)
    }

    /// Emits a work-group barrier on shared memory
    pub fn barrier(&mut self) -> &mut Self {
        let statement = self.dialect.barrier();
        self.line(statement)
    }

    /// Expression for the global work-item index along `axis`
    pub fn global_id(&self, axis: usize) -> String {
        self.dialect.global_id(axis)
    }

    /// Expression for the total number of work-items along `axis`
    pub fn global_size(&self, axis: usize) -> String {
        self.dialect.global_size(axis)
    }

    /// Expression for the local work-item index along `axis`
    pub fn local_id(&self, axis: usize) -> String {
        self.dialect.local_id(axis)
    }

    /// Expression for the work-group index along `axis`
    pub fn group_id(&self, axis: usize) -> String {
        self.dialect.group_id(axis)
    }

    /// Emits the kernel entry point and finishes the compilation unit
    pub fn kernel(mut self, name: &str, params: Vec<Param>, body: impl FnOnce(&mut Self)) -> KernelSource {
        let declarations: Vec<String> = params
            .iter()
            .map(|param| self.dialect.parameter(param.kind, &param.name))
            .collect();
        let header = format!("{} {}({})", self.dialect.kernel_prefix(), name, declarations.join(", "));
        self.block(header, body);

        assert_eq!(self.depth, 0, "unbalanced scopes in generated kernel '{}'", name);
        KernelSource {
            text: self.text,
            entry_point: name.to_string(),
            params,
        }
    }
}
