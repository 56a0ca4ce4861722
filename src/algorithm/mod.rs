use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::{Backend, CompilationUnit};
use crate::common::FftError;
use crate::kernel_call::{KernelArg, KernelCall, LaunchGeometry, Param, Stage};
use crate::program_cache::ProgramCache;
use crate::source::{KernelSource, SourceBuilder};
use crate::Precision;

pub(crate) mod bluestein;
pub(crate) mod common;
pub(crate) mod radix;
pub mod small_dft;
pub mod transpose;

/// Everything a kernel generator needs besides its own shape parameters
pub(crate) struct KernelContext<'a, B: Backend> {
    pub backend: &'a B,
    pub cache: &'a mut ProgramCache<B>,
    pub precision: Precision,
    pub fast_math: bool,
}

/// A built program with one kernel looked up from it
pub(crate) struct CompiledKernel<B: Backend> {
    pub program: Arc<B::Program>,
    pub kernel: B::Kernel,
    pub params: Vec<Param>,
}

impl<'a, B: Backend> KernelContext<'a, B> {
    pub fn new(backend: &'a B, cache: &'a mut ProgramCache<B>, precision: Precision, fast_math: bool) -> Self {
        Self {
            backend,
            cache,
            precision,
            fast_math,
        }
    }

    /// A source builder for this backend's dialect and the configured precision
    pub fn builder(&self) -> SourceBuilder {
        SourceBuilder::new(self.backend.dialect(), self.precision)
    }

    /// Builds `source`, reusing a cached program if an identical unit was built before, and looks up its entry point
    pub fn compile(
        &mut self,
        source: KernelSource,
        stage: Stage,
        fast_math: bool,
    ) -> Result<CompiledKernel<B>, FftError> {
        let options = if fast_math && self.fast_math {
            self.backend.dialect().fast_math_options()
        } else {
            ""
        };
        let unit = CompilationUnit::new(source, options, stage, self.precision);
        trace!(kernel = %unit.entry_point, options = %unit.options, "generated source:\n{}", unit.source);

        let program = match self.cache.get(&unit) {
            Some(program) => {
                debug!(kernel = %unit.entry_point, "program cache hit");
                program
            }
            None => {
                let program = self.backend.build(&unit).map_err(|e| FftError::Build {
                    kernel: unit.entry_point.clone(),
                    log: e.to_string(),
                })?;
                let program = Arc::new(program);
                self.cache.insert(&unit, &program);
                program
            }
        };

        let kernel = self
            .backend
            .kernel(&program, &unit.entry_point)
            .map_err(|e| FftError::backend(format!("looking up kernel '{}'", unit.entry_point), e))?;

        Ok(CompiledKernel {
            program,
            kernel,
            params: unit.params,
        })
    }

    /// The preferred work-group multiple of a compiled kernel
    pub fn work_group_multiple(&self, compiled: &CompiledKernel<B>) -> Result<usize, FftError> {
        let wg = self
            .backend
            .preferred_work_group_multiple(&compiled.kernel)
            .map_err(|e| FftError::backend("querying the preferred work-group multiple", e))?;
        if wg == 0 {
            return Err(FftError::InvalidGeometry(
                "backend reported a preferred work-group multiple of 0".to_string(),
            ));
        }
        Ok(wg)
    }

    /// Binds arguments and wraps everything into a kernel call
    pub fn call(
        &self,
        once: bool,
        desc: String,
        compiled: CompiledKernel<B>,
        args: Vec<KernelArg<B::Buffer>>,
        geometry: LaunchGeometry,
        stage: Stage,
    ) -> Result<KernelCall<B>, FftError> {
        debug!(once, %geometry, "{}", desc);
        KernelCall::new(
            once,
            desc,
            compiled.program,
            compiled.kernel,
            &compiled.params,
            args,
            geometry,
            stage,
        )
    }
}
