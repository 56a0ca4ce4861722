use std::fmt::Display;

use tracing::{debug, info};

use crate::algorithm::bluestein::{bluestein_mul, bluestein_mul_in, bluestein_mul_out, bluestein_pad_kernel, bluestein_twiddle};
use crate::algorithm::radix::radix_kernel;
use crate::algorithm::small_dft::MAX_RADIX;
use crate::algorithm::transpose::transpose_kernel;
use crate::algorithm::KernelContext;
use crate::backend::Backend;
use crate::common::{FftError, Radix};
use crate::execution::ExecutionPlan;
use crate::kernel_call::KernelCall;
use crate::math_utils::{self, bluestein_conv_len};
use crate::program_cache::ProgramCache;
use crate::{FftDirection, Precision};

/// Settings that control how the planner decomposes lengths and generates kernels.
///
/// ```
/// use rustfft_gpu::{PlannerConfig, Precision};
///
/// let config = PlannerConfig::default()
///     .with_precision(Precision::Double)
///     .with_radix_primes(vec![2, 3, 5, 7]);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Width of each real component on the device
    pub precision: Precision,
    /// Primes that are folded into radix stages. Every other prime factor goes through Bluestein's algorithm.
    /// Must contain 2, since Bluestein's convolution length is a power of two.
    pub radix_primes: Vec<usize>,
    /// Largest radix a single stage may compute
    pub max_radix: usize,
    /// Upper bound on the transpose tile edge. Must be a power of two.
    pub transpose_block_cap: usize,
    /// Whether radix stages request relaxed floating point math from the device compiler
    pub fast_math: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            precision: Precision::Single,
            radix_primes: vec![2, 3, 5],
            max_radix: MAX_RADIX,
            transpose_block_cap: 128,
            fast_math: true,
        }
    }
}

impl PlannerConfig {
    /// Sets the device precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }
    /// Sets the primes that are folded into radix stages
    pub fn with_radix_primes(mut self, radix_primes: Vec<usize>) -> Self {
        self.radix_primes = radix_primes;
        self
    }
    /// Sets the largest radix a single stage may compute
    pub fn with_max_radix(mut self, max_radix: usize) -> Self {
        self.max_radix = max_radix;
        self
    }
    /// Sets the upper bound on the transpose tile edge
    pub fn with_transpose_block_cap(mut self, transpose_block_cap: usize) -> Self {
        self.transpose_block_cap = transpose_block_cap;
        self
    }
    /// Enables or disables fast math compiler flags
    pub fn with_fast_math(mut self, fast_math: bool) -> Self {
        self.fast_math = fast_math;
        self
    }

    /// Checks that the configuration can plan every length
    pub fn validate(&self) -> Result<(), FftError> {
        if !(2..=MAX_RADIX).contains(&self.max_radix) {
            return Err(FftError::InvalidConfig(format!(
                "max_radix must be between 2 and {}, got {}",
                MAX_RADIX, self.max_radix
            )));
        }
        if !self.radix_primes.contains(&2) {
            return Err(FftError::InvalidConfig(
                "radix_primes must contain 2".to_string(),
            ));
        }
        for &prime in &self.radix_primes {
            if !primal_check::miller_rabin(prime as u64) {
                return Err(FftError::InvalidConfig(format!(
                    "radix prime {} is not prime",
                    prime
                )));
            }
            if prime > self.max_radix {
                return Err(FftError::InvalidConfig(format!(
                    "radix prime {} is larger than max_radix {}",
                    prime, self.max_radix
                )));
            }
        }
        if !self.transpose_block_cap.is_power_of_two() {
            return Err(FftError::InvalidConfig(format!(
                "transpose_block_cap must be a power of two, got {}",
                self.transpose_block_cap
            )));
        }
        Ok(())
    }
}

/// How one transform length is split into stages
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Factorization {
    len: usize,
    radices: Vec<Radix>,
    bluestein: Option<usize>,
}

impl Factorization {
    /// The transform length
    pub fn len(&self) -> usize {
        self.len
    }

    /// The radix stages, in execution order
    pub fn radices(&self) -> &[Radix] {
        &self.radices
    }

    /// The factor handled by Bluestein's algorithm, if any. It runs after every radix stage.
    pub fn bluestein(&self) -> Option<usize> {
        self.bluestein
    }

    /// The convolution length of the Bluestein stage, if any
    pub fn conv_len(&self) -> Option<usize> {
        self.bluestein.map(bluestein_conv_len)
    }

    /// Number of outer stages. The Bluestein pipeline counts as one stage.
    pub fn stage_count(&self) -> usize {
        self.radices.len() + usize::from(self.bluestein.is_some())
    }
}

impl Display for Factorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = [", self.len)?;
        for (i, radix) in self.radices.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", radix)?;
        }
        f.write_str("]")?;
        if let Some(factor) = self.bluestein {
            write!(f, " + bluestein({})", factor)?;
        }
        Ok(())
    }
}

/// The stages a transform will run, decided before anything is generated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// `batch` contiguous rows of length `factorization.len()`
    OneD {
        /// Number of rows
        batch: usize,
        /// Transform direction
        direction: FftDirection,
        /// Decomposition of the row length
        factorization: Factorization,
    },
    /// A `height` x `width` row-major matrix: rows, transpose, columns, transpose back
    TwoD {
        /// Transform direction
        direction: FftDirection,
        /// Decomposition of `width`
        rows: Factorization,
        /// Decomposition of `height`
        columns: Factorization,
    },
}

impl Strategy {
    /// The scratch buffers the caller must allocate before building a plan for this strategy
    pub fn buffer_requirements(&self) -> BufferRequirements {
        match self {
            Self::OneD {
                batch,
                factorization,
                ..
            } => {
                let len = factorization.len() * batch;
                BufferRequirements {
                    len,
                    ping: (factorization.stage_count() >= 2).then(|| len),
                    pong: None,
                    bluestein: BluesteinRequirements::for_pass(factorization, *batch)
                        .into_iter()
                        .collect(),
                }
            }
            Self::TwoD { rows, columns, .. } => {
                let (width, height) = (rows.len(), columns.len());
                let len = width * height;
                BufferRequirements {
                    len,
                    ping: Some(len),
                    pong: (columns.stage_count() >= 2).then(|| len),
                    bluestein: BluesteinRequirements::for_pass(rows, height)
                        .into_iter()
                        .chain(BluesteinRequirements::for_pass(columns, width))
                        .collect(),
                }
            }
        }
    }
}

/// Sizes, in complex samples, of the buffers a plan needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferRequirements {
    /// Length of the input and output buffers
    pub len: usize,
    /// Length of the first scratch buffer, if one is needed
    pub ping: Option<usize>,
    /// Length of the second scratch buffer, if one is needed
    pub pong: Option<usize>,
    /// One entry per Bluestein stage, in plan order
    pub bluestein: Vec<BluesteinRequirements>,
}

/// Scratch sizes of one Bluestein stage
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BluesteinRequirements {
    /// The Bluestein factor
    pub len: usize,
    /// The power-of-two convolution length
    pub conv_len: usize,
    /// Number of convolutions computed per launch
    pub rows: usize,
}

impl BluesteinRequirements {
    fn for_pass(factorization: &Factorization, batch: usize) -> Option<Self> {
        factorization.bluestein().map(|len| Self {
            len,
            conv_len: bluestein_conv_len(len),
            rows: factorization.len() / len * batch,
        })
    }

    /// Length of the chirp table
    pub fn chirp_len(&self) -> usize {
        self.len
    }
    /// Length of each of the two convolution kernel buffers
    pub fn kernel_len(&self) -> usize {
        self.conv_len
    }
    /// Length of each of the two convolution work buffers
    pub fn work_len(&self) -> usize {
        self.conv_len * self.rows
    }
}

/// The device buffers a plan binds to. The planner never allocates, it only records these handles in kernel arguments.
#[derive(Clone, Debug)]
pub struct PlanBuffers<Buf> {
    /// Read by the first stage. Never written.
    pub input: Buf,
    /// Holds the result after the last stage
    pub output: Buf,
    /// First scratch buffer
    pub ping: Option<Buf>,
    /// Second scratch buffer
    pub pong: Option<Buf>,
    /// Bluestein scratch, one entry per Bluestein stage in plan order
    pub bluestein: Vec<BluesteinBuffers<Buf>>,
}

impl<Buf> PlanBuffers<Buf> {
    /// Creates a buffer set with no scratch buffers
    pub fn new(input: Buf, output: Buf) -> Self {
        Self {
            input,
            output,
            ping: None,
            pong: None,
            bluestein: Vec::new(),
        }
    }
}

/// Scratch buffers of one Bluestein stage
#[derive(Clone, Debug)]
pub struct BluesteinBuffers<Buf> {
    /// Chirp table, [`BluesteinRequirements::chirp_len`] samples
    pub chirp: Buf,
    /// Convolution kernel ping-pong pair, [`BluesteinRequirements::kernel_len`] samples each
    pub kernel_a: Buf,
    /// See `kernel_a`
    pub kernel_b: Buf,
    /// Convolution data ping-pong pair, [`BluesteinRequirements::work_len`] samples each
    pub work_a: Buf,
    /// See `work_a`
    pub work_b: Buf,
}

/// The FFT planner decomposes transform lengths, generates the kernels for every stage and collects them into an
/// [`ExecutionPlan`].
///
/// Compiled programs are cached by source text, so repeated plans of the same shape, and repeated stages inside one
/// plan, compile only once.
///
/// ~~~ignore
/// let mut planner = FftPlanner::new(PlannerConfig::default());
/// let strategy = planner.strategy_1d(1234, 1, FftDirection::Forward)?;
/// let buffers = allocate(&backend, &strategy.buffer_requirements());
/// let mut plan = planner.build(&backend, &strategy, &buffers)?;
/// plan.execute(&backend)?;
/// ~~~
pub struct FftPlanner<B: Backend> {
    config: PlannerConfig,
    cache: ProgramCache<B>,
}

impl<B: Backend> FftPlanner<B> {
    /// Creates a new planner. The configuration is validated when the first strategy is requested.
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            cache: ProgramCache::new(),
        }
    }

    /// The planner's configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Number of distinct programs built so far
    pub fn cached_programs(&self) -> usize {
        self.cache.len()
    }

    /// Splits `len` into radix stages, and a Bluestein factor for the primes outside the configured radix set.
    ///
    /// Each accepted prime is grouped into the largest powers that do not exceed `max_radix`, and the stages are ordered
    /// from the largest radix to the smallest. The product of the radices and the Bluestein factor is always `len`.
    pub fn factor(&self, len: usize) -> Result<Factorization, FftError> {
        self.config.validate()?;
        if len == 0 {
            return Err(FftError::ZeroLength);
        }

        let mut radices = Vec::new();
        let mut bluestein = 1;
        if len > 1 {
            for factor in math_utils::prime_factors(len) {
                if self.config.radix_primes.contains(&factor.value) {
                    let mut max_exponent = 1;
                    while factor.value.pow(max_exponent + 1) <= self.config.max_radix {
                        max_exponent += 1;
                    }
                    let mut remaining = factor.count;
                    while remaining > 0 {
                        let exponent = remaining.min(max_exponent);
                        radices.push(Radix::new(factor.value, exponent));
                        remaining -= exponent;
                    }
                } else {
                    bluestein *= factor.value.pow(factor.count);
                }
            }
        }
        radices.sort_by(|a, b| b.value.cmp(&a.value));

        let factorization = Factorization {
            len,
            radices,
            bluestein: (bluestein > 1).then(|| bluestein),
        };
        debug!(%factorization, conv_len = ?factorization.conv_len(), "factorized");
        Ok(factorization)
    }

    /// Plans `batch` independent transforms of length `len`, stored contiguously
    pub fn strategy_1d(&self, len: usize, batch: usize, direction: FftDirection) -> Result<Strategy, FftError> {
        if batch == 0 {
            return Err(FftError::InvalidConfig("batch must be at least 1".to_string()));
        }
        Ok(Strategy::OneD {
            batch,
            direction,
            factorization: self.factor(len)?,
        })
    }

    /// Plans a 2D transform of a `height` x `width` row-major matrix
    pub fn strategy_2d(&self, width: usize, height: usize, direction: FftDirection) -> Result<Strategy, FftError> {
        Ok(Strategy::TwoD {
            direction,
            rows: self.factor(width)?,
            columns: self.factor(height)?,
        })
    }

    /// Generates, builds and binds every stage of `strategy`
    pub fn build(
        &mut self,
        backend: &B,
        strategy: &Strategy,
        buffers: &PlanBuffers<B::Buffer>,
    ) -> Result<ExecutionPlan<B>, FftError> {
        let requirements = strategy.buffer_requirements();
        if requirements.ping.is_some() && buffers.ping.is_none() {
            return Err(FftError::MissingBuffer("ping"));
        }
        if requirements.pong.is_some() && buffers.pong.is_none() {
            return Err(FftError::MissingBuffer("pong"));
        }
        if buffers.bluestein.len() < requirements.bluestein.len() {
            return Err(FftError::MissingBuffer("Bluestein scratch"));
        }

        let mut builder = PlanBuilder {
            ctx: KernelContext::new(backend, &mut self.cache, self.config.precision, self.config.fast_math),
            config: &self.config,
            bluestein: buffers.bluestein.iter(),
            calls: Vec::new(),
        };

        match strategy {
            Strategy::OneD {
                batch,
                direction,
                factorization,
            } => {
                let scratch = buffers.ping.as_ref().unwrap_or(&buffers.output);
                builder.pass(
                    factorization,
                    *batch,
                    *direction,
                    &buffers.input,
                    &buffers.output,
                    scratch,
                )?;
            }
            Strategy::TwoD {
                direction,
                rows,
                columns,
            } => {
                let (width, height) = (rows.len(), columns.len());
                let ping = buffers.ping.as_ref().ok_or(FftError::MissingBuffer("ping"))?;
                let pong = buffers.pong.as_ref().unwrap_or(ping);
                let block_cap = self.config.transpose_block_cap;

                builder.pass(rows, height, *direction, &buffers.input, ping, &buffers.output)?;
                let call = transpose_kernel(&mut builder.ctx, block_cap, width, height, ping, &buffers.output)?;
                builder.calls.push(call);
                builder.pass(columns, width, *direction, &buffers.output, ping, pong)?;
                let call = transpose_kernel(&mut builder.ctx, block_cap, height, width, ping, &buffers.output)?;
                builder.calls.push(call);
            }
        }

        let plan = ExecutionPlan::new(builder.calls);
        info!(
            stages = plan.len(),
            once = plan.calls().iter().filter(|call| call.once()).count(),
            programs = self.cache.len(),
            "built FFT plan"
        );
        Ok(plan)
    }

    /// Plans and builds `batch` independent transforms of length `len`
    pub fn plan_fft(
        &mut self,
        backend: &B,
        len: usize,
        batch: usize,
        direction: FftDirection,
        buffers: &PlanBuffers<B::Buffer>,
    ) -> Result<ExecutionPlan<B>, FftError> {
        let strategy = self.strategy_1d(len, batch, direction)?;
        self.build(backend, &strategy, buffers)
    }

    /// Plans and builds a 2D transform of a `height` x `width` row-major matrix
    pub fn plan_fft_2d(
        &mut self,
        backend: &B,
        width: usize,
        height: usize,
        direction: FftDirection,
        buffers: &PlanBuffers<B::Buffer>,
    ) -> Result<ExecutionPlan<B>, FftError> {
        let strategy = self.strategy_2d(width, height, direction)?;
        self.build(backend, &strategy, buffers)
    }
}

struct PlanBuilder<'a, B: Backend> {
    ctx: KernelContext<'a, B>,
    config: &'a PlannerConfig,
    bluestein: std::slice::Iter<'a, BluesteinBuffers<B::Buffer>>,
    calls: Vec<KernelCall<B>>,
}

impl<'a, B: Backend> PlanBuilder<'a, B> {
    // Emits every stage of one batched 1D pass. Stages alternate between `output` and `scratch` so that the last one
    // writes `output`. `input` is only ever read.
    fn pass(
        &mut self,
        factorization: &Factorization,
        batch: usize,
        direction: FftDirection,
        input: &B::Buffer,
        output: &B::Buffer,
        scratch: &B::Buffer,
    ) -> Result<(), FftError> {
        let n = factorization.len();
        let stages = factorization.stage_count();
        if stages == 0 {
            // length 1: the transform is a copy
            let call = transpose_kernel(&mut self.ctx, self.config.transpose_block_cap, 1, n * batch, input, output)?;
            self.calls.push(call);
            return Ok(());
        }

        let mut current = input;
        let mut p = 1;
        for (stage, radix) in factorization.radices().iter().enumerate() {
            let target = if (stages - 1 - stage) % 2 == 0 { output } else { scratch };
            let call = radix_kernel(&mut self.ctx, false, n, batch, direction, *radix, p, current, target)?;
            self.calls.push(call);
            p *= radix.value;
            current = target;
        }

        if let Some(factor) = factorization.bluestein() {
            self.bluestein(n, batch, direction, factor, p, current, output)?;
        }
        Ok(())
    }

    // Emits the radix stages of a power-of-two inner FFT, alternating between `a` and `b`.
    // Returns the buffer holding the result, followed by the other one.
    fn inner_fft<'b>(
        &mut self,
        factorization: &Factorization,
        batch: usize,
        direction: FftDirection,
        once: bool,
        a: &'b B::Buffer,
        b: &'b B::Buffer,
    ) -> Result<(&'b B::Buffer, &'b B::Buffer), FftError> {
        assert!(factorization.bluestein().is_none(), "inner FFTs must not need Bluestein's algorithm");
        let n = factorization.len();
        let (mut current, mut other) = (a, b);
        let mut p = 1;
        for radix in factorization.radices() {
            let call = radix_kernel(&mut self.ctx, once, n, batch, direction, *radix, p, current, other)?;
            self.calls.push(call);
            p *= radix.value;
            std::mem::swap(&mut current, &mut other);
        }
        Ok((current, other))
    }

    #[allow(clippy::too_many_arguments)]
    fn bluestein(
        &mut self,
        n: usize,
        batch: usize,
        direction: FftDirection,
        factor: usize,
        p: usize,
        input: &B::Buffer,
        output: &B::Buffer,
    ) -> Result<(), FftError> {
        let buffers = self.bluestein.next().ok_or(FftError::MissingBuffer("Bluestein scratch"))?;
        let conv_len = bluestein_conv_len(factor);
        let threads = n / factor;
        let rows = threads * batch;
        let inner = self.inner_factorization(conv_len);
        debug!(factor, conv_len, threads, rows, "bluestein stage");

        // convolution kernel, computed on the first run only
        let call = bluestein_twiddle(&mut self.ctx, factor, direction, &buffers.chirp)?;
        self.calls.push(call);
        let call = bluestein_pad_kernel(&mut self.ctx, factor, conv_len, &buffers.chirp, &buffers.kernel_a)?;
        self.calls.push(call);
        let (kernel, _) = self.inner_fft(&inner, 1, FftDirection::Forward, true, &buffers.kernel_a, &buffers.kernel_b)?;

        let call = bluestein_mul_in(
            &mut self.ctx,
            direction,
            batch,
            factor,
            p,
            threads,
            conv_len,
            input,
            &buffers.chirp,
            &buffers.work_a,
        )?;
        self.calls.push(call);

        let (spectrum, spare) = self.inner_fft(&inner, rows, FftDirection::Forward, false, &buffers.work_a, &buffers.work_b)?;
        let call = bluestein_mul(&mut self.ctx, conv_len, rows, spectrum, kernel, spectrum)?;
        self.calls.push(call);
        let (convolution, _) = self.inner_fft(&inner, rows, FftDirection::Inverse, false, spectrum, spare)?;

        let call = bluestein_mul_out(
            &mut self.ctx,
            batch,
            p,
            factor,
            threads,
            conv_len,
            convolution,
            &buffers.chirp,
            output,
        )?;
        self.calls.push(call);
        Ok(())
    }

    // Convolution lengths are powers of two, so they always split into radix-2 powers
    fn inner_factorization(&self, conv_len: usize) -> Factorization {
        let max_exponent = usize::BITS - 1 - self.config.max_radix.leading_zeros();
        let mut remaining = conv_len.trailing_zeros();
        let mut radices = Vec::new();
        while remaining > 0 {
            let exponent = remaining.min(max_exponent);
            radices.push(Radix::new(2, exponent));
            remaining -= exponent;
        }
        Factorization {
            len: conv_len,
            radices,
            bluestein: None,
        }
    }
}
