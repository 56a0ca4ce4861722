use std::cell::{Cell, RefCell};
use std::fmt::Display;

use num_complex::Complex;
use num_traits::{Float, NumCast, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithm::small_dft::SmallDft;
use crate::backend::{Backend, CompilationUnit, DeviceInfo};
use crate::kernel_call::{KernelArg, LaunchGeometry, Param, Stage};
use crate::math_utils::chirp_index;
use crate::plan::{BluesteinBuffers, BufferRequirements, PlanBuffers};
use crate::source::Dialect;
use crate::twiddles::rotation;
use crate::{FftDirection, Precision};

/// The seed for the random number generator used to generate
/// random signals. It's defined here so that we have deterministic
/// tests
const RNG_SEED: u64 = 1910_11431_4984;

pub fn random_signal(length: usize) -> Vec<Complex<f64>> {
    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    (0..length)
        .map(|_| Complex::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
        .collect()
}

pub fn compare_vectors<T: Float>(vec1: &[Complex<T>], vec2: &[Complex<T>]) -> bool {
    assert_eq!(vec1.len(), vec2.len());
    let mut error = T::zero();
    for (&a, &b) in vec1.iter().zip(vec2.iter()) {
        error = error + (a - b).norm();
    }
    let len = <T as NumCast>::from(vec1.len().max(1)).unwrap();
    let tolerance = <T as NumCast>::from(0.1).unwrap();
    (error / len) < tolerance
}

/// Direct O(n^2) DFT of every row of `input`
pub fn dft(input: &[Complex<f64>], direction: FftDirection) -> Vec<Complex<f64>> {
    let len = input.len();
    (0..len)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(e, value)| value * crate::twiddles::compute_twiddle::<f64>(e * k, len, direction))
                .sum()
        })
        .collect()
}

/// Runs `dft` on each row of `row_len` samples
pub fn dft_rows(input: &[Complex<f64>], row_len: usize, direction: FftDirection) -> Vec<Complex<f64>> {
    input.chunks(row_len).flat_map(|row| dft(row, direction)).collect()
}

#[derive(Debug)]
pub struct HostError(String);
impl Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::error::Error for HostError {}

#[derive(Debug, Clone)]
pub struct HostProgram {
    stage: Stage,
    precision: Precision,
}

#[derive(Debug, Clone)]
pub struct HostKernel {
    stage: Stage,
    precision: Precision,
}

/// A backend that executes compilation units on the host, work-item by work-item.
///
/// It never parses source text. Instead it interprets the unit's `Stage`, using only the parts of the stage that are
/// baked into the source (radix, direction, tile size) and reading everything else from the bound arguments and the
/// launch geometry, the way a device would. Guards and padded work-items are honoured, so an out-of-bounds access
/// panics instead of silently corrupting memory.
pub struct HostBackend {
    buffers: RefCell<Vec<Vec<Complex<f64>>>>,
    info: DeviceInfo,
    work_group_multiple: usize,
    fail_launches: Cell<bool>,
    builds: Cell<usize>,
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            buffers: RefCell::new(Vec::new()),
            info: DeviceInfo {
                local_mem_size: 32 * 1024,
                max_work_group_size: 256,
            },
            work_group_multiple: 64,
            fail_launches: Cell::new(false),
            builds: Cell::new(0),
        }
    }

    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_work_group_multiple(mut self, work_group_multiple: usize) -> Self {
        self.work_group_multiple = work_group_multiple;
        self
    }

    pub fn fail_launches(&self, fail: bool) {
        self.fail_launches.set(fail);
    }

    pub fn builds(&self) -> usize {
        self.builds.get()
    }

    pub fn program_for(&self, stage: Stage, _params: Vec<Param>) -> HostProgram {
        HostProgram {
            stage,
            precision: Precision::Double,
        }
    }

    pub fn alloc(&self, len: usize) -> usize {
        self.upload(&vec![Complex::zero(); len])
    }

    pub fn upload(&self, data: &[Complex<f64>]) -> usize {
        let mut buffers = self.buffers.borrow_mut();
        buffers.push(data.to_vec());
        buffers.len() - 1
    }

    pub fn download(&self, buffer: &usize) -> Vec<Complex<f64>> {
        self.buffers.borrow()[*buffer].clone()
    }

    pub fn alloc_plan_buffers(&self, requirements: &BufferRequirements) -> PlanBuffers<usize> {
        let mut buffers = PlanBuffers::new(self.alloc(requirements.len), self.alloc(requirements.len));
        if let Some(len) = requirements.ping {
            buffers.ping = Some(self.alloc(len));
        }
        if let Some(len) = requirements.pong {
            buffers.pong = Some(self.alloc(len));
        }
        for bluestein in &requirements.bluestein {
            buffers.bluestein.push(BluesteinBuffers {
                chirp: self.alloc(bluestein.chirp_len()),
                kernel_a: self.alloc(bluestein.kernel_len()),
                kernel_b: self.alloc(bluestein.kernel_len()),
                work_a: self.alloc(bluestein.work_len()),
                work_b: self.alloc(bluestein.work_len()),
            });
        }
        buffers
    }

    fn run(&self, kernel: &HostKernel, args: &[KernelArg<usize>], geometry: &LaunchGeometry) {
        let global = geometry.global();
        let mut buffers = self.buffers.borrow_mut();
        let round = |value: Complex<f64>| match kernel.precision {
            Precision::Single => Complex::new(value.re as f32 as f64, value.im as f32 as f64),
            Precision::Double => value,
        };

        match kernel.stage {
            Stage::Radix { radix, direction, .. } => {
                let radix = radix.value;
                let x = buffers[buffer(args, 0)].clone();
                let y = &mut buffers[buffer(args, 1)];
                let p = uint(args, 2);
                let threads = uint(args, 3);
                let small_dft = SmallDft::new(radix, direction).unwrap();

                for batch in 0..global.get(1) {
                    for i in 0..global.get(0) {
                        if i >= threads {
                            continue;
                        }
                        let k = i % p;
                        let batch_offset = batch * threads * radix;
                        let mut v: Vec<Complex<f64>> =
                            (0..radix).map(|e| x[i + batch_offset + e * threads]).collect();
                        if p != 1 {
                            for (e, value) in v.iter_mut().enumerate().skip(1) {
                                let alpha = -2.0 * std::f64::consts::PI * e as f64 / radix as f64;
                                let twiddle = rotation::<f64>(alpha * k as f64 / p as f64);
                                *value = match direction {
                                    FftDirection::Forward => *value * twiddle,
                                    FftDirection::Inverse => *value * twiddle.conj(),
                                };
                            }
                        }
                        small_dft.apply(&mut v);
                        let j = k + (i - k) * radix;
                        for (e, value) in v.into_iter().enumerate() {
                            y[j + batch_offset + e * p] = round(value);
                        }
                    }
                }
            }
            Stage::Transpose { block_size, .. } => {
                let input = buffers[buffer(args, 0)].clone();
                let output = &mut buffers[buffer(args, 1)];
                let width = uint(args, 2);
                let height = uint(args, 3);
                let local = geometry.local();
                assert_eq!(local.sizes(), &[block_size, block_size]);

                for group_y in 0..global.get(1) / block_size {
                    for group_x in 0..global.get(0) / block_size {
                        // every work-item of the group loads before any of them stores
                        let mut block: Vec<Option<Complex<f64>>> = vec![None; block_size * block_size];
                        for local_y in 0..block_size {
                            for local_x in 0..block_size {
                                let global_x = group_x * block_size + local_x;
                                let global_y = group_y * block_size + local_y;
                                if global_x < width && global_y < height {
                                    block[local_x + local_y * block_size] = Some(input[global_x + global_y * width]);
                                }
                            }
                        }
                        for local_y in 0..block_size {
                            for local_x in 0..block_size {
                                let target_x = local_x + group_y * block_size;
                                let target_y = local_y + group_x * block_size;
                                if target_x < height && target_y < width {
                                    let value = block[local_y + local_x * block_size]
                                        .expect("transpose read a tile element that was never loaded");
                                    output[target_x + target_y * height] = value;
                                }
                            }
                        }
                    }
                }
            }
            Stage::BluesteinTwiddle { direction, .. } => {
                let output = &mut buffers[buffer(args, 0)];
                let n = uint(args, 1);
                let alpha = direction.chirp_sign() * std::f64::consts::PI;
                for x in 0..global.get(0) {
                    if x < n {
                        let xx = chirp_index(x, n) as f64;
                        output[x] = round(rotation(alpha * xx / n as f64));
                    }
                }
            }
            Stage::BluesteinPad { .. } => {
                let input = buffers[buffer(args, 0)].clone();
                let output = &mut buffers[buffer(args, 1)];
                let n = uint(args, 2);
                let m = uint(args, 3);
                for x in 0..global.get(0) {
                    if x < m {
                        output[x] = if x < n || m - x < n {
                            input[x.min(m - x)].conj()
                        } else {
                            Complex::zero()
                        };
                    }
                }
            }
            Stage::BluesteinMulIn { direction, .. } => {
                let data = buffers[buffer(args, 0)].clone();
                let exp = buffers[buffer(args, 1)].clone();
                let output = &mut buffers[buffer(args, 2)];
                let radix = uint(args, 3);
                let p = uint(args, 4);
                let out_stride = uint(args, 5);
                let threads = global.get(0);
                let alpha = 2.0 * direction.chirp_sign() * std::f64::consts::PI;

                for thread in 0..threads {
                    for batch in 0..global.get(1) {
                        for element in 0..global.get(2) {
                            if element >= out_stride {
                                continue;
                            }
                            let out_off = thread * out_stride + batch * out_stride * threads + element;
                            if element < radix {
                                let in_off = thread + batch * radix * threads + element * threads;
                                let mut w = exp[element];
                                if p != 1 {
                                    let a = element * (thread % p);
                                    let b = radix * p;
                                    w = w * rotation::<f64>(alpha * (a % (2 * b)) as f64 / b as f64);
                                }
                                output[out_off] = round(data[in_off] * w);
                            } else {
                                output[out_off] = Complex::zero();
                            }
                        }
                    }
                }
            }
            Stage::BluesteinMul { .. } => {
                let data = buffers[buffer(args, 0)].clone();
                let exp = buffers[buffer(args, 1)].clone();
                let output = &mut buffers[buffer(args, 2)];
                let stride = uint(args, 3);
                for y in 0..global.get(1) {
                    for x in 0..global.get(0) {
                        if x < stride {
                            let off = x + stride * y;
                            output[off] = round(data[off] * exp[x]);
                        }
                    }
                }
            }
            Stage::BluesteinMulOut { .. } => {
                let data = buffers[buffer(args, 0)].clone();
                let exp = buffers[buffer(args, 1)].clone();
                let output = &mut buffers[buffer(args, 2)];
                let div = match kernel.precision {
                    Precision::Single => real(args, 3) as f32 as f64,
                    Precision::Double => real(args, 3),
                };
                let p = uint(args, 4);
                let in_stride = uint(args, 5);
                let radix = uint(args, 6);
                let threads = global.get(0);

                for i in 0..threads {
                    for b in 0..global.get(1) {
                        for l in 0..global.get(2) {
                            if l >= radix {
                                continue;
                            }
                            let k = i % p;
                            let j = k + (i - k) * radix;
                            let in_off = i * in_stride + b * in_stride * threads + l;
                            let out_off = j + b * threads * radix + l * p;
                            output[out_off] = round(data[in_off] * div * exp[l]);
                        }
                    }
                }
            }
        }
    }
}

fn buffer(args: &[KernelArg<usize>], index: usize) -> usize {
    match &args[index] {
        KernelArg::Buffer(buffer) => *buffer,
        other => panic!("argument {} is a {}, expected a buffer", index, other.kind_name()),
    }
}

fn uint(args: &[KernelArg<usize>], index: usize) -> usize {
    match &args[index] {
        KernelArg::Uint(value) => *value as usize,
        other => panic!("argument {} is a {}, expected a uint", index, other.kind_name()),
    }
}

fn real(args: &[KernelArg<usize>], index: usize) -> f64 {
    match &args[index] {
        KernelArg::Real(value) => *value,
        other => panic!("argument {} is a {}, expected a real", index, other.kind_name()),
    }
}

impl Backend for HostBackend {
    type Program = HostProgram;
    type Kernel = HostKernel;
    type Buffer = usize;
    type Error = HostError;

    fn dialect(&self) -> Dialect {
        Dialect::OpenCl
    }

    fn device_info(&self) -> DeviceInfo {
        self.info
    }

    fn build(&self, unit: &CompilationUnit) -> Result<HostProgram, HostError> {
        self.builds.set(self.builds.get() + 1);
        Ok(HostProgram {
            stage: unit.stage,
            precision: unit.precision,
        })
    }

    fn kernel(&self, program: &HostProgram, name: &str) -> Result<HostKernel, HostError> {
        if name != program.stage.entry_point() {
            return Err(HostError(format!("no kernel named '{}'", name)));
        }
        Ok(HostKernel {
            stage: program.stage,
            precision: program.precision,
        })
    }

    fn preferred_work_group_multiple(&self, _kernel: &HostKernel) -> Result<usize, HostError> {
        Ok(self.work_group_multiple)
    }

    fn enqueue(
        &self,
        kernel: &HostKernel,
        args: &[KernelArg<usize>],
        geometry: &LaunchGeometry,
    ) -> Result<(), HostError> {
        if self.fail_launches.get() {
            return Err(HostError("out of resources".to_string()));
        }
        self.run(kernel, args, geometry);
        Ok(())
    }
}
