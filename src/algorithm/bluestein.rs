//! The five kernels that express a length-`n` DFT as a convolution of length `m >= 2n - 1`.
//!
//! With the chirp `c[x] = exp(sign * pi * i * x^2 / n)`, a DFT output is `X[l] = c[l] * sum_e (x[e] c[e]) conj(c[l - e])`.
//! The pipeline computes that sum as a circular convolution through power-of-two FFTs:
//!
//! 1. `bluestein_twiddle` writes the chirp table
//! 2. `bluestein_pad_kernel` writes the mirrored, conjugated chirp padded to `m`. Its forward FFT is the convolution kernel.
//! 3. `bluestein_mul_in` gathers each radix window, applies the Cooley-Tukey twiddle and the chirp, and zero pads to `m`
//! 4. `bluestein_mul` multiplies the transformed rows by the transformed kernel
//! 5. `bluestein_mul_out` normalizes the inverse FFT by `1/m`, applies the chirp again and scatters the results
//!
//! Stages 1 and 2 depend only on the shape, so their calls are marked `once`.

use super::common::{conj_code, kernel_common, mul_code, store_zero, twiddle_code};
use super::KernelContext;
use crate::backend::Backend;
use crate::common::{to_u32, FftError};
use crate::kernel_call::{KernelArg, KernelCall, LaunchGeometry, NdRange, Param, Stage};
use crate::math_utils::alignup;
use crate::source::{real_literal, KernelSource, SourceBuilder};
use crate::FftDirection;

pub(crate) fn twiddle_source(mut o: SourceBuilder, direction: FftDirection) -> KernelSource {
    kernel_common(&mut o);
    twiddle_code(&mut o);

    let global_id = o.global_id(0);
    let wide = o.dialect().wide_uint();
    let alpha = real_literal(direction.chirp_sign() * std::f64::consts::PI);
    let params = vec![Param::buffer("output"), Param::uint("n")];
    o.kernel("bluestein_twiddle", params, |o| {
        o.line(format!("const size_t x = {};", global_id));
        o.block("if(x < n)", |o| {
            o.line(format!(
                "const {wide} xx = (({wide})x * x) % (2 * ({wide})n);",
                wide = wide
            ));
            o.line(format!("output[x] = twiddle({} * xx / n);", alpha));
        });
    })
}

/// The chirp table `c[x]` for `x` in `0..n`. Marked `once`.
pub(crate) fn bluestein_twiddle<B: Backend>(
    ctx: &mut KernelContext<B>,
    n: usize,
    direction: FftDirection,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let source = twiddle_source(ctx.builder(), direction);
    let stage = Stage::BluesteinTwiddle { n, direction };
    let compiled = ctx.compile(source, stage, false)?;

    let wg = ctx.work_group_multiple(&compiled)?;
    let padded = alignup(n, wg);
    let geometry = LaunchGeometry::new(NdRange::d1(padded), NdRange::d1(wg))?;

    let args = vec![
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("n", n)?),
    ];
    let desc = format!(
        "bluestein_twiddle{{n={}({}), wg={}, inverse={}}}",
        n,
        padded,
        wg,
        direction.is_inverse()
    );
    ctx.call(true, desc, compiled, args, geometry, stage)
}

pub(crate) fn pad_source(mut o: SourceBuilder) -> KernelSource {
    kernel_common(&mut o);
    conj_code(&mut o);

    let global_id = o.global_id(0);
    let params = vec![
        Param::const_buffer("input"),
        Param::buffer("output"),
        Param::uint("n"),
        Param::uint("m"),
    ];
    o.kernel("bluestein_pad_kernel", params, |o| {
        o.line(format!("const size_t x = {};", global_id));
        o.block("if(x < m)", |o| {
            o.block("if(x < n || m - x < n)", |o| {
                o.line("output[x] = conj(input[x < m - x ? x : m - x]);");
            });
            o.line("else");
            store_zero(o, "output[x]");
        });
    })
}

/// Writes the conjugated chirp, mirrored around 0 and zero padded to `m`. Marked `once`.
pub(crate) fn bluestein_pad_kernel<B: Backend>(
    ctx: &mut KernelContext<B>,
    n: usize,
    m: usize,
    input: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let source = pad_source(ctx.builder());
    let stage = Stage::BluesteinPad { n, m };
    let compiled = ctx.compile(source, stage, false)?;

    let wg = ctx.work_group_multiple(&compiled)?;
    let padded = alignup(m, wg);
    let geometry = LaunchGeometry::new(NdRange::d1(padded), NdRange::d1(wg))?;

    let args = vec![
        KernelArg::Buffer(input.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("n", n)?),
        KernelArg::Uint(to_u32("m", m)?),
    ];
    let desc = format!("bluestein_pad_kernel{{n={}, m={}({}), wg={}}}", n, m, padded, wg);
    ctx.call(true, desc, compiled, args, geometry, stage)
}

pub(crate) fn mul_in_source(mut o: SourceBuilder, direction: FftDirection) -> KernelSource {
    kernel_common(&mut o);
    mul_code(&mut o, false);
    twiddle_code(&mut o);

    let ids = [
        ("thread", o.global_id(0)),
        ("threads", o.global_size(0)),
        ("batch", o.global_id(1)),
        ("element", o.global_id(2)),
    ];
    let wide = o.dialect().wide_uint();
    let alpha = real_literal(2.0 * direction.chirp_sign() * std::f64::consts::PI);
    let params = vec![
        Param::const_buffer("data"),
        Param::const_buffer("exp"),
        Param::buffer("output"),
        Param::uint("radix"),
        Param::uint("p"),
        Param::uint("out_stride"),
    ];
    o.kernel("bluestein_mul_in", params, |o| {
        for (name, id) in ids.iter() {
            o.line(format!("const size_t {} = {};", name, id));
        }
        o.block("if(element < out_stride)", |o| {
            o.line("const size_t out_off = thread * out_stride + batch * out_stride * threads + element;");
            o.block("if(element < radix)", |o| {
                o.line("const size_t in_off = thread + batch * radix * threads + element * threads;");
                o.line("real2_t w = exp[element];");
                o.block("if(p != 1)", |o| {
                    o.line(format!("const {wide} a = ({wide})element * (thread % p);", wide = wide));
                    o.line(format!("const {wide} b = ({wide})radix * p;", wide = wide));
                    o.line(format!("w = mul(w, twiddle({} * (a % (2 * b)) / b));", alpha));
                });
                o.line("output[out_off] = mul(data[in_off], w);");
            });
            o.line("else");
            store_zero(o, "output[out_off]");
        });
    })
}

/// Gathers the radix windows of `data`, multiplies them by the chirp and the twiddle correction, and writes one
/// zero-padded row of `stride` per window.
#[allow(clippy::too_many_arguments)]
pub(crate) fn bluestein_mul_in<B: Backend>(
    ctx: &mut KernelContext<B>,
    direction: FftDirection,
    batch: usize,
    radix: usize,
    p: usize,
    threads: usize,
    stride: usize,
    data: &B::Buffer,
    exp: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let source = mul_in_source(ctx.builder(), direction);
    let stage = Stage::BluesteinMulIn {
        radix,
        p,
        threads,
        batch,
        stride,
        direction,
    };
    let compiled = ctx.compile(source, stage, false)?;

    let wg = ctx.work_group_multiple(&compiled)?;
    let padded_stride = alignup(stride, wg);
    let geometry = LaunchGeometry::new(
        NdRange::d3(threads, batch, padded_stride),
        NdRange::d3(1, 1, wg),
    )?;

    let args = vec![
        KernelArg::Buffer(data.clone()),
        KernelArg::Buffer(exp.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("radix", radix)?),
        KernelArg::Uint(to_u32("p", p)?),
        KernelArg::Uint(to_u32("out_stride", stride)?),
    ];
    let desc = format!(
        "bluestein_mul_in{{batch={}, radix={}, p={}, threads={}, stride={}({}), wg={}}}",
        batch, radix, p, threads, stride, padded_stride, wg
    );
    ctx.call(false, desc, compiled, args, geometry, stage)
}

pub(crate) fn mul_source(mut o: SourceBuilder) -> KernelSource {
    kernel_common(&mut o);
    mul_code(&mut o, false);

    let x = o.global_id(0);
    let y = o.global_id(1);
    let params = vec![
        Param::const_buffer("data"),
        Param::const_buffer("exp"),
        Param::buffer("output"),
        Param::uint("stride"),
    ];
    o.kernel("bluestein_mul", params, |o| {
        o.line(format!("const size_t x = {};", x));
        o.line(format!("const size_t y = {};", y));
        o.block("if(x < stride)", |o| {
            o.line("const size_t off = x + stride * y;");
            o.line("output[off] = mul(data[off], exp[x]);");
        });
    })
}

/// Multiplies each row of `stride` samples element-wise by `exp`. `data` and `output` may be the same buffer.
pub(crate) fn bluestein_mul<B: Backend>(
    ctx: &mut KernelContext<B>,
    stride: usize,
    rows: usize,
    data: &B::Buffer,
    exp: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let source = mul_source(ctx.builder());
    let stage = Stage::BluesteinMul { stride, rows };
    let compiled = ctx.compile(source, stage, false)?;

    let wg = ctx.work_group_multiple(&compiled)?;
    let padded = alignup(stride, wg);
    let geometry = LaunchGeometry::new(NdRange::d2(padded, rows), NdRange::d2(wg, 1))?;

    let args = vec![
        KernelArg::Buffer(data.clone()),
        KernelArg::Buffer(exp.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("stride", stride)?),
    ];
    let desc = format!("bluestein_mul{{n={}({}), wg={}, rows={}}}", stride, padded, wg, rows);
    ctx.call(false, desc, compiled, args, geometry, stage)
}

pub(crate) fn mul_out_source(mut o: SourceBuilder) -> KernelSource {
    kernel_common(&mut o);
    mul_code(&mut o, false);

    let ids = [
        ("i", o.global_id(0)),
        ("threads", o.global_size(0)),
        ("b", o.global_id(1)),
        ("l", o.global_id(2)),
    ];
    let params = vec![
        Param::const_buffer("data"),
        Param::const_buffer("exp"),
        Param::buffer("output"),
        Param::real("div"),
        Param::uint("p"),
        Param::uint("in_stride"),
        Param::uint("radix"),
    ];
    o.kernel("bluestein_mul_out", params, |o| {
        for (name, id) in ids.iter() {
            o.line(format!("const size_t {} = {};", name, id));
        }
        o.block("if(l < radix)", |o| {
            o.line("const size_t k = i % p;");
            o.line("const size_t j = k + (i - k) * radix;");
            o.line("const size_t in_off = i * in_stride + b * in_stride * threads + l;");
            o.line("const size_t out_off = j + b * threads * radix + l * p;");
            o.line("real2_t v = data[in_off];");
            o.line("v.x *= div;");
            o.line("v.y *= div;");
            o.line("output[out_off] = mul(v, exp[l]);");
        });
    })
}

/// Normalizes the convolution rows by `1/stride`, multiplies by the chirp and scatters every window back to its
/// Cooley-Tukey output positions.
#[allow(clippy::too_many_arguments)]
pub(crate) fn bluestein_mul_out<B: Backend>(
    ctx: &mut KernelContext<B>,
    batch: usize,
    p: usize,
    radix: usize,
    threads: usize,
    stride: usize,
    data: &B::Buffer,
    exp: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    let source = mul_out_source(ctx.builder());
    let stage = Stage::BluesteinMulOut {
        radix,
        p,
        threads,
        batch,
        stride,
    };
    let compiled = ctx.compile(source, stage, false)?;

    let wg = ctx.work_group_multiple(&compiled)?;
    let padded_radix = alignup(radix, wg);
    let geometry = LaunchGeometry::new(
        NdRange::d3(threads, batch, padded_radix),
        NdRange::d3(1, 1, wg),
    )?;

    let args = vec![
        KernelArg::Buffer(data.clone()),
        KernelArg::Buffer(exp.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Real(1.0 / stride as f64),
        KernelArg::Uint(to_u32("p", p)?),
        KernelArg::Uint(to_u32("in_stride", stride)?),
        KernelArg::Uint(to_u32("radix", radix)?),
    ];
    let desc = format!(
        "bluestein_mul_out{{r={}({}), wg={}, batch={}, p={}, thr={}, stride={}}}",
        radix, padded_radix, wg, batch, p, threads, stride
    );
    ctx.call(false, desc, compiled, args, geometry, stage)
}
