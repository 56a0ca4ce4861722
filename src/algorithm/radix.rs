use super::common::{kernel_common, mul_code, twiddle_code};
use super::small_dft::SmallDft;
use super::KernelContext;
use crate::backend::Backend;
use crate::common::{to_u32, FftError, Radix};
use crate::kernel_call::{KernelArg, KernelCall, LaunchGeometry, NdRange, Param, Stage};
use crate::math_utils::alignup;
use crate::source::{real_literal, KernelSource, SourceBuilder};
use crate::FftDirection;

/// Emits one Cooley-Tukey decimation stage for `radix`.
///
/// Work-item `i` gathers the `radix` samples `x[i + e * threads]` of its row, applies the twiddle correction
/// `exp(-2 pi i e k / (radix p))` with `k = i % p`, runs the small DFT, and scatters the results to
/// `y[k + (i - k) * radix + e * p]`.
pub(crate) fn radix_source(mut o: SourceBuilder, radix: usize, direction: FftDirection) -> Result<KernelSource, FftError> {
    let small_dft = SmallDft::new(radix, direction)?;

    kernel_common(&mut o);
    mul_code(&mut o, direction.is_inverse());
    twiddle_code(&mut o);
    small_dft.emit(&mut o);

    let global_id_0 = o.global_id(0);
    let global_id_1 = o.global_id(1);
    let params = vec![
        Param::const_buffer("x"),
        Param::buffer("y"),
        Param::uint("p"),
        Param::uint("threads"),
    ];
    Ok(o.kernel("radix", params, |o| {
        o.line(format!("const size_t i = {};", global_id_0));
        o.line("if(i >= threads) return;");

        // index in the input sequence, in 0..p-1
        o.line("const size_t k = i % p;");
        o.line(format!(
            "const size_t batch_offset = {} * threads * {};",
            global_id_1, radix
        ));

        o.line("x += i + batch_offset;");
        for e in 0..radix {
            o.line(format!("real2_t v{e} = x[{e} * threads];", e = e));
        }

        o.block("if(p != 1)", |o| {
            for e in 1..radix {
                let alpha = -2.0 * std::f64::consts::PI * e as f64 / radix as f64;
                o.line(format!(
                    "v{e} = mul(v{e}, twiddle({alpha} * k / p));",
                    e = e,
                    alpha = real_literal(alpha)
                ));
            }
        });

        let args: Vec<String> = (0..radix).map(|e| format!("&v{}", e)).collect();
        o.line(format!("{}({});", small_dft.function_name(), args.join(", ")));

        o.line(format!("const size_t j = k + (i - k) * {};", radix));
        o.line("y += j + batch_offset;");
        for e in 0..radix {
            o.line(format!("y[{e} * p] = v{e};", e = e));
        }
    }))
}

/// Builds the kernel call for one radix stage over `batch` rows of length `n`, reading `input` and writing `output`
#[allow(clippy::too_many_arguments)]
pub(crate) fn radix_kernel<B: Backend>(
    ctx: &mut KernelContext<B>,
    once: bool,
    n: usize,
    batch: usize,
    direction: FftDirection,
    radix: Radix,
    p: usize,
    input: &B::Buffer,
    output: &B::Buffer,
) -> Result<KernelCall<B>, FftError> {
    assert_eq!(n % (radix.value * p), 0, "radix stage does not divide the row length");

    let source = radix_source(ctx.builder(), radix.value, direction)?;
    let stage = Stage::Radix {
        radix,
        p,
        n,
        batch,
        direction,
    };
    let compiled = ctx.compile(source, stage, true)?;

    let threads = n / radix.value;
    let wg = ctx.work_group_multiple(&compiled)?;
    let padded_threads = alignup(threads, wg);
    let geometry = LaunchGeometry::new(NdRange::d2(padded_threads, batch), NdRange::d2(wg, 1))?;

    let args = vec![
        KernelArg::Buffer(input.clone()),
        KernelArg::Buffer(output.clone()),
        KernelArg::Uint(to_u32("p", p)?),
        KernelArg::Uint(to_u32("threads", threads)?),
    ];
    let desc = format!(
        "dft{{r={}, p={}, n={}, batch={}, threads={}({}), wg={}}}",
        radix.value, p, n, batch, threads, padded_threads, wg
    );
    ctx.call(once, desc, compiled, args, geometry, stage)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::source::Dialect;
    use crate::Precision;

    #[test]
    fn test_radix_source_layout() {
        let source = radix_source(
            SourceBuilder::new(Dialect::OpenCl, Precision::Single),
            4,
            FftDirection::Forward,
        )
        .unwrap();

        assert_eq!(source.entry_point, "radix");
        assert_eq!(source.params.len(), 4);
        let text = &source.text;
        assert!(text.contains(
            "kernel void radix(global const real2_t * x, global real2_t * y, uint p, uint threads)"
        ));
        assert!(text.contains("if(i >= threads) return;"));
        assert!(text.contains("const size_t batch_offset = get_global_id(1) * threads * 4;"));
        assert!(text.contains("real2_t v3 = x[3 * threads];"));
        assert!(text.contains("dft4(&v0, &v1, &v2, &v3);"));
        assert!(text.contains("const size_t j = k + (i - k) * 4;"));
        assert!(text.contains("y[3 * p] = v3;"));
        // forward transforms use the plain product
        assert!(text.contains("a.x * b.x - a.y * b.y"));
    }

    #[test]
    fn test_radix_source_twiddles() {
        let source = radix_source(
            SourceBuilder::new(Dialect::Cuda, Precision::Double),
            3,
            FftDirection::Inverse,
        )
        .unwrap();
        let text = &source.text;

        let alpha = real_literal(-2.0 * std::f64::consts::PI * 2.0 / 3.0);
        assert!(text.contains(&format!("v2 = mul(v2, twiddle({} * k / p));", alpha)));
        assert!(!text.contains("v0 = mul(v0"));
        // inverse transforms conjugate the twiddle inside mul
        assert!(text.contains("a.x * b.x + a.y * b.y"));
        assert!(text.contains("extern \"C\" __global__ void radix(const real2_t * x, real2_t * y, unsigned int p, unsigned int threads)"));
        assert!(text.contains("((size_t)blockIdx.x * blockDim.x + threadIdx.x)"));
    }

    #[test]
    fn test_unsupported_radix() {
        let result = radix_source(
            SourceBuilder::new(Dialect::OpenCl, Precision::Single),
            17,
            FftDirection::Forward,
        );
        assert!(matches!(result, Err(FftError::UnsupportedRadix(17))));
    }
}
