use crate::source::{Dialect, SourceBuilder};
use crate::Precision;

/// Emits the preamble every compilation unit starts with: the device qualifier macro, the fp64 extension on OpenCL
/// double precision, and the `real_t`/`real2_t` aliases
pub(crate) fn kernel_common(o: &mut SourceBuilder) {
    let precision = o.precision();
    match o.dialect() {
        Dialect::OpenCl => {
            o.directive("#define DEVICE");
            if precision == Precision::Double {
                o.directive("#if defined(cl_khr_fp64)");
                o.directive("#  pragma OPENCL EXTENSION cl_khr_fp64 : enable");
                o.directive("#elif defined(cl_amd_fp64)");
                o.directive("#  pragma OPENCL EXTENSION cl_amd_fp64 : enable");
                o.directive("#endif");
            }
        }
        Dialect::Cuda => {
            o.directive("#define DEVICE __device__");
        }
    }
    o.directive(format!("typedef {} real_t;", precision.real_type()));
    o.directive(format!("typedef {} real2_t;", precision.complex_type()));
}

/// Emits `mul(a, b)`, the complex product. With `invert`, `b` is conjugated first.
pub(crate) fn mul_code(o: &mut SourceBuilder, invert: bool) {
    o.function("real2_t", "mul", &[("real2_t", "a"), ("real2_t", "b")], |o| {
        if invert {
            o.line("real2_t r = {a.x * b.x + a.y * b.y, a.y * b.x - a.x * b.y};");
        } else {
            o.line("real2_t r = {a.x * b.x - a.y * b.y, a.y * b.x + a.x * b.y};");
        }
        o.line("return r;");
    });
}

/// Emits `conj(v)`
pub(crate) fn conj_code(o: &mut SourceBuilder) {
    o.function("real2_t", "conj", &[("real2_t", "v")], |o| {
        o.line("real2_t r = {v.x, -v.y};");
        o.line("return r;");
    });
}

/// Emits `twiddle(alpha)`, which returns `(cos(alpha), sin(alpha))`.
///
/// Double precision uses the combined `sincos` for accuracy. Single precision uses the fast native intrinsics,
/// which are much cheaper than `sincos` on most GPUs.
pub(crate) fn twiddle_code(o: &mut SourceBuilder) {
    let precision = o.precision();
    let dialect = o.dialect();
    o.function("real2_t", "twiddle", &[("real_t", "alpha")], |o| {
        match (precision, dialect) {
            (Precision::Double, Dialect::OpenCl) => {
                o.line("real_t cs, sn = sincos(alpha, &cs);");
            }
            (Precision::Double, Dialect::Cuda) => {
                o.line("real_t sn, cs;");
                o.line("sincos(alpha, &sn, &cs);");
            }
            (Precision::Single, Dialect::OpenCl) => {
                o.line("real_t cs = native_cos(alpha), sn = native_sin(alpha);");
            }
            (Precision::Single, Dialect::Cuda) => {
                o.line("real_t sn, cs;");
                o.line("__sincosf(alpha, &sn, &cs);");
            }
        }
        o.line("real2_t r = {cs, sn};");
        o.line("return r;");
    });
}

/// Emits a zero complex value into `target`
pub(crate) fn store_zero(o: &mut SourceBuilder, target: &str) {
    o.scope(|o| {
        o.line("real2_t zero = {0, 0};");
        o.line(format!("{} = zero;", target));
    });
}
