use num_complex::Complex;
use num_traits::{Float, NumCast};

use crate::math_utils::chirp_index;
use crate::FftDirection;

/// Computes the twiddle factor `exp(-2 pi i * index / fft_len)`, conjugated for inverse FFTs.
///
/// Kernels evaluate their twiddles on the device, so this is used for the constants baked into small DFT bodies
/// and to check device results on the host.
pub fn compute_twiddle<T: Float>(
    index: usize,
    fft_len: usize,
    direction: FftDirection,
) -> Complex<T> {
    let constant = -2f64 * std::f64::consts::PI / fft_len as f64;
    // index * constant can lose precision for large indexes, so reduce it first
    let angle = constant * (index % fft_len) as f64;

    let result = rotation(angle);

    match direction {
        FftDirection::Forward => result,
        FftDirection::Inverse => result.conj(),
    }
}

/// Returns `(cos(alpha), sin(alpha))`, the rotation the device-side `twiddle()` helper computes
pub fn rotation<T: Float>(alpha: f64) -> Complex<T> {
    Complex::new(
        <T as NumCast>::from(alpha.cos()).unwrap_or_else(T::zero),
        <T as NumCast>::from(alpha.sin()).unwrap_or_else(T::zero),
    )
}

/// Computes element `index` of the Bluestein chirp of length `len`: `exp(sign * pi * i * (index^2 mod 2 len) / len)`,
/// with the sign taken from [`FftDirection::chirp_sign`].
pub fn chirp<T: Float>(index: usize, len: usize, direction: FftDirection) -> Complex<T> {
    let xx = chirp_index(index, len) as f64;
    rotation(direction.chirp_sign() * std::f64::consts::PI * xx / len as f64)
}
