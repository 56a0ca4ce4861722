use num_integer::Integer;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct PrimeFactor {
    pub value: usize,
    pub count: u32,
}

/// Factors an integer into its prime factors, in ascending order.
pub fn prime_factors(mut n: usize) -> Vec<PrimeFactor> {
    assert!(n > 0, "Cannot factor zero");
    let mut result = Vec::new();

    let trailing_zeros = n.trailing_zeros();
    if trailing_zeros > 0 {
        result.push(PrimeFactor {
            value: 2,
            count: trailing_zeros,
        });
        n >>= trailing_zeros;
    }
    if n > 1 {
        let mut divisor = 3;
        let mut limit = (n as f32).sqrt() as usize + 1;
        while divisor < limit {
            let mut count = 0;
            while n % divisor == 0 {
                n /= divisor;
                count += 1;
            }

            if count > 0 {
                result.push(PrimeFactor {
                    value: divisor,
                    count,
                });
            }

            // recalculate the limit to reduce the amount of other factors we need to check
            limit = (n as f32).sqrt() as usize + 1;
            divisor += 2;
        }

        if n > 1 {
            result.push(PrimeFactor { value: n, count: 1 });
        }
    }

    result
}

/// Returns the smallest multiple of `align` that is greater than or equal to `x`.
///
/// Launch extents are rounded up with this function so that they divide evenly into work-groups.
/// The kernels mask the padded work-items with explicit bounds checks.
///
/// ```
/// use rustfft_gpu::alignup;
/// assert_eq!(alignup(0, 64), 0);
/// assert_eq!(alignup(3, 64), 64);
/// assert_eq!(alignup(128, 64), 128);
/// ```
pub fn alignup(x: usize, align: usize) -> usize {
    assert!(align > 0, "alignment must be at least 1");
    Integer::div_ceil(&x, &align) * align
}

/// Returns the length of the power-of-two convolution Bluestein's algorithm uses for a factor of size `len`:
/// the smallest power of two that is at least `2 * len - 1`.
pub fn bluestein_conv_len(len: usize) -> usize {
    assert!(len > 0, "Bluestein's algorithm needs a nonzero length");
    (2 * len - 1).next_power_of_two()
}

/// Computes `x^2 mod 2n` the way the chirp kernel does, with a double-width intermediate so large indexes can't overflow
pub fn chirp_index(x: usize, n: usize) -> u64 {
    ((x as u128 * x as u128) % (2 * n as u128)) as u64
}
