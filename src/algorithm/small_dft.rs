#[cfg(test)]
use num_complex::Complex;

use crate::common::FftError;
use crate::source::{real_literal, SourceBuilder};
use crate::FftDirection;

/// The largest radix the small-DFT library can generate a kernel body for
pub const MAX_RADIX: usize = 16;

/// Returns true if a radix stage can be generated for `radix`
pub fn is_supported_radix(radix: usize) -> bool {
    (2..=MAX_RADIX).contains(&radix)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Op {
    // v[index] *= exp(i * angle)
    Rotate { index: usize, angle: f64 },
    // (v[a], v[b]) = (v[a] + v[b], v[a] - v[b])
    Butterfly { a: usize, b: usize },
}

#[derive(Clone, Debug, PartialEq)]
enum Network {
    // iterative decimation in time. `order[k]` is the variable holding output k
    Radix2 { ops: Vec<Op>, order: Vec<usize> },
    // unrolled direct DFT
    Direct,
}

/// The unrolled, in-place DFT body for one radix.
///
/// The same description is used both to emit the device function `dftR` and to evaluate it on the host, so tests can
/// check every emitted network against a direct DFT.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SmallDft {
    len: usize,
    direction: FftDirection,
    network: Network,
}

impl SmallDft {
    pub fn new(len: usize, direction: FftDirection) -> Result<Self, FftError> {
        if !is_supported_radix(len) {
            return Err(FftError::UnsupportedRadix(len));
        }
        let network = if len.is_power_of_two() {
            Self::radix2_network(len, direction)
        } else {
            Network::Direct
        };
        Ok(Self {
            len,
            direction,
            network,
        })
    }

    fn radix2_network(len: usize, direction: FftDirection) -> Network {
        let bits = len.trailing_zeros();
        // variable feeding position `i` of the decimation-in-time network
        let order: Vec<usize> = (0..len)
            .map(|i| i.reverse_bits() >> (usize::BITS - bits))
            .collect();
        let sign = match direction {
            FftDirection::Forward => -1.0,
            FftDirection::Inverse => 1.0,
        };

        let mut ops = Vec::new();
        let mut size = 2;
        while size <= len {
            let half = size / 2;
            for group in (0..len).step_by(size) {
                for j in 0..half {
                    let a = order[group + j];
                    let b = order[group + j + half];
                    if j != 0 {
                        ops.push(Op::Rotate {
                            index: b,
                            angle: sign * 2.0 * std::f64::consts::PI * j as f64 / size as f64,
                        });
                    }
                    ops.push(Op::Butterfly { a, b });
                }
            }
            size *= 2;
        }
        Network::Radix2 { ops, order }
    }

    /// Name of the emitted device function
    pub fn function_name(&self) -> String {
        format!("dft{}", self.len)
    }

    // angle of the direct DFT term linking input `e` to output `k`
    fn direct_angle(&self, e: usize, k: usize) -> f64 {
        let sign = match self.direction {
            FftDirection::Forward => -1.0,
            FftDirection::Inverse => 1.0,
        };
        sign * 2.0 * std::f64::consts::PI * ((e * k) % self.len) as f64 / self.len as f64
    }

    /// Emits `DEVICE void dftR(real2_t *v0, ..., real2_t *vR-1)`, which transforms its arguments in place
    pub fn emit(&self, o: &mut SourceBuilder) {
        let names: Vec<String> = (0..self.len).map(|i| format!("*v{}", i)).collect();
        let params: Vec<(&str, &str)> = names.iter().map(|name| ("real2_t", name.as_str())).collect();

        o.function("void", &self.function_name(), &params, |o| {
            for i in 0..self.len {
                o.line(format!("real2_t a{i} = *v{i};", i = i));
            }
            match &self.network {
                Network::Radix2 { ops, order } => {
                    for op in ops {
                        emit_op(o, *op);
                    }
                    for (k, var) in order.iter().enumerate() {
                        o.line(format!("*v{} = a{};", k, var));
                    }
                }
                Network::Direct => {
                    for k in 0..self.len {
                        o.line(format!("real2_t b{k} = a0;", k = k));
                        for e in 1..self.len {
                            let angle = self.direct_angle(e, k);
                            if angle == 0.0 {
                                o.line(format!("b{k}.x += a{e}.x; b{k}.y += a{e}.y;", k = k, e = e));
                            } else {
                                let c = real_literal(angle.cos());
                                let s = real_literal(angle.sin());
                                o.line(format!(
                                    "b{k}.x += {c} * a{e}.x - {s} * a{e}.y; b{k}.y += {s} * a{e}.x + {c} * a{e}.y;",
                                    k = k,
                                    e = e,
                                    c = c,
                                    s = s
                                ));
                            }
                        }
                    }
                    for k in 0..self.len {
                        o.line(format!("*v{k} = b{k};", k = k));
                    }
                }
            }
        });
    }

    /// Evaluates the body on the host, exactly as the emitted function computes it
    #[cfg(test)]
    pub fn apply(&self, buffer: &mut [Complex<f64>]) {
        assert_eq!(buffer.len(), self.len);
        match &self.network {
            Network::Radix2 { ops, order } => {
                let mut vars = buffer.to_vec();
                for op in ops {
                    match *op {
                        Op::Rotate { index, angle } => vars[index] = rotate(vars[index], angle),
                        Op::Butterfly { a, b } => {
                            let (x, y) = (vars[a], vars[b]);
                            vars[a] = x + y;
                            vars[b] = x - y;
                        }
                    }
                }
                for (k, var) in order.iter().enumerate() {
                    buffer[k] = vars[*var];
                }
            }
            Network::Direct => {
                let input = buffer.to_vec();
                for (k, output) in buffer.iter_mut().enumerate() {
                    *output = input[0];
                    for (e, value) in input.iter().enumerate().skip(1) {
                        let angle = self.direct_angle(e, k);
                        *output += Complex::new(angle.cos(), angle.sin()) * value;
                    }
                }
            }
        }
    }
}

fn is_quarter_turn(angle: f64) -> Option<bool> {
    const EPSILON: f64 = 1e-12;
    let half_pi = std::f64::consts::FRAC_PI_2;
    if (angle - half_pi).abs() < EPSILON {
        Some(true)
    } else if (angle + half_pi).abs() < EPSILON {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
fn rotate(value: Complex<f64>, angle: f64) -> Complex<f64> {
    match is_quarter_turn(angle) {
        Some(true) => Complex::new(-value.im, value.re),
        Some(false) => Complex::new(value.im, -value.re),
        None => value * Complex::new(angle.cos(), angle.sin()),
    }
}

fn emit_op(o: &mut SourceBuilder, op: Op) {
    match op {
        Op::Rotate { index, angle } => match is_quarter_turn(angle) {
            // multiply by i
            Some(true) => {
                o.line(format!("{{ real_t t = a{i}.x; a{i}.x = -a{i}.y; a{i}.y = t; }}", i = index));
            }
            // multiply by -i
            Some(false) => {
                o.line(format!("{{ real_t t = a{i}.x; a{i}.x = a{i}.y; a{i}.y = -t; }}", i = index));
            }
            None => {
                o.line(format!(
                    "{{ real_t t = a{i}.x * {c} - a{i}.y * {s}; a{i}.y = a{i}.x * {s} + a{i}.y * {c}; a{i}.x = t; }}",
                    i = index,
                    c = real_literal(angle.cos()),
                    s = real_literal(angle.sin())
                ));
            }
        },
        Op::Butterfly { a, b } => {
            o.line(format!(
                "{{ real2_t t = a{a}; a{a}.x = t.x + a{b}.x; a{a}.y = t.y + a{b}.y; a{b}.x = t.x - a{b}.x; a{b}.y = t.y - a{b}.y; }}",
                a = a,
                b = b
            ));
        }
    }
}
