use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only at the wall-clock boundary and for
/// content loading, never inside a tick.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Ratio `num / den` as a Fixed64 in `[0, 1]`. Returns zero when `den` is zero.
#[inline]
pub fn ratio(num: u64, den: u64) -> Fixed64 {
    if den == 0 {
        return Fixed64::ZERO;
    }
    let num = num.min(den);
    Fixed64::saturating_from_num(num) / Fixed64::saturating_from_num(den)
}
