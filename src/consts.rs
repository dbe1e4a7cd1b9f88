//! Mathematical constants

/// 0.5 ln(2π)
pub const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;
/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;
/// 2π
pub const TWO_PI: f64 = std::f64::consts::TAU;
/// 2π²
pub const TWO_PI_SQUARED: f64 = 19.739_208_802_178_716;
