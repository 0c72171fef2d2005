/// Speed of light in m.s⁻¹
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Milliarcseconds to radians
pub const MAS2R: f64 = 4.848_136_811_095_36E-9;

/// Radians to milliarcseconds
pub const R2MAS: f64 = 1.0 / MAS2R;

/// Milliseconds of UT1 to radians of Earth rotation
pub const MTS2R: f64 = 7.272_205_216_643_04E-8;

/// Seconds to milliseconds of time
pub const S2MTS: f64 = 1.0E3;

/// Seconds per day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Distance travelled by light during one millisecond of receiver
/// clock wraparound, in meters.
pub const CLOCK_WRAP_DISTANCE_M: f64 = SPEED_OF_LIGHT_M_S * 1.0E-3;
