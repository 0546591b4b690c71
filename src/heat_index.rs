//! Apparent ("feels-like") temperature.
//!
//! Steadman-style approximation from dry-bulb temperature and relative
//! humidity:
//!
//! ```text
//! feels_like = t + 0.5555 * (6.11 * exp(5417.753 * (1/273.16 - 1/(273.15 + t))) * (rh/100) - 10)
//! ```
//!
//! Inputs are °C and percent (0-100); the output is °C.

use crate::error::CoreError;

// ---

const VAPOUR_COEFF: f64 = 6.11;
const LATENT_RATIO: f64 = 5417.753;
const TRIPLE_POINT_K: f64 = 273.16;
const KELVIN_OFFSET: f64 = 273.15;

/// Evaluate the formula, failing on non-finite inputs, the pole at
/// -273.15 °C, or any non-finite intermediate.
pub fn try_feels_like(temp_c: f64, relative_humidity_pct: f64) -> Result<f64, CoreError> {
    // ---
    let domain_error = || CoreError::FormulaDomain {
        temp_c,
        humidity: relative_humidity_pct,
    };
    if !temp_c.is_finite() || !relative_humidity_pct.is_finite() {
        return Err(domain_error());
    }

    let kelvin = KELVIN_OFFSET + temp_c;
    if kelvin == 0.0 {
        return Err(domain_error());
    }
    let exponent = LATENT_RATIO * (1.0 / TRIPLE_POINT_K - 1.0 / kelvin);
    let growth = exponent.exp();
    if !exponent.is_finite() || !growth.is_finite() {
        return Err(domain_error());
    }

    let vapour_pressure = VAPOUR_COEFF * growth * (relative_humidity_pct / 100.0);
    let value = temp_c + 0.5555 * (vapour_pressure - 10.0);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(domain_error())
    }
}

/// Feels-like temperature that never fails: returns `temp_c` unchanged when
/// humidity is missing or the formula is out of domain.
pub fn feels_like(temp_c: f64, relative_humidity_pct: Option<f64>) -> f64 {
    // ---
    match relative_humidity_pct {
        Some(rh) => try_feels_like(temp_c, rh).unwrap_or(temp_c),
        None => temp_c,
    }
}

/// [`feels_like`] lifted over an optional temperature.
pub fn feels_like_opt(temp_c: Option<f64>, relative_humidity_pct: Option<f64>) -> Option<f64> {
    temp_c.map(|t| feels_like(t, relative_humidity_pct))
}
