//! Psychrometric routines and the COP/power model.
//!
//! Everything here is pure and synchronous. Inputs outside the valid range
//! fail with [`PsychroError::Domain`] instead of producing NaN.
//!
//! Rounding is part of the contract: dew point, wet bulb and enthalpy are
//! rounded to 2 decimals so that equal inputs give bit-equal outputs.

use crate::error::PsychroError;
use crate::models::{DerivedMetrics, Effectiveness, PowerConsumption};

// ---

/// Standard atmospheric pressure (kPa).
pub const STANDARD_PRESSURE_KPA: f64 = 101.325;

const ABSOLUTE_ZERO_C: f64 = -273.15;

// Magnus coefficients
const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Specific heat of dry air (kJ/kg·K).
const CP_AIR: f64 = 1.006;
/// Specific heat of liquid water (kJ/kg·K).
const CP_WATER: f64 = 4.186;
/// Specific heat of water vapour (kJ/kg·K).
const CP_VAPOUR: f64 = 1.84;
/// Latent heat of vaporisation at 0 °C (kJ/kg).
const H_FG: f64 = 2501.0;

const WET_BULB_MAX_ITERATIONS: usize = 50;
const WET_BULB_TOLERANCE: f64 = 0.01;

// Performance model
const MIN_FAN_POWER_W: f64 = 90.0;
const MAX_FAN_POWER_W: f64 = 110.0;
const PUMP_POWER_W: f64 = 90.0;
/// Mass flow at 50% dry-fan duty (kg/s).
const BASE_MASS_FLOW: f64 = 0.259;
/// Specific heat used for the sensible cooling effect (kJ/kg·K).
const CP_COOLING: f64 = 1.005;

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Saturation vapour pressure (kPa), ASHRAE correlation in absolute temperature.
pub fn saturation_vapor_pressure(temp_c: f64) -> Result<f64, PsychroError> {
    // ---
    if !temp_c.is_finite() || temp_c <= ABSOLUTE_ZERO_C {
        return Err(PsychroError::domain(
            "saturation_vapor_pressure",
            format!("temperature {temp_c} °C"),
        ));
    }

    const C1: f64 = -5.674_535_9e3;
    const C2: f64 = 6.392_524_7;
    const C3: f64 = -9.677_843_0e-3;
    const C4: f64 = 6.221_570_1e-7;
    const C5: f64 = 2.074_782_5e-9;
    const C6: f64 = -9.484_024_0e-13;
    const C7: f64 = 4.163_501_9;

    let t = temp_c - ABSOLUTE_ZERO_C;
    let ln_pws = C1 / t + C2 + C3 * t + C4 * t * t + C5 * t.powi(3) + C6 * t.powi(4) + C7 * t.ln();

    Ok(ln_pws.exp() / 1000.0)
}

/// Humidity ratio (kg water / kg dry air).
pub fn humidity_ratio(temp_c: f64, rh: f64, pressure_kpa: f64) -> Result<f64, PsychroError> {
    // ---
    if !(0.0..=100.0).contains(&rh) {
        return Err(PsychroError::domain(
            "humidity_ratio",
            format!("relative humidity {rh}"),
        ));
    }

    let pw = (rh / 100.0) * saturation_vapor_pressure(temp_c)?;
    if pw >= pressure_kpa {
        return Err(PsychroError::domain(
            "humidity_ratio",
            format!("vapour pressure {pw:.3} kPa >= total pressure {pressure_kpa} kPa"),
        ));
    }

    Ok(0.62198 * pw / (pressure_kpa - pw))
}

/// Dew point (°C) by Magnus inversion, rounded to 2 decimals.
pub fn dew_point(temp_c: f64, rh: f64) -> Result<f64, PsychroError> {
    // ---
    if !temp_c.is_finite() || !rh.is_finite() || rh <= 0.0 {
        return Err(PsychroError::domain(
            "dew_point",
            format!("temperature {temp_c} °C, relative humidity {rh}"),
        ));
    }

    let gamma = (MAGNUS_A * temp_c) / (MAGNUS_B + temp_c) + (rh / 100.0).ln();
    Ok(round2((MAGNUS_B * gamma) / (MAGNUS_A - gamma)))
}

/// Wet-bulb temperature (°C) by bisection over the energy balance.
///
/// The result always lies in `[dew_point, dry_bulb]`.
pub fn wet_bulb(dry_bulb_c: f64, rh: f64) -> Result<f64, PsychroError> {
    // ---
    let dew = dew_point(dry_bulb_c, rh)?;

    if dew > dry_bulb_c || rh >= 100.0 {
        return Ok(dry_bulb_c);
    }

    let w = humidity_ratio(dry_bulb_c, rh, STANDARD_PRESSURE_KPA)?;

    let mut low = dew;
    let mut high = dry_bulb_c;
    let mut wb = (low + high) / 2.0;

    for _ in 0..WET_BULB_MAX_ITERATIONS {
        wb = (low + high) / 2.0;

        let ws = humidity_ratio(wb, 100.0, STANDARD_PRESSURE_KPA)?;
        let residual = (H_FG + CP_WATER * wb) * (ws - w) - CP_AIR * (dry_bulb_c - wb);

        if residual.abs() < WET_BULB_TOLERANCE {
            break;
        }
        if residual > 0.0 {
            high = wb;
        } else {
            low = wb;
        }
    }

    Ok(round2(wb.clamp(dew, dry_bulb_c)))
}

/// Moist-air enthalpy (kJ/kg dry air), rounded to 2 decimals.
pub fn enthalpy(temp_c: f64, rh: f64) -> Result<f64, PsychroError> {
    // ---
    let w = humidity_ratio(temp_c, rh, STANDARD_PRESSURE_KPA)?;
    Ok(round2(CP_AIR * temp_c + w * (H_FG + CP_VAPOUR * temp_c)))
}

/// Fan draw: zero when off, otherwise linear in [90, 110] W.
///
/// The jump at 0% duty is deliberate.
pub fn fan_power(speed_percent: f64) -> f64 {
    // ---
    if speed_percent == 0.0 {
        return 0.0;
    }
    MIN_FAN_POWER_W + (speed_percent / 100.0) * (MAX_FAN_POWER_W - MIN_FAN_POWER_W)
}

/// Mass flow (kg/s), linear in dry-fan duty. Not bounded above 100%.
pub fn mass_flow_rate(dry_fan_speed: f64) -> f64 {
    (dry_fan_speed / 50.0) * BASE_MASS_FLOW
}

/// Inputs to [`evaluate_performance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceInputs {
    pub inlet_temp: f64,
    pub outlet_temp: f64,
    pub inlet_rh: f64,
    pub outlet_rh: f64,
    pub dry_fan_speed: f64,
    pub wet_fan_speed: f64,
    pub pump_active: bool,
}

/// Full derived-metric pipeline for one reading.
pub fn evaluate_performance(input: &PerformanceInputs) -> Result<DerivedMetrics, PsychroError> {
    // ---
    let inlet_dew_point = dew_point(input.inlet_temp, input.inlet_rh)?;
    let outlet_dew_point = dew_point(input.outlet_temp, input.outlet_rh)?;
    let inlet_wet_bulb = wet_bulb(input.inlet_temp, input.inlet_rh)?;
    let outlet_wet_bulb = wet_bulb(input.outlet_temp, input.outlet_rh)?;
    let inlet_enthalpy = enthalpy(input.inlet_temp, input.inlet_rh)?;
    let outlet_enthalpy = enthalpy(input.outlet_temp, input.outlet_rh)?;

    let mass_flow = mass_flow_rate(input.dry_fan_speed);

    let dry_fan = fan_power(input.dry_fan_speed);
    let wet_fan = fan_power(input.wet_fan_speed);
    let pump = if input.pump_active { PUMP_POWER_W } else { 0.0 };
    let total = dry_fan + wet_fan + pump;

    let temp_drop = input.inlet_temp - input.outlet_temp;
    let cooling_effect = mass_flow * CP_COOLING * temp_drop * 1000.0;
    let cop = if total > 0.0 {
        cooling_effect.abs() / total
    } else {
        0.0
    };

    // Denominators go to zero near saturation; left unguarded.
    let wet_bulb_eff = temp_drop / (input.inlet_temp - inlet_wet_bulb);
    let dew_point_eff = temp_drop / (input.inlet_temp - inlet_dew_point);
    if !wet_bulb_eff.is_finite() || !dew_point_eff.is_finite() {
        tracing::debug!(
            inlet = input.inlet_temp,
            inlet_wet_bulb,
            inlet_dew_point,
            "effectiveness undefined near saturation"
        );
    }

    Ok(DerivedMetrics {
        inlet_dew_point,
        outlet_dew_point,
        inlet_wet_bulb,
        outlet_wet_bulb,
        inlet_enthalpy,
        outlet_enthalpy,
        mass_flow_rate: round_to(mass_flow, 3),
        cooling_effect: round2(cooling_effect),
        cop: round2(cop),
        power_consumption: PowerConsumption {
            total: round2(total),
            dry_fan: round2(dry_fan),
            wet_fan: round2(wet_fan),
            pump: round2(pump),
        },
        effectiveness: Effectiveness {
            wet_bulb: round2(wet_bulb_eff),
            dew_point: round2(dew_point_eff),
        },
    })
}
