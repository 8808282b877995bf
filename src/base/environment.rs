use super::ParamEnvironment;

/// Returns the nanoparticle reinforcement factor (1 + 5φ + 18φ²)
pub fn filler_factor(wnp: f64) -> f64 {
    1.0 + 5.0 * wnp + 18.0 * wnp * wnp
}

/// Returns the moisture softening factor α_Z(ζ) = exp(−c_Z ζ)
pub fn alpha_zita(zita: f64, c_zita: f64) -> f64 {
    f64::exp(-c_zita * zita)
}

/// Returns the thermal softening factor α_T(T) = exp(−c_T (T − T_ref))
pub fn alpha_temperature(temperature: f64, temperature_ref: f64, c_temperature: f64) -> f64 {
    f64::exp(-c_temperature * (temperature - temperature_ref))
}

/// Computes the environmental amplification factor applied to the network moduli
///
/// ```text
/// X = (1 + 5φ + 18φ²) · α_Z(ζ) · α_T(T)
/// ```
pub fn amplification(env: &ParamEnvironment) -> f64 {
    filler_factor(env.wnp)
        * alpha_zita(env.zita, env.c_zita)
        * alpha_temperature(env.temperature, env.temperature_ref, env.c_temperature)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
