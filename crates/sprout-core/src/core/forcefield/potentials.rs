pub(crate) const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

const MIN_DISTANCE: f64 = 1e-6;

#[cfg(test)]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    lennard_jones_12_6_with_derivative(dist, r_min, well_depth).0
}

/// 12-6 Lennard-Jones in r_min form and its derivative with respect to
/// distance.
#[inline]
pub fn lennard_jones_12_6_with_derivative(dist: f64, r_min: f64, well_depth: f64) -> (f64, f64) {
    if dist < MIN_DISTANCE {
        return (1e10, 0.0);
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    let energy = well_depth * (rho12 - 2.0 * rho6);
    let derivative = -12.0 * well_depth * (rho12 - rho6) / dist;
    (energy, derivative)
}

#[cfg(test)]
pub fn coulomb(dist: f64, q1: f64, q2: f64, dielectric: f64) -> f64 {
    coulomb_with_derivative(dist, q1, q2, dielectric).0
}

#[inline]
pub fn coulomb_with_derivative(dist: f64, q1: f64, q2: f64, dielectric: f64) -> (f64, f64) {
    if dist < MIN_DISTANCE {
        return (q1.signum() * q2.signum() * 1e10, 0.0);
    }
    let energy = COULOMB_CONSTANT * q1 * q2 / (dielectric * dist);
    (energy, -energy / dist)
}

/// Applies an energy shift so a pair potential reaches zero at `cutoff`
/// and vanishes beyond it. The derivative is unchanged inside the cutoff.
#[inline]
pub fn shift_to_cutoff<F>(dist: f64, cutoff: f64, potential_fn: F) -> (f64, f64)
where
    F: Fn(f64) -> (f64, f64),
{
    if dist >= cutoff {
        return (0.0, 0.0);
    }
    let (energy, derivative) = potential_fn(dist);
    let (at_cutoff, _) = potential_fn(cutoff);
    (energy - at_cutoff, derivative)
}

/// `k (x - x0)^2` and its derivative.
#[inline]
pub fn harmonic(value: f64, equilibrium: f64, force_constant: f64) -> (f64, f64) {
    let delta = value - equilibrium;
    (force_constant * delta * delta, 2.0 * force_constant * delta)
}

/// Behler cosine cutoff `0.5 (cos(pi r / rc) + 1)` and its derivative.
#[inline]
pub fn cosine_cutoff(dist: f64, cutoff: f64) -> (f64, f64) {
    if dist >= cutoff {
        return (0.0, 0.0);
    }
    let arg = std::f64::consts::PI * dist / cutoff;
    (
        0.5 * (arg.cos() + 1.0),
        -0.5 * std::f64::consts::PI / cutoff * arg.sin(),
    )
}
