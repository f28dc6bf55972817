use std::collections::VecDeque;
use thiserror::Error;

/// Stopping rules and step control for [`minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizerSettings {
    pub max_iterations: usize,
    /// Converged once the RMS gradient drops to this value.
    pub gradient_tolerance: f64,
    /// Converged once an accepted step changes the objective by at most this much.
    pub energy_tolerance: f64,
    /// Number of correction pairs kept by L-BFGS.
    pub history: usize,
    /// Largest displacement of any single coordinate in one step.
    pub max_step: f64,
}

impl Default for MinimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            gradient_tolerance: 0.25,
            energy_tolerance: 1e-6,
            history: 8,
            max_step: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationReport {
    pub value: f64,
    pub iterations: usize,
    pub rms_gradient: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum MinimizeError<E> {
    #[error("No convergence within {iterations} iterations (RMS gradient {rms_gradient:.4})")]
    NotConverged { iterations: usize, rms_gradient: f64 },
    #[error("Objective became non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("Objective evaluation failed: {0}")]
    Objective(E),
}

const ARMIJO_C1: f64 = 1e-4;
const MIN_STEP: f64 = 1e-12;

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (dot(values, values) / values.len() as f64).sqrt()
}

fn two_loop(gradient: &[f64], history: &VecDeque<(Vec<f64>, Vec<f64>, f64)>) -> Vec<f64> {
    let mut q = gradient.to_vec();
    let mut alphas = Vec::with_capacity(history.len());
    for (s, y, rho) in history.iter().rev() {
        let alpha = rho * dot(s, &q);
        q.iter_mut().zip(y).for_each(|(qi, yi)| *qi -= alpha * yi);
        alphas.push(alpha);
    }
    let gamma = history
        .back()
        .map(|(s, y, _)| dot(s, y) / dot(y, y).max(f64::MIN_POSITIVE))
        .unwrap_or(1.0);
    q.iter_mut().for_each(|qi| *qi *= gamma);
    for ((s, y, rho), alpha) in history.iter().zip(alphas.into_iter().rev()) {
        let beta = rho * dot(y, &q);
        q.iter_mut().zip(s).for_each(|(qi, si)| *qi += (alpha - beta) * si);
    }
    q.iter_mut().for_each(|qi| *qi = -*qi);
    q
}

/// Minimizes `objective` in place with L-BFGS and a backtracking Armijo line
/// search.
///
/// `objective` returns the value and gradient at a point. A line search that
/// cannot lower the value ends the run: converged if the gradient is already
/// within tolerance, otherwise `NotConverged`.
pub fn minimize<E, F>(
    x: &mut [f64],
    settings: &MinimizerSettings,
    mut objective: F,
) -> Result<MinimizationReport, MinimizeError<E>>
where
    F: FnMut(&[f64]) -> Result<(f64, Vec<f64>), E>,
{
    let (mut value, mut gradient) = objective(x).map_err(MinimizeError::Objective)?;
    if !value.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
        return Err(MinimizeError::NonFinite { iteration: 0 });
    }
    if rms(&gradient) <= settings.gradient_tolerance {
        return Ok(MinimizationReport {
            value,
            iterations: 0,
            rms_gradient: rms(&gradient),
        });
    }

    let mut history: VecDeque<(Vec<f64>, Vec<f64>, f64)> = VecDeque::with_capacity(settings.history);
    let mut trial = vec![0.0; x.len()];

    for iteration in 1..=settings.max_iterations {
        let mut direction = two_loop(&gradient, &history);
        let mut slope = dot(&gradient, &direction);
        if slope >= 0.0 {
            history.clear();
            direction = gradient.iter().map(|g| -g).collect();
            slope = -dot(&gradient, &gradient);
        }

        let largest = direction.iter().fold(0.0f64, |m, d| m.max(d.abs()));
        let mut step = if largest > settings.max_step {
            settings.max_step / largest
        } else {
            1.0
        };

        let accepted = loop {
            trial
                .iter_mut()
                .zip(x.iter().zip(&direction))
                .for_each(|(t, (xi, di))| *t = xi + step * di);
            let (trial_value, trial_gradient) = objective(&trial).map_err(MinimizeError::Objective)?;
            if trial_value.is_finite()
                && trial_gradient.iter().all(|g| g.is_finite())
                && trial_value <= value + ARMIJO_C1 * step * slope
            {
                break Some((trial_value, trial_gradient));
            }
            step *= 0.5;
            if step < MIN_STEP {
                break None;
            }
        };

        let Some((new_value, new_gradient)) = accepted else {
            let rms_gradient = rms(&gradient);
            if rms_gradient > settings.gradient_tolerance {
                return Err(MinimizeError::NotConverged {
                    iterations: iteration,
                    rms_gradient,
                });
            }
            return Ok(MinimizationReport {
                value,
                iterations: iteration,
                rms_gradient,
            });
        };

        let s: Vec<f64> = trial.iter().zip(x.iter()).map(|(t, xi)| t - xi).collect();
        let y: Vec<f64> = new_gradient.iter().zip(&gradient).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if history.len() == settings.history {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let change = value - new_value;
        x.copy_from_slice(&trial);
        value = new_value;
        gradient = new_gradient;

        let rms_gradient = rms(&gradient);
        if rms_gradient <= settings.gradient_tolerance || change.abs() <= settings.energy_tolerance {
            return Ok(MinimizationReport {
                value,
                iterations: iteration,
                rms_gradient,
            });
        }
    }

    Err(MinimizeError::NotConverged {
        iterations: settings.max_iterations,
        rms_gradient: rms(&gradient),
    })
}

/// Central finite-difference gradient of `f` at `x`.
pub fn numerical_gradient<E, F>(x: &[f64], step: f64, mut f: F) -> Result<Vec<f64>, E>
where
    F: FnMut(&[f64]) -> Result<f64, E>,
{
    let mut probe = x.to_vec();
    let mut gradient = vec![0.0; x.len()];
    for i in 0..x.len() {
        let original = probe[i];
        probe[i] = original + step;
        let plus = f(&probe)?;
        probe[i] = original - step;
        let minus = f(&probe)?;
        probe[i] = original;
        gradient[i] = (plus - minus) / (2.0 * step);
    }
    Ok(gradient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn rosenbrock(x: &[f64]) -> Result<(f64, Vec<f64>), Infallible> {
        let (a, b) = (x[0], x[1]);
        let value = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
        let grad = vec![
            -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
            200.0 * (b - a * a),
        ];
        Ok((value, grad))
    }

    #[test]
    fn minimizes_quadratic_bowl() {
        let mut x = vec![3.0, -2.0, 1.0];
        let settings = MinimizerSettings {
            gradient_tolerance: 1e-8,
            energy_tolerance: 0.0,
            ..Default::default()
        };
        let report = minimize(&mut x, &settings, |p: &[f64]| -> Result<_, Infallible> {
            let value = p.iter().map(|v| (v - 1.0).powi(2)).sum();
            let grad = p.iter().map(|v| 2.0 * (v - 1.0)).collect();
            Ok((value, grad))
        })
        .unwrap();
        assert!(report.value < 1e-12);
        for xi in x {
            assert!((xi - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn minimizes_rosenbrock_valley() {
        let mut x = vec![-1.2, 1.0];
        let settings = MinimizerSettings {
            gradient_tolerance: 1e-6,
            energy_tolerance: 0.0,
            max_step: 1.0,
            ..Default::default()
        };
        let report = minimize(&mut x, &settings, rosenbrock).unwrap();
        assert!(report.value < 1e-8, "value = {}", report.value);
        assert!((x[0] - 1.0).abs() < 1e-3);
        assert!((x[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn unbounded_objective_fails_to_converge() {
        let mut x = vec![0.0; 4];
        let settings = MinimizerSettings {
            max_iterations: 25,
            ..Default::default()
        };
        let result = minimize(&mut x, &settings, |p: &[f64]| -> Result<_, Infallible> {
            Ok((-p.iter().sum::<f64>(), vec![-1.0; p.len()]))
        });
        assert!(matches!(
            result,
            Err(MinimizeError::NotConverged { iterations: 25, .. })
        ));
    }

    #[test]
    fn stalled_line_search_with_steep_gradient_is_not_converged() {
        // The reported gradient points uphill, so no step lowers the value.
        let mut x = vec![3.0];
        let result = minimize(&mut x, &MinimizerSettings::default(), |p: &[f64]| -> Result<_, Infallible> {
            Ok((p[0] * p[0], vec![-2.0 * p[0]]))
        });
        match result {
            Err(MinimizeError::NotConverged { iterations, rms_gradient }) => {
                assert_eq!(iterations, 1);
                assert!((rms_gradient - 6.0).abs() < 1e-12);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(x, vec![3.0]);
    }

    #[test]
    fn stalled_line_search_within_tolerance_converges() {
        let mut x = vec![0.05];
        let report = minimize(&mut x, &MinimizerSettings::default(), |p: &[f64]| -> Result<_, Infallible> {
            Ok((p[0] * p[0], vec![-2.0 * p[0]]))
        });
        assert_eq!(report.map(|r| r.iterations), Ok(0));
    }

    #[test]
    fn non_finite_start_is_reported() {
        let mut x = vec![0.0; 2];
        let result = minimize(&mut x, &MinimizerSettings::default(), |_: &[f64]| -> Result<_, Infallible> {
            Ok((f64::NAN, vec![0.0; 2]))
        });
        assert_eq!(result, Err(MinimizeError::NonFinite { iteration: 0 }));
    }

    #[test]
    fn objective_errors_are_propagated() {
        let mut x = vec![0.0; 2];
        let result: Result<_, MinimizeError<&str>> =
            minimize(&mut x, &MinimizerSettings::default(), |_: &[f64]| Err("boom"));
        assert_eq!(result, Err(MinimizeError::Objective("boom")));
    }

    #[test]
    fn numerical_gradient_matches_analytic() {
        let x = vec![0.3, -0.7];
        let numeric = numerical_gradient(&x, 1e-5, |p: &[f64]| rosenbrock(p).map(|(v, _)| v)).unwrap();
        let (_, analytic) = rosenbrock(&x).unwrap();
        for (n, a) in numeric.iter().zip(&analytic) {
            assert!((n - a).abs() < 1e-4);
        }
    }

    #[test]
    fn rms_of_empty_slice_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[3.0, 4.0]) - (12.5f64).sqrt()).abs() < 1e-12);
    }
}
