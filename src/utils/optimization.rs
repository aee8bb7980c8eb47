//! Nelder-Mead simplex minimiser used for model parameter estimation.

use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of objective values across the simplex falls below this.
    pub tolerance: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            initial_step: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimise `objective` starting from `initial`.
///
/// Non-finite objective values are ordered after every finite value, so the
/// simplex walks away from overflowing regions instead of stalling on them.
/// `bounds`, when given, clamps every candidate vertex per dimension.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        let value = objective(initial);
        return NelderMeadResult {
            point: vec![],
            value,
            iterations: 0,
            converged: true,
        };
    }

    let clamp = |point: Vec<f64>| -> Vec<f64> {
        match bounds {
            None => point,
            Some(b) => point
                .into_iter()
                .enumerate()
                .map(|(i, x)| match b.get(i) {
                    Some(&(lo, hi)) => x.clamp(lo, hi),
                    None => x,
                })
                .collect(),
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial.to_vec()));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        simplex.push(clamp(vertex));
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| compare(values[a], values[b]));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if values[best].is_finite()
            && values[worst].is_finite()
            && values[worst] - values[best] < config.tolerance
        {
            converged = true;
            break;
        }

        let centroid = centroid_without(&simplex, worst);
        let spread = simplex
            .iter()
            .map(|v| distance(v, &centroid))
            .fold(0.0, f64::max);
        if spread < config.tolerance {
            converged = values[best].is_finite();
            break;
        }

        let reflected = clamp(towards(&centroid, &simplex[worst], -config.reflection));
        let reflected_value = objective(&reflected);

        if lt(reflected_value, values[best]) {
            let expanded = clamp(towards(&centroid, &reflected, config.expansion));
            let expanded_value = objective(&expanded);
            if lt(expanded_value, reflected_value) {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if lt(reflected_value, values[second_worst]) {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (contracted, threshold) = if lt(reflected_value, values[worst]) {
            (
                clamp(towards(&centroid, &reflected, config.contraction)),
                reflected_value,
            )
        } else {
            (
                clamp(towards(&centroid, &simplex[worst], config.contraction)),
                values[worst],
            )
        };
        let contracted_value = objective(&contracted);
        if !lt(threshold, contracted_value) {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in (0..=n).filter(|&i| i != best) {
            let shrunk = towards(&anchor, &simplex[i], config.shrink);
            simplex[i] = clamp(shrunk);
            values[i] = objective(&simplex[i]);
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| compare(values[a], values[b]))
        .unwrap_or(0);

    NelderMeadResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}

/// Total order on objective values with NaN and infinities last.
fn compare(a: f64, b: f64) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

fn lt(a: f64, b: f64) -> bool {
    compare(a, b) == Ordering::Less
}

fn centroid_without(simplex: &[Vec<f64>], skip: usize) -> Vec<f64> {
    let dims = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut centroid = vec![0.0; dims];
    for vertex in simplex.iter().enumerate().filter(|(i, _)| *i != skip).map(|(_, v)| v) {
        for (c, x) in centroid.iter_mut().zip(vertex) {
            *c += x;
        }
    }
    centroid.iter_mut().for_each(|c| *c /= count);
    centroid
}

/// `origin + factor * (point - origin)`.
fn towards(origin: &[f64], point: &[f64], factor: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| o + factor * (p - o))
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimises_quadratic() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
            &[0.0, 0.0],
            None,
            &NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert_relative_eq!(result.point[0], 2.0, epsilon = 1e-3);
        assert_relative_eq!(result.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_respects_bounds() {
        let bounds = [(-0.99, 0.99)];
        let result = nelder_mead(
            |x| (x[0] - 5.0).powi(2),
            &[0.1],
            Some(&bounds),
            &NelderMeadConfig::default(),
        );

        assert!(result.point[0] <= 0.99);
        assert_relative_eq!(result.point[0], 0.99, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_objective_converges_immediately() {
        let result = nelder_mead(|_| 0.0, &[0.1, 0.1, 0.1], None, &NelderMeadConfig::default());

        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.point, vec![0.1, 0.1, 0.1]);
    }

    #[test]
    fn test_walks_away_from_non_finite_region() {
        let result = nelder_mead(
            |x| if x[0] > 1.0 { f64::INFINITY } else { (x[0] - 0.5).powi(2) },
            &[0.9],
            None,
            &NelderMeadConfig::default(),
        );

        assert!(result.value.is_finite());
        assert_relative_eq!(result.point[0], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_reports_non_convergence() {
        let config = NelderMeadConfig {
            max_iter: 3,
            ..Default::default()
        };
        let result = nelder_mead(|x| (x[0] - 100.0).powi(2), &[0.0], None, &config);

        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }
}
