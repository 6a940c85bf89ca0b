//! Shared statistical numerics for the score kernels.
//!
//! Self-contained implementations of the handful of special functions the
//! kernels need: the normal survival function, the asymptotic Kolmogorov
//! distribution, and the digamma function for the k-NN MI estimator.

/// Clamp a probability into `[f64::MIN_POSITIVE, 1]`.
///
/// Zero and NaN both collapse to the smallest positive real, so `-ln(p)`
/// stays finite on every path.
#[inline]
pub(crate) fn clamp_prob(p: f64) -> f64 {
    if p.is_nan() {
        return f64::MIN_POSITIVE;
    }
    p.clamp(f64::MIN_POSITIVE, 1.0)
}

/// `-ln(p)` after clamping.
#[inline]
pub(crate) fn neg_log_p(p: f64) -> f64 {
    -clamp_prob(p).ln()
}

/// Complementary error function.
///
/// Chebyshev-fitted approximation with relative error below `1.2e-7` for
/// all arguments; the `exp(-x^2)` prefactor keeps the tail scale right, so
/// `-ln` of the result is usable far into the tail.
pub(crate) fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587
                                    + t * (-0.82215223 + t * 0.17087277))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

/// Upper tail of the standard normal distribution, `P(Z >= z)`.
#[inline]
pub(crate) fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Lower tail of the standard normal distribution, `P(Z <= z)`.
#[inline]
pub(crate) fn normal_cdf(z: f64) -> f64 {
    normal_sf(-z)
}

/// Asymptotic Kolmogorov survival function,
/// `Q(lambda) = 2 * sum_{j>=1} (-1)^{j-1} exp(-2 j^2 lambda^2)`.
pub(crate) fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for j in 1..=100 {
        let term = (-2.0 * (j as f64) * (j as f64) * lambda * lambda).exp();
        sum += sign * term;
        if term < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Digamma function for positive arguments.
///
/// Recurrence below 6, then the standard asymptotic expansion.
pub(crate) fn digamma(x: f64) -> f64 {
    debug_assert!(x > 0.0, "digamma needs a positive argument");
    let mut x = x;
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 / 252.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamp_prob_handles_edges() {
        assert_eq!(clamp_prob(0.0), f64::MIN_POSITIVE);
        assert_eq!(clamp_prob(f64::NAN), f64::MIN_POSITIVE);
        assert_eq!(clamp_prob(2.0), 1.0);
        assert_eq!(clamp_prob(0.25), 0.25);
        assert!(neg_log_p(0.0).is_finite());
    }

    #[test]
    fn erfc_known_values() {
        assert_relative_eq!(erfc(0.0), 1.0, max_relative = 1e-6);
        assert_relative_eq!(erfc(1.0), 0.157_299_207, max_relative = 1e-6);
        assert_relative_eq!(erfc(-1.0), 1.842_700_793, max_relative = 1e-6);
        assert_relative_eq!(erfc(2.0), 0.004_677_735, max_relative = 1e-5);
    }

    #[test]
    fn normal_tails_are_symmetric() {
        assert_relative_eq!(normal_sf(0.0), 0.5, max_relative = 1e-9);
        assert_relative_eq!(normal_sf(1.96), 0.024_997_895, max_relative = 1e-4);
        assert_relative_eq!(normal_sf(1.0) + normal_cdf(1.0), 1.0, max_relative = 1e-9);
        // far tail stays positive and monotone in -ln
        assert!(normal_sf(10.0) > 0.0);
        assert!(-normal_sf(10.0).ln() > -normal_sf(5.0).ln());
    }

    #[test]
    fn kolmogorov_known_values() {
        // Q(0.828) ~ 0.5 (the distribution's median is near 0.828)
        assert!((kolmogorov_sf(0.828) - 0.5).abs() < 0.01);
        assert_relative_eq!(kolmogorov_sf(1.36), 0.049, epsilon = 1e-3);
        assert_eq!(kolmogorov_sf(0.0), 1.0);
        assert!(kolmogorov_sf(3.0) < 1e-6);
    }

    #[test]
    fn digamma_known_values() {
        // digamma(1) = -gamma
        assert_relative_eq!(digamma(1.0), -0.577_215_664_9, max_relative = 1e-8);
        assert_relative_eq!(digamma(2.0), 1.0 - 0.577_215_664_9, max_relative = 1e-8);
        // recurrence: digamma(x+1) = digamma(x) + 1/x
        let x = 3.7;
        assert_relative_eq!(digamma(x + 1.0), digamma(x) + 1.0 / x, max_relative = 1e-10);
    }
}
