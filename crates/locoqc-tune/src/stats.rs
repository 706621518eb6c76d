// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use locoqc_core::{LocoError, RangeKey, TuningMethod};

/// Linear-interpolation quantile (Hyndman-Fan type 7) of ascending `sorted`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = h - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation; zero for a single value.
pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq = values
        .iter()
        .map(|v| {
            let diff = *v - mean;
            diff * diff
        })
        .sum::<f64>();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.02425;

/// Standard normal quantile Φ⁻¹(p) (Acklam, relative error below 1.2e-9).
pub fn inverse_normal_cdf(p: f64) -> Option<f64> {
    if p.is_nan() || p <= 0.0 || p >= 1.0 {
        return None;
    }
    let tail = |q: f64| {
        let num = ((((ACKLAM_C[0] * q + ACKLAM_C[1]) * q + ACKLAM_C[2]) * q + ACKLAM_C[3]) * q
            + ACKLAM_C[4])
            * q
            + ACKLAM_C[5];
        let den = (((ACKLAM_D[0] * q + ACKLAM_D[1]) * q + ACKLAM_D[2]) * q + ACKLAM_D[3]) * q + 1.0;
        num / den
    };
    if p < ACKLAM_P_LOW {
        return Some(tail((-2.0 * p.ln()).sqrt()));
    }
    if p > 1.0 - ACKLAM_P_LOW {
        return Some(-tail((-2.0 * (1.0 - p).ln()).sqrt()));
    }
    let q = p - 0.5;
    let r = q * q;
    let num = (((((ACKLAM_A[0] * r + ACKLAM_A[1]) * r + ACKLAM_A[2]) * r + ACKLAM_A[3]) * r
        + ACKLAM_A[4])
        * r
        + ACKLAM_A[5])
        * q;
    let den = ((((ACKLAM_B[0] * r + ACKLAM_B[1]) * r + ACKLAM_B[2]) * r + ACKLAM_B[3]) * r
        + ACKLAM_B[4])
        * r
        + 1.0;
    Some(num / den)
}

/// Two-sided bounds for `confidence` over ascending, finite `sorted` values
/// pooled for `key`.
pub fn derive_bounds(
    key: &RangeKey,
    sorted: &[f64],
    method: TuningMethod,
    confidence: f64,
    iqr_multiplier: f64,
) -> Result<(f64, f64), LocoError> {
    let tail = (1.0 - confidence) / 2.0;
    let bounds = match method {
        TuningMethod::Percentile => {
            quantile_sorted(sorted, tail).zip(quantile_sorted(sorted, 1.0 - tail))
        }
        TuningMethod::Iqr => quantile_sorted(sorted, 0.25)
            .zip(quantile_sorted(sorted, 0.75))
            .map(|(q1, q3)| {
                let spread = iqr_multiplier * (q3 - q1);
                (q1 - spread, q3 + spread)
            }),
        TuningMethod::ZScore => mean(sorted).zip(inverse_normal_cdf(1.0 - tail)).map(|(m, k)| {
            let spread = k * sample_std(sorted, m);
            (m - spread, m + spread)
        }),
    };
    match bounds {
        Some((min, max)) if min.is_finite() && max.is_finite() && min <= max => Ok((min, max)),
        Some((min, max)) => Err(LocoError::numerical_issue(format!(
            "{key}: {method} bounds are not finite and ordered: [{min}, {max}]"
        ))),
        None => Err(LocoError::numerical_issue(format!(
            "{key}: {method} bounds need at least one observation"
        ))),
    }
}
