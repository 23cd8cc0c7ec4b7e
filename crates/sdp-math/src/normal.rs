//! Standard normal distribution.
//!
//! The simulators turn uniform deviates into Gaussian increments with
//! [`normal_cdf_inverse`]. [`normal_cdf`] gives closed-form Black-Scholes
//! references.

use sdp_core::Real;
use std::f64::consts::FRAC_1_SQRT_2;

/// Complementary error function, Chebyshev fit with fractional error below
/// 1.2e-7 everywhere.
fn erfc(x: Real) -> Real {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let r = t
        * (-z * z - 1.265_512_23
            + t * (1.000_023_68
                + t * (0.374_091_96
                    + t * (0.096_784_18
                        + t * (-0.186_288_06
                            + t * (0.278_868_07
                                + t * (-1.135_203_98
                                    + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
            .exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// The standard normal cumulative distribution function.
pub fn normal_cdf(x: Real) -> Real {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

fn ratio(num: &[Real; 8], den: &[Real; 7], r: Real) -> Real {
    let n = num.iter().rev().fold(0.0, |acc, &c| acc * r + c);
    let d = den.iter().rev().fold(0.0, |acc, &c| acc * r + c) * r + 1.0;
    n / d
}

/// The inverse standard normal cumulative distribution.
///
/// Wichura's algorithm AS241 (relative accuracy about 1e-16). `p` must lie
/// in the open interval (0, 1).
pub fn normal_cdf_inverse(p: Real) -> Real {
    debug_assert!(p > 0.0 && p < 1.0, "p must be in (0, 1), got {p}");
    // coefficients in increasing powers; denominators lack their constant 1
    const CENTRAL: ([Real; 8], [Real; 7]) = (
        [
            3.387_132_872_796_366_6,
            133.141_667_891_784_38,
            1_971.590_950_306_551_4,
            13_731.693_765_509_461,
            45_921.953_931_549_87,
            67_265.770_927_008_7,
            33_430.575_583_588_13,
            2_509.080_928_730_122_7,
        ],
        [
            42.313_330_701_600_91,
            687.187_007_492_057_9,
            5_394.196_021_424_751,
            21_213.794_301_586_596,
            39_307.895_800_092_71,
            28_729.085_735_721_943,
            5_226.495_278_852_546,
        ],
    );
    const INTERMEDIATE: ([Real; 8], [Real; 7]) = (
        [
            1.423_437_110_749_683_6,
            4.630_337_846_156_545,
            5.769_497_221_460_691,
            3.647_848_324_763_204_5,
            1.270_458_252_452_368_4,
            0.241_780_725_177_450_6,
            0.022_723_844_989_269_184,
            7.745_450_142_783_414e-4,
        ],
        [
            2.053_191_626_637_759,
            1.676_384_830_183_803_8,
            0.689_767_334_985_1,
            0.148_103_976_427_480_08,
            0.015_198_666_563_616_457,
            5.475_938_084_995_345e-4,
            1.050_750_071_644_416_8e-9,
        ],
    );
    const TAIL: ([Real; 8], [Real; 7]) = (
        [
            6.657_904_643_501_104,
            5.463_784_911_164_114,
            1.784_826_539_917_291_3,
            0.296_560_571_828_504_9,
            0.026_532_189_526_576_124,
            0.001_242_660_947_388_078_4,
            2.711_555_568_743_487_6e-5,
            2.010_334_399_292_288_1e-7,
        ],
        [
            0.599_832_206_555_888,
            0.136_929_880_922_735_8,
            0.014_875_361_290_850_615,
            7.868_691_311_456_133e-4,
            1.846_318_317_510_054_8e-5,
            1.421_511_758_316_446e-7,
            2.044_263_103_389_939_7e-15,
        ],
    );

    let q = p - 0.5;
    if q.abs() <= 0.425 {
        return q * ratio(&CENTRAL.0, &CENTRAL.1, 0.180_625 - q * q);
    }
    let r = (-(if q < 0.0 { p } else { 1.0 - p }).ln()).sqrt();
    let x = if r <= 5.0 {
        ratio(&INTERMEDIATE.0, &INTERMEDIATE.1, r - 1.6)
    } else {
        ratio(&TAIL.0, &TAIL.1, r - 5.0)
    };
    if q < 0.0 {
        -x
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn known_quantiles() {
        assert_abs_diff_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(normal_cdf(1.959_963_984_540_054), 0.975, epsilon = 1e-7);
        assert_abs_diff_eq!(normal_cdf_inverse(0.975), 1.959_963_984_540_054, epsilon = 1e-12);
        assert_abs_diff_eq!(normal_cdf_inverse(1e-10), -6.361_340_902_404_056, epsilon = 1e-9);
    }

    proptest! {
        #[test]
        fn cdf_is_symmetric(x in -6.0f64..6.0) {
            prop_assert!((normal_cdf(x) + normal_cdf(-x) - 1.0).abs() < 1e-7);
        }

        #[test]
        fn inverse_undoes_the_cdf(p in 1e-6f64..(1.0 - 1e-6)) {
            let back = normal_cdf(normal_cdf_inverse(p));
            prop_assert!((back - p).abs() < 1e-6 * p.min(1.0 - p).max(1e-3), "{p} -> {back}");
        }
    }
}
