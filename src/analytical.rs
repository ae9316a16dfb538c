//! Closed-form stress intensity factors along the front of an embedded elliptical crack.
//!
//! The expressions follow the linear elastic fracture mechanics solution for an
//! elliptical crack in an infinite body under remote tension applied at an angle
//! to the crack plane (see <https://en.wikipedia.org/wiki/Stress_intensity_factor>).
//! Axis lengths are given as full axes and halved internally; angles are in degrees.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ParseError, SolutionError};

/// Fracture loading mode of a stress intensity factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SifMode {
    /// Opening mode.
    #[serde(rename = "K1")]
    I,
    /// In-plane shear mode.
    #[serde(rename = "K2")]
    II,
    /// Out-of-plane shear mode.
    #[serde(rename = "K3")]
    III,
}

impl SifMode {
    /// All three modes in canonical order.
    pub const ALL: [SifMode; 3] = [SifMode::I, SifMode::II, SifMode::III];

    /// Field name used for the mode in stored simulation results.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            SifMode::I => "K1",
            SifMode::II => "K2",
            SifMode::III => "K3",
        }
    }
}

impl fmt::Display for SifMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for SifMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "K1" | "I" => Ok(SifMode::I),
            "K2" | "II" => Ok(SifMode::II),
            "K3" | "III" => Ok(SifMode::III),
            other => Err(ParseError::UnknownMode(other.to_owned())),
        }
    }
}

/// Scalar inputs of the analytical solution for one crack and load case.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalParameters {
    /// Major crack axis.
    pub a: f64,
    /// Minor crack axis.
    pub b: f64,
    /// Poisson ratio of the material.
    pub v: f64,
    /// Angle between the load and the crack plane normal, in degrees.
    pub gamma: f64,
    /// Orientation of the shear load in the crack plane, in degrees.
    pub omega: f64,
    /// Remote tensile stress.
    pub sigma: f64,
}

impl AnalyticalParameters {
    /// Return a copy of the parameters with the tensile stress replaced.
    #[must_use]
    pub fn with_sigma(self, sigma: f64) -> Self {
        Self { sigma, ..self }
    }
}

/// Complete elliptic integrals of the first and second kind, `(K(m), E(m))`,
/// by the arithmetic-geometric mean.
fn complete_elliptic_integrals(m: f64) -> (f64, f64) {
    let mut a = 1.0_f64;
    let mut b = (1.0 - m).sqrt();
    let mut weight = 0.5;
    let mut sum = 0.5 * m;
    while (a - b).abs() > f64::EPSILON * a {
        let c = 0.5 * (a - b);
        let next_a = 0.5 * (a + b);
        b = (a * b).sqrt();
        a = next_a;
        weight *= 2.0;
        sum += weight * c * c;
    }
    let k = PI / (2.0 * a);
    (k, k * (1.0 - sum))
}

/// Validate the axis ordering required by every closed form.
fn check_axes(a: f64, b: f64) -> Result<(), SolutionError> {
    if a >= b && b > 0.0 {
        Ok(())
    } else {
        Err(SolutionError::InvalidAxes { a, b })
    }
}

/// Validate the modulus and Poisson ratio accepted by the shape factors.
fn check_shape_inputs(k: f64, v: f64) -> Result<(), SolutionError> {
    if !(v > 0.0 && v <= 0.5) {
        return Err(SolutionError::InvalidPoissonRatio(v));
    }
    if !(0.0..1.0).contains(&k) {
        return Err(SolutionError::InvalidModulus(k));
    }
    Ok(())
}

/// Compute the elliptic modulus `k = sqrt(1 - (b/a)^2)` of a crack.
///
/// # Errors
///
/// Returns [`SolutionError::InvalidAxes`] unless `a >= b > 0`.
///
/// # Examples
/// ```
/// use shardx::analytical::elliptic_modulus;
///
/// let k = elliptic_modulus(2.0, 1.0).expect("valid axes");
/// assert!((k - 0.866_025_403).abs() < 1.0e-9);
/// ```
pub fn elliptic_modulus(a: f64, b: f64) -> Result<f64, SolutionError> {
    check_axes(a, b)?;
    Ok((1.0 - (b / a).powi(2)).sqrt())
}

/// Shape factor `R` of the shear solutions.
///
/// The elliptic integrals are evaluated at parameter `m = k`, which is the
/// convention the stored reference data was produced with.
///
/// # Errors
///
/// Returns [`SolutionError`] when `v` is outside `(0, 0.5]` or `k` outside `[0, 1)`.
pub fn shape_factor_r(k: f64, v: f64) -> Result<f64, SolutionError> {
    check_shape_inputs(k, v)?;
    if k > 0.0 {
        let (big_k, big_e) = complete_elliptic_integrals(k);
        let k_sq = k * k;
        Ok(k_sq / ((k_sq - v) * big_e + v * (1.0 - k_sq) * big_k))
    } else {
        Ok(2.0 / (PI * (1.0 - v)))
    }
}

/// Shape factor `Q` of the shear solutions.
///
/// # Errors
///
/// Returns [`SolutionError`] when `v` is outside `(0, 0.5]` or `k` outside `[0, 1)`.
pub fn shape_factor_q(k: f64, v: f64) -> Result<f64, SolutionError> {
    check_shape_inputs(k, v)?;
    if k > 0.0 {
        let (big_k, big_e) = complete_elliptic_integrals(k);
        let k_sq = k * k;
        Ok(k_sq / (big_e * k_sq + v * (1.0 - k_sq) * (big_e - big_k)))
    } else {
        Ok(2.0 / PI)
    }
}

/// Split a remote tensile stress into the normal and shear stress on the crack plane.
///
/// `gamma` is reduced modulo 360 and must then lie in `[0, 90]` degrees.
///
/// # Errors
///
/// Returns [`SolutionError::InvalidLoadAngle`] for angles outside that range.
///
/// # Examples
/// ```
/// use shardx::analytical::resolve_stresses;
///
/// let (normal, shear) = resolve_stresses(100.0, 390.0).expect("valid angle");
/// assert!((normal - 75.0).abs() < 1.0e-9);
/// assert!((shear - 43.301_270_189).abs() < 1.0e-6);
/// ```
pub fn resolve_stresses(tensile_stress: f64, gamma: f64) -> Result<(f64, f64), SolutionError> {
    let reduced = gamma.rem_euclid(360.0);
    if !(0.0..=90.0).contains(&reduced) {
        return Err(SolutionError::InvalidLoadAngle(gamma));
    }
    let (sin, cos) = reduced.to_radians().sin_cos();
    Ok((tensile_stress * cos * cos, tensile_stress * sin * cos))
}

/// Semi-axes and trigonometric terms shared by the three closed forms.
struct FrontPoint {
    a: f64,
    b: f64,
    sin_sq: f64,
    cos_sq: f64,
    sin: f64,
    cos: f64,
}

impl FrontPoint {
    fn new(axis_a: f64, axis_b: f64, beta: f64) -> Result<Self, SolutionError> {
        check_axes(axis_a, axis_b)?;
        let (sin, cos) = beta.to_radians().sin_cos();
        Ok(Self {
            a: axis_a / 2.0,
            b: axis_b / 2.0,
            sin_sq: sin * sin,
            cos_sq: cos * cos,
            sin,
            cos,
        })
    }

    fn modulus(&self) -> f64 {
        (1.0 - (self.b / self.a).powi(2)).sqrt()
    }

    /// `sqrt(pi * b / a)`
    fn root_term(&self) -> f64 {
        (PI * self.b / self.a).sqrt()
    }

    fn quadratic(&self) -> f64 {
        self.a.powi(2) * self.sin_sq + self.b.powi(2) * self.cos_sq
    }

    fn quartic(&self) -> f64 {
        self.a.powi(4) * self.sin_sq + self.b.powi(4) * self.cos_sq
    }

    fn shear_denominator(&self) -> f64 {
        self.quadratic().powf(0.25) * self.quartic().powf(0.25)
    }
}

/// Mode I stress intensity factor at crack-front angle `beta` for normal stress `sigma`.
///
/// # Errors
///
/// Returns [`SolutionError::InvalidAxes`] unless `a >= b > 0`.
pub fn mode_i(a: f64, b: f64, beta: f64, sigma: f64) -> Result<f64, SolutionError> {
    let point = FrontPoint::new(a, b, beta)?;
    let (_, big_e) = complete_elliptic_integrals(point.modulus());
    let amplitude = sigma * point.root_term() / big_e;
    Ok(amplitude * (point.quartic() / point.quadratic()).powf(0.25))
}

/// Mode II stress intensity factor for shear stress `tau` oriented at `omega`.
///
/// # Errors
///
/// Returns [`SolutionError`] for invalid axes or Poisson ratio.
pub fn mode_ii(
    a: f64,
    b: f64,
    v: f64,
    beta: f64,
    omega: f64,
    tau: f64,
) -> Result<f64, SolutionError> {
    let point = FrontPoint::new(a, b, beta)?;
    let k = point.modulus();
    let (q, r) = (shape_factor_q(k, v)?, shape_factor_r(k, v)?);
    let (sin_omega, cos_omega) = omega.to_radians().sin_cos();
    let numerator = point.b.powi(2) * r * point.cos * cos_omega
        + point.a.powi(2) * q * point.sin * sin_omega;
    Ok(-tau * point.root_term() * numerator / point.shear_denominator())
}

/// Mode III stress intensity factor for shear stress `tau` oriented at `omega`.
///
/// # Errors
///
/// Returns [`SolutionError`] for invalid axes or Poisson ratio.
pub fn mode_iii(
    a: f64,
    b: f64,
    v: f64,
    beta: f64,
    omega: f64,
    tau: f64,
) -> Result<f64, SolutionError> {
    let point = FrontPoint::new(a, b, beta)?;
    let k = point.modulus();
    let (q, r) = (shape_factor_q(k, v)?, shape_factor_r(k, v)?);
    let (sin_omega, cos_omega) = omega.to_radians().sin_cos();
    let numerator = point.a.powi(2) * r * point.sin * cos_omega
        - point.b.powi(2) * q * point.cos * sin_omega;
    Ok(tau * (1.0 - v) * point.root_term() * numerator / point.shear_denominator())
}

/// Evaluate the analytical solution of `mode` at every crack-front angle in `betas`.
///
/// # Errors
///
/// Returns [`SolutionError`] when the parameters violate any precondition.
///
/// # Examples
/// ```
/// use shardx::analytical::{evaluate, AnalyticalParameters, SifMode};
///
/// let params = AnalyticalParameters { a: 20.0, b: 10.0, v: 0.3, gamma: 0.0, omega: 0.0, sigma: 100.0 };
/// let values = evaluate(SifMode::I, &params, &[0.0, 90.0, 180.0]).expect("valid parameters");
/// assert_eq!(values.len(), 3);
/// assert!((values[0] - 247.686_459_306_4).abs() < 1.0e-6);
/// ```
pub fn evaluate(
    mode: SifMode,
    params: &AnalyticalParameters,
    betas: &[f64],
) -> Result<Vec<f64>, SolutionError> {
    let (normal, shear) = resolve_stresses(params.sigma, params.gamma)?;
    betas
        .iter()
        .map(|&beta| match mode {
            SifMode::I => mode_i(params.a, params.b, beta, normal),
            SifMode::II => mode_ii(params.a, params.b, params.v, beta, params.omega, shear),
            SifMode::III => mode_iii(params.a, params.b, params.v, beta, params.omega, shear),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn elliptic_modulus_matches_reference_values() {
        for ((a, b), k) in [((2.0, 1.0), 0.866_025_403), ((1.0, 1.0), 0.0), ((10.0, 1.0), 0.994_987_437)] {
            assert_relative_eq!(elliptic_modulus(a, b).expect("valid axes"), k, epsilon = 1.0e-9);
        }
        assert_eq!(elliptic_modulus(2.0, 2.0).expect("circle"), 0.0);
    }

    #[test]
    fn elliptic_modulus_rejects_invalid_axes() {
        for (a, b) in [(-10.0, -5.0), (-1.0, 2.0), (0.0, 2.0), (0.0, 0.0), (2.0, 3.0)] {
            assert_eq!(
                elliptic_modulus(a, b),
                Err(SolutionError::InvalidAxes { a, b })
            );
        }
    }

    #[test]
    fn shape_factors_match_reference_values() {
        let cases = [
            ((0.1, 0.5), 0.207_955_436_98, -0.397_996_311_7),
            ((0.5, 0.5), 0.699_071_846_201_484, 1.679_267_648_539_12),
            ((0.9, 0.5), 1.378_960_660_818_164, 1.072_986_413_820_68),
            ((0.5, 0.3), 0.715_032_190_853_902, 1.114_136_406_880_92),
            ((0.9, 0.3), 1.140_224_588_883_6, 0.998_904_358_791_297),
        ];
        for ((k, v), r, q) in cases {
            assert_relative_eq!(shape_factor_r(k, v).expect("valid"), r, epsilon = 1.0e-7);
            assert_relative_eq!(shape_factor_q(k, v).expect("valid"), q, epsilon = 1.0e-7);
        }
    }

    #[test]
    fn shape_factors_fall_back_for_circular_cracks() {
        assert_relative_eq!(shape_factor_r(0.0, 0.3).expect("valid"), 2.0 / (PI * 0.7));
        assert_relative_eq!(shape_factor_q(0.0, 0.3).expect("valid"), 2.0 / PI);
    }

    #[test]
    fn shape_factors_reject_out_of_range_inputs() {
        for v in [-2.0, -0.5, 0.0, 0.51, 1.0] {
            assert_eq!(shape_factor_r(0.5, v), Err(SolutionError::InvalidPoissonRatio(v)));
            assert_eq!(shape_factor_q(0.5, v), Err(SolutionError::InvalidPoissonRatio(v)));
        }
        for k in [-1.0, -0.1, 1.0, 2.0] {
            assert_eq!(shape_factor_r(k, 0.3), Err(SolutionError::InvalidModulus(k)));
            assert_eq!(shape_factor_q(k, 0.3), Err(SolutionError::InvalidModulus(k)));
        }
    }

    #[test]
    fn resolve_stresses_is_periodic_and_bounded() {
        let expected = [(100.0, 0.0), (75.0, 43.301_270_189), (25.0, 43.301_270_189), (0.0, 0.0)];
        for (gamma, (normal, shear)) in [0.0, 30.0, 60.0, 90.0].into_iter().zip(expected) {
            for turns in [0.0, 1.0, 3.0] {
                let (n, s) = resolve_stresses(100.0, gamma + 360.0 * turns).expect("valid angle");
                assert_relative_eq!(n, normal, epsilon = 1.0e-7);
                assert_relative_eq!(s, shear, epsilon = 1.0e-7);
            }
        }
        for gamma in [-10.0, 130.0, 200.0, 350.0] {
            assert_eq!(
                resolve_stresses(100.0, gamma),
                Err(SolutionError::InvalidLoadAngle(gamma))
            );
        }
    }

    #[test]
    fn mode_i_matches_reference_values() {
        let expected = [
            (0.0, 247.686_459_306_4),
            (60.0, 345.116_280_255_875),
            (90.0, 350.281_549_967_32),
            (120.0, 345.116_280_255_875),
            (180.0, 247.686_459_306_4),
            (270.0, 350.281_549_967_32),
            (360.0, 247.686_459_306_475_4),
        ];
        for (beta, k1) in expected {
            assert_relative_eq!(mode_i(20.0, 10.0, beta, 100.0).expect("valid"), k1, epsilon = 1.0e-7);
        }
        for beta in [0.0, 60.0, 90.0, 400.0] {
            assert_relative_eq!(
                mode_i(20.0, 20.0, beta, 100.0).expect("valid"),
                356.824_823_230_55,
                epsilon = 1.0e-7
            );
            assert_eq!(mode_i(20.0, 10.0, beta, 0.0).expect("valid"), 0.0);
        }
        assert!(mode_i(10.0, 20.0, 0.0, 100.0).is_err());
    }

    #[test]
    fn mode_ii_matches_reference_values() {
        let expected = [
            (0.0, -151.811_932_89),
            (60.0, -364.761_525_373_456),
            (90.0, -343.068_927_212_5),
            (180.0, 151.811_932_89),
            (300.0, 304.324_782_974_556),
            (400.0, -369.323_771_541_149_26),
        ];
        for (beta, k2) in expected {
            assert_relative_eq!(
                mode_ii(20.0, 10.0, 0.3, beta, 60.0, 100.0).expect("valid"),
                k2,
                epsilon = 1.0e-7
            );
        }
        assert_relative_eq!(
            mode_ii(20.0, 20.0, 0.3, 45.0, 60.0, 100.0).expect("valid"),
            -398.733_437_69,
            epsilon = 1.0e-7
        );
        assert_eq!(mode_ii(20.0, 10.0, 0.3, 45.0, 60.0, 0.0).expect("valid"), 0.0);
        assert!(mode_ii(10.0, 20.0, 0.3, 45.0, 60.0, 100.0).is_err());
    }

    #[test]
    fn mode_iii_matches_reference_values() {
        let expected = [
            (0.0, -169.810_455_392_451_7),
            (60.0, 112.750_310_349_752_31),
            (90.0, 150.286_146_100_029_44),
            (240.0, -112.750_310_349_752_3),
            (300.0, -180.352_313_391_020_46),
            (400.0, 71.441_969_172_512_316),
        ];
        for (beta, k3) in expected {
            assert_relative_eq!(
                mode_iii(20.0, 10.0, 0.3, beta, 60.0, 100.0).expect("valid"),
                k3,
                epsilon = 1.0e-7
            );
        }
        assert_relative_eq!(
            mode_iii(20.0, 20.0, 0.3, 45.0, 60.0, 100.0).expect("valid"),
            -26.800_154_18,
            epsilon = 1.0e-7
        );
        assert!(mode_iii(10.0, 20.0, 0.3, 45.0, 60.0, 100.0).is_err());
    }

    #[test]
    fn evaluate_maps_every_angle_through_the_resolved_stress() {
        let params = AnalyticalParameters {
            a: 20.0,
            b: 10.0,
            v: 0.3,
            gamma: 30.0,
            omega: 60.0,
            sigma: 100.0,
        };
        let betas = [0.0, 60.0, 90.0, 180.0];
        let (normal, shear) = resolve_stresses(100.0, 30.0).expect("valid angle");

        let k1 = evaluate(SifMode::I, &params, &betas).expect("valid");
        let k2 = evaluate(SifMode::II, &params, &betas).expect("valid");
        let k3 = evaluate(SifMode::III, &params, &betas).expect("valid");
        assert_eq!(k1.len(), betas.len());
        for (idx, beta) in betas.iter().enumerate() {
            assert_relative_eq!(k1[idx], mode_i(20.0, 10.0, *beta, normal).expect("valid"));
            assert_relative_eq!(k2[idx], mode_ii(20.0, 10.0, 0.3, *beta, 60.0, shear).expect("valid"));
            assert_relative_eq!(k3[idx], mode_iii(20.0, 10.0, 0.3, *beta, 60.0, shear).expect("valid"));
        }
        assert!(evaluate(SifMode::I, &params, &[]).expect("valid").is_empty());
    }

    #[test]
    fn evaluate_rejects_invalid_load_angle() {
        let params = AnalyticalParameters {
            a: 20.0,
            b: 10.0,
            v: 0.3,
            gamma: 120.0,
            omega: 0.0,
            sigma: 100.0,
        };
        assert_eq!(
            evaluate(SifMode::I, &params, &[0.0]),
            Err(SolutionError::InvalidLoadAngle(120.0))
        );
    }

    #[test]
    fn modes_parse_from_field_names() {
        for mode in SifMode::ALL {
            assert_eq!(mode.field_name().parse::<SifMode>(), Ok(mode));
        }
        assert_eq!(
            "K4".parse::<SifMode>(),
            Err(ParseError::UnknownMode("K4".to_owned()))
        );
    }
}
