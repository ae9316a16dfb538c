//! Statistical comparison of simulated and analytical series along a crack front.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::errors::{ParseError, StatError};

/// Raw simulation output keyed by contour number; each value is a series over the crack front.
pub type ContourMap = BTreeMap<u32, Vec<f64>>;

/// Named error statistics comparing a simulated series with its analytical counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statistic {
    /// Relative difference of the absolute areas under both curves.
    AreaDiff,
    /// Relative difference of the self dot products.
    DotProd,
    /// Pointwise difference of magnitudes.
    Difference,
    /// Signed mean of the normalized errors.
    AvgNormError,
    /// Normalized error with the largest magnitude.
    MaxNormError,
    /// Root mean square deviation.
    Rmsd,
}

impl Statistic {
    /// Every statistic.
    pub const ALL: [Statistic; 6] = [
        Statistic::AreaDiff,
        Statistic::DotProd,
        Statistic::Difference,
        Statistic::AvgNormError,
        Statistic::MaxNormError,
        Statistic::Rmsd,
    ];

    /// Statistics that reduce a pair of series to a single number.
    pub const SCALAR: [Statistic; 5] = [
        Statistic::AreaDiff,
        Statistic::DotProd,
        Statistic::AvgNormError,
        Statistic::MaxNormError,
        Statistic::Rmsd,
    ];

    /// Name of the statistic in stored reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Statistic::AreaDiff => "areaDiff",
            Statistic::DotProd => "dotProd",
            Statistic::Difference => "difference",
            Statistic::AvgNormError => "avgNormError",
            Statistic::MaxNormError => "maxNormError",
            Statistic::Rmsd => "rmsd",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Statistic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.name() == s)
            .ok_or_else(|| ParseError::UnknownStatistic(s.to_owned()))
    }
}

/// Rule deciding the overall sign of the normalized errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignMode {
    /// Negative when the analysis encloses less absolute area than the analytical curve.
    #[default]
    Areas,
    /// Negative when the analysis has the smaller self dot product.
    DotProd,
}

impl FromStr for SignMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "areas" => Ok(SignMode::Areas),
            "dotProd" => Ok(SignMode::DotProd),
            other => Err(ParseError::UnknownSignMode(other.to_owned())),
        }
    }
}

/// Result of a statistic: a scalar estimate or a pointwise series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Single value summarising the comparison.
    Scalar(f64),
    /// One value per crack-front point.
    Series(Vec<f64>),
}

impl StatValue {
    /// Return the scalar value, if this is one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            StatValue::Scalar(value) => Some(*value),
            StatValue::Series(_) => None,
        }
    }

    /// Return the series, if this is one.
    #[must_use]
    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            StatValue::Scalar(_) => None,
            StatValue::Series(values) => Some(values),
        }
    }
}

fn check_lengths(left: &[f64], right: &[f64]) -> Result<(), StatError> {
    if left.len() == right.len() {
        Ok(())
    } else {
        Err(StatError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        })
    }
}

/// Relative change `(value - reference) / reference`.
fn relative(value: f64, reference: f64) -> Result<f64, StatError> {
    if reference == 0.0 {
        Err(StatError::DivisionByZero)
    } else {
        Ok((value - reference) / reference)
    }
}

/// Dot product of two series of equal length.
///
/// # Errors
///
/// Returns [`StatError::LengthMismatch`] when the lengths differ.
pub fn dot_product(a: &[f64], b: &[f64]) -> Result<f64, StatError> {
    check_lengths(a, b)?;
    Ok(DVector::from_column_slice(a).dot(&DVector::from_column_slice(b)))
}

/// Trapezoidal integral of `|y|` over the domain `x`.
///
/// # Errors
///
/// Returns [`StatError`] when the lengths differ or `x` is negative or decreasing.
///
/// # Examples
/// ```
/// use shardx::metrics::absolute_area;
///
/// let area = absolute_area(&[0.0, 1.0, 2.0], &[2.0, 3.0, -1.0]).expect("valid domain");
/// assert!((area - 4.5).abs() < 1.0e-12);
/// ```
pub fn absolute_area(x: &[f64], y: &[f64]) -> Result<f64, StatError> {
    check_lengths(x, y)?;
    if let Some(index) = x.iter().position(|value| *value < 0.0) {
        return Err(StatError::InvalidDomain { index });
    }
    let mut area = 0.0;
    for (idx, (xs, ys)) in x.windows(2).zip(y.windows(2)).enumerate() {
        let width = xs[1] - xs[0];
        if width < 0.0 {
            return Err(StatError::InvalidDomain { index: idx + 1 });
        }
        area += 0.5 * (ys[0].abs() + ys[1].abs()) * width;
    }
    Ok(area)
}

/// Average the `num_cont` contours closest to the middle of the contour sequence.
///
/// The window starts at `(contours - num_cont) / 2`, rounded down, which drops
/// the near-field and far-field contours symmetrically.
///
/// # Errors
///
/// Returns [`StatError::InvalidContourWindow`] unless `1 <= num_cont <= contours`
/// and [`StatError::LengthMismatch`] when the averaged contours differ in length.
pub fn contour_average(contours: &ContourMap, num_cont: usize) -> Result<Vec<f64>, StatError> {
    if num_cont < 1 || num_cont > contours.len() {
        return Err(StatError::InvalidContourWindow {
            requested: num_cont,
            available: contours.len(),
        });
    }
    let start = (contours.len() - num_cont) / 2;
    let mut window = contours.values().skip(start).take(num_cont);
    let mut sum = window.next().cloned().unwrap_or_default();
    for series in window {
        check_lengths(&sum, series)?;
        for (total, value) in sum.iter_mut().zip(series) {
            *total += value;
        }
    }
    let count = num_cont as f64;
    Ok(sum.into_iter().map(|total| total / count).collect())
}

/// Pointwise `|analysis| - |analytical|`.
///
/// # Errors
///
/// Returns [`StatError::LengthMismatch`] when the lengths differ.
pub fn difference(analytical: &[f64], analysis: &[f64]) -> Result<Vec<f64>, StatError> {
    check_lengths(analytical, analysis)?;
    Ok(analytical
        .iter()
        .zip(analysis)
        .map(|(a, f)| f.abs() - a.abs())
        .collect())
}

/// Relative difference between the absolute areas under the analysis and analytical curves.
///
/// # Errors
///
/// Returns [`StatError::DivisionByZero`] when the analytical area is zero, or a
/// precondition error from [`absolute_area`].
pub fn area_difference(
    angles: &[f64],
    analytical: &[f64],
    analysis: &[f64],
) -> Result<f64, StatError> {
    check_lengths(analytical, analysis)?;
    check_lengths(angles, analytical)?;
    let analysis_area = absolute_area(angles, analysis)?;
    let analytical_area = absolute_area(angles, analytical)?;
    relative(analysis_area, analytical_area)
}

/// Relative difference between the self dot products of both series.
///
/// # Errors
///
/// Returns [`StatError::DivisionByZero`] when the analytical series is all zeros.
pub fn dot_product_difference(analytical: &[f64], analysis: &[f64]) -> Result<f64, StatError> {
    check_lengths(analytical, analysis)?;
    let analysis_product = dot_product(analysis, analysis)?;
    let analytical_product = dot_product(analytical, analytical)?;
    relative(analysis_product, analytical_product)
}

/// Pointwise errors normalized by the largest analytical magnitude, and their overall sign.
///
/// # Errors
///
/// Returns [`StatError::DivisionByZero`] when the analytical series is all zeros
/// (or when the area sign rule meets a zero analytical area).
pub fn normalized_errors(
    analytical: &[f64],
    analysis: &[f64],
    domain: &[f64],
    sign_mode: SignMode,
) -> Result<(Vec<f64>, f64), StatError> {
    check_lengths(analytical, analysis)?;
    check_lengths(domain, analysis)?;
    let scale = analytical.iter().fold(0.0_f64, |max, a| max.max(a.abs()));
    if scale == 0.0 {
        return Err(StatError::DivisionByZero);
    }
    let errors = analytical
        .iter()
        .zip(analysis)
        .map(|(a, f)| (f - a) / scale)
        .collect();
    let sign = match sign_mode {
        SignMode::DotProd => {
            if dot_product(analytical, analytical)? > dot_product(analysis, analysis)? {
                -1.0
            } else {
                1.0
            }
        }
        SignMode::Areas => {
            if area_difference(domain, analytical, analysis)? < 0.0 {
                -1.0
            } else {
                1.0
            }
        }
    };
    Ok((errors, sign))
}

/// Signed mean magnitude of the normalized errors.
///
/// # Errors
///
/// See [`normalized_errors`].
pub fn avg_norm_error(
    analytical: &[f64],
    analysis: &[f64],
    domain: &[f64],
    sign_mode: SignMode,
) -> Result<f64, StatError> {
    let (errors, sign) = normalized_errors(analytical, analysis, domain, sign_mode)?;
    let total: f64 = errors.iter().map(|e| e.abs()).sum();
    Ok(sign * total / domain.len() as f64)
}

/// Normalized error with the largest magnitude, keeping its own sign.
///
/// # Errors
///
/// See [`normalized_errors`].
pub fn max_norm_error(
    analytical: &[f64],
    analysis: &[f64],
    domain: &[f64],
    sign_mode: SignMode,
) -> Result<f64, StatError> {
    let (errors, _) = normalized_errors(analytical, analysis, domain, sign_mode)?;
    Ok(errors
        .into_iter()
        .fold(0.0, |max, e| if e.abs() > max.abs() { e } else { max }))
}

/// Root mean square deviation between both series.
///
/// # Errors
///
/// Returns [`StatError::LengthMismatch`] when the lengths differ and
/// [`StatError::DivisionByZero`] for empty series.
pub fn rmsd(analytical: &[f64], analysis: &[f64]) -> Result<f64, StatError> {
    check_lengths(analytical, analysis)?;
    if analytical.is_empty() {
        return Err(StatError::DivisionByZero);
    }
    let squares: f64 = analytical
        .iter()
        .zip(analysis)
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    Ok((squares / analytical.len() as f64).sqrt())
}

/// Evaluate one named statistic.
///
/// # Errors
///
/// Propagates the error of the selected statistic.
pub fn evaluate_stat(
    stat: Statistic,
    angles: &[f64],
    analytical: &[f64],
    analysis: &[f64],
    sign_mode: SignMode,
) -> Result<StatValue, StatError> {
    let value = match stat {
        Statistic::AreaDiff => StatValue::Scalar(area_difference(angles, analytical, analysis)?),
        Statistic::DotProd => StatValue::Scalar(dot_product_difference(analytical, analysis)?),
        Statistic::Difference => StatValue::Series(difference(analytical, analysis)?),
        Statistic::AvgNormError => {
            StatValue::Scalar(avg_norm_error(analytical, analysis, angles, sign_mode)?)
        }
        Statistic::MaxNormError => {
            StatValue::Scalar(max_norm_error(analytical, analysis, angles, sign_mode)?)
        }
        Statistic::Rmsd => StatValue::Scalar(rmsd(analytical, analysis)?),
    };
    Ok(value)
}

/// Evaluate a statistic, mapping a zero reference quantity to `NaN`.
pub(crate) fn evaluate_stat_or_nan(
    stat: Statistic,
    angles: &[f64],
    analytical: &[f64],
    analysis: &[f64],
    sign_mode: SignMode,
) -> Result<StatValue, StatError> {
    match evaluate_stat(stat, angles, analytical, analysis, sign_mode) {
        Err(StatError::DivisionByZero) => Ok(StatValue::Scalar(f64::NAN)),
        other => other,
    }
}
