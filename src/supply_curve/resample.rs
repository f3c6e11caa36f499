//! Resampling raw supply curves to a fixed number of monotone points.
//!
//! The default method concentrates points where the curve bends: a few are spread over the flat
//! part of the curve and the rest over the steep part beyond its last shallow sample.
use super::SupplyCurvePoint;
use super::interpolate::Pchip;
use crate::model::ResamplingMethod;
use anyhow::Result;
use itertools::Itertools;

/// Number of points in a resampled supply curve
pub const SUPPLY_CURVE_POINTS: usize = 20;

/// Number of samples used to estimate the gradient of the curve
const SAMPLE_COUNT: usize = 100;

/// Number of points selected before smoothing
const CANDIDATE_COUNT: usize = 18;

/// Approximate number of points kept on the steep part of the curve
const STEEP_SEGMENTS: usize = 10;

/// Window of the rolling mean used to smooth curves
const SMOOTHING_WINDOW: usize = 5;

/// Prices and supplies are rounded to this many decimal places after smoothing
const ROUNDING_SCALE: f64 = 1e6;

/// Resample a raw supply curve to [`SUPPLY_CURVE_POINTS`] points with non-decreasing prices.
///
/// `raw` must be sorted by strictly increasing supply. If the largest supply is not positive, every
/// point is `(0, base_price)`.
pub fn resample(
    raw: &[SupplyCurvePoint],
    base_price: f64,
    method: ResamplingMethod,
) -> Result<Vec<SupplyCurvePoint>> {
    let max_supply = raw.last().map_or(0.0, |point| point.supply);
    if max_supply <= 0.0 {
        return Ok(vec![
            SupplyCurvePoint::new(0.0, base_price);
            SUPPLY_CURVE_POINTS
        ]);
    }

    let mut curve = match method {
        ResamplingMethod::Curvature => resample_curvature(raw, base_price, max_supply)?,
        ResamplingMethod::Even => resample_even(raw, max_supply)?,
    };

    let mut highest = f64::NEG_INFINITY;
    for point in &mut curve {
        highest = highest.max(point.price);
        point.price = highest;
    }

    Ok(curve)
}

fn fit(points: &[SupplyCurvePoint]) -> Result<Pchip> {
    Pchip::new(
        points.iter().map(|point| point.supply).collect(),
        points.iter().map(|point| point.price).collect(),
    )
}

/// `count` evenly spaced values from `start` to `end` inclusive
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![start];
    }

    let step = (end - start) / (count - 1) as f64;
    let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    values[count - 1] = end;
    values
}

/// Discrete gradient of evenly spaced values: central differences inside and one-sided at the ends
fn gradient(values: &[f64], spacing: f64) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }

    (0..n)
        .map(|i| match i {
            0 => (values[1] - values[0]) / spacing,
            _ if i == n - 1 => (values[n - 1] - values[n - 2]) / spacing,
            _ => (values[i + 1] - values[i - 1]) / (2.0 * spacing),
        })
        .collect()
}

/// Every `space`th value from `first` up to and including `last`
fn stepped(first: usize, last: usize, space: usize) -> impl Iterator<Item = usize> {
    (first..=last).step_by(space.max(1))
}

/// Round to a fixed number of decimal places
fn round(value: f64) -> f64 {
    (value * ROUNDING_SCALE).round_ties_even() / ROUNDING_SCALE
}

fn sort_points(points: &mut [SupplyCurvePoint]) {
    points.sort_by(|a, b| {
        a.supply
            .total_cmp(&b.supply)
            .then(a.price.total_cmp(&b.price))
    });
}

/// Rolling mean over up to `SMOOTHING_WINDOW` points ending at each point
fn rolling_mean<'a>(
    points: impl Iterator<Item = &'a SupplyCurvePoint>,
) -> Vec<SupplyCurvePoint> {
    let points: Vec<_> = points.collect();
    (0..points.len())
        .map(|i| {
            let window = &points[(i + 1).saturating_sub(SMOOTHING_WINDOW)..=i];
            let n = window.len() as f64;
            SupplyCurvePoint::new(
                window.iter().map(|point| point.supply).sum::<f64>() / n,
                window.iter().map(|point| point.price).sum::<f64>() / n,
            )
        })
        .collect()
}

/// Smooth a curve with forward and backward rolling means.
///
/// Both smoothed curves are merged and rounded. Points with the same supply are collapsed to the
/// highest price.
fn smooth(points: &[SupplyCurvePoint]) -> Vec<SupplyCurvePoint> {
    let forward = rolling_mean(points.iter());
    let mut backward = rolling_mean(points.iter().rev());
    backward.reverse();

    let mut merged: Vec<_> = forward
        .into_iter()
        .chain(backward)
        .map(|point| SupplyCurvePoint::new(round(point.supply), round(point.price)))
        .collect();
    sort_points(&mut merged);

    collapse_equal_supply(merged)
}

/// Collapse points with the same supply to the one with the highest price.
///
/// `points` must be sorted by supply.
pub(super) fn collapse_equal_supply(points: Vec<SupplyCurvePoint>) -> Vec<SupplyCurvePoint> {
    points
        .into_iter()
        .coalesce(|a, b| {
            if a.supply == b.supply {
                Ok(SupplyCurvePoint::new(a.supply, a.price.max(b.price)))
            } else {
                Err((a, b))
            }
        })
        .collect()
}

/// Indices of the steep samples beyond the inflection, thinned to about `STEEP_SEGMENTS` points
fn steep_indices(gradient: &[f64], mean: f64, inflection: usize) -> Vec<usize> {
    let steep: Vec<usize> = (inflection + 1..gradient.len())
        .filter(|&i| gradient[i] > mean)
        .collect();
    let (Some(&first), Some(&last)) = (steep.first(), steep.last()) else {
        return steep;
    };

    let space = steep
        .len()
        .div_ceil(STEEP_SEGMENTS)
        .max((last - first).div_ceil(STEEP_SEGMENTS));
    stepped(first, last, space)
        .chain(std::iter::once(last))
        .sorted_unstable()
        .dedup()
        .collect()
}

/// Indices of the samples before the inflection that are priced above the base price.
///
/// Falls back to a tenth of the base price, then to every sample before the inflection.
fn priced_indices(prices: &[f64], base_price: f64, inflection: usize) -> Vec<usize> {
    let front = &prices[..inflection];
    let above = |threshold: f64| -> Vec<usize> {
        (0..front.len())
            .filter(|&i| front[i] > threshold)
            .collect()
    };

    let mut indices = above(base_price);
    if indices.is_empty() {
        indices = above(base_price / 10.0);
    }
    if indices.is_empty() {
        indices = (0..inflection).collect();
    }
    if indices.is_empty() {
        indices.push(0);
    }
    indices
}

/// Indices on the flat part of the curve, starting with zero.
///
/// Padded back from the first priced index until there are [`CANDIDATE_COUNT`] candidates in total.
/// Returns the indices and the number of padding steps taken plus one.
fn flat_indices(priced: &[usize], steep_count: usize) -> (Vec<usize>, usize) {
    let (first, last) = (priced[0], priced[priced.len() - 1]);
    let segments = CANDIDATE_COUNT.saturating_sub(1 + steep_count).max(1);
    let space = (last - first).div_ceil(segments).max(1);

    let mut indices: Vec<usize> = std::iter::once(0).chain(stepped(first, last, space)).collect();

    let mut step = 1;
    let shortfall = CANDIDATE_COUNT.saturating_sub(indices.len() + steep_count);
    while indices.len() + steep_count < CANDIDATE_COUNT {
        let pad_space = ((first as f64 / 3.0) / shortfall as f64).ceil() as usize;
        indices.push(first.saturating_sub(pad_space * step));
        step += 1;
    }

    (indices, step)
}

/// Drop every other point counting back from the second last until there are
/// [`SUPPLY_CURVE_POINTS`] points
fn trim(curve: &mut Vec<SupplyCurvePoint>) {
    let mut j = 2;
    while curve.len() > SUPPLY_CURVE_POINTS {
        if j >= curve.len() {
            j = 2;
        }
        curve.remove(curve.len() - j);
        j += 2;
    }
}

/// Add points at the given supplies until there are [`SUPPLY_CURVE_POINTS`] points
fn pad(
    curve: &mut Vec<SupplyCurvePoint>,
    interpolant: &Pchip,
    supplies: impl Iterator<Item = f64>,
) {
    for supply in supplies {
        if curve.len() >= SUPPLY_CURVE_POINTS {
            break;
        }
        if curve.iter().any(|point| point.supply == supply) {
            continue;
        }
        curve.push(SupplyCurvePoint::new(supply, interpolant.evaluate(supply)));
        sort_points(curve);
    }
}

fn resample_curvature(
    raw: &[SupplyCurvePoint],
    base_price: f64,
    max_supply: f64,
) -> Result<Vec<SupplyCurvePoint>> {
    let interpolant = fit(raw)?;
    let samples = linspace(0.0, max_supply, SAMPLE_COUNT);
    let prices = interpolant.evaluate_all(&samples);
    let gradient = gradient(&prices, samples[1] - samples[0]);
    let mean = gradient.iter().sum::<f64>() / gradient.len() as f64;

    let shallow: Vec<usize> = (0..gradient.len())
        .filter(|&i| gradient[i] < mean)
        .collect();
    let inflection = shallow.last().copied().unwrap_or(0);

    let steep = steep_indices(&gradient, mean, inflection);
    let priced = priced_indices(&prices, base_price, inflection);
    let (flat, pad_start) = flat_indices(&priced, steep.len());

    let candidates: Vec<_> = flat
        .into_iter()
        .chain(steep)
        .sorted_unstable()
        .dedup()
        .map(|i| SupplyCurvePoint::new(samples[i], prices[i]))
        .collect();

    let mut curve = smooth(&candidates);
    let smoothed = fit(&curve)?;
    trim(&mut curve);

    // Shallow samples counting back from the end in steps of two, then evenly spaced supplies
    let shallow_supplies = (pad_start..=shallow.len())
        .step_by(2)
        .map(|k| samples[shallow[shallow.len() - k]]);
    let fallback = linspace(0.0, max_supply, SUPPLY_CURVE_POINTS);
    pad(
        &mut curve,
        &smoothed,
        shallow_supplies
            .chain(fallback)
            .chain(samples.iter().copied()),
    );

    Ok(curve)
}

fn resample_even(raw: &[SupplyCurvePoint], max_supply: f64) -> Result<Vec<SupplyCurvePoint>> {
    let smoothed = fit(&smooth(raw))?;
    let supplies = linspace(raw[0].supply, max_supply, SUPPLY_CURVE_POINTS);

    Ok(supplies
        .into_iter()
        .map(|supply| SupplyCurvePoint::new(supply, smoothed.evaluate(supply)))
        .collect())
}
