//! Capital costs of reservoir expansion and the levelised price of the water it yields.
use super::expansion::ExpansionSequence;
use crate::finance::annualised_cost;
use crate::model::ModelParameters;
use crate::units::{Dimensionless, Money, MoneyPerVolume, Volume};

/// Mean global reservoir construction cost (1998 USD per m³)
const MEAN_RESERVOIR_COST: f64 = (0.52 + 0.44) / 2.0;

/// Converts 1998 USD to 1975 USD
const USD_1998_TO_1975: f64 = 24.7 / 74.8;

/// Multiplier on the step cost beyond the separation point when maximum capacity exceeds the
/// inflection point
const EXCEEDING_COST_MULTIPLIER: f64 = 10.0;

/// Multiplier on the step cost beyond the separation point otherwise
const POST_SEPARATION_COST_MULTIPLIER: f64 = 5.0;

/// Lower bounds (million m³) of the storage size classes and the quadratic coefficients of
/// normalised cost against terrain slope for each
const COST_BRACKETS: [(f64, [f64; 3]); 11] = [
    (0.0, [0.0197, 0.0538, 0.5818]),
    (25.0, [0.0295, -0.0044, 0.4456]),
    (49.0, [0.034, -0.031, 0.3982]),
    (74.0, [0.037, -0.0521, 0.3655]),
    (123.0, [0.0372, -0.0607, 0.3094]),
    (247.0, [0.0368, -0.0671, 0.2633]),
    (493.0, [0.0372, -0.0607, 0.3094]),
    (1233.0, [0.0362, -0.0824, 0.1895]),
    (2467.0, [0.0368, -0.0671, 0.2633]),
    (4934.0, [0.0334, -0.0868, 0.1427]),
    (12335.0, [0.0314, -0.0896, 0.1111]),
];

/// Normalised unit cost of a reservoir of the given size built on terrain with the given slope
fn normalised_cost(volume_mcm: f64, slope: f64) -> f64 {
    let [a, b, c] = COST_BRACKETS
        .iter()
        .rev()
        .find(|(lower, _)| volume_mcm >= *lower)
        .map_or(COST_BRACKETS[0].1, |(_, coefficients)| *coefficients);
    a * slope * slope + b * slope + c
}

/// Capital cost of one expansion step, including maintenance (million 1975 USD)
pub fn cost_per_expansion(unit: Volume, slope: f64, maintenance_fraction: Dimensionless) -> Money {
    let unit_cost = normalised_cost(unit.to_million_m3(), slope)
        * MEAN_RESERVOIR_COST
        * USD_1998_TO_1975
        * (1.0 + maintenance_fraction.value());
    MoneyPerVolume::from_usd_per_m3(unit_cost) * unit
}

/// Price increment of each step: the annualised step cost divided by the yield it gains
fn price_increments<'a>(
    step_cost: Money,
    gains: &'a [f64],
    parameters: &ModelParameters,
) -> impl Iterator<Item = f64> + use<'a> {
    let annual_cost = annualised_cost(step_cost, parameters.lifetime, parameters.discount_rate);
    gains.iter().map(move |&gain| {
        if gain <= 0.0 {
            0.0
        } else {
            (annual_cost / Volume(gain)).to_usd_per_m3()
        }
    })
}

/// The levelised price (1975 USD per m³) of water at each rung of the capacity ladder.
///
/// The first rung is priced at the base price. Each later rung adds the annualised cost of its step
/// divided by the yield gained.
pub fn levelised_prices(
    step_cost: Money,
    sequence: &ExpansionSequence,
    parameters: &ModelParameters,
) -> Vec<f64> {
    let multiplier = if sequence.exceeds_inflection {
        EXCEEDING_COST_MULTIPLIER
    } else {
        POST_SEPARATION_COST_MULTIPLIER
    };

    std::iter::once(parameters.base_price)
        .chain(price_increments(step_cost, &sequence.pre_gains, parameters))
        .chain(price_increments(
            step_cost * Dimensionless(multiplier),
            &sequence.post_gains,
            parameters,
        ))
        .scan(0.0, |total, increment| {
            *total += increment;
            Some(*total)
        })
        .collect()
}
