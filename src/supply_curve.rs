//! Deriving a basin's water supply curve from its capacity-yield relationship.
//!
//! The pipeline for one basin and period is:
//!
//! 1. trace yield against storage capacity ([`capacity_yield`])
//! 2. discretise the curve into reservoir expansion steps ([`expansion`])
//! 3. price each step by the levelised cost of the yield it gains ([`cost`])
//! 4. resample the priced curve to a fixed number of grades ([`resample`])
use crate::basin::{BasinID, BasinPhysicalProfile};
use crate::model::ModelParameters;
use crate::units::Volume;
use crate::water_balance::WaterBalanceSolver;
use anyhow::Result;
use log::debug;

pub mod capacity_yield;
pub mod cost;
pub mod expansion;
pub mod interpolate;
pub mod resample;

pub use capacity_yield::{
    CapacityYieldBuilder, CapacityYieldCurve, CapacityYieldPoint, CapacityYieldResult,
    MaxExpansionPoint, SolutionLog,
};
pub use expansion::ExpansionSequence;
pub use resample::SUPPLY_CURVE_POINTS;

/// A point on a supply curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplyCurvePoint {
    /// Annual supply (km³)
    pub supply: f64,
    /// Price (1975 USD per m³)
    pub price: f64,
}

impl SupplyCurvePoint {
    /// Create a new point
    pub fn new(supply: f64, price: f64) -> Self {
        Self { supply, price }
    }
}

/// A single grade of an exported supply curve
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyGrade {
    /// Grade label, from `grade1` upwards
    pub grade: String,
    /// Supply as a fraction of the maximum
    pub available: f64,
    /// Price (1975 USD per m³)
    pub extraction_cost: f64,
}

/// Everything derived for one basin in one period
#[derive(Debug, Clone, PartialEq)]
pub struct BasinSupplyCurve {
    /// The basin
    pub basin_id: BasinID,
    /// The period
    pub period: u32,
    /// Storage capacity at the start of the period (km³)
    pub current_capacity: f64,
    /// Largest storage capacity the basin can support (km³)
    pub max_capacity: f64,
    /// The traced capacity-yield relationship
    pub capacity_yield: CapacityYieldResult,
    /// Reservoir expansion steps
    pub expansion: ExpansionSequence,
    /// Capital cost of storage (1975 USD per m³ of capacity)
    pub unit_capital_cost: f64,
    /// Levelised price at each rung of the capacity ladder (1975 USD per m³)
    pub ladder_prices: Vec<f64>,
    /// The resampled supply curve
    pub points: Vec<SupplyCurvePoint>,
    /// Supply of the last resampled point (km³)
    pub max_supply: f64,
}

impl BasinSupplyCurve {
    /// The exported supply curve grades.
    ///
    /// Availability is supply as a fraction of the maximum, or zero if the maximum is zero.
    pub fn grades(&self) -> impl Iterator<Item = SupplyGrade> + '_ {
        self.points.iter().enumerate().map(|(i, point)| SupplyGrade {
            grade: format!("grade{}", i + 1),
            available: if self.max_supply > 0.0 {
                point.supply / self.max_supply
            } else {
                0.0
            },
            extraction_cost: point.price,
        })
    }
}

/// The priced capacity ladder as a supply curve starting at `(0, base_price)`.
///
/// Supply at each rung is the interpolated yield. Rungs with equal supply keep the highest price.
fn raw_supply_curve(
    curve: &CapacityYieldCurve,
    expansion: &ExpansionSequence,
    prices: &[f64],
    base_price: f64,
) -> Vec<SupplyCurvePoint> {
    let points = std::iter::once(SupplyCurvePoint::new(0.0, base_price))
        .chain(
            expansion
                .ladder()
                .zip(prices)
                .map(|(capacity, &price)| SupplyCurvePoint::new(curve.interpolate(capacity), price)),
        )
        .collect();

    resample::collapse_equal_supply(points)
}

/// Build the supply curve for a basin in a period.
///
/// # Arguments
///
/// * `profile` - Physical inputs for the basin and period
/// * `parameters` - Model parameters
/// * `solver` - Solver for the monthly water balance
pub fn build_supply_curve<S>(
    profile: &BasinPhysicalProfile,
    parameters: &ModelParameters,
    solver: &S,
) -> Result<BasinSupplyCurve>
where
    S: WaterBalanceSolver + ?Sized,
{
    let capacity_yield = CapacityYieldBuilder::new(profile, parameters, solver).build()?;
    let curve = &capacity_yield.constrained;

    let unit = profile.expansion_increment;
    let expansion = expansion::sequence_expansion(
        curve,
        capacity_yield.inflection.capacity,
        profile.max_capacity,
        unit,
    );

    let step_cost = cost::cost_per_expansion(
        Volume(unit),
        profile.slope,
        parameters.maintenance_fraction,
    );
    let unit_capital_cost = (step_cost / Volume(unit)).to_usd_per_m3();
    let ladder_prices = cost::levelised_prices(step_cost, &expansion, parameters);
    debug!(
        "Basin {}: {} expansion steps costing {step_cost} million USD each",
        profile.basin_id,
        ladder_prices.len().saturating_sub(1)
    );
    debug!(
        "Basin {}: storage costs {unit_capital_cost} USD per m³",
        profile.basin_id
    );

    let raw = raw_supply_curve(curve, &expansion, &ladder_prices, parameters.base_price);
    let points = resample::resample(&raw, parameters.base_price, parameters.resampling)?;
    let max_supply = points.last().map_or(0.0, |point| point.supply);

    Ok(BasinSupplyCurve {
        basin_id: profile.basin_id,
        period: profile.period,
        current_capacity: profile.current_capacity,
        max_capacity: profile.max_capacity,
        capacity_yield,
        expansion,
        unit_capital_cost,
        ladder_prices,
        points,
        max_supply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{StubSolver, basin_profile, model_parameters, saturating_yield};
    use crate::profile::MonthlyFractions;
    use crate::water_balance::HighsSolver;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn check_supply_curve(result: &BasinSupplyCurve, parameters: &ModelParameters) {
        assert_eq!(result.points.len(), SUPPLY_CURVE_POINTS);
        assert_approx_eq!(f64, result.ladder_prices[0], parameters.base_price);
        assert!(
            result
                .ladder_prices
                .windows(2)
                .all(|pair| pair[0] <= pair[1])
        );

        let grades: Vec<_> = result.grades().collect();
        assert_eq!(grades[0].grade, "grade1");
        assert_eq!(grades[SUPPLY_CURVE_POINTS - 1].grade, "grade20");
        assert_approx_eq!(f64, grades[0].available, 0.0);
        assert!(
            grades
                .iter()
                .all(|grade| (0.0..=1.0).contains(&grade.available))
        );
        assert!(
            grades
                .windows(2)
                .all(|pair| pair[0].available <= pair[1].available
                    && pair[0].extraction_cost <= pair[1].extraction_cost)
        );
    }

    #[rstest]
    fn test_build_supply_curve(
        basin_profile: BasinPhysicalProfile,
        model_parameters: ModelParameters,
    ) {
        let solver = HighsSolver::default();
        let result = build_supply_curve(&basin_profile, &model_parameters, &solver).unwrap();
        check_supply_curve(&result, &model_parameters);

        let capacity_yield = &result.capacity_yield;
        let first = capacity_yield.unconstrained.points().next().unwrap();
        assert_eq!(first.capacity, 0.0);
        assert_eq!(first.annual_yield, capacity_yield.yield_base);
        assert!(
            capacity_yield
                .constrained
                .points()
                .any(|point| point.capacity == basin_profile.max_capacity)
        );
        assert!(
            capacity_yield
                .unconstrained
                .points()
                .collect::<Vec<_>>()
                .windows(2)
                .all(|pair| pair[0].annual_yield <= pair[1].annual_yield)
        );
        assert_eq!(
            capacity_yield.solutions.len(),
            capacity_yield.solutions.iter().count()
        );
        assert!(result.max_supply > 0.0);
        assert_eq!(result.current_capacity, basin_profile.current_capacity);
        assert_eq!(result.max_capacity, basin_profile.max_capacity);

        // Reruns are identical
        let rerun = build_supply_curve(&basin_profile, &model_parameters, &solver).unwrap();
        assert_eq!(rerun.points, result.points);
    }

    #[rstest]
    fn test_build_supply_curve_zero_max_capacity(
        mut basin_profile: BasinPhysicalProfile,
        model_parameters: ModelParameters,
    ) {
        basin_profile.max_capacity = 0.0;
        basin_profile.inflow_profile = MonthlyFractions::uniform();

        let solver = HighsSolver::default();
        let result = build_supply_curve(&basin_profile, &model_parameters, &solver).unwrap();
        let capacity_yield = &result.capacity_yield;
        assert_eq!(capacity_yield.constrained.len(), 1);
        assert!(capacity_yield.yield_base >= 0.0);
        assert_eq!(result.expansion.pre_separation, [0.0]);
        check_supply_curve(&result, &model_parameters);
        for point in &result.points {
            assert_approx_eq!(f64, point.price, model_parameters.base_price);
        }
    }

    #[rstest]
    fn test_build_supply_curve_unit_capital_cost(
        basin_profile: BasinPhysicalProfile,
        model_parameters: ModelParameters,
    ) {
        let solver = StubSolver::new(saturating_yield(2.0, 2.0, 9.5));
        let result = build_supply_curve(&basin_profile, &model_parameters, &solver).unwrap();

        // 500 million m³ on a slope of 2: normalised cost 0.3368, plus 10% maintenance
        let expected = 0.3368 * 0.48 * (24.7 / 74.8) * 1.1;
        assert_approx_eq!(f64, result.unit_capital_cost, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_raw_supply_curve() {
        let curve = CapacityYieldCurve::from_points(&[
            CapacityYieldPoint::new(0.0, 0.0),
            CapacityYieldPoint::new(1.0, 2.0),
            CapacityYieldPoint::new(2.0, 3.0),
        ]);
        let expansion = expansion::sequence_expansion(&curve, 2.0, 2.0, 1.0);
        let raw = raw_supply_curve(&curve, &expansion, &[1e-4, 0.5, 0.7], 1e-4);

        // Zero supply at the first rung collapses into the starting point
        assert_eq!(
            raw,
            [
                SupplyCurvePoint::new(0.0, 1e-4),
                SupplyCurvePoint::new(2.0, 0.5),
                SupplyCurvePoint::new(3.0, 0.7)
            ]
        );
    }
}
