//! Fixtures for tests

use crate::basin::{Basin, BasinMap, BasinPhysicalProfile};
use crate::input::{Climate, HydrologicalProfiles, Reservoir};
use crate::model::{Model, ModelParameters};
use crate::profile::{MONTHS_PER_YEAR, MonthlyFractions};
use crate::water_balance::{
    MonthlyWaterBalance, WaterBalanceProblem, WaterBalanceSolution, WaterBalanceSolver,
};
use anyhow::{Result, bail};
use indexmap::indexmap;
use rstest::fixture;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A seasonal profile with a wet spring
pub fn seasonal_profile() -> MonthlyFractions {
    MonthlyFractions::new([
        0.06, 0.08, 0.12, 0.15, 0.13, 0.09, 0.06, 0.05, 0.05, 0.06, 0.07, 0.08,
    ])
    .unwrap()
}

#[fixture]
pub fn basins() -> BasinMap {
    indexmap! {
        1 => Basin {
            id: 1,
            name: "Upper River".into(),
            gcam_basin_name: "UpperRiv".into(),
            region: "North".into(),
        },
        2 => Basin {
            id: 2,
            name: "Lower River".into(),
            gcam_basin_name: "LowerRiv".into(),
            region: "South".into(),
        },
    }
}

#[fixture]
pub fn model_parameters() -> ModelParameters {
    toml::from_str("periods = [2020]").unwrap()
}

#[fixture]
pub fn model(basins: BasinMap, model_parameters: ModelParameters) -> Model {
    let reservoir = |basin_id, expandable_capacity, mean_capacity| Reservoir {
        basin_id,
        existing_capacity: 1.0,
        expandable_capacity,
        mean_capacity,
        volume_area_b: 1.2,
        volume_area_c: 0.01,
        slope: 2.0,
    };
    let climate = |runoff| Climate {
        runoff,
        evaporation_depth: 0.001,
    };
    let profiles = HydrologicalProfiles {
        inflow: seasonal_profile(),
        evaporation: MonthlyFractions::uniform(),
    };

    Model {
        model_path: PathBuf::from("model"),
        parameters: model_parameters,
        basins,
        climate: HashMap::from([((1, 2020), climate(10.0)), ((2, 2020), climate(4.0))]),
        hydrological_profiles: HashMap::from([((1, 2020), profiles), ((2, 2020), profiles)]),
        demand_profiles: HashMap::from([
            (
                (1, 2020),
                indexmap! {"domestic".to_string() => MonthlyFractions::uniform()},
            ),
            (
                (2, 2020),
                indexmap! {"domestic".to_string() => MonthlyFractions::uniform()},
            ),
        ]),
        sectoral_demand: HashMap::from([
            (1, indexmap! {"domestic".to_string() => 1.0}),
            (2, indexmap! {"domestic".to_string() => 1.0}),
        ]),
        solved_demand: HashMap::new(),
        reservoirs: HashMap::from([(1, reservoir(1, 12.0, 0.5)), (2, reservoir(2, 2.0, 0.25))]),
        solved_capacity: HashMap::new(),
    }
}

#[fixture]
pub fn basin_profile() -> BasinPhysicalProfile {
    BasinPhysicalProfile {
        basin_id: 1,
        period: 2020,
        inflow: 10.0,
        evaporation_depth: 0.001,
        inflow_profile: seasonal_profile(),
        evaporation_profile: MonthlyFractions::uniform(),
        demand_profile: MonthlyFractions::uniform(),
        volume_area_b: 1.2,
        volume_area_c: 0.01,
        slope: 2.0,
        max_capacity: 12.0,
        current_capacity: 1.0,
        expansion_increment: 0.5,
    }
}

/// A [`WaterBalanceSolver`] whose yield is a fixed function of storage capacity
pub struct StubSolver<F> {
    yield_fn: F,
    calls: Cell<u32>,
}

impl<F: Fn(f64) -> f64> StubSolver<F> {
    pub fn new(yield_fn: F) -> Self {
        Self {
            yield_fn,
            calls: Cell::new(0),
        }
    }

    /// The number of times the solver has been called
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl<F: Fn(f64) -> f64> WaterBalanceSolver for StubSolver<F> {
    fn solve(&self, problem: &WaterBalanceProblem) -> Result<WaterBalanceSolution> {
        self.calls.set(self.calls.get() + 1);
        let annual_yield = (self.yield_fn)(problem.capacity);
        let months = (1..=MONTHS_PER_YEAR as u32)
            .map(|month| MonthlyWaterBalance {
                month,
                inflow: problem.monthly_inflow(month),
                evaporation: problem.monthly_evaporation(month),
                release: annual_yield * problem.demand_profile.get(month),
                environmental_flow: problem.environmental_flow(month),
                return_flow: 0.0,
                spill: 0.0,
                storage: problem.capacity,
            })
            .collect();

        Ok(WaterBalanceSolution {
            capacity: problem.capacity,
            annual_yield,
            months,
        })
    }
}

/// A yield curve rising linearly from `base` with `slope` until it reaches `max`
pub fn saturating_yield(base: f64, slope: f64, max: f64) -> impl Fn(f64) -> f64 {
    move |capacity| (base + slope * capacity).min(max)
}

/// A [`WaterBalanceSolver`] for which every problem is infeasible
pub struct InfeasibleSolver;

impl WaterBalanceSolver for InfeasibleSolver {
    fn solve(&self, _problem: &WaterBalanceProblem) -> Result<WaterBalanceSolution> {
        bail!("Water balance problem is infeasible")
    }
}
