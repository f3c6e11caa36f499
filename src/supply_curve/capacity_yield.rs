//! Tracing the capacity-yield curve of a basin with repeated water balance solves.
//!
//! Storage capacity is increased in adaptively sized steps from zero until the yield stops
//! increasing (the inflection point), then the curve is extended to the largest capacity that
//! could be built.
use super::interpolate;
use crate::basin::BasinPhysicalProfile;
use crate::evaporation::{EvaporationParameters, estimate_evaporation};
use crate::model::ModelParameters;
use crate::water_balance::{WaterBalanceProblem, WaterBalanceSolution, WaterBalanceSolver};
use anyhow::{Context, Result};
use log::{debug, warn};

/// Share of the available yield above which the initial step is halved
const HALVING_THRESHOLD: f64 = 0.05;

/// Share of the available yield at which fixed-size stepping ends
const WALK_TARGET: f64 = 0.95;

/// Number of trailing points used to estimate the slope near the inflection point
const SLOPE_WINDOW: usize = 5;

/// Slopes below this are treated as shallow when refining the step near the inflection point
const SHALLOW_SLOPE: f64 = 1.5;

/// A single point on a capacity-yield curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityYieldPoint {
    /// Storage capacity (km³)
    pub capacity: f64,
    /// Annual yield (km³)
    pub annual_yield: f64,
}

impl CapacityYieldPoint {
    /// Create a new point
    pub fn new(capacity: f64, annual_yield: f64) -> Self {
        Self {
            capacity,
            annual_yield,
        }
    }
}

/// The largest buildable capacity and the yield there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxExpansionPoint {
    /// Maximum expandable capacity (km³)
    pub capacity: f64,
    /// Annual yield at maximum capacity (km³)
    pub annual_yield: f64,
    /// Whether maximum capacity lies beyond the inflection point
    pub exceeds_inflection: bool,
}

/// Yield as a function of storage capacity, sampled at increasing capacities
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityYieldCurve {
    capacities: Vec<f64>,
    yields: Vec<f64>,
}

impl CapacityYieldCurve {
    /// Create a curve from points sorted by capacity
    pub fn from_points(points: &[CapacityYieldPoint]) -> Self {
        Self {
            capacities: points.iter().map(|point| point.capacity).collect(),
            yields: points.iter().map(|point| point.annual_yield).collect(),
        }
    }

    /// Iterate over the points of the curve
    pub fn points(&self) -> impl Iterator<Item = CapacityYieldPoint> + '_ {
        self.capacities
            .iter()
            .zip(&self.yields)
            .map(|(&capacity, &annual_yield)| CapacityYieldPoint::new(capacity, annual_yield))
    }

    /// The number of points
    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    /// Whether the curve has no points
    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }

    /// The largest yield on the curve
    pub fn max_yield(&self) -> f64 {
        self.yields.iter().copied().fold(0.0, f64::max)
    }

    /// The capacity of the first point at which the curve reaches its largest yield
    pub fn first_max_yield_capacity(&self) -> f64 {
        let max_yield = self.max_yield();
        self.points()
            .find(|point| point.annual_yield >= max_yield)
            .map_or(0.0, |point| point.capacity)
    }

    /// Yield at the given capacity.
    ///
    /// Linear between points. Outside the sampled range, the largest yield on the curve.
    pub fn interpolate(&self, capacity: f64) -> f64 {
        interpolate::linear(&self.capacities, &self.yields, capacity, self.max_yield())
    }

    /// A copy of the curve with an extra point, keeping points sorted and unique
    fn with_point(&self, extra: CapacityYieldPoint) -> Self {
        let mut points: Vec<_> = self.points().chain(std::iter::once(extra)).collect();
        points.sort_by(|a, b| {
            a.capacity
                .total_cmp(&b.capacity)
                .then(a.annual_yield.total_cmp(&b.annual_yield))
        });
        points.dedup();
        Self::from_points(&points)
    }
}

/// Every water balance solved while tracing a curve, in the order solved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionLog(Vec<WaterBalanceSolution>);

impl SolutionLog {
    fn push(&mut self, solution: WaterBalanceSolution) {
        self.0.push(solution);
    }

    /// Iterate over the logged solutions
    pub fn iter(&self) -> impl Iterator<Item = &WaterBalanceSolution> {
        self.0.iter()
    }

    /// The number of logged solutions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no solutions have been logged
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accepted curve points and the capacity track used to estimate evaporation.
///
/// The track holds the cumulative capacity after each reservoir is built. Trial steps are appended
/// to the track and rolled back if the yield does not increase.
struct CurveTrace {
    points: Vec<CapacityYieldPoint>,
    track: Vec<f64>,
}

impl CurveTrace {
    fn new(base: CapacityYieldPoint) -> Self {
        Self {
            points: vec![base],
            track: vec![base.capacity],
        }
    }

    /// The last accepted point
    fn last(&self) -> CapacityYieldPoint {
        *self.points.last().expect("Trace always has a base point")
    }

    /// Whether the last accepted point has a higher yield than the one before it
    fn is_increasing(&self) -> bool {
        match self.points.as_slice() {
            [.., previous, last] => last.annual_yield > previous.annual_yield,
            _ => false,
        }
    }

    /// The capacity at the end of the track
    fn track_end(&self) -> f64 {
        *self.track.last().expect("Trace always has a base capacity")
    }

    fn extend_track(&mut self, capacity: f64) {
        self.track.push(capacity);
    }

    fn rollback(&mut self) {
        self.track.pop();
    }

    fn accept(&mut self, point: CapacityYieldPoint) {
        self.points.push(point);
    }

    /// Mean slope between consecutive points among the last `count`
    fn mean_slope(&self, count: usize) -> Option<f64> {
        let start = self.points.len().saturating_sub(count);
        let slopes: Vec<f64> = self.points[start..]
            .windows(2)
            .map(|pair| {
                (pair[1].annual_yield - pair[0].annual_yield) / (pair[1].capacity - pair[0].capacity)
            })
            .collect();
        (!slopes.is_empty()).then(|| slopes.iter().sum::<f64>() / slopes.len() as f64)
    }
}

/// The traced capacity-yield relationship for one basin and period
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityYieldResult {
    /// Yield with no storage
    pub yield_base: f64,
    /// Curve from zero capacity to the inflection point
    pub unconstrained: CapacityYieldCurve,
    /// The unconstrained curve with a point at maximum capacity added
    pub constrained: CapacityYieldCurve,
    /// The last point before yield stops increasing
    pub inflection: CapacityYieldPoint,
    /// Yield at the largest buildable capacity
    pub max_expansion: MaxExpansionPoint,
    /// Every water balance solved while tracing the curve
    pub solutions: SolutionLog,
}

/// Traces the capacity-yield curve for a basin
pub struct CapacityYieldBuilder<'a, S: WaterBalanceSolver + ?Sized> {
    profile: &'a BasinPhysicalProfile,
    parameters: &'a ModelParameters,
    solver: &'a S,
    solutions: SolutionLog,
    solver_calls: u32,
}

impl<'a, S: WaterBalanceSolver + ?Sized> CapacityYieldBuilder<'a, S> {
    /// Create a new builder
    pub fn new(
        profile: &'a BasinPhysicalProfile,
        parameters: &'a ModelParameters,
        solver: &'a S,
    ) -> Self {
        Self {
            profile,
            parameters,
            solver,
            solutions: SolutionLog::default(),
            solver_calls: 0,
        }
    }

    /// Trace the curve
    pub fn build(mut self) -> Result<CapacityYieldResult> {
        let yield_base = self.solve(0.0, &[0.0])?;
        let mut trace = CurveTrace::new(CapacityYieldPoint::new(0.0, yield_base));

        let headroom = self.profile.inflow - yield_base;
        if headroom > 0.0 {
            let dx = self.calibrate_step(yield_base)?;
            self.walk(&mut trace, dx, yield_base + WALK_TARGET * headroom)?;
            self.refine(&mut trace, dx)?;
        } else {
            debug!(
                "Basin {}: yield without storage ({yield_base}) is not below inflow",
                self.profile.basin_id
            );
        }

        let inflection = trace.last();
        let unconstrained = CapacityYieldCurve::from_points(&trace.points);
        debug!(
            "Basin {}: inflection point at capacity {} with yield {} after {} solves",
            self.profile.basin_id, inflection.capacity, inflection.annual_yield, self.solver_calls
        );

        let max_capacity = self.profile.max_capacity;
        let max_expansion = if inflection.capacity < max_capacity {
            let increment = self.profile.expansion_increment;
            let mut capacity = inflection.capacity + increment;
            while capacity < max_capacity {
                trace.extend_track(capacity);
                capacity += increment;
            }
            trace.extend_track(max_capacity);
            MaxExpansionPoint {
                capacity: max_capacity,
                annual_yield: self.solve(max_capacity, &trace.track)?,
                exceeds_inflection: true,
            }
        } else {
            MaxExpansionPoint {
                capacity: max_capacity,
                annual_yield: unconstrained.interpolate(max_capacity),
                exceeds_inflection: false,
            }
        };

        let constrained = unconstrained.with_point(CapacityYieldPoint::new(
            max_capacity,
            unconstrained.interpolate(max_capacity),
        ));

        Ok(CapacityYieldResult {
            yield_base,
            unconstrained,
            constrained,
            inflection,
            max_expansion,
            solutions: self.solutions,
        })
    }

    /// Solve the water balance at `capacity`, estimating evaporation from the reservoirs in `track`
    fn solve(&mut self, capacity: f64, track: &[f64]) -> Result<f64> {
        let annual_evaporation =
            estimate_evaporation(track, &EvaporationParameters::from(self.profile));
        let problem = WaterBalanceProblem {
            capacity,
            min_storage: self.parameters.min_storage,
            annual_inflow: self.profile.inflow,
            annual_evaporation,
            demand_profile: &self.profile.demand_profile,
            inflow_profile: &self.profile.inflow_profile,
            evaporation_profile: &self.profile.evaporation_profile,
            return_flow_fraction: self.parameters.return_flow_fraction,
        };

        let solution = self
            .solver
            .solve(&problem)
            .with_context(|| format!("Water balance failed for storage capacity {capacity}"))?;
        self.solver_calls += 1;
        let annual_yield = solution.annual_yield;
        self.solutions.push(solution);

        Ok(annual_yield)
    }

    /// Whether more solves are allowed. Logs a warning if not.
    fn has_budget(&self, phase: &str) -> bool {
        if self.solver_calls < self.parameters.max_solver_calls {
            return true;
        }

        warn!(
            "Basin {}: reached the limit of {} water balance solves while {phase}",
            self.profile.basin_id, self.parameters.max_solver_calls
        );
        false
    }

    /// Choose the capacity step used to trace the curve up to the inflection region.
    ///
    /// The step is halved until a single step gains at most 5% of the available yield, then doubled
    /// until roughly `init_segments / 2` steps are needed to gain all of it.
    fn calibrate_step(&mut self, yield_base: f64) -> Result<f64> {
        let max_capacity = self.profile.max_capacity;
        let headroom = self.profile.inflow - yield_base;

        let iterations = (max_capacity / self.profile.expansion_increment).ceil();
        let mut dx = if (50.0..=500.0).contains(&iterations) {
            self.profile.expansion_increment
        } else {
            max_capacity / f64::from(self.parameters.init_segments)
        };

        let mut yield_dx = self.solve(dx, &[dx])?;
        while yield_dx > yield_base + HALVING_THRESHOLD * headroom
            && self.has_budget("calibrating the step size")
        {
            dx /= 2.0;
            yield_dx = self.solve(dx, &[dx])?;
        }

        let target_segments = f64::from(self.parameters.init_segments) / 2.0;
        while self.has_budget("calibrating the step size") {
            let gain = yield_dx - yield_base;
            if gain == 0.0 || headroom / gain <= target_segments {
                break;
            }
            dx *= 2.0;
            yield_dx = self.solve(dx, &[dx])?;
        }

        Ok(dx)
    }

    /// Step capacity by `dx` while yield increases, until yield reaches `target`
    fn walk(&mut self, trace: &mut CurveTrace, dx: f64, target: f64) -> Result<()> {
        while trace.last().annual_yield < target && self.has_budget("tracing the curve") {
            let capacity = trace.track_end() + dx;
            trace.extend_track(capacity);
            let annual_yield = self.solve(capacity, &trace.track)?;
            if annual_yield > trace.last().annual_yield {
                trace.accept(CapacityYieldPoint::new(capacity, annual_yield));
            } else {
                trace.rollback();
                break;
            }
        }

        Ok(())
    }

    /// Step capacity in smaller steps until yield stops increasing
    fn refine(&mut self, trace: &mut CurveTrace, dx: f64) -> Result<()> {
        let increment = self.profile.expansion_increment;
        let step = match trace.mean_slope(SLOPE_WINDOW) {
            Some(slope) if slope < SHALLOW_SLOPE => (dx / 2.0).min(increment),
            _ => (dx / 10.0).min(increment),
        };

        while trace.is_increasing() && self.has_budget("refining the inflection point") {
            let capacity = trace.track_end() + step;
            trace.extend_track(capacity);
            let annual_yield = self.solve(capacity, &trace.track)?;
            if annual_yield > trace.last().annual_yield {
                trace.accept(CapacityYieldPoint::new(capacity, annual_yield));
            } else {
                trace.rollback();
                break;
            }
        }

        Ok(())
    }
}
