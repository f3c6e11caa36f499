//! The monthly reservoir water balance optimisation.
//!
//! For a fixed storage capacity, the largest annual yield which can be released every year is
//! found by solving a linear programme over twelve cyclic monthly periods. The storage at the end
//! of December carries over to the start of January.
use crate::profile::{MONTHS_PER_YEAR, MonthlyFractions, iter_months};
use anyhow::{Result, anyhow, bail};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use log::Level;

/// A decision variable in the optimisation
type Variable = highs::Col;

/// Share of monthly inflow reserved as environmental flow
pub const ENVIRONMENTAL_FLOW_FRACTION: f64 = 0.1;

/// The inputs for a single water balance solve.
///
/// Volumes are in km³ and annual quantities in km³ per year.
#[derive(Debug, Clone, Copy)]
pub struct WaterBalanceProblem<'a> {
    /// Storage capacity of the reservoir
    pub capacity: f64,
    /// Minimum storage to be held in every month
    pub min_storage: f64,
    /// Mean annual inflow
    pub annual_inflow: f64,
    /// Annual evaporative loss from the reservoir surface
    pub annual_evaporation: f64,
    /// Monthly share of annual demand
    pub demand_profile: &'a MonthlyFractions,
    /// Monthly share of annual inflow
    pub inflow_profile: &'a MonthlyFractions,
    /// Monthly share of annual evaporation
    pub evaporation_profile: &'a MonthlyFractions,
    /// Share of releases and environmental flow which returns to the reservoir
    pub return_flow_fraction: f64,
}

impl WaterBalanceProblem<'_> {
    /// Inflow in the given month
    pub fn monthly_inflow(&self, month: u32) -> f64 {
        (self.inflow_profile.get(month) * self.annual_inflow).max(0.0)
    }

    /// Evaporation in the given month
    pub fn monthly_evaporation(&self, month: u32) -> f64 {
        (self.evaporation_profile.get(month) * self.annual_evaporation).max(0.0)
    }

    /// Environmental flow in the given month
    pub fn environmental_flow(&self, month: u32) -> f64 {
        ENVIRONMENTAL_FLOW_FRACTION * self.monthly_inflow(month)
    }
}

/// Flows and storage for one month of a solved water balance
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyWaterBalance {
    /// Month number (1 to 12)
    pub month: u32,
    /// Inflow to the reservoir
    pub inflow: f64,
    /// Evaporative loss from the reservoir surface
    pub evaporation: f64,
    /// Water released to meet demand
    pub release: f64,
    /// Flow reserved for the environment
    pub environmental_flow: f64,
    /// Water returned to the reservoir after use
    pub return_flow: f64,
    /// Water released in excess of demand
    pub spill: f64,
    /// Storage at the start of the month
    pub storage: f64,
}

/// The result of a water balance solve
#[derive(Debug, Clone, PartialEq)]
pub struct WaterBalanceSolution {
    /// The storage capacity the problem was solved for
    pub capacity: f64,
    /// The maximum annual yield
    pub annual_yield: f64,
    /// Flows and storage for each month, January first
    pub months: Vec<MonthlyWaterBalance>,
}

/// Solves the monthly water balance for a given storage capacity
pub trait WaterBalanceSolver {
    /// Find the maximum annual yield for the given problem
    fn solve(&self, problem: &WaterBalanceProblem) -> Result<WaterBalanceSolution>;
}

/// Decision variables for the water balance
struct VariableMap {
    annual_yield: Variable,
    storage: Vec<Variable>,
    release: Vec<Variable>,
    spill: Vec<Variable>,
    return_flow: Vec<Variable>,
}

/// A [`WaterBalanceSolver`] backed by the HiGHS LP solver
#[derive(Debug, Default, Clone, Copy)]
pub struct HighsSolver {
    /// Whether to print HiGHS output to the console
    pub verbose: bool,
}

impl HighsSolver {
    /// Create a solver, enabling HiGHS output only when trace-level logging is active
    pub fn from_log_level() -> Self {
        Self {
            verbose: log::log_enabled!(Level::Trace),
        }
    }
}

impl WaterBalanceSolver for HighsSolver {
    fn solve(&self, problem: &WaterBalanceProblem) -> Result<WaterBalanceSolution> {
        let mut lp = Problem::default();
        let variables = add_variables(&mut lp, problem);
        add_constraints(&mut lp, &variables, problem);

        let mut model = lp.optimise(Sense::Maximise);
        model.set_option("output_flag", self.verbose);
        let solved = model
            .try_solve()
            .map_err(|status| anyhow!("Could not solve water balance: {status:?}"))?;
        match solved.status() {
            HighsModelStatus::Optimal => {}
            status => bail!("Could not solve water balance: {status:?}"),
        }

        let solution = solved.get_solution();
        Ok(read_solution(solution.columns(), problem))
    }
}

/// Add the decision variables.
///
/// The column order is: yield, then storage, release, spill and return flow for each month.
fn add_variables(lp: &mut Problem, problem: &WaterBalanceProblem) -> VariableMap {
    let annual_yield = lp.add_column(1.0, 0.0..);

    // A minimum storage above capacity would make every problem infeasible
    let min_storage = problem.min_storage.min(problem.capacity);
    let storage = iter_months()
        .map(|_| lp.add_column(0.0, min_storage..=problem.capacity))
        .collect();
    let release = iter_months().map(|_| lp.add_column(0.0, 0.0..)).collect();
    let spill = iter_months().map(|_| lp.add_column(0.0, 0.0..)).collect();
    let return_flow = iter_months().map(|_| lp.add_column(0.0, 0.0..)).collect();

    VariableMap {
        annual_yield,
        storage,
        release,
        spill,
        return_flow,
    }
}

/// Add the mass balance, demand and return flow constraints for each month
fn add_constraints(lp: &mut Problem, variables: &VariableMap, problem: &WaterBalanceProblem) {
    let m = problem.return_flow_fraction;
    for (idx, month) in iter_months().enumerate() {
        let next = (idx + 1) % MONTHS_PER_YEAR;
        let inflow = problem.monthly_inflow(month);
        let evaporation = problem.monthly_evaporation(month);
        let environmental_flow = problem.environmental_flow(month);

        // S[t+1] = S[t] + I - E - EF - R + RF - X
        let rhs = inflow - evaporation - environmental_flow;
        lp.add_row(
            rhs..=rhs,
            [
                (variables.storage[next], 1.0),
                (variables.storage[idx], -1.0),
                (variables.release[idx], 1.0),
                (variables.return_flow[idx], -1.0),
                (variables.spill[idx], 1.0),
            ],
        );

        // R[t] >= f[t] * Y
        lp.add_row(
            0.0..,
            [
                (variables.release[idx], 1.0),
                (variables.annual_yield, -problem.demand_profile.get(month)),
            ],
        );

        // RF[t] = m * (R[t] + EF[t])
        let rhs = m * environmental_flow;
        lp.add_row(
            rhs..=rhs,
            [
                (variables.return_flow[idx], 1.0),
                (variables.release[idx], -m),
            ],
        );
    }
}

/// Convert the raw column values into a [`WaterBalanceSolution`]
fn read_solution(columns: &[f64], problem: &WaterBalanceProblem) -> WaterBalanceSolution {
    let column = |offset: usize, idx: usize| columns[1 + offset * MONTHS_PER_YEAR + idx];
    let months = iter_months()
        .enumerate()
        .map(|(idx, month)| MonthlyWaterBalance {
            month,
            inflow: problem.monthly_inflow(month),
            evaporation: problem.monthly_evaporation(month),
            release: column(1, idx),
            environmental_flow: problem.environmental_flow(month),
            return_flow: column(3, idx),
            spill: column(2, idx),
            storage: column(0, idx),
        })
        .collect();

    WaterBalanceSolution {
        capacity: problem.capacity,
        annual_yield: columns[0],
        months,
    }
}
