//! Functionality for running the model over every period and basin.
use crate::basin::{Basin, BasinID};
use crate::model::Model;
use crate::output::DataWriter;
use crate::output::metadata::{FailedBasin, RunSummary, write_metadata};
use crate::supply_curve::{BasinSupplyCurve, build_supply_curve};
use crate::water_balance::{HighsSolver, WaterBalanceSolver};
use anyhow::{Result, ensure};
use log::{error, info};
use std::collections::HashMap;
use std::path::Path;

/// Build the supply curve for one basin in one period
fn run_basin<S: WaterBalanceSolver + ?Sized>(
    model: &Model,
    basin: &Basin,
    period: u32,
    previous_capacity: &mut HashMap<BasinID, f64>,
    solver: &S,
) -> Result<BasinSupplyCurve> {
    let profile = model.basin_profile(basin.id, period, previous_capacity.get(&basin.id).copied())?;
    previous_capacity.insert(basin.id, profile.current_capacity);

    build_supply_curve(&profile, &model.parameters, solver)
}

/// Run the model with the given solver, writing results to `output_path`.
///
/// Basins which fail are logged and skipped. An error is returned only if no supply curve could
/// be built at all.
pub fn run_with_solver<S: WaterBalanceSolver + ?Sized>(
    model: &Model,
    output_path: &Path,
    solver: &S,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        periods: model.iter_periods().collect(),
        ..RunSummary::default()
    };
    let mut previous_capacity = HashMap::new();

    for period in model.iter_periods() {
        info!("Period: {period}");
        let mut writer = DataWriter::create(output_path, period, &model.parameters.outputs)?;

        for basin in model.iter_basins() {
            match run_basin(model, basin, period, &mut previous_capacity, solver) {
                Ok(result) => {
                    info!(
                        "Basin {} ({}): maximum supply {:.4} km³",
                        basin.id, basin.name, result.max_supply
                    );
                    writer.write_basin(basin, &result)?;
                    summary.succeeded += 1;
                }
                Err(err) => {
                    error!(
                        "Failed to build supply curve for basin {} ({}) in period {period}: {err:?}",
                        basin.id, basin.name
                    );
                    summary.failed.push(FailedBasin {
                        basin_id: basin.id,
                        period,
                    });
                }
            }
        }

        writer.flush()?;
    }

    write_metadata(output_path, &model.model_path, &summary)?;
    ensure!(
        summary.succeeded > 0 || summary.failed.is_empty(),
        "Could not build a supply curve for any basin"
    );

    Ok(summary)
}

/// Run the model using HiGHS, writing results to `output_path`
pub fn run(model: &Model, output_path: &Path) -> Result<RunSummary> {
    run_with_solver(model, output_path, &HighsSolver::from_log_level())
}
