//! Code for reading basin information from a CSV file.
use super::*;
use crate::basin::{Basin, BasinMap};
use anyhow::{Context, Result, ensure};
use std::path::Path;

const BASINS_FILE_NAME: &str = "basins.csv";

/// Read basins from an iterator of records, checking IDs are unique
fn read_basins_from_iter<I>(iter: I) -> Result<BasinMap>
where
    I: Iterator<Item = Basin>,
{
    let mut basins = BasinMap::new();
    for basin in iter {
        ensure!(
            !basin.gcam_basin_name.is_empty(),
            "Basin {} has an empty gcam_basin_name",
            basin.id
        );
        let id = basin.id;
        ensure!(
            basins.insert(id, basin).is_none(),
            "Duplicate basin ID {id}"
        );
    }

    Ok(basins)
}

/// Read basins from a CSV file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// A map of basins, in file order, keyed by basin ID
pub fn read_basins(model_dir: &Path) -> Result<BasinMap> {
    let file_path = model_dir.join(BASINS_FILE_NAME);
    let basins_csv = read_csv(&file_path)?;
    read_basins_from_iter(basins_csv).with_context(|| input_err_msg(&file_path))
}
