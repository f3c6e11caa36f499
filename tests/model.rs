use float_cmp::assert_approx_eq;
use reservoir_supply::input::load_model;
use std::path::PathBuf;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test which loads the demo model and assembles every basin profile
#[test]
fn test_load_model() {
    let model = load_model(get_model_dir()).unwrap();
    assert_eq!(model.iter_basins().count(), 2);
    assert_eq!(model.iter_periods().collect::<Vec<_>>(), [2020, 2025]);

    let profile = model.basin_profile(1, 2020, None).unwrap();
    assert_approx_eq!(f64, profile.max_capacity, 6.0);
    assert_approx_eq!(f64, profile.current_capacity, 1.0);
    assert_approx_eq!(f64, profile.demand_profile.iter().sum::<f64>(), 1.0, epsilon = 1e-9);

    // Solved capacity applies in the period after the base period
    let profile = model.basin_profile(1, 2025, Some(1.0)).unwrap();
    assert_approx_eq!(f64, profile.current_capacity, 1.6);
    let profile = model.basin_profile(2, 2025, Some(0.2)).unwrap();
    assert_approx_eq!(f64, profile.current_capacity, 0.2);
}
