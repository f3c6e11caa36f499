//! Monthly fractional profiles for inflow, evaporation and demand.
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use std::fmt;

/// The number of months in the water balance year
pub const MONTHS_PER_YEAR: usize = 12;

/// Absolute tolerance when checking that a profile sums to one
const FRACTION_SUM_TOLERANCE: f64 = 1e-4;

/// The share of an annual quantity falling in each month.
///
/// Months are numbered 1 to 12. Every value lies in [0, 1] and the values sum to one.
#[derive(Clone, Copy, PartialEq)]
pub struct MonthlyFractions([f64; MONTHS_PER_YEAR]);

impl MonthlyFractions {
    /// Create a profile, checking that the values are valid fractions which sum to one
    pub fn new(values: [f64; MONTHS_PER_YEAR]) -> Result<Self> {
        for (month, value) in iter_months().zip(values) {
            ensure!(
                (0.0..=1.0).contains(&value),
                "Fraction for month {month} is not between 0 and 1 (value: {value})"
            );
        }

        let sum: f64 = values.iter().sum();
        ensure!(
            approx_eq!(f64, sum, 1.0, epsilon = FRACTION_SUM_TOLERANCE),
            "Monthly fractions do not sum to one (actual: {sum})"
        );

        Ok(Self(values))
    }

    /// A profile which spreads the annual quantity evenly over the year
    pub fn uniform() -> Self {
        Self([1.0 / MONTHS_PER_YEAR as f64; MONTHS_PER_YEAR])
    }

    /// Get the fraction for the given month (1 to 12)
    pub fn get(&self, month: u32) -> f64 {
        assert!(
            (1..=MONTHS_PER_YEAR as u32).contains(&month),
            "Invalid month: {month}"
        );
        self.0[month as usize - 1]
    }

    /// Iterate over the fractions in month order
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    /// The fractions as an array, January first
    pub fn as_array(&self) -> &[f64; MONTHS_PER_YEAR] {
        &self.0
    }
}

impl fmt::Debug for MonthlyFractions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Iterate over month numbers, starting at 1
pub fn iter_months() -> impl Iterator<Item = u32> {
    1..=MONTHS_PER_YEAR as u32
}
