//! General functions related to finance.
use crate::units::{Dimensionless, Money};

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualize capital costs over the lifetime of an asset. It is equivalent to
/// `r / (1 - (1 + r)^-n)`.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annual payment that repays a capital cost over its lifetime
pub fn annualised_cost(capital_cost: Money, lifetime: u32, discount_rate: Dimensionless) -> Money {
    capital_cost * capital_recovery_factor(lifetime, discount_rate)
}
