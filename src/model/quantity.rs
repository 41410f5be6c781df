//! Quantity ranges carried by valued relations.

use serde::{Deserialize, Serialize};

use super::ValueSign;
use crate::{Error, Result};

/// A unit-agnostic range `min <= preferred <= max`, all non-negative.
/// `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuantityRepr", into = "QuantityRepr")]
pub struct Quantity {
    min: f64,
    preferred: f64,
    max: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct QuantityRepr {
    min: f64,
    preferred: f64,
    #[serde(default)]
    max: Option<f64>,
}

impl TryFrom<QuantityRepr> for Quantity {
    type Error = Error;

    fn try_from(repr: QuantityRepr) -> Result<Self> {
        Quantity::new(repr.min, repr.preferred, repr.max)
    }
}

impl From<Quantity> for QuantityRepr {
    fn from(q: Quantity) -> Self {
        QuantityRepr { min: q.min, preferred: q.preferred, max: q.max }
    }
}

fn is_amount(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl Quantity {
    pub fn new(min: f64, preferred: f64, max: Option<f64>) -> Result<Self> {
        if !is_amount(min) || !is_amount(preferred) || max.is_some_and(|m| !is_amount(m)) {
            return Err(Error::InvalidArgument(format!(
                "quantity bounds must be finite and non-negative: {min}/{preferred}/{max:?}"
            )));
        }
        if min > preferred || max.is_some_and(|m| preferred > m) {
            return Err(Error::InvalidArgument(format!(
                "quantity must satisfy min <= preferred <= max: {min}/{preferred}/{max:?}"
            )));
        }
        Ok(Self { min, preferred, max })
    }

    /// A degenerate range. Negative or non-finite input collapses to zero.
    pub fn exact(amount: f64) -> Self {
        let amount = if is_amount(amount) { amount } else { 0.0 };
        Self { min: amount, preferred: amount, max: Some(amount) }
    }

    /// `min..` with no upper bound; preferred equals `min`.
    pub fn at_least(min: f64) -> Self {
        let min = if is_amount(min) { min } else { 0.0 };
        Self { min, preferred: min, max: None }
    }

    pub fn min(&self) -> f64 { self.min }
    pub fn preferred(&self) -> f64 { self.preferred }
    pub fn max(&self) -> Option<f64> { self.max }
    pub fn is_bounded(&self) -> bool { self.max.is_some() }

    /// Shift the whole range up by `delta`. Fails when a bound leaves the
    /// finite range.
    pub fn increased(self, delta: f64) -> Result<Self> {
        Quantity::new(self.min + delta, self.preferred + delta, self.max.map(|m| m + delta))
    }

    /// Shift the whole range down by `delta`, clamping every bound at zero.
    pub fn decreased(self, delta: f64) -> Self {
        Self {
            min: (self.min - delta).max(0.0),
            preferred: (self.preferred - delta).max(0.0),
            max: self.max.map(|m| (m - delta).max(0.0)),
        }
    }

    /// Whole number of units the preferred amount stands for, at least one.
    pub fn count(&self) -> usize {
        (self.preferred.round() as usize).max(1)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::exact(1.0)
    }
}

/// Requirement on the preferred amount of a valued subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityCondition {
    pub sign: ValueSign,
    pub value: f64,
}

impl QuantityCondition {
    pub fn new(sign: ValueSign, value: f64) -> Self {
        Self { sign, value }
    }

    pub fn admits(&self, quantity: &Quantity) -> bool {
        self.sign.holds(&quantity.preferred(), &self.value)
    }
}

/// Mutation of a valued subject's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QuantityChange {
    Increase(f64),
    Decrease(f64),
    Set(Quantity),
}

impl QuantityChange {
    pub fn apply(&self, current: Quantity) -> Result<Quantity> {
        match *self {
            QuantityChange::Increase(delta) | QuantityChange::Decrease(delta) if !is_amount(delta) => {
                Err(Error::InvalidArgument(format!("quantity delta must be non-negative, got {delta}")))
            }
            QuantityChange::Increase(delta) => current.increased(delta),
            QuantityChange::Decrease(delta) => Ok(current.decreased(delta)),
            QuantityChange::Set(quantity) => Ok(quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validation() {
        assert!(Quantity::new(1.0, 2.0, Some(3.0)).is_ok());
        assert!(Quantity::new(1.0, 2.0, None).is_ok());
        assert!(Quantity::new(2.0, 1.0, None).is_err());
        assert!(Quantity::new(0.0, 4.0, Some(3.0)).is_err());
        assert!(Quantity::new(-1.0, 0.0, None).is_err());
    }

    #[test]
    fn test_decrease_clamps_at_zero() {
        let q = Quantity::new(1.0, 2.0, Some(5.0)).unwrap();
        let q = QuantityChange::Decrease(3.0).apply(q).unwrap();
        assert_eq!((q.min(), q.preferred(), q.max()), (0.0, 0.0, Some(2.0)));
    }

    #[test]
    fn test_increase_keeps_unbounded() {
        let q = QuantityChange::Increase(2.0).apply(Quantity::at_least(1.0)).unwrap();
        assert_eq!((q.min(), q.preferred(), q.max()), (3.0, 3.0, None));
        assert!(QuantityChange::Increase(-1.0).apply(q).is_err());
    }

    #[test]
    fn test_increase_rejects_overflow() {
        let huge = Quantity::exact(f64::MAX);
        assert!(matches!(
            QuantityChange::Increase(f64::MAX).apply(huge),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Quantity::at_least(1e308).increased(1e308).is_err());
    }

    #[test]
    fn test_condition_on_preferred() {
        let cond = QuantityCondition::new(ValueSign::GreaterOrEqual, 2.0);
        assert!(cond.admits(&Quantity::exact(2.0)));
        assert!(!cond.admits(&Quantity::exact(1.5)));
    }

    #[test]
    fn test_serde_rejects_inverted_range() {
        let ok: Quantity = serde_json::from_str(r#"{"min":1.0,"preferred":1.0}"#).unwrap();
        assert_eq!(ok, Quantity::at_least(1.0));
        assert!(serde_json::from_str::<Quantity>(r#"{"min":3.0,"preferred":1.0}"#).is_err());
    }

    #[test]
    fn test_count_rounds_preferred() {
        assert_eq!(Quantity::exact(2.0).count(), 2);
        assert_eq!(Quantity::exact(0.2).count(), 1);
    }
}
