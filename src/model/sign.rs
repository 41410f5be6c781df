//! Comparison signs used by conditions.

use serde::{Deserialize, Serialize};

/// Signs valid for every attribute kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EqualitySign {
    Equal,
    NotEqual,
}

impl EqualitySign {
    pub fn holds<T: PartialEq + ?Sized>(self, actual: &T, expected: &T) -> bool {
        match self {
            EqualitySign::Equal => actual == expected,
            EqualitySign::NotEqual => actual != expected,
        }
    }
}

/// Extended sign set for ordinal and numeric attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueSign {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl ValueSign {
    /// Incomparable values (NaN) only satisfy `NotEqual`.
    pub fn holds<T: PartialOrd + ?Sized>(self, actual: &T, expected: &T) -> bool {
        use std::cmp::Ordering::*;
        let ord = actual.partial_cmp(expected);
        match self {
            ValueSign::Equal => ord == Some(Equal),
            ValueSign::NotEqual => ord != Some(Equal),
            ValueSign::Greater => ord == Some(Greater),
            ValueSign::GreaterOrEqual => matches!(ord, Some(Greater | Equal)),
            ValueSign::Less => ord == Some(Less),
            ValueSign::LessOrEqual => matches!(ord, Some(Less | Equal)),
        }
    }
}

impl From<EqualitySign> for ValueSign {
    fn from(sign: EqualitySign) -> Self {
        match sign {
            EqualitySign::Equal => ValueSign::Equal,
            EqualitySign::NotEqual => ValueSign::NotEqual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_signs() {
        assert!(ValueSign::Greater.holds(&8, &6));
        assert!(ValueSign::LessOrEqual.holds(&6, &6));
        assert!(!ValueSign::Less.holds(&6, &6));
        assert!(ValueSign::NotEqual.holds(&f64::NAN, &1.0));
        assert!(!ValueSign::GreaterOrEqual.holds(&f64::NAN, &1.0));
    }

    #[test]
    fn test_equality_signs() {
        assert!(EqualitySign::Equal.holds("O", "O"));
        assert!(EqualitySign::NotEqual.holds("H", "O"));
        assert_eq!(ValueSign::from(EqualitySign::NotEqual), ValueSign::NotEqual);
    }
}
