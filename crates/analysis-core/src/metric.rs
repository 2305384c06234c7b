use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric field that is either a finite value or explicitly indeterminate.
///
/// Non-finite inputs (NaN, ±inf) are normalized to `Indeterminate` at construction,
/// so every `Value` held by this type is finite. Serializes as a JSON number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Metric {
    Value(f64),
    #[default]
    Indeterminate,
}

impl Metric {
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Metric::Value(value)
        } else {
            Metric::Indeterminate
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(v),
            Metric::Indeterminate => None,
        }
    }

    /// The value if present and not exactly zero.
    pub fn non_zero(self) -> Option<f64> {
        self.value().filter(|v| *v != 0.0)
    }

    pub fn is_present(self) -> bool {
        matches!(self, Metric::Value(_))
    }

    pub fn is_indeterminate(self) -> bool {
        !self.is_present()
    }

    pub fn unwrap_or(self, default: f64) -> f64 {
        self.value().unwrap_or(default)
    }

    pub fn or(self, other: Metric) -> Metric {
        if self.is_present() {
            self
        } else {
            other
        }
    }

    /// Apply `f` to a present value; a non-finite result becomes indeterminate.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Metric {
        match self {
            Metric::Value(v) => Metric::new(f(v)),
            Metric::Indeterminate => Metric::Indeterminate,
        }
    }

    /// Combine two metrics; indeterminate if either side is.
    pub fn zip_with(self, other: Metric, f: impl FnOnce(f64, f64) -> f64) -> Metric {
        match (self, other) {
            (Metric::Value(a), Metric::Value(b)) => Metric::new(f(a, b)),
            _ => Metric::Indeterminate,
        }
    }

    /// First present metric in priority order.
    pub fn first_valid(candidates: impl IntoIterator<Item = Metric>) -> Metric {
        candidates
            .into_iter()
            .find(|m| m.is_present())
            .unwrap_or(Metric::Indeterminate)
    }
}

impl From<f64> for Metric {
    fn from(value: f64) -> Self {
        Metric::new(value)
    }
}

impl From<Option<f64>> for Metric {
    fn from(value: Option<f64>) -> Self {
        value.map(Metric::new).unwrap_or(Metric::Indeterminate)
    }
}

impl From<Metric> for Option<f64> {
    fn from(metric: Metric) -> Self {
        metric.value()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            Metric::Indeterminate => f.write_str("N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_is_indeterminate() {
        assert_eq!(Metric::new(f64::NAN), Metric::Indeterminate);
        assert_eq!(Metric::new(f64::INFINITY), Metric::Indeterminate);
        assert_eq!(Metric::new(f64::NEG_INFINITY), Metric::Indeterminate);
        assert_eq!(Metric::new(0.0), Metric::Value(0.0));
    }

    #[test]
    fn test_first_valid_skips_indeterminate() {
        let m = Metric::first_valid([Metric::Indeterminate, Metric::new(f64::NAN), Metric::Value(3.0), Metric::Value(4.0)]);
        assert_eq!(m, Metric::Value(3.0));
        assert!(Metric::first_valid([]).is_indeterminate());
    }

    #[test]
    fn test_zip_propagates_indeterminate() {
        let a = Metric::Value(2.0);
        assert_eq!(a.zip_with(Metric::Value(3.0), |x, y| x * y), Metric::Value(6.0));
        assert!(a.zip_with(Metric::Indeterminate, |x, y| x * y).is_indeterminate());
        assert!(a.map(|x| x / 0.0).is_indeterminate());
    }

    #[test]
    fn test_serde_as_nullable_number() {
        let json = serde_json::to_string(&vec![Metric::Value(1.5), Metric::Indeterminate]).unwrap();
        assert_eq!(json, "[1.5,null]");
        let back: Vec<Metric> = serde_json::from_str("[2.0,null]").unwrap();
        assert_eq!(back, vec![Metric::Value(2.0), Metric::Indeterminate]);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{:.2}", Metric::Value(1.234)), "1.23");
        assert_eq!(format!("{:.2}", Metric::Indeterminate), "N/A");
    }
}
