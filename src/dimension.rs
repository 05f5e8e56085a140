//! CSS-like length value: a number with a unit
//!
//! Arithmetic (scaling, clamping) only applies to pixel lengths; any other
//! unit (`%`, `vh`, `em`, ...) is carried through untouched.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ViewError;

pub const PX: &str = "px";

static DIMENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d*)?)(.*)$").expect("valid dimension regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub value: f64,
    pub unit: String,
}

impl Dimension {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn px(value: f64) -> Self {
        Self::new(value, PX)
    }

    /// Parse `"<number><unit>"`; a bare number is a pixel length
    pub fn parse(input: &str) -> Result<Self, ViewError> {
        let input = input.trim();
        let caps = DIMENSION_RE
            .captures(input)
            .ok_or_else(|| ViewError::parse(input))?;
        let value: f64 = caps[1].parse().map_err(|_| ViewError::parse(input))?;
        let unit = match &caps[2] {
            "" => PX,
            unit => unit,
        };
        Ok(Self::new(value, unit))
    }

    /// Returns a new instance, replacing whichever parts are given
    pub fn copy(&self, value: Option<f64>, unit: Option<&str>) -> Self {
        Self {
            value: value.unwrap_or(self.value),
            unit: unit.map(str::to_string).unwrap_or_else(|| self.unit.clone()),
        }
    }

    pub fn with_value(&self, value: f64) -> Self {
        self.copy(Some(value), None)
    }

    pub fn is_px(&self) -> bool {
        self.unit == PX
    }

    /// `round(value * factor)` followed by the unit; non-pixel lengths are
    /// only rounded
    pub fn scaled_value(&self, factor: f64) -> String {
        let factor = if self.is_px() { factor } else { 1.0 };
        format!("{}{}", (self.value * factor).round(), self.unit)
    }

    /// Clamp pixel lengths into `[min, max]`, leaving other units alone
    pub fn clamp_px(&self, min: f64, max: f64) -> Self {
        if self.is_px() {
            self.with_value(self.value.max(min).min(max))
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for Dimension {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<f64> for Dimension {
    fn from(value: f64) -> Self {
        Self::px(value)
    }
}

impl From<u32> for Dimension {
    fn from(value: u32) -> Self {
        Self::px(f64::from(value))
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_px() {
            serializer.serialize_f64(self.value)
        } else {
            serializer.serialize_str(&self.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Self::px(value)),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_to_pixels() {
        assert_eq!(Dimension::parse("320").unwrap(), Dimension::px(320.0));
        assert_eq!(Dimension::parse("12.5px").unwrap(), Dimension::px(12.5));
        assert_eq!(
            Dimension::parse("100%").unwrap(),
            Dimension::new(100.0, "%")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Dimension::parse("wide"),
            Err(ViewError::Parse { .. })
        ));
        assert!(Dimension::parse("-20px").is_err());
        assert!(Dimension::parse("").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for input in ["320px", "0.5em", "100%", "768px", "42vh"] {
            let d = Dimension::parse(input).unwrap();
            assert_eq!(Dimension::parse(&d.to_string()).unwrap(), d, "{input}");
        }
    }

    #[test]
    fn test_scaled_value_only_scales_pixels() {
        assert_eq!(Dimension::px(320.0).scaled_value(1.5), "480px");
        assert_eq!(Dimension::px(333.0).scaled_value(0.5), "167px");
        assert_eq!(Dimension::new(100.0, "%").scaled_value(3.0), "100%");
        assert_eq!(Dimension::new(99.6, "%").scaled_value(3.0), "100%");
    }

    #[test]
    fn test_copy_replaces_given_parts() {
        let d = Dimension::px(320.0);
        assert_eq!(d.copy(Some(10.0), None), Dimension::px(10.0));
        assert_eq!(d.copy(None, Some("em")), Dimension::new(320.0, "em"));
        assert_eq!(d.copy(None, None), d);
    }

    #[test]
    fn test_clamp_px() {
        assert_eq!(Dimension::px(50.0).clamp_px(200.0, 4096.0).value, 200.0);
        assert_eq!(Dimension::px(9000.0).clamp_px(200.0, 4096.0).value, 4096.0);
        let pct = Dimension::new(10.0, "%");
        assert_eq!(pct.clamp_px(200.0, 4096.0), pct);
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let d: Dimension = serde_json::from_str("375").unwrap();
        assert_eq!(d, Dimension::px(375.0));
        let d: Dimension = serde_json::from_str("\"100%\"").unwrap();
        assert_eq!(d, Dimension::new(100.0, "%"));
        assert!(serde_json::from_str::<Dimension>("\"auto\"").is_err());
    }
}
