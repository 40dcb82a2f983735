//! Serde helper for `f64` fields that may hold infinite sentinels.
//!
//! JSON has no representation for infinity, so non-finite values are written
//! as the strings `"inf"`, `"-inf"` and `"nan"` and read back to the same
//! values. Finite values pass through as plain numbers.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Roi {
//!     #[serde(with = "bess_sim::io::non_finite")]
//!     payback_years: f64,
//! }
//!
//! let json = serde_json::to_string(&Roi { payback_years: f64::INFINITY }).unwrap();
//! assert_eq!(json, r#"{"payback_years":"inf"}"#);
//! let back: Roi = serde_json::from_str(&json).unwrap();
//! assert!(back.payback_years.is_infinite());
//! ```

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_str("nan")
    } else if *value == f64::INFINITY {
        serializer.serialize_str("inf")
    } else if *value == f64::NEG_INFINITY {
        serializer.serialize_str("-inf")
    } else {
        serializer.serialize_f64(*value)
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    deserializer.deserialize_any(SentinelVisitor)
}

struct SentinelVisitor;

impl Visitor<'_> for SentinelVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        match v {
            "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
            "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
            "nan" => Ok(f64::NAN),
            other => other
                .parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }
}
