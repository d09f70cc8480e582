//! Serde adapters writing NaN as `null` and reading `null` back as NaN.
//!
//! Use with `#[serde(with = "nullable")]` on `f64` fields and
//! `#[serde(with = "nullable::seq")]` on `Vec<f64>` fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let value = (!value.is_nan()).then_some(*value);
    value.serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

pub mod seq {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let values: Vec<Option<f64>> = values.iter().map(|v| (!v.is_nan()).then_some(*v)).collect();
        values.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// Arrays of any dimension, in ndarray's serde layout.
pub mod array {
    use ndarray::{Array, Dimension};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, D>(values: &Array<f64, D>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        D: Dimension + Serialize,
    {
        values.map(|v| (!v.is_nan()).then_some(*v)).serialize(serializer)
    }

    pub fn deserialize<'de, De, D>(deserializer: De) -> Result<Array<f64, D>, De::Error>
    where
        De: Deserializer<'de>,
        D: Dimension + Deserialize<'de>,
    {
        let values = Array::<Option<f64>, D>::deserialize(deserializer)?;
        Ok(values.mapv(|v| v.unwrap_or(f64::NAN)))
    }
}
