use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::goodwe::labels::{self, label_for};
use crate::goodwe::registry::{DerivedSpec, DeviceFamily, FieldMap, FieldSpec, Formula, SensorKind, Width};

// active power within this many watts of zero counts as idle
const GRID_DEAD_BAND: f64 = 90.0;

// {{{ Value
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Unscaled counts and powers.
    Integer(i64),
    /// Anything with a fractional scale.
    Number(f64),
    /// Enumerated status code, labelled when the code is known.
    Status {
        code: u32,
        label: Option<&'static str>,
    },
    Unavailable,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(v) => Some(v as f64),
            Value::Number(v) => Some(v),
            Value::Status { code, .. } => Some(code as f64),
            Value::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Value::Unavailable)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Number(v) => write!(f, "{}", v),
            Value::Status {
                code,
                label: Some(label),
            } => write!(f, "{} ({})", label, code),
            Value::Status { code, label: None } => write!(f, "unknown ({})", code),
            Value::Unavailable => write!(f, "unavailable"),
        }
    }
} // }}}

// {{{ Reading
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorValue {
    pub name: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub title: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SensorKind>,
}

/// Every sensor decoded from one successful poll.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    family: DeviceFamily,
    timestamp: DateTime<Utc>,
    sensors: Vec<SensorValue>,
}

impl Reading {
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sensor(name).map(|s| &s.value)
    }

    pub fn sensor(&self, name: &str) -> Option<&SensorValue> {
        self.sensors.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorValue> {
        self.sensors.iter()
    }

    /// Appends the sensors of another block polled for the same reading.
    pub fn merge(&mut self, other: Reading) {
        self.sensors.extend(other.sensors);
    }
} // }}}

/// Applies `map` to a validated payload.
///
/// Either every field and derived sensor of the map resolves, or nothing is
/// returned. Sentinel raw values become `Value::Unavailable`.
pub fn decode(family: DeviceFamily, payload: &[u8], map: &FieldMap) -> Result<Reading> {
    if payload.len() < map.min_len {
        return Err(Error::PayloadTooShort {
            len: payload.len(),
            min: map.min_len,
        });
    }

    let mut sensors = Vec::with_capacity(map.len());

    for field in map.fields {
        sensors.push(SensorValue {
            name: field.name,
            title: field.title,
            value: decode_field(payload, field)?,
            unit: field.unit,
            kind: field.kind,
        });
    }

    for derived in map.derived {
        let value = evaluate(derived, &sensors);
        sensors.push(SensorValue {
            name: derived.name,
            title: derived.title,
            value,
            unit: derived.unit,
            kind: derived.kind,
        });
    }

    Ok(Reading {
        family,
        timestamp: Utc::now(),
        sensors,
    })
}

fn decode_field(payload: &[u8], field: &FieldSpec) -> Result<Value> {
    let bytes = payload
        .get(field.offset..field.end())
        .ok_or(Error::PayloadTooShort {
            len: payload.len(),
            min: field.end(),
        })?;

    let raw = bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);

    if field.sentinel == Some(raw) {
        return Ok(Value::Unavailable);
    }

    if let Some(table) = field.labels {
        return Ok(Value::Status {
            code: raw,
            label: label_for(table, raw),
        });
    }

    let value = if field.signed {
        match field.width {
            Width::One => raw as u8 as i8 as i64,
            Width::Two => raw as u16 as i16 as i64,
            Width::Four => raw as i32 as i64,
        }
    } else {
        raw as i64
    };

    if field.scale.is_one() {
        Ok(Value::Integer(value))
    } else {
        Ok(Value::Number(field.scale.apply(value)))
    }
}

// {{{ derived sensors
fn lookup<'a>(sensors: &'a [SensorValue], name: &str) -> &'a Value {
    sensors
        .iter()
        .find(|s| s.name == name)
        .map(|s| &s.value)
        .unwrap_or(&Value::Unavailable)
}

fn evaluate(derived: &DerivedSpec, sensors: &[SensorValue]) -> Value {
    match derived.formula {
        Formula::Sum(terms) => {
            let mut integer = Some(0i64);
            let mut total = 0.0;
            for (sign, name) in terms {
                let value = lookup(sensors, name);
                let Some(v) = value.as_f64() else {
                    return Value::Unavailable;
                };
                total += *sign as f64 * v;
                integer = match (integer, value) {
                    (Some(acc), Value::Integer(i)) => Some(acc + *sign as i64 * i),
                    _ => None,
                };
            }
            match integer {
                Some(i) => Value::Integer(i),
                None => Value::Number(total),
            }
        }

        Formula::Product(a, b) => {
            match (lookup(sensors, a).as_f64(), lookup(sensors, b).as_f64()) {
                // ties go to the even neighbour
                (Some(a), Some(b)) => Value::Integer((a * b).round_ties_even() as i64),
                _ => Value::Unavailable,
            }
        }

        Formula::GridMode(power) => match lookup(sensors, power).as_f64() {
            Some(p) => {
                let code = if p < -GRID_DEAD_BAND {
                    2
                } else if p >= GRID_DEAD_BAND {
                    1
                } else {
                    0
                };
                Value::Status {
                    code,
                    label: label_for(labels::GRID_MODES, code),
                }
            }
            None => Value::Unavailable,
        },

        Formula::Directed { value, mode } => {
            let importing = match lookup(sensors, mode).as_f64() {
                Some(m) => m == 2.0,
                None => return Value::Unavailable,
            };
            match lookup(sensors, value) {
                Value::Integer(v) if importing => Value::Integer(-v),
                Value::Number(v) if importing => Value::Number(-v),
                Value::Status { .. } | Value::Unavailable => Value::Unavailable,
                v => v.clone(),
            }
        }
    }
} // }}}
