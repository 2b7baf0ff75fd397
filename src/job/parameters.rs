//! Job Parameters
//!
//! Typed, immutable parameter sets passed to a job launch. Together with
//! the job name they identify a job instance.
//!
//! # Textual Form
//!
//! Parameters given on the command line or in job files use the form
//! `name(type)=value`:
//!
//! ```text
//! id=testing 123
//! run.date(date)=2024-05-01
//! limit(long)=10
//! ratio(double)=0.25
//! dry(boolean)=true
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// A single typed parameter value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ParameterValue {
    String(String),
    Date(DateTime<Utc>),
    Long(i64),
    Double(f64),
    Boolean(bool),
}

impl ParameterValue {
    /// Parses a raw value according to a type hint (`string`, `date`,
    /// `long`, `double` or `boolean`).
    pub fn parse_typed(type_hint: &str, raw: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| {
            ConfigurationError::InvalidParameter(format!(
                "'{}' is not a valid {} ({})",
                raw, type_hint, reason
            ))
        };

        match type_hint.trim().to_ascii_lowercase().as_str() {
            "" | "string" => Ok(Self::String(raw.to_string())),
            "long" => raw
                .trim()
                .parse()
                .map(Self::Long)
                .map_err(|e| invalid(&e.to_string())),
            "double" => {
                let value: f64 = raw.trim().parse().map_err(|e| invalid(&format!("{}", e)))?;
                Self::double(value)
            }
            "boolean" => raw
                .trim()
                .parse()
                .map(Self::Boolean)
                .map_err(|e| invalid(&e.to_string())),
            "date" => parse_date(raw.trim()).map(Self::Date).ok_or_else(|| {
                invalid("expected RFC 3339 timestamp or YYYY-MM-DD")
            }),
            other => Err(ConfigurationError::InvalidParameter(format!(
                "unknown parameter type '{}'",
                other
            ))),
        }
    }

    /// Wraps a finite double. NaN and infinities have no stable identity
    /// or JSON form, so they are refused.
    pub fn double(value: f64) -> Result<Self, ConfigurationError> {
        if value.is_finite() {
            Ok(Self::Double(value))
        } else {
            Err(ConfigurationError::InvalidParameter(format!(
                "double parameters must be finite, got {}",
                value
            )))
        }
    }

    /// Name of the value's type, as used in the textual form.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::Long(n) => write!(f, "{}", n),
            Self::Double(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl TryFrom<f64> for ParameterValue {
    type Error = ConfigurationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::double(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for ParameterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

/// Immutable set of named job parameters.
///
/// Ordered by name so that equal sets always compare, serialize and
/// display identically.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct JobParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl JobParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a builder for a new parameter set.
    pub fn builder() -> JobParametersBuilder {
        JobParametersBuilder::default()
    }

    /// Parses a `name(type)=value` assignment.
    ///
    /// # Example
    ///
    /// ```
    /// use batchrun::job::{JobParameters, ParameterValue};
    ///
    /// let (name, value) = JobParameters::parse_assignment("limit(long)=10").unwrap();
    /// assert_eq!(name, "limit");
    /// assert_eq!(value, ParameterValue::Long(10));
    /// ```
    pub fn parse_assignment(
        assignment: &str,
    ) -> Result<(String, ParameterValue), ConfigurationError> {
        let (key, raw) = assignment.split_once('=').ok_or_else(|| {
            ConfigurationError::InvalidParameter(format!(
                "expected NAME[(TYPE)]=VALUE, got '{}'",
                assignment
            ))
        })?;

        Self::parse_entry(key, raw)
    }

    /// Parses a `name(type)` key together with its raw value.
    pub fn parse_entry(
        key: &str,
        raw: &str,
    ) -> Result<(String, ParameterValue), ConfigurationError> {
        let key = key.trim();
        let (name, type_hint) = match key.strip_suffix(')').and_then(|k| k.split_once('(')) {
            Some((name, hint)) => (name.trim(), hint),
            None => (key, "string"),
        };

        if name.is_empty() {
            return Err(ConfigurationError::InvalidParameter(format!(
                "parameter name missing in '{}'",
                key
            )));
        }

        let value = ParameterValue::parse_typed(type_hint, raw)?;
        Ok((name.to_string(), value))
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Returns a string parameter, `None` if missing or of another type.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParameterValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a long parameter, `None` if missing or of another type.
    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParameterValue::Long(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns a date parameter, `None` if missing or of another type.
    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.values.get(name) {
            Some(ParameterValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// Iterates over all parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy with `other`'s entries layered on top.
    pub fn merged_with(&self, other: &JobParameters) -> JobParameters {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        JobParameters { values }
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

impl FromIterator<(String, ParameterValue)> for JobParameters {
    fn from_iter<T: IntoIterator<Item = (String, ParameterValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Builder for [`JobParameters`].
#[derive(Debug, Default)]
pub struct JobParametersBuilder {
    values: BTreeMap<String, ParameterValue>,
}

impl JobParametersBuilder {
    pub fn add(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn add_string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(name, ParameterValue::String(value.into()))
    }

    pub fn add_date(self, name: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.add(name, ParameterValue::Date(value))
    }

    pub fn add_long(self, name: impl Into<String>, value: i64) -> Self {
        self.add(name, ParameterValue::Long(value))
    }

    /// Adds a double parameter. Fails on NaN or infinite values.
    pub fn add_double(
        self,
        name: impl Into<String>,
        value: f64,
    ) -> Result<Self, ConfigurationError> {
        Ok(self.add(name, ParameterValue::double(value)?))
    }

    pub fn add_boolean(self, name: impl Into<String>, value: bool) -> Self {
        self.add(name, ParameterValue::Boolean(value))
    }

    pub fn build(self) -> JobParameters {
        JobParameters {
            values: self.values,
        }
    }
}
