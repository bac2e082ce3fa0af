//! Record normalization
//!
//! Turns a fetched primary body and its auxiliary sub-records into the
//! canonical record stored by the output store. The only derived field is
//! `age`, computed from `dateOfBirth` against the current UTC date.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

/// Field of the primary record holding the birth timestamp
pub const BIRTH_DATE_FIELD: &str = "dateOfBirth";

/// Keys owned by the canonical record itself; they never come from `fields`
const RESERVED_KEYS: [&str; 5] = ["id", "slug", "age", "services", "scraped_at"];

/// The primary body cannot be normalized; retrying will not help
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Response has no 'data' object")]
    MissingData,

    #[error("Record has no usable '{field}' field")]
    MissingField { field: String },

    #[error("Unparseable birth date '{value}'")]
    InvalidBirthDate { value: String },
}

/// Id of a remote record, kept with the JSON type it was fetched with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(Number),
}

impl RecordId {
    /// String form used as the output store key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(id) => f.write_str(id),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.key() == *other
    }
}

/// The normalized, persisted form of one fetched entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Stable id from the remote record
    pub id: RecordId,

    /// Work item that produced this record
    pub slug: String,

    pub age: i32,

    pub services: Vec<Value>,

    pub scraped_at: DateTime<Utc>,

    /// Every other field of the primary record, as fetched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A primary record whose required fields have been checked
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryRecord {
    id: RecordId,
    birth_date: NaiveDate,
    fields: Map<String, Value>,
}

impl PrimaryRecord {
    /// Extracts `data` from a primary response body
    ///
    /// # Errors
    ///
    /// Returns `ShapeError` if `data` is not an object, or if it lacks an
    /// `id` (string or number) or a parseable `dateOfBirth`.
    pub fn from_body(body: Value) -> Result<Self, ShapeError> {
        let mut fields = match body {
            Value::Object(mut root) => match root.remove("data") {
                Some(Value::Object(data)) => data,
                _ => return Err(ShapeError::MissingData),
            },
            _ => return Err(ShapeError::MissingData),
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => RecordId::Text(id.clone()),
            Some(Value::Number(n)) => RecordId::Number(n.clone()),
            _ => {
                return Err(ShapeError::MissingField {
                    field: "id".to_string(),
                })
            }
        };

        let birth_date = match fields.get(BIRTH_DATE_FIELD) {
            Some(Value::String(raw)) => parse_birth_date(raw)?,
            _ => {
                return Err(ShapeError::MissingField {
                    field: BIRTH_DATE_FIELD.to_string(),
                })
            }
        };

        for key in RESERVED_KEYS {
            fields.remove(key);
        }

        Ok(Self {
            id,
            birth_date,
            fields,
        })
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Builds the canonical record, embedding `services` and stamping `now`
    pub fn into_canonical(
        self,
        item_id: &str,
        services: Vec<Value>,
        now: DateTime<Utc>,
    ) -> CanonicalRecord {
        CanonicalRecord {
            age: compute_age(self.birth_date, now),
            id: self.id,
            slug: item_id.to_string(),
            services,
            scraped_at: now,
            fields: self.fields,
        }
    }
}

/// Normalizes a primary response body and its auxiliary list in one step
pub fn normalize(
    item_id: &str,
    body: Value,
    services: Vec<Value>,
    now: DateTime<Utc>,
) -> Result<CanonicalRecord, ShapeError> {
    Ok(PrimaryRecord::from_body(body)?.into_canonical(item_id, services, now))
}

/// Whole years between `birth` and the UTC date of `now`
///
/// One year is taken off while `(month, day)` of `now` is still before the
/// birthday, so the result changes on the birthday itself.
pub fn compute_age(birth: NaiveDate, now: DateTime<Utc>) -> i32 {
    let today = now.date_naive();
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Parses a birth timestamp, keeping the calendar date as written
///
/// Accepts RFC 3339 instants, naive date-times and plain dates. The offset
/// of an RFC 3339 value is not applied to the date.
pub fn parse_birth_date(raw: &str) -> Result<NaiveDate, ShapeError> {
    let raw = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ShapeError::InvalidBirthDate {
        value: raw.to_string(),
    })
}
