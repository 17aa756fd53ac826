#![forbid(unsafe_code)]

//! Record schemas for inbound JSON.
//!
//! Validation is all-or-nothing and never touches the caller's value: on success a new,
//! sanitized typed record is returned, on failure the first offending field is reported.
//! Unknown keys are rejected. Required strings must be non-empty.

use serde_json::{Map, Value};

use crate::history::HistoryDelta;
use crate::identity::ExternalIdentityKey;
use crate::profile::{ProfileInput, PHONE_MAX, PHONE_MIN};
use crate::sanitize::FieldSanitizer;
use crate::ContractViolation;

pub trait Schema {
    type Output;

    fn name(&self) -> &'static str;

    fn validate(&self, record: &Value) -> Result<Self::Output, ContractViolation>;
}

pub fn validate<S: Schema>(record: &Value, schema: &S) -> Result<S::Output, ContractViolation> {
    schema.validate(record)
}

/// Wire key plus the legacy spellings still accepted for it.
#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    aliases: &'static [&'static str],
}

const fn field(name: &'static str) -> FieldSpec {
    FieldSpec { name, aliases: &[] }
}

const fn aliased(name: &'static str, aliases: &'static [&'static str]) -> FieldSpec {
    FieldSpec { name, aliases }
}

const EXTERNAL_ID: FieldSpec = aliased("externalId", &["firebase_id"]);

const NAME: FieldSpec = field("name");
const EMAIL: FieldSpec = field("email");
const AGE: FieldSpec = field("age");
const COUNTRY: FieldSpec = field("country");
const REGION: FieldSpec = aliased("region", &["state"]);
const PHONE: FieldSpec = aliased("phone", &["phone_number"]);

const PROFILE_FIELDS: &[FieldSpec] = &[EXTERNAL_ID, NAME, EMAIL, AGE, COUNTRY, REGION, PHONE];

const DESTINATION: FieldSpec = aliased("destination", &["destinationName"]);
const LODGING: FieldSpec = aliased("lodging", &["hotelName"]);
const RATING: FieldSpec = field("rating");
const PRICE: FieldSpec = field("price");
const DAYS_STAYED: FieldSpec = field("daysStayed");

const HISTORY_FIELDS: &[FieldSpec] = &[EXTERNAL_ID, DESTINATION, LODGING, RATING, PRICE, DAYS_STAYED];

#[derive(Debug, Clone, Default)]
pub struct ProfileSchema {
    sanitizer: FieldSanitizer,
}

impl ProfileSchema {
    pub fn new(sanitizer: FieldSanitizer) -> Self {
        Self { sanitizer }
    }
}

impl Schema for ProfileSchema {
    type Output = ProfileInput;

    fn name(&self) -> &'static str {
        "profile"
    }

    fn validate(&self, record: &Value) -> Result<ProfileInput, ContractViolation> {
        let reader = RecordReader::new(record, PROFILE_FIELDS)?;
        Ok(ProfileInput {
            external_id: reader.identity_key(EXTERNAL_ID)?,
            name: reader.text(NAME, &self.sanitizer)?,
            email: reader.text(EMAIL, &self.sanitizer)?,
            age: reader.integer(AGE, 0, u64::from(u32::MAX))? as u32,
            country: reader.text(COUNTRY, &self.sanitizer)?,
            region: reader.text(REGION, &self.sanitizer)?,
            phone: reader.integer(PHONE, PHONE_MIN, PHONE_MAX)?,
        })
    }
}

/// Identity key plus the five visit sequences; omitted sequences default to empty.
#[derive(Debug, Clone, Default)]
pub struct HistoryDeltaSchema {
    sanitizer: FieldSanitizer,
}

impl HistoryDeltaSchema {
    pub fn new(sanitizer: FieldSanitizer) -> Self {
        Self { sanitizer }
    }
}

impl Schema for HistoryDeltaSchema {
    type Output = HistoryDelta;

    fn name(&self) -> &'static str {
        "history_delta"
    }

    fn validate(&self, record: &Value) -> Result<HistoryDelta, ContractViolation> {
        let reader = RecordReader::new(record, HISTORY_FIELDS)?;
        Ok(HistoryDelta {
            external_id: reader.identity_key(EXTERNAL_ID)?,
            destination: reader.text_sequence(DESTINATION, &self.sanitizer)?,
            lodging: reader.text_sequence(LODGING, &self.sanitizer)?,
            rating: reader.number_sequence(RATING)?,
            price: reader.number_sequence(PRICE)?,
            days_stayed: reader.number_sequence(DAYS_STAYED)?,
        })
    }
}

struct RecordReader<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> RecordReader<'a> {
    fn new(record: &'a Value, allowed: &[FieldSpec]) -> Result<Self, ContractViolation> {
        let map = record.as_object().ok_or(ContractViolation::InvalidType {
            field: "record",
            expected: "object",
        })?;
        if let Some(unknown) = map.keys().find(|key| {
            !allowed
                .iter()
                .any(|spec| spec.name == key.as_str() || spec.aliases.contains(&key.as_str()))
        }) {
            return Err(ContractViolation::UnknownField {
                field: unknown.clone(),
            });
        }
        Ok(Self { map })
    }

    fn get(&self, spec: FieldSpec) -> Option<&'a Value> {
        self.map.get(spec.name).or_else(|| {
            spec.aliases
                .iter()
                .find_map(|alias| self.map.get(*alias))
        })
    }

    fn required(&self, spec: FieldSpec) -> Result<&'a Value, ContractViolation> {
        self.get(spec)
            .ok_or(ContractViolation::MissingField { field: spec.name })
    }

    fn string(&self, spec: FieldSpec) -> Result<&'a str, ContractViolation> {
        let value = self
            .required(spec)?
            .as_str()
            .ok_or(ContractViolation::InvalidType {
                field: spec.name,
                expected: "string",
            })?;
        if value.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: spec.name,
                reason: "must not be empty",
            });
        }
        Ok(value)
    }

    fn identity_key(&self, spec: FieldSpec) -> Result<ExternalIdentityKey, ContractViolation> {
        ExternalIdentityKey::new(self.string(spec)?)
    }

    fn text(&self, spec: FieldSpec, sanitizer: &FieldSanitizer) -> Result<String, ContractViolation> {
        sanitizer.sanitize(spec.name, self.string(spec)?)
    }

    fn integer(&self, spec: FieldSpec, min: u64, max: u64) -> Result<u64, ContractViolation> {
        let value = self.required(spec)?;
        let out_of_range = |got: f64| ContractViolation::InvalidRange {
            field: spec.name,
            min: min as f64,
            max: max as f64,
            got,
        };
        let n = if let Some(n) = value.as_u64() {
            n
        } else if let Some(n) = value.as_i64() {
            return Err(out_of_range(n as f64));
        } else if let Some(f) = value.as_f64() {
            if f.fract() != 0.0 {
                return Err(ContractViolation::InvalidType {
                    field: spec.name,
                    expected: "integer",
                });
            }
            if f < min as f64 || f > max as f64 {
                return Err(out_of_range(f));
            }
            f as u64
        } else {
            return Err(ContractViolation::InvalidType {
                field: spec.name,
                expected: "integer",
            });
        };
        if n < min || n > max {
            return Err(out_of_range(n as f64));
        }
        Ok(n)
    }

    fn sequence(&self, spec: FieldSpec) -> Result<&'a [Value], ContractViolation> {
        match self.get(spec) {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(ContractViolation::InvalidType {
                field: spec.name,
                expected: "array",
            }),
        }
    }

    fn text_sequence(
        &self,
        spec: FieldSpec,
        sanitizer: &FieldSanitizer,
    ) -> Result<Vec<String>, ContractViolation> {
        self.sequence(spec)?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let raw = item.as_str().ok_or(ContractViolation::InvalidItem {
                    field: spec.name,
                    index,
                    reason: "must be a string",
                })?;
                if raw.is_empty() {
                    return Err(ContractViolation::InvalidItem {
                        field: spec.name,
                        index,
                        reason: "must not be empty",
                    });
                }
                sanitizer
                    .sanitize(spec.name, raw)
                    .map_err(|err| item_violation(err, spec.name, index))
            })
            .collect()
    }

    fn number_sequence(&self, spec: FieldSpec) -> Result<Vec<f64>, ContractViolation> {
        self.sequence(spec)?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_f64().ok_or(ContractViolation::InvalidItem {
                    field: spec.name,
                    index,
                    reason: "must be a number",
                })
            })
            .collect()
    }
}

fn item_violation(err: ContractViolation, field: &'static str, index: usize) -> ContractViolation {
    match err {
        ContractViolation::ContainsMarkup { .. } => ContractViolation::InvalidItem {
            field,
            index,
            reason: "must not include markup",
        },
        ContractViolation::InvalidValue { reason, .. } => {
            ContractViolation::InvalidItem {
                field,
                index,
                reason,
            }
        }
        other => other,
    }
}
