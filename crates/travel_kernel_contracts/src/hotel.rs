#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, Validate};

pub const HOTEL_MAX_RESULTS_DEFAULT: u16 = 10;
pub const HOTEL_MAX_RESULTS_LIMIT: u16 = 50;

/// Search criteria forwarded to the hotel-search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HotelSearchCriteria {
    /// IATA city code, e.g. `PAR`.
    pub city_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u16>,
}

impl HotelSearchCriteria {
    pub fn max_results_or_default(&self) -> u16 {
        self.max_results.unwrap_or(HOTEL_MAX_RESULTS_DEFAULT)
    }
}

impl Validate for HotelSearchCriteria {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.city_code.len() != 3 || !self.city_code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ContractViolation::InvalidValue {
                field: "cityCode",
                reason: "must be a 3-letter uppercase IATA code",
            });
        }
        for (field, date) in [("checkIn", &self.check_in), ("checkOut", &self.check_out)] {
            if let Some(date) = date {
                if !is_iso_date(date) {
                    return Err(ContractViolation::InvalidValue {
                        field,
                        reason: "must be YYYY-MM-DD",
                    });
                }
            }
        }
        if let (Some(check_in), Some(check_out)) = (&self.check_in, &self.check_out) {
            // ISO dates order lexicographically.
            if check_out <= check_in {
                return Err(ContractViolation::InvalidValue {
                    field: "checkOut",
                    reason: "must be after checkIn",
                });
            }
        }
        if let Some(adults) = self.adults {
            if !(1..=9).contains(&adults) {
                return Err(ContractViolation::InvalidRange {
                    field: "adults",
                    min: 1.0,
                    max: 9.0,
                    got: f64::from(adults),
                });
            }
        }
        if let Some(max) = self.max_results {
            if !(1..=HOTEL_MAX_RESULTS_LIMIT).contains(&max) {
                return Err(ContractViolation::InvalidRange {
                    field: "maxResults",
                    min: 1.0,
                    max: f64::from(HOTEL_MAX_RESULTS_LIMIT),
                    got: f64::from(max),
                });
            }
        }
        Ok(())
    }
}

fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    if !(digits(0..4) && digits(5..7) && digits(8..10)) {
        return false;
    }
    let month = (b[5] - b'0') * 10 + (b[6] - b'0');
    let day = (b[8] - b'0') * 10 + (b[9] - b'0');
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> HotelSearchCriteria {
        HotelSearchCriteria {
            city_code: "PAR".to_string(),
            check_in: Some("2026-11-02".to_string()),
            check_out: Some("2026-11-05".to_string()),
            adults: Some(2),
            max_results: None,
        }
    }

    #[test]
    fn valid_criteria_pass() {
        assert!(paris().validate().is_ok());
        assert_eq!(paris().max_results_or_default(), HOTEL_MAX_RESULTS_DEFAULT);
    }

    #[test]
    fn bad_city_dates_and_counts_fail() {
        let mut c = paris();
        c.city_code = "Paris".to_string();
        assert!(c.validate().is_err());

        let mut c = paris();
        c.check_in = Some("2026-13-01".to_string());
        assert!(matches!(
            c.validate(),
            Err(ContractViolation::InvalidValue { field: "checkIn", .. })
        ));

        let mut c = paris();
        c.check_out = Some("2026-11-01".to_string());
        assert!(matches!(
            c.validate(),
            Err(ContractViolation::InvalidValue { field: "checkOut", .. })
        ));

        let mut c = paris();
        c.adults = Some(0);
        assert!(c.validate().is_err());

        let mut c = paris();
        c.max_results = Some(500);
        assert!(c.validate().is_err());
    }
}
