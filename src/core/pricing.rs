//! Order price and identifier derivation.
//!
//! Pure functions only. `core::order` runs them on every create and update so
//! the stored derived columns always agree with the editable ones, and the
//! preview endpoint runs them on drafts so a form can show totals while the
//! user is still typing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Format of the check-in date inside a reservation number.
const RESERVATION_DATE_FORMAT: &str = "%d%m%Y";

/// Number of nights between two dates, or `None` when `check_out` precedes `check_in`.
///
/// Dates carry no time of day, so the ceiling of the day difference is the
/// plain calendar difference. Same-day check-out gives zero nights.
#[must_use]
pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> Option<i64> {
    let days = check_out.signed_duration_since(check_in).num_days();
    (days >= 0).then_some(days)
}

/// `official_price + tax_clean - discount`
#[must_use]
pub fn total_price(official_price: f64, tax_clean: f64, discount: f64) -> f64 {
    official_price + tax_clean - discount
}

/// `total_price - deposit_amount`
#[must_use]
pub fn balance_amount(total_price: f64, deposit_amount: f64) -> f64 {
    total_price - deposit_amount
}

/// Builds `{countryCode}{DDMMYYYY}N{propertyNumber}`.
///
/// Returns an empty string when any part is missing. Country code and
/// property number are trimmed and otherwise used as given.
#[must_use]
pub fn reservation_number(
    country_code: &str,
    check_in: Option<NaiveDate>,
    property_number: &str,
) -> String {
    let country_code = country_code.trim();
    let property_number = property_number.trim();
    match check_in {
        Some(date) if !country_code.is_empty() && !property_number.is_empty() => format!(
            "{country_code}{}N{property_number}",
            date.format(RESERVATION_DATE_FORMAT)
        ),
        _ => String::new(),
    }
}

/// Editable inputs that feed the derived order fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingInput<'a> {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub official_price: f64,
    pub tax_clean: f64,
    pub discount: f64,
    pub deposit_amount: f64,
    pub client_country: &'a str,
    pub property_number: &'a str,
}

/// Derived order fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derived {
    /// `None` while either date is missing or the range is inverted
    pub nights: Option<i64>,
    /// False when both dates are set and check-out precedes check-in
    pub dates_valid: bool,
    pub total_price: f64,
    pub balance_amount: f64,
    pub reservation_number: String,
}

/// Recomputes every derived field from the editable ones.
#[must_use]
pub fn derive(input: &PricingInput<'_>) -> Derived {
    let nights = match (input.check_in, input.check_out) {
        (Some(check_in), Some(check_out)) => nights(check_in, check_out),
        _ => None,
    };
    let dates_valid = match (input.check_in, input.check_out) {
        (Some(_), Some(_)) => nights.is_some(),
        _ => true,
    };
    let total = total_price(input.official_price, input.tax_clean, input.discount);

    Derived {
        nights,
        dates_valid,
        total_price: total,
        balance_amount: balance_amount(total, input.deposit_amount),
        reservation_number: reservation_number(
            input.client_country,
            input.check_in,
            input.property_number,
        ),
    }
}
