//! Field-level validation of request bodies.
//!
//! Every check records a message under the JSON field name and keeps going,
//! so a single response lists every bad field.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::models::{
    AccountType, BloodRequestInput, DonationType, DonorProfileChanges, DonorProfileInput,
    EventInput, EventType, FieldValue, NewBloodRequest, NewEvent, RegisterInput, UnknownVariant,
    Urgency,
};
use crate::error::{ApiError, FieldErrors};

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static::lazy_static! {
    /// Loose address shape: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Lower-cased, trimmed email used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Default)]
struct Checker {
    errors: FieldErrors,
}

impl Checker {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.fail(field, format!("{} is required", field));
                None
            }
        }
    }

    /// A provided empty string clears the field.
    fn clearable(&mut self, value: Option<String>) -> Option<Option<String>> {
        value.map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()))
    }

    fn variant<T>(&mut self, field: &str, value: Option<String>) -> Option<T>
    where
        T: FromStr<Err = UnknownVariant>,
    {
        let value = value?;
        match value.trim().parse::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(field, format!("{} {}", field, e));
                None
            }
        }
    }

    fn required_variant<T>(&mut self, field: &str, value: Option<String>) -> Option<T>
    where
        T: FromStr<Err = UnknownVariant>,
    {
        let value = self.required(field, value)?;
        self.variant(field, Some(value))
    }

    fn number(&mut self, field: &str, value: Option<FieldValue>) -> Option<f64> {
        let text = value?.as_text();
        if text.is_empty() {
            return None;
        }
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => Some(n),
            _ => {
                self.fail(field, format!("{} must be a non-negative number", field));
                None
            }
        }
    }

    fn whole_number(&mut self, field: &str, value: Option<FieldValue>) -> Option<i64> {
        let text = value?.as_text();
        if text.is_empty() {
            return None;
        }
        let parsed = text.parse::<i64>().ok().or_else(|| {
            // 50.0 is a whole number too.
            text.parse::<f64>()
                .ok()
                .filter(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64)
                .map(|n| n as i64)
        });
        match parsed {
            Some(n) if n >= 0 => Some(n),
            _ => {
                self.fail(field, format!("{} must be a non-negative whole number", field));
                None
            }
        }
    }

    fn required_number(&mut self, field: &str, value: Option<FieldValue>) -> Option<f64> {
        let present = value.as_ref().is_some_and(|v| !v.as_text().is_empty());
        if !present {
            self.fail(field, format!("{} is required", field));
            return None;
        }
        self.number(field, value)
    }

    fn required_whole_number(&mut self, field: &str, value: Option<FieldValue>) -> Option<i64> {
        let present = value.as_ref().is_some_and(|v| !v.as_text().is_empty());
        if !present {
            self.fail(field, format!("{} is required", field));
            return None;
        }
        self.whole_number(field, value)
    }

    fn required_date(&mut self, field: &str, value: Option<String>) -> Option<DateTime<Utc>> {
        let value = self.required(field, value)?;
        match parse_date(&value) {
            Some(date) => Some(date),
            None => {
                self.fail(field, format!("{} must be a date (YYYY-MM-DD)", field));
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, ApiError> {
        match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ => Err(ApiError::Validation(self.errors)),
        }
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Validated registration fields; the password is still plaintext here.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub location: String,
    pub account_type: AccountType,
}

pub fn registration(input: RegisterInput) -> Result<Registration, ApiError> {
    let mut c = Checker::default();
    let name = c.required("name", input.name);
    let email = c.required("email", input.email).map(|e| normalize_email(&e));
    if let Some(email) = &email {
        if !is_valid_email(email) {
            c.fail("email", "email is not a valid address");
        }
    }
    let password = match input.password {
        Some(p) if p.len() >= MIN_PASSWORD_LEN => Some(p),
        Some(p) if !p.is_empty() => {
            c.fail(
                "password",
                format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            );
            None
        }
        _ => {
            c.fail("password", "password is required");
            None
        }
    };
    let location = c.required("location", input.location);
    let account_type = c.required_variant::<AccountType>("accountType", input.account_type);

    let reg = (|| {
        Some(Registration {
            name: name?,
            email: email?,
            password: password?,
            location: location?,
            account_type: account_type?,
        })
    })();
    c.finish(reg)
}

/// Profile fields shared by create and update.
fn profile_changes(c: &mut Checker, input: DonorProfileInput) -> DonorProfileChanges {
    DonorProfileChanges {
        age: input
            .age
            .map(|v| Some(v.as_text()).filter(|v| !v.is_empty())),
        blood_type: c.clearable(input.blood_type),
        last_donation: c.clearable(input.last_donation),
        sickness: c.clearable(input.sickness),
        medication: c.clearable(input.medication),
        donation_type: c
            .clearable(input.donation_type)
            .map(|raw| c.variant::<DonationType>("donationType", raw)),
        available: input.available,
        contact_phone: c.clearable(input.contact_phone),
        donation_number: input
            .donation_number
            .map(|v| c.whole_number("donationNumber", Some(v))),
    }
}

/// Validate a create body; returns the owner id and the fields.
pub fn new_donor_profile(input: DonorProfileInput) -> Result<(Uuid, DonorProfileChanges), ApiError> {
    let mut c = Checker::default();
    let user_id = c
        .required("userId", input.user_id.clone())
        .and_then(|raw| match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                c.fail("userId", "userId is not a valid id");
                None
            }
        });
    let changes = profile_changes(&mut c, input);
    c.finish(user_id.map(|id| (id, changes)))
}

/// Validate an update body. `userId` is ignored.
pub fn donor_profile_update(input: DonorProfileInput) -> Result<DonorProfileChanges, ApiError> {
    let mut c = Checker::default();
    let changes = profile_changes(&mut c, input);
    c.finish(Some(changes))
}

pub fn new_blood_request(input: BloodRequestInput) -> Result<NewBloodRequest, ApiError> {
    let mut c = Checker::default();
    let organization_name = c.required("organizationName", input.organization_name);
    let blood_type = c.required("bloodType", input.blood_type);
    let location = c.required("location", input.location);
    let contact_number = c.required("contactNumber", input.contact_number);
    let price = c.required_number("price", input.price);
    let urgency = c.required_variant::<Urgency>("urgency", input.urgency);

    let request = (|| {
        Some(NewBloodRequest {
            organization_name: organization_name?,
            blood_type: blood_type?,
            location: location?,
            contact_number: contact_number?,
            price: price?,
            urgency: urgency?,
        })
    })();
    c.finish(request)
}

pub fn new_event(input: EventInput) -> Result<NewEvent, ApiError> {
    let mut c = Checker::default();
    let title = c.required("title", input.title);
    let date = c.required_date("date", input.date);
    let location = c.required("location", input.location);
    let description = c.required("description", input.description);
    let kind = c.required_variant::<EventType>("type", input.kind);
    let expected_attendees = c.required_whole_number("expectedAttendees", input.expected_attendees);

    let event = (|| {
        Some(NewEvent {
            title: title?,
            date: date?,
            location: location?,
            description: description?,
            kind: kind?,
            expected_attendees: expected_attendees?,
        })
    })();
    c.finish(event)
}
