//! Database Models - records held by the store and the wire shapes that create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub value: String,
    pub allowed: &'static [&'static str],
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` is not one of: {}",
            self.value,
            self.allowed.join(", ")
        )
    }
}

/// Declares a lowercase string enum with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALLOWED: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        value: s.to_string(),
                        allowed: Self::ALLOWED,
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Which side of the marketplace an account is on.
    AccountType {
        Donor => "donor",
        Recipient => "recipient",
    }
);

string_enum!(
    DonationType {
        Paid => "paid",
        Unpaid => "unpaid",
    }
);

string_enum!(
    /// Priority of a blood request posting.
    Urgency {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
);

string_enum!(
    EventType {
        BloodDonation => "blood_donation",
        Awareness => "awareness",
    }
);

// ============================================================================
// Users
// ============================================================================

/// User record. Never serialized: the password hash must not leave the server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub location: String,
    pub account_type: AccountType,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub location: String,
    pub account_type: AccountType,
    pub profile_image: Option<String>,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: String,
    pub account_type: AccountType,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            location: user.location.clone(),
            account_type: user.account_type,
            profile_image: user.profile_image.clone(),
            created_at: user.created_at,
        }
    }
}

// ============================================================================
// Donor profiles
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub age: Option<String>,
    pub blood_type: Option<String>,
    pub last_donation: Option<String>,
    pub sickness: Option<String>,
    pub medication: Option<String>,
    pub donation_type: Option<DonationType>,
    pub available: bool,
    pub contact_phone: Option<String>,
    pub donation_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Validated profile fields. The outer `None` leaves a field untouched;
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonorProfileChanges {
    pub age: Option<Option<String>>,
    pub blood_type: Option<Option<String>>,
    pub last_donation: Option<Option<String>>,
    pub sickness: Option<Option<String>>,
    pub medication: Option<Option<String>>,
    pub donation_type: Option<Option<DonationType>>,
    pub available: Option<bool>,
    pub contact_phone: Option<Option<String>>,
    pub donation_number: Option<Option<i64>>,
}

impl DonorProfileChanges {
    /// Overwrite the provided fields of `profile`.
    pub fn apply_to(self, profile: &mut DonorProfile) {
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(blood_type) = self.blood_type {
            profile.blood_type = blood_type;
        }
        if let Some(last_donation) = self.last_donation {
            profile.last_donation = last_donation;
        }
        if let Some(sickness) = self.sickness {
            profile.sickness = sickness;
        }
        if let Some(medication) = self.medication {
            profile.medication = medication;
        }
        if let Some(donation_type) = self.donation_type {
            profile.donation_type = donation_type;
        }
        if let Some(available) = self.available {
            profile.available = available;
        }
        if let Some(contact_phone) = self.contact_phone {
            profile.contact_phone = contact_phone;
        }
        if let Some(donation_number) = self.donation_number {
            profile.donation_number = donation_number;
        }
    }
}

/// New donor profile for insertion
#[derive(Debug, Clone)]
pub struct NewDonorProfile {
    pub user_id: Uuid,
    pub fields: DonorProfileChanges,
}

impl NewDonorProfile {
    /// Materialise the record; availability defaults to true.
    pub fn into_profile(self, id: Uuid, created_at: DateTime<Utc>) -> DonorProfile {
        let mut profile = DonorProfile {
            id,
            user_id: self.user_id,
            age: None,
            blood_type: None,
            last_donation: None,
            sickness: None,
            medication: None,
            donation_type: None,
            available: true,
            contact_phone: None,
            donation_number: None,
            created_at,
        };
        self.fields.apply_to(&mut profile);
        profile
    }
}

/// Donor search result: the profile plus the owner's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DonorListing {
    #[serde(flatten)]
    pub profile: DonorProfile,
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Donor search filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DonorFilter {
    /// Exact blood type match.
    pub blood_type: Option<String>,
    pub available_only: bool,
    /// Case-insensitive substring of blood type or owner location.
    pub search_term: Option<String>,
}

impl DonorFilter {
    pub fn matches(&self, profile: &DonorProfile, owner_location: Option<&str>) -> bool {
        if let Some(wanted) = &self.blood_type {
            if profile.blood_type.as_deref() != Some(wanted.as_str()) {
                return false;
            }
        }
        if self.available_only && !profile.available {
            return false;
        }
        if let Some(term) = &self.search_term {
            let term = term.to_lowercase();
            let contains = |value: Option<&str>| {
                value.is_some_and(|v| v.to_lowercase().contains(&term))
            };
            if !contains(profile.blood_type.as_deref()) && !contains(owner_location) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Blood requests and events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub id: Uuid,
    pub organization_name: String,
    pub blood_type: String,
    pub location: String,
    pub contact_number: String,
    pub price: f64,
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBloodRequest {
    pub organization_name: String,
    pub blood_type: String,
    pub location: String,
    pub contact_number: String,
    pub price: f64,
    pub urgency: Urgency,
}

impl NewBloodRequest {
    pub fn into_request(self, id: Uuid, created_at: DateTime<Utc>) -> BloodRequest {
        BloodRequest {
            id,
            organization_name: self.organization_name,
            blood_type: self.blood_type,
            location: self.location,
            contact_number: self.contact_number,
            price: self.price,
            urgency: self.urgency,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    pub expected_attendees: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: String,
    pub kind: EventType,
    pub expected_attendees: i64,
}

impl NewEvent {
    pub fn into_event(self, id: Uuid, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title,
            date: self.date,
            location: self.location,
            description: self.description,
            kind: self.kind,
            expected_attendees: self.expected_attendees,
            created_at,
        }
    }
}

// ============================================================================
// Request bodies (unvalidated)
// ============================================================================

/// A JSON scalar that may arrive as a number or as text, e.g. `50` or `"50"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(FieldValue::Number)
            .unwrap_or_else(|| FieldValue::Text(value.to_string()))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Body for POST /api/donor-profile and PUT /api/donor-profile/{id}
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorProfileInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sickness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donation_number: Option<FieldValue>,
}

impl From<&DonorProfile> for DonorProfileInput {
    fn from(profile: &DonorProfile) -> Self {
        Self {
            user_id: Some(profile.user_id.to_string()),
            age: profile.age.as_deref().map(FieldValue::from),
            blood_type: profile.blood_type.clone(),
            last_donation: profile.last_donation.clone(),
            sickness: profile.sickness.clone(),
            medication: profile.medication.clone(),
            donation_type: profile.donation_type.map(|t| t.as_str().to_string()),
            available: Some(profile.available),
            contact_phone: profile.contact_phone.clone(),
            donation_number: profile.donation_number.map(FieldValue::from),
        }
    }
}

/// Body for POST /api/blood-requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequestInput {
    #[serde(default)]
    pub organization_name: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub price: Option<FieldValue>,
    #[serde(default)]
    pub urgency: Option<String>,
}

/// Body for POST /api/events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub expected_attendees: Option<FieldValue>,
}

/// Text fields of the multipart POST /api/register form.
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub location: Option<String>,
    pub account_type: Option<String>,
}
