use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Official documents a citizen can apply for through the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    IdCard,
    Passport,
    DriversLicense,
}

impl DocumentType {
    pub const fn ordered() -> [Self; 3] {
        [Self::IdCard, Self::Passport, Self::DriversLicense]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::IdCard => "id-card",
            Self::Passport => "passport",
            Self::DriversLicense => "drivers-license",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IdCard => "German ID Card",
            Self::Passport => "German Passport",
            Self::DriversLicense => "German Driver's License",
        }
    }

    /// Application fee in euro cents.
    pub const fn fee_cents(self) -> u32 {
        match self {
            Self::IdCard => 8_999,
            Self::Passport => 11_999,
            Self::DriversLicense => 14_999,
        }
    }

    pub fn fee_label(self) -> String {
        let cents = self.fee_cents();
        format!("€{}.{:02}", cents / 100, cents % 100)
    }

    pub const fn processing_time(self) -> &'static str {
        match self {
            Self::IdCard => "3-5 business days",
            Self::Passport => "5-7 business days",
            Self::DriversLicense => "7-10 business days",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DocumentType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|candidate| candidate.id() == value.trim())
            .ok_or_else(|| UnknownVariant::new("document type", value))
    }
}

/// Payment providers offered on the review step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Paypal,
    Sepa,
    Paystack,
    Coinbase,
}

impl PaymentMethod {
    pub const fn ordered() -> [Self; 4] {
        [Self::Paypal, Self::Sepa, Self::Paystack, Self::Coinbase]
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::Paypal => "paypal",
            Self::Sepa => "sepa",
            Self::Paystack => "paystack",
            Self::Coinbase => "coinbase",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Paypal => "PayPal",
            Self::Sepa => "SEPA Bank Transfer",
            Self::Paystack => "PayStack",
            Self::Coinbase => "Coinbase (Crypto)",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|candidate| candidate.id() == value.trim())
            .ok_or_else(|| UnknownVariant::new("payment method", value))
    }
}

/// Raised when a wire identifier does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The four ordered stages of the wizard. Persisted as its 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WizardStep {
    #[default]
    SelectType,
    PersonalInfo,
    Upload,
    Review,
}

impl WizardStep {
    pub const FIRST: Self = Self::SelectType;
    pub const LAST: Self = Self::Review;

    pub const fn ordered() -> [Self; 4] {
        [
            Self::SelectType,
            Self::PersonalInfo,
            Self::Upload,
            Self::Review,
        ]
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::SelectType => 1,
            Self::PersonalInfo => 2,
            Self::Upload => 3,
            Self::Review => 4,
        }
    }

    pub const fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::SelectType),
            2 => Some(Self::PersonalInfo),
            3 => Some(Self::Upload),
            4 => Some(Self::Review),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SelectType => "Document Type",
            Self::PersonalInfo => "Personal Information",
            Self::Upload => "Document Upload",
            Self::Review => "Review & Payment",
        }
    }

    pub const fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub const fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("wizard step {value} is outside 1..=4"))
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> Self {
        step.number()
    }
}

/// Keys of the personal-information form, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PersonalField {
    FirstName,
    LastName,
    DateOfBirth,
    PlaceOfBirth,
    Nationality,
    Gender,
    Email,
    Phone,
    Street,
    PostalCode,
    City,
    State,
}

impl PersonalField {
    pub const fn ordered() -> [Self; 12] {
        [
            Self::FirstName,
            Self::LastName,
            Self::DateOfBirth,
            Self::PlaceOfBirth,
            Self::Nationality,
            Self::Gender,
            Self::Email,
            Self::Phone,
            Self::Street,
            Self::PostalCode,
            Self::City,
            Self::State,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::DateOfBirth => "dateOfBirth",
            Self::PlaceOfBirth => "placeOfBirth",
            Self::Nationality => "nationality",
            Self::Gender => "gender",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Street => "street",
            Self::PostalCode => "postalCode",
            Self::City => "city",
            Self::State => "state",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::DateOfBirth => "Date of Birth",
            Self::PlaceOfBirth => "Place of Birth",
            Self::Nationality => "Nationality",
            Self::Gender => "Gender",
            Self::Email => "Email Address",
            Self::Phone => "Phone Number",
            Self::Street => "Street Address",
            Self::PostalCode => "Postal Code",
            Self::City => "City",
            Self::State => "State",
        }
    }
}

impl FromStr for PersonalField {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|candidate| candidate.key() == value.trim())
            .ok_or_else(|| UnknownVariant::new("personal field", value))
    }
}

/// Applicant details collected on step two (`formData` on the wire).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub place_of_birth: String,
    pub nationality: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub state: String,
}

impl PersonalInfo {
    pub fn get(&self, field: PersonalField) -> &str {
        match field {
            PersonalField::FirstName => &self.first_name,
            PersonalField::LastName => &self.last_name,
            PersonalField::DateOfBirth => &self.date_of_birth,
            PersonalField::PlaceOfBirth => &self.place_of_birth,
            PersonalField::Nationality => &self.nationality,
            PersonalField::Gender => &self.gender,
            PersonalField::Email => &self.email,
            PersonalField::Phone => &self.phone,
            PersonalField::Street => &self.street,
            PersonalField::PostalCode => &self.postal_code,
            PersonalField::City => &self.city,
            PersonalField::State => &self.state,
        }
    }

    pub fn set(&mut self, field: PersonalField, value: impl Into<String>) {
        let slot = match field {
            PersonalField::FirstName => &mut self.first_name,
            PersonalField::LastName => &mut self.last_name,
            PersonalField::DateOfBirth => &mut self.date_of_birth,
            PersonalField::PlaceOfBirth => &mut self.place_of_birth,
            PersonalField::Nationality => &mut self.nationality,
            PersonalField::Gender => &mut self.gender,
            PersonalField::Email => &mut self.email,
            PersonalField::Phone => &mut self.phone,
            PersonalField::Street => &mut self.street,
            PersonalField::PostalCode => &mut self.postal_code,
            PersonalField::City => &mut self.city,
            PersonalField::State => &mut self.state,
        };
        *slot = value.into();
    }
}

/// Named document requirement that uploaded files satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotId {
    BiometricPhoto,
    ProofOfResidence,
    BirthCertificate,
    PreviousPassport,
    MedicalCertificate,
    DrivingTest,
}

impl SlotId {
    pub const fn id(self) -> &'static str {
        match self {
            Self::BiometricPhoto => "biometric-photo",
            Self::ProofOfResidence => "proof-of-residence",
            Self::BirthCertificate => "birth-certificate",
            Self::PreviousPassport => "previous-passport",
            Self::MedicalCertificate => "medical-certificate",
            Self::DrivingTest => "driving-test",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::BiometricPhoto => "Biometric Photo",
            Self::ProofOfResidence => "Proof of Residence",
            Self::BirthCertificate => "Birth Certificate",
            Self::PreviousPassport => "Previous Passport (if applicable)",
            Self::MedicalCertificate => "Medical Certificate",
            Self::DrivingTest => "Driving Test Certificate",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SlotId {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            Self::BiometricPhoto,
            Self::ProofOfResidence,
            Self::BirthCertificate,
            Self::PreviousPassport,
            Self::MedicalCertificate,
            Self::DrivingTest,
        ]
        .into_iter()
        .find(|candidate| candidate.id() == value.trim())
        .ok_or_else(|| UnknownVariant::new("document slot", value))
    }
}

static FILE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier of an accepted or in-flight upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub String);

impl FileId {
    pub(crate) fn generate(slot: SlotId, at: DateTime<Utc>) -> Self {
        let sequence = FILE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}-{sequence}", slot.id(), at.timestamp_millis()))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference handed to the applicant once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationNumber(pub String);

impl ApplicationNumber {
    pub(crate) fn generate(at: DateTime<Utc>) -> Self {
        Self(format!("APP-{}", at.timestamp_millis()))
    }
}

impl fmt::Display for ApplicationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file the applicant dropped onto a slot, before any checks ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCandidate {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Accepted upload. Immutable once created; only removal is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRecord {
    pub id: FileId,
    #[serde(rename = "documentId")]
    pub slot: SlotId,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}
