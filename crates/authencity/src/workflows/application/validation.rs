use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::domain::{PersonalField, SlotId, WizardStep};
use super::draft::ApplicationDraft;

/// Key under which a validation message is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorField {
    DocumentType,
    Personal(PersonalField),
    Documents,
    PaymentMethod,
}

impl ErrorField {
    pub const fn key(self) -> &'static str {
        match self {
            Self::DocumentType => "documentType",
            Self::Personal(field) => field.key(),
            Self::Documents => "documents",
            Self::PaymentMethod => "paymentMethod",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a document type first")]
    DocumentTypeMissing,
    #[error("This field is required")]
    Required,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Please upload all required documents (missing: {})", slot_list(.missing))]
    MissingDocuments { missing: Vec<SlotId> },
    #[error("Please select a payment method")]
    PaymentMethodMissing,
}

fn slot_list(slots: &[SlotId]) -> String {
    slots
        .iter()
        .map(|slot| slot.id())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Field-keyed error map for the active step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<ErrorField, ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: ErrorField) -> Option<&ValidationError> {
        self.0.get(&field)
    }

    pub fn contains(&self, field: ErrorField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn insert(&mut self, field: ErrorField, error: ValidationError) {
        self.0.insert(field, error);
    }

    pub fn clear_field(&mut self, field: ErrorField) -> Option<ValidationError> {
        self.0.remove(&field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorField, &ValidationError)> + '_ {
        self.0.iter().map(|(field, error)| (*field, error))
    }

    /// Messages in field order, as listed under "Please correct the following errors".
    pub fn messages(&self) -> Vec<String> {
        self.0.values().map(ToString::to_string).collect()
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, error) in &self.0 {
            map.serialize_entry(field.key(), &error.to_string())?;
        }
        map.end()
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern is valid"))
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value)
}

/// Validation predicate for a single step. An empty result means the step may be left.
pub fn validate_step(step: WizardStep, draft: &ApplicationDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    match step {
        WizardStep::SelectType => {
            if draft.selected_document_type.is_none() {
                errors.insert(ErrorField::DocumentType, ValidationError::DocumentTypeMissing);
            }
        }
        WizardStep::PersonalInfo => {
            for field in PersonalField::ordered() {
                let value = draft.personal_info.get(field).trim();
                if value.is_empty() {
                    errors.insert(ErrorField::Personal(field), ValidationError::Required);
                } else if field == PersonalField::Email && !is_valid_email(value) {
                    errors.insert(ErrorField::Personal(field), ValidationError::InvalidEmail);
                }
            }
        }
        WizardStep::Upload => {
            let missing = match draft.selected_document_type {
                Some(_) => draft.missing_slots(),
                None => {
                    errors.insert(ErrorField::DocumentType, ValidationError::DocumentTypeMissing);
                    Vec::new()
                }
            };
            if !missing.is_empty() {
                errors.insert(
                    ErrorField::Documents,
                    ValidationError::MissingDocuments { missing },
                );
            }
        }
        WizardStep::Review => {
            if draft.selected_payment_method.is_none() {
                errors.insert(
                    ErrorField::PaymentMethod,
                    ValidationError::PaymentMethodMissing,
                );
            }
        }
    }

    errors
}

/// Combined predicates of every step up to and including `last`.
pub fn validate_through(last: WizardStep, draft: &ApplicationDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for step in WizardStep::ordered()
        .into_iter()
        .filter(|step| *step <= last)
    {
        errors.extend(validate_step(step, draft));
    }
    errors
}
