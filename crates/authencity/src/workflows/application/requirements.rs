//! Document slot catalogue.
//!
//! Every consumer of slot rules (upload checks, step-three validation, the review summary)
//! goes through [`slots_for`], so a new document type only needs a new match arm here.

use serde::Serialize;

use super::domain::{DocumentType, SlotId};

const PHOTO_FORMATS: &[&str] = &["jpg", "jpeg", "png"];
const DOCUMENT_FORMATS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upload rules attached to one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotRequirement {
    pub slot: SlotId,
    pub required: bool,
    pub max_size_mb: u32,
    pub formats: &'static [&'static str],
}

impl SlotRequirement {
    const fn required(slot: SlotId, max_size_mb: u32, formats: &'static [&'static str]) -> Self {
        Self {
            slot,
            required: true,
            max_size_mb,
            formats,
        }
    }

    const fn optional(slot: SlotId, max_size_mb: u32, formats: &'static [&'static str]) -> Self {
        Self {
            slot,
            required: false,
            max_size_mb,
            formats,
        }
    }

    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_mb as u64 * BYTES_PER_MB
    }

    pub fn max_size_label(&self) -> String {
        format!("{}MB", self.max_size_mb)
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.formats
            .iter()
            .any(|format| format.eq_ignore_ascii_case(extension))
    }

    pub fn accepts_size(&self, size: u64) -> bool {
        size <= self.max_size_bytes()
    }
}

/// All slots shown for a document type: the three base slots followed by type-specific ones.
pub fn slots_for(document_type: DocumentType) -> Vec<SlotRequirement> {
    let mut slots = vec![
        SlotRequirement::required(SlotId::BiometricPhoto, 2, PHOTO_FORMATS),
        SlotRequirement::required(SlotId::ProofOfResidence, 5, DOCUMENT_FORMATS),
        SlotRequirement::required(SlotId::BirthCertificate, 5, DOCUMENT_FORMATS),
    ];

    match document_type {
        DocumentType::IdCard => {}
        DocumentType::Passport => {
            slots.push(SlotRequirement::optional(
                SlotId::PreviousPassport,
                5,
                DOCUMENT_FORMATS,
            ));
        }
        DocumentType::DriversLicense => {
            slots.push(SlotRequirement::required(
                SlotId::MedicalCertificate,
                5,
                DOCUMENT_FORMATS,
            ));
            slots.push(SlotRequirement::required(
                SlotId::DrivingTest,
                5,
                DOCUMENT_FORMATS,
            ));
        }
    }

    slots
}

/// Slots that must hold at least one file before the upload step can be left.
pub fn required_slots(document_type: DocumentType) -> Vec<SlotId> {
    slots_for(document_type)
        .into_iter()
        .filter(|requirement| requirement.required)
        .map(|requirement| requirement.slot)
        .collect()
}

pub fn slot_requirement(document_type: DocumentType, slot: SlotId) -> Option<SlotRequirement> {
    slots_for(document_type)
        .into_iter()
        .find(|requirement| requirement.slot == slot)
}

/// Lower-cased text after the last dot; the whole name when there is no dot.
pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase()
}
