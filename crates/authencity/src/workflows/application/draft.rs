use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{
    DocumentType, FileId, PaymentMethod, PersonalInfo, SlotId, UploadedFileRecord, WizardStep,
};
use super::requirements::required_slots;

/// Working state of one in-progress application; doubles as the persisted snapshot shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    #[serde(default)]
    pub current_step: WizardStep,
    #[serde(default, deserialize_with = "deserialize_selection")]
    pub selected_document_type: Option<DocumentType>,
    #[serde(default, rename = "formData")]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub uploaded_files: Vec<UploadedFileRecord>,
    #[serde(default, deserialize_with = "deserialize_selection")]
    pub selected_payment_method: Option<PaymentMethod>,
    #[serde(default, rename = "lastSaved")]
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl ApplicationDraft {
    pub fn to_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_snapshot(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn files_for(&self, slot: SlotId) -> impl Iterator<Item = &UploadedFileRecord> + '_ {
        self.uploaded_files
            .iter()
            .filter(move |file| file.slot == slot)
    }

    pub fn file(&self, id: &FileId) -> Option<&UploadedFileRecord> {
        self.uploaded_files.iter().find(|file| &file.id == id)
    }

    pub fn uploaded_slots(&self) -> BTreeSet<SlotId> {
        self.uploaded_files.iter().map(|file| file.slot).collect()
    }

    /// Required slots for the selected type that have no file yet, in catalogue order.
    pub fn missing_slots(&self) -> Vec<SlotId> {
        let Some(document_type) = self.selected_document_type else {
            return Vec::new();
        };
        let uploaded = self.uploaded_slots();
        required_slots(document_type)
            .into_iter()
            .filter(|slot| !uploaded.contains(slot))
            .collect()
    }
}

/// Accepts the portal's historic encoding where an unset selection is stored as `""`.
fn deserialize_selection<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_selections_deserialize_as_unset() {
        let raw = json!({
            "currentStep": 2,
            "selectedDocumentType": "",
            "formData": { "firstName": "Ada" },
            "uploadedFiles": [],
            "selectedPaymentMethod": "",
            "lastSaved": "2025-03-01T10:00:00Z"
        })
        .to_string();

        let draft = ApplicationDraft::from_snapshot(&raw).expect("snapshot parses");
        assert_eq!(draft.current_step, WizardStep::PersonalInfo);
        assert_eq!(draft.selected_document_type, None);
        assert_eq!(draft.selected_payment_method, None);
        assert_eq!(draft.personal_info.first_name, "Ada");
        assert!(draft.last_saved_at.is_some());
    }

    #[test]
    fn out_of_range_step_is_rejected() {
        let raw = json!({ "currentStep": 9 }).to_string();
        assert!(ApplicationDraft::from_snapshot(&raw).is_err());
    }

    #[test]
    fn unknown_document_type_is_rejected() {
        let raw = json!({ "currentStep": 1, "selectedDocumentType": "visa" }).to_string();
        assert!(ApplicationDraft::from_snapshot(&raw).is_err());
    }

    #[test]
    fn missing_slots_is_empty_without_document_type() {
        assert!(ApplicationDraft::default().missing_slots().is_empty());
    }
}
