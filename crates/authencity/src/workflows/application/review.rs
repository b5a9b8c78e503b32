use serde::Serialize;

use super::domain::{DocumentType, FileId, PersonalField, SlotId};
use super::draft::ApplicationDraft;
use super::requirements::slots_for;

/// Everything the review step shows before the applicant pays and submits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub document: Option<DocumentSummary>,
    pub personal_info: Vec<ReviewField>,
    pub documents: Vec<ReviewDocumentGroup>,
    pub payment_method: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_type: DocumentType,
    pub label: &'static str,
    pub fee: String,
    pub processing_time: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewField {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDocumentGroup {
    pub slot: SlotId,
    pub label: &'static str,
    pub required: bool,
    pub files: Vec<ReviewFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFile {
    pub id: FileId,
    pub name: String,
    pub size: String,
}

impl ReviewSummary {
    pub fn from_draft(draft: &ApplicationDraft) -> Self {
        let document = draft
            .selected_document_type
            .map(|document_type| DocumentSummary {
                document_type,
                label: document_type.label(),
                fee: document_type.fee_label(),
                processing_time: document_type.processing_time(),
            });

        let personal_info = PersonalField::ordered()
            .into_iter()
            .map(|field| ReviewField {
                key: field.key(),
                label: field.label(),
                value: draft.personal_info.get(field).to_string(),
            })
            .collect();

        let documents = draft
            .selected_document_type
            .map(|document_type| {
                slots_for(document_type)
                    .into_iter()
                    .map(|requirement| ReviewDocumentGroup {
                        slot: requirement.slot,
                        label: requirement.slot.label(),
                        required: requirement.required,
                        files: draft
                            .files_for(requirement.slot)
                            .map(|file| ReviewFile {
                                id: file.id.clone(),
                                name: file.name.clone(),
                                size: format_file_size(file.size),
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            document,
            personal_info,
            documents,
            payment_method: draft.selected_payment_method.map(|method| method.label()),
        }
    }
}

/// Human-readable size in 1024-based units with at most two decimals, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
