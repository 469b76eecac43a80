//! Registration of new correspondence together with its files.

use std::collections::HashSet;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use cms_common::activity::{ACTION_CREATED, NewActivity};
use cms_common::attachment::attachment_path;
use cms_common::storage::UploadOptions;
use cms_common::validation::required;
use cms_common::{CorrespondenceStatus, NewCorrespondence, registry};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, PartialFailureDetails};
use crate::models::correspondence::CreateCorrespondenceResponse;
use crate::state::AppState;
use crate::utils::filename::validate_flat_filename;

/// One file submitted with the form.
#[derive(Debug, Clone)]
pub struct IntakeFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Raw form fields as submitted. Nothing here has been validated yet.
#[derive(Debug, Default)]
pub struct IntakeForm {
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub registry_number: Option<String>,
    pub date: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub files: Vec<IntakeFile>,
}

/// A form that passed validation, ready to persist.
#[derive(Debug)]
pub struct ValidIntake {
    pub record: NewCorrespondence,
    pub files: Vec<IntakeFile>,
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Check every field and file. Runs before any store is contacted.
pub fn validate(
    form: IntakeForm,
    config: &AppConfig,
    created_by: Option<Uuid>,
) -> Result<ValidIntake, AppError> {
    let subject = required(form.subject.as_deref(), "subject").map_err(AppError::Validation)?;
    let sender = required(form.sender.as_deref(), "sender").map_err(AppError::Validation)?;
    let recipient =
        required(form.recipient.as_deref(), "recipient").map_err(AppError::Validation)?;

    let date = match optional(&form.date) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::Validation(format!("Invalid date '{raw}'. Expected YYYY-MM-DD"))
        })?,
        None => Utc::now().date_naive(),
    };
    let status = match optional(&form.status) {
        Some(raw) => raw
            .parse::<CorrespondenceStatus>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
        None => CorrespondenceStatus::default(),
    };

    if config.correspondence.require_attachments && form.files.is_empty() {
        return Err(AppError::Validation(
            "At least one attachment is required".into(),
        ));
    }

    let max_size = config.storage.max_upload_size;
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(form.files.len());
    for mut file in form.files {
        let name = validate_flat_filename(&file.name)
            .map_err(|e| AppError::Validation(format!("{}: {}", e.message(), file.name)))?
            .to_string();
        if file.data.len() > max_size {
            return Err(AppError::Validation(format!(
                "File '{name}' is {} bytes, the limit is {max_size} bytes",
                file.data.len()
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(AppError::Validation(format!(
                "File '{name}' was submitted more than once"
            )));
        }
        file.name = name;
        files.push(file);
    }

    let record = NewCorrespondence {
        registry_number: registry::resolve(
            optional(&form.registry_number),
            &config.correspondence.registry_prefix,
        ),
        subject: subject.to_string(),
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        department: optional(&form.department)
            .unwrap_or(&config.correspondence.default_department)
            .to_string(),
        date,
        status,
        description: form.description.unwrap_or_default().trim().to_string(),
        created_by,
    };
    Ok(ValidIntake { record, files })
}

/// Persist the record, log its creation and upload its files in order.
///
/// The first failed upload stops the sequence. The record and any files
/// already uploaded are kept and reported in a `PARTIAL_FAILURE`.
#[instrument(skip(state, form))]
pub async fn create(
    state: &AppState,
    form: IntakeForm,
    user_id: Uuid,
) -> Result<CreateCorrespondenceResponse, AppError> {
    let ValidIntake { record, files } = validate(form, &state.config, Some(user_id))?;

    let correspondence = state.records.insert(record).await?;
    let id = correspondence.id;
    info!(record_id = %id, registry_number = %correspondence.registry_number, "Correspondence created");

    let entry = NewActivity::new(
        id,
        Some(user_id),
        ACTION_CREATED,
        format!("Registered {}", correspondence.registry_number),
    );
    if let Err(e) = state.records.insert_activity(entry).await {
        warn!(record_id = %id, error = %e, "Failed to record creation activity");
    }

    let mut uploaded = Vec::with_capacity(files.len());
    for file in files {
        let path = attachment_path(id, &file.name);
        let content_type = file.content_type.or_else(|| {
            mime_guess::from_path(&file.name)
                .first()
                .map(|m| m.to_string())
        });
        if let Err(e) = state
            .blobs
            .upload(&path, file.data, UploadOptions::overwrite(content_type))
            .await
        {
            warn!(record_id = %id, path = %path, error = %e, "Attachment upload failed");
            return Err(AppError::PartialFailure {
                message: format!(
                    "Correspondence {} was saved, but uploading '{}' failed",
                    correspondence.registry_number, file.name
                ),
                details: PartialFailureDetails {
                    record_id: id,
                    uploaded,
                    failed_file: file.name,
                },
            });
        }
        uploaded.push(path);
    }

    Ok(CreateCorrespondenceResponse {
        correspondence,
        attachments: uploaded,
    })
}
