use chrono::NaiveDate;
use cms_common::{ActivityLogEntry, Attachment, CorrespondenceRecord};
use serde::{Deserialize, Serialize};

use super::shared::Pagination;

/// Query parameters for listing correspondence.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CorrespondenceListQuery {
    /// Case-insensitive match on subject, sender, recipient or registry number.
    pub q: Option<String>,
    /// `all` or one of `Pending`, `Completed`, `Archived`.
    pub status: Option<String>,
    /// `newest` (default), `oldest` or `subject`.
    pub sort: Option<String>,
    /// Inclusive lower bound on the correspondence date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the correspondence date.
    pub date_to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CorrespondenceListResponse {
    pub data: Vec<CorrespondenceRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CorrespondenceDetailResponse {
    pub correspondence: CorrespondenceRecord,
    pub attachments: Vec<Attachment>,
    /// Newest first.
    pub activity: Vec<ActivityLogEntry>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(example = "Completed")]
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateCorrespondenceResponse {
    pub correspondence: CorrespondenceRecord,
    /// Blob paths of the uploaded attachments, in upload order.
    pub attachments: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ActivityListResponse {
    pub data: Vec<ActivityLogEntry>,
}
