use serde::Serialize;

/// Stored object location plus a time-limited download URL.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[schema(example = "correspondences/1718000000000-report.pdf")]
    pub path: String,
    #[serde(rename = "signedUrl")]
    pub signed_url: String,
}
