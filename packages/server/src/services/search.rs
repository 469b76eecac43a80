use cms_common::search::{SearchQuery, SortKey, StatusFilter};
use cms_common::store::RecordStore;
use tracing::instrument;

use crate::error::AppError;
use crate::models::correspondence::{CorrespondenceListQuery, CorrespondenceListResponse};
use crate::models::shared::Pagination;

const MAX_PER_PAGE: u64 = 100;

/// Turn raw list parameters into a search query.
pub fn build_query(params: &CorrespondenceListQuery) -> Result<SearchQuery, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<StatusFilter>)
        .transpose()
        .map_err(AppError::Validation)?
        .unwrap_or_default();
    let sort = params
        .sort
        .as_deref()
        .map(str::parse::<SortKey>)
        .transpose()
        .map_err(AppError::Validation)?
        .unwrap_or_default();

    if let (Some(from), Some(to)) = (params.date_from, params.date_to)
        && from > to
    {
        return Err(AppError::Validation(
            "date_from must not be after date_to".into(),
        ));
    }

    Ok(SearchQuery {
        text: params.q.clone(),
        status,
        sort,
        date_from: params.date_from,
        date_to: params.date_to,
    })
}

/// Run the full search and return one page of it.
#[instrument(skip(records, params))]
pub async fn search(
    records: &dyn RecordStore,
    params: &CorrespondenceListQuery,
    default_per_page: u64,
) -> Result<CorrespondenceListResponse, AppError> {
    let query = build_query(params)?;
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(default_per_page)
        .clamp(1, MAX_PER_PAGE);

    let results = records.search(&query).await?;
    let pagination = Pagination::new(page, per_page, results.len() as u64);
    Ok(CorrespondenceListResponse {
        data: pagination.slice(results),
        pagination,
    })
}
