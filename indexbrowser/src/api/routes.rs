use super::error::ApiError;
use crate::querystring::QueryParams;
use crate::views::{BrowseRequest, IndexResponse, Requester, ResultsBrowser};
use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Run a view on the blocking pool; backends may do blocking I/O.
async fn run_view<T, F>(browser: ResultsBrowser, view: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&ResultsBrowser) -> crate::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || view(&browser))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn params(query: Option<String>) -> QueryParams {
    query.as_deref().map(QueryParams::parse).unwrap_or_default()
}

/// GET {mount} - search result listing
pub async fn index(
    State(browser): State<ResultsBrowser>,
    Extension(user): Extension<Requester>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    let request = BrowseRequest::new(uri.path(), params(query), user);
    let response = run_view(browser, move |b| b.index(&request)).await?;
    Ok(match response {
        IndexResponse::Render(context) => Json(context).into_response(),
        IndexResponse::Redirect(location) => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
    })
}

/// GET {mount}:content_type/:pk/ - stored data for one document
pub async fn detail(
    State(browser): State<ResultsBrowser>,
    Extension(user): Extension<Requester>,
    Path((content_type, pk)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    let params = params(query);
    let context =
        run_view(browser, move |b| b.view(&user, &content_type, &pk, &params)).await?;
    Ok(Json(context).into_response())
}

/// GET {mount}_object/:app_label/:model_name/:pk - lookup by model instance
pub async fn object(
    State(browser): State<ResultsBrowser>,
    Extension(user): Extension<Requester>,
    Path((app_label, model_name, pk)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let context = run_view(browser, move |b| {
        b.for_object(&user, &app_label, &model_name, &pk)
    })
    .await?;
    Ok(Json(context).into_response())
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}
