use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::{auth, correspondence};
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/correspondence", correspondence_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(auth::sign_in))
        .routes(routes!(auth::sign_up))
        .routes(routes!(auth::forgot_password))
        .routes(routes!(auth::session))
        .routes(routes!(auth::sign_out))
        .routes(routes!(auth::refresh))
        .routes(routes!(auth::update_password))
        .routes(routes!(auth::events))
        .routes(routes!(auth::oauth_callback))
        .routes(routes!(auth::oauth_url))
}

fn correspondence_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            correspondence::list_correspondence,
            correspondence::create_correspondence
        ))
        .routes(routes!(correspondence::get_correspondence))
        .routes(routes!(correspondence::update_status))
        .routes(routes!(correspondence::list_activity))
        .routes(routes!(correspondence::download_attachment))
        .layer(correspondence::create_body_limit())
}
