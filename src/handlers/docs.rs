use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::me,
        crate::handlers::subscription::get_subscription,
        crate::handlers::subscription::consume_credit,
        crate::handlers::variations::generate_variations,
        crate::handlers::variations::list_variations,
        crate::handlers::variations::update_variation,
        crate::handlers::variations::reset_variation,
        crate::handlers::variations::download_variation,
        crate::handlers::videos::create_video,
        crate::handlers::videos::list_videos,
        crate::handlers::videos::dashboard,
        crate::handlers::transcribe::transcribe,
        crate::handlers::upload::upload_media,
    ),
    components(
        schemas(
            crate::models::CreateUserRequest,
            crate::models::LoginRequest,
            crate::models::RefreshRequest,
            crate::models::UserResponse,
            crate::models::AuthResponse,
            crate::models::Plan,
            crate::models::SubscriptionUsage,
            crate::models::FontWeight,
            crate::models::TextStyle,
            crate::models::Overlay,
            crate::models::Variation,
            crate::models::VariationUpdate,
            crate::models::GenerateVariationsRequest,
            crate::models::VideoStatus,
            crate::models::Video,
            crate::models::CreateVideoRequest,
            crate::models::AnalyticsSummary,
            crate::models::DashboardResponse,
            crate::services::Transcript,
            crate::handlers::transcribe::TranscribeUrlRequest,
            crate::storage::StoredAsset,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Accounts and tokens"),
        (name = "subscription", description = "Plan, quota and credits"),
        (name = "variations", description = "Generation, overlay editing and download"),
        (name = "videos", description = "Video records and dashboard"),
        (name = "transcription", description = "Video transcripts"),
        (name = "media", description = "Media uploads"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Shortform Studio API",
        version = "0.1.0",
        description = "Backend for generating, captioning and exporting short-form video stills"
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
