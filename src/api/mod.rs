use actix_web::{web, HttpResponse, Responder, ResponseError};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::admin;
use crate::auth::AuthService;
use crate::directory;
use crate::error::DirectoryError;
use crate::import::{self, UnknownCategoryPolicy};
use crate::models::*;
use crate::moderation::{self, ModerationAction, ModerationOutcome};
use crate::query::{SortOrder, ToolFilters};
use crate::store::Store;
use crate::visibility::require_authenticated;

pub struct AppState {
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    /// Server default for import; a request may override it
    pub import_policy: UnknownCategoryPolicy,
}

fn error_response(e: DirectoryError) -> HttpResponse {
    e.error_response()
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Auth Endpoints ====================

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let user = match state.auth_service.create_account(
        &state.store,
        &body.username,
        &body.email,
        &body.password,
        false,
        false,
    ) {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    let token = match state.auth_service.generate_token(user.id) {
        Ok(t) => t,
        Err(e) => return error_response(e.into()),
    };

    log::info!("Registered user {} ({})", user.id, user.username);
    HttpResponse::Created().json(ApiResponse::success(LoginResponse { token, user }))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let user = match state.auth_service.authenticate(&state.store, &body.username, &body.password) {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    let token = match state.auth_service.generate_token(user.id) {
        Ok(t) => t,
        Err(e) => return error_response(e.into()),
    };

    HttpResponse::Ok().json(ApiResponse::success(LoginResponse { token, user }))
}

pub async fn get_current_user(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    let user_id = match require_authenticated(&viewer) {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.store.get_user(user_id) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(e) => error_response(e),
    }
}

// ==================== Tools Endpoints ====================

#[derive(Deserialize)]
pub struct ListToolsQuery {
    search: Option<String>,
    category: Option<String>,
    sort: Option<String>,
}

#[derive(Deserialize)]
pub struct SortQuery {
    sort: Option<String>,
}

pub async fn list_tools(
    state: web::Data<AppState>,
    query: web::Query<ListToolsQuery>,
) -> impl Responder {
    // Forms send `category=` for "all categories".
    let category_id = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        None => None,
        Some(raw) => match raw.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                return error_response(DirectoryError::Validation(format!(
                    "Invalid category id '{}'",
                    raw
                )))
            }
        },
    };
    let filters = ToolFilters {
        search: query.search.clone(),
        category_id,
    };
    let sort = SortOrder::from_param(query.sort.as_deref());

    match directory::public_tools(&state.store, &filters, sort) {
        Ok(tools) => HttpResponse::Ok().json(ApiResponse::success(tools)),
        Err(e) => error_response(e),
    }
}

pub async fn list_my_tools(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match directory::my_tools(&state.store, &viewer) {
        Ok(tools) => HttpResponse::Ok().json(ApiResponse::success(tools)),
        Err(e) => error_response(e),
    }
}

pub async fn submit_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    body: web::Json<SubmitToolRequest>,
) -> impl Responder {
    match directory::submit_tool(&state.store, &viewer, &body) {
        Ok(tool) => HttpResponse::Created().json(ApiResponse::success(tool)),
        Err(e) => error_response(e),
    }
}

pub async fn get_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    match directory::tool_detail(&state.store, &viewer, path.into_inner()) {
        Ok(tool) => HttpResponse::Ok().json(ApiResponse::success(tool)),
        Err(e) => error_response(e),
    }
}

pub async fn get_similar_tools(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    match directory::similar_tools(&state.store, &viewer, path.into_inner()) {
        Ok(tools) => HttpResponse::Ok().json(ApiResponse::success(tools)),
        Err(e) => error_response(e),
    }
}

pub async fn vote_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
    body: web::Json<VoteRequest>,
) -> impl Responder {
    match directory::vote(&state.store, &viewer, VoteTarget::Tool, path.into_inner(), body.value) {
        Ok(votes) => HttpResponse::Ok().json(ApiResponse::success(VoteResponse { votes })),
        Err(e) => error_response(e),
    }
}

// ==================== Comments Endpoints ====================

pub async fn list_comments(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
    query: web::Query<SortQuery>,
) -> impl Responder {
    let sort = SortOrder::from_param(query.sort.as_deref());
    match directory::tool_comments(&state.store, &viewer, path.into_inner(), sort) {
        Ok(comments) => HttpResponse::Ok().json(ApiResponse::success(comments)),
        Err(e) => error_response(e),
    }
}

pub async fn create_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
    body: web::Json<CreateCommentRequest>,
) -> impl Responder {
    match directory::add_comment(&state.store, &viewer, path.into_inner(), &body.content) {
        Ok(comment) => HttpResponse::Created().json(ApiResponse::success(comment)),
        Err(e) => error_response(e),
    }
}

pub async fn vote_comment(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
    body: web::Json<VoteRequest>,
) -> impl Responder {
    match directory::vote(&state.store, &viewer, VoteTarget::Comment, path.into_inner(), body.value) {
        Ok(votes) => HttpResponse::Ok().json(ApiResponse::success(VoteResponse { votes })),
        Err(e) => error_response(e),
    }
}

// ==================== Categories & Appearance ====================

pub async fn list_categories(state: web::Data<AppState>) -> impl Responder {
    match state.store.list_categories() {
        Ok(categories) => HttpResponse::Ok().json(ApiResponse::success(categories)),
        Err(e) => error_response(e),
    }
}

pub async fn list_category_tools(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<SortQuery>,
) -> impl Responder {
    let sort = SortOrder::from_param(query.sort.as_deref());
    match directory::category_tools(&state.store, path.into_inner(), sort) {
        Ok((category, tools)) => HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({
            "category": category,
            "tools": tools
        }))),
        Err(e) => error_response(e),
    }
}

pub async fn get_appearance(state: web::Data<AppState>) -> impl Responder {
    match state.store.get_appearance() {
        Ok(settings) => HttpResponse::Ok().json(ApiResponse::success(settings)),
        Err(e) => error_response(e),
    }
}

// ==================== Moderation Endpoints ====================

pub async fn list_pending_tools(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match moderation::pending_tools(&state.store, &viewer) {
        Ok(tools) => HttpResponse::Ok().json(ApiResponse::success(tools)),
        Err(e) => error_response(e),
    }
}

pub async fn list_all_tools(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match moderation::all_tools(&state.store, &viewer) {
        Ok(tools) => HttpResponse::Ok().json(ApiResponse::success(tools)),
        Err(e) => error_response(e),
    }
}

async fn apply_moderation(
    state: web::Data<AppState>,
    viewer: Viewer,
    tool_id: i64,
    action: ModerationAction,
) -> HttpResponse {
    match moderation::moderate(&state.store, &viewer, tool_id, action) {
        Ok(ModerationOutcome::Approved(tool)) => HttpResponse::Ok().json(ApiResponse::success(tool)),
        Ok(ModerationOutcome::Deleted(_)) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

pub async fn approve_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    apply_moderation(state, viewer, path.into_inner(), ModerationAction::Approve).await
}

pub async fn reject_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    apply_moderation(state, viewer, path.into_inner(), ModerationAction::Reject).await
}

// ==================== Admin Endpoints ====================

pub async fn remove_tool(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    apply_moderation(state, viewer, path.into_inner(), ModerationAction::Remove).await
}

pub async fn create_category(
    state: web::Data<AppState>,
    viewer: Viewer,
    body: web::Json<CreateCategoryRequest>,
) -> impl Responder {
    match admin::create_category(&state.store, &viewer, &body.name, &body.description) {
        Ok(category) => HttpResponse::Created().json(ApiResponse::success(category)),
        Err(e) => error_response(e),
    }
}

pub async fn delete_category(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
) -> impl Responder {
    match admin::delete_category(&state.store, &viewer, path.into_inner()) {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

pub async fn list_users(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match admin::list_users(&state.store, &viewer) {
        Ok(users) => HttpResponse::Ok().json(ApiResponse::success(users)),
        Err(e) => error_response(e),
    }
}

pub async fn update_user_roles(
    state: web::Data<AppState>,
    viewer: Viewer,
    path: web::Path<i64>,
    body: web::Json<UpdateRolesRequest>,
) -> impl Responder {
    match admin::set_user_roles(&state.store, &viewer, path.into_inner(), body.is_moderator, body.is_admin) {
        Ok(user) => HttpResponse::Ok().json(ApiResponse::success(user)),
        Err(e) => error_response(e),
    }
}

pub async fn get_stats(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match admin::dashboard(&state.store, &viewer) {
        Ok(stats) => HttpResponse::Ok().json(ApiResponse::success(stats)),
        Err(e) => error_response(e),
    }
}

pub async fn update_appearance(
    state: web::Data<AppState>,
    viewer: Viewer,
    body: web::Json<AppearanceUpdate>,
) -> impl Responder {
    match admin::update_appearance(&state.store, &viewer, &body) {
        Ok(settings) => HttpResponse::Ok().json(ApiResponse::success(settings)),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
pub struct ImportQuery {
    unknown_categories: Option<UnknownCategoryPolicy>,
}

pub async fn import_tools(
    state: web::Data<AppState>,
    viewer: Viewer,
    query: web::Query<ImportQuery>,
    body: web::Json<Value>,
) -> impl Responder {
    let policy = query.unknown_categories.unwrap_or(state.import_policy);
    match import::import_tools(&state.store, &viewer, body.into_inner(), policy) {
        Ok(report) => HttpResponse::Ok().json(ApiResponse::success(report)),
        Err(e) => error_response(e),
    }
}

pub async fn export_tools(state: web::Data<AppState>, viewer: Viewer) -> impl Responder {
    match import::export_directory(&state.store, &viewer) {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(e) => error_response(e),
    }
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Auth
        .route("/api/auth/register", web::post().to(register))
        .route("/api/auth/login", web::post().to(login))
        .route("/api/auth/me", web::get().to(get_current_user))
        .route("/api/me/tools", web::get().to(list_my_tools))

        // Tools
        .route("/api/tools", web::get().to(list_tools))
        .route("/api/tools", web::post().to(submit_tool))
        .route("/api/tools/{id}", web::get().to(get_tool))
        .route("/api/tools/{id}/similar", web::get().to(get_similar_tools))
        .route("/api/tools/{id}/comments", web::get().to(list_comments))
        .route("/api/tools/{id}/comments", web::post().to(create_comment))
        .route("/api/tools/{id}/vote", web::post().to(vote_tool))

        // Comments
        .route("/api/comments/{id}/vote", web::post().to(vote_comment))

        // Categories & appearance
        .route("/api/categories", web::get().to(list_categories))
        .route("/api/categories/{id}/tools", web::get().to(list_category_tools))
        .route("/api/appearance", web::get().to(get_appearance))

        // Moderation
        .route("/api/moderation/tools", web::get().to(list_pending_tools))
        .route("/api/moderation/tools/all", web::get().to(list_all_tools))
        .route("/api/moderation/tools/{id}/approve", web::post().to(approve_tool))
        .route("/api/moderation/tools/{id}/reject", web::post().to(reject_tool))

        // Admin
        .route("/api/admin/tools/{id}", web::delete().to(remove_tool))
        .route("/api/admin/categories", web::post().to(create_category))
        .route("/api/admin/categories/{id}", web::delete().to(delete_category))
        .route("/api/admin/users", web::get().to(list_users))
        .route("/api/admin/users/{id}/roles", web::put().to(update_user_roles))
        .route("/api/admin/stats", web::get().to(get_stats))
        .route("/api/admin/appearance", web::put().to(update_appearance))
        .route("/api/admin/import", web::post().to(import_tools))
        .route("/api/admin/export", web::get().to(export_tools));
}
