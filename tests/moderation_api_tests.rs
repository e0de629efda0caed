use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use tool_directory::api::{self, AppState};
use tool_directory::auth::AuthService;
use tool_directory::import::UnknownCategoryPolicy;
use tool_directory::models::VoteTarget;
use tool_directory::store::{NewTool, Store};

macro_rules! init_app {
    () => {{
        let store = Arc::new(Store::new(":memory:").unwrap());
        let auth_service = Arc::new(AuthService::new("test_secret".to_string()));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store.clone()))
                .app_data(web::Data::new(auth_service.clone()))
                .app_data(web::Data::new(AppState {
                    store: store.clone(),
                    auth_service: auth_service.clone(),
                    import_policy: UnknownCategoryPolicy::Skip,
                }))
                .configure(api::configure_routes),
        )
        .await;
        (store, app)
    }};
}

macro_rules! register_user {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "password123"
            }))
            .to_request();

        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        (
            resp["data"]["token"].as_str().unwrap().to_string(),
            resp["data"]["user"]["id"].as_i64().unwrap(),
        )
    }};
}

fn add_tool(store: &Store, owner_id: i64, name: &str, category_id: i64, approved: bool) -> i64 {
    let new_tool = NewTool {
        name: name.to_string(),
        description: format!("{} description", name),
        url: "https://example.com".to_string(),
        image_url: None,
        youtube_url: None,
        category_ids: vec![category_id],
        resources: Vec::new(),
        is_approved: approved,
    };
    store.create_tool(owner_id, &new_tool).unwrap().id
}

// ==================== Queue Tests ====================

#[actix_web::test]
async fn test_pending_queue_for_moderators_only() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    add_tool(&store, owner_id, "Pending", chat.id, false);
    add_tool(&store, owner_id, "Live", chat.id, true);

    let req = test::TestRequest::get()
        .uri("/api/moderation/tools")
        .insert_header(("Authorization", format!("Bearer {}", owner_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get().uri("/api/moderation/tools").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/api/moderation/tools")
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let queue = resp["data"].as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["name"], "Pending");
}

#[actix_web::test]
async fn test_all_tools_for_moderators() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    add_tool(&store, owner_id, "Live", chat.id, true);
    add_tool(&store, owner_id, "Pending", chat.id, false);

    let req = test::TestRequest::get()
        .uri("/api/moderation/tools/all")
        .insert_header(("Authorization", format!("Bearer {}", owner_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri("/api/moderation/tools/all")
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let tools = resp["data"].as_array().unwrap();
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["name"], "Pending");
    assert_eq!(tools[1]["name"], "Live");
}

// ==================== Approve / Reject Tests ====================

#[actix_web::test]
async fn test_non_moderator_cannot_approve_or_reject() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", chat.id, false);

    for action in ["approve", "reject"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/moderation/tools/{}/{}", pending, action))
            .insert_header(("Authorization", format!("Bearer {}", owner_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    let tool = store.get_tool(pending).unwrap();
    assert!(!tool.is_approved);
}

#[actix_web::test]
async fn test_approve_makes_tool_public() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", chat.id, false);

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/tools/{}/approve", pending))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["is_approved"], true);

    let req = test::TestRequest::get().uri(&format!("/api/tools/{}", pending)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // Approving again is not a valid transition
    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/tools/{}/approve", pending))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_reject_removes_tool_and_dependents() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", chat.id, false);
    let comment = store.create_comment(pending, owner_id, "self note").unwrap();
    store.cast_vote(VoteTarget::Tool, pending, owner_id, 1).unwrap();
    store.cast_vote(VoteTarget::Comment, comment.id, owner_id, 1).unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/tools/{}/reject", pending))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    assert!(store.get_tool(pending).is_err());
    assert!(store.get_comment(comment.id).is_err());
    assert!(store.list_votes(VoteTarget::Tool, pending).unwrap().is_empty());
    assert!(store.list_votes(VoteTarget::Comment, comment.id).unwrap().is_empty());

    // Category is no longer referenced, so it can go
    store.delete_category(chat.id).unwrap();
}

#[actix_web::test]
async fn test_reject_on_approved_tool_refused() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let live = add_tool(&store, owner_id, "Live", chat.id, true);

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/tools/{}/reject", live))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(store.get_tool(live).unwrap().is_approved);

    let req = test::TestRequest::post()
        .uri("/api/moderation/tools/9999/approve")
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

// ==================== Admin Removal Tests ====================

#[actix_web::test]
async fn test_only_admin_removes_approved_tool() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    let (admin_token, admin_id) = register_user!(app, "admin");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    store.set_user_roles(admin_id, None, Some(true)).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let live = add_tool(&store, owner_id, "Live", chat.id, true);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/tools/{}", live))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/tools/{}", live))
        .insert_header(("Authorization", format!("Bearer {}", admin_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    let req = test::TestRequest::get().uri(&format!("/api/tools/{}", live)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_role_revocation_applies_to_existing_token() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", chat.id, false);

    store.set_user_roles(mod_id, Some(false), None).unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/moderation/tools/{}/approve", pending))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}
