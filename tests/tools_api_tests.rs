use actix_web::{test, web, App};
use serde_json::json;
use std::sync::Arc;

use tool_directory::api::{self, AppState};
use tool_directory::auth::AuthService;
use tool_directory::import::UnknownCategoryPolicy;
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

/// Helper macro to register a user and get (token, user id)
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

fn add_tool(store: &Store, owner_id: i64, name: &str, description: &str, categories: &[i64], approved: bool) -> i64 {
    let new_tool = NewTool {
        name: name.to_string(),
        description: description.to_string(),
        url: format!("https://{}.example.com", name.to_lowercase()),
        image_url: None,
        youtube_url: None,
        category_ids: categories.to_vec(),
        resources: Vec::new(),
        is_approved: approved,
    };
    store.create_tool(owner_id, &new_tool).unwrap().id
}

fn names(resp: &serde_json::Value) -> Vec<String> {
    resp["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

// ==================== Submission Tests ====================

#[actix_web::test]
async fn test_submit_tool_is_pending() {
    let (store, app) = init_app!();
    let (token, user_id) = register_user!(app, "submitter");
    let chat = store.create_category("Chat", "").unwrap();

    let req = test::TestRequest::post()
        .uri("/api/tools")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({
            "name": "ChatGPT",
            "description": "<p>Talks back</p><script>alert('x')</script>",
            "url": "https://chat.openai.com",
            "categories": [chat.id],
            "resources": [{ "title": "Docs", "url": "https://platform.openai.com/docs" }]
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["is_approved"], false);
    assert_eq!(body["data"]["user_id"], user_id);
    assert_eq!(body["data"]["author"], "submitter");
    assert_eq!(body["data"]["description"], "<p>Talks back</p>");
    assert_eq!(body["data"]["categories"][0]["name"], "Chat");
    assert_eq!(body["data"]["resources"][0]["title"], "Docs");
    assert_eq!(body["data"]["vote_count"], 0);
}

#[actix_web::test]
async fn test_submit_tool_requires_auth_and_categories() {
    let (store, app) = init_app!();
    let (token, _) = register_user!(app, "submitter");
    let chat = store.create_category("Chat", "").unwrap();

    let req = test::TestRequest::post()
        .uri("/api/tools")
        .set_json(json!({
            "name": "Anon",
            "description": "d",
            "url": "https://anon.example.com",
            "categories": [chat.id]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    for categories in [json!([]), json!([chat.id, 4242])] {
        let req = test::TestRequest::post()
            .uri("/api/tools")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({
                "name": "Bad",
                "description": "d",
                "url": "https://bad.example.com",
                "categories": categories
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    assert!(store.list_all_tools().unwrap().is_empty());
}

// ==================== Visibility Tests ====================

#[actix_web::test]
async fn test_unapproved_detail_denied_to_anonymous_but_not_owner() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let (stranger_token, _) = register_user!(app, "stranger");
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", "waiting", &[chat.id], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools/{}", pending))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools/{}", pending))
        .insert_header(("Authorization", format!("Bearer {}", stranger_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools/{}", pending))
        .insert_header(("Authorization", format!("Bearer {}", owner_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["name"], "Pending");
}

#[actix_web::test]
async fn test_moderator_sees_pending_detail() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let (mod_token, mod_id) = register_user!(app, "moderator");
    store.set_user_roles(mod_id, Some(true), None).unwrap();
    let chat = store.create_category("Chat", "").unwrap();
    let pending = add_tool(&store, owner_id, "Pending", "waiting", &[chat.id], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools/{}", pending))
        .insert_header(("Authorization", format!("Bearer {}", mod_token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_public_listing_excludes_pending_even_for_owner() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    add_tool(&store, owner_id, "Live", "approved", &[chat.id], true);
    add_tool(&store, owner_id, "Pending", "waiting", &[chat.id], false);

    let req = test::TestRequest::get()
        .uri("/api/tools")
        .insert_header(("Authorization", format!("Bearer {}", owner_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Live"]);
}

#[actix_web::test]
async fn test_my_tools_lists_own_submissions_newest_first() {
    let (store, app) = init_app!();
    let (owner_token, owner_id) = register_user!(app, "owner");
    let (other_token, other_id) = register_user!(app, "other");
    let chat = store.create_category("Chat", "").unwrap();
    add_tool(&store, owner_id, "Live", "approved", &[chat.id], true);
    add_tool(&store, owner_id, "Pending", "waiting", &[chat.id], false);
    add_tool(&store, other_id, "Elsewhere", "not mine", &[chat.id], true);

    let req = test::TestRequest::get()
        .uri("/api/me/tools")
        .insert_header(("Authorization", format!("Bearer {}", owner_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Pending", "Live"]);

    let req = test::TestRequest::get()
        .uri("/api/me/tools")
        .insert_header(("Authorization", format!("Bearer {}", other_token)))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Elsewhere"]);

    let req = test::TestRequest::get().uri("/api/me/tools").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

// ==================== Search & Filter Tests ====================

#[actix_web::test]
async fn test_search_is_case_insensitive_substring() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    add_tool(&store, owner_id, "ChatGPT", "OpenAI assistant", &[chat.id], true);
    add_tool(&store, owner_id, "Claude", "Anthropic assistant", &[chat.id], true);

    let req = test::TestRequest::get().uri("/api/tools?search=gpt").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["ChatGPT"]);

    // Description matches too
    let req = test::TestRequest::get().uri("/api/tools?search=ANTHROPIC").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Claude"]);

    // Blank search is no search
    let req = test::TestRequest::get().uri("/api/tools?search=%20%20").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp).len(), 2);
}

#[actix_web::test]
async fn test_category_filter_is_membership() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    let image = store.create_category("Image", "").unwrap();
    add_tool(&store, owner_id, "ChatGPT", "chat", &[chat.id], true);
    add_tool(&store, owner_id, "Midjourney", "images", &[image.id], true);
    add_tool(&store, owner_id, "Gemini", "both", &[chat.id, image.id], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools?category={}", image.id))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Midjourney", "Gemini"]);

    // Search matches ChatGPT, but it is not in Image
    let req = test::TestRequest::get()
        .uri(&format!("/api/tools?category={}&search=chatgpt", image.id))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert!(names(&resp).is_empty());

    // Empty category parameter means all
    let req = test::TestRequest::get().uri("/api/tools?category=").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp).len(), 3);

    let req = test::TestRequest::get().uri("/api/tools?category=abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_sort_by_votes_and_date() {
    let (store, app) = init_app!();
    let (voter_token, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    let older = add_tool(&store, owner_id, "Older", "first", &[chat.id], true);
    add_tool(&store, owner_id, "Newer", "second", &[chat.id], true);

    let req = test::TestRequest::post()
        .uri(&format!("/api/tools/{}/vote", older))
        .insert_header(("Authorization", format!("Bearer {}", voter_token)))
        .set_json(json!({ "value": 1 }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/tools").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Older", "Newer"]);
    assert_eq!(resp["data"][0]["vote_count"], 1);

    let req = test::TestRequest::get().uri("/api/tools?sort=date").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["Newer", "Older"]);
}

#[actix_web::test]
async fn test_category_tools_route() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "Conversational").unwrap();
    add_tool(&store, owner_id, "ChatGPT", "chat", &[chat.id], true);
    add_tool(&store, owner_id, "Hidden", "pending", &[chat.id], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/categories/{}/tools", chat.id))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"]["category"]["name"], "Chat");
    assert_eq!(resp["data"]["tools"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/categories/999/tools").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::get().uri("/api/categories").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["data"][0]["description"], "Conversational");
}

// ==================== Similar Tools Tests ====================

#[actix_web::test]
async fn test_similar_tools_ranked_by_overlap() {
    let (store, app) = init_app!();
    let (_, owner_id) = register_user!(app, "owner");
    let chat = store.create_category("Chat", "").unwrap();
    let code = store.create_category("Code", "").unwrap();
    let image = store.create_category("Image", "").unwrap();

    let base = add_tool(&store, owner_id, "Base", "both", &[chat.id, code.id], true);
    add_tool(&store, owner_id, "OneShared", "chat", &[chat.id], true);
    add_tool(&store, owner_id, "TwoShared", "chat+code", &[chat.id, code.id], true);
    add_tool(&store, owner_id, "Unrelated", "image", &[image.id], true);
    add_tool(&store, owner_id, "PendingTwin", "chat+code", &[chat.id, code.id], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/tools/{}/similar", base))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(names(&resp), vec!["TwoShared", "OneShared"]);
}
