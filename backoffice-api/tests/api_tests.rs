/// Router-level tests for the back office API
///
/// Tests without `#[ignore]` run against a pool that never connects and
/// only exercise paths that answer before touching the database. The
/// ignored tests need PostgreSQL (DATABASE_URL):
/// cargo test -p backoffice-api --test api_tests -- --ignored --test-threads=1

mod common;

use axum::http::StatusCode;
use backoffice_shared::{
    auth::jwt::{create_token, Claims, TokenType},
    broadcast,
};
use common::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

/// Money fields serialize as strings; accepts numbers too
fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

fn unique_code() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let (app, _) = offline_app();

    let response = send(&app, get_request("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (app, _) = offline_app();

    for uri in [
        "/v1/users",
        "/v1/dashboard",
        "/v1/guest-inquiries",
        "/v1/finance/invoices/export",
        "/v1/ai/conversations",
        "/v1/system/integrations",
    ] {
        let response = send(&app, get_request(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_invalid_and_refresh_tokens_rejected() {
    let (app, config) = offline_app();

    let response = send(&app, get_request("/v1/auth/me", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let refresh = create_token(
        &Claims::new(Uuid::new_v4(), TokenType::Refresh),
        &config.jwt.secret,
    )
    .unwrap();
    let response = send(&app, get_request("/v1/auth/me", Some(&refresh))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let foreign = access_token(Uuid::new_v4(), "some-other-secret-that-is-long-enough");
    let response = send(&app, get_request("/v1/auth/me", Some(&foreign))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_inquiry_validation() {
    let (app, _) = offline_app();

    let mut request = json_request(
        "POST",
        "/v1/public/inquiries",
        None,
        json!({
            "name": "",
            "email": "not-an-email",
            "subject": "Opening hours",
            "message": "Are you open on Sundays?"
        }),
    );
    request.headers_mut().insert(
        "x-forwarded-for",
        format!("198.51.100.{}", Uuid::new_v4().as_u128() % 250).parse().unwrap(),
    );

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"email"));
}

#[tokio::test]
async fn test_broadcast_rejects_malformed_socket_id() {
    let (app, config) = offline_app();
    let user_id = Uuid::new_v4();
    let token = access_token(user_id, &config.jwt.secret);

    let response = send(
        &app,
        json_request(
            "POST",
            "/v1/broadcasting/auth",
            Some(&token),
            json!({
                "socket_id": "abc",
                "channel_name": format!("private-user.{}", user_id)
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_broadcast_channel_access() {
    let (app, config) = offline_app();
    let user_id = Uuid::new_v4();
    let token = access_token(user_id, &config.jwt.secret);

    let request = |channel: String| {
        json_request(
            "POST",
            "/v1/broadcasting/auth",
            Some(&token),
            json!({ "socket_id": "1234.5678", "channel_name": channel }),
        )
    };

    let foreign = send(&app, request(format!("private-user.{}", Uuid::new_v4()))).await;
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let unknown = send(&app, request("public-news".to_string())).await;
    assert_eq!(unknown.status(), StatusCode::FORBIDDEN);

    // Only the canonical spelling of the caller's own channel is signed
    let shouting = format!("private-user.{}", user_id.to_string().to_uppercase());
    let response = send(&app, request(shouting)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_broadcast_signs_own_channel_for_active_users_only() {
    let ctx = TestContext::new().await.unwrap();
    let channel = format!("private-user.{}", ctx.admin.id);
    let request = || {
        json_request(
            "POST",
            "/v1/broadcasting/auth",
            Some(&ctx.token),
            json!({ "socket_id": "1234.5678", "channel_name": channel }),
        )
    };

    let response = send(&ctx.app, request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let expected = broadcast::sign(
        &ctx.config.broadcast.app_key,
        &ctx.config.broadcast.app_secret,
        "1234.5678",
        &channel,
        None,
    );
    assert_eq!(body["auth"], expected);
    assert!(body.get("channel_data").map_or(true, |v| v.is_null()));

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(ctx.admin.id)
        .execute(&ctx.db)
        .await
        .unwrap();

    let response = send(&ctx.app, request()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&ctx.app, get_request("/v1/ai/conversations", Some(&ctx.token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_inquiry_submit_list_and_export() {
    let ctx = TestContext::new().await.unwrap();
    let subject = format!("Catering {}", Uuid::new_v4());

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/public/inquiries",
            None,
            json!({
                "name": "Grace Hopper",
                "email": "grace@example.com",
                "subject": subject,
                "message": "Do you cater for 40 people?"
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &ctx.app,
        get_request(
            &format!("/v1/guest-inquiries?status=new&search={}", subject.replace(' ', "%20")),
            Some(&ctx.token),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["subject"], subject.as_str());

    let response = send(
        &ctx.app,
        get_request("/v1/guest-inquiries/export?status=new", Some(&ctx.token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"guest-inquiries-"));

    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(csv.starts_with("ID,Name"));
    assert!(csv.contains(&subject));

    sqlx::query("DELETE FROM guest_inquiries WHERE subject = $1")
        .bind(&subject)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_me_lists_admin_permissions() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(&ctx.app, get_request("/v1/auth/me", Some(&ctx.token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["email"], ctx.admin.email.as_str());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_user_without_roles_is_forbidden() {
    let ctx = TestContext::new().await.unwrap();
    let stranger = access_token(Uuid::new_v4(), &ctx.config.jwt.secret);

    let response = send(&ctx.app, get_request("/v1/dashboard", Some(&stranger))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&ctx.app, get_request("/v1/dashboard", Some(&ctx.token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_conversation_scoped_to_owner() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/ai/conversations",
            Some(&ctx.token),
            json!({ "title": "Menu ideas" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            &format!("/v1/ai/conversations/{}/messages", id),
            Some(&ctx.token),
            json!({ "content": "Suggest a spring menu" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["role"], "user");

    let other = TestContext::new().await.unwrap();
    let response = send(
        &other.app,
        get_request(&format!("/v1/ai/conversations/{}", id), Some(&other.token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &ctx.app,
        get_request(&format!("/v1/ai/conversations/{}", id), Some(&ctx.token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["messages"].as_array().unwrap().len(), 1);

    other.cleanup().await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_user_delete_guards() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(
        &ctx.app,
        json_request("DELETE", &format!("/v1/users/{}", ctx.admin.id), Some(&ctx.token), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // A non-admin who may delete users, facing the only active admin
    let role_id: Uuid = sqlx::query_scalar("INSERT INTO roles (name) VALUES ($1) RETURNING id")
        .bind(format!("user-managers-{}", unique_code()))
        .fetch_one(&ctx.db)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO role_permissions (role_id, permission_id) \
         SELECT $1, id FROM permissions WHERE name = 'delete users'",
    )
    .bind(role_id)
    .execute(&ctx.db)
    .await
    .unwrap();
    let manager_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, name) VALUES ($1, 'unused', 'Manager') RETURNING id",
    )
    .bind(format!("manager-{}@example.com", unique_code()))
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
        .bind(manager_id)
        .bind(role_id)
        .execute(&ctx.db)
        .await
        .unwrap();

    let other_admins: Vec<Uuid> = sqlx::query_scalar(
        "UPDATE users SET is_active = FALSE \
         WHERE is_active AND id <> $1 AND id IN ( \
             SELECT ur.user_id FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE r.name = 'admin') \
         RETURNING id",
    )
    .bind(ctx.admin.id)
    .fetch_all(&ctx.db)
    .await
    .unwrap();

    let manager_token = access_token(manager_id, &ctx.config.jwt.secret);
    let response = send(
        &ctx.app,
        json_request("DELETE", &format!("/v1/users/{}", ctx.admin.id), Some(&manager_token), json!({})),
    )
    .await;
    let status = response.status();

    sqlx::query("UPDATE users SET is_active = TRUE WHERE id = ANY($1)")
        .bind(&other_admins)
        .execute(&ctx.db)
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CONFLICT);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(manager_id)
        .execute(&ctx.db)
        .await
        .unwrap();
    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(role_id)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

async fn create_asset_account(ctx: &TestContext) -> String {
    let code = unique_code();
    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/finance/accounts",
            Some(&ctx.token),
            json!({ "code": code, "name": format!("Bank {}", code), "account_type": "asset" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn post_transaction(
    ctx: &TestContext,
    account_id: &str,
    amount: &str,
    direction: &str,
    date: &str,
) -> String {
    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/finance/transactions",
            Some(&ctx.token),
            json!({
                "account_id": account_id,
                "transaction_date": date,
                "description": format!("{} {}", direction, amount),
                "amount": amount,
                "direction": direction
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn account_balance(ctx: &TestContext, account_id: &str) -> Decimal {
    let response = send(
        &ctx.app,
        get_request(&format!("/v1/finance/accounts/{}", account_id), Some(&ctx.token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    decimal(&body_json(response).await["balance"])
}

async fn drop_account(ctx: &TestContext, account_id: &str) {
    let id: Uuid = account_id.parse().unwrap();
    sqlx::query("DELETE FROM bank_statements WHERE account_id = $1")
        .bind(id)
        .execute(&ctx.db)
        .await
        .unwrap();
    sqlx::query("DELETE FROM transactions WHERE account_id = $1")
        .bind(id)
        .execute(&ctx.db)
        .await
        .unwrap();
    sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(&ctx.db)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_transaction_balance_effect_and_reversal() {
    let ctx = TestContext::new().await.unwrap();
    let account_id = create_asset_account(&ctx).await;

    let deposit = post_transaction(&ctx, &account_id, "100.00", "debit", "2026-01-15").await;
    assert_eq!(account_balance(&ctx, &account_id).await, Decimal::new(100, 0));

    post_transaction(&ctx, &account_id, "30.50", "credit", "2026-01-16").await;
    assert_eq!(account_balance(&ctx, &account_id).await, Decimal::new(6950, 2));

    let response = send(
        &ctx.app,
        json_request(
            "DELETE",
            &format!("/v1/finance/transactions/{}", deposit),
            Some(&ctx.token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(account_balance(&ctx, &account_id).await, Decimal::new(-3050, 2));

    drop_account(&ctx, &account_id).await;
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_invoice_lifecycle_freezes_after_sending() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/finance/invoices",
            Some(&ctx.token),
            json!({
                "customer_name": "Acme Catering",
                "issue_date": "2026-03-14",
                "due_date": "2026-04-13",
                "tax_rate": "10",
                "items": [{ "description": "Buffet", "quantity": "2", "unit_price": "50" }]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "draft");
    assert!(body["number"].as_str().unwrap().starts_with("INV-202603-"));
    assert_eq!(decimal(&body["total"]), Decimal::new(110, 0));

    let transition = |status: &str| {
        json_request(
            "POST",
            &format!("/v1/finance/invoices/{}/status", id),
            Some(&ctx.token),
            json!({ "status": status }),
        )
    };

    let response = send(&ctx.app, transition("paid")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&ctx.app, transition("sent")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "sent");

    let response = send(
        &ctx.app,
        json_request(
            "PUT",
            &format!("/v1/finance/invoices/{}", id),
            Some(&ctx.token),
            json!({ "customer_name": "Someone Else" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id.parse::<Uuid>().unwrap())
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_invoice_with_oversized_line_is_rejected() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/finance/invoices",
            Some(&ctx.token),
            json!({
                "customer_name": "Acme Catering",
                "issue_date": "2026-03-14",
                "due_date": "2026-04-13",
                "items": [{
                    "description": "Everything",
                    "quantity": Decimal::MAX.to_string(),
                    "unit_price": "2"
                }]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["details"][0]["field"], "items");

    ctx.cleanup().await.unwrap();
}

async fn open_reconciliation(ctx: &TestContext, account_id: &str) -> String {
    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/finance/reconciliations",
            Some(&ctx.token),
            json!({
                "account_id": account_id,
                "period_start": "2026-01-01",
                "period_end": "2026-01-31",
                "opening_balance": "0",
                "closing_balance": "100"
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["reconciliation"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_reconciliation_matching_and_completion() {
    let ctx = TestContext::new().await.unwrap();
    let account_id = create_asset_account(&ctx).await;
    let deposit = post_transaction(&ctx, &account_id, "100", "debit", "2026-01-15").await;
    let reconciliation = open_reconciliation(&ctx, &account_id).await;
    let uri = |action: &str| format!("/v1/finance/reconciliations/{}/{}", reconciliation, action);

    let response = send(&ctx.app, json_request("POST", &uri("complete"), Some(&ctx.token), json!({}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &ctx.app,
        json_request("POST", &uri("match"), Some(&ctx.token), json!({ "transaction_ids": [deposit] })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(decimal(&body["reconciliation"]["difference"]).is_zero());

    // The same transaction cannot be matched twice
    let second = open_reconciliation(&ctx, &account_id).await;
    let response = send(
        &ctx.app,
        json_request(
            "POST",
            &format!("/v1/finance/reconciliations/{}/match", second),
            Some(&ctx.token),
            json!({ "transaction_ids": [deposit] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Deleting a matched transaction rebalances the open reconciliation
    let response = send(
        &ctx.app,
        json_request(
            "DELETE",
            &format!("/v1/finance/transactions/{}", deposit),
            Some(&ctx.token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &ctx.app,
        get_request(&format!("/v1/finance/reconciliations/{}", reconciliation), Some(&ctx.token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["matched"].as_array().unwrap().is_empty());
    assert!(decimal(&body["reconciliation"]["reconciled_balance"]).is_zero());
    assert_eq!(decimal(&body["reconciliation"]["difference"]), Decimal::new(100, 0));

    let response = send(&ctx.app, json_request("POST", &uri("complete"), Some(&ctx.token), json!({}))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    drop_account(&ctx, &account_id).await;
    ctx.cleanup().await.unwrap();
}

async fn create_menu_item(ctx: &TestContext, menu_id: &str, label: &str) -> String {
    let response = send(
        &ctx.app,
        json_request(
            "POST",
            &format!("/v1/menus/{}/items", menu_id),
            Some(&ctx.token),
            json!({ "label": label, "url": format!("/{}", label.to_lowercase()) }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_menu_items_cannot_form_a_cycle() {
    let ctx = TestContext::new().await.unwrap();

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            "/v1/menus",
            Some(&ctx.token),
            json!({ "name": "Header", "location": format!("header-{}", unique_code()) }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let menu_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let about = create_menu_item(&ctx, &menu_id, "About").await;
    let team = create_menu_item(&ctx, &menu_id, "Team").await;

    let response = send(
        &ctx.app,
        json_request(
            "POST",
            &format!("/v1/menus/{}/reorder", menu_id),
            Some(&ctx.token),
            json!([
                { "id": about, "parent_id": team, "position": 0 },
                { "id": team, "parent_id": about, "position": 0 }
            ]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Two opposite re-parentings racing: exactly one may win
    let nest = |id: &str, parent: &str| {
        json_request(
            "PUT",
            &format!("/v1/menu-items/{}", id),
            Some(&ctx.token),
            json!({ "parent_id": parent }),
        )
    };
    let (first, second) = tokio::join!(
        send(&ctx.app, nest(&about, &team)),
        send(&ctx.app, nest(&team, &about)),
    );
    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY]);

    let response = send(
        &ctx.app,
        json_request("DELETE", &format!("/v1/menus/{}", menu_id), Some(&ctx.token), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    ctx.cleanup().await.unwrap();
}
