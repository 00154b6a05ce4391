mod common;

use reqwest::header::AUTHORIZATION;
use serde_json::{json, Value};

use common::*;

const NO_UPSTREAM: &str = "http://127.0.0.1:9/api/v2/";

async fn affiliation_id(srv: &TestServer, category: &str) -> i64 {
    let resp = srv.client.get(srv.url(&format!("/api/v1/affiliations/{}/", category))).send().await.unwrap();
    assert_eq!(resp.status(), 200, "lookup {category}");
    let v: Value = resp.json().await.unwrap();
    v["id"].as_i64().unwrap()
}

async fn edit(srv: &TestServer, token: &str, body: Value) -> reqwest::Response {
    srv.client.put(srv.url("/api/v1/profile/edit_profile/"))
        .header(AUTHORIZATION, token_header(token))
        .json(&body)
        .send().await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_users_get_an_empty_profile() {
    let srv = start_server(NO_UPSTREAM).await;
    let token = register(&srv, "wes@example.com", "pw").await;
    let resp = srv.client.get(srv.url("/api/v1/profile/"))
        .header(AUTHORIZATION, token_header(&token))
        .send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert!(v["id"].as_i64().is_some());
    assert_eq!(v["display_name"], Value::Null);
    assert_eq!(v["affiliations"], json!([]));

    let resp = srv.client.get(srv.url("/api/v1/profile/")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn editing_affiliations_replaces_the_set() {
    let srv = start_server(NO_UPSTREAM).await;
    let token = register(&srv, "xia@example.com", "pw").await;
    let a = affiliation_id(&srv, "green party").await;
    let b = affiliation_id(&srv, "libertarian party").await;
    let c = affiliation_id(&srv, "reform party").await;

    let resp = edit(&srv, &token, json!({"affiliations": [a, b]})).await;
    assert_eq!(resp.status(), 200);

    let resp = edit(&srv, &token, json!({"display_name": "Xia", "affiliations": [c]})).await;
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["display_name"], "Xia");
    assert_eq!(v["affiliations"], json!([{"id": c, "category": "Reform Party"}]));

    // an empty list leaves the set alone
    let resp = edit(&srv, &token, json!({"affiliations": []})).await;
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["affiliations"].as_array().unwrap().len(), 1);

    let resp = srv.client.get(srv.url("/api/v1/profile/display_name/"))
        .header(AUTHORIZATION, token_header(&token))
        .send().await.unwrap();
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"display_name": "Xia"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_edits_write_nothing() {
    let srv = start_server(NO_UPSTREAM).await;
    let token = register(&srv, "yan@example.com", "pw").await;
    edit(&srv, &token, json!({"display_name": "Yannick"})).await;

    let resp = edit(&srv, &token, json!({"display_name": "Yo", "affiliations": [99999]})).await;
    assert_eq!(resp.status(), 400);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["display_name"], json!(["Ensure this field has at least 3 characters."]));
    assert_eq!(v["affiliations"], json!(["Invalid pk \"99999\" - object does not exist."]));

    let resp = edit(&srv, &token, json!({"display_name": "x".repeat(51)})).await;
    assert_eq!(resp.status(), 400);

    let resp = srv.client.get(srv.url("/api/v1/profile/display_name/"))
        .header(AUTHORIZATION, token_header(&token))
        .send().await.unwrap();
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["display_name"], "Yannick");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn catalog_is_seeded_and_ordered() {
    let srv = start_server(NO_UPSTREAM).await;
    let resp = srv.client.get(srv.url("/api/v1/affiliations/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let rows: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(rows.len(), publiceye::storage::DEFAULT_AFFILIATIONS.len());
    assert_eq!(rows[0], json!({"id": 1, "category": "Democratic Party"}));
    let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seeding_can_be_disabled() {
    let srv = start_server_with(|c| c.seed_affiliations = false, NO_UPSTREAM).await;
    let rows: Vec<Value> = srv.client.get(srv.url("/api/v1/affiliations/")).send().await.unwrap().json().await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_affiliation_lookup_by_category() {
    let srv = start_server(NO_UPSTREAM).await;
    let resp = srv.client.get(srv.url("/api/v1/affiliations/GREEN PARTY/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["category"], "Green Party");

    let resp = srv.client.get(srv.url("/api/v1/affiliations/no such party/")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"detail": "Not found."}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn creating_affiliations_requires_staff() {
    let srv = start_server_with(|c| c.admin_path = Some("make-admin".into()), NO_UPSTREAM).await;

    let resp = srv.client.post(srv.url("/api/v1/affiliations/tea party/")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let plain = register(&srv, "zed@example.com", "pw").await;
    let resp = srv.client.post(srv.url("/api/v1/affiliations/tea party/"))
        .header(AUTHORIZATION, token_header(&plain))
        .send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = srv.client.post(srv.url("/api/v1/users/make-admin/"))
        .json(&json!({"email": "boss@example.com", "password": "pw"}))
        .send().await.unwrap();
    let v: Value = resp.json().await.unwrap();
    let admin = v["token"].as_str().unwrap().to_string();

    let resp = srv.client.post(srv.url("/api/v1/affiliations/tea party/"))
        .header(AUTHORIZATION, token_header(&admin))
        .send().await.unwrap();
    assert_eq!(resp.status(), 201);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["category"], "Tea Party");

    let resp = srv.client.post(srv.url("/api/v1/affiliations/TEA PARTY/"))
        .header(AUTHORIZATION, token_header(&admin))
        .send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v, json!({"category": ["affiliation with this category already exists."]}));
}
