use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, PDF_MAGIC};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- accounts ---

#[tokio::test]
async fn list_accounts_empty() {
    let resp = app().oneshot(empty_request("GET", "/accounts")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!([]));
}

#[tokio::test]
async fn create_account_missing_fields_returns_field_errors() {
    let resp = app()
        .oneshot(json_request("POST", "/accounts", r#"{"company_id":5,"bank_code":"341"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["errors"]["agency"], "The agency field is required.");
    assert_eq!(body["errors"]["account"], "The account field is required.");
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn get_account_not_found_returns_message() {
    let resp = app()
        .oneshot(empty_request("GET", "/accounts/42?company_id=5"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await, json!({"message": "account not found"}));
}

#[tokio::test]
async fn get_account_bad_id_returns_400() {
    let resp = app()
        .oneshot(empty_request("GET", "/accounts/not-a-number"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agreements_of_unknown_account_return_404() {
    let resp = app()
        .oneshot(empty_request("GET", "/accounts/9/convenants"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- billing documents ---

#[tokio::test]
async fn issue_documents_reports_row_positions() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/plugboleto",
            r#"{"company_id":5,"documents":[{"value":10,"due_date":"2030-01-01"},{}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(
        body["errors"]["documents.1.position"],
        json!(["The value field is required.", "The due_date field is required."])
    );
}

#[tokio::test]
async fn print_without_installments_is_rejected() {
    let resp = app()
        .oneshot(empty_request("GET", "/plugboleto/print?company_id=5"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn remittance_requires_installments() {
    let resp = app()
        .oneshot(json_request("POST", "/plugboleto/remittance", r#"{"company_id":5,"installments":[]}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- full lifecycle ---

#[tokio::test]
async fn document_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create account
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/accounts",
            r#"{"company_id":5,"bank_code":"341","agency":"0001","account":"12345"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let account = body_json(resp).await;
    let account_id = account["id"].as_u64().unwrap();

    // create agreement
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            &format!("/accounts/{account_id}/convenants"),
            r#"{"company_id":5,"number":"999"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let agreement = body_json(resp).await;
    assert_eq!(agreement["account_id"], account_id);

    // issue two documents
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/plugboleto",
            r#"{"company_id":5,"documents":[{"value":10,"due_date":"2030-01-01"},{"value":20,"due_date":"2030-02-01"}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let issued = body_json(resp).await;
    let ids: Vec<u64> = issued["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(issued["documents"][0]["status"], "SALVO");

    // print
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request(
            "GET",
            &format!("/plugboleto/print?company_id=5&installments={},{}", ids[0], ids[1]),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/pdf");
    let pdf = body_bytes(resp).await;
    assert!(pdf.starts_with(PDF_MAGIC));

    // discard the first
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request(
            "DELETE",
            &format!("/plugboleto?company_id=5&installments={}", ids[0]),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // get the discarded document
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/installments/{}?company_id=5", ids[0])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "DESCARTADO");

    // another company cannot see it
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/installments/{}?company_id=6", ids[0])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // delete account removes its agreements
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/accounts/{account_id}?company_id=5")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/accounts"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await, json!([]));
}
