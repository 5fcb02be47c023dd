//! In-memory imitation of the PlugBoleto HTTP API.
//!
//! Serves accounts, agreements and billing documents from a shared `Store`
//! and answers rejections in the two shapes the client normalizes:
//! `{"message": ...}` and `{"errors": {...}}`. Used by the client's
//! integration tests and for local experimentation.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};

pub const PDF_MAGIC: &[u8] = b"%PDF-1.4\n";

#[derive(Debug, Default)]
pub struct Store {
    next_id: u64,
    accounts: BTreeMap<u64, Value>,
    agreements: BTreeMap<u64, Value>,
    documents: BTreeMap<u64, Value>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error responses in the two shapes the real service uses.
#[derive(Debug)]
pub enum ServiceError {
    Message(StatusCode, String),
    Fields(Map<String, Value>),
}

impl ServiceError {
    fn not_found(what: &str) -> Self {
        ServiceError::Message(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    fn field(name: &str, message: &str) -> Self {
        let mut errors = Map::new();
        errors.insert(name.to_string(), Value::from(message));
        ServiceError::Fields(errors)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Message(status, message) => {
                warn!(%status, %message, "request rejected");
                (status, Json(json!({ "message": message }))).into_response()
            }
            ServiceError::Fields(errors) => {
                warn!(fields = errors.len(), "validation failed");
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": errors }))).into_response()
            }
        }
    }
}

type ServiceResult = Result<Json<Value>, ServiceError>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route(
            "/accounts/{id}",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route(
            "/accounts/{account_id}/convenants",
            get(list_agreements).post(create_agreement),
        )
        .route(
            "/accounts/{account_id}/convenants/{id}",
            get(get_agreement).put(update_agreement).delete(delete_agreement),
        )
        .route(
            "/plugboleto",
            post(issue_documents).put(update_documents).delete(discard_documents),
        )
        .route("/plugboleto/print", get(print_documents))
        .route("/plugboleto/remittance", post(generate_remittance))
        .route("/plugboleto/return", post(process_return))
        .route("/installments/{id}", get(get_document))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock plugboleto server listening");
    }
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn company_of(record: &Value) -> Option<u64> {
    record.get("company_id").and_then(Value::as_u64)
}

fn company_filter(query: &HashMap<String, String>) -> Option<u64> {
    query.get("company_id").and_then(|id| id.parse().ok())
}

/// Only records of the requested company are visible when a company filter
/// is present.
fn visible(record: &Value, company: Option<u64>) -> bool {
    company.is_none() || company_of(record) == company
}

fn require_object(body: Value) -> Result<Map<String, Value>, ServiceError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ServiceError::Message(
            StatusCode::BAD_REQUEST,
            "body must be a JSON object".to_string(),
        )),
    }
}

fn require_fields(body: &Map<String, Value>, fields: &[&str]) -> Result<(), ServiceError> {
    let mut errors = Map::new();
    for field in fields {
        if body.get(*field).map_or(true, Value::is_null) {
            errors.insert(
                field.to_string(),
                Value::from(format!("The {} field is required.", field.replace('_', " "))),
            );
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Fields(errors))
    }
}

fn merge(record: &mut Value, changes: Map<String, Value>) {
    if let Value::Object(fields) = record {
        for (key, value) in changes {
            if key != "id" {
                fields.insert(key, value);
            }
        }
    }
}

fn parse_ids(raw: Option<&String>) -> Result<Vec<u64>, ServiceError> {
    let raw = raw.ok_or_else(|| ServiceError::field("installments", "The installments field is required."))?;
    raw.split(',')
        .map(|id| id.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ServiceError::field("installments", "The installments must be a list of ids."))
}

fn ids_in(value: Option<&Value>) -> Vec<u64> {
    match value {
        Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_u64).collect(),
        Some(Value::String(ids)) => ids.split(',').filter_map(|id| id.trim().parse().ok()).collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

async fn list_accounts(
    State(db): State<Db>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let company = company_filter(&query);
    let store = db.read().await;
    Json(
        store
            .accounts
            .values()
            .filter(|account| visible(account, company))
            .cloned()
            .collect(),
    )
}

async fn create_account(State(db): State<Db>, Json(body): Json<Value>) -> ServiceResult {
    let mut body = require_object(body)?;
    require_fields(&body, &["company_id", "bank_code", "agency", "account"])?;
    let mut store = db.write().await;
    let id = store.next_id();
    body.insert("id".to_string(), Value::from(id));
    let account = Value::Object(body);
    store.accounts.insert(id, account.clone());
    Ok(Json(account))
}

async fn get_account(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
) -> ServiceResult {
    let store = db.read().await;
    store
        .accounts
        .get(&id)
        .filter(|account| visible(account, company_filter(&query)))
        .cloned()
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("account"))
}

async fn update_account(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> ServiceResult {
    let body = require_object(body)?;
    let mut store = db.write().await;
    let account = store
        .accounts
        .get_mut(&id)
        .filter(|account| company_of(account) == body.get("company_id").and_then(Value::as_u64))
        .ok_or_else(|| ServiceError::not_found("account"))?;
    merge(account, body);
    Ok(Json(account.clone()))
}

async fn delete_account(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
) -> ServiceResult {
    let mut store = db.write().await;
    let company = company_filter(&query);
    if !store.accounts.get(&id).is_some_and(|account| visible(account, company)) {
        return Err(ServiceError::not_found("account"));
    }
    store.accounts.remove(&id);
    store
        .agreements
        .retain(|_, agreement| agreement.get("account_id").and_then(Value::as_u64) != Some(id));
    Ok(Json(json!({ "id": id, "deleted": true })))
}

// ---------------------------------------------------------------------------
// Agreements
// ---------------------------------------------------------------------------

fn belongs_to(agreement: &Value, account_id: u64) -> bool {
    agreement.get("account_id").and_then(Value::as_u64) == Some(account_id)
}

async fn list_agreements(
    State(db): State<Db>,
    Path(account_id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, ServiceError> {
    let store = db.read().await;
    if !store.accounts.contains_key(&account_id) {
        return Err(ServiceError::not_found("account"));
    }
    let company = company_filter(&query);
    Ok(Json(
        store
            .agreements
            .values()
            .filter(|agreement| belongs_to(agreement, account_id) && visible(agreement, company))
            .cloned()
            .collect(),
    ))
}

async fn create_agreement(
    State(db): State<Db>,
    Path(account_id): Path<u64>,
    Json(body): Json<Value>,
) -> ServiceResult {
    let mut body = require_object(body)?;
    require_fields(&body, &["company_id", "number"])?;
    let mut store = db.write().await;
    if !store.accounts.contains_key(&account_id) {
        return Err(ServiceError::not_found("account"));
    }
    let id = store.next_id();
    body.insert("id".to_string(), Value::from(id));
    body.insert("account_id".to_string(), Value::from(account_id));
    let agreement = Value::Object(body);
    store.agreements.insert(id, agreement.clone());
    Ok(Json(agreement))
}

async fn get_agreement(
    State(db): State<Db>,
    Path((account_id, id)): Path<(u64, u64)>,
    Query(query): Query<HashMap<String, String>>,
) -> ServiceResult {
    let store = db.read().await;
    store
        .agreements
        .get(&id)
        .filter(|agreement| belongs_to(agreement, account_id))
        .filter(|agreement| visible(agreement, company_filter(&query)))
        .cloned()
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("agreement"))
}

async fn update_agreement(
    State(db): State<Db>,
    Path((account_id, id)): Path<(u64, u64)>,
    Json(body): Json<Value>,
) -> ServiceResult {
    let body = require_object(body)?;
    let mut store = db.write().await;
    let agreement = store
        .agreements
        .get_mut(&id)
        .filter(|agreement| belongs_to(agreement, account_id))
        .ok_or_else(|| ServiceError::not_found("agreement"))?;
    merge(agreement, body);
    Ok(Json(agreement.clone()))
}

async fn delete_agreement(
    State(db): State<Db>,
    Path((account_id, id)): Path<(u64, u64)>,
) -> ServiceResult {
    let mut store = db.write().await;
    if !store.agreements.get(&id).is_some_and(|a| belongs_to(a, account_id)) {
        return Err(ServiceError::not_found("agreement"));
    }
    store.agreements.remove(&id);
    Ok(Json(json!({ "id": id, "deleted": true })))
}

// ---------------------------------------------------------------------------
// Billing documents
// ---------------------------------------------------------------------------

/// Validate each batch row; failures are keyed by row position.
fn validate_rows(rows: &[Value], required: &[&str]) -> Result<(), ServiceError> {
    let mut errors = Map::new();
    for (index, row) in rows.iter().enumerate() {
        let missing: Vec<Value> = required
            .iter()
            .filter(|field| row.get(**field).map_or(true, Value::is_null))
            .map(|field| Value::from(format!("The {field} field is required.")))
            .collect();
        if !missing.is_empty() {
            errors.insert(format!("documents.{index}.position"), Value::Array(missing));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Fields(errors))
    }
}

fn batch_rows(body: &Map<String, Value>) -> Result<Vec<Value>, ServiceError> {
    match body.get("documents") {
        Some(Value::Array(rows)) if !rows.is_empty() => Ok(rows.clone()),
        _ => Err(ServiceError::field("documents", "The documents field is required.")),
    }
}

async fn issue_documents(State(db): State<Db>, Json(body): Json<Value>) -> ServiceResult {
    let body = require_object(body)?;
    require_fields(&body, &["company_id"])?;
    let rows = batch_rows(&body)?;
    validate_rows(&rows, &["value", "due_date"])?;

    let company_id = body.get("company_id").cloned().unwrap_or(Value::Null);
    let mut store = db.write().await;
    let mut issued = Vec::with_capacity(rows.len());
    for row in rows {
        let id = store.next_id();
        let mut document = row;
        merge(
            &mut document,
            Map::from_iter([
                ("company_id".to_string(), company_id.clone()),
                ("status".to_string(), Value::from("SALVO")),
            ]),
        );
        if let Value::Object(fields) = &mut document {
            fields.insert("id".to_string(), Value::from(id));
        }
        store.documents.insert(id, document.clone());
        issued.push(document);
    }
    Ok(Json(json!({ "documents": issued })))
}

async fn update_documents(State(db): State<Db>, Json(body): Json<Value>) -> ServiceResult {
    let body = require_object(body)?;
    require_fields(&body, &["company_id"])?;
    let rows = batch_rows(&body)?;
    validate_rows(&rows, &["id"])?;

    let mut store = db.write().await;
    let mut unknown = Map::new();
    for (index, row) in rows.iter().enumerate() {
        let id = row.get("id").and_then(Value::as_u64).unwrap_or_default();
        if !store.documents.contains_key(&id) {
            unknown.insert(
                format!("documents.{index}.position"),
                json!([format!("Document {id} does not exist.")]),
            );
        }
    }
    if !unknown.is_empty() {
        return Err(ServiceError::Fields(unknown));
    }

    let mut updated = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Object(changes) = row else { continue };
        let id = changes.get("id").and_then(Value::as_u64).unwrap_or_default();
        if let Some(document) = store.documents.get_mut(&id) {
            merge(document, changes);
            updated.push(document.clone());
        }
    }
    Ok(Json(json!({ "documents": updated })))
}

async fn get_document(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
) -> ServiceResult {
    let store = db.read().await;
    store
        .documents
        .get(&id)
        .filter(|document| visible(document, company_filter(&query)))
        .cloned()
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("document"))
}

fn known_documents(store: &Store, ids: &[u64]) -> Result<(), ServiceError> {
    match ids.iter().find(|id| !store.documents.contains_key(id)) {
        Some(id) => Err(ServiceError::not_found(&format!("document {id}"))),
        None => Ok(()),
    }
}

async fn print_documents(
    State(db): State<Db>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ServiceError> {
    let ids = parse_ids(query.get("installments"))?;
    let store = db.read().await;
    known_documents(&store, &ids)?;

    let mut pdf = PDF_MAGIC.to_vec();
    for id in &ids {
        pdf.extend_from_slice(format!("% boleto {id}\n").as_bytes());
    }
    Ok(([(header::CONTENT_TYPE, "application/pdf")], pdf).into_response())
}

async fn discard_documents(
    State(db): State<Db>,
    Query(query): Query<HashMap<String, String>>,
) -> ServiceResult {
    let ids = parse_ids(query.get("installments"))?;
    let mut store = db.write().await;
    known_documents(&store, &ids)?;
    for id in &ids {
        if let Some(document) = store.documents.get_mut(id) {
            merge(document, Map::from_iter([("status".to_string(), Value::from("DESCARTADO"))]));
        }
    }
    Ok(Json(json!({ "discarded": ids })))
}

async fn generate_remittance(State(db): State<Db>, Json(body): Json<Value>) -> ServiceResult {
    let body = require_object(body)?;
    require_fields(&body, &["company_id", "installments"])?;
    let ids = ids_in(body.get("installments"));
    if ids.is_empty() {
        return Err(ServiceError::field("installments", "At least one document is required."));
    }
    let mut store = db.write().await;
    known_documents(&store, &ids)?;
    let mut lines = vec!["REMESSA".to_string()];
    for id in &ids {
        if let Some(document) = store.documents.get_mut(id) {
            merge(document, Map::from_iter([("status".to_string(), Value::from("EMITIDO"))]));
        }
        lines.push(format!("DETALHE;{id}"));
    }
    let sequence = store.next_id();
    Ok(Json(json!({
        "file_name": format!("remessa-{sequence}.rem"),
        "remittance": lines.join("\n"),
        "installments": ids,
    })))
}

/// Each non-empty line of the return file is `document_id;status`.
async fn process_return(State(db): State<Db>, mut multipart: Multipart) -> ServiceResult {
    let mut fields = Map::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Message(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::Message(StatusCode::BAD_REQUEST, e.to_string()))?;
        if name == "return" {
            file = Some((file_name.unwrap_or_default(), data.to_vec()));
        } else {
            fields.insert(name, Value::from(String::from_utf8_lossy(&data).into_owned()));
        }
    }

    require_fields(&fields, &["company_id"])?;
    let (file_name, content) =
        file.ok_or_else(|| ServiceError::field("return", "The return file is required."))?;

    let mut store = db.write().await;
    let mut processed = Vec::new();
    for line in String::from_utf8_lossy(&content).lines() {
        let Some((id, status)) = line.trim().split_once(';') else { continue };
        let Ok(id) = id.parse::<u64>() else { continue };
        if let Some(document) = store.documents.get_mut(&id) {
            merge(document, Map::from_iter([("status".to_string(), Value::from(status))]));
            processed.push(id);
        }
    }
    Ok(Json(json!({ "file_name": file_name, "processed": processed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rows_keys_errors_by_position() {
        let rows = vec![json!({"value": 1, "due_date": "2030-01-01"}), json!({"value": 2})];
        let Err(ServiceError::Fields(errors)) = validate_rows(&rows, &["value", "due_date"]) else {
            panic!("expected field errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["documents.1.position"], json!(["The due_date field is required."]));
    }

    #[test]
    fn require_fields_reports_each_missing_field() {
        let body = Map::from_iter([("company_id".to_string(), json!(1))]);
        let Err(ServiceError::Fields(errors)) = require_fields(&body, &["company_id", "bank_code"]) else {
            panic!("expected field errors");
        };
        assert_eq!(errors["bank_code"], "The bank code field is required.");
    }

    #[test]
    fn parse_ids_accepts_comma_list() {
        let raw = "1, 2,3".to_string();
        assert_eq!(parse_ids(Some(&raw)).unwrap(), vec![1, 2, 3]);
        assert!(parse_ids(Some(&"1,x".to_string())).is_err());
        assert!(parse_ids(None).is_err());
    }

    #[test]
    fn merge_never_overwrites_id() {
        let mut record = json!({"id": 1, "status": "SALVO"});
        merge(
            &mut record,
            Map::from_iter([
                ("id".to_string(), json!(9)),
                ("status".to_string(), json!("EMITIDO")),
            ]),
        );
        assert_eq!(record, json!({"id": 1, "status": "EMITIDO"}));
    }

    #[test]
    fn visibility_follows_company_filter() {
        let record = json!({"company_id": 5});
        assert!(visible(&record, None));
        assert!(visible(&record, Some(5)));
        assert!(!visible(&record, Some(6)));
    }
}
