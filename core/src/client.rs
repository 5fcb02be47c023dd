//! Request builders and operations for the PlugBoleto API.
//!
//! # Design
//! `PlugBoletoClient` holds a `base_url` and a transport and carries no
//! mutable state between calls. Each remote action is split into a pure
//! `build_*` method, which validates required identifiers, injects the
//! company id into payloads and composes query parameters, and an operation
//! method that sends the built request and interprets the response.
//! A failing `build_*` never reaches the transport.

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, MultipartForm, RequestBody, ResponseFormat};
use crate::params::{compose, ManagedParameters, QueryParameter};
use crate::response::{interpret_as, ResponseBody, ResponseEnvelope};
use crate::transport::Transport;
use crate::types::{Payload, ResourceId, UploadAttachment};

const COMPANY_ID: &str = "company_id";
const INSTALLMENTS: &str = "installments";
const RETURN_FILE_FIELD: &str = "return";

const THE_COMPANY_ID: &str = "the company id";
const THE_ACCOUNT_ID: &str = "the account id";
const THE_AGREEMENT_ID: &str = "the agreement id";
const THE_DOCUMENT_ID: &str = "the document id";
const ANY_DATA: &str = "any data";
const SOME_DOCUMENT_ID: &str = "at least one document id";
const THE_RETURN_FILE: &str = "the file path, media type and name";

/// JSON success envelope.
pub type JsonEnvelope = ResponseEnvelope<Value>;

fn require_id(id: ResourceId, operation: &'static str, missing: &'static str) -> Result<ResourceId> {
    if id == 0 {
        return Err(ApiError::invalid(operation, missing));
    }
    Ok(id)
}

fn require_payload(payload: &Payload, operation: &'static str) -> Result<()> {
    if payload.is_empty() {
        return Err(ApiError::invalid(operation, ANY_DATA));
    }
    Ok(())
}

fn require_ids(ids: &[ResourceId], operation: &'static str) -> Result<()> {
    if ids.is_empty() {
        return Err(ApiError::invalid(operation, SOME_DOCUMENT_ID));
    }
    Ok(())
}

fn with_company_id(mut payload: Payload, company_id: ResourceId) -> Payload {
    payload.insert(COMPANY_ID.to_string(), Value::from(company_id));
    payload
}

fn form_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Client for the PlugBoleto billing-document service.
#[derive(Debug, Clone)]
pub struct PlugBoletoClient<T> {
    base_url: String,
    transport: T,
}

impl<T> PlugBoletoClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn query_request(
        &self,
        method: HttpMethod,
        path: &str,
        managed: ManagedParameters,
        params: &[QueryParameter],
    ) -> HttpRequest {
        HttpRequest::new(method, self.url(path)).with_query(compose(params, &managed))
    }

    fn payload_request(
        &self,
        method: HttpMethod,
        path: &str,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .with_query(params.to_vec())
            .with_body(RequestBody::Json(Value::Object(with_company_id(payload, company_id))))
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn build_list_accounts(
        &self,
        company_id: Option<ResourceId>,
        params: &[QueryParameter],
    ) -> HttpRequest {
        let managed = ManagedParameters::new().company_id(company_id);
        self.query_request(HttpMethod::Get, "/accounts", managed, params)
    }

    pub fn build_create_account(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "create an account";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_payload(&payload, OP)?;
        Ok(self.payload_request(HttpMethod::Post, "/accounts", company_id, payload, params))
    }

    pub fn build_update_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "update an account";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(id, OP, THE_ACCOUNT_ID)?;
        require_payload(&payload, OP)?;
        let path = format!("/accounts/{id}");
        Ok(self.payload_request(HttpMethod::Put, &path, company_id, payload, params))
    }

    pub fn build_get_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "get an account";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(id, OP, THE_ACCOUNT_ID)?;
        let managed = ManagedParameters::new().company_id(Some(company_id));
        Ok(self.query_request(HttpMethod::Get, &format!("/accounts/{id}"), managed, params))
    }

    pub fn build_delete_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "delete an account";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(id, OP, THE_ACCOUNT_ID)?;
        let managed = ManagedParameters::new().company_id(Some(company_id));
        Ok(self.query_request(HttpMethod::Delete, &format!("/accounts/{id}"), managed, params))
    }

    // -----------------------------------------------------------------------
    // Agreements (convenants)
    // -----------------------------------------------------------------------

    pub fn build_list_agreements(
        &self,
        company_id: Option<ResourceId>,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        require_id(account_id, "list agreements", THE_ACCOUNT_ID)?;
        let managed = ManagedParameters::new().company_id(company_id);
        let path = format!("/accounts/{account_id}/convenants");
        Ok(self.query_request(HttpMethod::Get, &path, managed, params))
    }

    pub fn build_create_agreement(
        &self,
        company_id: ResourceId,
        account_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "create an agreement";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(account_id, OP, THE_ACCOUNT_ID)?;
        require_payload(&payload, OP)?;
        let path = format!("/accounts/{account_id}/convenants");
        Ok(self.payload_request(HttpMethod::Post, &path, company_id, payload, params))
    }

    pub fn build_update_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "update an agreement";
        require_id(id, OP, THE_AGREEMENT_ID)?;
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(account_id, OP, THE_ACCOUNT_ID)?;
        require_payload(&payload, OP)?;
        let path = format!("/accounts/{account_id}/convenants/{id}");
        Ok(self.payload_request(HttpMethod::Put, &path, company_id, payload, params))
    }

    pub fn build_get_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "get an agreement";
        require_id(id, OP, THE_AGREEMENT_ID)?;
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(account_id, OP, THE_ACCOUNT_ID)?;
        let managed = ManagedParameters::new().company_id(Some(company_id));
        let path = format!("/accounts/{account_id}/convenants/{id}");
        Ok(self.query_request(HttpMethod::Get, &path, managed, params))
    }

    pub fn build_delete_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "delete an agreement";
        require_id(id, OP, THE_AGREEMENT_ID)?;
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_id(account_id, OP, THE_ACCOUNT_ID)?;
        let managed = ManagedParameters::new().company_id(Some(company_id));
        let path = format!("/accounts/{account_id}/convenants/{id}");
        Ok(self.query_request(HttpMethod::Delete, &path, managed, params))
    }

    // -----------------------------------------------------------------------
    // Billing documents
    // -----------------------------------------------------------------------

    pub fn build_issue_documents(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "issue documents";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_payload(&payload, OP)?;
        Ok(self.payload_request(HttpMethod::Post, "/plugboleto", company_id, payload, params))
    }

    pub fn build_get_document(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "get a document";
        require_id(id, OP, THE_DOCUMENT_ID)?;
        require_id(company_id, OP, THE_COMPANY_ID)?;
        let managed = ManagedParameters::new().company_id(Some(company_id));
        Ok(self.query_request(HttpMethod::Get, &format!("/installments/{id}"), managed, params))
    }

    pub fn build_update_documents(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "update documents";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_payload(&payload, OP)?;
        Ok(self.payload_request(HttpMethod::Put, "/plugboleto", company_id, payload, params))
    }

    pub fn build_render_documents(
        &self,
        company_id: ResourceId,
        ids: &[ResourceId],
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "render documents";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_ids(ids, OP)?;
        let managed = ManagedParameters::new()
            .company_id(Some(company_id))
            .installments(ids);
        Ok(self
            .query_request(HttpMethod::Get, "/plugboleto/print", managed, params)
            .with_format(ResponseFormat::Raw))
    }

    pub fn build_discard_documents(
        &self,
        company_id: ResourceId,
        ids: &[ResourceId],
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "discard documents";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        require_ids(ids, OP)?;
        let managed = ManagedParameters::new()
            .company_id(Some(company_id))
            .installments(ids);
        Ok(self.query_request(HttpMethod::Delete, "/plugboleto", managed, params))
    }

    /// Settlement-submission ("remessa") file. `payload` must carry
    /// `installments` as a non-empty list, a non-empty comma-joined string
    /// or a single non-zero document id.
    pub fn build_generate_remittance(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "generate a remittance file";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        let has_documents = match payload.get(INSTALLMENTS) {
            Some(Value::Array(ids)) => !ids.is_empty(),
            Some(Value::String(ids)) => !ids.is_empty(),
            Some(Value::Number(id)) => id.as_u64().is_some_and(|id| id != 0),
            _ => false,
        };
        if !has_documents {
            return Err(ApiError::invalid(OP, SOME_DOCUMENT_ID));
        }
        let path = "/plugboleto/remittance";
        Ok(self.payload_request(HttpMethod::Post, path, company_id, payload, params))
    }

    /// Settlement-return ("retorno") upload. Payload fields become text form
    /// fields next to the `return` file field; a payload key named `return`
    /// is dropped so the file part stays the only one under that name.
    pub fn build_ingest_return(
        &self,
        company_id: ResourceId,
        payload: Payload,
        attachment: &UploadAttachment,
        params: &[QueryParameter],
    ) -> Result<HttpRequest> {
        const OP: &str = "process a return file";
        require_id(company_id, OP, THE_COMPANY_ID)?;
        if !attachment.is_complete() {
            return Err(ApiError::invalid(OP, THE_RETURN_FILE));
        }
        let fields = with_company_id(payload, company_id)
            .iter()
            .filter(|(name, _)| name.as_str() != RETURN_FILE_FIELD)
            .map(|(name, value)| (name.clone(), form_value(value)))
            .collect();
        let form = MultipartForm {
            fields,
            file_field: RETURN_FILE_FIELD.to_string(),
            attachment: attachment.clone(),
        };
        Ok(HttpRequest::new(HttpMethod::Post, self.url("/plugboleto/return"))
            .with_query(params.to_vec())
            .with_body(RequestBody::Multipart(form)))
    }
}

impl<T: Transport> PlugBoletoClient<T> {
    /// Send a built request and interpret the response in the request's
    /// `format`: JSON requests yield `ResponseBody::Json`, raw ones
    /// `ResponseBody::Raw`.
    pub fn execute(&self, request: &HttpRequest) -> Result<ResponseEnvelope<ResponseBody>> {
        debug!(
            method = %request.method,
            url = %request.url,
            query = request.query.len(),
            format = ?request.format,
            "dispatching request"
        );
        interpret_as(self.transport.send(request)?, request.format)
    }

    fn execute_json(&self, request: &HttpRequest) -> Result<JsonEnvelope> {
        let envelope = self.execute(request)?;
        Ok(ResponseEnvelope {
            http_code: envelope.http_code,
            body: envelope.body.into_json()?,
        })
    }

    fn execute_bytes(&self, request: &HttpRequest) -> Result<ResponseEnvelope<Vec<u8>>> {
        let envelope = self.execute(request)?;
        Ok(ResponseEnvelope {
            http_code: envelope.http_code,
            body: envelope.body.into_bytes(),
        })
    }

    pub fn list_accounts(
        &self,
        company_id: Option<ResourceId>,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_list_accounts(company_id, params))
    }

    pub fn create_account(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_create_account(company_id, payload, params)?)
    }

    pub fn update_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_update_account(id, company_id, payload, params)?)
    }

    pub fn get_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_get_account(id, company_id, params)?)
    }

    pub fn delete_account(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_delete_account(id, company_id, params)?)
    }

    pub fn list_agreements(
        &self,
        company_id: Option<ResourceId>,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_list_agreements(company_id, account_id, params)?)
    }

    pub fn create_agreement(
        &self,
        company_id: ResourceId,
        account_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_create_agreement(company_id, account_id, payload, params)?)
    }

    pub fn update_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_update_agreement(id, company_id, account_id, payload, params)?)
    }

    pub fn get_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_get_agreement(id, company_id, account_id, params)?)
    }

    pub fn delete_agreement(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        account_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_delete_agreement(id, company_id, account_id, params)?)
    }

    pub fn issue_documents(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_issue_documents(company_id, payload, params)?)
    }

    pub fn get_document(
        &self,
        id: ResourceId,
        company_id: ResourceId,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_get_document(id, company_id, params)?)
    }

    pub fn update_documents(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_update_documents(company_id, payload, params)?)
    }

    /// Rendered documents (usually a PDF) as raw bytes.
    pub fn render_documents(
        &self,
        company_id: ResourceId,
        ids: &[ResourceId],
        params: &[QueryParameter],
    ) -> Result<ResponseEnvelope<Vec<u8>>> {
        self.execute_bytes(&self.build_render_documents(company_id, ids, params)?)
    }

    pub fn discard_documents(
        &self,
        company_id: ResourceId,
        ids: &[ResourceId],
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_discard_documents(company_id, ids, params)?)
    }

    pub fn generate_remittance(
        &self,
        company_id: ResourceId,
        payload: Payload,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_generate_remittance(company_id, payload, params)?)
    }

    pub fn ingest_return(
        &self,
        company_id: ResourceId,
        payload: Payload,
        attachment: &UploadAttachment,
        params: &[QueryParameter],
    ) -> Result<JsonEnvelope> {
        self.execute_json(&self.build_ingest_return(company_id, payload, attachment, params)?)
    }
}

#[cfg(feature = "blocking")]
impl PlugBoletoClient<crate::transport::ReqwestTransport> {
    /// Client backed by the blocking reqwest transport.
    pub fn from_config(config: &crate::config::ClientConfig) -> Result<Self> {
        let transport = crate::transport::ReqwestTransport::new(config)?;
        Ok(Self::new(&config.base_url, transport))
    }
}
