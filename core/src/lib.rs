//! Synchronous client core for the PlugBoleto billing-document service.
//!
//! # Overview
//! Manages bank accounts, bank agreements ("convenants") and batches of
//! billing documents (boletos): issue, update, query, render, discard,
//! generate a settlement-submission file and ingest a settlement-return
//! file.
//!
//! # Design
//! - Every operation is a `build_*` step (validate, inject, compose) followed
//!   by one `Transport::send` and `interpret_as`, which decodes the body the
//!   way the request's `ResponseFormat` asks.
//! - `params::compose` owns the managed query parameters (`company_id`,
//!   `installments`); `response::interpret` owns status handling and error
//!   normalization. Operations add nothing beyond path and payload shape.
//! - The transport is a trait, so hosts can execute requests themselves;
//!   `ReqwestTransport` (feature `blocking`) is the default adapter.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod params;
pub mod response;
pub mod transport;
pub mod types;

pub use client::{JsonEnvelope, PlugBoletoClient};
pub use config::ClientConfig;
pub use error::{ApiError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody, ResponseFormat};
pub use params::{compose, ManagedParameters, QueryParameter};
pub use response::{interpret, interpret_as, interpret_raw, ErrorBody, ResponseBody, ResponseEnvelope};
pub use transport::Transport;
#[cfg(feature = "blocking")]
pub use transport::ReqwestTransport;
pub use types::{Payload, ResourceId, UploadAttachment};
