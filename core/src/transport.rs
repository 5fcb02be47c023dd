//! The transport seam.
//!
//! # Design
//! `Transport` executes one `HttpRequest` and returns the `HttpResponse`
//! as data, whatever the status code. Status interpretation belongs to the
//! client, so a transport only fails when no response was obtained.
//! The verb helpers mirror the four calls the service needs; they all funnel
//! into `send`, which is the only method an implementation must provide.

use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseFormat};
use crate::params::QueryParameter;

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    fn get(
        &self,
        url: &str,
        query: Vec<QueryParameter>,
        format: ResponseFormat,
    ) -> Result<HttpResponse, TransportError> {
        self.send(
            &HttpRequest::new(HttpMethod::Get, url)
                .with_query(query)
                .with_format(format),
        )
    }

    fn post(
        &self,
        url: &str,
        body: RequestBody,
        query: Vec<QueryParameter>,
    ) -> Result<HttpResponse, TransportError> {
        self.send(
            &HttpRequest::new(HttpMethod::Post, url)
                .with_query(query)
                .with_body(body),
        )
    }

    fn put(
        &self,
        url: &str,
        body: RequestBody,
        query: Vec<QueryParameter>,
    ) -> Result<HttpResponse, TransportError> {
        self.send(
            &HttpRequest::new(HttpMethod::Put, url)
                .with_query(query)
                .with_body(body),
        )
    }

    fn delete(
        &self,
        url: &str,
        query: Vec<QueryParameter>,
    ) -> Result<HttpResponse, TransportError> {
        self.send(&HttpRequest::new(HttpMethod::Delete, url).with_query(query))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

#[cfg(feature = "blocking")]
pub use self::blocking::ReqwestTransport;

#[cfg(feature = "blocking")]
mod blocking {
    use reqwest::blocking::multipart::{Form, Part};
    use reqwest::blocking::Client;
    use reqwest::header::CONTENT_TYPE;
    use reqwest::Method;

    use super::Transport;
    use crate::config::ClientConfig;
    use crate::error::TransportError;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody};

    /// Blocking `reqwest` transport.
    ///
    /// Must not be called from inside an async runtime; wrap calls in
    /// `spawn_blocking` there.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
        default_headers: Vec<(String, String)>,
    }

    impl ReqwestTransport {
        pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(config.timeout())
                .build()
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Self {
                client,
                default_headers: config
                    .default_headers
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            })
        }

        pub fn with_client(client: Client) -> Self {
            Self {
                client,
                default_headers: Vec::new(),
            }
        }

        fn to_reqwest_method(method: HttpMethod) -> Method {
            match method {
                HttpMethod::Get => Method::GET,
                HttpMethod::Post => Method::POST,
                HttpMethod::Put => Method::PUT,
                HttpMethod::Delete => Method::DELETE,
            }
        }

        fn map_error(error: reqwest::Error) -> TransportError {
            if error.is_timeout() {
                TransportError::Timeout
            } else if error.is_connect() {
                TransportError::Connection(error.to_string())
            } else {
                TransportError::Other(error.to_string())
            }
        }
    }

    /// Build the form at send time; the attachment is read here and dropped
    /// with the request.
    fn build_form(form: &MultipartForm) -> Result<Form, TransportError> {
        let mut out = Form::new();
        for (name, value) in &form.fields {
            out = out.text(name.clone(), value.clone());
        }
        let bytes = std::fs::read(&form.attachment.path)?;
        let part = Part::bytes(bytes)
            .file_name(form.attachment.file_name.clone())
            .mime_str(&form.attachment.media_type)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(out.part(form.file_field.clone(), part))
    }

    impl Transport for ReqwestTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut builder = self
                .client
                .request(Self::to_reqwest_method(request.method), &request.url);

            if !request.query.is_empty() {
                let query: Vec<(&str, &str)> = request
                    .query
                    .iter()
                    .map(|param| (param.name.as_str(), param.value.as_str()))
                    .collect();
                builder = builder.query(&query);
            }
            for (name, value) in self.default_headers.iter().chain(&request.headers) {
                builder = builder.header(name.as_str(), value.as_str());
            }

            builder = match &request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(value) => {
                    let bytes = serde_json::to_vec(value)
                        .map_err(|e| TransportError::Other(e.to_string()))?;
                    if request.headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("content-type")) {
                        builder.body(bytes)
                    } else {
                        builder.header(CONTENT_TYPE, "application/json").body(bytes)
                    }
                }
                RequestBody::Multipart(form) => builder.multipart(build_form(form)?),
            };

            let response = builder.send().map_err(Self::map_error)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.bytes().map_err(Self::map_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
