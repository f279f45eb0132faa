//! HTTP transport seam.
//!
//! `Session` talks to the server exclusively through the `Transport` trait,
//! so protocol behavior (refresh-and-retry, marker detection, polling) is
//! testable against a scripted transport. The production implementation is
//! a blocking reqwest client.

use crate::error::{Error, Result};
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Streaming request body for multipart uploads. The reader is consumed
/// exactly once; a retried request must carry a fresh one.
pub struct UploadBody {
    pub content_type: String,
    pub content_length: u64,
    pub reader: Box<dyn Read + Send + 'static>,
}

pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub upload: Option<UploadBody>,
}

impl WireRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            cookies: Vec::new(),
            upload: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn upload(mut self, body: UploadBody) -> Self {
        self.upload = Some(body);
        self
    }
}

pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

pub trait Transport {
    fn execute(&self, request: WireRequest) -> Result<WireResponse>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(verify_tls: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::internal_http(e.to_string(), "client setup"))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let url = request.url.clone();
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.cookies.is_empty() {
            let cookie_header = request
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(reqwest::header::COOKIE, cookie_header);
        }
        if let Some(upload) = request.upload {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, upload.content_type)
                .body(reqwest::blocking::Body::sized(
                    upload.reader,
                    upload.content_length,
                ));
        } else if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder
            .send()
            .map_err(|e| Error::internal_http(e.to_string(), &url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::internal_http(e.to_string(), &url))?;

        Ok(WireResponse { status, body })
    }
}
