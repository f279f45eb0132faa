#![allow(dead_code)]

//! Scripted transport and prompt doubles shared by the integration tests.

use flowctl::store;
use flowctl::{
    MemoryStore, Method, PasswordPrompt, ResolvedAddress, Result, Session, Transport,
    WireRequest, WireResponse,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Read;
use std::rc::Rc;

pub const USER: &str = "ann";
pub const URL: &str = "http://host:8081";

/// One request as seen by the scripted transport. Upload bodies are read
/// to completion at record time, which also proves the reader is fresh.
#[derive(Clone)]
pub struct Recorded {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub upload_body: Option<String>,
}

impl Recorded {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_login(&self) -> bool {
        self.form_value("action") == Some("login")
    }
}

pub type RequestLog = Rc<RefCell<Vec<Recorded>>>;

/// Transport double answering from a fixed queue of 200 responses.
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<WireResponse>>,
    requests: RequestLog,
}

impl ScriptedTransport {
    pub fn new(bodies: &[&str]) -> (Self, RequestLog) {
        let requests: RequestLog = Rc::new(RefCell::new(Vec::new()));
        let transport = Self {
            responses: RefCell::new(
                bodies
                    .iter()
                    .map(|b| WireResponse {
                        status: 200,
                        body: b.to_string(),
                    })
                    .collect(),
            ),
            requests: Rc::clone(&requests),
        };
        (transport, requests)
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, mut request: WireRequest) -> Result<WireResponse> {
        let upload_body = request.upload.take().map(|mut upload| {
            let mut body = String::new();
            upload
                .reader
                .read_to_string(&mut body)
                .expect("read upload body");
            body
        });
        self.requests.borrow_mut().push(Recorded {
            method: request.method,
            url: request.url.clone(),
            query: request.query.clone(),
            form: request.form.clone(),
            cookies: request.cookies.clone(),
            upload_body,
        });
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .expect("scripted transport ran out of responses"))
    }
}

/// Password prompt answering from a fixed queue.
pub struct QueuePrompt(VecDeque<String>);

impl QueuePrompt {
    pub fn new(passwords: &[&str]) -> Self {
        Self(passwords.iter().map(|p| p.to_string()).collect())
    }
}

impl PasswordPrompt for QueuePrompt {
    fn password(&mut self, _label: &str) -> Result<String> {
        Ok(self.0.pop_front().expect("prompt queue exhausted"))
    }
}

pub fn address(password: Option<&str>) -> ResolvedAddress {
    ResolvedAddress {
        user: USER.to_string(),
        password: password.map(str::to_string),
        url: URL.to_string(),
    }
}

/// Session over a scripted transport. `token` seeds the credential store
/// so the session starts warm; `password` is embedded in the address.
pub fn scripted_session(
    bodies: &[&str],
    token: Option<&str>,
    password: Option<&str>,
) -> (Session, RequestLog) {
    let (transport, requests) = ScriptedTransport::new(bodies);
    let mut seed = Vec::new();
    if let Some(token) = token {
        seed.push((store::session_key(USER, URL), token.to_string()));
    }
    let session = Session::with_transport(
        address(password),
        Box::new(MemoryStore::with(seed)),
        Box::new(transport),
        3,
    )
    .expect("build session");
    (session, requests)
}
