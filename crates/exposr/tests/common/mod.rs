//! Shared fakes for integration tests: a scripted camera, a recording vision
//! transport and a one-shot HTTP server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use exposr::api::{ChatCompletionRequest, ChatCompletionResponse, VisionTransport};
use exposr::capture::{Camera, CameraFault, Permission, RawStill, StillOptions};
use exposr::config::{ApiConfig, Config};
use exposr::AnalysisError;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Lets a test hold a fake in the middle of its async call.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

pub fn still(uri: &str, base64: Option<&str>) -> RawStill {
    RawStill {
        uri: uri.to_string(),
        base64: base64.map(str::to_string),
        width: Some(640),
        height: Some(480),
    }
}

pub struct ScriptedCamera {
    permission: Mutex<Permission>,
    stills: Mutex<VecDeque<Result<RawStill, CameraFault>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl ScriptedCamera {
    pub fn granted(stills: Vec<Result<RawStill, CameraFault>>) -> Arc<Self> {
        Self::build(Permission::Granted, stills, None)
    }

    pub fn with_permission(permission: Permission) -> Arc<Self> {
        Self::build(permission, vec![Ok(still("file:///x.jpg", Some("QUJD")))], None)
    }

    pub fn gated(stills: Vec<Result<RawStill, CameraFault>>, gate: Arc<Gate>) -> Arc<Self> {
        Self::build(Permission::Granted, stills, Some(gate))
    }

    fn build(
        permission: Permission,
        stills: Vec<Result<RawStill, CameraFault>>,
        gate: Option<Arc<Gate>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            permission: Mutex::new(permission),
            stills: Mutex::new(stills.into()),
            calls: AtomicUsize::new(0),
            gate,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock();
        if *permission == Permission::Undetermined {
            *permission = Permission::Granted;
        }
        *permission
    }

    fn current_permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn capture_still(&self, _options: StillOptions) -> Result<RawStill, CameraFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.stills
            .lock()
            .pop_front()
            .unwrap_or(Err(CameraFault::NoFrame))
    }
}

pub fn response(json: serde_json::Value) -> ChatCompletionResponse {
    serde_json::from_value(json).expect("response fixture should deserialize")
}

pub fn content(text: &str) -> Result<ChatCompletionResponse, AnalysisError> {
    Ok(response(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    })))
}

/// Answers from a script and remembers every request it was given.
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<ChatCompletionResponse, AnalysisError>>>,
    requests: Mutex<Vec<(String, ChatCompletionRequest)>>,
    gate: Option<Arc<Gate>>,
}

impl RecordingTransport {
    pub fn new(responses: Vec<Result<ChatCompletionResponse, AnalysisError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub fn gated(
        responses: Vec<Result<ChatCompletionResponse, AnalysisError>>,
        gate: Arc<Gate>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    pub fn requests(&self) -> Vec<(String, ChatCompletionRequest)> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl VisionTransport for RecordingTransport {
    async fn complete(
        &self,
        credential: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AnalysisError> {
        self.requests
            .lock()
            .push((credential.to_string(), request.clone()));
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AnalysisError::RequestFailed("no scripted response".into())))
    }
}

pub fn api_config() -> ApiConfig {
    ApiConfig {
        key: "sk-test".into(),
        ..ApiConfig::default()
    }
}

pub fn config() -> Config {
    Config {
        api: api_config(),
        ..Config::default()
    }
}

/// Serve exactly one HTTP response on a random local port after `delay`.
/// The join handle yields the raw request text.
pub fn serve_once(status: &str, body: &str, delay: Duration) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
    let url = format!(
        "http://{}/v1/chat/completions",
        listener.local_addr().expect("local addr")
    );
    let status = status.to_string();
    let body = body.to_string();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let request = read_request(&mut stream);
        thread::sleep(delay);
        let reply = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(reply.as_bytes());
        request
    });

    (url, handle)
}

fn read_request(stream: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
