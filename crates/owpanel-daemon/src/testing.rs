//! Test doubles for the hub and the panel sink

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::HubConfig;
use crate::hub::{Hub, HubError};
use crate::panel::PanelSink;

type Responses = Arc<Mutex<HashMap<String, (StatusCode, String)>>>;
type Recorded = Arc<Mutex<Vec<Vec<(String, String)>>>>;

#[derive(Clone, Default)]
struct MockState {
    responses: Responses,
    requests: Recorded,
}

/// In-process HTTP server standing in for the hub's data request handler
pub struct MockHub {
    base_url: String,
    state: MockState,
}

impl MockHub {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/data_request", get(handle))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Answer hub function `funct` with `status` and `body`
    pub fn respond(self, funct: &str, status: StatusCode, body: &str) -> Self {
        self.set_response(funct, status, body);
        self
    }

    /// Change the answer to `funct` while the hub is running
    pub fn set_response(&self, funct: &str, status: StatusCode, body: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(funct.to_string(), (status, body.to_string()));
    }

    pub fn config(&self) -> HubConfig {
        HubConfig {
            base_url: self.base_url.clone(),
            ..HubConfig::default()
        }
    }

    /// Query parameters of every request received, in order
    pub fn requests(&self) -> Vec<Vec<(String, String)>> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(state): State<MockState>,
    Query(params): Query<Vec<(String, String)>>,
) -> (StatusCode, String) {
    let funct = params
        .iter()
        .find(|(k, _)| k == "funct")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    state.requests.lock().unwrap().push(params);

    state
        .responses
        .lock()
        .unwrap()
        .get(&funct)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, "No handler".to_string()))
}

/// Hub double answering from canned bodies without any network
#[derive(Default)]
pub struct FakeHub {
    responses: HashMap<String, Result<String, u16>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, funct: &str, body: &str) -> Self {
        self.responses.insert(funct.to_string(), Ok(body.to_string()));
        self
    }

    pub fn failing(mut self, funct: &str, status: u16) -> Self {
        self.responses.insert(funct.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn functs(&self) -> Vec<String> {
        self.calls().into_iter().map(|(funct, _)| funct).collect()
    }
}

impl Hub for FakeHub {
    async fn request(&self, funct: &str, params: &[(String, String)]) -> Result<String, HubError> {
        self.calls
            .lock()
            .unwrap()
            .push((funct.to_string(), params.to_vec()));
        match self.responses.get(funct) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(HubError::Status {
                funct: funct.to_string(),
                status: *status,
            }),
            None => Err(HubError::Status {
                funct: funct.to_string(),
                status: 404,
            }),
        }
    }
}

/// Sink keeping every HTML fragment it was given
#[derive(Default)]
pub struct RecordingSink {
    html: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn last(&self) -> Option<String> {
        self.html.lock().unwrap().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.html.lock().unwrap().len()
    }
}

impl PanelSink for RecordingSink {
    fn set_panel_html(&self, html: String) {
        self.html.lock().unwrap().push(html);
    }
}

pub const TYPES: &str = r#"{"1":{"Name":"Temp"},"2":{"Name":"Humidity"},"3":{"Name":"Voltage"}}"#;

pub const CAPABILITIES: &str = r#"{
    "5":{"Device":"DS18B20","Name":"Thermometer","Services":[1]},
    "7":{"Device":"DS2438","Name":"Multi sensor","Services":[1,2,3]}
}"#;

pub const NEW_DEVICES: &str = r#"[
    {"ROMId":"26AA00000001","Device":7,"Type":1},
    {"ROMId":"26AA00000001","Device":7,"Type":2},
    {"ROMId":"28FF00000002","Device":5,"Type":1}
]"#;

/// What `getnew` answers after other sensors were plugged in
pub const NEWER_DEVICES: &str = r#"[
    {"ROMId":"30BB00000003","Device":7,"Type":1},
    {"ROMId":"31CC00000004","Device":7,"Type":1},
    {"ROMId":"32DD00000005","Device":5,"Type":1}
]"#;
