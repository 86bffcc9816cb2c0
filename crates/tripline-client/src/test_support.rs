//! In-process collector used by the protocol and controller tests.

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tripline_core::ServerAddress;

use crate::config::ClientConfig;
use crate::protocol::{CollectorClient, END_PATH, GPS_PATH, START_PATH};
use crate::transport::{HttpTransport, TransportConfig};

/// Canned status and body.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    pub fn new(status: u16, body: &str) -> Self {
        Reply {
            status,
            body: body.to_string(),
        }
    }

    fn into_response(self) -> (StatusCode, String) {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.body)
    }
}

/// One `/data/gps` call as the collector saw it.
#[derive(Debug, Clone)]
pub struct PushRecord {
    pub form: HashMap<String, String>,
    pub connection: Option<String>,
}

impl PushRecord {
    pub fn field(&self, name: &str) -> &str {
        self.form.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn timestamp(&self) -> i64 {
        self.field("timestamp").parse().unwrap_or(-1)
    }
}

/// Everything the collector received so far.
#[derive(Debug, Clone, Default)]
pub struct Seen {
    pub starts: usize,
    pub pushes: Vec<PushRecord>,
    pub ends: Vec<String>,
}

struct Shared {
    seen: Seen,
    start_reply: Reply,
    gps_reply: Reply,
    gps_delay: Duration,
    end_reply: Reply,
}

type SharedState = Arc<Mutex<Shared>>;

/// Axum collector bound to an ephemeral localhost port.
pub struct FakeCollector {
    addr: SocketAddr,
    state: SharedState,
}

impl FakeCollector {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(Shared {
            seen: Seen::default(),
            start_reply: Reply::new(200, r#"{"route_id":"abc123"}"#),
            gps_reply: Reply::new(200, "ok"),
            gps_delay: Duration::ZERO,
            end_reply: Reply::new(200, "route closed"),
        }));

        let app = Router::new()
            .route(START_PATH, post(start_handler))
            .route(GPS_PATH, post(gps_handler))
            .route(END_PATH, post(end_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        FakeCollector { addr, state }
    }

    pub fn address(&self) -> ServerAddress {
        ServerAddress::new("127.0.0.1", self.addr.port()).unwrap()
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::with_server(self.address());
        config.collector.request_timeout_secs = 2;
        config.collector.connect_timeout_secs = 1;
        config
    }

    pub fn client(&self) -> CollectorClient {
        let transport = HttpTransport::new(TransportConfig {
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            use_proxy: false,
        })
        .unwrap();
        CollectorClient::new(transport, self.address())
    }

    pub fn snapshot(&self) -> Seen {
        self.state.lock().unwrap().seen.clone()
    }

    pub fn set_start_reply(&self, reply: Reply) {
        self.state.lock().unwrap().start_reply = reply;
    }

    pub fn set_gps_reply(&self, reply: Reply) {
        self.state.lock().unwrap().gps_reply = reply;
    }

    /// Holds every `/data/gps` reply back by `delay` after recording it.
    pub fn set_gps_delay(&self, delay: Duration) {
        self.state.lock().unwrap().gps_delay = delay;
    }

    pub fn set_end_reply(&self, reply: Reply) {
        self.state.lock().unwrap().end_reply = reply;
    }
}

async fn start_handler(State(state): State<SharedState>) -> (StatusCode, String) {
    let mut shared = state.lock().unwrap();
    shared.seen.starts += 1;
    shared.start_reply.clone().into_response()
}

async fn gps_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let connection = headers
        .get("connection")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (reply, delay) = {
        let mut shared = state.lock().unwrap();
        shared.seen.pushes.push(PushRecord { form, connection });
        (shared.gps_reply.clone(), shared.gps_delay)
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply.into_response()
}

async fn end_handler(
    State(state): State<SharedState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let mut shared = state.lock().unwrap();
    shared
        .seen
        .ends
        .push(form.get("route_id").cloned().unwrap_or_default());
    shared.end_reply.clone().into_response()
}
