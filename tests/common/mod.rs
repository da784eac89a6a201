//! Fake Redfish BMC for integration tests
//!
//! An axum server on an ephemeral port that serves a canned resource tree,
//! issues and revokes session tokens and counts what it was asked to do.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use redfish_exporter::target::{AuthMode, Credential, Target};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "password";

/// `Basic` credentials for admin:password
const BASIC_AUTH: &str = "Basic YWRtaW46cGFzc3dvcmQ=";

const SESSIONS: &str = "/redfish/v1/SessionService/Sessions";

/// How long a stalled request hangs, far beyond any client timeout
const STALL: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct BmcState {
    resources: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashMap<String, u16>>,
    tokens: Mutex<HashSet<String>>,
    next_token: AtomicU64,

    logins: AtomicU64,
    logouts: AtomicU64,
    active_logins: AtomicU64,
    max_concurrent_logins: AtomicU64,
    fetches: AtomicU64,
    fetched: Mutex<HashMap<String, u64>>,
    /// Every GET per path, including stalled and rejected ones
    attempts: Mutex<HashMap<String, u64>>,
    /// Remaining GETs per path that hang without a response
    stalls: Mutex<HashMap<String, u64>>,

    login_delay_ms: AtomicU64,
    response_delay_ms: AtomicU64,
    /// Revoke every token once this many more GETs were served (0 = never)
    revoke_after: AtomicU64,
    reject_tokens: AtomicBool,
    reject_logins: AtomicBool,
}

pub struct FakeBmc {
    addr: SocketAddr,
    state: Arc<BmcState>,
    handle: JoinHandle<()>,
}

impl FakeBmc {
    /// Starts a BMC serving [`sample_tree`].
    pub async fn start() -> Self {
        Self::with_resources(sample_tree()).await
    }

    pub async fn with_resources(resources: HashMap<String, Value>) -> Self {
        let state = Arc::new(BmcState::default());
        *state.resources.lock().unwrap() = resources;

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn target(&self) -> Target {
        Target::new(self.base_url(), credential(AuthMode::Session))
    }

    pub fn basic_target(&self) -> Target {
        Target::new(self.base_url(), credential(AuthMode::Basic))
    }

    pub fn set_resource(&self, path: &str, body: Value) {
        self.state
            .resources
            .lock()
            .unwrap()
            .insert(path.to_string(), body);
    }

    pub fn fail_path(&self, path: &str, status: u16) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    /// The next `times` GETs of `path` never get a response.
    pub fn stall_path(&self, path: &str, times: u64) {
        self.state
            .stalls
            .lock()
            .unwrap()
            .insert(path.to_string(), times);
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.state
            .login_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_response_delay(&self, delay: Duration) {
        self.state
            .response_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn revoke_tokens_after(&self, fetches: u64) {
        self.state.revoke_after.store(fetches, Ordering::SeqCst);
    }

    pub fn reject_tokens(&self, reject: bool) {
        self.state.reject_tokens.store(reject, Ordering::SeqCst);
    }

    pub fn reject_logins(&self, reject: bool) {
        self.state.reject_logins.store(reject, Ordering::SeqCst);
    }

    pub fn revoke_all_tokens(&self) {
        self.state.tokens.lock().unwrap().clear();
    }

    pub fn logins(&self) -> u64 {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> u64 {
        self.state.logouts.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_logins(&self) -> u64 {
        self.state.max_concurrent_logins.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> u64 {
        self.state.fetches.load(Ordering::SeqCst)
    }

    /// How often `path` was served successfully.
    pub fn fetch_count(&self, path: &str) -> u64 {
        self.state
            .fetched
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    /// How often `path` was requested, answered or not.
    pub fn attempts(&self, path: &str) -> u64 {
        self.state
            .attempts
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }

    pub fn active_tokens(&self) -> usize {
        self.state.tokens.lock().unwrap().len()
    }
}

impl Drop for FakeBmc {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn credential(auth: AuthMode) -> Credential {
    Credential {
        username: USERNAME.to_string(),
        password: SecretString::new(PASSWORD.into()),
        auth,
    }
}

/// A base URL nothing listens on.
pub fn unreachable_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn handle(
    State(state): State<Arc<BmcState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = match uri.path().trim_end_matches('/') {
        "" => "/",
        path => path,
    }
    .to_string();

    match (method, path.as_str()) {
        (Method::POST, SESSIONS) => login(&state, &body).await,
        (Method::DELETE, p) if p.starts_with(SESSIONS) => logout(&state, &headers),
        (Method::GET, _) => get(&state, &path, &headers).await,
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn login(state: &BmcState, body: &str) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);
    let active = state.active_logins.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .max_concurrent_logins
        .fetch_max(active, Ordering::SeqCst);

    let delay = state.login_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    state.active_logins.fetch_sub(1, Ordering::SeqCst);

    let request: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let valid = request["UserName"] == USERNAME && request["Password"] == PASSWORD;
    if !valid || state.reject_logins.load(Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let id = state.next_token.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("token-{}", id);
    state.tokens.lock().unwrap().insert(token.clone());

    let location = format!("{}/{}", SESSIONS, id);
    (
        StatusCode::CREATED,
        [
            ("X-Auth-Token", token),
            (header::LOCATION.as_str(), location.clone()),
        ],
        Json(json!({"@odata.id": location, "Id": id.to_string(), "UserName": USERNAME})),
    )
        .into_response()
}

fn logout(state: &BmcState, headers: &HeaderMap) -> Response {
    let token = headers
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.tokens.lock().unwrap().remove(token) {
        state.logouts.fetch_add(1, Ordering::SeqCst);
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn authorized(state: &BmcState, headers: &HeaderMap) -> bool {
    if let Some(basic) = headers.get(header::AUTHORIZATION) {
        return basic.to_str().ok() == Some(BASIC_AUTH);
    }
    if state.reject_tokens.load(Ordering::SeqCst) {
        return false;
    }
    headers
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| state.tokens.lock().unwrap().contains(token))
}

async fn get(state: &BmcState, path: &str, headers: &HeaderMap) -> Response {
    *state
        .attempts
        .lock()
        .unwrap()
        .entry(path.to_string())
        .or_default() += 1;

    let stall = {
        let mut stalls = state.stalls.lock().unwrap();
        match stalls.get_mut(path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    };
    if stall {
        tokio::time::sleep(STALL).await;
    }

    let delay = state.response_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !authorized(state, headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if let Some(status) = state.failing.lock().unwrap().get(path).copied() {
        return StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }

    let body = state.resources.lock().unwrap().get(path).cloned();
    let Some(body) = body else {
        return StatusCode::NOT_FOUND.into_response();
    };

    state.fetches.fetch_add(1, Ordering::SeqCst);
    *state
        .fetched
        .lock()
        .unwrap()
        .entry(path.to_string())
        .or_default() += 1;

    let remaining = state.revoke_after.load(Ordering::SeqCst);
    if remaining > 0 {
        if remaining == 1 {
            state.tokens.lock().unwrap().clear();
        }
        state.revoke_after.store(remaining - 1, Ordering::SeqCst);
    }

    Json(body).into_response()
}

fn link(path: &str) -> Value {
    json!({ "@odata.id": path })
}

/// A small but complete server: one system, one chassis, one manager.
///
/// The Sensors collection links back to its chassis and the Systems
/// collection lists itself, so the graph contains cycles.
pub fn sample_tree() -> HashMap<String, Value> {
    let mut tree = HashMap::new();
    let mut add = |path: &str, body: Value| {
        tree.insert(path.to_string(), body);
    };

    add(
        "/redfish/v1",
        json!({
            "@odata.id": "/redfish/v1",
            "@odata.type": "#ServiceRoot.v1_5_0.ServiceRoot",
            "Id": "RootService",
            "Systems": link("/redfish/v1/Systems"),
            "Chassis": link("/redfish/v1/Chassis"),
            "Managers": link("/redfish/v1/Managers"),
            "SessionService": link("/redfish/v1/SessionService"),
        }),
    );

    // Systems
    add(
        "/redfish/v1/Systems",
        json!({
            "@odata.type": "#ComputerSystemCollection.ComputerSystemCollection",
            "Members": [link("/redfish/v1/Systems/1/"), link("/redfish/v1/Systems")],
        }),
    );
    add(
        "/redfish/v1/Systems/1",
        json!({
            "@odata.id": "/redfish/v1/Systems/1",
            "@odata.type": "#ComputerSystem.v1_13_0.ComputerSystem",
            "Id": "1",
            "Manufacturer": "Contoso",
            "Model": "R1000",
            "SerialNumber": "SN-0001",
            "BiosVersion": "2.4.1",
            "PowerState": "On",
            "Status": {"State": "Enabled", "Health": "OK"},
            "ProcessorSummary": {"Count": 1},
            "MemorySummary": {"TotalSystemMemoryGiB": 64},
            "Processors": link("/redfish/v1/Systems/1/Processors"),
            "Memory": link("/redfish/v1/Systems/1/Memory"),
            "Storage": link("/redfish/v1/Systems/1/Storage"),
            "Links": {"Chassis": [link("/redfish/v1/Chassis/1")]},
        }),
    );
    add(
        "/redfish/v1/Systems/1/Processors",
        json!({
            "@odata.type": "#ProcessorCollection.ProcessorCollection",
            "Members": [link("/redfish/v1/Systems/1/Processors/CPU0")],
        }),
    );
    add(
        "/redfish/v1/Systems/1/Processors/CPU0",
        json!({
            "@odata.type": "#Processor.v1_10_0.Processor",
            "Id": "CPU0",
            "TotalCores": 16,
            "TotalThreads": 32,
            "MaxSpeedMHz": 3500,
            "Status": {"State": "Enabled", "Health": "OK"},
        }),
    );
    add(
        "/redfish/v1/Systems/1/Memory",
        json!({
            "@odata.type": "#MemoryCollection.MemoryCollection",
            "Members": [link("/redfish/v1/Systems/1/Memory/DIMM0")],
        }),
    );
    add(
        "/redfish/v1/Systems/1/Memory/DIMM0",
        json!({
            "@odata.type": "#Memory.v1_11_0.Memory",
            "Id": "DIMM0",
            "CapacityMiB": 32768,
            "OperatingSpeedMhz": 3200,
            "Status": {"State": "Enabled", "Health": "Warning"},
        }),
    );
    add(
        "/redfish/v1/Systems/1/Storage",
        json!({
            "@odata.type": "#StorageCollection.StorageCollection",
            "Members": [link("/redfish/v1/Systems/1/Storage/RAID")],
        }),
    );
    add(
        "/redfish/v1/Systems/1/Storage/RAID",
        json!({
            "@odata.type": "#Storage.v1_9_0.Storage",
            "Id": "RAID",
            "Status": {"State": "Enabled", "Health": "OK"},
            "StorageControllers": [
                {"MemberId": "0", "Name": "RAID Controller", "Status": {"Health": "OK"}}
            ],
            "Drives": [
                link("/redfish/v1/Systems/1/Storage/RAID/Drives/0"),
                link("/redfish/v1/Systems/1/Storage/RAID/Drives/1"),
            ],
        }),
    );
    add(
        "/redfish/v1/Systems/1/Storage/RAID/Drives/0",
        json!({
            "@odata.type": "#Drive.v1_9_0.Drive",
            "Id": "0",
            "CapacityBytes": 960197124096u64,
            "FailurePredicted": false,
            "PredictedMediaLifeLeftPercent": 97,
            "Status": {"State": "Enabled", "Health": "OK"},
        }),
    );
    add(
        "/redfish/v1/Systems/1/Storage/RAID/Drives/1",
        json!({
            "@odata.type": "#Drive.v1_9_0.Drive",
            "Id": "1",
            "Status": {"State": "Absent"},
        }),
    );

    // Chassis
    add(
        "/redfish/v1/Chassis",
        json!({
            "@odata.type": "#ChassisCollection.ChassisCollection",
            "Members": [link("/redfish/v1/Chassis/1")],
        }),
    );
    add(
        "/redfish/v1/Chassis/1",
        json!({
            "@odata.type": "#Chassis.v1_14_0.Chassis",
            "Id": "1",
            "ChassisType": "RackMount",
            "Manufacturer": "Contoso",
            "Model": "R1000",
            "SerialNumber": "CH-0001",
            "PowerState": "On",
            "Status": {"State": "Enabled", "Health": "OK"},
            "Thermal": link("/redfish/v1/Chassis/1/Thermal"),
            "Power": link("/redfish/v1/Chassis/1/Power"),
            "Sensors": link("/redfish/v1/Chassis/1/Sensors"),
            "Links": {"ComputerSystems": [link("/redfish/v1/Systems/1")]},
        }),
    );
    add(
        "/redfish/v1/Chassis/1/Thermal",
        json!({
            "@odata.type": "#Thermal.v1_7_0.Thermal",
            "Temperatures": [
                {"MemberId": "0", "Name": "CPU1 Temp", "ReadingCelsius": 41, "UpperThresholdCritical": 90,
                 "Status": {"State": "Enabled", "Health": "OK"}},
                {"MemberId": "1", "Name": "Inlet Temp", "ReadingCelsius": 22,
                 "Status": {"State": "Enabled", "Health": "OK"}},
            ],
            "Fans": [
                {"MemberId": "0", "Name": "Fan1", "Reading": 5000, "ReadingUnits": "RPM",
                 "Status": {"State": "Enabled", "Health": "OK"}},
            ],
        }),
    );
    add(
        "/redfish/v1/Chassis/1/Power",
        json!({
            "@odata.type": "#Power.v1_5_0.Power",
            "PowerControl": [
                {"MemberId": "0", "Name": "System Power Control", "PowerConsumedWatts": 250,
                 "PowerCapacityWatts": 800, "PowerMetrics": {"AverageConsumedWatts": 240}},
            ],
            "PowerSupplies": [
                {"MemberId": "0", "Name": "PSU1", "PowerInputWatts": 130, "PowerOutputWatts": 120,
                 "PowerCapacityWatts": 750, "Status": {"State": "Enabled", "Health": "OK"}},
            ],
            "Voltages": [
                {"MemberId": "0", "Name": "12V", "ReadingVolts": 12.1,
                 "Status": {"State": "Enabled", "Health": "OK"}},
            ],
        }),
    );
    add(
        "/redfish/v1/Chassis/1/Sensors",
        json!({
            "@odata.type": "#SensorCollection.SensorCollection",
            "Members": [
                link("/redfish/v1/Chassis/1/Sensors/Pwr_Node_Total"),
                link("/redfish/v1/Chassis/1#/Sensors"),
            ],
        }),
    );
    add(
        "/redfish/v1/Chassis/1/Sensors/Pwr_Node_Total",
        json!({
            "@odata.type": "#Sensor.v1_2_0.Sensor",
            "Id": "Pwr_Node_Total",
            "Reading": 260.5,
            "ReadingType": "Power",
            "ReadingUnits": "W",
            "LifetimeReading": 12345.6,
            "Status": {"State": "Enabled", "Health": "OK"},
        }),
    );

    // Managers
    add(
        "/redfish/v1/Managers",
        json!({
            "@odata.type": "#ManagerCollection.ManagerCollection",
            "Members": [link("/redfish/v1/Managers/BMC")],
        }),
    );
    add(
        "/redfish/v1/Managers/BMC",
        json!({
            "@odata.type": "#Manager.v1_10_0.Manager",
            "Id": "BMC",
            "ManagerType": "BMC",
            "Model": "Contoso BMC",
            "FirmwareVersion": "1.2.3",
            "Status": {"State": "Enabled", "Health": "OK"},
        }),
    );

    tree
}
