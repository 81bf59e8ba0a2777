//! Whitelist-aware client for the Proxmox VE management API.
//!
//! Every operation that targets a single VM checks the whitelist before a
//! request is built, so a refused VM never causes network traffic. The
//! inventory is fetched fresh on every call; nothing is cached.
//!
//! ## Authentication
//!
//! Requests carry an API token header:
//!
//! ```text
//! Authorization: PVEAPIToken=bot@pve!chat=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
//! ```

use std::future::Future;
use std::time::Duration;

use facet::Facet;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;

use crate::config::ProxmoxConfig;
use crate::error::GateError;
use crate::whitelist::Whitelist;

// ── Wire types ──────────────────────────────────────────────────────

/// One entry of the cluster inventory (`/cluster/resources?type=vm`).
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct VmSummary {
    #[facet(default)]
    pub vmid: u32,
    #[facet(default)]
    pub name: String,
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub node: String,
    /// `qemu` or `lxc`
    #[facet(default)]
    #[facet(rename = "type")]
    pub kind: String,
}

impl VmSummary {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Point-in-time status of one VM (`/nodes/{node}/qemu/{vmid}/status/current`).
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct VmStatus {
    #[facet(default)]
    pub vmid: u32,
    #[facet(default)]
    pub name: String,
    #[facet(default)]
    pub status: String,
    #[facet(default)]
    pub qmpstatus: Option<String>,
    /// Seconds since boot; 0 when stopped.
    #[facet(default)]
    pub uptime: u64,
    /// Fraction of allotted CPU in use, 0.0..=1.0 per core.
    #[facet(default)]
    pub cpu: f64,
    #[facet(default)]
    pub mem: u64,
    #[facet(default)]
    pub maxmem: u64,
}

impl VmStatus {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

#[derive(Debug, Facet)]
struct InventoryResponse {
    data: Vec<VmSummary>,
}

#[derive(Debug, Facet)]
struct StatusResponse {
    data: VmStatus,
}

/// Power actions answer with the UPID of the task they queued.
#[derive(Debug, Default, Facet)]
#[facet(default)]
struct TaskResponse {
    #[facet(default)]
    data: Option<String>,
}

// ── VmApi trait ─────────────────────────────────────────────────────

/// Power actions the dispatcher can request for a single VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    /// Ask the guest OS to power down cleanly.
    Shutdown,
    /// Pull the plug.
    Stop,
}

impl PowerAction {
    pub fn endpoint_suffix(self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Shutdown => "shutdown",
            PowerAction::Stop => "stop",
        }
    }
}

/// Operations the dispatcher needs from the hypervisor.
///
/// Implementations enforce the whitelist themselves: targeted operations on
/// an id for which `is_allowed` is false must fail with
/// `GateError::NotAuthorized` without contacting the hypervisor.
pub trait VmApi: Send + Sync + 'static {
    fn is_allowed(&self, vmid: u32) -> bool;

    /// Whitelisted VMs from the live inventory, in inventory order.
    fn list_vms(&self) -> impl Future<Output = Result<Vec<VmSummary>, GateError>> + Send;

    fn status(&self, vmid: u32) -> impl Future<Output = Result<VmStatus, GateError>> + Send;

    fn power(
        &self,
        vmid: u32,
        action: PowerAction,
    ) -> impl Future<Output = Result<(), GateError>> + Send;

    /// Case-insensitive exact name match over `list_vms()`.
    ///
    /// Names are not unique. On collision the first entry in inventory
    /// order wins, and Proxmox does not guarantee that order.
    fn find_vm_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<VmSummary, GateError>> + Send {
        async move {
            let vms = self.list_vms().await?;
            find_by_name(vms, name)
        }
    }
}

pub(crate) fn find_by_name(vms: Vec<VmSummary>, name: &str) -> Result<VmSummary, GateError> {
    let wanted = name.to_lowercase();
    vms.into_iter()
        .find(|vm| vm.name.to_lowercase() == wanted)
        .ok_or_else(|| GateError::NotFound {
            name: name.to_string(),
        })
}

// ── ProxmoxClient ───────────────────────────────────────────────────

/// HTTP client for one node of a Proxmox cluster.
///
/// Cheap to share: the inner `reqwest::Client` pools connections and is
/// safe to use from concurrent tasks.
pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: String,
    node: String,
    auth_header: String,
    timeout_s: u64,
    whitelist: Whitelist,
}

impl ProxmoxClient {
    pub fn new(config: &ProxmoxConfig, whitelist: Whitelist) -> Result<Self, GateError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .map_err(|source| GateError::HttpClient { source })?;

        if config.accept_invalid_certs {
            tracing::warn!(url = %config.url, "TLS certificate validation is disabled");
        }

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            node: config.node.clone(),
            auth_header: format!("PVEAPIToken={}={}", config.token_id, config.secret),
            timeout_s: config.timeout_s,
            whitelist,
        })
    }

    fn ensure_allowed(&self, vmid: u32) -> Result<(), GateError> {
        if self.whitelist.contains(vmid) {
            Ok(())
        } else {
            tracing::info!(vmid, "refused VM outside whitelist");
            Err(GateError::NotAuthorized { vmid })
        }
    }

    fn vm_endpoint(&self, vmid: u32, tail: &str) -> String {
        format!("/nodes/{}/qemu/{vmid}/status/{tail}", self.node)
    }

    fn transport_error(&self, endpoint: &str, source: reqwest::Error) -> GateError {
        if source.is_timeout() {
            GateError::Timeout {
                endpoint: endpoint.to_string(),
                secs: self.timeout_s,
            }
        } else {
            GateError::RemoteTransport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    /// Issue one request and return the body of a successful response.
    async fn request(&self, method: Method, endpoint: &str) -> Result<String, GateError> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::debug!(%method, endpoint, "proxmox request");

        let resp = self
            .http
            .request(method, &url)
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "proxmox request failed");
            return Err(GateError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

fn decode_error(endpoint: &str, e: impl std::fmt::Display) -> GateError {
    GateError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

impl VmApi for ProxmoxClient {
    fn is_allowed(&self, vmid: u32) -> bool {
        self.whitelist.contains(vmid)
    }

    async fn list_vms(&self) -> Result<Vec<VmSummary>, GateError> {
        let endpoint = "/cluster/resources?type=vm";
        let body = self.request(Method::GET, endpoint).await?;
        let resp: InventoryResponse =
            facet_json::from_str(&body).map_err(|e| decode_error(endpoint, e))?;

        Ok(resp
            .data
            .into_iter()
            .filter(|vm| self.whitelist.contains(vm.vmid))
            .collect())
    }

    async fn status(&self, vmid: u32) -> Result<VmStatus, GateError> {
        self.ensure_allowed(vmid)?;
        let endpoint = self.vm_endpoint(vmid, "current");
        let body = self.request(Method::GET, &endpoint).await?;
        let resp: StatusResponse =
            facet_json::from_str(&body).map_err(|e| decode_error(&endpoint, e))?;
        Ok(resp.data)
    }

    async fn power(&self, vmid: u32, action: PowerAction) -> Result<(), GateError> {
        self.ensure_allowed(vmid)?;
        let endpoint = self.vm_endpoint(vmid, action.endpoint_suffix());
        let body = self.request(Method::POST, &endpoint).await?;

        // The task id is informational; an unexpected body is not an error
        // once Proxmox has accepted the request.
        let upid = match facet_json::from_str::<TaskResponse>(&body) {
            Ok(task) => task.data,
            Err(e) => {
                tracing::debug!(
                    endpoint = %endpoint,
                    error = %e,
                    body = %body,
                    "unexpected task response"
                );
                None
            }
        };
        tracing::info!(
            vmid,
            action = action.endpoint_suffix(),
            upid = ?upid,
            "power action queued"
        );
        Ok(())
    }
}

impl ProxmoxClient {
    pub async fn start(&self, vmid: u32) -> Result<(), GateError> {
        self.power(vmid, PowerAction::Start).await
    }

    pub async fn shutdown(&self, vmid: u32) -> Result<(), GateError> {
        self.power(vmid, PowerAction::Shutdown).await
    }

    /// Forced stop.
    pub async fn stop(&self, vmid: u32) -> Result<(), GateError> {
        self.power(vmid, PowerAction::Stop).await
    }
}
