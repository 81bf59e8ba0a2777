use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("invalid VM id in whitelist: '{entry}'")]
    #[diagnostic(help("allowed_vms is a comma-separated list of numeric VM ids, e.g. \"100,101\""))]
    InvalidWhitelistEntry { entry: String },

    #[error("failed to build HTTP client")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },

    /// Target VM is not in the whitelist. Raised before any request is sent.
    #[error("VM {vmid} is not allowed")]
    NotAuthorized { vmid: u32 },

    #[error("VM '{name}' not found")]
    NotFound { name: String },

    #[error("invalid VM reference: {message}")]
    Parse { message: String },

    /// Proxmox answered with a non-success status.
    #[error("Proxmox API error: {status} - {body}")]
    RemoteStatus { status: u16, body: String },

    /// The request never produced a response.
    #[error("request to {endpoint} failed: {source}")]
    RemoteTransport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("request to {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    #[error("unknown command '{action}'")]
    UnknownCommand { action: String },

    #[error("failed to encode {what}: {message}")]
    Encode { what: String, message: String },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
