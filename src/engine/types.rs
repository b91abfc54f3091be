use serde::{Deserialize, Serialize};

/// Opaque id of a document opened inside an engine session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle(pub u64);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BridgeRequest {
    Open {
        path: String,
        read_only: bool,
        with_window: bool,
    },
    PageCount {
        doc: u64,
    },
    Export {
        doc: u64,
        index: u32,
        path: String,
        format: String,
    },
    Close {
        doc: u64,
    },
    Quit,
}

impl BridgeRequest {
    pub fn op(&self) -> &'static str {
        match self {
            BridgeRequest::Open { .. } => "open",
            BridgeRequest::PageCount { .. } => "page_count",
            BridgeRequest::Export { .. } => "export",
            BridgeRequest::Close { .. } => "close",
            BridgeRequest::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeReply {
    pub ok: bool,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub doc: Option<u64>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}
