//! Wire format spoken with the automation bridge.
//!
//! One JSON object per line in each direction. Every request carries an `id`
//! which the bridge echoes back so a stale or out-of-order reply is caught.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::OpenSignature;
use crate::error::{ConvertError, Result};

/// Operation requested from the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Attach,
    Create { prog_id: String },
    SetVisible { visible: bool },
    Revision,
    CloseAll,
    Open { path: PathBuf, signature: OpenSignature },
    SaveAs { handle: u64, path: PathBuf },
    CloseDoc { title: String },
    ExitApp,
}

/// A numbered request line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub op: Op,
}

/// A reply line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    /// Turn a reply to request `expected_id` into its value or an error
    pub fn into_result(self, expected_id: u64) -> Result<serde_json::Value> {
        if self.id != expected_id {
            return Err(ConvertError::bridge(format!(
                "reply id {} does not match request id {}",
                self.id, expected_id
            )));
        }
        if self.ok {
            Ok(self.value)
        } else {
            Err(ConvertError::engine(
                self.error.unwrap_or_else(|| "unspecified engine failure".to_string()),
            ))
        }
    }
}

/// COM registration name for an application version
pub fn prog_id(version: Option<u32>) -> String {
    match version {
        Some(v) => format!("SldWorks.Application.{}", v),
        None => "SldWorks.Application".to_string(),
    }
}
