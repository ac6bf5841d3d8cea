//! Protocol adapters.
//!
//! Two transports front the same `Gateway`: a REST adapter and a
//! line-delimited JSON RPC adapter. Both translate their wire shapes to
//! gateway calls and back; neither contains any decision logic, so an
//! operation has the same side effects regardless of which door it came
//! through. The request/response DTOs are shared between the two for the
//! same reason.

pub mod rest;
pub mod rpc;

use serde::{Deserialize, Serialize};

use qmt_common::OrderTicket;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionRequest {
    pub account_id: String,
    #[serde(default)]
    pub credentials: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitOrderRequest {
    #[serde(flatten)]
    pub ticket: OrderTicket,
}

/// Wire shape of every adapter-level error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
}

impl From<&crate::error::GatewayError> for ErrorBody {
    fn from(err: &crate::error::GatewayError) -> Self {
        Self {
            error_code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
