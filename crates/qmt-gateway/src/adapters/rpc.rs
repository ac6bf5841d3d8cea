//! RPC adapter: newline-delimited JSON over TCP.
//!
//! Each line from the client is one request `{"id", "method", "params"}`;
//! each response line is `{"id", "result"}` or `{"id", "error"}`. The
//! method table maps one-to-one onto `Gateway` methods, mirroring the
//! REST routes, so the two transports cannot drift apart in behavior.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use qmt_common::OrderTicket;

use crate::error::GatewayError;
use crate::gateway::Gateway;

use super::{ErrorBody, OpenSessionRequest};

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    /// `None` (serialized as null) when the request line could not be
    /// parsed, so it never collides with a legitimate id.
    id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl RpcResponse {
    fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<u64>, error_code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                error_code: error_code.to_string(),
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderParams {
    session_id: String,
    #[serde(flatten)]
    ticket: OrderTicket,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    session_id: String,
    order_id: String,
}

#[derive(Debug, Deserialize)]
struct AuditParams {
    #[serde(default = "default_audit_limit")]
    limit: usize,
}

fn default_audit_limit() -> usize {
    100
}

pub struct RpcServer {
    gateway: Arc<Gateway>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RpcServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            gateway,
            shutdown_tx,
        }
    }

    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept connections until shutdown is triggered.
    pub async fn run(&self, listener: TcpListener) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "RPC adapter listening");
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            debug!(%addr, "RPC client connected");
                            let gateway = self.gateway.clone();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = serve_connection(gateway, stream, shutdown_rx).await {
                                    warn!(%addr, error = %e, "RPC connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept RPC connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("RPC adapter shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}

async fn serve_connection(
    gateway: Arc<Gateway>,
    stream: TcpStream,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_line(&gateway, &line).await;
                let mut payload = serde_json::to_vec(&response)?;
                payload.push(b'\n');
                write_half.write_all(&payload).await?;
            }
            _ = shutdown_rx.recv() => break,
        }
    }
    Ok(())
}

async fn handle_line(gateway: &Gateway, line: &str) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return RpcResponse::err(None, "INVALID_REQUEST", format!("malformed request: {e}"))
        }
    };
    let id = request.id;
    match dispatch(gateway, request).await {
        Ok(result) => RpcResponse::ok(id, result),
        Err(DispatchError::Gateway(e)) => RpcResponse::err(Some(id), e.code(), e.to_string()),
        Err(DispatchError::Params(msg)) => RpcResponse::err(Some(id), "INVALID_REQUEST", msg),
        Err(DispatchError::UnknownMethod(method)) => {
            RpcResponse::err(Some(id), "UNKNOWN_METHOD", format!("unknown method: {method}"))
        }
    }
}

enum DispatchError {
    Gateway(GatewayError),
    Params(String),
    UnknownMethod(String),
}

impl From<GatewayError> for DispatchError {
    fn from(e: GatewayError) -> Self {
        DispatchError::Gateway(e)
    }
}

fn params<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, DispatchError> {
    serde_json::from_value(value).map_err(|e| DispatchError::Params(format!("bad params: {e}")))
}

fn json<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value)
        .map_err(|e| DispatchError::Gateway(GatewayError::Internal(e.to_string())))
}

async fn dispatch(gateway: &Gateway, request: RpcRequest) -> Result<Value, DispatchError> {
    match request.method.as_str() {
        "status" => json(&gateway.status()),
        "session.open" => {
            let p: OpenSessionRequest = params(request.params)?;
            json(&gateway.open_session(&p.account_id, p.credentials.as_deref()).await?)
        }
        "session.close" => {
            let p: SessionParams = params(request.params)?;
            json(&gateway.close_session(&p.session_id).await?)
        }
        "session.get" => {
            let p: SessionParams = params(request.params)?;
            json(&gateway.session(&p.session_id)?)
        }
        "session.list" => json(&gateway.sessions()),
        "order.submit" => {
            let p: OrderParams = params(request.params)?;
            json(&gateway.submit_order(&p.session_id, p.ticket).await?)
        }
        "order.cancel" => {
            let p: CancelParams = params(request.params)?;
            json(&gateway.cancel_order(&p.session_id, &p.order_id).await?)
        }
        "order.list" => {
            let p: SessionParams = params(request.params)?;
            json(&gateway.orders(&p.session_id)?)
        }
        "query.asset" => {
            let p: SessionParams = params(request.params)?;
            json(&gateway.query_asset(&p.session_id).await?)
        }
        "query.positions" => {
            let p: SessionParams = params(request.params)?;
            json(&gateway.query_positions(&p.session_id).await?)
        }
        "audit.tail" => {
            let p: AuditParams = params(request.params)?;
            json(&gateway.audit_tail(p.limit))
        }
        other => Err(DispatchError::UnknownMethod(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeQmtSdk;
    use crate::config::GatewayConfig;
    use crate::policy::OperatingMode;

    fn gateway() -> Arc<Gateway> {
        let config = GatewayConfig {
            mode: OperatingMode::Disabled,
            ..GatewayConfig::default()
        };
        Gateway::new(&config, Arc::new(NativeQmtSdk::new("127.0.0.1:1")))
    }

    #[tokio::test]
    async fn test_malformed_line_gets_null_id_not_a_real_one() {
        let gw = gateway();
        let response = handle_line(&gw, "not json").await;
        assert_eq!(response.error.unwrap().error_code, "INVALID_REQUEST");
        // id 0 is a legal request id, so unparseable frames answer null.
        assert!(response.id.is_none());
        assert!(serde_json::to_string(&handle_line(&gw, "not json").await)
            .unwrap()
            .contains("\"id\":null"));
    }

    #[tokio::test]
    async fn test_id_zero_is_echoed_back_verbatim() {
        let gw = gateway();
        let response = handle_line(&gw, r#"{"id":0,"method":"status","params":{}}"#).await;
        assert_eq!(response.id, Some(0));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let gw = gateway();
        let response =
            handle_line(&gw, r#"{"id":1,"method":"order.teleport","params":{}}"#).await;
        let error = response.error.unwrap();
        assert_eq!(error.error_code, "UNKNOWN_METHOD");
        assert_eq!(response.id, Some(1));
    }

    #[tokio::test]
    async fn test_session_round_trip_through_dispatch() {
        let gw = gateway();
        let response = handle_line(
            &gw,
            r#"{"id":7,"method":"session.open","params":{"account_id":"acct-1"}}"#,
        )
        .await;
        let result = response.result.unwrap();
        let session_id = result["session_id"].as_str().unwrap().to_string();
        assert_eq!(result["state"], "active");

        let close = handle_line(
            &gw,
            &format!(r#"{{"id":8,"method":"session.close","params":{{"session_id":"{session_id}"}}}}"#),
        )
        .await;
        assert!(close.error.is_none());

        // Second close surfaces the gateway error code verbatim.
        let again = handle_line(
            &gw,
            &format!(r#"{{"id":9,"method":"session.close","params":{{"session_id":"{session_id}"}}}}"#),
        )
        .await;
        assert_eq!(again.error.unwrap().error_code, "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_order_submit_params_flatten_ticket() {
        let gw = gateway();
        let open = handle_line(
            &gw,
            r#"{"id":1,"method":"session.open","params":{"account_id":"acct-1"}}"#,
        )
        .await;
        let session_id = open.result.unwrap()["session_id"].as_str().unwrap().to_string();

        let submit = handle_line(
            &gw,
            &format!(
                r#"{{"id":2,"method":"order.submit","params":{{"session_id":"{session_id}","stock_code":"600519.SH","side":"BUY","volume":100,"price":"1710.50"}}}}"#
            ),
        )
        .await;
        let result = submit.result.unwrap();
        assert_eq!(result["execution_class"], "simulated");
        assert!(result["order_id"].as_str().unwrap().starts_with("sim-"));
    }
}
