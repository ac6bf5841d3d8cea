//! Both protocol adapters must produce identical behavior.
//!
//! The same scenario is driven once over REST and once over the RPC
//! socket, against two gateways backed by identically scripted backends.
//! The normalized transcripts (ids, execution classes, error codes,
//! audit event kinds) must match exactly.

mod common;

use common::{gateway, Script, ScriptedSdk};

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use qmt_gateway::adapters::{rest, rpc::RpcServer};
use qmt_gateway::{Gateway, OperatingMode};

/// One normalized transcript of the scenario, transport-independent.
#[derive(Debug, PartialEq)]
struct Transcript {
    session_state: String,
    order_id: String,
    execution_class: String,
    orders_listed: usize,
    cancel_status: String,
    close_state: String,
    second_close_code: String,
    audit_kinds: Vec<String>,
}

fn audit_kinds(gateway: &Gateway) -> Vec<String> {
    gateway
        .audit_tail(100)
        .iter()
        .map(|r| {
            serde_json::to_value(r).unwrap()["kind"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect()
}

async fn run_rest_scenario(gw: Arc<Gateway>) -> Transcript {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_gw = gw.clone();
    let server = tokio::spawn(async move {
        rest::serve(server_gw, listener, async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    let base = format!("http://{addr}/api/v1/trading");
    let client = reqwest::Client::new();

    let session: Value = client
        .post(format!("{base}/connect"))
        .json(&json!({"account_id": "acct-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let receipt: Value = client
        .post(format!("{base}/order/{session_id}"))
        .json(&json!({
            "stock_code": "600519.SH",
            "side": "BUY",
            "volume": 100,
            "price": "1710.50"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let orders: Value = client
        .get(format!("{base}/orders/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let cancel: Value = client
        .post(format!("{base}/cancel/{session_id}"))
        .json(&json!({"order_id": order_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let close: Value = client
        .post(format!("{base}/disconnect/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let second_close = client
        .post(format!("{base}/disconnect/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(second_close.status(), reqwest::StatusCode::NOT_FOUND);
    let second_close: Value = second_close.json().await.unwrap();

    let _ = shutdown_tx.send(());
    let _ = server.await;

    Transcript {
        session_state: session["state"].as_str().unwrap().to_string(),
        order_id,
        execution_class: receipt["execution_class"].as_str().unwrap().to_string(),
        orders_listed: orders.as_array().unwrap().len(),
        cancel_status: cancel["status"].as_str().unwrap().to_string(),
        close_state: close["state"].as_str().unwrap().to_string(),
        second_close_code: second_close["error_code"].as_str().unwrap().to_string(),
        audit_kinds: audit_kinds(&gw),
    }
}

struct RpcClient {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    write: tokio::net::tcp::OwnedWriteHalf,
    next_id: u64,
}

impl RpcClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
            next_id: 1,
        }
    }

    async fn call(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let mut line =
            serde_json::to_vec(&json!({"id": id, "method": method, "params": params})).unwrap();
        line.push(b'\n');
        self.write.write_all(&line).await.unwrap();

        let response: Value =
            serde_json::from_str(&self.lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response["id"].as_u64().unwrap(), id);
        response
    }
}

async fn run_rpc_scenario(gw: Arc<Gateway>) -> Transcript {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RpcServer::new(gw.clone());
    let shutdown = server.shutdown_handle();
    let server = tokio::spawn(async move { server.run(listener).await });

    let mut client = RpcClient::connect(addr).await;

    let session = client
        .call("session.open", json!({"account_id": "acct-1"}))
        .await["result"]
        .clone();
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let receipt = client
        .call(
            "order.submit",
            json!({
                "session_id": session_id,
                "stock_code": "600519.SH",
                "side": "BUY",
                "volume": 100,
                "price": "1710.50"
            }),
        )
        .await["result"]
        .clone();
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let orders = client
        .call("order.list", json!({"session_id": session_id}))
        .await["result"]
        .clone();

    let cancel = client
        .call(
            "order.cancel",
            json!({"session_id": session_id, "order_id": order_id}),
        )
        .await["result"]
        .clone();

    let close = client
        .call("session.close", json!({"session_id": session_id}))
        .await["result"]
        .clone();

    let second_close = client
        .call("session.close", json!({"session_id": session_id}))
        .await["error"]
        .clone();

    let _ = shutdown.send(());
    let _ = server.await;

    Transcript {
        session_state: session["state"].as_str().unwrap().to_string(),
        order_id,
        execution_class: receipt["execution_class"].as_str().unwrap().to_string(),
        orders_listed: orders.as_array().unwrap().len(),
        cancel_status: cancel["status"].as_str().unwrap().to_string(),
        close_state: close["state"].as_str().unwrap().to_string(),
        second_close_code: second_close["error_code"].as_str().unwrap().to_string(),
        audit_kinds: audit_kinds(&gw),
    }
}

#[tokio::test]
async fn adapters_agree_in_disabled_mode() {
    let rest_gw = gateway(OperatingMode::Disabled, ScriptedSdk::new(Script::Healthy));
    let rpc_gw = gateway(OperatingMode::Disabled, ScriptedSdk::new(Script::Healthy));

    let rest = run_rest_scenario(rest_gw).await;
    let rpc = run_rpc_scenario(rpc_gw).await;

    assert_eq!(rest, rpc);
    assert_eq!(rest.execution_class, "simulated");
    // Identical inputs yield identical simulated ids on both transports.
    assert_eq!(rest.order_id, "sim-1000");
}

#[tokio::test]
async fn adapters_agree_in_live_mode() {
    let rest_gw = gateway(OperatingMode::Live, ScriptedSdk::new(Script::Healthy));
    let rpc_gw = gateway(OperatingMode::Live, ScriptedSdk::new(Script::Healthy));

    let rest = run_rest_scenario(rest_gw).await;
    let rpc = run_rpc_scenario(rpc_gw).await;

    assert_eq!(rest, rpc);
    assert_eq!(rest.execution_class, "real");
    assert_eq!(rest.order_id, "qmt-1");
    assert_eq!(rest.second_close_code, "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn adapters_agree_on_validation_failures() {
    let rest_gw = gateway(OperatingMode::Disabled, ScriptedSdk::new(Script::Healthy));
    let rpc_gw = gateway(OperatingMode::Disabled, ScriptedSdk::new(Script::Healthy));

    // REST side.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_gw = rest_gw.clone();
    let server = tokio::spawn(async move {
        rest::serve(server_gw, listener, async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    let client = reqwest::Client::new();
    let session: serde_json::Value = client
        .post(format!("http://{addr}/api/v1/trading/connect"))
        .json(&json!({"account_id": "acct-1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = client
        .post(format!(
            "http://{addr}/api/v1/trading/order/{}",
            session["session_id"].as_str().unwrap()
        ))
        .json(&json!({"stock_code": "AAPL", "side": "BUY", "volume": 100, "price": "10"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let rest_err: Value = response.json().await.unwrap();
    let _ = shutdown_tx.send(());
    let _ = server.await;

    // RPC side.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RpcServer::new(rpc_gw);
    let shutdown = server.shutdown_handle();
    let server = tokio::spawn(async move { server.run(listener).await });

    let mut rpc = RpcClient::connect(addr).await;
    let session = rpc.call("session.open", json!({"account_id": "acct-1"})).await["result"].clone();
    let rpc_err = rpc
        .call(
            "order.submit",
            json!({
                "session_id": session["session_id"].as_str().unwrap(),
                "stock_code": "AAPL",
                "side": "BUY",
                "volume": 100,
                "price": "10"
            }),
        )
        .await["error"]
        .clone();
    let _ = shutdown.send(());
    let _ = server.await;

    assert_eq!(rest_err["error_code"], rpc_err["error_code"]);
    assert_eq!(rest_err["error_code"], "INVALID_ORDER");
}
