use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use solderp_api::app::{build_app, services::AppServices};
use solderp_invoicing::TaxRate;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory database, ephemeral port.
        let pool = solderp_infra::db::connect_in_memory()
            .await
            .expect("failed to open in-memory database");
        let tax = TaxRate::from_bps(825).unwrap();
        let app = build_app(Arc::new(AppServices::new(pool, tax)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Receive and pass `qty` units so they land on hand.
async fn stock(client: &reqwest::Client, server: &TestServer, ipn: &str, qty: i64) {
    let res = client
        .post(server.url("/receiving/inspections"))
        .json(&json!({"po_id": "PO-7001", "po_line_id": 1, "ipn": ipn, "qty_received": qty}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let inspection: Value = res.json().await.unwrap();
    let id = inspection["id"].as_str().unwrap();

    let res = client
        .post(server.url(&format!("/receiving/inspections/{id}/dispose")))
        .json(&json!({"qty_passed": qty, "qty_failed": 0, "qty_on_hold": 0, "inspector": "qa-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn advance(client: &reqwest::Client, server: &TestServer, id: &str, stage: &str) -> reqwest::Response {
    client
        .post(server.url(&format!("/sales/orders/{id}/{stage}")))
        .header("x-actor", "alice")
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn order_lifecycle_end_to_end() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    stock(&client, &server, "IC-STM32F4", 10).await;

    let res = client
        .post(server.url("/sales/orders"))
        .header("x-actor", "alice")
        .json(&json!({
            "customer": "Acme Robotics",
            "quote_ref": "Q-19",
            "lines": [{"ipn": "IC-STM32F4", "qty": 4, "unit_price": 999}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["status"], "draft");
    let id = order["id"].as_str().unwrap().to_string();

    for (stage, status) in [
        ("confirm", "confirmed"),
        ("allocate", "allocated"),
        ("pick", "picked"),
        ("ship", "shipped"),
        ("invoice", "invoiced"),
    ] {
        let res = advance(&client, &server, &id, stage).await;
        assert_eq!(res.status(), StatusCode::OK, "stage {stage}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], status);
    }

    let record: Value = client
        .get(server.url("/inventory/IC-STM32F4"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["qty_on_hand"], 6);
    assert_eq!(record["qty_reserved"], 0);

    let shipment = client
        .get(server.url(&format!("/sales/orders/{id}/shipment")))
        .send()
        .await
        .unwrap();
    assert_eq!(shipment.status(), StatusCode::OK);

    let invoice: Value = client
        .get(server.url(&format!("/sales/orders/{id}/invoice")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(invoice["total"], 3996);
    assert_eq!(invoice["tax"], 330);
    assert_eq!(invoice["status"], "open");

    let invoice_id = invoice["id"].as_str().unwrap();
    let recomputed: Value = client
        .post(server.url(&format!("/sales/invoices/{invoice_id}/recompute")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recomputed["total"], 3996);

    let audit: Vec<Value> = client
        .get(server.url(&format!("/sales/orders/{id}/audit")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(audit.iter().filter(|e| e["action"] == "confirmed").all(|e| e["actor"] == "alice"));
    assert_eq!(audit.last().unwrap()["action"], "invoiced");
}

#[tokio::test]
async fn skipping_a_stage_is_a_conflict() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let order: Value = client
        .post(server.url("/sales/orders"))
        .json(&json!({"customer": "Acme", "lines": [{"ipn": "R-10K-0603", "qty": 1, "unit_price": 2}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = order["id"].as_str().unwrap();

    let res = advance(&client, &server, id, "ship").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    advance(&client, &server, id, "confirm").await;
    let res = advance(&client, &server, id, "allocate").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_inventory");

    let current: Value = client
        .get(server.url(&format!("/sales/orders/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["status"], "confirmed");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/sales/orders/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(server.url("/sales/orders/0192b7a4-7b5e-7c3e-9a2b-1f2e3d4c5b6a"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/inventory/NOPE-1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(server.url("/sales/orders"))
        .json(&json!({"customer": "Acme", "lines": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn disposition_happens_once() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let inspection: Value = client
        .post(server.url("/receiving/inspections"))
        .json(&json!({"po_id": "PO-88", "po_line_id": 3, "ipn": "C-100N-0402", "qty_received": 100}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = inspection["id"].as_str().unwrap();

    let pending: Vec<Value> = client
        .get(server.url("/receiving/inspections?pending=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let disposition = json!({"qty_passed": 90, "qty_failed": 10, "qty_on_hold": 0, "inspector": "qa-2"});
    let res = client
        .post(server.url(&format!("/receiving/inspections/{id}/dispose")))
        .json(&disposition)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["ncr_id"].is_string());
    assert_eq!(body["inspection"]["inspector"], "qa-2");

    let res = client
        .post(server.url(&format!("/receiving/inspections/{id}/dispose")))
        .json(&disposition)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let record: Value = client
        .get(server.url("/inventory/C-100N-0402"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["qty_on_hand"], 90);

    let txns: Vec<Value> = client
        .get(server.url("/inventory/C-100N-0402/transactions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0]["txn_type"], "receive");
}

#[tokio::test]
async fn out_of_range_quantities_are_bad_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let inspection: Value = client
        .post(server.url("/receiving/inspections"))
        .json(&json!({"po_id": "PO-91", "po_line_id": 1, "ipn": "L-10UH", "qty_received": 100}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = inspection["id"].as_str().unwrap();

    let res = client
        .post(server.url(&format!("/receiving/inspections/{id}/dispose")))
        .json(&json!({"qty_passed": i64::MAX, "qty_failed": 1, "qty_on_hold": 0, "inspector": "qa-3"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/inventory/L-10UH/adjust"))
        .json(&json!({"qty_delta": i64::MAX}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let line = json!({"ipn": "L-10UH", "qty": 1_000_000_000i64, "unit_price": 1_000_000_000i64});
    let res = client
        .post(server.url("/sales/orders"))
        .json(&json!({"customer": "Acme", "lines": vec![line; 10]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adjust_and_reorder_thresholds() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    stock(&client, &server, "D-1N4148", 20).await;

    let res = client
        .put(server.url("/inventory/D-1N4148/reorder"))
        .json(&json!({"reorder_point": 25, "reorder_qty": 500}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let low: Vec<Value> = client
        .get(server.url("/inventory/low-stock"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(low.len(), 1);

    let res = client
        .post(server.url("/inventory/D-1N4148/adjust"))
        .json(&json!({"qty_delta": -30, "notes": "cycle count"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(server.url("/inventory/D-1N4148/adjust"))
        .json(&json!({"qty_delta": -5, "notes": "cycle count"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let record: Value = res.json().await.unwrap();
    assert_eq!(record["qty_on_hand"], 15);
}

#[tokio::test]
async fn oversized_actor_header_is_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/inventory"))
        .header("x-actor", "a".repeat(100))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_actor");
}
