use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use proserve::api::rest::router;
use proserve::collaborators::{InMemoryTenantDirectory, LoggingSink};
use proserve::config::Config;
use proserve::state::AppState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn config() -> Config {
    Config {
        http_port: 0,
        log_level: "info".to_string(),
        event_buffer_size: 64,
        lock_wait_ms: 500,
        default_commission_rate: dec!(20),
    }
}

fn setup() -> axum::Router {
    router(Arc::new(AppState::new(&config())))
}

fn setup_with_tenants() -> (axum::Router, Arc<InMemoryTenantDirectory>) {
    let cfg = config();
    let tenants = Arc::new(InMemoryTenantDirectory::new(cfg.default_commission_rate));
    let state = AppState::with_collaborators(
        &cfg,
        tenants.clone(),
        Arc::new(LoggingSink),
        Arc::new(LoggingSink),
    );
    (router(Arc::new(state)), tenants)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {other:?}"),
    }
}

fn automated_recipient() -> Value {
    json!({
        "mode": "Automated",
        "name": "Jane Roe",
        "street": "19 Court Plaza",
        "city": "Springfield",
        "zip": "62704"
    })
}

fn guided_recipient(agent_id: Uuid) -> Value {
    json!({
        "mode": "Guided",
        "name": "John Doe",
        "street": "4 Docket Drive",
        "city": "Arlington",
        "zip": "22202",
        "agent_id": agent_id
    })
}

fn order_payload(customer_id: Uuid, tenant_id: Uuid, recipients: Value) -> Value {
    json!({
        "customer_id": customer_id,
        "tenant_id": tenant_id,
        "recipients": recipients
    })
}

async fn create_order(app: &axum::Router, payload: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/orders", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(body.contains("orders_tracked"));
}

#[tokio::test]
async fn create_order_requires_recipients() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            order_payload(Uuid::new_v4(), Uuid::new_v4(), json!([])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn create_order_rejects_blank_zip() {
    let app = setup();
    let mut recipient = automated_recipient();
    recipient["zip"] = json!("   ");

    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            order_payload(Uuid::new_v4(), Uuid::new_v4(), json!([recipient])),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn created_order_carries_a_customer_scoped_number() {
    let app = setup();
    let customer_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();

    let first = create_order(
        &app,
        order_payload(customer_id, tenant_id, json!([automated_recipient()])),
    )
    .await;
    let second = create_order(
        &app,
        order_payload(customer_id, tenant_id, json!([automated_recipient()])),
    )
    .await;

    let first_number = first["order_number"].as_str().unwrap();
    let second_number = second["order_number"].as_str().unwrap();
    assert!(first_number.starts_with('C'));
    assert!(first_number.ends_with("-ORD1"));
    assert!(second_number.ends_with("-ORD2"));
    assert_eq!(first["status"], "Open");
    assert_eq!(decimal(&first["customer_payment"]), Decimal::ZERO);
}

#[tokio::test]
async fn guided_order_with_agreed_price_is_priced_at_creation() {
    let app = setup();
    let mut recipient = guided_recipient(Uuid::new_v4());
    recipient["agreed_price"] = json!("200");
    recipient["service_options"] = json!({ "rush": true });

    let order = create_order(
        &app,
        order_payload(Uuid::new_v4(), Uuid::new_v4(), json!([recipient])),
    )
    .await;

    assert_eq!(order["status"], "Assigned");
    let recipient = &order["recipients"][0];
    assert_eq!(recipient["status"], "Assigned");
    assert_eq!(decimal(&recipient["final_price"]), dec!(250));
    assert_eq!(decimal(&order["platform_commission"]), dec!(37.50));
    assert_eq!(decimal(&order["platform_fee"]), dec!(1.88));
    assert_eq!(decimal(&order["tenant_profit"]), dec!(35.62));
    assert_eq!(decimal(&order["agent_payout"]), dec!(250));
    assert_eq!(decimal(&order["customer_payment"]), dec!(289.38));
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let app = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn competing_bids_settle_into_one_winner() {
    let (app, tenants) = setup_with_tenants();
    let customer_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    tenants.set_rate(tenant_id, dec!(15));

    let order = create_order(
        &app,
        order_payload(customer_id, tenant_id, json!([automated_recipient()])),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/bids"),
            json!({ "agent_id": Uuid::new_v4(), "amount": "100", "comment": "same day" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["status"], "Bidding");
    let winning_bid = order["recipients"][0]["bids"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/bids"),
            json!({ "agent_id": Uuid::new_v4(), "amount": "120" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/bids/{winning_bid}/accept"),
            json!({ "customer_id": customer_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;

    assert_eq!(order["status"], "Assigned");
    assert_eq!(decimal(&order["agent_payout"]), dec!(85.00));
    assert_eq!(decimal(&order["platform_commission"]), dec!(15.00));
    assert_eq!(decimal(&order["platform_fee"]), dec!(0.75));
    assert_eq!(decimal(&order["tenant_profit"]), dec!(14.25));
    assert_eq!(decimal(&order["customer_payment"]), dec!(100.00));

    let bids = order["recipients"][0]["bids"].as_array().unwrap();
    assert_eq!(bids[0]["status"], "Accepted");
    assert_eq!(bids[1]["status"], "Rejected");

    // The losing bid can no longer be accepted.
    let losing_bid = bids[1]["id"].as_str().unwrap();
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/bids/{losing_bid}/accept"),
            json!({ "customer_id": customer_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn two_recipient_order_assigns_step_by_step() {
    let app = setup();
    let customer_id = Uuid::new_v4();

    let order = create_order(
        &app,
        order_payload(
            customer_id,
            Uuid::new_v4(),
            json!([automated_recipient(), automated_recipient()]),
        ),
    )
    .await;

    let mut statuses = Vec::new();
    for recipient in order["recipients"].as_array().unwrap() {
        let recipient_id = recipient["id"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/recipients/{recipient_id}/bids"),
                json!({ "agent_id": Uuid::new_v4(), "amount": "50" }),
            ))
            .await
            .unwrap();
        let order = body_json(response).await;
        let bid_id = order["recipients"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["id"] == recipient["id"])
            .unwrap()["bids"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/bids/{bid_id}/accept"),
                json!({ "customer_id": customer_id }),
            ))
            .await
            .unwrap();
        let order = body_json(response).await;
        statuses.push(order["status"].as_str().unwrap().to_string());
    }

    assert_eq!(statuses, vec!["PartiallyAssigned", "Assigned"]);
}

#[tokio::test]
async fn negotiation_flow_settles_on_the_counter_offer() {
    let app = setup();
    let customer_id = Uuid::new_v4();
    let agent_id = Uuid::new_v4();

    let mut recipient = guided_recipient(agent_id);
    recipient["service_options"] = json!({ "rush": true });
    let order = create_order(
        &app,
        order_payload(customer_id, Uuid::new_v4(), json!([recipient])),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/proposals"),
            json!({ "agent_id": agent_id, "amount": "200", "notes": "gated community" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    let negotiation_id = order["recipients"][0]["negotiations"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/negotiations/{negotiation_id}/counter"),
            json!({ "customer_id": customer_id, "amount": "180" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/negotiations/{negotiation_id}/accept"),
            json!({ "party": "Agent", "actor_id": agent_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;

    let negotiation = &order["recipients"][0]["negotiations"][0];
    assert_eq!(negotiation["status"], "Accepted");
    assert_eq!(decimal(&order["recipients"][0]["final_price"]), dec!(230.00));
    assert_eq!(decimal(&order["agent_payout"]), dec!(230));
}

#[tokio::test]
async fn repeat_proposal_supersedes_the_pending_one() {
    let app = setup();
    let agent_id = Uuid::new_v4();
    let order = create_order(
        &app,
        order_payload(
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!([guided_recipient(agent_id)]),
        ),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    for amount in ["150", "140"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/recipients/{recipient_id}/proposals"),
                json!({ "agent_id": agent_id, "amount": amount }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let order = body_json(
        app.oneshot(get_request(&format!(
            "/orders/{}",
            order["id"].as_str().unwrap()
        )))
        .await
        .unwrap(),
    )
    .await;

    let negotiations = order["recipients"][0]["negotiations"].as_array().unwrap();
    assert_eq!(negotiations.len(), 2);
    assert_eq!(negotiations[0]["status"], "Rejected");
    assert_eq!(negotiations[1]["status"], "Pending");
    assert_eq!(decimal(&negotiations[1]["proposed_amount"]), dec!(140));
}

#[tokio::test]
async fn attempts_exhaust_into_failure_at_the_cap() {
    let app = setup();
    let agent_id = Uuid::new_v4();
    let mut recipient = guided_recipient(agent_id);
    recipient["agreed_price"] = json!("100");

    let order = create_order(
        &app,
        order_payload(Uuid::new_v4(), Uuid::new_v4(), json!([recipient])),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    let attempt = json!({
        "agent_id": agent_id,
        "successful": false,
        "location": { "lat": 39.7817, "lng": -89.6501 }
    });

    for round in 1..=4u32 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/recipients/{recipient_id}/attempts"),
                attempt.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let order = body_json(response).await;
        assert_eq!(order["recipients"][0]["attempt_count"], round);
        assert_eq!(order["recipients"][0]["status"], "InProgress");
        assert_eq!(order["status"], "InProgress");
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/attempts"),
            attempt.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;
    assert_eq!(order["recipients"][0]["status"], "Failed");
    assert_eq!(order["status"], "Failed");

    // The recipient is settled; further attempts conflict.
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/attempts"),
            attempt,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn successful_attempt_completes_the_order() {
    let app = setup();
    let agent_id = Uuid::new_v4();
    let mut recipient = guided_recipient(agent_id);
    recipient["agreed_price"] = json!("100");

    let order = create_order(
        &app,
        order_payload(Uuid::new_v4(), Uuid::new_v4(), json!([recipient])),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/attempts"),
            json!({
                "agent_id": agent_id,
                "successful": true,
                "notes": "served at front door",
                "location": { "lat": 39.7817, "lng": -89.6501 },
                "photo_ref": "proof/123.jpg"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let order = body_json(response).await;

    assert_eq!(order["recipients"][0]["status"], "Delivered");
    assert_eq!(order["status"], "Completed");
    assert!(order["recipients"][0]["delivered_at"].is_string());
}

#[tokio::test]
async fn recalculation_reproduces_accumulated_totals() {
    let (app, tenants) = setup_with_tenants();
    let customer_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    tenants.set_rate(tenant_id, dec!(17.5));

    let order = create_order(
        &app,
        order_payload(customer_id, tenant_id, json!([automated_recipient()])),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/bids"),
            json!({ "agent_id": Uuid::new_v4(), "amount": "87.90" }),
        ))
        .await
        .unwrap();
    let order = body_json(response).await;
    let bid_id = order["recipients"][0]["bids"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/bids/{bid_id}/accept"),
            json!({ "customer_id": customer_id }),
        ))
        .await
        .unwrap();
    let accepted = body_json(response).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/recalculate"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recalculated = body_json(response).await;

    for field in [
        "customer_payment",
        "agent_payout",
        "platform_commission",
        "platform_fee",
        "tenant_profit",
    ] {
        assert_eq!(
            decimal(&recalculated[field]),
            decimal(&accepted[field]),
            "{field} drifted under recalculation"
        );
    }
}

#[tokio::test]
async fn bid_on_guided_recipient_conflicts() {
    let app = setup();
    let order = create_order(
        &app,
        order_payload(
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!([guided_recipient(Uuid::new_v4())]),
        ),
    )
    .await;
    let recipient_id = order["recipients"][0]["id"].as_str().unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/recipients/{recipient_id}/bids"),
            json!({ "agent_id": Uuid::new_v4(), "amount": "60" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_STATE");
}
