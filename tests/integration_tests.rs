use base64::{Engine, prelude::BASE64_STANDARD};
use mockito::Matcher;
use mundipagg::{
    ApiRequest, AuthMode, Configuration, Dispatcher, Envelope, Fault, HttpMethod, Outcome,
    codec,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomer {
    name: String,
    email: String,
    home_phone: Phone,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Phone {
    country_code: String,
    area_code: String,
    number: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Customer {
    id: String,
    name: String,
    email: String,
}

fn config(url: &str) -> Configuration {
    let mut config = Configuration::new("sk_test_123")
        .with_api_url(url)
        .with_timeout(Duration::from_secs(5));
    config.account_management_key = "acc_test_456".to_string();
    config.api_token = "tok_test_789".to_string();
    config.request_key = "req-42".to_string();
    config.merchant_id = "merch_1".to_string();
    config
}

fn dispatcher(url: &str) -> Dispatcher {
    Dispatcher::new(config(url)).expect("client builds")
}

fn basic(user: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(format!("{user}:")))
}

fn customer() -> CreateCustomer {
    CreateCustomer {
        name: "Tony Stark".to_string(),
        email: "tony@avengers.com".to_string(),
        home_phone: Phone {
            country_code: "55".to_string(),
            area_code: "21".to_string(),
            number: "000000000".to_string(),
        },
    }
}

#[test]
fn test_post_success_populates_data() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/customers")
        .match_header("authorization", basic("sk_test_123").as_str())
        .match_header("user-agent", "Mundipagg Rust SDK")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "name": "Tony Stark",
            "email": "tony@avengers.com",
            "home_phone": { "country_code": "55", "area_code": "21", "number": "000000000" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"cus_1","name":"Tony Stark","email":"tony@avengers.com"}"#)
        .create();

    let body = customer();
    let envelope: Envelope<Customer> = dispatcher(&server.url()).send(ApiRequest::post("/customers").json(&body));

    mock.assert();
    assert_eq!(envelope.status, Some(200));
    assert!(envelope.is_success());
    assert_eq!(envelope.raw_request.as_deref(), Some(codec::encode(&body).unwrap().as_str()));
    assert!(envelope.raw_response.is_some());
    assert_eq!(
        envelope.data(),
        Some(&Customer {
            id: "cus_1".to_string(),
            name: "Tony Stark".to_string(),
            email: "tony@avengers.com".to_string(),
        })
    );
    assert!(envelope.errors().is_none());
    assert!(envelope.fault().is_none());
}

#[test]
fn test_get_never_sends_body() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/customers/cus_1")
        .match_body(Matcher::Exact(String::new()))
        .with_status(200)
        .with_body(r#"{"id":"cus_1","name":"Tony Stark","email":"tony@avengers.com"}"#)
        .create();

    let envelope: Envelope<Customer> = dispatcher(&server.url())
        .send(ApiRequest::new(HttpMethod::Get, "/customers/cus_1").json(&customer()));

    mock.assert();
    assert!(envelope.raw_request.is_none());
    assert_eq!(envelope.data().map(|c| c.id.as_str()), Some("cus_1"));
}

#[test]
fn test_query_and_headers_are_sent() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/charges")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("status".into(), "paid".into()),
            Matcher::Regex("^(page|status)=[^&]*&(page|status)=[^&]*$".into()),
        ]))
        .match_header("idempotency-key", "abc-123")
        .with_status(200)
        .with_body(r#"{"data":[],"paging":{"total":0}}"#)
        .create();

    let envelope: Envelope<Value> = dispatcher(&server.url()).send(
        ApiRequest::get("/charges")
            .query("page", "2")
            .query("status", "paid")
            .query("customer_id", "   ")
            .query_opt("code", None::<String>)
            .header("Idempotency-Key", "abc-123"),
    );

    mock.assert();
    assert_eq!(envelope.data().unwrap()["paging"]["total"], 0);
}

#[test]
fn test_auth_modes_select_credentials() {
    let mut server = mockito::Server::new();
    let amk = server
        .mock("GET", "/merchants")
        .match_header("authorization", basic("acc_test_456").as_str())
        .with_status(200)
        .with_body("{}")
        .create();
    let token = server
        .mock("GET", "/tokens")
        .match_header("authorization", basic("tok_test_789").as_str())
        .with_status(200)
        .with_body("{}")
        .create();
    let fallback = server
        .mock("GET", "/orders")
        .match_header("authorization", basic("sk_test_123").as_str())
        .with_status(200)
        .with_body("{}")
        .create();

    let dispatcher = dispatcher(&server.url());
    let _: Envelope<Value> = dispatcher.send(ApiRequest::get("/merchants").auth(AuthMode::AccountManagementKey));
    let _: Envelope<Value> = dispatcher.send(ApiRequest::get("/tokens").auth_selector(Some("token")));
    let _: Envelope<Value> = dispatcher.send(ApiRequest::get("/orders").auth_selector(Some("admin")));

    amk.assert();
    token.assert();
    fallback.assert();
}

#[test]
fn test_api_error_populates_errors() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/customers")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "message": "The request is invalid.",
                "errors": { "customer.email": ["The email field is not a valid e-mail address."] },
                "request": { "name": "Tony Stark", "email": "nope" }
            }"#,
        )
        .create();

    let envelope: Envelope<Customer> =
        dispatcher(&server.url()).send(ApiRequest::post("/customers").json(&json!({ "email": "nope" })));

    assert_eq!(envelope.status, Some(422));
    assert!(!envelope.is_success());
    assert!(envelope.data().is_none());
    let errors = envelope.errors().expect("error payload");
    assert_eq!(errors.message.as_deref(), Some("The request is invalid."));
    assert_eq!(
        errors.errors["customer.email"],
        vec!["The email field is not a valid e-mail address.".to_string()]
    );
    assert_eq!(errors.request.as_ref().unwrap()["email"], "nope");
}

#[test]
fn test_unauthorized_with_null_errors_is_a_failure() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/customers")
        .with_status(401)
        .with_body(r#"{"message":"Authorization has been denied for this request.","errors":null}"#)
        .create();

    let envelope: Envelope<Customer> = dispatcher(&server.url()).send(ApiRequest::get("/customers"));

    assert_eq!(envelope.status, Some(401));
    let errors = envelope.errors().expect("error payload");
    assert_eq!(
        errors.message.as_deref(),
        Some("Authorization has been denied for this request.")
    );
    assert!(errors.errors.is_empty());
}

#[test]
fn test_failure_with_empty_body_is_ambiguous() {
    let mut server = mockito::Server::new();
    server.mock("DELETE", "/customers/cus_1").with_status(500).create();

    let envelope: Envelope<Customer> = dispatcher(&server.url()).send(ApiRequest::delete("/customers/cus_1"));

    assert_eq!(envelope.status, Some(500));
    assert_eq!(envelope.outcome, Outcome::Empty);
    assert!(!envelope.is_success());
    assert!(envelope.data().is_none());
    assert!(envelope.errors().is_none());
}

#[test]
fn test_success_with_empty_body() {
    let mut server = mockito::Server::new();
    server.mock("DELETE", "/cards/card_1").with_status(204).create();

    let envelope: Envelope<Value> = dispatcher(&server.url()).send(ApiRequest::delete("/cards/card_1"));

    assert_eq!(envelope.status, Some(204));
    assert_eq!(envelope.outcome, Outcome::Empty);
    assert!(envelope.is_success());
}

#[test]
fn test_undecodable_success_body_is_a_fault() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/customers/cus_1")
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create();

    let envelope: Envelope<Customer> = dispatcher(&server.url()).send(ApiRequest::get("/customers/cus_1"));

    assert_eq!(envelope.status, Some(200));
    assert_eq!(envelope.raw_response.as_deref(), Some("<html>maintenance</html>"));
    assert!(matches!(envelope.fault(), Some(Fault::Decode { .. })));
}

#[test]
fn test_connection_failure_is_captured() {
    // Nothing listens on port 1.
    let envelope: Envelope<Customer> = dispatcher("http://127.0.0.1:1").send(ApiRequest::get("/customers"));

    assert_eq!(envelope.status, None);
    assert!(envelope.raw_response.is_none());
    assert!(envelope.data().is_none());
    assert!(envelope.errors().is_none());
    assert!(matches!(
        envelope.fault(),
        Some(Fault::Connect { .. } | Fault::Transport { .. })
    ));
}

#[test]
fn test_invalid_header_is_captured() {
    let envelope: Envelope<Value> =
        dispatcher("http://127.0.0.1:1").send(ApiRequest::get("/customers").header("bad header", "x"));

    assert_eq!(
        envelope.fault(),
        Some(&Fault::InvalidHeader {
            name: "bad header".to_string()
        })
    );
}

#[test]
fn test_timeout_is_captured() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/slow")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(800));
            w.write_all(b"{}")
        })
        .create();

    let dispatcher =
        Dispatcher::new(config(&server.url()).with_timeout(Duration::from_millis(100))).unwrap();
    let envelope: Envelope<Value> = dispatcher.send(ApiRequest::get("/slow"));

    assert!(envelope.fault().is_some());
    assert!(envelope.data().is_none());
}

#[test]
fn test_elapsed_time_covers_round_trip() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/orders/or_1")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(60));
            w.write_all(br#"{"id":"or_1"}"#)
        })
        .create();

    let envelope: Envelope<Value> = dispatcher(&server.url()).send(ApiRequest::get("/orders/or_1"));

    assert!(envelope.is_success());
    assert!(envelope.elapsed_ms >= 60, "elapsed {}ms", envelope.elapsed_ms);
}

#[test]
fn test_dispatcher_is_shared_across_threads() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/balance")
        .with_status(200)
        .with_body(r#"{"available_amount":100}"#)
        .expect(4)
        .create();

    let dispatcher = dispatcher(&server.url());
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let envelope: Envelope<Value> = dispatcher.send(ApiRequest::get("/balance"));
                assert_eq!(envelope.data().unwrap()["available_amount"], 100);
            });
        }
    });

    mock.assert();
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_logs_never_contain_card_data() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/orders")
        .with_status(200)
        .with_body(
            r#"{"id":"or_1","charges":[{"last_transaction":{"card":{"number":"4111111111111111","cvv":"CVV-XYZ"}}}]}"#,
        )
        .create();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let body = json!({
        "customer_id": "cus_1",
        "payments": [{
            "payment_method": "credit_card",
            "credit_card": {
                "card": {
                    "number": "4111111111111111",
                    "holder_name": "Tony Stark",
                    "exp_month": 12,
                    "exp_year": 2099,
                    "cvv": "CVV-XYZ"
                }
            }
        }],
        "token": "tok_SECRET"
    });

    let dispatcher = dispatcher(&server.url());
    let envelope: Envelope<Value> = tracing::subscriber::with_default(subscriber, || {
        dispatcher.send(ApiRequest::post("/orders").json(&body))
    });

    assert!(envelope.is_success());
    let output = logs.contents();
    assert!(output.contains("req-42"), "correlation id missing: {output}");
    assert!(output.contains("merch_1"));
    assert!(output.contains("******"));
    assert!(!output.contains("4111111111111111"), "card number leaked: {output}");
    assert!(!output.contains("CVV-XYZ"), "cvv leaked: {output}");
    assert!(!output.contains("tok_SECRET"), "token leaked: {output}");
    assert!(!output.contains("sk_test_123"), "credential leaked: {output}");
}

#[derive(Debug, Deserialize)]
struct Charge {
    #[allow(dead_code)]
    card: ChargeCard,
}

#[derive(Debug, Deserialize)]
struct ChargeCard {
    #[allow(dead_code)]
    number: u64,
}

#[test]
fn test_decode_fault_log_does_not_quote_card_data() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/charges/ch_1")
        .with_status(200)
        .with_body(r#"{"card":{"number":"4111111111111111"}}"#)
        .create();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let dispatcher = dispatcher(&server.url());
    let envelope: Envelope<Charge> = tracing::subscriber::with_default(subscriber, || {
        dispatcher.send(ApiRequest::get("/charges/ch_1"))
    });

    let fault = envelope.fault().expect("decode fault");
    assert!(matches!(fault, Fault::Decode { .. }));
    assert!(!fault.to_string().contains("4111111111111111"));

    let output = logs.contents();
    assert!(output.contains("Request failed"), "fault not logged: {output}");
    assert!(!output.contains("4111111111111111"), "card number leaked: {output}");
}
