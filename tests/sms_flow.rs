use slotline::command::Interpreter;
use slotline::engine::Allocator;
use slotline::model::format_date;
use slotline::policy::SlotPolicy;
use slotline::store::SlotStore;
use slotline::webhook::{self, AppState};

async fn start_server(db_name: &str) -> (String, SlotPolicy) {
    let dir = std::env::temp_dir().join("slotline_test_http");
    std::fs::create_dir_all(&dir).unwrap();
    let db = dir.join(db_name);
    let _ = std::fs::remove_file(&db);

    let policy = SlotPolicy::default();
    let store = SlotStore::open(&db).unwrap();
    store
        .ensure_day_seeded(policy.bookable_date(), &policy.times)
        .await
        .unwrap();

    let allocator = Allocator::new(store);
    let state = AppState {
        interpreter: Interpreter::new(allocator.clone()),
        allocator,
        policy: policy.clone(),
    };
    let app = webhook::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), policy)
}

async fn send_sms(client: &reqwest::Client, base: &str, from: &str, body: &str) -> String {
    let response = client
        .post(format!("{base}/sms"))
        .form(&[("From", from), ("Body", body)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/xml"
    );
    response.text().await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn full_booking_flow_over_http() {
    let (base, _policy) = start_server("full_flow.db").await;
    let client = reqwest::Client::new();
    let p1 = "+5511999990001";
    let p2 = "+5511999990002";

    // Offer the seeded day.
    let reply = send_sms(&client, &base, p1, "agendar").await;
    assert!(reply.contains("10:00, 11:00, 14:00, 15:00"), "reply: {reply}");

    // P1 books 10:00; P2 loses the same slot.
    let reply = send_sms(&client, &base, p1, "10:00").await;
    assert!(reply.contains("Agendamento confirmado"), "reply: {reply}");
    let reply = send_sms(&client, &base, p2, "10:00").await;
    assert!(reply.contains("indisponível"), "reply: {reply}");

    // The offer no longer includes 10:00 (the trailing "ex.: 10:00" hint
    // is always present, so pin the list segment).
    let reply = send_sms(&client, &base, p2, "agendar").await;
    assert!(reply.contains(": 11:00, 14:00, 15:00. Responda"), "reply: {reply}");

    // P1 reschedules onto 11:00.
    let reply = send_sms(&client, &base, p1, "reagendar").await;
    assert!(reply.contains("Seu agendamento atual: 10:00"), "reply: {reply}");
    let reply = send_sms(&client, &base, p1, "11:00").await;
    assert!(reply.contains("Reagendamento concluído"), "reply: {reply}");

    // 10:00 is recycled.
    let reply = send_sms(&client, &base, p2, "agendar").await;
    assert!(reply.contains(": 10:00, 14:00, 15:00. Responda"), "reply: {reply}");
    assert!(!reply.contains("11:00"), "reply: {reply}");

    // Unknown text and malformed times get the help reply.
    let reply = send_sms(&client, &base, p2, "bom dia").await;
    assert!(reply.contains("Comandos:"), "reply: {reply}");
    let reply = send_sms(&client, &base, p2, "99:99").await;
    assert!(reply.contains("Comandos:"), "reply: {reply}");
}

#[tokio::test(flavor = "multi_thread")]
async fn slots_endpoint_reports_free_times() {
    let (base, policy) = start_server("slots_endpoint.db").await;
    let client = reqwest::Client::new();

    send_sms(&client, &base, "+5511999990003", "14:00").await;

    let body: serde_json::Value = client
        .get(format!("{base}/slots"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["date"], format_date(policy.bookable_date()));
    let free: Vec<String> = body["free"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(free, vec!["10:00", "11:00", "15:00"]);

    let response = client
        .get(format!("{base}/slots?date=not-a-date"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
