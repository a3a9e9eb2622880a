use std::time::Instant;

use axum::Router;
use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{self, Interpreter};
use crate::engine::Allocator;
use crate::model::{format_date, parse_date};
use crate::observability;
use crate::policy::SlotPolicy;

#[derive(Clone)]
pub struct AppState {
    pub interpreter: Interpreter,
    pub allocator: Allocator,
    pub policy: SlotPolicy,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sms", post(sms))
        .route("/slots", get(slots))
        .with_state(state)
}

/// Twilio-style inbound message: urlencoded form with `From` and `Body`.
#[derive(Deserialize)]
pub struct SmsForm {
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Body", default)]
    body: String,
}

async fn sms(State(state): State<AppState>, Form(form): Form<SmsForm>) -> impl IntoResponse {
    let date = state.policy.bookable_date();
    let label = observability::command_label(&command::parse(&form.body));
    debug!("inbound sms command: {label}");

    let start = Instant::now();
    let reply = state.interpreter.handle(&form.from, &form.body, date).await;
    metrics::counter!(observability::COMMANDS_TOTAL, "command" => label).increment(1);
    metrics::histogram!(observability::COMMAND_DURATION_SECONDS, "command" => label)
        .record(start.elapsed().as_secs_f64());

    ([(header::CONTENT_TYPE, "text/xml")], twiml(&reply))
}

#[derive(Deserialize)]
struct SlotsQuery {
    date: Option<String>,
}

#[derive(Serialize)]
struct SlotsResponse {
    date: String,
    free: Vec<String>,
}

/// Operator endpoint: free slots for a day as JSON. Defaults to the
/// bookable date.
async fn slots(State(state): State<AppState>, Query(query): Query<SlotsQuery>) -> Response {
    let date = match &query.date {
        Some(raw) => match parse_date(raw) {
            Some(date) => date,
            None => {
                return (StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD").into_response();
            }
        },
        None => state.policy.bookable_date(),
    };
    match state.allocator.list_available(date).await {
        Ok(times) => axum::Json(SlotsResponse {
            date: format_date(date),
            free: times.iter().map(ToString::to_string).collect(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("slots query failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

/// Minimal TwiML reply document.
pub fn twiml(reply: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        xml_escape(reply)
    )
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
