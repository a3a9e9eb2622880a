use time::Date;
use tracing::error;

use crate::engine::{Allocator, EngineError};
use crate::model::{TimeLabel, format_date};

/// A normalized inbound command. Normalization is trim + lowercase; the
/// transport passes raw message text through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// "agendar" — offer the free slots for the bookable date.
    ListSlots,
    /// "reagendar" — show the current booking plus the free slots.
    ShowBooking,
    /// A bare HH:MM token — book or reschedule depending on state.
    PickTime(TimeLabel),
    /// Anything else.
    Help,
}

pub fn parse(text: &str) -> Command {
    let normalized = text.trim().to_lowercase();
    match normalized.as_str() {
        "agendar" => Command::ListSlots,
        "reagendar" => Command::ShowBooking,
        other => match TimeLabel::parse(other) {
            Some(time) => Command::PickTime(time),
            None => Command::Help,
        },
    }
}

const HELP: &str =
    "Comandos: \"agendar\" para marcar um horário, \"reagendar\" para alterar um agendamento.";
const NO_BOOKING: &str =
    "Você não tem nenhum agendamento. Deseja agendar? Responda \"agendar\".";
const UNAVAILABLE: &str = "Serviço indisponível no momento. Tente novamente em instantes.";

fn join_times(times: &[TimeLabel]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps commands to allocator calls and renders the reply text. The routing
/// contract: a bare time books when the identity is unbooked and reschedules
/// when it already holds a slot — decided by `current_booking`, never by
/// message history.
#[derive(Clone)]
pub struct Interpreter {
    allocator: Allocator,
}

impl Interpreter {
    pub fn new(allocator: Allocator) -> Self {
        Self { allocator }
    }

    pub async fn handle(&self, identity: &str, text: &str, date: Date) -> String {
        match parse(text) {
            Command::ListSlots => self.reply_list(date).await,
            Command::ShowBooking => self.reply_show_booking(identity, date).await,
            Command::PickTime(time) => self.reply_pick_time(identity, date, time).await,
            Command::Help => HELP.to_string(),
        }
    }

    async fn reply_list(&self, date: Date) -> String {
        match self.allocator.list_available(date).await {
            Ok(times) if times.is_empty() => "Nenhum horário disponível no momento.".to_string(),
            Ok(times) => format!(
                "Horários disponíveis para {}: {}. Responda com o horário desejado (ex.: 10:00).",
                format_date(date),
                join_times(&times)
            ),
            Err(e) => self.service_error("list", &e),
        }
    }

    async fn reply_show_booking(&self, identity: &str, date: Date) -> String {
        let booking = match self.allocator.current_booking(identity).await {
            Ok(booking) => booking,
            Err(e) => return self.service_error("show_booking", &e),
        };
        let Some(booking) = booking else {
            return NO_BOOKING.to_string();
        };
        match self.allocator.list_available(date).await {
            Ok(times) if times.is_empty() => {
                "Nenhum horário disponível para reagendar.".to_string()
            }
            Ok(times) => format!(
                "Seu agendamento atual: {} em {}. Horários disponíveis: {}. Responda com o novo horário.",
                booking.time,
                format_date(booking.date),
                join_times(&times)
            ),
            Err(e) => self.service_error("show_booking", &e),
        }
    }

    async fn reply_pick_time(&self, identity: &str, date: Date, time: TimeLabel) -> String {
        let booked = match self.allocator.current_booking(identity).await {
            Ok(booking) => booking.is_some(),
            Err(e) => return self.service_error("pick_time", &e),
        };
        if booked {
            self.reply_reschedule(identity, date, time).await
        } else {
            self.reply_book(identity, date, time).await
        }
    }

    async fn reply_book(&self, identity: &str, date: Date, time: TimeLabel) -> String {
        match self.allocator.book(identity, date, time).await {
            Ok(slot) => format!(
                "Agendamento confirmado para {} às {}!",
                format_date(slot.date),
                slot.time
            ),
            Err(EngineError::SlotTaken) => "Horário indisponível. Tente outro.".to_string(),
            Err(EngineError::SlotUnknown) => format!(
                "O horário {time} não existe na agenda de {}. Responda \"agendar\" para ver os horários.",
                format_date(date)
            ),
            Err(e) => self.service_error("book", &e),
        }
    }

    async fn reply_reschedule(&self, identity: &str, date: Date, time: TimeLabel) -> String {
        match self.allocator.reschedule(identity, date, time).await {
            Ok(slot) => format!(
                "Reagendamento concluído! Novo horário: {} em {}.",
                slot.time,
                format_date(slot.date)
            ),
            // The known gap — the old slot is already gone, say so.
            Err(EngineError::NewSlotTaken) => format!(
                "O horário antigo foi liberado, mas {time} não está mais disponível. Responda \"agendar\" para marcar um novo horário."
            ),
            Err(EngineError::ReleaseFailed) => {
                "Não foi possível alterar seu agendamento agora. Tente novamente.".to_string()
            }
            Err(EngineError::NoExistingBooking) => NO_BOOKING.to_string(),
            Err(e) => self.service_error("reschedule", &e),
        }
    }

    fn service_error(&self, op: &str, e: &EngineError) -> String {
        // Operator-facing detail goes to the log, the user gets a generic reply.
        error!("{op} failed: {e}");
        UNAVAILABLE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    use crate::engine::Allocator;
    use crate::store::SlotStore;

    fn t(s: &str) -> TimeLabel {
        TimeLabel::parse(s).unwrap()
    }

    #[test]
    fn parse_normalizes() {
        assert_eq!(parse("  AGENDAR  "), Command::ListSlots);
        assert_eq!(parse("Reagendar"), Command::ShowBooking);
        assert_eq!(parse("10:00"), Command::PickTime(t("10:00")));
        assert_eq!(parse(" 14:30 "), Command::PickTime(t("14:30")));
    }

    #[test]
    fn parse_falls_back_to_help() {
        assert_eq!(parse("oi"), Command::Help);
        assert_eq!(parse("99:99"), Command::Help);
        assert_eq!(parse("10:00 amanhã"), Command::Help);
        assert_eq!(parse(""), Command::Help);
    }

    async fn interpreter(times: &[&str]) -> Interpreter {
        let store = SlotStore::open_in_memory().unwrap();
        let labels: Vec<TimeLabel> = times.iter().map(|s| t(s)).collect();
        store
            .ensure_day_seeded(date!(2024 - 01 - 02), &labels)
            .await
            .unwrap();
        Interpreter::new(Allocator::new(store))
    }

    const D: Date = date!(2024 - 01 - 02);

    #[tokio::test]
    async fn agendar_lists_free_slots() {
        let it = interpreter(&["11:00", "10:00"]).await;
        let reply = it.handle("p1", "agendar", D).await;
        assert!(reply.contains("10:00, 11:00"), "reply: {reply}");
        assert!(reply.contains("2024-01-02"));
    }

    #[tokio::test]
    async fn agendar_with_nothing_free() {
        let it = interpreter(&["10:00"]).await;
        it.handle("p1", "10:00", D).await;
        let reply = it.handle("p2", "agendar", D).await;
        assert_eq!(reply, "Nenhum horário disponível no momento.");
    }

    #[tokio::test]
    async fn bare_time_books_when_unbooked() {
        let it = interpreter(&["10:00", "11:00"]).await;
        let reply = it.handle("p1", "10:00", D).await;
        assert!(reply.starts_with("Agendamento confirmado"), "reply: {reply}");

        let reply = it.handle("p2", "10:00", D).await;
        assert_eq!(reply, "Horário indisponível. Tente outro.");
    }

    #[tokio::test]
    async fn bare_time_reschedules_when_booked() {
        let it = interpreter(&["10:00", "11:00"]).await;
        it.handle("p1", "10:00", D).await;
        let reply = it.handle("p1", "11:00", D).await;
        assert!(reply.starts_with("Reagendamento concluído"), "reply: {reply}");

        // The old slot is free again.
        let reply = it.handle("p2", "agendar", D).await;
        assert!(reply.contains(": 10:00. Responda"), "reply: {reply}");
        assert!(!reply.contains("11:00"), "reply: {reply}");
    }

    #[tokio::test]
    async fn reagendar_without_booking() {
        let it = interpreter(&["10:00"]).await;
        let reply = it.handle("p1", "reagendar", D).await;
        assert_eq!(reply, NO_BOOKING);
    }

    #[tokio::test]
    async fn reagendar_shows_current_and_free() {
        let it = interpreter(&["10:00", "11:00"]).await;
        it.handle("p1", "10:00", D).await;
        let reply = it.handle("p1", "reagendar", D).await;
        assert!(reply.contains("Seu agendamento atual: 10:00"), "reply: {reply}");
        assert!(reply.contains("11:00"), "reply: {reply}");
    }

    #[tokio::test]
    async fn reschedule_gap_gets_a_distinct_reply() {
        let it = interpreter(&["10:00", "11:00"]).await;
        it.handle("p1", "10:00", D).await;
        it.handle("p2", "11:00", D).await;

        let reply = it.handle("p1", "11:00", D).await;
        assert!(reply.contains("horário antigo foi liberado"), "reply: {reply}");

        // p1 is now unbooked and 10:00 is free again.
        let reply = it.handle("p1", "reagendar", D).await;
        assert_eq!(reply, NO_BOOKING);
    }

    #[tokio::test]
    async fn unknown_time_is_reported() {
        let it = interpreter(&["10:00"]).await;
        let reply = it.handle("p1", "12:00", D).await;
        assert!(reply.contains("não existe na agenda"), "reply: {reply}");
    }

    #[tokio::test]
    async fn anything_else_yields_help() {
        let it = interpreter(&["10:00"]).await;
        let reply = it.handle("p1", "bom dia", D).await;
        assert_eq!(reply, HELP);
    }
}
