use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Contention loss on a fresh claim — the slot is already held.
    SlotTaken,
    /// The (date, time) pair was never seeded.
    SlotUnknown,
    /// Reschedule attempted with nothing to move.
    NoExistingBooking,
    /// Reschedule released the old slot but lost the race for the new one.
    /// The identity is left unbooked.
    NewSlotTaken,
    /// Someone else cleared the booking between lookup and release.
    ReleaseFailed,
    /// Storage-layer failure; the request fails, no partial state is assumed.
    Store(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::SlotTaken => write!(f, "slot already taken"),
            EngineError::SlotUnknown => write!(f, "no such slot"),
            EngineError::NoExistingBooking => write!(f, "no existing booking"),
            EngineError::NewSlotTaken => {
                write!(f, "new slot taken after old booking was released")
            }
            EngineError::ReleaseFailed => write!(f, "booking vanished before release"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e.to_string())
    }
}
