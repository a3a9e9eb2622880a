mod error;

pub use error::EngineError;

use time::Date;

use crate::model::{Slot, TimeLabel};
use crate::observability;
use crate::store::{ClaimOutcome, SlotStore};

/// The slot-allocation state machine. Per identity the state is derived
/// from the store: unbooked, or booked into exactly one slot. All mutation
/// goes through the store's two atomic primitives (`claim_if_free`,
/// `release_by_occupant`); the allocator adds the sequencing that keeps an
/// identity on at most one slot.
#[derive(Clone)]
pub struct Allocator {
    store: SlotStore,
}

impl Allocator {
    pub fn new(store: SlotStore) -> Self {
        Self { store }
    }

    /// Free labels for `date`, ascending. Pure read, no state change.
    pub async fn list_available(&self, date: Date) -> Result<Vec<TimeLabel>, EngineError> {
        Ok(self.store.list_free(date).await?)
    }

    /// The booking for `identity`, derived as the unique slot it occupies.
    pub async fn current_booking(&self, identity: &str) -> Result<Option<Slot>, EngineError> {
        Ok(self.store.find_by_occupant(identity).await?)
    }

    /// Claim a slot for `identity`. Does not check for an existing booking —
    /// callers route book vs reschedule first. No side effect on failure.
    pub async fn book(
        &self,
        identity: &str,
        date: Date,
        time: TimeLabel,
    ) -> Result<Slot, EngineError> {
        match self.store.claim_if_free(date, time, identity).await? {
            ClaimOutcome::Claimed => Ok(Slot {
                date,
                time,
                occupant: Some(identity.to_string()),
            }),
            ClaimOutcome::Occupied => {
                metrics::counter!(observability::CLAIM_CONFLICTS_TOTAL).increment(1);
                Err(EngineError::SlotTaken)
            }
            ClaimOutcome::Unknown => Err(EngineError::SlotUnknown),
        }
    }

    /// Move the existing booking of `identity` to (date, time).
    ///
    /// Sequential policy: release the old slot, then claim the new one.
    /// If the new claim loses, the identity ends up unbooked — that gap is
    /// surfaced as `NewSlotTaken` so callers can say so explicitly.
    pub async fn reschedule(
        &self,
        identity: &str,
        new_date: Date,
        new_time: TimeLabel,
    ) -> Result<Slot, EngineError> {
        if self.store.find_by_occupant(identity).await?.is_none() {
            return Err(EngineError::NoExistingBooking);
        }

        let released = self.store.release_by_occupant(identity).await?;
        if released == 0 {
            // Concurrent interference: the booking was cleared under us.
            return Err(EngineError::ReleaseFailed);
        }

        match self.store.claim_if_free(new_date, new_time, identity).await? {
            ClaimOutcome::Claimed => Ok(Slot {
                date: new_date,
                time: new_time,
                occupant: Some(identity.to_string()),
            }),
            ClaimOutcome::Occupied | ClaimOutcome::Unknown => {
                metrics::counter!(observability::CLAIM_CONFLICTS_TOTAL).increment(1);
                Err(EngineError::NewSlotTaken)
            }
        }
    }
}
