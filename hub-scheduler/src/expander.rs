//! Materializes `Job` rows from enabled `Routine`s — spec.md §4.6.
//!
//! Runs on a 60s tick and is also callable directly on routine create/update
//! so a newly-saved routine doesn't wait a full tick for its first job.

use chrono::{DateTime, NaiveDate, Utc};
use hub_store::types::{HolidayBehavior, Routine};
use hub_store::Store;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{next_occurrence, occurrences_within, parse_tz};
use crate::error::Result;

pub const EXPANDER_TICK: Duration = Duration::from_secs(60);
pub const EXPANSION_HORIZON: chrono::Duration = chrono::Duration::hours(48);

fn local_date(at: DateTime<Utc>, timezone: &str) -> NaiveDate {
    at.with_timezone(&parse_tz(timezone)).date_naive()
}

/// Applies `holiday_behavior` to a single candidate. `Run` never checks;
/// `Skip` drops a holiday occurrence; `ShiftToNext` walks forward to the
/// next non-holiday occurrence within the horizon.
fn resolve_holiday(store: &Store, routine: &Routine, candidate: DateTime<Utc>, horizon: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match routine.holiday_behavior {
        HolidayBehavior::Run => Ok(Some(candidate)),
        HolidayBehavior::Skip => {
            if store.is_holiday(local_date(candidate, &routine.timezone))? {
                Ok(None)
            } else {
                Ok(Some(candidate))
            }
        }
        HolidayBehavior::ShiftToNext => {
            let mut cursor = candidate;
            loop {
                if !store.is_holiday(local_date(cursor, &routine.timezone))? {
                    return Ok(Some(cursor));
                }
                match next_occurrence(&routine.schedule, &routine.timezone, cursor) {
                    Some(next) if next <= horizon => cursor = next,
                    _ => return Ok(None),
                }
            }
        }
    }
}

/// Expands one routine, inserting any new `Job` rows. Returns how many were
/// actually inserted (idempotent re-expansion returns fewer or zero).
pub fn expand_routine(store: &Store, routine_id: &str) -> Result<u32> {
    let mut routine = store.get_routine(routine_id)?;
    if !routine.enabled {
        return Ok(0);
    }

    let now = Utc::now();
    let horizon = now + EXPANSION_HORIZON;
    let mut candidates = occurrences_within(&routine.schedule, &routine.timezone, now, horizon);

    if let Some(snooze_until) = routine.snooze_until {
        if snooze_until > now {
            candidates.retain(|c| *c >= snooze_until);
        }
    }

    if routine.skip_next && !candidates.is_empty() {
        candidates.remove(0);
        routine.skip_next = false;
        store.upsert_routine(&routine)?;
    }

    let mut inserted = 0;
    for candidate in candidates {
        if let Some(scheduled_for) = resolve_holiday(store, &routine, candidate, horizon)? {
            if store.create_pending_job(&routine.id, scheduled_for)? {
                inserted += 1;
            }
        }
    }
    Ok(inserted)
}

pub fn expand_all(store: &Store) -> Result<u32> {
    let mut total = 0;
    for routine in store.list_enabled_routines()? {
        total += expand_routine(store, &routine.id)?;
    }
    Ok(total)
}

/// Long-lived background task: ticks `expand_all` every [`EXPANDER_TICK`].
pub async fn run(store: Arc<Store>) {
    let mut interval = tokio::time::interval(EXPANDER_TICK);
    loop {
        interval.tick().await;
        if let Err(e) = expand_all(&store) {
            tracing::warn!(error = %e, "routine expansion failed");
        }
    }
}
