use crate::db::repository::DispatchKind;
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for repository operations.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    /// Derived-query fingerprint (hex) → number of derivations.
    pub fingerprints: BTreeMap<String, u64>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            entities: BTreeMap::new(),
            fingerprints: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Dispatch entrypoints, per kind
    pub default_calls: u64,
    pub find_derived_calls: u64,
    pub delete_derived_calls: u64,
    pub explicit_query_calls: u64,
    pub explicit_delete_calls: u64,
    pub find_all_calls: u64,
    pub literal_query_calls: u64,
    pub object_method_calls: u64,
    pub unknown_calls: u64,

    // Rows handed back to callers
    pub rows_returned: u64,

    // Schema + derivation
    pub schema_builds: u64,
    pub queries_derived: u64,
    pub placeholders: u64,

    // Parameter binding outcomes
    pub bind_passed: u64,
    pub bind_converted: u64,
    pub bind_coerced: u64,
    pub bind_raw: u64,

    // Persist workflow
    pub workflow_hooks: u64,
    pub records_written: u64,
}

impl EventOps {
    pub(crate) const fn dispatch_slot(&mut self, kind: DispatchKind) -> &mut u64 {
        match kind {
            DispatchKind::Default => &mut self.default_calls,
            DispatchKind::FindDerived => &mut self.find_derived_calls,
            DispatchKind::DeleteDerived => &mut self.delete_derived_calls,
            DispatchKind::ExplicitQuery => &mut self.explicit_query_calls,
            DispatchKind::ExplicitDelete => &mut self.explicit_delete_calls,
            DispatchKind::FindAll => &mut self.find_all_calls,
            DispatchKind::LiteralQuery => &mut self.literal_query_calls,
            DispatchKind::ObjectMethod => &mut self.object_method_calls,
            DispatchKind::Unknown => &mut self.unknown_calls,
        }
    }

    #[must_use]
    pub const fn dispatch_calls(&self) -> u64 {
        self.default_calls
            .saturating_add(self.find_derived_calls)
            .saturating_add(self.delete_derived_calls)
            .saturating_add(self.explicit_query_calls)
            .saturating_add(self.explicit_delete_calls)
            .saturating_add(self.find_all_calls)
            .saturating_add(self.literal_query_calls)
            .saturating_add(self.object_method_calls)
            .saturating_add(self.unknown_calls)
    }
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntityCounters {
    pub dispatch_calls: u64,
    pub rows_returned: u64,
    pub queries_derived: u64,
    pub records_written: u64,
    pub mapped_fields: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all event state.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    /// Ephemeral runtime counters since `since_ms`.
    pub counters: Option<EventState>,
    /// Per-entity counters and averages.
    pub entity_counters: Vec<EntitySummary>,
}

///
/// EntitySummary
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EntitySummary {
    pub entity: String,
    pub dispatch_calls: u64,
    pub rows_returned: u64,
    pub avg_rows_per_call: f64,
    pub queries_derived: u64,
    pub records_written: u64,
}

/// Build a report, omitting counters when the window started after
/// `window_start_ms`.
#[must_use]
pub(crate) fn report_window_start(window_start_ms: Option<u64>) -> EventReport {
    let snap = with_state(Clone::clone);
    if window_start_ms.is_some_and(|start| start > snap.since_ms) {
        return EventReport::default();
    }

    report_from(snap)
}

#[expect(clippy::cast_precision_loss)]
fn report_from(snap: EventState) -> EventReport {
    let mut entity_counters: Vec<EntitySummary> = snap
        .entities
        .iter()
        .map(|(entity, ops)| EntitySummary {
            entity: entity.clone(),
            dispatch_calls: ops.dispatch_calls,
            rows_returned: ops.rows_returned,
            avg_rows_per_call: if ops.dispatch_calls > 0 {
                ops.rows_returned as f64 / ops.dispatch_calls as f64
            } else {
                0.0
            },
            queries_derived: ops.queries_derived,
            records_written: ops.records_written,
        })
        .collect();

    // busiest first, then name for a stable order
    entity_counters.sort_by(|a, b| {
        match b
            .avg_rows_per_call
            .partial_cmp(&a.avg_rows_per_call)
            .unwrap_or(Ordering::Equal)
        {
            Ordering::Equal => b
                .dispatch_calls
                .cmp(&a.dispatch_calls)
                .then_with(|| a.entity.cmp(&b.entity)),
            other => other,
        }
    });

    EventReport {
        counters: Some(snap),
        entity_counters,
    }
}

///
/// TESTS
///
