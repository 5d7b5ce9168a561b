//! Metrics sink boundary.
//!
//! Core logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the thread-local metrics state.
use crate::{
    db::{query::BindOutcome, repository::DispatchKind, workflow::WorkflowStage},
    obs::metrics,
};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    DispatchStart {
        kind: DispatchKind,
        entity: &'static str,
    },
    DispatchFinish {
        kind: DispatchKind,
        entity: &'static str,
        rows: u64,
    },
    SchemaBuilt {
        entity: &'static str,
        fields: u64,
    },
    QueryDerived {
        entity: &'static str,
        fingerprint: u64,
        placeholders: u64,
    },
    Bind {
        entity: &'static str,
        outcome: BindOutcome,
    },
    Workflow {
        entity: &'static str,
        stage: WorkflowStage,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// ThreadMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct ThreadMetricsSink;

impl MetricsSink for ThreadMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::DispatchStart { kind, entity } => {
                metrics::with_state_mut(|m| {
                    let slot = m.ops.dispatch_slot(kind);
                    *slot = slot.saturating_add(1);

                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.dispatch_calls = entry.dispatch_calls.saturating_add(1);
                });
            }

            MetricsEvent::DispatchFinish { entity, rows, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_returned = m.ops.rows_returned.saturating_add(rows);

                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.rows_returned = entry.rows_returned.saturating_add(rows);
                });
            }

            MetricsEvent::SchemaBuilt { entity, fields } => {
                metrics::with_state_mut(|m| {
                    m.ops.schema_builds = m.ops.schema_builds.saturating_add(1);

                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.mapped_fields = fields;
                });
            }

            MetricsEvent::QueryDerived {
                entity,
                fingerprint,
                placeholders,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.queries_derived = m.ops.queries_derived.saturating_add(1);
                    m.ops.placeholders = m.ops.placeholders.saturating_add(placeholders);

                    let hits = m.fingerprints.entry(format!("{fingerprint:016x}")).or_default();
                    *hits = hits.saturating_add(1);

                    let entry = m.entities.entry(entity.to_string()).or_default();
                    entry.queries_derived = entry.queries_derived.saturating_add(1);
                });
            }

            MetricsEvent::Bind { outcome, .. } => {
                metrics::with_state_mut(|m| match outcome {
                    BindOutcome::Passed => {
                        m.ops.bind_passed = m.ops.bind_passed.saturating_add(1);
                    }
                    BindOutcome::Converted => {
                        m.ops.bind_converted = m.ops.bind_converted.saturating_add(1);
                    }
                    BindOutcome::Coerced => {
                        m.ops.bind_coerced = m.ops.bind_coerced.saturating_add(1);
                    }
                    BindOutcome::Raw => m.ops.bind_raw = m.ops.bind_raw.saturating_add(1),
                });
            }

            MetricsEvent::Workflow { entity, stage } => {
                metrics::with_state_mut(|m| {
                    if stage == WorkflowStage::PostRecord {
                        m.ops.records_written = m.ops.records_written.saturating_add(1);

                        let entry = m.entities.entry(entity.to_string()).or_default();
                        entry.records_written = entry.records_written.saturating_add(1);
                    }
                    m.ops.workflow_hooks = m.ops.workflow_hooks.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const THREAD_METRICS_SINK: ThreadMetricsSink = ThreadMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` comes from a live `&dyn MetricsSink` installed by `with_metrics_sink`,
        //   which restores the previous slot on every exit (including unwind).
        // - `record` is synchronous and never keeps `ptr` past this call.
        // - Only a shared reference is materialized, matching the installing borrow.
        unsafe { (&*ptr).record(event) };
    } else {
        THREAD_METRICS_SINK.record(event);
    }
}

/// Snapshot the current metrics state.
///
/// `window_start_ms` filters by window start (`EventState::since_ms`),
/// not by per-event timestamps.
#[must_use]
pub fn metrics_report(window_start_ms: Option<u64>) -> metrics::EventReport {
    metrics::report_window_start(window_start_ms)
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
pub fn with_metrics_sink<T>(sink: &dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // - The erased pointer is installed only for this dynamic scope; `Guard`
    //   restores the previous slot on all exits, including panic.
    // - `record` dereferences synchronously and never persists the pointer.
    let sink_ptr = unsafe { std::mem::transmute::<&dyn MetricsSink, *const dyn MetricsSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink_ptr));
    let _guard = Guard(prev);

    f()
}

///
/// Span
/// RAII guard that emits start/finish events for one dispatch.
/// Finish accounting happens even on unwind.
///

pub(crate) struct Span {
    kind: DispatchKind,
    entity: &'static str,
    rows: u64,
}

impl Span {
    #[must_use]
    pub(crate) fn new(kind: DispatchKind, entity: &'static str) -> Self {
        record(MetricsEvent::DispatchStart { kind, entity });

        Self {
            kind,
            entity,
            rows: 0,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        record(MetricsEvent::DispatchFinish {
            kind: self.kind,
            entity: self.entity,
            rows: self.rows,
        });
    }
}

///
/// TESTS
///
