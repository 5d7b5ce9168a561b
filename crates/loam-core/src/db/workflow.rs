//! Persist workflow: the fixed hook pipeline around every insert and update.
//!
//! ```text
//! pre_entity → to_record → pre_record → write → post_record → from_record →
//! post_entity
//! ```
//!
//! Hooks observe only. A hook aborts the call by returning `HookError`;
//! nothing after it runs (including the backend write for pre-write hooks).

use crate::{
    db::{
        convert::EntityConverter,
        query::{DeleteQuery, StructuredQuery},
        record::Record,
        template::TemplateError,
    },
    error::InternalError,
    obs::sink::{MetricsEvent, record},
    traits::Mapped,
};
use std::{any::Any, fmt, sync::Arc};
use thiserror::Error as ThisError;

///
/// WorkflowStage
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WorkflowStage {
    /// Entity about to be converted.
    PreEntity,
    /// Record about to be written.
    PreRecord,
    /// Record returned by the backend write.
    PostRecord,
    /// Entity rehydrated from the written record.
    PostEntity,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PreEntity => "pre_entity",
            Self::PreRecord => "pre_record",
            Self::PostRecord => "post_record",
            Self::PostEntity => "post_entity",
        };
        write!(f, "{label}")
    }
}

///
/// HookError
///
/// Raised by a listener to abort the current call.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("persist hook aborted: {message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn abort(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// PersistListener
///
/// Observer of workflow stages and of queries issued through an entity
/// template. Every hook defaults to a no-op.
///
/// Entity hooks receive the entity name and the instance as `&dyn Any`,
/// so a listener can downcast to the types it cares about.
///

pub trait PersistListener: Send + Sync {
    fn pre_entity(&self, _entity: &'static str, _instance: &dyn Any) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_record(&self, _record: &Record) -> Result<(), HookError> {
        Ok(())
    }

    fn post_record(&self, _record: &Record) -> Result<(), HookError> {
        Ok(())
    }

    fn post_entity(&self, _entity: &'static str, _instance: &dyn Any) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_query(&self, _query: &StructuredQuery) -> Result<(), HookError> {
        Ok(())
    }

    fn pre_delete(&self, _query: &DeleteQuery) -> Result<(), HookError> {
        Ok(())
    }
}

///
/// PersistWorkflow
///
/// Listeners run in registration order.
///

#[derive(Clone, Default)]
pub struct PersistWorkflow {
    listeners: Vec<Arc<dyn PersistListener>>,
}

impl PersistWorkflow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn PersistListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn PersistListener>) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Run one entity through the pipeline. `write` performs the backend
    /// call and returns the record as stored.
    pub fn flow<E, W>(
        &self,
        converter: &EntityConverter<E>,
        entity: E,
        write: W,
    ) -> Result<E, InternalError>
    where
        E: Mapped,
        W: FnOnce(Record) -> Result<Record, TemplateError>,
    {
        let pending = self.before_write(converter, &entity)?;
        let written = write(pending)?;

        self.after_write(converter, &written)
    }

    /// Stages up to the backend write; returns the record to write.
    pub fn before_write<E: Mapped>(
        &self,
        converter: &EntityConverter<E>,
        entity: &E,
    ) -> Result<Record, InternalError> {
        self.stage(E::NAME, WorkflowStage::PreEntity, |l| {
            l.pre_entity(E::NAME, entity)
        })?;

        let pending = converter.to_record(entity)?;
        self.stage(E::NAME, WorkflowStage::PreRecord, |l| l.pre_record(&pending))?;

        Ok(pending)
    }

    /// Stages after the backend write; returns the rehydrated entity.
    pub fn after_write<E: Mapped>(
        &self,
        converter: &EntityConverter<E>,
        written: &Record,
    ) -> Result<E, InternalError> {
        self.stage(E::NAME, WorkflowStage::PostRecord, |l| l.post_record(written))?;

        let rehydrated = converter.from_record(written)?;
        self.stage(E::NAME, WorkflowStage::PostEntity, |l| {
            l.post_entity(E::NAME, &rehydrated)
        })?;

        Ok(rehydrated)
    }

    pub fn fire_pre_query(&self, query: &StructuredQuery) -> Result<(), HookError> {
        self.listeners.iter().try_for_each(|l| l.pre_query(query))
    }

    pub fn fire_pre_delete(&self, query: &DeleteQuery) -> Result<(), HookError> {
        self.listeners.iter().try_for_each(|l| l.pre_delete(query))
    }

    fn stage(
        &self,
        entity: &'static str,
        stage: WorkflowStage,
        hook: impl Fn(&dyn PersistListener) -> Result<(), HookError>,
    ) -> Result<(), HookError> {
        record(MetricsEvent::Workflow { entity, stage });

        self.listeners.iter().try_for_each(|l| hook(l.as_ref()))
    }
}

impl fmt::Debug for PersistWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistWorkflow")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

///
/// TESTS
///
