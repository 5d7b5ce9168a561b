use crate::{
    DEFAULT_ID_STORAGE_NAME,
    model::{EntitySchema, FieldSchema, RecordShape, SchemaError},
    obs::sink::{MetricsEvent, record},
    traits::Mapped,
};
use serde::{Deserialize, Serialize};
use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    sync::{
        Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, ThreadId},
};

type ErasedSchema = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceLock<Result<ErasedSchema, SchemaError>>>;

static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();

thread_local! {
    // Types whose schema is being built on this thread, innermost last.
    static BUILDING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

///
/// SchemaConfig
///
/// Registry-wide mapping defaults.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Storage name for id fields that do not override it.
    pub id_storage_name: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            id_storage_name: DEFAULT_ID_STORAGE_NAME.to_string(),
        }
    }
}

///
/// SchemaRegistry
///
/// Process-lifetime cache of built schemas, keyed by type identity.
///
/// Lookups of built schemas take the map's read lock only. A type seen for
/// the first time gets a single-initialization slot, filled while holding the
/// registry's build turn. The turn is reentrant for nested builds on the same
/// thread and exclusive across threads, so no thread waits on a slot while
/// holding another. Build failures are cached like successes.
///

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    config: SchemaConfig,
    slots: RwLock<HashMap<TypeId, Slot>>,
    turn: BuildTurn,
    builds: AtomicU64,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Shared registry used by the repository layer and nested-value conversion.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Configure the shared registry. Only succeeds before its first use;
    /// otherwise the rejected config is handed back.
    pub fn init_global(config: SchemaConfig) -> Result<&'static Self, SchemaConfig> {
        let mut pending = Some(config);
        let registry = GLOBAL.get_or_init(|| Self::with_config(pending.take().unwrap_or_default()));

        match pending {
            None => Ok(registry),
            Some(config) => Err(config),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Number of schema builds this registry has performed.
    #[must_use]
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Schema for `E`, built on first use.
    pub fn schema_of<E: Mapped>(&self) -> Result<Arc<EntitySchema<E>>, SchemaError> {
        let type_id = TypeId::of::<E>();

        if BUILDING.with(|stack| stack.borrow().contains(&type_id)) {
            return Err(SchemaError::RecursiveMapping {
                entity: E::NAME.to_string(),
            });
        }

        let slot = self.slot(type_id);
        let erased = match slot.get() {
            Some(built) => built.clone()?,
            None => {
                let _held = self.turn.enter();
                slot.get_or_init(|| self.build_tracked::<E>(type_id))
                    .clone()?
            }
        };

        // The slot for `TypeId::of::<E>()` only ever holds an `EntitySchema<E>`.
        erased
            .downcast::<EntitySchema<E>>()
            .map_err(|_| SchemaError::RecursiveMapping {
                entity: E::NAME.to_string(),
            })
    }

    /// Type-erased shape of `M`, used to resolve nested fields.
    pub fn shape_of<M: Mapped>(&self) -> Result<Arc<RecordShape>, SchemaError> {
        self.schema_of::<M>().map(|schema| schema.shape().clone())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn slot(&self, type_id: TypeId) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
        {
            return slot.clone();
        }

        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(type_id)
            .or_default()
            .clone()
    }

    fn build_tracked<E: Mapped>(&self, type_id: TypeId) -> Result<ErasedSchema, SchemaError> {
        struct Guard;

        impl Drop for Guard {
            fn drop(&mut self) {
                BUILDING.with(|stack| {
                    stack.borrow_mut().pop();
                });
            }
        }

        BUILDING.with(|stack| stack.borrow_mut().push(type_id));
        let _guard = Guard;

        let schema = self.build::<E>()?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        record(MetricsEvent::SchemaBuilt {
            entity: E::NAME,
            fields: schema.fields().len() as u64,
        });

        Ok(Arc::new(schema))
    }

    fn build<E: Mapped>(&self) -> Result<EntitySchema<E>, SchemaError> {
        let descriptor = E::descriptor();

        let ids: Vec<String> = descriptor
            .fields
            .iter()
            .filter(|field| field.id)
            .map(|field| field.name.to_string())
            .collect();
        if ids.len() > 1 {
            return Err(SchemaError::MultipleIds {
                entity: E::NAME.to_string(),
                fields: ids,
            });
        }

        let mut fields = Vec::with_capacity(descriptor.fields.len());
        let mut accessors = Vec::with_capacity(descriptor.fields.len());

        for field in descriptor.fields {
            let kind = field.declaration.classify(self)?;
            let storage_name = match (field.storage_name, field.id) {
                (Some(name), _) => name.to_string(),
                (None, true) => self.config.id_storage_name.clone(),
                (None, false) => field.name.to_string(),
            };

            fields.push(FieldSchema {
                declared_name: field.name,
                storage_name,
                kind,
                is_id: field.id,
                value_kind: field.value_kind,
                converter: field.converter,
            });
            accessors.push(field.accessor);
        }

        let shape = RecordShape::new(E::NAME, fields);

        Ok(EntitySchema::new(Arc::new(shape), accessors))
    }
}

///
/// BuildTurn
///
/// Reentrant registry-wide build lock: one thread builds at a time, and
/// that thread may nest further builds.
///

#[derive(Debug, Default)]
struct BuildTurn {
    holder: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl BuildTurn {
    fn enter(&self) -> HeldTurn<'_> {
        let me = thread::current().id();
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            match holder.as_mut() {
                None => {
                    *holder = Some((me, 1));
                    break;
                }
                Some((owner, depth)) if *owner == me => {
                    *depth += 1;
                    break;
                }
                Some(_) => {
                    holder = self
                        .released
                        .wait(holder)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }

        HeldTurn(self)
    }

    fn leave(&self) {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((_, depth)) = holder.as_mut() {
            *depth -= 1;
            if *depth == 0 {
                *holder = None;
                self.released.notify_all();
            }
        }
    }
}

struct HeldTurn<'a>(&'a BuildTurn);

impl Drop for HeldTurn<'_> {
    fn drop(&mut self) {
        self.0.leave();
    }
}

/// Schema for `E` from the global registry.
pub fn schema_of<E: Mapped>() -> Result<Arc<EntitySchema<E>>, SchemaError> {
    SchemaRegistry::global().schema_of::<E>()
}
