use crate::{
    db::{
        convert::EntityConverter,
        query::{
            CallArg, DeleteQuery, StructuredQuery, bind, bind_named, derive_delete, derive_select,
            fingerprint, parse,
        },
        record::Record,
        repository::{
            DispatchError, DispatchKind, MethodCall, Repository, RepositoryConfig, ReturnShape,
            Returned, shape,
        },
        template::{EntityTemplate, Template},
    },
    error::InternalError,
    obs::sink::Span,
    traits::EntityKind,
    value::Value,
};
use std::marker::PhantomData;

const OBJECT_METHODS: [&str; 5] = ["eq", "ne", "hash", "to_string", "fmt"];

///
/// DefaultOp
///
/// Built-in repository operations. Sync, `_async` and camelCase spellings
/// all name the same operation.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum DefaultOp {
    Save,
    SaveAll,
    Update,
    DeleteById,
    FindById,
    ExistsById,
    Count,
}

impl DefaultOp {
    pub(super) fn parse(name: &str) -> Option<Self> {
        let base = name
            .strip_suffix("_async")
            .or_else(|| name.strip_suffix("Async"))
            .unwrap_or(name);

        let op = match base {
            "save" => Self::Save,
            "save_all" | "saveAll" => Self::SaveAll,
            "update" => Self::Update,
            "delete_by_id" | "deleteById" => Self::DeleteById,
            "find_by_id" | "findById" => Self::FindById,
            "exists_by_id" | "existsById" => Self::ExistsById,
            "count" => Self::Count,
            _ => return None,
        };

        Some(op)
    }
}

/// Choose the execution strategy for a call. First match wins.
#[must_use]
pub fn classify<E>(call: &MethodCall<E>, config: &RepositoryConfig) -> DispatchKind {
    let name = call.name.as_str();

    if DefaultOp::parse(name).is_some() {
        DispatchKind::Default
    } else if call.find_delete().is_some() {
        DispatchKind::ExplicitDelete
    } else if call.find_query().is_some() {
        DispatchKind::ExplicitQuery
    } else if call.literal.is_some() {
        DispatchKind::LiteralQuery
    } else if name == config.find_prefix || name == "findAll" || name == "find_all" {
        DispatchKind::FindAll
    } else if name.starts_with(&config.find_prefix) {
        DispatchKind::FindDerived
    } else if name.starts_with(&config.delete_prefix) {
        DispatchKind::DeleteDerived
    } else if OBJECT_METHODS.contains(&name) {
        DispatchKind::ObjectMethod
    } else {
        DispatchKind::Unknown
    }
}

///
/// Dispatcher
///
/// Synchronous repository for `E` over a record template.
///

pub struct Dispatcher<E, T> {
    template: EntityTemplate<T>,
    config: RepositoryConfig,
    marker: PhantomData<fn() -> E>,
}

impl<E, T> Clone for Dispatcher<E, T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            config: self.config.clone(),
            marker: PhantomData,
        }
    }
}

impl<E: EntityKind, T: Template> Dispatcher<E, T> {
    #[must_use]
    pub fn new(template: EntityTemplate<T>) -> Self {
        Self {
            template,
            config: RepositoryConfig::default(),
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    #[must_use]
    pub const fn template(&self) -> &EntityTemplate<T> {
        &self.template
    }

    #[must_use]
    pub fn classify(&self, call: &MethodCall<E>) -> DispatchKind {
        classify(call, &self.config)
    }

    /// Classify, execute and reshape one call.
    pub fn invoke(&self, call: MethodCall<E>) -> Result<Returned<E>, InternalError> {
        let kind = self.classify(&call);
        let mut span = Span::new(kind, E::NAME);

        let returned = self.execute(kind, call)?;
        span.set_rows(returned.rows());

        Ok(returned)
    }

    fn execute(
        &self,
        kind: DispatchKind,
        call: MethodCall<E>,
    ) -> Result<Returned<E>, InternalError> {
        match kind {
            DispatchKind::Default => self.run_default(call),
            DispatchKind::FindDerived => {
                let query = derived_select::<E>(&call, &self.config)?;
                self.select(&query, call.shape, &call.name)
            }
            DispatchKind::DeleteDerived => {
                shape::check_tally(call.shape, &call.name)?;
                let query = derived_delete::<E>(&call, &self.config)?;
                let removed = self.template.delete(&query)?;
                Ok(shape::tally(removed, call.shape, &call.name)?)
            }
            DispatchKind::ExplicitQuery => {
                let query = explicit_query(&call)?;
                self.select(&query, call.shape, &call.name)
            }
            DispatchKind::ExplicitDelete => {
                shape::check_tally(call.shape, &call.name)?;
                let query = explicit_delete(&call)?;
                let removed = self.template.delete(&query)?;
                Ok(shape::tally(removed, call.shape, &call.name)?)
            }
            DispatchKind::FindAll => {
                let query = find_all_query::<E>(&call)?;
                self.select(&query, call.shape, &call.name)
            }
            DispatchKind::LiteralQuery => self.run_literal(&call),
            DispatchKind::ObjectMethod => Ok(object_method(&call)),
            DispatchKind::Unknown => Err(unsupported(call.name).into()),
        }
    }

    fn select(
        &self,
        query: &StructuredQuery,
        declared: ReturnShape,
        method: &str,
    ) -> Result<Returned<E>, InternalError> {
        let converter = EntityConverter::<E>::global()?;
        let records = self.template.select_records(query)?;

        reshape_records(&converter, records, declared, method)
    }

    fn run_literal(&self, call: &MethodCall<E>) -> Result<Returned<E>, InternalError> {
        let literal = literal_text(call)?;
        let converter = EntityConverter::<E>::global()?;
        let named = call.named_values();
        let backend = self.template.template();

        let records = if named.is_empty() {
            backend.execute_literal(literal)?
        } else {
            let bindings = bind_named(named, converter.schema())?;
            let mut statement = backend.prepare(literal)?;
            for (name, value) in bindings {
                statement.bind(&name, value);
            }
            statement.execute()?
        };

        reshape_records(&converter, records, call.shape, &call.name)
    }

    fn run_default(&self, mut call: MethodCall<E>) -> Result<Returned<E>, InternalError> {
        let op = default_op(&call)?;
        let declared = call.shape;

        let returned = match op {
            DefaultOp::Save | DefaultOp::SaveAll | DefaultOp::Update => {
                let entities = write_targets(&mut call, op)?;
                shape::check_written(entities.len(), declared, &call.name)?;
                let written = entities
                    .into_iter()
                    .map(|entity| match op {
                        DefaultOp::Update => self.template.update(entity),
                        _ => self.save_one(entity),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                shape::entities(written, declared, &call.name)?
            }
            DefaultOp::DeleteById => {
                shape::check_tally(declared, &call.name)?;
                let removed = self.template.delete_by_id::<E>(id_arg(&call)?)?;
                shape::tally(removed, declared, &call.name)?
            }
            DefaultOp::FindById => {
                let found = self.template.find::<E>(id_arg(&call)?)?;
                shape::entities(found.into_iter().collect(), declared, &call.name)?
            }
            DefaultOp::ExistsById => {
                let exists = self.template.exists_by_id::<E>(id_arg(&call)?)?;
                shape::flag(exists, declared, &call.name)?
            }
            DefaultOp::Count => shape::tally(self.template.count::<E>()?, declared, &call.name)?,
        };

        Ok(returned)
    }

    // probe by id only when one is set
    fn save_one(&self, entity: E) -> Result<E, InternalError> {
        let converter = EntityConverter::<E>::global()?;

        let exists = match converter.schema().id_value(&entity) {
            Some(id) => self.template.exists_by_id::<E>(id)?,
            None => false,
        };

        if exists {
            self.template.update(entity)
        } else {
            self.template.insert(entity)
        }
    }
}

impl<E: EntityKind, T: Template> Repository<E> for Dispatcher<E, T> {
    fn save(&self, entity: E) -> Result<E, InternalError> {
        let call = MethodCall::new("save")
            .entity(entity)
            .returning(ReturnShape::Scalar);

        expect_entity(self.invoke(call)?, "save")
    }

    fn save_all(&self, entities: Vec<E>) -> Result<Vec<E>, InternalError> {
        let call = MethodCall::new("save_all").entities(entities);

        Ok(self.invoke(call)?.into_entities())
    }

    fn update(&self, entity: E) -> Result<E, InternalError> {
        let call = MethodCall::new("update")
            .entity(entity)
            .returning(ReturnShape::Scalar);

        expect_entity(self.invoke(call)?, "update")
    }

    fn delete_by_id(&self, id: Value) -> Result<(), InternalError> {
        let call = MethodCall::new("delete_by_id")
            .arg(id)
            .returning(ReturnShape::Unit);
        self.invoke(call)?;

        Ok(())
    }

    fn find_by_id(&self, id: Value) -> Result<Option<E>, InternalError> {
        let call = MethodCall::new("find_by_id")
            .arg(id)
            .returning(ReturnShape::Optional);

        Ok(self.invoke(call)?.into_single())
    }

    fn exists_by_id(&self, id: Value) -> Result<bool, InternalError> {
        let call = MethodCall::new("exists_by_id")
            .arg(id)
            .returning(ReturnShape::Bool);

        expect_flag(&self.invoke(call)?, "exists_by_id")
    }

    fn count(&self) -> Result<u64, InternalError> {
        let call = MethodCall::new("count").returning(ReturnShape::Count);

        expect_count(&self.invoke(call)?, "count")
    }

    fn find_all(&self) -> Result<Vec<E>, InternalError> {
        Ok(self.invoke(MethodCall::new("find_all"))?.into_entities())
    }

    fn invoke(&self, call: MethodCall<E>) -> Result<Returned<E>, InternalError> {
        Self::invoke(self, call)
    }
}

// ----------------------------------------------------------------------
// shared with the async dispatcher
// ----------------------------------------------------------------------

pub(super) fn default_op<E>(call: &MethodCall<E>) -> Result<DefaultOp, DispatchError> {
    DefaultOp::parse(&call.name).ok_or_else(|| unsupported(call.name.clone()))
}

pub(super) fn unsupported(method: String) -> DispatchError {
    DispatchError::UnsupportedMethod { method }
}

/// grammar → derivation → binding.
pub(super) fn derived_select<E: EntityKind>(
    call: &MethodCall<E>,
    config: &RepositoryConfig,
) -> Result<StructuredQuery, InternalError> {
    let converter = EntityConverter::<E>::global()?;
    let shape = converter.schema().shape();

    let spec = parse(&call.name, &config.find_prefix)?;
    let derived = derive_select(&spec, shape, &call.positional())?;
    let bindings = bind(&derived.placeholders, &derived.arguments, shape)?;

    Ok(derived.query.bind(&bindings))
}

pub(super) fn derived_delete<E: EntityKind>(
    call: &MethodCall<E>,
    config: &RepositoryConfig,
) -> Result<DeleteQuery, InternalError> {
    let converter = EntityConverter::<E>::global()?;
    let shape = converter.schema().shape();

    let spec = parse(&call.name, &config.delete_prefix)?;
    let derived = derive_delete(&spec, shape, &call.positional())?;
    let bindings = bind(&derived.placeholders, &derived.arguments, shape)?;

    Ok(derived.query.bind(&bindings))
}

pub(super) fn explicit_query<E>(call: &MethodCall<E>) -> Result<StructuredQuery, InternalError> {
    call.find_query()
        .cloned()
        .ok_or_else(|| InternalError::dispatch_invariant("explicit query call has no query"))
}

pub(super) fn explicit_delete<E>(call: &MethodCall<E>) -> Result<DeleteQuery, InternalError> {
    call.find_delete()
        .cloned()
        .ok_or_else(|| InternalError::dispatch_invariant("explicit delete call has no query"))
}

/// Whole-entity select; sort and page markers still apply.
pub(super) fn find_all_query<E: EntityKind>(
    call: &MethodCall<E>,
) -> Result<StructuredQuery, InternalError> {
    let converter = EntityConverter::<E>::global()?;
    let mut query = StructuredQuery::all(E::NAME);

    for arg in call.positional() {
        match arg {
            CallArg::Sort(mut sort) => {
                sort.field = converter.schema().resolve_path(&sort.field);
                query.sorts.push(sort);
            }
            CallArg::Page(page) => {
                query.skip = page.skip;
                query.limit = page.limit;
            }
            CallArg::Value(_) => {}
        }
    }

    Ok(query)
}

pub(super) fn literal_text<E>(call: &MethodCall<E>) -> Result<&str, InternalError> {
    call.literal
        .as_deref()
        .ok_or_else(|| InternalError::dispatch_invariant("literal query call has no query text"))
}

/// Convert records and shape them; sets collapse duplicate records first.
pub(super) fn reshape_records<E: EntityKind>(
    converter: &EntityConverter<E>,
    records: Vec<Record>,
    declared: ReturnShape,
    method: &str,
) -> Result<Returned<E>, InternalError> {
    let records = match declared {
        ReturnShape::Set => shape::dedupe(records),
        _ => records,
    };
    let found = converter.from_records(records)?;

    Ok(shape::entities(found, declared, method)?)
}

/// Object identity contract, answered by the repository itself.
pub(super) fn object_method<E: EntityKind>(call: &MethodCall<E>) -> Returned<E> {
    let identity = format!("Repository<{}>", E::NAME);
    let same = call.first_value() == Some(&Value::from(identity.as_str()));

    match call.name.as_str() {
        "eq" => Returned::Bool(same),
        "ne" => Returned::Bool(!same),
        "hash" => Returned::Count(fingerprint(&identity)),
        _ => Returned::Text(identity),
    }
}

pub(super) fn write_targets<E>(
    call: &mut MethodCall<E>,
    op: DefaultOp,
) -> Result<Vec<E>, DispatchError> {
    let entities = call.take_entities();

    match (op, entities.len()) {
        (DefaultOp::Save | DefaultOp::Update, 1) | (DefaultOp::SaveAll, _) => Ok(entities),
        (_, found) => Err(DispatchError::invalid(
            &call.name,
            format!("expected one entity, found {found}"),
        )),
    }
}

pub(super) fn id_arg<E>(call: &MethodCall<E>) -> Result<Value, DispatchError> {
    call.first_value()
        .cloned()
        .ok_or_else(|| DispatchError::invalid(&call.name, "expected an id value"))
}

pub(super) fn expect_entity<E>(returned: Returned<E>, method: &str) -> Result<E, InternalError> {
    returned
        .into_single()
        .ok_or_else(|| InternalError::dispatch_invariant(format!("'{method}' returned no entity")))
}

pub(super) fn expect_flag<E>(returned: &Returned<E>, method: &str) -> Result<bool, InternalError> {
    returned
        .as_bool()
        .ok_or_else(|| InternalError::dispatch_invariant(format!("'{method}' returned no flag")))
}

pub(super) fn expect_count<E>(returned: &Returned<E>, method: &str) -> Result<u64, InternalError> {
    returned
        .as_count()
        .ok_or_else(|| InternalError::dispatch_invariant(format!("'{method}' returned no count")))
}
