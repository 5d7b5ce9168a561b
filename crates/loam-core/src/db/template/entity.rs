use crate::{
    db::{
        convert::EntityConverter,
        query::{CompareOp, ConditionNode, DeleteQuery, Operand, StructuredQuery, bind_named},
        record::Record,
        repository::shape::single,
        template::{AsyncTemplate, Callback, PreparedStatement, Template},
        workflow::PersistWorkflow,
    },
    error::InternalError,
    model::EntitySchema,
    traits::EntityKind,
    value::Value,
};
use std::{sync::Arc, time::Duration};

///
/// EntityTemplate
///
/// Typed facade over a record template: converts entities through their
/// schema and runs every write through the persist workflow.
///
/// Schemas come from the global registry.
///

pub struct EntityTemplate<T> {
    template: Arc<T>,
    workflow: PersistWorkflow,
}

impl<T> Clone for EntityTemplate<T> {
    fn clone(&self) -> Self {
        Self {
            template: Arc::clone(&self.template),
            workflow: self.workflow.clone(),
        }
    }
}

impl<T> EntityTemplate<T> {
    #[must_use]
    pub fn new(template: T) -> Self {
        Self::from_arc(Arc::new(template))
    }

    #[must_use]
    pub fn from_arc(template: Arc<T>) -> Self {
        Self {
            template,
            workflow: PersistWorkflow::new(),
        }
    }

    #[must_use]
    pub fn with_workflow(mut self, workflow: PersistWorkflow) -> Self {
        self.workflow = workflow;
        self
    }

    #[must_use]
    pub const fn workflow(&self) -> &PersistWorkflow {
        &self.workflow
    }

    #[must_use]
    pub const fn template(&self) -> &Arc<T> {
        &self.template
    }
}

// ----------------------------------------------------------------------
// synchronous
// ----------------------------------------------------------------------

impl<T: Template> EntityTemplate<T> {
    pub fn insert<E: EntityKind>(&self, entity: E) -> Result<E, InternalError> {
        let converter = EntityConverter::<E>::global()?;

        self.workflow
            .flow(&converter, entity, |record| self.template.insert(record))
    }

    pub fn insert_with_ttl<E: EntityKind>(
        &self,
        entity: E,
        ttl: Duration,
    ) -> Result<E, InternalError> {
        let converter = EntityConverter::<E>::global()?;

        self.workflow.flow(&converter, entity, |record| {
            self.template.insert_with_ttl(record, ttl)
        })
    }

    pub fn insert_all<E, I>(&self, entities: I) -> Result<Vec<E>, InternalError>
    where
        E: EntityKind,
        I: IntoIterator<Item = E>,
    {
        entities.into_iter().map(|entity| self.insert(entity)).collect()
    }

    pub fn update<E: EntityKind>(&self, entity: E) -> Result<E, InternalError> {
        let converter = EntityConverter::<E>::global()?;

        self.workflow
            .flow(&converter, entity, |record| self.template.update(record))
    }

    pub fn update_all<E, I>(&self, entities: I) -> Result<Vec<E>, InternalError>
    where
        E: EntityKind,
        I: IntoIterator<Item = E>,
    {
        entities.into_iter().map(|entity| self.update(entity)).collect()
    }

    pub fn select<E: EntityKind>(&self, query: &StructuredQuery) -> Result<Vec<E>, InternalError> {
        let converter = EntityConverter::<E>::global()?;
        let records = self.select_records(query)?;

        Ok(converter.from_records(records)?)
    }

    /// Select without converting; the pre-query hook still fires.
    pub fn select_records(&self, query: &StructuredQuery) -> Result<Vec<Record>, InternalError> {
        self.workflow.fire_pre_query(query)?;

        Ok(self.template.select(query)?)
    }

    pub fn delete(&self, query: &DeleteQuery) -> Result<u64, InternalError> {
        self.workflow.fire_pre_delete(query)?;

        Ok(self.template.delete(query)?)
    }

    /// Find by id. The id is converted like any bound parameter.
    pub fn find<E: EntityKind>(&self, id: impl Into<Value>) -> Result<Option<E>, InternalError> {
        let converter = EntityConverter::<E>::global()?;
        let query = StructuredQuery::all(E::NAME)
            .with_condition(id_condition(converter.schema(), id.into())?);

        let records = self.select_records(&query)?;
        let found = single(converter.from_records(records)?, &query.to_string())?;

        Ok(found)
    }

    pub fn delete_by_id<E: EntityKind>(&self, id: impl Into<Value>) -> Result<u64, InternalError> {
        let schema = EntityConverter::<E>::global()?.schema().clone();
        let query = DeleteQuery::all(E::NAME).with_condition(id_condition(&schema, id.into())?);

        self.delete(&query)
    }

    pub fn exists_by_id<E: EntityKind>(&self, id: impl Into<Value>) -> Result<bool, InternalError> {
        let schema = EntityConverter::<E>::global()?.schema().clone();
        let query =
            StructuredQuery::all(E::NAME).with_condition(id_condition(&schema, id.into())?);

        Ok(!self.select_records(&query)?.is_empty())
    }

    /// Run a literal query and convert the result.
    pub fn query<E: EntityKind>(&self, literal: &str) -> Result<Vec<E>, InternalError> {
        let converter = EntityConverter::<E>::global()?;
        let records = self.template.execute_literal(literal)?;

        Ok(converter.from_records(records)?)
    }

    pub fn single_result<E: EntityKind>(&self, literal: &str) -> Result<Option<E>, InternalError> {
        Ok(single(self.query(literal)?, literal)?)
    }

    pub fn prepare<E: EntityKind>(
        &self,
        literal: &str,
    ) -> Result<EntityStatement<'_, E>, InternalError> {
        Ok(EntityStatement {
            inner: self.template.prepare(literal)?,
            converter: EntityConverter::global()?,
            literal: literal.to_string(),
        })
    }

    pub fn count<E: EntityKind>(&self) -> Result<u64, InternalError> {
        self.count_entity(E::NAME)
    }

    pub fn count_entity(&self, entity: &str) -> Result<u64, InternalError> {
        Ok(self.template.count(entity)?)
    }
}

///
/// EntityStatement
///
/// Prepared literal query returning entities.
///

pub struct EntityStatement<'a, E> {
    inner: Box<dyn PreparedStatement + 'a>,
    converter: EntityConverter<E>,
    literal: String,
}

impl<E: EntityKind> EntityStatement<'_, E> {
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inner.bind(name, value.into());
        self
    }

    pub fn execute(&mut self) -> Result<Vec<E>, InternalError> {
        let records = self.inner.execute()?;

        Ok(self.converter.from_records(records)?)
    }

    pub fn single_result(&mut self) -> Result<Option<E>, InternalError> {
        let entities = self.execute()?;

        Ok(single(entities, &self.literal)?)
    }
}

// ----------------------------------------------------------------------
// asynchronous
// ----------------------------------------------------------------------

impl<T: AsyncTemplate + 'static> EntityTemplate<T> {
    pub fn insert_async<E, F>(&self, entity: E, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<E, InternalError>) + Send + 'static,
    {
        self.write_async(entity, callback, |template, record, done| {
            template.insert_async(record, done);
        });
    }

    pub fn insert_with_ttl_async<E, F>(&self, entity: E, ttl: Duration, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<E, InternalError>) + Send + 'static,
    {
        self.write_async(entity, callback, move |template, record, done| {
            template.insert_with_ttl_async(record, ttl, done);
        });
    }

    pub fn update_async<E, F>(&self, entity: E, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<E, InternalError>) + Send + 'static,
    {
        self.write_async(entity, callback, |template, record, done| {
            template.update_async(record, done);
        });
    }

    pub fn select_async<E, F>(&self, query: StructuredQuery, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<Vec<E>, InternalError>) + Send + 'static,
    {
        let converter = match EntityConverter::<E>::global() {
            Ok(converter) => converter,
            Err(err) => return callback(Err(err.into())),
        };

        self.select_records_async(query, move |result| {
            callback(result.and_then(|records| Ok(converter.from_records(records)?)));
        });
    }

    pub fn select_records_async<F>(&self, query: StructuredQuery, callback: F)
    where
        F: FnOnce(Result<Vec<Record>, InternalError>) + Send + 'static,
    {
        if let Err(err) = self.workflow.fire_pre_query(&query) {
            return callback(Err(err.into()));
        }

        self.template.select_async(
            query,
            Box::new(move |result| callback(result.map_err(InternalError::from))),
        );
    }

    pub fn delete_async<F>(&self, query: DeleteQuery, callback: F)
    where
        F: FnOnce(Result<u64, InternalError>) + Send + 'static,
    {
        if let Err(err) = self.workflow.fire_pre_delete(&query) {
            return callback(Err(err.into()));
        }

        self.template.delete_async(
            query,
            Box::new(move |result| callback(result.map_err(InternalError::from))),
        );
    }

    pub fn find_async<E, F>(&self, id: impl Into<Value>, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<Option<E>, InternalError>) + Send + 'static,
    {
        let query = match EntityConverter::<E>::global()
            .map_err(InternalError::from)
            .and_then(|converter| id_condition(converter.schema(), id.into()))
        {
            Ok(condition) => StructuredQuery::all(E::NAME).with_condition(condition),
            Err(err) => return callback(Err(err)),
        };
        let context = query.to_string();

        self.select_async(query, move |result: Result<Vec<E>, InternalError>| {
            callback(result.and_then(|found| Ok(single(found, &context)?)));
        });
    }

    pub fn delete_by_id_async<E, F>(&self, id: impl Into<Value>, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<u64, InternalError>) + Send + 'static,
    {
        match EntityConverter::<E>::global()
            .map_err(InternalError::from)
            .and_then(|converter| id_condition(converter.schema(), id.into()))
        {
            Ok(condition) => {
                self.delete_async(DeleteQuery::all(E::NAME).with_condition(condition), callback);
            }
            Err(err) => callback(Err(err)),
        }
    }

    pub fn query_async<E, F>(&self, literal: &str, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<Vec<E>, InternalError>) + Send + 'static,
    {
        let converter = match EntityConverter::<E>::global() {
            Ok(converter) => converter,
            Err(err) => return callback(Err(err.into())),
        };

        self.template.execute_literal_async(
            literal.to_string(),
            Box::new(move |result| {
                callback(
                    result
                        .map_err(InternalError::from)
                        .and_then(|records| Ok(converter.from_records(records)?)),
                );
            }),
        );
    }

    pub fn count_async<E, F>(&self, callback: F)
    where
        E: EntityKind,
        F: FnOnce(Result<u64, InternalError>) + Send + 'static,
    {
        self.template.count_async(
            E::NAME.to_string(),
            Box::new(move |result| callback(result.map_err(InternalError::from))),
        );
    }

    // pre stages now, backend write via `submit`, post stages in the callback
    fn write_async<E, F, S>(&self, entity: E, callback: F, submit: S)
    where
        E: EntityKind,
        F: FnOnce(Result<E, InternalError>) + Send + 'static,
        S: FnOnce(&T, Record, Callback<Record>),
    {
        let converter = match EntityConverter::<E>::global() {
            Ok(converter) => converter,
            Err(err) => return callback(Err(err.into())),
        };
        let pending = match self.workflow.before_write(&converter, &entity) {
            Ok(record) => record,
            Err(err) => return callback(Err(err)),
        };
        let workflow = self.workflow.clone();

        submit(
            &self.template,
            pending,
            Box::new(move |result| {
                callback(
                    result
                        .map_err(InternalError::from)
                        .and_then(|written| workflow.after_write(&converter, &written)),
                );
            }),
        );
    }
}

// ----------------------------------------------------------------------
// helpers
// ----------------------------------------------------------------------

/// `id = <converted id>` over the entity's id storage name.
pub(crate) fn id_condition<E>(
    schema: &EntitySchema<E>,
    id: Value,
) -> Result<ConditionNode, InternalError> {
    let field = schema.require_id()?;
    let mut bindings = bind_named([(field.declared_name, id)], schema)?.into_iter();
    let value = bindings.next().map(|(_, value)| value).unwrap_or_default();

    Ok(ConditionNode::compare(
        field.storage_name.clone(),
        CompareOp::Eq,
        Operand::Value(value),
    ))
}
