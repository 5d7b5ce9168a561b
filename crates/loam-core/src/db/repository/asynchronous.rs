//! Callback form of the repository.
//!
//! Classification, derivation and binding run on the calling thread; only
//! the backend call completes through the template's callback. Every
//! failure, including classification and binding errors, arrives through
//! the reply.

use crate::{
    db::{
        convert::EntityConverter,
        query::{StructuredQuery, bind_named},
        record::Record,
        repository::{
            DispatchKind, MethodCall, RepositoryConfig, ReturnShape, Returned,
            dispatch::{
                DefaultOp, classify, default_op, derived_delete, derived_select, expect_count,
                expect_entity, expect_flag, explicit_delete, explicit_query, find_all_query,
                id_arg, literal_text, object_method, reshape_records, unsupported, write_targets,
            },
            shape,
        },
        template::{AsyncTemplate, EntityTemplate, TemplateError},
    },
    error::InternalError,
    obs::sink::Span,
    traits::EntityKind,
    value::Value,
};
use std::{marker::PhantomData, vec};

/// Completion callback for asynchronous repository calls.
pub type Reply<T> = Box<dyn FnOnce(Result<T, InternalError>) + Send>;

///
/// AsyncRepository
///

pub trait AsyncRepository<E: EntityKind> {
    fn save_async(&self, entity: E, reply: Reply<E>);

    fn save_all_async(&self, entities: Vec<E>, reply: Reply<Vec<E>>);

    fn update_async(&self, entity: E, reply: Reply<E>);

    fn delete_by_id_async(&self, id: Value, reply: Reply<()>);

    fn find_by_id_async(&self, id: Value, reply: Reply<Option<E>>);

    fn exists_by_id_async(&self, id: Value, reply: Reply<bool>);

    fn count_async(&self, reply: Reply<u64>);

    fn find_all_async(&self, reply: Reply<Vec<E>>);

    fn invoke_async(&self, call: MethodCall<E>, reply: Reply<Returned<E>>);
}

///
/// AsyncDispatcher
///

pub struct AsyncDispatcher<E, T> {
    template: EntityTemplate<T>,
    config: RepositoryConfig,
    marker: PhantomData<fn() -> E>,
}

impl<E, T> Clone for AsyncDispatcher<E, T> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            config: self.config.clone(),
            marker: PhantomData,
        }
    }
}

impl<E: EntityKind, T: AsyncTemplate + 'static> AsyncDispatcher<E, T> {
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
    pub const fn template(&self) -> &EntityTemplate<T> {
        &self.template
    }

    /// Classify and execute one call; the dispatch span closes when the
    /// reply fires.
    pub fn invoke(&self, call: MethodCall<E>, reply: Reply<Returned<E>>) {
        let kind = classify(&call, &self.config);
        let span = Span::new(kind, E::NAME);

        let reply: Reply<Returned<E>> = Box::new(move |result| {
            let mut span = span;
            if let Ok(returned) = &result {
                span.set_rows(returned.rows());
            }
            drop(span);
            reply(result);
        });

        self.execute(kind, call, reply);
    }

    fn execute(&self, kind: DispatchKind, call: MethodCall<E>, reply: Reply<Returned<E>>) {
        match kind {
            DispatchKind::Default => self.run_default(call, reply),
            DispatchKind::FindDerived => match derived_select::<E>(&call, &self.config) {
                Ok(query) => self.select(query, call.shape, call.name, reply),
                Err(err) => reply(Err(err)),
            },
            DispatchKind::DeleteDerived => match tallied(&call)
                .and_then(|()| derived_delete::<E>(&call, &self.config))
            {
                Ok(query) => self.template.delete_async(query, counted(call, reply)),
                Err(err) => reply(Err(err)),
            },
            DispatchKind::ExplicitQuery => match explicit_query(&call) {
                Ok(query) => self.select(query, call.shape, call.name, reply),
                Err(err) => reply(Err(err)),
            },
            DispatchKind::ExplicitDelete => match tallied(&call)
                .and_then(|()| explicit_delete(&call))
            {
                Ok(query) => self.template.delete_async(query, counted(call, reply)),
                Err(err) => reply(Err(err)),
            },
            DispatchKind::FindAll => match find_all_query::<E>(&call) {
                Ok(query) => self.select(query, call.shape, call.name, reply),
                Err(err) => reply(Err(err)),
            },
            DispatchKind::LiteralQuery => self.run_literal(call, reply),
            DispatchKind::ObjectMethod => reply(Ok(object_method(&call))),
            DispatchKind::Unknown => reply(Err(unsupported(call.name).into())),
        }
    }

    fn select(
        &self,
        query: StructuredQuery,
        declared: ReturnShape,
        method: String,
        reply: Reply<Returned<E>>,
    ) {
        let converter = match EntityConverter::<E>::global() {
            Ok(converter) => converter,
            Err(err) => return reply(Err(err.into())),
        };

        self.template.select_records_async(query, move |result| {
            reply(result.and_then(|records| {
                reshape_records(&converter, records, declared, &method)
            }));
        });
    }

    fn run_literal(&self, call: MethodCall<E>, reply: Reply<Returned<E>>) {
        let prepared = literal_text(&call).and_then(|literal| {
            let converter = EntityConverter::<E>::global()?;
            let named = call.named_values();
            let bindings = if named.is_empty() {
                None
            } else {
                Some(bind_named(named, converter.schema())?)
            };

            Ok((literal.to_string(), converter, bindings))
        });
        let (literal, converter, bindings) = match prepared {
            Ok(parts) => parts,
            Err(err) => return reply(Err(err)),
        };

        let declared = call.shape;
        let method = call.name;
        let done = Box::new(move |result: Result<Vec<Record>, TemplateError>| {
            reply(result.map_err(InternalError::from).and_then(|records| {
                reshape_records(&converter, records, declared, &method)
            }));
        });

        let backend = self.template.template();
        match bindings {
            Some(bindings) => backend.execute_prepared_async(literal, bindings, done),
            None => backend.execute_literal_async(literal, done),
        }
    }

    fn run_default(&self, mut call: MethodCall<E>, reply: Reply<Returned<E>>) {
        let op = match default_op(&call) {
            Ok(op) => op,
            Err(err) => return reply(Err(err.into())),
        };
        let declared = call.shape;

        match op {
            DefaultOp::Save | DefaultOp::SaveAll | DefaultOp::Update => {
                let entities = match write_targets(&mut call, op) {
                    Ok(entities) => entities,
                    Err(err) => return reply(Err(err.into())),
                };
                if let Err(err) = shape::check_written(entities.len(), declared, &call.name) {
                    return reply(Err(err.into()));
                }
                let write: WriteFn<E, T> = match op {
                    DefaultOp::Update => update_one,
                    _ => save_one,
                };
                let method = call.name;

                write_each(
                    self.template.clone(),
                    write,
                    entities.into_iter(),
                    Vec::new(),
                    Box::new(move |result| {
                        reply(result.and_then(|written| {
                            Ok(shape::entities(written, declared, &method)?)
                        }));
                    }),
                );
            }
            DefaultOp::DeleteById => match tallied(&call).and_then(|()| Ok(id_arg(&call)?)) {
                Ok(id) => self
                    .template
                    .delete_by_id_async::<E, _>(id, counted(call, reply)),
                Err(err) => reply(Err(err.into())),
            },
            DefaultOp::FindById => match id_arg(&call) {
                Ok(id) => {
                    let method = call.name;
                    self.template.find_async::<E, _>(id, move |result| {
                        reply(result.and_then(|found| {
                            Ok(shape::entities(found.into_iter().collect(), declared, &method)?)
                        }));
                    });
                }
                Err(err) => reply(Err(err.into())),
            },
            DefaultOp::ExistsById => match id_arg(&call) {
                Ok(id) => {
                    let method = call.name;
                    self.template.find_async::<E, _>(id, move |result| {
                        reply(result.and_then(|found| {
                            Ok(shape::flag(found.is_some(), declared, &method)?)
                        }));
                    });
                }
                Err(err) => reply(Err(err.into())),
            },
            DefaultOp::Count => self.template.count_async::<E, _>(counted(call, reply)),
        }
    }
}

impl<E: EntityKind, T: AsyncTemplate + 'static> AsyncRepository<E> for AsyncDispatcher<E, T> {
    fn save_async(&self, entity: E, reply: Reply<E>) {
        let call = MethodCall::new("save_async")
            .entity(entity)
            .returning(ReturnShape::Scalar);

        self.invoke(
            call,
            Box::new(move |result| reply(result.and_then(|r| expect_entity(r, "save_async")))),
        );
    }

    fn save_all_async(&self, entities: Vec<E>, reply: Reply<Vec<E>>) {
        let call = MethodCall::new("save_all_async").entities(entities);

        self.invoke(
            call,
            Box::new(move |result| reply(result.map(Returned::into_entities))),
        );
    }

    fn update_async(&self, entity: E, reply: Reply<E>) {
        let call = MethodCall::new("update_async")
            .entity(entity)
            .returning(ReturnShape::Scalar);

        self.invoke(
            call,
            Box::new(move |result| reply(result.and_then(|r| expect_entity(r, "update_async")))),
        );
    }

    fn delete_by_id_async(&self, id: Value, reply: Reply<()>) {
        let call = MethodCall::new("delete_by_id_async")
            .arg(id)
            .returning(ReturnShape::Unit);

        self.invoke(call, Box::new(move |result| reply(result.map(|_| ()))));
    }

    fn find_by_id_async(&self, id: Value, reply: Reply<Option<E>>) {
        let call = MethodCall::new("find_by_id_async")
            .arg(id)
            .returning(ReturnShape::Optional);

        self.invoke(
            call,
            Box::new(move |result| reply(result.map(Returned::into_single))),
        );
    }

    fn exists_by_id_async(&self, id: Value, reply: Reply<bool>) {
        let call = MethodCall::new("exists_by_id_async")
            .arg(id)
            .returning(ReturnShape::Bool);

        self.invoke(
            call,
            Box::new(move |result| {
                reply(result.and_then(|r| expect_flag(&r, "exists_by_id_async")));
            }),
        );
    }

    fn count_async(&self, reply: Reply<u64>) {
        let call = MethodCall::new("count_async").returning(ReturnShape::Count);

        self.invoke(
            call,
            Box::new(move |result| reply(result.and_then(|r| expect_count(&r, "count_async")))),
        );
    }

    fn find_all_async(&self, reply: Reply<Vec<E>>) {
        self.invoke(
            MethodCall::new("find_all"),
            Box::new(move |result| reply(result.map(Returned::into_entities))),
        );
    }

    fn invoke_async(&self, call: MethodCall<E>, reply: Reply<Returned<E>>) {
        self.invoke(call, reply);
    }
}

// ----------------------------------------------------------------------
// helpers
// ----------------------------------------------------------------------

type WriteFn<E, T> = fn(&EntityTemplate<T>, E, Reply<E>);

// shape check ahead of any delete
fn tallied<E>(call: &MethodCall<E>) -> Result<(), InternalError> {
    Ok(shape::check_tally(call.shape, &call.name)?)
}

/// Reply adapter for calls that report an affected-row count.
fn counted<E: EntityKind>(
    call: MethodCall<E>,
    reply: Reply<Returned<E>>,
) -> impl FnOnce(Result<u64, InternalError>) + Send + 'static {
    let declared = call.shape;
    let method = call.name;

    move |result| reply(result.and_then(|n| Ok(shape::tally(n, declared, &method)?)))
}

// Writes run one after another; the first failure stops the chain.
fn write_each<E, T>(
    template: EntityTemplate<T>,
    write: WriteFn<E, T>,
    mut pending: vec::IntoIter<E>,
    mut written: Vec<E>,
    reply: Reply<Vec<E>>,
) where
    E: EntityKind,
    T: AsyncTemplate + 'static,
{
    let Some(entity) = pending.next() else {
        return reply(Ok(written));
    };
    let next = template.clone();

    write(
        &template,
        entity,
        Box::new(move |result| match result {
            Ok(entity) => {
                written.push(entity);
                write_each(next, write, pending, written, reply);
            }
            Err(err) => reply(Err(err)),
        }),
    );
}

// probe by id only when one is set
fn save_one<E, T>(template: &EntityTemplate<T>, entity: E, reply: Reply<E>)
where
    E: EntityKind,
    T: AsyncTemplate + 'static,
{
    let id = match EntityConverter::<E>::global() {
        Ok(converter) => converter.schema().id_value(&entity),
        Err(err) => return reply(Err(err.into())),
    };
    let Some(id) = id else {
        return template.insert_async(entity, reply);
    };

    let next = template.clone();
    template.find_async::<E, _>(id, move |found| match found {
        Ok(Some(_)) => next.update_async(entity, reply),
        Ok(None) => next.insert_async(entity, reply),
        Err(err) => reply(Err(err)),
    });
}

fn update_one<E, T>(template: &EntityTemplate<T>, entity: E, reply: Reply<E>)
where
    E: EntityKind,
    T: AsyncTemplate + 'static,
{
    template.update_async(entity, reply);
}
