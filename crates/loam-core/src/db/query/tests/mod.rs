
use crate::{
    db::query::{
        BindError, BindOutcome, CallArg, CompareOp, ConditionNode, Connective, DeleteBuilder,
        DerivedQuery, Direction, Pagination, QueryBuilder, QueryDerivationError, Sort,
        StructuredQuery, bind, bind_named, builder::*, derive_delete, derive_select, parse,
    },
    model::{RecordShape, SchemaRegistry},
    obs::{MetricsEvent, MetricsSink, with_metrics_sink},
    test_fixtures::{Order, Person},
    value::{Value, ValueKind},
};
use std::{cell::RefCell, sync::Arc};

// ----------------------------------------------------------------------
// helpers
// ----------------------------------------------------------------------

fn person_shape() -> Arc<RecordShape> {
    SchemaRegistry::new()
        .shape_of::<Person>()
        .expect("person shape")
}

fn order_shape() -> Arc<RecordShape> {
    SchemaRegistry::new()
        .shape_of::<Order>()
        .expect("order shape")
}

fn derive(
    method: &str,
    shape: &RecordShape,
    args: &[CallArg],
) -> Result<DerivedQuery<StructuredQuery>, QueryDerivationError> {
    let spec = parse(method, "findBy")?;

    derive_select(&spec, shape, args)
}

fn values<const N: usize>(items: [Value; N]) -> Vec<CallArg> {
    items.into_iter().map(CallArg::Value).collect()
}

// ----------------------------------------------------------------------
// grammar
// ----------------------------------------------------------------------

#[test]
fn suffixes_map_to_operators() {
    let cases = [
        ("findByAgeBetween", CompareOp::Between, false),
        ("findByAgeGreaterThanEqual", CompareOp::Gte, false),
        ("findByAgeGreaterThan", CompareOp::Gt, false),
        ("findByAgeLessThanEqual", CompareOp::Lte, false),
        ("findByAgeLessThan", CompareOp::Lt, false),
        ("findByNameLike", CompareOp::Like, false),
        ("findByAgeNotIn", CompareOp::In, true),
        ("findByAgeIn", CompareOp::In, false),
        ("findByNameNotEquals", CompareOp::Ne, false),
        ("findByNameNot", CompareOp::Eq, true),
        ("findByName", CompareOp::Eq, false),
    ];

    for (method, op, negated) in cases {
        let spec = parse(method, "findBy").expect(method);
        assert_eq!(spec.terms.len(), 1, "{method}");
        assert_eq!(spec.terms[0].op, op, "{method}");
        assert_eq!(spec.terms[0].negated, negated, "{method}");
    }
}

#[test]
fn leading_not_negates_only_its_term() {
    let spec = parse("findByNotNameLikeAndAge", "findBy").expect("parse");

    assert_eq!(spec.terms[0].path, "name");
    assert_eq!(spec.terms[0].op, CompareOp::Like);
    assert!(spec.terms[0].negated);
    assert!(!spec.terms[1].negated);
}

#[test]
fn identifiers_become_snake_case_paths() {
    let spec = parse("findByFirstNameAndAddress_CityOrderByAddress_ZipDesc", "findBy")
        .expect("parse");

    assert_eq!(spec.terms[0].path, "first_name");
    assert_eq!(spec.terms[1].path, "address.city");
    assert_eq!(spec.orderings[0].path, "address.zip");
    assert_eq!(spec.orderings[0].direction, Direction::Desc);
}

#[test]
fn connectives_need_a_word_boundary() {
    // "Brand" and "Origin" contain the tokens but not at a boundary
    let spec = parse("findByBrandOrOrigin", "findBy").expect("parse");

    assert_eq!(spec.terms.len(), 2);
    assert_eq!(spec.terms[0].path, "brand");
    assert_eq!(spec.terms[1].path, "origin");
    assert_eq!(spec.connectives, vec![Connective::Or]);
}

#[test]
fn bare_prefix_is_an_empty_predicate() {
    let err = parse("findBy", "findBy").expect_err("empty");

    assert_eq!(
        err,
        QueryDerivationError::EmptyPredicate {
            method: "findBy".to_string()
        }
    );
}

#[test]
fn ordering_without_predicate_is_allowed() {
    let spec = parse("findByOrderByAgeDesc", "findBy").expect("parse");

    assert!(spec.terms.is_empty());
    assert_eq!(spec.orderings.len(), 1);
    assert_eq!(spec.slot_count(), 0);
}

#[test]
fn operator_without_field_is_rejected() {
    let err = parse("findByBetween", "findBy").expect_err("no field");

    assert_eq!(
        err,
        QueryDerivationError::UnknownOperatorSuffix {
            term: "Between".to_string()
        }
    );
}

// ----------------------------------------------------------------------
// derivation
// ----------------------------------------------------------------------

#[test]
fn and_between_derives_and_binds() {
    let shape = person_shape();
    let derived = derive(
        "findByNameAndAgeBetween",
        &shape,
        &values([Value::from("Ada"), Value::from(10), Value::from(20)]),
    )
    .expect("derive");

    assert_eq!(
        derived.query.condition,
        Some(
            param("name", CompareOp::Eq, "name")
                .and(param("age", CompareOp::Between, "age"))
        )
    );

    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("name"), Some(&Value::from("Ada")));
    assert_eq!(
        bindings.get("age"),
        Some(&Value::list([Value::Uint(10), Value::Uint(20)]))
    );

    let bound = derived.query.bind(&bindings);
    assert_eq!(
        bound.to_string(),
        "select * from Person where (name = 'Ada' and age between 10 and 20)"
    );
}

#[test]
fn or_derives_a_disjunction() {
    let shape = person_shape();
    let derived = derive(
        "findByNameOrAge",
        &shape,
        &values([Value::from("Ada"), Value::from(10)]),
    )
    .expect("derive");

    assert_eq!(
        derived.query.condition,
        Some(param("name", CompareOp::Eq, "name").or(param("age", CompareOp::Eq, "age")))
    );
}

#[test]
fn connectives_fold_left_to_right() {
    let shape = person_shape();
    let derived = derive(
        "findByNameAndAgeOrNickname",
        &shape,
        &values([Value::from("a"), Value::from(1), Value::from("b")]),
    )
    .expect("derive");

    assert_eq!(
        derived.query.condition,
        Some(
            param("name", CompareOp::Eq, "name")
                .and(param("age", CompareOp::Eq, "age"))
                .or(param("nickname", CompareOp::Eq, "nickname"))
        )
    );
}

#[test]
fn like_with_orderings() {
    let shape = person_shape();
    let derived = derive(
        "findByNameLikeOrderByNameDescOrderByAgeAsc",
        &shape,
        &values([Value::from("Ada")]),
    )
    .expect("derive");

    assert_eq!(
        derived.query.condition,
        Some(param("name", CompareOp::Like, "name"))
    );
    assert_eq!(
        derived.query.sorts,
        vec![Sort::desc("name"), Sort::asc("age")]
    );
}

#[test]
fn too_few_arguments_is_an_arity_mismatch() {
    let shape = person_shape();

    let err = derive(
        "findByNameAndAgeBetween",
        &shape,
        &values([Value::from("Ada"), Value::from(10)]),
    )
    .expect_err("arity");
    assert_eq!(
        err,
        QueryDerivationError::ArityMismatch {
            expected: 3,
            found: 2
        }
    );

    let err = derive("findByName", &shape, &[]).expect_err("arity");
    assert_eq!(
        err,
        QueryDerivationError::ArityMismatch {
            expected: 1,
            found: 0
        }
    );
}

#[test]
fn extra_arguments_are_ignored() {
    let shape = person_shape();
    let derived = derive(
        "findByName",
        &shape,
        &values([Value::from("Ada"), Value::from("extra")]),
    )
    .expect("derive");

    assert_eq!(derived.arguments, vec![Value::from("Ada")]);
}

#[test]
fn markers_contribute_sorts_and_pagination_anywhere() {
    let shape = person_shape();
    let derived = derive(
        "findByAgeGreaterThanOrderByName",
        &shape,
        &[
            CallArg::from(Sort::desc("address.city")),
            CallArg::value(30),
            CallArg::from(Pagination::page(3, 10)),
        ],
    )
    .expect("derive");

    assert_eq!(derived.arguments, vec![Value::from(30)]);
    assert_eq!(
        derived.query.sorts,
        vec![Sort::asc("name"), Sort::desc("city")]
    );
    assert_eq!(derived.query.pagination(), Pagination::new(20, 10));
}

#[test]
fn paths_resolve_to_storage_names() {
    let shape = order_shape();
    let derived = derive(
        "findByIdAndOwner_Address_City",
        &shape,
        &values([Value::from("01ARZ3NDEKTSV4RRFFQ69G5FAV"), Value::from("Oslo")]),
    )
    .expect("derive");

    let fields: Vec<_> = derived
        .query
        .condition
        .as_ref()
        .expect("condition")
        .comparisons()
        .into_iter()
        .map(|cmp| cmp.field.clone())
        .collect();
    assert_eq!(fields, vec!["order_id", "owner.city"]);
    assert_eq!(derived.placeholders[1].name, "owner.address.city");
}

#[test]
fn unmapped_fields_pass_through() {
    let shape = person_shape();
    let derived = derive("findByShoeSize", &shape, &values([Value::from(42)])).expect("derive");

    assert_eq!(derived.placeholders[0].storage_path, "shoe_size");

    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("shoe_size"), Some(&Value::Int(42)));
}

#[test]
fn flattened_owners_cannot_be_compared() {
    let shape = person_shape();

    let err = derive("findByAddress", &shape, &values([Value::from("x")])).expect_err("owner");
    assert_eq!(
        err,
        QueryDerivationError::FlattenedField {
            field: "address".to_string()
        }
    );

    let order = order_shape();
    let err = derive("findByOwner_Address", &order, &values([Value::from("x")]))
        .expect_err("nested owner");
    assert!(matches!(err, QueryDerivationError::FlattenedField { .. }));
}

#[test]
fn repeated_fields_get_distinct_placeholders() {
    let shape = person_shape();
    let derived = derive(
        "findByAgeGreaterThanAndAgeLessThan",
        &shape,
        &values([Value::from(10), Value::from(20)]),
    )
    .expect("derive");

    let names: Vec<_> = derived.placeholders.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["age", "age_1"]);

    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("age_1"), Some(&Value::Uint(20)));
}

#[test]
fn derived_delete_ignores_markers() {
    let shape = person_shape();
    let spec = parse("deleteByName", "deleteBy").expect("parse");

    let derived = derive_delete(
        &spec,
        &shape,
        &[CallArg::value("Ada"), CallArg::from(Sort::asc("age"))],
    )
    .expect("derive");

    assert_eq!(
        derived.query.condition,
        Some(param("name", CompareOp::Eq, "name"))
    );
    assert_eq!(
        derived.query.to_string(),
        "delete from Person where name = @name"
    );
}

// ----------------------------------------------------------------------
// binding
// ----------------------------------------------------------------------

#[derive(Default)]
struct Outcomes(RefCell<Vec<BindOutcome>>);

impl MetricsSink for Outcomes {
    fn record(&self, event: MetricsEvent) {
        if let MetricsEvent::Bind { outcome, .. } = event {
            self.0.borrow_mut().push(outcome);
        }
    }
}

#[test]
fn text_id_is_coerced_to_the_declared_type() {
    let shape = person_shape();
    let derived = derive("findById", &shape, &values([Value::from("10")])).expect("derive");
    let outcomes = Outcomes::default();

    let bindings = with_metrics_sink(&outcomes, || {
        bind(&derived.placeholders, &derived.arguments, &shape)
    })
    .expect("bind");

    assert_eq!(derived.placeholders[0].storage_path, "_id");
    assert_eq!(bindings.get("id"), Some(&Value::Uint(10)));
    assert_eq!(*outcomes.0.borrow(), vec![BindOutcome::Coerced]);
}

#[test]
fn converter_runs_before_coercion() {
    let shape = order_shape();
    let derived = derive("findByStatus", &shape, &values([Value::from("closed")])).expect("derive");
    let outcomes = Outcomes::default();

    let bindings = with_metrics_sink(&outcomes, || {
        bind(&derived.placeholders, &derived.arguments, &shape)
    })
    .expect("bind");

    assert_eq!(bindings.get("status"), Some(&Value::Int(2)));
    assert_eq!(*outcomes.0.borrow(), vec![BindOutcome::Converted]);
}

#[test]
fn converter_rejection_is_a_bind_error() {
    let shape = order_shape();
    let derived = derive("findByStatus", &shape, &values([Value::from("lost")])).expect("derive");

    let err = bind(&derived.placeholders, &derived.arguments, &shape).expect_err("rejected");
    assert!(matches!(err, BindError::Converter { ref field, .. } if field == "status"));
}

#[test]
fn unconvertible_values_name_the_target_type() {
    let shape = person_shape();
    let derived = derive("findByAge", &shape, &values([Value::from("old")])).expect("derive");

    let err = bind(&derived.placeholders, &derived.arguments, &shape).expect_err("bad");
    assert_eq!(
        err,
        BindError::Unconvertible {
            field: "age".to_string(),
            value: Value::from("old"),
            target: ValueKind::Uint,
        }
    );
}

#[test]
fn bind_checks_count_before_converting() {
    let shape = person_shape();
    let derived = derive("findByAge", &shape, &values([Value::from("old")])).expect("derive");

    // the bad value would fail conversion; the count is checked first
    let err = bind(
        &derived.placeholders,
        &[Value::from("old"), Value::from(1)],
        &shape,
    )
    .expect_err("count");
    assert_eq!(
        err,
        BindError::ArityMismatch {
            expected: 1,
            found: 2
        }
    );
}

#[test]
fn in_operands_convert_element_wise() {
    let shape = person_shape();

    let derived = derive(
        "findByAgeIn",
        &shape,
        &values([Value::list([Value::from("1"), Value::from(2)])]),
    )
    .expect("derive");
    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(
        bindings.get("age"),
        Some(&Value::list([Value::Uint(1), Value::Uint(2)]))
    );

    let derived = derive("findByAgeIn", &shape, &values([Value::from(5)])).expect("derive");
    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("age"), Some(&Value::list([Value::Uint(5)])));
}

#[test]
fn scalars_against_list_fields_stay_scalar() {
    let shape = person_shape();

    let derived = derive("findByTags", &shape, &values([Value::from("poetry")])).expect("derive");
    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("tags"), Some(&Value::from("poetry")));

    let derived = derive(
        "findByTagsIn",
        &shape,
        &values([Value::list(["math", "art"])]),
    )
    .expect("derive");
    let bindings = bind(&derived.placeholders, &derived.arguments, &shape).expect("bind");
    assert_eq!(bindings.get("tags"), Some(&Value::list(["math", "art"])));
}

#[test]
fn named_binding_follows_the_same_rules() {
    let shape = person_shape();

    let bindings = bind_named(
        [
            ("age", Value::from("30")),
            ("tags", Value::list(["a", "b"])),
            ("address.city", Value::list(["Oslo", "Bergen"])),
            ("unknown", Value::from(1)),
        ],
        &shape,
    )
    .expect("bind");

    assert_eq!(bindings.get("age"), Some(&Value::Uint(30)));
    assert_eq!(bindings.get("tags"), Some(&Value::list(["a", "b"])));
    assert_eq!(
        bindings.get("address.city"),
        Some(&Value::list(["Oslo", "Bergen"]))
    );
    assert_eq!(bindings.get("unknown"), Some(&Value::Int(1)));
}

#[test]
fn unbound_params_survive_binding() {
    let query = StructuredQuery::all("Person")
        .with_condition(
            param("name", CompareOp::Eq, "name").and(param("age", CompareOp::Eq, "age")),
        );
    let bindings = [("name".to_string(), Value::from("Ada"))]
        .into_iter()
        .collect();

    let bound = query.bind(&bindings);
    assert_eq!(
        bound.condition.as_ref().map(ConditionNode::params),
        Some(vec!["age"])
    );
}

// ----------------------------------------------------------------------
// structured queries
// ----------------------------------------------------------------------

#[test]
fn fingerprint_tracks_query_text() {
    let a = select("Person").filter(eq("name", "Ada")).build();
    let b = select("Person").filter(eq("name", "Ada")).build();
    let c = select("Person").filter(eq("name", "Bob")).build();

    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(a.fingerprint(), c.fingerprint());
}

#[test]
fn pages_are_one_based() {
    assert_eq!(Pagination::page(1, 20), Pagination::new(0, 20));
    assert_eq!(Pagination::page(3, 20), Pagination::new(40, 20));
    assert_eq!(Pagination::page(0, 20), Pagination::new(0, 20));
}

#[test]
fn negation_pushes_down() {
    let condition = not(eq("a", 1).and(eq("b", 2)));

    assert_eq!(condition.to_string(), "(not a = 1 or not b = 2)");
}

#[test]
fn builder_renders_every_clause() {
    let query = select("Person")
        .filter(eq("name", "Ada"))
        .filter(between("age", 10, 20))
        .or_filter(in_("nickname", ["ada", "countess"]))
        .order_by_desc("age")
        .order_by("name")
        .skip(5)
        .limit(10)
        .build();

    assert_eq!(
        query.to_string(),
        "select * from Person where ((name = 'Ada' and age between 10 and 20) or \
         nickname in ['ada', 'countess']) order by age desc, name asc skip 5 limit 10"
    );
}

#[test]
fn mapped_builder_resolves_declared_names() {
    let query = QueryBuilder::mapped(person_shape())
        .filter(eq("address.city", "Oslo").or(like("name", "A%")))
        .order_by("id")
        .build();

    assert_eq!(
        query.to_string(),
        "select * from Person where (city = 'Oslo' or name like 'A%') order by _id asc"
    );

    let delete = DeleteBuilder::mapped(person_shape())
        .filter(gte("age", 18))
        .build();
    assert_eq!(delete.to_string(), "delete from Person where age >= 18");
}
