use crate::{
    db::{
        memory::MemoryTemplate,
        query::{DeleteQuery, StructuredQuery, builder::*},
        repository::DispatchError,
        template::{EntityTemplate, Template},
        workflow::{HookError, PersistListener, PersistWorkflow},
    },
    error::ErrorClass,
    test_fixtures::{Order, Person},
};
use std::sync::{Arc, Mutex, mpsc};
use ulid::Ulid;

fn people() -> EntityTemplate<MemoryTemplate> {
    let template = EntityTemplate::new(MemoryTemplate::new());
    template
        .insert_all([
            Person::new(1, "Ada", 36).living_in("London"),
            Person::new(2, "Bob", 17).living_in("Paris"),
            Person::new(3, "Cy", 52).living_in("London"),
        ])
        .expect("seed");

    template
}

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.name.as_str()).collect()
}

#[test]
fn insert_then_find_round_trips_through_records() {
    let template = people();

    let found = template.find::<Person>(1u64).expect("find");
    assert_eq!(found, Some(Person::new(1, "Ada", 36).living_in("London")));

    let stored = template.template().records("Person").expect("records");
    assert_eq!(stored[0].get("city").and_then(|v| v.as_text()), Some("London"));
    assert!(stored[0].get("address").is_none());
}

#[test]
fn find_converts_the_id_like_a_parameter() {
    let template = people();

    // text id is coerced to the declared unsigned kind
    assert!(template.find::<Person>("2").expect("find").is_some());
    assert!(template.exists_by_id::<Person>(3).expect("exists"));
    assert!(!template.exists_by_id::<Person>(9).expect("exists"));
}

#[test]
fn update_replaces_by_key_and_delete_by_id_removes() {
    let template = people();

    let mut bob = template.find::<Person>(2).expect("find").expect("bob");
    bob.age = 18;
    template.update(bob).expect("update");

    assert_eq!(template.count::<Person>().expect("count"), 3);
    assert_eq!(
        template.find::<Person>(2).expect("find").map(|p| p.age),
        Some(18)
    );

    assert_eq!(template.delete_by_id::<Person>(2).expect("delete"), 1);
    assert_eq!(template.delete_by_id::<Person>(2).expect("delete"), 0);
    assert_eq!(template.count_entity("Person").expect("count"), 2);
}

#[test]
fn select_and_delete_take_structured_queries() {
    let template = people();

    let londoners: Vec<Person> = template
        .select(&select("Person").filter(eq("city", "London")).order_by_desc("age").build())
        .expect("select");
    assert_eq!(names(&londoners), vec!["Cy", "Ada"]);

    let removed = template
        .delete(&delete("Person").filter(lt("age", 18)).build())
        .expect("delete");
    assert_eq!(removed, 1);
}

#[test]
fn literal_queries_and_single_results() {
    let template = people();

    let adults: Vec<Person> = template
        .query("select * from Person where age >= 18 order by name")
        .expect("query");
    assert_eq!(names(&adults), vec!["Ada", "Cy"]);

    let none = template
        .single_result::<Person>("select * from Person where name = 'Zed'")
        .expect("single");
    assert_eq!(none, None);

    let err = template
        .single_result::<Person>("select * from Person where city = 'London'")
        .expect_err("two rows");
    assert!(matches!(
        err.dispatch_error(),
        Some(DispatchError::NonUniqueResult { count: 2, .. })
    ));
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn prepared_statements_bind_then_convert() {
    let template = people();

    let mut statement = template
        .prepare::<Person>("select * from Person where city = @city and age > @age")
        .expect("prepare")
        .bind("city", "London")
        .bind("age", 40);

    let found = statement.single_result().expect("single");
    assert_eq!(found.map(|p| p.name), Some("Cy".to_string()));
}

#[test]
fn sub_entity_ids_use_their_storage_name() {
    let template = EntityTemplate::new(MemoryTemplate::new().with_entity_key("Order", "order_id"));
    let id = Ulid::from_parts(1, 7);
    let order = Order {
        id,
        status: "open".to_string(),
        ..Order::default()
    };

    template.insert(order.clone()).expect("insert");
    template
        .update(Order {
            status: "closed".to_string(),
            ..order
        })
        .expect("update");

    let stored = template.template().records("Order").expect("records");
    assert_eq!(stored.len(), 1);

    let found = template.find::<Order>(id).expect("find").expect("order");
    assert_eq!(found.status, "closed");
}

// ----------------------------------------------------------------------
// hooks
// ----------------------------------------------------------------------

#[derive(Default)]
struct Audit {
    queries: Mutex<Vec<String>>,
    deny_deletes: bool,
}

impl PersistListener for Audit {
    fn pre_query(&self, query: &StructuredQuery) -> Result<(), HookError> {
        self.queries
            .lock()
            .expect("audit lock")
            .push(query.to_string());
        Ok(())
    }

    fn pre_delete(&self, query: &DeleteQuery) -> Result<(), HookError> {
        if self.deny_deletes {
            return Err(HookError::abort(format!("denied: {query}")));
        }
        Ok(())
    }
}

#[test]
fn query_hooks_see_find_queries_and_can_veto_deletes() {
    let audit = Arc::new(Audit {
        deny_deletes: true,
        ..Audit::default()
    });
    let template = people().with_workflow(PersistWorkflow::new().with_listener(audit.clone()));

    template.find::<Person>(1).expect("find");
    assert_eq!(
        *audit.queries.lock().expect("audit lock"),
        vec!["select * from Person where _id = 1".to_string()]
    );

    let err = template.delete_by_id::<Person>(1).expect_err("vetoed");
    assert_eq!(err.class, ErrorClass::Aborted);
    assert_eq!(template.count::<Person>().expect("count"), 3);
}

// ----------------------------------------------------------------------
// async
// ----------------------------------------------------------------------

#[test]
fn async_writes_and_reads_complete_through_callbacks() {
    let template = people();
    let (tx, rx) = mpsc::channel();

    let sent = tx.clone();
    template.insert_async(Person::new(4, "Di", 29), move |result| {
        let _ = sent.send(result.map(|p| p.name));
    });
    assert_eq!(rx.recv().expect("insert").expect("inserted"), "Di");

    let (found_tx, found_rx) = mpsc::channel();
    template.find_async::<Person, _>(4, move |result| {
        let _ = found_tx.send(result.map(|p| p.map(|p| p.age)));
    });
    assert_eq!(found_rx.recv().expect("find").expect("found"), Some(29));

    let (count_tx, count_rx) = mpsc::channel();
    template.count_async::<Person, _>(move |result| {
        let _ = count_tx.send(result);
    });
    assert_eq!(count_rx.recv().expect("count").expect("counted"), 4);

    let (query_tx, query_rx) = mpsc::channel();
    template.query_async::<Person, _>("select * from Person where age < 30", move |result| {
        let _ = query_tx.send(result.map(|found| found.len()));
    });
    assert_eq!(query_rx.recv().expect("query").expect("queried"), 2);

    drop(tx);
}

#[test]
fn async_delete_by_id_reports_the_count() {
    let template = people();
    let (tx, rx) = mpsc::channel();

    template.delete_by_id_async::<Person, _>(3, move |result| {
        let _ = tx.send(result);
    });

    assert_eq!(rx.recv().expect("delete").expect("deleted"), 1);
    assert_eq!(template.template().count("Person").expect("count"), 2);
}
