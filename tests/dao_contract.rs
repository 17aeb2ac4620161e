use std::collections::BTreeSet;

use actio::Error;
use actio::db::{CriteriaComponent, Dao, InMemoryDao, Model, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Employee {
    id: u32,
    name: String,
    dept: String,
    age: u32,
    salary: u32,
}

impl Model for Employee {
    type Id = u32;
    const COLLECTION: &'static str = "employees";
    fn id(&self) -> u32 {
        self.id
    }
}

fn employee(id: u32, name: &str, dept: &str, age: u32, salary: u32) -> Employee {
    Employee { id, name: name.into(), dept: dept.into(), age, salary }
}

fn fixture() -> InMemoryDao<Employee> {
    let dao = InMemoryDao::new();
    dao.save_all([
        employee(1, "alice", "eng", 34, 120),
        employee(2, "bob", "eng", 28, 90),
        employee(3, "carol", "ops", 45, 110),
        employee(4, "dave", "eng", 41, 95),
        employee(5, "erin", "sales", 31, 130),
        employee(6, "frank", "eng", 52, 150),
    ])
    .unwrap();
    dao
}

fn ids(found: &[Employee]) -> BTreeSet<u32> {
    found.iter().map(|e| e.id).collect()
}

#[test]
fn arity_mismatch_fails_everywhere() {
    let dao = fixture();
    let one = [json!("eng")];
    let three = [json!("eng"), json!(30), json!(1)];

    assert!(matches!(
        dao.find_by("dept, age >", &one),
        Err(Error::Arity { expected: 2, actual: 1 })
    ));
    assert!(matches!(dao.find_one_by("dept age>", &three), Err(Error::Arity { .. })));
    assert!(matches!(dao.count_by("dept", &three), Err(Error::Arity { .. })));
    assert!(matches!(dao.q_by("dept;age", &one), Err(Error::Arity { .. })));
    assert!(matches!(dao.or_by("dept:age", &one), Err(Error::Arity { .. })));
    assert!(matches!(dao.delete_by("dept age", &one), Err(Error::Arity { .. })));
    assert!(matches!(
        dao.save_fields(&employee(1, "", "", 0, 0), "age salary", &one),
        Err(Error::Arity { expected: 2, actual: 1 })
    ));

    // nothing was touched
    assert_eq!(dao.count().unwrap(), 6);
}

#[test]
fn find_by_id_miss_is_none() {
    let dao = fixture();
    assert!(dao.find_by_id(&42).unwrap().is_none());
    assert_eq!(dao.find_by_id(&3).unwrap().unwrap().name, "carol");
}

#[test]
fn find_by_id_list_returns_only_existing_ids_once() {
    let dao = fixture();
    let found = dao.find_by_id_list(&[1, 99, 3, 1, 100, 3]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(ids(&found), BTreeSet::from([1, 3]));
}

#[test]
fn q_combines_three_criteria_with_and() {
    let dao = fixture();
    let criteria = [
        CriteriaComponent::eq("dept", "eng"),
        CriteriaComponent::gt("age", 30),
        CriteriaComponent::gte("salary", 100),
    ];

    let via_where = dao.q_where(criteria.clone()).fetch().unwrap();
    assert_eq!(ids(&via_where), BTreeSet::from([1, 6]));

    let via_expr = dao
        .find_by("dept, age >, salary >=", &[json!("eng"), json!(30), json!(100)])
        .unwrap();
    assert_eq!(ids(&via_expr), ids(&via_where));

    let expected: BTreeSet<u32> = dao
        .find_all()
        .unwrap()
        .filter(|e| e.dept == "eng" && e.age > 30 && e.salary >= 100)
        .map(|e| e.id)
        .collect();
    assert_eq!(ids(&via_where), expected);
}

#[test]
fn or_combines_three_criteria_with_or() {
    let dao = fixture();
    let criteria = [
        CriteriaComponent::eq("dept", "ops"),
        CriteriaComponent::gt("age", 50),
        CriteriaComponent::gte("salary", 130),
    ];

    let via_where = dao.or_where(criteria).fetch().unwrap();
    assert_eq!(ids(&via_where), BTreeSet::from([3, 5, 6]));

    let via_expr = dao
        .or_by("dept age> salary>=", &[json!("ops"), json!(50), json!(130)])
        .unwrap()
        .fetch()
        .unwrap();
    assert_eq!(ids(&via_expr), ids(&via_where));
}

#[test]
fn partial_save_leaves_other_fields_unchanged() {
    let dao = fixture();
    let before = dao.find_by_id(&4).unwrap().unwrap();

    // stale copy: only the id is read from it
    let stale = employee(4, "ignored", "ignored", 0, 0);
    dao.save_fields(&stale, "salary", &[json!(99)]).unwrap();

    let after = dao.find_by_id(&4).unwrap().unwrap();
    assert_eq!(after.salary, 99);
    assert_eq!(after, Employee { salary: 99, ..before });
}

#[test]
fn partial_save_of_unknown_field_is_rejected() {
    let dao = fixture();
    let before = dao.find_by_id(&1).unwrap().unwrap();

    let err = dao.save_fields(&before, "ghost", &[json!("x")]).unwrap_err();
    assert!(matches!(err, Error::Expression(_)), "{err}");
    assert!(dao.find_by("ghost", &[json!("x")]).unwrap().is_empty());
    assert_eq!(dao.find_by_id(&1).unwrap().unwrap(), before);
}

#[test]
fn like_uses_processed_value() {
    let dao = fixture();
    let pattern: Value = dao.process_like_value("ar");
    assert_eq!(pattern, json!("%ar%"));

    let found = dao.find_by("name like", &[pattern]).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([3]));

    assert_eq!(dao.process_like_value("a%"), json!("a%"));
    let found = dao.find_by("name ~", &[dao.process_like_value("a%")]).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([1]));
}

#[test]
fn in_and_not_in() {
    let dao = fixture();
    let found = dao.find_by("dept in", &[json!(["ops", "sales"])]).unwrap();
    assert_eq!(ids(&found), BTreeSet::from([3, 5]));
    assert_eq!(dao.count_by("dept nin", &[json!(["eng"])]).unwrap(), 2);
}

#[test]
fn ordering_and_paging() {
    let dao = fixture();
    let oldest: Vec<u32> = dao
        .q()
        .order_by("-age")
        .limit(2)
        .fetch()
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(oldest, [6, 3]);

    let page: Vec<String> = dao
        .q()
        .filter("dept", &[json!("eng")])
        .unwrap()
        .order_by("name")
        .offset(1)
        .limit(2)
        .fetch()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(page, ["bob", "dave"]);

    let youngest = dao.q().order_by("age").first().unwrap().unwrap();
    assert_eq!(youngest.name, "bob");
}

#[test]
fn deletes_report_what_they_removed() {
    let dao = fixture();
    assert_eq!(dao.delete_by("dept", &[json!("eng")]).unwrap(), 4);
    assert!(dao.delete(&employee(3, "", "", 0, 0)).unwrap());
    assert!(!dao.delete_by_id(&3).unwrap());
    assert_eq!(dao.count().unwrap(), 1);
    assert_eq!(dao.delete_all().unwrap(), 1);
    assert!(dao.find_latest().unwrap().is_none());
}

#[test]
fn reload_and_latest() {
    let dao = fixture();
    assert_eq!(dao.find_latest().unwrap().unwrap().id, 6);

    dao.save_fields(&employee(2, "", "", 0, 0), "age", &[json!(29)]).unwrap();
    assert_eq!(dao.find_last_modified().unwrap().unwrap().id, 2);

    let reloaded = dao.reload(&employee(2, "", "", 0, 0)).unwrap().unwrap();
    assert_eq!(reloaded.age, 29);
    assert!(dao.reload(&employee(77, "", "", 0, 0)).unwrap().is_none());
}

#[test]
fn query_factories_agree_with_their_aliases() {
    let dao = fixture();
    let c = || [CriteriaComponent::eq("dept", "eng")];
    assert_eq!(dao.create_query().count().unwrap(), dao.q().count().unwrap());
    assert_eq!(dao.create_query_where(c()).criteria(), dao.q_where(c()).criteria());
    assert_eq!(dao.create_or_query_where(c()).criteria(), dao.or_where(c()).criteria());
    assert_eq!(
        dao.create_query_by("age >", &[json!(40)]).unwrap().count().unwrap(),
        dao.count_by("age >", &[json!(40)]).unwrap()
    );
    assert_eq!(
        dao.create_or_query_by("dept", &[json!("ops")]).unwrap().count().unwrap(),
        1
    );
    assert!(dao.model_type().ends_with("Employee"));
    assert_eq!(dao.id_type(), "u32");
}
