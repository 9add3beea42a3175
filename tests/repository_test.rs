//! Repository operations against a file-backed store.
//!
//! Tests:
//! - Course upsert, read, delete and search
//! - User lifecycle and course list edits
//! - Persistence across a reopen

mod common;

use common::{course, TestFixture, TEST_SALT};
use courseload::auth::hash_password;
use courseload::{CourseQuery, Error, NewUser, Store, StoreConfig};
use tokio_test::{assert_err, assert_ok};

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        password: "hunter2".into(),
        privilege: 0,
    }
}

#[tokio::test]
async fn test_course_round_trip_keeps_children() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    let original = course("202410-10001", 2, 1);
    assert_ok!(store.insert_course(&original).await);

    let loaded = store.get_course("202410-10001").await.unwrap();
    assert_eq!(loaded, original);
    assert_eq!(loaded.instructors.len(), 2);
    assert_eq!(loaded.meetings.len(), 1);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_insert_replaces_existing_course() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    assert_ok!(store.insert_course(&course("202410-10001", 3, 2)).await);

    let mut replacement = course("202410-10001", 1, 0);
    replacement.title = "Operating Systems".into();
    assert_ok!(store.insert_course(&replacement).await);

    let loaded = store.get_course("202410-10001").await.unwrap();
    assert_eq!(loaded, replacement);
    assert_eq!(store.course_count().await.unwrap(), 1);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_delete_course_and_missing_lookup() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    assert_ok!(store.insert_course(&course("202410-10001", 1, 1)).await);
    assert_ok!(store.insert_course(&course("202410-10002", 1, 1)).await);
    assert_ok!(store.delete_course("202410-10001").await);

    let missing = store.get_course("202410-10001").await;
    assert_err!(&missing);
    assert!(matches!(missing, Err(Error::NotFound(crn)) if crn == "202410-10001"));

    // Deleting an unknown course is not an error
    assert_ok!(store.delete_course("202410-99999").await);
    assert_eq!(store.course_crns().await.unwrap(), vec!["202410-10002"]);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_query_courses_by_each_key() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    let mut os = course("202410-10001", 1, 1);
    os.title = "Operating Systems".into();
    os.subject_code = "CS".into();
    os.course_number = "620".into();

    let mut ds = course("202410-10002", 1, 1);
    ds.title = "Data Structures".into();
    ds.subject_code = "CS".into();
    ds.course_number = "515".into();

    let mut calc = course("202410-10003", 1, 1);
    calc.title = "Calculus I".into();
    calc.subject_code = "MATH".into();
    calc.course_number = "425".into();

    for c in [&os, &ds, &calc] {
        assert_ok!(store.insert_course(c).await);
    }

    let crns = |courses: Vec<courseload::Course>| {
        courses.into_iter().map(|c| c.term_crn).collect::<Vec<_>>()
    };

    let by_crn = store.query_courses("term_crn", &["202410-10002"]).await.unwrap();
    assert_eq!(by_crn, vec![ds.clone()]);

    let by_title = store.query_courses("title", &["systems"]).await.unwrap();
    assert_eq!(crns(by_title), vec!["202410-10001"]);

    let by_subject = store.query_courses("subject_code", &["CS"]).await.unwrap();
    assert_eq!(crns(by_subject), vec!["202410-10001", "202410-10002"]);

    let by_number = store.query_courses("course_number", &["425"]).await.unwrap();
    assert_eq!(crns(by_number), vec!["202410-10003"]);

    let by_both = store.query_courses("subject-number", &["CS", "5"]).await.unwrap();
    assert_eq!(crns(by_both), vec!["202410-10002"]);

    let none = store.query_courses("subject_code", &["HIST"]).await.unwrap();
    assert!(none.is_empty());

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_query_wildcards_are_literal() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    let mut c = course("202410-10001", 0, 0);
    c.title = "Special Topics".into();
    assert_ok!(store.insert_course(&c).await);

    assert!(store.query_courses("title", &["%"]).await.unwrap().is_empty());
    assert!(store.query_courses("title", &["_pecial"]).await.unwrap().is_empty());
    assert_eq!(store.query_courses("title", &["topics"]).await.unwrap().len(), 1);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_unknown_query_key_is_rejected() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    let result = store.query_courses("room; DROP TABLE courses", &["x"]).await;
    assert!(matches!(result, Err(Error::InvalidKey(_))));

    let missing_value = store.query_courses("subject-number", &["CS"]).await;
    assert!(matches!(missing_value, Err(Error::InvalidArgument(_))));

    let query = CourseQuery::parse("subject_code", &["CS"]).unwrap();
    assert!(store.find_courses(query).await.unwrap().is_empty());

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_user_lifecycle() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    let created = store.create_user(new_user("ada@unh.edu")).await.unwrap();
    assert_eq!(created.email, "ada@unh.edu");
    assert_eq!(created.password_hash, hash_password(TEST_SALT, "hunter2"));
    assert_ne!(created.password_hash, "hunter2");
    assert!(created.courses.is_empty());

    let duplicate = store.create_user(new_user("ada@unh.edu")).await;
    assert!(matches!(duplicate, Err(Error::AlreadyExists(email)) if email == "ada@unh.edu"));

    assert_ok!(store.create_user(new_user("alan@unh.edu")).await);
    let emails: Vec<_> = store
        .all_users()
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.email)
        .collect();
    assert_eq!(emails, vec!["ada@unh.edu", "alan@unh.edu"]);

    let renamed = store.rename_user("ada@unh.edu", "Augusta", "King").await.unwrap();
    assert_eq!((renamed.first_name.as_str(), renamed.last_name.as_str()), ("Augusta", "King"));
    assert_eq!(store.get_user("ada@unh.edu").await.unwrap(), renamed);

    assert_ok!(store.delete_user("ada@unh.edu").await);
    assert!(matches!(store.get_user("ada@unh.edu").await, Err(Error::NotFound(_))));
    assert!(matches!(store.delete_user("ada@unh.edu").await, Err(Error::NotFound(_))));
    assert!(matches!(
        store.rename_user("ada@unh.edu", "A", "B").await,
        Err(Error::NotFound(_))
    ));

    let empty_email = store.create_user(new_user("  ")).await;
    assert!(matches!(empty_email, Err(Error::InvalidArgument(_))));

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_course_list_edits() {
    let fixture = TestFixture::new();
    let store = &fixture.store;

    assert_ok!(store.insert_course(&course("202410-10001", 1, 1)).await);
    assert_ok!(store.insert_course(&course("202410-10002", 1, 1)).await);
    assert_ok!(store.create_user(new_user("ada@unh.edu")).await);

    let user = store.add_class("ada@unh.edu", "202410-10001").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10001"]);

    // Adding twice keeps a single entry
    let user = store.add_class("ada@unh.edu", "202410-10001").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10001"]);

    // Unknown courses are ignored
    let user = store.add_class("ada@unh.edu", "202410-99999").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10001"]);

    let user = store.add_class("ada@unh.edu", "202410-10002").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10001", "202410-10002"]);

    let user = store.remove_class("ada@unh.edu", "202410-10001").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10002"]);

    // Removing an absent entry changes nothing
    let user = store.remove_class("ada@unh.edu", "202410-10001").await.unwrap();
    assert_eq!(user.courses, vec!["202410-10002"]);

    assert_eq!(store.get_user("ada@unh.edu").await.unwrap().courses, vec!["202410-10002"]);

    let unknown = store.add_class("nobody@unh.edu", "202410-10002").await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_course_list_edits_are_not_lost() {
    let fixture = TestFixture::new();
    let store = fixture.store.clone();

    let crns: Vec<String> = (0..20).map(|i| format!("202410-{}", 20000 + i)).collect();
    for crn in &crns {
        assert_ok!(store.insert_course(&course(crn, 0, 0)).await);
    }
    assert_ok!(store.create_user(new_user("ada@unh.edu")).await);

    let tasks: Vec<_> = crns
        .iter()
        .cloned()
        .map(|crn| {
            let store = store.clone();
            tokio::spawn(async move { store.add_class("ada@unh.edu", &crn).await })
        })
        .collect();
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    let mut listed = store.get_user("ada@unh.edu").await.unwrap().courses;
    listed.sort();
    assert_eq!(listed, crns);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let mut fixture = TestFixture::new();

    assert_ok!(fixture.store.insert_course(&course("202410-10001", 2, 2)).await);
    assert_ok!(fixture.store.create_user(new_user("ada@unh.edu")).await);
    fixture.stop().await;

    let mut config = StoreConfig::new(&fixture.db_path);
    config.password_salt = TEST_SALT.into();
    let (store, worker): (Store, _) = Store::open(&config).unwrap();

    assert_eq!(store.get_course("202410-10001").await.unwrap(), course("202410-10001", 2, 2));
    assert_eq!(store.all_users().await.unwrap().len(), 1);

    worker.shutdown().await.unwrap();
}
