use cms_core::db::open_db_in_memory;
use cms_core::{
    build_sqlite_service, ContentSchema, EngineConfig, EngineError, Fields, IssueKind, ItemQuery,
    ItemStatus, SqliteContentService, StaticTokenValidator,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;

const TOKEN: Option<&str> = Some("editor-token");

fn people_schema() -> ContentSchema {
    ContentSchema::from_json(
        r#"{
            "name": "people",
            "fields": {
                "name": {"type": "string", "required": true},
                "age": {"type": "int"},
                "address": {
                    "type": "object",
                    "fields": {
                        "city": {"type": "string", "required": true},
                        "zip": {"type": "string"}
                    }
                },
                "tags": {"type": "array", "element_type": {"type": "string"}}
            }
        }"#,
    )
    .unwrap()
}

fn service(conn: &Connection) -> SqliteContentService<'_> {
    let auth = StaticTokenValidator::new();
    auth.grant("editor-token", "editor");
    build_sqlite_service(conn, people_schema(), Arc::new(auth), &EngineConfig::default()).unwrap()
}

fn fields(value: Value) -> Fields {
    value.as_object().unwrap().clone()
}

#[test]
fn create_assigns_metadata_and_get_returns_it() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);

    let created = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan", "age": 24}))))
        .unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.status, ItemStatus::Visible);
    assert_eq!(created.created, created.updated);
    assert_eq!(created.created.by, "editor");

    let loaded = people
        .get(TOKEN, &created.id.to_string(), None)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.fields["name"], json!("Ryan"));
}

#[test]
fn mutations_return_previous_version_and_advance_history() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let created = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan", "age": 24}))))
        .unwrap();
    let id = created.id.to_string();

    let before_update = people
        .update(TOKEN, &id, Some(&fields(json!({"name": "Ryan", "age": 25}))))
        .unwrap()
        .unwrap();
    assert_eq!(before_update.version, 1);
    assert_eq!(before_update.fields["age"], json!(24));

    let before_patch = people
        .patch(TOKEN, &id, Some(&fields(json!({"age": 26}))))
        .unwrap()
        .unwrap();
    assert_eq!(before_patch.version, 2);
    assert_eq!(before_patch.fields["age"], json!(25));

    let before_remove = people.remove(TOKEN, &id).unwrap().unwrap();
    assert_eq!(before_remove.version, 3);
    assert_eq!(before_remove.fields["age"], json!(26));

    let history = people.history(TOKEN, &id).unwrap();
    let versions: Vec<u32> = history.iter().map(|item| item.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(history[3].status, ItemStatus::Removed);
    assert!(history.iter().all(|item| item.created == created.created));

    assert!(people.get(TOKEN, &id, None).unwrap().is_none());
    let removed = people
        .get(TOKEN, &id, Some(&ItemQuery::new().including_removed()))
        .unwrap()
        .unwrap();
    assert_eq!(removed.version, 4);
}

#[test]
fn patch_merges_onto_current_fields() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let created = people
        .create(
            TOKEN,
            Some(&fields(json!({"name": "Ryan", "age": 25, "tags": ["a"]}))),
        )
        .unwrap();
    let id = created.id.to_string();

    people
        .patch(TOKEN, &id, Some(&fields(json!({"age": 26}))))
        .unwrap();

    let current = people.get(TOKEN, &id, None).unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(
        Value::Object(current.fields),
        json!({"name": "Ryan", "age": 26, "tags": ["a"]})
    );
}

#[test]
fn update_replaces_all_business_fields() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let created = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan", "age": 25}))))
        .unwrap();
    let id = created.id.to_string();

    people
        .update(TOKEN, &id, Some(&fields(json!({"name": "Bryan"}))))
        .unwrap();

    let current = people.get(TOKEN, &id, None).unwrap().unwrap();
    assert_eq!(Value::Object(current.fields), json!({"name": "Bryan"}));
}

#[test]
fn remove_on_removed_item_commits_nothing() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let id = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan"}))))
        .unwrap()
        .id
        .to_string();

    assert!(people.remove(TOKEN, &id).unwrap().is_some());
    assert!(people.remove(TOKEN, &id).unwrap().is_none());
    assert_eq!(people.history(TOKEN, &id).unwrap().len(), 2);
}

#[test]
fn restore_commits_old_fields_as_newest_version() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let id = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan", "age": 24}))))
        .unwrap()
        .id
        .to_string();
    people
        .update(TOKEN, &id, Some(&fields(json!({"name": "Ryan", "age": 30}))))
        .unwrap();
    people.remove(TOKEN, &id).unwrap();

    let before = people.restore(TOKEN, &id, 1).unwrap().unwrap();
    assert_eq!(before.version, 3);
    assert_eq!(before.status, ItemStatus::Removed);

    let current = people.get(TOKEN, &id, None).unwrap().unwrap();
    assert_eq!(current.version, 4);
    assert_eq!(current.status, ItemStatus::Visible);
    assert_eq!(current.fields["age"], json!(24));
    assert_eq!(people.history(TOKEN, &id).unwrap().len(), 4);
}

#[test]
fn restore_of_unknown_version_fails_and_unknown_item_is_absent() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let id = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan"}))))
        .unwrap()
        .id
        .to_string();

    let err = people.restore(TOKEN, &id, 9).unwrap_err();
    assert!(matches!(err, EngineError::VersionNotFound { version: 9, .. }));

    let unknown = uuid::Uuid::new_v4().to_string();
    assert!(people.restore(TOKEN, &unknown, 1).unwrap().is_none());
}

#[test]
fn preview_reads_any_stored_version() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let id = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan", "age": 24}))))
        .unwrap()
        .id
        .to_string();
    people
        .patch(TOKEN, &id, Some(&fields(json!({"age": 25}))))
        .unwrap();

    let first = people.preview(TOKEN, &id, 1).unwrap().unwrap();
    assert_eq!(first.fields["age"], json!(24));
    assert!(people.preview(TOKEN, &id, 3).unwrap().is_none());
    assert!(people.preview(TOKEN, "not-a-uuid", 1).unwrap().is_none());
}

#[test]
fn unknown_ids_resolve_to_absent() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let unknown = uuid::Uuid::new_v4().to_string();
    let body = fields(json!({"name": "Nobody"}));

    assert!(people.get(TOKEN, &unknown, None).unwrap().is_none());
    assert!(people.update(TOKEN, &unknown, Some(&body)).unwrap().is_none());
    assert!(people.patch(TOKEN, &unknown, Some(&body)).unwrap().is_none());
    assert!(people.remove(TOKEN, &unknown).unwrap().is_none());
    assert!(people.history(TOKEN, &unknown).unwrap().is_empty());
    assert!(people.update(TOKEN, "garbage", Some(&body)).unwrap().is_none());
}

#[test]
fn missing_arguments_are_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let body = fields(json!({"name": "Ryan"}));

    assert!(matches!(
        people.create(TOKEN, None).unwrap_err(),
        EngineError::MissingItem
    ));
    assert!(matches!(
        people.update(TOKEN, "  ", Some(&body)).unwrap_err(),
        EngineError::MissingId
    ));
    assert!(matches!(
        people.get(TOKEN, "", None).unwrap_err(),
        EngineError::MissingId
    ));
    let id = uuid::Uuid::new_v4().to_string();
    assert!(matches!(
        people.patch(TOKEN, &id, None).unwrap_err(),
        EngineError::MissingItem
    ));
    assert_eq!(people.count(TOKEN, None).unwrap(), 0);
}

#[test]
fn invalid_fields_are_rejected_with_every_issue() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);

    let err = people
        .create(
            TOKEN,
            Some(&fields(json!({"age": 2.5, "nickname": "R", "address": {"zip": 1}}))),
        )
        .unwrap_err();
    let EngineError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert_eq!(validation.schema, "people");
    assert!(validation.has_issue_at("name"));
    assert!(validation.has_issue_at("age"));
    assert!(validation.has_issue_at("nickname"));
    assert!(validation.has_issue_at("address.city"));
    assert!(validation.has_issue_at("address.zip"));
    assert_eq!(people.count(TOKEN, None).unwrap(), 0);
}

#[test]
fn patch_cannot_null_required_field() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let id = people
        .create(TOKEN, Some(&fields(json!({"name": "Ryan"}))))
        .unwrap()
        .id
        .to_string();

    let err = people
        .patch(TOKEN, &id, Some(&fields(json!({"name": null}))))
        .unwrap_err();
    let EngineError::Validation(validation) = err else {
        panic!("expected validation error");
    };
    assert_eq!(validation.issues[0].kind, IssueKind::NullValue);
    assert_eq!(people.history(TOKEN, &id).unwrap().len(), 1);
}

#[test]
fn unknown_id_with_invalid_fields_is_absent() {
    let conn = open_db_in_memory().unwrap();
    let people = service(&conn);
    let unknown = uuid::Uuid::new_v4().to_string();
    let invalid = fields(json!({"age": "old", "nickname": "R"}));

    assert!(people.update(TOKEN, &unknown, Some(&invalid)).unwrap().is_none());
    assert!(people.patch(TOKEN, &unknown, Some(&invalid)).unwrap().is_none());
}
