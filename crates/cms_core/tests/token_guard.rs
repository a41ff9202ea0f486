use cms_core::db::open_db_in_memory;
use cms_core::{
    build_sqlite_service, AuthError, ContentSchema, EngineConfig, EngineError, EngineResult,
    Fields, SqliteContentService, StaticTokenValidator,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;

const VALID: Option<&str> = Some("valid-token");

fn service(conn: &Connection, auth: Arc<StaticTokenValidator>) -> SqliteContentService<'_> {
    let schema = ContentSchema::from_json(
        r#"{"name": "notes", "fields": {"body": {"type": "string", "required": true}}}"#,
    )
    .unwrap();
    build_sqlite_service(conn, schema, auth, &EngineConfig::default()).unwrap()
}

fn validator() -> Arc<StaticTokenValidator> {
    let auth = StaticTokenValidator::new();
    auth.grant("valid-token", "writer");
    auth.grant_until("expired-token", "writer", 1);
    Arc::new(auth)
}

fn body() -> Fields {
    json!({"body": "text"}).as_object().unwrap().clone()
}

fn assert_rejected<T: std::fmt::Debug>(result: EngineResult<T>) -> AuthError {
    match result {
        Err(EngineError::InvalidToken(err)) => err,
        other => panic!("expected InvalidToken, got {other:?}"),
    }
}

#[test]
fn every_guarded_operation_rejects_bad_tokens_without_touching_storage() {
    let conn = open_db_in_memory().unwrap();
    let notes = service(&conn, validator());
    let id = notes.create(VALID, Some(&body())).unwrap().id.to_string();
    notes.publish(VALID, &id, None).unwrap();

    for token in [None, Some(""), Some("   "), Some("bogus"), Some("expired-token")] {
        assert_rejected(notes.any(token, None));
        assert_rejected(notes.count(token, None));
        assert_rejected(notes.find(token, None));
        assert_rejected(notes.get(token, &id, None));
        assert_rejected(notes.create(token, Some(&body())));
        assert_rejected(notes.update(token, &id, Some(&body())));
        assert_rejected(notes.patch(token, &id, Some(&body())));
        assert_rejected(notes.remove(token, &id));
        assert_rejected(notes.history(token, &id));
        assert_rejected(notes.preview(token, &id, 1));
        assert_rejected(notes.restore(token, &id, 1));
        assert_rejected(notes.publish(token, &id, None));
        assert_rejected(notes.unpublish(token, &id));
        assert_rejected(notes.is_live(token, &id));
    }

    assert_eq!(notes.count(VALID, None).unwrap(), 1);
    assert_eq!(notes.history(VALID, &id).unwrap().len(), 1);
    assert!(notes.is_live(VALID, &id).unwrap());
}

#[test]
fn token_is_checked_before_arguments() {
    let conn = open_db_in_memory().unwrap();
    let notes = service(&conn, validator());

    assert_eq!(assert_rejected(notes.create(None, None)), AuthError::MissingToken);
    assert_eq!(
        assert_rejected(notes.update(Some("bogus"), "", None)),
        AuthError::UnknownToken
    );
    assert!(matches!(
        assert_rejected(notes.remove(Some("expired-token"), "")),
        AuthError::Expired { expired_at: 1 }
    ));
}

#[test]
fn revoked_token_stops_working() {
    let conn = open_db_in_memory().unwrap();
    let auth = validator();
    let notes = service(&conn, Arc::clone(&auth));
    assert!(notes.any(VALID, None).is_ok());

    assert!(auth.revoke("valid-token"));
    assert_rejected(notes.any(VALID, None));
}

#[test]
fn live_reads_need_no_token() {
    let conn = open_db_in_memory().unwrap();
    let notes = service(&conn, validator());
    let id = notes.create(VALID, Some(&body())).unwrap().id.to_string();
    notes.publish(VALID, &id, None).unwrap();

    assert!(notes.live().any(None).unwrap());
    assert!(notes.live().get(&id, None).unwrap().is_some());
}
