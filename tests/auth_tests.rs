mod test_utils;

use questionmate::auth::{
    decode_subject, AuthContext, FileTokenStorage, MemoryTokenStorage, TokenStorage,
};
use questionmate::error::TokenError;
use test_utils::{scratch_dir, token_for, token_with_claims};

#[test]
fn decodes_subject_without_verifying_signature() {
    assert_eq!(decode_subject(&token_for("ana")).unwrap(), "ana");
}

#[test]
fn token_without_subject_is_rejected() {
    let token = token_with_claims(r#"{"exp":4102444800}"#);
    assert_eq!(decode_subject(&token), Err(TokenError::MissingSubject));
}

#[test]
fn set_persists_and_exposes_username() {
    let storage = MemoryTokenStorage::new();
    let mut auth = AuthContext::new(Box::new(storage.clone()));
    let token = token_for("ana");

    assert!(auth.set(&token));
    assert_eq!(auth.username(), Some("ana"));
    assert_eq!(auth.token(), Some(token.as_str()));
    assert_eq!(storage.stored(), Some(token));
}

#[test]
fn set_with_missing_subject_changes_nothing() {
    let storage = MemoryTokenStorage::new();
    let mut auth = AuthContext::new(Box::new(storage.clone()));

    assert!(!auth.set(&token_with_claims(r#"{"name":"ana"}"#)));
    assert!(!auth.is_logged_in());
    assert!(auth.user().is_none());
    assert_eq!(storage.stored(), None);
}

#[test]
fn set_with_garbage_keeps_previous_login() {
    let storage = MemoryTokenStorage::new();
    let mut auth = AuthContext::new(Box::new(storage.clone()));
    let good = token_for("ana");
    auth.set(&good);

    assert!(!auth.set("not-a-token"));
    assert_eq!(auth.username(), Some("ana"));
    assert_eq!(storage.stored(), Some(good));
}

#[test]
fn restore_loads_without_rewriting() {
    let token = token_for("bo");
    let storage = MemoryTokenStorage::with_token(token.clone());
    let auth = AuthContext::initialize(Box::new(storage.clone()));

    assert_eq!(auth.username(), Some("bo"));
    assert_eq!(auth.token(), Some(token.as_str()));
    assert_eq!(storage.stored(), Some(token));
}

#[test]
fn restore_clears_invalid_persisted_token() {
    let storage = MemoryTokenStorage::with_token("definitely.not.valid-json");
    let auth = AuthContext::initialize(Box::new(storage.clone()));

    assert!(!auth.is_logged_in());
    assert_eq!(storage.stored(), None);
}

#[test]
fn restore_twice_is_idempotent() {
    let storage = MemoryTokenStorage::with_token(token_for("cy"));
    let mut auth = AuthContext::new(Box::new(storage));

    auth.restore();
    let first = (auth.token().map(str::to_string), auth.user().cloned());
    auth.restore();
    let second = (auth.token().map(str::to_string), auth.user().cloned());
    assert_eq!(first, second);
    assert_eq!(auth.username(), Some("cy"));
}

#[test]
fn clear_logs_out_everywhere() {
    let storage = MemoryTokenStorage::new();
    let mut auth = AuthContext::new(Box::new(storage.clone()));
    auth.set(&token_for("di"));

    auth.clear();
    assert!(!auth.is_logged_in());
    assert_eq!(storage.stored(), None);

    auth.restore();
    assert!(!auth.is_logged_in());
}

#[test]
fn file_storage_round_trips_and_survives_missing_file() {
    let dir = scratch_dir("auth");
    let storage = FileTokenStorage::new(dir.join("nested").join("authToken"));

    assert_eq!(storage.load().unwrap(), None);
    storage.remove().unwrap();

    let token = token_for("ed");
    let mut auth = AuthContext::new(Box::new(storage.clone()));
    assert!(auth.set(&token));

    let restored = AuthContext::initialize(Box::new(storage.clone()));
    assert_eq!(restored.username(), Some("ed"));

    auth.clear();
    assert!(!storage.path().exists());
    let _ = std::fs::remove_dir_all(dir);
}
