//! In-memory backend tests — credentials, tokens, change stream, profile rows

use chrono::Utc;

use lebonpetit_session::auth::{
    add_months, NewProfile, ProfileUpdate, Role, SessionEvent, SignUpMetadata, SubscriptionStatus,
};
use lebonpetit_session::config::BackendConfig;
use lebonpetit_session::memory::{InMemoryAuthBackend, InMemoryProfileStore};
use lebonpetit_session::{AuthBackend, ProfileStore, SessionError};

fn test_backend() -> InMemoryAuthBackend {
    InMemoryAuthBackend::new(BackendConfig::new().with_jwt_secret("test-secret-jwt-key-min-32-chars!!"))
        .with_argon2_memory_kib(256)
}

#[tokio::test]
async fn test_sign_up_issues_session_with_metadata() {
    let auth = test_backend();
    let mut changes = auth.on_session_change(8);

    let outcome = auth
        .sign_up(
            "amina@mail.cm",
            "secret-pass",
            SignUpMetadata::new("Amina", "690000000", Role::Tenant),
        )
        .await
        .unwrap();

    let session = outcome.session.unwrap();
    assert_eq!(Some(session.user_id.clone()), outcome.user_id);
    assert_eq!(session.metadata().declared_role(), Some(Role::Tenant));
    assert_eq!(session.metadata().phone.as_deref(), Some("690000000"));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, SessionEvent::SignedIn);
    assert_eq!(change.session, Some(session.clone()));

    let claims = auth.verify_token(&session.access_token).unwrap();
    assert_eq!(claims.sub, session.user_id);
    assert_eq!(auth.current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn test_sign_up_validation() {
    let auth = test_backend();

    let err = auth
        .sign_up("not-an-email", "secret-pass", SignUpMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AuthenticationFailed(_)));

    let err = auth
        .sign_up("bob@mail.cm", "short", SignUpMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::PasswordTooWeak(_)));

    auth.sign_up("bob@mail.cm", "secret-pass", SignUpMetadata::default())
        .await
        .unwrap();
    let err = auth
        .sign_up("Bob@Mail.cm", "secret-pass", SignUpMetadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UserAlreadyRegistered(_)));
}

#[tokio::test]
async fn test_confirmation_withholds_session() {
    let auth = InMemoryAuthBackend::new(
        BackendConfig::new()
            .with_jwt_secret("test-secret-jwt-key-min-32-chars!!")
            .with_email_confirmation(true),
    )
    .with_argon2_memory_kib(256);

    let outcome = auth
        .sign_up("claire@mail.cm", "secret-pass", SignUpMetadata::default())
        .await
        .unwrap();
    assert!(outcome.user_id.is_some());
    assert!(outcome.session.is_none());
    assert_eq!(auth.current_session().await.unwrap(), None);

    assert!(auth.sign_in_with_password("claire@mail.cm", "secret-pass").await.is_err());
    auth.confirm_email("claire@mail.cm").unwrap();
    let session = auth
        .sign_in_with_password("claire@mail.cm", "secret-pass")
        .await
        .unwrap();
    assert_eq!(Some(session.user_id), outcome.user_id);
}

#[tokio::test]
async fn test_sign_out_revokes_and_broadcasts() {
    let auth = test_backend();
    auth.sign_up("dan@mail.cm", "secret-pass", SignUpMetadata::default())
        .await
        .unwrap();
    let session = auth
        .sign_in_with_password("dan@mail.cm", "secret-pass")
        .await
        .unwrap();

    let mut changes = auth.on_session_change(8);
    auth.sign_out().await.unwrap();

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, SessionEvent::SignedOut);
    assert!(change.session.is_none());
    assert!(auth.verify_token(&session.access_token).is_err());
    assert_eq!(auth.current_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_offline_backend_fails_calls() {
    let auth = test_backend();
    auth.set_offline(true);

    let err = auth.current_session().await.unwrap_err();
    assert!(matches!(err, SessionError::Backend(_)));
    assert!(auth.sign_out().await.is_err());

    auth.set_offline(false);
    assert!(auth.current_session().await.is_ok());
}

#[tokio::test]
async fn test_unsubscribe_prunes_subscriber() {
    let auth = test_backend();
    let mut first = auth.on_session_change(8);
    let _second = auth.on_session_change(8);
    assert_eq!(auth.subscriber_count(), 2);

    first.unsubscribe();
    auth.expire_session().await;
    assert_eq!(auth.subscriber_count(), 1);
}

#[tokio::test]
async fn test_store_enforces_unique_id() {
    let store = InMemoryProfileStore::new();
    let row = NewProfile::for_role("u1", "a@mail.cm", "A", None, Role::Tenant);

    let created = store.insert(row.clone()).await.unwrap();
    assert_eq!(created.status, lebonpetit_session::ProfileStatus::Pending);

    let err = store.insert(row).await.unwrap_err();
    assert_eq!(err, SessionError::Conflict("u1".into()));
    assert_eq!(store.profile_count(), 1);
    assert_eq!(store.insert_count(), 1);
}

#[tokio::test]
async fn test_store_lookup_and_update() {
    let store = InMemoryProfileStore::new();

    let err = store.find_by_user_id("ghost").await.unwrap_err();
    assert!(err.is_not_found());

    let err = store
        .update("ghost", &ProfileUpdate::new().name("X"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    store
        .insert(NewProfile::for_role("u2", "b@mail.cm", "Y", None, Role::Landlord))
        .await
        .unwrap();
    store
        .update("u2", &ProfileUpdate::new().name("X"))
        .await
        .unwrap();
    assert_eq!(store.find_by_user_id("u2").await.unwrap().name, "X");

    store.fail_lookups(SessionError::Backend("timeout".into()));
    let err = store.find_by_user_id("u2").await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_store_subscriptions() {
    let store = InMemoryProfileStore::new();
    let start = Utc::now();
    let end = add_months(start, 1);

    let record = store
        .insert_subscription("u3", start, end, SubscriptionStatus::Pending)
        .await
        .unwrap();
    assert_eq!(record.end_date, end);

    let rows = store.subscriptions_for("u3");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, SubscriptionStatus::Pending);
    assert!(store.subscriptions_for("other").is_empty());
}

#[tokio::test]
async fn test_store_holds_lookup_results_after_read() {
    let store = std::sync::Arc::new(InMemoryProfileStore::new());
    store.seed(
        NewProfile::for_role("u4", "d@mail.cm", "Old", None, Role::Landlord)
            .into_profile(Utc::now()),
    );

    store.hold_lookup_results();
    let lookup = tokio::spawn({
        let store = store.clone();
        async move { store.find_by_user_id("u4").await }
    });
    while store.read_count() == 0 {
        tokio::task::yield_now().await;
    }

    store.update("u4", &ProfileUpdate::new().name("New")).await.unwrap();
    assert_eq!(store.lookup_count(), 0);

    store.release_lookup_results();
    let profile = lookup.await.unwrap().unwrap();
    assert_eq!(profile.name, "Old");
    assert_eq!(store.lookup_count(), 1);
}
