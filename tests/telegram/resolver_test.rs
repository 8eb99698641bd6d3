//! Channel alias resolution.

use tgwatch::resolver::resolve_channel;
use tgwatch::telegram::TelegramError;

use crate::mock_api::{channel, MockApi};

#[tokio::test]
async fn resolves_alias_with_leading_at() {
    let api = MockApi::new().with_channel("tusa_ton", channel());

    let handle = resolve_channel(&api, "@tusa_ton")
        .await
        .expect("alias should resolve");

    assert_eq!(handle, channel());
    assert_eq!(api.calls(), vec!["resolve:tusa_ton".to_owned()]);
}

#[tokio::test]
async fn unknown_alias_propagates_not_found() {
    let api = MockApi::new();

    let err = resolve_channel(&api, "missing")
        .await
        .expect_err("unknown alias must fail");

    assert!(matches!(err, TelegramError::NotFound(_)));
}

#[tokio::test]
async fn empty_alias_makes_no_remote_call() {
    let api = MockApi::new();

    let err = resolve_channel(&api, " @ ")
        .await
        .expect_err("empty alias must fail");

    assert!(matches!(err, TelegramError::NotFound(_)));
    assert!(api.calls().is_empty());
}
