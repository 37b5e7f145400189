//! End-to-end prediction scenarios against an in-process deployment.

use std::time::Duration;

use sealed_forecast::client::{CancellationToken, DecryptionConfig};
use sealed_forecast::store::{MemoryLedger, SqliteLedger};
use sealed_forecast::{
    parse_date, ClientError, ForecastConfig, ForecastError, LocalDeployment, StatusCategory,
};
use sealed_forecast_testkit::{alice, bob, carol, deployer, init_tracing, TestRegistry};

const LABEL: &str = "SecretTGE";

fn deploy() -> LocalDeployment<MemoryLedger> {
    init_tracing();
    LocalDeployment::deploy(&deployer().account(), MemoryLedger::new(), ForecastConfig::default())
        .unwrap()
}

#[tokio::test]
async fn test_update_then_decrypt_latest() {
    let deployment = deploy();
    let forecast = deployment.session();
    forecast.connect(alice().signer(), 1).await.unwrap();

    let view = forecast.view();
    assert!(view.connected);
    assert!(!view.user_has_predicted);
    assert!(!view.can_decrypt);

    forecast.submit_prediction(LABEL, 1672531200).await.unwrap();
    assert_eq!(forecast.decrypt_my_prediction().await.unwrap(), 1672531200);

    let first = forecast.view();
    assert!(first.prediction_decrypted);
    assert!(!first.can_decrypt);
    assert_eq!(first.status_msg.as_deref(), Some("Prediction decrypted"));
    assert_eq!(forecast.status().unwrap().category, StatusCategory::Info);

    forecast.submit_prediction(LABEL, 1672617600).await.unwrap();
    let view = forecast.view();
    assert!(view.user_has_predicted);
    assert!(view.can_decrypt);
    assert!(!view.prediction_decrypted);
    assert_eq!(view.status_msg.as_deref(), Some("Prediction submitted for SecretTGE"));
    assert!(!view.loading);

    deployment
        .coprocessor()
        .set_latency(Some(Duration::from_millis(100)))
        .unwrap();
    let observe = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        forecast.view()
    };
    let (value, during) = tokio::join!(forecast.decrypt_my_prediction(), observe);
    assert_eq!(value.unwrap(), 1672617600);
    assert!(during.is_decrypting);
    assert_eq!(during.status_msg.as_deref(), Some("Decrypting prediction..."));

    let view = forecast.view();
    assert_eq!(view.clear_prediction, Some(1672617600));
    assert_eq!(view.clear_prediction_date.as_deref(), Some("2023-01-02"));
    assert_eq!(view.status_msg.as_deref(), Some("Prediction decrypted"));
    assert!(!view.is_decrypting);
}

#[tokio::test]
async fn test_grant_then_revoke() {
    let deployment = deploy();
    let owner = deployment.session();
    owner.connect(alice().signer(), 1).await.unwrap();
    owner.submit_prediction(LABEL, 1672617600).await.unwrap();

    let reader = deployment.session();
    reader.connect(bob().signer(), 1).await.unwrap();

    let err = reader.decrypt_prediction_of(&alice().account()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Client(ClientError::AuthorizationRejected(_))));
    assert_eq!(err.category(), StatusCategory::Authorization);

    owner.grant(&bob().account()).await.unwrap();
    assert_eq!(
        reader.decrypt_prediction_of(&alice().account()).await.unwrap(),
        1672617600
    );

    owner.revoke(&bob().account()).await.unwrap();

    // A fresh session has neither a cached authorization nor a result.
    let fresh = deployment.session();
    fresh.connect(bob().signer(), 1).await.unwrap();
    let err = fresh.decrypt_prediction_of(&alice().account()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Client(ClientError::AuthorizationRejected(_))));
    let status = fresh.status().unwrap();
    assert_eq!(status.category, StatusCategory::Authorization);
    assert!(status.is_failure());
}

#[tokio::test]
async fn test_cached_authorization_does_not_outlive_revocation_for_new_values() {
    let deployment = deploy();
    let owner = deployment.session();
    owner.connect(alice().signer(), 1).await.unwrap();
    owner.submit_prediction(LABEL, 1672531200).await.unwrap();
    owner.grant(&bob().account()).await.unwrap();

    let reader = deployment.session();
    reader.connect(bob().signer(), 1).await.unwrap();
    reader.decrypt_prediction_of(&alice().account()).await.unwrap();
    assert_eq!(reader.orchestrator().cache().len(), 1);

    owner.revoke(&bob().account()).await.unwrap();
    owner.submit_prediction(LABEL, 1672617600).await.unwrap();

    let err = reader.decrypt_prediction_of(&alice().account()).await.unwrap_err();
    assert!(matches!(err, ForecastError::Client(ClientError::AuthorizationRejected(_))));
    assert!(reader.orchestrator().cache().is_empty());
}

#[tokio::test]
async fn test_all_or_nothing_across_owners() {
    init_tracing();
    let registry = TestRegistry::new();
    let h_alice = registry.submit(&alice(), 1672531200).await.unwrap();
    let h_carol = registry.submit(&carol(), 1672617600).await.unwrap();
    registry.grant(&alice(), &bob()).await.unwrap();

    let orchestrator = registry.orchestrator(DecryptionConfig::default());
    let requests = [registry.request(h_alice), registry.request(h_carol)];
    let result = orchestrator
        .decrypt(bob().signer().as_ref(), &requests, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ClientError::AuthorizationRejected(_))));
    assert!(!orchestrator.is_resolved(&h_alice));
    assert!(!orchestrator.is_resolved(&h_carol));

    let values = orchestrator
        .decrypt(bob().signer().as_ref(), &requests[..1], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(values[&h_alice], 1672531200);
}

#[tokio::test]
async fn test_users_are_independent() {
    let deployment = deploy();
    let a = deployment.session();
    let b = deployment.session();
    a.connect(alice().signer(), 1).await.unwrap();
    b.connect(bob().signer(), 1).await.unwrap();

    a.submit_prediction(LABEL, parse_date("2024-03-01").unwrap()).await.unwrap();
    assert!(!b.view().user_has_predicted);
    b.submit_prediction(LABEL, parse_date("2024-06-15").unwrap()).await.unwrap();

    assert_eq!(a.decrypt_my_prediction().await.unwrap(), 1709251200);
    assert_eq!(b.decrypt_my_prediction().await.unwrap(), 1718409600);
    assert!(b.decrypt_prediction_of(&alice().account()).await.is_err());

    a.reload().await.unwrap();
    assert_eq!(a.decrypt_my_prediction().await.unwrap(), 1709251200);
}

#[tokio::test]
async fn test_zero_prediction_counts_as_decrypted() {
    let deployment = deploy();
    let forecast = deployment.session();
    forecast.connect(alice().signer(), 1).await.unwrap();
    forecast.submit_prediction(LABEL, 0).await.unwrap();

    assert!(forecast.view().can_decrypt);
    assert_eq!(forecast.decrypt_my_prediction().await.unwrap(), 0);

    let view = forecast.view();
    assert!(view.prediction_decrypted);
    assert_eq!(view.clear_prediction, Some(0));
    assert_eq!(view.clear_prediction_date.as_deref(), Some("1970-01-01"));
    assert!(!view.can_decrypt);
}

#[tokio::test]
async fn test_submission_failures_report_status() {
    let deployment = deploy();
    let forecast = deployment.session();

    assert!(matches!(
        forecast.submit_prediction(LABEL, 1).await,
        Err(ForecastError::NotConnected)
    ));

    forecast.connect(alice().signer(), 1).await.unwrap();
    let err = forecast
        .submit_prediction(LABEL, u64::from(u32::MAX) + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::Client(ClientError::InvalidPlaintext(_))));

    deployment.coprocessor().set_online(false);
    let err = forecast.submit_prediction(LABEL, 1672531200).await.unwrap_err();
    assert!(matches!(
        err,
        ForecastError::Client(ClientError::EncryptionBackendUnavailable(_))
    ));

    let view = forecast.view();
    assert!(view
        .status_msg
        .as_deref()
        .is_some_and(|m| m.starts_with("Error submitting prediction:")));
    assert!(!view.loading);
    assert!(!view.user_has_predicted);

    assert!(matches!(
        forecast.decrypt_my_prediction().await,
        Err(ForecastError::NothingToDecrypt)
    ));
}

#[tokio::test]
async fn test_one_submission_at_a_time() {
    let deployment = deploy();
    let forecast = deployment.session();
    forecast.connect(alice().signer(), 1).await.unwrap();
    deployment
        .coprocessor()
        .set_latency(Some(Duration::from_millis(100)))
        .unwrap();

    let (first, second) = tokio::join!(
        forecast.submit_prediction(LABEL, 1672531200),
        forecast.submit_prediction(LABEL, 1672617600),
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(ForecastError::SubmissionInFlight)));
    assert!(!forecast.view().loading);
}

#[tokio::test]
async fn test_disconnect_cancels_and_resets() {
    let deployment = deploy();
    let forecast = deployment.session();
    forecast.connect(alice().signer(), 1).await.unwrap();
    deployment
        .coprocessor()
        .set_latency(Some(Duration::from_secs(5)))
        .unwrap();

    let disconnect = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        forecast.disconnect();
    };
    let (result, ()) = tokio::join!(forecast.submit_prediction(LABEL, 1672531200), disconnect);

    assert!(matches!(result, Err(ForecastError::Cancelled)));
    let view = forecast.view();
    assert!(!view.connected);
    assert_eq!(view.status_msg, None);
    assert!(!view.loading);
}

#[tokio::test]
async fn test_switching_account_resets_session() {
    let deployment = deploy();
    let forecast = deployment.session();
    forecast.connect(alice().signer(), 1).await.unwrap();
    forecast.submit_prediction(LABEL, 1672531200).await.unwrap();
    forecast.decrypt_my_prediction().await.unwrap();
    assert!(forecast.status().is_some());

    forecast.connect(bob().signer(), 1).await.unwrap();
    let view = forecast.view();
    assert_eq!(view.status_msg, None);
    assert!(!view.user_has_predicted);

    forecast.connect(alice().signer(), 1).await.unwrap();
    let view = forecast.view();
    assert!(view.user_has_predicted);
    assert!(!view.prediction_decrypted);

    forecast.connect(alice().signer(), 5).await.unwrap();
    assert_eq!(forecast.chain_id(), Some(5));
}

#[tokio::test]
async fn test_redeploy_over_sqlite_keeps_state() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forecast.db");

    let first = LocalDeployment::deploy(
        &deployer().account(),
        SqliteLedger::open(&path).unwrap(),
        ForecastConfig::default(),
    )
    .unwrap();
    let address = first.address();
    let coprocessor = first.coprocessor().clone();
    {
        let forecast = first.session();
        forecast.connect(alice().signer(), 1).await.unwrap();
        forecast.submit_prediction(LABEL, 1672617600).await.unwrap();
    }
    drop(first);

    let second = LocalDeployment::with_coprocessor(
        &deployer().account(),
        SqliteLedger::open(&path).unwrap(),
        coprocessor,
        ForecastConfig::default(),
    )
    .unwrap();
    assert_eq!(second.address(), address);

    let forecast = second.session();
    forecast.connect(alice().signer(), 1).await.unwrap();
    assert!(forecast.view().user_has_predicted);
    assert_eq!(forecast.decrypt_my_prediction().await.unwrap(), 1672617600);
}

#[tokio::test]
async fn test_sessions_share_nothing_but_the_ledger() {
    let deployment = deploy();
    let a = deployment.session();
    let again = deployment.session();

    a.connect(alice().signer(), 1).await.unwrap();
    a.submit_prediction(LABEL, 1672531200).await.unwrap();
    a.decrypt_my_prediction().await.unwrap();

    again.connect(alice().signer(), 1).await.unwrap();
    let view = again.view();
    assert!(view.user_has_predicted);
    assert!(!view.prediction_decrypted);
    assert!(again.orchestrator().cache().is_empty());
}
