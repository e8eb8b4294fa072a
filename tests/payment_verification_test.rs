use async_trait::async_trait;
use bigdecimal::BigDecimal;
use mockito::Server;
use pledge_core::adapters::InMemoryTransactionRepository;
use pledge_core::config::PayPalConfig;
use pledge_core::domain::{TransactionRecord, TransactionStatus};
use pledge_core::paypal::{
    AccessToken, AuthenticationFailed, FetchError, OrderDetails, OrderStatus, PayPalClient,
    PurchaseUnit,
};
use pledge_core::ports::{PaymentProvider, TransactionRepository};
use pledge_core::services::{PaymentVerificationService, VerificationError, VerificationOutcome};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

const REFERENCE: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

fn order_body(status: &str, reference_id: &str) -> String {
    format!(
        r#"{{"id":"ORDER123","status":"{}","purchase_units":[{{"reference_id":"{}","amount":{{"currency_code":"USD","value":"12.50"}}}}]}}"#,
        status, reference_id
    )
}

async fn seeded_repository(id: Uuid) -> Arc<InMemoryTransactionRepository> {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let mut record = TransactionRecord::new(BigDecimal::from_str("12.50").unwrap());
    record.id = id;
    repository.insert(&record).await.unwrap();
    repository
}

fn service_for(server: &Server, repository: Arc<InMemoryTransactionRepository>) -> PaymentVerificationService {
    let client = PayPalClient::new(PayPalConfig::new(server.url(), "client", "secret")).unwrap();
    PaymentVerificationService::new(Arc::new(client), repository)
}

async fn mock_token(server: &mut Server) -> mockito::Mock {
    server
        .mock("POST", "/v1/oauth2/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok-abc","token_type":"Bearer","expires_in":32400}"#)
        .create_async()
        .await
}

#[tokio::test]
async fn test_completed_order_marks_transaction_paid() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    let order_mock = server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .match_header("authorization", "Bearer tok-abc")
        .with_status(200)
        .with_body(order_body("COMPLETED", REFERENCE))
        .create_async()
        .await;

    let service = service_for(&server, repository.clone());
    let outcome = service.verify_payment("ORDER123").await.unwrap();

    assert_eq!(outcome, VerificationOutcome::Paid(id));
    let record = repository.get_by_id(id).await.unwrap();
    assert_eq!(record.status, TransactionStatus::Paid);
    order_mock.assert_async().await;
}

#[tokio::test]
async fn test_second_verification_reports_already_paid() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .with_status(200)
        .with_body(order_body("COMPLETED", REFERENCE))
        .expect(2)
        .create_async()
        .await;

    let service = service_for(&server, repository.clone());
    service.verify_payment("ORDER123").await.unwrap();
    let paid_at = repository.get_by_id(id).await.unwrap().updated_at;

    let outcome = service.verify_payment("ORDER123").await.unwrap();

    assert_eq!(outcome, VerificationOutcome::AlreadyPaid(id));
    assert_eq!(repository.get_by_id(id).await.unwrap().updated_at, paid_at);
}

#[tokio::test]
async fn test_authentication_failure_skips_order_lookup() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/oauth2/token")
        .with_status(401)
        .with_body(r#"{"error":"invalid_client"}"#)
        .create_async()
        .await;
    let order_mock = server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .expect(0)
        .create_async()
        .await;

    let service = service_for(&server, repository.clone());
    let err = service.verify_payment("ORDER123").await.unwrap_err();

    assert!(matches!(err, VerificationError::Unauthorized(_)));
    assert_eq!(repository.get_by_id(id).await.unwrap().status, TransactionStatus::Created);
    order_mock.assert_async().await;
}

#[tokio::test]
async fn test_incomplete_order_leaves_record_untouched() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .with_status(200)
        .with_body(order_body("APPROVED", REFERENCE))
        .create_async()
        .await;

    let service = service_for(&server, repository.clone());
    let err = service.verify_payment("ORDER123").await.unwrap_err();

    assert!(matches!(err, VerificationError::PaymentIncomplete(OrderStatus::Approved)));
    assert_eq!(err.to_string(), "Payment incomplete. Order status is APPROVED");
    assert_eq!(repository.get_by_id(id).await.unwrap().status, TransactionStatus::Created);
}

#[tokio::test]
async fn test_unknown_reference_is_transaction_not_found() {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .with_status(200)
        .with_body(order_body("COMPLETED", REFERENCE))
        .create_async()
        .await;

    let service = service_for(&server, repository.clone());
    let err = service.verify_payment("ORDER123").await.unwrap_err();

    assert!(matches!(err, VerificationError::TransactionNotFound(id) if id.to_string() == REFERENCE));
    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn test_default_reference_id_is_rejected() {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .with_status(200)
        .with_body(order_body("COMPLETED", "default"))
        .create_async()
        .await;

    let err = service_for(&server, repository)
        .verify_payment("ORDER123")
        .await
        .unwrap_err();

    assert!(matches!(err, VerificationError::ReferenceIdNotSet));
}

#[tokio::test]
async fn test_upstream_failures_are_classified() {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let mut server = Server::new_async().await;
    mock_token(&mut server).await;
    server
        .mock("GET", "/v2/checkout/orders/GONE")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/checkout/orders/BROKEN")
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/checkout/orders/EMPTY")
        .with_status(200)
        .create_async()
        .await;

    let service = service_for(&server, repository);

    assert!(matches!(
        service.verify_payment("GONE").await.unwrap_err(),
        VerificationError::ClientRequest(_)
    ));
    assert!(matches!(
        service.verify_payment("BROKEN").await.unwrap_err(),
        VerificationError::UpstreamServer(_)
    ));
    assert!(matches!(
        service.verify_payment("EMPTY").await.unwrap_err(),
        VerificationError::EmptyUpstreamResponse
    ));
}

#[tokio::test]
async fn test_invalid_order_id_makes_no_requests() {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/v1/oauth2/token")
        .expect(0)
        .create_async()
        .await;

    let service = service_for(&server, repository);
    for order_id in ["", "ORDER/123", "../admin"] {
        let err = service.verify_payment(order_id).await.unwrap_err();
        assert!(matches!(err, VerificationError::InvalidOrderId(_)), "{:?}", order_id);
    }

    token_mock.assert_async().await;
}

#[tokio::test]
async fn test_token_is_reused_across_verifications() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let mut server = Server::new_async().await;
    let token_mock = server
        .mock("POST", "/v1/oauth2/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok-abc","token_type":"Bearer","expires_in":32400}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/v2/checkout/orders/ORDER123")
        .with_status(200)
        .with_body(order_body("COMPLETED", REFERENCE))
        .expect(2)
        .create_async()
        .await;

    let service = service_for(&server, repository);
    service.verify_payment("ORDER123").await.unwrap();
    service.verify_payment("ORDER123").await.unwrap();

    token_mock.assert_async().await;
}

/// Provider that always reports the same completed order.
struct CompletedOrderProvider {
    reference_id: String,
}

#[async_trait]
impl PaymentProvider for CompletedOrderProvider {
    async fn access_token(&self) -> Result<AccessToken, AuthenticationFailed> {
        Ok(AccessToken::new("tok-abc"))
    }

    async fn get_order(&self, order_id: &str, _token: &AccessToken) -> Result<OrderDetails, FetchError> {
        Ok(OrderDetails {
            id: Some(order_id.to_string()),
            status: Some(OrderStatus::Completed),
            purchase_units: Some(vec![PurchaseUnit {
                reference_id: Some(self.reference_id.clone()),
                amount: None,
            }]),
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verifications_pay_once() {
    let id = Uuid::parse_str(REFERENCE).unwrap();
    let repository = seeded_repository(id).await;
    let provider = Arc::new(CompletedOrderProvider {
        reference_id: REFERENCE.to_string(),
    });
    let service = Arc::new(PaymentVerificationService::new(provider, repository.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.verify_payment("ORDER123").await })
        })
        .collect();

    let mut paid = 0;
    let mut already_paid = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            VerificationOutcome::Paid(_) => paid += 1,
            VerificationOutcome::AlreadyPaid(_) => already_paid += 1,
        }
    }

    assert_eq!(paid, 1);
    assert_eq!(already_paid, 15);
    assert_eq!(repository.get_by_id(id).await.unwrap().status, TransactionStatus::Paid);
}
