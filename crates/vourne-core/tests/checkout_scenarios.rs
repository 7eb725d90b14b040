//! End-to-end checkout scenarios against scripted order backends.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vourne_core::{
    Advance, CartStore, CheckoutError, CheckoutRules, CheckoutSession, CheckoutStatus,
    CheckoutStep, Field, MemoryStorage, Money, NewLineItem, OrderConfirmation, OrderPayload,
    OrderSubmitter, PaymentMethod, Pricing, ShippingMethod, SubmissionError, CART_STORAGE_KEY,
};

// =============================================================================
// Scripted backends
// =============================================================================

/// Answers each call with the next scripted outcome and keeps every payload.
struct ScriptedBackend {
    outcomes: Mutex<Vec<Result<OrderConfirmation, SubmissionError>>>,
    received: Mutex<Vec<OrderPayload>>,
}

impl ScriptedBackend {
    fn new(mut outcomes: Vec<Result<OrderConfirmation, SubmissionError>>) -> Self {
        outcomes.reverse();
        ScriptedBackend {
            outcomes: Mutex::new(outcomes),
            received: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderSubmitter for ScriptedBackend {
    async fn submit(&self, order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
        self.received.lock().unwrap().push(order);
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(SubmissionError::Transient("script exhausted".into())))
    }
}

/// Never answers before the test gives up on it.
struct SlowBackend {
    started: AtomicUsize,
}

#[async_trait]
impl OrderSubmitter for SlowBackend {
    async fn submit(&self, _order: OrderPayload) -> Result<OrderConfirmation, SubmissionError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(OrderConfirmation {
            order_number: "VOURNE-LATE".into(),
            message: None,
        })
    }
}

fn confirmed(order_number: &str) -> Result<OrderConfirmation, SubmissionError> {
    Ok(OrderConfirmation {
        order_number: order_number.into(),
        message: Some("Pedido procesado correctamente".into()),
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn stocked_cart(storage: MemoryStorage) -> CartStore {
    let mut cart = CartStore::open(storage, Pricing::default());
    cart.add_item(
        NewLineItem::new("12", "Vestido Midi", Money::from_cents(5995), "/img/12.jpg")
            .with_variant("M", "Azul"),
    )
    .unwrap();
    cart.add_item(
        NewLineItem::new("7", "Bolso Piel", Money::from_cents(4500), "/img/7.jpg").with_quantity(1),
    )
    .unwrap();
    cart
}

fn session_at_payment(cart: &CartStore) -> CheckoutSession {
    let mut session = CheckoutSession::begin(cart, CheckoutRules::default()).unwrap();

    session.set_field(Field::Email, "lucia@correo.es").unwrap();
    session.set_field(Field::Phone, "612 345 678 9").unwrap();
    session.set_field(Field::FirstName, "Lucía").unwrap();
    session.set_field(Field::LastName, "García").unwrap();
    assert!(matches!(session.advance(cart).unwrap(), Advance::Moved(CheckoutStep::Shipping)));

    session.set_field(Field::ShippingAddress, "Rua Augusta 10").unwrap();
    session.set_field(Field::ShippingCity, "Lisboa").unwrap();
    session.set_field(Field::ShippingPostalCode, "1100-053").unwrap();
    session.set_field(Field::ShippingCountry, "PT").unwrap();
    session.select_shipping_method(ShippingMethod::Standard, cart).unwrap();
    assert!(matches!(session.advance(cart).unwrap(), Advance::Moved(CheckoutStep::Payment)));

    session.select_payment_method(PaymentMethod::Card).unwrap();
    session.set_field(Field::CardNumber, "4111111111111111").unwrap();
    session.set_field(Field::CardExpiry, "12/99").unwrap();
    session.set_field(Field::CardCvc, "737").unwrap();
    session.set_field(Field::CardName, "Lucía García").unwrap();
    session.set_terms_accepted(true).unwrap();
    session
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_successful_order_clears_persisted_cart() {
    let storage = MemoryStorage::new();
    let mut cart = stocked_cart(storage.clone());
    let mut session = session_at_payment(&cart);
    let backend = ScriptedBackend::new(vec![confirmed("VOURNE-20260315-0042")]);

    let confirmation = session.submit(&mut cart, &backend).await.unwrap();

    assert_eq!(confirmation.order_number, "VOURNE-20260315-0042");
    assert_eq!(
        session.status(),
        &CheckoutStatus::Submitted {
            order_number: "VOURNE-20260315-0042".into()
        }
    );
    assert!(cart.is_empty());
    assert_eq!(storage.get(CART_STORAGE_KEY).as_deref(), Some("[]"));

    // 104.95 is over the threshold
    let sent = backend.received.lock().unwrap();
    assert_eq!(sent[0].totals().shipping, Money::zero());
    assert_eq!(sent[0].totals().subtotal, Money::from_cents(10495));
    assert_eq!(sent[0].shipping().address.country, "PT");
}

#[tokio::test]
async fn test_declined_then_accepted_keeps_reference() {
    let mut cart = stocked_cart(MemoryStorage::new());
    let mut session = session_at_payment(&cart);
    let backend = ScriptedBackend::new(vec![
        Err(SubmissionError::PaymentDeclined("tarjeta rechazada".into())),
        confirmed("VOURNE-20260315-0043"),
    ]);

    let err = session.submit(&mut cart, &backend).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Submission(SubmissionError::PaymentDeclined(_))));
    assert_eq!(session.step(), CheckoutStep::Payment);
    assert_eq!(cart.line_count(), 2);

    session.submit(&mut cart, &backend).await.unwrap();
    let sent = backend.received.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].reference(), sent[1].reference());
}

#[tokio::test]
async fn test_cancelled_submission_leaves_everything() {
    let storage = MemoryStorage::new();
    let mut cart = stocked_cart(storage.clone());
    let before = storage.get(CART_STORAGE_KEY);
    let mut session = session_at_payment(&cart);
    let backend = SlowBackend {
        started: AtomicUsize::new(0),
    };

    let err = session
        .submit_until(&mut cart, &backend, tokio::time::sleep(Duration::from_millis(20)))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Cancelled));
    assert_eq!(backend.started.load(Ordering::SeqCst), 1);
    assert_eq!(session.status(), &CheckoutStatus::InProgress);
    assert_eq!(storage.get(CART_STORAGE_KEY), before);
    assert_eq!(cart.line_count(), 2);
}

#[tokio::test]
async fn test_dropped_submission_leaves_everything() {
    let mut cart = stocked_cart(MemoryStorage::new());
    let mut session = session_at_payment(&cart);
    let backend = SlowBackend {
        started: AtomicUsize::new(0),
    };

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        session.submit(&mut cart, &backend),
    )
    .await;

    assert!(timed_out.is_err());
    assert!(!session.is_submitted());
    assert_eq!(cart.line_count(), 2);
}

#[tokio::test]
async fn test_rejected_final_step_never_reaches_backend() {
    let mut cart = stocked_cart(MemoryStorage::new());
    let mut session = session_at_payment(&cart);
    session.set_terms_accepted(false).unwrap();
    let backend = ScriptedBackend::new(vec![confirmed("VOURNE-NEVER")]);

    let err = session.submit(&mut cart, &backend).await.unwrap_err();
    assert!(matches!(err, CheckoutError::StepRejected { step: CheckoutStep::Payment, .. }));
    assert_eq!(backend.calls(), 0);
    assert!(session.errors().contains(Field::AcceptTerms));
}

#[tokio::test]
async fn test_shared_backend_through_arc() {
    let mut cart = stocked_cart(MemoryStorage::new());
    let mut session = session_at_payment(&cart);
    let backend = Arc::new(ScriptedBackend::new(vec![confirmed("VOURNE-20260315-0044")]));

    session.submit(&mut cart, &backend).await.unwrap();
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_retreat_and_change_shipping_method() {
    let cart = stocked_cart(MemoryStorage::new());
    let mut session = session_at_payment(&cart);

    assert_eq!(session.retreat().unwrap(), CheckoutStep::Shipping);
    assert_eq!(session.form().text(Field::ShippingCity), "Lisboa");
    assert_eq!(session.form().text(Field::CardName), "Lucía García");

    session.select_shipping_method(ShippingMethod::Express, &cart).unwrap();
    // committed method only changes on the next successful advance
    assert_eq!(session.shipping().unwrap().method, ShippingMethod::Standard);
    session.advance(&cart).unwrap();
    assert_eq!(session.shipping().unwrap().method, ShippingMethod::Express);
}

#[test]
fn test_progress_through_steps() {
    let cart = stocked_cart(MemoryStorage::new());
    let mut session = CheckoutSession::begin(&cart, CheckoutRules::default()).unwrap();

    let view = session.view(&cart);
    assert_eq!(view.progress_percent, 0);
    assert!(!view.can_retreat);
    assert!(!view.can_advance);

    let mut session_done = session_at_payment(&cart);
    assert_eq!(session_done.view(&cart).progress_percent, 100);
    session_done.retreat().unwrap();
    assert_eq!(session_done.view(&cart).progress_percent, 50);

    assert!(session.advance(&cart).is_err());
    assert_eq!(session.errors().len(), 4);
}
