use orderwallet::application::engine::OrderEngine;
use orderwallet::domain::account::{AccountId, Balance, Caller, Role};
use orderwallet::domain::order::{Order, OrderId, OrderStatus};
use orderwallet::error::{OrderError, Result};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Barrier;

mod common;

/// Fires `count` copies of `call` at once and waits for all of them.
async fn race<F, Fut, T>(count: usize, call: F) -> Vec<Result<T>>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let barrier = Arc::new(Barrier::new(count));
    let handles: Vec<_> = (0..count)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let fut = call();
            tokio::spawn(async move {
                barrier.wait().await;
                fut.await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(count);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

fn update(
    engine: &Arc<OrderEngine>,
    caller: Caller,
    order: OrderId,
    status: OrderStatus,
) -> impl std::future::Future<Output = Result<Order>> + Send + 'static {
    let engine = Arc::clone(engine);
    async move { engine.update_order_status(&caller, order, status).await }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_completions_settle_once() {
    for _ in 0..25 {
        let engine = Arc::new(common::engine_with_parties().await);
        let id = common::create_accepted(&engine, dec!(40)).await;

        let results = race(2, || {
            update(&engine, Caller::partner("p1"), id, OrderStatus::Completed)
        })
        .await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(OrderError::InvalidTransition { .. })))
            .count();
        assert_eq!((succeeded, rejected), (1, 1), "{results:?}");

        let wallet = engine.wallet(&Caller::partner("p1")).await.unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(40)));
        assert_eq!(wallet.postings.len(), 1);
        engine.audit().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_and_reject_race_has_one_winner() {
    for _ in 0..25 {
        let engine = Arc::new(common::engine_with_parties().await);
        let id = common::create_accepted(&engine, dec!(40)).await;

        let complete = update(&engine, Caller::partner("p1"), id, OrderStatus::Completed);
        let reject = update(&engine, Caller::partner("p1"), id, OrderStatus::Rejected);
        let (complete, reject) = tokio::join!(tokio::spawn(complete), tokio::spawn(reject));
        let (complete, reject) = (complete.unwrap(), reject.unwrap());

        assert!(complete.is_ok() != reject.is_ok());

        let c1 = engine.wallet(&Caller::coordinator("c1")).await.unwrap();
        let p1 = engine.wallet(&Caller::partner("p1")).await.unwrap();
        if complete.is_ok() {
            assert_eq!(c1.balance, Balance::new(dec!(60)));
            assert_eq!(p1.balance, Balance::new(dec!(40)));
        } else {
            assert_eq!(c1.balance, Balance::new(dec!(100)));
            assert_eq!(p1.balance, Balance::ZERO);
        }
        engine.audit().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_cannot_overdraw() {
    let engine = Arc::new(common::engine_with_parties().await);

    let results = race(10, || {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .create_order(&Caller::coordinator("c1"), "parcel", dec!(40))
                .await
        }
    })
    .await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::InsufficientFunds { .. })))
        .count();
    assert_eq!((succeeded, short), (2, 8));

    let wallet = engine.wallet(&Caller::coordinator("c1")).await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(20)));
    assert_eq!(wallet.postings.len(), 2);

    let report = engine.audit().await.unwrap();
    assert_eq!(report.orders, 2);
    assert_eq!(report.reserved, Balance::new(dec!(80)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_assignments_bind_one_partner() {
    let engine = Arc::new(common::engine_with_parties().await);
    engine
        .open_account(AccountId::new("p2"), Role::Partner, "Second")
        .await
        .unwrap();
    let order_id = engine
        .create_order(&Caller::coordinator("c1"), "parcel", dec!(10))
        .await
        .unwrap()
        .order
        .id;

    let assign_to = |partner: &'static str| {
        let engine = Arc::clone(&engine);
        async move {
            engine
                .assign_order(&Caller::coordinator("c1"), order_id, &AccountId::new(partner))
                .await
        }
    };
    let (first, second) = tokio::join!(
        tokio::spawn(assign_to("p1")),
        tokio::spawn(assign_to("p2"))
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(first.is_ok() != second.is_ok());
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(OrderError::InvalidTransition { .. })));

    let orders = engine.orders_for(&Caller::coordinator("c1")).await.unwrap();
    assert_eq!(orders[0].order.status, OrderStatus::Assigned);
    assert!(orders[0].partner.is_some());
}

#[tokio::test]
async fn test_engine_is_shareable_across_tasks() {
    let engine = Arc::new(common::engine_with_parties().await);

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .create_order(&Caller::coordinator("c1"), "parcel", dec!(1))
                .await
                .unwrap()
        }
    });

    let receipt = handle.await.unwrap();
    assert_eq!(receipt.wallet.balance, Balance::new(dec!(99)));
}
