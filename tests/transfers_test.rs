mod common;

use anyhow::Result;
use common::{StandardAccounts, balance_of, entry_count, test_service, transfer_count};
use simplebank::application::{AppError, ErrorKind};
use simplebank::domain::TransferParams;
use simplebank::storage::{Page, TransferFilter};

#[tokio::test]
async fn test_transfer_moves_money_and_records_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;

    let result = service
        .transfer(TransferParams::new(alice.id, bob.id, 30))
        .await?;

    assert_eq!(result.transfer.from_account_id, alice.id);
    assert_eq!(result.transfer.to_account_id, bob.id);
    assert_eq!(result.transfer.amount, 30);

    assert_eq!(result.from_account.id, alice.id);
    assert_eq!(result.from_account.balance, 70);
    assert_eq!(result.to_account.id, bob.id);
    assert_eq!(result.to_account.balance, 80);

    assert_eq!(result.from_entry.account_id, alice.id);
    assert_eq!(result.from_entry.amount, -30);
    assert_eq!(result.to_entry.account_id, bob.id);
    assert_eq!(result.to_entry.amount, 30);

    // What was returned is what was stored
    assert_eq!(balance_of(&service, alice.id).await?, 70);
    assert_eq!(balance_of(&service, bob.id).await?, 80);
    assert_eq!(transfer_count(&service).await?, 1);
    assert_eq!(service.get_transfer(result.transfer.id).await?, result.transfer);
    assert_eq!(service.get_entry(result.from_entry.id).await?, result.from_entry);

    let alice_entries = service.list_entries(alice.id, Page::default()).await?;
    let bob_entries = service.list_entries(bob.id, Page::default()).await?;
    assert_eq!(alice_entries.len(), 1);
    assert_eq!(alice_entries[0].amount, -30);
    assert_eq!(bob_entries.len(), 1);
    assert_eq!(bob_entries[0].amount, 30);

    Ok(())
}

#[tokio::test]
async fn test_zero_amount_is_rejected_without_side_effects() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;

    for amount in [0, -30] {
        let err = service
            .transfer(TransferParams::new(alice.id, bob.id, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(a) if a == amount));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    assert_eq!(transfer_count(&service).await?, 0);
    assert_eq!(entry_count(&service, alice.id).await?, 0);
    assert_eq!(entry_count(&service, bob.id).await?, 0);
    assert_eq!(balance_of(&service, alice.id).await?, 100);
    assert_eq!(balance_of(&service, bob.id).await?, 50);

    Ok(())
}

#[tokio::test]
async fn test_self_transfer_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, _bob) = StandardAccounts::create_pair(&service).await?;

    let err = service
        .transfer(TransferParams::new(alice.id, alice.id, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::SameAccount(id) if id == alice.id));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(transfer_count(&service).await?, 0);
    assert_eq!(balance_of(&service, alice.id).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_missing_destination_leaves_nothing_behind() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, _bob) = StandardAccounts::create_pair(&service).await?;

    let err = service
        .transfer(TransferParams::new(alice.id, 9_999, 30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!err.is_retryable());
    assert_eq!(transfer_count(&service).await?, 0);
    assert_eq!(entry_count(&service, alice.id).await?, 0);
    assert_eq!(balance_of(&service, alice.id).await?, 100);

    Ok(())
}

#[tokio::test]
async fn test_missing_source_is_not_found() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (_alice, bob) = StandardAccounts::create_pair(&service).await?;

    let err = service
        .transfer(TransferParams::new(9_999, bob.id, 30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(balance_of(&service, bob.id).await?, 50);
    assert_eq!(entry_count(&service, bob.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_from_higher_to_lower_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;
    assert!(bob.id > alice.id);

    // Balances are updated lowest id first; the result must still be
    // labelled by direction, not by update order
    let result = service
        .transfer(TransferParams::new(bob.id, alice.id, 20))
        .await?;

    assert_eq!(result.from_account.id, bob.id);
    assert_eq!(result.from_account.balance, 30);
    assert_eq!(result.to_account.id, alice.id);
    assert_eq!(result.to_account.balance, 120);
    assert_eq!(result.from_entry.amount, -20);
    assert_eq!(result.to_entry.amount, 20);

    Ok(())
}

#[tokio::test]
async fn test_balance_overflow_is_rejected_and_rolled_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let rich = service.create_account("rich", i64::MAX, "EUR").await?;
    let poor = service.create_account("poor", 10, "EUR").await?;
    let broke = service.create_account("broke", i64::MIN, "EUR").await?;

    // Credit side would go past i64::MAX
    let err = service
        .transfer(TransferParams::new(poor.id, rich.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::BalanceOverflow { account_id, delta: 1 } if account_id == rich.id
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_retryable());

    // Debit side would go below i64::MIN
    let err = service
        .transfer(TransferParams::new(broke.id, poor.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::BalanceOverflow { account_id, delta: -1 } if account_id == broke.id
    ));

    assert_eq!(balance_of(&service, rich.id).await?, i64::MAX);
    assert_eq!(balance_of(&service, poor.id).await?, 10);
    assert_eq!(balance_of(&service, broke.id).await?, i64::MIN);
    assert_eq!(transfer_count(&service).await?, 0);
    assert_eq!(entry_count(&service, poor.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_conservation_across_many_transfers() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;
    let carol = service.create_account("carol", 0, "EUR").await?;

    let moves = [
        (alice.id, bob.id, 10),
        (bob.id, carol.id, 25),
        (carol.id, alice.id, 5),
        (alice.id, carol.id, 40),
        (bob.id, alice.id, 15),
    ];

    for (from, to, amount) in moves {
        let before = balance_of(&service, from).await? + balance_of(&service, to).await?;
        let from_before = balance_of(&service, from).await?;

        let result = service
            .transfer(TransferParams::new(from, to, amount))
            .await?;

        assert_eq!(
            result.from_account.balance + result.to_account.balance,
            before
        );
        assert_eq!(result.from_account.balance, from_before - amount);
        assert_eq!(result.from_entry.amount + result.to_entry.amount, 0);
    }

    assert_eq!(balance_of(&service, alice.id).await?, 100 - 10 + 5 - 40 + 15);
    assert_eq!(balance_of(&service, bob.id).await?, 50 + 10 - 25 - 15);
    assert_eq!(balance_of(&service, carol.id).await?, 25 - 5 + 40);

    let report = service.check_integrity().await?;
    assert!(report.is_ok(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.stats.transfer_count, 5);
    assert_eq!(report.stats.entry_count, 10);
    assert_eq!(report.stats.entry_sum, 0);

    Ok(())
}

#[tokio::test]
async fn test_list_transfers_filters_by_direction() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;

    service
        .transfer(TransferParams::new(alice.id, bob.id, 1))
        .await?;
    service
        .transfer(TransferParams::new(alice.id, bob.id, 2))
        .await?;
    service
        .transfer(TransferParams::new(bob.id, alice.id, 3))
        .await?;

    let outgoing = service
        .list_transfers(
            TransferFilter {
                from_account_id: Some(alice.id),
                to_account_id: None,
            },
            Page::default(),
        )
        .await?;
    assert_eq!(
        outgoing.iter().map(|t| t.amount).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let pair = service
        .list_transfers(
            TransferFilter {
                from_account_id: Some(bob.id),
                to_account_id: Some(alice.id),
            },
            Page::default(),
        )
        .await?;
    assert_eq!(pair.len(), 1);
    assert_eq!(pair[0].amount, 3);

    let second_page = service
        .list_transfers(TransferFilter::default(), Page::new(2, 2))
        .await?;
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].amount, 3);

    Ok(())
}

#[tokio::test]
async fn test_transfer_json_shape() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let (alice, bob) = StandardAccounts::create_pair(&service).await?;

    let params: TransferParams = serde_json::from_str(&format!(
        r#"{{"from_account_id": {}, "to_account_id": {}, "amount": 30}}"#,
        alice.id, bob.id
    ))?;
    let result = service.transfer(params).await?;

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["transfer"]["amount"], 30);
    assert_eq!(json["from_account"]["balance"], 70);
    assert_eq!(json["to_account"]["balance"], 80);
    assert_eq!(json["from_entry"]["amount"], -30);
    assert_eq!(json["to_entry"]["amount"], 30);

    Ok(())
}
