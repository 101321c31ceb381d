//! Rebinding a wallet keeps its local state and only swaps the endpoint

mod common;

use common::{FakeNetwork, AVAX};
use subnet_cli::core::{Network, OutputOwners};
use subnet_cli::crypto::KeyPair;
use subnet_cli::wallet::{Keychain, Wallet, WalletOptions};

const BEFORE: &str = "http://node1.local:9650";
const AFTER: &str = "http://node1.local:9660";

async fn funded_wallet(network: &FakeNetwork, key: &KeyPair) -> Wallet {
    network.fund(key.short_id(), 5 * AVAX);
    Wallet::bind(
        network.connector(),
        BEFORE,
        Keychain::from_keys([key.clone()]),
        WalletOptions::for_network(Network::Local),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_rebind_preserves_balance_without_refetch() {
    let network = FakeNetwork::new();
    let key = KeyPair::generate().unwrap();
    let mut wallet = funded_wallet(&network, &key).await;
    assert_eq!(network.state().utxo_fetches, 1);

    let owner = OutputOwners::new(1, vec![wallet.change_address()]);
    wallet.issue_create_subnet_tx(owner).await.unwrap();
    let balance = wallet.balance();
    assert!(balance < 5 * AVAX);

    wallet.rebind(AFTER).unwrap();

    assert_eq!(wallet.endpoint(), AFTER);
    assert_eq!(wallet.balance(), balance);
    assert_eq!(wallet.backend().tx_count(), 1);
    assert_eq!(network.state().utxo_fetches, 1);
}

#[tokio::test]
async fn test_issue_after_rebind_uses_new_endpoint() {
    let network = FakeNetwork::new();
    let key = KeyPair::generate().unwrap();
    let mut wallet = funded_wallet(&network, &key).await;

    let owner = OutputOwners::new(1, vec![wallet.change_address()]);
    let first = wallet.issue_create_subnet_tx(owner.clone()).await.unwrap();
    wallet.rebind(AFTER).unwrap();
    let second = wallet.issue_create_subnet_tx(owner).await.unwrap();

    // The second tx spends the change of the first, known only locally
    assert_ne!(first, second);
    let issued = network.state().issued_via.clone();
    assert_eq!(
        issued,
        vec![(BEFORE.to_string(), first), (AFTER.to_string(), second)]
    );
    assert!(wallet.backend().subnet_owner(&second).is_some());
}

#[tokio::test]
async fn test_rebind_to_same_endpoint_is_harmless() {
    let network = FakeNetwork::new();
    let key = KeyPair::generate().unwrap();
    let mut wallet = funded_wallet(&network, &key).await;
    let balance = wallet.balance();

    wallet.rebind(BEFORE).unwrap();
    wallet.rebind(BEFORE).unwrap();

    assert_eq!(wallet.endpoint(), BEFORE);
    assert_eq!(wallet.balance(), balance);
    assert_eq!(network.state().utxo_fetches, 1);
}
