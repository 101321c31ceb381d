//! Command handlers driven against in-memory node and cluster fakes

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{FakeCluster, FakeNetwork, AVAX, LOCAL_NETWORK_ID};
use subnet_cli::cli::{self, AppContext, DeployArgs};
use subnet_cli::config::AppConfig;
use subnet_cli::core::{content_id, format_address, Id, Network, ShortId};
use subnet_cli::crypto::KeyPair;
use subnet_cli::multisig::TxArtifact;

struct Fixture {
    network: FakeNetwork,
    cluster: Arc<FakeCluster>,
    ctx: AppContext,
    alice: KeyPair,
    bob: KeyPair,
    subnet_id: Id,
    control_keys: Vec<ShortId>,
    _base_dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let network = FakeNetwork::new();
    let cluster = Arc::new(FakeCluster::new(3));
    cluster.attach(&network);

    let alice = KeyPair::generate().unwrap();
    let bob = KeyPair::generate().unwrap();
    let carol = KeyPair::generate().unwrap();
    network.fund(alice.short_id(), 10 * AVAX);
    let subnet_id = content_id(b"cli subnet");
    let control_keys = network.add_subnet(
        subnet_id,
        vec![alice.short_id(), bob.short_id(), carol.short_id()],
        2,
    );

    let base_dir = tempfile::tempdir().unwrap();
    let ctx = AppContext::with_connector(
        base_dir.path().to_path_buf(),
        AppConfig::default(),
        network.connector(),
    )
    .unwrap()
    .with_cluster(cluster.clone());
    ctx.keys.import("alice", alice.clone()).unwrap();
    ctx.keys.import("bob", bob.clone()).unwrap();
    ctx.keys.import("carol", carol.clone()).unwrap();

    Fixture {
        network,
        cluster,
        ctx,
        alice,
        bob,
        subnet_id,
        control_keys,
        _base_dir: base_dir,
    }
}

fn deploy_args(f: &Fixture, genesis: &Path, output: &Path, auth_keys: Vec<String>) -> DeployArgs {
    DeployArgs {
        name: "testvm".to_string(),
        genesis: genesis.to_path_buf(),
        subnet_id: f.subnet_id,
        vm: None,
        key: "alice".to_string(),
        auth_keys,
        network: Network::Local,
        output_tx_path: Some(output.to_path_buf()),
    }
}

fn address(key: &KeyPair) -> String {
    format_address(&key.short_id(), LOCAL_NETWORK_ID).unwrap()
}

/// Deploy with alice and bob as authorizers; alice signs, bob is left
async fn deploy_partial(f: &Fixture, dir: &Path) -> std::path::PathBuf {
    let genesis = dir.join("genesis.json");
    std::fs::write(&genesis, br#"{"config":{}}"#).unwrap();
    let tx_path = dir.join("tx.txt");
    let args = deploy_args(
        f,
        &genesis,
        &tx_path,
        vec![address(&f.alice), address(&f.bob)],
    );
    cli::cmd_blockchain_deploy(&f.ctx, &args).await.unwrap();
    tx_path
}

#[tokio::test]
async fn test_deploy_saves_partially_signed_tx() {
    let f = fixture();
    let work = tempfile::tempdir().unwrap();
    let tx_path = deploy_partial(&f, work.path()).await;

    let artifact = TxArtifact::load(&tx_path).unwrap();
    let set = artifact.signer_set(&f.control_keys).unwrap();
    assert_eq!(set.remaining(), &[f.bob.short_id()]);
    assert_eq!(f.network.issued_count(), 0);

    let sidecar = f.ctx.sidecars.load("testvm").unwrap();
    assert_eq!(
        sidecar.network(Network::Local).unwrap().subnet_id,
        Some(f.subnet_id)
    );
}

#[tokio::test]
async fn test_deploy_picks_held_auth_keys_by_default() {
    let f = fixture();
    let work = tempfile::tempdir().unwrap();
    let genesis = work.path().join("genesis.json");
    std::fs::write(&genesis, b"{}").unwrap();
    let tx_path = work.path().join("tx.txt");

    cli::cmd_blockchain_deploy(&f.ctx, &deploy_args(&f, &genesis, &tx_path, Vec::new()))
        .await
        .unwrap();

    let artifact = TxArtifact::load(&tx_path).unwrap();
    let set = artifact.signer_set(&f.control_keys).unwrap();
    assert_eq!(set.required().len(), 2);
    assert!(set.required().contains(&f.alice.short_id()));
    assert_eq!(set.signed(), vec![f.alice.short_id()]);
}

#[tokio::test]
async fn test_sign_then_commit_tracks_chain_locally() {
    let f = fixture();
    let work = tempfile::tempdir().unwrap();
    let tx_path = deploy_partial(&f, work.path()).await;

    cli::cmd_transaction_sign(&f.ctx, Some("testvm"), &tx_path, "bob")
        .await
        .unwrap();
    let artifact = TxArtifact::load(&tx_path).unwrap();
    assert!(artifact.is_ready_to_commit(&f.control_keys).unwrap());

    let err = cli::cmd_transaction_sign(&f.ctx, Some("testvm"), &tx_path, "bob")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "tx is already fully signed");

    cli::cmd_transaction_commit(&f.ctx, "testvm", &tx_path)
        .await
        .unwrap();
    let tx_id = artifact.id();
    assert!(f.network.state().committed.contains_key(&tx_id));

    let sidecar = f.ctx.sidecars.load("testvm").unwrap();
    let local = sidecar.network(Network::Local).unwrap();
    assert_eq!(local.blockchain_id, Some(tx_id));
    assert_eq!(local.subnet_id, Some(f.subnet_id));
    assert_eq!(local.rpc_endpoints.len(), 3);

    let restarts = f.cluster.restarts();
    assert_eq!(restarts.len(), 3);
    assert!(restarts
        .iter()
        .all(|(_, whitelist)| whitelist.contains(&f.subnet_id.to_string())));
}

#[tokio::test]
async fn test_sign_without_required_key_leaves_file_untouched() {
    let f = fixture();
    let work = tempfile::tempdir().unwrap();
    let tx_path = deploy_partial(&f, work.path()).await;
    let before = std::fs::read_to_string(&tx_path).unwrap();

    cli::cmd_transaction_sign(&f.ctx, Some("testvm"), &tx_path, "carol")
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&tx_path).unwrap(), before);
}

#[tokio::test]
async fn test_commit_of_partial_tx_fails() {
    let f = fixture();
    let work = tempfile::tempdir().unwrap();
    let tx_path = deploy_partial(&f, work.path()).await;

    let err = cli::cmd_transaction_commit(&f.ctx, "testvm", &tx_path)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not fully signed"));
    assert_eq!(f.network.issued_count(), 0);
    assert!(f.cluster.restarts().is_empty());
}
