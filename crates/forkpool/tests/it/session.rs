//! Session lifecycle: fork start, descriptor synthesis, rollback, stop.

use crate::support::{
    FakeDirectory, StubLauncher, StubNode, dead_addr, init_tracing, session, spawn_rpc_stub,
};
use alloy_chains::NamedChain;
use forkpool::{
    Error, ForkFailure, ForkRequest, ForkSpec, NativeCurrency, StartOptions, StopTarget,
    networks::LookupError, stop_instance,
};
use std::collections::BTreeMap;

fn requests(names: &[&str]) -> BTreeMap<String, ForkRequest> {
    names
        .iter()
        .map(|name| (name.to_string(), ForkRequest::from_url("http://localhost:9000")))
        .collect()
}

#[tokio::test]
async fn every_request_key_gets_a_fork_and_a_client_bundle() {
    init_tracing();
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    let networks =
        session.fork_chains(ForkSpec::ByConfig(requests(&["apple", "banana"]))).await.unwrap();

    let keys: Vec<_> = networks.chains.keys().cloned().collect();
    assert_eq!(keys, ["apple", "banana"]);
    let client_keys: Vec<_> = networks.clients.keys().cloned().collect();
    assert_eq!(client_keys, keys);
}

#[tokio::test]
async fn pool_ids_follow_request_enumeration_order() {
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    let networks = session
        .fork_chains(ForkSpec::ByConfig(requests(&["zebra", "aardvark", "moose"])))
        .await
        .unwrap();

    // BTreeMap iteration is sorted by key
    assert_eq!(networks.chains["aardvark"].pool_id, 0);
    assert_eq!(networks.chains["moose"].pool_id, 1);
    assert_eq!(networks.chains["zebra"].pool_id, 2);
}

#[tokio::test]
async fn descriptor_reflects_the_live_fork_not_the_input() {
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    let networks = session
        .fork_chains(ForkSpec::ByConfig(requests(&["mainnetFork"])))
        .await
        .unwrap();

    let fork = &networks.chains["mainnetFork"];
    assert_eq!(fork.pool_id, 0);
    assert_eq!(fork.chain.id, 424_242);
    assert_eq!(fork.chain.name, "unknown");
    assert_eq!(fork.chain.rpc_urls.http, format!("http://127.0.0.1:{}", stub.port()));
    assert_eq!(fork.chain.rpc_urls.ws, format!("ws://127.0.0.1:{}", stub.port()));
    assert_eq!(fork.chain.native_currency, NativeCurrency::default());
}

#[tokio::test]
async fn registry_chains_get_their_canonical_name() {
    let stub = spawn_rpc_stub(10).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    let networks =
        session.fork_chains(ForkSpec::ByConfig(requests(&["op"]))).await.unwrap();
    assert_eq!(networks.chains["op"].chain.name, "optimism");
}

#[tokio::test]
async fn supplied_native_currency_is_echoed_unchanged() {
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    let currency =
        NativeCurrency { decimals: 6, name: "Circle".to_string(), symbol: "USDC".to_string() };
    let mut requests = BTreeMap::new();
    requests.insert(
        "fork".to_string(),
        ForkRequest {
            fork_url: Some("http://localhost:9000".to_string()),
            native_currency: Some(currency.clone()),
            ..Default::default()
        },
    );

    let networks = session.fork_chains(ForkSpec::ByConfig(requests)).await.unwrap();
    assert_eq!(networks.chains["fork"].chain.native_currency, currency);
}

#[tokio::test]
async fn pool_options_carry_the_request_minus_the_currency() {
    let stub = spawn_rpc_stub(424_242).await;
    let launcher = StubLauncher::new(stub);
    let launched = launcher.launched();
    let mut session = session(launcher, FakeDirectory::default());

    let mut requests = BTreeMap::new();
    requests.insert(
        "fork".to_string(),
        ForkRequest {
            fork_url: Some("http://localhost:9000".to_string()),
            fork_block_number: Some(19_000_000),
            native_currency: Some(NativeCurrency::default()),
            args: vec!["--no-rate-limit".to_string()],
            ..Default::default()
        },
    );
    session.fork_chains(ForkSpec::ByConfig(requests)).await.unwrap();

    let launched = launched.lock().unwrap();
    assert_eq!(
        *launched,
        vec![StartOptions {
            fork_url: Some("http://localhost:9000".to_string()),
            fork_block_number: Some(19_000_000),
            chain_id: None,
            block_time: None,
            // assigned by the pool: base port plus slot id
            port: Some(8545),
            args: vec!["--no-rate-limit".to_string()],
        }]
    );
}

#[tokio::test]
async fn missing_fork_url_resolves_through_the_directory() {
    let stub = spawn_rpc_stub(424_242).await;
    let launcher = StubLauncher::new(stub);
    let launched = launcher.launched();
    let directory =
        FakeDirectory::default().with(NamedChain::Mainnet, "https://example.invalid/rpc");
    let mut session = session(launcher, directory);

    let mut requests = BTreeMap::new();
    requests.insert("mainnet".to_string(), ForkRequest::default());
    session.fork_chains(ForkSpec::ByConfig(requests)).await.unwrap();

    assert_eq!(
        launched.lock().unwrap()[0].fork_url.as_deref(),
        Some("https://example.invalid/rpc")
    );
}

#[tokio::test]
async fn lookup_misses_abort_before_any_fork_starts() {
    let stub = spawn_rpc_stub(424_242).await;
    let launcher = StubLauncher::new(stub);
    let launched = launcher.launched();
    let mut session = session(launcher, FakeDirectory::default());

    let mut requests = BTreeMap::new();
    requests.insert("aaa".to_string(), ForkRequest::default());
    requests.insert("bbb".to_string(), ForkRequest::default());

    let err = session.fork_chains(ForkSpec::ByConfig(requests)).await.unwrap_err();
    match err {
        Error::PoolStart { chain, source: ForkFailure::Lookup(LookupError::UnknownNetwork(name)) } => {
            assert_eq!(chain, "aaa");
            assert_eq!(name, "aaa");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(launched.lock().unwrap().is_empty());
    assert!(session.pool().is_empty());
}

#[tokio::test]
async fn mid_batch_launch_failure_rolls_back_started_slots() {
    let stub = spawn_rpc_stub(424_242).await;
    let launcher = StubLauncher::new(stub).fail_on(1);
    let launched = launcher.launched();
    let mut session = session(launcher, FakeDirectory::default());

    let err = session
        .fork_chains(ForkSpec::ByConfig(requests(&["alpha", "beta", "gamma"])))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PoolStart { ref chain, .. } if chain == "beta"));
    // alpha launched, beta attempted, gamma never reached
    assert_eq!(launched.lock().unwrap().len(), 2);
    assert!(session.pool().is_empty());
}

#[tokio::test]
async fn unreachable_fork_rolls_back_its_own_slot() {
    let mut session = session(StubLauncher::new(dead_addr()), FakeDirectory::default());

    let err = session
        .fork_chains(ForkSpec::ByConfig(requests(&["alpha"])))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::PoolStart { source: ForkFailure::ChainId(_), .. }
    ));
    assert!(session.pool().is_empty());
}

#[tokio::test]
async fn identifiers_resolve_to_canonical_names() {
    let stub = spawn_rpc_stub(424_242).await;
    let directory = FakeDirectory::default()
        .with(NamedChain::Mainnet, "https://example.invalid/eth")
        .with(NamedChain::Sepolia, "https://example.invalid/sepolia");
    let mut session = session(StubLauncher::new(stub), directory);

    let networks =
        session.fork_chains(ForkSpec::ByIdentifier("1, sepolia".to_string())).await.unwrap();

    let keys: Vec<_> = networks.chains.keys().cloned().collect();
    assert_eq!(keys, ["mainnet", "sepolia"]);
}

#[tokio::test]
async fn unknown_identifiers_fail_before_any_fork_starts() {
    let stub = spawn_rpc_stub(424_242).await;
    let launcher = StubLauncher::new(stub);
    let launched = launcher.launched();
    let mut session = session(launcher, FakeDirectory::default());

    let err = session
        .fork_chains(ForkSpec::ByIdentifier("wat".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PoolStart { ref chain, .. } if chain == "wat"));
    assert!(launched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stopped_slots_cannot_be_stopped_twice() {
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    session.fork_chains(ForkSpec::ByConfig(requests(&["fork"]))).await.unwrap();
    session.stop_slot(0).unwrap();

    let err = session.stop_slot(0).unwrap_err();
    assert!(matches!(err, Error::Stop { target: StopTarget::Slot(0), .. }));
}

#[tokio::test]
async fn stop_all_empties_the_pool() {
    let stub = spawn_rpc_stub(424_242).await;
    let mut session = session(StubLauncher::new(stub), FakeDirectory::default());

    session.fork_chains(ForkSpec::ByConfig(requests(&["a", "b"]))).await.unwrap();
    assert_eq!(session.pool().len(), 2);

    session.stop_all().unwrap();
    assert!(session.pool().is_empty());
}

#[test]
fn stopping_a_node_that_is_not_running_errors() {
    let mut node = StubNode::new(dead_addr());
    stop_instance(&mut node).unwrap();

    let err = stop_instance(&mut node).unwrap_err();
    assert!(matches!(err, Error::Stop { target: StopTarget::Instance, .. }));
}
