//! End-to-end access decision scenarios

use pbac::{
    Address, ConditionSpec, EvaluationStrategy, MemoryLedger, Pbac, PbacError, U256,
};
use std::sync::Arc;

const ERC20: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const ERC721: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";
const ERC1155: &str = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0";

fn deployer() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()
}

fn user() -> Address {
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap()
}

fn engine(strategy: EvaluationStrategy) -> (Arc<MemoryLedger>, Pbac) {
    let ledger = Arc::new(MemoryLedger::new());
    let pbac = Pbac::builder()
        .oracle(ledger.clone())
        .strategy(strategy)
        .build()
        .unwrap();
    (ledger, pbac)
}

#[tokio::test]
async fn test_eth_balance_policy() {
    let (ledger, pbac) = engine(EvaluationStrategy::Concurrent);

    let policy = pbac
        .create_policy(deployer(), "ETH余额策略", "secret-document", "read")
        .unwrap();
    pbac.add_condition(
        deployer(),
        policy,
        ConditionSpec::native_balance(">=", "1000000000000"),
    )
    .unwrap();

    // Hardhat test accounts start with 10000 ETH
    ledger.set_native_balance(
        user(),
        U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64)),
    );
    assert!(pbac.check_access(user(), "secret-document", "read").await);

    // An unfunded account is denied
    let fresh = Address::repeat_byte(0x99);
    assert!(!pbac.check_access(fresh, "secret-document", "read").await);
}

#[tokio::test]
async fn test_no_policy_denies() {
    let (ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    ledger.set_native_balance(user(), U256::MAX);

    assert!(!pbac.check_access(user(), "secret-document", "read").await);
    let decision = pbac.decide(user(), "secret-document", "read").await;
    assert!(!decision.granted);
    assert_eq!(decision.granted_by, None);
}

#[tokio::test]
async fn test_resource_and_action_match_exactly() {
    let (_ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    pbac.create_policy(deployer(), "open", "secret-document", "read")
        .unwrap();

    assert!(pbac.check_access(user(), "secret-document", "read").await);
    assert!(!pbac.check_access(user(), "secret-document", "Read").await);
    assert!(!pbac.check_access(user(), "secret-document ", "read").await);
    assert!(!pbac.check_access(user(), "secret-*", "read").await);
}

#[tokio::test]
async fn test_erc20_thresholds() {
    let (ledger, pbac) = engine(EvaluationStrategy::Sequential);
    let token: Address = ERC20.parse().unwrap();

    let policy = pbac
        .create_policy(deployer(), "token holders", "forum", "post")
        .unwrap();
    pbac.add_condition(deployer(), policy, ConditionSpec::erc20_balance(ERC20, ">", "0"))
        .unwrap();
    pbac.add_condition(
        deployer(),
        policy,
        ConditionSpec::erc20_balance(ERC20, "<=", "0x3635c9adc5dea00000"),
    )
    .unwrap();

    ledger.set_erc20_balance(token, user(), U256::ZERO);
    assert!(!pbac.check_access(user(), "forum", "post").await);

    ledger.set_erc20_balance(token, user(), U256::from(1u64));
    assert!(pbac.check_access(user(), "forum", "post").await);

    // 1000 * 10^18 + 1 exceeds the upper bound
    let cap = U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18u64));
    ledger.set_erc20_balance(token, user(), cap + U256::from(1u64));
    assert!(!pbac.check_access(user(), "forum", "post").await);
}

#[tokio::test]
async fn test_erc721_ownership_and_exclusion() {
    let (ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    let nft: Address = ERC721.parse().unwrap();
    let banned = Address::repeat_byte(0xbb);

    let owners = pbac
        .create_policy(deployer(), "nft holders", "lounge", "enter")
        .unwrap();
    pbac.add_condition(
        deployer(),
        owners,
        ConditionSpec::erc721_owner(ERC721, "1", "==", ":userAddress"),
    )
    .unwrap();

    let not_banned = pbac
        .create_policy(deployer(), "token 2 not with banned", "gallery", "view")
        .unwrap();
    pbac.add_condition(
        deployer(),
        not_banned,
        ConditionSpec::erc721_owner(ERC721, "2", "!=", &banned.to_string()),
    )
    .unwrap();

    ledger.set_erc721_owner(nft, U256::from(1u64), user());
    ledger.set_erc721_owner(nft, U256::from(2u64), user());

    assert!(pbac.check_access(user(), "lounge", "enter").await);
    assert!(!pbac.check_access(deployer(), "lounge", "enter").await);
    assert!(pbac.check_access(deployer(), "gallery", "view").await);

    ledger.set_erc721_owner(nft, U256::from(2u64), banned);
    assert!(!pbac.check_access(deployer(), "gallery", "view").await);
}

#[tokio::test]
async fn test_erc1155_balance_per_token_id() {
    let (ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    let items: Address = ERC1155.parse().unwrap();

    let policy = pbac
        .create_policy(deployer(), "sword holders", "arena", "join")
        .unwrap();
    pbac.add_condition(
        deployer(),
        policy,
        ConditionSpec::erc1155_balance(ERC1155, "3", ">=", "1"),
    )
    .unwrap();

    ledger.set_erc1155_balance(items, user(), U256::from(4u64), U256::from(10u64));
    assert!(!pbac.check_access(user(), "arena", "join").await);

    ledger.set_erc1155_balance(items, user(), U256::from(3u64), U256::from(1u64));
    assert!(pbac.check_access(user(), "arena", "join").await);
}

#[tokio::test]
async fn test_fixed_holder_condition_ignores_caller() {
    let (ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    let treasury = Address::repeat_byte(0x7e);

    let policy = pbac
        .create_policy(deployer(), "treasury funded", "payouts", "claim")
        .unwrap();
    let spec = ConditionSpec {
        parameters: vec![treasury.to_string(), "latest".to_string()],
        ..ConditionSpec::native_balance(">", "0")
    };
    pbac.add_condition(deployer(), policy, spec).unwrap();

    assert!(!pbac.check_access(user(), "payouts", "claim").await);
    ledger.set_native_balance(treasury, U256::from(1u64));
    assert!(pbac.check_access(user(), "payouts", "claim").await);
    assert!(pbac.check_access(deployer(), "payouts", "claim").await);
}

#[tokio::test]
async fn test_strategies_agree() {
    let scenarios: [(u64, u64, bool); 4] = [(0, 0, false), (5, 0, false), (5, 3, true), (0, 3, true)];

    for (eth, tokens, expected) in scenarios {
        let mut outcomes = Vec::new();
        for strategy in [EvaluationStrategy::Sequential, EvaluationStrategy::Concurrent] {
            let (ledger, pbac) = engine(strategy);
            let token: Address = ERC20.parse().unwrap();

            let both = pbac.create_policy(deployer(), "both", "doc", "read").unwrap();
            pbac.add_condition(deployer(), both, ConditionSpec::native_balance(">=", "5"))
                .unwrap();
            pbac.add_condition(deployer(), both, ConditionSpec::erc20_balance(ERC20, ">=", "3"))
                .unwrap();
            let tokens_only = pbac
                .create_policy(deployer(), "tokens", "doc", "read")
                .unwrap();
            pbac.add_condition(
                deployer(),
                tokens_only,
                ConditionSpec::erc20_balance(ERC20, ">=", "3"),
            )
            .unwrap();

            ledger.set_native_balance(user(), U256::from(eth));
            ledger.set_erc20_balance(token, user(), U256::from(tokens));
            outcomes.push(pbac.check_access(user(), "doc", "read").await);
        }
        assert_eq!(outcomes, vec![expected, expected], "eth={} tokens={}", eth, tokens);
    }
}

#[tokio::test]
async fn test_check_policy_for_user_errors() {
    let (_ledger, pbac) = engine(EvaluationStrategy::Concurrent);
    let err = pbac.check_policy_for_user(7, user()).await.unwrap_err();
    assert!(matches!(err, PbacError::PolicyNotFound(7)));
}
