//! Property-based tests for registry and comparison invariants
//!
//! Uses proptest to verify id allocation, condition ordering and numeric
//! comparisons across many random scenarios

use pbac::{Address, Comparator, ConditionSpec, MemoryLedger, Pbac, U256};
use proptest::prelude::*;
use std::sync::Arc;

fn owner() -> Address {
    Address::repeat_byte(0x0f)
}

fn pbac() -> Pbac {
    Pbac::with_oracle(Arc::new(MemoryLedger::new()))
}

fn comparator() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("=="),
        Just("!="),
        Just(">"),
        Just("<"),
        Just(">="),
        Just("<="),
    ]
}

proptest! {
    #[test]
    fn prop_policy_count_tracks_creations(
        fields in prop::collection::vec(("[a-z]{0,3}", "[a-z]{0,3}", "[a-z]{0,3}"), 1..40)
    ) {
        let pbac = pbac();
        let mut expected = 0u64;

        for (name, resource, action) in &fields {
            let result = pbac.create_policy(owner(), name, resource, action);
            if name.is_empty() || resource.is_empty() || action.is_empty() {
                prop_assert!(result.is_err());
            } else {
                prop_assert_eq!(result.unwrap(), expected);
                expected += 1;
            }
            prop_assert_eq!(pbac.policy_count(), expected);
        }
    }

    #[test]
    fn prop_add_then_remove_restores_condition_list(
        initial in 0usize..8,
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..8)
    ) {
        let pbac = pbac();
        let policy = pbac.create_policy(owner(), "p", "doc", "read").unwrap();

        let mut expected = Vec::new();
        for i in 0..initial {
            let id = pbac
                .add_condition(owner(), policy, ConditionSpec::native_balance(">=", &i.to_string()))
                .unwrap();
            expected.push(id);
        }

        let before = pbac.policy_condition_ids(policy).unwrap();
        let added = pbac
            .add_condition(owner(), policy, ConditionSpec::native_balance(">", "0"))
            .unwrap();
        pbac.remove_condition(owner(), policy, added).unwrap();
        prop_assert_eq!(pbac.policy_condition_ids(policy).unwrap(), before);

        for index in removals {
            if expected.is_empty() {
                break;
            }
            let victim = expected.remove(index.index(expected.len()));
            pbac.remove_condition(owner(), policy, victim).unwrap();
            prop_assert_eq!(pbac.policy_condition_ids(policy).unwrap(), expected.clone());
        }
        prop_assert_eq!(pbac.condition_count(), expected.len());
    }

    #[test]
    fn prop_comparators_match_integer_ordering(
        observed in any::<u128>(),
        target in any::<u128>(),
        op in comparator()
    ) {
        let comparator = Comparator::parse(op).unwrap();
        let observed = U256::from(observed);
        let target = U256::from(target);

        let expected = match op {
            "==" => observed == target,
            "!=" => observed != target,
            ">" => observed > target,
            "<" => observed < target,
            ">=" => observed >= target,
            _ => observed <= target,
        };
        prop_assert_eq!(comparator.compare(&observed, &target), expected);
    }

    #[test]
    fn prop_decimal_and_hex_targets_agree(value in any::<u128>()) {
        let decimal = ConditionSpec::native_balance(">=", &value.to_string()).compile().unwrap();
        let hex = ConditionSpec::native_balance(">=", &format!("{:#x}", value)).compile().unwrap();
        prop_assert_eq!(decimal.target, hex.target);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_native_threshold_decides_access(balance in any::<u64>(), threshold in any::<u64>()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ledger = Arc::new(MemoryLedger::new());
        let pbac = Pbac::with_oracle(ledger.clone());
        let user = Address::repeat_byte(0x55);

        let policy = pbac.create_policy(owner(), "threshold", "doc", "read").unwrap();
        pbac.add_condition(owner(), policy, ConditionSpec::native_balance(">=", &threshold.to_string()))
            .unwrap();
        ledger.set_native_balance(user, U256::from(balance));

        let granted = runtime.block_on(pbac.check_access(user, "doc", "read"));
        prop_assert_eq!(granted, balance >= threshold);
    }
}
