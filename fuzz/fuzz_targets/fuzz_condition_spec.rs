#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pbac::{Address, ConditionSpec, MemoryLedger, Pbac};
use std::sync::Arc;

#[derive(Arbitrary, Debug)]
struct Input {
    contract_address: String,
    standard_type: String,
    chain: String,
    method: String,
    parameters: Vec<String>,
    comparator: String,
    value: String,
}

// Arbitrary condition literals must either be rejected or stored intact,
// never panic or leave a half-written record
fuzz_target!(|input: Input| {
    let spec = ConditionSpec {
        contract_address: input.contract_address,
        standard_type: input.standard_type,
        chain: input.chain,
        method: input.method,
        parameters: input.parameters,
        comparator: input.comparator,
        value: input.value,
    };

    let owner = Address::repeat_byte(0x01);
    let pbac = Pbac::with_oracle(Arc::new(MemoryLedger::new()));
    let policy = match pbac.create_policy(owner, "fuzz", "doc", "read") {
        Ok(id) => id,
        Err(_) => return,
    };

    let compiled = spec.compile();
    match pbac.add_condition(owner, policy, spec.clone()) {
        Ok(id) => {
            assert!(compiled.is_ok());
            let stored = pbac.condition(id).unwrap();
            assert_eq!(stored.parameters, spec.parameters);
            assert_eq!(stored.value, spec.value);
        }
        Err(_) => {
            assert!(compiled.is_err());
            assert_eq!(pbac.condition_count(), 0);
        }
    }
});
