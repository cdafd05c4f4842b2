#![no_main]

use libfuzzer_sys::fuzz_target;
use tq_frame::Table;
use tq_ops::{Operation, apply, apply_with_ledger};
use tq_runtime::{ExecutionLedger, QueryOutcome};

const SEED_CSV: &str = "\
region,amt,name
west,100,Ann
east,40,bob
west,25.5,
north,n/a,Dee
,80,Eve
";

// Input is `<csv>\0<operation json>`; without a separator the whole input is
// the operation and a fixed table is used.
fuzz_target!(|data: &[u8]| {
    let (csv, op_bytes) = match data.iter().position(|b| *b == 0) {
        Some(split) => (&data[..split], &data[split + 1..]),
        None => (SEED_CSV.as_bytes(), data),
    };

    let Ok(table) = tq_io::read_csv_bytes(csv) else {
        return;
    };
    let Ok(raw) = serde_json::from_slice::<serde_json::Value>(op_bytes) else {
        return;
    };
    let operation = Operation::from_json(raw);

    let before: Table = table.clone();
    let mut ledger = ExecutionLedger::new();
    let out = apply_with_ledger(&table, &operation, &mut ledger);

    assert_eq!(table, before, "apply must not mutate its input");
    // NaN cells compare unequal, so determinism is checked on the JSON form.
    let rendered = serde_json::to_string(&out).expect("tables always serialize");
    let again = serde_json::to_string(&apply(&table, &operation)).expect("tables always serialize");
    assert_eq!(rendered, again, "apply must be deterministic");

    let uninterpretable = ledger.classify(out.len()) == QueryOutcome::Uninterpretable;
    if uninterpretable && !matches!(operation, Operation::Pipeline(_)) {
        assert!(out.is_empty());
    }

    let _ = tq_io::write_csv_string(&out);
});
