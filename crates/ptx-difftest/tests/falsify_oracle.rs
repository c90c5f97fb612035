//! Mutation detection: a wrong reference semantic for one operation must
//! fail exactly the points that use that operation, and a device that
//! gets one opcode wrong must fail exactly that opcode's point.

mod common;

use ptx_difftest::driver::EmulatorDriver;
use ptx_difftest::matrix::Selection;
use ptx_difftest::oracle::Oracle;
use ptx_difftest::registry::{OpKind, OperationClass};
use ptx_difftest::report::Outcome;
use std::sync::Arc;

fn template_for(class: OperationClass) -> &'static str {
    match class {
        OperationClass::Binary => "arith",
        OperationClass::Unary => "unary",
        OperationClass::Ternary => "ternary",
        OperationClass::Shift => "shift",
        OperationClass::BitFieldExtract => "bfe",
        OperationClass::BitFieldInsert => "bfi",
    }
}

fn assert_only_kind_fails(kind: OpKind) {
    let reg = common::registry();
    let op = *reg.operation(kind).unwrap();
    let oracle = Oracle::new(&reg).with_override(kind, |_, ops, _| ops[0].wrapping_add(1));
    let report = common::run_with_oracle(oracle, common::templates(&[template_for(op.class)]));
    assert!(report.summary.total > 0);
    for r in &report.results {
        let uses_op = r.point.operation == op.mnemonic;
        assert_eq!(
            !r.passed(),
            uses_op,
            "{}: {:?}",
            r.point.name,
            r.outcome.label()
        );
        if uses_op {
            assert!(matches!(r.outcome, Outcome::Mismatch { .. }), "{}", r.point.name);
        }
    }
}

macro_rules! mutation_test {
    ($name:ident, $kind:expr) => {
        #[test]
        fn $name() {
            assert_only_kind_fails($kind);
        }
    };
}

mutation_test!(mutated_add_detected, OpKind::Add);
mutation_test!(mutated_sub_detected, OpKind::Sub);
mutation_test!(mutated_mul_lo_detected, OpKind::MulLo);
mutation_test!(mutated_mul_rn_detected, OpKind::Mul);
mutation_test!(mutated_min_detected, OpKind::Min);
mutation_test!(mutated_max_detected, OpKind::Max);
mutation_test!(mutated_and_detected, OpKind::And);
mutation_test!(mutated_or_detected, OpKind::Or);
mutation_test!(mutated_xor_detected, OpKind::Xor);
mutation_test!(mutated_neg_detected, OpKind::Neg);
mutation_test!(mutated_not_detected, OpKind::Not);
mutation_test!(mutated_brev_detected, OpKind::Brev);
mutation_test!(mutated_mad_detected, OpKind::Mad);
mutation_test!(mutated_fma_detected, OpKind::Fma);
mutation_test!(mutated_shl_detected, OpKind::Shl);
mutation_test!(mutated_shr_detected, OpKind::Shr);
mutation_test!(mutated_bfe_detected, OpKind::Bfe);
mutation_test!(mutated_bfi_detected, OpKind::Bfi);

#[test]
fn faulty_device_opcode_is_isolated() {
    let driver = Arc::new(common::FaultyDriver {
        inner: EmulatorDriver::new(common::registry()),
        opcode: "xor.b32",
    });
    let report = common::run(driver, common::config(), common::templates(&["arith"]));
    let failed: Vec<_> = report.failures().map(|r| r.point.name.as_str()).collect();
    assert_eq!(failed, vec!["arith/xor.b32"]);
    let Outcome::Mismatch { total, elements } = &report.failures().next().unwrap().outcome else {
        panic!("expected a mismatch");
    };
    assert_eq!(*total, 1);
    assert_eq!(elements[0].index, 0);
    assert_eq!(elements[0].inputs.len(), 2);
}

#[test]
fn failure_detail_reproduces_the_point() {
    let driver = Arc::new(common::FaultyDriver {
        inner: EmulatorDriver::new(common::registry()),
        opcode: "min.s16",
    });
    let sel = Selection::all().with_filter("^arith/min").unwrap();
    let report = common::run(driver, common::config(), sel);
    let r = report.failures().next().unwrap();
    assert_eq!(r.point.opcode, "min.s16");
    assert_eq!(r.point.ty, "s16");
    assert_eq!(r.point.template, "arith");
    assert_eq!(r.point.seed, ptx_difftest::matrix::point_seed(0, "arith/min.s16"));
}
