//! End-to-end runs of the bundled templates through the host emulator.
//!
//! The emulator traces each buffer's address to the loads and stores that
//! use it and checks stride and width against that buffer's own element
//! type, so a passing full matrix also shows that kernel addressing agrees
//! with element types for every point.

mod common;

use ptx_difftest::codegen;
use ptx_difftest::config::RunConfig;
use ptx_difftest::matrix::{MatrixBuilder, Selection};
use ptx_difftest::oracle::Oracle;
use ptx_difftest::registry::{OperationClass, BUILTIN_OPERATIONS};
use ptx_difftest::report::{format_json, Outcome};
use ptx_difftest::runner::Runner;
use ptx_difftest::template::{Template, TemplateStore};

#[test]
fn full_matrix_passes_on_emulator() {
    let report = common::run(common::emulator(), common::config(), Selection::all());
    assert!(
        report.all_passed(),
        "{}",
        ptx_difftest::report::format_text(&report, false)
    );
    assert_eq!(report.summary.by_template.len(), 6);
    // every catalogued mnemonic is exercised somewhere
    for op in BUILTIN_OPERATIONS {
        assert!(report.summary.by_operation.contains_key(op.mnemonic), "{}", op.mnemonic);
    }
}

#[test]
fn results_are_in_matrix_order() {
    let report = common::run(common::emulator(), common::config(), common::templates(&["arith", "bfi"]));
    let keys: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.point.template.clone(), r.point.index))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn identical_seeds_give_identical_runs() {
    let a = common::run(common::emulator(), common::config(), common::templates(&["ternary"]));
    let b = common::run(common::emulator(), common::config(), common::templates(&["ternary"]));
    assert_eq!(format_json(&a).unwrap(), format_json(&b).unwrap());
}

#[test]
fn identical_seeds_give_identical_kernels_and_oracle_outputs() {
    let reg = common::registry();
    let store = common::store();
    let oracle = Oracle::new(&reg);
    let options = common::config().matrix_options();
    for t in store.iter() {
        let first: Vec<_> = MatrixBuilder::new(&reg, t, options).points().collect();
        let again: Vec<_> = MatrixBuilder::new(&reg, t, options).points().collect();
        for (p, q) in first.iter().zip(&again) {
            assert_eq!(codegen::expand(t, p).unwrap(), codegen::expand(t, q).unwrap());
            assert_eq!(oracle.expected_output(p).unwrap(), oracle.expected_output(q).unwrap());
        }
    }
}

#[test]
fn different_seeds_change_random_inputs() {
    let reg = common::registry();
    let store = common::store();
    let t = store.get("arith").unwrap();
    let a = common::config().matrix_options();
    let b = RunConfig {
        seed: 99,
        ..common::config()
    }
    .matrix_options();
    let p = MatrixBuilder::new(&reg, t, a).points().next().unwrap();
    let q = MatrixBuilder::new(&reg, t, b).points().next().unwrap();
    assert_eq!(p.name, q.name);
    assert_ne!(p.inputs, q.inputs);
}

#[test]
fn signed_extract_known_answer_through_pipeline() {
    let sel = Selection::all().with_filter("^bfe/bfe.s32/p28_l4$").unwrap();
    let report = common::run(common::emulator(), common::config(), sel);
    assert_eq!(report.results.len(), 1);
    let r = &report.results[0];
    assert_eq!(r.outcome, Outcome::Pass);
    let expected = r.expected.as_ref().unwrap();
    let reg = common::registry();
    let store = common::store();
    let t = store.get("bfe").unwrap();
    let point = MatrixBuilder::new(&reg, t, common::config().matrix_options())
        .with_selection(Selection::all().with_filter("^bfe/bfe.s32/p28_l4$").unwrap())
        .points()
        .next()
        .unwrap();
    let i = point.inputs[0].data.iter().position(|&v| v == 0x8000_0000).unwrap();
    // field 0b1000 sign-extends to -8
    assert_eq!(expected.data[i], 0xFFFF_FFF8);
}

#[test]
fn zero_length_fields_yield_zero_and_leave_base() {
    let sel = Selection::all().with_filter("_l0$").unwrap();
    let report = common::run(common::emulator(), common::config(), sel);
    assert!(report.summary.total > 0);
    assert!(report.all_passed());
    for r in &report.results {
        let expected = r.expected.as_ref().unwrap();
        if r.point.template == "bfe" {
            assert!(expected.data.iter().all(|&v| v == 0), "{}", r.point.name);
        }
    }
}

#[test]
fn zero_length_fields_can_be_disabled() {
    let cfg = RunConfig {
        zero_length_bit_fields: false,
        ..common::config()
    };
    let sel = Selection::all().with_filter("_l0$").unwrap();
    let report = common::run(common::emulator(), cfg, sel);
    assert_eq!(report.summary.total, 0);
}

#[test]
fn every_bit_field_class_point_carries_a_field() {
    let report = common::run(common::emulator(), common::config(), common::templates(&["bfe", "bfi"]));
    let reg = common::registry();
    for r in &report.results {
        assert!(r.point.bit_field.is_some(), "{}", r.point.name);
    }
    let extract_types = reg.types_for(OperationClass::BitFieldExtract).len();
    assert!(report.summary.by_type.len() >= extract_types);
}

#[test]
fn shift_amount_addressed_with_value_type_fails() {
    let shift = common::store().get("shift").unwrap().clone();
    let text = shift
        .text
        .replace("<SHIFT_TYPE_SIZE>", "<TYPE_SIZE>")
        .replace("ld.global.<SHIFT_BTYPE>", "ld.global.<BTYPE>");
    assert_ne!(text, shift.text);
    let swapped = Template::new(shift.id.clone(), shift.entry.clone(), shift.class, text);
    let store = TemplateStore::new(vec![swapped]).unwrap();

    let reg = common::registry();
    let report = Runner::new(&reg, common::emulator(), common::config())
        .run(&store)
        .unwrap();
    assert!(report.summary.total > 0);
    for r in &report.results {
        // only 32-bit values share the shift amount's layout
        if r.point.ty.ends_with("32") {
            assert!(r.passed(), "{}", r.point.name);
        } else {
            assert!(
                matches!(&r.outcome, Outcome::ExecutionFailure { reason } if reason.contains("input_b")),
                "{}: {:?}",
                r.point.name,
                r.outcome
            );
        }
    }
}
