use std::collections::VecDeque;

use hashbrown::HashMap;

use super::{CallQueues, Interpreter};
use crate::{
    builder::{CircuitBuilder, MockCircuitBuilder, Role, Sharing, WireHandle},
    clear::ClearBuilder,
    program::parse_share_map,
    InterpreterError,
};

type TestInterpreter = Interpreter<ClearBuilder, HashMap<String, String>>;

fn functions(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(name, source)| (name.to_string(), source.to_string()))
        .collect()
}

fn params(entries: &[(&str, u32)]) -> HashMap<String, u32> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

/// will setup an interpreter over in-memory bytecode with a fresh
/// cleartext backend
fn setup(
    funcs: &[(&str, &str)],
    share_map: &str,
    inputs: &[(&str, u32)],
    role: Role,
) -> TestInterpreter {
    setup_with(ClearBuilder::new(), funcs, share_map, inputs, role)
}

fn setup_with(
    builder: ClearBuilder,
    funcs: &[(&str, &str)],
    share_map: &str,
    inputs: &[(&str, u32)],
    role: Role,
) -> TestInterpreter {
    Interpreter::new(
        builder,
        functions(funcs),
        parse_share_map(share_map).expect("share map parses"),
        params(inputs),
        role,
    )
}

/// Drives `main` and reads back the declassified values.
fn run_main(interpreter: &mut TestInterpreter) -> Vec<u32> {
    let mut queues = CallQueues::root();
    let handles = interpreter
        .process_function("main", &mut queues)
        .expect("main processes");
    interpreter.execute().expect("execution succeeds");
    handles
        .iter()
        .map(|handle| interpreter.builder().clear_value(*handle))
        .collect()
}

const ADDER: &str = "0 1 a 0 1 IN\n0 1 b 1 1 IN\n2 1 a b r ADD\n1 0 r OUT";

#[test]
fn adds_private_inputs_as_server() {
    let mut builder = ClearBuilder::new();
    builder.seed_counterparty(4);
    let mut interpreter = setup_with(
        builder,
        &[("main", ADDER)],
        "a a\nb a\nr a",
        &[("a", 3), ("b", 4)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![7]);
}

#[test]
fn adds_private_inputs_as_client() {
    let mut builder = ClearBuilder::new();
    builder.seed_counterparty(3);
    let mut interpreter = setup_with(
        builder,
        &[("main", ADDER)],
        "a a\nb a\nr a",
        &[("a", 3), ("b", 4)],
        Role::Client,
    );
    assert_eq!(run_main(&mut interpreter), vec![7]);
}

#[test]
fn coincident_mux_branches_emit_no_gates() {
    let main = "0 1 s 0 1 IN\n0 1 x 0 1 IN\n3 1 s x x o MUX\n1 0 o OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "s b\nx b\no b",
        &[("s", 1), ("x", 5)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![5]);
    assert_eq!(interpreter.builder().gate_count(), 0);
    assert_eq!(interpreter.builder().conversion_count(), 0);
}

#[test]
fn mux_fans_out_per_slot() {
    let main = "0 1 s 0 1 IN\n0 1 t0 0 1 IN\n0 1 t1 0 1 IN\n0 1 f0 0 1 IN\n0 1 f1 0 1 IN\n\
                5 2 s t0 t1 f0 f1 o0 o1 MUX\n1 0 o0 OUT\n1 0 o1 OUT";
    let share = "s b\nt0 b\nt1 b\nf0 b\nf1 b\no0 b\no1 b";
    let picks_false = setup(
        &[("main", main)],
        share,
        &[("s", 0), ("t0", 1), ("t1", 2), ("f0", 3), ("f1", 4)],
        Role::Server,
    );
    let picks_true = setup(
        &[("main", main)],
        share,
        &[("s", 1), ("t0", 1), ("t1", 2), ("f0", 3), ("f1", 4)],
        Role::Server,
    );
    for (mut interpreter, expected) in
        [(picks_false, vec![3, 4]), (picks_true, vec![1, 2])]
    {
        assert_eq!(run_main(&mut interpreter), expected);
    }
}

#[test]
fn straddled_sharings_convert_exactly_once_per_operand() {
    let main = "0 1 a 0 1 IN\n0 1 b 0 1 IN\n2 1 a b c MUL\n2 1 a b d ADD\n\
                1 0 c OUT\n1 0 d OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "a a\nb a\nc y\nd y",
        &[("a", 6), ("b", 7)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![42, 13]);
    // one A→Y gate per operand at the MUL, reused by the ADD
    assert_eq!(interpreter.builder().conversion_count(), 2);
}

#[test]
fn conversion_requests_are_idempotent() {
    let mut interpreter = setup(&[], "", &[], Role::Server);
    let source = interpreter.builder.constant(Sharing::Arith, 5, 32);
    interpreter.created(source, Sharing::Arith);

    assert_eq!(interpreter.convert(source, Sharing::Arith).unwrap(), source);
    assert_eq!(interpreter.convert(source, Sharing::Arith).unwrap(), source);

    let yao_first = interpreter.convert(source, Sharing::Yao).unwrap();
    let yao_again = interpreter.convert(source, Sharing::Yao).unwrap();
    assert_eq!(yao_first, yao_again);
    assert_ne!(yao_first, source);

    interpreter.convert(source, Sharing::Bool).unwrap();
    interpreter.convert(source, Sharing::Bool).unwrap();
    assert_eq!(interpreter.builder().conversion_count(), 2);
}

fn select_program(n: usize) -> (String, String) {
    let mut main = String::new();
    let mut share = String::new();
    for cell in 0..n {
        main.push_str(&format!("0 1 x{} 0 1 IN\n", cell));
        share.push_str(&format!("x{} b\n", cell));
    }
    main.push_str("0 1 idx 0 1 IN\n");
    share.push_str("idx b\nr b\n");
    let cells: Vec<String> = (0..n).map(|cell| format!("x{}", cell)).collect();
    main.push_str(&format!(
        "{} 1 {} idx r SELECT\n1 0 r OUT",
        n + 1,
        cells.join(" ")
    ));
    (main, share)
}

#[test]
fn select_reads_the_indexed_cell() {
    let (main, share) = select_program(4);
    let inputs = [
        ("x0", 10),
        ("x1", 20),
        ("x2", 30),
        ("x3", 40),
        ("idx", 2),
    ];
    let mut interpreter = setup(&[("main", &main)], &share, &inputs, Role::Server);
    assert_eq!(run_main(&mut interpreter), vec![30]);
}

#[test]
fn select_matches_the_linear_chain_for_every_index() {
    // the tournament must agree with a[idx] for ragged and full trees
    for n in [1usize, 2, 3, 5, 8, 11] {
        let (main, share) = select_program(n);
        for index in 0..n {
            let mut inputs: Vec<(String, u32)> = (0..n)
                .map(|cell| (format!("x{}", cell), (cell as u32 + 1) * 11))
                .collect();
            inputs.push(("idx".to_string(), index as u32));
            let borrowed: Vec<(&str, u32)> = inputs
                .iter()
                .map(|(name, value)| (name.as_str(), *value))
                .collect();
            let mut interpreter =
                setup(&[("main", &main)], &share, &borrowed, Role::Server);
            assert_eq!(
                run_main(&mut interpreter),
                vec![(index as u32 + 1) * 11],
                "n = {}, idx = {}",
                n,
                index
            );
        }
    }
}

#[test]
fn select_is_rejected_in_the_arithmetic_sharing() {
    let (main, _) = select_program(2);
    let mut interpreter = setup(
        &[("main", &main)],
        "x0 a\nx1 a\nidx a\nr a",
        &[("x0", 1), ("x1", 2), ("idx", 0)],
        Role::Server,
    );
    let mut queues = CallQueues::root();
    assert!(matches!(
        interpreter.process_function("main", &mut queues),
        Err(InterpreterError::ArithUnsupported("SELECT"))
    ));
}

#[test]
fn store_replaces_exactly_the_indexed_cell() {
    let main = "0 1 x0 0 1 IN\n0 1 x1 0 1 IN\n0 1 x2 0 1 IN\n0 1 x3 0 1 IN\n\
                0 1 idx 0 1 IN\n0 1 v 0 1 IN\n\
                6 4 x0 x1 x2 x3 idx v y0 y1 y2 y3 STORE\n\
                1 0 y0 OUT\n1 0 y1 OUT\n1 0 y2 OUT\n1 0 y3 OUT";
    let share = "x0 b\nx1 b\nx2 b\nx3 b\nidx b\nv b\ny0 b\ny1 b\ny2 b\ny3 b";
    let inputs = [
        ("x0", 1),
        ("x1", 2),
        ("x2", 3),
        ("x3", 4),
        ("idx", 1),
        ("v", 99),
    ];
    let mut interpreter = setup(&[("main", main)], share, &inputs, Role::Server);
    assert_eq!(run_main(&mut interpreter), vec![1, 99, 3, 4]);
}

const CALLEE: &str = "0 1 fx 0 1 IN\n0 1 fy 0 1 IN\n2 1 fx fy fs ADD\n1 0 fs OUT";
const CALL_SHARE: &str = "a a\nb a\nz a\nfx a\nfy a\nfs a";

#[test]
fn call_rewires_arguments_and_returns() {
    let main = "0 1 a 0 1 IN\n0 1 b 0 1 IN\n2 1 a b z CALL(f)\n1 0 z OUT";
    let mut interpreter = setup(
        &[("main", main), ("f", CALLEE)],
        CALL_SHARE,
        &[("a", 2), ("b", 5)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![7]);
    // the callee consumed raw caller handles, so no extra inputs exist
    assert_eq!(interpreter.builder().input_count(), 2);
}

#[test]
fn call_with_too_few_arguments_underflows() {
    let main = "0 1 a 0 1 IN\n1 1 a z CALL(f)\n1 0 z OUT";
    let mut interpreter = setup(
        &[("main", main), ("f", CALLEE)],
        CALL_SHARE,
        &[("a", 2)],
        Role::Server,
    );
    let mut queues = CallQueues::root();
    assert!(matches!(
        interpreter.process_function("main", &mut queues),
        Err(InterpreterError::ArgUnderflow)
    ));
}

#[test]
fn call_with_unreturned_names_is_fatal() {
    let silent = "0 1 fx 0 1 IN\n0 1 fy 0 1 IN\n2 1 fx fy fs ADD";
    let main = "0 1 a 0 1 IN\n0 1 b 0 1 IN\n2 1 a b z CALL(f)\n1 0 z OUT";
    let mut interpreter = setup(
        &[("main", main), ("f", silent)],
        CALL_SHARE,
        &[("a", 2), ("b", 5)],
        Role::Server,
    );
    let mut queues = CallQueues::root();
    match interpreter.process_function("main", &mut queues) {
        Err(InterpreterError::CallArity {
            function,
            args,
            rets,
        }) => {
            assert_eq!(function, "f");
            assert_eq!(args, 0);
            assert_eq!(rets, 1);
        }
        other => panic!("expected a call arity fault, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn preamble_constant_drives_the_mul_rewrite() {
    let main = "0 1 x 0 1 IN\n2 1 c x p MUL\n1 0 p OUT";
    let mut rewritten = setup(
        &[("main", main)],
        "c b\nx b\np b",
        &[("x", 7)],
        Role::Server,
    );
    rewritten.preamble("0 1 c 12 32 CONS").unwrap();
    assert_eq!(run_main(&mut rewritten), vec![84]);

    // same product through the generic multiplier: the constant comes
    // from the function body, so the rewrite never sees it
    let inline = "0 1 c 12 32 CONS\n0 1 x 0 1 IN\n2 1 c x p MUL\n1 0 p OUT";
    let mut generic = setup(
        &[("main", inline)],
        "c b\nx b\np b",
        &[("x", 7)],
        Role::Server,
    );
    assert_eq!(run_main(&mut generic), vec![84]);
}

#[test]
fn mul_with_two_constants_stays_generic() {
    let main = "2 1 c1 c2 p MUL\n1 0 p OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "c1 b\nc2 b\np b",
        &[],
        Role::Server,
    );
    interpreter
        .preamble("0 1 c1 6 32 CONS\n0 1 c2 7 32 CONS")
        .unwrap();
    assert_eq!(run_main(&mut interpreter), vec![42]);
}

#[test]
fn yao_constants_are_built_boolean_and_routed_on_demand() {
    let main = "0 1 x 0 1 IN\n2 1 x k m ADD\n1 0 m OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "k y\nx y\nm y",
        &[("x", 37)],
        Role::Server,
    );
    interpreter.preamble("0 1 k 5 32 CONS").unwrap();
    assert_eq!(run_main(&mut interpreter), vec![42]);
    // the constant and the input both entered through the boolean
    // circuit and crossed into Yao exactly once each
    assert_eq!(interpreter.builder().conversion_count(), 2);
}

#[test]
fn division_comparisons_and_shifts_lower_through_bit_logic() {
    let main = "0 1 a 0 1 IN\n0 1 b 0 1 IN\n\
                2 1 a b q DIV\n2 1 a b m REM\n\
                2 1 a b g GT\n2 1 a b l LT\n2 1 a b ge GE\n2 1 a b le LE\n\
                1 1 a s 3 SHL\n2 1 a 2 t LSHR\n\
                1 0 q OUT\n1 0 m OUT\n1 0 g OUT\n1 0 l OUT\n\
                1 0 ge OUT\n1 0 le OUT\n1 0 s OUT\n1 0 t OUT";
    let share = "a b\nb b\nq b\nm b\ng b\nl b\nge b\nle b\ns b\nt b";
    let mut interpreter = setup(
        &[("main", main)],
        share,
        &[("a", 100), ("b", 9)],
        Role::Server,
    );
    assert_eq!(
        run_main(&mut interpreter),
        vec![11, 1, 1, 0, 1, 0, 800, 25]
    );
}

#[test]
fn division_is_rejected_in_the_arithmetic_sharing() {
    let main = "0 1 a 0 1 IN\n0 1 b 0 1 IN\n2 1 a b q DIV\n1 0 q OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "a a\nb a\nq a",
        &[("a", 8), ("b", 2)],
        Role::Server,
    );
    let mut queues = CallQueues::root();
    assert!(matches!(
        interpreter.process_function("main", &mut queues),
        Err(InterpreterError::ArithUnsupported("DIV"))
    ));
}

#[test]
fn odd_cons_widths_are_fatal() {
    let mut interpreter = setup(&[], "c b", &[], Role::Server);
    assert!(matches!(
        interpreter.preamble("0 1 c 5 8 CONS"),
        Err(InterpreterError::ConsWidth(8))
    ));
}

#[test]
fn public_inputs_become_constants() {
    let main = "0 1 p 2 32 IN\n0 1 x 0 1 IN\n2 1 p x r ADD\n1 0 r OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "p b\nx b\nr b",
        &[("p", 30), ("x", 12)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![42]);
    // the public value is a constant, not an input gate
    assert_eq!(interpreter.builder().input_count(), 1);
}

#[test]
fn unbound_wires_are_fatal() {
    let main = "2 1 nope nada r ADD\n1 0 r OUT";
    let mut interpreter = setup(&[("main", main)], "r a", &[], Role::Server);
    let mut queues = CallQueues::root();
    assert!(matches!(
        interpreter.process_function("main", &mut queues),
        Err(InterpreterError::UnboundWire(_))
    ));
}

#[test]
fn lines_without_share_map_anchors_are_skipped() {
    // `ghost` has no sharing assigned, so its instruction vanishes and
    // `r` never materialises
    let main = "0 1 ghost 0 1 IN\n0 1 x 0 1 IN\n1 0 x OUT";
    let mut interpreter = setup(
        &[("main", main)],
        "x b",
        &[("x", 9)],
        Role::Server,
    );
    assert_eq!(run_main(&mut interpreter), vec![9]);
}

#[test]
fn skipped_callee_input_still_consumes_an_argument() {
    // a mock backend asserts no gate is emitted while the argument
    // queue is drained for positional alignment
    let mock = MockCircuitBuilder::new();
    let mut interpreter: Interpreter<MockCircuitBuilder, HashMap<String, String>> =
        Interpreter::new(
            mock,
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            Role::Server,
        );
    let args = VecDeque::from(vec![WireHandle(7)]);
    let mut queues = CallQueues::nested(args, VecDeque::new());
    interpreter
        .process_source("0 1 ghost 0 1 IN", &mut queues)
        .unwrap();
    assert!(queues.args.is_empty());
}
