//! The main interface out of the crate.
//!
//! Wires the pieces together the way the command line does: constants
//! preamble, `main` invocation, circuit execution and the declassified
//! print-out, with the timing lines around them.
use std::time::Instant;

use hashbrown::HashMap;

use crate::{
    builder::{CircuitBuilder, Recipient, Role},
    definitions::program::ENTRY,
    interp::{CallQueues, Interpreter},
    program::ProgramDir,
    InterpreterError,
};

/// Interprets a program directory against the given backend and prints
/// the declassified outputs this role may see. Returns those values for
/// callers that embed the interpreter.
pub fn run<B: CircuitBuilder>(
    builder: B,
    program: ProgramDir,
    params: HashMap<String, u32>,
    role: Role,
) -> Result<Vec<u32>, InterpreterError> {
    let start = Instant::now();

    let share_map = program.share_map()?;
    let constants = program.constants()?;
    let mut interpreter = Interpreter::new(builder, program, share_map, params, role);

    if let Some(source) = constants {
        interpreter.preamble(&source)?;
    }

    let mut queues = CallQueues::root();
    let returned = interpreter.process_function(ENTRY, &mut queues)?;
    if returned.is_empty() {
        return Err(InterpreterError::NoOutput(ENTRY.to_string()));
    }
    for handle in returned {
        interpreter.enqueue_output(handle, Recipient::All);
    }
    println!("LOG: {} load time: {}", role, start.elapsed().as_secs_f64());

    let exec_start = Instant::now();
    interpreter.execute()?;
    println!("LOG: {} exec time: {}", role, exec_start.elapsed().as_secs_f64());
    println!("LOG: {} total time: {}", role, start.elapsed().as_secs_f64());

    let values = interpreter.declassified();
    for value in &values {
        println!("{}", value);
    }
    Ok(values)
}
