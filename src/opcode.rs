//! Opcode abstractions and the instruction-line lexer.
use hashbrown::HashMap;
use once_cell::sync::Lazy;

use crate::{definitions::program, InterpreterError};

/// The operators a bytecode line may carry. `Call` keeps the callee name
/// captured from the `CALL(<name>)` atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Lshr,
    Cons,
    Mux,
    Select,
    Store,
    In,
    Out,
    Call(String),
}

/// Lookup table from the opcode atom to the operator. `CALL` is not in
/// here, as its atom embeds the callee name.
static OP_TABLE: Lazy<HashMap<&'static str, Op>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("ADD", Op::Add);
    table.insert("SUB", Op::Sub);
    table.insert("MUL", Op::Mul);
    table.insert("DIV", Op::Div);
    table.insert("REM", Op::Rem);
    table.insert("EQ", Op::Eq);
    table.insert("GT", Op::Gt);
    table.insert("LT", Op::Lt);
    table.insert("GE", Op::Ge);
    table.insert("LE", Op::Le);
    table.insert("AND", Op::And);
    table.insert("OR", Op::Or);
    table.insert("XOR", Op::Xor);
    table.insert("NOT", Op::Not);
    table.insert("SHL", Op::Shl);
    table.insert("LSHR", Op::Lshr);
    table.insert("CONS", Op::Cons);
    table.insert("MUX", Op::Mux);
    table.insert("SELECT", Op::Select);
    table.insert("STORE", Op::Store);
    table.insert("IN", Op::In);
    table.insert("OUT", Op::Out);
    table
});

impl Op {
    /// Parses an opcode atom. A `CALL` atom is recognised by substring and
    /// the callee name is captured between the parentheses.
    pub fn parse(atom: &str) -> Result<Self, InterpreterError> {
        if atom.contains("CALL") {
            let open = atom.find('(');
            let close = atom.rfind(')');
            return match (open, close) {
                (Some(open), Some(close)) if open + 1 <= close => {
                    Ok(Op::Call(atom[open + 1..close].to_string()))
                }
                _ => Err(InterpreterError::BadCallTarget(atom.to_string())),
            };
        }
        OP_TABLE
            .get(atom)
            .cloned()
            .ok_or_else(|| InterpreterError::UnknownOp(atom.to_string()))
    }

    /// Whether the operator takes two input wires and yields one output.
    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Rem
                | Op::Eq
                | Op::Gt
                | Op::Lt
                | Op::Ge
                | Op::Le
                | Op::And
                | Op::Or
                | Op::Xor
        )
    }
}

/// One lexed bytecode line.
///
/// The line shape is `n_in n_out (in)* (out)* ... OP`: the opcode is the
/// final token, and any tokens between the declared outputs and the opcode
/// are literal operands (`extras`). Historical emitters also pass literals
/// inside the input list, so both positions are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub extras: Vec<String>,
    pub op: Op,
}

/// Parses a literal integer operand. Negative literals wrap to the 32-bit
/// two's-complement pattern.
pub(crate) fn parse_literal(token: &str) -> Result<u32, InterpreterError> {
    token
        .parse::<i64>()
        .map(|v| v as u32)
        .map_err(|_| InterpreterError::BadLiteral(token.to_string()))
}

/// Tokenises a single bytecode line. Returns `None` for lines too short to
/// hold an instruction.
pub fn lex_line(line: &str) -> Result<Option<Instruction>, InterpreterError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < program::MIN_TOKENS {
        return Ok(None);
    }

    let n_in = parse_literal(tokens[0])? as usize;
    let n_out = parse_literal(tokens[1])? as usize;
    // 2 count tokens, the declared wires and the trailing opcode atom
    if tokens.len() < 2 + n_in + n_out + 1 {
        return Err(InterpreterError::MalformedLine(line.to_string()));
    }

    let inputs = tokens[2..2 + n_in].iter().map(|t| t.to_string()).collect();
    let outputs = tokens[2 + n_in..2 + n_in + n_out]
        .iter()
        .map(|t| t.to_string())
        .collect();
    let extras = tokens[2 + n_in + n_out..tokens.len() - 1]
        .iter()
        .map(|t| t.to_string())
        .collect();
    let op = Op::parse(tokens[tokens.len() - 1])?;

    Ok(Some(Instruction {
        inputs,
        outputs,
        extras,
        op,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_atoms() {
        assert_eq!(Op::parse("ADD").unwrap(), Op::Add);
        assert_eq!(Op::parse("LSHR").unwrap(), Op::Lshr);
        assert_eq!(Op::parse("SELECT").unwrap(), Op::Select);
    }

    #[test]
    fn parse_call_atom() {
        assert_eq!(
            Op::parse("CALL(compute_min)").unwrap(),
            Op::Call("compute_min".to_string())
        );
    }

    #[test]
    fn call_without_parens_is_fatal() {
        assert!(matches!(
            Op::parse("CALL"),
            Err(InterpreterError::BadCallTarget(_))
        ));
    }

    #[test]
    fn unknown_atom_is_fatal() {
        assert!(matches!(
            Op::parse("FROBNICATE"),
            Err(InterpreterError::UnknownOp(_))
        ));
    }

    #[test]
    fn binary_classification() {
        assert!(Op::Add.is_binary());
        assert!(Op::Xor.is_binary());
        assert!(!Op::Not.is_binary());
        assert!(!Op::Call("f".to_string()).is_binary());
    }

    #[test]
    fn lex_binary_line() {
        let instr = lex_line("2 1 a b r ADD").unwrap().unwrap();
        assert_eq!(instr.inputs, vec!["a", "b"]);
        assert_eq!(instr.outputs, vec!["r"]);
        assert!(instr.extras.is_empty());
        assert_eq!(instr.op, Op::Add);
    }

    #[test]
    fn lex_input_line_keeps_trailing_literals() {
        let instr = lex_line("0 1 a 0 32 IN").unwrap().unwrap();
        assert!(instr.inputs.is_empty());
        assert_eq!(instr.outputs, vec!["a"]);
        assert_eq!(instr.extras, vec!["0", "32"]);
        assert_eq!(instr.op, Op::In);
    }

    #[test]
    fn short_lines_are_skipped() {
        assert!(lex_line("").unwrap().is_none());
        assert!(lex_line("1 0 r").unwrap().is_none());
    }

    #[test]
    fn truncated_line_is_fatal() {
        assert!(matches!(
            lex_line("3 1 a b OUT"),
            Err(InterpreterError::MalformedLine(_))
        ));
    }

    #[test]
    fn negative_literal_wraps() {
        assert_eq!(parse_literal("-1").unwrap(), u32::MAX);
    }
}
