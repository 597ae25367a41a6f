//! Per-instruction dispatch: realises each opcode against the builder in
//! the line's target sharing, inserting conversions on demand and
//! handling the call rewiring queues.
use std::collections::VecDeque;

use crate::{
    builder::{CircuitBuilder, Recipient, Sharing, WireHandle, PUBLIC},
    definitions::circuit::{cons, BITLEN},
    opcode::{lex_line, parse_literal, Instruction, Op},
    program::ProgramSource,
    InterpreterError,
};

use super::state::{Interpreter, WireSeq};
use super::{bitops, tree};

/// The rewiring queues of one stack frame.
///
/// `args` carries caller handles into the callee's `IN` instructions,
/// `rets` carries caller wire names out through the callee's `OUT`
/// instructions. Both must drain to empty by the end of a call.
pub struct CallQueues {
    pub(crate) args: VecDeque<WireHandle>,
    pub(crate) rets: VecDeque<String>,
    nested: bool,
}

impl CallQueues {
    /// The top-level frame: empty queues, inputs come from the test
    /// parameters instead.
    pub fn root() -> Self {
        CallQueues {
            args: VecDeque::new(),
            rets: VecDeque::new(),
            nested: false,
        }
    }

    pub(crate) fn nested(args: VecDeque<WireHandle>, rets: VecDeque<String>) -> Self {
        CallQueues {
            args,
            rets,
            nested: true,
        }
    }
}

impl<B, P> Interpreter<B, P>
where
    B: CircuitBuilder,
    P: ProgramSource,
{
    /// Interprets the bytecode of one function. Returns the handles its
    /// `OUT` instructions produced, in reach order.
    pub fn process_function(
        &mut self,
        name: &str,
        queues: &mut CallQueues,
    ) -> Result<Vec<WireHandle>, InterpreterError> {
        log::debug!("processing function '{}'", name);
        let source = self.program.function(name)?;
        self.process_source(&source, queues)
    }

    pub(crate) fn process_source(
        &mut self,
        source: &str,
        queues: &mut CallQueues,
    ) -> Result<Vec<WireHandle>, InterpreterError> {
        let mut results = Vec::new();
        for line in source.lines() {
            if let Some(instr) = lex_line(line)? {
                self.process_line(instr, queues, &mut results)?;
            }
        }
        Ok(results)
    }

    /// Dispatches the constants preamble: the same per-line processing,
    /// with every `CONS` literal additionally recorded in the constant
    /// map for the multiplication rewrite.
    pub fn preamble(&mut self, source: &str) -> Result<(), InterpreterError> {
        let mut queues = CallQueues::root();
        let mut results = Vec::new();
        for line in source.lines() {
            let instr = match lex_line(line)? {
                Some(instr) => instr,
                None => continue,
            };
            let literal = if instr.op == Op::Cons {
                let tokens = cons_tokens(&instr);
                match (instr.outputs.first(), tokens.first()) {
                    (Some(name), Some(token)) => Some((name.clone(), parse_literal(token)?)),
                    _ => None,
                }
            } else {
                None
            };
            if self.process_line(instr, &mut queues, &mut results)? {
                if let Some((name, value)) = literal {
                    self.consts.insert(name, value);
                }
            }
        }
        Ok(())
    }

    /// Dispatches one lexed line. Returns whether the line was realised;
    /// lines whose anchor wire has no share-map entry are skipped.
    pub(crate) fn process_line(
        &mut self,
        instr: Instruction,
        queues: &mut CallQueues,
        results: &mut Vec<WireHandle>,
    ) -> Result<bool, InterpreterError> {
        let anchor = instr.outputs.first().or_else(|| instr.inputs.first());
        let target = anchor.and_then(|name| self.share_map.get(name).copied());
        let target = match target {
            Some(target) => target,
            None => {
                // a skipped parameter still occupies one argument slot
                if instr.op == Op::In && !queues.args.is_empty() {
                    queues.args.pop_front();
                }
                log::trace!("skipping line without a share-map anchor: {:?}", instr.op);
                return Ok(false);
            }
        };

        let produced: Vec<WireHandle> = match &instr.op {
            op if op.is_binary() => vec![self.binary(target, &instr)?],
            Op::Not => vec![self.invert(target, &instr)?],
            Op::Shl | Op::Lshr => vec![self.shift(target, &instr)?],
            Op::Cons => vec![self.cons(target, &instr)?],
            Op::Mux => self.mux(target, &instr)?,
            Op::Select => vec![self.select(target, &instr)?],
            Op::Store => self.store(target, &instr)?,
            Op::In => vec![self.input(target, &instr, queues)?],
            Op::Out => {
                self.output(&instr, queues, results)?;
                Vec::new()
            }
            Op::Call(callee) => {
                let callee = callee.clone();
                self.call(&callee, &instr)?;
                Vec::new()
            }
            _ => unreachable!("binary guard covers the remaining operators"),
        };

        if produced.len() == 1 {
            // one result fans out to every declared output name
            for name in &instr.outputs {
                self.bind(name, [produced[0]]);
            }
        } else {
            for (name, handle) in instr.outputs.iter().zip(produced.iter()) {
                self.bind(name, [*handle]);
            }
        }
        Ok(true)
    }

    fn binary(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<WireHandle, InterpreterError> {
        let lhs = operand(instr, 0)?;
        let rhs = operand(instr, 1)?;

        // multiplication against one preamble constant lowers to a
        // shift-and-add tree over the constant's set bits
        if instr.op == Op::Mul && target != Sharing::Arith {
            let known = (self.consts.get(lhs).copied(), self.consts.get(rhs).copied());
            let rewritten = match known {
                (Some(constant), None) => Some((constant, rhs)),
                (None, Some(constant)) => Some((constant, lhs)),
                _ => None,
            };
            if let Some((constant, name)) = rewritten {
                let x = self.resolve(name, target)?;
                let product = bitops::const_mult(&mut self.builder, target, x, constant, BITLEN);
                return Ok(self.created(product, target));
            }
        }

        let a = self.resolve(lhs, target)?;
        let b = self.resolve(rhs, target)?;
        let handle = match instr.op {
            Op::Add => self.builder.add(target, a, b),
            Op::Sub => self.builder.sub(target, a, b),
            Op::Mul => self.builder.mul(target, a, b),
            Op::Eq => self.builder.eq(target, a, b),
            Op::Gt => self.builder.gt(target, a, b),
            Op::Lt => self.builder.gt(target, b, a),
            Op::Ge => {
                let lt = self.builder.gt(target, b, a);
                self.builder.inv(target, lt)
            }
            Op::Le => {
                let gt = self.builder.gt(target, a, b);
                self.builder.inv(target, gt)
            }
            Op::And => self.builder.and(target, a, b),
            Op::Or => self.builder.or(target, a, b),
            Op::Xor => self.builder.xor(target, a, b),
            Op::Div => {
                if target == Sharing::Arith {
                    return Err(InterpreterError::ArithUnsupported("DIV"));
                }
                bitops::signed_div(&mut self.builder, target, a, b, BITLEN)
            }
            Op::Rem => {
                if target == Sharing::Arith {
                    return Err(InterpreterError::ArithUnsupported("REM"));
                }
                bitops::signed_rem(&mut self.builder, target, a, b, BITLEN)
            }
            _ => unreachable!("caller checked is_binary"),
        };
        Ok(self.created(handle, target))
    }

    fn invert(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<WireHandle, InterpreterError> {
        let a = self.resolve(operand(instr, 0)?, target)?;
        let handle = self.builder.inv(target, a);
        Ok(self.created(handle, target))
    }

    fn shift(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<WireHandle, InterpreterError> {
        let mnemonic = if instr.op == Op::Shl { "SHL" } else { "LSHR" };
        if target == Sharing::Arith {
            return Err(InterpreterError::ArithUnsupported(mnemonic));
        }
        let name = operand(instr, 0)?;
        let count_token = instr
            .inputs
            .get(1)
            .or_else(|| instr.extras.first())
            .ok_or_else(|| InterpreterError::MalformedLine(format!("{} without a count", mnemonic)))?;
        let count = parse_literal(count_token)?;
        let x = self.resolve(name, target)?;
        let handle = if instr.op == Op::Shl {
            bitops::left_shift(&mut self.builder, target, x, count, BITLEN)
        } else {
            bitops::logical_right_shift(&mut self.builder, target, x, count, BITLEN)
        };
        Ok(self.created(handle, target))
    }

    fn cons(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<WireHandle, InterpreterError> {
        let tokens = cons_tokens(instr);
        let value = parse_literal(token(tokens, 0, "CONS")?)?;
        let width = parse_literal(token(tokens, 1, "CONS")?)?;
        if width != cons::BIT && width != cons::WORD {
            return Err(InterpreterError::ConsWidth(width));
        }
        // public constants enter through the boolean circuit; the
        // conversion cache routes them to Yao on demand
        let sharing = if target == Sharing::Yao {
            Sharing::Bool
        } else {
            target
        };
        let handle = self.builder.constant(sharing, value, width);
        Ok(self.created(handle, sharing))
    }

    fn mux(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<Vec<WireHandle>, InterpreterError> {
        if instr.inputs.len() < 3 || instr.inputs.len() % 2 == 0 {
            return Err(InterpreterError::MalformedLine(
                "MUX needs a selector and operand pairs".to_string(),
            ));
        }
        let k = (instr.inputs.len() - 1) / 2;
        let sel_name = &instr.inputs[0];
        let mut sel = None;
        let mut produced = Vec::with_capacity(k);

        for slot in 0..k {
            let on_true = self.scalar(&instr.inputs[1 + slot])?;
            let on_false = self.scalar(&instr.inputs[1 + k + slot])?;
            if on_true == on_false {
                // both branches are the same wire, nothing to choose
                produced.push(on_true);
                continue;
            }
            let sel_handle = match sel {
                Some(handle) => handle,
                None => {
                    let handle = self.resolve(sel_name, target)?;
                    sel = Some(handle);
                    handle
                }
            };
            let t = self.convert(on_true, target)?;
            let f = self.convert(on_false, target)?;
            let handle = self.builder.mux(target, t, f, sel_handle);
            produced.push(self.created(handle, target));
        }
        Ok(produced)
    }

    /// Indexed load, lowered bit-column-wise into ⌈log₂ n⌉ tournament
    /// rounds keyed off the bits of the secret index.
    fn select(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<WireHandle, InterpreterError> {
        if target == Sharing::Arith {
            return Err(InterpreterError::ArithUnsupported("SELECT"));
        }
        if instr.inputs.len() < 2 {
            return Err(InterpreterError::MalformedLine(
                "SELECT needs at least one cell and an index".to_string(),
            ));
        }
        let n = instr.inputs.len() - 1;
        let idx = self.resolve(&instr.inputs[n], target)?;
        let mut cells = Vec::with_capacity(n);
        for name in &instr.inputs[..n] {
            cells.push(self.resolve(name, target)?);
        }

        let rounds = tree::levels(n);
        let idx_bits: Vec<WireHandle> = (0..rounds)
            .map(|level| self.builder.bit(idx, level as u32))
            .collect();

        let mut word = Vec::with_capacity(BITLEN as usize);
        for position in 0..BITLEN {
            let column: Vec<WireHandle> = cells
                .iter()
                .map(|cell| self.builder.bit(*cell, position))
                .collect();
            let builder = &mut self.builder;
            let winner = tree::tournament(&column, &mut |a, b, level| {
                // a ⊕ (idx[level] ∧ (a ⊕ b)): picks b when the index bit is set
                bitops::bit_select(&mut *builder, target, idx_bits[level], b, a)
            })
            .ok_or_else(|| {
                InterpreterError::MalformedLine("SELECT over an empty array".to_string())
            })?;
            word.push(winner);
        }
        let handle = self.builder.from_bits(target, &word);
        Ok(self.created(handle, target))
    }

    /// Indexed store, lowered to one equality-gated MUX per cell.
    fn store(
        &mut self,
        target: Sharing,
        instr: &Instruction,
    ) -> Result<Vec<WireHandle>, InterpreterError> {
        if target == Sharing::Arith {
            return Err(InterpreterError::ArithUnsupported("STORE"));
        }
        if instr.inputs.len() < 3 {
            return Err(InterpreterError::MalformedLine(
                "STORE needs cells, an index and a value".to_string(),
            ));
        }
        let n = instr.inputs.len() - 2;
        let idx = self.resolve(&instr.inputs[n], target)?;
        let value = self.resolve(&instr.inputs[n + 1], target)?;

        let cons_sharing = if target == Sharing::Yao {
            Sharing::Bool
        } else {
            target
        };
        let mut produced = Vec::with_capacity(n);
        for position in 0..n {
            let cell = self.resolve(&instr.inputs[position], target)?;
            let raw = self.builder.constant(cons_sharing, position as u32, cons::WORD);
            self.created(raw, cons_sharing);
            let index_cons = self.convert(raw, target)?;
            let here = self.builder.eq(target, index_cons, idx);
            let handle = self.builder.mux(target, value, cell, here);
            produced.push(self.created(handle, target));
        }
        Ok(produced)
    }

    fn input(
        &mut self,
        target: Sharing,
        instr: &Instruction,
        queues: &mut CallQueues,
    ) -> Result<WireHandle, InterpreterError> {
        // callee side of a call: take the caller's handle as-is, any
        // conversion is deferred to the use site
        if let Some(handle) = queues.args.pop_front() {
            return Ok(handle);
        }
        if queues.nested {
            return Err(InterpreterError::ArgUnderflow);
        }

        // the parameter name and its literal tags sit either in the input
        // list or trail the output name, depending on the emitter vintage
        let (name, literals): (&str, &[String]) = if !instr.inputs.is_empty() {
            (&instr.inputs[0], &instr.inputs[1..])
        } else {
            let name = instr
                .outputs
                .first()
                .ok_or_else(|| InterpreterError::MalformedLine("IN without a wire".to_string()))?;
            (name, &instr.extras)
        };
        let vis = parse_literal(token(literals, 0, "IN")?)?;

        // inputs enter through the boolean circuit and convert on read
        let sharing = if target == Sharing::Yao {
            Sharing::Bool
        } else {
            target
        };
        let value = self
            .params
            .get(name)
            .copied()
            .ok_or_else(|| InterpreterError::MissingParam(name.to_string()))?;

        let handle = if vis == self.role.visibility_tag() {
            self.builder.input(sharing, value, BITLEN, self.role)
        } else if vis == PUBLIC {
            let width = parse_literal(token(literals, 1, "IN")?)?;
            let width = if width == cons::BIT { cons::BIT } else { cons::WORD };
            self.builder.constant(sharing, value, width)
        } else {
            self.builder.dummy_input(sharing, BITLEN)
        };
        Ok(self.created(handle, sharing))
    }

    fn output(
        &mut self,
        instr: &Instruction,
        queues: &mut CallQueues,
        results: &mut Vec<WireHandle>,
    ) -> Result<(), InterpreterError> {
        let name = operand(instr, 0)?;
        let seq: WireSeq = self.lookup(name)?.clone();

        if !queues.rets.is_empty() {
            // returning into the caller: hand each handle to the next
            // caller-side name
            for handle in seq {
                let ret_name = queues
                    .rets
                    .pop_front()
                    .ok_or(InterpreterError::RetUnderflow)?;
                self.bind(&ret_name, [handle]);
                results.push(handle);
            }
        } else {
            for handle in seq {
                let sharing = self.sharing_of(handle, "an OUT instruction")?;
                let declassified = self.builder.output(sharing, handle, Recipient::All);
                results.push(declassified);
            }
        }
        Ok(())
    }

    fn call(&mut self, callee: &str, instr: &Instruction) -> Result<(), InterpreterError> {
        let mut args = VecDeque::new();
        for name in &instr.inputs {
            args.extend(self.lookup(name)?.iter().copied());
        }
        let rets: VecDeque<String> = instr.outputs.iter().cloned().collect();

        let mut frame = CallQueues::nested(args, rets);
        let returned = self.process_function(callee, &mut frame)?;

        if !frame.args.is_empty() || !frame.rets.is_empty() {
            return Err(InterpreterError::CallArity {
                function: callee.to_string(),
                args: frame.args.len(),
                rets: frame.rets.len(),
            });
        }
        // the return queue already bound these names; re-binding them
        // positionally keeps the caller's view independent of the
        // callee's naming
        for (name, handle) in instr.outputs.iter().zip(returned.iter()) {
            self.bind(name, [*handle]);
        }
        Ok(())
    }
}

fn operand<'i>(instr: &'i Instruction, index: usize) -> Result<&'i String, InterpreterError> {
    instr
        .inputs
        .get(index)
        .ok_or_else(|| InterpreterError::MalformedLine(format!("missing operand {}", index)))
}

fn token<'t>(
    tokens: &'t [String],
    index: usize,
    mnemonic: &str,
) -> Result<&'t String, InterpreterError> {
    tokens.get(index).ok_or_else(|| {
        InterpreterError::MalformedLine(format!("{} is missing literal {}", mnemonic, index))
    })
}

/// `CONS` literals sit in the input list on older emitters and behind the
/// output name on newer ones.
fn cons_tokens(instr: &Instruction) -> &[String] {
    if !instr.inputs.is_empty() {
        &instr.inputs
    } else {
        &instr.extras
    }
}
