//! Gate-level word arithmetic over extracted wire bits.
//!
//! Everything here stays inside one boolean-style sharing: operands are
//! taken apart with `bit`, combined with plain XOR/AND trees and put back
//! together with `from_bits`. The dispatcher uses these for the
//! constant-multiplication rewrite, the shift instructions and signed
//! division/remainder.
use crate::builder::{CircuitBuilder, Sharing, WireHandle};

/// One-bit full adder; returns `(sum, carry_out)`.
pub(crate) fn full_adder<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    y: WireHandle,
    carry: WireHandle,
) -> (WireHandle, WireHandle) {
    let xor1 = builder.xor(sharing, x, carry);
    let xor2 = builder.xor(sharing, y, carry);
    let both = builder.and(sharing, xor1, xor2);
    let sum = builder.xor(sharing, x, xor2);
    let carry_out = builder.xor(sharing, both, carry);
    (sum, carry_out)
}

/// Single-bit multiplexer: `on_true` if `cond`, else `on_false`, built as
/// `on_false ⊕ (cond ∧ (on_true ⊕ on_false))`.
pub(crate) fn bit_select<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    cond: WireHandle,
    on_true: WireHandle,
    on_false: WireHandle,
) -> WireHandle {
    let diff = builder.xor(sharing, on_true, on_false);
    let gated = builder.and(sharing, cond, diff);
    builder.xor(sharing, on_false, gated)
}

/// OR over single bits, via De Morgan on the AND gate.
pub(crate) fn bit_or<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    a: WireHandle,
    b: WireHandle,
) -> WireHandle {
    let na = builder.inv(sharing, a);
    let nb = builder.inv(sharing, b);
    let neither = builder.and(sharing, na, nb);
    builder.inv(sharing, neither)
}

/// The single-bit views of a share, least significant first.
pub(crate) fn bits_of<B: CircuitBuilder>(
    builder: &mut B,
    x: WireHandle,
    width: u32,
) -> Vec<WireHandle> {
    (0..width).map(|index| builder.bit(x, index)).collect()
}

/// Ripple-carry addition over bit vectors of equal length; the final
/// carry is dropped, so the sum wraps at the operand width.
fn ripple_add<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    xs: &[WireHandle],
    ys: &[WireHandle],
) -> Vec<WireHandle> {
    let mut carry = builder.constant(sharing, 0, 1);
    let mut sum = Vec::with_capacity(xs.len());
    for (x, y) in xs.iter().zip(ys.iter()) {
        let (s, c) = full_adder(builder, sharing, *x, *y, carry);
        sum.push(s);
        carry = c;
    }
    sum
}

/// Multiplication by a public constant as a shift-and-add tree over the
/// constant's set bits. Overflow past `width` is dropped.
pub(crate) fn const_mult<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    constant: u32,
    width: u32,
) -> WireHandle {
    let xbits = bits_of(builder, x, width);
    let mut acc: Option<Vec<WireHandle>> = None;

    for shift in 0..width as usize {
        if (constant >> shift) & 1 == 0 {
            continue;
        }
        let mut shifted = Vec::with_capacity(width as usize);
        for position in 0..width as usize {
            if position < shift {
                shifted.push(builder.constant(sharing, 0, 1));
            } else {
                shifted.push(xbits[position - shift]);
            }
        }
        acc = Some(match acc {
            None => shifted,
            Some(sum) => ripple_add(builder, sharing, &sum, &shifted),
        });
    }

    let bits = acc.unwrap_or_else(|| {
        (0..width)
            .map(|_| builder.constant(sharing, 0, 1))
            .collect()
    });
    builder.from_bits(sharing, &bits)
}

/// Shift left by a public count, zero filled, width preserved; bits
/// shifted past the top are dropped.
pub(crate) fn left_shift<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    count: u32,
    width: u32,
) -> WireHandle {
    let xbits = bits_of(builder, x, width);
    let mut bits = Vec::with_capacity(width as usize);
    for position in 0..width as usize {
        if position < count as usize {
            bits.push(builder.constant(sharing, 0, 1));
        } else {
            bits.push(xbits[position - count as usize]);
        }
    }
    builder.from_bits(sharing, &bits)
}

/// Logical shift right by a public count, zero filled.
pub(crate) fn logical_right_shift<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    count: u32,
    width: u32,
) -> WireHandle {
    let xbits = bits_of(builder, x, width);
    let mut bits = Vec::with_capacity(width as usize);
    for position in 0..width as usize {
        let source = position + count as usize;
        if source < width as usize {
            bits.push(xbits[source]);
        } else {
            bits.push(builder.constant(sharing, 0, 1));
        }
    }
    builder.from_bits(sharing, &bits)
}

/// Two's-complement negation applied when `cond` carries 1.
pub(crate) fn cond_negate<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    cond: WireHandle,
    width: u32,
) -> WireHandle {
    let xbits = bits_of(builder, x, width);

    // invert and ripple an increment through
    let mut carry = builder.constant(sharing, 1, 1);
    let mut negated = Vec::with_capacity(width as usize);
    for bit in &xbits {
        let inverted = builder.inv(sharing, *bit);
        let next_carry = builder.and(sharing, inverted, carry);
        negated.push(builder.xor(sharing, inverted, carry));
        carry = next_carry;
    }

    let mut bits = Vec::with_capacity(width as usize);
    for (neg, plain) in negated.iter().zip(xbits.iter()) {
        bits.push(bit_select(builder, sharing, cond, *neg, *plain));
    }
    builder.from_bits(sharing, &bits)
}

/// Restoring long division over unsigned operands. Returns the quotient
/// or the remainder, both of the operand width.
fn long_division<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    y: WireHandle,
    want_quotient: bool,
    width: u32,
) -> WireHandle {
    let width = width as usize;
    let xbits = bits_of(builder, x, width as u32);
    let ybits = bits_of(builder, y, width as u32);

    let mut quotient: Vec<WireHandle> = (0..width)
        .map(|_| builder.constant(sharing, 0, 1))
        .collect();
    let mut rem: Vec<WireHandle> = (0..width)
        .map(|_| builder.constant(sharing, 0, 1))
        .collect();

    // divisor_high[k] tells whether the divisor has a set bit at or above
    // position k, i.e. whether the shifted divisor would overflow there
    let mut divisor_high = ybits.clone();
    for position in (0..width - 1).rev() {
        divisor_high[position] = bit_or(
            builder,
            sharing,
            divisor_high[position + 1],
            divisor_high[position],
        );
    }

    for step in (0..width).rev() {
        let active = width - step;

        if step < width - 1 {
            for position in (1..width).rev() {
                rem[position] = rem[position - 1];
            }
        }
        rem[0] = xbits[step];

        // rem - divisor over the active low bits, borrow tracked through
        // the inverted-subtrahend carry chain
        let mut carry = builder.constant(sharing, 1, 1);
        let mut diff = Vec::with_capacity(active);
        for position in 0..active {
            let inverted = builder.inv(sharing, ybits[position]);
            let (sum, next_carry) = full_adder(builder, sharing, rem[position], inverted, carry);
            diff.push(sum);
            carry = next_carry;
        }

        quotient[step] = if step > 0 {
            let borrowed = builder.inv(sharing, carry);
            let blocked = bit_or(builder, sharing, borrowed, divisor_high[active]);
            builder.inv(sharing, blocked)
        } else {
            carry
        };

        for position in 0..active {
            rem[position] = bit_select(
                builder,
                sharing,
                quotient[step],
                diff[position],
                rem[position],
            );
        }
    }

    let bits = if want_quotient { quotient } else { rem };
    builder.from_bits(sharing, &bits)
}

/// Signed division: both operands are conditionally negated by their sign
/// bit, divided unsigned, and the quotient negated back when the signs
/// differ. Truncates toward zero.
pub(crate) fn signed_div<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    y: WireHandle,
    width: u32,
) -> WireHandle {
    let x_neg = builder.bit(x, width - 1);
    let y_neg = builder.bit(y, width - 1);
    let ux = cond_negate(builder, sharing, x, x_neg, width);
    let uy = cond_negate(builder, sharing, y, y_neg, width);
    let quotient = long_division(builder, sharing, ux, uy, true, width);
    let flip = builder.xor(sharing, x_neg, y_neg);
    cond_negate(builder, sharing, quotient, flip, width)
}

/// Signed remainder; the sign follows the dividend.
pub(crate) fn signed_rem<B: CircuitBuilder>(
    builder: &mut B,
    sharing: Sharing,
    x: WireHandle,
    y: WireHandle,
    width: u32,
) -> WireHandle {
    let x_neg = builder.bit(x, width - 1);
    let y_neg = builder.bit(y, width - 1);
    let ux = cond_negate(builder, sharing, x, x_neg, width);
    let uy = cond_negate(builder, sharing, y, y_neg, width);
    let rem = long_division(builder, sharing, ux, uy, false, width);
    cond_negate(builder, sharing, rem, x_neg, width)
}
