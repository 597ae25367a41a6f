//! The seam between the interpreter and the gate library.
//!
//! The interpreter never touches protocol internals; it only asks an
//! implementor of [`CircuitBuilder`](CircuitBuilder) to append gates and
//! hand back opaque wire handles.
use std::convert::TryFrom;
use std::fmt;

use crate::ProgramError;

/// The sharing a wire is represented in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sharing {
    Arith,
    Bool,
    Yao,
}

impl Sharing {
    /// Dense index, used to pick the per-target conversion cache.
    pub(crate) fn index(self) -> usize {
        match self {
            Sharing::Arith => 0,
            Sharing::Bool => 1,
            Sharing::Yao => 2,
        }
    }
}

impl TryFrom<&str> for Sharing {
    type Error = ProgramError;

    fn try_from(letter: &str) -> Result<Self, Self::Error> {
        match letter {
            "a" => Ok(Sharing::Arith),
            "b" => Ok(Sharing::Bool),
            "y" => Ok(Sharing::Yao),
            other => Err(ProgramError::UnknownSharing(other.to_string())),
        }
    }
}

impl fmt::Display for Sharing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Sharing::Arith => "a",
            Sharing::Bool => "b",
            Sharing::Yao => "y",
        };
        write!(f, "{}", letter)
    }
}

/// Which of the two parties this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// The wire-visibility tag owned by this role.
    pub fn visibility_tag(self) -> u32 {
        match self {
            Role::Server => 0,
            Role::Client => 1,
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Role::Server),
            1 => Ok(Role::Client),
            other => Err(format!("Role must be 0 (server) or 1 (client), got {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "Server"),
            Role::Client => write!(f, "Client"),
        }
    }
}

/// The visibility tag carried by inputs: the owning role's tag, or the
/// reserved public tag `2`.
pub const PUBLIC: u32 = 2;

/// Who gets to see a declassified output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    One(Role),
}

impl Recipient {
    pub fn includes(self, role: Role) -> bool {
        match self {
            Recipient::All => true,
            Recipient::One(r) => r == role,
        }
    }
}

/// Identity token for one value inside the circuit DAG.
///
/// The builder assigns these monotonically at gate creation; the
/// interpreter only ever compares and maps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct WireHandle(pub(crate) usize);

impl fmt::Display for WireHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// The gate library the interpreter drives.
///
/// One circuit object per sharing is implied: every emission names the
/// sharing it goes into. `bit` and `from_bits` are wire-level views and do
/// not add interactive gates.
#[cfg_attr(test, mockall::automock)]
pub trait CircuitBuilder {
    fn add(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn sub(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn mul(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn gt(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn eq(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn and(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn or(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn xor(&mut self, sharing: Sharing, a: WireHandle, b: WireHandle) -> WireHandle;
    fn inv(&mut self, sharing: Sharing, a: WireHandle) -> WireHandle;
    /// 2-to-1 multiplexer: `on_true` if `sel` carries 1, else `on_false`.
    fn mux(
        &mut self,
        sharing: Sharing,
        on_true: WireHandle,
        on_false: WireHandle,
        sel: WireHandle,
    ) -> WireHandle;
    /// Private input carrying this party's cleartext value.
    fn input(&mut self, sharing: Sharing, value: u32, bitlen: u32, role: Role) -> WireHandle;
    /// Placeholder for the counterparty's private input.
    fn dummy_input(&mut self, sharing: Sharing, bitlen: u32) -> WireHandle;
    /// Public constant of the given width.
    fn constant(&mut self, sharing: Sharing, value: u32, width: u32) -> WireHandle;
    /// Declassification gate; the clear value becomes readable after
    /// `execute` for every party the recipient includes.
    fn output(&mut self, sharing: Sharing, a: WireHandle, to: Recipient) -> WireHandle;
    /// Cross-sharing conversion gate (A2B, A2Y, B2A, B2Y, Y2A, Y2B).
    fn convert(&mut self, a: WireHandle, from: Sharing, to: Sharing) -> WireHandle;
    /// Single-bit view of wire `index` of a share.
    fn bit(&mut self, a: WireHandle, index: u32) -> WireHandle;
    /// Reassembles single-bit shares, least significant first, into one
    /// share of width `bits.len()`.
    fn from_bits(&mut self, sharing: Sharing, bits: &[WireHandle]) -> WireHandle;
    /// Runs the protocol over the built circuit.
    fn execute(&mut self) -> Result<(), String>;
    /// Clear value of a declassified output, valid after `execute`.
    fn clear_value(&self, a: WireHandle) -> u32;
}
