//! Register-machine instruction set
//!
//! Operands name registers in the current frame's window. Register 0 always
//! holds `self`; method arguments arrive in registers `1..=argc`.

use crate::symbol::Symbol;
use std::rc::Rc;

/// Register index within a frame window
pub type Reg = u16;

/// One instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Nop,

    // ===== Loads =====
    /// R(a) = nil
    LoadNil(Reg),
    /// R(a) = self
    LoadSelf(Reg),
    /// R(a) = true
    LoadTrue(Reg),
    /// R(a) = false
    LoadFalse(Reg),
    /// R(a) = integer literal
    LoadInt(Reg, i64),
    /// R(a) = string literal
    LoadStr(Reg, Rc<str>),
    /// R(a) = symbol literal
    LoadSym(Reg, Symbol),
    /// R(a) = R(b)
    Move(Reg, Reg),

    // ===== Variables =====
    /// R(a) = $name
    GetGlobal(Reg, Symbol),
    /// $name = R(a)
    SetGlobal(Symbol, Reg),
    /// R(a) = self.@name
    GetIvar(Reg, Symbol),
    /// self.@name = R(a)
    SetIvar(Symbol, Reg),
    /// R(a) = Name
    GetConst(Reg, Symbol),

    // ===== Arithmetic and comparison =====
    /// R(a) = R(b) + R(c)
    Add(Reg, Reg, Reg),
    /// R(a) = R(b) - R(c)
    Sub(Reg, Reg, Reg),
    /// R(a) = R(b) < R(c)
    Lt(Reg, Reg, Reg),

    // ===== Control flow =====
    /// pc = target
    Jump(usize),
    /// if !R(a) { pc = target }
    JumpIfNot(Reg, usize),

    // ===== Calls =====
    /// R(dst) = R(recv).method(R(recv+1), ..., R(recv+argc))
    Send {
        dst: Reg,
        recv: Reg,
        method: Symbol,
        argc: u16,
    },
    /// R(a) = [R(start), ..., R(start+len-1)]
    Array(Reg, Reg, u16),
    /// Return R(a) to the caller
    Return(Reg),
    /// Raise R(a) (a message string or exception object)
    Raise(Reg),
}
