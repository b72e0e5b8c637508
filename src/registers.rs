//! MIPS register names for the dbx numbering used by STABS register symbols.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterClass {
    Gpr,
    Fpr,
    Invalid,
}

pub const GPR_STRINGS: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

pub const FPR_STRINGS: [&str; 32] = [
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13", "f14",
    "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24", "f25", "f26", "f27",
    "f28", "f29", "f30", "f31",
];

/// Maps a dbx register number to a register class and an index within that
/// class. GCC numbers the GPRs 0 to 31 and the FPRs 38 to 69.
pub fn map_dbx_register_index(index: i32) -> (RegisterClass, i32) {
    match index {
        0..=31 => (RegisterClass::Gpr, index),
        38..=69 => (RegisterClass::Fpr, index - 38),
        _ => (RegisterClass::Invalid, 0),
    }
}

/// The register name printed in storage comments, or `None` for numbers
/// outside the known ranges.
pub fn register_name(dbx_register_number: i32) -> Option<&'static str> {
    let (class, index) = map_dbx_register_index(dbx_register_number);
    match class {
        RegisterClass::Gpr => Some(GPR_STRINGS[index as usize]),
        RegisterClass::Fpr => Some(FPR_STRINGS[index as usize]),
        RegisterClass::Invalid => None,
    }
}
