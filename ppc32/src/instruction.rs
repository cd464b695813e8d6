use crate::decoder::{DecodeError, Decoder};
use crate::word::Word;
use paste::paste;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register(pub u8);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Immediate<T>(pub T);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    Absolute,
    Relative,
}

impl AddressingMode {
    pub fn from_absolute_bit(bit: u32) -> Self {
        if bit != 0 {
            AddressingMode::Absolute
        } else {
            AddressingMode::Relative
        }
    }
}

macro_rules! define_instructions {
    ($($name:ident { $(op: $op:expr,)? $(xform_op: $xform_op:expr ,)? { $( $field:ident: $ty:ty = $decode:expr ),* } }),*) => {
        paste! {
            #[derive(Debug, Copy, Clone, PartialEq, Eq)]
            pub enum Instruction {
                $(
                    $name {
                        $( $field: $ty ),*
                    },
                )*
            }

            fn __assert_decode_fn<T: FnOnce(Word) -> R, R>(t: T) -> T { t }

            impl Instruction {
                $(
                    pub fn [<parse_ $name:lower>](#[allow(unused)] word: Word) -> Result<Self, DecodeError> {
                        $(
                            // Constrains the closure argument to `Word` so the table below needs no annotations.
                            let decode = __assert_decode_fn($decode);
                            let $field = decode(word);
                        )*
                        Ok(Instruction::$name { $( $field ),* })
                    }
                )*
            }

            impl Decoder<'_> {
                pub(crate) fn decode_from_word(&mut self, word: Word) -> Result<Instruction, DecodeError> {
                    macro_rules! opt_pattern {
                        ($pat:pat) => { $pat };
                        () => { _ };
                    }

                    match (word.opcode(), word.xform_opcode()) {
                        $(
                            (opt_pattern!($($op)?), opt_pattern!($($xform_op)?)) => Instruction::[<parse_ $name:lower>](word),
                        )*
                        _ => Err(DecodeError::UnhandledOpcode {
                            word,
                            offset: self.offset() - 4,
                        }),
                    }
                }
            }
        }
    };
}

// Only what the patcher needs to look at: the branch family and the
// immediate loads used by split address pairs.
define_instructions! {
    Branch {
        op: 0b010010,
        {
            target: i32 = |word| word.i32::<6, 29>() << 2,
            mode: AddressingMode = |word| AddressingMode::from_absolute_bit(word.bit::<30>()),
            link: bool = |word| word.bit::<31>() != 0
        }
    },
    Bc {
        op: 0b010000,
        {
            bo: BranchOptions = BranchOptions::from_word,
            bi: u8 = |word| word.u8::<11, 15>(),
            target: i32 = |word| word.i32::<16, 29>() << 2,
            mode: AddressingMode = |word| AddressingMode::from_absolute_bit(word.bit::<30>()),
            link: bool = |word| word.bit::<31>() != 0
        }
    },
    Bclr {
        op: 0b010011,
        xform_op: 0b0000010000,
        {
            bo: BranchOptions = BranchOptions::from_word,
            bi: u8 = |word| word.u8::<11, 15>(),
            link: bool = |word| word.bit::<31>() != 0
        }
    },
    Bcctr {
        op: 0b010011,
        xform_op: 0b1000010000,
        {
            bo: BranchOptions = BranchOptions::from_word,
            bi: u8 = |word| word.u8::<11, 15>(),
            link: bool = |word| word.bit::<31>() != 0
        }
    },
    Addis {
        op: 0b001111,
        {
            dest: Register = |word| Register(word.u8::<6, 10>()),
            add: Option<Register> = |word| Some(word.u8::<11, 15>()).filter(|&r| r != 0).map(Register),
            imm: Immediate<i16> = |word| Immediate(word.i16::<16, 31>())
        }
    },
    Addi {
        op: 0b001110,
        {
            dest: Register = |word| Register(word.u8::<6, 10>()),
            source: Register = |word| Register(word.u8::<11, 15>()),
            imm: Immediate<i16> = |word| Immediate(word.i16::<16, 31>())
        }
    },
    Ori {
        op: 0b011000,
        {
            source: Register = |word| Register(word.u8::<6, 10>()),
            dest: Register = |word| Register(word.u8::<11, 15>()),
            imm: Immediate<u16> = |word| Immediate(word.u16::<16, 31>())
        }
    }
}

impl Instruction {
    /// Absolute target of a direct branch, `None` for register branches and non-branches.
    pub fn branch_target(&self, instr_addr: u32) -> Option<u32> {
        match self {
            Instruction::Branch { target, mode, .. } => {
                Some(compute_branch_target(instr_addr, *mode, *target))
            }
            Instruction::Bc { target, mode, .. } => {
                Some(compute_branch_target(instr_addr, *mode, *target))
            }
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::Bc { .. }
                | Instruction::Bclr { .. }
                | Instruction::Bcctr { .. }
        )
    }

    /// Whether this is a branch the patcher cannot relocate as a plain `b`.
    ///
    /// `bc` and the register forms (`bclr`, `bcctr`) count as conditional,
    /// even with `BO` = always: their target is not encoded in the word.
    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Bc { .. } | Instruction::Bclr { .. } | Instruction::Bcctr { .. }
        )
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BranchOptions {
    DecCTRBranchIfFalse,
    BranchIfFalse,
    DecCTRBranchIfTrue,
    BranchIfTrue,
    DecCTRBranchIfNotZero,
    DecCTRBranchIfZero,
    BranchAlways,
}

impl BranchOptions {
    pub fn from_word(word: Word) -> Self {
        let mask = word.u8::<6, 10>();

        if let 0b00010 | 0 = mask & 0b11110 {
            BranchOptions::DecCTRBranchIfFalse
        } else if mask & 0b11100 == 0b00100 {
            BranchOptions::BranchIfFalse
        } else if let 0b01000 | 0b01010 = mask & 0b11110 {
            BranchOptions::DecCTRBranchIfTrue
        } else if mask & 0b11100 == 0b01100 {
            BranchOptions::BranchIfTrue
        } else if mask & 0b10110 == 0b10000 {
            BranchOptions::DecCTRBranchIfNotZero
        } else if mask & 0b10110 == 0b10010 {
            BranchOptions::DecCTRBranchIfZero
        } else {
            BranchOptions::BranchAlways
        }
    }
}

pub fn compute_branch_target(base: u32, mode: AddressingMode, target: i32) -> u32 {
    match mode {
        AddressingMode::Absolute => target as u32,
        AddressingMode::Relative => base.wrapping_add_signed(target),
    }
}
