pub mod decoder;
pub mod encode;
pub mod instruction;
pub mod word;

pub use decoder::Decoder;
pub use instruction::Instruction;
pub use word::Word;
