//! Gecko code lists: reading them from text and binary files, walking their
//! records, and applying static writes to a DOL ahead of time.

pub mod codelist;
pub mod codetype;
mod error;
pub mod optimize;
pub mod stream;

pub use codelist::{CodeListBuilder, TextSelection};
pub use codetype::CodeType;
pub use error::{CodeListError, GeckoError};
pub use optimize::OptimizeReport;
pub use stream::{GeckoCodeStream, MAGIC, Record, TERMINATOR};
