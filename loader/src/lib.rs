//! Installs a Gecko code handler, its bootstrap loader and a code list into a DOL.

mod build;
pub mod crypt;
mod error;
pub mod handler;
pub mod hook;
pub mod kernel;
pub mod placement;
pub mod protect;

pub use build::{
    BuildOptions, BuildReport, PatchSettings, build, patch_dol, resolve_destination,
};
pub use error::{BuildError, HookError, LoaderError};
pub use handler::{CodeHandler, HandlerVariant};
pub use hook::HookType;
pub use kernel::{LoaderBlob, LoaderValues};
pub use placement::Placement;
