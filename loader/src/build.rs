use std::{
    ffi::OsStr,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use dol::{Dol, MAX_DATA_SECTIONS, MAX_TEXT_SECTIONS, SectionInfo};
use gecko::{CodeListBuilder, GeckoCodeStream, OptimizeReport, TextSelection};
use ppc32::encode;
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use crate::{
    BuildError,
    crypt,
    handler::{CodeHandler, HandlerVariant},
    hook::{self, HookType},
    kernel::{LoaderBlob, LoaderValues},
    placement::{self, Placement},
    protect::PROTECT_STUB,
};

const DEFAULT_BUILD_DIR: &str = "geckoloader-build";
const ALLOCATION_CRASH_LIMIT: u32 = 0x70000;
const ALLOCATION_HINT_LIMIT: u32 = 0x40000;

/// Everything that decides how codes end up in the DOL.
#[derive(Debug, Clone, Default)]
pub struct PatchSettings {
    /// Bytes reserved for handler and codes, ARENA only.
    pub allocation: Option<u32>,
    pub init_address: Option<u32>,
    /// Skips the signature scan.
    pub hook_address: Option<u32>,
    pub hook_type: HookType,
    pub placement: Placement,
    pub optimize: bool,
    pub protect: bool,
    pub encrypt: bool,
    /// Makes the encryption key reproducible.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub dol_path: PathBuf,
    pub codes_path: PathBuf,
    pub handler_path: PathBuf,
    pub loader_path: PathBuf,
    /// A file, or a directory the DOL's file name is appended to.
    pub dest: Option<PathBuf>,
    pub txt_codes: TextSelection,
    pub settings: PatchSettings,
}

/// What a build did to the DOL.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub placement: Placement,
    pub original_entry: u32,
    /// Where the loader starts, ARENA only.
    pub init_address: Option<u32>,
    pub allocation: u32,
    /// Length of the installed code list, magic and terminator included.
    pub codes_len: usize,
    pub hook_address: Option<u32>,
    pub handler_variant: HandlerVariant,
    pub optimized: Option<OptimizeReport>,
    /// The section that was added, `None` when every code was pre-patched.
    pub section: Option<SectionInfo>,
    pub text_sections: usize,
    pub data_sections: usize,
}

impl BuildReport {
    pub fn fully_absorbed(&self) -> bool {
        self.section.is_none()
    }

    pub fn log(&self) {
        if self.fully_absorbed() {
            info!("all codes have been pre-patched into the DOL");
            return;
        }

        if let Some(init) = self.init_address {
            info!("start of game modified to address {init:#010x}");
        }
        info!(
            "allocation is {:#x}; code list size is {:#x}",
            self.allocation, self.codes_len
        );
        if let Some(hook) = self.hook_address {
            info!("code handler hooked at {hook:#010x}");
        }
        debug!("placement: {}", self.placement);
        debug!("original entry point: {:#010x}", self.original_entry);
        debug!("code handler variant: {}", self.handler_variant);
        if let Some(section) = self.section {
            debug!(
                "payload installed as {} slot {} at file offset {:#x}",
                section.kind, section.slot, section.file_offset
            );
        }
        debug!(
            "{} of {MAX_TEXT_SECTIONS} text sections and {} of {MAX_DATA_SECTIONS} data sections are used",
            self.text_sections, self.data_sections
        );
    }
}

fn read(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| BuildError::Io {
        path: path.to_owned(),
        source,
    })
}

/// `dest` as a file if it has an extension, else as a directory for the DOL's
/// file name. Defaults to `geckoloader-build/`.
pub fn resolve_destination(dol_path: &Path, dest: Option<&Path>) -> PathBuf {
    let name = dol_path.file_name().unwrap_or(OsStr::new("main.dol"));
    match dest {
        Some(dest) if dest.extension().is_some() => dest.to_owned(),
        Some(dir) => dir.join(name),
        None => Path::new(DEFAULT_BUILD_DIR).join(name),
    }
}

/// Writes through a temporary file next to `dest` so a failed build never
/// leaves a partial DOL behind.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_error = |source| BuildError::Io {
        path: dest.to_owned(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_error)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(bytes).map_err(io_error)?;
    file.persist(dest).map_err(|err| io_error(err.error))?;
    Ok(())
}

fn trace_sections(dol: &Dol) {
    for section in dol.sections() {
        trace!(
            "{}{:<2} offset {:#08x} address {:#010x} size {:#08x}",
            section.kind, section.slot, section.file_offset, section.load_address, section.size
        );
    }
    trace!(
        "bss {:#010x} size {:#x}, entry point {:#010x}, file length {:#x}",
        dol.bss_address(),
        dol.bss_size(),
        dol.entrypoint(),
        dol.as_bytes().len()
    );
}

fn check_allocation(allocation: u32, codes_len: usize) {
    if (allocation as usize) < codes_len {
        warn!("allocated code space {allocation:#x} is smaller than the code list ({codes_len:#x} bytes)");
    }
    if allocation > ALLOCATION_CRASH_LIMIT {
        warn!("allocation {allocation:#x} is above {ALLOCATION_CRASH_LIMIT:#x} and will crash certain games");
    } else if allocation > ALLOCATION_HINT_LIMIT {
        info!("allocation {allocation:#x} is above {ALLOCATION_HINT_LIMIT:#x}, lower it if the game crashes");
    }
}

/// Installs `codes` into `dol` and returns the patched DOL.
///
/// Static writes are applied directly when optimizing. If nothing is left to
/// run at runtime the DOL is returned without a new section or hook.
pub fn patch_dol(
    mut dol: Dol,
    mut codes: GeckoCodeStream,
    mut handler: CodeHandler,
    loader: &LoaderBlob,
    settings: &PatchSettings,
) -> Result<(Dol, BuildReport), BuildError> {
    let original_entry = dol.entrypoint();

    let placement = settings
        .placement
        .resolve(handler.base(), handler.len(), codes.len());
    let init_address = match placement {
        Placement::Legacy => {
            if settings.init_address.is_some() {
                warn!("ignoring init address, LEGACY placement has no loader");
            }
            if settings.protect {
                warn!("not protecting codes, LEGACY placement keeps them where the stub scans");
            }
            None
        }
        _ => {
            if settings.protect {
                codes.prepend(&PROTECT_STUB)?;
            }
            let buffer = loader.len() + handler.len() + codes.len();
            Some(placement::init_address(
                &dol,
                settings.init_address,
                buffer as u32,
            )?)
        }
    };
    debug!("using {placement} placement");

    let mut optimized = None;
    if settings.optimize {
        let (stream, report) = codes.optimize_against(&mut dol)?;
        info!(
            "optimized code list: {} records applied, {} outside the DOL, {} kept",
            report.applied, report.unmapped, report.kept
        );
        codes = stream;
        optimized = Some(report);
    }

    let mut report = BuildReport {
        placement,
        original_entry,
        init_address: None,
        allocation: 0,
        codes_len: codes.len(),
        hook_address: None,
        handler_variant: handler.variant(),
        optimized,
        section: None,
        text_sections: dol.text_sections().len(),
        data_sections: dol.data_sections().len(),
    };

    if codes.is_fully_absorbed() {
        trace_sections(&dol);
        return Ok((dol, report));
    }

    placement::ensure_free_slot(&dol)?;

    let (hook, original) = match settings.hook_address {
        Some(address) => {
            placement::check_address("hook", address)?;
            (address, hook::verify_manual(&mut dol, address)?)
        }
        None => (hook::locate(&dol, settings.hook_type)?, encode::BLR),
    };
    handler.install_trampoline(hook, original)?;

    let codes_len = codes.len();
    let (install_at, payload, allocation) = match init_address {
        Some(init) => {
            let allocation = settings
                .allocation
                .unwrap_or_else(|| placement::default_allocation(handler.len(), codes_len));
            // without encryption the key stays zero so builds are reproducible
            let mut key = 0;
            let mut code_bytes = codes.into_bytes();
            if settings.encrypt {
                key = crypt::generate_key(settings.seed);
                crypt::xor_words(&mut code_bytes, key);
                debug!("encrypted code list");
            }

            let values = LoaderValues {
                init_address: init,
                allocation,
                handler_len: handler.len() as u32,
                codes_len: codes_len as u32,
                hook_address: hook,
                encrypted: settings.encrypt,
                key: crypt::obfuscate_key(key),
                entry_point: original_entry,
            };
            let mut payload = loader.patch(&values);
            payload.extend_from_slice(handler.as_bytes());
            payload.extend_from_slice(&code_bytes);
            (init, payload, allocation)
        }
        None => {
            if settings.encrypt {
                warn!("not encrypting codes, LEGACY placement has no loader to decrypt them");
            }
            if settings.allocation.is_some() {
                warn!("ignoring allocation, LEGACY placement uses the space below 0x80003000");
            }

            let code_list = handler.base().wrapping_add(handler.len() as u32);
            match handler.code_list_pointer() {
                Some(old) => debug!("moving code list from {old:#010x} to {code_list:#010x}"),
                None => warn!("code handler does not load its code list with lis/ori"),
            }
            handler.set_code_list_pointer(code_list);

            let mut payload = handler.as_bytes().to_vec();
            payload.extend_from_slice(codes.as_bytes());
            let allocation = placement::legacy_allocation(handler.base(), handler.len());
            (handler.base(), payload, allocation)
        }
    };

    let section = placement::install(&mut dol, &payload, install_at)?;
    if let Some(init) = init_address {
        dol.set_entry_point(init);
    }
    dol.insert_branch(handler.entry(), hook, false)?;

    check_allocation(allocation, codes_len);
    trace_sections(&dol);

    report.init_address = init_address;
    report.allocation = allocation;
    report.hook_address = Some(hook);
    report.section = Some(section);
    report.text_sections = dol.text_sections().len();
    report.data_sections = dol.data_sections().len();
    Ok((dol, report))
}

/// Reads every input, patches the DOL and writes it to its destination.
pub fn build(options: &BuildOptions) -> Result<(PathBuf, BuildReport), BuildError> {
    let dol = Dol::new(read(&options.dol_path)?)?;
    let codes = CodeListBuilder::new(options.txt_codes).build(&options.codes_path)?;
    let handler = CodeHandler::from_bytes(read(&options.handler_path)?)?;
    let loader = LoaderBlob::from_bytes(read(&options.loader_path)?)?;

    let (dol, report) = patch_dol(dol, codes, handler, &loader, &options.settings)?;

    let dest = resolve_destination(&options.dol_path, options.dest.as_deref());
    write_atomic(&dest, dol.as_bytes())?;
    debug!("wrote {:#x} bytes to {}", dol.as_bytes().len(), dest.display());
    Ok((dest, report))
}
