use std::{env, path::PathBuf, process::ExitCode};

use anyhow::Context;
use loader::{BuildOptions, HandlerVariant, PatchSettings, build};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

mod args;

const HELP: &str = "\
geckoloader: install Gecko codes into a GameCube/Wii DOL

USAGE:
  geckoloader <dolfile> <codelist> [OPTIONS]

  <codelist> is a .txt or .gct file, or a folder of them

OPTIONS:
  -a, --alloc HEX          bytes to reserve for the handler and codes
  -i, --init HEX           address to place the loader at
      --txtcodes MODE      ACTIVE (default) or ALL codes of a text list
      --handler TYPE       FULL (default) or MINI code handler
      --handlerpath PATH   code handler binary, overrides --handler
      --loaderpath PATH    loader binary
      --hooktype TYPE      VI (default), GX or PAD
      --hookaddress HEX    hook this blr instead of searching for one
      --placement MODE     AUTO (default), LEGACY or ARENA
  -o, --optimize           pre-patch static writes into the DOL
  -p, --protect            keep the game from replacing the code handler (ARENA only)
      --encrypt            encrypt the installed code list
      --seed N             seed for the encryption key
      --dest PATH          output file, or folder for the output
  -q, --quiet              print nothing but errors
  -v, --verbose            more output, up to -vvv
  -h, --help               print this message
";

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "off",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .init();
}

/// The `bin` folder next to the executable, else `./bin`.
fn blob_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("bin")))
        .filter(|dir| dir.is_dir())
        .unwrap_or_else(|| PathBuf::from("bin"))
}

fn build_options(args: Args) -> anyhow::Result<BuildOptions> {
    let dol_path = args.dol_file.context("missing <dolfile>")?;
    let codes_path = args.code_list.context("missing <codelist>")?;

    let blobs = blob_dir();
    let handler_path = args.handler_path.unwrap_or_else(|| {
        match args.handler.unwrap_or(HandlerVariant::Full) {
            HandlerVariant::Full => blobs.join("codehandler.bin"),
            HandlerVariant::Mini => blobs.join("codehandler-mini.bin"),
        }
    });
    let loader_path = args
        .loader_path
        .unwrap_or_else(|| blobs.join("geckoloader.bin"));

    Ok(BuildOptions {
        dol_path,
        codes_path,
        handler_path,
        loader_path,
        dest: args.dest,
        txt_codes: args.txt_codes.unwrap_or_default(),
        settings: PatchSettings {
            allocation: args.alloc,
            init_address: args.init,
            hook_address: args.hook_address,
            hook_type: args.hook_type.unwrap_or_default(),
            placement: args.placement.unwrap_or_default(),
            optimize: args.optimize,
            protect: args.protect,
            encrypt: args.encrypt,
            seed: args.seed,
        },
    })
}

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err:#}\n\n{HELP}");
            return ExitCode::from(2);
        }
    };
    if args.help {
        print!("{HELP}");
        return ExitCode::SUCCESS;
    }

    init_logging(args.quiet, args.verbose);

    let options = match build_options(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err:#}\n\n{HELP}");
            return ExitCode::from(2);
        }
    };

    match build(&options) {
        Ok((dest, report)) => {
            report.log();
            info!("patched DOL written to {}", dest.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            let code = err.exit_code();
            eprintln!("error: {:#}", anyhow::Error::from(err));
            ExitCode::from(code)
        }
    }
}
