use std::{num::ParseIntError, path::PathBuf};

use gecko::TextSelection;
use loader::{HandlerVariant, HookType, Placement};
use pico_args::Arguments;

macro_rules! define_args {
    (
        $(
            $name:ident ( $flag:expr ) $($kind:ident)? : $ty:ty $( = $parser:expr )?
        ),* $(,)?
    ) => {
        pub struct Args {
            $(pub $name: $ty),*
        }
        impl Args {
            pub fn parse() -> anyhow::Result<Self> {
                let mut args = Arguments::from_env();

                macro_rules! parse {
                    (exists; $fflag:expr;) => { args.contains($fflag) };
                    (count; $fflag:expr;) => {{
                        let mut count = 0u8;
                        while args.contains($fflag) {
                            count = count.saturating_add(1);
                        }
                        count
                    }};
                    (free; $fflag:expr;) => { args.opt_free_from_str()? };
                    (; $fflag:expr; $pparser:expr) => { args.opt_value_from_fn($fflag, $pparser)? };
                    (; $fflag:expr;) => { args.opt_value_from_str($fflag)? };
                }

                // positionals are only taken once every flag has been consumed
                $(
                    let $name = parse!($($kind)?; $flag; $($parser)?);
                )*

                let rest = args.finish();
                anyhow::ensure!(rest.is_empty(), "unexpected arguments: {:?}", rest);

                Ok(Self {
                    $($name),*
                })
            }
        }
    };
}

define_args! {
    help(["-h", "--help"]) exists: bool,
    alloc(["-a", "--alloc"]): Option<u32> = parse_hex,
    init(["-i", "--init"]): Option<u32> = parse_hex,
    txt_codes("--txtcodes"): Option<TextSelection>,
    handler("--handler"): Option<HandlerVariant>,
    handler_path("--handlerpath"): Option<PathBuf>,
    loader_path("--loaderpath"): Option<PathBuf>,
    hook_type("--hooktype"): Option<HookType>,
    hook_address("--hookaddress"): Option<u32> = parse_hex,
    placement("--placement"): Option<Placement>,
    optimize(["-o", "--optimize"]) exists: bool,
    protect(["-p", "--protect"]) exists: bool,
    encrypt("--encrypt") exists: bool,
    seed("--seed"): Option<u64>,
    dest("--dest"): Option<PathBuf>,
    quiet(["-q", "--quiet"]) exists: bool,
    verbose(["-v", "--verbose"]) count: u8,
    dol_file("<dolfile>") free: Option<PathBuf>,
    code_list("<codelist>") free: Option<PathBuf>,
}

/// Hex number with an optional `0x` prefix.
fn parse_hex(s: &str) -> Result<u32, ParseIntError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_accepts_optional_prefix() {
        assert_eq!(parse_hex("0x80001800"), Ok(0x8000_1800));
        assert_eq!(parse_hex("80001800"), Ok(0x8000_1800));
        assert_eq!(parse_hex("0XFF"), Ok(0xFF));
        assert!(parse_hex("0xZZ").is_err());
        assert!(parse_hex("123456789").is_err());
    }
}
