// Bakes the default configuration file path into the binary.
//
// Packaged builds set DEFAULT_CONF_FILE=/etc/cf-dynamic/cf-dynamic.conf;
// local builds fall back to `cf-dynamic.conf` in the working directory.

use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

const FALLBACK_CONF_FILE: &str = "cf-dynamic.conf";

fn main() -> ExitCode {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=DEFAULT_CONF_FILE");

    let Some(out_dir) = env::var_os("OUT_DIR") else {
        eprintln!("OUT_DIR is not set");
        return ExitCode::FAILURE;
    };

    let default_conf_file = env::var("DEFAULT_CONF_FILE")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| FALLBACK_CONF_FILE.to_string());

    let path = Path::new(&out_dir).join("constants.rs");
    let contents = format!(
        "/// Configuration file used when neither `--config-file` nor `CONFIG_PATH` is given\n\
         pub const DEFAULT_CONF_FILE: &str = {:?};\n",
        default_conf_file
    );

    if let Err(e) = fs::write(&path, contents) {
        eprintln!("Failed to write {}: {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
