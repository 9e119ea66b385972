//! Build script rendering the `cirrus` man pages.
//!
//! Alongside `cirrus.1`, every subcommand gets its own page (`cirrus-vm.1`,
//! `cirrus-vm-create.1` and so on) in the build output directory.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?;
    let man_dir = out_dir.join("man");
    std::fs::create_dir_all(&man_dir)?;

    clap_mangen::generate_to(Cli::command(), &man_dir)?;
    writeln!(stdout, "cargo:rustc-env=CIRRUS_MAN_DIR={}", man_dir.display())?;

    Ok(())
}
