//! `pkgdoc`: turns a package's headers, Python modules and hand-written pages
//! into one browsable HTML tree.
//!
//! `build` documents the package named by a `package.xml`. `scan` repeats
//! that for every package under a directory, one child process each. A
//! package without a `pkgdoc.yaml` is built with the configuration printed
//! by `default-config`; tool-wide defaults live in `~/.pkgdoc/pkgdoc.toml`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
