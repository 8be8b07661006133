use std::error::Error;

use vergen::{BuildBuilder, CargoBuilder, Emitter, RustcBuilder};

/// Selects the short version string of releases, see `agent_version` in `src/lib.rs`.
const RELEASE_ENV: &str = "BROOK_AGENT_RELEASE";

fn main() {
    println!("cargo:rerun-if-env-changed={RELEASE_ENV}");
    emit_build_info().expect("failed to emit build information");
}

/// Emit cargo instructions that allow the crate to access
/// build-related information at compile-time.
///
/// Both forms of the version string are compiled, therefore every variable is always emitted.
fn emit_build_info() -> Result<(), Box<dyn Error>> {
    let build = BuildBuilder::default().build_date(true).build_timestamp(true).build()?;
    let cargo = CargoBuilder::default().debug(true).build()?;
    let rustc = RustcBuilder::default().semver(true).build()?;

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .add_instructions(&rustc)?
        .emit()?;

    Ok(())
}
