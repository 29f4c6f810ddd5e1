use anyhow::Result;
use fs_extra::dir::{CopyOptions, copy};
use std::{env, path::PathBuf};

/// Mirrors `assets/` (models, textures) into `OUT_DIR/assets`, where native
/// builds fall back to when run outside the crate root.
fn main() -> Result<()> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets = manifest_dir.join("assets");
    println!("cargo:rerun-if-changed={}", assets.display());
    if !assets.is_dir() {
        println!("cargo:warning=no assets directory, models are read from ./assets at runtime");
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let options = CopyOptions::new().overwrite(true);
    copy(&assets, &out_dir, &options)?;
    Ok(())
}
