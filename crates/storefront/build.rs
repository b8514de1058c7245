//! Build script for storefront crate.
//!
//! Hashes static assets so templates can link immutable, cache-busted copies.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_asset("static/css", "main", "css", "CSS_HASH");
    hash_asset("static/js", "cart", "js", "JS_HASH");
}

/// Hash `{dir}/{stem}.{ext}` and copy it to `{dir}/derived/{stem}.{hash}.{ext}`.
///
/// Sets `env_name` for use with `env!`. A missing asset sets it empty.
fn hash_asset(dir: &str, stem: &str, ext: &str, env_name: &str) {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let asset_dir = Path::new(&manifest_dir).join(dir);
    let asset_path = asset_dir.join(format!("{stem}.{ext}"));

    println!("cargo:rerun-if-changed={}", asset_path.display());

    let content = match fs::read(&asset_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", asset_path.display());
            println!("cargo:rustc-env={env_name}=");
            return;
        }
    };

    // First 8 hex chars of SHA-256
    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = hash.get(..8).unwrap_or(&hash);

    println!("cargo:rustc-env={env_name}={short_hash}");

    let derived_dir = asset_dir.join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");
    fs::copy(
        &asset_path,
        derived_dir.join(format!("{stem}.{short_hash}.{ext}")),
    )
    .expect("Failed to copy asset to derived directory");
}
