//! Build script for the storefront crate.
//!
//! Hashes `static/css/main.css` so the layout can link a content-addressed
//! copy that is safe to cache forever.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let css_path = Path::new(&manifest_dir).join("static/css/main.css");
    println!("cargo:rerun-if-changed={}", css_path.display());

    let Ok(content) = fs::read(&css_path) else {
        println!("cargo:warning=static/css/main.css not found, serving unhashed stylesheet");
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short = &digest[..8];
    println!("cargo:rustc-env=CSS_HASH={short}");

    let derived_dir = Path::new(&manifest_dir).join("static/css/derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived CSS directory");
    fs::copy(&css_path, derived_dir.join(format!("main.{short}.css")))
        .expect("Failed to copy hashed stylesheet");
}
