//! Embeds `data/<NAME>_CODES.json` tables into the crate.
//!
//! Each family gets a `&str` constant in `$OUT_DIR/builtins.rs`; a family
//! whose table is absent gets `None` and must be loaded from a directory.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

const FAMILIES: [&str; 3] = ["DICT_4X4_50", "DICT_6X6_250", "DICT_APRILTAG_36h11"];

fn main() -> io::Result<()> {
    let manifest = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("CARGO_MANIFEST_DIR is not set"))?;
    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::other("OUT_DIR is not set"))?;
    let data = manifest.join("data");
    println!("cargo:rerun-if-changed={}", data.display());

    let mut src = String::new();
    for name in FAMILIES {
        let table = data.join(format!("{name}_CODES.json"));
        println!("cargo:rerun-if-changed={}", table.display());
        let value = if table.is_file() {
            format!("Some(include_str!({:?}))", table.display().to_string())
        } else {
            "None".to_string()
        };
        writeln!(src, "pub(crate) const {name}: Option<&str> = {value};")
            .map_err(io::Error::other)?;
    }
    fs::write(out_dir.join("builtins.rs"), src)
}
