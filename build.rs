use std::collections::BTreeSet;
use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Modules that read `TRANSCRIPT_ARCHIVE_*` variables.
const ENV_SOURCES: &[&str] = &["src/archive/config.rs", "src/archive/paths.rs"];
const ENV_PREFIX: &str = "TRANSCRIPT_ARCHIVE_";

/// String literals naming an archive variable, e.g. `"TRANSCRIPT_ARCHIVE_DIR"`.
fn env_literals(source: &str) -> impl Iterator<Item = &str> {
    source.match_indices('"').filter_map(|(open, _)| {
        let rest = &source[open + 1..];
        let literal = &rest[..rest.find('"')?];
        let is_key = literal.len() > ENV_PREFIX.len()
            && literal.starts_with(ENV_PREFIX)
            && literal
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        is_key.then_some(literal)
    })
}

fn render_env_keys(keys: &BTreeSet<String>) -> String {
    let body = keys
        .iter()
        .map(|key| format!("    \"{key}\",\n"))
        .collect::<String>();
    format!("pub const ARCHIVE_ENV_KEYS: &[&str] = &[\n{body}];\n")
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut keys = BTreeSet::new();
    for source in ENV_SOURCES {
        println!("cargo:rerun-if-changed={source}");
        let content = fs::read_to_string(source)?;
        keys.extend(env_literals(&content).map(str::to_string));
    }
    let out_dir = env::var("OUT_DIR")?;
    fs::write(
        Path::new(&out_dir).join("archive_env_keys.rs"),
        render_env_keys(&keys),
    )?;

    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        now.as_secs(),
        now.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
