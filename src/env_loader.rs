use std::env;
use std::path::PathBuf;

const DOTENV_FILE: &str = "transcript-archive.env";

fn fallback_dotenv_path(
    claude_config_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    let base = claude_config_dir.or_else(|| home_dir.map(|home| home.join(".claude")))?;
    Some(base.join(DOTENV_FILE))
}

/// Load `.env` from the working directory, else the archiver's env file in
/// the Claude config directory. Existing variables are never overridden.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("CLAUDE_CONFIG_DIR").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
