use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const RENDERER_BIN: &str = "claude-code-transcripts";
pub const PANDOC_BIN: &str = "pandoc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    pub enabled: bool,
    pub bin: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bin: RENDERER_BIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfConfig {
    pub pandoc_bin: String,
    pub engine: String,
    pub timeout_secs: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            pandoc_bin: PANDOC_BIN.to_string(),
            engine: "lualatex".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArchiveConfig {
    pub renderer: RendererConfig,
    pub pdf: PdfConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialArchiveConfig {
    renderer: Option<RendererConfig>,
    pdf: Option<PdfConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &ArchiveConfig) -> Result<()> {
    if cfg.renderer.bin.trim().is_empty() {
        return Err(anyhow!("invalid renderer bin: cannot be empty"));
    }
    if cfg.pdf.pandoc_bin.trim().is_empty() {
        return Err(anyhow!("invalid pandoc bin: cannot be empty"));
    }
    if cfg.pdf.engine.trim().is_empty() {
        return Err(anyhow!("invalid pdf engine: cannot be empty"));
    }
    if cfg.pdf.timeout_secs == 0 {
        return Err(anyhow!("invalid pdf timeout: must be >= 1 second"));
    }
    Ok(())
}

pub fn resolve_config_path(claude_home: &Path) -> PathBuf {
    if let Ok(custom) = env::var("TRANSCRIPT_ARCHIVE_CONFIG") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    claude_home.join("transcript-archive.toml")
}

fn merge_file_config(base: &mut ArchiveConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)?;
    let parsed: PartialArchiveConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse archive config {}: {err}", path.display()))?;
    if let Some(renderer) = parsed.renderer {
        base.renderer = renderer;
    }
    if let Some(pdf) = parsed.pdf {
        base.pdf = pdf;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ArchiveConfig) {
    cfg.renderer.enabled = env_or_bool("TRANSCRIPT_ARCHIVE_RENDERER", cfg.renderer.enabled);
    cfg.renderer.bin = env_or_string("TRANSCRIPT_ARCHIVE_RENDERER_BIN", &cfg.renderer.bin);
    cfg.pdf.pandoc_bin = env_or_string("TRANSCRIPT_ARCHIVE_PANDOC_BIN", &cfg.pdf.pandoc_bin);
    cfg.pdf.engine = env_or_string("TRANSCRIPT_ARCHIVE_PDF_ENGINE", &cfg.pdf.engine);
    cfg.pdf.timeout_secs = env_or_u64("TRANSCRIPT_ARCHIVE_PDF_TIMEOUT_SECS", cfg.pdf.timeout_secs);
}

pub fn load_config_from(path: &Path) -> Result<ArchiveConfig> {
    let mut cfg = ArchiveConfig::default();
    merge_file_config(&mut cfg, path)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(claude_home: &Path) -> Result<ArchiveConfig> {
    load_config_from(&resolve_config_path(claude_home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempdir().expect("tempdir");
        let cfg = load_config_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(cfg.renderer.bin, RENDERER_BIN);
        assert_eq!(cfg.pdf.engine, "lualatex");
        assert!(cfg.pdf.timeout_secs >= 1);
    }

    #[test]
    fn file_sections_replace_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("transcript-archive.toml");
        fs::write(
            &path,
            "[renderer]\nenabled = false\nbin = \"/opt/render\"\n\n[pdf]\npandoc_bin = \"/opt/pandoc\"\nengine = \"xelatex\"\ntimeout_secs = 30\n",
        )
        .expect("write");
        let mut cfg = ArchiveConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert!(!cfg.renderer.enabled);
        assert_eq!(cfg.renderer.bin, "/opt/render");
        assert_eq!(cfg.pdf.engine, "xelatex");
        assert_eq!(cfg.pdf.timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[pdf\n").expect("write");
        let err = merge_file_config(&mut ArchiveConfig::default(), &path)
            .expect_err("should fail");
        assert!(err.to_string().contains("failed to parse archive config"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = ArchiveConfig::default();
        cfg.pdf.timeout_secs = 0;
        assert!(validate(&cfg).is_err());
        cfg.pdf.timeout_secs = 1;
        cfg.renderer.bin = "  ".to_string();
        assert!(validate(&cfg).is_err());
    }
}
