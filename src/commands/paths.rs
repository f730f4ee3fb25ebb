use anyhow::Result;
use std::env;

use crate::archive::config::{PANDOC_BIN, RENDERER_BIN, load_config, resolve_config_path};
use crate::archive::paths::resolve_paths;
use crate::archive::render::RENDERER_INSTALL_HINT;
use crate::archive::util::resolve_bin;
use crate::commands::CommandReport;

include!(concat!(env!("OUT_DIR"), "/archive_env_keys.rs"));

fn set_env_overrides() -> Vec<(String, String)> {
    std::iter::once("CLAUDE_CONFIG_DIR")
        .chain(ARCHIVE_ENV_KEYS.iter().copied())
        .filter_map(|key| match env::var(key) {
            Ok(value) if !value.trim().is_empty() => Some((key.to_string(), value)),
            _ => None,
        })
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("paths");
    let paths = resolve_paths()?;
    report.detail(format!("claude_home={}", paths.claude_home.display()));
    report.detail(format!("projects_dir={}", paths.projects_dir.display()));
    report.detail(format!("plans_dir={}", paths.plans_dir.display()));
    report.detail(format!(
        "global_archive_dir={}",
        paths.global_archive_dir.display()
    ));
    report.detail(format!(
        "config={}",
        resolve_config_path(&paths.claude_home).display()
    ));

    match load_config(&paths.claude_home) {
        Ok(cfg) => {
            if !cfg.renderer.enabled {
                report.detail(format!("{RENDERER_BIN}=disabled"));
            } else if let Some(bin) = resolve_bin(&cfg.renderer.bin) {
                report.detail(format!("{RENDERER_BIN}={}", bin.display()));
            } else {
                report.issue(format!("{RENDERER_BIN}=missing ({RENDERER_INSTALL_HINT})"));
            }
            match resolve_bin(&cfg.pdf.pandoc_bin) {
                Some(bin) => report.detail(format!("{PANDOC_BIN}={}", bin.display())),
                None => report.issue(format!("{PANDOC_BIN}=missing (PDF export unavailable)")),
            }
        }
        Err(err) => report.issue(format!("config=invalid ({err:#})")),
    }

    for (key, value) in set_env_overrides() {
        report.detail(format!("env.{key}={value}"));
    }
    report.detail(format!("build_id={}", env!("BUILD_UUID")));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_cover_config_overrides() {
        for key in [
            "TRANSCRIPT_ARCHIVE_CONFIG",
            "TRANSCRIPT_ARCHIVE_DIR",
            "TRANSCRIPT_ARCHIVE_PLANS_DIR",
            "TRANSCRIPT_ARCHIVE_RENDERER_BIN",
            "TRANSCRIPT_ARCHIVE_PANDOC_BIN",
        ] {
            assert!(ARCHIVE_ENV_KEYS.contains(&key), "missing {key}");
        }
    }
}
