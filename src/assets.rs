//! Files embedded into the binary and written out for external tools.

/// LaTeX header passed to pandoc via `--include-in-header`.
pub const PDF_HEADER_TEX: &str = include_str!("../assets/pdf_header.tex");

/// Pandoc Lua filter turning `data-speaker` divs into framed speaker turns.
pub const SPEAKER_LUA_FILTER: &str = include_str!("../assets/speaker.lua");
