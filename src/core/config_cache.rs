// src/core/config_cache.rs

//! Binary cache of the compiled `pli.toml`.
//!
//! The cache file holds an lz4 compressed bincode encoding of the compiled
//! configuration. It is keyed by a truncated blake3 hash of the `pli.toml`
//! bytes, so any edit of the file invalidates it.

use crate::core::compiler;
use crate::models::CompiledConfig;
use anyhow::{Context, Result, anyhow};
use log::{debug, trace, warn};
use std::fs;
use std::path::Path;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Truncated blake3 hash of `content`, hex encoded.
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    let bytes = hash.as_bytes();
    hex::encode(bytes.get(..HASH_TRUNCATE_LENGTH).unwrap_or(bytes))
}

/// Returns the compiled form of `content` (the text of `config_path`),
/// reusing the cache at `cache_path` when its hash still matches.
///
/// A cache that cannot be read is ignored; one that cannot be written only
/// produces a warning.
pub(crate) fn load_compiled_config(
    content: &str,
    config_path: &Path,
    cache_path: Option<&Path>,
) -> Result<CompiledConfig> {
    let hash = content_hash(content.as_bytes());

    if let Some(cache_path) = cache_path {
        match read_cached_config(cache_path) {
            Ok(cached) if cached.source_hash == hash => {
                debug!("Config cache hit for '{}'", config_path.display());
                return Ok(cached);
            }
            Ok(_) => debug!("Config cache for '{}' is stale", config_path.display()),
            Err(e) => trace!("No usable config cache: {}", e),
        }
    }

    let parsed = compiler::parse_config(content, config_path)?;
    let compiled = compiler::compile_config(parsed, hash)?;

    if let Some(cache_path) = cache_path
        && let Err(e) = write_cached_config(cache_path, &compiled)
    {
        warn!("Could not write config cache: {:#}", e);
    }
    Ok(compiled)
}

/// Reads and decodes a cache file.
pub(crate) fn read_cached_config(path: &Path) -> Result<CompiledConfig> {
    let compressed_bytes = fs::read(path)
        .with_context(|| format!("Failed to read cache file at '{}'", path.display()))?;

    if compressed_bytes.is_empty() {
        return Err(anyhow!("Cache file is empty."));
    }

    let decompressed_bytes = lz4_flex::decompress_size_prepended(&compressed_bytes)
        .map_err(|e| anyhow!("Failed to decompress cache file: {}. It might be corrupt.", e))?;
    trace!(
        "Decompressed config cache from {} to {} bytes.",
        compressed_bytes.len(),
        decompressed_bytes.len()
    );

    let (config, _): (CompiledConfig, usize) =
        bincode::serde::decode_from_slice(&decompressed_bytes, bincode::config::standard())
            .context("Failed to decode the config cache. It is likely from an incompatible version of pli.")?;
    Ok(config)
}

/// Encodes and writes a cache file, creating its directory when needed.
pub(crate) fn write_cached_config(path: &Path, config: &CompiledConfig) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir).with_context(|| {
            format!("Failed to create cache directory '{}'", parent_dir.display())
        })?;
    }

    let raw_bytes = bincode::serde::encode_to_vec(config, bincode::config::standard())
        .context("Failed to encode the config cache.")?;
    let compressed_bytes = lz4_flex::compress_prepend_size(&raw_bytes);
    trace!(
        "Compressed config cache from {} to {} bytes.",
        raw_bytes.len(),
        compressed_bytes.len()
    );

    fs::write(path, &compressed_bytes)
        .with_context(|| format!("Failed to write cache file to '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
        [[templates]]
        id = "t"
        [[templates.variables]]
        name = "N"
        default = 2
        transform = [{ multiply = 2.0 }]
    "#;

    #[test]
    fn test_content_hash_is_stable_and_truncated() {
        let hash = content_hash(b"hello world");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, content_hash(b"hello world"));
        assert_ne!(hash, content_hash(b"hello world!"));
    }

    #[test]
    fn test_cache_is_written_and_reused() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join(".pli").join("cache").join("config.cache.bin");
        let config_path = dir.path().join("pli.toml");

        // --- Execute ---
        let first = load_compiled_config(CONFIG, &config_path, Some(&cache_path)).unwrap();
        let cached = read_cached_config(&cache_path).unwrap();

        // --- Assert ---
        assert_eq!(cached.source_hash, first.source_hash);
        let variable = cached.templates.first().unwrap().variables.first().unwrap();
        assert_eq!(variable.name, "N");
        assert_eq!(
            variable.default,
            Some(crate::models::VariableValue::Number(2.0))
        );
    }

    #[test]
    fn test_stale_cache_is_recompiled() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("config.cache.bin");
        let config_path = dir.path().join("pli.toml");
        load_compiled_config(CONFIG, &config_path, Some(&cache_path)).unwrap();

        let edited = format!("{CONFIG}\n[[templates]]\nid = \"u\"\n");
        let second = load_compiled_config(&edited, &config_path, Some(&cache_path)).unwrap();

        assert_eq!(second.templates.len(), 2);
        assert_eq!(read_cached_config(&cache_path).unwrap().templates.len(), 2);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("config.cache.bin");
        fs::write(&cache_path, b"not a cache").unwrap();

        let config =
            load_compiled_config(CONFIG, &dir.path().join("pli.toml"), Some(&cache_path)).unwrap();

        assert_eq!(config.templates.len(), 1);
    }
}
