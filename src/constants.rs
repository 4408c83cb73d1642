// src/constants.rs

/// The name of the project configuration file, searched in the working directory.
pub const CONFIG_FILENAME: &str = "pli.toml";

/// The default directory (relative to the working directory) holding template trees.
pub const DEFAULT_TEMPLATES_DIRNAME: &str = "templates";

/// The name of the directory containing pli's local state (inside the working directory).
pub const PLI_DIR: &str = ".pli";

/// The name of the compiled configuration cache (inside `.pli/cache/`).
pub const CONFIG_CACHE_FILENAME: &str = "config.cache.bin";

/// Upper bound for chained recomputation of derived variables.
pub const MAX_PROPAGATION_DEPTH: u32 = 32;

/// UI sort index given to the builtin output-directory variable so it is asked last.
pub const OUTPUT_DIRECTORY_UI_INDEX: i32 = 1000;
