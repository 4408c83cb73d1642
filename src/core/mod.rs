// src/core/mod.rs

pub mod builtins;
pub mod compiler;
pub mod config_cache;
pub mod config_loader;
pub mod output_tree;
pub mod paths;
pub mod scope;
pub mod template;
pub mod template_engine;
pub mod template_entry;
pub mod tree_renderer;
pub mod variable;
