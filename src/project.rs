use std::path::Path;

/// Site config files, any of which marks a directory as a Hugo project.
pub const HUGO_CONFIG_FILES: &[&str] = &[
    "hugo.toml",
    "hugo.yaml",
    "hugo.json",
    "config.toml",
    "config.yaml",
    "config.json",
];

pub fn is_hugo_project(dir: &Path) -> bool {
    HUGO_CONFIG_FILES.iter().any(|f| dir.join(f).is_file())
}
