use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

const APP_DIR: &str = "partexport";

/// User configuration file (`~/.config/partexport/config.toml`).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Log file location, falling back to the current directory.
pub fn log_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("partexport.log")
}

/// Temp-copy directory used when the config does not name one.
///
/// Fallback chain:
/// 1. `PARTEXPORT_WORK_DIR` env var
/// 2. `<cache dir>/partexport`
/// 3. `./temp`
pub fn default_work_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARTEXPORT_WORK_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("temp"))
}

/// Replace characters that cannot appear in a file name on common platforms,
/// along with the ones a shell expands inside double quotes.
pub fn sanitize_file_component(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE
        .get_or_init(|| Regex::new(r#"[/\\:*?"<>|$`%!\x00-\x1f]"#).expect("valid file-name pattern"));
    re.replace_all(name, "_").into_owned()
}

/// Double-quote `arg` for the platform shell. On unix the characters `sh`
/// still interprets between double quotes are backslash-escaped.
pub fn shell_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if cfg!(unix) && matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// File stem of a variant: `<base>-<label>`.
pub fn variant_stem(base_name: &str, label: &str) -> String {
    format!("{}-{}", base_name, sanitize_file_component(label))
}

/// Split an input path into (stem, extension), defaulting the extension to `mscz`.
pub fn stem_and_extension(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "score".to_string());
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mscz".to_string());
    (stem, ext)
}
