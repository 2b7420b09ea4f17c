//! Pattern profiles: per-tool JSON/YAML documents resolved with fallback to a default.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::defaults::{
    DEFAULT_IDLE_THRESHOLD_MS, DEFAULT_PROFILE_NAME, FALLBACK_THINKING_PATTERNS,
    FALLBACK_WAITING_PATTERNS, PROFILE_EXTENSIONS,
};
use crate::error::ProfileError;
use crate::log_debug;

/// An RGB triple as the indicator understands it.
pub type Rgb = [u8; 3];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct PatternLists {
    pub waiting: Vec<String>,
    pub thinking: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndicatorColors {
    pub idle: Rgb,
    pub thinking: Rgb,
    pub waiting: Rgb,
}

impl Default for IndicatorColors {
    fn default() -> Self {
        Self {
            idle: [0, 0, 255],
            thinking: [255, 255, 0],
            waiting: [255, 0, 0],
        }
    }
}

/// Parsed profile document. Every field is optional in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PatternProfile {
    pub patterns: PatternLists,
    #[serde(alias = "idleThresholdMs")]
    pub idle_threshold_ms: u64,
    pub colors: IndicatorColors,
}

impl Default for PatternProfile {
    fn default() -> Self {
        Self {
            patterns: PatternLists::default(),
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            colors: IndicatorColors::default(),
        }
    }
}

impl PatternProfile {
    /// Profile used when no document could be loaded.
    pub fn builtin() -> Self {
        Self {
            patterns: PatternLists {
                waiting: FALLBACK_WAITING_PATTERNS
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                thinking: FALLBACK_THINKING_PATTERNS
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    Tool(PathBuf),
    Default(PathBuf),
    Builtin,
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileSource::Tool(path) => write!(f, "tool profile {}", path.display()),
            ProfileSource::Default(path) => write!(f, "default profile {}", path.display()),
            ProfileSource::Builtin => write!(f, "built-in profile"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub profile: PatternProfile,
    pub source: ProfileSource,
}

/// Candidate files in resolution order: tool-specific first, then the default profile.
pub fn profile_candidates(config_dir: &Path, tool_name: &str) -> Vec<ProfileSource> {
    let mut candidates = Vec::with_capacity(PROFILE_EXTENSIONS.len() * 2);
    let tool_name = tool_name.trim();
    if !tool_name.is_empty() && tool_name != DEFAULT_PROFILE_NAME && is_plain_name(tool_name) {
        for ext in PROFILE_EXTENSIONS {
            candidates.push(ProfileSource::Tool(
                config_dir.join(format!("{tool_name}.{ext}")),
            ));
        }
    }
    for ext in PROFILE_EXTENSIONS {
        candidates.push(ProfileSource::Default(
            config_dir.join(format!("{DEFAULT_PROFILE_NAME}.{ext}")),
        ));
    }
    candidates
}

/// Resolve the profile for `tool_name`: tool document, then default document, then built-in.
///
/// Missing files are skipped silently; unreadable or malformed ones are logged and skipped.
pub fn load_profile(config_dir: &Path, tool_name: &str) -> ResolvedProfile {
    for source in profile_candidates(config_dir, tool_name) {
        let path = match &source {
            ProfileSource::Tool(path) | ProfileSource::Default(path) => path,
            ProfileSource::Builtin => continue,
        };
        match read_profile(path) {
            Ok(Some(profile)) => {
                log_debug(&format!("loaded {source}"));
                return ResolvedProfile { profile, source };
            }
            Ok(None) => {}
            Err(err) => {
                log_debug(&format!("skipping profile: {err}"));
                tracing::warn!(error = %err, "skipping unusable profile");
            }
        }
    }
    log_debug("no profile document found; using built-in patterns");
    ResolvedProfile {
        profile: PatternProfile::builtin(),
        source: ProfileSource::Builtin,
    }
}

fn read_profile(path: &Path) -> Result<Option<PatternProfile>, ProfileError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ProfileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_profile(path, &raw).map(Some)
}

pub(super) fn parse_profile(path: &Path, raw: &str) -> Result<PatternProfile, ProfileError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(raw).map_err(|source| ProfileError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(raw).map_err(|source| ProfileError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Tool names come from argv; keep them from walking out of the config dir.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_config_dir(label: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = env::temp_dir().join(format!("statuslight_{label}_{unique}"));
        fs::create_dir_all(&dir).expect("create temp config dir");
        dir
    }

    #[test]
    fn candidates_prefer_tool_then_default() {
        let dir = Path::new("/cfg");
        let candidates = profile_candidates(dir, "claude");
        assert_eq!(
            candidates.first(),
            Some(&ProfileSource::Tool(dir.join("claude.json")))
        );
        assert_eq!(candidates.len(), 6);
        assert_eq!(
            candidates.last(),
            Some(&ProfileSource::Default(dir.join("default.yml")))
        );
    }

    #[test]
    fn candidates_skip_tool_names_with_separators() {
        let candidates = profile_candidates(Path::new("/cfg"), "../etc/passwd");
        assert!(candidates
            .iter()
            .all(|candidate| matches!(candidate, ProfileSource::Default(_))));
    }

    #[test]
    fn load_profile_uses_tool_document() {
        let dir = temp_config_dir("tool_doc");
        fs::write(
            dir.join("claude.json"),
            r#"{"patterns":{"waiting":["\\(y/n\\)"],"thinking":["Building"]},"idle_threshold_ms":400}"#,
        )
        .unwrap();
        fs::write(dir.join("default.yaml"), "idle_threshold_ms: 900\n").unwrap();

        let resolved = load_profile(&dir, "claude");
        assert_eq!(resolved.source, ProfileSource::Tool(dir.join("claude.json")));
        assert_eq!(resolved.profile.patterns.waiting, vec![r"\(y/n\)"]);
        assert_eq!(resolved.profile.patterns.thinking, vec!["Building"]);
        assert_eq!(resolved.profile.idle_threshold_ms, 400);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_profile_falls_back_to_default_yaml() {
        let dir = temp_config_dir("default_yaml");
        fs::write(
            dir.join("default.yaml"),
            "patterns:\n  waiting:\n    - 'Continue\\?'\nidle_threshold_ms: 750\ncolors:\n  idle: [0, 255, 0]\n",
        )
        .unwrap();

        let resolved = load_profile(&dir, "aider");
        assert_eq!(
            resolved.source,
            ProfileSource::Default(dir.join("default.yaml"))
        );
        assert_eq!(resolved.profile.patterns.waiting, vec![r"Continue\?"]);
        assert!(resolved.profile.patterns.thinking.is_empty());
        assert_eq!(resolved.profile.idle_threshold_ms, 750);
        assert_eq!(resolved.profile.colors.idle, [0, 255, 0]);
        assert_eq!(resolved.profile.colors.waiting, [255, 0, 0]);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_profile_skips_malformed_document() {
        let dir = temp_config_dir("malformed");
        fs::write(dir.join("claude.json"), "{ not json").unwrap();
        fs::write(dir.join("default.json"), r#"{"idleThresholdMs": 650}"#).unwrap();

        let resolved = load_profile(&dir, "claude");
        assert_eq!(
            resolved.source,
            ProfileSource::Default(dir.join("default.json"))
        );
        assert_eq!(resolved.profile.idle_threshold_ms, 650);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_profile_uses_builtin_when_nothing_is_found() {
        let dir = temp_config_dir("empty");
        let resolved = load_profile(&dir, "codex");
        assert_eq!(resolved.source, ProfileSource::Builtin);
        assert_eq!(resolved.profile, PatternProfile::builtin());
        assert_eq!(resolved.profile.idle_threshold_ms, DEFAULT_IDLE_THRESHOLD_MS);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_pattern_lists_are_accepted() {
        let profile =
            parse_profile(Path::new("x.json"), r#"{"patterns":{"waiting":[]}}"#).unwrap();
        assert!(profile.patterns.waiting.is_empty());
        assert!(profile.patterns.thinking.is_empty());
    }
}
