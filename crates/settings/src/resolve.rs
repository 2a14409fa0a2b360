//! Configuration document → [`PublisherSettings`].
//!
//! The document is deserialized into [`RawSettings`], which accepts the
//! loose shapes found in hand-written files (string ports, `"True"` flags,
//! string-or-object targets). Required fields, ranges and paths are then
//! checked on the typed record.

use std::path::{Component, Path};

use driverpub_archive::{FileFilter, TargetSource, normalize_relative};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::types::{Credentials, PublisherSettings, ServerEndpoint, TargetSpec};
use crate::{DEFAULT_DOMAIN, DEFAULT_PORT, DEPLOYMENT_SETTINGS_FILE_NAME};

const KNOWN_KEYS: &[&str] = &[
    "serverRootAddress",
    "port",
    "username",
    "password",
    "domain",
    "driverUniqueName",
    "sourceRootFolder",
    "runFromLocalProject",
    "waitForDebugger",
    "fileFilters",
    "drivers",
    "scripts",
];

/// `deployment.json` as written on disk.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default)]
    server_root_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_port")]
    port: Option<i64>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    driver_unique_name: Option<String>,
    #[serde(default)]
    source_root_folder: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    run_from_local_project: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    wait_for_debugger: Option<bool>,
    #[serde(default)]
    file_filters: Option<Vec<RawFilter>>,
    #[serde(default)]
    drivers: Option<RawTarget>,
    #[serde(default)]
    scripts: Option<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawFilter {
    pattern: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    include: Option<bool>,
}

/// A `drivers`/`scripts` target: a directory, or an object with optional
/// `name`, `path` and `files`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Path(String),
    Spec {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        files: Vec<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

/// Accepts JSON booleans and the strings `true`/`false` in any case.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::Text(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(BoolOrString::Text(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(BoolOrString::Text(s)) => Err(serde::de::Error::custom(format!(
            "expected true or false, got {s:?}"
        ))),
    }
}

/// Accepts an integer or a decimal string; the range is checked later.
fn lenient_port<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let port = match Option::<NumberOrString>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(NumberOrString::Number(n)) => n.as_i64().ok_or_else(|| n.to_string()),
        Some(NumberOrString::Text(s)) => s.trim().parse::<i64>().map_err(|_| format!("{s:?}")),
    };
    port.map(Some).map_err(|got| {
        serde::de::Error::custom(format!("port: expected an integer, got {got}"))
    })
}

/// Reads and resolves `deployment.json` from `project_root`.
pub fn load_settings(project_root: &Path) -> Result<PublisherSettings, ConfigError> {
    let path = project_root.join(DEPLOYMENT_SETTINGS_FILE_NAME);
    if !path.is_file() {
        return Err(ConfigError::MissingFile(path));
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "loaded deployment settings");
    resolve(&doc)
}

/// Validates a parsed configuration document.
///
/// Fails on the first missing or malformed field; no partial settings are
/// produced.
pub fn resolve(doc: &Value) -> Result<PublisherSettings, ConfigError> {
    let obj = doc.as_object().ok_or(ConfigError::NotAnObject)?;
    for key in obj.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!(key = %key, "ignoring unknown settings key");
        }
    }

    let raw = RawSettings::deserialize(doc)?;

    let host = required("serverRootAddress", raw.server_root_address)?;
    let driver_unique_name = required("driverUniqueName", raw.driver_unique_name)?;

    let port = match raw.port {
        None => DEFAULT_PORT,
        Some(p) => u16::try_from(p).ok().filter(|p| *p > 0).ok_or_else(|| {
            ConfigError::invalid("port", format!("expected a positive port number, got {p}"))
        })?,
    };

    let credentials = Credentials {
        username: raw.username.unwrap_or_default(),
        password: raw.password.unwrap_or_default(),
        domain: raw
            .domain
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
    };

    let source_root_folder = raw
        .source_root_folder
        .map(|s| normalize_relative(s.trim()))
        .filter(|s| !s.is_empty());
    if let Some(folder) = &source_root_folder {
        check_relative("sourceRootFolder", folder)?;
    }

    let settings = PublisherSettings {
        server: ServerEndpoint { host, port },
        credentials,
        driver_unique_name,
        source_root_folder,
        file_filters: compile_filters(raw.file_filters.unwrap_or_default())?,
        run_from_local_project: raw.run_from_local_project.unwrap_or(false),
        wait_for_debugger: raw.wait_for_debugger.unwrap_or(false),
        drivers: raw.drivers.map(|t| target("drivers", t)).transpose()?,
        scripts: raw.scripts.map(|t| target("scripts", t)).transpose()?,
    };

    debug!(
        server = %settings.server,
        driver = %settings.driver_unique_name,
        filters = settings.file_filters.len(),
        split_targets = settings.has_split_targets(),
        "settings resolved"
    );
    Ok(settings)
}

fn required(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ConfigError::MissingField(key)),
    }
}

fn compile_filters(raw: Vec<RawFilter>) -> Result<Vec<FileFilter>, ConfigError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, filter)| {
            let key = format!("fileFilters[{i}]");
            if filter.pattern.is_empty() {
                return Err(ConfigError::invalid(key, "missing pattern"));
            }
            FileFilter::new(&filter.pattern, filter.include.unwrap_or(true))
                .map_err(|e| ConfigError::invalid(key, e.to_string()))
        })
        .collect()
}

fn target(key: &str, raw: RawTarget) -> Result<TargetSpec, ConfigError> {
    let (name, path, files) = match raw {
        RawTarget::Path(path) => (None, path, Vec::new()),
        RawTarget::Spec { name, path, files } => (
            name.filter(|n| !n.trim().is_empty()),
            path.unwrap_or_default(),
            files,
        ),
    };

    let path = normalize_relative(path.trim());
    if !path.is_empty() {
        check_relative(key, &path)?;
    }

    let source = if files.is_empty() {
        TargetSource::Directory(path)
    } else {
        TargetSource::Files { base: path, files }
    };
    Ok(TargetSpec { name, source })
}

/// Rejects absolute paths and `..` so targets stay inside the project.
fn check_relative(key: &str, path: &str) -> Result<(), ConfigError> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConfigError::invalid(
            key,
            format!("must be a path inside the project, got {path:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "serverRootAddress": "cloudshell.local",
            "driverUniqueName": "MyDriver"
        })
    }

    #[test]
    fn resolves_minimal_document_with_defaults() {
        let settings = resolve(&minimal()).unwrap();

        assert_eq!(settings.server.host, "cloudshell.local");
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.driver_unique_name, "MyDriver");
        assert_eq!(settings.credentials.domain, DEFAULT_DOMAIN);
        assert!(settings.credentials.username.is_empty());
        assert!(settings.source_root_folder.is_none());
        assert!(settings.file_filters.is_empty());
        assert!(!settings.run_from_local_project);
        assert!(!settings.wait_for_debugger);
        assert!(!settings.has_split_targets());
    }

    #[test]
    fn resolves_full_document() {
        let doc = json!({
            "serverRootAddress": "10.0.0.5",
            "port": "8029",
            "username": "admin",
            "password": "secret",
            "domain": "Lab",
            "driverUniqueName": "PduDriver",
            "sourceRootFolder": "src",
            "runFromLocalProject": "TRUE",
            "waitForDebugger": false,
            "fileFilters": [
                { "pattern": "**/*.py", "include": true },
                { "pattern": "**/test_*.py", "include": "False" }
            ]
        });
        let settings = resolve(&doc).unwrap();

        assert_eq!(settings.server.port, 8029);
        assert_eq!(settings.credentials.username, "admin");
        assert_eq!(settings.credentials.password, "secret");
        assert_eq!(settings.credentials.domain, "Lab");
        assert_eq!(settings.source_root_folder.as_deref(), Some("src"));
        assert!(settings.run_from_local_project);
        assert!(!settings.wait_for_debugger);
        assert_eq!(settings.file_filters.len(), 2);
        assert!(settings.file_filters[0].is_include());
        assert!(!settings.file_filters[1].is_include());
        assert_eq!(settings.file_filters[1].pattern(), "**/test_*.py");
    }

    #[test]
    fn missing_driver_name_fails() {
        let doc = json!({ "serverRootAddress": "cs" });
        assert!(matches!(
            resolve(&doc),
            Err(ConfigError::MissingField("driverUniqueName"))
        ));
    }

    #[test]
    fn blank_server_address_fails() {
        let doc = json!({ "serverRootAddress": "  ", "driverUniqueName": "D" });
        assert!(matches!(
            resolve(&doc),
            Err(ConfigError::MissingField("serverRootAddress"))
        ));
    }

    #[test]
    fn rejects_out_of_range_ports() {
        for port in [json!(0), json!(-1), json!("70000"), json!(70000)] {
            let mut doc = minimal();
            doc["port"] = port.clone();
            let err = resolve(&doc).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidField { ref key, .. } if key == "port"),
                "port {port} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn rejects_non_integer_ports() {
        for port in [json!("abc"), json!(80.5), json!(true)] {
            let mut doc = minimal();
            doc["port"] = port.clone();
            let err = resolve(&doc).unwrap_err();
            assert!(
                matches!(err, ConfigError::Parse(_)),
                "port {port} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn rejects_bool_outside_vocabulary() {
        let mut doc = minimal();
        doc["waitForDebugger"] = json!("yes");
        let err = resolve(&doc).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("expected true or false"));
    }

    #[test]
    fn rejects_invalid_filter_pattern() {
        let mut doc = minimal();
        doc["fileFilters"] = json!([{ "pattern": "a**b" }]);
        let err = resolve(&doc).unwrap_err();
        assert!(err.to_string().contains("fileFilters[0]"));
    }

    #[test]
    fn filter_include_defaults_to_true() {
        let mut doc = minimal();
        doc["fileFilters"] = json!([{ "pattern": "*.py" }]);
        let settings = resolve(&doc).unwrap();
        assert!(settings.file_filters[0].is_include());
    }

    #[test]
    fn rejects_escaping_source_root() {
        let mut doc = minimal();
        doc["sourceRootFolder"] = json!("../elsewhere");
        assert!(matches!(
            resolve(&doc),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn empty_source_root_means_project_root() {
        let mut doc = minimal();
        doc["sourceRootFolder"] = json!("");
        let settings = resolve(&doc).unwrap();
        assert!(settings.source_root_folder.is_none());
    }

    #[test]
    fn parses_split_targets() {
        let mut doc = minimal();
        doc["drivers"] = json!("drivers");
        doc["scripts"] = json!({ "path": "scripts", "files": ["setup.py", "teardown.py"] });
        let settings = resolve(&doc).unwrap();

        assert!(settings.has_split_targets());
        assert_eq!(
            settings.drivers.unwrap().source,
            TargetSource::Directory("drivers".into())
        );
        assert_eq!(
            settings.scripts.unwrap().source,
            TargetSource::Files {
                base: "scripts".into(),
                files: vec!["setup.py".into(), "teardown.py".into()],
            }
        );
    }

    #[test]
    fn rejects_non_object_document() {
        assert!(matches!(
            resolve(&json!(["not", "an", "object"])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn load_settings_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_settings(dir.path()),
            Err(ConfigError::MissingFile(_))
        ));
    }

    #[test]
    fn load_settings_reads_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEPLOYMENT_SETTINGS_FILE_NAME),
            minimal().to_string(),
        )
        .unwrap();

        let settings = load_settings(dir.path()).unwrap();
        assert_eq!(settings.driver_unique_name, "MyDriver");
    }

    #[test]
    fn load_settings_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEPLOYMENT_SETTINGS_FILE_NAME), "{ nope").unwrap();
        assert!(matches!(
            load_settings(dir.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn null_values_fall_back_to_defaults() {
        let mut doc = minimal();
        doc["port"] = json!(null);
        doc["runFromLocalProject"] = json!(null);
        doc["fileFilters"] = json!(null);
        doc["drivers"] = json!(null);
        let settings = resolve(&doc).unwrap();

        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert!(!settings.run_from_local_project);
        assert!(settings.file_filters.is_empty());
        assert!(settings.drivers.is_none());
    }

    #[test]
    fn target_object_carries_name_override() {
        let mut doc = minimal();
        doc["drivers"] = json!({ "name": "PduDriverV2", "path": "./driver" });
        let drivers = resolve(&doc).unwrap().drivers.unwrap();

        assert_eq!(drivers.name.as_deref(), Some("PduDriverV2"));
        assert_eq!(drivers.source, TargetSource::Directory("driver".into()));
    }

    #[test]
    fn rejects_target_of_wrong_shape() {
        let mut doc = minimal();
        doc["scripts"] = json!(42);
        assert!(matches!(resolve(&doc), Err(ConfigError::Parse(_))));

        doc["scripts"] = json!("/etc");
        assert!(matches!(
            resolve(&doc),
            Err(ConfigError::InvalidField { ref key, .. }) if key == "scripts"
        ));
    }

    #[test]
    fn wrong_string_type_is_parse_error() {
        let mut doc = minimal();
        doc["username"] = json!(7);
        assert!(matches!(resolve(&doc), Err(ConfigError::Parse(_))));
    }
}
