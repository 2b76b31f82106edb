use anyhow::Result;
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::{DEFAULT_TIMEOUT_SECS, HttpClient};
use crate::release::{DEFAULT_BASE_URL, ReleaseTable, load_manifest};
use crate::runtime::Runtime;

use super::paths::{InstallLayout, resolve_layout};

/// Installer settings gathered from the command line and environment.
#[derive(Debug, Clone, Default)]
pub struct InstallerSettings {
    pub root: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub releases: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved configuration an [`Installer`](super::Installer) is built from.
pub struct InstallerConfig {
    pub layout: InstallLayout,
    pub table: ReleaseTable,
    pub http: HttpClient,
}

impl InstallerConfig {
    pub fn new<R: Runtime>(runtime: &R, settings: InstallerSettings) -> Result<Self> {
        let layout = resolve_layout(runtime, settings.root, settings.bin_dir)?;

        let base_url = settings
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let table = match settings.releases {
            Some(path) => {
                debug!("Loading release table from {:?}", path);
                load_manifest(runtime, &path, &base_url)?
            }
            None => ReleaseTable::builtin(&base_url),
        };

        let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        debug!("Download timeout: {:?}", timeout);
        let http = HttpClient::with_timeout(timeout)?;

        Ok(Self {
            layout,
            table,
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{test_bin_dir, test_home, test_root};
    use mockall::predicate::eq;

    #[test]
    fn test_config_defaults() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_privileged().returning(|| false);
        runtime.expect_home_dir().returning(|| Some(test_home()));

        let config = InstallerConfig::new(&runtime, InstallerSettings::default()).unwrap();
        assert_eq!(config.layout.root, test_home().join(".superqode"));
        assert!(
            config
                .table
                .lookup("0.1.5", Platform::LinuxArm64)
                .unwrap()
                .url
                .starts_with(DEFAULT_BASE_URL)
        );
    }

    #[test]
    fn test_config_base_url_override() {
        let runtime = MockRuntime::new();
        let settings = InstallerSettings {
            root: Some(test_root()),
            bin_dir: Some(test_bin_dir()),
            base_url: Some("http://mirror.local/superqode".into()),
            ..Default::default()
        };

        let config = InstallerConfig::new(&runtime, settings).unwrap();
        assert_eq!(
            config.table.lookup("0.1.4", Platform::MacosArm64).unwrap().url,
            "http://mirror.local/superqode/v0.1.4/superqode-0.1.4-macos-arm64.tar.gz"
        );
    }

    #[test]
    fn test_config_loads_manifest() {
        let mut runtime = MockRuntime::new();
        let manifest = PathBuf::from("/etc/superqode/releases.json");
        runtime
            .expect_read_to_string()
            .with(eq(manifest.clone()))
            .returning(|_| {
                Ok(format!(
                    r#"[{{"version": "0.2.0", "platform": "linux-x86_64", "sha256": "{}"}}]"#,
                    "a".repeat(64)
                ))
            });

        let settings = InstallerSettings {
            root: Some(test_root()),
            bin_dir: Some(test_bin_dir()),
            releases: Some(manifest),
            timeout_secs: Some(5),
            ..Default::default()
        };

        let config = InstallerConfig::new(&runtime, settings).unwrap();
        assert_eq!(config.table.descriptors().len(), 1);
        assert!(config.table.lookup("0.1.5", Platform::LinuxArm64).is_err());
    }
}
