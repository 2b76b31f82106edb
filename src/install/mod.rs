//! Install orchestration: platform resolution, download, integrity check,
//! extraction and linking.

mod config;
mod manage;
mod paths;
mod symlink;
mod verify;

use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::ArchiveExtractor;
use crate::cleanup::{CleanupGuard, SharedCleanupContext, new_shared};
use crate::download::download_file;
use crate::error::{InstallError, Result};
use crate::http::{HttpClient, HttpStatusError};
use crate::platform::{Platform, PlatformDetector};
use crate::release::version::normalize_version;
use crate::release::{ReleaseDescriptor, ReleaseTable};
use crate::runtime::Runtime;

pub use config::{InstallerConfig, InstallerSettings};
pub use manage::{InstalledVersion, current_version, list_installed, uninstall, use_version};
pub use paths::{
    EXECUTABLE_NAME, InstallLayout, default_bin_dir, default_install_root, resolve_layout,
};
pub use symlink::replace_link;
pub use verify::{VERSION_FLAG, verify_executable};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reinstall an existing version and replace a link not owned by this root.
    pub force: bool,
}

/// Outcome of a successful [`Installer::install`].
#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub version: String,
    pub platform: Platform,
    pub install_dir: PathBuf,
    pub executable: PathBuf,
    pub link: PathBuf,
    /// The version directory was already present and only the link was updated.
    pub already_installed: bool,
}

pub struct Installer<R: Runtime, D: PlatformDetector, E: ArchiveExtractor> {
    pub runtime: R,
    pub detector: D,
    pub extractor: E,
    pub http_client: HttpClient,
    pub table: ReleaseTable,
    pub layout: InstallLayout,
}

impl<R: Runtime + 'static, D: PlatformDetector, E: ArchiveExtractor> Installer<R, D, E> {
    #[tracing::instrument(skip(runtime, detector, extractor, config))]
    pub fn new(runtime: R, detector: D, extractor: E, config: InstallerConfig) -> Self {
        Self {
            runtime,
            detector,
            extractor,
            http_client: config.http,
            table: config.table,
            layout: config.layout,
        }
    }

    /// Platform of the running host, provided the release table covers it.
    #[tracing::instrument(skip(self))]
    pub fn resolve_platform(&self) -> Result<Platform> {
        let host = self.detector.detect();
        debug!("Detected host {}-{}", host.os, host.arch);

        match Platform::from_host(&host) {
            Some(platform) if self.table.supports(platform) => Ok(platform),
            _ => Err(InstallError::UnsupportedPlatform {
                os: host.os,
                arch: host.arch,
            }),
        }
    }

    /// Install `version` (the newest published one when `None`) and point
    /// the public link at it.
    ///
    /// The link is only touched after the archive has been downloaded,
    /// verified against its pinned digest and fully extracted into place.
    #[tracing::instrument(skip(self))]
    pub async fn install(
        &self,
        version: Option<&str>,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let platform = self.resolve_platform()?;
        let descriptor = self.table.select(version, platform)?;
        let version = normalize_version(&descriptor.version).to_string();
        info!("Selected superqode {} for {}", version, platform);

        let install_dir = self.layout.version_dir(&version);
        let executable = InstallLayout::executable_in(&install_dir);

        let already_installed = !options.force && self.runtime.exists(&executable);
        if already_installed {
            println!("   superqode {} is already installed", version);
        } else {
            self.stage_with_interrupt_cleanup(descriptor, &version, &install_dir)
                .await?;
        }

        let link = self.layout.link_path();
        let changed = replace_link(
            &self.runtime,
            &executable,
            &link,
            &self.layout.versions_dir(),
            options.force,
        )
        .map_err(|e| InstallError::symlink(&link, e))?;
        if changed {
            println!("     linked {} -> {}", link.display(), executable.display());
        }

        Ok(InstallReport {
            version,
            platform,
            install_dir,
            executable,
            link,
            already_installed,
        })
    }

    /// Run `<bin>/superqode --version` and return what it reported.
    #[tracing::instrument(skip(self))]
    pub fn verify(&self, expected_version: Option<&str>) -> Result<String> {
        verify_executable(&self.runtime, &self.layout.link_path(), expected_version)
    }

    pub fn list_installed(&self) -> Result<Vec<InstalledVersion>> {
        list_installed(&self.runtime, &self.layout)
    }

    pub fn use_version(&self, version: &str, force: bool) -> Result<PathBuf> {
        use_version(&self.runtime, &self.layout, version, force)
    }

    pub fn uninstall(&self, version: &str, force: bool) -> Result<()> {
        uninstall(&self.runtime, &self.layout, version, force)
    }

    /// Published releases for the running platform, newest first.
    pub fn releases(&self) -> Result<(Platform, Vec<&ReleaseDescriptor>)> {
        let platform = self.resolve_platform()?;
        Ok((platform, self.table.for_platform(platform)))
    }

    async fn stage_with_interrupt_cleanup(
        &self,
        descriptor: &ReleaseDescriptor,
        version: &str,
        install_dir: &Path,
    ) -> Result<()> {
        let cleanup_ctx = new_shared();
        let cleanup_ctx_clone = Arc::clone(&cleanup_ctx);

        let ctrl_c_handler = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, cleaning up...");
                cleanup_ctx_clone.lock().unwrap().cleanup();
                std::process::exit(130);
            }
        });

        let result = self
            .stage(descriptor, version, install_dir, Arc::clone(&cleanup_ctx))
            .await;

        ctrl_c_handler.abort();

        if result.is_err() {
            debug!("Install failed, removing staging files");
            cleanup_ctx.lock().unwrap().cleanup();
        }
        self.remove_tmp_dir_if_empty();

        result
    }

    /// Download, verify and extract into `<root>/tmp`, then move the result
    /// to `install_dir`.
    async fn stage(
        &self,
        descriptor: &ReleaseDescriptor,
        version: &str,
        install_dir: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<()> {
        let tmp_dir = self.layout.tmp_dir();
        self.runtime
            .create_dir_all(&tmp_dir)
            .with_context(|| format!("Failed to create staging directory {:?}", tmp_dir))?;

        let archive = CleanupGuard::new(
            Arc::clone(&cleanup_ctx),
            tmp_dir.join(descriptor.file_name()),
        );

        println!(" downloading {}", descriptor.url);
        let artifact = download_file(
            &self.runtime,
            &descriptor.url,
            archive.path(),
            &self.http_client,
        )
        .await
        .map_err(|e| download_error(&descriptor.url, e))?;
        debug!("Saved {} bytes to {:?}", artifact.bytes, artifact.path);

        if artifact.sha256 != descriptor.sha256 {
            return Err(InstallError::Integrity {
                url: descriptor.url.clone(),
                expected: descriptor.sha256.clone(),
                actual: artifact.sha256.to_string(),
            });
        }
        debug!("Digest verified: {}", artifact.sha256);

        if !self.extractor.can_handle(&artifact.path) {
            return Err(InstallError::extraction(
                &artifact.path,
                anyhow!("unsupported archive format"),
            ));
        }

        let staging_dir = CleanupGuard::new(
            Arc::clone(&cleanup_ctx),
            tmp_dir.join(format!("{}.staging", version)),
        );
        if self.runtime.exists(staging_dir.path()) {
            self.runtime.remove_dir_all(staging_dir.path())?;
        }

        println!("  installing superqode {}", version);
        self.extractor
            .extract_with_cleanup(
                &self.runtime,
                &artifact.path,
                staging_dir.path(),
                Arc::clone(&cleanup_ctx),
            )
            .map_err(|e| InstallError::extraction(&artifact.path, e))?;

        if !self
            .runtime
            .exists(&InstallLayout::executable_in(staging_dir.path()))
        {
            return Err(InstallError::extraction(
                &artifact.path,
                anyhow!("package root does not contain {}", EXECUTABLE_NAME),
            ));
        }

        self.runtime
            .remove_file(&artifact.path)
            .with_context(|| format!("Failed to remove downloaded archive {:?}", artifact.path))?;
        archive.success();

        self.promote(staging_dir.path(), install_dir, version, &cleanup_ctx)?;
        staging_dir.success();

        Ok(())
    }

    /// Move a finished staging directory to `install_dir`, replacing any
    /// previous copy of the same version.
    ///
    /// A previous copy is moved aside first and registered with `cleanup_ctx`,
    /// so an interruption between the two renames puts it back.
    fn promote(
        &self,
        staging_dir: &Path,
        install_dir: &Path,
        version: &str,
        cleanup_ctx: &SharedCleanupContext,
    ) -> Result<()> {
        self.runtime.create_dir_all(&self.layout.versions_dir())?;

        if !self.runtime.exists(install_dir) {
            self.runtime
                .rename(staging_dir, install_dir)
                .with_context(|| format!("Failed to move {:?} into place", staging_dir))?;
            return Ok(());
        }

        let backup = self.layout.tmp_dir().join(format!("{}.old", version));
        if self.runtime.exists(&backup) {
            self.runtime.remove_dir_all(&backup)?;
        }
        debug!("Moving previous {:?} aside to {:?}", install_dir, backup);
        cleanup_ctx
            .lock()
            .unwrap()
            .add_restore(backup.clone(), install_dir.to_path_buf());
        if let Err(e) = self.runtime.rename(install_dir, &backup) {
            cleanup_ctx.lock().unwrap().remove_restore(&backup);
            return Err(e.into());
        }

        if let Err(e) = self.runtime.rename(staging_dir, install_dir) {
            match self.runtime.rename(&backup, install_dir) {
                Ok(()) => cleanup_ctx.lock().unwrap().remove_restore(&backup),
                // Stays registered so cleanup retries the restore
                Err(restore) => warn!("Failed to restore {:?}: {}", install_dir, restore),
            }
            return Err(e
                .context(format!("Failed to move {:?} into place", staging_dir))
                .into());
        }
        cleanup_ctx.lock().unwrap().remove_restore(&backup);

        if let Err(e) = self.runtime.remove_dir_all(&backup) {
            warn!("Failed to remove previous install {:?}: {}", backup, e);
        }
        Ok(())
    }

    fn remove_tmp_dir_if_empty(&self) {
        let tmp_dir = self.layout.tmp_dir();
        match self.runtime.read_dir(&tmp_dir) {
            Ok(entries) if entries.is_empty() => {
                if let Err(e) = self.runtime.remove_dir_all(&tmp_dir) {
                    debug!("Failed to remove {:?}: {}", tmp_dir, e);
                }
            }
            _ => {}
        }
    }
}

/// Network failures become `Download`; local I/O while saving stays `Other`.
fn download_error(url: &str, error: anyhow::Error) -> InstallError {
    let network = error
        .chain()
        .any(|cause| cause.is::<reqwest::Error>() || cause.is::<HttpStatusError>());
    if network {
        InstallError::download(url, error)
    } else {
        InstallError::Other(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TarGzExtractor;
    use crate::platform::{HostInfo, MockPlatformDetector};
    use crate::release::{Sha256Digest, artifact_url};
    use crate::runtime::RealRuntime;
    use crate::test_utils::fake_release_archive;
    use reqwest::Client;
    use std::fs;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    type TestInstaller = Installer<RealRuntime, MockPlatformDetector, TarGzExtractor>;

    struct Fixture {
        _dir: TempDir,
        layout: InstallLayout,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let layout = InstallLayout::new(dir.path().join("root"), dir.path().join("bin"));
            Self { _dir: dir, layout }
        }

        fn installer(&self, table: ReleaseTable, os: &str, arch: &str) -> TestInstaller {
            let host = HostInfo {
                os: os.into(),
                arch: arch.into(),
            };
            let mut detector = MockPlatformDetector::new();
            detector.expect_detect().returning(move || host.clone());

            Installer {
                runtime: RealRuntime,
                detector,
                extractor: TarGzExtractor,
                http_client: HttpClient::new(Client::new()),
                table,
                layout: self.layout.clone(),
            }
        }

        fn linux_arm64(&self, table: ReleaseTable) -> TestInstaller {
            self.installer(table, "linux", "aarch64")
        }

        fn link_target(&self) -> PathBuf {
            fs::read_link(self.layout.link_path()).unwrap()
        }
    }

    fn descriptor(base_url: &str, version: &str, archive: &[u8]) -> ReleaseDescriptor {
        ReleaseDescriptor {
            version: version.into(),
            platform: Platform::LinuxArm64,
            url: artifact_url(base_url, version, Platform::LinuxArm64),
            sha256: Sha256Digest::of(archive),
        }
    }

    fn asset_path(version: &str) -> String {
        format!("/v{0}/superqode-{0}-linux-arm64.tar.gz", version)
    }

    async fn serve(
        server: &mut mockito::ServerGuard,
        version: &str,
        body: Vec<u8>,
    ) -> mockito::Mock {
        server
            .mock("GET", asset_path(version).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_success() {
        let mut server = mockito::Server::new_async().await;
        let archive = fake_release_archive("0.1.5");
        let mock = serve(&mut server, "0.1.5", archive.clone()).await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();
        let installer = fixture.linux_arm64(table);

        let report = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.version, "0.1.5");
        assert_eq!(report.platform, Platform::LinuxArm64);
        assert!(!report.already_installed);
        assert_eq!(report.install_dir, fixture.layout.version_dir("0.1.5"));
        assert!(report.executable.is_file());
        assert_eq!(fixture.link_target(), report.executable);
        // Staging area is gone
        assert!(!fixture.layout.tmp_dir().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_defaults_to_latest() {
        let mut server = mockito::Server::new_async().await;
        let old = fake_release_archive("0.1.4");
        let new = fake_release_archive("0.1.5");
        let mock = serve(&mut server, "0.1.5", new.clone()).await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![
            descriptor(&server.url(), "0.1.4", &old),
            descriptor(&server.url(), "0.1.5", &new),
        ])
        .unwrap();

        let report = fixture
            .linux_arm64(table)
            .install(None, InstallOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.version, "0.1.5");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_tampered_archive_fails_integrity() {
        let mut server = mockito::Server::new_async().await;
        let old = fake_release_archive("0.1.4");
        let new = fake_release_archive("0.1.5");
        let mut tampered = new.clone();
        let middle = tampered.len() / 2;
        tampered[middle] ^= 0x01;

        serve(&mut server, "0.1.4", old.clone()).await;
        serve(&mut server, "0.1.5", tampered).await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![
            descriptor(&server.url(), "0.1.4", &old),
            descriptor(&server.url(), "0.1.5", &new),
        ])
        .unwrap();
        let installer = fixture.linux_arm64(table);

        installer
            .install(Some("0.1.4"), InstallOptions::default())
            .await
            .unwrap();
        let before = fixture.link_target();

        let err = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();

        match err {
            InstallError::Integrity {
                expected, actual, ..
            } => {
                assert_eq!(expected, Sha256Digest::of(&new));
                assert_ne!(actual, expected.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fixture.link_target(), before);
        assert!(!fixture.layout.version_dir("0.1.5").exists());
        assert!(!fixture.layout.tmp_dir().exists());
    }

    #[tokio::test]
    async fn test_install_unsupported_platform_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let archive = fake_release_archive("0.1.5");
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();
        let installer = fixture.installer(table, "windows", "x86_64");

        let err = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            InstallError::UnsupportedPlatform { os, arch } => {
                assert_eq!(os, "windows");
                assert_eq!(arch, "x86_64");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!fixture.layout.root.exists());
    }

    #[test]
    fn test_resolve_platform_requires_published_release() {
        let fixture = Fixture::new();
        // Known pair, but nothing is published for it
        let installer = fixture.installer(
            ReleaseTable::builtin(crate::release::DEFAULT_BASE_URL),
            "linux",
            "x86_64",
        );
        assert!(matches!(
            installer.resolve_platform(),
            Err(InstallError::UnsupportedPlatform { .. })
        ));

        let installer = fixture.installer(
            ReleaseTable::builtin(crate::release::DEFAULT_BASE_URL),
            "macos",
            "arm64",
        );
        assert_eq!(installer.resolve_platform().unwrap(), Platform::MacosArm64);
    }

    #[tokio::test]
    async fn test_install_unknown_version() {
        let fixture = Fixture::new();
        let archive = fake_release_archive("0.1.5");
        let table =
            ReleaseTable::new(vec![descriptor("http://127.0.0.1:9", "0.1.5", &archive)]).unwrap();

        let err = fixture
            .linux_arm64(table)
            .install(Some("9.9.9"), InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::UnknownVersion { .. }));
    }

    #[tokio::test]
    async fn test_install_http_error_is_download_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", asset_path("0.1.5").as_str())
            .with_status(404)
            .create_async()
            .await;

        let fixture = Fixture::new();
        let archive = fake_release_archive("0.1.5");
        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();

        let err = fixture
            .linux_arm64(table)
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();

        match err {
            InstallError::Download { url, source } => {
                assert!(url.ends_with(&asset_path("0.1.5")));
                assert!(source.downcast_ref::<HttpStatusError>().is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!fixture.layout.link_path().exists());
    }

    #[tokio::test]
    async fn test_install_stalled_server_times_out_as_download_error() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let fixture = Fixture::new();
        let archive = fake_release_archive("0.1.5");
        let base_url = format!("http://{}", addr);
        let table = ReleaseTable::new(vec![descriptor(&base_url, "0.1.5", &archive)]).unwrap();
        let mut installer = fixture.linux_arm64(table);
        installer.http_client = HttpClient::with_timeout(Duration::from_millis(200)).unwrap();

        let err = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();
        server.abort();

        match err {
            InstallError::Download { url, source } => {
                assert!(url.starts_with(&base_url));
                assert!(format!("{:#}", source).contains("Timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!fixture.layout.link_path().exists());
        assert!(!fixture.layout.tmp_dir().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_archive_without_executable_fails_extraction() {
        use flate2::{Compression, write::GzEncoder};

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "pkg/README", &b"hello"[..])
            .unwrap();
        let archive = builder.into_inner().unwrap().finish().unwrap();

        let mut server = mockito::Server::new_async().await;
        serve(&mut server, "0.1.5", archive.clone()).await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();

        let err = fixture
            .linux_arm64(table)
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }));
        assert!(!fixture.layout.version_dir("0.1.5").exists());
        assert!(!fixture.layout.tmp_dir().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_two_versions_side_by_side() {
        let mut server = mockito::Server::new_async().await;
        let a = fake_release_archive("0.1.4");
        let b = fake_release_archive("0.1.5");
        serve(&mut server, "0.1.4", a.clone()).await;
        serve(&mut server, "0.1.5", b.clone()).await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![
            descriptor(&server.url(), "0.1.4", &a),
            descriptor(&server.url(), "0.1.5", &b),
        ])
        .unwrap();
        let installer = fixture.linux_arm64(table);

        let first = installer
            .install(Some("0.1.4"), InstallOptions::default())
            .await
            .unwrap();
        let second = installer
            .install(Some("v0.1.5"), InstallOptions::default())
            .await
            .unwrap();

        assert!(first.executable.is_file());
        assert_eq!(
            fs::read_to_string(&first.executable).unwrap(),
            fs::read_to_string(fixture.layout.version_dir("0.1.4").join("superqode")).unwrap()
        );
        assert_eq!(fixture.link_target(), second.executable);

        let listed: Vec<_> = installer
            .list_installed()
            .unwrap()
            .into_iter()
            .map(|v| (v.version, v.current))
            .collect();
        assert_eq!(
            listed,
            [("0.1.4".to_string(), false), ("0.1.5".to_string(), true)]
        );

        installer.use_version("0.1.4", false).unwrap();
        assert_eq!(fixture.link_target(), first.executable);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reinstall_skips_download_unless_forced() {
        let mut server = mockito::Server::new_async().await;
        let archive = fake_release_archive("0.1.5");
        let mock = server
            .mock("GET", asset_path("0.1.5").as_str())
            .with_status(200)
            .with_body(archive.clone())
            .expect(2)
            .create_async()
            .await;

        let fixture = Fixture::new();
        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();
        let installer = fixture.linux_arm64(table);

        installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap();

        let marker = fixture.layout.version_dir("0.1.5").join("marker");
        fs::write(&marker, "local").unwrap();

        let again = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap();
        assert!(again.already_installed);
        assert!(marker.exists());

        let forced = installer
            .install(Some("0.1.5"), InstallOptions { force: true })
            .await
            .unwrap();
        assert!(!forced.already_installed);
        assert!(!marker.exists());
        assert!(forced.executable.is_file());

        mock.assert_async().await;
    }

    #[cfg(unix)]
    #[test]
    fn test_interrupted_promote_restores_previous_install() {
        use crate::release::DEFAULT_BASE_URL;
        use crate::runtime::MockRuntime;

        let fixture = Fixture::new();
        let install_dir = fixture.layout.version_dir("0.1.5");
        let staging_dir = fixture.layout.tmp_dir().join("0.1.5.staging");
        let backup = fixture.layout.tmp_dir().join("0.1.5.old");
        fs::create_dir_all(&install_dir).unwrap();
        fs::write(install_dir.join("superqode"), "old").unwrap();
        fs::create_dir_all(&staging_dir).unwrap();
        fs::write(staging_dir.join("superqode"), "new").unwrap();

        let ctx = new_shared();
        let interrupt = Arc::clone(&ctx);
        let mut runtime = MockRuntime::new();
        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime.expect_exists().returning(|path: &Path| path.exists());
        let (from_staging, to_install) = (staging_dir.clone(), install_dir.clone());
        runtime
            .expect_rename()
            .withf(move |from, to| from == from_staging && to == to_install)
            .times(1)
            .returning(move |_, _| {
                // Ctrl-C after the old copy moved aside, before the new one moved in
                interrupt.lock().unwrap().cleanup();
                Err(anyhow!("interrupted"))
            });
        runtime
            .expect_rename()
            .returning(|from, to| Ok(fs::rename(from, to)?));

        let installer = Installer {
            runtime,
            detector: MockPlatformDetector::new(),
            extractor: TarGzExtractor,
            http_client: HttpClient::new(Client::new()),
            table: ReleaseTable::builtin(DEFAULT_BASE_URL),
            layout: fixture.layout.clone(),
        };

        assert!(
            installer
                .promote(&staging_dir, &install_dir, "0.1.5", &ctx)
                .is_err()
        );
        assert_eq!(
            fs::read_to_string(install_dir.join("superqode")).unwrap(),
            "old"
        );
        assert!(!backup.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_promote_replaces_previous_install_and_forgets_backup() {
        use crate::release::DEFAULT_BASE_URL;

        let fixture = Fixture::new();
        let install_dir = fixture.layout.version_dir("0.1.5");
        let staging_dir = fixture.layout.tmp_dir().join("0.1.5.staging");
        fs::create_dir_all(&install_dir).unwrap();
        fs::write(install_dir.join("superqode"), "old").unwrap();
        fs::create_dir_all(&staging_dir).unwrap();
        fs::write(staging_dir.join("superqode"), "new").unwrap();

        let installer = fixture.linux_arm64(ReleaseTable::builtin(DEFAULT_BASE_URL));
        let ctx = new_shared();
        installer
            .promote(&staging_dir, &install_dir, "0.1.5", &ctx)
            .unwrap();

        assert_eq!(
            fs::read_to_string(install_dir.join("superqode")).unwrap(),
            "new"
        );
        assert!(!fixture.layout.tmp_dir().join("0.1.5.old").exists());

        // A later cleanup must not touch the promoted version
        ctx.lock().unwrap().cleanup();
        assert!(install_dir.join("superqode").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_refuses_foreign_link() {
        let mut server = mockito::Server::new_async().await;
        let archive = fake_release_archive("0.1.5");
        serve(&mut server, "0.1.5", archive.clone()).await;

        let fixture = Fixture::new();
        let foreign = fixture.layout.root.parent().unwrap().join("elsewhere");
        fs::create_dir_all(&fixture.layout.bin_dir).unwrap();
        std::os::unix::fs::symlink(&foreign, fixture.layout.link_path()).unwrap();

        let table = ReleaseTable::new(vec![descriptor(&server.url(), "0.1.5", &archive)]).unwrap();
        let installer = fixture.linux_arm64(table);

        let err = installer
            .install(Some("0.1.5"), InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Symlink { .. }));
        assert_eq!(fixture.link_target(), foreign);
        // The version itself was installed; only the link was refused
        assert!(fixture.layout.version_dir("0.1.5").join("superqode").is_file());
    }

    #[test]
    fn test_download_error_classification() {
        let status: anyhow::Error = HttpStatusError::NotFound("http://x".into()).into();
        assert!(matches!(
            download_error("http://x", status),
            InstallError::Download { .. }
        ));

        let disk = anyhow!("No space left on device");
        assert!(matches!(
            download_error("http://x", disk),
            InstallError::Other(_)
        ));
    }
}
