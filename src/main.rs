use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use superqode_installer::archive::TarGzExtractor;
use superqode_installer::install::{
    InstallOptions, Installer, InstallerConfig, InstallerSettings, current_version,
};
use superqode_installer::platform::DefaultPlatformDetector;
use superqode_installer::runtime::RealRuntime;

/// superqode-installer - install pinned, checksum-verified superqode releases
///
/// Downloads the release archive for this machine, checks it against the
/// SHA-256 digest recorded for that release, unpacks it under the install
/// root and links `superqode` into the bin directory.
///
/// Examples:
///   superqode-installer install          # Install the newest release
///   superqode-installer install 0.1.4    # Install a specific release
///   superqode-installer use 0.1.5        # Switch the linked version
#[derive(Parser, Debug)]
#[command(author, version = env!("SUPERQODE_INSTALLER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via SUPERQODE_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "SUPERQODE_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Directory that receives the `superqode` link
    #[arg(long, env = "SUPERQODE_BIN_DIR", value_name = "PATH", global = true)]
    pub bin_dir: Option<PathBuf>,

    /// Base URL release archives are downloaded from
    #[arg(long, env = "SUPERQODE_BASE_URL", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// JSON release manifest to use instead of the built-in release table
    #[arg(long, env = "SUPERQODE_RELEASES", value_name = "FILE", global = true)]
    pub releases: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, env = "SUPERQODE_TIMEOUT", value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a superqode release and link it
    Install(InstallArgs),

    /// Run the linked superqode with --version
    Verify,

    /// List installed versions
    List,

    /// Point the superqode link at an installed version
    Use(UseArgs),

    /// Remove an installed version
    Uninstall(UninstallArgs),

    /// Show the releases published for this platform
    Releases,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Version to install (defaults to the newest release)
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Reinstall even if present, and replace a superqode link installed by other means
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Skip running the installed superqode afterwards
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(clap::Args, Debug)]
pub struct UseArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Replace a superqode link installed by other means
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Remove the version even if it is the linked one
    #[arg(long, short = 'f')]
    pub force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;

    let settings = InstallerSettings {
        root: cli.install_root,
        bin_dir: cli.bin_dir,
        base_url: cli.base_url,
        releases: cli.releases,
        timeout_secs: cli.timeout,
    };
    let config = InstallerConfig::new(&runtime, settings)?;
    let installer = Installer::new(runtime, DefaultPlatformDetector, TarGzExtractor, config);

    match cli.command {
        Commands::Install(args) => {
            let options = InstallOptions { force: args.force };
            let report = installer.install(args.version.as_deref(), options).await?;
            if !args.no_verify {
                let reported = installer.verify(Some(&report.version))?;
                println!("    verified {}", reported);
            }
            println!();
            println!(
                "Installed superqode {} ({}) to {}",
                report.version,
                report.platform,
                report.install_dir.display()
            );
            println!("Run it with: {}", report.link.display());
        }
        Commands::Verify => {
            let expected = current_version(&installer.runtime, &installer.layout);
            let reported = installer.verify(expected.as_deref())?;
            println!("{}", reported);
        }
        Commands::List => {
            let installed = installer.list_installed()?;
            if installed.is_empty() {
                println!("No versions installed.");
            }
            for version in installed {
                let marker = if version.current { "*" } else { " " };
                println!("{} {}", marker, version.version);
            }
        }
        Commands::Use(args) => {
            let executable = installer.use_version(&args.version, args.force)?;
            println!(
                "{} -> {}",
                installer.layout.link_path().display(),
                executable.display()
            );
        }
        Commands::Uninstall(args) => {
            installer.uninstall(&args.version, args.force)?;
            println!("Removed superqode {}", args.version);
        }
        Commands::Releases => {
            let (platform, releases) = installer.releases()?;
            println!("Releases for {}:", platform);
            for release in releases {
                println!("  {}  {}", release.version, release.url);
                println!("         sha256 {}", release.sha256);
            }
        }
    }
    Ok(())
}
