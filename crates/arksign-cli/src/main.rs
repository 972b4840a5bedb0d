//! Command-line interface for arksign.
//!
//! Validates PKCS#12 credentials and prepares unpacked apps for re-signing.
//! Signing itself needs a signing engine and is only available through the
//! library.

use arksign::bundle::{self, IdentityRequest};
use arksign::crypto;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arksign")]
#[command(about = "iOS app re-signing preparation tool")]
struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a PKCS#12 file and print the signer identity
    Validate {
        /// PKCS#12 file (.p12)
        pkcs12: PathBuf,

        /// Password for the PKCS#12 file
        #[arg(long, env = "ARKSIGN_PASSWORD", hide_env_values = true, default_value = "")]
        password: String,
    },

    /// Print the identity values of an app
    Inspect {
        /// Unpacked IPA folder or app bundle
        path: PathBuf,
    },

    /// Rewrite Info.plist with a new bundle identifier, version and name
    Reconcile {
        /// Unpacked IPA folder or app bundle
        path: PathBuf,

        /// New CFBundleIdentifier
        #[arg(short = 'b', long)]
        bundle_id: String,

        /// New display name
        #[arg(short = 'n', long)]
        display_name: String,

        /// New CFBundleVersion (default: 1)
        #[arg(short = 'r', long)]
        bundle_version: Option<String>,
    },

    /// Remove existing signatures and embedded provisioning profiles
    Strip {
        /// Unpacked IPA folder or app bundle
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }
    builder.init();

    match cli.command {
        Command::Validate { pkcs12, password } => {
            let identity = crypto::validate(&pkcs12, &password)?;
            println!("Identity: {}", identity);
            println!("Team: {}", identity.team_name());
        }
        Command::Inspect { path } => {
            let summary = bundle::inspect(&path)?;
            println!("App folder: {}", summary.app_folder.display());
            println!("Bundle ID: {}", summary.bundle_id.as_deref().unwrap_or("<missing>"));
            println!("Executable: {}", summary.executable.as_deref().unwrap_or("<missing>"));
            println!("Version: {}", summary.version);
            println!("Display name: {}", summary.display_name);
        }
        Command::Reconcile {
            path,
            bundle_id,
            display_name,
            bundle_version,
        } => {
            let mut request = IdentityRequest::new(bundle_id, display_name);
            if let Some(version) = bundle_version {
                request = request.version(version);
            }

            let outcome = bundle::reconcile(&path, &request)?;
            for change in &outcome.changes {
                println!(
                    "{}: {} -> {}",
                    change.key,
                    change.previous.as_deref().unwrap_or("<absent>"),
                    change.current
                );
            }
            if outcome.written {
                println!("Updated: {}", outcome.app_folder.join(bundle::INFO_PLIST).display());
            } else {
                println!("Unchanged: {}", outcome.app_folder.display());
            }
        }
        Command::Strip { path } => {
            let app_folder = bundle::find_app_folder(&path)?;
            for removed in bundle::strip_signatures(&app_folder)? {
                println!("Removed: {}", removed.display());
            }
        }
    }

    Ok(())
}
