//! ventoy-themer - boot theme manager for Ventoy volumes

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ventoy_themer::archive::ArchiveFormat;
use ventoy_themer::batch::{
    ConfigStep, InstallRequest, ItemState, OperationHandle, OverwritePolicy, RemoveAllRequest, RemoveRequest,
    SettingsRequest,
};
use ventoy_themer::config::{DefaultTheme, GFX_MODES};
use ventoy_themer::drives::{DriveProvider, SystemDrives};
use ventoy_themer::settings::Settings;
use ventoy_themer::sources::{expand_inputs, SkipReason};
use ventoy_themer::{inventory, OperationReport, Outcome, ThemeEvent, ThemeManager, Volume};

#[derive(Parser)]
#[command(name = "ventoy-themer")]
#[command(version)]
#[command(about = "Install, configure and remove boot themes on Ventoy volumes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root of the Ventoy data partition (defaults to the saved volume)
    #[arg(long, global = true, env = "VENTOY_THEMER_VOLUME")]
    volume: Option<PathBuf>,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install themes from archives or folders
    Install {
        /// Archives, theme folders, or folders holding several themes
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Overwrite existing themes without asking
        #[arg(short, long)]
        yes: bool,

        /// Never overwrite existing themes
        #[arg(long, conflicts_with = "yes")]
        no_overwrite: bool,
    },

    /// Set the default theme and screen resolution
    Settings {
        /// Theme folder name, or "random"
        #[arg(short, long)]
        default: Option<String>,

        /// Pick a random theme at every boot
        #[arg(long, conflicts_with = "default")]
        random: bool,

        /// GRUB gfxmode, e.g. 1920x1080 or max
        #[arg(short, long)]
        resolution: Option<String>,
    },

    /// Delete one theme and its config entries
    Remove {
        /// Theme folder name under ventoy/theme
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every theme and clear the theme lists in ventoy.json
    RemoveAll {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the themes installed on a volume
    List,

    /// List drives that could hold a Ventoy volume
    Drives,

    /// Show supported archive formats and resolutions
    Formats,

    /// Show or change saved preferences
    Defaults {
        /// Volume used when --volume is not given
        #[arg(long)]
        set_volume: Option<PathBuf>,

        /// Resolution used by `settings` when --resolution is not given
        #[arg(long)]
        set_resolution: Option<String>,

        /// Answer yes to overwrite and delete prompts
        #[arg(long)]
        assume_yes: Option<bool>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive(if cli.verbose {
                "ventoy_themer=debug".parse()?
            } else {
                "ventoy_themer=warn".parse()?
            }))
            .with_writer(std::io::stderr)
            .init();
    }

    let mut settings = Settings::load();
    let volume = || resolve_volume(cli.volume.as_ref(), &settings);

    let report = match &cli.command {
        Commands::Install {
            inputs,
            yes,
            no_overwrite,
        } => {
            let volume = volume()?;
            let list = expand_inputs(inputs);
            for skipped in &list.skipped {
                let reason = match &skipped.reason {
                    SkipReason::UnsupportedExtension => "unsupported file type".to_string(),
                    SkipReason::NoThemeContent => "no themes or archives found".to_string(),
                    SkipReason::Duplicate => "listed twice".to_string(),
                    SkipReason::Unreadable(e) => format!("unreadable: {}", e),
                };
                eprintln!("Skipping {} ({})", skipped.path.display(), reason);
            }
            if list.is_empty() {
                bail!("Nothing to install");
            }

            println!("Installing to {}", volume.root().display());
            for source in &list.sources {
                println!("  {}", source.display_name());
            }
            println!();

            let policy = if *no_overwrite {
                OverwritePolicy::Never
            } else if *yes || settings.assume_yes {
                OverwritePolicy::Always
            } else {
                OverwritePolicy::Ask
            };
            let request = InstallRequest::new(volume, list.sources).with_overwrite(policy);

            let manager = ThemeManager::default();
            let (tx, rx) = channel();
            let handle = manager.start_install(request, tx)?;
            drive(rx, handle)?
        }

        Commands::Settings {
            default,
            random,
            resolution,
        } => {
            let volume = volume()?;
            let resolution = resolution
                .clone()
                .or_else(|| settings.resolution().map(str::to_string));
            let default_theme = if *random {
                Some(DefaultTheme::Random)
            } else {
                default.as_deref().map(|d| DefaultTheme::from_selection(Some(d)))
            };
            if default_theme.is_none() && resolution.is_none() {
                bail!("Nothing to change. Pass --default, --random or --resolution");
            }
            let request = SettingsRequest {
                volume,
                default_theme,
                resolution,
            };

            let manager = ThemeManager::default();
            let (tx, rx) = channel();
            let handle = manager.start_settings(request, tx)?;
            drive(rx, handle)?
        }

        Commands::Remove { name, yes } => {
            let volume = volume()?;
            let question = format!("Delete theme '{}' from {}?", name, volume.root().display());
            if !(*yes || settings.assume_yes) && !ask(&question)? {
                println!("Aborted.");
                return Ok(());
            }

            let manager = ThemeManager::default();
            let (tx, rx) = channel();
            let handle = manager.start_remove(
                RemoveRequest {
                    volume,
                    name: name.clone(),
                },
                tx,
            )?;
            drive(rx, handle)?
        }

        Commands::RemoveAll { yes } => {
            let volume = volume()?;
            let folders = inventory::theme_folders(&volume)
                .with_context(|| format!("Failed to list {}", volume.theme_root().display()))?;
            println!("{} theme folder(s) under {}", folders.len(), volume.theme_root().display());
            let question = "Delete ALL themes and clear the theme section of ventoy.json?";
            if !(*yes || settings.assume_yes) && !ask(question)? {
                println!("Aborted.");
                return Ok(());
            }

            let manager = ThemeManager::default();
            let (tx, rx) = channel();
            let handle = manager.start_remove_all(RemoveAllRequest { volume }, tx)?;
            drive(rx, handle)?
        }

        Commands::List => {
            let volume = volume()?;
            let inv = inventory::scan(&volume)?;

            println!("=== {} ===", volume.root().display());
            if !inv.config_exists {
                println!("No ventoy.json found.");
            }
            println!("Resolution:    {}", inv.gfxmode);
            println!("Default theme: {}", inv.default_theme.as_deref().unwrap_or("Random"));

            println!("\n=== Configured Themes ===");
            if inv.configured.is_empty() {
                println!("  (none)");
            }
            for (idx, theme) in inv.configured.iter().enumerate() {
                let mut flags = Vec::new();
                if theme.is_default {
                    flags.push("default");
                }
                if !theme.present {
                    flags.push("missing");
                }
                let flags = if flags.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", flags.join(", "))
                };
                println!("{:>4}  {:<24} {}{}", idx + 1, theme.name, theme.entry, flags);
            }

            let unregistered = inv.unregistered_folders();
            if !unregistered.is_empty() {
                println!("\n=== Folders Not In ventoy.json ===");
                for folder in unregistered {
                    println!("  {}", folder);
                }
            }
            for warning in &inv.warnings {
                eprintln!("Warning: {}", warning);
            }
            return Ok(());
        }

        Commands::Drives => {
            let drives = SystemDrives.list();
            if drives.is_empty() {
                println!("No suitable drives found.");
            }
            for drive in drives {
                let marker = if drive.has_ventoy_dir { "  (ventoy)" } else { "" };
                println!("{}{}", drive, marker);
            }
            return Ok(());
        }

        Commands::Formats => {
            let manager = ThemeManager::default();
            let registry = manager.registry();

            println!("=== Archive Formats ===");
            for format in ArchiveFormat::ALL {
                let status = match registry.decoder_for(format) {
                    Some(decoder) => decoder.name().to_string(),
                    None => "unavailable".to_string(),
                };
                println!("  {:<8} {:<32} {}", format.to_string(), format.suffixes().join(" "), status);
            }

            println!("\n=== Resolutions ===");
            println!("  {}", GFX_MODES.join(" "));
            return Ok(());
        }

        Commands::Defaults {
            set_volume,
            set_resolution,
            assume_yes,
        } => {
            let mut changed = false;
            if let Some(v) = set_volume {
                settings.default_volume = v.display().to_string();
                changed = true;
            }
            if let Some(r) = set_resolution {
                settings.default_resolution = r.clone();
                changed = true;
            }
            if let Some(y) = assume_yes {
                settings.assume_yes = *y;
                changed = true;
            }
            if changed {
                settings.save()?;
                println!("Saved to {}", Settings::settings_path()?.display());
            }

            println!("Volume:     {}", settings.volume().map(|p| p.display().to_string()).unwrap_or_default());
            println!("Resolution: {}", settings.resolution().unwrap_or(""));
            println!("Assume yes: {}", settings.assume_yes);
            return Ok(());
        }
    };

    print_summary(&report);
    match report.outcome {
        Outcome::Completed => Ok(()),
        Outcome::PartialFailure => std::process::exit(2),
        Outcome::Failed => std::process::exit(1),
    }
}

fn resolve_volume(explicit: Option<&PathBuf>, settings: &Settings) -> Result<Volume> {
    let root = explicit
        .cloned()
        .or_else(|| settings.volume())
        .context("No volume given. Pass --volume or save one with `ventoy-themer defaults --set-volume`")?;
    Ok(Volume::open(root)?)
}

/// Render events until the worker hangs up, answering confirmations on stdin.
fn drive(rx: Receiver<ThemeEvent>, handle: OperationHandle) -> Result<OperationReport> {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% | {msg}")?
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    for event in rx {
        match event {
            ThemeEvent::Progress { message, percent, .. } => {
                pb.set_position(percent as u64);
                pb.set_message(message);
            }
            ThemeEvent::Message { severity, title, text } => {
                pb.suspend(|| eprintln!("[{}] {}: {}", severity, title, text));
            }
            ThemeEvent::Confirm(request) => {
                let yes = pb.suspend(|| ask(&request.message))?;
                // The worker may have given up already; nothing left to do then.
                let _ = request.answer(yes);
            }
            ThemeEvent::Finished(_) => pb.finish_and_clear(),
        }
    }
    pb.finish_and_clear();

    Ok(handle.join()?)
}

fn ask(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_summary(report: &OperationReport) {
    println!("\n=== {} Summary ===", report.kind);
    for item in &report.items {
        let state = match item.state {
            ItemState::Merged => "installed",
            ItemState::Removed => "removed",
            ItemState::Skipped => "skipped",
            ItemState::Failed => "FAILED",
            _ => "incomplete",
        };
        match &item.detail {
            Some(detail) => println!("  {:<24} {:<10} {}", item.name, state, detail),
            None => println!("  {:<24} {}", item.name, state),
        }
    }

    match &report.config {
        ConfigStep::Written => println!("ventoy.json: updated"),
        ConfigStep::Untouched => println!("ventoy.json: not touched"),
        ConfigStep::NotFound => println!("ventoy.json: not found"),
        ConfigStep::Failed(e) => println!("ventoy.json: FAILED ({})", e),
    }

    match report.outcome {
        Outcome::Completed => println!("\nDone."),
        Outcome::PartialFailure => println!("\nFinished with errors. Check the messages above."),
        Outcome::Failed => println!("\nOperation failed."),
    }
}
