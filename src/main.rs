#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use profsave_editor::config::AppConfig;
use profsave_editor::constants::config::LOG_LEVEL_ENV;
use profsave_editor::edid::{BrightnessDetector, DrmSysfs};
use profsave_editor::locator::ConfigLocator;
use profsave_editor::process::{ProcScanner, ProcessGate};
use profsave_editor::settings::Category;
use profsave_editor::{ApplyRequest, ConfigEditEngine, SettingRegistry, backups, presets, protect, worker};

#[derive(Parser, Debug)]
#[command(name = "profsave-editor", version, about = "Tweak Battlefield 6 PROFSAVE_profile settings safely")]
struct Cli {
    /// Profile file to edit instead of searching the game's settings folder
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the profile path that would be edited
    Locate,
    /// Show the current value of every known setting
    Show {
        #[arg(long)]
        json: bool,
    },
    /// List the settings the editor knows about
    List,
    /// List or delete presets
    Presets {
        #[command(subcommand)]
        action: Option<PresetAction>,
    },
    /// Apply settings to the profile
    Apply(ApplyArgs),
    /// Detect the HDR peak brightness of the connected display
    DetectBrightness,
    /// Manage profile backups
    Backups {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Query or change the profile's read-only protection
    Protect {
        #[arg(value_enum)]
        action: ProtectAction,
    },
    /// Remember a custom profile path (or clear it)
    SetPath {
        path: Option<PathBuf>,
        #[arg(long, conflicts_with = "path")]
        clear: bool,
    },
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Enable a setting at its default value (repeatable)
    #[arg(long = "enable", value_name = "ID")]
    enable: Vec<String>,

    /// Set a setting to an explicit value (repeatable)
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Start from a named preset
    #[arg(long)]
    preset: Option<String>,

    /// HDR peak brightness: "auto" to detect, or a value in nits
    #[arg(long, value_name = "auto|NITS")]
    brightness: Option<String>,

    /// Leave the profile writable afterwards
    #[arg(long)]
    no_protect: bool,

    /// Apply even if the game appears to be running
    #[arg(long)]
    force: bool,

    /// Wait up to SECS for the game to exit instead of failing
    #[arg(long, value_name = "SECS", conflicts_with = "force")]
    wait: Option<u64>,

    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    /// List backups, newest first
    List,
    /// Replace the profile with a backup
    Restore {
        backup: PathBuf,
        #[arg(long)]
        no_protect: bool,
        #[arg(long)]
        force: bool,
    },
    /// Delete a backup
    Delete { backup: PathBuf },
    /// Delete all but the newest backups
    Prune {
        #[arg(long, default_value_t = 10)]
        keep: usize,
    },
}

#[derive(Subcommand, Debug)]
enum PresetAction {
    /// List built-in and custom presets (default)
    List,
    /// Delete a custom preset from the editor config
    Delete { name: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProtectAction {
    On,
    Off,
    Status,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{raw}'"))?;
    let (id, value) = (id.trim(), value.trim());
    if id.is_empty() || value.is_empty() {
        return Err(format!("expected ID=VALUE, got '{raw}'"));
    }
    Ok((id.to_string(), value.to_string()))
}

fn parse_level(raw: &str) -> TraceLevel {
    match raw.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

/// Floating settings are written with six decimals, like the game does
fn format_nits(nits: f64) -> String {
    format!("{nits:.6}")
}

struct App {
    config: AppConfig,
    cli_path: Option<PathBuf>,
    engine: Arc<ConfigEditEngine>,
}

impl App {
    async fn profile_path(&self) -> Result<PathBuf> {
        let mut locator = ConfigLocator::from_home();
        let root = locator.settings_root().to_path_buf();
        locator.set_override(self.cli_path.clone().or_else(|| self.config.profile_override()));

        let (_, found) = worker::locate_profile(locator).await?;
        found.with_context(|| format!("Config file not found under {}", root.display()))
    }

    fn registry(&self) -> &SettingRegistry {
        self.engine.registry()
    }

    async fn ensure_game_closed(&self, force: bool, wait: Option<u64>) -> Result<()> {
        let gate = ProcScanner::new(self.config.game_processes.clone());
        if let Some(process) = gate.running_process() {
            if let Some(secs) = wait {
                info!(pid = process.pid, secs, "Waiting for game to close");
                let closed = tokio::task::spawn_blocking(move || {
                    gate.wait_for_exit(Duration::from_secs(1), Some(Duration::from_secs(secs)))
                })
                .await
                .context("Wait task failed")?;
                if !closed {
                    bail!("{} is still running after {secs}s", process.name);
                }
            } else if force {
                warn!(pid = process.pid, "Game is running, continuing because --force was given");
            } else {
                bail!(
                    "{} is currently running (PID: {}). Close the game before changing settings.",
                    process.name,
                    process.pid
                );
            }
        }
        Ok(())
    }

    async fn build_request(&self, args: &ApplyArgs) -> Result<ApplyRequest> {
        let mut request = match &args.preset {
            Some(name) => presets::resolve(name, &self.config.custom_presets, self.registry())
                .with_context(|| format!("Unknown preset '{name}'"))?,
            None => ApplyRequest::new(),
        };

        for id in &args.enable {
            let setting = self
                .registry()
                .get(id)
                .with_context(|| format!("Unknown setting '{id}' (see `list`)"))?;
            request.insert(id.as_str(), setting.default_value);
        }

        for (id, value) in &args.set {
            if !self.registry().contains(id) {
                bail!("Unknown setting '{id}' (see `list`)");
            }
            request.insert(id.as_str(), value.as_str());
        }

        match args.brightness.as_deref() {
            None => {}
            Some(raw) if raw.eq_ignore_ascii_case("auto") => {
                let detector = Arc::new(BrightnessDetector::new(DrmSysfs::default()));
                match worker::detect_peak_brightness(detector).await? {
                    Some(nits) => {
                        info!(nits = nits, "Using detected peak brightness");
                        request.insert("hdr_peak_brightness", format_nits(f64::from(nits)));
                    }
                    None => warn!("Peak brightness not detected, leaving HDR setting unchanged"),
                }
            }
            Some(raw) => {
                let nits: f64 = raw
                    .parse()
                    .ok()
                    .filter(|n: &f64| n.is_finite() && *n > 0.0)
                    .with_context(|| format!("Invalid brightness '{raw}'"))?;
                request.insert("hdr_peak_brightness", format_nits(nits));
            }
        }

        Ok(request)
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Locate => {
                println!("{}", self.profile_path().await?.display());
            }
            Command::Show { json } => {
                let path = self.profile_path().await?;
                let values = self.engine.get_current_values(&path)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&values)?);
                } else {
                    println!("{}", path.display());
                    println!("read-only: {}", protect::is_readonly(&path));
                    for setting in self.registry().iter() {
                        let value = values.get(setting.id).cloned().flatten();
                        println!(
                            "  {:<28} {:<24} {}",
                            setting.description,
                            setting.id,
                            value.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Command::List => {
                let mut current: Option<Category> = None;
                for setting in self.registry().iter() {
                    if current != Some(setting.category) {
                        println!("{}", setting.category);
                        current = Some(setting.category);
                    }
                    println!(
                        "  {:<24} {:<40} default {:<12} {}",
                        setting.id, setting.key, setting.default_value, setting.description
                    );
                }
            }
            Command::Presets { action } => match action.unwrap_or(PresetAction::List) {
                PresetAction::List => {
                    for preset in presets::BUILTIN_PRESETS {
                        let enabled = preset.toggles.iter().filter(|(_, on)| *on).count();
                        println!("{:<14} {} ({enabled} enabled)", preset.name, preset.description);
                    }
                    for (name, values) in &self.config.custom_presets {
                        println!("{:<14} custom ({} values)", name, values.len());
                    }
                }
                PresetAction::Delete { name } => {
                    let mut config = self.config.clone();
                    let Some(removed) = presets::remove_custom(&mut config.custom_presets, &name) else {
                        if presets::builtin(&name).is_some() {
                            bail!("'{name}' is a built-in preset and cannot be deleted");
                        }
                        bail!("No custom preset named '{name}'");
                    };
                    config.save()?;
                    println!("Deleted preset {removed}");
                }
            },
            Command::Apply(args) => {
                let request = self.build_request(&args).await?;
                if request.is_empty() {
                    bail!("No settings selected");
                }
                self.ensure_game_closed(args.force, args.wait).await?;

                let path = self.profile_path().await?;
                let protect_after = self.config.protect_after_apply && !args.no_protect;
                let result = worker::apply(self.engine.clone(), path, request, protect_after).await?;

                if args.json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    println!("{}", result.message);
                    for change in &result.changed {
                        println!("  {change}");
                    }
                    if let Some(backup) = &result.backup_path {
                        println!("Backup: {}", backup.display());
                    }
                }
                if !result.success {
                    return Err(anyhow!(result.message));
                }
            }
            Command::DetectBrightness => {
                let detector = Arc::new(BrightnessDetector::new(DrmSysfs::default()));
                match worker::detect_peak_brightness(detector).await? {
                    Some(nits) => println!("{nits} nits"),
                    None => println!("Could not detect peak brightness"),
                }
            }
            Command::Backups { action } => self.run_backups(action).await?,
            Command::Protect { action } => {
                let path = self.profile_path().await?;
                let ok = match action {
                    ProtectAction::On => protect::set_readonly(&path),
                    ProtectAction::Off => protect::remove_readonly(&path),
                    ProtectAction::Status => true,
                };
                if !ok {
                    bail!("Could not change protection of {}", path.display());
                }
                let state = if protect::is_readonly(&path) { "read-only" } else { "writable" };
                println!("{}: {state}", path.display());
            }
            Command::SetPath { path, clear } => {
                let mut config = self.config.clone();
                config.custom_config_path = if clear { None } else { path };
                config.save()?;
                match &config.custom_config_path {
                    Some(p) => println!("Custom profile path: {}", p.display()),
                    None => println!("Custom profile path cleared"),
                }
            }
        }
        Ok(())
    }

    async fn run_backups(&self, action: BackupAction) -> Result<()> {
        let profile = self.profile_path().await?;
        match action {
            BackupAction::List => {
                let entries = backups::list(&profile)?;
                if entries.is_empty() {
                    println!("No backups found beside {}", profile.display());
                }
                for entry in entries {
                    let when = entry
                        .timestamp
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!("{when}  {:>8.1} KB  {}", entry.size as f64 / 1024.0, entry.path.display());
                }
            }
            BackupAction::Restore {
                backup,
                no_protect,
                force,
            } => {
                self.ensure_game_closed(force, None).await?;
                let backup = resolve_beside(&profile, backup);
                let protect_after = self.config.protect_after_apply && !no_protect;
                let safety = backups::restore(&backup, &profile, protect_after)?;
                println!("Restored {} from {}", profile.display(), backup.display());
                if let Some(safety) = safety {
                    println!("Previous profile saved as {}", safety.display());
                }
            }
            BackupAction::Delete { backup } => {
                let backup = resolve_beside(&profile, backup);
                backups::delete(&backup, &profile)?;
                println!("Deleted {}", backup.display());
            }
            BackupAction::Prune { keep } => {
                let removed = backups::prune(&profile, keep)?;
                println!("Removed {} backup(s)", removed.len());
            }
        }
        Ok(())
    }
}

/// Bare backup filenames are looked up next to the profile
fn resolve_beside(profile: &Path, backup: PathBuf) -> PathBuf {
    if backup.components().count() == 1
        && let Some(dir) = profile.parent()
    {
        return dir.join(backup);
    }
    backup
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // LOG_LEVEL wins over the configured level
    let configured = config.as_ref().map(|c| c.log_level.clone()).unwrap_or_default();
    let log_level = parse_level(&std::env::var(LOG_LEVEL_ENV).unwrap_or(configured));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config.inspect_err(|e| error!(error = ?e, "Failed to load editor config"))?;

    let app = App {
        cli_path: cli.config,
        engine: Arc::new(ConfigEditEngine::new(Arc::new(SettingRegistry::builtin()))),
        config,
    };
    app.run(cli.command).await
}
