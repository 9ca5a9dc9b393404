use crate::scrapers::browser::ChromeLauncher;
use crate::scrapers::types::{CollectSettings, HoursLocale, ParseOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Collect computer clubs from map search results, region by region
#[derive(Debug, Parser)]
#[command(name = "club-scout", version, about)]
pub struct Cli {
    /// Region catalog: a JSON file path or an http(s) URL
    #[arg(long, env = "SCOUT_CATALOG", default_value = "regions.json", global = true)]
    pub catalog: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect one region (ID or name) or every region with `global`
    Collect(CollectArgs),
    /// List catalog regions
    Regions {
        /// Only show regions whose name contains this term
        #[arg(long, short)]
        search: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Region ID, name fragment, or `global`
    pub region: String,

    #[arg(long, env = "SCOUT_OUTPUT_DIR", default_value = "results")]
    pub output_dir: PathBuf,

    #[arg(long, env = "SCOUT_MAX_ITERATIONS", default_value_t = 15)]
    pub max_iterations: usize,

    /// Pause after each scroll, in milliseconds
    #[arg(long, env = "SCOUT_SETTLE_MS", default_value_t = 1500)]
    pub settle_ms: u64,

    /// Pause after opening a region page, in milliseconds
    #[arg(long, env = "SCOUT_INITIAL_SETTLE_MS", default_value_t = 3000)]
    pub initial_settle_ms: u64,

    /// Pause before sealing a region's results, in milliseconds
    #[arg(long, env = "SCOUT_FINAL_DRAIN_MS", default_value_t = 2000)]
    pub final_drain_ms: u64,

    /// Passes without new clubs before the list counts as exhausted
    #[arg(long, env = "SCOUT_STALL_THRESHOLD", default_value_t = 2)]
    pub stall_threshold: usize,

    /// Stop at the stall threshold instead of moving the map first
    #[arg(long)]
    pub no_recovery: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    #[arg(long, env = "SCOUT_REGION_PAUSE_MS", default_value_t = 2000)]
    pub region_pause_ms: u64,

    #[arg(long, env = "SCOUT_NAV_TIMEOUT_SECS", default_value_t = 30)]
    pub nav_timeout_secs: u64,

    /// Save every relevant search payload here
    #[arg(long, env = "SCOUT_DEBUG_DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Keep the raw item JSON on each exported record
    #[arg(long)]
    pub keep_raw: bool,

    #[arg(long, value_enum, default_value_t = HoursLocale::En)]
    pub hours_locale: HoursLocale,
}

impl CollectArgs {
    pub fn collect_settings(&self) -> CollectSettings {
        CollectSettings {
            max_iterations: self.max_iterations,
            settle_delay: Duration::from_millis(self.settle_ms),
            initial_settle: Duration::from_millis(self.initial_settle_ms),
            final_drain: Duration::from_millis(self.final_drain_ms),
            stall_threshold: self.stall_threshold.max(1),
            recovery_enabled: !self.no_recovery,
            debug_dir: self.debug_dir.clone(),
            ..CollectSettings::default()
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            hours_locale: self.hours_locale,
            keep_raw: self.keep_raw,
        }
    }

    pub fn launcher(&self) -> ChromeLauncher {
        ChromeLauncher {
            headless: !self.headed,
            navigation_timeout: Duration::from_secs(self.nav_timeout_secs),
            ..ChromeLauncher::default()
        }
    }

    pub fn region_pause(&self) -> Duration {
        Duration::from_millis(self.region_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_args(args: &[&str]) -> CollectArgs {
        let mut argv = vec!["club-scout", "collect"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Collect(args) => args,
            other => panic!("expected collect, got {:?}", other),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_settings() {
        let args = collect_args(&[
            "54",
            "--max-iterations",
            "7",
            "--settle-ms",
            "250",
            "--stall-threshold",
            "0",
            "--no-recovery",
            "--headed",
            "--hours-locale",
            "ru",
            "--keep-raw",
        ]);

        assert_eq!(args.region, "54");
        let settings = args.collect_settings();
        assert_eq!(settings.max_iterations, 7);
        assert_eq!(settings.settle_delay, Duration::from_millis(250));
        assert_eq!(settings.stall_threshold, 1);
        assert!(!settings.recovery_enabled);
        assert!(!args.launcher().headless);

        let options = args.parse_options();
        assert_eq!(options.hours_locale, HoursLocale::Ru);
        assert!(options.keep_raw);
    }

    #[test]
    fn regions_subcommand_takes_a_search_term() {
        let cli = Cli::try_parse_from(["club-scout", "regions", "--search", "novgorod"]).unwrap();
        assert!(matches!(cli.command, Command::Regions { search: Some(ref s) } if s == "novgorod"));
    }

    #[test]
    fn collect_requires_a_region() {
        assert!(Cli::try_parse_from(["club-scout", "collect"]).is_err());
    }
}
