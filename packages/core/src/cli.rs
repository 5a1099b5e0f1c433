use clap::Parser;

/// Missed bolus monitor CLI arguments.
///
/// Every option overrides the matching environment variable.
#[derive(Debug, Default, Parser)]
#[command(
    name = "bolus-monitor",
    version,
    about = "Warns when a Nightscout carb entry has no matching insulin bolus"
)]
pub struct Cli {
    /// Nightscout API base URL (e.g. https://ns.example/api/v1)
    #[arg(long)]
    pub nightscout_url: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    pub loop_time: Option<u64>,

    /// Seconds after a carb entry within which a bolus is expected
    #[arg(long)]
    pub bolus_window: Option<u64>,

    /// Carb entries older than this many seconds are not evaluated
    #[arg(long)]
    pub lookback_limit: Option<u64>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Log missed boluses without sending notifications or writing records
    #[arg(long)]
    pub dry_run: bool,
}
