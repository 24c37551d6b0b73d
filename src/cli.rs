use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tabled::{Table, Tabled};

use wifitap::config::Config;
use wifitap::wireless::capture::{open_source, WirelessCapture, WirelessFrame};
use wifitap::wireless::ScanResult;

#[derive(Parser)]
#[command(name = "wifitap")]
#[command(author, version, about = "802.11 capture and access point scan decoder")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode frames from a monitor-mode interface or a capture file
    Capture {
        /// Monitor-mode interface to capture on
        #[arg(short, long, conflicts_with = "file")]
        interface: Option<String>,

        /// Radiotap pcap file to replay
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Stop after this many decoded frames
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Skip information element decoding
        #[arg(long)]
        shallow: bool,

        /// Only show frames of this BSSID
        #[arg(short, long)]
        bssid: Option<String>,
    },

    /// Scan for access points
    Scan {
        /// Wireless interface to scan on
        #[arg(short, long)]
        interface: Option<String>,

        /// Read the driver's cached results without triggering a scan
        #[arg(long)]
        cached: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Write the effective configuration as TOML
    GenConfig {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Scan result output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Simple,
}

/// Table row for scan results
#[derive(Tabled)]
struct ScanRow {
    #[tabled(rename = "BSSID")]
    bssid: String,
    #[tabled(rename = "ESSID")]
    essid: String,
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Frequency")]
    frequency: String,
    #[tabled(rename = "Signal")]
    signal: String,
    #[tabled(rename = "Encrypted")]
    encrypted: String,
    #[tabled(rename = "Max Rate")]
    rate: String,
}

impl From<&ScanResult> for ScanRow {
    fn from(r: &ScanResult) -> Self {
        let freq = r.frequency.as_ref();
        Self {
            bssid: r.bssid.to_string(),
            essid: r.essid.clone().unwrap_or_default(),
            channel: freq
                .and_then(|f| f.channel())
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            frequency: freq
                .filter(|f| !f.is_channel())
                .map(|f| f.formatted())
                .unwrap_or_else(|| "-".to_string()),
            signal: format!("{} dBm", r.quality.signal_dbm()),
            encrypted: match r.is_encrypted() {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "-".to_string(),
            },
            rate: r.max_rate().unwrap_or("-").to_string(),
        }
    }
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Capture {
            interface,
            file,
            count,
            shallow,
            bssid,
        } => cmd_capture(config, interface, file, count, shallow, bssid),
        Commands::Scan {
            interface,
            cached,
            format,
        } => cmd_scan(config, interface, cached, format),
        Commands::GenConfig { output } => cmd_gen_config(config, output),
    }
}

fn cmd_capture(
    config: Config,
    interface: Option<String>,
    file: Option<PathBuf>,
    count: Option<u64>,
    shallow: bool,
    bssid: Option<String>,
) -> Result<()> {
    let mut capture_config = config.capture;
    if file.is_some() {
        capture_config.pcap_file = file;
        capture_config.interface = None;
    } else if interface.is_some() {
        capture_config.interface = interface;
        capture_config.pcap_file = None;
    }
    if shallow {
        capture_config.deep_decode = false;
    }
    if bssid.is_some() {
        capture_config.bssid_filter = bssid;
    }

    let source = open_source(&capture_config)
        .context("Failed to open packet source (use --interface or --file)")?;
    let mut capture = WirelessCapture::with_config(source, &capture_config)?;

    // Set up signal handler for clean shutdown
    let running = capture.running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping...");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let stats = capture.run(count, |decoded| println!("{}", format_frame(&decoded)))?;

    println!();
    println!(
        "{} {} decoded, {} skipped, {} filtered",
        "Captured:".green().bold(),
        stats.decoded,
        stats.skipped,
        stats.filtered
    );

    Ok(())
}

fn format_frame(decoded: &WirelessFrame) -> String {
    let frame = &decoded.frame;
    let (_, subtype) = frame.type_names();

    let mut line = format!("{:<18}", subtype);
    if let Some(ssid) = frame.ssid() {
        let ssid = if ssid.is_empty() {
            "<hidden>".to_string()
        } else {
            ssid
        };
        line.push_str(&format!(" {}", format!("\"{}\"", ssid).cyan()));
    }

    let addr = |a: Option<wifitap::HwAddr>| a.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string());
    line.push_str(&format!(
        " {} -> {} len={}",
        addr(frame.source()),
        addr(frame.destination()),
        frame.payload.len()
    ));

    if let Some(signal) = decoded.radiotap.signal_dbm() {
        line.push_str(&format!(" {} dBm", signal));
    }
    if let Some(channel) = decoded.radiotap.channel() {
        line.push_str(&format!(" ch {}", channel));
    }
    if frame.is_protected() {
        line.push_str(&format!(" {}", "protected".yellow()));
    }

    line
}

#[cfg(target_os = "linux")]
fn cmd_scan(config: Config, interface: Option<String>, cached: bool, format: OutputFormat) -> Result<()> {
    use wifitap::wireless::scan::wext::WextTransport;
    use wifitap::wireless::ScanEventStream;

    let mut scan_config = config.scan;
    if let Some(interface) = interface {
        scan_config.interface = interface;
    }
    let name = scan_config.interface.clone();

    let transport = WextTransport::open().context("Failed to open control socket")?;
    let mut stream = ScanEventStream::new(transport, scan_config);
    let results = stream
        .scan(!cached)
        .with_context(|| format!("Scan failed on {}", name))?;

    print_scan_results(&results, format)
}

#[cfg(not(target_os = "linux"))]
fn cmd_scan(_config: Config, _interface: Option<String>, _cached: bool, _format: OutputFormat) -> Result<()> {
    anyhow::bail!("Scanning requires Linux wireless extensions")
}

fn print_scan_results(results: &[ScanResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Simple => {
            for r in results {
                println!("{} {}", r.bssid, r.essid.as_deref().unwrap_or(""));
            }
        }
        OutputFormat::Table => {
            let rows: Vec<ScanRow> = results.iter().map(ScanRow::from).collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn cmd_gen_config(config: Config, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("{} {}", "Wrote".green().bold(), path.display());
        }
        None => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
