use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use geolocator::algorithms::Method;
use geolocator::api::{EstimateReport, Locator, OutputFormat, SourceSelection};
use geolocator::map::{HtmlMap, MapError};
use geolocator::sources::connector_name;
use geolocator::utils::config::{ConfigurationManager, Settings, DEFAULT_SETTINGS_FILE};

/// Estimate the geographic location of an IPv4 address from several lookup services
#[derive(Parser, Debug)]
#[command(name = "geolocator", version)]
struct Cli {
    /// Print log records to stderr
    #[arg(long, global = true)]
    logs: bool,

    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query the lookup services and estimate a location
    Locate(LocateArgs),
    /// Reduce observations stored in a JSON file
    Reduce(ReduceArgs),
    /// Create or update the settings file
    Setup(SetupArgs),
    /// List configured sources
    Sources,
}

#[derive(Args, Debug)]
struct MethodArgs {
    /// Average the observations (on by default)
    #[arg(short, long)]
    average: bool,

    /// Skip the average
    #[arg(long, conflicts_with = "average")]
    no_average: bool,

    /// Centroid of the most compact observation cluster
    #[arg(short, long)]
    clustering: bool,

    /// Per-axis median
    #[arg(short, long)]
    median: bool,
}

impl MethodArgs {
    fn methods(&self) -> Vec<Method> {
        let mut methods = Vec::new();
        if self.average || !self.no_average {
            methods.push(Method::Average);
        }
        if self.clustering {
            methods.push(Method::Clustering);
        }
        if self.median {
            methods.push(Method::Median);
        }
        methods
    }
}

#[derive(Args, Debug)]
struct LocateArgs {
    /// Address to locate
    ip_address: Ipv4Addr,

    #[command(flatten)]
    methods: MethodArgs,

    /// Only active commercial sources
    #[arg(long, conflicts_with_all = ["noncommercial", "database"])]
    commercial: bool,

    /// Only active noncommercial sources
    #[arg(long, conflicts_with = "database")]
    noncommercial: bool,

    /// Query the named sources only
    #[arg(short = 'd', long = "database", value_name = "NAME")]
    database: Vec<String>,

    /// Write an HTML map of the sources and estimates
    #[arg(short = 'g', long)]
    generate_map: bool,

    /// Map file name without extension
    #[arg(long, value_name = "NAME")]
    map_file: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl LocateArgs {
    fn selection(&self) -> SourceSelection {
        if self.commercial {
            SourceSelection::Commercial
        } else if self.noncommercial {
            SourceSelection::Noncommercial
        } else if !self.database.is_empty() {
            SourceSelection::Named(self.database.clone())
        } else {
            SourceSelection::All
        }
    }
}

#[derive(Args, Debug)]
struct ReduceArgs {
    /// JSON object mapping source names to coordinates or null
    #[arg(short, long)]
    input: PathBuf,

    /// Methods to run (all when omitted)
    #[arg(value_enum)]
    methods: Vec<Method>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct SetupArgs {
    /// Mark a source active
    #[arg(long, value_name = "SOURCE")]
    enable: Vec<String>,

    /// Mark a source inactive
    #[arg(long, value_name = "SOURCE")]
    disable: Vec<String>,

    /// Store an API key as SOURCE=KEY
    #[arg(long, value_name = "SOURCE=KEY")]
    api_key: Vec<String>,

    /// Store a local database path as SOURCE=PATH
    #[arg(long, value_name = "SOURCE=PATH")]
    db_file: Vec<String>,
}

/// Split `SOURCE=VALUE` at the first `=`
fn split_assignment(entry: &str) -> Result<(&str, &str), String> {
    match entry.split_once('=') {
        Some((source, value)) if !source.trim().is_empty() => Ok((source.trim(), value)),
        _ => Err(format!("Expected SOURCE=VALUE, got '{}'", entry)),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.logs { "info" } else { "off" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Locate(args) => locate(&cli.config, args),
        Command::Reduce(args) => reduce(&cli.config, args),
        Command::Setup(args) => setup(&cli.config, args),
        Command::Sources => list_sources(&cli.config),
    }
}

fn locate(config: &Path, args: LocateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let manager = ConfigurationManager::load_or_create(config)?;
    let settings = manager.settings().clone();

    let generate_map = args.generate_map || settings.map.generate;
    let map_file = args.map_file.clone().unwrap_or_else(|| settings.map.file_name.clone());

    let locator = Locator::new(settings);
    let methods = args.methods.methods();
    let selection = args.selection();
    debug!("Locating {} with {:?} from {:?}", args.ip_address, methods, selection);

    let report = if generate_map {
        let mut map = HtmlMap::new();
        let report = locator.locate_with_sink(args.ip_address, &selection, &methods, &mut map)?;
        let center = Locator::map_center(&report.observations, &report.estimates).ok_or(MapError::NoCenter)?;
        let path = map.save(&center, &map_file)?;
        info!("Map written to {}", path.display());
        report
    } else {
        locator.locate(args.ip_address, &selection, &methods)?
    };

    print_report(&report, args.format)
}

fn reduce(config: &Path, args: ReduceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = if config.exists() {
        ConfigurationManager::from_file(config)?.settings().clone()
    } else {
        Settings::default()
    };

    let content = fs::read_to_string(&args.input)?;
    let locator = Locator::with_sources(settings, Vec::new());
    let filtered = locator.observations_from_json(&content)?;
    for (source, reason) in &filtered.rejected {
        info!("Skipping {}: {}", source, reason);
    }

    let methods = if args.methods.is_empty() {
        Method::ALL.to_vec()
    } else {
        args.methods
    };
    let estimates = locator.calculate(&filtered.observations, &methods)?;

    let report = EstimateReport {
        ip: None,
        observations: filtered.observations,
        estimates,
    };
    print_report(&report, args.format)
}

fn setup(config: &Path, args: SetupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let existed = config.exists();
    let mut manager = ConfigurationManager::load_or_create(config)?;

    for source in &args.enable {
        manager.set_source_active(source, true)?;
    }
    for source in &args.disable {
        manager.set_source_active(source, false)?;
    }
    for entry in &args.api_key {
        let (source, key) = split_assignment(entry)?;
        manager.set_api_key(source, Some(key.to_string()))?;
    }
    for entry in &args.db_file {
        let (source, path) = split_assignment(entry)?;
        manager.set_db_file(source, Some(path.to_string()))?;
    }

    if manager.is_modified() {
        manager.save()?;
        println!("Settings saved to {}", config.display());
    } else if existed {
        println!("Settings file {} already exists", config.display());
    } else {
        println!("Default settings written to {}", config.display());
    }
    Ok(())
}

fn list_sources(config: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let manager = ConfigurationManager::load_or_create(config)?;
    for (kind, key, source) in manager.settings().sources() {
        let connector = connector_name(key).unwrap_or("-");
        println!(
            "{:<14} {:<16} {:<20} active={:<5} marker={}",
            kind.to_string(),
            key,
            connector,
            source.active,
            source.generate_marker
        );
    }
    Ok(())
}

fn print_report(report: &EstimateReport, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", format.formatter().format(report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn locate_args(args: &[&str]) -> LocateArgs {
        let argv = ["geolocator", "locate"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Locate(args) => args,
            other => panic!("expected locate, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_average_is_default_method() {
        assert_eq!(locate_args(&["147.229.2.90"]).methods.methods(), vec![Method::Average]);
        assert_eq!(
            locate_args(&["147.229.2.90", "--no-average", "-m"]).methods.methods(),
            vec![Method::Median]
        );
        assert_eq!(
            locate_args(&["147.229.2.90", "-a", "-c", "-m"]).methods.methods(),
            vec![Method::Average, Method::Clustering, Method::Median]
        );
        assert!(locate_args(&["147.229.2.90", "--no-average"]).methods.methods().is_empty());
    }

    #[test]
    fn test_average_conflicts_with_no_average() {
        let result = Cli::try_parse_from(["geolocator", "locate", "147.229.2.90", "-a", "--no-average"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_source_selection() {
        assert_eq!(locate_args(&["147.229.2.90"]).selection(), SourceSelection::All);
        assert_eq!(
            locate_args(&["147.229.2.90", "--commercial"]).selection(),
            SourceSelection::Commercial
        );
        assert_eq!(
            locate_args(&["147.229.2.90", "--noncommercial"]).selection(),
            SourceSelection::Noncommercial
        );
        assert_eq!(
            locate_args(&["147.229.2.90", "-d", "ip_api", "--database", "HostIP"]).selection(),
            SourceSelection::Named(vec!["ip_api".to_string(), "HostIP".to_string()])
        );

        let result = Cli::try_parse_from(["geolocator", "locate", "147.229.2.90", "--commercial", "-d", "ip_api"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_invalid_ipv4_rejected() {
        for address in ["300.1.2.3", "localhost", "::1"] {
            let result = Cli::try_parse_from(["geolocator", "locate", address]);
            assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueValidation, "{}", address);
        }
    }

    #[test]
    fn test_setup_assignments() {
        let cli = Cli::try_parse_from([
            "geolocator",
            "setup",
            "--api-key",
            "ip_info=abc=123",
            "--db-file",
            "max_mind_lite=/data/GeoLite2-City.mmdb",
            "--enable",
            "ip_info",
        ])
        .unwrap();
        let Command::Setup(args) = cli.command else {
            panic!("expected setup");
        };

        assert_eq!(args.enable, vec!["ip_info"]);
        assert_eq!(split_assignment(&args.api_key[0]), Ok(("ip_info", "abc=123")));
        assert_eq!(
            split_assignment(&args.db_file[0]),
            Ok(("max_mind_lite", "/data/GeoLite2-City.mmdb"))
        );
        assert!(split_assignment("ip_info").is_err());
        assert!(split_assignment("=abc").is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["geolocator", "sources", "--logs", "--config", "other.json"]).unwrap();
        assert!(cli.logs);
        assert_eq!(cli.config, PathBuf::from("other.json"));
        assert!(matches!(cli.command, Command::Sources));
    }
}
