use clap::{ArgAction, Args, Parser, Subcommand};
use radsim_engine::config::{require_env, SECRET_ENV, SERVER_ENV};
use radsim_engine::{
    ActionError, Config, Engine, EventJournal, RadclientClient, SessionRecord, SessionStore,
};
use radsim_proto::{AcctTerminateCause, AttributeGenerator, Overrides, Scenario};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_EXCHANGE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_ACTION: u8 = 3;

/// radsim - RADIUS session lifecycle simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radsim")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "radsim.json")]
    config: PathBuf,

    /// Session store file (overrides the configuration)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// RADIUS server address
    #[arg(long, global = true, env = SERVER_ENV, hide_env_values = true)]
    server: Option<String>,

    /// RADIUS shared secret
    #[arg(long, global = true, env = SECRET_ENV, hide_env_values = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wired 802.1X session
    #[command(aliases = ["dot1x-wired", "wired-dot1x", "wired"])]
    Dot1x(EndpointArgs),
    /// Wireless 802.1X session
    #[command(aliases = ["wireless-dot1x", "wireless"])]
    Dot1xWireless(EndpointArgs),
    /// Wired MAB session
    #[command(aliases = ["mab-wired", "wired-mab"])]
    Mab(EndpointArgs),
    /// Wireless MAB session
    #[command(alias = "wireless-mab")]
    MabWireless(EndpointArgs),
    /// Remote access VPN session
    Vpn(EndpointArgs),
    /// Show live sessions
    Sessions {
        /// Include stopped sessions
        #[arg(long)]
        all: bool,
    },
    /// Stop one session, or every live session
    Stop {
        #[arg(long)]
        sid: Option<String>,
    },
    /// Start a random session or re-authenticate a live one
    Random,
    /// Run the continuous scheduler until interrupted
    Run,
}

#[derive(Args, Debug, Default)]
struct EndpointArgs {
    /// Calling-Station-Id (client MAC or VPN source IP)
    #[arg(long)]
    calling: Option<String>,

    /// Called-Station-Id (NAS MAC, optionally MAC:SSID)
    #[arg(long)]
    called: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Acct-Session-Id to use instead of a generated one
    #[arg(long)]
    sid: Option<String>,

    /// NAS-Identifier
    #[arg(long = "nas-id")]
    nas_id: Option<String>,

    #[arg(long)]
    port: Option<u32>,

    #[arg(long = "port-id")]
    port_id: Option<String>,
}

impl From<EndpointArgs> for Overrides {
    fn from(args: EndpointArgs) -> Self {
        Overrides {
            username: args.username,
            password: args.password,
            calling_station_id: args.calling,
            called_station_id: args.called,
            nas_port: args.port,
            nas_port_id: args.port_id,
            session_id: args.sid,
            nas_identifier: args.nas_id,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error in {}: {}", cli.config.display(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let log_level = match cli.verbose {
        0 => config.log_level.as_deref().unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine = match build_engine(&cli, &config) {
        Ok(engine) => engine,
        Err(message) => {
            error!("{}", message);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = match cli.command {
        Command::Run => run_scheduler(&engine).await,
        command => {
            if let Err(code) = sweep_before(&engine).await {
                return ExitCode::from(code);
            }
            run_command(&engine, command).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn build_engine(cli: &Cli, config: &Config) -> Result<Engine, String> {
    let server = require_env(SERVER_ENV, cli.server.clone()).map_err(|e| e.to_string())?;
    let secret = require_env(SECRET_ENV, cli.secret.clone()).map_err(|e| e.to_string())?;

    let radclient = config
        .radclient(&server, &secret)
        .map_err(|e| e.to_string())?;
    let journal = EventJournal::new(config.journal_path.as_ref().map(PathBuf::from))
        .map_err(|e| format!("Cannot open journal: {}", e))?;
    if let Some(path) = journal.path() {
        info!(journal = %path.display(), "Lifecycle journal enabled");
    }

    let store_path = cli
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.store_path));
    info!(server = %server, store = %store_path.display(), "radsim v{}", env!("CARGO_PKG_VERSION"));

    let mut engine = Engine::new(
        SessionStore::new(store_path),
        Arc::new(RadclientClient::new(radclient)),
        AttributeGenerator::new(config.generator_defaults()),
        config.scheduler_settings(),
    )
    .with_journal(Arc::new(journal));
    if let Some(seed) = config.scheduler.seed {
        engine = engine.with_seed(seed);
    }
    Ok(engine)
}

/// One-shot commands first retire whatever expired since the last run
async fn sweep_before(engine: &Engine) -> Result<(), u8> {
    match engine.sweep_expired().await {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => {
            error!("Session store unusable: {}", e);
            Err(EXIT_ACTION)
        }
        Err(e) => {
            warn!("Expiration sweep incomplete: {}", e);
            Ok(())
        }
    }
}

async fn run_command(engine: &Engine, command: Command) -> Result<(), u8> {
    match command {
        Command::Dot1x(args) => start(engine, Scenario::Dot1x, args).await,
        Command::Dot1xWireless(args) => start(engine, Scenario::Dot1xWireless, args).await,
        Command::Mab(args) => start(engine, Scenario::Mab, args).await,
        Command::MabWireless(args) => start(engine, Scenario::MabWireless, args).await,
        Command::Vpn(args) => start(engine, Scenario::Vpn, args).await,
        Command::Random => {
            let record = engine.random_auth().await.map_err(report_failure)?;
            print_record(&record);
            Ok(())
        }
        Command::Sessions { all } => {
            let records = if all {
                engine.store().all_sessions().await
            } else {
                engine
                    .store()
                    .active_sessions()
                    .await
                    .map(|active| active.iter().cloned().collect::<Vec<_>>())
            };
            let records = records.map_err(|e| report_failure(e.into()))?;
            print_table(&records);
            Ok(())
        }
        Command::Stop { sid: Some(sid) } => {
            let record = engine
                .stop_session(&sid, AcctTerminateCause::UserRequest)
                .await
                .map_err(report_failure)?;
            print_record(&record);
            Ok(())
        }
        Command::Stop { sid: None } => {
            let report = engine.stop_all().await.map_err(report_failure)?;
            println!("Stopped {} session(s), {} failed", report.stopped, report.failed);
            if report.failed > 0 {
                Err(EXIT_EXCHANGE)
            } else {
                Ok(())
            }
        }
        Command::Run => run_scheduler(engine).await,
    }
}

async fn start(engine: &Engine, scenario: Scenario, args: EndpointArgs) -> Result<(), u8> {
    let overrides = Overrides::from(args);
    let record = engine
        .start_session(scenario, &overrides)
        .await
        .map_err(report_failure)?;
    print_record(&record);
    Ok(())
}

async fn run_scheduler(engine: &Engine) -> Result<(), u8> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing current action");
        let _ = tx.send(true);
    });

    engine.run(rx).await.map_err(|e| {
        error!("Scheduler stopped: {}", e);
        EXIT_ACTION
    })
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn report_failure(e: ActionError) -> u8 {
    match &e {
        ActionError::Exchange(_) => warn!("{}", e),
        _ => error!("{}", e),
    }
    e.exit_code()
}

fn print_record(record: &SessionRecord) {
    println!("Acct-Session-Id:    {}", record.session_id);
    println!("Method:             {}", record.method);
    println!("Status:             {}", record.status);
    println!("User-Name:          {}", record.user_name);
    println!("Calling-Station-Id: {}", record.calling_station_id);
    println!("Called-Station-Id:  {}", record.called_station_id);
    println!("Framed-IP-Address:  {}", record.framed_ip_address);
    println!("NAS-Port-Type:      {}", record.nas_port_type);
    println!("NAS-Port-Id:        {}", record.nas_port_id);
    println!("Session-Timeout:    {}", record.session_timeout);
    println!("Deadline:           {}", record.deadline().format("%Y-%m-%d %H:%M:%S"));
}

fn print_table(records: &[SessionRecord]) {
    if records.is_empty() {
        println!("No sessions");
        return;
    }
    println!(
        "{:<24}  {:<6}  {:<14}  {:<20}  {:<21}  {:<19}",
        "Acct-Session-Id", "Method", "Status", "User-Name", "Calling-Station-Id", "Deadline"
    );
    for record in records {
        println!(
            "{:<24}  {:<6}  {:<14}  {:<20}  {:<21}  {:<19}",
            record.session_id,
            record.method.name(),
            record.status.name(),
            record.user_name,
            record.calling_station_id,
            record.deadline().format("%Y-%m-%d %H:%M:%S").to_string()
        );
    }
    println!("{} session(s)", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scenario_aliases() {
        let cases = [
            ("wired", Scenario::Dot1x),
            ("dot1x-wired", Scenario::Dot1x),
            ("wireless", Scenario::Dot1xWireless),
            ("mab-wired", Scenario::Mab),
            ("wired-mab", Scenario::Mab),
            ("wireless-mab", Scenario::MabWireless),
            ("vpn", Scenario::Vpn),
        ];
        for (name, expected) in cases {
            let cli = Cli::try_parse_from(["radsim", name, "--calling", "02-00-00-00-00-01"]).unwrap();
            let scenario = match cli.command {
                Command::Dot1x(_) => Scenario::Dot1x,
                Command::Dot1xWireless(_) => Scenario::Dot1xWireless,
                Command::Mab(_) => Scenario::Mab,
                Command::MabWireless(_) => Scenario::MabWireless,
                Command::Vpn(_) => Scenario::Vpn,
                other => panic!("{name} parsed as {other:?}"),
            };
            assert_eq!(scenario, expected, "subcommand {name}");
        }
    }

    #[test]
    fn test_endpoint_overrides() {
        let cli = Cli::try_parse_from([
            "radsim", "mab", "--sid", "DUP", "--nas-id", "sw01", "--port", "7",
        ])
        .unwrap();
        let Command::Mab(args) = cli.command else {
            panic!("expected mab");
        };
        let overrides = Overrides::from(args);
        assert_eq!(overrides.session_id.as_deref(), Some("DUP"));
        assert_eq!(overrides.nas_identifier.as_deref(), Some("sw01"));
        assert_eq!(overrides.nas_port, Some(7));
    }
}
