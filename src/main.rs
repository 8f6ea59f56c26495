use clap::{Parser, Subcommand};
use log::info;
use std::{
    error::Error,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use mpulog::{
    config::{Config, ConfigStore, FileConfigStore},
    dispatcher::Dispatcher,
    log_files::list_logs,
    record::check_log,
    runtime::{install_interrupt_handler, CancelToken, FixedTicker},
    session::{PollingSession, SessionState},
    transport::{HttpTransport, Transport},
};

/// poll an MPU6050 sensor board over HTTP and keep numbered session logs
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Polls the /data endpoint of an ESP32 + MPU6050 board at a fixed interval and appends every reading as one line to a fresh mpu6050_log_<N>.txt file per session."
)]
pub struct Cli {
    /// path to the JSON config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// sensor host name or IP address
    #[clap(long)]
    host: Option<String>,

    /// sensor HTTP port
    #[clap(long)]
    port: Option<u16>,

    /// directory holding the session logs
    #[clap(long)]
    log_dir: Option<PathBuf>,

    /// milliseconds between polls
    #[clap(long)]
    interval_ms: Option<u64>,

    /// write the effective settings back to the config file
    #[clap(long)]
    save_config: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// interactive menu (default)
    Menu,
    /// run a single logging session until Ctrl+C
    Log {
        /// stop after this many polls
        #[clap(short = 'n', long)]
        count: Option<u64>,
    },
    /// clear the log buffer on the board and reset its counter
    Reset,
    /// list session logs with their record counts
    List,
    /// report malformed lines in a session log
    Check { file: PathBuf },
}

impl Cli {
    /// Layer command-line overrides on top of the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(dir) = &self.log_dir {
            cfg.log_dir = Some(dir.clone());
        }
        if let Some(ms) = self.interval_ms {
            cfg.poll_interval_ms = ms;
        }
        cfg
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = cli.config_store();
    let config = cli.apply(store.load());

    if cli.save_config {
        store.save(&config)?;
        info!("saved settings to {}", store.path().display());
    }

    match cli.command.clone().unwrap_or(Command::Menu) {
        Command::Menu => run_menu(&config)?,
        Command::Log { count } => {
            if !run_single_session(&config, count)? {
                process::exit(1);
            }
        }
        Command::Reset => {
            let transport = HttpTransport::new(config.endpoint());
            if !transport.reset_remote() {
                process::exit(1);
            }
            println!("Logs deleted on ESP32 at {} and reset.", transport.endpoint());
        }
        Command::List => list_sessions(&config.log_dir(), &mut io::stdout())?,
        Command::Check { file } => {
            if !check_file(&file, &mut io::stdout())? {
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn run_menu(config: &Config) -> Result<(), Box<dyn Error>> {
    let transport = HttpTransport::new(config.endpoint());
    let ticker = FixedTicker::new(config.poll_interval());
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;
    info!("sensor board at {}", transport.endpoint());

    let mut dispatcher = Dispatcher::new(&transport, &ticker, config.session_config(), cancel);
    let stdin = io::stdin();
    dispatcher.run(stdin.lock(), io::stdout())?;
    Ok(())
}

/// Returns false when the session failed
fn run_single_session(config: &Config, count: Option<u64>) -> Result<bool, Box<dyn Error>> {
    let transport = HttpTransport::new(config.endpoint());
    let ticker = FixedTicker::new(config.poll_interval());
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;

    let mut session_config = config.session_config();
    if count.is_some() {
        session_config.max_polls = count;
    }

    let report = PollingSession::new(&transport, &ticker, session_config).run(&cancel);
    if let Some(err) = &report.failure {
        eprintln!("Logging failed: {err}");
    }
    if let Some(path) = &report.path {
        println!(
            "{} records from {} polls saved to {} in {}",
            report.stats.written,
            report.stats.polls,
            path.display(),
            report.duration_text()
        );
    }
    Ok(report.state != SessionState::Failed)
}

fn list_sessions<W: Write>(dir: &Path, out: &mut W) -> Result<(), Box<dyn Error>> {
    let logs = list_logs(dir)?;
    if logs.is_empty() {
        writeln!(out, "No session logs in {}", dir.display())?;
        return Ok(());
    }
    for log in logs {
        let name = log
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match check_log(&log.path) {
            Ok(check) => writeln!(
                out,
                "{:>5}  {}  {} records",
                log.index, name, check.well_formed
            )?,
            Err(e) => writeln!(out, "{:>5}  {}  unreadable: {}", log.index, name, e)?,
        }
    }
    Ok(())
}

/// Returns false when the file has malformed lines
fn check_file<W: Write>(file: &Path, out: &mut W) -> Result<bool, Box<dyn Error>> {
    let check = check_log(file)?;
    writeln!(
        out,
        "{}: {} well-formed, {} malformed",
        file.display(),
        check.well_formed,
        check.malformed
    )?;
    if let Some(line) = check.first_malformed_line {
        writeln!(out, "first malformed line: {line}")?;
    }
    Ok(check.is_clean())
}
