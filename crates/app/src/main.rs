use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use gasrec_app::runtime::AcquisitionLoop;
use gasrec_capture::device::DEFAULT_PORT;
use gasrec_capture::supervisor::SupervisorConfig;
use gasrec_capture::{DevicePort, ProcessSupervisor};
use gasrec_foundation::{real_clock, ShutdownFlag};
use gasrec_session::{SessionDir, MONITOR_LOG};

#[derive(Parser, Debug)]
#[command(name = "gasrec", about = "Supervised recording of anesthesia monitor channels")]
struct Args {
    /// Root directory for recording sessions
    #[arg(long, default_value_os_t = default_datadir())]
    datadir: PathBuf,

    /// Directory holding the vendor capture binary and its export files
    #[arg(long, default_value_os_t = default_repodir())]
    repodir: PathBuf,

    /// Serial interface of the monitor
    #[arg(long, default_value = DEFAULT_PORT)]
    port: PathBuf,

    /// Runtime hosting the vendor capture binary
    #[arg(long, default_value_os_t = PathBuf::from("/usr/bin/mono"))]
    runtime: PathBuf,

    /// Sampling interval handed to the capture process, in seconds
    #[arg(long, default_value_t = 5)]
    interval: u32,

    /// Export age, in seconds, after which the capture process is restarted
    #[arg(long, default_value_t = 20)]
    stale_secs: u64,
}

fn default_datadir() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_repodir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Console plus a monitor-log file layer inside the session directory. The
/// capture process appends its own stdout/stderr to the same file.
fn init_logging(session: &SessionDir) -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::never(session.path(), MONITOR_LOG);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Fail fast before anything else touches the disk: a prior recording is
    // never overwritten.
    let session = SessionDir::create(&args.datadir)?;
    init_logging(&session)?;
    tracing::info!("Recording session directory: {}", session.path().display());

    let shutdown = ShutdownFlag::new()
        .install()
        .context("failed to install interrupt handler")?;

    let mut config = SupervisorConfig::new(&args.repodir, session.monitor_log());
    config.port = DevicePort::new(&args.port);
    config.runtime = args.runtime;
    config.sample_interval_secs = args.interval;
    config.stale_after = Duration::from_secs(args.stale_secs);

    let clock = real_clock();
    let mut supervisor = ProcessSupervisor::new(config, clock.clone());
    supervisor.clear_stale_exports(&args.repodir);
    supervisor.start()?;

    AcquisitionLoop::new(supervisor, session, clock, shutdown, args.repodir).run()?;
    tracing::info!("Recording session complete.");
    Ok(())
}
