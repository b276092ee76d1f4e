#[macro_use]
pub mod logging;

pub mod capture;
pub mod io;
pub mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use capture::{run_capture, CaptureError, DirectorySink};
use settings::Settings;

/// Capture a laboratory analyzer's serial/LAN output into batch files.
///
/// All link and framing options are read from LABTAP_* environment
/// variables, optionally layered over a TOML config file.
#[derive(Debug, Parser)]
#[command(name = "labtap", version, about)]
pub struct Cli {
    /// TOML config file (environment variables override its values)
    #[arg(short, long, env = "LABTAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Print the resolved configuration and exit without opening the link
    #[arg(long)]
    pub check: bool,
}

// ============================================================================
// Entry Point
// ============================================================================

pub async fn run(cli: Cli) -> ExitCode {
    if cli.list_ports {
        return print_serial_ports();
    }

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            tlog!("[settings] {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref dir) = settings.log_dir {
        if let Err(e) = logging::init_file_logging(dir) {
            tlog!("[logging] Failed to start file logging in {}: {}", dir.display(), e);
        }
    }

    for warning in &settings.warnings {
        tlog!("[settings] WARNING: {}", warning);
    }
    log_banner(&settings);

    let code = if cli.check {
        ExitCode::SUCCESS
    } else {
        capture_until_stopped(settings).await
    };

    logging::stop_file_logging();
    code
}

fn log_banner(settings: &Settings) {
    tlog!("[capture] Link: {}", settings.link.describe());
    tlog!("[capture] Inbox: {}", settings.inbox.display());
    tlog!(
        "[capture] Idle rotation: {:.2}s  EOT marker: {}",
        settings.framing.idle_threshold.as_secs_f64(),
        settings
            .framing
            .marker
            .as_ref()
            .map(hex::encode)
            .unwrap_or_else(|| "(disabled)".to_string())
    );
}

async fn capture_until_stopped(settings: Settings) -> ExitCode {
    let mut sink = match DirectorySink::new(&settings.inbox, &settings.prefix) {
        Ok(s) => s,
        Err(e) => return report_failure(&e),
    };

    let mut link = match io::open_link(&settings.link) {
        Ok(l) => l,
        Err(e) => return report_failure(&CaptureError::from(e)),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = cancel.clone();
    let policy = settings.framing.clone();
    let mut stop = StopSignals::install();

    // The link is moved into the worker and closed when the loop returns
    let mut handle = tokio::task::spawn_blocking(move || {
        run_capture(&mut *link, &policy, &mut sink, &worker_cancel)
    });

    let finished = tokio::select! {
        res = &mut handle => Ok(res),
        reason = stop.recv() => Err(reason),
    };
    let joined = match finished {
        Ok(res) => res,
        Err(reason) => {
            tlog!("[capture] Stop requested ({}), finishing current batch", reason);
            cancel.store(true, Ordering::Relaxed);
            handle.await
        }
    };

    match joined {
        Ok(Ok(summary)) => {
            tlog!(
                "[capture] Collector stopped by operator ({} batches, {} bytes)",
                summary.batches,
                summary.bytes
            );
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => report_failure(&e),
        Err(e) => {
            tlog!("[capture] Capture task panicked: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// Stop requests from the operator: Ctrl-C, and SIGTERM from service managers on Unix
struct StopSignals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl StopSignals {
    /// SIGTERM is registered here; one arriving before the first `recv` is still seen.
    fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let terminate = match signal(SignalKind::terminate()) {
                Ok(s) => Some(s),
                Err(e) => {
                    tlog!("[capture] Cannot listen for SIGTERM: {}", e);
                    None
                }
            };
            StopSignals { terminate }
        }
        #[cfg(not(unix))]
        {
            StopSignals {}
        }
    }

    /// Wait for the next stop request and name it
    async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            if let Some(terminate) = self.terminate.as_mut() {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "interrupt",
                    _ = terminate.recv() => "terminate",
                };
            }
        }
        let _ = tokio::signal::ctrl_c().await;
        "interrupt"
    }
}

fn report_failure(err: &CaptureError) -> ExitCode {
    tlog!("[capture] ERROR ({}): {}", err.stage(), err);
    ExitCode::FAILURE
}

fn print_serial_ports() -> ExitCode {
    match io::list_serial_ports() {
        Ok(ports) if ports.is_empty() => {
            println!("No serial ports found");
            ExitCode::SUCCESS
        }
        Ok(ports) => {
            for p in ports {
                let mut line = format!("{}  [{}]", p.port_name, p.port_type);
                if let (Some(vid), Some(pid)) = (p.vid, p.pid) {
                    line.push_str(&format!("  {:04x}:{:04x}", vid, pid));
                }
                if let Some(product) = p.product {
                    line.push_str(&format!("  {}", product));
                }
                if let Some(manufacturer) = p.manufacturer {
                    line.push_str(&format!(" ({})", manufacturer));
                }
                if let Some(serial) = p.serial_number {
                    line.push_str(&format!("  s/n {}", serial));
                }
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tlog!("[serial] {}", e);
            ExitCode::FAILURE
        }
    }
}
