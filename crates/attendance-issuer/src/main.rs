//! Attendance issuer entry point.
//!
//! Runs one attendance attempt for a course and keeps the tone playing until
//! the session expires, `--emit-secs` elapses, or Ctrl+C is pressed.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load AppConfig (TOML) + CLI overrides
//!  └─ build hardware adapters
//!       ├─ ScriptedPositionSource   (simulated receiver, --sim-* flags)
//!       ├─ SimulatedAudioOutput     (sine renderer, no device)
//!       └─ HttpSessionBackend       (JSON POST to [backend])
//!  └─ AttendanceOrchestrator::take_attendance(course)
//!       probe → acquire → pick frequency → issue → emit
//!  └─ wait for expiry / --emit-secs / Ctrl+C, then stop_attendance()
//! ```
//!
//! # Simulated hardware
//!
//! This build has no platform positioning or audio backends.  The scripted
//! receiver delivers one sample per `--sim-interval-ms` with the accuracies
//! given by repeated `--sim-accuracy` flags, which is enough to exercise the
//! early-exit and best-effort paths against a real backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use attendance_core::now_epoch_ms;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use attendance_issuer::application::acquire_location::{LocationAcquirer, PositionSource};
use attendance_issuer::application::emit_frequency::{AudioOutput, FrequencyEmitter};
use attendance_issuer::application::issue_session::SessionIssuer;
use attendance_issuer::application::probe_permissions::PermissionProbe;
use attendance_issuer::application::take_attendance::AttendanceOrchestrator;
use attendance_issuer::infrastructure::audio::SimulatedAudioOutput;
use attendance_issuer::infrastructure::backend::HttpSessionBackend;
use attendance_issuer::infrastructure::positioning::ScriptedPositionSource;
use attendance_issuer::infrastructure::storage::config::{load_config, load_config_from, AppConfig, ConfigError};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Proximity-verified attendance issuer.
///
/// Acquires the classroom location, obtains an attendance link from the
/// backend, and broadcasts the link's near-ultrasonic frequency.
#[derive(Debug, Parser)]
#[command(
    name = "attendance-issuer",
    about = "Issue a proximity-verified attendance session for a course",
    version
)]
struct Cli {
    /// Course to take attendance for.
    #[arg(long, env = "ATTENDANCE_COURSE")]
    course: String,

    /// Path to a TOML config file.  Defaults to the platform config directory.
    #[arg(long, env = "ATTENDANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `[issuer] issuer_id`.
    #[arg(long, env = "ATTENDANCE_ISSUER")]
    issuer: Option<String>,

    /// Overrides `[backend] base_url`.
    #[arg(long, env = "ATTENDANCE_BACKEND_URL")]
    backend_url: Option<String>,

    /// Stop emitting after this many seconds instead of waiting for expiry.
    #[arg(long)]
    emit_secs: Option<u64>,

    /// Latitude reported by the simulated receiver.
    #[arg(long, default_value_t = 37.5665, allow_hyphen_values = true)]
    sim_latitude: f64,

    /// Longitude reported by the simulated receiver.
    #[arg(long, default_value_t = 126.9780, allow_hyphen_values = true)]
    sim_longitude: f64,

    /// Accuracy (metres) of each successive simulated sample.  Repeatable.
    #[arg(long = "sim-accuracy", default_values_t = [150.0, 80.0, 15.0])]
    sim_accuracy: Vec<f64>,

    /// Delay between simulated samples in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    sim_interval_ms: u64,

    /// Make the simulated receiver deny location permission.
    #[arg(long)]
    sim_deny_positioning: bool,
}

impl Cli {
    /// Loads the config file and applies CLI overrides on top of it.
    fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Ok(config) => config,
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                Err(e) => return Err(e).context("failed to load config"),
            },
        };
        self.apply_overrides(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(issuer) = &self.issuer {
            config.issuer.issuer_id = issuer.clone();
        }
        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.clone();
        }
    }

    fn position_source(&self) -> ScriptedPositionSource {
        if self.sim_deny_positioning {
            ScriptedPositionSource::denied()
        } else {
            ScriptedPositionSource::converging(
                self.sim_latitude,
                self.sim_longitude,
                &self.sim_accuracy,
                Duration::from_millis(self.sim_interval_ms),
            )
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.issuer.log_level)),
        )
        .init();

    info!(course = %cli.course, issuer = %config.issuer.issuer_id, "attendance issuer starting");

    // ── Hardware adapters ─────────────────────────────────────────────────────
    let positioning: Arc<dyn PositionSource> = Arc::new(cli.position_source());
    let audio: Arc<dyn AudioOutput> = Arc::new(SimulatedAudioOutput::new());
    let backend = HttpSessionBackend::new(
        &config.backend.base_url,
        &config.backend.issue_path,
        config.request_timeout(),
    )
    .context("invalid backend endpoint")?;
    info!(endpoint = %backend.endpoint(), "issuance backend configured");

    // ── Use cases ─────────────────────────────────────────────────────────────
    let orchestrator = AttendanceOrchestrator::new(
        PermissionProbe::new(Arc::clone(&positioning), Arc::clone(&audio), config.probe_timeout()),
        LocationAcquirer::new(positioning, config.acquisition_config()),
        SessionIssuer::new(Arc::new(backend)),
        FrequencyEmitter::new(audio, config.emitter.amplitude).context("invalid emitter amplitude")?,
        config.attempt_settings(),
    );

    let mut progress = orchestrator.acquisition_progress();
    let progress_log = tokio::spawn(async move {
        let mut last = String::new();
        while progress.changed().await.is_ok() {
            let snapshot = progress.borrow_and_update().clone();
            if snapshot.message != last {
                let percent = (snapshot.progress * 100.0).round() as u32;
                info!(percent, "{}", snapshot.message);
                last = snapshot.message;
            }
        }
    });

    // ── Attempt ───────────────────────────────────────────────────────────────
    let session = match orchestrator.take_attendance(&cli.course).await {
        Ok(session) => session,
        Err(e) => {
            error!("attendance attempt failed: {e}");
            progress_log.abort();
            return Err(e).context("attendance attempt failed");
        }
    };
    progress_log.abort();

    let link = session.redemption_link(&config.redemption.domain, &config.redemption.path_prefix);
    let remaining = Duration::from_millis(session.remaining_ms_at(now_epoch_ms()).max(0) as u64);
    info!(
        link = %link,
        frequency = %session.frequency_hz,
        expires_in_secs = remaining.as_secs(),
        "attendance session live"
    );

    // ── Emit until expiry, --emit-secs, or Ctrl+C ─────────────────────────────
    let emit_for = cli
        .emit_secs
        .map(Duration::from_secs)
        .map_or(remaining, |d| d.min(remaining));
    tokio::select! {
        () = tokio::time::sleep(emit_for) => {
            info!("emission window elapsed");
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("received Ctrl+C; stopping"),
            Err(e) => warn!("failed to listen for Ctrl+C signal: {e}; stopping"),
        },
    }

    orchestrator.stop_attendance();
    info!("attendance issuer stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
