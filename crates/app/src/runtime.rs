//! The acquisition loop: fixed-cadence supervision of the capture process
//! and synchronized per-tick recording.

use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use gasrec_capture::read_latest_sample;
use gasrec_capture::supervisor::{ProcessSupervisor, EXPORT_CSV, EXPORT_RAW};
use gasrec_foundation::{AppError, Liveness, Sample, SharedClock, ShutdownFlag, Tick};
use gasrec_session::SessionDir;

/// Scheduling period. Wall-clock, not drift-corrected; the sleep does not
/// account for work duration.
pub const TICK_INTERVAL: Duration = Duration::from_millis(2500);

pub struct AcquisitionLoop {
    supervisor: ProcessSupervisor,
    session: SessionDir,
    clock: SharedClock,
    shutdown: ShutdownFlag,
    repodir: PathBuf,
    tick_interval: Duration,
    /// Sample held across ticks; parse failures carry the previous value
    /// forward rather than aborting the tick.
    sample: Sample,
}

impl AcquisitionLoop {
    pub fn new(
        supervisor: ProcessSupervisor,
        session: SessionDir,
        clock: SharedClock,
        shutdown: ShutdownFlag,
        repodir: PathBuf,
    ) -> Self {
        Self {
            supervisor,
            session,
            clock,
            shutdown,
            repodir,
            tick_interval: TICK_INTERVAL,
            sample: Sample::UNAVAILABLE,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn current_sample(&self) -> Sample {
        self.sample
    }

    pub fn session(&self) -> &SessionDir {
        &self.session
    }

    /// Drive ticks until interrupted or a fatal capture error, then run the
    /// finalize path. Finalization always runs, including after a fatal
    /// error, so the raw logs are left consistent on disk.
    pub fn run(mut self) -> Result<(), AppError> {
        let acquired = self.acquire();
        if let Err(e) = &acquired {
            tracing::error!("Acquisition ended with error: {}", e);
        }
        let finalized = self.finish();
        acquired.and(finalized)
    }

    fn acquire(&mut self) -> Result<(), AppError> {
        while !self.shutdown.is_requested() {
            self.tick()?;
            self.clock.sleep(self.tick_interval);
        }
        tracing::info!("Ending recording session...");
        Ok(())
    }

    /// One scheduling period: classify the export artifact, update the held
    /// sample, and emit exactly one record regardless of upstream health.
    pub fn tick(&mut self) -> Result<(), AppError> {
        let t = self
            .clock
            .system_now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let csv = self.repodir.join(EXPORT_CSV);

        match self.supervisor.check_liveness(&csv) {
            Liveness::Fresh => {
                let raw = self.repodir.join(EXPORT_RAW);
                if let Err(e) = self.session.snapshot_artifacts(&csv, &raw) {
                    tracing::warn!("Artifact snapshot failed this tick: {}", e);
                }
                match read_latest_sample(&csv) {
                    Ok(sample) => self.sample = sample,
                    Err(e) => {
                        tracing::debug!("Export parse failed, holding previous sample: {}", e)
                    }
                }
            }
            Liveness::Stale { age } => {
                tracing::warn!(
                    "No fresh export for {}s, capture process presumed wedged",
                    age.as_secs()
                );
                self.supervisor.restart()?;
            }
            // The capture process has not produced output yet. Warm-up, not
            // a crash; no restart.
            Liveness::Missing => self.sample = Sample::UNAVAILABLE,
        }

        self.session.append_tick(&Tick {
            timestamp: t,
            sample: self.sample,
        })?;

        tracing::info!(
            "{} ({:.1}): O2 {}, MAC {}, Dose {}",
            chrono::Local::now().format("%m-%d-%Y %H:%M:%S"),
            t,
            self.sample.o2,
            self.sample.mac,
            self.sample.dose
        );
        Ok(())
    }

    /// Finalize in order: adopt the vendor artifacts, terminate the capture
    /// process, convert the channel logs.
    fn finish(&mut self) -> Result<(), AppError> {
        let csv = self.repodir.join(EXPORT_CSV);
        let raw = self.repodir.join(EXPORT_RAW);
        self.session.adopt_artifacts(&csv, &raw);
        self.supervisor.shutdown();
        self.session.convert_channels()?;
        tracing::info!("All files converted.");
        Ok(())
    }
}
