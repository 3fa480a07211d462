use log::{debug, error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{AutoArmPolicy, Config};
use crate::device_client::{DeviceState, RemoteDevice};
use crate::display::PatternDisplay;
use crate::error::{CaptureError, Phase, SessionError};
use crate::patterns::PatternSequence;
use crate::session::{Session, SessionReport};

/// Knobs fixed for the lifetime of one session.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub settle: Duration,
    pub auto_arm: AutoArmPolicy,
    pub output_root: PathBuf,
    pub session_prefix: String,
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle: config.settle_duration(),
            auto_arm: config.capture.auto_arm,
            output_root: config.paths.output_root.clone(),
            session_prefix: config.paths.session_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Arming,
    Displaying(usize),
    Settling(usize),
    Capturing(usize),
    Persisting(usize),
    Disarming,
    Done,
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Init => write!(f, "INIT"),
            SessionState::Arming => write!(f, "ARMING"),
            SessionState::Displaying(i) => write!(f, "DISPLAYING[{}]", i),
            SessionState::Settling(i) => write!(f, "SETTLING[{}]", i),
            SessionState::Capturing(i) => write!(f, "CAPTURING[{}]", i),
            SessionState::Persisting(i) => write!(f, "PERSISTING[{}]", i),
            SessionState::Disarming => write!(f, "DISARMING"),
            SessionState::Done => write!(f, "DONE"),
            SessionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Drives one session: for every pattern, display, settle, capture, persist.
///
/// Strictly sequential; the only waiting is the settle sleep and the
/// blocking calls into the display and the remote device.
pub struct CaptureController<D, P> {
    settings: CaptureSettings,
    device: D,
    display: P,
    state: SessionState,
    history: Vec<SessionState>,
    /// Set while the device is armed because of this session and not yet reverted.
    armed_by_session: bool,
}

impl<D: RemoteDevice, P: PatternDisplay> CaptureController<D, P> {
    pub fn new(settings: CaptureSettings, device: D, display: P) -> Self {
        Self {
            settings,
            device,
            display,
            state: SessionState::Init,
            history: Vec::new(),
            armed_by_session: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Releases the device and display, e.g. to close the projector window.
    pub fn into_parts(self) -> (D, P) {
        (self.device, self.display)
    }

    pub async fn run(&mut self, sequence: &PatternSequence) -> Result<SessionReport, SessionError> {
        info!(
            "Starting capture of {} patterns from {} (settle {:?}, auto-arm {})",
            sequence.len(),
            sequence.source().display(),
            self.settings.settle,
            self.settings.auto_arm.name()
        );

        match self.run_sequence(sequence).await {
            Ok(report) => {
                self.transition(SessionState::Done);
                info!("{}", report.summary());
                Ok(report)
            }
            Err(err) => {
                error!("{}", err);
                self.release_device().await;
                self.transition(SessionState::Aborted);
                Err(err)
            }
        }
    }

    async fn run_sequence(&mut self, sequence: &PatternSequence) -> Result<SessionReport, SessionError> {
        self.transition(SessionState::Init);
        let session = Session::begin(&self.settings.output_root, &self.settings.session_prefix)
            .map_err(|e| SessionError::new(Phase::Init, None, e))?;

        self.transition(SessionState::Arming);
        self.arm_for_session()
            .await
            .map_err(|e| SessionError::new(Phase::Arming, None, e))?;

        let surface_size = self.display.surface_size();
        let mut saved = Vec::with_capacity(sequence.len());

        for pattern in sequence.iter() {
            let index = pattern.index;

            self.transition(SessionState::Displaying(index));
            self.display
                .present(pattern, surface_size)
                .await
                .map_err(|e| SessionError::new(Phase::Displaying, Some(index), e))?;

            self.transition(SessionState::Settling(index));
            tokio::time::sleep(self.settings.settle).await;

            self.transition(SessionState::Capturing(index));
            let image_bytes = self
                .capture_frame()
                .await
                .map_err(|e| SessionError::new(Phase::Capturing, Some(index), e))?;

            self.transition(SessionState::Persisting(index));
            let frame = session
                .persist(index, image_bytes)
                .map_err(|e| SessionError::new(Phase::Persisting, Some(index), e))?;

            info!(
                "Pattern {} ({}) saved to {} ({} bytes)",
                frame.pattern_index,
                pattern.file_name(),
                frame.saved_path.display(),
                frame.image_bytes.len()
            );
            saved.push(frame.saved_path);
        }

        self.transition(SessionState::Disarming);
        self.disarm_for_session()
            .await
            .map_err(|e| SessionError::new(Phase::Disarming, None, e))?;

        Ok(SessionReport { session, saved })
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    async fn arm_for_session(&mut self) -> Result<(), CaptureError> {
        if self.settings.auto_arm != AutoArmPolicy::Always {
            return Ok(());
        }

        match self.device.get_armed_state().await? {
            DeviceState::Started => info!("Device already armed"),
            DeviceState::Stopped => {
                self.device.set_armed_state(DeviceState::Started).await?;
                self.armed_by_session = true;
                info!("Device armed for session");
            }
        }
        Ok(())
    }

    async fn disarm_for_session(&mut self) -> Result<(), CaptureError> {
        if self.armed_by_session {
            // One attempt only; a failed stop is reported, not resent on the abort path
            self.armed_by_session = false;
            self.device.set_armed_state(DeviceState::Stopped).await?;
            info!("Device disarmed");
        }
        Ok(())
    }

    /// Best effort restore of the armed state on the abort path.
    async fn release_device(&mut self) {
        if !self.armed_by_session {
            return;
        }
        match self.device.set_armed_state(DeviceState::Stopped).await {
            Ok(()) => {
                self.armed_by_session = false;
                info!("Device disarmed after abort");
            }
            Err(e) => warn!("Could not disarm device after abort: {}", e),
        }
    }

    async fn capture_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
        let revert = match self.settings.auto_arm {
            AutoArmPolicy::Never => false,
            AutoArmPolicy::IfNotArmed => match self.device.get_armed_state().await? {
                DeviceState::Started => false,
                DeviceState::Stopped => {
                    self.device.set_armed_state(DeviceState::Started).await?;
                    self.armed_by_session = true;
                    true
                }
            },
            AutoArmPolicy::Always => {
                if self.device.get_armed_state().await? != DeviceState::Started {
                    warn!("Device disarmed mid-session, re-arming");
                    self.device.set_armed_state(DeviceState::Started).await?;
                }
                false
            }
        };

        let captured = self.device.capture_color_image().await;

        if revert {
            self.armed_by_session = false;
            match self.device.set_armed_state(DeviceState::Stopped).await {
                Ok(()) => {}
                Err(e) if captured.is_ok() => return Err(e),
                Err(e) => warn!("Could not disarm device after failed capture: {}", e),
            }
        }

        captured?.ok_or(CaptureError::NoImage)
    }
}
