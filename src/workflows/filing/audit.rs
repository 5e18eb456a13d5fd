use std::cell::Cell;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::workflows::portal::{PortalSession, SessionError};

pub const DECLARATION_PREFIX: &str = "declaration";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%6fZ";

#[derive(Debug, thiserror::Error)]
enum CaptureError {
    #[error(transparent)]
    Snapshot(#[from] SessionError),
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes one evidence artifact per submission attempt.
///
/// Files are created write-once next to a `.sha256` digest sidecar, so a
/// later edit of the artifact is detectable. Capture failures are logged and
/// swallowed.
#[derive(Debug)]
pub struct AuditRecorder {
    dir: PathBuf,
    prefix: String,
    extension: String,
    last_stamp: Cell<Option<NaiveDateTime>>,
}

impl AuditRecorder {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: "png".to_string(),
            last_stamp: Cell::new(None),
        }
    }

    pub fn for_declarations(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DECLARATION_PREFIX)
    }

    /// File extension matching what the session's snapshots contain.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capture(&self, session: &mut dyn PortalSession, platform_id: &str) -> Option<PathBuf> {
        match self.try_capture(session, platform_id) {
            Ok(path) => {
                info!(platform_id, path = %path.display(), "audit evidence captured");
                Some(path)
            }
            Err(err) => {
                warn!(platform_id, error = %err, "audit evidence capture failed; continuing without it");
                None
            }
        }
    }

    fn try_capture(
        &self,
        session: &mut dyn PortalSession,
        platform_id: &str,
    ) -> Result<PathBuf, CaptureError> {
        let bytes = session.snapshot()?;
        fs::create_dir_all(&self.dir).map_err(|source| CaptureError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let file_name = evidence_file_name(
            &self.prefix,
            platform_id,
            self.next_stamp(),
            &self.extension,
        );
        let path = self.dir.join(&file_name);
        write_once(&path, &bytes)?;

        // The artifact is already on disk; report it even without a digest.
        let digest = format!("{:x}", Sha256::digest(&bytes));
        let sidecar = self.dir.join(format!("{file_name}.sha256"));
        if let Err(err) = write_once(&sidecar, format!("{digest}  {file_name}\n").as_bytes()) {
            warn!(platform_id, error = %err, "audit digest sidecar not written");
        }

        Ok(path)
    }

    /// Wall-clock stamp, nudged forward so consecutive captures never share one.
    fn next_stamp(&self) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        let stamp = match self.last_stamp.get() {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp.set(Some(stamp));
        stamp
    }
}

pub fn evidence_file_name(
    prefix: &str,
    platform_id: &str,
    stamp: NaiveDateTime,
    extension: &str,
) -> String {
    let safe_id: String = platform_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!(
        "{prefix}_{safe_id}_{}.{extension}",
        stamp.format(TIMESTAMP_FORMAT)
    )
}

fn write_once(path: &Path, bytes: &[u8]) -> Result<(), CaptureError> {
    let write = |path: &Path| -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write(path).map_err(|source| CaptureError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::portal::{PortalScenario, SimulatedPortal};
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .and_then(|date| date.and_hms_micro_opt(10, 30, 5, 42))
            .expect("valid timestamp")
    }

    #[test]
    fn file_name_follows_prefix_id_timestamp_pattern() {
        assert_eq!(
            evidence_file_name("declaration", "HMXYZ12345", stamp(), "png"),
            "declaration_HMXYZ12345_2025-01-15T10-30-05-000042Z.png"
        );
    }

    #[test]
    fn path_separators_in_ids_are_neutralised() {
        let name = evidence_file_name("declaration", "../HM/1", stamp(), "txt");
        assert!(name.starts_with("declaration____HM_1_"));
        assert!(!name.contains('/'));
    }

    #[test]
    fn captures_for_the_same_booking_never_collide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recorder = AuditRecorder::for_declarations(dir.path()).with_extension("txt");
        let mut portal = SimulatedPortal::new(PortalScenario::ready());

        let first = recorder.capture(&mut portal, "HMXYZ12345").expect("first capture");
        let second = recorder.capture(&mut portal, "HMXYZ12345").expect("second capture");

        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn sidecar_records_the_artifact_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recorder = AuditRecorder::for_declarations(dir.path()).with_extension("txt");
        let mut portal = SimulatedPortal::new(PortalScenario::ready());

        let path = recorder.capture(&mut portal, "HMXYZ67890").expect("capture");
        let bytes = fs::read(&path).expect("artifact");
        let sidecar = fs::read_to_string(format!("{}.sha256", path.display())).expect("sidecar");

        let expected = format!("{:x}", Sha256::digest(&bytes));
        assert!(sidecar.starts_with(&expected));
        assert!(sidecar.trim_end().ends_with(".txt"));
    }

    #[test]
    fn artifact_is_kept_when_its_sidecar_cannot_be_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recorder = AuditRecorder::for_declarations(dir.path()).with_extension("txt");
        let far_future = NaiveDate::from_ymd_opt(2999, 1, 1)
            .and_then(|date| date.and_hms_micro_opt(0, 0, 0, 0))
            .expect("valid timestamp");
        recorder.last_stamp.set(Some(far_future));

        let expected = evidence_file_name(
            DECLARATION_PREFIX,
            "HMXYZ44556",
            far_future + Duration::microseconds(1),
            "txt",
        );
        fs::create_dir(dir.path().join(format!("{expected}.sha256"))).expect("occupy sidecar path");
        let mut portal = SimulatedPortal::new(PortalScenario::ready());

        let path = recorder.capture(&mut portal, "HMXYZ44556").expect("artifact still reported");
        assert_eq!(path, dir.path().join(&expected));
        assert!(path.is_file());
    }

    #[test]
    fn failed_snapshots_are_swallowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let recorder = AuditRecorder::for_declarations(dir.path());
        let mut scenario = PortalScenario::ready();
        scenario.snapshot_fails = true;
        let mut portal = SimulatedPortal::new(scenario);

        assert_eq!(recorder.capture(&mut portal, "HMXYZ11223"), None);
        assert_eq!(fs::read_dir(dir.path()).expect("dir").count(), 0);
    }
}
