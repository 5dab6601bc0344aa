//! Time-derived identifiers
//!
//! Image numbers and generated file names all come from an injected [`Clock`]
//! so that tests can pin the wall-clock time.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix appended to synthesized composite file names
pub const COMPOSITE_SUFFIX: &str = "_color.jpg";

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall-clock time of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock frozen at a given instant until moved with [`FixedClock::set`]
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Record family encoded in the image number prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Image,
    Video,
}

impl NumberKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Image => "FI",
            Self::Video => "FV",
        }
    }
}

/// Issues `FI`/`FV` + `YYYYMMDDHHMMSS` + examination id
///
/// A repeat for the same kind and examination within one second gets a
/// `-N` suffix. Only the current second is remembered.
pub struct ImageNumberGenerator {
    clock: Arc<dyn Clock>,
    issued: Mutex<HashMap<(NumberKind, i64), (String, u32)>>,
}

impl ImageNumberGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn next(&self, kind: NumberKind, examination_id: i64) -> String {
        let stamp = self.clock.now().format("%Y%m%d%H%M%S").to_string();
        let base = format!("{}{}{}", kind.prefix(), stamp, examination_id);

        let mut issued = self.issued.lock();
        issued.retain(|_, (seen, _)| *seen == stamp);

        match issued.entry((kind, examination_id)) {
            Entry::Occupied(mut seen) => {
                let repeats = &mut seen.get_mut().1;
                *repeats += 1;
                format!("{base}-{repeats}")
            }
            Entry::Vacant(slot) => {
                slot.insert((stamp, 0));
                base
            }
        }
    }
}

/// First free `HHMMSS_color.jpg` (then `HHMMSS_N_color.jpg`) under `dir`
pub async fn composite_target(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%H%M%S").to_string();
    let mut candidate = dir.join(format!("{stamp}{COMPOSITE_SUFFIX}"));
    let mut n = 1u32;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = dir.join(format!("{stamp}_{n}{COMPOSITE_SUFFIX}"));
        n += 1;
    }
    candidate
}

/// `{root}/{patient_id}/{YYYYMMDD}_{examination_id}`
pub fn video_dir(
    root: &Path,
    patient_id: &str,
    examination_id: i64,
    now: DateTime<Local>,
) -> PathBuf {
    root.join(patient_id)
        .join(format!("{}_{}", now.format("%Y%m%d"), examination_id))
}

/// `HHMMSS.{format}` for the first attempt, `HHMMSS_N.{format}` after that
pub fn video_file_name(now: DateTime<Local>, file_format: &str, attempt: u32) -> String {
    let stamp = now.format("%H%M%S");
    match attempt {
        0 => format!("{stamp}.{file_format}"),
        n => format!("{stamp}_{n}.{file_format}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 19, h, m, s).unwrap()
    }

    #[test]
    fn test_image_number_format() {
        let generator = ImageNumberGenerator::new(Arc::new(FixedClock::new(at(14, 55, 27))));
        assert_eq!(generator.next(NumberKind::Image, 7), "FI202506191455277");
        assert_eq!(generator.next(NumberKind::Video, 7), "FV202506191455277");
    }

    #[test]
    fn test_same_second_same_examination_is_disambiguated() {
        let clock = Arc::new(FixedClock::new(at(14, 55, 27)));
        let generator = ImageNumberGenerator::new(clock.clone());

        let first = generator.next(NumberKind::Image, 7);
        let second = generator.next(NumberKind::Image, 7);
        let other = generator.next(NumberKind::Image, 8);
        assert_eq!(first, "FI202506191455277");
        assert_eq!(second, "FI202506191455277-1");
        assert_eq!(other, "FI202506191455278");

        clock.set(at(14, 55, 28));
        assert_eq!(generator.next(NumberKind::Image, 7), "FI202506191455287");
    }

    #[tokio::test]
    async fn test_composite_target_skips_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = at(9, 5, 1);

        let first = composite_target(dir.path(), now).await;
        assert_eq!(first, dir.path().join("090501_color.jpg"));

        std::fs::write(&first, b"taken").unwrap();
        let second = composite_target(dir.path(), now).await;
        assert_eq!(second, dir.path().join("090501_1_color.jpg"));
    }

    #[test]
    fn test_video_location() {
        let now = at(8, 0, 9);
        assert_eq!(
            video_dir(Path::new("/media"), "P001", 12, now),
            PathBuf::from("/media/P001/20250619_12")
        );
        assert_eq!(video_file_name(now, "webm", 0), "080009.webm");
        assert_eq!(video_file_name(now, "webm", 2), "080009_2.webm");
    }
}
