// src/capture/namer.rs
//
// Batch file naming: `<prefix>_<YYYYMMDD>_<HHMMSS>_<micros>.<ext>`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

pub const BATCH_EXTENSION: &str = "raw";

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Issues strictly increasing, collision-free batch paths.
///
/// Two names issued within the same microsecond (or after the wall clock
/// steps backwards) are separated by bumping the stamp 1 µs past the
/// previous one, so names always sort in issue order.
#[derive(Debug, Clone)]
pub struct BatchNamer {
    dir: PathBuf,
    prefix: String,
    last: Option<NaiveDateTime>,
}

impl BatchNamer {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        BatchNamer {
            dir: dir.into(),
            prefix: prefix.into(),
            last: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next path stamped with the current local time.
    pub fn next_path(&mut self) -> PathBuf {
        self.next_path_at(Local::now().naive_local())
    }

    /// Next path for a given capture time.
    pub fn next_path_at(&mut self, now: NaiveDateTime) -> PathBuf {
        let now = truncate_to_micros(now);
        let stamp = match self.last {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last = Some(stamp);

        self.dir.join(format!(
            "{}_{}.{}",
            self.prefix,
            stamp.format(STAMP_FORMAT),
            BATCH_EXTENSION
        ))
    }
}

fn truncate_to_micros(t: NaiveDateTime) -> NaiveDateTime {
    let micros_ns = (t.nanosecond() / 1_000) * 1_000;
    t.with_nanosecond(micros_ns).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn at(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    #[test]
    fn test_name_format() {
        let mut namer = BatchNamer::new("/inbox", "fuji500");
        let path = namer.next_path_at(at(9, 5, 7, 42));
        assert_eq!(
            path,
            PathBuf::from("/inbox/fuji500_20250314_090507_000042.raw")
        );
    }

    #[test]
    fn test_same_microsecond_is_bumped() {
        let mut namer = BatchNamer::new("/inbox", "batch");
        let t = at(12, 0, 0, 999_999);

        let a = namer.next_path_at(t);
        let b = namer.next_path_at(t);
        let c = namer.next_path_at(t);

        assert_eq!(a, PathBuf::from("/inbox/batch_20250314_120000_999999.raw"));
        assert_eq!(b, PathBuf::from("/inbox/batch_20250314_120001_000000.raw"));
        assert_eq!(c, PathBuf::from("/inbox/batch_20250314_120001_000001.raw"));
    }

    #[test]
    fn test_clock_stepping_backwards_still_increases() {
        let mut namer = BatchNamer::new("/inbox", "batch");
        let a = namer.next_path_at(at(12, 0, 5, 0));
        let b = namer.next_path_at(at(12, 0, 1, 0));
        assert!(b > a);
    }

    #[test]
    fn test_rapid_names_are_unique_and_ordered() {
        let mut namer = BatchNamer::new("/inbox", "batch");
        let paths: Vec<PathBuf> = (0..1000).map(|_| namer.next_path()).collect();

        let unique: HashSet<&PathBuf> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());

        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(sorted, paths);
    }
}
