// src/settings.rs
//
// Startup configuration. Values come from an optional TOML file and are
// overridden by LABTAP_* environment variables. Bad values never abort
// startup: each one is recorded as a warning and replaced by its default.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::capture::FramingPolicy;
use crate::io::serial::parity_supported;
use crate::io::{Endpoint, Parity, StopBits};

pub const ENV_PREFIX: &str = "LABTAP_";

pub const DEFAULT_INBOX: &str = "./inbox";
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_DATA_BITS: u8 = 8;
pub const DEFAULT_READ_TIMEOUT_SECS: f64 = 2.0;
pub const DEFAULT_IDLE_SECS: f64 = 1.5;
pub const DEFAULT_PREFIX: &str = "batch";

/// Failures that prevent settings from being built at all.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Line parameters for the analyzer link
#[derive(Clone, Debug, PartialEq)]
pub struct LinkSettings {
    /// Serial device name, or `tcp://host:port`
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub read_timeout: Duration,
    pub rts_cts: bool,
    pub dsr_dtr: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: Duration::from_secs_f64(DEFAULT_READ_TIMEOUT_SECS),
            rts_cts: false,
            dsr_dtr: false,
        }
    }
}

impl LinkSettings {
    /// One-line description for the startup banner
    pub fn describe(&self) -> String {
        match Endpoint::parse(&self.port) {
            Ok(Endpoint::Tcp { host, port }) => format!("tcp {}:{}", host, port),
            _ => format!(
                "{} @ {} baud ({}-{}-{}) rts/cts={} dsr/dtr={}",
                self.port,
                self.baud_rate,
                self.data_bits,
                self.parity.letter(),
                self.stop_bits,
                if self.rts_cts { "on" } else { "off" },
                if self.dsr_dtr { "on" } else { "off" },
            ),
        }
    }
}

/// Fully resolved, immutable process configuration
#[derive(Clone, Debug)]
pub struct Settings {
    /// Landing directory for batch files
    pub inbox: PathBuf,
    /// Batch filename prefix
    pub prefix: String,
    pub link: LinkSettings,
    pub framing: FramingPolicy,
    /// When set, the log is mirrored to a timestamped file here
    pub log_dir: Option<PathBuf>,
    /// Problems found while resolving; each was replaced by a safe default
    pub warnings: Vec<String>,
}

/// Shape of the optional TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub inbox: Option<PathBuf>,
    pub prefix: Option<String>,
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub bytesize: Option<u8>,
    pub parity: Option<String>,
    pub stopbits: Option<f64>,
    pub timeout: Option<f64>,
    pub idle_seconds: Option<f64>,
    pub eot_hex: Option<String>,
    pub rtscts: Option<bool>,
    pub dsrdtr: Option<bool>,
    pub log_dir: Option<PathBuf>,
}

impl FileSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Settings {
    /// Build settings from the process environment and, when given, a config file.
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match config_file {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Ok(Self::resolve(file, &env))
    }

    /// Merge file values and environment overrides (keys include the prefix).
    pub fn resolve(file: FileSettings, env: &HashMap<String, String>) -> Self {
        let mut r = Resolver {
            env,
            warnings: Vec::new(),
        };

        let inbox = r
            .string("INBOX")
            .map(PathBuf::from)
            .or(file.inbox)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INBOX));

        let prefix = r
            .string("PREFIX")
            .or(file.prefix)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let port = r
            .string("PORT")
            .or(file.port)
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        let baud_rate = match r.parsed::<u32>("BAUD").or(file.baud) {
            Some(0) => {
                r.warn(format!("baud rate 0 is invalid; using {}", DEFAULT_BAUD));
                DEFAULT_BAUD
            }
            Some(b) => b,
            None => DEFAULT_BAUD,
        };

        let data_bits = match r.parsed::<u8>("BYTESIZE").or(file.bytesize) {
            Some(b @ 5..=8) => b,
            Some(b) => {
                r.warn(format!(
                    "data bits {} outside 5-8; using {}",
                    b, DEFAULT_DATA_BITS
                ));
                DEFAULT_DATA_BITS
            }
            None => DEFAULT_DATA_BITS,
        };

        let parity = match r.string("PARITY").or(file.parity) {
            Some(s) => s.parse::<Parity>().unwrap_or_else(|e| {
                r.warn(format!("{}; using no parity", e));
                Parity::None
            }),
            None => Parity::None,
        };
        if !parity_supported(parity) && matches!(Endpoint::parse(&port), Ok(Endpoint::Serial(_))) {
            r.warn(format!(
                "{:?} parity is not supported by the serial driver; opening {} will fail",
                parity, port
            ));
        }

        let stop_bits = match r.parsed::<f64>("STOPBITS").or(file.stopbits) {
            Some(n) => StopBits::from_count(n).unwrap_or_else(|| {
                r.warn(format!("stop bits {} not one of 1, 1.5, 2; using 1", n));
                StopBits::One
            }),
            None => StopBits::One,
        };

        let read_timeout = r.seconds(
            "TIMEOUT",
            file.timeout,
            DEFAULT_READ_TIMEOUT_SECS,
            false,
        );
        let idle_threshold = r.seconds("IDLE_SECONDS", file.idle_seconds, DEFAULT_IDLE_SECS, true);

        let marker = match r.string("EOT_HEX").or(file.eot_hex) {
            Some(hex_str) => parse_marker(&hex_str).unwrap_or_else(|e| {
                r.warn(format!(
                    "EOT marker '{}' is not valid hex ({}); marker framing disabled",
                    hex_str, e
                ));
                None
            }),
            None => None,
        };

        let rts_cts = r.flag("RTSCTS").or(file.rtscts).unwrap_or(false);
        let dsr_dtr = r.flag("DSRDTR").or(file.dsrdtr).unwrap_or(false);

        let log_dir = r.string("LOG_DIR").map(PathBuf::from).or(file.log_dir);

        Settings {
            inbox,
            prefix,
            link: LinkSettings {
                port,
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                read_timeout,
                rts_cts,
                dsr_dtr,
            },
            framing: FramingPolicy {
                marker,
                idle_threshold,
            },
            log_dir,
            warnings: r.warnings,
        }
    }
}

/// Decode the end-of-transmission marker. Blank means disabled.
pub fn parse_marker(text: &str) -> Result<Option<Vec<u8>>, hex::FromHexError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    hex::decode(text).map(Some)
}

struct Resolver<'a> {
    env: &'a HashMap<String, String>,
    warnings: Vec<String>,
}

impl Resolver<'_> {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn string(&self, key: &str) -> Option<String> {
        self.env.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn parsed<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.trim().parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.warn(format!(
                    "{}{}='{}' is not a valid value; ignoring it",
                    ENV_PREFIX, key, raw
                ));
                None
            }
        }
    }

    fn flag(&mut self, key: &str) -> Option<bool> {
        let raw = self.string(key)?;
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "" | "0" | "false" | "no" | "off" => Some(false),
            _ => {
                self.warn(format!(
                    "{}{}='{}' is not a boolean; treating it as off",
                    ENV_PREFIX, key, raw
                ));
                Some(false)
            }
        }
    }

    fn seconds(&mut self, key: &str, file: Option<f64>, default: f64, allow_zero: bool) -> Duration {
        let value = self.parsed::<f64>(key).or(file).unwrap_or(default);
        let in_range = value > 0.0 || (allow_zero && value == 0.0);
        match Duration::try_from_secs_f64(value) {
            Ok(d) if in_range => d,
            _ => {
                self.warn(format!(
                    "{}{} of {} seconds is out of range; using {}",
                    ENV_PREFIX, key, value, default
                ));
                Duration::from_secs_f64(default)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::resolve(FileSettings::default(), &HashMap::new());
        assert_eq!(s.inbox, PathBuf::from(DEFAULT_INBOX));
        assert_eq!(s.prefix, "batch");
        assert_eq!(s.link, LinkSettings::default());
        assert_eq!(s.link.read_timeout, Duration::from_secs(2));
        assert_eq!(s.framing.marker, None);
        assert_eq!(s.framing.idle_threshold, Duration::from_millis(1500));
        assert!(s.log_dir.is_none());
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_env_values() {
        let s = Settings::resolve(
            FileSettings::default(),
            &env(&[
                ("INBOX", "/var/lab/inbox"),
                ("PORT", "/dev/ttyS1"),
                ("BAUD", "19200"),
                ("BYTESIZE", "7"),
                ("PARITY", "E"),
                ("STOPBITS", "2"),
                ("TIMEOUT", "0.5"),
                ("IDLE_SECONDS", "3"),
                ("EOT_HEX", "04"),
                ("RTSCTS", "1"),
                ("DSRDTR", "yes"),
            ]),
        );
        assert_eq!(s.inbox, PathBuf::from("/var/lab/inbox"));
        assert_eq!(s.link.port, "/dev/ttyS1");
        assert_eq!(s.link.baud_rate, 19200);
        assert_eq!(s.link.data_bits, 7);
        assert_eq!(s.link.parity, Parity::Even);
        assert_eq!(s.link.stop_bits, StopBits::Two);
        assert_eq!(s.link.read_timeout, Duration::from_millis(500));
        assert_eq!(s.framing.idle_threshold, Duration::from_secs(3));
        assert_eq!(s.framing.marker, Some(vec![0x04]));
        assert!(s.link.rts_cts);
        assert!(s.link.dsr_dtr);
        assert!(s.warnings.is_empty(), "{:?}", s.warnings);
    }

    #[test]
    fn test_invalid_marker_disables_marker_framing() {
        let s = Settings::resolve(FileSettings::default(), &env(&[("EOT_HEX", "zz")]));
        assert_eq!(s.framing.marker, None);
        assert_eq!(s.warnings.len(), 1);
        assert!(s.warnings[0].contains("marker framing disabled"));

        let s = Settings::resolve(FileSettings::default(), &env(&[("EOT_HEX", "040")]));
        assert_eq!(s.framing.marker, None);
        assert_eq!(s.warnings.len(), 1);
    }

    #[test]
    fn test_blank_marker_is_disabled_without_warning() {
        let s = Settings::resolve(FileSettings::default(), &env(&[("EOT_HEX", "  ")]));
        assert_eq!(s.framing.marker, None);
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_multi_byte_marker() {
        assert_eq!(parse_marker("0D0a").unwrap(), Some(vec![0x0D, 0x0A]));
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let s = Settings::resolve(
            FileSettings::default(),
            &env(&[
                ("BAUD", "fast"),
                ("BYTESIZE", "9"),
                ("PARITY", "sideways"),
                ("STOPBITS", "3"),
                ("TIMEOUT", "0"),
                ("IDLE_SECONDS", "-1"),
                ("RTSCTS", "maybe"),
            ]),
        );
        assert_eq!(s.link, LinkSettings::default());
        assert_eq!(s.framing.idle_threshold, Duration::from_millis(1500));
        assert_eq!(s.warnings.len(), 7, "{:?}", s.warnings);
    }

    #[test]
    fn test_huge_seconds_fall_back() {
        let s = Settings::resolve(
            FileSettings::default(),
            &env(&[("IDLE_SECONDS", "1e30"), ("TIMEOUT", "inf")]),
        );
        assert_eq!(s.framing.idle_threshold, Duration::from_millis(1500));
        assert_eq!(s.link.read_timeout, Duration::from_secs(2));
        assert_eq!(s.warnings.len(), 2, "{:?}", s.warnings);

        let file = FileSettings {
            timeout: Some(1e30),
            ..FileSettings::default()
        };
        let s = Settings::resolve(file, &HashMap::new());
        assert_eq!(s.link.read_timeout, Duration::from_secs(2));
        assert_eq!(s.warnings.len(), 1);
    }

    #[test]
    fn test_zero_idle_threshold_is_allowed() {
        let s = Settings::resolve(FileSettings::default(), &env(&[("IDLE_SECONDS", "0")]));
        assert_eq!(s.framing.idle_threshold, Duration::ZERO);
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_one_and_a_half_stop_bits() {
        let s = Settings::resolve(FileSettings::default(), &env(&[("STOPBITS", "1.5")]));
        assert_eq!(s.link.stop_bits, StopBits::OnePointFive);
    }

    #[test]
    fn test_unsupported_parity_is_warned_for_serial_only() {
        let s = Settings::resolve(FileSettings::default(), &env(&[("PARITY", "mark")]));
        assert_eq!(s.link.parity, Parity::Mark);
        assert_eq!(s.warnings.len(), 1);

        let s = Settings::resolve(
            FileSettings::default(),
            &env(&[("PARITY", "mark"), ("PORT", "tcp://10.0.0.5:4000")]),
        );
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_file_values_with_env_override() {
        let file: FileSettings = toml::from_str(
            r#"
            inbox = "/srv/inbox"
            prefix = "fuji500"
            port = "tcp://analyzer.lab:5000"
            baud = 38400
            parity = "odd"
            stopbits = 1.5
            idle_seconds = 4.0
            eot_hex = "04"
            rtscts = true
            "#,
        )
        .unwrap();

        let s = Settings::resolve(file, &env(&[("BAUD", "115200"), ("EOT_HEX", "")]));
        assert_eq!(s.inbox, PathBuf::from("/srv/inbox"));
        assert_eq!(s.prefix, "fuji500");
        assert_eq!(s.link.port, "tcp://analyzer.lab:5000");
        assert_eq!(s.link.baud_rate, 115200);
        assert_eq!(s.link.parity, Parity::Odd);
        assert_eq!(s.link.stop_bits, StopBits::OnePointFive);
        assert_eq!(s.framing.idle_threshold, Duration::from_secs(4));
        assert_eq!(s.framing.marker, None);
        assert!(s.link.rts_cts);
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/labtap.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labtap.toml");
        std::fs::write(&path, "baud = \"nine thousand\"").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_describe() {
        let link = LinkSettings::default();
        assert_eq!(
            link.describe(),
            "/dev/ttyUSB0 @ 9600 baud (8-N-1) rts/cts=off dsr/dtr=off"
        );
        let tcp = LinkSettings {
            port: "tcp://10.0.0.5:4000".to_string(),
            ..LinkSettings::default()
        };
        assert_eq!(tcp.describe(), "tcp 10.0.0.5:4000");
    }
}
