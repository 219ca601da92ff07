//! # Device Configuration
//!
//! Reads and writes the drone's own configuration options
//! (`general:num_version_soft`, `control:altitude_max`, ...).
//!
//! Options are read in bulk: the host sends `CTRL(NO_CONTROL_MODE)` then
//! `CTRL(CFG_GET_CONTROL_MODE)`, and the drone answers on the TCP control
//! port with one `key = value` line per option. The result is cached until
//! [`DeviceConfig::clear_cache`]. Writes go out as `CONFIG` commands and are
//! remembered locally so reads see them without a new retrieval.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};

use crate::at::commands::{self, ctrl_modes};
use crate::at::Value;
use crate::error::{DroneError, Result};
use crate::scheduler::Scheduler;

/// Typed value of one device option
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<ConfigValue>),
    Text(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(true) => write!(f, "TRUE"),
            ConfigValue::Bool(false) => write!(f, "FALSE"),
            ConfigValue::Int(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{:?}", v),
            ConfigValue::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            ConfigValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<&ConfigValue> for Value {
    fn from(value: &ConfigValue) -> Self {
        match value {
            ConfigValue::Bool(v) => Value::Bool(*v),
            ConfigValue::Int(v) => Value::Int(*v),
            ConfigValue::Float(v) => Value::Float(*v),
            ConfigValue::Text(v) => Value::from(v.clone()),
            list @ ConfigValue::List(_) => Value::from(list.to_string()),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

/// Interpret one raw option value.
///
/// `TRUE`/`FALSE` become booleans, `{a b c}` a list of interpreted items,
/// a run of ASCII digits an integer, anything parseable as a float a float,
/// and everything else stays text.
pub fn parse_value(raw: &str) -> ConfigValue {
    match raw {
        "TRUE" => return ConfigValue::Bool(true),
        "FALSE" => return ConfigValue::Bool(false),
        _ => {}
    }

    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        return ConfigValue::List(inner.split_whitespace().map(parse_value).collect());
    }

    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(v) = raw.parse() {
            return ConfigValue::Int(v);
        }
    }

    match raw.parse::<f64>() {
        Ok(v) => ConfigValue::Float(v),
        Err(_) => ConfigValue::Text(raw.to_string()),
    }
}

/// Parse the `key = value` listing sent on the control port.
///
/// Lines without ` = ` are skipped.
pub fn parse_config_text(text: &str) -> Vec<(String, ConfigValue)> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_end_matches(['\r', '\0']);
            match line.split_once(" = ") {
                Some((key, raw)) => Some((key.to_string(), parse_value(raw))),
                None => {
                    if !line.is_empty() {
                        debug!("Skipping config line without separator: {:?}", line);
                    }
                    None
                }
            }
        })
        .collect()
}

/// Key of option `name` in `category` (`control` + `altitude_max` gives
/// `control:altitude_max`)
pub fn option_key(category: &str, name: &str) -> String {
    format!("{}:{}", category, name)
}

/// Source of the raw configuration listing
#[async_trait]
pub trait ConfigReader: Send + Sync {
    /// Read the whole listing the drone sends after `CFG_GET_CONTROL_MODE`
    async fn read_listing(&self) -> Result<String>;
}

/// Reads the listing from the drone's TCP control port
#[derive(Debug, Clone)]
pub struct ControlPort {
    addr: SocketAddr,
    timeout: Duration,
}

impl ControlPort {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }
}

#[async_trait]
impl ConfigReader for ControlPort {
    async fn read_listing(&self) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        let mut stream = timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| DroneError::ConfigTimeout)??;

        let mut listing = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match timeout_at(deadline, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => listing.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                // The drone keeps the socket open; whatever arrived is the listing
                Err(_) if !listing.is_empty() => break,
                Err(_) => return Err(DroneError::ConfigTimeout),
            }
        }

        debug!("Read {} bytes of device configuration", listing.len());
        Ok(String::from_utf8_lossy(&listing).into_owned())
    }
}

#[derive(Debug, Default)]
struct Cache {
    retrieved: Option<HashMap<String, ConfigValue>>,
    updates: HashMap<String, ConfigValue>,
}

/// Cached view of the drone's configuration
pub struct DeviceConfig {
    scheduler: Arc<Scheduler>,
    reader: Box<dyn ConfigReader>,
    cache: Mutex<Cache>,
}

impl DeviceConfig {
    pub fn new(scheduler: Arc<Scheduler>, reader: Box<dyn ConfigReader>) -> Self {
        Self {
            scheduler,
            reader,
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Look up an option, retrieving the listing on first use.
    ///
    /// Values set through [`set`](Self::set) take precedence.
    ///
    /// # Errors
    ///
    /// Returns error if retrieval is needed and fails or times out
    pub async fn get(&self, key: &str) -> Result<Option<ConfigValue>> {
        let mut cache = self.cache.lock().await;
        if let Some(value) = cache.updates.get(key) {
            return Ok(Some(value.clone()));
        }
        if cache.retrieved.is_none() {
            cache.retrieved = Some(self.retrieve().await?);
        }
        Ok(cache
            .retrieved
            .as_ref()
            .and_then(|options| options.get(key))
            .cloned())
    }

    /// Send `CONFIG(key, value)` and wait until it has been transmitted.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded or the scheduler is
    /// stopped
    pub async fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let value = value.into();
        let command = commands::config(key.to_string(), Value::from(&value))?;

        self.cache.lock().await.updates.insert(key.to_string(), value);
        self.scheduler.send(command).await?;
        info!("Set device option {}", key);
        Ok(())
    }

    /// Forget both retrieved options and local updates
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.retrieved = None;
        cache.updates.clear();
    }

    async fn retrieve(&self) -> Result<HashMap<String, ConfigValue>> {
        self.scheduler
            .send(commands::control(ctrl_modes::NO_CONTROL_MODE))
            .await?;
        self.scheduler
            .send(commands::control(ctrl_modes::CFG_GET_CONTROL_MODE))
            .await?;

        let listing = self.reader.read_listing().await?;
        let options: HashMap<_, _> = parse_config_text(&listing).into_iter().collect();
        info!("Retrieved {} device options", options.len());
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::at::AtLink;
    use crate::transport::mocks::RecordingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LISTING: &str = "general:num_version_config = 1\n\
                           general:num_version_soft = 2.4.8\n\
                           general:navdata_demo = TRUE\n\
                           control:altitude_max = 3000\n\
                           control:euler_angle_max = 0.25\n\
                           control:flying_mode = 0\n\
                           video:bitrate_ctrl_mode = FALSE\n\
                           detect:enemy_colors = {1 2 3}\n";

    struct CannedReader {
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ConfigReader for CannedReader {
        async fn read_listing(&self) -> Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(LISTING.to_string())
        }
    }

    fn device_config() -> (DeviceConfig, Arc<Scheduler>, RecordingSink, Arc<AtomicUsize>) {
        let sink = RecordingSink::new();
        let scheduler = Arc::new(Scheduler::new(
            AtLink::new(Arc::new(sink.clone())),
            Duration::from_millis(30),
        ));
        scheduler.start().unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let config = DeviceConfig::new(
            Arc::clone(&scheduler),
            Box::new(CannedReader {
                reads: Arc::clone(&reads),
            }),
        );
        (config, scheduler, sink, reads)
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("TRUE"), ConfigValue::Bool(true));
        assert_eq!(parse_value("FALSE"), ConfigValue::Bool(false));
        assert_eq!(parse_value("3000"), ConfigValue::Int(3000));
        assert_eq!(parse_value("0.25"), ConfigValue::Float(0.25));
        assert_eq!(parse_value("-5"), ConfigValue::Float(-5.0));
        assert_eq!(parse_value("2.4.8"), ConfigValue::Text("2.4.8".to_string()));
        assert_eq!(
            parse_value("{1 2 0.5}"),
            ConfigValue::List(vec![
                ConfigValue::Int(1),
                ConfigValue::Int(2),
                ConfigValue::Float(0.5)
            ])
        );
    }

    #[test]
    fn test_parse_config_text_skips_bad_lines() {
        let parsed = parse_config_text("a:b = 1\r\ngarbage\n\nc:d = FALSE\n");
        assert_eq!(
            parsed,
            vec![
                ("a:b".to_string(), ConfigValue::Int(1)),
                ("c:d".to_string(), ConfigValue::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_option_key() {
        assert_eq!(option_key("control", "altitude_max"), "control:altitude_max");
    }

    #[test]
    fn test_list_display_round_trips_through_parser() {
        let list = parse_value("{1 2 3}");
        assert_eq!(list.to_string(), "{1 2 3}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_retrieves_once() {
        let (config, scheduler, sink, reads) = device_config();

        let max = config.get("control:altitude_max").await.unwrap();
        assert_eq!(max, Some(ConfigValue::Int(3000)));
        let demo = config.get("general:navdata_demo").await.unwrap();
        assert_eq!(demo, Some(ConfigValue::Bool(true)));
        assert_eq!(config.get("missing:key").await.unwrap(), None);
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        let frames = sink.frames();
        let ctrl: Vec<_> = frames.iter().filter(|f| f.starts_with("AT*CTRL=")).collect();
        assert_eq!(ctrl.len(), 2);
        assert!(ctrl[0].ends_with(",0,0\r"));
        assert!(ctrl[1].ends_with(",4,0\r"));

        scheduler.stop(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_is_visible_and_sent() {
        let (config, scheduler, sink, reads) = device_config();

        config.set("control:altitude_max", 1500i64).await.unwrap();
        assert_eq!(
            config.get("control:altitude_max").await.unwrap(),
            Some(ConfigValue::Int(1500))
        );
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(sink
            .frames()
            .iter()
            .any(|f| f.ends_with(",\"control:altitude_max\",\"1500\"\r")));

        scheduler.stop(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_retrieval() {
        let (config, scheduler, _sink, reads) = device_config();

        config.set("control:altitude_max", 1500i64).await.unwrap();
        config.clear_cache().await;
        assert_eq!(
            config.get("control:altitude_max").await.unwrap(),
            Some(ConfigValue::Int(3000))
        );
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        scheduler.stop(false).await.unwrap();
    }
}
