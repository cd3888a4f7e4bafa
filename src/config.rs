use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::geometry::{CoordinateMapper, Rect};
use crate::transport::osc::{DEFAULT_ADDRESS_PATTERN, DEFAULT_SEND_TIMEOUT};

const DEFAULT_BROADCAST_IP: &str = "127.0.0.1";
const DEFAULT_BROADCAST_PORT: u16 = 5005;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 8000;
const DEFAULT_QUALIFYING_LABEL: &str = "person";
const DEFAULT_MODEL_WIDTH: f32 = 416.0;
const DEFAULT_MODEL_HEIGHT: f32 = 416.0;

/// Default stage layout, in priority order.
const DEFAULT_ZONES: [Rect; 4] = [
    Rect::new(0.0, 0.0, 250.0, 1000.0),
    Rect::new(0.0, 0.0, 1000.0, 1000.0),
    Rect::new(0.0, 260.0, 100.0, 100.0),
    Rect::new(0.0, 300.0, 500.0, 100.0),
];

// PascalCase aliases accept config files written for the earlier desktop app.
#[derive(Debug, Deserialize, Default)]
struct PresenceConfigFile {
    #[serde(alias = "Quadrants")]
    zones: Option<Vec<ZoneConfigFile>>,
    #[serde(alias = "OscCom")]
    broadcast: Option<BroadcastConfigFile>,
    #[serde(alias = "TimeToStationary")]
    idle_timeout_ms: Option<u64>,
    qualifying_label: Option<String>,
    model: Option<ModelConfigFile>,
}

#[derive(Debug, Deserialize)]
struct ZoneConfigFile {
    #[serde(alias = "X")]
    x: f32,
    #[serde(alias = "Y")]
    y: f32,
    #[serde(alias = "W", alias = "w")]
    width: f32,
    #[serde(alias = "H", alias = "h")]
    height: f32,
}

#[derive(Debug, Deserialize, Default)]
struct BroadcastConfigFile {
    #[serde(alias = "Ip")]
    ip: Option<String>,
    #[serde(alias = "Port")]
    port: Option<u16>,
    address_pattern: Option<String>,
    send_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Zones in priority order; index is the broadcast zone id.
    pub zones: Vec<Rect>,
    pub model: ModelSettings,
    pub qualifying_label: String,
    pub idle_timeout: Duration,
    pub broadcast: BroadcastSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelSettings {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub addr: SocketAddr,
    pub address_pattern: String,
    pub send_timeout: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            zones: DEFAULT_ZONES.to_vec(),
            model: ModelSettings {
                width: DEFAULT_MODEL_WIDTH,
                height: DEFAULT_MODEL_HEIGHT,
            },
            qualifying_label: DEFAULT_QUALIFYING_LABEL.to_string(),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            broadcast: BroadcastSettings {
                addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_BROADCAST_PORT)),
                address_pattern: DEFAULT_ADDRESS_PATTERN.to_string(),
                send_timeout: DEFAULT_SEND_TIMEOUT,
            },
        }
    }
}

impl PresenceConfig {
    /// Load from the file named by `PRESENCE_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PRESENCE_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (JSON, or TOML for `.toml`), then apply
    /// environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PresenceConfigFile) -> Result<Self> {
        let zones = match file.zones {
            Some(zones) => zones
                .into_iter()
                .map(|zone| Rect::new(zone.x, zone.y, zone.width, zone.height))
                .collect(),
            None => DEFAULT_ZONES.to_vec(),
        };
        let model = ModelSettings {
            width: file
                .model
                .as_ref()
                .and_then(|model| model.width)
                .unwrap_or(DEFAULT_MODEL_WIDTH),
            height: file
                .model
                .as_ref()
                .and_then(|model| model.height)
                .unwrap_or(DEFAULT_MODEL_HEIGHT),
        };
        let broadcast_file = file.broadcast.unwrap_or_default();
        let ip = broadcast_file
            .ip
            .unwrap_or_else(|| DEFAULT_BROADCAST_IP.to_string());
        let port = broadcast_file.port.unwrap_or(DEFAULT_BROADCAST_PORT);
        let broadcast = BroadcastSettings {
            addr: parse_broadcast_addr(&ip, port)?,
            address_pattern: broadcast_file
                .address_pattern
                .unwrap_or_else(|| DEFAULT_ADDRESS_PATTERN.to_string()),
            send_timeout: broadcast_file
                .send_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SEND_TIMEOUT),
        };
        Ok(Self {
            zones,
            model,
            qualifying_label: file
                .qualifying_label
                .unwrap_or_else(|| DEFAULT_QUALIFYING_LABEL.to_string()),
            idle_timeout: Duration::from_millis(
                file.idle_timeout_ms.unwrap_or(DEFAULT_IDLE_TIMEOUT_MS),
            ),
            broadcast,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PRESENCE_BROADCAST_ADDR") {
            if !addr.trim().is_empty() {
                self.broadcast.addr = addr.trim().parse().map_err(|_| {
                    anyhow!("PRESENCE_BROADCAST_ADDR must be an ip:port socket address")
                })?;
            }
        }
        if let Ok(timeout) = std::env::var("PRESENCE_IDLE_TIMEOUT_MS") {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("PRESENCE_IDLE_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.idle_timeout = Duration::from_millis(millis);
        }
        if let Ok(label) = std::env::var("PRESENCE_LABEL") {
            if !label.trim().is_empty() {
                self.qualifying_label = label.trim().to_string();
            }
        }
        if let Ok(zones) = std::env::var("PRESENCE_ZONES") {
            let parsed = parse_zone_list(&zones)?;
            if !parsed.is_empty() {
                self.zones = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(anyhow!("idle timeout must be greater than zero"));
        }
        if self.broadcast.send_timeout.is_zero() {
            return Err(anyhow!("broadcast send timeout must be greater than zero"));
        }
        if self.qualifying_label.trim().is_empty() {
            return Err(anyhow!("qualifying label must not be empty"));
        }
        validate_address_pattern(&self.broadcast.address_pattern)?;
        CoordinateMapper::new(self.model.width, self.model.height)?;
        for (id, zone) in self.zones.iter().enumerate() {
            let finite = [zone.x, zone.y, zone.width, zone.height]
                .iter()
                .all(|v| v.is_finite());
            if !finite || zone.width < 0.0 || zone.height < 0.0 {
                return Err(anyhow!(
                    "zone {} must have finite coordinates and non-negative size",
                    id
                ));
            }
        }
        if self.zones.is_empty() {
            log::warn!("no zones configured; every detection will classify as none");
        }
        Ok(())
    }
}

/// OSC address patterns start with '/' and use a conservative character set.
pub fn validate_address_pattern(pattern: &str) -> Result<()> {
    static ADDRESS_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ADDRESS_RE.get_or_init(|| {
        regex::Regex::new(r"^/[A-Za-z0-9_\-/]*$").expect("address pattern regex is valid")
    });
    if !re.is_match(pattern) {
        return Err(anyhow!("invalid osc address pattern '{}'", pattern));
    }
    Ok(())
}

fn parse_broadcast_addr(ip: &str, port: u16) -> Result<SocketAddr> {
    let ip = ip
        .trim()
        .parse::<std::net::IpAddr>()
        .map_err(|_| anyhow!("invalid broadcast ip '{}'", ip))?;
    Ok(SocketAddr::new(ip, port))
}

fn read_config_file(path: &Path) -> Result<PresenceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Parse `x,y,w,h;x,y,w,h` into zones.
fn parse_zone_list(value: &str) -> Result<Vec<Rect>> {
    value
        .split(';')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<f32> = entry
                .split(',')
                .map(|part| part.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|_| anyhow!("PRESENCE_ZONES entry '{}' is not numeric", entry))?;
            match parts.as_slice() {
                [x, y, w, h] => Ok(Rect::new(*x, *y, *w, *h)),
                _ => Err(anyhow!(
                    "PRESENCE_ZONES entry '{}' must have four values x,y,w,h",
                    entry
                )),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zone_list() -> Result<()> {
        let zones = parse_zone_list("0,0,250,1000; 0,260,100,100;")?;
        assert_eq!(
            zones,
            vec![
                Rect::new(0.0, 0.0, 250.0, 1000.0),
                Rect::new(0.0, 260.0, 100.0, 100.0)
            ]
        );
        assert!(parse_zone_list("0,0,250").is_err());
        assert!(parse_zone_list("a,b,c,d").is_err());
        Ok(())
    }

    #[test]
    fn address_pattern_validation() {
        assert!(validate_address_pattern("/test").is_ok());
        assert!(validate_address_pattern("/stage/zone-1").is_ok());
        assert!(validate_address_pattern("test").is_err());
        assert!(validate_address_pattern("/with space").is_err());
    }

    #[test]
    fn defaults_match_stage_deployment() {
        let cfg = PresenceConfig::default();
        assert_eq!(cfg.zones.len(), 4);
        assert_eq!(cfg.idle_timeout, Duration::from_millis(8000));
        assert_eq!(cfg.broadcast.addr.to_string(), "127.0.0.1:5005");
        assert_eq!(cfg.broadcast.address_pattern, "/test");
        assert_eq!(cfg.qualifying_label, "person");
    }

    #[test]
    fn rejects_negative_zone_size() {
        let mut cfg = PresenceConfig::default();
        cfg.zones.push(Rect::new(0.0, 0.0, -1.0, 10.0));
        assert!(cfg.validate().is_err());
    }
}
