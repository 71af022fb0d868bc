// gateway_client/src/config.rs

//! 网关客户端配置管理模块。
//!
//! 本模块定义客户端运行所需的配置参数 (`ClientConfig`)，负责从 JSON 文件
//! (默认为当前目录下的 `gateway_client.json`) 加载配置、在文件缺失或损坏时生成并保存默认配置，
//! 以及在使用前校验配置的有效性。

use crate::error::GatewayError;
use crate::ws_client::auto_refresh::RefreshCall;
use common_models::ws_payloads::{ClientIdentity, ProtocolRange};
use log::{error, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

/// 默认配置文件名。
pub const DEFAULT_CONFIG_FILE: &str = "gateway_client.json";

/// 客户端配置，对应配置文件 `gateway_client.json` 的内容。
///
/// 文件中缺失的字段使用默认值补齐，因此旧版本的配置文件仍可被加载。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// 网关 WebSocket 地址，例如 `"ws://localhost:8088/ws"`。
    pub gateway_url: String,

    /// 握手时上报的客户端身份。
    pub client: ClientIdentity,

    /// 客户端支持的协议版本区间。
    pub protocol: ProtocolRange,

    /// 同一方法两次调用之间的最小间隔 (毫秒)。负值按 0 处理。
    pub min_gap_ms: i64,

    /// 是否在启动时自动连接网关。
    pub auto_connect: bool,

    pub auto_refresh: AutoRefreshConfig,

    /// 日志级别：`"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`, `"off"`。
    pub log_level: String,

    /// 参数预设文件路径。
    pub preset_file: String,
}

/// 定时刷新配置。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AutoRefreshConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// 每个周期依次发起的调用。`params` 为 `null` 时使用该方法上次保存的参数预设。
    pub calls: Vec<RefreshCall>,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 15_000,
            calls: Vec::new(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: "ws://localhost:8088/ws".to_string(),
            client: ClientIdentity {
                name: "gateway-console".to_string(),
                kind: "operator".to_string(),
                platform: std::env::consts::OS.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            protocol: ProtocolRange { min: 1, max: 1 },
            min_gap_ms: 500,
            auto_connect: true,
            auto_refresh: AutoRefreshConfig::default(),
            log_level: "info".to_string(),
            preset_file: "gateway_presets.json".to_string(),
        }
    }
}

impl ClientConfig {
    /// 校验配置。
    ///
    /// 地址必须是合法的 `ws`/`wss` URL，协议区间必须满足 `min <= max`，
    /// 启用定时刷新时周期必须大于 0，日志级别必须可识别。
    pub fn validate(&self) -> Result<(), GatewayError> {
        let url = Url::parse(&self.gateway_url)
            .map_err(|e| GatewayError::InvalidConfig(format!("网关地址 '{}' 无效: {}", self.gateway_url, e)))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(GatewayError::InvalidConfig(format!(
                "网关地址 '{}' 的协议必须是 ws 或 wss",
                self.gateway_url
            )));
        }
        if self.protocol.min > self.protocol.max {
            return Err(GatewayError::InvalidConfig(format!(
                "协议版本区间无效: min={} > max={}",
                self.protocol.min, self.protocol.max
            )));
        }
        if self.auto_refresh.enabled && self.auto_refresh.interval_ms == 0 {
            return Err(GatewayError::InvalidConfig("定时刷新周期必须大于 0".to_string()));
        }
        parse_log_level(&self.log_level)?;
        Ok(())
    }
}

/// 把配置中的日志级别字符串解析为 `LevelFilter` (大小写不敏感)。
pub fn parse_log_level(level: &str) -> Result<LevelFilter, GatewayError> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| GatewayError::InvalidConfig(format!("无法识别的日志级别 '{}'", level)))
}

/// 确定配置文件路径：优先使用命令行参数，否则为当前目录下的 [`DEFAULT_CONFIG_FILE`]。
pub fn resolve_config_path(cli_arg: Option<String>) -> PathBuf {
    match cli_arg {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(".").join(DEFAULT_CONFIG_FILE),
    }
}

/// 加载配置。
///
/// 文件存在且可解析时直接返回其内容；文件不存在或内容损坏时，
/// 使用默认配置并尝试把它写回该路径 (写入失败只记录日志)。
pub fn load_or_create_config(path: &Path) -> ClientConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ClientConfig>(&content) {
                Ok(config) => {
                    info!("[配置模块] 已从 '{}' 加载配置。", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("[配置模块] 解析配置文件 '{}' 失败: {}。将使用默认配置覆盖。", path.display(), e);
                }
            },
            Err(e) => {
                error!("[配置模块] 读取配置文件 '{}' 失败: {}。将使用默认配置。", path.display(), e);
                return ClientConfig::default();
            }
        }
    } else {
        info!("[配置模块] 配置文件 '{}' 未找到，将使用默认配置创建新文件。", path.display());
    }

    let default_config = ClientConfig::default();
    if let Err(e) = save_config(&default_config, path) {
        error!("[配置模块] 保存默认配置到 '{}' 失败: {}", path.display(), e);
    }
    default_config
}

/// 把配置以格式化 JSON 写入文件，必要时创建父目录。
pub fn save_config(config: &ClientConfig, path: &Path) -> Result<(), GatewayError> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    info!("[配置模块] 配置已保存至 '{}'。", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 测试结束时删除临时目录
    struct TestDir(PathBuf);

    impl TestDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("gateway_client_config_{}", uuid::Uuid::new_v4()));
            Self(dir)
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            if self.0.exists() {
                if let Err(e) = fs::remove_dir_all(&self.0) {
                    eprintln!("警告：测试后清理临时目录 '{}' 失败: {}", self.0.display(), e);
                }
            }
        }
    }

    #[test]
    /// 测试配置文件不存在时生成默认配置并写入磁盘，之后修改可被重新加载。
    fn test_load_creates_default_then_reloads_saved_changes() {
        let dir = TestDir::new();
        let path = dir.0.join("nested").join(DEFAULT_CONFIG_FILE);

        let loaded = load_or_create_config(&path);
        assert_eq!(loaded, ClientConfig::default());
        assert!(path.exists(), "默认配置应已写入 '{}'", path.display());

        let mut modified = loaded.clone();
        modified.gateway_url = "wss://gateway.example:9443/ws".to_string();
        modified.min_gap_ms = 1_000;
        modified.auto_refresh.enabled = true;
        save_config(&modified, &path).expect("保存修改后的配置失败");

        let reloaded = load_or_create_config(&path);
        assert_eq!(reloaded, modified);
    }

    #[test]
    fn test_corrupt_file_is_replaced_with_defaults() {
        let dir = TestDir::new();
        fs::create_dir_all(&dir.0).unwrap();
        let path = dir.0.join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let loaded = load_or_create_config(&path);
        assert_eq!(loaded, ClientConfig::default());
        let rewritten: ClientConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(rewritten, ClientConfig::default());
    }

    #[test]
    /// 测试部分字段缺失的配置文件用默认值补齐。
    fn test_partial_file_uses_field_defaults() {
        let config: ClientConfig = serde_json::from_value(json!({
            "gateway_url": "ws://10.0.0.2:8088/ws",
            "auto_refresh": {"enabled": true, "calls": [{"method": "feeds.list"}]}
        }))
        .unwrap();
        assert_eq!(config.gateway_url, "ws://10.0.0.2:8088/ws");
        assert_eq!(config.min_gap_ms, 500);
        assert_eq!(config.auto_refresh.interval_ms, 15_000);
        assert_eq!(config.auto_refresh.calls[0].method, "feeds.list");
        assert!(config.auto_refresh.calls[0].params.is_null());
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());

        let mut config = ClientConfig::default();
        config.gateway_url = "http://localhost:8088".to_string();
        assert!(matches!(config.validate(), Err(GatewayError::InvalidConfig(_))));

        let mut config = ClientConfig::default();
        config.protocol = ProtocolRange { min: 3, max: 2 };
        assert!(matches!(config.validate(), Err(GatewayError::InvalidConfig(_))));

        let mut config = ClientConfig::default();
        config.auto_refresh.enabled = true;
        config.auto_refresh.interval_ms = 0;
        assert!(matches!(config.validate(), Err(GatewayError::InvalidConfig(_))));

        let mut config = ClientConfig::default();
        config.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            resolve_config_path(Some("/etc/gw.json".to_string())),
            PathBuf::from("/etc/gw.json")
        );
        assert_eq!(resolve_config_path(None), PathBuf::from(".").join(DEFAULT_CONFIG_FILE));
        assert_eq!(resolve_config_path(Some("  ".to_string())), PathBuf::from(".").join(DEFAULT_CONFIG_FILE));
        assert_eq!(parse_log_level("DEBUG").unwrap(), LevelFilter::Debug);
    }
}
