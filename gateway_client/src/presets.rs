// gateway_client/src/presets.rs

//! 参数预设存储。
//!
//! 操作员常用的调用参数以 `preset:<method>` 为键保存在一个键值存储中，
//! 定时刷新在参数缺省时会读取这些预设。

use crate::error::GatewayError;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 字符串键值存储。
pub trait PresetStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError>;
}

/// 以单个 JSON 对象文件为后端的存储。
///
/// 每次写入都是"读取-修改-写回"。文件缺失或内容不是 JSON 对象时按空存储处理，
/// 文件中非字符串的值在写回时原样保留。
#[derive(Debug, Clone)]
pub struct JsonFilePresetStore {
    path: PathBuf,
}

impl JsonFilePresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Map<String, Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("[参数预设] 文件 '{}' 内容无效，按空存储处理。", self.path.display());
                Map::new()
            }
        }
    }
}

impl PresetStore for JsonFilePresetStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let mut map = self.read_all();
        map.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent_dir) = self.path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(map))?)?;
        debug!("[参数预设] 已写入 '{}' -> '{}'", key, self.path.display());
        Ok(())
    }
}

/// 进程内存储。
#[derive(Debug, Default)]
pub struct MemoryPresetStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetStore for MemoryPresetStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatewayError> {
        let mut values = self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn preset_key(method: &str) -> String {
    format!("preset:{}", method)
}

/// 保存某个方法最近一次使用的参数。
pub fn save_params(store: &dyn PresetStore, method: &str, params: &Value) -> Result<(), GatewayError> {
    store.set(&preset_key(method), &serde_json::to_string(params)?)
}

/// 读取某个方法保存的参数；不存在或无法解析时返回 `None`。
pub fn load_params(store: &dyn PresetStore, method: &str) -> Option<Value> {
    let raw = store.get(&preset_key(method))?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("[参数预设] 方法 '{}' 的预设无法解析: {}", method, e);
            None
        }
    }
}
