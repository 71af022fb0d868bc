// common_models/src/ws_payloads.rs

//! 网关 WebSocket 协议的帧与负载定义。
//!
//! 协议在一条持久连接上承载三种 JSON 帧，均以 `type` 字段区分：
//! - `req`: 客户端发往网关的请求 `{type, id, method, params}`。
//! - `res`: 网关对某个请求的响应 `{type, id, ok, payload?, error?}`，`id` 回显原请求。
//! - `event`: 网关主动推送的事件 `{type, event, payload?}`，不带 `id`。
//!
//! 客户端发出的帧由 [`ClientFrame`] 表示，网关发出的帧由 [`ServerFrame`] 表示。
//! 业务方法的参数与结果在此处只是不透明的 JSON 值。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 握手方法名。连接打开后客户端发出的第一个请求。
pub const CONNECT_METHOD: &str = "gateway.connect";

/// 订阅生命周期事件名。此事件的负载携带 `action` 以及可选的 `subscriptionId`。
pub const FEED_LIFECYCLE_EVENT: &str = "feeds.subscription";

/// 网关拒绝请求但未给出错误消息时使用的回退文本。
pub const FALLBACK_ERROR_MESSAGE: &str = "request failed";

/// 客户端发往网关的帧。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
}

/// 请求帧主体。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RequestFrame {
    /// 客户端生成的关联 ID。
    pub id: String,
    pub method: String,
    pub params: Value,
}

/// 网关发往客户端的帧：响应或事件。
///
/// 入站文本只在连接管理处解析一次，结果在此枚举上穷尽匹配。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "res")]
    Response(ResponseFrame),
    #[serde(rename = "event")]
    Event(EventFrame),
}

/// 响应帧主体。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// 错误部分保持为原始 JSON，`code`、`message` 通过访问器宽松读取，
    /// 形状不符的错误不会使整帧失效。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseFrame {
    /// 构造一个成功响应。
    pub fn success(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// 构造一个失败响应。
    pub fn failure(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(json!({"code": code.into(), "message": message.into()})),
        }
    }

    /// 失败响应中的错误消息；缺失时返回 [`FALLBACK_ERROR_MESSAGE`]。
    pub fn error_message(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(FALLBACK_ERROR_MESSAGE)
    }

    /// 失败响应中的错误码。字符串原样返回，数字与布尔值转为文本，其余情况为空串。
    pub fn error_code(&self) -> String {
        match self.error.as_ref().and_then(|e| e.get("code")) {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Number(code)) => code.to_string(),
            Some(Value::Bool(code)) => code.to_string(),
            _ => String::new(),
        }
    }
}

/// 事件帧主体。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

// --- 握手 ---

/// `gateway.connect` 的请求参数。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectParams {
    pub client: ClientIdentity,
    pub protocol: ProtocolRange,
}

/// 客户端身份信息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub name: String,
    pub kind: String,
    pub platform: String,
    pub version: String,
}

/// 客户端支持的协议版本区间 (闭区间)。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolRange {
    pub min: u32,
    pub max: u32,
}

/// 握手成功时网关返回的负载 `{protocol:{selected}, session:{sessionId}}`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HelloPayload {
    pub protocol: SelectedProtocol,
    pub session: SessionInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedProtocol {
    /// 任意 JSON 整数 (`i64` 范围内)；小数或非数字视为无效握手结果。
    pub selected: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionInfo {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl HelloPayload {
    /// 从握手响应负载中提取协商结果。
    ///
    /// 只有 `protocol.selected` 为整数且 `session.sessionId` 为字符串时才返回 `Some`，
    /// 其余任何形状都视为无效握手结果。
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}
