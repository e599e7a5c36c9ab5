//! `SystemInputTVRemote` — the Stump (TV/IR passthrough) JSON-RPC layer.
//!
//! Unlike every other channel, Stump doesn't speak the binary `Payload`
//! wire format at all — every message on this channel is a `Json` payload
//! whose text is itself a `{msgid, request, params}` / `{response}` /
//! `{notification}` / `{error}` envelope. `msgid` is `"<client-id>.<n>"`:
//! a random 16-byte hex prefix fixed for this manager's lifetime, plus a
//! per-request counter, so a freshly constructed manager never collides
//! with msgids a previous instance left outstanding. Correlating a
//! `{response}`/`{error}` back to its request (including resolving the
//! engine's own pending-request waiter) is the engine's job; this manager
//! only builds requests and updates its own cache from an
//! already-identified response or notification.

use std::collections::HashMap;

use rand::RngCore;
use serde::Serialize;

use crate::events::EventEmitter;

/// Fixed registry of request names the TV/IR subsystem accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StumpRequestName {
    GetConfiguration,
    GetHeadendInfo,
    GetLiveTVInfo,
    GetTunerLineups,
    GetRecentChannels,
    GetProgrammInfo,
    GetAppChannelLineups,
    GetAppChannelData,
    GetAppChannelProgramData,
    SendKey,
    SetChannel,
    EnsureStreamingStarted,
}

impl StumpRequestName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetConfiguration => "GetConfiguration",
            Self::GetHeadendInfo => "GetHeadendInfo",
            Self::GetLiveTVInfo => "GetLiveTVInfo",
            Self::GetTunerLineups => "GetTunerLineups",
            Self::GetRecentChannels => "GetRecentChannels",
            Self::GetProgrammInfo => "GetProgrammInfo",
            Self::GetAppChannelLineups => "GetAppChannelLineups",
            Self::GetAppChannelData => "GetAppChannelData",
            Self::GetAppChannelProgramData => "GetAppChannelProgramData",
            Self::SendKey => "SendKey",
            Self::SetChannel => "SetChannel",
            Self::EnsureStreamingStarted => "EnsureStreamingStarted",
        }
    }
}

impl std::fmt::Display for StumpRequestName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed registry of unsolicited notification names. Reserved for future
/// per-kind handling; today every notification is forwarded to observers
/// unchanged regardless of kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StumpNotificationKind {
    StreamingError,
    ChannelChanged,
    ChannelTypeChanged,
    ConfigurationChanged,
    DeviceUIChanged,
    HeadendChanged,
    VideoFormatChanged,
    ProgrammChanged,
    TunerStateChanged,
    Unknown,
}

impl From<&str> for StumpNotificationKind {
    fn from(name: &str) -> Self {
        match name {
            "StreamingError" => Self::StreamingError,
            "ChannelChanged" => Self::ChannelChanged,
            "ChannelTypeChanged" => Self::ChannelTypeChanged,
            "ConfigurationChanged" => Self::ConfigurationChanged,
            "DeviceUIChanged" => Self::DeviceUIChanged,
            "HeadendChanged" => Self::HeadendChanged,
            "VideoFormatChanged" => Self::VideoFormatChanged,
            "ProgrammChanged" => Self::ProgrammChanged,
            "TunerStateChanged" => Self::TunerStateChanged,
            _ => Self::Unknown,
        }
    }
}

#[derive(Serialize)]
struct StumpRequestEnvelope<'a> {
    msgid: &'a str,
    request: &'a str,
    params: serde_json::Value,
}

pub struct StumpManager {
    client_id: String,
    next_request_id: u64,
    pending: HashMap<String, StumpRequestName>,

    streaming_port: Option<u16>,
    headend_locale: Option<String>,
    is_hdmi_mode: Option<bool>,

    pub on_response: EventEmitter<serde_json::Value>,
    pub on_notification: EventEmitter<serde_json::Value>,
}

impl StumpManager {
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            client_id: hex::encode(bytes),
            next_request_id: 0,
            pending: HashMap::new(),
            streaming_port: None,
            headend_locale: None,
            is_hdmi_mode: None,
            on_response: EventEmitter::new(),
            on_notification: EventEmitter::new(),
        }
    }

    /// Build the `{msgid, request, params}` envelope for `name`. Returns
    /// the msgid (to correlate the eventual response) and the JSON text to
    /// send as the channel's next `Json` payload.
    pub fn build_request(&mut self, name: StumpRequestName, params: serde_json::Value) -> (String, String) {
        let msgid = format!("{}.{}", self.client_id, self.next_request_id);
        self.next_request_id += 1;
        self.pending.insert(msgid.clone(), name);

        let envelope = StumpRequestEnvelope {
            msgid: &msgid,
            request: name.as_str(),
            params,
        };
        let text = serde_json::to_string(&envelope).expect("StumpRequestEnvelope always serializes");
        (msgid, text)
    }

    /// Apply an already-decoded JSON value arriving on this channel.
    /// Updates whichever cached accessor a correlated `{response}`
    /// populates and fires the matching event; unrecognized shapes are
    /// ignored.
    pub fn handle_json(&mut self, value: &serde_json::Value) {
        if let Some(notification) = value.get("notification").and_then(|v| v.as_str()) {
            let _kind = StumpNotificationKind::from(notification);
            let params = value.get("params").cloned().unwrap_or(serde_json::Value::Null);
            self.on_notification.emit(&params);
            return;
        }

        let msgid = value.get("msgid").and_then(|v| v.as_str());
        if let Some(response) = value.get("response") {
            if let Some(msgid) = msgid {
                self.note_response(msgid, response);
            }
            self.on_response.emit(response);
            return;
        }
        if value.get("error").is_some() {
            if let Some(msgid) = msgid {
                self.pending.remove(msgid);
            }
            self.on_response.emit(value);
        }
    }

    fn note_response(&mut self, msgid: &str, value: &serde_json::Value) {
        let Some(name) = self.pending.remove(msgid) else {
            return;
        };
        match name {
            StumpRequestName::EnsureStreamingStarted => {
                if let Some(port) = value.get("streaming_port").and_then(|v| v.as_u64()) {
                    self.streaming_port = Some(port as u16);
                }
            }
            StumpRequestName::GetHeadendInfo => {
                if let Some(locale) = value.get("headend_locale").and_then(|v| v.as_str()) {
                    self.headend_locale = Some(locale.to_owned());
                }
            }
            StumpRequestName::GetConfiguration => {
                if let Some(hdmi) = value.get("is_hdmi_mode").and_then(|v| v.as_bool()) {
                    self.is_hdmi_mode = Some(hdmi);
                }
            }
            _ => {}
        }
    }

    pub fn streaming_port(&self) -> Option<u16> {
        self.streaming_port
    }

    pub fn headend_locale(&self) -> Option<&str> {
        self.headend_locale.as_deref()
    }

    pub fn is_hdmi_mode(&self) -> Option<bool> {
        self.is_hdmi_mode
    }
}

impl Default for StumpManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_increments_counter_and_tracks_pending() {
        let mut mgr = StumpManager::new();
        let (first, text) = mgr.build_request(StumpRequestName::GetConfiguration, serde_json::json!({}));
        assert!(first.ends_with(".0"));
        assert!(text.contains("GetConfiguration"));

        let (second, _) = mgr.build_request(StumpRequestName::GetHeadendInfo, serde_json::json!({}));
        assert!(second.ends_with(".1"));
        assert_ne!(first, second);
    }

    #[test]
    fn response_updates_matching_cache_entry() {
        let mut mgr = StumpManager::new();
        let (msgid, _) = mgr.build_request(StumpRequestName::EnsureStreamingStarted, serde_json::json!({}));

        mgr.handle_json(&serde_json::json!({
            "msgid": msgid,
            "response": { "streaming_port": 5050 },
        }));

        assert_eq!(mgr.streaming_port(), Some(5050));
    }

    #[test]
    fn response_to_unrelated_request_leaves_cache_untouched() {
        let mut mgr = StumpManager::new();
        let (msgid, _) = mgr.build_request(StumpRequestName::GetHeadendInfo, serde_json::json!({}));

        mgr.handle_json(&serde_json::json!({
            "msgid": msgid,
            "response": { "headend_locale": "en-US" },
        }));

        assert_eq!(mgr.headend_locale(), Some("en-US"));
        assert_eq!(mgr.streaming_port(), None);
    }

    #[test]
    fn notification_is_forwarded_without_touching_cache() {
        let mut mgr = StumpManager::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        mgr.on_notification.subscribe(move |params| {
            s.lock().unwrap().push(params.clone());
        });

        mgr.handle_json(&serde_json::json!({
            "notification": "ChannelChanged",
            "params": { "channel_id": 7 },
        }));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(mgr.streaming_port(), None);
    }

    #[test]
    fn error_response_clears_pending_without_caching() {
        let mut mgr = StumpManager::new();
        let (msgid, _) = mgr.build_request(StumpRequestName::SetChannel, serde_json::json!({"channel_id": 4}));

        mgr.handle_json(&serde_json::json!({
            "msgid": msgid,
            "error": { "message": "unknown channel" },
        }));

        // a retried request under a fresh msgid is allowed; the old one
        // is no longer tracked as pending.
        assert!(mgr.pending.get(&msgid).is_none());
    }
}
