//! `SystemText` — on-screen keyboard sessions.
//!
//! The console owns text-entry sessions; this manager just tracks the
//! currently active one (if any) and the last version number either
//! side has acknowledged, and builds the payloads for sending our own
//! edits back. `current_text_version` is monotonic-only: a stale ack or
//! input report referencing an older version never moves it backwards.

use smartglass_protocol::enums::{TextInputScope, TextOption, TextResult};
use smartglass_protocol::payloads::{
    Payload, SystemTextAcknowledge, SystemTextDone, SystemTextInput, TextConfiguration,
};

use crate::events::EventEmitter;
use crate::{ManagerError, Result};

#[derive(Default)]
pub struct TextManager {
    session_config: Option<TextConfiguration>,
    current_session_input: Option<SystemTextInput>,
    last_session_ack: Option<SystemTextAcknowledge>,
    current_text_version: u32,

    pub on_configuration: EventEmitter<TextConfiguration>,
    pub on_input: EventEmitter<SystemTextInput>,
    pub on_done: EventEmitter<SystemTextDone>,
}

impl TextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound message. Returns a reply payload the engine
    /// should send (the auto-ack that follows every `SystemTextInput`),
    /// if any.
    pub fn handle_message(&mut self, payload: &Payload) -> Option<Payload> {
        match payload {
            Payload::TextConfiguration(config) => {
                self.reset_session();
                self.session_config = Some(config.clone());
                self.on_configuration.emit(config);
                None
            }
            Payload::SystemTextInput(input) => {
                self.current_session_input = Some(input.clone());
                self.set_current_text_version(input.submitted_version);
                self.on_input.emit(input);
                Some(self.send_systemtext_ack_payload(input.text_session_id, self.current_text_version))
            }
            Payload::SystemTextAck(ack) => {
                self.last_session_ack = Some(ack.clone());
                self.set_current_text_version(ack.text_version_ack);
                None
            }
            Payload::SystemTextDone(done) => {
                if done.text_session_id != 0 && Some(done.text_session_id) == self.text_session_id() {
                    self.reset_session();
                }
                self.on_done.emit(done);
                None
            }
            other => {
                tracing::warn!(?other, "unexpected message on SystemText channel");
                None
            }
        }
    }

    fn set_current_text_version(&mut self, value: u32) {
        if value > self.current_text_version {
            self.current_text_version = value;
        }
    }

    pub fn reset_session(&mut self) {
        self.session_config = None;
        self.current_session_input = None;
        self.last_session_ack = None;
        self.current_text_version = 0;
    }

    pub fn got_active_session(&self) -> bool {
        self.session_config.is_some()
    }

    pub fn current_text_version(&self) -> u32 {
        self.current_text_version
    }

    pub fn text_session_id(&self) -> Option<u32> {
        self.session_config.as_ref().map(|c| c.text_session_id as u32)
    }

    pub fn text_options(&self) -> Option<TextOption> {
        self.session_config.as_ref().map(|c| c.text_options)
    }

    pub fn text_input_scope(&self) -> Option<TextInputScope> {
        self.session_config.as_ref().map(|c| c.input_scope)
    }

    pub fn max_text_length(&self) -> Option<u32> {
        self.session_config.as_ref().map(|c| c.max_text_length)
    }

    pub fn text_locale(&self) -> Option<&str> {
        self.session_config.as_ref().map(|c| c.locale.as_str())
    }

    pub fn text_prompt(&self) -> Option<&str> {
        self.session_config.as_ref().map(|c| c.prompt.as_str())
    }

    /// Build the `SystemTextInput` payload for submitting `text` as the
    /// next edit of the active session. Caches the just-sent report as
    /// `current_session_input`, mirroring what the console itself would
    /// echo back.
    pub fn send_systemtext_input(&mut self, text: String) -> Result<Payload> {
        let session_id = self.text_session_id().ok_or(ManagerError::NoActiveTextSession)?;
        let base_version = self.current_text_version;
        let new_version = base_version + 1;

        let report = SystemTextInput {
            text_session_id: session_id,
            base_version,
            submitted_version: new_version,
            total_text_byte_len: text.len() as u32,
            selection_start: -1,
            selection_length: -1,
            flags: 0,
            text_chunk_byte_start: 0,
            text_chunk: text,
            delta: None,
        };
        self.current_session_input = Some(report.clone());
        Ok(Payload::SystemTextInput(report))
    }

    fn send_systemtext_ack_payload(&self, session_id: u32, version: u32) -> Payload {
        Payload::SystemTextAck(SystemTextAcknowledge {
            text_session_id: session_id,
            text_version_ack: version,
        })
    }

    pub fn send_systemtext_ack(&self, session_id: u32, version: u32) -> Payload {
        self.send_systemtext_ack_payload(session_id, version)
    }

    /// Build the `SystemTextDone` payload that closes out the active
    /// session, accepting whatever's been typed so far.
    pub fn finish_text_input(&self) -> Result<Payload> {
        let session_id = self.text_session_id().ok_or(ManagerError::NoActiveTextSession)?;
        let version = self
            .current_session_input
            .as_ref()
            .map(|i| i.submitted_version)
            .unwrap_or(0);
        Ok(self.send_systemtext_done(session_id, version, 0, TextResult::Accept))
    }

    pub fn send_systemtext_done(&self, session_id: u32, version: u32, flags: u32, result: TextResult) -> Payload {
        Payload::SystemTextDone(SystemTextDone {
            text_session_id: session_id,
            text_version: version,
            flags,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TextConfiguration {
        TextConfiguration {
            text_session_id: 5,
            text_buffer_version: 0,
            text_options: TextOption::empty(),
            input_scope: TextInputScope::Default,
            max_text_length: 256,
            locale: "en-US".into(),
            prompt: String::new(),
        }
    }

    #[test]
    fn configuration_starts_a_session() {
        let mut mgr = TextManager::new();
        mgr.handle_message(&Payload::TextConfiguration(config()));
        assert!(mgr.got_active_session());
        assert_eq!(mgr.text_session_id(), Some(5));
    }

    #[test]
    fn text_input_bumps_version_and_replies_with_ack() {
        let mut mgr = TextManager::new();
        mgr.handle_message(&Payload::TextConfiguration(config()));

        let input = SystemTextInput {
            text_session_id: 5,
            base_version: 0,
            submitted_version: 3,
            total_text_byte_len: 1,
            selection_start: -1,
            selection_length: -1,
            flags: 0,
            text_chunk_byte_start: 0,
            text_chunk: "a".into(),
            delta: None,
        };
        let reply = mgr.handle_message(&Payload::SystemTextInput(input));
        assert_eq!(mgr.current_text_version(), 3);
        match reply {
            Some(Payload::SystemTextAck(ack)) => assert_eq!(ack.text_version_ack, 3),
            _ => panic!("expected an ack reply"),
        }
    }

    #[test]
    fn version_never_moves_backwards() {
        let mut mgr = TextManager::new();
        mgr.handle_message(&Payload::TextConfiguration(config()));
        mgr.set_current_text_version(10);
        mgr.set_current_text_version(3);
        assert_eq!(mgr.current_text_version(), 10);
    }

    #[test]
    fn done_for_active_session_resets_it() {
        let mut mgr = TextManager::new();
        mgr.handle_message(&Payload::TextConfiguration(config()));
        mgr.handle_message(&Payload::SystemTextDone(SystemTextDone {
            text_session_id: 5,
            text_version: 1,
            flags: 0,
            result: TextResult::Accept,
        }));
        assert!(!mgr.got_active_session());
    }

    #[test]
    fn done_for_a_different_session_is_ignored() {
        let mut mgr = TextManager::new();
        mgr.handle_message(&Payload::TextConfiguration(config()));
        mgr.handle_message(&Payload::SystemTextDone(SystemTextDone {
            text_session_id: 99,
            text_version: 1,
            flags: 0,
            result: TextResult::Accept,
        }));
        assert!(mgr.got_active_session());
    }
}
