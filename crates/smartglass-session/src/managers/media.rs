//! `SystemMedia` — now-playing state and transport control.

use smartglass_protocol::enums::{MediaControlCommand, MediaPlaybackStatus, MediaType, SoundLevel};
use smartglass_protocol::payloads::{MediaCommand, MediaCommandResult, MediaControllerRemoved, MediaMetadataEntry, MediaState, Payload};

use crate::events::EventEmitter;

/// Caches the most recent `MediaState` and relays transport commands and
/// their results.
#[derive(Default)]
pub struct MediaManager {
    media_state: Option<MediaState>,

    pub on_media_state: EventEmitter<MediaState>,
    pub on_media_command_result: EventEmitter<MediaCommandResult>,
    pub on_media_controller_removed: EventEmitter<MediaControllerRemoved>,
}

impl MediaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound message on this channel. `MediaState` is cached;
    /// `MediaCommandResult` is relayed without touching the cache;
    /// `MediaControllerRemoved` clears the cache only if it names the
    /// currently-cached title. Anything else is unexpected here.
    pub fn handle_message(&mut self, payload: &Payload) {
        match payload {
            Payload::MediaState(state) => {
                self.media_state = Some(state.clone());
                self.on_media_state.emit(state);
            }
            Payload::MediaCommandResult(result) => {
                self.on_media_command_result.emit(result);
            }
            Payload::MediaControllerRemoved(removed) => {
                if self.title_id() == Some(removed.title_id) {
                    self.media_state = None;
                }
                self.on_media_controller_removed.emit(removed);
            }
            other => {
                tracing::warn!(?other, "unexpected message on SystemMedia channel");
            }
        }
    }

    pub fn media_state(&self) -> Option<&MediaState> {
        self.media_state.as_ref()
    }

    pub fn active_media(&self) -> bool {
        self.media_state.is_some()
    }

    pub fn title_id(&self) -> Option<u32> {
        self.media_state.as_ref().map(|s| s.title_id)
    }

    pub fn aum_id(&self) -> Option<&str> {
        self.media_state.as_ref().map(|s| s.aum_id.as_str())
    }

    pub fn asset_id(&self) -> Option<&str> {
        self.media_state.as_ref().map(|s| s.asset_id.as_str())
    }

    pub fn media_type(&self) -> Option<MediaType> {
        self.media_state.as_ref().map(|s| s.media_type)
    }

    pub fn sound_level(&self) -> Option<SoundLevel> {
        self.media_state.as_ref().map(|s| s.sound_level)
    }

    pub fn enabled_commands(&self) -> Option<MediaControlCommand> {
        self.media_state.as_ref().map(|s| s.enabled_commands)
    }

    pub fn playback_status(&self) -> Option<MediaPlaybackStatus> {
        self.media_state.as_ref().map(|s| s.playback_status)
    }

    pub fn rate(&self) -> Option<f32> {
        self.media_state.as_ref().map(|s| s.rate)
    }

    pub fn position(&self) -> Option<u64> {
        self.media_state.as_ref().map(|s| s.position)
    }

    pub fn media_start(&self) -> Option<u64> {
        self.media_state.as_ref().map(|s| s.media_start)
    }

    pub fn media_end(&self) -> Option<u64> {
        self.media_state.as_ref().map(|s| s.media_end)
    }

    pub fn min_seek(&self) -> Option<u64> {
        self.media_state.as_ref().map(|s| s.min_seek)
    }

    pub fn max_seek(&self) -> Option<u64> {
        self.media_state.as_ref().map(|s| s.max_seek)
    }

    pub fn metadata(&self) -> Option<&[MediaMetadataEntry]> {
        self.media_state.as_ref().map(|s| s.metadata.as_slice())
    }

    /// Build a transport-control payload. `seek_position` is only
    /// meaningful when `command == MediaControlCommand::SEEK`.
    pub fn media_command(
        &self,
        title_id: u32,
        command: MediaControlCommand,
        request_id: u64,
        seek_position: Option<u64>,
    ) -> Payload {
        Payload::MediaCommand(MediaCommand {
            request_id,
            title_id,
            command,
            seek_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(title_id: u32) -> MediaState {
        MediaState {
            title_id,
            aum_id: "aum".into(),
            asset_id: "asset".into(),
            media_type: MediaType::Video,
            sound_level: SoundLevel::Full,
            enabled_commands: MediaControlCommand::PLAY,
            playback_status: MediaPlaybackStatus::Playing,
            rate: 1.0,
            position: 0,
            media_start: 0,
            media_end: 0,
            min_seek: 0,
            max_seek: 0,
            metadata: Vec::new(),
        }
    }

    #[test]
    fn media_state_is_cached_and_proxied() {
        let mut mgr = MediaManager::new();
        mgr.handle_message(&Payload::MediaState(state(7)));
        assert_eq!(mgr.title_id(), Some(7));
        assert!(mgr.active_media());
    }

    #[test]
    fn controller_removed_only_clears_matching_title() {
        let mut mgr = MediaManager::new();
        mgr.handle_message(&Payload::MediaState(state(7)));
        mgr.handle_message(&Payload::MediaControllerRemoved(MediaControllerRemoved { title_id: 9 }));
        assert!(mgr.active_media());

        mgr.handle_message(&Payload::MediaControllerRemoved(MediaControllerRemoved { title_id: 7 }));
        assert!(!mgr.active_media());
    }

    #[test]
    fn command_result_does_not_touch_cache() {
        let mut mgr = MediaManager::new();
        mgr.handle_message(&Payload::MediaState(state(7)));
        mgr.handle_message(&Payload::MediaCommandResult(MediaCommandResult { request_id: 1, result: 0 }));
        assert_eq!(mgr.title_id(), Some(7));
    }
}
