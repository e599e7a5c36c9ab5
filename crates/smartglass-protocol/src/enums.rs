//! Protocol enumerations and flag bitmasks.
//!
//! Plain enums implement `TryFrom<u16/u32>` (returning the matching
//! [`CodecError`] variant on an unrecognized discriminant); flag sets
//! use [`bitflags`] since the wire format never rejects an unknown bit —
//! it just carries it through.

use crate::{CodecError, CodecResult as Result};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident: $repr:ty { $($variant:ident = $value:expr),+ $(,)? }) => {
        wire_enum!($(#[$meta])* $name: $repr { $($variant = $value),+ } => |other| CodecError::UnknownEnumValue {
            type_name: stringify!($name),
            value: other as u32,
        });
    };
    ($(#[$meta:meta])* $name:ident: $repr:ty { $($variant:ident = $value:expr),+ $(,)? } => |$other:ident| $unknown:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<$repr> for $name {
            type Error = CodecError;

            fn try_from(value: $repr) -> Result<Self> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    $other => Err($unknown),
                }
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> Self {
                value as $repr
            }
        }
    };
}

wire_enum!(
    /// Unprotected packet kind, carried in the `SimpleMessage` header.
    PacketType: u16 {
        ConnectRequest = 0xCC00,
        ConnectResponse = 0xCC01,
        DiscoveryRequest = 0xDD00,
        DiscoveryResponse = 0xDD01,
        PowerOnRequest = 0xDD02,
        Message = 0xD00D,
    } => |other| CodecError::UnknownPacketType(other)
);

wire_enum!(
    /// Device type of either endpoint. Used in discovery and `LocalJoin`.
    ClientType: u16 {
        XboxOne = 0x1,
        Xbox360 = 0x2,
        WindowsDesktop = 0x3,
        WindowsStore = 0x4,
        WindowsPhone = 0x5,
        IPhone = 0x6,
        IPad = 0x7,
        Android = 0x8,
    }
);

wire_enum!(
    ConnectionResult: u16 {
        Success = 0x0,
        Pending = 0x1,
        FailureUnknown = 0x2,
        FailureAnonymousConnectionsDisabled = 0x3,
        FailureDeviceLimitExceeded = 0x4,
        FailureSmartGlassDisabled = 0x5,
        FailureUserAuthFailed = 0x6,
        FailureUserSignInFailed = 0x7,
        FailureUserSignInTimeOut = 0x8,
        FailureUserSignInRequired = 0x9,
    }
);

wire_enum!(
    AckStatus: u16 {
        Pending = 0,
        Processed = 1,
        Rejected = 2,
    }
);

wire_enum!(
    /// Session-level connection state, tracked by `SessionEngine`/`Console`.
    ConnectionState: u16 {
        Disconnected = 0x0,
        Connecting = 0x1,
        Connected = 0x2,
        Error = 0x3,
        Disconnecting = 0x4,
        Reconnecting = 0x5,
    }
);

wire_enum!(
    DeviceStatus: u16 {
        DiscoveringAvailability = 0x1,
        Available = 0x2,
        Unavailable = 0x3,
    }
);

wire_enum!(
    DisconnectReason: u32 {
        Unspecified = 0x0,
        Error = 0x1,
        PowerOff = 0x2,
        Maintenance = 0x3,
        AppClose = 0x4,
        SignOut = 0x5,
        Reboot = 0x6,
        Disabled = 0x7,
        LowPower = 0x8,
    }
);

wire_enum!(
    PairedIdentityState: u16 {
        NotPaired = 0x0,
        Paired = 0x1,
    }
);

wire_enum!(
    /// Service channel identity. `Core` and `Ack` have fixed channel ids;
    /// the rest are opened dynamically via `StartChannelRequest`.
    ServiceChannel: u16 {
        Core = 0x0,
        SystemInput = 0x1,
        SystemInputTVRemote = 0x2,
        SystemMedia = 0x3,
        SystemText = 0x4,
        SystemBroadcast = 0x5,
        Ack = 0x6,
        Title = 0x7,
    }
);

wire_enum!(
    MessageType: u16 {
        Null = 0x0,
        Ack = 0x1,
        Group = 0x2,
        LocalJoin = 0x3,
        StopActivity = 0x5,
        AuxilaryStream = 0x19,
        ActiveSurfaceChange = 0x1a,
        Navigate = 0x1b,
        Json = 0x1c,
        Tunnel = 0x1d,
        ConsoleStatus = 0x1e,
        TitleTextConfiguration = 0x1f,
        TitleTextInput = 0x20,
        TitleTextSelection = 0x21,
        MirroringRequest = 0x22,
        TitleLaunch = 0x23,
        StartChannelRequest = 0x26,
        StartChannelResponse = 0x27,
        StopChannel = 0x28,
        System = 0x29,
        Disconnect = 0x2a,
        TitleTouch = 0x2e,
        Accelerometer = 0x2f,
        Gyrometer = 0x30,
        Inclinometer = 0x31,
        Compass = 0x32,
        Orientation = 0x33,
        PairedIdentityStateChanged = 0x36,
        Unsnap = 0x37,
        GameDvrRecord = 0x38,
        PowerOff = 0x39,
        MediaControllerRemoved = 0xf00,
        MediaCommand = 0xf01,
        MediaCommandResult = 0xf02,
        MediaState = 0xf03,
        Gamepad = 0xf0a,
        SystemTextConfiguration = 0xf2b,
        SystemTextInput = 0xf2c,
        SystemTouch = 0xf2e,
        SystemTextAck = 0xf34,
        SystemTextDone = 0xf35,
    } => |other| CodecError::UnknownMessageType(other)
);

wire_enum!(
    ActiveTitleLocation: u16 {
        Full = 0x0,
        Fill = 0x1,
        Snapped = 0x2,
        StartView = 0x3,
        SystemUI = 0x4,
        Default = 0x5,
    }
);

wire_enum!(
    ActiveSurfaceType: u16 {
        Blank = 0x0,
        Direct = 0x1,
        Html = 0x2,
        TitleTextEntry = 0x3,
    }
);

wire_enum!(
    MediaType: u16 {
        NoMedia = 0x0,
        Music = 0x1,
        Video = 0x2,
        Image = 0x3,
        Conversation = 0x4,
        Game = 0x5,
    }
);

wire_enum!(
    MediaTransportState: u16 {
        Invalid = 0x0,
        Stopped = 0x1,
        Starting = 0x2,
        Playing = 0x3,
        Paused = 0x4,
        Buffering = 0x5,
    }
);

wire_enum!(
    MediaPlaybackStatus: u16 {
        Closed = 0x0,
        Changing = 0x1,
        Stopped = 0x2,
        Playing = 0x3,
        Paused = 0x4,
    }
);

wire_enum!(
    SoundLevel: u16 {
        Muted = 0x0,
        Low = 0x1,
        Full = 0x2,
    }
);

bitflags::bitflags! {
    /// Buttons held on a `Gamepad` input report. A bitmask, not a plain
    /// enum — the controller reports every button held at once, not a
    /// single pressed button.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct GamePadButton: u16 {
        const ENROLL = 0x1;
        const NEXUS = 0x2;
        const MENU = 0x4;
        const VIEW = 0x8;
        const A = 0x10;
        const B = 0x20;
        const X = 0x40;
        const Y = 0x80;
        const DPAD_UP = 0x100;
        const DPAD_DOWN = 0x200;
        const DPAD_LEFT = 0x400;
        const DPAD_RIGHT = 0x800;
        const LEFT_SHOULDER = 0x1000;
        const RIGHT_SHOULDER = 0x2000;
        const LEFT_THUMBSTICK = 0x4000;
        const RIGHT_THUMBSTICK = 0x8000;
    }
}

wire_enum!(
    TouchAction: u16 {
        Null = 0x0,
        Down = 0x1,
        Move = 0x2,
        Up = 0x3,
        Cancel = 0x4,
    }
);

wire_enum!(
    TextInputScope: u32 {
        Default = 0x0,
        Url = 0x1,
        FullFilePath = 0x2,
        FileName = 0x3,
        EmailUserName = 0x4,
        EmailSmtpAddress = 0x5,
        LogOnName = 0x6,
        PersonalFullName = 0x7,
        PersonalNamePrefix = 0x8,
        PersonalGivenName = 0x9,
        PersonalMiddleName = 0xa,
        PersonalSurname = 0xb,
        PersonalNameSuffix = 0xc,
        PostalAddress = 0xd,
        PostalCode = 0xe,
        AddressStreet = 0xf,
        AddressStateOrProvince = 0x10,
        AddressCity = 0x11,
        AddressCountryName = 0x12,
        AddressCountryShortName = 0x13,
        CurrencyAmountAndSymbol = 0x14,
        CurrencyAmount = 0x15,
        Date = 0x16,
        DateMonth = 0x17,
        DateDay = 0x18,
        DateYear = 0x19,
        DateMonthName = 0x1a,
        DateDayName = 0x1b,
        Digits = 0x1c,
        Number = 0x1d,
        OneChar = 0x1e,
        Password = 0x1f,
        TelephoneNumber = 0x20,
        TelephoneCountryCode = 0x21,
        TelephoneAreaCode = 0x22,
        TelephoneLocalNumber = 0x23,
        Time = 0x24,
        TimeHour = 0x25,
        TimeMinorSec = 0x26,
        NumberFullWidth = 0x27,
        AlphanumericHalfWidth = 0x28,
        AlphanumericFullWidth = 0x29,
        CurrencyChinese = 0x2a,
        Bopomofo = 0x2b,
        Hiragana = 0x2c,
        KatakanaHalfWidth = 0x2d,
        KatakanaFullWidth = 0x2e,
        Hanja = 0x2f,
        HangulHalfWidth = 0x30,
        HangulFullWidth = 0x31,
        Search = 0x32,
        SearchTitleText = 0x33,
        SearchIncremental = 0x34,
        ChineseHalfWidth = 0x35,
        ChineseFullWidth = 0x36,
        NativeScript = 0x37,
        Unknown = 0x39,
    }
);

wire_enum!(
    TextAction: u16 {
        Cancel = 0x0,
        Accept = 0x1,
    }
);

wire_enum!(
    TextResult: u16 {
        Cancel = 0x0,
        Accept = 0x1,
        Null = 0xFFFF,
    }
);

wire_enum!(
    /// Console status/error codes (`SG_E_*`). Carried in
    /// `StartChannelResponse.result`; otherwise opaque to this crate.
    SGResultCode: u32 {
        Success = 0x0,
        Abort = 0x8000_0004,
        AccessDenied = 0x8000_0005,
        Fail = 0x8000_0006,
        Handle = 0x8000_0007,
        InvalidArg = 0x8000_0008,
        NoInterface = 0x8000_0009,
        NotImpl = 0x8000_000a,
        OutOfMemory = 0x8000_000b,
        Pointer = 0x8000_000c,
        Unexpected = 0x8000_000d,
        Pending = 0x8000_000e,
        InvalidData = 0x8000_000f,
        Canceled = 0x8000_0010,
        InvalidState = 0x8000_0011,
        NotFound = 0x8000_0012,
        NoMoreCapacity = 0x8000_0013,
        FailedToStartThread = 0x8000_0014,
        MessageExpired = 0x8000_0015,
        TimedOut = 0x8000_0016,
        NotInitialized = 0x8000_0017,
        JsonLengthExceeded = 0x8000_0018,
        MessageLengthExceeded = 0x8000_0019,
        InvalidConfiguration = 0x8000_001a,
        ExpiredConfiguration = 0x8000_001b,
        AuthRequired = 0x8000_001d,
        TimedOutPresence = 0x8000_001e,
        TimedOutConnect = 0x8000_001f,
        SocketError = 0x8001_0001,
        HttpError = 0x8002_0001,
        CancelShutdown = 0x8002_0002,
        HttpStatus = 0x8002_0003,
        UnexpectedCryptoError = 0x8003_0001,
        InvalidCryptArg = 0x8003_0002,
        CryptoInvalidSignature = 0x8003_0003,
        InvalidCertificate = 0x8003_0004,
        ChannelRequestUnknownError = 0x8004_0105,
        FailedToJoin = 0x8006_0001,
        AlreadyConnected = 0x8006_0002,
        NotConnected = 0x8006_0003,
        ConsoleNotResponding = 0x8006_0004,
        ConsoleDisconnecting = 0x8006_0005,
        BigEndianStreamStringNotTerminated = 0x8007_0001,
        ChannelAlreadyStarted = 0x8008_0001,
        ChannelFailedToStart = 0x8008_0002,
        MaximumChannelsStarted = 0x8008_0003,
        JniClassNotFound = 0x8009_0001,
        JniMethodNotFound = 0x8009_0002,
        JniRuntimeError = 0x8009_0003,
    }
);

bitflags::bitflags! {
    /// Client device hardware capabilities, advertised in `LocalJoin`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DeviceCapabilities: u64 {
        const STREAMING = 1;
        const AUDIO = 2;
        const ACCELEROMETER = 4;
        const COMPASS = 8;
        const GYROMETER = 16;
        const INCLINOMETER = 32;
        const ORIENTATION = 64;
    }
}

bitflags::bitflags! {
    /// Console-advertised pairing policy, from `DiscoveryResponse.flags`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PrimaryDeviceFlag: u32 {
        const ALLOW_CONSOLE_USERS = 0x1;
        const ALLOW_AUTHENTICATED_USERS = 0x2;
        const ALLOW_ANONYMOUS_USERS = 0x4;
        const CERTIFICATE_PENDING = 0x8;
    }
}

bitflags::bitflags! {
    /// Commands a console's active media session currently accepts,
    /// from `MediaState.enabled_commands`; also the single command a
    /// `MediaCommand` message issues.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MediaControlCommand: u32 {
        const PLAY = 0x2;
        const PAUSE = 0x4;
        const PLAY_PAUSE_TOGGLE = 0x8;
        const STOP = 0x10;
        const RECORD = 0x20;
        const NEXT_TRACK = 0x40;
        const PREVIOUS_TRACK = 0x80;
        const FAST_FORWARD = 0x100;
        const REWIND = 0x200;
        const CHANNEL_UP = 0x400;
        const CHANNEL_DOWN = 0x800;
        const BACK = 0x1000;
        const VIEW = 0x2000;
        const MENU = 0x4000;
        const SEEK = 0x8000;
    }
}

bitflags::bitflags! {
    /// Text-entry session options, from `TitleTextConfiguration`/
    /// `SystemTextConfiguration`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TextOption: u32 {
        const ACCEPTS_RETURN = 0x1;
        const PASSWORD = 0x2;
        const MULTI_LINE = 0x4;
        const SPELL_CHECK_ENABLED = 0x8;
        const PREDICTION_ENABLED = 0x10;
        const RTL = 0x20;
        const DISMISS = 0x4000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrips() {
        assert_eq!(MessageType::try_from(0x1c).unwrap(), MessageType::Json);
        let raw: u16 = MessageType::Json.into();
        assert_eq!(raw, 0x1c);
    }

    #[test]
    fn message_type_rejects_unknown() {
        assert!(MessageType::try_from(0xBEEF).is_err());
    }

    #[test]
    fn media_control_command_seek_bit() {
        let cmd = MediaControlCommand::SEEK;
        assert!(cmd.contains(MediaControlCommand::SEEK));
        assert!(!cmd.contains(MediaControlCommand::PLAY));
    }

    #[test]
    fn primary_device_flag_bits() {
        let flags = PrimaryDeviceFlag::ALLOW_CONSOLE_USERS | PrimaryDeviceFlag::ALLOW_ANONYMOUS_USERS;
        assert!(flags.contains(PrimaryDeviceFlag::ALLOW_CONSOLE_USERS));
        assert!(!flags.contains(PrimaryDeviceFlag::CERTIFICATE_PENDING));
    }
}
