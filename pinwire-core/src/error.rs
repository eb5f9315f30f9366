//! Bus error taxonomy
//!
//! A fixed enumeration so a binding layer can map every failure to its own
//! error type without parsing text.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use pinwire_hal::{PinError, SpeedGradeError};

/// Errors returned by driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Bus operation attempted before `configure`
    NotConfigured,
    /// Pin could not be resolved or claimed
    SetupError,
    /// Host board revision unknown, pin map undetermined
    VersionError,
    /// Argument out of range (address, pins, empty buffer)
    InvalidArgument,
    /// Device did not acknowledge its address
    NackAddress,
    /// Device did not acknowledge the register address
    NackRegister,
    /// Device did not acknowledge a data byte
    NackTransfer,
    /// Device did not acknowledge its address after a repeated START
    NackRepeatedStart,
    /// Device held SCL low longer than the clock-stretch timeout
    ClockStretchTimeout,
    /// SDA (and possibly SCL) held low, recovery did not clear it
    BusLockup,
    /// Device holding SDA low outside of a transfer
    DeviceHung,
    /// START condition did not appear on the lines
    FailedStart,
    /// Bus not idle after a STOP condition
    FailedStop,
    /// Bus in an unexpected state after an unknown error
    UnknownBusError,
    /// GPIO resource could not be accessed
    ResourceUnavailable,
}

impl BusError {
    /// errno-style number for binding layers
    pub const fn code(self) -> i32 {
        match self {
            BusError::ResourceUnavailable => 1,
            BusError::InvalidArgument => 22,
            BusError::SetupError => 139,
            BusError::VersionError => 140,
            BusError::NackAddress => 141,
            BusError::NackTransfer => 142,
            BusError::NackRegister => 143,
            BusError::ClockStretchTimeout => 144,
            BusError::NotConfigured => 145,
            BusError::NackRepeatedStart => 146,
            BusError::BusLockup => 147,
            BusError::UnknownBusError => 148,
            BusError::FailedStart => 149,
            BusError::DeviceHung => 150,
            BusError::FailedStop => 151,
        }
    }

    /// Human-readable description
    pub const fn message(self) -> &'static str {
        match self {
            BusError::NotConfigured => "bus has not yet been configured",
            BusError::SetupError => "could not set up GPIO pins",
            BusError::VersionError => "could not determine board revision",
            BusError::InvalidArgument => "invalid argument",
            BusError::NackAddress => "device did not acknowledge device address",
            BusError::NackRegister => "device did not acknowledge register address",
            BusError::NackTransfer => "device did not acknowledge during byte transfer",
            BusError::NackRepeatedStart => {
                "device did not respond after repeated start device address (read)"
            }
            BusError::ClockStretchTimeout => "device not responsive after clock stretch timeout",
            BusError::BusLockup => "bus is locked: SDA and SCL lines are being held low by device",
            BusError::DeviceHung => "device forcing SDA line low",
            BusError::FailedStart => "failed to write a START condition to the bus",
            BusError::FailedStop => "bus not idle after STOP condition",
            BusError::UnknownBusError => "bus is in an unexpected state following an unknown error",
            BusError::ResourceUnavailable => "GPIO resource unavailable",
        }
    }

    /// Timing/bus-state faults that get one recovery attempt before returning
    pub const fn requires_recovery(self) -> bool {
        matches!(
            self,
            BusError::ClockStretchTimeout
                | BusError::DeviceHung
                | BusError::BusLockup
                | BusError::FailedStop
        )
    }

    /// Any of the four NACK variants
    pub const fn is_nack(self) -> bool {
        matches!(
            self,
            BusError::NackAddress
                | BusError::NackRegister
                | BusError::NackTransfer
                | BusError::NackRepeatedStart
        )
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<PinError> for BusError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::InvalidPin | PinError::AlreadyTaken | PinError::Reserved => {
                BusError::SetupError
            }
            PinError::UnknownPlatform => BusError::VersionError,
            PinError::Unavailable => BusError::ResourceUnavailable,
        }
    }
}

impl From<SpeedGradeError> for BusError {
    fn from(_: SpeedGradeError) -> Self {
        BusError::InvalidArgument
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::NackAddress | BusError::NackRepeatedStart => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            BusError::NackRegister | BusError::NackTransfer => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            BusError::ClockStretchTimeout
            | BusError::BusLockup
            | BusError::DeviceHung
            | BusError::FailedStart
            | BusError::FailedStop
            | BusError::UnknownBusError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    const ALL: [BusError; 15] = [
        BusError::NotConfigured,
        BusError::SetupError,
        BusError::VersionError,
        BusError::InvalidArgument,
        BusError::NackAddress,
        BusError::NackRegister,
        BusError::NackTransfer,
        BusError::NackRepeatedStart,
        BusError::ClockStretchTimeout,
        BusError::BusLockup,
        BusError::DeviceHung,
        BusError::FailedStart,
        BusError::FailedStop,
        BusError::UnknownBusError,
        BusError::ResourceUnavailable,
    ];

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.code(), b.code(), "{:?} and {:?} share a code", a, b);
            }
        }
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(BusError::NotConfigured.code(), 145);
        assert_eq!(BusError::NackAddress.code(), 141);
        assert_eq!(BusError::DeviceHung.code(), 150);
        assert_eq!(BusError::InvalidArgument.code(), 22);
    }

    #[test]
    fn test_recovery_classes() {
        assert!(BusError::ClockStretchTimeout.requires_recovery());
        assert!(BusError::DeviceHung.requires_recovery());
        assert!(BusError::BusLockup.requires_recovery());
        assert!(!BusError::NackRegister.requires_recovery());
        assert!(!BusError::NotConfigured.requires_recovery());
        assert!(BusError::NackRepeatedStart.is_nack());
        assert!(!BusError::FailedStart.is_nack());
    }

    #[test]
    fn test_pin_error_mapping() {
        assert_eq!(BusError::from(PinError::AlreadyTaken), BusError::SetupError);
        assert_eq!(BusError::from(PinError::UnknownPlatform), BusError::VersionError);
        assert_eq!(
            BusError::from(PinError::Unavailable),
            BusError::ResourceUnavailable
        );
    }

    #[test]
    fn test_unsupported_frequency() {
        use pinwire_hal::SpeedGrade;

        let err: BusError = SpeedGrade::try_from(250_000).unwrap_err().into();
        assert_eq!(err, BusError::InvalidArgument);
        assert_eq!(err.code(), 22);
    }

    #[test]
    fn test_hal_error_kind() {
        assert_eq!(
            BusError::NackAddress.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(
            BusError::NackTransfer.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );
        assert_eq!(BusError::BusLockup.kind(), ErrorKind::Bus);
        assert_eq!(BusError::InvalidArgument.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_display_uses_message() {
        assert_eq!(
            format!("{}", BusError::DeviceHung),
            "device forcing SDA line low"
        );
    }
}
