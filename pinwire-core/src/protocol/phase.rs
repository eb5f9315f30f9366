//! Transaction phase tracking

/// Where the engine currently is within a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Bus released, no transaction in progress
    #[default]
    Idle,
    /// Issuing START
    StartCondition,
    /// Clocking out the address byte
    AddressPhase,
    /// Clocking out the register address
    RegisterPhase,
    /// Clocking out data bytes
    DataWrite,
    /// Clocking in data bytes
    DataRead,
    /// Issuing a repeated START
    RepeatedStart,
    /// Issuing STOP
    StopCondition,
    /// Bus reset in progress
    ErrorRecovery,
}

impl Phase {
    /// Check if moving from `self` to `next` is a legal transition
    ///
    /// Staying in the same phase is always legal, as is dropping into
    /// `ErrorRecovery` from anywhere.
    pub fn allows(self, next: Phase) -> bool {
        use Phase::*;

        if self == next || next == ErrorRecovery {
            return true;
        }

        matches!(
            (self, next),
            (Idle, StartCondition)
                | (StartCondition, AddressPhase)
                | (StartCondition, Idle)
                | (AddressPhase, RegisterPhase)
                | (AddressPhase, DataWrite)
                | (AddressPhase, DataRead)
                | (AddressPhase, RepeatedStart)
                | (AddressPhase, StopCondition)
                | (RegisterPhase, DataWrite)
                | (RegisterPhase, RepeatedStart)
                | (RegisterPhase, StopCondition)
                | (DataWrite, RepeatedStart)
                | (DataWrite, StopCondition)
                | (DataRead, RepeatedStart)
                | (DataRead, StopCondition)
                | (RepeatedStart, AddressPhase)
                | (RepeatedStart, StopCondition)
                | (StopCondition, Idle)
                | (ErrorRecovery, Idle)
        )
    }

    /// Check if the bus is owned by a transaction in this phase
    pub fn is_busy(self) -> bool {
        !matches!(self, Phase::Idle)
    }
}
