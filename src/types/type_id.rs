//! IEC 60870-5-104 type identification.
//!
//! The type identification selects the layout and meaning of the
//! information objects carried by an ASDU.

/// Shape of the time tag appended to each information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeTag {
    /// No time tag.
    None,
    /// Three-octet CP24Time2a.
    Cp24,
    /// Seven-octet CP56Time2a.
    Cp56,
}

/// IEC 60870-5-104 type identification.
///
/// Values outside the supported catalog are preserved in `Private` so the
/// raw ASDU can still be forwarded or logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    /// Single-point information (M_SP_NA_1)
    SinglePoint,
    /// Single-point information with CP24 time tag (M_SP_TA_1)
    SinglePointTime24,
    /// Double-point information (M_DP_NA_1)
    DoublePoint,
    /// Double-point information with CP24 time tag (M_DP_TA_1)
    DoublePointTime24,
    /// Step position information (M_ST_NA_1)
    StepPosition,
    /// Step position information with CP24 time tag (M_ST_TA_1)
    StepPositionTime24,
    /// Bitstring of 32 bit (M_BO_NA_1)
    Bitstring32,
    /// Bitstring of 32 bit with CP24 time tag (M_BO_TA_1)
    Bitstring32Time24,
    /// Measured value, normalized (M_ME_NA_1)
    MeasuredNormalized,
    /// Measured value, normalized with CP24 time tag (M_ME_TA_1)
    MeasuredNormalizedTime24,
    /// Measured value, scaled (M_ME_NB_1)
    MeasuredScaled,
    /// Measured value, scaled with CP24 time tag (M_ME_TB_1)
    MeasuredScaledTime24,
    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat,
    /// Measured value, short floating point with CP24 time tag (M_ME_TC_1)
    MeasuredFloatTime24,
    /// Integrated totals (M_IT_NA_1)
    IntegratedTotals,
    /// Integrated totals with CP24 time tag (M_IT_TA_1)
    IntegratedTotalsTime24,
    /// Event of protection equipment with CP24 time tag (M_EP_TA_1)
    ProtectionEventTime24,
    /// Packed start events of protection equipment with CP24 time tag (M_EP_TB_1)
    PackedStartEventsTime24,
    /// Packed output circuit information with CP24 time tag (M_EP_TC_1)
    PackedOutputCircuitTime24,
    /// Packed single-point information with status change detection (M_PS_NA_1)
    PackedSinglePointScd,
    /// Measured value, normalized without quality descriptor (M_ME_ND_1)
    MeasuredNormalizedNoQuality,
    /// Single-point information with CP56 time tag (M_SP_TB_1)
    SinglePointTime56,
    /// Double-point information with CP56 time tag (M_DP_TB_1)
    DoublePointTime56,
    /// Step position information with CP56 time tag (M_ST_TB_1)
    StepPositionTime56,
    /// Bitstring of 32 bit with CP56 time tag (M_BO_TB_1)
    Bitstring32Time56,
    /// Measured value, normalized with CP56 time tag (M_ME_TD_1)
    MeasuredNormalizedTime56,
    /// Measured value, scaled with CP56 time tag (M_ME_TE_1)
    MeasuredScaledTime56,
    /// Measured value, short floating point with CP56 time tag (M_ME_TF_1)
    MeasuredFloatTime56,
    /// Integrated totals with CP56 time tag (M_IT_TB_1)
    IntegratedTotalsTime56,
    /// Event of protection equipment with CP56 time tag (M_EP_TD_1)
    ProtectionEventTime56,
    /// Packed start events of protection equipment with CP56 time tag (M_EP_TE_1)
    PackedStartEventsTime56,
    /// Packed output circuit information with CP56 time tag (M_EP_TF_1)
    PackedOutputCircuitTime56,
    /// Single command (C_SC_NA_1)
    SingleCommand,
    /// Double command (C_DC_NA_1)
    DoubleCommand,
    /// Regulating step command (C_RC_NA_1)
    RegulatingStep,
    /// Set-point command, normalized (C_SE_NA_1)
    SetpointNormalized,
    /// Set-point command, scaled (C_SE_NB_1)
    SetpointScaled,
    /// Set-point command, short floating point (C_SE_NC_1)
    SetpointFloat,
    /// Bitstring of 32 bit command (C_BO_NA_1)
    Bitstring32Command,
    /// Single command with CP56 time tag (C_SC_TA_1)
    SingleCommandTime56,
    /// Double command with CP56 time tag (C_DC_TA_1)
    DoubleCommandTime56,
    /// Regulating step command with CP56 time tag (C_RC_TA_1)
    RegulatingStepTime56,
    /// Set-point command, normalized with CP56 time tag (C_SE_TA_1)
    SetpointNormalizedTime56,
    /// Set-point command, scaled with CP56 time tag (C_SE_TB_1)
    SetpointScaledTime56,
    /// Set-point command, short floating point with CP56 time tag (C_SE_TC_1)
    SetpointFloatTime56,
    /// Bitstring of 32 bit command with CP56 time tag (C_BO_TA_1)
    Bitstring32CommandTime56,
    /// End of initialization (M_EI_NA_1)
    EndOfInit,
    /// Interrogation command (C_IC_NA_1)
    InterrogationCommand,
    /// Counter interrogation command (C_CI_NA_1)
    CounterInterrogation,
    /// Read command (C_RD_NA_1)
    ReadCommand,
    /// Clock synchronization command (C_CS_NA_1)
    ClockSync,
    /// Test command (C_TS_NA_1)
    TestCommand,
    /// Reset process command (C_RP_NA_1)
    ResetProcess,
    /// Delay acquisition command (C_CD_NA_1)
    DelayAcquire,
    /// Test command with CP56 time tag (C_TS_TA_1)
    TestCommandTime56,
    /// Parameter of measured value, normalized (P_ME_NA_1)
    ParameterNormalized,
    /// Parameter of measured value, scaled (P_ME_NB_1)
    ParameterScaled,
    /// Parameter of measured value, short floating point (P_ME_NC_1)
    ParameterFloat,
    /// Parameter activation (P_AC_NA_1)
    ParameterActivation,
    /// Unsupported or private type identification, raw value preserved.
    Private(u8),
}

impl TypeId {
    /// Decode a type identification octet. Never fails; unsupported values
    /// are preserved in [`TypeId::Private`].
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SinglePoint,
            2 => Self::SinglePointTime24,
            3 => Self::DoublePoint,
            4 => Self::DoublePointTime24,
            5 => Self::StepPosition,
            6 => Self::StepPositionTime24,
            7 => Self::Bitstring32,
            8 => Self::Bitstring32Time24,
            9 => Self::MeasuredNormalized,
            10 => Self::MeasuredNormalizedTime24,
            11 => Self::MeasuredScaled,
            12 => Self::MeasuredScaledTime24,
            13 => Self::MeasuredFloat,
            14 => Self::MeasuredFloatTime24,
            15 => Self::IntegratedTotals,
            16 => Self::IntegratedTotalsTime24,
            17 => Self::ProtectionEventTime24,
            18 => Self::PackedStartEventsTime24,
            19 => Self::PackedOutputCircuitTime24,
            20 => Self::PackedSinglePointScd,
            21 => Self::MeasuredNormalizedNoQuality,
            30 => Self::SinglePointTime56,
            31 => Self::DoublePointTime56,
            32 => Self::StepPositionTime56,
            33 => Self::Bitstring32Time56,
            34 => Self::MeasuredNormalizedTime56,
            35 => Self::MeasuredScaledTime56,
            36 => Self::MeasuredFloatTime56,
            37 => Self::IntegratedTotalsTime56,
            38 => Self::ProtectionEventTime56,
            39 => Self::PackedStartEventsTime56,
            40 => Self::PackedOutputCircuitTime56,
            45 => Self::SingleCommand,
            46 => Self::DoubleCommand,
            47 => Self::RegulatingStep,
            48 => Self::SetpointNormalized,
            49 => Self::SetpointScaled,
            50 => Self::SetpointFloat,
            51 => Self::Bitstring32Command,
            58 => Self::SingleCommandTime56,
            59 => Self::DoubleCommandTime56,
            60 => Self::RegulatingStepTime56,
            61 => Self::SetpointNormalizedTime56,
            62 => Self::SetpointScaledTime56,
            63 => Self::SetpointFloatTime56,
            64 => Self::Bitstring32CommandTime56,
            70 => Self::EndOfInit,
            100 => Self::InterrogationCommand,
            101 => Self::CounterInterrogation,
            102 => Self::ReadCommand,
            103 => Self::ClockSync,
            104 => Self::TestCommand,
            105 => Self::ResetProcess,
            106 => Self::DelayAcquire,
            107 => Self::TestCommandTime56,
            110 => Self::ParameterNormalized,
            111 => Self::ParameterScaled,
            112 => Self::ParameterFloat,
            113 => Self::ParameterActivation,
            other => Self::Private(other),
        }
    }

    /// Encode to the raw type identification octet.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::SinglePoint => 1,
            Self::SinglePointTime24 => 2,
            Self::DoublePoint => 3,
            Self::DoublePointTime24 => 4,
            Self::StepPosition => 5,
            Self::StepPositionTime24 => 6,
            Self::Bitstring32 => 7,
            Self::Bitstring32Time24 => 8,
            Self::MeasuredNormalized => 9,
            Self::MeasuredNormalizedTime24 => 10,
            Self::MeasuredScaled => 11,
            Self::MeasuredScaledTime24 => 12,
            Self::MeasuredFloat => 13,
            Self::MeasuredFloatTime24 => 14,
            Self::IntegratedTotals => 15,
            Self::IntegratedTotalsTime24 => 16,
            Self::ProtectionEventTime24 => 17,
            Self::PackedStartEventsTime24 => 18,
            Self::PackedOutputCircuitTime24 => 19,
            Self::PackedSinglePointScd => 20,
            Self::MeasuredNormalizedNoQuality => 21,
            Self::SinglePointTime56 => 30,
            Self::DoublePointTime56 => 31,
            Self::StepPositionTime56 => 32,
            Self::Bitstring32Time56 => 33,
            Self::MeasuredNormalizedTime56 => 34,
            Self::MeasuredScaledTime56 => 35,
            Self::MeasuredFloatTime56 => 36,
            Self::IntegratedTotalsTime56 => 37,
            Self::ProtectionEventTime56 => 38,
            Self::PackedStartEventsTime56 => 39,
            Self::PackedOutputCircuitTime56 => 40,
            Self::SingleCommand => 45,
            Self::DoubleCommand => 46,
            Self::RegulatingStep => 47,
            Self::SetpointNormalized => 48,
            Self::SetpointScaled => 49,
            Self::SetpointFloat => 50,
            Self::Bitstring32Command => 51,
            Self::SingleCommandTime56 => 58,
            Self::DoubleCommandTime56 => 59,
            Self::RegulatingStepTime56 => 60,
            Self::SetpointNormalizedTime56 => 61,
            Self::SetpointScaledTime56 => 62,
            Self::SetpointFloatTime56 => 63,
            Self::Bitstring32CommandTime56 => 64,
            Self::EndOfInit => 70,
            Self::InterrogationCommand => 100,
            Self::CounterInterrogation => 101,
            Self::ReadCommand => 102,
            Self::ClockSync => 103,
            Self::TestCommand => 104,
            Self::ResetProcess => 105,
            Self::DelayAcquire => 106,
            Self::TestCommandTime56 => 107,
            Self::ParameterNormalized => 110,
            Self::ParameterScaled => 111,
            Self::ParameterFloat => 112,
            Self::ParameterActivation => 113,
            Self::Private(v) => v,
        }
    }

    /// Fixed per-item element size in octets, excluding the information
    /// object address. `None` for private/unsupported types.
    pub const fn element_size(self) -> Option<usize> {
        let size = match self {
            Self::SinglePoint => 1,
            Self::SinglePointTime24 => 4,
            Self::DoublePoint => 1,
            Self::DoublePointTime24 => 4,
            Self::StepPosition => 2,
            Self::StepPositionTime24 => 5,
            Self::Bitstring32 => 5,
            Self::Bitstring32Time24 => 8,
            Self::MeasuredNormalized => 3,
            Self::MeasuredNormalizedTime24 => 6,
            Self::MeasuredScaled => 3,
            Self::MeasuredScaledTime24 => 6,
            Self::MeasuredFloat => 5,
            Self::MeasuredFloatTime24 => 8,
            Self::IntegratedTotals => 5,
            Self::IntegratedTotalsTime24 => 8,
            Self::ProtectionEventTime24 => 6,
            Self::PackedStartEventsTime24 => 7,
            Self::PackedOutputCircuitTime24 => 7,
            Self::PackedSinglePointScd => 5,
            Self::MeasuredNormalizedNoQuality => 2,
            Self::SinglePointTime56 => 8,
            Self::DoublePointTime56 => 8,
            Self::StepPositionTime56 => 9,
            Self::Bitstring32Time56 => 12,
            Self::MeasuredNormalizedTime56 => 10,
            Self::MeasuredScaledTime56 => 10,
            Self::MeasuredFloatTime56 => 12,
            Self::IntegratedTotalsTime56 => 12,
            Self::ProtectionEventTime56 => 10,
            Self::PackedStartEventsTime56 => 11,
            Self::PackedOutputCircuitTime56 => 11,
            Self::SingleCommand => 1,
            Self::DoubleCommand => 1,
            Self::RegulatingStep => 1,
            Self::SetpointNormalized => 3,
            Self::SetpointScaled => 3,
            Self::SetpointFloat => 5,
            Self::Bitstring32Command => 4,
            Self::SingleCommandTime56 => 8,
            Self::DoubleCommandTime56 => 8,
            Self::RegulatingStepTime56 => 8,
            Self::SetpointNormalizedTime56 => 10,
            Self::SetpointScaledTime56 => 10,
            Self::SetpointFloatTime56 => 12,
            Self::Bitstring32CommandTime56 => 11,
            Self::EndOfInit => 1,
            Self::InterrogationCommand => 1,
            Self::CounterInterrogation => 1,
            Self::ReadCommand => 0,
            Self::ClockSync => 7,
            Self::TestCommand => 2,
            Self::ResetProcess => 1,
            Self::DelayAcquire => 2,
            Self::TestCommandTime56 => 9,
            Self::ParameterNormalized => 3,
            Self::ParameterScaled => 3,
            Self::ParameterFloat => 5,
            Self::ParameterActivation => 1,
            Self::Private(_) => return None,
        };
        Some(size)
    }

    /// Time tag shape appended to each information element.
    pub const fn time_tag(self) -> TimeTag {
        match self {
            Self::SinglePointTime24
            | Self::DoublePointTime24
            | Self::StepPositionTime24
            | Self::Bitstring32Time24
            | Self::MeasuredNormalizedTime24
            | Self::MeasuredScaledTime24
            | Self::MeasuredFloatTime24
            | Self::IntegratedTotalsTime24
            | Self::ProtectionEventTime24
            | Self::PackedStartEventsTime24
            | Self::PackedOutputCircuitTime24 => TimeTag::Cp24,
            Self::SinglePointTime56
            | Self::DoublePointTime56
            | Self::StepPositionTime56
            | Self::Bitstring32Time56
            | Self::MeasuredNormalizedTime56
            | Self::MeasuredScaledTime56
            | Self::MeasuredFloatTime56
            | Self::IntegratedTotalsTime56
            | Self::ProtectionEventTime56
            | Self::PackedStartEventsTime56
            | Self::PackedOutputCircuitTime56
            | Self::SingleCommandTime56
            | Self::DoubleCommandTime56
            | Self::RegulatingStepTime56
            | Self::SetpointNormalizedTime56
            | Self::SetpointScaledTime56
            | Self::SetpointFloatTime56
            | Self::Bitstring32CommandTime56
            | Self::TestCommandTime56 => TimeTag::Cp56,
            _ => TimeTag::None,
        }
    }

    /// Whether this type travels in the monitoring direction (substation to master).
    #[inline]
    pub const fn is_monitoring(self) -> bool {
        matches!(self.as_u8(), 1..=40 | 70)
    }

    /// Whether this type travels in the control direction (master to substation).
    #[inline]
    pub const fn is_control(self) -> bool {
        matches!(self.as_u8(), 45..=64 | 100..=107 | 110..=113)
    }

    /// The IEC companion-standard name, e.g. "M_SP_NA_1".
    pub const fn standard_name(self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::SinglePointTime24 => "M_SP_TA_1",
            Self::DoublePoint => "M_DP_NA_1",
            Self::DoublePointTime24 => "M_DP_TA_1",
            Self::StepPosition => "M_ST_NA_1",
            Self::StepPositionTime24 => "M_ST_TA_1",
            Self::Bitstring32 => "M_BO_NA_1",
            Self::Bitstring32Time24 => "M_BO_TA_1",
            Self::MeasuredNormalized => "M_ME_NA_1",
            Self::MeasuredNormalizedTime24 => "M_ME_TA_1",
            Self::MeasuredScaled => "M_ME_NB_1",
            Self::MeasuredScaledTime24 => "M_ME_TB_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::MeasuredFloatTime24 => "M_ME_TC_1",
            Self::IntegratedTotals => "M_IT_NA_1",
            Self::IntegratedTotalsTime24 => "M_IT_TA_1",
            Self::ProtectionEventTime24 => "M_EP_TA_1",
            Self::PackedStartEventsTime24 => "M_EP_TB_1",
            Self::PackedOutputCircuitTime24 => "M_EP_TC_1",
            Self::PackedSinglePointScd => "M_PS_NA_1",
            Self::MeasuredNormalizedNoQuality => "M_ME_ND_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::DoublePointTime56 => "M_DP_TB_1",
            Self::StepPositionTime56 => "M_ST_TB_1",
            Self::Bitstring32Time56 => "M_BO_TB_1",
            Self::MeasuredNormalizedTime56 => "M_ME_TD_1",
            Self::MeasuredScaledTime56 => "M_ME_TE_1",
            Self::MeasuredFloatTime56 => "M_ME_TF_1",
            Self::IntegratedTotalsTime56 => "M_IT_TB_1",
            Self::ProtectionEventTime56 => "M_EP_TD_1",
            Self::PackedStartEventsTime56 => "M_EP_TE_1",
            Self::PackedOutputCircuitTime56 => "M_EP_TF_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::DoubleCommand => "C_DC_NA_1",
            Self::RegulatingStep => "C_RC_NA_1",
            Self::SetpointNormalized => "C_SE_NA_1",
            Self::SetpointScaled => "C_SE_NB_1",
            Self::SetpointFloat => "C_SE_NC_1",
            Self::Bitstring32Command => "C_BO_NA_1",
            Self::SingleCommandTime56 => "C_SC_TA_1",
            Self::DoubleCommandTime56 => "C_DC_TA_1",
            Self::RegulatingStepTime56 => "C_RC_TA_1",
            Self::SetpointNormalizedTime56 => "C_SE_TA_1",
            Self::SetpointScaledTime56 => "C_SE_TB_1",
            Self::SetpointFloatTime56 => "C_SE_TC_1",
            Self::Bitstring32CommandTime56 => "C_BO_TA_1",
            Self::EndOfInit => "M_EI_NA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
            Self::CounterInterrogation => "C_CI_NA_1",
            Self::ReadCommand => "C_RD_NA_1",
            Self::ClockSync => "C_CS_NA_1",
            Self::TestCommand => "C_TS_NA_1",
            Self::ResetProcess => "C_RP_NA_1",
            Self::DelayAcquire => "C_CD_NA_1",
            Self::TestCommandTime56 => "C_TS_TA_1",
            Self::ParameterNormalized => "P_ME_NA_1",
            Self::ParameterScaled => "P_ME_NB_1",
            Self::ParameterFloat => "P_ME_NC_1",
            Self::ParameterActivation => "P_AC_NA_1",
            Self::Private(_) => "PRIVATE",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private(v) => write!(f, "PRIVATE({v})"),
            other => f.write_str(other.standard_name()),
        }
    }
}
