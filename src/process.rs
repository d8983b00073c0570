//! Process-information send helpers on [`Connection`].
//!
//! Control-direction helpers build the single-object command ASDUs a
//! master sends; monitoring-direction helpers build the multi-item data
//! ASDUs a substation pushes. Each validates the causes of transmission
//! the companion standard permits for that family before anything is
//! encoded.

use crate::error::{Error, Result};
use crate::parser::{
    Bitstring32Info, BitstringCommandInfo, DoubleCommandInfo, DoublePointInfo,
    IntegratedTotalsInfo, MeasuredFloatInfo, MeasuredNormalizedInfo, MeasuredScaledInfo, Message,
    Payload, SetpointFloatInfo, SetpointNormalizedInfo, SetpointScaledInfo, SingleCommandInfo,
    SinglePointInfo, StepCommandInfo, StepPositionInfo,
};
use crate::session::Connection;
use crate::types::{AsduHeader, Cause, CauseOfInitial, Cot, InfoObjAddr, TypeId, Vsq};

/// Causes permitted for switch-state and measured-value transmissions.
fn check_monitor_cause(cot: Cot, periodic: bool) -> Result<()> {
    let ok = matches!(
        cot.cause,
        Cause::Background
            | Cause::Spontaneous
            | Cause::Request
            | Cause::ReturnRemote
            | Cause::ReturnLocal
    ) || cot.cause.is_interrogation_response()
        || (periodic && cot.cause == Cause::Periodic);
    if ok {
        Ok(())
    } else {
        Err(Error::CommandCause)
    }
}

/// Causes permitted for counter transmissions: spontaneous or a counter
/// request response.
fn check_counter_cause(cot: Cot) -> Result<()> {
    if matches!(cot.cause, Cause::Spontaneous) || matches!(cot.cause.as_u8(), 37..=41) {
        return Ok(());
    }
    Err(Error::CommandCause)
}

/// Activation or deactivation, the command shape.
fn check_command_cause(cot: Cot) -> Result<()> {
    if matches!(cot.cause, Cause::Activation | Cause::Deactivation) {
        return Ok(());
    }
    Err(Error::CommandCause)
}

fn expect_type(type_id: TypeId, allowed: &[TypeId]) -> Result<()> {
    if allowed.contains(&type_id) {
        return Ok(());
    }
    Err(Error::TypeIdNotMatch(type_id.as_u8()))
}

impl Connection {
    fn send_items(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        payload: Payload,
    ) -> Result<()> {
        let header = AsduHeader {
            type_id,
            vsq: Vsq::new(0, is_sequence), // count is derived from the items
            cot,
            orig_addr: self.params().orig_addr,
            common_addr,
        };
        self.send_message(&Message::new(header, payload))
    }

    /// Send single-point information, `M_SP_NA_1`/`M_SP_TA_1`/`M_SP_TB_1`.
    pub fn send_single_points(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<SinglePointInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::SinglePoint, TypeId::SinglePointTime24, TypeId::SinglePointTime56],
        )?;
        check_monitor_cause(cot, false)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::SinglePoint(items))
    }

    /// Send double-point information, `M_DP_NA_1`/`M_DP_TA_1`/`M_DP_TB_1`.
    pub fn send_double_points(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<DoublePointInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::DoublePoint, TypeId::DoublePointTime24, TypeId::DoublePointTime56],
        )?;
        check_monitor_cause(cot, false)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::DoublePoint(items))
    }

    /// Send step position information, `M_ST_NA_1`/`M_ST_TA_1`/`M_ST_TB_1`.
    pub fn send_step_positions(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<StepPositionInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::StepPosition, TypeId::StepPositionTime24, TypeId::StepPositionTime56],
        )?;
        check_monitor_cause(cot, false)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::StepPosition(items))
    }

    /// Send 32-bit bitstrings, `M_BO_NA_1`/`M_BO_TA_1`/`M_BO_TB_1`.
    pub fn send_bitstring32s(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<Bitstring32Info>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::Bitstring32, TypeId::Bitstring32Time24, TypeId::Bitstring32Time56],
        )?;
        check_monitor_cause(cot, false)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::Bitstring32(items))
    }

    /// Send normalized measured values, `M_ME_NA_1`/`M_ME_TA_1`/
    /// `M_ME_TD_1`/`M_ME_ND_1`. Periodic transmission is permitted.
    pub fn send_measured_normalized(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<MeasuredNormalizedInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[
                TypeId::MeasuredNormalized,
                TypeId::MeasuredNormalizedTime24,
                TypeId::MeasuredNormalizedTime56,
                TypeId::MeasuredNormalizedNoQuality,
            ],
        )?;
        check_monitor_cause(cot, true)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::MeasuredNormalized(items))
    }

    /// Send scaled measured values, `M_ME_NB_1`/`M_ME_TB_1`/`M_ME_TE_1`.
    pub fn send_measured_scaled(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<MeasuredScaledInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::MeasuredScaled, TypeId::MeasuredScaledTime24, TypeId::MeasuredScaledTime56],
        )?;
        check_monitor_cause(cot, true)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::MeasuredScaled(items))
    }

    /// Send short floating point measured values, `M_ME_NC_1`/`M_ME_TC_1`/
    /// `M_ME_TF_1`.
    pub fn send_measured_floats(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<MeasuredFloatInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[TypeId::MeasuredFloat, TypeId::MeasuredFloatTime24, TypeId::MeasuredFloatTime56],
        )?;
        check_monitor_cause(cot, true)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::MeasuredFloat(items))
    }

    /// Send integrated totals, `M_IT_NA_1`/`M_IT_TA_1`/`M_IT_TB_1`.
    pub fn send_integrated_totals(
        &self,
        type_id: TypeId,
        is_sequence: bool,
        cot: Cot,
        common_addr: u16,
        items: Vec<IntegratedTotalsInfo>,
    ) -> Result<()> {
        expect_type(
            type_id,
            &[
                TypeId::IntegratedTotals,
                TypeId::IntegratedTotalsTime24,
                TypeId::IntegratedTotalsTime56,
            ],
        )?;
        check_counter_cause(cot)?;
        self.send_items(type_id, is_sequence, cot, common_addr, Payload::IntegratedTotals(items))
    }

    /// Announce end of initialization, `M_EI_NA_1`.
    pub fn send_end_of_init(
        &self,
        common_addr: u16,
        ioa: InfoObjAddr,
        coi: CauseOfInitial,
    ) -> Result<()> {
        self.send_items(
            TypeId::EndOfInit,
            false,
            Cot::new(Cause::Initialized),
            common_addr,
            Payload::EndOfInit { ioa, coi },
        )
    }

    /// Send a single command, `C_SC_NA_1`/`C_SC_TA_1`.
    pub fn single_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: SingleCommandInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::SingleCommand, TypeId::SingleCommandTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::SingleCommand(cmd))
    }

    /// Send a double command, `C_DC_NA_1`/`C_DC_TA_1`.
    pub fn double_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: DoubleCommandInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::DoubleCommand, TypeId::DoubleCommandTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::DoubleCommand(cmd))
    }

    /// Send a regulating step command, `C_RC_NA_1`/`C_RC_TA_1`.
    pub fn step_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: StepCommandInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::RegulatingStep, TypeId::RegulatingStepTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::StepCommand(cmd))
    }

    /// Send a normalized set-point command, `C_SE_NA_1`/`C_SE_TA_1`.
    pub fn setpoint_normalized_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: SetpointNormalizedInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::SetpointNormalized, TypeId::SetpointNormalizedTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::SetpointNormalized(cmd))
    }

    /// Send a scaled set-point command, `C_SE_NB_1`/`C_SE_TB_1`.
    pub fn setpoint_scaled_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: SetpointScaledInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::SetpointScaled, TypeId::SetpointScaledTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::SetpointScaled(cmd))
    }

    /// Send a short floating point set-point command, `C_SE_NC_1`/`C_SE_TC_1`.
    pub fn setpoint_float_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: SetpointFloatInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::SetpointFloat, TypeId::SetpointFloatTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::SetpointFloat(cmd))
    }

    /// Send a 32-bit bitstring command, `C_BO_NA_1`/`C_BO_TA_1`.
    pub fn bitstring_cmd(
        &self,
        type_id: TypeId,
        cot: Cot,
        common_addr: u16,
        cmd: BitstringCommandInfo,
    ) -> Result<()> {
        expect_type(type_id, &[TypeId::Bitstring32Command, TypeId::Bitstring32CommandTime56])?;
        check_command_cause(cot)?;
        self.send_items(type_id, false, cot, common_addr, Payload::BitstringCommand(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Params};
    use crate::session::Connection;
    use crate::types::QualityDescriptor;

    // The helpers fail before encoding when the cause is wrong, so a bare
    // (never-connected) handle is enough to test the validation layer.
    fn offline_conn() -> Connection {
        let (conn, _channels) = Connection::new(&Config::default(), Params::wide(), None);
        conn
    }

    fn point(ioa: u32) -> SinglePointInfo {
        SinglePointInfo { ioa, value: true, qds: QualityDescriptor::GOOD, time: None }
    }

    #[test]
    fn test_monitor_cause_validation() {
        let conn = offline_conn();

        // activation is a command cause, not a data cause
        let err = conn.send_single_points(
            TypeId::SinglePoint,
            false,
            Cot::new(Cause::Activation),
            1,
            vec![point(1)],
        );
        assert!(matches!(err, Err(Error::CommandCause)));

        // periodic is reserved for measured values
        let err = conn.send_single_points(
            TypeId::SinglePoint,
            false,
            Cot::new(Cause::Periodic),
            1,
            vec![point(1)],
        );
        assert!(matches!(err, Err(Error::CommandCause)));

        // spontaneous data on an offline handle passes validation and
        // fails at the transport layer instead
        let err = conn.send_single_points(
            TypeId::SinglePoint,
            false,
            Cot::new(Cause::Spontaneous),
            1,
            vec![point(1)],
        );
        assert!(matches!(err, Err(Error::UseClosedConnection)));
    }

    #[test]
    fn test_measured_values_permit_periodic() {
        let conn = offline_conn();
        let items = vec![MeasuredFloatInfo {
            ioa: 1,
            value: 1.0,
            qds: QualityDescriptor::GOOD,
            time: None,
        }];
        let err = conn.send_measured_floats(
            TypeId::MeasuredFloat,
            false,
            Cot::new(Cause::Periodic),
            1,
            items,
        );
        assert!(matches!(err, Err(Error::UseClosedConnection)));
    }

    #[test]
    fn test_counter_cause_validation() {
        let conn = offline_conn();
        let items = vec![IntegratedTotalsInfo {
            ioa: 1,
            value: Default::default(),
            time: None,
        }];
        let err = conn.send_integrated_totals(
            TypeId::IntegratedTotals,
            false,
            Cot::new(Cause::Background),
            1,
            items.clone(),
        );
        assert!(matches!(err, Err(Error::CommandCause)));

        let err = conn.send_integrated_totals(
            TypeId::IntegratedTotals,
            false,
            Cot::new(Cause::RequestedByGeneralCounter),
            1,
            items,
        );
        assert!(matches!(err, Err(Error::UseClosedConnection)));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let conn = offline_conn();
        let err = conn.send_single_points(
            TypeId::DoublePoint,
            false,
            Cot::new(Cause::Spontaneous),
            1,
            vec![point(1)],
        );
        assert!(matches!(err, Err(Error::TypeIdNotMatch(3))));

        let err = conn.single_cmd(
            TypeId::DoubleCommand,
            Cot::new(Cause::Activation),
            1,
            SingleCommandInfo { ioa: 1, value: true, qoc: Default::default(), time: None },
        );
        assert!(matches!(err, Err(Error::TypeIdNotMatch(46))));
    }

    #[test]
    fn test_command_cause_validation() {
        let conn = offline_conn();
        let err = conn.double_cmd(
            TypeId::DoubleCommand,
            Cot::new(Cause::Spontaneous),
            1,
            DoubleCommandInfo {
                ioa: 1,
                value: crate::types::DoubleCommandValue::On,
                qoc: Default::default(),
                time: None,
            },
        );
        assert!(matches!(err, Err(Error::CommandCause)));

        let err = conn.double_cmd(
            TypeId::DoubleCommand,
            Cot::new(Cause::Deactivation),
            1,
            DoubleCommandInfo {
                ioa: 1,
                value: crate::types::DoubleCommandValue::On,
                qoc: Default::default(),
                time: None,
            },
        );
        assert!(matches!(err, Err(Error::UseClosedConnection)));
    }
}
