use bitfield::bitfield;

bitfield! {
    /// Latched interrupt events. Each bit is cleared by writing it back as 1.
    pub struct IrqEvent1Reg(u8);
    impl Debug;
    /// Over-current fault on the output stage.
    pub e_oc_fault, set_e_oc_fault: 7;
    /// Actuator fault, details in IRQ_EVENT_ACTUATOR_FAULT.
    pub e_actuator_fault, set_e_actuator_fault: 6;
    /// A warning condition occurred, details in IRQ_EVENT_WARNING_DIAG.
    pub e_warning, set_e_warning: 5;
    /// The sequencer faulted, details in IRQ_EVENT_SEQ_DIAG.
    pub e_seq_fault, set_e_seq_fault: 4;
    /// Critical over-temperature shutdown.
    pub e_overtemp_crit, set_e_overtemp_crit: 3;
    /// The sequencer finished playing a pattern.
    pub e_seq_done, set_e_seq_done: 2;
    /// Supply under-voltage lockout.
    pub e_uvlo, set_e_uvlo: 1;
    /// The sequencer continued to the next pattern.
    pub e_seq_continue, set_e_seq_continue: 0;
}

bitfield! {
    pub struct WarningDiagReg(u8);
    impl Debug;
    /// The requested drive level was limited.
    pub e_lim_drive, set_e_lim_drive: 7;
    /// The requested drive level was limited while acceleration mode is on.
    /// Usually means the waveform memory is in the wrong data format.
    pub e_lim_drive_acc, set_e_lim_drive_acc: 6;
    pub e_mem_type, set_e_mem_type: 4;
    pub e_overtemp_warn, set_e_overtemp_warn: 3;
}

bitfield! {
    pub struct SeqDiagReg(u8);
    impl Debug;
    /// PS_SEQ_ID points outside the loaded waveform memory.
    pub e_seq_id_fault, set_e_seq_id_fault: 7;
    /// Waveform memory contents are invalid.
    pub e_mem_fault, set_e_mem_fault: 6;
    /// PWM input is missing or out of range.
    pub e_pwm_fault, set_e_pwm_fault: 5;
}

bitfield! {
    pub struct ActuatorFaultReg(u8);
    impl Debug;
    /// The back-EMF ADC saturated. Typically the actuator is disconnected.
    pub adc_sat_fault, set_adc_sat_fault: 2;
}

bitfield! {
    /// Live (non latching) status, same layout as `IrqEvent1Reg`.
    pub struct Status1Reg(u8);
    impl Debug;
    pub sta_oc, _: 7;
    pub sta_actuator, _: 6;
    pub sta_warning, _: 5;
    pub sta_seq_fault, _: 4;
    pub sta_overtemp_crit, _: 3;
    pub sta_seq_done, _: 2;
    pub sta_uvlo_vbat_ok, _: 1;
    pub sta_seq_continue, _: 0;
}

bitfield! {
    pub struct MemCtl2Reg(u8);
    impl Debug;
    /// Must read back as 1 before the waveform memory accepts writes.
    pub wav_mem_lock, set_wav_mem_lock: 7;
}

bitfield! {
    pub struct TopCfg1Reg(u8);
    impl Debug;
    /// 0: LRA
    /// 1: ERM (bar or coin)
    pub actuator_type, set_actuator_type: 5;
    /// Back-EMF sensing, needed for closed loop operation.
    pub bemf_sense_en, set_bemf_sense_en: 4;
    /// LRA resonant frequency tracking.
    pub freq_track_en, set_freq_track_en: 3;
    /// Acceleration mode. The drive level loses its top bit when set.
    pub acceleration_en, set_acceleration_en: 2;
    pub rapid_stop_en, set_rapid_stop_en: 1;
    pub amp_pid_en, set_amp_pid_en: 0;
}

bitfield! {
    /// Pattern sequence selected for register-triggered playback.
    pub struct SeqCtl2Reg(u8);
    impl Debug;
    /// Number of times the sequence repeats.
    pub ps_seq_loop, set_ps_seq_loop: 7, 4;
    /// Index of the sequence in waveform memory.
    pub ps_seq_id, set_ps_seq_id: 3, 0;
}

bitfield! {
    /// Layout shared by GPI_0_CTL, GPI_1_CTL and GPI_2_CTL.
    pub struct GpiCtlReg(u8);
    impl Debug;
    pub sequence_id, set_sequence_id: 6, 3;
    /// 0: single pattern
    /// 1: multi pattern
    pub mode, set_mode: 2;
    /// 0: rising edge
    /// 1: falling edge
    /// 2: both edges
    pub polarity, set_polarity: 1, 0;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    IrqEvent1 = 0x03,
    IrqEventWarningDiag = 0x04,
    IrqEventSeqDiag = 0x05,
    IrqStatus1 = 0x06,
    IrqMask1 = 0x07,

    /// LRA resonant period, high 8 bits.
    FrqLraPerH = 0x0a,
    /// LRA resonant period, low 7 bits.
    FrqLraPerL = 0x0b,

    /// Nominal maximum drive voltage, 23.4 mV per LSB.
    Actuator1 = 0x0c,
    /// Absolute maximum drive voltage, 23.4 mV per LSB.
    Actuator2 = 0x0d,
    Actuator3 = 0x0e,

    CalibV2iH = 0x0f,
    CalibV2iL = 0x10,

    TopCfg1 = 0x13,
    TopCfg2 = 0x14,
    TopCfg4 = 0x16,
    TopIntCfg1 = 0x17,
    TopIntCfg6H = 0x1c,
    TopIntCfg6L = 0x1d,
    TopIntCfg7H = 0x1e,
    TopIntCfg7L = 0x1f,
    TopIntCfg8 = 0x20,

    TopCtl1 = 0x22,
    /// Drive level used in DRO mode, as a fraction of the nominal voltage.
    TopCtl2 = 0x23,

    SeqCtl2 = 0x28,
    Gpi0Ctl = 0x29,
    Gpi1Ctl = 0x2a,
    Gpi2Ctl = 0x2b,

    /// Reads back the first writable address of waveform memory.
    MemCtl1 = 0x2c,
    MemCtl2 = 0x2d,

    FrqCtl = 0x4c,
    Trim3 = 0x5f,
    Trim4 = 0x60,
    TopCfg5 = 0x6e,

    IrqEventActuatorFault = 0x81,
    IrqMask2 = 0x83,

    SnpMem0 = 0x84,
    SnpMem99 = 0xe7,
}

/// Control registers of GPI 0 through 2.
pub const GPI_CTL: [Register; crate::config::GPI_COUNT] =
    [Register::Gpi0Ctl, Register::Gpi1Ctl, Register::Gpi2Ctl];

impl Register {
    /// Power-on value for registers whose contents the driver may choose to
    /// leave alone.
    pub fn reset_value(self) -> Option<u8> {
        match self {
            Register::FrqLraPerH => Some(0x39),
            Register::FrqLraPerL => Some(0x32),
            Register::Actuator1 => Some(0x6b),
            Register::Actuator2 => Some(0x78),
            Register::Actuator3 => Some(0x0e),
            _ => None,
        }
    }
}

/// Number of consecutive event registers starting at `IrqEvent1`.
pub const IRQ_EVENT_COUNT: usize = 3;

/// A bit field within a single register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub register: Register,
    pub mask: u8,
    pub shift: u8,
}

impl Field {
    const fn new(name: &'static str, register: Register, mask: u8, shift: u8) -> Self {
        Self {
            name,
            register,
            mask,
            shift,
        }
    }

    /// Positions `value` within the field, dropping bits that do not fit.
    pub const fn value(&self, value: u8) -> u8 {
        (value << self.shift) & self.mask
    }

    /// Extracts the field from a full register value.
    pub const fn get(&self, register_value: u8) -> u8 {
        (register_value & self.mask) >> self.shift
    }
}

pub const OPERATION_MODE: Field = Field::new("OPERATION_MODE", Register::TopCtl1, 0x07, 0);
pub const STANDBY_EN: Field = Field::new("STANDBY_EN", Register::TopCtl1, 0x08, 3);

pub const AMP_PID_EN: Field = Field::new("AMP_PID_EN", Register::TopCfg1, 0x01, 0);
pub const RAPID_STOP_EN: Field = Field::new("RAPID_STOP_EN", Register::TopCfg1, 0x02, 1);
pub const ACCELERATION_EN: Field = Field::new("ACCELERATION_EN", Register::TopCfg1, 0x04, 2);
pub const FREQ_TRACK_EN: Field = Field::new("FREQ_TRACK_EN", Register::TopCfg1, 0x08, 3);
pub const BEMF_SENSE_EN: Field = Field::new("BEMF_SENSE_EN", Register::TopCfg1, 0x10, 4);
pub const ACTUATOR_TYPE: Field = Field::new("ACTUATOR_TYPE", Register::TopCfg1, 0x20, 5);

pub const MEM_DATA_SIGNED: Field = Field::new("MEM_DATA_SIGNED", Register::TopCfg2, 0x10, 4);

pub const TST_CALIB_IMPEDANCE_DIS: Field =
    Field::new("TST_CALIB_IMPEDANCE_DIS", Register::TopCfg4, 0x40, 6);
pub const V2I_FACTOR_FREEZE: Field = Field::new("V2I_FACTOR_FREEZE", Register::TopCfg4, 0x80, 7);

pub const BEMF_FAULT_LIM: Field = Field::new("BEMF_FAULT_LIM", Register::TopIntCfg1, 0x03, 0);

pub const IMAX: Field = Field::new("IMAX", Register::Actuator3, 0x1f, 0);

pub const PS_SEQ_ID: Field = Field::new("PS_SEQ_ID", Register::SeqCtl2, 0x0f, 0);
pub const PS_SEQ_LOOP: Field = Field::new("PS_SEQ_LOOP", Register::SeqCtl2, 0xf0, 4);

pub const GPI_POLARITY: Field = Field::new("GPI_POLARITY", Register::Gpi0Ctl, 0x03, 0);
pub const GPI_MODE: Field = Field::new("GPI_MODE", Register::Gpi0Ctl, 0x04, 2);
pub const GPI_SEQUENCE_ID: Field = Field::new("GPI_SEQUENCE_ID", Register::Gpi0Ctl, 0x78, 3);

pub const WAV_MEM_LOCK: Field = Field::new("WAV_MEM_LOCK", Register::MemCtl2, 0x80, 7);

pub const V2I_FACTOR_OFFSET_EN: Field =
    Field::new("V2I_FACTOR_OFFSET_EN", Register::TopCfg5, 0x01, 0);

pub const SEQ_DONE_M: Field = Field::new("SEQ_DONE_M", Register::IrqMask1, 0x04, 2);
pub const SEQ_FAULT_M: Field = Field::new("SEQ_FAULT_M", Register::IrqMask1, 0x10, 4);
pub const ADC_SAT_M: Field = Field::new("ADC_SAT_M", Register::IrqMask2, 0x01, 0);

pub const STA_WARNING: Field = Field::new("STA_WARNING", Register::IrqStatus1, 0x20, 5);

/// Every field the driver touches.
pub const FIELDS: &[Field] = &[
    OPERATION_MODE,
    STANDBY_EN,
    AMP_PID_EN,
    RAPID_STOP_EN,
    ACCELERATION_EN,
    FREQ_TRACK_EN,
    BEMF_SENSE_EN,
    ACTUATOR_TYPE,
    MEM_DATA_SIGNED,
    TST_CALIB_IMPEDANCE_DIS,
    V2I_FACTOR_FREEZE,
    BEMF_FAULT_LIM,
    IMAX,
    PS_SEQ_ID,
    PS_SEQ_LOOP,
    GPI_POLARITY,
    GPI_MODE,
    GPI_SEQUENCE_ID,
    WAV_MEM_LOCK,
    V2I_FACTOR_OFFSET_EN,
    SEQ_DONE_M,
    SEQ_FAULT_M,
    ADC_SAT_M,
    STA_WARNING,
];

/// TOP_CFG1 bits written in one go during init.
pub const TOP_CFG1_FEATURE_MASK: u8 = ACTUATOR_TYPE.mask
    | BEMF_SENSE_EN.mask
    | FREQ_TRACK_EN.mask
    | ACCELERATION_EN.mask
    | RAPID_STOP_EN.mask
    | AMP_PID_EN.mask;

/// Vendor tuning for the reference LRA. Written verbatim at the end of init.
pub const TUNING: [(Register, u8); 10] = [
    (Register::TopIntCfg1, 0xcc),
    (Register::TopIntCfg6H, 0x05),
    (Register::TopIntCfg6L, 0x14),
    (Register::TopIntCfg7H, 0x02),
    (Register::TopIntCfg7L, 0x94),
    (Register::TopIntCfg8, 0x73),
    (Register::Trim4, 0x9c),
    (Register::FrqCtl, 0x02),
    (Register::Trim3, 0x0e),
    (Register::TopCfg4, 0x00),
];
