//! Actuator settings and their translation into register-ready values.
//!
//! [`RawActuatorSettings`] mirrors what a board description or persisted
//! configuration provides and is not trusted. [`ChipConfiguration`] holds the
//! same information after every field has been range checked and encoded,
//! so nothing written to the chip during init can be out of range.

use crate::registers::{GpiCtlReg, SeqCtl2Reg, IMAX};

/// Size of the waveform (pattern) memory in bytes.
pub const SNP_MEM_SIZE: usize = 100;

pub const VOLTAGE_RATE_MAX: u32 = 6_000_000;
/// One LSB of ACTUATOR1/ACTUATOR2 in µV.
pub const VOLTAGE_RATE_STEP: u32 = 23_400;

pub const IMAX_LIMIT: u32 = 252_000;
/// One LSB of IMAX in µA.
pub const IMAX_STEP: u32 = 7_200;
/// Current at IMAX index 0, in µA.
pub const IMAX_BASE: u32 = 28_600;
pub const IMAX_DEFAULT: u8 = 0x0e;

pub const IMPD_MAX: u32 = 1_500_000_000;
pub const IMPD_DEFAULT: u32 = 22_000_000;

/// Exclusive bounds; a frequency equal to either one falls back to the
/// default period.
pub const MIN_RESONANT_FREQ_HZ: u32 = 50;
pub const MAX_RESONANT_FREQ_HZ: u32 = 300;
pub const RESONANT_FREQ_H_DEFAULT: u8 = 0x39;
pub const RESONANT_FREQ_L_DEFAULT: u8 = 0x32;

pub const SEQ_ID_MAX: u32 = 15;
pub const SEQ_LOOP_MAX: u32 = 15;
/// GPI `n` defaults to sequence `GPI_SEQ_ID_DEFAULT + n`.
pub const GPI_SEQ_ID_DEFAULT: u8 = 0;
pub const GPI_MODE_MAX: u32 = 1;
pub const GPI_POLARITY_MAX: u32 = 2;

pub const SEQ_ID_DURATION_MAX: u32 = 1_000_000;

pub const GPI_COUNT: usize = 3;
pub const SEQUENCE_COUNT: usize = 16;

/// Fixed point factor turning Hz into the chip's period unit (1.33332 µs).
const PERIOD_SCALE: u32 = 133_332;
const V2I_DIVISOR: u64 = 1_610_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceType {
    /// Linear resonant actuator
    Lra = 0,
    /// Eccentric rotating mass, bar form factor
    ErmBar = 1,
    /// Eccentric rotating mass, coin form factor
    ErmCoin = 2,
    /// Not configured. Resolved during init from the actuator type the
    /// chip was strapped with.
    Unknown = 3,
}

impl From<u32> for DeviceType {
    fn from(val: u32) -> DeviceType {
        match val {
            0 => DeviceType::Lra,
            1 => DeviceType::ErmBar,
            2 => DeviceType::ErmCoin,
            _ => DeviceType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    /// Output stage off.
    Inactive = 0,
    /// Direct register override: the drive level comes from TOP_CTL2.
    Dro = 1,
    /// Drive level follows the duty cycle on the GPI0/PWM pin.
    Pwm = 2,
    /// Register triggered waveform memory playback.
    Rtwm = 3,
    /// Edge triggered waveform memory playback via the GPI pins.
    Etwm = 4,
}

impl OperationMode {
    /// Accepts 1 through 4. Anything else, `Inactive` included, selects
    /// [`OperationMode::Dro`].
    pub fn from_raw(val: u32) -> OperationMode {
        match val {
            2 => OperationMode::Pwm,
            3 => OperationMode::Rtwm,
            4 => OperationMode::Etwm,
            _ => OperationMode::Dro,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawGpiTrigger {
    pub seq_id: u32,
    pub mode: u32,
    pub polarity: u32,
}

/// Actuator description as provided by the platform. Values are in physical
/// units and unvalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawActuatorSettings {
    pub actuator_type: u32,
    pub operation_mode: u32,
    pub nominal_microvolt: u32,
    pub absolute_max_microvolt: u32,
    pub imax_microamp: u32,
    pub impedance_micro_ohms: u32,
    pub resonant_frequency_hz: u32,
    pub ps_seq_id: u32,
    pub ps_seq_loop: u32,
    pub gpi: [RawGpiTrigger; GPI_COUNT],
    pub seq_id_durations: [u32; SEQUENCE_COUNT],
    /// The flags below are enabled only by a value of exactly 1.
    pub bemf_sense_enable: u32,
    pub freq_track_enable: u32,
    pub acc_enable: u32,
    pub rapid_stop_enable: u32,
    pub amp_pid_enable: u32,
    pub memory: [u8; SNP_MEM_SIZE],
}

/// Waveform memory image shipped with the reference LRA.
pub const DEFAULT_MEMORY: [u8; SNP_MEM_SIZE] = [
    0x06, 0x08, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x1c, 0x2a, //
    0x33, 0x3c, 0x42, 0x4b, 0x4c, 0x4e, 0x17, 0x19, 0x27, 0x29, //
    0x17, 0x19, 0x03, 0x84, 0x5e, 0x04, 0x08, 0x84, 0x5d, 0x01, //
    0x84, 0x5e, 0x02, 0x00, 0xa4, 0x5d, 0x03, 0x84, 0x5e, 0x06, //
    0x08, 0x84, 0x5d, 0x05, 0x84, 0x5d, 0x06, 0x84, 0x5e, 0x08, //
    0x84, 0x5e, 0x05, 0x8c, 0x5e, 0x24, 0x84, 0x5f, 0x10, 0x84, //
    0x5e, 0x05, 0x84, 0x5e, 0x08, 0x84, 0x5f, 0x01, 0x8c, 0x5e, //
    0x04, 0x84, 0x5e, 0x08, 0x84, 0x5f, 0x11, 0x19, 0x88, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
];

impl Default for RawActuatorSettings {
    /// The reference LRA: 190 Hz, 2 V, 129 mA, 14.3 Ω, closed loop.
    fn default() -> Self {
        let mut seq_id_durations = [0; SEQUENCE_COUNT];
        seq_id_durations[..6].copy_from_slice(&[76_160, 146_880, 65_280, 125_120, 54_400, 81_600]);

        Self {
            actuator_type: DeviceType::Lra as u32,
            operation_mode: OperationMode::Dro as u32,
            nominal_microvolt: 2_000_000,
            absolute_max_microvolt: 2_000_000,
            imax_microamp: 129_000,
            impedance_micro_ohms: 14_300_000,
            resonant_frequency_hz: 190,
            ps_seq_id: 0,
            ps_seq_loop: 0,
            gpi: [
                RawGpiTrigger {
                    seq_id: 0,
                    ..Default::default()
                },
                RawGpiTrigger {
                    seq_id: 1,
                    ..Default::default()
                },
                RawGpiTrigger {
                    seq_id: 2,
                    ..Default::default()
                },
            ],
            seq_id_durations,
            bemf_sense_enable: 1,
            freq_track_enable: 1,
            acc_enable: 0,
            rapid_stop_enable: 0,
            amp_pid_enable: 0,
            memory: DEFAULT_MEMORY,
        }
    }
}

/// FRQ_LRA_PER_H / FRQ_LRA_PER_L pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResonantPeriod {
    pub high: u8,
    pub low: u8,
}

impl Default for ResonantPeriod {
    fn default() -> Self {
        Self {
            high: RESONANT_FREQ_H_DEFAULT,
            low: RESONANT_FREQ_L_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpiControl {
    pub seq_id: u8,
    pub mode: u8,
    pub polarity: u8,
}

impl GpiControl {
    pub fn register_value(&self) -> u8 {
        let mut reg = GpiCtlReg(0);
        reg.set_sequence_id(self.seq_id);
        reg.set_mode(self.mode != 0);
        reg.set_polarity(self.polarity);
        reg.0
    }
}

/// Validated, register-encoded actuator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipConfiguration {
    pub dev_type: DeviceType,
    pub op_mode: OperationMode,
    /// `None` leaves the chip's own value in place.
    pub nommax: Option<u8>,
    /// `None` leaves the chip's own value in place.
    pub absmax: Option<u8>,
    pub imax: u8,
    pub impd: u32,
    /// `None` leaves the chip's own value in place.
    pub resonant_period: Option<ResonantPeriod>,
    pub ps_seq_id: u8,
    pub ps_seq_loop: u8,
    pub gpi_ctl: [GpiControl; GPI_COUNT],
    pub seq_id_dur: [u32; SEQUENCE_COUNT],
    pub bemf_sense_en: bool,
    pub freq_track_en: bool,
    pub acc_en: bool,
    pub rapid_stop_en: bool,
    pub amp_pid_en: bool,
    /// Set when `snp_mem` holds anything, in which case init uploads it.
    pub mem_update: bool,
    pub snp_mem: [u8; SNP_MEM_SIZE],
}

impl ChipConfiguration {
    /// Voltage to current calibration factor for CALIB_V2I_H/L.
    pub fn v2i_factor(&self) -> u16 {
        let factor = u64::from(self.impd) * (u64::from(self.imax) + 4) / V2I_DIVISOR;
        factor.min(u64::from(u16::MAX)) as u16
    }

    pub fn seq_ctl2_value(&self) -> u8 {
        let mut reg = SeqCtl2Reg(0);
        reg.set_ps_seq_id(self.ps_seq_id);
        reg.set_ps_seq_loop(self.ps_seq_loop);
        reg.0
    }
}

impl From<&RawActuatorSettings> for ChipConfiguration {
    fn from(raw: &RawActuatorSettings) -> Self {
        parse_properties(raw)
    }
}

/// Encodes a voltage for ACTUATOR1/ACTUATOR2, saturating at 0xff.
/// Voltages at or above [`VOLTAGE_RATE_MAX`] yield `None`.
pub fn volt_rating(microvolt: u32) -> Option<u8> {
    if microvolt < VOLTAGE_RATE_MAX {
        Some((microvolt / VOLTAGE_RATE_STEP + 1).min(0xff) as u8)
    } else {
        None
    }
}

/// Encodes a current limit as an IMAX index.
pub fn imax_index(microamp: u32) -> u8 {
    if microamp < IMAX_LIMIT {
        let index = microamp.saturating_sub(IMAX_BASE) / IMAX_STEP + 1;
        index.min(u32::from(IMAX.mask)) as u8
    } else {
        IMAX_DEFAULT
    }
}

pub fn impedance(micro_ohms: u32) -> u32 {
    if micro_ohms <= IMPD_MAX {
        micro_ohms
    } else {
        IMPD_DEFAULT
    }
}

/// Converts a resonant frequency into the chip's period registers.
/// Frequencies outside the open interval (50 Hz, 300 Hz) use the default.
pub fn resonant_period(hz: u32) -> ResonantPeriod {
    if hz > MIN_RESONANT_FREQ_HZ && hz < MAX_RESONANT_FREQ_HZ {
        let period = 1_000_000_000 / (hz * PERIOD_SCALE / 100);
        ResonantPeriod {
            high: ((period >> 7) & 0xff) as u8,
            low: ((period & 0x7f) as u8).wrapping_sub(1),
        }
    } else {
        ResonantPeriod::default()
    }
}

fn bounded(val: u32, max: u32, fallback: u8) -> u8 {
    if val <= max {
        val as u8
    } else {
        fallback
    }
}

fn duration(val: u32) -> u32 {
    if val <= SEQ_ID_DURATION_MAX {
        val
    } else {
        0
    }
}

pub fn parse_properties(raw: &RawActuatorSettings) -> ChipConfiguration {
    let mut gpi_ctl = [GpiControl::default(); GPI_COUNT];
    for (i, (ctl, trigger)) in gpi_ctl.iter_mut().zip(raw.gpi.iter()).enumerate() {
        *ctl = GpiControl {
            seq_id: bounded(trigger.seq_id, SEQ_ID_MAX, GPI_SEQ_ID_DEFAULT + i as u8),
            mode: bounded(trigger.mode, GPI_MODE_MAX, 0),
            polarity: bounded(trigger.polarity, GPI_POLARITY_MAX, 0),
        };
    }

    let mut seq_id_dur = [0; SEQUENCE_COUNT];
    for (dur, raw_dur) in seq_id_dur.iter_mut().zip(raw.seq_id_durations.iter()) {
        *dur = duration(*raw_dur);
    }

    ChipConfiguration {
        dev_type: DeviceType::from(raw.actuator_type),
        op_mode: OperationMode::from_raw(raw.operation_mode),
        nommax: volt_rating(raw.nominal_microvolt),
        absmax: volt_rating(raw.absolute_max_microvolt),
        imax: imax_index(raw.imax_microamp),
        impd: impedance(raw.impedance_micro_ohms),
        resonant_period: Some(resonant_period(raw.resonant_frequency_hz)),
        ps_seq_id: bounded(raw.ps_seq_id, SEQ_ID_MAX, 0),
        ps_seq_loop: bounded(raw.ps_seq_loop, SEQ_LOOP_MAX, 0),
        gpi_ctl,
        seq_id_dur,
        bemf_sense_en: raw.bemf_sense_enable == 1,
        freq_track_en: raw.freq_track_enable == 1,
        acc_en: raw.acc_enable == 1,
        rapid_stop_en: raw.rapid_stop_enable == 1,
        amp_pid_en: raw.amp_pid_enable == 1,
        mem_update: raw.memory.iter().any(|&b| b != 0),
        snp_mem: raw.memory,
    }
}
