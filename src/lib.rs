/*!
A platform agnostic Rust driver for the DA7280 LRA/ERM haptic driver, based on
the [`embedded-hal`] traits.

The driver owns the bus handle, so every register access for a device goes
through `&mut self`. When the interrupt handler runs in a different context
than the code that enables and disables the motor, put the driver behind the
platform's mutex and call [`Da7280::service_irq`] with the lock held.

[`embedded-hal`]: https://docs.rs/embedded-hal/~0.2
*/
#![cfg_attr(not(test), no_std)]

use embedded_hal::blocking::i2c::{Write, WriteRead};

pub mod config;
pub mod hwn;
pub mod registers;

#[cfg(test)]
mod fake;

pub use config::{
    ChipConfiguration, DeviceType, GpiControl, OperationMode, RawActuatorSettings,
    RawGpiTrigger, ResonantPeriod,
};
use config::SNP_MEM_SIZE;
use registers::*;

pub const ADDRESS: u8 = 0x4a;

/// Last commanded drive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveState {
    Off,
    On,
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrvError<E> {
    ConnectionError(E),
    /// The chip reported a warning while waveform memory was about to be
    /// rewritten.
    DeviceBusy,
    /// Waveform memory is write locked.
    AccessDenied,
    InvalidParameter,
    NotImplemented,
}

impl<E: core::fmt::Debug> core::fmt::Display for DrvError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DrvError::ConnectionError(e) => write!(f, "i2c error: {:?}", e),
            DrvError::DeviceBusy => f.write_str("device busy"),
            DrvError::AccessDenied => f.write_str("waveform memory is locked"),
            DrvError::InvalidParameter => f.write_str("invalid parameter"),
            DrvError::NotImplemented => f.write_str("not implemented"),
        }
    }
}

/// Interrupt events seen and acknowledged by [`Da7280::handle_irq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqReport {
    pub events: [u8; IRQ_EVENT_COUNT],
    pub actuator_fault: u8,
    /// The output was forced inactive to stop a fault from recurring.
    pub op_mode_cleared: bool,
}

impl IrqReport {
    pub fn event1(&self) -> IrqEvent1Reg {
        IrqEvent1Reg(self.events[0])
    }

    pub fn warning_diag(&self) -> WarningDiagReg {
        WarningDiagReg(self.events[1])
    }

    pub fn seq_diag(&self) -> SeqDiagReg {
        SeqDiagReg(self.events[2])
    }

    pub fn actuator_fault(&self) -> ActuatorFaultReg {
        ActuatorFaultReg(self.actuator_fault)
    }

    /// Any event or fault bit was set.
    pub fn is_pending(&self) -> bool {
        self.events.iter().any(|&b| b != 0) || self.actuator_fault != 0
    }
}

pub struct Da7280<I2C> {
    i2c: I2C,
    address: u8,
    config: ChipConfiguration,
    state: DriveState,
}

impl<I2C, E> Da7280<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    pub fn new(i2c: I2C, settings: &RawActuatorSettings) -> Self {
        Self::with_address(i2c, ADDRESS, settings)
    }

    pub fn with_address(i2c: I2C, address: u8, settings: &RawActuatorSettings) -> Self {
        Self {
            i2c,
            address,
            config: ChipConfiguration::from(settings),
            state: DriveState::Off,
        }
    }

    /// Translates `settings` and brings the chip into a known state.
    /// A failure here means the device is unusable.
    pub fn probe(i2c: I2C, settings: &RawActuatorSettings) -> Result<Self, DrvError<E>> {
        let mut haptic = Self::new(i2c, settings);
        haptic.init()?;
        Ok(haptic)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn config(&self) -> &ChipConfiguration {
        &self.config
    }

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn read(&mut self, register: Register) -> Result<u8, DrvError<E>> {
        let mut buf = [0u8; 1];
        self.read_block(register, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write(&mut self, register: Register, value: u8) -> Result<(), DrvError<E>> {
        self.i2c
            .write(self.address, &[register as u8, value])
            .map_err(DrvError::ConnectionError)
    }

    pub fn read_block(&mut self, register: Register, buf: &mut [u8]) -> Result<(), DrvError<E>> {
        self.i2c
            .write_read(self.address, &[register as u8], buf)
            .map_err(DrvError::ConnectionError)
    }

    /// Writes `data` to consecutive registers starting at `address`.
    /// At most one waveform memory image fits in a single transfer.
    pub fn write_block(&mut self, address: u8, data: &[u8]) -> Result<(), DrvError<E>> {
        if data.len() > SNP_MEM_SIZE {
            return Err(DrvError::InvalidParameter);
        }
        let mut buf = [0u8; SNP_MEM_SIZE + 1];
        buf[0] = address;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..=data.len()])
            .map_err(DrvError::ConnectionError)
    }

    /// Read-modify-write of the bits in `mask`. Nothing is written if the
    /// read fails.
    pub fn update_bits(&mut self, register: Register, mask: u8, value: u8) -> Result<(), DrvError<E>> {
        let current = self.read(register)?;
        self.write(register, (current & !mask) | (value & mask))
    }

    pub fn update_field(&mut self, field: Field, value: u8) -> Result<(), DrvError<E>> {
        self.update_bits(field.register, field.mask, field.value(value))
    }

    pub fn init(&mut self) -> Result<(), DrvError<E>> {
        let result = self.apply_config();
        #[cfg(feature = "defmt")]
        if result.is_err() {
            defmt::error!("da7280 init failed");
        }
        result
    }

    fn apply_config(&mut self) -> Result<(), DrvError<E>> {
        if self.config.dev_type == DeviceType::Unknown {
            let top_cfg1 = TopCfg1Reg(self.read(Register::TopCfg1)?);
            self.config.dev_type = if top_cfg1.actuator_type() {
                DeviceType::ErmCoin
            } else {
                DeviceType::Lra
            };
        }

        if self.config.dev_type == DeviceType::Lra {
            if let Some(period) = self.config.resonant_period {
                self.write(Register::FrqLraPerH, period.high)?;
                self.write(Register::FrqLraPerL, period.low)?;
            }
        } else if self.config.dev_type == DeviceType::ErmCoin {
            self.update_field(BEMF_FAULT_LIM, 0)?;

            let calib = TST_CALIB_IMPEDANCE_DIS.mask | V2I_FACTOR_FREEZE.mask;
            self.update_bits(Register::TopCfg4, calib, calib)?;

            // not supported by coin actuators
            self.config.acc_en = false;
            self.config.rapid_stop_en = false;
            self.config.amp_pid_en = false;
        }

        let mut top_cfg1 = TopCfg1Reg(0);
        top_cfg1.set_actuator_type(self.config.dev_type != DeviceType::Lra);
        top_cfg1.set_bemf_sense_en(self.config.bemf_sense_en);
        top_cfg1.set_freq_track_en(self.config.freq_track_en);
        top_cfg1.set_acceleration_en(self.config.acc_en);
        top_cfg1.set_rapid_stop_en(self.config.rapid_stop_en);
        top_cfg1.set_amp_pid_en(self.config.amp_pid_en);
        self.update_bits(Register::TopCfg1, TOP_CFG1_FEATURE_MASK, top_cfg1.0)?;

        let acc_en = self.config.acc_en;
        self.update_field(V2I_FACTOR_OFFSET_EN, acc_en as u8)?;
        self.update_field(MEM_DATA_SIGNED, !acc_en as u8)?;

        if let Some(nommax) = self.config.nommax {
            self.write(Register::Actuator1, nommax)?;
        }
        if let Some(absmax) = self.config.absmax {
            self.write(Register::Actuator2, absmax)?;
        }

        self.update_field(IMAX, self.config.imax)?;

        let [v2i_high, v2i_low] = self.config.v2i_factor().to_be_bytes();
        self.write(Register::CalibV2iL, v2i_low)?;
        self.write(Register::CalibV2iH, v2i_high)?;

        self.update_field(STANDBY_EN, 1)?;

        if self.config.mem_update {
            self.update_memory()?;
        }

        self.write(Register::SeqCtl2, self.config.seq_ctl2_value())?;

        for (register, gpi) in GPI_CTL.iter().zip(self.config.gpi_ctl) {
            self.write(*register, gpi.register_value())?;
        }

        // acknowledge anything latched before the masks change
        self.write(Register::IrqEvent1, 0xff)?;

        self.update_bits(
            Register::IrqMask1,
            SEQ_FAULT_M.mask | SEQ_DONE_M.mask,
            0,
        )?;
        self.update_field(ADC_SAT_M, 0)?;

        for (register, value) in TUNING.iter() {
            self.write(*register, *value)?;
        }

        self.state = DriveState::Off;
        Ok(())
    }

    /// Starts driving the actuator in DRO mode at `level` percent of the
    /// nominal voltage. Does nothing when already on.
    pub fn enable(&mut self, level: u32) -> Result<(), DrvError<E>> {
        if self.state == DriveState::On {
            #[cfg(feature = "defmt")]
            defmt::warn!("da7280 already enabled");
            return Ok(());
        }

        // acceleration mode reserves the top bit
        let ceiling = if self.config.acc_en { 0x7f } else { 0xff };
        let drive = (level.saturating_mul(0xff) / 100).min(ceiling) as u8;

        self.write(Register::TopCtl2, drive)?;
        self.update_field(OPERATION_MODE, OperationMode::Dro as u8)?;

        self.state = DriveState::On;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<(), DrvError<E>> {
        if self.state == DriveState::Off {
            return Ok(());
        }

        self.update_field(OPERATION_MODE, OperationMode::Inactive as u8)?;
        self.write(Register::TopCtl2, 0)?;

        self.state = DriveState::Off;
        Ok(())
    }

    /// Stops the actuator and leaves standby. A failure to stop is returned
    /// without touching standby.
    pub fn suspend(&mut self) -> Result<(), DrvError<E>> {
        self.disable()?;
        self.update_field(STANDBY_EN, 0)
    }

    /// Re-enters standby. The drive state stays off until the next
    /// [`Da7280::enable`].
    pub fn resume(&mut self) -> Result<(), DrvError<E>> {
        self.update_field(STANDBY_EN, 1)
    }

    /// Uploads the configured waveform image into pattern memory.
    ///
    /// The chip must report no warning and its memory lock must be released,
    /// otherwise `DeviceBusy` or `AccessDenied` is returned before anything is
    /// written. The output is forced inactive before the upload. A start
    /// address outside waveform memory fails with `InvalidParameter` and
    /// nothing is uploaded.
    pub fn update_memory(&mut self) -> Result<(), DrvError<E>> {
        let status = Status1Reg(self.read(Register::IrqStatus1)?);
        if status.sta_warning() {
            #[cfg(feature = "defmt")]
            defmt::error!("da7280 reports a warning, not touching waveform memory");
            return Err(DrvError::DeviceBusy);
        }

        let mem_ctl2 = MemCtl2Reg(self.read(Register::MemCtl2)?);
        if !mem_ctl2.wav_mem_lock() {
            #[cfg(feature = "defmt")]
            defmt::error!("da7280 waveform memory is locked");
            return Err(DrvError::AccessDenied);
        }

        self.update_field(OPERATION_MODE, OperationMode::Inactive as u8)?;

        let start = self.read(Register::MemCtl1)?;
        if start < Register::SnpMem0 as u8 || start > Register::SnpMem99 as u8 {
            #[cfg(feature = "defmt")]
            defmt::error!("da7280 reports waveform memory start {=u8:#x}", start);
            return Err(DrvError::InvalidParameter);
        }
        let len = (Register::SnpMem99 as u8 - start) as usize + 1;
        let image = self.config.snp_mem;
        self.write_block(start, &image[..len])
    }

    /// Reads, acknowledges and reacts to pending interrupt events.
    ///
    /// Sequencer faults and ADC saturation force the output inactive, since
    /// the fault would otherwise re-trigger as soon as it is cleared.
    pub fn handle_irq(&mut self) -> Result<IrqReport, DrvError<E>> {
        let mut report = IrqReport::default();
        self.read_block(Register::IrqEvent1, &mut report.events)?;
        report.actuator_fault = self.read(Register::IrqEventActuatorFault)?;

        let event1 = report.event1();
        let mut op_mode_clear = false;

        if report.events[0] != 0 {
            self.write(Register::IrqEvent1, report.events[0])?;
        }

        if report.actuator_fault != 0 {
            self.write(Register::IrqEventActuatorFault, report.actuator_fault)?;
            if report.actuator_fault().adc_sat_fault() {
                #[cfg(feature = "defmt")]
                defmt::error!("da7280 ADC saturated, check that the actuator is connected");
                op_mode_clear = true;
            }
        }

        if event1.e_seq_fault() {
            #[cfg(feature = "defmt")]
            defmt::error!("da7280 sequence fault");
            op_mode_clear = true;

            let _diag = report.seq_diag();
            #[cfg(feature = "defmt")]
            {
                if _diag.e_seq_id_fault() {
                    defmt::info!("reload PS_SEQ_ID and waveform memory");
                }
                if _diag.e_mem_fault() {
                    defmt::info!("reload waveform memory");
                }
                if _diag.e_pwm_fault() {
                    defmt::info!("restart the PWM interface");
                }
            }
        }

        if event1.e_warning() {
            let _diag = report.warning_diag();
            #[cfg(feature = "defmt")]
            {
                if _diag.e_lim_drive() || _diag.e_lim_drive_acc() {
                    defmt::warn!("reduce the drive level");
                }
                if _diag.e_lim_drive_acc() {
                    defmt::warn!("check the waveform memory data format");
                }
            }
        }

        #[cfg(feature = "defmt")]
        if event1.e_seq_done() {
            defmt::info!("da7280 sequence done");
        }

        if op_mode_clear {
            self.update_field(OPERATION_MODE, OperationMode::Inactive as u8)?;
            self.state = DriveState::Off;
            report.op_mode_cleared = true;
        }

        Ok(report)
    }
}

impl<I2C, E> Da7280<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    E: core::fmt::Debug,
{
    /// Interrupt entry point. Returns whether the chip had any event or fault
    /// pending, so it can serve as the handled flag of a shared line.
    ///
    /// Failures are logged and dropped since nobody is waiting on the result,
    /// and count as not handled. A failure before the corrective mode clear
    /// leaves the output as it was.
    pub fn service_irq(&mut self) -> bool {
        match self.handle_irq() {
            Ok(report) => report.is_pending(),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::error!("da7280 irq handling failed: {}", defmt::Debug2Format(&_e));
                false
            }
        }
    }
}
