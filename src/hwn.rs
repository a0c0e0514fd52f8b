//! Hardware notification (HWN) state requests.
//!
//! A host describes the desired vibrator state with [`HwnSettings`]. The
//! driver applies it to the motor and remembers the last accepted request per
//! device id in a [`StateCache`], so it can be reported back later.

use embedded_hal::blocking::i2c::{Write, WriteRead};
use heapless::Vec;

use crate::{Da7280, DrvError};

/// Devices behind one driver instance.
pub const HWN_DEVICE_COUNT: u32 = 1;

/// Stored in `mte_reserved` of every cached entry.
pub const MTE_NOT_SUPPORTED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwnState {
    Off,
    On,
    Blink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwnType {
    Led,
    Vibrator,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HwnSettings {
    pub id: u32,
    pub hwn_type: HwnType,
    pub state: HwnState,
    /// Drive level in percent, used when `state` is `On`.
    pub intensity: u32,
    pub period: u32,
    pub duty_cycle: u32,
    pub cycle_count: u32,
    pub cycle_granularity: u32,
    pub mte_reserved: u32,
}

impl HwnSettings {
    /// An idle vibrator entry.
    pub fn vibrator(id: u32) -> Self {
        Self {
            id,
            hwn_type: HwnType::Vibrator,
            state: HwnState::Off,
            intensity: 0,
            period: 0,
            duty_cycle: 0,
            cycle_count: 0,
            cycle_granularity: 0,
            mte_reserved: MTE_NOT_SUPPORTED,
        }
    }
}

impl Default for HwnSettings {
    fn default() -> Self {
        Self::vibrator(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CacheError {
    /// No entry for the requested id.
    UnknownId,
    /// Every slot is taken by another id.
    Full,
}

impl<E> From<CacheError> for DrvError<E> {
    fn from(_: CacheError) -> Self {
        DrvError::InvalidParameter
    }
}

/// Last accepted request per device id, holding at most `N` ids.
#[derive(Debug, Default)]
pub struct StateCache<const N: usize> {
    entries: Vec<HwnSettings, N>,
}

impl<const N: usize> StateCache<N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the stored entry for `id`. An empty cache is first seeded with
    /// an idle vibrator at id 0.
    pub fn get_state(&mut self, id: u32) -> Result<HwnSettings, CacheError> {
        if self.entries.is_empty() {
            self.entries
                .push(HwnSettings::default())
                .map_err(|_| CacheError::Full)?;
        }
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .copied()
            .ok_or(CacheError::UnknownId)
    }

    /// Inserts or replaces the entry for `settings.id`.
    pub fn store(&mut self, settings: HwnSettings) -> Result<(), CacheError> {
        match self.entries.iter_mut().find(|entry| entry.id == settings.id) {
            Some(entry) => *entry = settings,
            None => self
                .entries
                .push(settings)
                .map_err(|_| CacheError::Full)?,
        }
        Ok(())
    }
}

impl<I2C, E> Da7280<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Drives the motor to match `settings` and records the request.
    ///
    /// Nothing is cached when the id is out of range or the motor could not
    /// be switched.
    pub fn set_state<const N: usize>(
        &mut self,
        cache: &mut StateCache<N>,
        mut settings: HwnSettings,
    ) -> Result<(), DrvError<E>> {
        if settings.id >= HWN_DEVICE_COUNT {
            return Err(DrvError::InvalidParameter);
        }

        match settings.state {
            HwnState::Off => self.disable()?,
            HwnState::On => self.enable(settings.intensity)?,
            HwnState::Blink => return Err(DrvError::NotImplemented),
        }

        settings.cycle_granularity = 0;
        settings.mte_reserved = MTE_NOT_SUPPORTED;
        cache.store(settings)?;
        Ok(())
    }

    /// Applies each request in order, stopping at the first failure.
    pub fn set_states<const N: usize>(
        &mut self,
        cache: &mut StateCache<N>,
        requests: &[HwnSettings],
    ) -> Result<(), DrvError<E>> {
        for settings in requests {
            self.set_state(cache, *settings)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Register;
    use crate::{DriveState, RawActuatorSettings, ADDRESS};
    use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    fn driver(expectations: &[I2cTransaction]) -> Da7280<I2cMock> {
        Da7280::new(I2cMock::new(expectations), &RawActuatorSettings::default())
    }

    fn on(intensity: u32) -> HwnSettings {
        HwnSettings {
            state: HwnState::On,
            intensity,
            cycle_granularity: 7,
            mte_reserved: 3,
            ..HwnSettings::vibrator(0)
        }
    }

    #[test]
    fn empty_cache_reports_idle_vibrator() {
        let mut cache = StateCache::<4>::new();
        let state = cache.get_state(0).unwrap();
        assert_eq!(state, HwnSettings::vibrator(0));
        assert_eq!(state.mte_reserved, MTE_NOT_SUPPORTED);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_id_is_rejected() {
        let mut cache = StateCache::<4>::new();
        assert_eq!(cache.get_state(1), Err(CacheError::UnknownId));
        let err: DrvError<()> = CacheError::UnknownId.into();
        assert!(matches!(err, DrvError::InvalidParameter));
    }

    #[test]
    fn store_replaces_existing_id() {
        let mut cache = StateCache::<1>::new();
        cache.store(on(10)).unwrap();
        cache.store(on(20)).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_state(0).unwrap().intensity, 20);
    }

    #[test]
    fn store_past_capacity_fails() {
        let mut cache = StateCache::<1>::new();
        cache.store(HwnSettings::vibrator(0)).unwrap();
        assert_eq!(cache.store(HwnSettings::vibrator(1)), Err(CacheError::Full));
    }

    #[test]
    fn set_state_on_enables_and_records() {
        let expectations = [
            I2cTransaction::write(ADDRESS, vec![Register::TopCtl2 as u8, 0xff]),
            I2cTransaction::write_read(ADDRESS, vec![Register::TopCtl1 as u8], vec![0x08]),
            I2cTransaction::write(ADDRESS, vec![Register::TopCtl1 as u8, 0x09]),
        ];
        let mut haptic = driver(&expectations);
        let mut cache = StateCache::<1>::new();

        haptic.set_state(&mut cache, on(100)).unwrap();
        assert_eq!(haptic.state(), DriveState::On);

        let stored = cache.get_state(0).unwrap();
        assert_eq!(stored.state, HwnState::On);
        assert_eq!(stored.intensity, 100);
        assert_eq!(stored.cycle_granularity, 0);
        assert_eq!(stored.mte_reserved, MTE_NOT_SUPPORTED);

        haptic.release().done();
    }

    #[test]
    fn set_state_off_when_idle_touches_nothing() {
        let mut haptic = driver(&[]);
        let mut cache = StateCache::<1>::new();

        haptic
            .set_state(&mut cache, HwnSettings::vibrator(0))
            .unwrap();
        assert_eq!(cache.len(), 1);

        haptic.release().done();
    }

    #[test]
    fn set_state_rejects_out_of_range_id() {
        let mut haptic = driver(&[]);
        let mut cache = StateCache::<2>::new();
        let request = HwnSettings {
            id: HWN_DEVICE_COUNT,
            ..on(50)
        };

        assert!(matches!(
            haptic.set_state(&mut cache, request),
            Err(DrvError::InvalidParameter)
        ));
        assert!(cache.is_empty());

        haptic.release().done();
    }

    #[test]
    fn blink_is_not_implemented() {
        let mut haptic = driver(&[]);
        let mut cache = StateCache::<1>::new();
        let request = HwnSettings {
            state: HwnState::Blink,
            ..HwnSettings::vibrator(0)
        };

        assert!(matches!(
            haptic.set_state(&mut cache, request),
            Err(DrvError::NotImplemented)
        ));
        assert!(cache.is_empty());

        haptic.release().done();
    }

    #[test]
    fn failed_toggle_is_not_recorded() {
        let expectations = [I2cTransaction::write(ADDRESS, vec![Register::TopCtl2 as u8, 0x7f])
            .with_error(embedded_hal_mock::eh0::MockError::Io(std::io::ErrorKind::Other))];
        let mut haptic = driver(&expectations);
        let mut cache = StateCache::<1>::new();

        assert!(haptic.set_state(&mut cache, on(50)).is_err());
        assert!(cache.is_empty());
        assert_eq!(haptic.state(), DriveState::Off);

        haptic.release().done();
    }

    #[test]
    fn set_states_stops_at_first_failure() {
        let expectations = [
            I2cTransaction::write(ADDRESS, vec![Register::TopCtl2 as u8, 0x7f]),
            I2cTransaction::write_read(ADDRESS, vec![Register::TopCtl1 as u8], vec![0x08]),
            I2cTransaction::write(ADDRESS, vec![Register::TopCtl1 as u8, 0x09]),
        ];
        let mut haptic = driver(&expectations);
        let mut cache = StateCache::<1>::new();
        let requests = [
            on(50),
            HwnSettings::vibrator(5),
            HwnSettings::vibrator(0),
        ];

        assert!(matches!(
            haptic.set_states(&mut cache, &requests),
            Err(DrvError::InvalidParameter)
        ));
        assert_eq!(haptic.state(), DriveState::On);
        assert_eq!(cache.get_state(0).unwrap().state, HwnState::On);

        haptic.release().done();
    }
}
