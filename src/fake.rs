//! Register-level I2C double used by the sequence tests.

use embedded_hal::blocking::i2c::{Write, WriteRead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read { register: u8, len: usize },
    Write { register: u8, data: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

/// 256 byte register file behind an I2C address. Writes auto increment.
pub struct FakeBus {
    pub address: u8,
    pub regs: [u8; 256],
    pub ops: Vec<Op>,
    /// Zero based transaction index that fails instead of executing.
    pub fail_at: Option<usize>,
}

impl FakeBus {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            ops: Vec::new(),
            fail_at: None,
        }
    }

    fn check(&mut self, address: u8) -> Result<(), BusFault> {
        assert_eq!(address, self.address, "wrong device address");
        if self.fail_at == Some(self.ops.len()) {
            return Err(BusFault);
        }
        Ok(())
    }

    /// Every single byte register write, in order.
    pub fn byte_writes(&self) -> Vec<(u8, u8)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write { register, data } if data.len() == 1 => Some((*register, data[0])),
                _ => None,
            })
            .collect()
    }

    pub fn was_read(&self, register: u8) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, Op::Read { register: r, .. } if *r == register))
    }

    pub fn was_written(&self, register: u8) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, Op::Write { register: r, .. } if *r == register))
    }

    pub fn position_of_write(&self, register: u8) -> Option<usize> {
        self.ops
            .iter()
            .position(|op| matches!(op, Op::Write { register: r, .. } if *r == register))
    }
}

impl Write for FakeBus {
    type Error = BusFault;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusFault> {
        self.check(address)?;
        let (register, data) = bytes.split_first().expect("write without register");
        for (i, value) in data.iter().enumerate() {
            self.regs[register.wrapping_add(i as u8) as usize] = *value;
        }
        self.ops.push(Op::Write {
            register: *register,
            data: data.to_vec(),
        });
        Ok(())
    }
}

impl WriteRead for FakeBus {
    type Error = BusFault;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), BusFault> {
        self.check(address)?;
        let register = bytes[0];
        for (i, value) in buffer.iter_mut().enumerate() {
            *value = self.regs[register.wrapping_add(i as u8) as usize];
        }
        self.ops.push(Op::Read {
            register,
            len: buffer.len(),
        });
        Ok(())
    }
}
