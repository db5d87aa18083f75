//! Bit layout of the 8-byte slot shared with the guest.

use crate::value::Ref;

/// High word of every NaN-boxed slot before the type flag is or'ed in.
pub const NAN_HEAD: u32 = 0x7ff8_0000;

const FLAG_MASK: u32 = 0x3;

/// Type flag carried in the low bits of a boxed slot's high word.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeFlag {
    Object = 0,
    String = 1,
    /// Reserved by the guest ABI; never produced by this host.
    Symbol = 2,
    Function = 3,
}

impl TypeFlag {
    fn from_bits(bits: u32) -> Self {
        match bits & FLAG_MASK {
            1 => TypeFlag::String,
            2 => TypeFlag::Symbol,
            3 => TypeFlag::Function,
            _ => TypeFlag::Object,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(transparent)]
pub struct Slot(u64);

impl Slot {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Raw double. A NaN argument collapses to the canonical NaN slot.
    pub fn from_float(f: f64) -> Self {
        if f.is_nan() {
            return Self::nan();
        }
        Self(f.to_bits())
    }

    pub fn nan() -> Self {
        Self::boxed(Ref::NAN, TypeFlag::Object)
    }

    pub fn boxed(id: Ref, flag: TypeFlag) -> Self {
        let head = NAN_HEAD | flag as u32;
        Self(((head as u64) << 32) | id.get() as u64)
    }

    /// Anything that does not read back as a NaN double is a plain number.
    pub fn is_float(&self) -> bool {
        !f64::from_bits(self.0).is_nan()
    }

    pub fn as_float(&self) -> Option<f64> {
        if self.is_float() {
            Some(f64::from_bits(self.0))
        } else {
            None
        }
    }

    pub fn is_boxed(&self) -> bool {
        self.tag_word() & NAN_HEAD == NAN_HEAD
    }

    pub fn payload(&self) -> u32 {
        self.0 as u32
    }

    pub fn tag_word(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn type_flag(&self) -> Option<TypeFlag> {
        if self.is_boxed() {
            Some(TypeFlag::from_bits(self.tag_word()))
        } else {
            None
        }
    }

    pub fn handle(&self) -> Option<Ref> {
        if self.is_boxed() {
            Some(Ref::new(self.payload()))
        } else {
            None
        }
    }
}
