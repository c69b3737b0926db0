use crate::error::DecoderError;

/// How the set index is extracted from the line number
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IndexForm {
    /// `line & (sets - 1)`, only valid for power of two set counts
    Mask,
    /// `line % sets`, valid for any set count
    Modulo,
}

/// An address split into its components for one cache geometry
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub set_index: u64,
    pub tag: u64,
    pub offset: u64,
}

/// Converts addresses into a set index and a tag for a given line size and set count
///
/// Unlike the tag in a hardware cache, the tag here is not masked; it's every bit above the set
/// index, so `tag * line_size * set_count + set_index * line_size + offset` reconstructs the
/// address exactly
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Decoder {
    line_size: u64,
    set_count: u64,
    form: IndexForm,
}

impl Decoder {
    /// Creates a decoder, choosing the mask form when the set count allows it and falling back to
    /// the modulo form otherwise
    pub fn new(line_size: u64, set_count: u64) -> Result<Self, DecoderError> {
        Self::check_geometry(line_size, set_count)?;
        let form = if set_count.is_power_of_two() {
            IndexForm::Mask
        } else {
            IndexForm::Modulo
        };
        Ok(Self {
            line_size,
            set_count,
            form,
        })
    }

    /// Creates a decoder which only supports mask based set selection
    ///
    /// # Errors
    ///
    /// [`DecoderError::NotPowerOfTwo`] if the set count isn't a power of two
    pub fn masked(line_size: u64, set_count: u64) -> Result<Self, DecoderError> {
        Self::check_geometry(line_size, set_count)?;
        if !set_count.is_power_of_two() {
            return Err(DecoderError::NotPowerOfTwo(set_count));
        }
        Ok(Self {
            line_size,
            set_count,
            form: IndexForm::Mask,
        })
    }

    fn check_geometry(line_size: u64, set_count: u64) -> Result<(), DecoderError> {
        if line_size == 0 || set_count == 0 {
            return Err(DecoderError::ZeroGeometry {
                line_size,
                set_count,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn decode(&self, address: u64) -> Decoded {
        let line = address / self.line_size;
        let set_index = match (self.set_count, self.form) {
            (1, _) => 0,
            (_, IndexForm::Mask) => line & (self.set_count - 1),
            (_, IndexForm::Modulo) => line % self.set_count,
        };
        Decoded {
            set_index,
            // line / sets rather than address / (line_size * sets), the product can overflow
            tag: line / self.set_count,
            offset: address % self.line_size,
        }
    }

    /// The address of the first byte of the line containing `address`
    #[inline]
    pub fn line_base(&self, address: u64) -> u64 {
        address - address % self.line_size
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    pub fn set_count(&self) -> u64 {
        self.set_count
    }

    pub fn form(&self) -> IndexForm {
        self.form
    }
}

/// One-off decode without keeping a decoder around
///
/// # Panics
///
/// If either the line size or set count is zero
pub fn decode(address: u64, line_size: u64, set_count: u64) -> Decoded {
    assert!(line_size > 0 && set_count > 0, "decode needs a positive line size and set count");
    let line = address / line_size;
    let set_index = if set_count == 1 {
        0
    } else if set_count.is_power_of_two() {
        line & (set_count - 1)
    } else {
        line % set_count
    };
    Decoded {
        set_index,
        tag: line / set_count,
        offset: address % line_size,
    }
}
