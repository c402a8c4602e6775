use std::fmt;

use crate::error::DecodeError;

/// Raster size and scan structure of the flow being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub interlaced: bool,
    /// Marker bits that close one frame: 1 for progressive, 2 for interlaced.
    pub fields_per_frame: u8,
}

impl FrameGeometry {
    /// Build a geometry from a field count: 1 is progressive, 2 interlaced.
    pub fn new(width: u32, height: u32, fields_per_frame: u8) -> Result<Self, DecodeError> {
        let geometry = Self {
            width,
            height,
            interlaced: fields_per_frame == 2,
            fields_per_frame,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub const fn progressive(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            interlaced: false,
            fields_per_frame: 1,
        }
    }

    pub const fn interlaced(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            interlaced: true,
            fields_per_frame: 2,
        }
    }

    /// Reject rasters with no pixels and field counts other than 1
    /// (progressive) or 2 (interlaced).
    pub fn validate(&self) -> Result<(), DecodeError> {
        let fields_match = match self.fields_per_frame {
            1 => !self.interlaced,
            2 => self.interlaced,
            _ => false,
        };
        if self.width == 0 || self.height == 0 || !fields_match {
            return Err(DecodeError::InvalidGeometry {
                width: self.width,
                height: self.height,
                interlaced: self.interlaced,
                fields_per_frame: self.fields_per_frame,
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Zero-based field being received while `remaining_markers` marker
    /// bits are still outstanding.
    pub fn field_index(&self, remaining_markers: u8) -> u8 {
        self.fields_per_frame.saturating_sub(remaining_markers)
    }

    /// Map an SRD row number to a raster row.
    ///
    /// Interlaced rows are doubled; the first field fills even rows and
    /// every later field fills odd rows.
    pub fn destination_row(&self, row_number: u16, remaining_markers: u8) -> u32 {
        let row = u32::from(row_number);
        if !self.interlaced {
            return row;
        }
        if self.field_index(remaining_markers) == 0 {
            row << 1
        } else {
            (row << 1) | 1
        }
    }
}

/// Resolution presets selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Resolution {
    /// 1280x720 progressive.
    #[default]
    P720,
    /// 1920x1080 interlaced, two fields per frame.
    I1080,
    /// 1920x1080 progressive.
    P1080,
}

impl Resolution {
    pub fn geometry(self) -> FrameGeometry {
        match self {
            Resolution::P720 => FrameGeometry::progressive(1280, 720),
            Resolution::I1080 => FrameGeometry::interlaced(1920, 1080),
            Resolution::P1080 => FrameGeometry::progressive(1920, 1080),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::I1080 => "1080i",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
