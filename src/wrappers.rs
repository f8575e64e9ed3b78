use strum_macros::{Display, EnumString};

/// One of the two image axes a profile or interval list runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Axis {
    /// One entry per column (x), scanning down each column
    Columns,
    /// One entry per row (y), scanning across each row
    Rows,
}

impl Axis {
    /// Length of this axis for an image of the given dimensions
    pub fn len(self, (width, height): (u32, u32)) -> u32 {
        match self {
            Axis::Columns => width,
            Axis::Rows => height,
        }
    }

    pub fn orthogonal(self) -> Axis {
        match self {
            Axis::Columns => Axis::Rows,
            Axis::Rows => Axis::Columns,
        }
    }
}

pub trait PixelExt {
    fn r(&self) -> u8;
    fn g(&self) -> u8;
    fn b(&self) -> u8;
    fn a(&self) -> u8;
    fn zeroed() -> Self;
    /// Counts as sprite content, as opposed to background
    fn is_content(&self, alpha_threshold: u8) -> bool {
        self.a() > alpha_threshold
    }
}

impl PixelExt for image::Rgba<u8> {
    fn r(&self) -> u8 {
        self.0[0]
    }

    fn g(&self) -> u8 {
        self.0[1]
    }

    fn b(&self) -> u8 {
        self.0[2]
    }

    fn a(&self) -> u8 {
        self.0[3]
    }

    fn zeroed() -> Self {
        Self([0; 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn axis_lengths() {
        assert_eq!(Axis::Columns.len((568, 64)), 568);
        assert_eq!(Axis::Rows.len((568, 64)), 64);
        assert_eq!(Axis::Columns.orthogonal(), Axis::Rows);
        assert_eq!(Axis::from_str("rows").unwrap(), Axis::Rows);
    }

    #[test]
    fn content_uses_strict_threshold() {
        let px = image::Rgba([255, 0, 0, 10]);
        assert!(!px.is_content(10));
        assert!(px.is_content(9));
        assert!(!image::Rgba::<u8>::zeroed().is_content(0));
    }
}
