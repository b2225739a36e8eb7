use crate::ChessboardError;
use serde::{Deserialize, Serialize};

/// Inner-corner dimensions of the marker, normalized so `width >= height`.
///
/// One dimension must be odd and the other even; that leaves the printed
/// pattern a single symmetry axis, which is what fixes its orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardDims {
    width: u32,
    height: u32,
}

impl BoardDims {
    /// Validate a pair of sizes given in any order.
    pub fn new(size1: u32, size2: u32) -> Result<Self, ChessboardError> {
        let width = size1.max(size2);
        let height = size1.min(size2);
        if width % 2 == height % 2 {
            return Err(ChessboardError::AsymmetricBoardRequired { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of grid points a complete detection carries.
    pub fn corner_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Cells per row and per column.
    pub fn cells(&self) -> (u32, u32) {
        (self.width.saturating_sub(1), self.height.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_sizes_and_accepts_mixed_parity() {
        let dims = BoardDims::new(5, 8).expect("valid");
        assert_eq!((dims.width(), dims.height()), (8, 5));
        assert_eq!(dims.corner_count(), 40);
        assert_eq!(dims.cells(), (7, 4));
    }

    #[test]
    fn rejects_equal_parity() {
        assert_eq!(
            BoardDims::new(6, 4),
            Err(ChessboardError::AsymmetricBoardRequired {
                width: 6,
                height: 4
            })
        );
        assert!(BoardDims::new(7, 7).is_err());
    }
}
