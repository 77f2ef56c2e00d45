//! Compact addressing of quad-tree leaves.
//!
//! Layout of the 32-bit key:
//!
//! ```text
//!  31            18 17            4 3   1  0
//! +----------------+---------------+-----+---+
//! |     grid x     |    grid y     |  0  | U |
//! +----------------+---------------+-----+---+
//! ```
//!
//! `U` selects the underground floors. Grid coordinates are leaf indices,
//! i.e. tile coordinates shifted right by [`LEAF_SHIFT`].

use crate::constants::LEAF_SHIFT;
use crate::error::ProtoError;
use crate::types::{FloorSpan, Position};

const GRID_BITS: u32 = 14;
const GRID_LIMIT: u32 = 1 << GRID_BITS;
const GRID_Y_SHIFT: u32 = 4;
const GRID_X_SHIFT: u32 = 18;
const UNDERGROUND_BIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u32);

impl NodeKey {
    /// Builds a key from leaf grid coordinates. Both axes must fit in 14 bits.
    pub fn new(grid_x: u32, grid_y: u32, underground: bool) -> Result<Self, ProtoError> {
        if grid_x >= GRID_LIMIT || grid_y >= GRID_LIMIT {
            return Err(ProtoError::NodeOutOfRange { grid_x, grid_y });
        }
        Ok(Self(
            (grid_x << GRID_X_SHIFT) | (grid_y << GRID_Y_SHIFT) | underground as u32,
        ))
    }

    /// Key of the leaf holding the given tile coordinates.
    pub fn for_tile(x: u16, y: u16, underground: bool) -> Self {
        // u16 >> 2 always fits in 14 bits.
        let grid_x = (x >> LEAF_SHIFT) as u32;
        let grid_y = (y >> LEAF_SHIFT) as u32;
        Self((grid_x << GRID_X_SHIFT) | (grid_y << GRID_Y_SHIFT) | underground as u32)
    }

    /// Key of the leaf and floor span holding `pos`.
    pub fn containing(pos: Position) -> Self {
        Self::for_tile(pos.x, pos.y, pos.is_underground())
    }

    /// Interprets a key received off the wire. Reserved bits are ignored.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw & !0b1110)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn grid_x(self) -> u16 {
        (self.0 >> GRID_X_SHIFT) as u16
    }

    pub fn grid_y(self) -> u16 {
        ((self.0 >> GRID_Y_SHIFT) & (GRID_LIMIT - 1)) as u16
    }

    pub fn is_underground(self) -> bool {
        self.0 & UNDERGROUND_BIT != 0
    }

    pub fn floors(self) -> FloorSpan {
        FloorSpan::from_underground(self.is_underground())
    }

    /// Tile coordinates of the leaf's top-left corner.
    pub fn tile_origin(self) -> (u16, u16) {
        (self.grid_x() << LEAF_SHIFT, self.grid_y() << LEAF_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_layout() {
        let key = NodeKey::new(2, 3, false).unwrap();
        assert_eq!(key.raw(), (2 << 18) | (3 << 4));
        let key = NodeKey::new(2, 3, true).unwrap();
        assert_eq!(key.raw(), (2 << 18) | (3 << 4) | 1);
    }

    #[test]
    fn tile_maps_to_its_leaf() {
        let key = NodeKey::for_tile(1000, 1001, false);
        assert_eq!((key.grid_x(), key.grid_y()), (250, 250));
        assert_eq!(key.tile_origin(), (1000, 1000));
    }

    #[test]
    fn out_of_range_grid_is_rejected() {
        assert!(matches!(
            NodeKey::new(0, GRID_LIMIT, false),
            Err(ProtoError::NodeOutOfRange { .. })
        ));
        assert!(matches!(
            NodeKey::new(GRID_LIMIT, 0, true),
            Err(ProtoError::NodeOutOfRange { .. })
        ));
        assert!(NodeKey::new(GRID_LIMIT - 1, GRID_LIMIT - 1, true).is_ok());
    }

    #[test]
    fn extreme_tiles_stay_in_range() {
        let key = NodeKey::for_tile(u16::MAX, u16::MAX, true);
        assert_eq!(key.grid_x() as u32, GRID_LIMIT - 1);
        assert_eq!(key.grid_y() as u32, GRID_LIMIT - 1);
        assert!(key.is_underground());
    }

    #[test]
    fn containing_picks_span_from_floor() {
        assert!(!NodeKey::containing(Position::new(8, 8, 7)).is_underground());
        assert!(NodeKey::containing(Position::new(8, 8, 8)).is_underground());
    }

    proptest! {
        #[test]
        fn encode_decode_is_a_bijection(
            gx in 0u32..GRID_LIMIT,
            gy in 0u32..GRID_LIMIT,
            underground in any::<bool>(),
        ) {
            let key = NodeKey::new(gx, gy, underground).unwrap();
            prop_assert_eq!(key.grid_x() as u32, gx);
            prop_assert_eq!(key.grid_y() as u32, gy);
            prop_assert_eq!(key.is_underground(), underground);
            prop_assert_eq!(NodeKey::from_raw(key.raw()), key);
        }

        #[test]
        fn distinct_inputs_give_distinct_keys(
            a in (0u32..GRID_LIMIT, 0u32..GRID_LIMIT, any::<bool>()),
            b in (0u32..GRID_LIMIT, 0u32..GRID_LIMIT, any::<bool>()),
        ) {
            prop_assume!(a != b);
            let ka = NodeKey::new(a.0, a.1, a.2).unwrap();
            let kb = NodeKey::new(b.0, b.1, b.2).unwrap();
            prop_assert_ne!(ka, kb);
        }
    }
}
