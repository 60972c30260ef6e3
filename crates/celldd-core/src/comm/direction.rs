/// One of the six faces of a rank's domain.
///
/// The discriminant is `2 * axis + face` with face 0 the low side and face 1 the high side.
/// Every protocol walks [`Direction::ALL`] in this order on every rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    XLow = 0,
    XHigh = 1,
    YLow = 2,
    YHigh = 3,
    ZLow = 4,
    ZHigh = 5,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::XLow,
        Direction::XHigh,
        Direction::YLow,
        Direction::YHigh,
        Direction::ZLow,
        Direction::ZHigh,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn axis(self) -> usize {
        self.index() / 2
    }

    pub fn is_high(self) -> bool {
        self.index() % 2 == 1
    }

    pub fn opposite(self) -> Self {
        Self::ALL[self.index() ^ 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_axis_and_face() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.index(), i);
            assert_eq!(dir.axis(), i / 2);
            assert_eq!(dir.is_high(), i % 2 == 1);
            assert_eq!(Direction::from_index(i), Some(*dir));
        }
        assert_eq!(Direction::from_index(6), None);
    }

    #[test]
    fn opposite_flips_the_face() {
        assert_eq!(Direction::XLow.opposite(), Direction::XHigh);
        assert_eq!(Direction::ZHigh.opposite(), Direction::ZLow);
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_eq!(dir.opposite().axis(), dir.axis());
        }
    }
}
