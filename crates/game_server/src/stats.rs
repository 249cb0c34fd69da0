//! Character attribute block.

use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Base attributes of a hero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub str: i32,
    pub agi: i32,
    pub sta: i32,
    pub inte: i32,
    pub spi: i32,
}

impl Stats {
    /// Field-wise sum of `self` and `delta`. Overflow wraps.
    pub fn add(self, delta: Stats) -> Stats {
        Stats {
            str: self.str.wrapping_add(delta.str),
            agi: self.agi.wrapping_add(delta.agi),
            sta: self.sta.wrapping_add(delta.sta),
            inte: self.inte.wrapping_add(delta.inte),
            spi: self.spi.wrapping_add(delta.spi),
        }
    }
}

impl Add for Stats {
    type Output = Stats;

    fn add(self, rhs: Stats) -> Stats {
        Stats::add(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sums_each_field() {
        let a = Stats {
            str: 1,
            agi: 2,
            ..Default::default()
        };
        let b = Stats {
            str: 1,
            agi: 2,
            spi: 3,
            ..Default::default()
        };

        let c = a.add(b);
        assert_eq!(c.str, 2);
        assert_eq!(c.agi, 4);
        assert_eq!(c.spi, 3);
        assert_eq!(c.sta, 0);
        assert_eq!(a + b, c);
    }

    #[test]
    fn overflow_wraps() {
        let max = Stats {
            str: i32::MAX,
            ..Default::default()
        };
        let one = Stats {
            str: 1,
            spi: -1,
            ..Default::default()
        };
        let sum = max + one;
        assert_eq!(sum.str, i32::MIN);
        assert_eq!(sum.spi, -1);
    }
}
