//! Per-image color classification of marker squares.
//!
//! The six sample squares carry known paint colors. Their median hues define
//! the decision boundaries for the image, so lighting and white balance are
//! absorbed before any data square is looked at.

use crate::{ChessboardError, Square};
use log::debug;
use plotmark_core::HUE_BINS;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// The six canonical paint colors, in hue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleColor {
    Red,
    Yellow,
    Green,
    Cyan,
    Blue,
    Magenta,
}

impl SampleColor {
    pub const ALL: [SampleColor; 6] = [
        SampleColor::Red,
        SampleColor::Yellow,
        SampleColor::Green,
        SampleColor::Cyan,
        SampleColor::Blue,
        SampleColor::Magenta,
    ];

    /// Class index, 0 (red) through 5 (magenta).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Which of the red, green and blue primaries are mixed into this paint.
    pub fn rgb(self) -> [bool; 3] {
        match self {
            SampleColor::Red => [true, false, false],
            SampleColor::Yellow => [true, true, false],
            SampleColor::Green => [false, true, false],
            SampleColor::Cyan => [false, true, true],
            SampleColor::Blue => [false, false, true],
            SampleColor::Magenta => [true, false, true],
        }
    }
}

/// Strategy used to label data squares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    #[default]
    Median,
    MaxLikelihood,
}

/// Exactly one sample square per canonical color.
#[derive(Clone, Copy, Debug)]
pub struct SampleSet<'a> {
    by_color: [&'a Square; 6],
}

impl<'a> SampleSet<'a> {
    /// Build from explicitly tagged squares; each color must appear once.
    pub fn new(tagged: &[(SampleColor, &'a Square)]) -> Result<Self, ChessboardError> {
        if tagged.len() != SampleColor::ALL.len() {
            return Err(ChessboardError::InvalidSampleCount(tagged.len()));
        }
        let mut slots: [Option<&'a Square>; 6] = [None; 6];
        for &(color, square) in tagged {
            let slot = &mut slots[color.index()];
            if slot.is_some() {
                return Err(ChessboardError::InvalidSampleSet(
                    tagged.iter().map(|(c, _)| *c).collect(),
                ));
            }
            *slot = Some(square);
        }
        // Six unique tags out of six colors fill every slot.
        let mut by_color: [&'a Square; 6] = [tagged[0].1; 6];
        for (dst, slot) in by_color.iter_mut().zip(slots) {
            if let Some(square) = slot {
                *dst = square;
            }
        }
        Ok(Self { by_color })
    }

    /// Tag squares by position: red, yellow, green, cyan, blue, magenta.
    pub fn from_canonical_order(squares: &'a [Square]) -> Result<Self, ChessboardError> {
        if squares.len() != SampleColor::ALL.len() {
            return Err(ChessboardError::InvalidSampleCount(squares.len()));
        }
        let tagged: Vec<(SampleColor, &'a Square)> =
            SampleColor::ALL.iter().copied().zip(squares.iter()).collect();
        Self::new(&tagged)
    }

    pub fn get(&self, color: SampleColor) -> &'a Square {
        self.by_color[color.index()]
    }

    pub fn medians(&self) -> [(u8, SampleColor); 6] {
        SampleColor::ALL.map(|c| (self.get(c).median_hue(), c))
    }
}

/// Hue decision boundaries derived from the sample medians.
///
/// `bounds[0] = 0` and `bounds[7] = 256`; interval `k` is
/// `[bounds[k], bounds[k + 1])` and carries `colors[k]`. The last
/// interval wraps around to red-ish hues again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueRangeTable {
    bounds: [u16; 8],
    colors: [SampleColor; 7],
}

impl HueRangeTable {
    pub fn from_medians(medians: [(u8, SampleColor); 6]) -> Self {
        let mut range = [(0i32, SampleColor::Red); 8];
        for (i, (m, c)) in medians.iter().enumerate() {
            range[i] = (*m as i32, *c);
        }
        insertion_sort(&mut range[0..6]);

        // Entry 6 is sample 0 shifted by a full turn; each entry then becomes
        // the midpoint towards its lower neighbor.
        let bins = HUE_BINS as i32;
        range[6] = (bins + range[0].0, range[0].1);
        for i in (1..=6).rev() {
            let lo = range[i - 1].0;
            range[i].0 = ((range[i].0 - lo) / 2 + lo) % bins;
        }
        // Folding entry 6 can leave it below entry 5.
        insertion_sort(&mut range[1..7]);
        range[0] = (0, range[6].1);

        let mut bounds = [0u16; 8];
        let mut colors = [SampleColor::Red; 7];
        for k in 0..7 {
            bounds[k] = range[k].0 as u16;
            colors[k] = range[k].1;
        }
        bounds[7] = HUE_BINS as u16;
        Self { bounds, colors }
    }

    pub fn bounds(&self) -> &[u16; 8] {
        &self.bounds
    }

    pub fn colors(&self) -> &[SampleColor; 7] {
        &self.colors
    }

    /// Interval holding `hue`: the first `j` with `bounds[j] > hue`, minus one.
    pub fn interval(&self, hue: u8) -> usize {
        let h = hue as u16;
        self.bounds
            .iter()
            .position(|&b| b > h)
            .map(|j| j.saturating_sub(1))
            .unwrap_or(6)
    }

    pub fn color_of(&self, hue: u8) -> SampleColor {
        self.colors[self.interval(hue)]
    }
}

fn insertion_sort(entries: &mut [(i32, SampleColor)]) {
    for i in 1..entries.len() {
        let mut j = i;
        while j > 0 && entries[j].0 < entries[j - 1].0 {
            entries.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Labels data squares with one of the canonical colors.
pub trait ColorClassifier {
    /// One label per square, in input order.
    fn classify(&self, data: &[Square]) -> Vec<SampleColor>;
}

/// Majority vote of each data square's pixels over the median-derived table.
#[derive(Clone, Debug)]
pub struct MedianClassifier {
    table: HueRangeTable,
}

impl MedianClassifier {
    /// Six samples in canonical order (red ... magenta).
    pub fn new(samples: &[Square]) -> Result<Self, ChessboardError> {
        Ok(Self::from_samples(&SampleSet::from_canonical_order(samples)?))
    }

    pub fn from_samples(samples: &SampleSet<'_>) -> Self {
        let medians = samples.medians();
        debug!("sample medians: {:?}", medians);
        let table = HueRangeTable::from_medians(medians);
        debug!("hue bounds: {:?}", table.bounds());
        Self { table }
    }

    pub fn table(&self) -> &HueRangeTable {
        &self.table
    }

    pub fn classify_square(&self, square: &Square) -> SampleColor {
        let hist = square.hue_histogram();
        let mut votes = [0u64; 6];
        for (hue, &count) in hist.bins().iter().enumerate() {
            if count > 0 {
                votes[self.table.color_of(hue as u8).index()] += count as u64;
            }
        }
        let mut best = 0;
        for (i, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = i;
            }
        }
        SampleColor::ALL[best]
    }
}

impl ColorClassifier for MedianClassifier {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, data), fields(squares = data.len()))
    )]
    fn classify(&self, data: &[Square]) -> Vec<SampleColor> {
        data.iter().map(|sq| self.classify_square(sq)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use nalgebra::Point2;

    fn solid(rgb: [u8; 3]) -> Square {
        let img = RgbImage::from_pixel(12, 12, Rgb(rgb));
        Square::from_corners(
            &img,
            [
                Point2::new(1.0, 1.0),
                Point2::new(11.0, 1.0),
                Point2::new(11.0, 11.0),
                Point2::new(1.0, 11.0),
            ],
        )
        .expect("square")
    }

    fn canonical_samples() -> Vec<Square> {
        [
            [255, 0, 0],
            [255, 255, 0],
            [0, 255, 0],
            [0, 255, 255],
            [0, 0, 255],
            [255, 0, 255],
        ]
        .into_iter()
        .map(solid)
        .collect()
    }

    fn table(medians: [u8; 6]) -> HueRangeTable {
        let mut m = [(0u8, SampleColor::Red); 6];
        for (i, c) in SampleColor::ALL.iter().enumerate() {
            m[i] = (medians[i], *c);
        }
        HueRangeTable::from_medians(m)
    }

    #[test]
    fn canonical_medians_give_midpoint_bounds() {
        let t = table([0, 43, 85, 128, 171, 213]);
        assert_eq!(t.bounds(), &[0, 21, 64, 106, 149, 192, 234, 256]);
        assert_eq!(t.colors()[0], SampleColor::Red);
        assert_eq!(t.colors()[6], SampleColor::Red);
        assert_eq!(t.color_of(10), SampleColor::Red);
        assert_eq!(t.color_of(21), SampleColor::Yellow);
        assert_eq!(t.color_of(200), SampleColor::Magenta);
        assert_eq!(t.color_of(250), SampleColor::Red);
    }

    #[test]
    fn red_above_magenta_wraps_into_the_low_interval() {
        let t = table([250, 43, 85, 128, 171, 213]);
        assert_eq!(t.bounds(), &[0, 18, 64, 106, 149, 192, 231, 256]);
        assert_eq!(t.color_of(5), SampleColor::Red);
        assert_eq!(t.color_of(30), SampleColor::Yellow);
        assert_eq!(t.color_of(240), SampleColor::Red);
        assert_eq!(t.color_of(220), SampleColor::Magenta);
    }

    #[test]
    fn shifted_samples_keep_their_color_tags() {
        // Every sample hue moved by 230: yellow now has the lowest median.
        let t = table([230, 17, 59, 102, 145, 187]);
        assert_eq!(t.bounds(), &[0, 38, 80, 123, 166, 208, 251, 256]);
        assert_eq!(t.colors()[0], SampleColor::Yellow);
        assert_eq!(t.color_of(17), SampleColor::Yellow);
        assert_eq!(t.color_of(100), SampleColor::Cyan);
        assert_eq!(t.color_of(190), SampleColor::Magenta);
        // Interval 5 holds red here, not the fifth canonical color.
        assert_eq!(t.interval(240), 5);
        assert_eq!(t.color_of(240), SampleColor::Red);
        assert_eq!(t.color_of(253), SampleColor::Yellow);
    }

    #[test]
    fn bounds_are_monotone_for_arbitrary_medians() {
        for seed in 0u32..200 {
            let mut m = [0u8; 6];
            for (i, v) in m.iter_mut().enumerate() {
                *v = ((seed * 37 + i as u32 * 101 + seed * seed * 13) % 256) as u8;
            }
            let t = table(m);
            let b = t.bounds();
            assert_eq!(b[0], 0);
            assert_eq!(b[7], 256);
            assert!(b.windows(2).all(|w| w[0] <= w[1]), "{:?} from {:?}", b, m);
        }
    }

    #[test]
    fn sample_count_must_be_six() {
        let mut samples = canonical_samples();
        samples.pop();
        assert_eq!(
            MedianClassifier::new(&samples).unwrap_err(),
            ChessboardError::InvalidSampleCount(5)
        );
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let samples = canonical_samples();
        let mut tagged: Vec<(SampleColor, &Square)> =
            SampleColor::ALL.iter().copied().zip(samples.iter()).collect();
        tagged[5].0 = SampleColor::Red;
        assert!(matches!(
            SampleSet::new(&tagged),
            Err(ChessboardError::InvalidSampleSet(_))
        ));
    }

    #[test]
    fn tags_decide_roles_not_positions() {
        let samples = canonical_samples();
        let mut tagged: Vec<(SampleColor, &Square)> =
            SampleColor::ALL.iter().copied().zip(samples.iter()).collect();
        tagged.reverse();
        let set = SampleSet::new(&tagged).expect("valid");
        assert_eq!(set.get(SampleColor::Blue).median_hue(), 171);
        let clf = MedianClassifier::from_samples(&set);
        assert_eq!(clf.classify(&[solid([250, 240, 20])]), vec![SampleColor::Yellow]);
    }

    #[test]
    fn classifies_each_data_square_deterministically() {
        let samples = canonical_samples();
        let clf = MedianClassifier::new(&samples).expect("classifier");
        let data = vec![
            solid([230, 30, 40]),
            solid([240, 230, 50]),
            solid([220, 40, 230]),
            solid([40, 60, 240]),
        ];
        let first = clf.classify(&data);
        assert_eq!(
            first,
            vec![
                SampleColor::Red,
                SampleColor::Yellow,
                SampleColor::Magenta,
                SampleColor::Blue
            ]
        );
        assert_eq!(clf.classify(&data), first);
    }

    #[test]
    fn ties_go_to_the_lowest_class() {
        let clf = MedianClassifier::new(&canonical_samples()).expect("classifier");
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 0]));
        for y in 0..10 {
            for x in 0..5 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let sq = Square::from_corners(
            &img,
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
        )
        .expect("square");
        assert_eq!(clf.classify_square(&sq), SampleColor::Red);
    }
}
