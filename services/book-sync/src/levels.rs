//! Sorted price levels for one side of a book
//!
//! A `LevelSet` is a plain sorted `Vec<PriceLevel>`: bids descending, asks
//! ascending, so the best price is always at index 0. Single-level changes
//! use binary search to locate the slot and splice in place, which keeps an
//! update O(n) instead of re-sorting the whole side.
//!
//! Invariants (hold after every public call):
//! - strictly ordered by price for the side (no duplicate prices)
//! - no level with zero size
//! - no level with a non-positive price

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::numeric::{Price, Size};
use types::side::BookSide;

/// A single price level in the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub size: Size,
}

impl PriceLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Outcome of applying one `(price, size)` change to a level set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    /// New level spliced in at this index.
    Inserted(usize),
    /// Existing level at this index had its size replaced.
    Updated(usize),
    /// Level at this index was removed.
    Removed(usize),
    /// Nothing changed (zero size for an absent price, or unusable price).
    Unchanged,
}

/// One side of a book, kept sorted best-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSet {
    side: BookSide,
    levels: Vec<PriceLevel>,
}

impl LevelSet {
    /// Create an empty side.
    pub fn new(side: BookSide) -> Self {
        Self {
            side,
            levels: Vec::new(),
        }
    }

    /// Build a side from unsorted levels.
    ///
    /// Zero-size and non-positive-price entries are discarded. When the same
    /// price appears more than once, the later entry wins.
    pub fn from_levels(side: BookSide, levels: impl IntoIterator<Item = PriceLevel>) -> Self {
        let mut sorted: Vec<PriceLevel> = levels
            .into_iter()
            .filter(|level| level.price.is_positive() && !level.size.is_zero())
            .collect();

        // Stable: equal prices keep input order, so the last one wins below.
        sorted.sort_by(|a, b| price_order(side, a.price, b.price));

        let mut levels: Vec<PriceLevel> = Vec::with_capacity(sorted.len());
        for level in sorted {
            match levels.last_mut() {
                Some(last) if last.price == level.price => *last = level,
                _ => levels.push(level),
            }
        }

        Self { side, levels }
    }

    /// Locate a price: `Ok(index)` if present, `Err(insertion_index)` if not.
    pub fn find(&self, price: Price) -> Result<usize, usize> {
        let side = self.side;
        self.levels
            .binary_search_by(|probe| price_order(side, probe.price, price))
    }

    /// Apply an absolute size for a price.
    ///
    /// Zero size deletes the level (no-op when absent); an existing price
    /// gets its size replaced; a new price is inserted at its sorted slot.
    pub fn apply(&mut self, price: Price, size: Size) -> LevelChange {
        if !price.is_positive() {
            return LevelChange::Unchanged;
        }

        match (self.find(price), size.is_zero()) {
            (Ok(index), true) => {
                self.levels.remove(index);
                LevelChange::Removed(index)
            }
            (Err(_), true) => LevelChange::Unchanged,
            (Ok(index), false) => {
                let resting = self.levels[index].price;
                self.levels[index] = PriceLevel::new(resting, size);
                LevelChange::Updated(index)
            }
            (Err(index), false) => {
                self.levels.insert(index, PriceLevel::new(price, size));
                LevelChange::Inserted(index)
            }
        }
    }

    /// Level at a price, if resting.
    pub fn get(&self, price: Price) -> Option<&PriceLevel> {
        self.find(price).ok().map(|index| &self.levels[index])
    }

    /// Best level (highest bid / lowest ask).
    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    pub fn best_price(&self) -> Option<Price> {
        self.best().map(|level| level.price)
    }

    /// Sum of all resting sizes on this side.
    pub fn total_size(&self) -> Decimal {
        self.levels.iter().map(|level| level.size.as_decimal()).sum()
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Check the side invariants.
    pub fn is_well_formed(&self) -> bool {
        self.levels.iter().all(|level| level.price.is_positive() && !level.size.is_zero())
            && self
                .levels
                .windows(2)
                .all(|pair| price_order(self.side, pair[0].price, pair[1].price) == Ordering::Less)
    }
}

/// Sort order of two prices on a side: `Less` means `a` is the better price.
fn price_order(side: BookSide, a: Price, b: Price) -> Ordering {
    match side {
        BookSide::Bid => b.cmp(&a),
        BookSide::Ask => a.cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: &str, size: &str) -> PriceLevel {
        PriceLevel::new(Price::parse(price).unwrap(), Size::parse(size).unwrap())
    }

    fn prices(set: &LevelSet) -> Vec<String> {
        set.levels().iter().map(|l| l.price.to_string()).collect()
    }

    #[test]
    fn test_from_levels_sorts_bids_descending() {
        let set = LevelSet::from_levels(
            BookSide::Bid,
            vec![level("0.40", "10"), level("0.45", "5"), level("0.42", "7")],
        );
        assert_eq!(prices(&set), vec!["0.45", "0.42", "0.40"]);
        assert_eq!(set.best_price(), Some(Price::parse("0.45").unwrap()));
        assert!(set.is_well_formed());
    }

    #[test]
    fn test_from_levels_sorts_asks_ascending() {
        let set = LevelSet::from_levels(
            BookSide::Ask,
            vec![level("0.60", "10"), level("0.55", "5"), level("0.58", "7")],
        );
        assert_eq!(prices(&set), vec!["0.55", "0.58", "0.60"]);
        assert!(set.is_well_formed());
    }

    #[test]
    fn test_from_levels_drops_zero_and_collapses_duplicates() {
        let set = LevelSet::from_levels(
            BookSide::Ask,
            vec![
                level("0.55", "5"),
                level("0.56", "0"),
                level("0.55", "9"),
                PriceLevel::new(Price::ZERO, Size::parse("3").unwrap()),
            ],
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.levels()[0].size, Size::parse("9").unwrap());
    }

    #[test]
    fn test_apply_inserts_in_order() {
        let mut set = LevelSet::from_levels(BookSide::Bid, vec![level("0.45", "5"), level("0.40", "1")]);

        let change = set.apply(Price::parse("0.42").unwrap(), Size::parse("3").unwrap());
        assert_eq!(change, LevelChange::Inserted(1));
        assert_eq!(prices(&set), vec!["0.45", "0.42", "0.40"]);

        let change = set.apply(Price::parse("0.50").unwrap(), Size::parse("3").unwrap());
        assert_eq!(change, LevelChange::Inserted(0));
        assert_eq!(set.best_price(), Some(Price::parse("0.50").unwrap()));
    }

    #[test]
    fn test_apply_updates_size_in_place() {
        let mut set = LevelSet::from_levels(BookSide::Ask, vec![level("0.55", "5"), level("0.60", "1")]);

        let change = set.apply(Price::parse("0.600").unwrap(), Size::parse("8").unwrap());
        assert_eq!(change, LevelChange::Updated(1));
        assert_eq!(set.len(), 2);
        assert_eq!(set.levels()[1].size, Size::parse("8").unwrap());
        assert_eq!(set.levels()[1].price.to_string(), "0.60");
    }

    #[test]
    fn test_apply_zero_removes() {
        let mut set = LevelSet::from_levels(BookSide::Ask, vec![level("0.55", "5"), level("0.60", "1")]);

        let change = set.apply(Price::parse("0.55").unwrap(), Size::ZERO);
        assert_eq!(change, LevelChange::Removed(0));
        assert_eq!(prices(&set), vec!["0.60"]);
    }

    #[test]
    fn test_apply_zero_for_absent_price_is_noop() {
        let mut set = LevelSet::from_levels(BookSide::Bid, vec![level("0.45", "5")]);
        let before = set.clone();

        let change = set.apply(Price::parse("0.30").unwrap(), Size::ZERO);
        assert_eq!(change, LevelChange::Unchanged);
        assert_eq!(set, before);
    }

    #[test]
    fn test_apply_rejects_zero_price() {
        let mut set = LevelSet::new(BookSide::Bid);
        assert_eq!(set.apply(Price::ZERO, Size::parse("1").unwrap()), LevelChange::Unchanged);
        assert!(set.is_empty());
    }

    #[test]
    fn test_total_size() {
        let set = LevelSet::from_levels(BookSide::Bid, vec![level("0.45", "5"), level("0.40", "1.5")]);
        assert_eq!(set.total_size(), Decimal::from_str_exact("6.5").unwrap());
        assert_eq!(LevelSet::new(BookSide::Ask).total_size(), Decimal::ZERO);
    }

    #[test]
    fn test_get() {
        let set = LevelSet::from_levels(BookSide::Bid, vec![level("0.45", "5")]);
        assert!(set.get(Price::parse("0.45").unwrap()).is_some());
        assert!(set.get(Price::parse("0.44").unwrap()).is_none());
    }
}
