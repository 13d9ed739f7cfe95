//! Active-level index: one bit per price level per book.
//!
//! Each book (`market, outcome, kind`) owns a [`PriceBitmap`] of
//! [`INDEX_WORDS`] 256-bit words. A bit is set iff the pool at that level
//! has inventory, so a sweep can jump straight to the next tradable level
//! instead of probing all 9,999 of them.

use std::collections::HashMap;

use ethnum::U256;
use poolbook_types::constants::{INDEX_BITS, INDEX_WORDS, MAX_PRICE_BPS, MIN_PRICE_BPS, WORD_BITS};
use poolbook_types::{BookKey, Price};

// ============================================================================
// Bitmap
// ============================================================================

/// Fixed-width bit vector over price levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBitmap {
    words: [U256; INDEX_WORDS],
}

impl Default for PriceBitmap {
    fn default() -> Self {
        Self {
            words: [U256::ZERO; INDEX_WORDS],
        }
    }
}

#[inline]
fn locate(level: u16) -> (usize, u32) {
    let position = usize::from(level);
    // WORD_BITS is 256, so the remainder always fits a u32.
    #[allow(clippy::cast_possible_truncation)]
    let bit = (position % WORD_BITS) as u32;
    (position / WORD_BITS, bit)
}

#[inline]
fn level_of(word: usize, bit: u32) -> Option<u16> {
    u16::try_from(word * WORD_BITS + bit as usize).ok()
}

impl PriceBitmap {
    /// Levels past the last word are ignored.
    pub fn set(&mut self, level: u16, active: bool) {
        if usize::from(level) >= INDEX_BITS {
            return;
        }
        let (word, bit) = locate(level);
        let mask = U256::ONE << bit;
        if active {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    #[must_use]
    pub fn is_set(&self, level: u16) -> bool {
        if usize::from(level) >= INDEX_BITS {
            return false;
        }
        let (word, bit) = locate(level);
        self.words[word] & (U256::ONE << bit) != U256::ZERO
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == U256::ZERO)
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Lowest set level `>= from`.
    #[must_use]
    pub fn lowest_at_or_above(&self, from: u16) -> Option<u16> {
        if usize::from(from) >= INDEX_BITS {
            return None;
        }
        let (start, bit) = locate(from);

        // Current word with bits below `from` masked off.
        let masked = self.words[start] & (U256::MAX << bit);
        if masked != U256::ZERO {
            return level_of(start, masked.trailing_zeros());
        }

        for (offset, word) in self.words[start + 1..].iter().enumerate() {
            if *word != U256::ZERO {
                return level_of(start + 1 + offset, word.trailing_zeros());
            }
        }
        None
    }

    /// Highest set level `<= from`.
    #[must_use]
    pub fn highest_at_or_below(&self, from: u16) -> Option<u16> {
        let clamped = usize::from(from).min(INDEX_BITS - 1);
        let (start, bit) = locate(u16::try_from(clamped).ok()?);

        // Current word with bits above `from` masked off.
        let mask = if bit == 255 {
            U256::MAX
        } else {
            (U256::ONE << (bit + 1)) - U256::ONE
        };
        let masked = self.words[start] & mask;
        if masked != U256::ZERO {
            return level_of(start, 255 - masked.leading_zeros());
        }

        for word_index in (0..start).rev() {
            let word = self.words[word_index];
            if word != U256::ZERO {
                return level_of(word_index, 255 - word.leading_zeros());
            }
        }
        None
    }
}

// ============================================================================
// Index
// ============================================================================

/// Bitmaps for every book that has at least one active level.
#[derive(Debug, Default)]
pub struct PriceIndex {
    books: HashMap<BookKey, PriceBitmap>,
}

impl PriceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `price` active or inactive in `book`.
    pub fn set_bit(&mut self, book: BookKey, price: Price, active: bool) {
        if active {
            self.books.entry(book).or_default().set(price.bps(), true);
        } else if let Some(bitmap) = self.books.get_mut(&book) {
            bitmap.set(price.bps(), false);
            if bitmap.is_empty() {
                self.books.remove(&book);
            }
        }
    }

    #[must_use]
    pub fn is_active(&self, book: &BookKey, price: Price) -> bool {
        self.books
            .get(book)
            .is_some_and(|bitmap| bitmap.is_set(price.bps()))
    }

    /// Lowest active level `>= from` (ask sweeps walk upward).
    #[must_use]
    pub fn best_at_or_above(&self, book: &BookKey, from: u16) -> Option<Price> {
        let from = from.max(MIN_PRICE_BPS);
        let level = self.books.get(book)?.lowest_at_or_above(from)?;
        if level > MAX_PRICE_BPS {
            return None;
        }
        Price::new(level).ok()
    }

    /// Highest active level `<= from` (bid sweeps walk downward).
    #[must_use]
    pub fn best_at_or_below(&self, book: &BookKey, from: u16) -> Option<Price> {
        let from = from.min(MAX_PRICE_BPS);
        let level = self.books.get(book)?.highest_at_or_below(from)?;
        Price::new(level).ok()
    }

    /// Number of active levels in `book`.
    #[must_use]
    pub fn active_levels(&self, book: &BookKey) -> u32 {
        self.books.get(book).map_or(0, PriceBitmap::count)
    }
}
