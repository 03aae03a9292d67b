// Addressable verses of the Bhagavad Gita

use serde::{Deserialize, Serialize};
use std::fmt;

// verses per chapter, chapter 1 first
pub const VERSES_PER_CHAPTER: [u16; 18] = [
    47, 72, 43, 42, 29, 47, 30, 28, 34, 42, 55, 20, 35, 27, 20, 24, 28, 78,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseRef {
    pub chapter: u16,
    pub verse: u16,
}

impl VerseRef {
    pub const fn new(chapter: u16, verse: u16) -> Self {
        Self { chapter, verse }
    }

    pub fn is_valid(&self) -> bool {
        verse_count(self.chapter).is_some_and(|count| (1..=count).contains(&self.verse))
    }
}

impl fmt::Display for VerseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

pub fn verse_count(chapter: u16) -> Option<u16> {
    let index = usize::from(chapter).checked_sub(1)?;
    VERSES_PER_CHAPTER.get(index).copied()
}

pub fn all_verses() -> Vec<VerseRef> {
    (1u16..)
        .zip(VERSES_PER_CHAPTER)
        .flat_map(|(chapter, count)| (1..=count).map(move |verse| VerseRef::new(chapter, verse)))
        .collect()
}
