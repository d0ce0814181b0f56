/// Bookmarked page numbers in the order they were added.
///
/// Entries are never deduplicated; bookmarking the same page twice lists it
/// twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bookmarks {
    pages: Vec<u32>,
}

impl Bookmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, page: u32) {
        self.pages.push(page);
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.pages.get(index).copied()
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_duplicates() {
        let mut bookmarks = Bookmarks::new();
        bookmarks.add(3);
        bookmarks.add(1);
        bookmarks.add(3);

        assert_eq!(bookmarks.pages(), &[3, 1, 3]);
        assert_eq!(bookmarks.get(2), Some(3));
        assert_eq!(bookmarks.get(3), None);
    }
}
