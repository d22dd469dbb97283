use std::cmp::min;
use std::ops::Index;

use log::info;

use crate::utils::MyHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Append-only hash-consing table.
///
/// Values are stored once; [`put`][Table::put] returns the index of an equal
/// value if one already exists. Index `0` is a sentry and never holds a value.
pub struct Table<T> {
    data: Vec<Entry<T>>,

    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with an initial capacity of `2^bits`.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1 << bits;
        let mut data: Vec<Entry<T>> = Vec::with_capacity(capacity);
        data.push(Entry {
            value: T::default(),
            next: 0,
        }); // sentry

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;
        let buckets = vec![0; buckets_size];
        let bitmask = (buckets_size - 1) as u64;

        Self {
            data,
            buckets,
            bitmask,
        }
    }
}

impl<T> Table<T> {
    /// Get the number of stored values.
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }

    /// Get the current allocated capacity.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index].value
    }

    /// Get the index of the next cell in the same bucket.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }

    /// Add a new value to the table (without deduplication) and return its index.
    pub fn add(&mut self, value: T) -> usize {
        if self.data.len() == self.data.capacity() {
            info!("table: growing beyond {} entries", self.data.capacity());
        }
        self.data.push(Entry { value, next: 0 });
        self.data.len() - 1
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Find the index of a value equal to `value`, if present.
    pub fn find(&self, value: &T) -> Option<usize> {
        let mut index = self.buckets[self.bucket_index(value)];
        while index != 0 {
            if self.value(index) == value {
                return Some(index);
            }
            index = self.next(index);
        }
        None
    }

    /// Put a new value into the table and return its index.
    pub fn put(&mut self, value: T) -> usize {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            // Create new node and put it into the bucket.
            let i = self.add(value);
            self.buckets[bucket_index] = i;
            return i;
        }

        loop {
            assert!(index > 0);

            if &value == self.value(index) {
                // The node already exists.
                return index;
            }

            let next = self.next(index);

            if next == 0 {
                // Create new node and append it to the bucket.
                let i = self.add(value);
                self.data[index].next = i;
                return i;
            } else {
                // Go to the next node in the bucket.
                index = next;
            }
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_add() {
        let mut table = Table::new(2);
        let index = table.add(Item(42));
        assert_eq!(index, 1);
        assert_eq!(table[index], Item(42));
        assert_eq!(table.next(index), 0);
    }

    #[test]
    fn test_put() {
        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        assert_eq!(table.next(index1), index2);
        assert_eq!(table.put(Item(-5)), index2);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn test_find() {
        let mut table = Table::new(2);
        let index = table.put(Item(7));
        assert_eq!(table.find(&Item(7)), Some(index));
        assert_eq!(table.find(&Item(-7)), None);
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut table = Table::new(1);
        let indices: Vec<usize> = (0..100).map(|i| table.put(Item(i))).collect();
        assert_eq!(table.size(), 100);
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table[index], Item(i as i32));
        }
    }
}
