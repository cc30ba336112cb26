//! A bounded binary heap ordered by a caller-supplied `less_than`.
//!
//! The smallest element sits at the top. Once the queue is full, inserting an
//! element displaces the top only if the new element is not smaller, which makes
//! the queue a natural "keep the best N" collector. Elements whose ordering key
//! changes while they sit at the top (scorer cursors, for instance) are
//! re-positioned with [`PriorityQueue::down`].

use std::fmt;

/// Outcome of [`PriorityQueue::insert`].
#[derive(Debug, PartialEq)]
pub enum Insert<T> {
    /// The queue had room.
    Added,
    /// The queue was full; the previous top was evicted.
    Displaced(T),
    /// The queue was full and the element was smaller than the top.
    Dropped(T),
}

pub struct PriorityQueue<T, F = fn(&T, &T) -> bool> {
    heap: Vec<T>,
    capacity: usize,
    less_than: F,
}

impl<T: fmt::Debug, F> fmt::Debug for PriorityQueue<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("heap", &self.heap)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    pub fn new(capacity: usize, less_than: F) -> Self {
        PriorityQueue {
            heap: Vec::with_capacity(capacity.min(1024)),
            capacity,
            less_than,
        }
    }

    /// A queue without a size bound.
    pub fn unbounded(less_than: F) -> Self {
        PriorityQueue {
            heap: Vec::new(),
            capacity: usize::MAX,
            less_than,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Add an element regardless of the capacity.
    pub fn push(&mut self, elem: T) {
        self.heap.push(elem);
        self.up(self.heap.len() - 1);
    }

    /// Add an element, respecting the capacity.
    pub fn insert(&mut self, elem: T) -> Insert<T> {
        if self.heap.len() < self.capacity {
            self.push(elem);
            Insert::Added
        } else if !self.heap.is_empty() && !(self.less_than)(&elem, &self.heap[0]) {
            let old = std::mem::replace(&mut self.heap[0], elem);
            self.down();
            Insert::Displaced(old)
        } else {
            Insert::Dropped(elem)
        }
    }

    pub fn top(&self) -> Option<&T> {
        self.heap.first()
    }

    /// Mutable access to the top. Call [`PriorityQueue::down`] after changing
    /// anything the ordering depends on.
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.heap.first_mut()
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        self.down();
        top
    }

    /// Restore the heap order after the top element changed.
    pub fn down(&mut self) {
        let len = self.heap.len();
        let mut i = 0;
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && (self.less_than)(&self.heap[right], &self.heap[left]) {
                child = right;
            }
            if !(self.less_than)(&self.heap[child], &self.heap[i]) {
                break;
            }
            self.heap.swap(i, child);
            i = child;
        }
    }

    fn up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !(self.less_than)(&self.heap[i], &self.heap[parent]) {
                break;
            }
            self.heap.swap(i, parent);
            i = parent;
        }
    }

    /// Elements in heap order (not sorted).
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.heap.iter()
    }

    /// Drain into a vector sorted from largest to smallest.
    pub fn into_sorted_desc(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(elem) = self.pop() {
            out.push(elem);
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_lt(a: &i32, b: &i32) -> bool {
        a < b
    }

    #[test]
    fn test_pop_order() {
        let mut pq: PriorityQueue<i32> = PriorityQueue::unbounded(int_lt);
        for v in [5, 1, 4, 2, 3, 9, 0] {
            pq.push(v);
        }
        let mut popped = Vec::new();
        while let Some(v) = pq.pop() {
            popped.push(v);
        }
        assert_eq!(popped, vec![0, 1, 2, 3, 4, 5, 9]);
    }

    #[test]
    fn test_bounded_insert_keeps_largest() {
        let mut pq: PriorityQueue<i32> = PriorityQueue::new(3, int_lt);
        assert_eq!(pq.insert(5), Insert::Added);
        assert_eq!(pq.insert(1), Insert::Added);
        assert_eq!(pq.insert(7), Insert::Added);
        assert!(pq.is_full());
        assert_eq!(pq.insert(0), Insert::Dropped(0));
        assert_eq!(pq.insert(6), Insert::Displaced(1));
        assert_eq!(pq.top(), Some(&5));
        assert_eq!(pq.into_sorted_desc(), vec![7, 6, 5]);
    }

    #[test]
    fn test_adjust_top() {
        let mut pq: PriorityQueue<i32> = PriorityQueue::unbounded(int_lt);
        for v in [1, 3, 5] {
            pq.push(v);
        }
        if let Some(top) = pq.top_mut() {
            *top = 4;
        }
        pq.down();
        assert_eq!(pq.pop(), Some(3));
        assert_eq!(pq.pop(), Some(4));
        assert_eq!(pq.pop(), Some(5));
        assert_eq!(pq.pop(), None);
    }

    #[test]
    fn test_capturing_comparator() {
        let keys = [30, 10, 20];
        let mut pq = PriorityQueue::unbounded(|a: &usize, b: &usize| keys[*a] < keys[*b]);
        pq.push(0);
        pq.push(1);
        pq.push(2);
        assert_eq!(pq.pop(), Some(1));
        assert_eq!(pq.pop(), Some(2));
        assert_eq!(pq.len(), 1);
    }
}
