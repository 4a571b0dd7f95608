//! Minimal set-associative L2 tag model used by the harness to produce
//! hit/miss stimulus for the response stage.  Replacement policy and real
//! tag-check timing are out of scope; this only has to be plausible.

#[derive(Debug)]
struct TagSet {
    slots: Vec<Option<u64>>,
    // LRU order, most recent first.
    order: Vec<usize>,
}

impl TagSet {
    fn new(ways: usize) -> Self {
        Self {
            slots: vec![None; ways],
            order: (0..ways).collect(),
        }
    }

    fn find(&self, line_addr: u64) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(line_addr))
    }

    fn touch(&mut self, way: usize) {
        if let Some(pos) = self.order.iter().position(|&w| w == way) {
            self.order.remove(pos);
        }
        self.order.insert(0, way);
    }

    fn victim(&self) -> usize {
        self.slots
            .iter()
            .position(|slot| slot.is_none())
            .unwrap_or_else(|| *self.order.last().unwrap_or(&0))
    }
}

#[derive(Debug)]
pub struct L2TagArray {
    sets: Vec<TagSet>,
}

impl L2TagArray {
    pub fn new(sets: usize, ways: usize) -> Self {
        let sets = sets.max(1);
        let ways = ways.max(1);
        Self {
            sets: (0..sets).map(|_| TagSet::new(ways)).collect(),
        }
    }

    fn set_index(&self, line_addr: u64) -> usize {
        (line_addr as usize) % self.sets.len()
    }

    pub fn probe(&mut self, line_addr: u64) -> bool {
        let idx = self.set_index(line_addr);
        let set = &mut self.sets[idx];
        match set.find(line_addr) {
            Some(way) => {
                set.touch(way);
                true
            }
            None => false,
        }
    }

    /// Bring a line in, evicting the LRU way if the set is full.  Returns the
    /// evicted line address, if any.
    pub fn fill(&mut self, line_addr: u64) -> Option<u64> {
        let idx = self.set_index(line_addr);
        let set = &mut self.sets[idx];
        if let Some(way) = set.find(line_addr) {
            set.touch(way);
            return None;
        }
        let way = set.victim();
        let evicted = set.slots[way].take();
        set.slots[way] = Some(line_addr);
        set.touch(way);
        evicted
    }

    /// Drop a line, e.g. on flush or data-invalidate.  Returns whether it was
    /// present.
    pub fn invalidate(&mut self, line_addr: u64) -> bool {
        let idx = self.set_index(line_addr);
        let set = &mut self.sets[idx];
        match set.find(line_addr) {
            Some(way) => {
                set.slots[way] = None;
                demote(set, way);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        for set in &mut self.sets {
            let ways = set.slots.len();
            set.slots.iter_mut().for_each(|slot| *slot = None);
            set.order.clear();
            set.order.extend(0..ways);
        }
    }
}

// Demote an invalidated way to LRU so it becomes the next victim.
fn demote(set: &mut TagSet, way: usize) {
    if let Some(pos) = set.order.iter().position(|&w| w == way) {
        set.order.remove(pos);
    }
    set.order.push(way);
}
