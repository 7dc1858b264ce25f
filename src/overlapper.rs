use crate::newtypes::NodeId;

/// A genomic interval whose ancestry maps to `node`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Segment {
    pub(crate) left: f64,
    pub(crate) right: f64,
    pub(crate) node: NodeId,
}

/// The segments overlapping `[left, right)`.
#[derive(Debug)]
pub(crate) struct Overlaps<'overlapper> {
    pub(crate) left: f64,
    pub(crate) right: f64,
    pub(crate) segments: &'overlapper [Segment],
}

/// Sweeps along the child segments queued for one parent,
/// yielding each maximal interval over which the set of
/// overlapping segments does not change.
#[derive(Debug, Default)]
pub(crate) struct SegmentOverlapper {
    queue: Vec<Segment>,
    overlaps: Vec<Segment>,
    num_overlaps: usize,
    current_overlap: usize,
    left: f64,
    right: f64,
}

impl SegmentOverlapper {
    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub(crate) fn enqueue(&mut self, left: f64, right: f64, node: NodeId) {
        debug_assert!(right > left);
        self.queue.push(Segment { left, right, node });
    }

    /// Sort the queue, add the sentinel, and reset the sweep.
    pub(crate) fn finalize_queue(&mut self, genome_length: f64) {
        self.queue.sort_unstable_by(|a, b| {
            a.left
                .total_cmp(&b.left)
                .then_with(|| a.node.cmp(&b.node))
        });
        self.num_overlaps = self.queue.len();
        self.queue.push(Segment {
            left: genome_length,
            right: genome_length + 1.0,
            node: NodeId::NULL,
        });
        self.overlaps.clear();
        self.current_overlap = 0;
        self.left = 0.0;
        self.right = f64::MAX;
    }

    fn retain_overlaps_right_of_left(&mut self) -> f64 {
        let left = self.left;
        self.overlaps.retain(|o| o.right > left);
        self.overlaps
            .iter()
            .map(|o| o.right)
            .fold(f64::MAX, f64::min)
    }

    pub(crate) fn calculate_next_overlap_set(&mut self) -> Option<Overlaps<'_>> {
        if self.current_overlap < self.num_overlaps {
            self.left = self.right;
            let mut new_right = self.retain_overlaps_right_of_left();
            if self.overlaps.is_empty() {
                self.left = self.queue[self.current_overlap].left;
            }
            for segment in &self.queue[self.current_overlap..self.num_overlaps] {
                if segment.left == self.left {
                    self.current_overlap += 1;
                    new_right = new_right.min(segment.right);
                    self.overlaps.push(*segment)
                } else {
                    break;
                }
            }
            // The sentinel makes this index valid.
            self.right = new_right.min(self.queue[self.current_overlap].left);
            Some(Overlaps {
                left: self.left,
                right: self.right,
                segments: &self.overlaps,
            })
        } else {
            if !self.overlaps.is_empty() {
                self.left = self.right;
                self.right = self.retain_overlaps_right_of_left();
            }
            if !self.overlaps.is_empty() {
                Some(Overlaps {
                    left: self.left,
                    right: self.right,
                    segments: &self.overlaps,
                })
            } else {
                None
            }
        }
    }
}
