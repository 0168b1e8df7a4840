use fsync_jobqueue::JobQueue;

/// Pull order policy selecting a `JobQueue` sort, applied once per
/// enumeration round before workers start popping (§4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOrder {
    Random,
    Alphabetic,
    SmallestFirst,
    LargestFirst,
    OldestFirst,
    NewestFirst,
}

impl PullOrder {
    pub fn apply(self, queue: &JobQueue) {
        match self {
            PullOrder::Random => queue.shuffle(),
            PullOrder::Alphabetic => queue.sort_alphabetic(),
            PullOrder::SmallestFirst => queue.sort_smallest_first(),
            PullOrder::LargestFirst => queue.sort_largest_first(),
            PullOrder::OldestFirst => queue.sort_oldest_first(),
            PullOrder::NewestFirst => queue.sort_newest_first(),
        }
    }
}
