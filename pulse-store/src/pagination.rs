//! Tie-preserving pagination over a timestamp-ordered row stream.
//!
//! Taking the first `page_size` rows naively could split a run of records
//! sharing one timestamp across two pages, making the records on either
//! side of the split non-deterministic across repeated reads. Instead rows
//! are accumulated into same-timestamp groups and committed whole:
//! - the first group of a page is committed unconditionally, even if it
//!   alone exceeds `page_size` (forward progress);
//! - a later group is committed only if it fits within `page_size`;
//! - a group that does not fit is discarded entirely and its timestamp
//!   becomes the next page token, so the following read re-fetches that
//!   whole group.
//!
//! The state machine is pure and incremental: the store drives it row by
//! row and stops pulling from the database as soon as it reports done.

use pulse_core::PageToken;

#[derive(Debug, Clone, PartialEq)]
pub struct PagedRows<T> {
    pub items: Vec<T>,
    pub next_token: Option<PageToken>,
}

#[derive(Debug)]
pub struct GroupPaginator<T> {
    page_size: usize,
    ascending: bool,
    committed: Vec<T>,
    pending: Vec<T>,
    pending_time: Option<i64>,
    next_token: Option<PageToken>,
    done: bool,
}

impl<T> GroupPaginator<T> {
    pub fn new(page_size: usize, ascending: bool) -> Self {
        Self {
            page_size: page_size.max(1),
            ascending,
            committed: Vec::new(),
            pending: Vec::new(),
            pending_time: None,
            next_token: None,
            done: false,
        }
    }

    /// Feeds the next row, in stream order. Returns `false` once the page
    /// is complete and no further rows should be fetched.
    pub fn push(&mut self, time_millis: i64, item: T) -> bool {
        if self.done {
            return false;
        }

        match self.pending_time {
            None => {
                self.pending_time = Some(time_millis);
                self.pending.push(item);
                true
            }
            Some(t) if t == time_millis => {
                self.pending.push(item);
                true
            }
            Some(t) => {
                if self.committed.is_empty() {
                    // First group of the page: committed whole regardless
                    // of size, so a page is never empty while rows exist.
                    self.committed.append(&mut self.pending);
                } else if self.committed.len() + self.pending.len() <= self.page_size {
                    self.committed.append(&mut self.pending);
                } else {
                    // The pending group does not fit; drop it and anchor
                    // the next page at its timestamp.
                    self.pending.clear();
                    self.next_token = Some(PageToken::new(t, self.ascending));
                    self.done = true;
                    return false;
                }

                if self.committed.len() >= self.page_size {
                    // Page full; the row just received opens the next page.
                    self.next_token = Some(PageToken::new(time_millis, self.ascending));
                    self.done = true;
                    return false;
                }

                self.pending_time = Some(time_millis);
                self.pending.push(item);
                true
            }
        }
    }

    /// Consumes the paginator at stream exhaustion (or after `push`
    /// returned `false`) and yields the page.
    pub fn finish(mut self) -> PagedRows<T> {
        if !self.done && !self.pending.is_empty() {
            let fits = self.committed.len() + self.pending.len() <= self.page_size;
            if self.committed.is_empty() || fits {
                self.committed.append(&mut self.pending);
            } else if let Some(t) = self.pending_time {
                self.next_token = Some(PageToken::new(t, self.ascending));
            }
        }
        PagedRows {
            items: self.committed,
            next_token: self.next_token,
        }
    }
}

/// Runs the paginator over an already-materialized row sequence. The store
/// streams instead; this entry point serves tests and in-memory callers.
pub fn paginate<T>(
    rows: impl IntoIterator<Item = (i64, T)>,
    page_size: usize,
    ascending: bool,
) -> PagedRows<T> {
    let mut paginator = GroupPaginator::new(page_size, ascending);
    for (time_millis, item) in rows {
        if !paginator.push(time_millis, item) {
            break;
        }
    }
    paginator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(ts: &[i64]) -> Vec<(i64, i64)> {
        // Item payload = its index, so assertions can track identity.
        ts.iter().enumerate().map(|(i, t)| (*t, i as i64)).collect()
    }

    fn page_times(ts: &[i64], page_size: usize) -> (Vec<i64>, Option<i64>) {
        let page = paginate(times(ts), page_size, true);
        let kept: Vec<i64> = page.items.iter().map(|i| ts[*i as usize]).collect();
        (kept, page.next_token.map(|t| t.time_millis))
    }

    // ========================================================================
    // TEST 1: distinct timestamps fill the page and anchor at the next row
    // ========================================================================
    #[test]
    fn test_distinct_times_fill_page() {
        let (kept, token) = page_times(&[1, 2, 3, 4, 5], 3);
        assert_eq!(kept, vec![1, 2, 3]);
        assert_eq!(token, Some(4));
    }

    // ========================================================================
    // TEST 2: a tie group that would overflow is discarded whole
    // ========================================================================
    #[test]
    fn test_tie_group_never_torn() {
        let (kept, token) = page_times(&[1, 1, 2, 2, 3], 3);
        assert_eq!(kept, vec![1, 1]);
        assert_eq!(token, Some(2));
    }

    // ========================================================================
    // TEST 3: forward progress: an oversized leading group is returned whole
    // ========================================================================
    #[test]
    fn test_oversized_first_group_returned_whole() {
        let (kept, token) = page_times(&[5, 5, 5, 5], 2);
        assert_eq!(kept, vec![5, 5, 5, 5]);
        assert_eq!(token, None);
    }

    #[test]
    fn test_oversized_first_group_with_following_rows() {
        let (kept, token) = page_times(&[5, 5, 5, 7], 2);
        assert_eq!(kept, vec![5, 5, 5]);
        assert_eq!(token, Some(7));
    }

    // ========================================================================
    // TEST 4: exhaustion with a fitting final group yields no token
    // ========================================================================
    #[test]
    fn test_exhaustion_commits_final_group() {
        let (kept, token) = page_times(&[1, 2, 3], 3);
        assert_eq!(kept, vec![1, 2, 3]);
        assert_eq!(token, None);
    }

    // ========================================================================
    // TEST 5: exhaustion with an overflowing final group anchors on it
    // ========================================================================
    #[test]
    fn test_exhaustion_overflow_anchors() {
        let (kept, token) = page_times(&[1, 2, 2, 2], 2);
        assert_eq!(kept, vec![1]);
        assert_eq!(token, Some(2));
    }

    // ========================================================================
    // TEST 6: empty stream
    // ========================================================================
    #[test]
    fn test_empty_stream() {
        let (kept, token) = page_times(&[], 3);
        assert!(kept.is_empty());
        assert_eq!(token, None);
    }

    // ========================================================================
    // TEST 7: descending stream anchors with descending tokens
    // ========================================================================
    #[test]
    fn test_descending_anchors() {
        let rows = times(&[9, 7, 7, 4]);
        let page = paginate(rows, 2, false);
        let kept: Vec<i64> = page.items.iter().map(|i| [9, 7, 7, 4][*i as usize]).collect();
        assert_eq!(kept, vec![9]);
        let token = page.next_token.unwrap();
        assert_eq!(token.time_millis, 7);
        assert!(!token.ascending);
    }

    // ========================================================================
    // TEST 8: paging to exhaustion partitions the stream without tearing
    // ========================================================================
    #[test]
    fn test_paged_reads_partition_the_stream() {
        let ts = [1, 1, 1, 3, 3, 5, 6, 6, 6, 6, 8, 9, 9, 12];
        for page_size in 1..=ts.len() + 1 {
            let mut collected: Vec<i64> = Vec::new();
            let mut remaining: Vec<(i64, i64)> = times(&ts);
            let mut guard = 0;
            loop {
                let page = paginate(remaining.clone(), page_size, true);
                collected.extend(page.items.iter().map(|i| ts[*i as usize]));
                match page.next_token {
                    // Resume exactly at the anchor, as the store's WHERE
                    // clause would.
                    Some(token) => {
                        remaining.retain(|(t, _)| *t >= token.time_millis);
                    }
                    None => break,
                }
                guard += 1;
                assert!(guard < 100, "pagination failed to make progress");
            }
            assert_eq!(collected, ts.to_vec(), "page_size {page_size}");
        }
    }

    // ========================================================================
    // TEST 9: pages never split a timestamp group across a boundary
    // ========================================================================
    #[test]
    fn test_no_group_spans_a_page_boundary() {
        let ts = [2, 2, 2, 4, 4, 7, 7, 7, 9];
        for page_size in 1..=5 {
            let page = paginate(times(&ts), page_size, true);
            if let Some(token) = page.next_token {
                let last_kept = page.items.last().map(|i| ts[*i as usize]);
                // The anchor group must not be partially present.
                assert_ne!(last_kept, Some(token.time_millis));
            }
        }
    }
}
