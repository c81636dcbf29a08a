/*
 * search.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, an embeddable mail submission and retrieval engine.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Ordered, capped collection of message identifiers from a SEARCH response.

/// Accumulates SEARCH ids as they are parsed. With recent-sort the list is
/// capped while growing (evicting the oldest entry) and finally sorted
/// descending; without it, insertion order is kept and truncated at the end.
#[derive(Debug, Clone)]
pub struct SearchResult {
    ids: Vec<u32>,
    limit: usize,
    recent_sort: bool,
}

impl SearchResult {
    pub fn new(limit: usize, recent_sort: bool) -> Self {
        Self {
            ids: Vec::new(),
            limit,
            recent_sort,
        }
    }

    pub fn push(&mut self, id: u32) {
        self.ids.push(id);
        if self.recent_sort && self.ids.len() > self.limit {
            self.ids.remove(0);
        }
    }

    /// Apply the final ordering policy once, before iteration begins.
    pub fn finalize(&mut self) {
        if self.recent_sort {
            self.ids.sort_unstable_by(|a, b| b.cmp(a));
        } else {
            self.ids.truncate(self.limit);
        }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
