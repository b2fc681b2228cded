// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-capacity free list of dynamic slices handed out at runtime.

use crate::error::AllocationError;
use std::collections::VecDeque;

/// Hands out the reserved client slots of a buffer.
///
/// Slots are numbered after the clients assigned at compile time. Released slots
/// go to the back of the queue, so a slot is reused only after every other free
/// slot has been handed out.
#[derive(Debug, Clone, Default)]
pub struct DynamicSlicePool {
    label: String,
    first: u32,
    capacity: u32,
    free: VecDeque<u32>,
    in_use: Vec<bool>,
}

impl DynamicSlicePool {
    /// Creates a pool of `capacity` slots starting at client `first`.
    pub fn new(label: impl Into<String>, first: u32, capacity: u32) -> Self {
        Self {
            label: label.into(),
            first,
            capacity,
            free: (first..first + capacity).collect(),
            in_use: vec![false; capacity as usize],
        }
    }

    /// Takes a free slot.
    ///
    /// # Errors
    ///
    /// `AllocationError::Exhausted` when every slot is in use.
    pub fn acquire(&mut self) -> Result<u32, AllocationError> {
        let slot = self.free.pop_front().ok_or_else(|| AllocationError::Exhausted {
            buffer: self.label.clone(),
            capacity: self.capacity,
        })?;
        self.in_use[(slot - self.first) as usize] = true;
        Ok(slot)
    }

    /// Returns a slot to the pool.
    ///
    /// # Errors
    ///
    /// `AllocationError::NotAcquired` when the slot is not currently handed out.
    pub fn release(&mut self, slot: u32) -> Result<(), AllocationError> {
        let in_use = slot
            .checked_sub(self.first)
            .and_then(|i| self.in_use.get_mut(i as usize))
            .filter(|used| **used);
        match in_use {
            Some(used) => {
                *used = false;
                self.free.push_back(slot);
                Ok(())
            }
            None => Err(AllocationError::NotAcquired {
                buffer: self.label.clone(),
                slot,
            }),
        }
    }

    /// Number of slots currently handed out.
    pub fn in_use(&self) -> u32 {
        self.in_use.iter().filter(|u| **u).count() as u32
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
