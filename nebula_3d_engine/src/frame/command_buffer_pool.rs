/// Command-buffer pool - pre-allocated secondary command lists per lane and ring slot.
///
/// `lanes × frames_in_flight` secondaries are allocated once; nothing is
/// allocated while recording. Each entry tracks whether it was opened this
/// frame so repeated `get` calls reuse the open list instead of re-beginning it.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, CommandListLevel, GraphicsDevice, InheritanceInfo};

/// Recording state of a pooled command list within the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Reset, not begun this frame
    Initial,
    /// Begun, accepting commands
    Recording,
    /// Ended, may be executed into a primary list
    Executable,
}

struct PoolEntry {
    list: Option<Box<dyn CommandList>>,
    state: EntryState,
}

fn misuse(message: String) -> Error {
    crate::engine_error!("nebula3d::frame", "{}", message);
    Error::SynchronizationMisuse(message)
}

/// A pooled command list moved out to a worker thread
///
/// Tracks its own open/ended state so the pool can check the list back in
/// with the right state.
pub struct CheckedOutList {
    lane: usize,
    slot: usize,
    list: Box<dyn CommandList>,
    state: EntryState,
}

impl CheckedOutList {
    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == EntryState::Recording
    }

    /// The list, for recording
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` once the list has been ended.
    pub fn commands(&mut self) -> Result<&mut dyn CommandList> {
        if self.state != EntryState::Recording {
            return Err(misuse(format!(
                "recording into lane {} command list which is {:?}",
                self.lane, self.state
            )));
        }
        Ok(self.list.as_mut())
    }

    /// End recording; a list is ended at most once per frame
    pub fn end(&mut self) -> Result<()> {
        if self.state != EntryState::Recording {
            return Err(misuse(format!(
                "end on lane {} command list which is {:?}",
                self.lane, self.state
            )));
        }
        self.list.end()?;
        self.state = EntryState::Executable;
        Ok(())
    }
}

/// Pool of secondary command lists, one per (lane, ring slot)
pub struct CommandBufferPool {
    device: Arc<dyn GraphicsDevice>,
    lanes: usize,
    frames: usize,
    entries: Vec<PoolEntry>,
    current_slot: usize,
    opened: Vec<usize>,
}

impl CommandBufferPool {
    /// Allocate every secondary list up front
    ///
    /// # Arguments
    ///
    /// * `device` - Device allocating the lists
    /// * `lanes` - Recording lanes (workers plus the serial lane)
    /// * `frames` - Frame-resource ring size
    pub fn new(device: &Arc<dyn GraphicsDevice>, lanes: usize, frames: usize) -> Result<Self> {
        if lanes == 0 || frames == 0 {
            return Err(Error::InitializationFailed(format!(
                "command buffer pool needs at least one lane and one frame ({} x {})",
                lanes, frames
            )));
        }
        let lists = device.allocate_command_lists(CommandListLevel::Secondary, lanes * frames)?;
        if lists.len() != lanes * frames {
            return Err(Error::InitializationFailed(format!(
                "device returned {} secondary command lists, {} requested",
                lists.len(), lanes * frames
            )));
        }
        let entries = lists
            .into_iter()
            .map(|list| PoolEntry { list: Some(list), state: EntryState::Initial })
            .collect();

        Ok(Self {
            device: Arc::clone(device),
            lanes,
            frames,
            entries,
            current_slot: 0,
            opened: Vec::with_capacity(lanes),
        })
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Switch to `slot` and reset its lists to the unopened state
    ///
    /// Only call once the slot's fence has been waited on.
    pub fn begin_frame(&mut self, slot: usize) -> Result<()> {
        if slot >= self.frames {
            return Err(Error::InvalidResource(format!(
                "ring slot {} out of range ({} frames)", slot, self.frames
            )));
        }
        self.current_slot = slot;
        self.clear()
    }

    /// Reset every list of the current slot to the unopened state
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if a list of the slot is still checked out.
    pub fn clear(&mut self) -> Result<()> {
        let range = self.slot_range(self.current_slot);
        for (lane, entry) in self.entries[range].iter_mut().enumerate() {
            match entry.list.as_mut() {
                Some(list) => {
                    if entry.state != EntryState::Initial {
                        list.reset()?;
                    }
                    entry.state = EntryState::Initial;
                }
                None => {
                    return Err(misuse(format!("clear while lane {} is checked out", lane)));
                }
            }
        }
        self.opened.clear();
        Ok(())
    }

    /// The list of `lane` in the current slot, begun on first use this frame
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if the list was already ended this frame or is
    /// checked out.
    pub fn get(&mut self, lane: usize, inheritance: &InheritanceInfo) -> Result<&mut dyn CommandList> {
        let index = self.entry_index(lane)?;
        self.open(index, lane, inheritance)?;
        match self.entries[index].list.as_mut() {
            Some(list) => Ok(list.as_mut()),
            None => Err(misuse(format!("lane {} is checked out", lane))),
        }
    }

    /// Open (if needed) and move the list of `lane` out for recording on another thread
    pub fn checkout(&mut self, lane: usize, inheritance: &InheritanceInfo) -> Result<CheckedOutList> {
        let index = self.entry_index(lane)?;
        self.open(index, lane, inheritance)?;
        let entry = &mut self.entries[index];
        match entry.list.take() {
            Some(list) => Ok(CheckedOutList {
                lane,
                slot: self.current_slot,
                list,
                state: entry.state,
            }),
            None => Err(misuse(format!("lane {} is already checked out", lane))),
        }
    }

    /// Return a checked-out list to its entry
    pub fn checkin(&mut self, checked_out: CheckedOutList) -> Result<()> {
        if checked_out.slot != self.current_slot {
            return Err(misuse(format!(
                "lane {} list of slot {} checked in during slot {}",
                checked_out.lane, checked_out.slot, self.current_slot
            )));
        }
        let index = self.entry_index(checked_out.lane)?;
        let entry = &mut self.entries[index];
        if entry.list.is_some() {
            return Err(misuse(format!("lane {} was not checked out", checked_out.lane)));
        }
        entry.list = Some(checked_out.list);
        entry.state = checked_out.state;
        Ok(())
    }

    /// Allocate a new list for `lane` of the current slot after its checked-out list was lost
    ///
    /// A checked-out list is lost when its recording job never reports back.
    /// The replacement starts unopened; the lane is not executed this frame.
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if the lane's list is present, or any device
    /// allocation error.
    pub fn replace_lost(&mut self, lane: usize) -> Result<()> {
        let index = self.entry_index(lane)?;
        if self.entries[index].list.is_some() {
            return Err(misuse(format!("lane {} was not lost", lane)));
        }
        let list = self
            .device
            .allocate_command_lists(CommandListLevel::Secondary, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::BackendError("device returned no secondary command list".to_string()))?;
        let entry = &mut self.entries[index];
        entry.list = Some(list);
        entry.state = EntryState::Initial;
        crate::engine_warn!(
            "nebula3d::frame",
            "Replaced lost command list of lane {} in slot {}",
            lane, self.current_slot
        );
        Ok(())
    }

    /// End the list of `lane`
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if the list is not recording (never opened,
    /// already ended, or checked out).
    pub fn end(&mut self, lane: usize) -> Result<()> {
        let index = self.entry_index(lane)?;
        let entry = &mut self.entries[index];
        match (entry.list.as_mut(), entry.state) {
            (Some(list), EntryState::Recording) => {
                list.end()?;
                entry.state = EntryState::Executable;
                Ok(())
            }
            (None, _) => Err(misuse(format!("end on checked out lane {}", lane))),
            (Some(_), state) => Err(misuse(format!("end on lane {} which is {:?}", lane, state))),
        }
    }

    /// End every list of the current slot that is still recording
    ///
    /// Used on failure paths; returns the first error after trying all lanes.
    pub fn end_open(&mut self) -> Result<()> {
        let mut first_error = None;
        let range = self.slot_range(self.current_slot);
        for entry in &mut self.entries[range] {
            if entry.state != EntryState::Recording {
                continue;
            }
            if let Some(list) = entry.list.as_mut() {
                match list.end() {
                    Ok(()) => entry.state = EntryState::Executable,
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// State of the list of `lane` in the current slot
    pub fn state(&self, lane: usize) -> Option<EntryState> {
        let index = self.entry_index(lane).ok()?;
        Some(self.entries[index].state)
    }

    /// Lanes opened this frame, in the order they were first opened
    pub fn opened_in_order(&self) -> &[usize] {
        &self.opened
    }

    /// Executable lists of `lanes`, in the given order
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if any of them is still open, never opened, or checked out.
    pub fn executable(&self, lanes: &[usize]) -> Result<Vec<&dyn CommandList>> {
        lanes
            .iter()
            .map(|&lane| {
                let index = self.entry_index(lane)?;
                let entry = &self.entries[index];
                match (entry.list.as_ref(), entry.state) {
                    (Some(list), EntryState::Executable) => Ok(list.as_ref()),
                    (None, _) => Err(misuse(format!("executing checked out lane {}", lane))),
                    (Some(_), state) => {
                        Err(misuse(format!("executing lane {} which is {:?}", lane, state)))
                    }
                }
            })
            .collect()
    }

    fn open(&mut self, index: usize, lane: usize, inheritance: &InheritanceInfo) -> Result<()> {
        let entry = &mut self.entries[index];
        match entry.state {
            EntryState::Recording => Ok(()),
            EntryState::Executable => Err(misuse(format!(
                "lane {} was already ended this frame", lane
            ))),
            EntryState::Initial => {
                let list = entry
                    .list
                    .as_mut()
                    .ok_or_else(|| misuse(format!("lane {} is checked out", lane)))?;
                list.begin_secondary(inheritance)?;
                entry.state = EntryState::Recording;
                self.opened.push(lane);
                Ok(())
            }
        }
    }

    fn entry_index(&self, lane: usize) -> Result<usize> {
        if lane >= self.lanes {
            return Err(Error::InvalidResource(format!(
                "lane {} out of range ({} lanes)", lane, self.lanes
            )));
        }
        Ok(self.current_slot * self.lanes + lane)
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        slot * self.lanes..(slot + 1) * self.lanes
    }
}

#[cfg(test)]
#[path = "command_buffer_pool_tests.rs"]
mod tests;
