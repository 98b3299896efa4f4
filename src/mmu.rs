//! The memory manager: the kernel service that maps the logical pages of every process onto the
//! fixed pool of physical frames.

use crate::{
    config::MemoryConfig,
    drum::{BackingStore, TransferRequest},
    error::{MemoryError, Result},
    frame::{Frame, FrameDirectory, FrameId},
    interrupt::{Interrupt, InterruptDispatcher},
    io::{IoAction, IoRequest, RefAction},
    page::{PageNumber, PageTable},
    process::ProcessId,
    replacer::{ClockQueue, Replacer},
};
use derivative::Derivative;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// The result of a memory reference.
#[derive(Debug, PartialEq, Eq)]
pub enum Access {
    /// The page was resident in the given frame and the reference has been recorded.
    Hit(FrameId),
    /// The page was missing. A page fault has been raised and the reference is suspended until
    /// the fault is completed.
    Faulted(PendingFault),
}

/// A page fault whose read transfer has been issued but whose page is not yet installed.
///
/// The token is handed back to [`MemoryManager::complete_fault`] once the drum reports that the
/// transfer finished.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending fault must be completed to install the page"]
pub struct PendingFault {
    /// The faulting process.
    process: ProcessId,
    /// The page being fetched.
    page: PageNumber,
    /// The frame reserved for the page.
    frame: FrameId,
    /// The suspended reference that caused the fault, if any.
    access: Option<RefAction>,
}

impl PendingFault {
    /// The faulting process.
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// The page being fetched.
    pub fn page(&self) -> PageNumber {
        self.page
    }

    /// The frame the page is being read into.
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// The reference that will be applied once the page is installed.
    pub fn access(&self) -> Option<RefAction> {
        self.access
    }
}

/// Counters of the work the memory manager has done since the last
/// [`initialize`](MemoryManager::initialize).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Memory references observed through [`MemoryManager::on_access`].
    pub accesses: u64,
    /// Faults begun.
    pub page_faults: u64,
    /// Frames taken away from a resident page.
    pub evictions: u64,
    /// Dirty pages written back before their frame was reused.
    pub write_backs: u64,
    /// Frames returned to the free pool by process termination.
    pub reclaimed: u64,
}

/// The virtual memory manager of the simulated kernel.
///
/// All state that the kernel treats as process-wide (the frame directory, the replacement queue
/// and the page tables) lives in one owned instance. Every entry point runs to completion before
/// the next one starts, so selecting a victim and reserving it for the new page is one step.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MemoryManager {
    /// The sizes this manager was built with.
    config: MemoryConfig,

    /// Every physical frame.
    frames: FrameDirectory,

    /// Installed frames in second-chance scan order.
    queue: ClockQueue,

    /// The page table of every live process.
    page_tables: HashMap<ProcessId, PageTable>,

    /// The page-table base register: the process whose references are being translated.
    ptbr: Option<ProcessId>,

    /// Faults whose page has not been installed yet, and the frames reserved for them.
    pending: HashMap<(ProcessId, PageNumber), FrameId>,

    /// Work counters.
    stats: MemoryStats,

    /// The drum driver.
    #[derivative(Debug = "ignore")]
    drum: Box<dyn BackingStore>,

    /// The interrupt/trap dispatcher.
    #[derivative(Debug = "ignore")]
    dispatcher: Box<dyn InterruptDispatcher>,
}

impl MemoryManager {
    /// Constructs a memory manager with every frame free and unreferenced.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable, or if the frame directory cannot be
    /// allocated. Both are fatal to the simulation.
    pub fn new<D, I>(config: MemoryConfig, drum: D, dispatcher: I) -> Result<Self>
    where
        D: BackingStore + 'static,
        I: InterruptDispatcher + 'static,
    {
        config.validate()?;

        let frames = FrameDirectory::new(config.frames)?;
        let queue = ClockQueue::new(config.frames);

        debug!(
            "Memory initialized with {} frames of {} bytes, {} pages per process",
            config.frames, config.page_size, config.max_pages
        );

        Ok(Self {
            config,
            frames,
            queue,
            page_tables: HashMap::new(),
            ptbr: None,
            pending: HashMap::new(),
            stats: MemoryStats::default(),
            drum: Box::new(drum),
            dispatcher: Box::new(dispatcher),
        })
    }

    /// Returns the manager to its startup state: every frame free and unreferenced, nothing
    /// queued for replacement, nothing in flight, and every page of every attached process
    /// non-resident.
    ///
    /// Attached processes and the page-table base register are kept.
    pub fn initialize(&mut self) {
        self.frames.reset();
        self.queue.clear();
        self.pending.clear();
        self.page_tables.values_mut().for_each(PageTable::unmap_all);
        self.stats = MemoryStats::default();

        debug!("Memory reset, {} frames free", self.frames.capacity());
    }

    /// Gets the sizes this manager was built with.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Gets the work counters.
    pub fn stats(&self) -> &MemoryStats {
        &self.stats
    }

    /// Gets a frame descriptor.
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Gets the whole frame directory.
    pub fn frames(&self) -> &FrameDirectory {
        &self.frames
    }

    /// Gets the page table of a process.
    pub fn page_table(&self, process: ProcessId) -> Option<&PageTable> {
        self.page_tables.get(&process)
    }

    /// Lists the installed frames in the order the clock hand will reconsider them.
    pub fn replacement_order(&self) -> Vec<FrameId> {
        self.queue.order()
    }

    /// The number of faults whose pages are still being read in.
    pub fn pending_faults(&self) -> usize {
        self.pending.len()
    }

    /// The process whose page table is loaded.
    pub fn current_process(&self) -> Option<ProcessId> {
        self.ptbr
    }

    /// Creates the page table of a new process, with every page non-resident.
    ///
    /// Returns `false` if the process already has one.
    pub fn attach_process(&mut self, process: ProcessId) -> bool {
        if self.page_tables.contains_key(&process) {
            return false;
        }

        self.page_tables
            .insert(process, PageTable::new(process, self.config.max_pages));
        debug!("Attached page table for {process}");
        true
    }

    /// Reclaims the frames of a terminated process and destroys its page table.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UnknownProcess`] if the process has no page table, or any error of
    /// [`deallocate`](Self::deallocate), in which case the table is kept.
    pub fn detach_process(&mut self, process: ProcessId) -> Result<PageTable> {
        if !self.page_tables.contains_key(&process) {
            return Err(MemoryError::UnknownProcess(process));
        }

        self.deallocate(process)?;

        if self.ptbr == Some(process) {
            self.ptbr = None;
        }

        self.page_tables
            .remove(&process)
            .ok_or(MemoryError::UnknownProcess(process))
    }

    /// Loads the page-table base register, as the dispatcher does on a context switch.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UnknownProcess`] if the process has no page table.
    pub fn switch_to(&mut self, process: Option<ProcessId>) -> Result<()> {
        if let Some(process) = process {
            self.table(process)?;
        }

        trace!("Page-table base register now holds {process:?}");
        self.ptbr = process;
        Ok(())
    }

    /// Records a load or store by the running process.
    ///
    /// If the page is resident, its frame is marked referenced, and dirty for a store. Otherwise a
    /// page fault is raised and the reference is applied when the fault completes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NoActiveProcess`] if no page table is loaded, and
    /// [`MemoryError::InvalidPage`] if the address lies beyond the process's page table. The
    /// latter is a protection fault, not a page fault.
    pub fn on_access(&mut self, logical_address: usize, action: RefAction) -> Result<Access> {
        let process = self.ptbr.ok_or(MemoryError::NoActiveProcess)?;
        let page = PageNumber::containing(logical_address, self.config.page_size);
        let entry = self.table(process)?.entry(page)?;
        self.stats.accesses += 1;

        trace!("{process} {action:?} at {logical_address:#x} ({page})");

        match entry.frame() {
            Some(frame) => {
                self.frames[frame].record_access(action.is_store());
                Ok(Access::Hit(frame))
            }
            None => self
                .raise(process, page, Some(action))
                .map(Access::Faulted),
        }
    }

    /// Raises a page fault for a non-resident page.
    ///
    /// The fault is begun, then the interrupt dispatcher is notified with the offending process and
    /// page. Nothing is sent if the fault cannot be begun. The returned token is what the
    /// dispatcher's continuation passes to [`complete_fault`](Self::complete_fault).
    ///
    /// # Errors
    ///
    /// See [`begin_fault`](Self::begin_fault).
    pub fn raise_page_fault(
        &mut self,
        process: ProcessId,
        page: PageNumber,
    ) -> Result<PendingFault> {
        self.raise(process, page, None)
    }

    /// Resolves a page fault in one step: a frame is found, the page is read into it, and the
    /// page is installed.
    ///
    /// # Errors
    ///
    /// See [`begin_fault`](Self::begin_fault).
    pub fn resolve_fault(&mut self, process: ProcessId, page: PageNumber) -> Result<FrameId> {
        let fault = self.begin_fault(process, page, None)?;
        self.complete_fault(fault)
    }

    /// Starts bringing a page into memory.
    ///
    /// A free frame is used if there is one, otherwise the replacement queue picks a victim. A
    /// victim's page is invalidated in its owner's page table and, if dirty, written back before
    /// the read of the new page is issued. The chosen frame stays pinned until the fault is
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the process or page is invalid, if the page is already resident or
    /// already being fetched, or [`MemoryError::NoEvictableFrame`] if every frame is pinned. The
    /// last one means too much memory is tied up in I/O and is fatal.
    pub fn begin_fault(
        &mut self,
        process: ProcessId,
        page: PageNumber,
        access: Option<RefAction>,
    ) -> Result<PendingFault> {
        if self.table(process)?.entry(page)?.is_resident() {
            return Err(MemoryError::AlreadyResident { process, page });
        }
        if self.pending.contains_key(&(process, page)) {
            return Err(MemoryError::FaultInProgress { process, page });
        }

        let frame = match self.frames.allocate_free_frame() {
            Some(frame) => frame,
            None => self.queue.select_victim(&mut self.frames).inspect_err(|e| {
                warn!("Unable to fetch {page} for {process}: {e}");
            })?,
        };

        self.evict(frame)?;
        self.stats.page_faults += 1;

        self.frames[frame].reserve(process, page);
        self.pending.insert((process, page), frame);

        let read = TransferRequest {
            action: IoAction::Read,
            process,
            page,
            frame,
        };
        debug!("Page fault: {read}");
        self.drum.issue_transfer(read);

        Ok(PendingFault {
            process,
            page,
            frame,
            access,
        })
    }

    /// Installs a page once its read transfer has completed, then applies the suspended reference
    /// that faulted, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UnknownFault`] if the token does not match a fault in flight.
    pub fn complete_fault(&mut self, fault: PendingFault) -> Result<FrameId> {
        let PendingFault {
            process,
            page,
            frame,
            access,
        } = fault;

        if self.pending.get(&(process, page)) != Some(&frame) {
            return Err(MemoryError::UnknownFault { process, page });
        }

        self.table_mut(process)?.map(page, frame)?;
        self.pending.remove(&(process, page));

        let descriptor = &mut self.frames[frame];
        descriptor.unpin(frame)?;
        descriptor.set_referenced();
        if let Some(action) = access {
            descriptor.record_access(action.is_store());
        }

        if !self.queue.insert(frame) {
            return Err(MemoryError::Invariant(format!(
                "{frame} was already queued for replacement"
            )));
        }

        debug!("Installed {page} of {process} in {frame}");
        Ok(frame)
    }

    /// Pins the frame holding the buffer page of an I/O request. A non-resident page raises a
    /// page fault first and is brought in before the pin is taken.
    ///
    /// A read from a device overwrites the page, so the frame is also marked dirty. Pinned frames
    /// are never chosen for eviction. Returns the pinned frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the request names an unknown process or an invalid page, or if the
    /// page must be fetched and that fails.
    pub fn pin_for_io(&mut self, request: &IoRequest) -> Result<FrameId> {
        let entry = self.table(request.process)?.entry(request.page)?;

        let frame = match entry.frame() {
            Some(frame) => frame,
            None => {
                debug!(
                    "I/O request {} needs {} of {}",
                    request.id, request.page, request.process
                );
                let fault = self.raise(request.process, request.page, None)?;
                self.complete_fault(fault)?
            }
        };

        let descriptor = &mut self.frames[frame];
        if request.action == IoAction::Read {
            descriptor.mark_dirty();
        }
        let pins = descriptor.pin();

        trace!("I/O request {} pinned {frame} ({pins} pins)", request.id);
        Ok(frame)
    }

    /// Releases the pin taken by [`pin_for_io`](Self::pin_for_io) for the same request.
    ///
    /// Returns the remaining pin count.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotResident`] if the page is not in memory, and
    /// [`MemoryError::UnpinWithoutPin`] if the frame holds no pin. Both mean the request was never
    /// pinned.
    pub fn unpin_after_io(&mut self, request: &IoRequest) -> Result<usize> {
        let frame = self
            .table(request.process)?
            .entry(request.page)?
            .frame()
            .ok_or(MemoryError::NotResident {
                process: request.process,
                page: request.page,
            })?;

        let pins = self.frames[frame].unpin(frame).inspect_err(|e| {
            warn!("I/O request {}: {e}", request.id);
        })?;

        trace!("I/O request {} unpinned {frame} ({pins} pins)", request.id);
        Ok(pins)
    }

    /// Returns every frame of a terminated process to the free pool.
    ///
    /// The replacement queue is scanned once. Frames of other processes keep their contents and
    /// their relative order. Every page of the process is marked non-resident. Returns the number
    /// of frames reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::PinnedOnTermination`] without changing anything if one of the
    /// process's frames is still pinned for I/O or still being read in. Pending I/O must be drained
    /// before a process is torn down.
    pub fn deallocate(&mut self, process: ProcessId) -> Result<usize> {
        let in_flight = self
            .pending
            .iter()
            .find(|((owner, _), _)| *owner == process)
            .map(|(_, &frame)| frame);
        let pinned = self
            .frames
            .iter()
            .find(|(_, frame)| frame.owner() == Some(process) && frame.is_pinned())
            .map(|(id, _)| id);

        if let Some(frame) = in_flight.or(pinned) {
            warn!("{process} terminated while {frame} is pinned");
            return Err(MemoryError::PinnedOnTermination { process, frame });
        }

        let frames = &self.frames;
        let reclaimed = self
            .queue
            .extract_where(|id| frames[id].owner() == Some(process));

        for &id in &reclaimed {
            self.frames[id].release();
        }

        if let Some(table) = self.page_tables.get_mut(&process) {
            table.unmap_all();
        }

        self.stats.reclaimed += reclaimed.len() as u64;
        debug!("Reclaimed {} frames from {process}", reclaimed.len());

        Ok(reclaimed.len())
    }

    /// Checks the invariants that tie frames, page tables and the replacement queue together.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Invariant`] describing the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let violation = |message: String| Err(MemoryError::Invariant(message));
        let in_flight: Vec<FrameId> = self.pending.values().copied().collect();

        for (id, frame) in self.frames.iter() {
            if frame.is_free() {
                let owned = frame.owner().is_some() || frame.resident_page().is_some();
                if owned || frame.is_pinned() {
                    return violation(format!("free {id} is owned or pinned"));
                }
                if self.queue.contains(id) {
                    return violation(format!("free {id} is queued for replacement"));
                }
                continue;
            }

            let Some((owner, page)) = frame.occupant() else {
                return violation(format!("allocated {id} has no occupant"));
            };

            if in_flight.contains(&id) {
                if self.queue.contains(id) || !frame.is_pinned() {
                    return violation(format!("{id} is being read in but is evictable"));
                }
                continue;
            }

            if !self.queue.contains(id) {
                return violation(format!("installed {id} is missing from the queue"));
            }

            let mapped = self
                .page_tables
                .get(&owner)
                .and_then(|table| table.entry(page).ok())
                .and_then(|entry| entry.frame());
            if mapped != Some(id) {
                return violation(format!(
                    "{id} holds {page} of {owner}, which maps elsewhere"
                ));
            }
        }

        let installed = self.frames.capacity() - self.frames.free_count() - in_flight.len();
        if self.queue.len() != installed {
            return violation(format!(
                "{} frames queued but {installed} installed",
                self.queue.len()
            ));
        }

        for (&process, table) in &self.page_tables {
            for (page, id) in table.resident() {
                if self.frames.get(id).and_then(Frame::occupant) != Some((process, page)) {
                    return violation(format!(
                        "{page} of {process} maps to {id}, which holds another page"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Begins resolving a page fault and, once it is under way, notifies the dispatcher.
    ///
    /// A fault that cannot be begun raises no interrupt, so the dispatcher never waits on a
    /// continuation that will not come.
    fn raise(
        &mut self,
        process: ProcessId,
        page: PageNumber,
        access: Option<RefAction>,
    ) -> Result<PendingFault> {
        let fault = self.begin_fault(process, page, access)?;
        self.dispatcher.notify(Interrupt::page_fault(process, page));
        Ok(fault)
    }

    /// Takes a frame away from its current occupant, if it has one.
    ///
    /// The occupant's page becomes non-resident, and its contents are written back to the drum if
    /// they were modified.
    fn evict(&mut self, frame: FrameId) -> Result<()> {
        let descriptor = &self.frames[frame];
        if descriptor.is_free() {
            return Ok(());
        }

        let Some((owner, page)) = descriptor.occupant() else {
            return Err(MemoryError::Invariant(format!(
                "allocated {frame} has no occupant"
            )));
        };

        if let Some(table) = self.page_tables.get_mut(&owner) {
            table.unmap(page)?;
        }

        if descriptor.is_dirty() {
            let write = TransferRequest {
                action: IoAction::Write,
                process: owner,
                page,
                frame,
            };
            debug!("Writing back {write}");
            self.drum.issue_transfer(write);
            self.stats.write_backs += 1;
        }

        self.stats.evictions += 1;
        debug!("Evicted {page} of {owner} from {frame}");
        Ok(())
    }

    /// A helper function to look up a page table.
    fn table(&self, process: ProcessId) -> Result<&PageTable> {
        self.page_tables
            .get(&process)
            .ok_or(MemoryError::UnknownProcess(process))
    }

    /// A helper function to look up a page table for modification.
    fn table_mut(&mut self, process: ProcessId) -> Result<&mut PageTable> {
        self.page_tables
            .get_mut(&process)
            .ok_or(MemoryError::UnknownProcess(process))
    }
}
