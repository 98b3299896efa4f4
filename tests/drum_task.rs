mod common;

use async_channel::{Receiver, Sender};
use clock_vmm::{
    config::PAGE_TRANSFER_COST,
    drum::{ChannelDrum, TransferRequest},
    interrupt::{ChannelDispatcher, InterruptCause, SimClock},
    io::{IoAction, RefAction},
    process::ProcessId,
    Access, MemoryConfig, MemoryManager,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// A logical clock that the drum advances by the cost of every transfer it services.
#[derive(Debug, Default)]
struct DrumClock {
    now: AtomicU64,
}

impl SimClock for DrumClock {
    fn current_time(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// Services transfers in order, reporting finished reads back to the kernel.
async fn drum_device(
    requests: Receiver<TransferRequest>,
    completions: Sender<TransferRequest>,
    clock: Arc<DrumClock>,
) -> usize {
    let mut writes = 0;

    while let Ok(request) = requests.recv().await {
        tokio::task::yield_now().await;
        clock.now.fetch_add(PAGE_TRANSFER_COST, Ordering::AcqRel);

        match request.action {
            IoAction::Read => {
                if completions.send(request).await.is_err() {
                    break;
                }
            }
            IoAction::Write => writes += 1,
        }
    }

    writes
}

#[tokio::test]
async fn test_faults_complete_through_drum_task() {
    common::init_tracing();

    let (drum, requests) = ChannelDrum::new();
    let (dispatcher, interrupts) = ChannelDispatcher::new();
    let (completions_tx, completions) = async_channel::unbounded();
    let clock = Arc::new(DrumClock::default());

    let device = tokio::spawn(drum_device(requests, completions_tx, clock.clone()));

    let config = MemoryConfig {
        frames: 3,
        max_pages: 8,
        page_size: 512,
    };
    let mut mm = MemoryManager::new(config, drum, dispatcher).unwrap();

    let a = ProcessId::new(1);
    let b = ProcessId::new(2);
    mm.attach_process(a);
    mm.attach_process(b);

    // Each process sweeps its space, storing to every other page.
    let script: Vec<(ProcessId, usize, RefAction)> = (0..8)
        .flat_map(|page| {
            let action = if page % 2 == 0 {
                RefAction::Store
            } else {
                RefAction::Load
            };
            [(a, page * 512, action), (b, page * 512 + 1, RefAction::Load)]
        })
        .collect();

    for (process, address, action) in script {
        mm.switch_to(Some(process)).unwrap();

        let fault = match mm.on_access(address, action).unwrap() {
            Access::Hit(_) => continue,
            Access::Faulted(fault) => fault,
        };

        // The faulting process is suspended, and the other one runs against memory that is
        // already resident while the drum works.
        let other = if process == a { b } else { a };
        mm.switch_to(Some(other)).unwrap();
        let resident = mm.page_table(other).unwrap().resident().next();
        if let Some((page, _)) = resident {
            let hit = mm.on_access(page.as_usize() * 512, RefAction::Load).unwrap();
            assert!(matches!(hit, Access::Hit(_)));
        }

        let done = completions.recv().await.unwrap();
        assert_eq!(done.frame, fault.frame());
        assert_eq!(done.page, fault.page());

        let frame = mm.complete_fault(fault).unwrap();
        assert_eq!(mm.frame(frame).unwrap().is_dirty(), action == RefAction::Store);
        mm.check_invariants().unwrap();
    }

    let faults = std::iter::from_fn(|| interrupts.try_recv().ok())
        .filter(|interrupt| interrupt.cause == InterruptCause::PageFault)
        .count();
    assert_eq!(faults as u64, mm.stats().page_faults);
    assert_eq!(mm.stats().page_faults, 16);

    let write_backs = mm.stats().write_backs;
    assert!(write_backs > 0);

    // Dropping the manager closes the drum channel, which stops the device.
    drop(mm);
    let writes = device.await.unwrap();
    assert_eq!(writes as u64, write_backs);
    assert_eq!(
        clock.current_time(),
        (16 + write_backs) * PAGE_TRANSFER_COST
    );
}
