use partkit::{Aggregator, LsblkLister, PartitionManager, SystemExecutor};

fn main() {
    let manager = PartitionManager::new(SystemExecutor, LsblkLister::new(SystemExecutor));
    if let Some(device) = std::env::args().nth(1) {
        dbg!(manager.table(&device).unwrap());
        dbg!(manager.free_space(&device).unwrap());
    } else {
        dbg!(Aggregator::new(&manager).list_device_partitions().unwrap());
    }
}
