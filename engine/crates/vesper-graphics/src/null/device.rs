use std::cell::{Cell, RefCell};

use crate::deletion_queue::DeletionQueue;

/// null 后端的 "device"：分配资源编号，持有延迟删除队列
///
/// 被删除的资源以 `kind#id` 的形式记录，测试可以观察删除发生的时机
pub struct NullDevice {
    next_id: Cell<u64>,
    deletion_queue: RefCell<DeletionQueue<NullDevice>>,
    deleted: RefCell<Vec<String>>,
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl NullDevice {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            deletion_queue: RefCell::new(DeletionQueue::new()),
            deleted: RefCell::new(Vec::new()),
        }
    }
}

// getters
impl NullDevice {
    /// 已经真正执行的删除
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    pub fn pending_deletions(&self) -> usize {
        self.deletion_queue.borrow().len()
    }

    pub fn deletion_counter(&self) -> u32 {
        self.deletion_queue.borrow().counter()
    }
}

// tools
impl NullDevice {
    pub fn alloc_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// 资源析构时调用，推迟到两帧之后
    pub fn defer_destroy(&self, kind: &'static str, id: u64) {
        self.deletion_queue.borrow_mut().push(move |device: &NullDevice| {
            device.deleted.borrow_mut().push(format!("{kind}#{id}"));
        });
    }

    /// 推进删除计数器并执行到期的任务
    pub fn advance_deletions(&self) {
        let _span = tracy_client::span!("NullDevice::advance_deletions");
        let tasks = self.deletion_queue.borrow_mut().advance();
        for task in tasks {
            task(self);
        }
    }

    /// 执行所有剩余的任务，任务中产生的新任务也一并执行
    pub fn drain_deletions(&self) {
        loop {
            let tasks = self.deletion_queue.borrow_mut().drain_all();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                task(self);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_by_two_advances() {
        let device = NullDevice::new();
        let id = device.alloc_id();
        device.defer_destroy("buffer", id);

        device.advance_deletions();
        assert!(device.deleted().is_empty());
        device.advance_deletions();
        assert_eq!(device.deleted(), vec![format!("buffer#{id}")]);
    }

    #[test]
    fn test_drain() {
        let device = NullDevice::new();
        device.defer_destroy("a", 1);
        device.defer_destroy("b", 2);
        device.drain_deletions();
        assert_eq!(device.deleted(), vec!["a#1".to_string(), "b#2".to_string()]);
        assert_eq!(device.pending_deletions(), 0);
    }
}
