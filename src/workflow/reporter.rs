//! 进度上报接口
//!
//! 流程层只管把事件交出去，谁在听、是否过期由实现方决定

use std::sync::{Mutex, PoisonError};

use crate::models::Event;

/// 进度事件接收方
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: Event);
}

/// 把事件收集到内存里
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
