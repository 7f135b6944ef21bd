//! Delivery contexts for subscriber callbacks.
//!
//! # Invariants
//! - Tasks posted to one `MainLoop` run one at a time, in posting order, on
//!   its single delivery thread.
//! - After `MainLoop::shutdown`, posted tasks are dropped without running.

use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Unit of work handed to a delivery context.
pub type DeliveryTask = Box<dyn FnOnce() + Send + 'static>;

/// Execution context on which subscriber callbacks are invoked.
pub trait DeliveryContext: Send + Sync {
    fn post(&self, task: DeliveryTask);
}

/// Runs tasks immediately on the posting thread (the re-query worker).
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDelivery;

impl DeliveryContext for InlineDelivery {
    fn post(&self, task: DeliveryTask) {
        task();
    }
}

const MAIN_LOOP_THREAD_NAME: &str = "contentdb-main";

/// Dedicated single-threaded delivery context.
pub struct MainLoop {
    sender: Mutex<Option<Sender<DeliveryTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MainLoop {
    /// Spawns the delivery thread.
    ///
    /// # Errors
    /// Returns the OS error when the thread cannot be spawned.
    pub fn start() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<DeliveryTask>();
        let worker = thread::Builder::new()
            .name(MAIN_LOOP_THREAD_NAME.to_string())
            .spawn(move || {
                for task in receiver {
                    task();
                }
            })?;
        info!("event=main_loop_start module=delivery status=ok");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Stops accepting tasks, drains the queue and joins the thread.
    ///
    /// Idempotent. Called from the delivery thread itself, it detaches
    /// instead of joining.
    pub fn shutdown(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        drop(sender);

        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            error!("event=main_loop_stop module=delivery status=error error_code=worker_panicked");
            return;
        }
        info!("event=main_loop_stop module=delivery status=ok");
    }
}

impl DeliveryContext for MainLoop {
    fn post(&self, task: DeliveryTask) {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            warn!("event=delivery_post module=delivery status=skip reason=main_loop_stopped");
            return;
        };
        if sender.send(task).is_err() {
            warn!("event=delivery_post module=delivery status=skip reason=main_loop_disconnected");
        }
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::{DeliveryContext, InlineDelivery, MainLoop};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn inline_delivery_runs_on_calling_thread() {
        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();
        InlineDelivery.post(Box::new(move || {
            tx.send(thread::current().id()).unwrap();
        }));
        assert_eq!(rx.recv().unwrap(), caller);
    }

    #[test]
    fn main_loop_runs_tasks_in_order_on_one_thread() {
        let main_loop = MainLoop::start().expect("main loop should start");
        let (tx, rx) = mpsc::channel();
        for index in 0..5 {
            let tx = tx.clone();
            main_loop.post(Box::new(move || {
                tx.send((index, thread::current().name().map(str::to_string)))
                    .unwrap();
            }));
        }

        let received: Vec<_> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(
            received.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert!(received
            .iter()
            .all(|(_, name)| name.as_deref() == Some("contentdb-main")));
    }

    #[test]
    fn shutdown_drains_then_drops_later_tasks() {
        let main_loop = MainLoop::start().expect("main loop should start");
        let (tx, rx) = mpsc::channel();
        let before = tx.clone();
        main_loop.post(Box::new(move || before.send("before").unwrap()));

        main_loop.shutdown();
        assert!(!main_loop.is_running());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "before");

        main_loop.post(Box::new(move || tx.send("after").unwrap()));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        main_loop.shutdown();
    }
}
