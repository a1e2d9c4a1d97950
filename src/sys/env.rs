//! Environment: background thread pools.
//!
//! An environment owns two pools. Compactions triggered by a full memtable
//! run on the high-priority pool when `max_background_flushes > 0`, all
//! other compactions run on the low-priority pool. Worker threads are
//! started lazily on the first job, so an environment nobody schedules on
//! costs nothing.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use libc::c_int;
use parking_lot::Mutex;

use super::{drop_raw, into_raw, ObjectKind};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Which pool a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Priority {
    Low,
    High,
}

struct ThreadPool {
    name: &'static str,
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    target_threads: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    fn new(name: &'static str, threads: usize) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name,
            sender: Mutex::new(Some(sender)),
            receiver,
            target_threads: AtomicUsize::new(threads),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Workers already running are kept; the pool never shrinks.
    fn set_threads(&self, threads: usize) {
        self.target_threads.store(threads, Ordering::SeqCst);
    }

    fn schedule(&self, job: Job) -> io::Result<()> {
        let mut workers = self.workers.lock();
        let target = self.target_threads.load(Ordering::SeqCst).max(1);
        while workers.len() < target {
            let receiver = self.receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("emberkv-{}-{}", self.name, workers.len()))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) if workers.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(pool = self.name, error = %e, "could not grow background pool");
                    break;
                }
            }
        }
        drop(workers);

        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(job)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "thread pool closed")),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "thread pool closed")),
        }
    }

    fn thread_count(&self) -> usize {
        self.workers.lock().len()
    }

    fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    /// Close the queue and wait for workers to drain it.
    fn shutdown(&self) {
        self.sender.lock().take();
        let current = thread::current().id();
        for handle in self.workers.lock().drain(..) {
            // The last reference can be dropped by one of our own jobs.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(pool = self.name, "background job panicked");
            }
        }
    }
}

/// Shared state behind an environment handle.
pub(crate) struct EnvInner {
    low: ThreadPool,
    high: ThreadPool,
}

impl EnvInner {
    pub fn new() -> Self {
        Self {
            low: ThreadPool::new("bg", 1),
            high: ThreadPool::new("bg-high", 1),
        }
    }

    fn pool(&self, priority: Priority) -> &ThreadPool {
        match priority {
            Priority::Low => &self.low,
            Priority::High => &self.high,
        }
    }

    pub fn schedule<F>(&self, priority: Priority, job: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool(priority).schedule(Box::new(job))
    }

    pub fn set_background_threads(&self, priority: Priority, threads: usize) {
        self.pool(priority).set_threads(threads);
    }

    pub fn thread_count(&self, priority: Priority) -> usize {
        self.pool(priority).thread_count()
    }

    pub fn queue_len(&self, priority: Priority) -> usize {
        self.pool(priority).queue_len()
    }
}

impl Drop for EnvInner {
    fn drop(&mut self) {
        self.low.shutdown();
        self.high.shutdown();
    }
}

static DEFAULT_ENV: OnceLock<Arc<EnvInner>> = OnceLock::new();

/// Process-wide environment used when the options name none.
pub(crate) fn default_env() -> Arc<EnvInner> {
    Arc::clone(DEFAULT_ENV.get_or_init(|| Arc::new(EnvInner::new())))
}

/// Engine handle for an environment.
pub struct emberkv_env_t {
    pub(crate) inner: Arc<EnvInner>,
}

/// Handle to the process-wide default environment. Destroying the handle
/// does not stop the shared pools.
pub fn emberkv_create_default_env() -> *mut emberkv_env_t {
    into_raw(ObjectKind::Env, emberkv_env_t { inner: default_env() })
}

/// Handle to a new environment with private thread pools.
pub fn emberkv_create_env() -> *mut emberkv_env_t {
    into_raw(
        ObjectKind::Env,
        emberkv_env_t {
            inner: Arc::new(EnvInner::new()),
        },
    )
}

/// # Safety
///
/// `env` must be a live environment handle.
pub unsafe fn emberkv_env_set_background_threads(env: *mut emberkv_env_t, n: c_int) {
    let threads = usize::try_from(n).unwrap_or(0);
    (*env).inner.set_background_threads(Priority::Low, threads);
}

/// # Safety
///
/// `env` must be a live environment handle.
pub unsafe fn emberkv_env_set_high_priority_background_threads(env: *mut emberkv_env_t, n: c_int) {
    let threads = usize::try_from(n).unwrap_or(0);
    (*env).inner.set_background_threads(Priority::High, threads);
}

/// # Safety
///
/// `env` must come from one of the create functions and not be destroyed
/// twice.
pub unsafe fn emberkv_env_destroy(env: *mut emberkv_env_t) {
    drop_raw(ObjectKind::Env, env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pool_runs_jobs() {
        let env = EnvInner::new();
        let (tx, rx) = unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            env.schedule(Priority::Low, move || {
                let _ = tx.send(i);
            })
            .unwrap();
        }

        let mut seen: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_threads_start_lazily_and_grow() {
        let env = EnvInner::new();
        assert_eq!(env.thread_count(Priority::High), 0);

        env.set_background_threads(Priority::High, 3);
        env.schedule(Priority::High, || {}).unwrap();
        assert_eq!(env.thread_count(Priority::High), 3);
        assert_eq!(env.thread_count(Priority::Low), 0);
    }

    #[test]
    fn test_drop_drains_queue() {
        let env = EnvInner::new();
        let (tx, rx) = unbounded();
        for _ in 0..5 {
            let tx = tx.clone();
            env.schedule(Priority::Low, move || {
                thread::sleep(Duration::from_millis(5));
                let _ = tx.send(());
            })
            .unwrap();
        }
        drop(env);
        assert_eq!(rx.try_iter().count(), 5);
    }

    #[test]
    fn test_default_env_is_shared() {
        let a = emberkv_create_default_env();
        let b = emberkv_create_default_env();
        unsafe {
            assert!(Arc::ptr_eq(&(*a).inner, &(*b).inner));
            emberkv_env_destroy(a);
            emberkv_env_destroy(b);
        }
    }
}
