use tokio::task::JoinHandle;

// spawned background loop, stops when cancelled or dropped
#[must_use = "the background task stops when its handle is dropped"]
pub struct BackgroundTask {
    task: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn cancel(self) {
        // Drop aborts
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}
