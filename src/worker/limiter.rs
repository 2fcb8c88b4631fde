use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::debug;

/// Receiving end of a queued permit request
pub type Ticket = oneshot::Receiver<OwnedSemaphorePermit>;

/// Bounds the number of simultaneously executing jobs.
///
/// Requests are served strictly in the order [`enqueue`](Self::enqueue) was
/// called: a single dispatcher task hands out permits from the front of the
/// queue and skips requests whose job has already gone away.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    queue: mpsc::UnboundedSender<oneshot::Sender<OwnedSemaphorePermit>>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize, handle: &Handle) -> Self {
        let capacity = capacity.max(1);
        let semaphore = Arc::new(Semaphore::new(capacity));
        let (queue, requests) = mpsc::unbounded_channel();
        handle.spawn(dispatch(semaphore.clone(), requests));
        Self { semaphore, queue, capacity }
    }

    /// Joins the queue. Dropping the ticket leaves it.
    pub fn enqueue(&self) -> Ticket {
        let (tx, rx) = oneshot::channel();
        // A send failure drops `tx`, which the waiting job sees as a closed ticket
        let _ = self.queue.send(tx);
        rx
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

async fn dispatch(
    semaphore: Arc<Semaphore>,
    mut requests: mpsc::UnboundedReceiver<oneshot::Sender<OwnedSemaphorePermit>>,
) {
    while let Some(ticket) = requests.recv().await {
        if ticket.is_closed() {
            continue;
        }
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        // A job cancelled while waiting hands the permit straight back
        if ticket.send(permit).is_err() {
            debug!("Queued job left before its turn");
        }
    }
    debug!("Concurrency dispatcher stopped");
}
