//! Debounced values
//!
//! Used by search: the term is published only after the user stops typing
//! for the configured delay.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};

/// Write side of a debounced value
#[derive(Debug, Clone)]
pub struct DebounceInput<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> DebounceInput<T> {
    /// Offer a new value; restarts the delay
    pub fn set(&self, value: T) {
        // The worker only stops once every receiver is gone.
        let _ = self.sender.send(value);
    }
}

/// Debounce a stream of values
///
/// Returns the input handle and a receiver that starts at `initial` and
/// only changes after a value has been left alone for `delay`. Equal values
/// are not republished. Must be called within a Tokio runtime.
pub fn debounce<T>(initial: T, delay: Duration) -> (DebounceInput<T>, watch::Receiver<T>)
where
    T: PartialEq + Send + Sync + 'static,
{
    let (sender, input) = mpsc::unbounded_channel();
    let (output, receiver) = watch::channel(initial);
    tokio::spawn(run(input, output, delay));
    (DebounceInput { sender }, receiver)
}

async fn run<T>(mut input: mpsc::UnboundedReceiver<T>, output: watch::Sender<T>, delay: Duration)
where
    T: PartialEq + Send + Sync + 'static,
{
    let mut pending: Option<T> = None;
    let timer = sleep(delay);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            received = input.recv() => match received {
                Some(value) => {
                    pending = Some(value);
                    timer.as_mut().reset(Instant::now() + delay);
                }
                None => break,
            },
            () = &mut timer, if pending.is_some() => {
                if let Some(value) = pending.take() {
                    output.send_if_modified(|current| {
                        if *current == value {
                            return false;
                        }
                        *current = value;
                        true
                    });
                }
            }
            () = output.closed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn publishes_last_value_after_quiet_period() {
        let (input, mut output) = debounce(String::new(), DELAY);

        input.set("s".to_string());
        sleep(Duration::from_millis(100)).await;
        input.set("su".to_string());
        sleep(Duration::from_millis(100)).await;
        input.set("sun".to_string());
        let last_input = Instant::now();

        output.changed().await.unwrap();
        assert_eq!(*output.borrow_and_update(), "sun");
        assert!(last_input.elapsed() >= DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_published_before_delay() {
        let (input, mut output) = debounce(0u32, DELAY);

        input.set(7);
        sleep(DELAY - Duration::from_millis(1)).await;
        assert!(!output.has_changed().unwrap());
        assert_eq!(*output.borrow(), 0);

        output.changed().await.unwrap();
        assert_eq!(*output.borrow(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_value_is_not_republished() {
        let (input, output) = debounce("sun".to_string(), DELAY);

        input.set("sun".to_string());
        sleep(DELAY * 2).await;
        assert!(!output.has_changed().unwrap());
    }
}
