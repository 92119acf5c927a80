use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Отложенный сигнал "пора отправлять handshake".
/// Пока таймер взведён, повторный `arm` ничего не меняет.
/// Снимается через `cancel` или при drop.
#[derive(Debug, Default)]
pub struct Debounce {
    pending: Option<JoinHandle<()>>,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, delay: Duration, due: UnboundedSender<()>) {
        if self.is_armed() {
            return;
        }
        debug!("Handshake timer armed for {:?}", delay);
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = due.send(());
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}
