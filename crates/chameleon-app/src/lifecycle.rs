//! 라이프사이클 관리.
//!
//! 종료 신호 전파, OS 시그널 대기, 백그라운드 태스크 정리.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
            tasks: Vec::new(),
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 시 기다릴 태스크 등록
    pub fn track(&mut self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        self.tasks.extend(handles);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// 종료 신호 발송
    pub fn shutdown(&self) {
        info!("종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM) 후 종료 신호 발송
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                _ = sigint.recv() => info!("SIGINT 수신"),
                _ = sigterm.recv() => info!("SIGTERM 수신"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl+C 수신");
        }

        self.shutdown();
        Ok(())
    }

    /// 종료 신호 후 등록된 태스크가 끝나길 기다린다. 시간 안에 끝나지 않은 태스크는 중단한다.
    pub async fn join(self, grace: Duration) -> usize {
        let mut finished = 0;
        for task in self.tasks {
            let abort = task.abort_handle();
            match tokio::time::timeout(grace, task).await {
                Ok(Ok(())) => finished += 1,
                Ok(Err(e)) => warn!("백그라운드 태스크 비정상 종료: {e}"),
                Err(_) => {
                    warn!("백그라운드 태스크 종료 대기 시간 초과, 중단");
                    abort.abort();
                }
            }
        }
        finished
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
