//! FRR watch: startup sequence and control loop.
//!
//! ```text
//! BootstrapMonitor --StateSlot--> ControlLoop --FrrControl--> frr.sock
//!                                      ^
//!                  SIGINT/SIGTERM -----+ (broadcast)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;

use runtimecfg_common::RuntimecfgError;

use crate::cluster::{self, FetchRequest};
use crate::config::WatchConfig;
use crate::frr::FrrControl;
use crate::health::{ApiServerCheck, LivenessProbe};
use crate::monitor::{BootstrapMonitor, StateSlot};
use crate::render;
use crate::routes;
use crate::state::WatchState;

/// Render the FRR configuration, then forward monitor decisions to FRR
/// until a termination signal arrives.
pub async fn watch(config: WatchConfig) -> Result<()> {
    let cluster_config = cluster::fetch_config(FetchRequest {
        kubeconfig: &config.kubeconfig,
        cluster_config: config.cluster_config.as_deref(),
        resolv_conf: &config.settings.resolv_conf,
        api_vips: &config.api_vips,
        ingress_vips: &config.ingress_vips,
    })
    .context("Failed to fetch cluster configuration")?;

    if let Err(e) = render::render_file(&config.output, &config.template, &cluster_config) {
        tracing::error!(
            config = %serde_json::to_string(&cluster_config).unwrap_or_default(),
            error = %e,
            "Failed to render FRR configuration"
        );
        return Err(e).context("Failed to render FRR configuration");
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_rx = shutdown_tx.subscribe();
    spawn_signal_forwarder(shutdown_tx.clone())
        .context("Failed to register signal handlers")?;

    let slot = Arc::new(StateSlot::new());
    let state = WatchState::new(config.bootstrap, config.settings.failure_threshold);

    if config.bootstrap {
        // A preserved bootstrap node must stop advertising the VIPs once its
        // local kube-apiserver is gone, or it competes with the masters.
        let api = ApiServerCheck::from_kubeconfig(&config.kubeconfig, config.settings.probe_timeout())
            .context("Failed to set up kube-apiserver health check")?;
        let liveness = LivenessProbe::new(&config.settings.liveness_url, config.settings.probe_timeout())
            .context("Failed to set up liveness probe")?;

        tracing::info!(
            api = api.url(),
            liveness = liveness.url(),
            threshold = config.settings.failure_threshold,
            "Starting bootstrap API monitor"
        );
        let monitor = BootstrapMonitor::new(
            api,
            liveness,
            config.settings.monitor_config(),
            slot.clone(),
            state.clone(),
        );
        tokio::spawn(monitor.run());
    }

    if let Some(addr) = config.settings.status_addr.clone() {
        let status_state = state.clone();
        let status_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = routes::serve_status(&addr, status_state, status_shutdown).await {
                tracing::error!(error = %e, "Status endpoint stopped");
            }
        });
    }

    let control = FrrControl::connect(&config.settings.control_socket, config.settings.retry_interval())
        .await
        .context("Failed to open FRR control socket")?;

    ControlLoop::new(
        control,
        slot,
        state,
        config.check_interval,
        config.settings.quiescence(),
    )
    .run(shutdown_rx)
    .await;

    tracing::info!("FRR watch stopped");
    Ok(())
}

/// Forward the first SIGINT or SIGTERM onto the shutdown channel
pub fn spawn_signal_forwarder(
    shutdown: broadcast::Sender<()>,
) -> Result<tokio::task::JoinHandle<()>, RuntimecfgError> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => tracing::info!("SIGTERM received"),
            _ = interrupt.recv() => tracing::info!("SIGINT received"),
        }
        let _ = shutdown.send(());
    }))
}

/// Serializes monitor decisions onto the control socket
pub struct ControlLoop<S> {
    control: FrrControl<S>,
    slot: Arc<StateSlot>,
    state: WatchState,
    /// Idle wait between polls
    check_interval: Duration,
    /// Pause after a delivered command
    quiescence: Duration,
}

impl<S> ControlLoop<S>
where
    S: AsyncWrite + Unpin + Send,
{
    pub fn new(
        control: FrrControl<S>,
        slot: Arc<StateSlot>,
        state: WatchState,
        check_interval: Duration,
        quiescence: Duration,
    ) -> Self {
        Self {
            control,
            slot,
            state,
            check_interval,
            quiescence,
        }
    }

    /// Run until shutdown; the connection is released on return
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let slot = self.slot.clone();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, closing FRR control socket");
                    return;
                }
                api_state = slot.recv() => {
                    tracing::info!(state = %api_state, "API state changed");
                    // Blocks until FRR accepted the command
                    let delivery = self.control.send_state(api_state).await;
                    if delivery.attempts > 1 {
                        tracing::warn!(
                            command = %delivery.command,
                            attempts = delivery.attempts,
                            "Command delivered after retries"
                        );
                    }
                    self.state.record_command(delivery.command).await;

                    // Monitor re-emits every poll while failing; swallow the burst
                    tokio::select! {
                        _ = tokio::time::sleep(self.quiescence) => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown requested, closing FRR control socket");
                            return;
                        }
                    }
                }
                _ = tokio::time::sleep(self.check_interval) => {
                    tracing::trace!("Control loop idle");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};

    use runtimecfg_common::APIState;

    use crate::monitor::MonitorConfig;
    use crate::monitor::testing::ScriptedCheck;

    /// Captures written bytes, failing the first `failures` writes
    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<u8>>>,
        failures: Arc<Mutex<u32>>,
    }

    impl RecordingWriter {
        fn failing(failures: u32) -> Self {
            Self {
                failures: Arc::new(Mutex::new(failures)),
                ..Default::default()
            }
        }

        fn text(&self) -> String {
            String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
        }
    }

    impl AsyncWrite for RecordingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct Harness {
        writer: RecordingWriter,
        slot: Arc<StateSlot>,
        state: WatchState,
        shutdown: broadcast::Sender<()>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start_loop(writer: RecordingWriter, threshold: u32) -> Harness {
        let slot = Arc::new(StateSlot::new());
        let state = WatchState::new(true, threshold);
        let (shutdown, rx) = broadcast::channel(1);

        let control = FrrControl::from_stream(writer.clone(), "mock", Duration::from_secs(1));
        let control_loop = ControlLoop::new(
            control,
            slot.clone(),
            state.clone(),
            Duration::from_secs(30),
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(control_loop.run(rx));

        Harness {
            writer,
            slot,
            state,
            shutdown,
            handle,
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_quiescence_sends_one_command() {
        let h = start_loop(RecordingWriter::default(), 3);

        h.slot.publish(APIState::Stopped);
        sleep_ms(1000).await;
        h.slot.publish(APIState::Stopped);
        sleep_ms(1000).await;
        h.slot.publish(APIState::Stopped);
        sleep_ms(2000).await;

        assert_eq!(h.writer.text(), "stop\n");
        assert_eq!(h.state.snapshot().await.commands_sent, 1);

        h.shutdown.send(()).unwrap();
        h.handle.await.unwrap();
        assert_eq!(h.writer.text(), "stop\n");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_state_is_delivered_after_quiescence() {
        let h = start_loop(RecordingWriter::default(), 3);

        h.slot.publish(APIState::Stopped);
        sleep_ms(1000).await;
        h.slot.publish(APIState::Started);
        sleep_ms(3000).await;
        assert_eq!(h.writer.text(), "stop\n");

        sleep_ms(2000).await;
        assert_eq!(h.writer.text(), "stop\nreload\n");

        h.shutdown.send(()).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loop_blocks_until_write_succeeds() {
        let h = start_loop(RecordingWriter::failing(2), 3);

        h.slot.publish(APIState::Stopped);
        sleep_ms(1500).await;
        assert_eq!(h.writer.text(), "");
        assert_eq!(h.state.snapshot().await.commands_sent, 0);

        sleep_ms(1000).await;
        assert_eq!(h.writer.text(), "stop\n");
        assert_eq!(h.state.snapshot().await.commands_sent, 1);

        h.shutdown.send(()).unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn sigterm_stops_control_loop() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut observer = shutdown_tx.subscribe();
        let loop_rx = shutdown_tx.subscribe();
        let forwarder = spawn_signal_forwarder(shutdown_tx).unwrap();

        let writer = RecordingWriter::default();
        let control = FrrControl::from_stream(writer.clone(), "mock", Duration::from_secs(1));
        let control_loop = ControlLoop::new(
            control,
            Arc::new(StateSlot::new()),
            WatchState::new(false, 30),
            Duration::from_secs(30),
            Duration::from_secs(5),
        );
        let handle = tokio::spawn(control_loop.run(loop_rx));

        let status = std::process::Command::new("kill")
            .arg("-TERM")
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), observer.recv())
            .await
            .expect("SIGTERM was not forwarded")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("control loop did not stop")
            .unwrap();
        forwarder.await.unwrap();
        assert_eq!(writer.text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_loop_exits_on_shutdown() {
        let h = start_loop(RecordingWriter::default(), 3);

        sleep_ms(95_000).await;
        h.shutdown.send(()).unwrap();
        h.handle.await.unwrap();

        assert_eq!(h.writer.text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_outage_and_recovery_end_to_end() {
        // Warm-up succeeds, four failures cross threshold 3, then recovery
        let mut script = vec![true];
        script.extend([false; 6]);
        script.extend([true, true]);
        let api = ScriptedCheck::new(script, true);

        let h = start_loop(RecordingWriter::default(), 3);
        let monitor = BootstrapMonitor::new(
            api,
            ScriptedCheck::new([], false),
            MonitorConfig {
                failure_threshold: 3,
                ..Default::default()
            },
            h.slot.clone(),
            h.state.clone(),
        );
        let monitor = tokio::spawn(monitor.run());

        // Stopped at t=3s, re-emitted at 4s and 5s, recovered at 6s
        sleep_ms(7500).await;
        assert_eq!(h.writer.text(), "stop\n");

        // Quiescence ends at 8s and the pending Started goes out
        sleep_ms(1500).await;
        assert_eq!(h.writer.text(), "stop\nreload\n");

        let status = h.state.snapshot().await;
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.api_state, Some(APIState::Started));
        assert_eq!(status.commands_sent, 2);

        monitor.abort();
        h.shutdown.send(()).unwrap();
        h.handle.await.unwrap();
    }
}
