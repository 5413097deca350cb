//! Inbound command dispatch.
//!
//! Every received command produces exactly one ack. Scheduler-triggered
//! fires go through `on_fire` and produce events instead — nothing awaits a
//! reply for those.

use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use feeder_bus::Bus;
use feeder_hw::Feeder;
use feeder_sched::{Job, Scheduler, Weekday};
use feeder_types::{Ack, Event};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScheduleMode {
    #[default]
    Once,
    Daily,
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleArgs {
    #[serde(default)]
    mode: ScheduleMode,
    #[serde(default)]
    at: Option<String>,
    #[serde(default)]
    time_local: Option<String>,
    #[serde(default)]
    days: Option<Vec<Weekday>>,
}

#[derive(Debug, Deserialize)]
struct CancelArgs {
    #[serde(default)]
    id: Option<String>,
}

/// A decoded inbound command.
#[derive(Debug)]
enum Command {
    FeedNow,
    ScheduleFeed(ScheduleArgs),
    CancelSchedule(CancelArgs),
    ListSchedules,
}

impl Command {
    /// Decode the `command`/`args` fields of an envelope. Returns the echoed
    /// command name alongside the outcome; the error string becomes the
    /// error ack.
    fn parse(msg: &Value) -> (String, Result<Command, String>) {
        let name = msg
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let args = msg.get("args").cloned().unwrap_or_else(|| json!({}));

        let parsed = match name.as_str() {
            "feedNow" => Ok(Command::FeedNow),
            "scheduleFeed" => serde_json::from_value(args)
                .map(Command::ScheduleFeed)
                .map_err(|e| e.to_string()),
            "cancelSchedule" => serde_json::from_value(args)
                .map(Command::CancelSchedule)
                .map_err(|e| e.to_string()),
            "listSchedules" => Ok(Command::ListSchedules),
            _ => Err("unknown command".to_string()),
        };
        (name, parsed)
    }
}

/// Translates commands into scheduler mutations or immediate feeds, and
/// handles the scheduler's fire callback.
pub struct CommandRouter {
    bus: Arc<Bus>,
    scheduler: Arc<Scheduler>,
    feeder: Arc<Feeder>,
}

impl CommandRouter {
    pub fn new(bus: Arc<Bus>, scheduler: Arc<Scheduler>, feeder: Arc<Feeder>) -> Self {
        Self {
            bus,
            scheduler,
            feeder,
        }
    }

    /// Receive loop: absent results (degraded bus, non-command traffic) are
    /// simply retried; a single bad command never kills the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Command router started");
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => break,
                msg = self.bus.next_command() => msg,
            };
            let Some(msg) = msg else {
                continue;
            };
            self.handle(&msg).await;
        }
        info!("Command router stopped");
    }

    pub async fn handle(&self, msg: &Value) {
        let (name, parsed) = Command::parse(msg);
        let cmd = match parsed {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!(command = %name, "Rejected command: {err}");
                self.ack(Ack::error(name.as_str(), err)).await;
                return;
            }
        };

        match self.dispatch(cmd).await {
            Ok(ack) => self.ack(ack).await,
            Err(e) => {
                error!(command = %name, "Command handling error: {e:#}");
                self.ack(Ack::error(name.as_str(), e.to_string())).await;
            }
        }
    }

    async fn dispatch(&self, cmd: Command) -> anyhow::Result<Ack> {
        match cmd {
            Command::FeedNow => {
                self.feeder.dispense_small().await?;
                Ok(Ack::ok("feedNow"))
            }
            Command::ScheduleFeed(args) => {
                let job = self.scheduler.add_job(build_job(args)?).await?;
                Ok(Ack::ok("scheduleFeed").with("job", serde_json::to_value(&job)?))
            }
            Command::CancelSchedule(args) => {
                let id = args.id.context("missing job id")?;
                let removed = self.scheduler.remove_job(&id).await?;
                if removed {
                    Ok(Ack::ok("cancelSchedule").with("id", json!(id)))
                } else {
                    Ok(Ack::error("cancelSchedule", "no such job").with("id", json!(id)))
                }
            }
            Command::ListSchedules => {
                let jobs = self.scheduler.list_jobs().await;
                Ok(Ack::ok("listSchedules").with("jobs", serde_json::to_value(&jobs)?))
            }
        }
    }

    /// Fire callback wired into the scheduler: dispense and report with an
    /// event, not an ack. Actuator failure is reported, never propagated —
    /// a failed fire must not stop the scheduler loop.
    pub async fn on_fire(&self, job: Job) {
        match self.feeder.dispense_small().await {
            Ok(()) => {
                self.event(
                    Event::info("FEED_DISPENSED", format!("Job {} dispensed food.", job.id))
                        .with("job_id", json!(job.id)),
                )
                .await;
            }
            Err(e) => {
                self.event(
                    Event::error("FEED_ERROR", format!("Job {} failed: {e}", job.id))
                        .with("job_id", json!(job.id)),
                )
                .await;
            }
        }
    }

    async fn ack(&self, ack: Ack) {
        self.bus.publish(ack.into_payload()).await;
    }

    async fn event(&self, event: Event) {
        self.bus.publish(event.into_payload()).await;
    }
}

fn build_job(args: ScheduleArgs) -> anyhow::Result<Job> {
    match args.mode {
        ScheduleMode::Once => {
            let at = args.at.context("scheduleFeed mode=once requires `at`")?;
            Ok(Job::once(at))
        }
        ScheduleMode::Daily => {
            let time_local = args
                .time_local
                .context("scheduleFeed mode=daily requires `time_local`")?;
            Ok(Job::daily(time_local, args.days))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use feeder_bus::testing::MemoryTransport;
    use feeder_hw::{MockServo, Servo};
    use feeder_sched::JobStore;

    use super::*;

    struct BrokenServo;

    #[async_trait::async_trait]
    impl Servo for BrokenServo {
        async fn move_to(&self, _angle: f64) -> anyhow::Result<()> {
            anyhow::bail!("servo jammed")
        }
    }

    fn router_with(
        servo: Arc<dyn Servo>,
    ) -> (tempfile::TempDir, Arc<MemoryTransport>, CommandRouter) {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let bus = Arc::new(Bus::with_transport(transport.clone()));
        let scheduler = Arc::new(Scheduler::new(JobStore::new(
            dir.path().join("schedules.json"),
        )));
        let feeder = Arc::new(Feeder::new(servo));
        let router = CommandRouter::new(bus, scheduler, feeder);
        (dir, transport, router)
    }

    fn test_router() -> (tempfile::TempDir, Arc<MemoryTransport>, CommandRouter) {
        router_with(Arc::new(MockServo::new(12)))
    }

    fn command(name: &str, args: Value) -> Value {
        json!({"type": "command", "command": name, "args": args})
    }

    #[tokio::test]
    async fn test_feed_now_acks_ok() {
        let (_dir, transport, router) = test_router();
        router.handle(&command("feedNow", json!({}))).await;

        let acks = transport.published();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0]["type"], "ack");
        assert_eq!(acks[0]["command"], "feedNow");
        assert_eq!(acks[0]["status"], "ok");
    }

    #[tokio::test]
    async fn test_feed_now_failure_acks_error() {
        let (_dir, transport, router) = router_with(Arc::new(BrokenServo));
        router.handle(&command("feedNow", json!({}))).await;

        let acks = transport.published();
        assert_eq!(acks[0]["status"], "error");
        assert!(
            acks[0]["error"]
                .as_str()
                .unwrap()
                .contains("servo jammed")
        );
    }

    #[tokio::test]
    async fn test_unknown_command_acks_error() {
        let (_dir, transport, router) = test_router();
        router.handle(&command("selfDestruct", json!({}))).await;
        router.handle(&json!({"type": "command"})).await;

        let acks = transport.published();
        assert_eq!(acks[0]["command"], "selfDestruct");
        assert_eq!(acks[0]["error"], "unknown command");
        // Missing command name is echoed as "unknown".
        assert_eq!(acks[1]["command"], "unknown");
        assert_eq!(acks[1]["error"], "unknown command");
    }

    #[tokio::test]
    async fn test_schedule_feed_once_then_list() {
        let (_dir, transport, router) = test_router();
        router
            .handle(&command(
                "scheduleFeed",
                json!({"mode": "once", "at": "2030-01-01T08:00:00"}),
            ))
            .await;
        router.handle(&command("listSchedules", json!({}))).await;

        let acks = transport.published();
        assert_eq!(acks[0]["status"], "ok");
        assert_eq!(acks[0]["job"]["type"], "once");
        assert_eq!(acks[0]["job"]["at"], "2030-01-01T08:00:00");

        let jobs = acks[1]["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["id"], acks[0]["job"]["id"]);
    }

    #[tokio::test]
    async fn test_schedule_feed_daily_requires_time() {
        let (_dir, transport, router) = test_router();
        router
            .handle(&command("scheduleFeed", json!({"mode": "daily"})))
            .await;

        let acks = transport.published();
        assert_eq!(acks[0]["status"], "error");
        assert!(acks[0]["error"].as_str().unwrap().contains("time_local"));
    }

    #[tokio::test]
    async fn test_cancel_schedule_known_and_unknown() {
        let (_dir, transport, router) = test_router();
        router
            .handle(&command(
                "scheduleFeed",
                json!({"mode": "daily", "time_local": "08:00", "days": ["Mon"]}),
            ))
            .await;

        let id = transport.published()[0]["job"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        router
            .handle(&command("cancelSchedule", json!({"id": "nope"})))
            .await;
        router
            .handle(&command("cancelSchedule", json!({"id": id})))
            .await;
        router
            .handle(&command("cancelSchedule", json!({})))
            .await;
        router.handle(&command("listSchedules", json!({}))).await;

        let acks = transport.published();
        assert_eq!(acks[1]["status"], "error");
        assert_eq!(acks[2]["status"], "ok");
        // Missing id is an error ack, not a crash.
        assert_eq!(acks[3]["status"], "error");
        assert_eq!(acks[4]["jobs"], json!([]));
    }

    #[tokio::test]
    async fn test_on_fire_publishes_events_not_acks() {
        let (_dir, transport, router) = test_router();
        let job = Job::daily("08:00", None);
        router.on_fire(job.clone()).await;

        let events = transport.published();
        assert_eq!(events[0]["type"], "event");
        assert_eq!(events[0]["code"], "FEED_DISPENSED");
        assert_eq!(events[0]["job_id"], json!(job.id));

        let (_dir, transport, router) = router_with(Arc::new(BrokenServo));
        router.on_fire(job.clone()).await;
        let events = transport.published();
        assert_eq!(events[0]["level"], "error");
        assert_eq!(events[0]["code"], "FEED_ERROR");
    }

    #[tokio::test]
    async fn test_run_loop_processes_and_cancels() {
        let (_dir, transport, router) = test_router();
        transport.push_inbound(command("feedNow", json!({})));
        let router = Arc::new(router);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let router = router.clone();
            let cancel = cancel.clone();
            async move { router.run(cancel).await }
        });

        // Wait until the queued command has been acked.
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if !transport.published().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("command should be acked");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("router loop should exit on cancel")
            .unwrap();

        assert_eq!(transport.published()[0]["command"], "feedNow");
    }
}
