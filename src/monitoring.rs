use std::fmt::Write;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::capture::CaptureStats;
use crate::core::lock::lock_mutex;
use crate::pacing::PacerStats;
use crate::resources::ResourceStats;

/// Latest values published by the node loop for the metrics endpoint.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub resources: Vec<ResourceStats>,
    pub pacer: Option<PacerStats>,
    pub capture: Option<CaptureStats>,
    pub backlog_bytes: u64,
}

pub fn start_monitoring_server(
    bind: &str,
    snapshot: Arc<Mutex<MetricsSnapshot>>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!(e))?;
    log::info!("[monitoring] server on {}", bind);

    thread::spawn(move || {
        for req in server.incoming_requests() {
            match (req.method(), req.url()) {
                (&Method::Get, "/health") => {
                    let ok = running.load(Ordering::Relaxed);
                    let status = if ok { 200 } else { 503 };
                    let body = if ok { "ok" } else { "shutting_down" };
                    let _ = req.respond(text_response(body.to_string(), status, "text/plain"));
                }
                (&Method::Get, "/metrics") => {
                    let metrics = build_metrics(&lock_mutex(&snapshot, "monitoring"));
                    let _ = req.respond(text_response(
                        metrics,
                        200,
                        "text/plain; version=0.0.4",
                    ));
                }
                _ => {
                    let _ = req.respond(Response::empty(StatusCode(404)));
                }
            }
        }
    });

    Ok(())
}

fn text_response(body: String, status: u16, content_type: &str) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_string(body).with_status_code(StatusCode(status));
    match Header::from_bytes("Content-Type", content_type) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

pub fn build_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "# HELP governor_resource_used Units currently reserved on a resource."
    );
    let _ = writeln!(output, "# TYPE governor_resource_used gauge");
    let _ = writeln!(
        output,
        "# HELP governor_resource_total Capacity of a resource."
    );
    let _ = writeln!(output, "# TYPE governor_resource_total gauge");
    let _ = writeln!(
        output,
        "# HELP governor_resource_rejected_total Reservations refused for lack of capacity."
    );
    let _ = writeln!(output, "# TYPE governor_resource_rejected_total counter");
    for stats in &snapshot.resources {
        let label = escape_label_value(&stats.name);
        let _ = writeln!(
            output,
            "governor_resource_used{{resource=\"{}\"}} {}",
            label, stats.used
        );
        let _ = writeln!(
            output,
            "governor_resource_total{{resource=\"{}\"}} {}",
            label, stats.total
        );
        let _ = writeln!(
            output,
            "governor_resource_rejected_total{{resource=\"{}\"}} {}",
            label, stats.rejected_reservations
        );
    }

    if let Some(pacer) = &snapshot.pacer {
        let _ = writeln!(output, "# TYPE governor_captures_started_total counter");
        let _ = writeln!(
            output,
            "governor_captures_started_total {}",
            pacer.captures_started
        );
        let _ = writeln!(output, "# TYPE governor_captures_completed_total counter");
        let _ = writeln!(
            output,
            "governor_captures_completed_total {}",
            pacer.captures_completed
        );
        let _ = writeln!(output, "# TYPE governor_captures_failed_total counter");
        let _ = writeln!(
            output,
            "governor_captures_failed_total {}",
            pacer.failed_captures
        );
        let _ = writeln!(output, "# TYPE governor_captures_suppressed_total counter");
        let _ = writeln!(
            output,
            "governor_captures_suppressed_total {}",
            pacer.suppressed_while_pending
        );
    }

    if let Some(capture) = &snapshot.capture {
        let _ = writeln!(output, "# TYPE governor_frames_dropped_total counter");
        let _ = writeln!(
            output,
            "governor_frames_dropped_total {}",
            capture.frames_dropped
        );
    }

    let _ = writeln!(output, "# TYPE governor_backlog_bytes gauge");
    let _ = writeln!(output, "governor_backlog_bytes {}", snapshot.backlog_bytes);

    output
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\"', "\\\"")
}
