use std::fmt::{self, Write as _};

use facet::Facet;

use crate::proxmox::{VmStatus, VmSummary};

/// Semantic severity of a reply; the gateway maps it to an embed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Neutral,
    Failure,
}

impl Tone {
    pub fn color(self) -> u32 {
        match self {
            Tone::Success => 0x00FF00,
            Tone::Warning => 0xFFA500,
            Tone::Neutral => 0x0099FF,
            Tone::Failure => 0xFF0000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Success => "success",
            Tone::Warning => "warning",
            Tone::Neutral => "neutral",
            Tone::Failure => "failure",
        }
    }
}

/// One formatted text block sent back for an interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub tone: Tone,
}

impl Reply {
    pub fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    /// `❌ <error>`
    pub fn error(err: &dyn fmt::Display) -> Self {
        Self::new(Tone::Failure, format!("❌ {err}"))
    }

    /// `❌ <context>: <error>`
    pub fn failed(context: impl fmt::Display, err: &dyn fmt::Display) -> Self {
        Self::new(Tone::Failure, format!("❌ {context}: {err}"))
    }

    pub fn is_failure(&self) -> bool {
        self.tone == Tone::Failure
    }
}

/// An autocomplete choice: `label` is shown, `value` is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Suggestion {
    pub label: String,
    pub value: String,
}

impl Suggestion {
    pub fn for_vm(vm: &VmSummary) -> Self {
        Self {
            label: format!("{} (ID: {}) - {}", vm.name, vm.vmid, vm.status),
            value: vm.vmid.to_string(),
        }
    }
}

// ── Formatting ──────────────────────────────────────────────

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn status_glyph(running: bool) -> &'static str {
    if running { "🟢" } else { "🔴" }
}

/// `"2d 3h 4m"`, `"3h 4m"`, or `"4m"`.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB
}

pub fn list(vms: &[VmSummary]) -> Reply {
    if vms.is_empty() {
        return Reply::new(Tone::Neutral, "No allowed VMs found.");
    }

    let mut text = String::from("**Allowed VMs:**\n\n");
    for vm in vms {
        let _ = writeln!(
            text,
            "{} **{}** (ID: {}) - {}",
            status_glyph(vm.is_running()),
            vm.name,
            vm.vmid,
            vm.status
        );
    }
    Reply::new(Tone::Neutral, text)
}

pub fn status(s: &VmStatus) -> Reply {
    let text = format!(
        "📊 **VM {} - {}**\n\
         • State: **{}**\n\
         • Uptime: {}\n\
         • CPU: {:.1}%\n\
         • RAM: {:.2} GB / {:.2} GB",
        s.vmid,
        s.name,
        s.status,
        format_uptime(s.uptime),
        s.cpu * 100.0,
        bytes_to_gib(s.mem),
        bytes_to_gib(s.maxmem),
    );
    let tone = if s.is_running() {
        Tone::Success
    } else {
        Tone::Neutral
    };
    Reply::new(tone, text)
}

pub fn started(vmid: u32) -> Reply {
    Reply::new(Tone::Success, format!("✅ VM {vmid} is starting"))
}

pub fn stopping(vmid: u32, force: bool) -> Reply {
    let text = if force {
        format!("🛑 VM {vmid} is being stopped")
    } else {
        format!("🛑 VM {vmid} is shutting down")
    };
    Reply::new(Tone::Warning, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(vmid: u32, name: &str, status: &str) -> VmSummary {
        VmSummary {
            vmid,
            name: name.into(),
            status: status.into(),
            ..VmSummary::default()
        }
    }

    #[test]
    fn uptime_formats() {
        assert_eq!(format_uptime(0), "0m");
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(2 * 86_400 + 3 * 3_600 + 4 * 60), "2d 3h 4m");
    }

    #[test]
    fn list_marks_running_and_stopped() {
        let reply = list(&[summary(100, "web", "running"), summary(101, "db", "stopped")]);
        assert_eq!(reply.tone, Tone::Neutral);
        assert!(reply.text.contains("🟢 **web** (ID: 100) - running"));
        assert!(reply.text.contains("🔴 **db** (ID: 101) - stopped"));
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(list(&[]).text, "No allowed VMs found.");
    }

    #[test]
    fn status_reports_metrics() {
        let reply = status(&VmStatus {
            vmid: 100,
            name: "web".into(),
            status: "running".into(),
            uptime: 7_200,
            cpu: 0.256,
            mem: 1 << 30,
            maxmem: 4 << 30,
            ..VmStatus::default()
        });
        assert_eq!(reply.tone, Tone::Success);
        assert!(reply.text.contains("**VM 100 - web**"));
        assert!(reply.text.contains("Uptime: 2h 0m"));
        assert!(reply.text.contains("CPU: 25.6%"));
        assert!(reply.text.contains("RAM: 1.00 GB / 4.00 GB"));
    }

    #[test]
    fn stopped_status_is_not_a_failure() {
        let reply = status(&VmStatus {
            vmid: 101,
            name: "db".into(),
            status: "stopped".into(),
            maxmem: 2 << 30,
            ..VmStatus::default()
        });
        assert_eq!(reply.tone, Tone::Neutral);
        assert!(reply.text.contains("State: **stopped**"));
        assert!(reply.text.contains("CPU: 0.0%"));
        assert!(reply.text.contains("RAM: 0.00 GB / 2.00 GB"));
    }

    #[test]
    fn failure_has_prefix_and_error() {
        let reply = Reply::failed(format_args!("Failed to start VM {}", 100), &"boom");
        assert!(reply.is_failure());
        assert_eq!(reply.text, "❌ Failed to start VM 100: boom");
        assert_eq!(Reply::error(&"nope").text, "❌ nope");
    }

    #[test]
    fn stop_wording_depends_on_force() {
        assert!(stopping(100, false).text.contains("shutting down"));
        assert!(stopping(100, true).text.contains("being stopped"));
        assert_eq!(stopping(100, false).tone, Tone::Warning);
    }

    #[test]
    fn suggestion_label_and_value() {
        let s = Suggestion::for_vm(&summary(100, "web", "running"));
        assert_eq!(s.label, "web (ID: 100) - running");
        assert_eq!(s.value, "100");
    }

    #[test]
    fn tone_colors() {
        assert_eq!(Tone::Success.color(), 0x00FF00);
        assert_eq!(Tone::Failure.color(), 0xFF0000);
        assert_eq!(Tone::Neutral.as_str(), "neutral");
    }
}
