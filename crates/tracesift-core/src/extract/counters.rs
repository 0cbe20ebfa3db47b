use super::record::FrameOutcome;
use crate::source::CaptureTime;

/// Running per-job tallies.
///
/// Every frame lands in exactly one bucket, so
/// `total = ip + non_ip4` and `ip = tcp + udp + unprocessed + other_ip`.
/// `ipv6` and `damaged` are subsets of `non_ip4`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub total: u64,
    pub ip: u64,
    pub non_ip4: u64,
    pub tcp: u64,
    pub udp: u64,
    pub unprocessed: u64,
    pub other_ip: u64,
    pub ipv6: u64,
    pub damaged: u64,
    pub first_ts: Option<CaptureTime>,
    pub last_ts: Option<CaptureTime>,
}

impl FrameCounters {
    pub fn record(&mut self, ts: CaptureTime, outcome: FrameOutcome) {
        self.total += 1;
        self.observe(ts);
        match outcome {
            FrameOutcome::NonIpv4 { ipv6 } => {
                self.non_ip4 += 1;
                if ipv6 {
                    self.ipv6 += 1;
                }
            }
            FrameOutcome::Tcp => {
                self.ip += 1;
                self.tcp += 1;
            }
            FrameOutcome::Udp => {
                self.ip += 1;
                self.udp += 1;
            }
            FrameOutcome::Unprocessed => {
                self.ip += 1;
                self.unprocessed += 1;
            }
            FrameOutcome::OtherIp => {
                self.ip += 1;
                self.other_ip += 1;
            }
        }
    }

    /// A record the reader skipped; it never carries a usable IP header.
    pub fn record_damaged(&mut self) {
        self.total += 1;
        self.non_ip4 += 1;
        self.damaged += 1;
    }

    fn observe(&mut self, ts: CaptureTime) {
        if self.first_ts.is_none_or(|first| ts.as_nanos() < first.as_nanos()) {
            self.first_ts = Some(ts);
        }
        if self.last_ts.is_none_or(|last| ts.as_nanos() > last.as_nanos()) {
            self.last_ts = Some(ts);
        }
    }
}
