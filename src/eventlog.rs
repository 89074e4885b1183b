/// Round log and determinism checks.
///
/// Records every resolved batch into an append-only log, supports
/// per-round checkpoints of component state hashes, and provides a text
/// export/import so two runs of the same model can be compared.

use std::io::{self, BufRead, Write};

use crate::actor::{ActorId, TraceEntry};
use crate::event::{Event, EventStatus};
use crate::time::{EventTime, Resolution};

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a variant).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── Checkpoint ────────────────────────────────────────────────────────

/// Combined component state hash after a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub round: u64,
    pub state_hash: u64,
}

// ── Round Log ─────────────────────────────────────────────────────────

/// Append-only log of resolved events with optional checkpointing.
#[derive(Debug, Clone, Default)]
pub struct RoundLog {
    entries: Vec<TraceEntry>,
    checkpoints: Vec<Checkpoint>,
    checkpoint_interval: Option<u64>,
}

impl RoundLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checkpoint every `n` rounds.
    pub fn with_checkpoint_interval(n: u64) -> Self {
        RoundLog {
            checkpoint_interval: Some(n),
            ..Self::default()
        }
    }

    /// Record a resolved batch.
    pub fn record_round(&mut self, round: u64, events: &[Event]) {
        self.entries
            .extend(events.iter().map(|e| TraceEntry::from_event(round, e)));
    }

    pub fn add_checkpoint(&mut self, round: u64, state_hash: u64) {
        self.checkpoints.push(Checkpoint { round, state_hash });
    }

    pub fn should_checkpoint(&self, round: u64) -> bool {
        match self.checkpoint_interval {
            Some(n) if n > 0 => round % n == 0,
            _ => false,
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries resolved in `round`.
    pub fn round(&self, round: u64) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.round == round)
    }

    /// Compute a deterministic hash of the entire log.
    pub fn log_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for entry in &self.entries {
            h = hash_combine(h, entry.round);
            h = hash_combine(h, hash_bytes(entry.event.as_bytes()));
            h = hash_combine(h, entry.owner.map_or(0, |o| o.raw() + 1));
            h = hash_combine(h, status_code(entry.status));
            h = hash_combine(h, time_hash(entry.time));
        }
        h
    }

    // ── Export / Import ───────────────────────────────────────────

    /// Export the log to a writer in a deterministic text format.
    pub fn export<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "# METROII ROUND LOG v1")?;
        writeln!(w, "# entries: {}", self.entries.len())?;
        writeln!(w, "# checkpoints: {}", self.checkpoints.len())?;

        for e in &self.entries {
            let owner = e.owner.map_or_else(|| "-".to_string(), |o| o.raw().to_string());
            let time = e.time.map_or_else(
                || "-".to_string(),
                |t| format!("{}@{}", t.value(), t.resolution().seconds()),
            );
            writeln!(w, "E {} {} {} {} {}", e.round, owner, e.status, time, e.event)?;
        }
        for cp in &self.checkpoints {
            writeln!(w, "C {} {:016x}", cp.round, cp.state_hash)?;
        }
        Ok(())
    }

    /// Import a log from a reader.
    pub fn import<R: BufRead>(r: R) -> io::Result<Self> {
        let mut log = RoundLog::new();
        for line in r.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = |e: String| io::Error::new(io::ErrorKind::InvalidData, e);
            if let Some(rest) = line.strip_prefix("E ") {
                log.entries.push(deserialize_entry(rest).map_err(invalid)?);
            } else if let Some(rest) = line.strip_prefix("C ") {
                log.checkpoints.push(deserialize_checkpoint(rest).map_err(invalid)?);
            } else {
                return Err(invalid(format!("unknown log line: {}", line)));
            }
        }
        Ok(log)
    }
}

// ── Verification ──────────────────────────────────────────────────────

/// Compare two logs entry by entry.
pub fn logs_match(a: &RoundLog, b: &RoundLog) -> bool {
    a.entries == b.entries
}

/// Compare checkpoints between two logs.
pub fn checkpoints_match(a: &RoundLog, b: &RoundLog) -> bool {
    a.checkpoints == b.checkpoints
}

// ── Serialization helpers ─────────────────────────────────────────────

fn status_code(s: EventStatus) -> u64 {
    match s {
        EventStatus::Proposed => 1,
        EventStatus::Waiting => 2,
        EventStatus::Notified => 3,
    }
}

fn time_hash(t: Option<EventTime>) -> u64 {
    match t {
        None => 0,
        Some(t) => hash_combine(t.value(), t.resolution().seconds().to_bits()),
    }
}

fn parse_status(s: &str) -> Result<EventStatus, String> {
    match s {
        "PROPOSED" => Ok(EventStatus::Proposed),
        "WAITING" => Ok(EventStatus::Waiting),
        "NOTIFIED" => Ok(EventStatus::Notified),
        other => Err(format!("unknown status: {}", other)),
    }
}

fn parse_time(s: &str) -> Result<Option<EventTime>, String> {
    if s == "-" {
        return Ok(None);
    }
    let (value, res) = s
        .split_once('@')
        .ok_or_else(|| format!("bad time: {}", s))?;
    let value: u64 = value.parse().map_err(|e| format!("bad time value: {}", e))?;
    let seconds: f64 = res.parse().map_err(|e| format!("bad resolution: {}", e))?;
    let resolution = Resolution::new(seconds).map_err(|e| e.to_string())?;
    Ok(Some(EventTime::new(value, resolution)))
}

fn deserialize_entry(rest: &str) -> Result<TraceEntry, String> {
    let mut parts = rest.splitn(5, ' ');
    let mut next = |label: &str| parts.next().ok_or_else(|| format!("missing {}", label));
    let round = next("round")?
        .parse()
        .map_err(|e| format!("bad round: {}", e))?;
    let owner = match next("owner")? {
        "-" => None,
        raw => Some(ActorId::new(
            raw.parse().map_err(|e| format!("bad owner: {}", e))?,
        )),
    };
    let status = parse_status(next("status")?)?;
    let time = parse_time(next("time")?)?;
    let event = next("event")?.to_string();
    Ok(TraceEntry {
        round,
        event,
        owner,
        status,
        time,
    })
}

fn deserialize_checkpoint(rest: &str) -> Result<Checkpoint, String> {
    let (round, hash) = rest
        .split_once(' ')
        .ok_or_else(|| format!("bad checkpoint: {}", rest))?;
    Ok(Checkpoint {
        round: round.parse().map_err(|e| format!("bad round: {}", e))?,
        state_hash: u64::from_str_radix(hash, 16).map_err(|e| format!("bad hash: {}", e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn batch() -> Vec<Event> {
        let mut a = Event::proposed("p.PREFIRE_BEGIN", EventKind::Begin)
            .with_owner(ActorId::new(0))
            .with_time(EventTime::new(10, Resolution::MILLIS));
        a.notify();
        let mut b = Event::proposed("q.with space", EventKind::Generic).with_owner(ActorId::new(1));
        b.defer().unwrap();
        vec![a, b]
    }

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash_combine(42, 99), hash_combine(42, 99));
        assert_ne!(hash_combine(42, 99), hash_combine(42, 100));
        assert_ne!(hash_bytes(b"a"), hash_bytes(b"b"));
    }

    #[test]
    fn test_log_hash_tracks_statuses() {
        let mut l1 = RoundLog::new();
        l1.record_round(1, &batch());
        let mut l2 = RoundLog::new();
        l2.record_round(1, &batch());
        assert_eq!(l1.log_hash(), l2.log_hash());
        assert!(logs_match(&l1, &l2));

        let mut other = batch();
        other[1].notify();
        let mut l3 = RoundLog::new();
        l3.record_round(1, &other);
        assert_ne!(l1.log_hash(), l3.log_hash());
    }

    #[test]
    fn test_export_import() {
        let mut log = RoundLog::with_checkpoint_interval(2);
        log.record_round(1, &batch());
        log.record_round(2, &batch()[..1]);
        log.add_checkpoint(2, 0xdead_beef);

        let mut buf = Vec::new();
        log.export(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("# METROII ROUND LOG v1"));
        assert!(text.contains("E 1 0 NOTIFIED 10@0.001 p.PREFIRE_BEGIN"));

        let back = RoundLog::import(&buf[..]).unwrap();
        assert!(logs_match(&log, &back));
        assert!(checkpoints_match(&log, &back));
        assert_eq!(back.log_hash(), log.log_hash());
        assert_eq!(back.round(2).count(), 1);
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(RoundLog::import("X nonsense\n".as_bytes()).is_err());
        assert!(RoundLog::import("E 1 0 MAYBE - a\n".as_bytes()).is_err());
    }

    #[test]
    fn test_should_checkpoint() {
        let log = RoundLog::with_checkpoint_interval(3);
        assert!(log.should_checkpoint(3));
        assert!(!log.should_checkpoint(4));
        assert!(!RoundLog::new().should_checkpoint(3));
    }
}
