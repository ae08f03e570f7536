//! Aggregated command outcomes.
//!
//! Every client operation returns a [`CmdResult`]: an ordered list of
//! `(success, payload)` outcomes, one per remote call (or per local
//! rejection). Multi-port operations fold each port's result into one
//! aggregate with [`CmdResult::add`]. There is no partial success: a single
//! failing outcome makes the whole result bad.
//!
//! An empty result is good. Composite operations rely on this: a fan-out
//! over zero ports does not stop the sequence.

use std::fmt;

use tgen_rpc::RpcReply;

/// Outcome of a single remote call or local check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether it succeeded.
    pub success: bool,
    /// Returned data on success, diagnostic message on failure.
    pub payload: String,
}

/// Ordered aggregate of outcomes with a single good/bad verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct CmdResult {
    outcomes: Vec<Outcome>,
    failed_stage: Option<String>,
}

impl CmdResult {
    /// An empty result. Good by convention.
    pub const fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            failed_stage: None,
        }
    }

    /// A single successful outcome with no data.
    pub fn ok() -> Self {
        Self::ok_with("")
    }

    /// A single successful outcome carrying `data`.
    pub fn ok_with(data: impl Into<String>) -> Self {
        Self::single(true, data.into())
    }

    /// A single failing outcome carrying `message`.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::single(false, message.into())
    }

    /// Wrap a link reply.
    pub fn from_reply(reply: &RpcReply) -> Self {
        Self::single(reply.success, reply.message())
    }

    fn single(success: bool, payload: String) -> Self {
        Self {
            outcomes: vec![Outcome { success, payload }],
            failed_stage: None,
        }
    }

    /// Append all of `other`'s outcomes, preserving order.
    pub fn add(&mut self, other: Self) {
        self.outcomes.extend(other.outcomes);
        if self.failed_stage.is_none() {
            self.failed_stage = other.failed_stage;
        }
    }

    /// By-value form of [`add`](Self::add).
    pub fn merge(mut self, other: Self) -> Self {
        self.add(other);
        self
    }

    /// True iff every outcome succeeded.
    #[must_use]
    pub fn good(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Negation of [`good`](Self::good).
    #[must_use]
    pub fn bad(&self) -> bool {
        !self.good()
    }

    /// Payloads of the successful outcomes.
    #[must_use]
    pub fn data(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.payload.as_str())
            .collect()
    }

    /// Messages of the failing outcomes.
    #[must_use]
    pub fn err(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.payload.as_str())
            .collect()
    }

    /// All outcomes in order.
    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    /// Number of outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no outcome has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// The stage of a composite operation that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        self.failed_stage.as_deref()
    }

    /// Mark this result as the failure of `stage`.
    pub fn at_stage(mut self, stage: impl Into<String>) -> Self {
        self.failed_stage = Some(stage.into());
        self
    }

    /// Hand this result to `reporter` under the heading `desc`.
    pub fn annotate(&self, desc: &str, reporter: &dyn Reporter) {
        reporter.report(desc, self);
    }
}

impl fmt::Display for CmdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.good() {
            return f.write_str("[SUCCESS]");
        }
        for message in self.err() {
            writeln!(f, "{message}")?;
        }
        f.write_str("[FAILED]")
    }
}

/// Observer for results as composite operations evaluate them.
pub trait Reporter: Send + Sync {
    /// Called once per evaluated stage.
    fn report(&self, desc: &str, result: &CmdResult);

    /// Informational message that is not tied to a result.
    fn note(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Reporter that writes to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, desc: &str, result: &CmdResult) {
        if result.good() {
            tracing::info!(stage = %desc, "[SUCCESS]");
        } else {
            for message in result.err() {
                tracing::error!(stage = %desc, error = %message, "[FAILED]");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn empty_is_good() {
        let rc = CmdResult::new();
        assert!(rc.good());
        assert!(!rc.bad());
        assert!(rc.is_empty());
    }

    #[test]
    fn single_failure_spoils_aggregate() {
        let mut rc = CmdResult::new();
        rc.add(CmdResult::ok());
        rc.add(CmdResult::fail("port 1 : owned by alice"));
        rc.add(CmdResult::ok_with("h-3"));

        assert!(rc.bad());
        assert_eq!(rc.len(), 3);
        assert_eq!(rc.err(), vec!["port 1 : owned by alice"]);
        assert_eq!(rc.data(), vec!["", "h-3"]);
    }

    #[test]
    fn add_preserves_order() {
        let rc = CmdResult::fail("a")
            .merge(CmdResult::ok_with("b"))
            .merge(CmdResult::fail("c"));
        let payloads: Vec<&str> = rc.outcomes().iter().map(|o| o.payload.as_str()).collect();
        assert_eq!(payloads, vec!["a", "b", "c"]);
        assert_eq!(rc.err(), vec!["a", "c"]);
    }

    #[test]
    fn from_reply() {
        let rc = CmdResult::from_reply(&RpcReply::fail("connection closed by server"));
        assert!(rc.bad());
        assert_eq!(rc.err(), vec!["connection closed by server"]);

        let rc = CmdResult::from_reply(&RpcReply::ok(serde_json::json!("ACK")));
        assert!(rc.good());
        assert_eq!(rc.data(), vec!["ACK"]);
    }

    #[test]
    fn stage_marker_survives_merge() {
        let failed = CmdResult::fail("boom").at_stage("Starting traffic");
        let rc = CmdResult::ok().merge(failed);
        assert_eq!(rc.failed_stage(), Some("Starting traffic"));
    }

    #[test]
    fn display() {
        assert_eq!(CmdResult::ok().to_string(), "[SUCCESS]");
        assert_eq!(
            CmdResult::fail("port 0 : port is down").to_string(),
            "port 0 : port is down\n[FAILED]"
        );
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, bool)>>);

    impl Reporter for Recorder {
        fn report(&self, desc: &str, result: &CmdResult) {
            self.0.lock().push((desc.to_string(), result.good()));
        }
    }

    #[test]
    fn annotate_reaches_reporter() {
        let recorder = Recorder::default();
        CmdResult::ok().annotate("Syncing", &recorder);
        CmdResult::fail("x").annotate("Stopping", &recorder);
        assert_eq!(
            *recorder.0.lock(),
            vec![("Syncing".to_string(), true), ("Stopping".to_string(), false)]
        );
    }
}
