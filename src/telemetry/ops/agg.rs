use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Agg;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Tick, Select, Stamp, Fetch, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Tick => "tick",
        Phase::Select => "select",
        Phase::Stamp => "stamp",
        Phase::Fetch => "fetch",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Tick => info_span!("tick"),
        Phase::Select => info_span!("select"),
        Phase::Stamp => info_span!("stamp"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Agg {
    const NAME: &'static str = "agg";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("agg") }
}
