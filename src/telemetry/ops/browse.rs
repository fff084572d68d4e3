use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Browse;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Resolve, Query }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Resolve => "resolve", Phase::Query => "query" } }
    fn span(&self) -> Span { match self { Phase::Resolve => info_span!("resolve"), Phase::Query => info_span!("query") } }
}

impl OpMarker for Browse {
    const NAME: &'static str = "browse";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("browse") }
}
