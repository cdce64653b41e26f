use crate::plan::ProductionPlan;
use crate::stream::StreamHandler;

/// State threaded through every `process_input_order` call of one chain run.
///
/// Carries the shared plan and stream registry plus the loop counter and the
/// node currently handling an operation, for log correlation.
pub struct SimulationContext<'a> {
    pub streams: &'a StreamHandler,
    pub plan: &'a mut ProductionPlan,
    pub chain_name: &'a str,
    pub loop_counter: u64,
    pub current_node: String,
}

impl<'a> SimulationContext<'a> {
    pub fn new(chain_name: &'a str, streams: &'a StreamHandler, plan: &'a mut ProductionPlan) -> Self {
        Self {
            streams,
            plan,
            chain_name,
            loop_counter: 0,
            current_node: String::new(),
        }
    }
}
