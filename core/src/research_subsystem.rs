use crate::{
    error::SimResult,
    event::SimEvent,
    rng::RngBank,
    subsystem::{SimSubsystem, TickContext},
};

/// Step 2: works through the research queue in request order.
/// A rejected request is reported and dropped; it never fails the tick.
pub struct ResearchSubsystem;

impl SimSubsystem for ResearchSubsystem {
    fn name(&self) -> &'static str {
        "research"
    }

    fn update(&mut self, ctx: &mut TickContext<'_>, _rng: &mut RngBank) -> SimResult<Vec<SimEvent>> {
        let queue = std::mem::take(&mut ctx.state.research_queue);
        let tree = ctx.catalogs.tech_tree();
        let mut events = Vec::with_capacity(queue.len());

        for tech_id in queue {
            match tree.research(ctx.state, &tech_id) {
                Ok(node) => events.push(SimEvent::ResearchCompleted {
                    tick: ctx.tick,
                    tech_id: node.id.clone(),
                    unlocks: node.unlocks.clone(),
                }),
                Err(e) => {
                    log::warn!("tick={} research of '{tech_id}' rejected: {e}", ctx.tick);
                    events.push(SimEvent::ResearchRejected {
                        tick: ctx.tick,
                        tech_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(events)
    }
}
