#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Emits the in-place edits applied to clusters that survive removal.
//!
//! Every operator only emits a command when it would change the stored state,
//! so running maintenance twice over the same save emits nothing the second time.

use se_maintenance_core::{BlockKind, BlockRef, Command, FactoryMode};
use se_maintenance_system_clustering::Cluster;
use se_maintenance_world::{Block, Sector};
use serde::Deserialize;

/// Toggles for each mutation operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MutationOptions {
    /// Stops every moving or spinning grid.
    pub zero_inertia: bool,
    /// Switches off refineries and assemblers using the provided strategy.
    pub factories: Option<FactoryMode>,
    /// Drops pending refinery production queues.
    pub strip_refinery_queues: bool,
    /// Switches off every reflector light.
    pub disable_spotlights: bool,
}

impl MutationOptions {
    /// Reports whether any operator is switched on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.zero_inertia
            || self.factories.is_some()
            || self.strip_refinery_queues
            || self.disable_spotlights
    }
}

/// Pure system producing mutation commands for surviving clusters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mutations {
    options: MutationOptions,
}

impl Mutations {
    /// Creates the system with the provided operator toggles.
    #[must_use]
    pub const fn new(options: MutationOptions) -> Self {
        Self { options }
    }

    /// Emits every mutation the enabled operators require for the cluster.
    pub fn handle(&self, cluster: &Cluster, sector: &Sector, out: &mut Vec<Command>) {
        for entity in cluster.entities(sector) {
            let Some(grid) = entity.grid() else {
                continue;
            };
            if self.options.zero_inertia && grid.is_moving() {
                out.push(Command::ZeroVelocity {
                    entity: entity.id(),
                });
            }
            for (index, block) in grid.blocks().iter().enumerate() {
                self.handle_block(BlockRef::new(entity.id(), index), block, out);
            }
        }
    }

    fn handle_block(&self, target: BlockRef, block: &Block, out: &mut Vec<Command>) {
        let disable = match block.kind() {
            BlockKind::Refinery | BlockKind::Assembler => self
                .options
                .factories
                .is_some_and(|mode| factory_should_stop(mode, block)),
            BlockKind::ReflectorLight => self.options.disable_spotlights,
            _ => false,
        };
        if disable && block.is_enabled() {
            out.push(Command::SetBlockEnabled {
                block: target,
                enabled: false,
            });
        }

        if self.options.strip_refinery_queues
            && block.kind() == BlockKind::Refinery
            && block.queue_len().is_some()
        {
            out.push(Command::ClearProductionQueue { block: target });
        }
    }
}

/// Soft mode only stops factories with nothing to work on.
fn factory_should_stop(mode: FactoryMode, block: &Block) -> bool {
    match mode {
        FactoryMode::Hard => true,
        FactoryMode::Soft => match block.kind() {
            BlockKind::Refinery => block.input_items() == 0,
            BlockKind::Assembler => block.queue_len().unwrap_or(0) == 0,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_do_nothing() {
        assert!(!MutationOptions::default().is_active());
        let options = MutationOptions {
            factories: Some(FactoryMode::Soft),
            ..MutationOptions::default()
        };
        assert!(options.is_active());
    }
}
